#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use commonware_ewkb::{
    Config, Decoder, Encode, EncodeSize, Encoder, Geometry, LineString, Polygon, Step,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzShape {
    Point((f64, f64)),
    LineString(Vec<(f64, f64)>),
    Polygon(Vec<Vec<(f64, f64)>>),
    MultiPoint(Vec<(f64, f64)>),
    MultiLineString(Vec<Vec<(f64, f64)>>),
    MultiPolygon(Vec<Vec<Vec<(f64, f64)>>>),
    Collection(Vec<FuzzShape>),
}

impl FuzzShape {
    fn into_geometry(self) -> Geometry {
        match self {
            Self::Point((x, y)) => Geometry::point(x, y),
            Self::LineString(points) => Geometry::line_string(points),
            Self::Polygon(rings) => Geometry::polygon(rings),
            Self::MultiPoint(points) => Geometry::multi_point(points),
            Self::MultiLineString(lines) => {
                Geometry::multi_line_string(lines.into_iter().map(|points| LineString::new(points)))
            }
            Self::MultiPolygon(polygons) => {
                Geometry::multi_polygon(polygons.into_iter().map(|rings| Polygon::new(rings)))
            }
            Self::Collection(children) => {
                Geometry::collection(children.into_iter().map(Self::into_geometry))
            }
        }
    }
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    shape: FuzzShape,
    srid: u32,
    sink: u8,
    chunk: u8,
}

fn encode_chunked(geometry: &Geometry, capacity: usize) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.prepare(geometry);
    let mut out = Vec::new();
    loop {
        let mut chunk = vec![0u8; capacity];
        let mut sink = &mut chunk[..];
        let step = encoder.try_write(&mut sink).expect("encoder failed");
        let written = capacity - sink.len();
        out.extend_from_slice(&chunk[..written]);
        if step.is_done() {
            return out;
        }
        assert!(written > 0, "encoder made no progress");
    }
}

fn fuzz(input: FuzzInput) {
    let geometry = input.shape.into_geometry().with_srid(input.srid);
    let expected = geometry.encode();
    assert_eq!(expected.len(), geometry.encode_size());

    // Any sink that fits the largest unit must produce identical bytes
    let capacity = usize::from(input.sink).max(21);
    assert_eq!(encode_chunked(&geometry, capacity), &expected[..]);

    // Decode in chunks and compare re-encoded bytes (NaN coordinates are not equal to themselves)
    let mut decoder = Decoder::with_config(Config::unbounded());
    decoder.prepare(None);
    let mut pending = BytesMut::new();
    let mut decoded = None;
    for piece in expected.chunks(usize::from(input.chunk).max(1)) {
        pending.extend_from_slice(piece);
        if let Step::Done(geometry) = decoder.try_read(&mut pending).expect("decoder failed") {
            decoded = Some(geometry);
        }
    }
    let decoded = decoded.expect("decoder did not finish");
    assert!(pending.is_empty());
    assert_eq!(decoded.srid(), input.srid);
    assert_eq!(decoded.encode(), expected);
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
