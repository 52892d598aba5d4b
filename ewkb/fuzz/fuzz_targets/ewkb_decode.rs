#![no_main]

use arbitrary::Arbitrary;
use bytes::{Bytes, BytesMut};
use commonware_ewkb::{Config, Decode, Decoder, Encode, Error, Geometry, Step};
use libfuzzer_sys::fuzz_target;

const CFG: Config = Config {
    max_items: 1024,
    max_depth: 64,
};

#[derive(Arbitrary, Debug)]
struct FuzzInput<'a> {
    data: &'a [u8],
    chunk: u8,
}

fn fuzz(input: FuzzInput) {
    let whole = Geometry::decode_cfg(Bytes::copy_from_slice(input.data), &CFG);

    // Feeding the same bytes in pieces must reach the same outcome
    let mut decoder = Decoder::with_config(CFG);
    decoder.prepare(None);
    let mut pending = BytesMut::new();
    let mut fed = 0;
    let mut chunked: Result<Step<Geometry>, Error> = Ok(Step::Suspended);
    for piece in input.data.chunks(usize::from(input.chunk).max(1)) {
        pending.extend_from_slice(piece);
        fed += piece.len();
        chunked = decoder.try_read(&mut pending);
        if !matches!(chunked, Ok(Step::Suspended)) {
            break;
        }
    }

    match (whole, chunked) {
        (Ok(a), Ok(Step::Done(b))) => {
            assert!(pending.is_empty());
            assert_eq!(a.srid(), b.srid());
            assert_eq!(a.encode(), b.encode());
        }
        (Err(Error::ExtraData(extra)), Ok(Step::Done(_))) => {
            // The incremental decoder stops at the end of the geometry and leaves the rest
            assert_eq!(pending.len() + input.data.len() - fed, extra);
        }
        (Err(Error::EndOfBuffer), Ok(Step::Suspended)) => {}
        (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
        (whole, chunked) => panic!("mismatch: whole={whole:?} chunked={chunked:?}"),
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
