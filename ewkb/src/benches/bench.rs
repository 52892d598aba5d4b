use commonware_ewkb::{Geometry, LineString, Polygon};
use criterion::criterion_main;
use rand::{rngs::StdRng, Rng, SeedableRng};

mod encode;

/// Builds a MultiPolygon of `polygons` closed rings with `points` random vertices each.
pub(crate) fn multi_polygon(polygons: usize, points: usize) -> Geometry {
    let mut rng = StdRng::seed_from_u64(0);
    let polygons = (0..polygons).map(|_| {
        let mut ring: Vec<(f64, f64)> = (0..points)
            .map(|_| (rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)))
            .collect();
        ring.push(ring[0]);
        Polygon::new([ring])
    });
    Geometry::multi_polygon(polygons.collect::<Vec<_>>()).with_srid(4326)
}

/// Builds `depth` nested collections, each holding a short line next to the deeper level.
pub(crate) fn nested(depth: usize) -> Geometry {
    let mut geometry = Geometry::point(1.0, 2.0);
    for i in 0..depth {
        let line = LineString::new([(i as f64, 0.0), (i as f64, 1.0)]);
        geometry = Geometry::collection([Geometry::from(line), geometry]);
    }
    geometry.with_srid(3942)
}

criterion_main!(decode::benches, encode::benches);
