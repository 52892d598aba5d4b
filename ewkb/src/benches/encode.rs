use crate::{multi_polygon, nested};
use bytes::BytesMut;
use commonware_ewkb::{Encode, Encoder};
use criterion::{black_box, criterion_group, Criterion};

fn bench_encode(c: &mut Criterion) {
    for polygons in [1, 16, 256] {
        for points in [8, 64, 512] {
            let geometry = multi_polygon(polygons, points);
            c.bench_function(
                &format!(
                    "{}/polygons={} points={} len={}",
                    module_path!(),
                    polygons,
                    points,
                    Encoder::declared_length(&geometry)
                ),
                |b| {
                    b.iter(|| black_box(geometry.encode()));
                },
            );
        }
    }
}

fn bench_encode_chunked(c: &mut Criterion) {
    let geometry = multi_polygon(16, 512);
    for capacity in [32, 256, 4096] {
        c.bench_function(
            &format!("{}/capacity={}", module_path!(), capacity),
            |b| {
                let mut chunk = vec![0u8; capacity];
                b.iter(|| {
                    let mut encoder = Encoder::new();
                    encoder.prepare(&geometry);
                    loop {
                        let mut sink = &mut chunk[..];
                        if encoder.try_write(&mut sink).unwrap().is_done() {
                            break;
                        }
                    }
                    black_box(&chunk);
                });
            },
        );
    }
}

fn bench_encode_nested(c: &mut Criterion) {
    for depth in [16, 256, 4096] {
        let geometry = nested(depth);
        c.bench_function(&format!("{}/depth={}", module_path!(), depth), |b| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(Encoder::declared_length(&geometry));
                let mut encoder = Encoder::new();
                encoder.prepare(&geometry);
                black_box(encoder.try_write(&mut buf).unwrap());
            });
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_encode, bench_encode_chunked, bench_encode_nested
}
