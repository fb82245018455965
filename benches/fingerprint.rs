use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fingerprint::Fingerprint;
use image::{DynamicImage, ImageBuffer, Luma};

fn gradient_image(w: u32, h: u32) -> DynamicImage {
    let buf = ImageBuffer::from_fn(w, h, |x, y| Luma([((x * 17 + y * 31) % 256) as u8]));
    DynamicImage::ImageLuma8(buf)
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for (w, h) in [(64u32, 64u32), (512, 512), (2048, 2048)] {
        let img = gradient_image(w, h);
        group.throughput(Throughput::Elements(1));
        group.bench_function(format!("from_image_{w}x{h}"), |b| {
            b.iter(|| Fingerprint::from_image(black_box(&img)))
        });
    }

    let a = Fingerprint::from_image(&gradient_image(512, 512));
    let b_img = Fingerprint::from_image(&gradient_image(513, 511));
    group.bench_function("hamming", |b| {
        b.iter(|| black_box(&a).hamming(black_box(&b_img)))
    });

    group.finish();
}

criterion_group!(benches, bench_fingerprint);
criterion_main!(benches);
