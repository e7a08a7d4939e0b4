use canopy::imagery::{BoundingBox, ClassGrid, Palette, RasterBuffer};
use canopy::map::{classify_regions, MapRenderer, Viewport};
use canopy::timeline::TimeSlider;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

/// Full-size GIBS frame with a gradient in the green channel and a transparent margin
fn frame() -> RgbaImage {
    RgbaImage::from_fn(800, 1000, |x, y| {
        if x < 20 || y < 20 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([30, ((x + y) % 256) as u8, 60, 255])
        }
    })
}

fn classes() -> ClassGrid {
    let mut buf = RasterBuffer::from_rgba(frame());
    buf.recolor(&Palette::default());
    buf.into_classes()
}

fn bench_recolor(c: &mut Criterion) {
    let palette = Palette::default();
    let pixels = frame();
    c.bench_function("recolor_800x1000", |b| {
        b.iter_batched(
            || RasterBuffer::from_rgba(pixels.clone()),
            |mut buf| black_box(buf.recolor(&palette)),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_position_to_index(c: &mut Criterion) {
    let mut slider = TimeSlider::new(2005, 2024, |_: &str| {}).unwrap();
    slider.set_track(2.0, 180.0);
    c.bench_function("position_to_index", |b| {
        b.iter(|| {
            for x in 0..200 {
                black_box(slider.position_to_index(black_box(x as f64)));
            }
        })
    });
}

fn bench_choropleth(c: &mut Criterion) {
    let mut renderer = MapRenderer::new();
    canopy::data::generate_south_america(&mut renderer);
    let grid = classes();
    let bbox = BoundingBox::AMAZON;
    c.bench_function("classify_regions", |b| {
        b.iter(|| black_box(classify_regions(&renderer.regions, &grid, &bbox, 5)))
    });

    let vp = Viewport::fit(&bbox, 240, 240);
    let region_classes = classify_regions(&renderer.regions, &grid, &bbox, 5);
    c.bench_function("render_fills", |b| {
        b.iter(|| black_box(renderer.render_fills(120, 60, &vp, &region_classes, 5)))
    });
}

criterion_group!(benches, bench_recolor, bench_position_to_index, bench_choropleth);
criterion_main!(benches);
