use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdflow::actor::{Actor11, Sink, Source};
use sdflow::dsl::GraphBuilder;
use sdflow::image::{ImageSequence, RgbImage};
use sdflow::pipelines::{compile, image_graph, numeric_graph};
use sdflow::stages::Quantizer;

fn bench_numeric_period(c: &mut Criterion) {
    let (graph, schedule) = numeric_graph(
        |o: &mut Vec<i32>| o.extend([1, 2]),
        |o: &mut Vec<i32>| o.push(5),
        |t: &[i32]| {
            black_box(t);
        },
    )
    .unwrap();
    let mut runtime = compile(graph, &schedule).unwrap();

    c.bench_function("numeric_period", |b| {
        b.iter(|| runtime.run_period().unwrap())
    });
}

fn bench_image_frame(c: &mut Criterion) {
    let data: Vec<u8> = (0..64 * 48 * 3).map(|i| (i * 7 % 256) as u8).collect();
    let images = ImageSequence::new(vec![RgbImage::new(64, 48, data).unwrap()]).unwrap();
    let (graph, schedule) = image_graph(images, Quantizer::SIXTEEN, |art| {
        black_box(art);
    })
    .unwrap();
    let mut runtime = compile(graph, &schedule).unwrap();

    c.bench_function("image_frame_64x48", |b| {
        b.iter(|| runtime.run_period().unwrap())
    });
}

fn bench_timing_stability(c: &mut Criterion) {
    // Worst-case graph: chain of pass-through actors
    let mut b = GraphBuilder::new();
    b.actor(Source::new("src", 1, |o: &mut Vec<i64>| o.push(1)).unwrap())
        .unwrap();
    let mut prev = "src".to_string();
    for i in 0..10 {
        let name = format!("pass{i}");
        b.actor(Actor11::new(name.as_str(), 1, 1, |t: &[i64], o: &mut Vec<i64>| o.push(t[0] + 1)).unwrap())
            .unwrap();
        b.connect::<i64>((prev.as_str(), 0), (name.as_str(), 0), 1).unwrap();
        prev = name;
    }
    b.actor(Sink::new("sink", 1, |t: &[i64]| {
        black_box(t);
    })
    .unwrap())
    .unwrap();
    b.connect::<i64>((prev.as_str(), 0), ("sink", 0), 1).unwrap();

    let names: Vec<String> = std::iter::once("src".to_string())
        .chain((0..10).map(|i| format!("pass{i}")))
        .chain(std::iter::once("sink".to_string()))
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let schedule = b.schedule(&names).unwrap();
    let mut runtime = compile(b.build().unwrap(), &schedule).unwrap();

    c.bench_function("rt_timing_stability", |b| {
        b.iter(|| runtime.run_periods(black_box(1000)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_numeric_period,
    bench_image_frame,
    bench_timing_stability
);
criterion_main!(benches);
