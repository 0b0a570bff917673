use sdflow::control::StopSignal;
use sdflow::image::{ImageSequence, RgbImage};
use sdflow::pipelines::{compile, image_graph};
use sdflow::stages::Quantizer;
use std::time::Instant;

#[test]
fn rt_timing_stability() {
    // 16x16 frame: 1 + 16 + 16 + 1 firings per row, 544 per period.
    let data: Vec<u8> = (0..16 * 16 * 3).map(|i| (i % 256) as u8).collect();
    let images = ImageSequence::new(vec![RgbImage::new(16, 16, data).unwrap()]).unwrap();
    let (graph, schedule) = image_graph(images, Quantizer::SIXTEEN, |_| {}).unwrap();
    let mut runtime = compile(graph, &schedule).unwrap();

    let start = Instant::now();
    let report = runtime.run(Some(200), &StopSignal::new()).unwrap();
    let duration = start.elapsed();
    assert_eq!(report.periods, 200);
    assert_eq!(report.firings, 200 * 544);
    assert!(
        duration.as_millis() < 2000,
        "200 frames took too long: {duration:?}"
    );
}
