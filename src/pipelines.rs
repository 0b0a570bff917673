//! Ready-made graphs and the three ways of running the image pipeline.
//!
//! The numeric and delay-loop graphs are small integer SDF systems with
//! hand-written schedules. The image pipeline (read, grayscale, ASCII) runs
//! either as one SDF graph under [`Runtime`], as three threads joined by task
//! queues, or as three threads handing frames through a [`SharedRegion`].

use crate::actor::{Actor11, Actor12, Actor21, Actor22, Sink, Source};
use crate::config::PipelineConfig;
use crate::control::{Pacer, StopSignal};
use crate::dsl::GraphBuilder;
use crate::graph::Graph;
use crate::handoff::{HandoffError, RegionLayout, SharedRegion};
use crate::image::{AsciiArt, GrayImage, ImageSequence, RgbImage};
use crate::plan::{Plan, Schedule};
use crate::queue::task_queue;
use crate::rt::Runtime;
use crate::stages::{ascii_actor, ascii_art, gray_image, grayscale_actor, resize_half, Quantizer};
use crate::SdfError;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, Scope, ScopedJoinHandle};

/// One period of the numeric graph.
pub const NUMERIC_SCHEDULE: [&str; 9] = ["in1", "a", "in1", "a", "in2", "b", "c", "d", "out"];

/// Tokens the numeric graph takes per period: four on `in1`, one on `in2`.
pub const NUMERIC_INPUTS_PER_PERIOD: usize = 5;

/// One period of the delay-loop graph.
pub const FEEDBACK_SCHEDULE: [&str; 13] = [
    "src", "p1", "p2", "p4", "sink", "p5", "src", "p1", "p2", "p4", "sink", "p5", "p3",
];

/// Tokens the delay-loop graph takes per period.
pub const FEEDBACK_INPUTS_PER_PERIOD: usize = 4;

/// Numeric graph with four arithmetic actors and a two-token delay on the
/// `d -> c` edge.
///
/// ```text
/// in1 -2-> a(2:1) -> c(2,1:1) -> d(2,1:1,2) -2-> out
/// in2 -1-> b(1:2) ------------------^   |
///               c <- [0, 0] ------------+
/// ```
///
/// `in1` must push two tokens per call, `in2` one; `out` receives two.
/// Token arithmetic wraps on overflow.
pub fn numeric_graph<F1, F2, G>(in1: F1, in2: F2, out: G) -> Result<(Graph, Schedule), SdfError>
where
    F1: FnMut(&mut Vec<i32>) + Send + 'static,
    F2: FnMut(&mut Vec<i32>) + Send + 'static,
    G: FnMut(&[i32]) + Send + 'static,
{
    let mut b = GraphBuilder::new();
    b.actor(Source::new("in1", 2, in1)?)?;
    b.actor(Source::new("in2", 1, in2)?)?;
    b.actor(Actor11::new("a", 2, 1, |x: &[i32], o: &mut Vec<i32>| {
        o.push(x[0].wrapping_add(x[1]))
    })?)?;
    b.actor(Actor11::new("b", 1, 2, |x: &[i32], o: &mut Vec<i32>| {
        o.extend([x[0], x[0].wrapping_add(1)])
    })?)?;
    b.actor(Actor21::new(
        "c",
        (2, 1),
        1,
        |xy: &[i32], z: &[i32], o: &mut Vec<i32>| {
            o.push(xy[0].wrapping_add(xy[1]).wrapping_add(z[0]))
        },
    )?)?;
    b.actor(Actor22::new(
        "d",
        (2, 1),
        (1, 2),
        |xy: &[i32], z: &[i32], fb: &mut Vec<i32>, o: &mut Vec<i32>| {
            let s = xy[0].wrapping_add(xy[1]);
            fb.push(s.wrapping_add(z[0]));
            o.extend([s, s.wrapping_add(z[0])]);
        },
    )?)?;
    b.actor(Sink::new("out", 2, out)?)?;

    b.connect::<i32>(("in1", 0), ("a", 0), 2)?;
    b.connect::<i32>(("in2", 0), ("b", 0), 1)?;
    b.connect::<i32>(("a", 0), ("c", 0), 2)?;
    b.connect::<i32>(("b", 0), ("d", 0), 2)?;
    b.connect::<i32>(("c", 0), ("d", 1), 1)?;
    b.delay::<i32>(("d", 0), ("c", 1), 2, &[0, 0])?;
    b.connect::<i32>(("d", 1), ("out", 0), 2)?;

    let schedule = b.schedule(&NUMERIC_SCHEDULE)?;
    Ok((b.build()?, schedule))
}

/// Five-actor loop closed by a `[0, 0]` delay from `p3` back to `p1`.
///
/// `src` must push two tokens per call; `sink` receives three. The loop
/// roughly doubles its tokens every period, so arithmetic wraps.
pub fn feedback_graph<F, G>(src: F, sink: G) -> Result<(Graph, Schedule), SdfError>
where
    F: FnMut(&mut Vec<i32>) + Send + 'static,
    G: FnMut(&[i32]) + Send + 'static,
{
    let mut b = GraphBuilder::new();
    b.actor(Source::new("src", 2, src)?)?;
    b.actor(Actor21::new(
        "p1",
        (2, 1),
        1,
        |x: &[i32], y: &[i32], o: &mut Vec<i32>| {
            o.push(x[0].wrapping_add(x[1]).wrapping_add(y[0]))
        },
    )?)?;
    b.actor(Actor12::new(
        "p2",
        1,
        (1, 1),
        |x: &[i32], o1: &mut Vec<i32>, o2: &mut Vec<i32>| {
            o1.push(x[0]);
            o2.push(x[0].wrapping_add(1));
        },
    )?)?;
    b.actor(Actor21::new(
        "p3",
        (2, 2),
        2,
        |x: &[i32], y: &[i32], o: &mut Vec<i32>| {
            o.extend([x[0].wrapping_add(x[1]), y[0].wrapping_add(y[1])])
        },
    )?)?;
    b.actor(Actor12::new(
        "p4",
        1,
        (3, 1),
        |x: &[i32], o1: &mut Vec<i32>, o2: &mut Vec<i32>| {
            o1.extend([x[0], x[0].wrapping_add(1), x[0].wrapping_add(2)]);
            o2.push(x[0]);
        },
    )?)?;
    b.actor(Actor11::new("p5", 1, 1, |x: &[i32], o: &mut Vec<i32>| {
        o.push(x[0].wrapping_add(1))
    })?)?;
    b.actor(Sink::new("sink", 3, sink)?)?;

    b.connect::<i32>(("src", 0), ("p1", 0), 2)?;
    b.connect::<i32>(("p1", 0), ("p2", 0), 1)?;
    b.connect::<i32>(("p2", 0), ("p4", 0), 1)?;
    b.connect::<i32>(("p2", 1), ("p3", 0), 2)?;
    b.connect::<i32>(("p4", 1), ("p5", 0), 1)?;
    b.connect::<i32>(("p5", 0), ("p3", 1), 2)?;
    b.delay::<i32>(("p3", 0), ("p1", 1), 2, &[0, 0])?;
    b.connect::<i32>(("p4", 0), ("sink", 0), 3)?;

    let schedule = b.schedule(&FEEDBACK_SCHEDULE)?;
    Ok((b.build()?, schedule))
}

/// Validate `schedule` and wrap the graph in a runtime.
pub fn compile(graph: Graph, schedule: &Schedule) -> Result<Runtime, SdfError> {
    let plan = Plan::compile(&graph, schedule)?;
    Ok(Runtime::new(graph, plan)?)
}

fn collector() -> (Arc<Mutex<Vec<i32>>>, impl FnMut(&[i32]) + Send + 'static) {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let collected = collected.clone();
        move |tokens: &[i32]| {
            if let Ok(mut out) = collected.lock() {
                out.extend_from_slice(tokens);
            }
        }
    };
    (collected, sink)
}

fn feeder(tokens: Vec<i32>, rate: usize) -> impl FnMut(&mut Vec<i32>) + Send + 'static {
    let mut tokens = tokens.into_iter();
    move |out: &mut Vec<i32>| out.extend(tokens.by_ref().take(rate))
}

fn drain(collected: Arc<Mutex<Vec<i32>>>) -> Vec<i32> {
    match collected.lock() {
        Ok(mut out) => std::mem::take(&mut *out),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

fn whole_periods(inputs: &[i32], per_period: usize) -> &[i32] {
    let used = inputs.len() - inputs.len() % per_period;
    if used != inputs.len() {
        warn!(
            "ignoring {} trailing inputs, a period takes {per_period}",
            inputs.len() - used
        );
    }
    &inputs[..used]
}

/// Push `inputs` through the numeric graph, one period per five values (the
/// first four feed `in1`, the fifth `in2`), and return everything `out`
/// received.
pub fn run_numeric(inputs: &[i32]) -> Result<Vec<i32>, SdfError> {
    let inputs = whole_periods(inputs, NUMERIC_INPUTS_PER_PERIOD);
    let periods = inputs.len() / NUMERIC_INPUTS_PER_PERIOD;
    let (mut first, mut second) = (Vec::new(), Vec::new());
    for group in inputs.chunks_exact(NUMERIC_INPUTS_PER_PERIOD) {
        first.extend_from_slice(&group[..4]);
        second.push(group[4]);
    }
    let (collected, sink) = collector();
    let (graph, schedule) = numeric_graph(feeder(first, 2), feeder(second, 1), sink)?;
    compile(graph, &schedule)?.run_periods(periods as u64)?;
    Ok(drain(collected))
}

/// Push `inputs` through the delay-loop graph, four values per period.
pub fn run_feedback(inputs: &[i32]) -> Result<Vec<i32>, SdfError> {
    let inputs = whole_periods(inputs, FEEDBACK_INPUTS_PER_PERIOD);
    let periods = inputs.len() / FEEDBACK_INPUTS_PER_PERIOD;
    let (collected, sink) = collector();
    let (graph, schedule) = feedback_graph(feeder(inputs.to_vec(), 2), sink)?;
    compile(graph, &schedule)?.run_periods(periods as u64)?;
    Ok(drain(collected))
}

/// Image pipeline as one SDF graph; one period converts one frame.
///
/// `src` emits one row of RGB bytes per firing, `gray` and `ascii` fire once
/// per pixel, and `sink` takes one row of symbols per firing, handing each
/// completed frame to `on_frame`.
pub fn image_graph<F>(
    mut images: ImageSequence,
    quantizer: Quantizer,
    mut on_frame: F,
) -> Result<(Graph, Schedule), SdfError>
where
    F: FnMut(AsciiArt) + Send + 'static,
{
    let (width, height) = (images.width(), images.height());
    let mut frame: Vec<u8> = Vec::with_capacity(3 * width * height);
    let mut row = 0;
    let src = move |out: &mut Vec<u8>| {
        if row == 0 {
            frame.clear();
            frame.extend_from_slice(images.next_image().data());
        }
        out.extend_from_slice(&frame[3 * width * row..3 * width * (row + 1)]);
        row = (row + 1) % height;
    };
    let mut symbols: Vec<char> = Vec::with_capacity(width * height);
    let sink = move |line: &[char]| {
        symbols.extend_from_slice(line);
        if symbols.len() == width * height {
            let full = std::mem::replace(&mut symbols, Vec::with_capacity(width * height));
            match AsciiArt::new(width, height, full) {
                Ok(art) => on_frame(art),
                Err(e) => error!("dropping frame: {e}"),
            }
        }
    };

    let mut b = GraphBuilder::new();
    let src = b.actor(Source::new("src", 3 * width, src)?)?;
    let gray = b.actor(grayscale_actor("gray")?)?;
    let ascii = b.actor(ascii_actor("ascii", quantizer)?)?;
    let sink = b.actor(Sink::new("sink", width, sink)?)?;
    b.connect::<u8>(("src", 0), ("gray", 0), 3 * width)?;
    b.connect::<f64>(("gray", 0), ("ascii", 0), width)?;
    b.connect::<char>(("ascii", 0), ("sink", 0), width)?;

    let schedule = Schedule::new([src])
        .then_n(gray, width)
        .then_n(ascii, width)
        .then(sink)
        .repeat(height);
    Ok((b.build()?, schedule))
}

/// Frames delivered by a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineReport {
    /// Frames that reached the last stage.
    pub frames: u64,
    /// True if the stop signal ended the run.
    pub stopped: bool,
}

/// Run the image graph, one period per pacing tick, for `frames` frames or
/// until `stop` is raised.
pub fn run_graph<F>(
    images: ImageSequence,
    config: &PipelineConfig,
    frames: Option<u64>,
    stop: &StopSignal,
    on_frame: F,
) -> Result<PipelineReport, SdfError>
where
    F: FnMut(AsciiArt) + Send + 'static,
{
    let (graph, schedule) = image_graph(images, config.quantizer, on_frame)?;
    let mut runtime = compile(graph, &schedule)?;
    let mut pacer = Pacer::new(config.period);
    let mut report = PipelineReport::default();
    info!("graph pipeline: start");
    while frames.map_or(true, |n| report.frames < n) {
        if !pacer.wait(stop) {
            report.stopped = true;
            break;
        }
        let run = runtime.run(Some(1), stop)?;
        report.frames += run.periods;
        if run.stopped {
            report.stopped = true;
            break;
        }
    }
    info!("graph pipeline: {} frames", report.frames);
    Ok(report)
}

fn spawn_stage<'scope, 'env, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: &'static str,
    stop: &StopSignal,
    body: F,
) -> Result<ScopedJoinHandle<'scope, Result<u64, SdfError>>, SdfError>
where
    F: FnOnce(&StopSignal) -> Result<u64, SdfError> + Send + 'scope,
{
    let stop = stop.clone();
    let peers = stop.clone();
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(scope, move || {
            info!("{name}: start");
            let result = body(&stop);
            match &result {
                Ok(n) => info!("{name}: done after {n} frames"),
                Err(e) => {
                    error!("{name}: {e}");
                    stop.stop();
                }
            }
            result
        })
        .map_err(|e| {
            peers.stop();
            SdfError::Io(e)
        })
}

fn join_stages(
    stages: Vec<(&'static str, ScopedJoinHandle<'_, Result<u64, SdfError>>)>,
    stop: &StopSignal,
) -> Result<PipelineReport, SdfError> {
    let mut first_error = None;
    let mut frames = 0;
    for (name, handle) in stages {
        let result = handle.join().unwrap_or_else(|_| {
            stop.stop();
            Err(SdfError::StagePanicked(name.to_string()))
        });
        match result {
            Ok(n) => frames = n,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(PipelineReport {
            frames,
            stopped: stop.is_stopped(),
        }),
    }
}

/// Image pipeline as three threads joined by task queues.
///
/// The reader is paced by `config.period` and posts [`RgbImage`]s, the
/// converter posts [`GrayImage`]s, the printer hands ASCII frames to
/// `on_frame`. Each stage stops after `frames` frames, on `stop`, or when
/// its upstream peer has gone. Any stage error raises `stop` for the others
/// and the first error is returned.
pub fn run_tasks<F>(
    mut images: ImageSequence,
    config: &PipelineConfig,
    frames: Option<u64>,
    stop: &StopSignal,
    mut on_frame: F,
) -> Result<PipelineReport, SdfError>
where
    F: FnMut(AsciiArt) + Send,
{
    let (mut rgb_tx, mut rgb_rx) = task_queue::<RgbImage>(config.queue_capacity)?;
    let (mut gray_tx, mut gray_rx) = task_queue::<GrayImage>(config.queue_capacity)?;
    let limit = frames.unwrap_or(u64::MAX);
    let (period, quantizer) = (config.period, config.quantizer);

    thread::scope(|s| {
        let mut stages = Vec::with_capacity(3);
        stages.push((
            "read",
            spawn_stage(s, "read", stop, move |stop| {
                let mut pacer = Pacer::new(period);
                let mut sent = 0;
                while sent < limit && pacer.wait(stop) {
                    if let Err(e) = rgb_tx.post(images.next_image().clone(), stop) {
                        debug!("read: {e}");
                        break;
                    }
                    sent += 1;
                }
                Ok(sent)
            })?,
        ));
        stages.push((
            "grayscale",
            spawn_stage(s, "grayscale", stop, move |stop| {
                let mut done = 0;
                while done < limit {
                    let frame = match rgb_rx.pend(stop) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!("grayscale: {e}");
                            break;
                        }
                    };
                    if let Err(e) = gray_tx.post(gray_image(&frame)?, stop) {
                        debug!("grayscale: {e}");
                        break;
                    }
                    done += 1;
                }
                Ok(done)
            })?,
        ));
        stages.push((
            "ascii",
            spawn_stage(s, "ascii", stop, move |stop| {
                let mut done = 0;
                while done < limit {
                    let frame = match gray_rx.pend(stop) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!("ascii: {e}");
                            break;
                        }
                    };
                    on_frame(ascii_art(&frame, &quantizer)?);
                    done += 1;
                }
                Ok(done)
            })?,
        ));
        join_stages(stages, stop)
    })
}

/// Image pipeline as three threads handing frames through a two-boundary
/// [`SharedRegion`].
///
/// The first stage converts to grayscale and publishes on boundary 0, the
/// middle stage optionally halves the frame and republishes on boundary 1,
/// the last stage renders ASCII. Stop and error handling match
/// [`run_tasks`].
pub fn run_multicore<F>(
    mut images: ImageSequence,
    config: &PipelineConfig,
    frames: Option<u64>,
    stop: &StopSignal,
    mut on_frame: F,
) -> Result<PipelineReport, SdfError>
where
    F: FnMut(AsciiArt) + Send,
{
    let layout = RegionLayout::new(2, images.width() * images.height())?;
    let region = SharedRegion::new(layout, config.wait)?;
    let (mut gray_out, mut gray_in) = region.claim(0)?;
    let (mut small_out, mut small_in) = region.claim(1)?;
    let limit = frames.unwrap_or(u64::MAX);
    let (period, quantizer, resize) = (config.period, config.quantizer, config.resize);
    debug!("multicore: {} byte region, resize {resize}", layout.len());

    thread::scope(|s| {
        let mut stages = Vec::with_capacity(3);
        stages.push((
            "grayscale",
            spawn_stage(s, "grayscale", stop, move |stop| {
                let mut pacer = Pacer::new(period);
                let mut sent = 0;
                while sent < limit && pacer.wait(stop) {
                    let frame = gray_image(images.next_image())?;
                    match gray_out.publish(&frame, stop) {
                        Ok(()) => sent += 1,
                        Err(HandoffError::Stopped) => break,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(sent)
            })?,
        ));
        stages.push((
            "resize",
            spawn_stage(s, "resize", stop, move |stop| {
                let mut done = 0;
                while done < limit {
                    let frame = match gray_in.await_and_consume(stop) {
                        Ok(frame) => frame,
                        Err(HandoffError::Stopped) => break,
                        Err(e) => return Err(e.into()),
                    };
                    let frame = if resize { resize_half(&frame)? } else { frame };
                    match small_out.publish(&frame, stop) {
                        Ok(()) => done += 1,
                        Err(HandoffError::Stopped) => break,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(done)
            })?,
        ));
        stages.push((
            "ascii",
            spawn_stage(s, "ascii", stop, move |stop| {
                let mut done = 0;
                while done < limit {
                    let frame = match small_in.await_and_consume(stop) {
                        Ok(frame) => frame,
                        Err(HandoffError::Stopped) => break,
                        Err(e) => return Err(e.into()),
                    };
                    on_frame(ascii_art(&frame, &quantizer)?);
                    done += 1;
                }
                Ok(done)
            })?,
        ));
        join_stages(stages, stop)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_graph_settles_after_the_delay_drains() {
        let inputs = [1, 2, 3, 4, 5].repeat(3);
        assert_eq!(run_numeric(&inputs).unwrap(), vec![11, 21, 11, 21, 11, 42]);
    }

    #[test]
    fn numeric_graph_ignores_partial_period() {
        assert_eq!(run_numeric(&[1, 2, 3, 4, 5, 6, 7]).unwrap(), vec![11, 21]);
        assert!(run_numeric(&[]).unwrap().is_empty());
    }

    #[test]
    fn feedback_graph_consumes_its_preload_first() {
        let inputs = [1, 2, 3, 4].repeat(2);
        assert_eq!(
            run_feedback(&inputs).unwrap(),
            vec![3, 4, 5, 7, 8, 9, 15, 16, 17, 19, 20, 21]
        );
    }

    #[test]
    fn image_graph_schedule_covers_every_pixel() {
        let img = RgbImage::new(3, 2, vec![0; 18]).unwrap();
        let (graph, schedule) =
            image_graph(ImageSequence::new(vec![img]).unwrap(), Quantizer::SIXTEEN, |_| {}).unwrap();
        let plan = Plan::compile(&graph, &schedule).unwrap();
        assert_eq!(schedule.len(), 2 * (1 + 3 + 3 + 1));
        assert_eq!(plan.repetitions_of(crate::graph::ActorId(1)), 6);
    }
}
