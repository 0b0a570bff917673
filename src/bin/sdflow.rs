//! # sdflow
//!
//! Command-line front end: renders PPM images as ASCII art under any of the
//! three pipeline regimes, feeds integers through the numeric SDF graphs and
//! converts PPM images to grayscale.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, LevelFilter};
use sdflow::config::PipelineConfig;
use sdflow::control::StopSignal;
use sdflow::handoff::WaitStrategy;
use sdflow::image::{AsciiArt, ImageSequence};
use sdflow::pipelines::{self, PipelineReport};
use sdflow::ppm::{read_ppm_file, write_ppm_file, PpmImage};
use sdflow::stages::{gray_image, Quantizer};
use sdflow::SdfError;

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Synchronous dataflow pipelines: ASCII art, numeric graphs, grayscale")]
struct Cli {
    /// Enable debug log messages
    #[arg(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: CommandArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// One SDF graph driven by the static scheduler
    Graph,
    /// Three threads joined by task queues
    Tasks,
    /// Three threads joined by a shared-memory handoff
    Multicore,
}

#[derive(Debug, Subcommand)]
enum CommandArg {
    /// Render plain PPM images as ASCII art, cycling through them.
    Ascii {
        /// Input images; all must have the same size.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Pipeline regime.
        #[arg(short, long, value_enum, default_value_t = Mode::Graph)]
        mode: Mode,

        /// Quantizer granularity: 16 (over 256) or 15 (over 255).
        #[arg(long, default_value_t = 16)]
        levels: u16,

        /// Frames to render; runs until killed if omitted.
        #[arg(short, long)]
        frames: Option<u64>,

        /// Period of the first stage in milliseconds.
        #[arg(long, default_value_t = 0)]
        period_ms: u64,

        /// Task queue capacity.
        #[arg(long, default_value_t = sdflow::queue::DEFAULT_TASK_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Halve the image in the middle stage (multicore only).
        #[arg(long)]
        resize: bool,

        /// Busy-wait on handoff flags instead of parking (multicore only).
        #[arg(long)]
        spin: bool,
    },
    /// Read integers from stdin and run them through the numeric graph,
    /// five per period.
    Numeric,
    /// Read integers from stdin and run them through the delay-loop graph,
    /// four per period.
    Feedback,
    /// Convert a plain PPM image to grayscale.
    Gray {
        /// Input image.
        input: PathBuf,

        /// Output image.
        output: PathBuf,
    },
}

/// Install env_logger at info, or debug with `--debug`.
fn setup_logger(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::builder()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

fn read_integers() -> Result<Vec<i32>, SdfError> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;
    text.split_whitespace()
        .map(|word| {
            word.parse::<i32>().map_err(|e| {
                SdfError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("'{word}': {e}"),
                ))
            })
        })
        .collect()
}

fn print_tokens(tokens: &[i32], per_line: usize) -> Result<(), SdfError> {
    let mut out = io::stdout().lock();
    for line in tokens.chunks(per_line) {
        let words: Vec<String> = line.iter().map(i32::to_string).collect();
        writeln!(out, "{}", words.join(" "))?;
    }
    Ok(())
}

fn print_frame(art: AsciiArt) {
    let mut out = io::stdout().lock();
    if let Err(e) = writeln!(out, "{art}") {
        error!("writing frame: {e}");
    }
}

fn ascii(
    paths: &[PathBuf],
    mode: Mode,
    frames: Option<u64>,
    config: &PipelineConfig,
) -> Result<PipelineReport, SdfError> {
    let images = paths
        .iter()
        .map(|p| read_ppm_file(p)?.to_rgb())
        .collect::<Result<Vec<_>, _>>()?;
    let images = ImageSequence::new(images)?;
    info!(
        "{} image(s) of {}x{}",
        images.len(),
        images.width(),
        images.height()
    );

    let stop = StopSignal::new();
    match mode {
        Mode::Graph => pipelines::run_graph(images, config, frames, &stop, print_frame),
        Mode::Tasks => pipelines::run_tasks(images, config, frames, &stop, print_frame),
        Mode::Multicore => pipelines::run_multicore(images, config, frames, &stop, print_frame),
    }
}

fn gray(input: &Path, output: &Path) -> Result<(), SdfError> {
    let rgb = read_ppm_file(input)?.to_rgb()?;
    let gray = gray_image(&rgb)?;
    write_ppm_file(output, &PpmImage::from_gray(&gray))?;
    info!("wrote {}", output.display());
    Ok(())
}

fn run(cli: Cli) -> Result<(), SdfError> {
    match cli.command {
        CommandArg::Ascii {
            images,
            mode,
            levels,
            frames,
            period_ms,
            queue_capacity,
            resize,
            spin,
        } => {
            let config = PipelineConfig::default()
                .with_quantizer(Quantizer::for_levels(levels)?)
                .with_queue_capacity(queue_capacity)
                .with_period(Duration::from_millis(period_ms))
                .with_wait(if spin {
                    WaitStrategy::Spin
                } else {
                    WaitStrategy::Park
                })
                .with_resize(resize);
            let report = ascii(&images, mode, frames, &config)?;
            info!("{} frames rendered", report.frames);
            Ok(())
        }
        CommandArg::Numeric => print_tokens(&pipelines::run_numeric(&read_integers()?)?, 2),
        CommandArg::Feedback => print_tokens(&pipelines::run_feedback(&read_integers()?)?, 3),
        CommandArg::Gray { input, output } => gray(&input, &output),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logger(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
