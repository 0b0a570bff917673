//! Synchronous dataflow kernel.
//!
//! Fixed-rate [`actor`]s exchange tokens through bounded [`channel`]s owned
//! by a [`graph`]. A hand-written [`plan::Schedule`] is validated once by
//! [`plan::Plan::compile`] and then executed by [`rt::Runtime`]. The same
//! stage logic also runs as threads joined by blocking [`queue`]s, or by a
//! flag-gated shared-memory [`handoff`].

pub mod actor;
pub mod channel;
pub mod config;
pub mod control;
pub mod dsl;
pub mod graph;
pub mod handoff;
#[doc(hidden)]
pub mod harness;
pub mod image;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod mealy;
pub mod pipelines;
pub mod plan;
pub mod ppm;
pub mod queue;
pub mod rt;
pub mod stages;

use std::fmt;

/// Any error the crate can raise, for code driving whole pipelines.
#[derive(Debug)]
pub enum SdfError {
    /// Channel allocation or access.
    Channel(channel::ChannelError),
    /// Actor declaration or firing.
    Actor(actor::ActorError),
    /// Graph construction.
    Graph(graph::GraphError),
    /// Graph builder.
    Dsl(dsl::DslError),
    /// Schedule validation.
    Schedule(plan::ScheduleError),
    /// Plan execution.
    Runtime(rt::RuntimeError),
    /// Task queue.
    Queue(queue::QueueError),
    /// Shared-memory handoff.
    Handoff(handoff::HandoffError),
    /// Image construction.
    Image(image::ImageError),
    /// Quantizer configuration.
    Quantizer(stages::QuantizerError),
    /// PPM parsing or writing.
    Format(ppm::FormatError),
    /// Thread or console I/O.
    Io(std::io::Error),
    /// A pipeline stage thread panicked.
    StagePanicked(String),
}

impl fmt::Display for SdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdfError::Channel(e) => write!(f, "channel: {e}"),
            SdfError::Actor(e) => write!(f, "actor: {e}"),
            SdfError::Graph(e) => write!(f, "graph: {e}"),
            SdfError::Dsl(e) => write!(f, "graph builder: {e}"),
            SdfError::Schedule(e) => write!(f, "schedule: {e}"),
            SdfError::Runtime(e) => write!(f, "runtime: {e}"),
            SdfError::Queue(e) => write!(f, "queue: {e}"),
            SdfError::Handoff(e) => write!(f, "handoff: {e}"),
            SdfError::Image(e) => write!(f, "image: {e}"),
            SdfError::Quantizer(e) => write!(f, "quantizer: {e}"),
            SdfError::Format(e) => write!(f, "ppm: {e}"),
            SdfError::Io(e) => write!(f, "i/o: {e}"),
            SdfError::StagePanicked(name) => write!(f, "stage '{name}' panicked"),
        }
    }
}

impl std::error::Error for SdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SdfError::Channel(e) => Some(e),
            SdfError::Actor(e) => Some(e),
            SdfError::Graph(e) => Some(e),
            SdfError::Dsl(e) => Some(e),
            SdfError::Schedule(e) => Some(e),
            SdfError::Runtime(e) => Some(e),
            SdfError::Queue(e) => Some(e),
            SdfError::Handoff(e) => Some(e),
            SdfError::Image(e) => Some(e),
            SdfError::Quantizer(e) => Some(e),
            SdfError::Format(e) => Some(e),
            SdfError::Io(e) => Some(e),
            SdfError::StagePanicked(_) => None,
        }
    }
}

macro_rules! from_error {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(impl From<$ty> for SdfError {
            fn from(e: $ty) -> Self {
                SdfError::$variant(e)
            }
        })*
    };
}

from_error!(
    Channel(channel::ChannelError),
    Actor(actor::ActorError),
    Graph(graph::GraphError),
    Dsl(dsl::DslError),
    Schedule(plan::ScheduleError),
    Runtime(rt::RuntimeError),
    Queue(queue::QueueError),
    Handoff(handoff::HandoffError),
    Image(image::ImageError),
    Quantizer(stages::QuantizerError),
    Format(ppm::FormatError),
    Io(std::io::Error),
);
