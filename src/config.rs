//! Pipeline configuration.

use crate::handoff::WaitStrategy;
use crate::queue::DEFAULT_TASK_QUEUE_CAPACITY;
use crate::stages::Quantizer;
use std::time::Duration;

/// Settings shared by the graph, task and multi-core image pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// ASCII quantization granularity.
    pub quantizer: Quantizer,
    /// Capacity of the queues between tasks.
    pub queue_capacity: usize,
    /// Period of the first stage; zero runs as fast as the stages allow.
    pub period: Duration,
    /// How multi-core stages wait on handoff flags.
    pub wait: WaitStrategy,
    /// Halve the image in the middle stage of the multi-core pipeline.
    pub resize: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quantizer: Quantizer::SIXTEEN,
            queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            period: Duration::ZERO,
            wait: WaitStrategy::Park,
            resize: false,
        }
    }
}

impl PipelineConfig {
    /// Set the quantizer.
    pub fn with_quantizer(mut self, quantizer: Quantizer) -> Self {
        self.quantizer = quantizer;
        self
    }

    /// Set the task queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the pacing period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set the handoff wait strategy.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Enable or disable the middle-stage downscale.
    pub fn with_resize(mut self, resize: bool) -> Self {
        self.resize = resize;
        self
    }
}
