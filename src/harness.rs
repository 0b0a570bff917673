//! Occupancy harness: runs a plan period by period and records channel fill.

use crate::graph::Graph;
use crate::plan::{Plan, Schedule};
use crate::rt::{Runtime, RuntimeError};
use crate::SdfError;

/// Runs a compiled graph and keeps the per-edge occupancy seen at every
/// period boundary, starting with the preloaded state.
pub struct OccupancyHarness {
    runtime: Runtime,
    history: Vec<Vec<usize>>,
}

impl OccupancyHarness {
    /// Compile `schedule` for `graph` and record the initial occupancy.
    pub fn new(graph: Graph, schedule: &Schedule) -> Result<Self, SdfError> {
        let plan = Plan::compile(&graph, schedule)?;
        let runtime = Runtime::new(graph, plan)?;
        let history = vec![runtime.occupancy()];
        Ok(Self { runtime, history })
    }

    /// Run `periods` periods, recording occupancy after each.
    pub fn run(&mut self, periods: usize) -> Result<(), RuntimeError> {
        for _ in 0..periods {
            self.runtime.run_period()?;
            self.history.push(self.runtime.occupancy());
        }
        Ok(())
    }

    /// Occupancy snapshots, one per completed period plus the initial one.
    pub fn history(&self) -> &[Vec<usize>] {
        &self.history
    }

    /// True if every recorded boundary matches the initial occupancy.
    pub fn is_balanced(&self) -> bool {
        self.history.windows(2).all(|w| w[0] == w[1])
    }

    /// The runtime under test.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}
