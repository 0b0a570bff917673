//! RT module: executes a compiled plan firing by firing.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::actor::{Actor, ActorError};
use crate::channel::{downcast_ref, AnyChannel, Channel, Token};
use crate::control::StopSignal;
use crate::graph::{ActorId, EdgeId, Graph};
use crate::plan::Plan;
use log::trace;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Errors raised while running a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// An actor refused to fire.
    Fire {
        /// Step index within the period.
        step: usize,
        /// Actor fired.
        actor: ActorId,
        /// Cause.
        source: ActorError,
    },
    /// A transfer function panicked; no channel was modified.
    ActorPanicked {
        /// Step index within the period.
        step: usize,
        /// Actor fired.
        actor: ActorId,
        /// Panic payload, when it was a string.
        message: String,
    },
    /// The plan was compiled for a different graph.
    PlanMismatch,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Fire {
                step,
                actor,
                source,
            } => write!(f, "step {step}: {actor} failed to fire: {source}"),
            RuntimeError::ActorPanicked {
                step,
                actor,
                message,
            } => write!(f, "step {step}: {actor} panicked: {message}"),
            RuntimeError::PlanMismatch => write!(f, "plan does not match graph"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Fire { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Summary of a bounded or interrupted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Periods completed.
    pub periods: u64,
    /// Individual firings executed.
    pub firings: u64,
    /// True if the stop signal ended the run.
    pub stopped: bool,
}

/// The runtime engine. Owns the graph's actors and channels.
pub struct Runtime {
    /// The plan being executed.
    pub plan: Plan,
    actors: Vec<Box<dyn Actor>>,
    channels: Vec<Option<Box<dyn AnyChannel>>>,
    temp_inputs: Vec<Box<dyn AnyChannel>>,
    temp_outputs: Vec<Box<dyn AnyChannel>>,
    cursor: usize,
    periods: u64,
    firings: u64,
}

impl Runtime {
    /// Create a runtime from a graph and a plan compiled for it.
    pub fn new(graph: Graph, plan: Plan) -> Result<Self, RuntimeError> {
        let (actors, _edges, channels) = graph.into_parts();
        let matches = plan.actor_inputs.len() == actors.len()
            && plan.initial.len() == channels.len()
            && plan
                .initial
                .iter()
                .zip(&channels)
                .all(|(&n, ch)| n == ch.len());
        if !matches {
            return Err(RuntimeError::PlanMismatch);
        }
        let arity = |edges: &[Vec<EdgeId>]| edges.iter().map(Vec::len).max().unwrap_or(0);
        let temp_inputs = Vec::with_capacity(arity(&plan.actor_inputs));
        let temp_outputs = Vec::with_capacity(arity(&plan.actor_outputs));
        Ok(Self {
            plan,
            actors,
            channels: channels.into_iter().map(Some).collect(),
            temp_inputs,
            temp_outputs,
            cursor: 0,
            periods: 0,
            firings: 0,
        })
    }

    /// Finish the current period (a whole one unless a previous run was
    /// interrupted mid-period).
    pub fn run_period(&mut self) -> Result<(), RuntimeError> {
        while self.cursor < self.plan.schedule.len() {
            self.fire_step(self.cursor)?;
        }
        self.cursor = 0;
        self.periods += 1;
        Ok(())
    }

    /// Run `n` periods.
    pub fn run_periods(&mut self, n: u64) -> Result<RunReport, RuntimeError> {
        self.run(Some(n), &StopSignal::new())
    }

    /// Run until `stop` is raised, checking it before every firing.
    pub fn run_until_stopped(&mut self, stop: &StopSignal) -> Result<RunReport, RuntimeError> {
        self.run(None, stop)
    }

    /// Run at most `limit` periods (unbounded for `None`), honouring `stop`
    /// between firings.
    pub fn run(&mut self, limit: Option<u64>, stop: &StopSignal) -> Result<RunReport, RuntimeError> {
        let (periods, firings) = (self.periods, self.firings);
        let report = |rt: &Self, stopped| RunReport {
            periods: rt.periods - periods,
            firings: rt.firings - firings,
            stopped,
        };
        loop {
            if limit.is_some_and(|n| self.periods - periods >= n) {
                return Ok(report(self, false));
            }
            while self.cursor < self.plan.schedule.len() {
                if stop.is_stopped() {
                    trace!("stop observed at step {}", self.cursor);
                    return Ok(report(self, true));
                }
                self.fire_step(self.cursor)?;
            }
            self.cursor = 0;
            self.periods += 1;
        }
    }

    fn fire_step(&mut self, step: usize) -> Result<(), RuntimeError> {
        let actor = self.plan.schedule.steps()[step];
        let inputs = &self.plan.actor_inputs[actor.0];
        let outputs = &self.plan.actor_outputs[actor.0];
        if inputs
            .iter()
            .chain(outputs)
            .any(|e| self.channels[e.0].is_none())
        {
            return Err(RuntimeError::PlanMismatch);
        }

        // Borrow the channels out of their slots for the duration of the firing.
        self.temp_inputs
            .extend(inputs.iter().filter_map(|e| self.channels[e.0].take()));
        self.temp_outputs
            .extend(outputs.iter().filter_map(|e| self.channels[e.0].take()));

        let def = &mut self.actors[actor.0];
        let (ins, outs) = (&mut self.temp_inputs, &mut self.temp_outputs);
        let result = catch_unwind(AssertUnwindSafe(|| def.fire(ins, outs)));

        for (e, ch) in inputs.iter().zip(self.temp_inputs.drain(..)) {
            self.channels[e.0] = Some(ch);
        }
        for (e, ch) in outputs.iter().zip(self.temp_outputs.drain(..)) {
            self.channels[e.0] = Some(ch);
        }

        match result {
            Ok(Ok(())) => {
                trace!("step {step}: fired {}", self.actors[actor.0].name());
                self.cursor = step + 1;
                self.firings += 1;
                Ok(())
            }
            Ok(Err(source)) => Err(RuntimeError::Fire {
                step,
                actor,
                source,
            }),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                Err(RuntimeError::ActorPanicked {
                    step,
                    actor,
                    message,
                })
            }
        }
    }

    /// Typed view of an edge's channel.
    pub fn channel<T: Token>(&self, edge: EdgeId) -> Option<&Channel<T>> {
        self.channels
            .get(edge.0)
            .and_then(|c| c.as_deref())
            .and_then(downcast_ref::<T>)
    }

    /// Write current per-edge occupancy into `out`.
    pub fn occupancy_into(&self, out: &mut Vec<usize>) {
        out.clear();
        out.extend(
            self.channels
                .iter()
                .map(|c| c.as_ref().map_or(0, |c| c.len())),
        );
    }

    /// Current per-edge occupancy.
    pub fn occupancy(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.channels.len());
        self.occupancy_into(&mut out);
        out
    }

    /// Completed periods.
    pub fn periods(&self) -> u64 {
        self.periods
    }

    /// Next step to fire within the current period.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Actor by id.
    pub fn actor(&self, id: ActorId) -> Option<&dyn Actor> {
        self.actors.get(id.0).map(|a| a.as_ref())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("schedule", &self.plan.schedule)
            .field("cursor", &self.cursor)
            .field("periods", &self.periods)
            .field("occupancy", &self.occupancy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor11, Sink, Source};
    use crate::graph::PortId;
    use crate::plan::Schedule;
    use std::sync::{Arc, Mutex};

    fn chain(collected: Arc<Mutex<Vec<i32>>>) -> (Graph, Schedule) {
        let mut graph = Graph::new();
        let mut n = 0;
        let src = graph.add_actor(
            Source::new("src", 1, move |o: &mut Vec<i32>| {
                n += 1;
                o.push(n);
            })
            .unwrap(),
        );
        let sq = graph.add_actor(
            Actor11::new("square", 1, 1, |i: &[i32], o: &mut Vec<i32>| o.push(i[0] * i[0])).unwrap(),
        );
        let sink = graph.add_actor(
            Sink::new("sink", 1, move |t: &[i32]| collected.lock().unwrap().push(t[0])).unwrap(),
        );
        graph.connect::<i32>(src, PortId(0), sq, PortId(0), 1).unwrap();
        graph.connect::<i32>(sq, PortId(0), sink, PortId(0), 1).unwrap();
        (graph, Schedule::new([src, sq, sink]))
    }

    #[test]
    fn rt_honors_edges() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let (graph, schedule) = chain(collected.clone());
        let plan = Plan::compile(&graph, &schedule).unwrap();
        let mut runtime = Runtime::new(graph, plan).unwrap();
        let report = runtime.run_periods(3).unwrap();
        assert_eq!(report.periods, 3);
        assert_eq!(report.firings, 9);
        assert_eq!(*collected.lock().unwrap(), vec![1, 4, 9]);
        assert_eq!(runtime.occupancy(), vec![0, 0]);
    }

    #[test]
    fn rt_determinism() {
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        for out in [&a, &b] {
            let (graph, schedule) = chain(out.clone());
            let plan = Plan::compile(&graph, &schedule).unwrap();
            Runtime::new(graph, plan).unwrap().run_periods(5).unwrap();
        }
        assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
    }

    #[test]
    fn rt_rejects_foreign_plan() {
        let (graph, schedule) = chain(Arc::default());
        let plan = Plan::compile(&graph, &schedule).unwrap();
        let mut other = Graph::new();
        other.add_actor(Source::new("lonely", 1, |o: &mut Vec<i32>| o.push(0)).unwrap());
        assert_eq!(
            Runtime::new(other, plan).err(),
            Some(RuntimeError::PlanMismatch)
        );
    }

    #[test]
    fn rt_contains_panics_without_touching_channels() {
        let mut graph = Graph::new();
        let src = graph.add_actor(Source::new("src", 1, |o: &mut Vec<i32>| o.push(7)).unwrap());
        let boom = graph.add_actor(
            Actor11::new("boom", 1, 1, |_: &[i32], _: &mut Vec<i32>| panic!("boom")).unwrap(),
        );
        let sink = graph.add_actor(Sink::new("sink", 1, |_: &[i32]| {}).unwrap());
        let e = graph.connect::<i32>(src, PortId(0), boom, PortId(0), 1).unwrap();
        graph.connect::<i32>(boom, PortId(0), sink, PortId(0), 1).unwrap();
        let plan = Plan::compile(&graph, &Schedule::new([src, boom, sink])).unwrap();
        let mut runtime = Runtime::new(graph, plan).unwrap();
        match runtime.run_period() {
            Err(RuntimeError::ActorPanicked { step, actor, message }) => {
                assert_eq!((step, actor, message.as_str()), (1, boom, "boom"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(runtime.channel::<i32>(e).map(|c| c.len()), Some(1));
        assert_eq!(runtime.position(), 1);
    }

    #[test]
    fn rt_stops_between_firings() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let mut graph = Graph::new();
        let mut fired = 0;
        let src = graph.add_actor(
            Source::new("src", 1, move |o: &mut Vec<i32>| {
                fired += 1;
                if fired == 2 {
                    remote.stop();
                }
                o.push(fired);
            })
            .unwrap(),
        );
        let sink = graph.add_actor(Sink::new("sink", 1, |_: &[i32]| {}).unwrap());
        graph.connect::<i32>(src, PortId(0), sink, PortId(0), 1).unwrap();
        let plan = Plan::compile(&graph, &Schedule::new([src, sink])).unwrap();
        let mut runtime = Runtime::new(graph, plan).unwrap();
        let report = runtime.run_until_stopped(&stop).unwrap();
        assert!(report.stopped);
        assert_eq!(report.periods, 1);
        assert_eq!(report.firings, 3);
        assert_eq!(runtime.position(), 1);
        assert_eq!(runtime.occupancy(), vec![1]);
    }
}
