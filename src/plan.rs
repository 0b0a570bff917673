//! Plan module: static schedules and their validation against a graph.
//!
//! Schedules are written by hand (a constant list of firings per period) and
//! never derived. Compiling one simulates channel occupancy through a full
//! period, so every underflow, overflow or imbalance is found before the
//! first token moves.

use crate::graph::{ActorId, EdgeId, Graph, GraphError};
use crate::invariant_ppt::{
    assert_invariant, SCHEDULE_ADMISSIBLE, SCHEDULE_BALANCED, SCHEDULE_REJECTS_INVALID,
};
use log::debug;
use std::fmt;

/// One period of actor firings, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    steps: Vec<ActorId>,
}

impl Schedule {
    /// Schedule from an explicit firing list.
    pub fn new(steps: impl Into<Vec<ActorId>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// Append one firing.
    pub fn then(mut self, actor: ActorId) -> Self {
        self.steps.push(actor);
        self
    }

    /// Append `n` consecutive firings of `actor`.
    pub fn then_n(mut self, actor: ActorId, n: usize) -> Self {
        self.steps.extend(std::iter::repeat(actor).take(n));
        self
    }

    /// Repeat the whole sequence `n` times.
    pub fn repeat(self, n: usize) -> Self {
        let steps = self.steps.repeat(n);
        Self { steps }
    }

    /// Firings in order.
    pub fn steps(&self) -> &[ActorId] {
        &self.steps
    }

    /// Firings per period.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for a schedule without firings.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<ActorId> for Schedule {
    fn from_iter<I: IntoIterator<Item = ActorId>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", a.0)?;
        }
        Ok(())
    }
}

/// Errors during schedule validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// The schedule has no firings.
    Empty,
    /// A step names an actor that is not in the graph.
    InvalidActor {
        /// Step index.
        step: usize,
        /// Offending id.
        actor: ActorId,
    },
    /// The graph itself is incomplete.
    Wiring(GraphError),
    /// A firing would find too few tokens.
    Underflow {
        /// Step index.
        step: usize,
        /// Actor fired.
        actor: ActorId,
        /// Input edge.
        edge: EdgeId,
        /// Declared consumption.
        required: usize,
        /// Tokens present at that step.
        available: usize,
    },
    /// A firing would exceed a channel's capacity.
    Overflow {
        /// Step index.
        step: usize,
        /// Actor fired.
        actor: ActorId,
        /// Output edge.
        edge: EdgeId,
        /// Declared production.
        required: usize,
        /// Free slots at that step.
        free: usize,
    },
    /// A channel does not return to its starting occupancy after a period.
    Unbalanced {
        /// Edge concerned.
        edge: EdgeId,
        /// Occupancy at period start.
        before: usize,
        /// Occupancy at period end.
        after: usize,
    },
    /// An actor never fires in the period.
    ActorNeverFires(ActorId),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Empty => write!(f, "schedule has no firings"),
            ScheduleError::InvalidActor { step, actor } => {
                write!(f, "step {step}: {actor} does not exist")
            }
            ScheduleError::Wiring(e) => write!(f, "graph is incomplete: {e}"),
            ScheduleError::Underflow {
                step,
                actor,
                edge,
                required,
                available,
            } => write!(
                f,
                "step {step}: {actor} needs {required} tokens on {edge}, {available} available"
            ),
            ScheduleError::Overflow {
                step,
                actor,
                edge,
                required,
                free,
            } => write!(
                f,
                "step {step}: {actor} produces {required} tokens on {edge}, {free} slots free"
            ),
            ScheduleError::Unbalanced {
                edge,
                before,
                after,
            } => write!(
                f,
                "{edge} holds {after} tokens after one period, {before} before"
            ),
            ScheduleError::ActorNeverFires(actor) => {
                write!(f, "{actor} never fires in the schedule")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<GraphError> for ScheduleError {
    fn from(e: GraphError) -> Self {
        ScheduleError::Wiring(e)
    }
}

/// The compiled plan: a schedule proven admissible and balanced for a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Firing order for one period.
    pub schedule: Schedule,
    /// Input edges per actor, in port order.
    pub actor_inputs: Vec<Vec<EdgeId>>,
    /// Output edges per actor, in port order.
    pub actor_outputs: Vec<Vec<EdgeId>>,
    /// Occupancy per edge at every period boundary.
    pub initial: Vec<usize>,
    /// Highest occupancy per edge during a period.
    pub peaks: Vec<usize>,
    /// Firings per actor in one period.
    pub repetitions: Vec<usize>,
}

impl Plan {
    /// Validate `schedule` against `graph`.
    pub fn compile(graph: &Graph, schedule: &Schedule) -> Result<Self, ScheduleError> {
        if schedule.is_empty() {
            return Err(reject(ScheduleError::Empty));
        }
        graph.validate().map_err(|e| reject(e.into()))?;

        let actors = graph.actor_count();
        let edges = graph.edges();
        let actor_inputs: Vec<Vec<EdgeId>> =
            (0..actors).map(|a| graph.input_edges(ActorId(a))).collect();
        let actor_outputs: Vec<Vec<EdgeId>> =
            (0..actors).map(|a| graph.output_edges(ActorId(a))).collect();

        let initial: Vec<usize> = edges.iter().map(|e| e.delay).collect();
        let mut occupancy = initial.clone();
        let mut peaks = initial.clone();
        let mut repetitions = vec![0; actors];

        for (step, &actor) in schedule.steps().iter().enumerate() {
            let def = graph
                .actor(actor)
                .ok_or_else(|| reject(ScheduleError::InvalidActor { step, actor }))?;
            let rates = def.rates();

            for (port, &edge) in actor_inputs[actor.0].iter().enumerate() {
                let required = rates.inputs[port].rate;
                let available = occupancy[edge.0];
                if available < required {
                    return Err(reject(ScheduleError::Underflow {
                        step,
                        actor,
                        edge,
                        required,
                        available,
                    }));
                }
            }
            for (port, &edge) in actor_outputs[actor.0].iter().enumerate() {
                let required = rates.outputs[port].rate;
                let free = edges[edge.0].capacity - occupancy[edge.0];
                if free < required {
                    return Err(reject(ScheduleError::Overflow {
                        step,
                        actor,
                        edge,
                        required,
                        free,
                    }));
                }
            }

            for (port, &edge) in actor_inputs[actor.0].iter().enumerate() {
                occupancy[edge.0] -= rates.inputs[port].rate;
            }
            for (port, &edge) in actor_outputs[actor.0].iter().enumerate() {
                occupancy[edge.0] += rates.outputs[port].rate;
                peaks[edge.0] = peaks[edge.0].max(occupancy[edge.0]);
            }
            repetitions[actor.0] += 1;
        }

        assert_invariant(
            SCHEDULE_ADMISSIBLE,
            occupancy
                .iter()
                .zip(edges)
                .all(|(&occ, e)| occ <= e.capacity),
            "Every firing found its tokens and room",
            Some("Plan::compile"),
        );

        if let Some((i, (&before, &after))) = initial
            .iter()
            .zip(&occupancy)
            .enumerate()
            .find(|(_, (b, a))| b != a)
        {
            return Err(reject(ScheduleError::Unbalanced {
                edge: EdgeId(i),
                before,
                after,
            }));
        }
        if let Some(idle) = repetitions.iter().position(|&r| r == 0) {
            return Err(reject(ScheduleError::ActorNeverFires(ActorId(idle))));
        }

        assert_invariant(
            SCHEDULE_BALANCED,
            initial == occupancy,
            "Occupancy returns to its start after one period",
            Some("Plan::compile"),
        );
        debug!(
            "plan compiled: {} firings per period, repetitions {:?}, peaks {:?}",
            schedule.len(),
            repetitions,
            peaks
        );

        Ok(Self {
            schedule: schedule.clone(),
            actor_inputs,
            actor_outputs,
            initial,
            peaks,
            repetitions,
        })
    }

    /// Peak occupancy of an edge, the smallest capacity that would still work.
    pub fn peak(&self, edge: EdgeId) -> Option<usize> {
        self.peaks.get(edge.0).copied()
    }

    /// Firings of `actor` per period.
    pub fn repetitions_of(&self, actor: ActorId) -> usize {
        self.repetitions.get(actor.0).copied().unwrap_or(0)
    }
}

fn reject(err: ScheduleError) -> ScheduleError {
    assert_invariant(
        SCHEDULE_REJECTS_INVALID,
        true,
        "Inadmissible schedule rejected",
        Some("Plan::compile"),
    );
    debug!("schedule rejected: {err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor11, Sink, Source};
    use crate::graph::PortId;

    /// src(2) -> avg(2:1) -> sink(1)
    fn averaging_graph() -> (Graph, [ActorId; 3]) {
        let mut graph = Graph::new();
        let src = graph.add_actor(
            Source::new("src", 2, |o: &mut Vec<i32>| o.extend([1, 3])).unwrap(),
        );
        let avg = graph.add_actor(
            Actor11::new("avg", 2, 1, |i: &[i32], o: &mut Vec<i32>| o.push((i[0] + i[1]) / 2))
                .unwrap(),
        );
        let sink = graph.add_actor(Sink::new("sink", 1, |_: &[i32]| {}).unwrap());
        graph.connect::<i32>(src, PortId(0), avg, PortId(0), 2).unwrap();
        graph.connect::<i32>(avg, PortId(0), sink, PortId(0), 1).unwrap();
        (graph, [src, avg, sink])
    }

    #[test]
    fn plan_stability() {
        let (graph, [src, avg, sink]) = averaging_graph();
        let schedule = Schedule::new([src, avg, sink]);
        let plan1 = Plan::compile(&graph, &schedule).unwrap();
        let plan2 = Plan::compile(&graph, &schedule).unwrap();
        assert_eq!(plan1, plan2);
        assert_eq!(plan1.peaks, vec![2, 1]);
        assert_eq!(plan1.repetitions, vec![1, 1, 1]);
    }

    #[test]
    fn plan_rejects_underflow() {
        let (graph, [src, avg, sink]) = averaging_graph();
        let err = Plan::compile(&graph, &Schedule::new([avg, src, sink])).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::Underflow {
                step: 0,
                actor: avg,
                edge: EdgeId(0),
                required: 2,
                available: 0
            }
        );
    }

    #[test]
    fn plan_rejects_overflow() {
        let (graph, [src, avg, sink]) = averaging_graph();
        let schedule = Schedule::default().then_n(src, 2).then_n(avg, 2).then_n(sink, 2);
        assert!(matches!(
            Plan::compile(&graph, &schedule),
            Err(ScheduleError::Overflow { step: 1, edge: EdgeId(0), required: 2, free: 0, .. })
        ));
    }

    #[test]
    fn plan_rejects_unbalanced_and_idle() {
        let (graph, [src, avg, _sink]) = averaging_graph();
        assert_eq!(
            Plan::compile(&graph, &Schedule::new([src, avg])),
            Err(ScheduleError::Unbalanced {
                edge: EdgeId(1),
                before: 0,
                after: 1
            })
        );
        assert_eq!(
            Plan::compile(&graph, &Schedule::default()),
            Err(ScheduleError::Empty)
        );
        assert_eq!(
            Plan::compile(&graph, &Schedule::new([src, ActorId(9)])),
            Err(ScheduleError::InvalidActor {
                step: 1,
                actor: ActorId(9)
            })
        );
    }

    #[test]
    fn schedule_builders_compose() {
        let (a, b) = (ActorId(0), ActorId(1));
        let s = Schedule::default().then(a).then_n(b, 2).repeat(2);
        assert_eq!(s.steps(), &[a, b, b, a, b, b]);
        assert_eq!(s.to_string(), "0 1 1 0 1 1");
        let collected: Schedule = [a, b].into_iter().collect();
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn plan_debug_smoke_test() {
        let (graph, [src, avg, sink]) = averaging_graph();
        let plan = Plan::compile(&graph, &Schedule::new([src, avg, sink])).unwrap();
        let debug_str = format!("{:?}", plan);
        assert!(debug_str.contains("schedule"));
        assert!(debug_str.contains("peaks"));
    }
}
