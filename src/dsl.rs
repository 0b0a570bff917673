//! DSL module: builder API for graphs with named actors.
//!
//! Actors are registered under their [`Actor::name`], edges are written as
//! `("actor", port)` pairs, and schedules are constant lists of names.

use crate::actor::Actor;
use crate::channel::Token;
use crate::graph::{ActorId, EdgeId, Graph, GraphError, PortId};
use crate::plan::Schedule;
use std::collections::HashMap;
use std::fmt;

/// An actor port addressed by actor name.
pub type Endpoint<'a> = (&'a str, usize);

/// The graph builder.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    names: HashMap<String, ActorId>,
}

impl GraphBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an actor under its own name.
    pub fn actor<A: Actor + 'static>(&mut self, actor: A) -> Result<ActorId, DslError> {
        let name = actor.name().to_string();
        if self.names.contains_key(&name) {
            return Err(DslError::DuplicateName(name));
        }
        let id = self.graph.add_actor(actor);
        self.names.insert(name, id);
        Ok(id)
    }

    /// Id of a named actor.
    pub fn id(&self, name: &str) -> Result<ActorId, DslError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| DslError::MissingActor(name.to_string()))
    }

    /// Connect two named ports.
    pub fn connect<T: Token>(
        &mut self,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        capacity: usize,
    ) -> Result<EdgeId, DslError> {
        self.delay::<T>(from, to, capacity, &[])
    }

    /// Connect two named ports through a preloaded channel.
    pub fn delay<T: Token>(
        &mut self,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        capacity: usize,
        preload: &[T],
    ) -> Result<EdgeId, DslError> {
        let (src, dst) = (self.id(from.0)?, self.id(to.0)?);
        Ok(self.graph.delay::<T>(
            src,
            PortId(from.1),
            dst,
            PortId(to.1),
            capacity,
            preload,
        )?)
    }

    /// Schedule from a list of actor names.
    pub fn schedule(&self, names: &[&str]) -> Result<Schedule, DslError> {
        names.iter().map(|n| self.id(n)).collect()
    }

    /// Graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Build the graph, checking every port is connected.
    pub fn build(self) -> Result<Graph, DslError> {
        self.graph.validate()?;
        Ok(self.graph)
    }
}

/// DSL-specific errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DslError {
    /// Underlying graph error.
    Graph(GraphError),
    /// No actor with this name.
    MissingActor(String),
    /// Two actors share a name.
    DuplicateName(String),
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DslError::Graph(e) => write!(f, "{e}"),
            DslError::MissingActor(n) => write!(f, "no actor named '{n}'"),
            DslError::DuplicateName(n) => write!(f, "actor name '{n}' used twice"),
        }
    }
}

impl std::error::Error for DslError {}

impl From<GraphError> for DslError {
    fn from(e: GraphError) -> Self {
        DslError::Graph(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor11, Sink, Source};

    fn source() -> impl Actor {
        Source::new("src", 1, |o: &mut Vec<i32>| o.push(1)).unwrap()
    }

    fn sink() -> impl Actor {
        Sink::new("sink", 1, |_: &[i32]| {}).unwrap()
    }

    #[test]
    fn dsl_equivalence() {
        let mut builder = GraphBuilder::new();
        builder.actor(source()).unwrap();
        builder.actor(sink()).unwrap();
        builder.connect::<i32>(("src", 0), ("sink", 0), 1).unwrap();
        let schedule = builder.schedule(&["src", "sink"]).unwrap();
        let dsl_graph = builder.build().unwrap();

        let mut manual_graph = Graph::new();
        let a = manual_graph.add_actor(source());
        let b = manual_graph.add_actor(sink());
        manual_graph
            .connect::<i32>(a, PortId(0), b, PortId(0), 1)
            .unwrap();

        assert_eq!(dsl_graph.actor_count(), manual_graph.actor_count());
        assert_eq!(dsl_graph.edges(), manual_graph.edges());
        assert_eq!(schedule, Schedule::new([a, b]));
    }

    #[test]
    fn ui_tests() {
        let mut builder = GraphBuilder::new();
        builder.actor(source()).unwrap();
        assert_eq!(
            builder.actor(source()).unwrap_err(),
            DslError::DuplicateName("src".into())
        );
        builder
            .actor(Actor11::new("neg", 1, 1, |i: &[f64], o: &mut Vec<f64>| o.push(-i[0])).unwrap())
            .unwrap();
        assert!(matches!(
            builder.connect::<i32>(("src", 0), ("neg", 0), 1),
            Err(DslError::Graph(GraphError::TokenTypeMismatch { .. }))
        ));
        assert_eq!(
            builder.schedule(&["src", "nope"]).unwrap_err(),
            DslError::MissingActor("nope".into())
        );
        assert!(matches!(
            builder.build(),
            Err(DslError::Graph(GraphError::UnconnectedPort { .. }))
        ));
    }
}
