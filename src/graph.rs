//! Graph module: actors joined by point-to-point, bounded token channels.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::actor::{Actor, Direction};
use crate::channel::{downcast_ref, AnyChannel, Channel, ChannelError, Token, TokenType};
use crate::invariant_ppt::{
    assert_invariant, GRAPH_LEGALITY, GRAPH_REJECTS_INVALID, RATES_DECLARED,
};
use log::debug;
use std::fmt;

/// Unique identifier for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub usize);

/// Index of a port on one side of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

/// Unique identifier for an edge (and its channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

/// An edge connecting an output port to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// The producing actor.
    pub from_actor: ActorId,
    /// The producing actor's output port.
    pub from_port: PortId,
    /// The consuming actor.
    pub to_actor: ActorId,
    /// The consuming actor's input port.
    pub to_port: PortId,
    /// Token type carried.
    pub token: TokenType,
    /// Channel capacity in tokens.
    pub capacity: usize,
    /// Tokens preloaded before the first firing.
    pub delay: usize,
}

/// The dataflow graph. Cycles are allowed; a cycle only executes if one
/// of its edges carries enough delay tokens, which plan compilation checks.
pub struct Graph {
    actors: Vec<Box<dyn Actor>>,
    edges: Vec<Edge>,
    channels: Vec<Box<dyn AnyChannel>>,
}

/// Errors that can occur when building the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Actor does not exist.
    InvalidActor(ActorId),
    /// Port index out of bounds.
    InvalidPort {
        /// Actor the port was looked up on.
        actor: ActorId,
        /// Side of the actor.
        direction: Direction,
        /// Requested index.
        port: PortId,
    },
    /// Port and edge token types differ.
    TokenTypeMismatch {
        /// Actor owning the port.
        actor: ActorId,
        /// Side of the actor.
        direction: Direction,
        /// Port type.
        expected: TokenType,
        /// Edge type.
        found: TokenType,
    },
    /// Port already has a connection.
    PortAlreadyConnected {
        /// Actor owning the port.
        actor: ActorId,
        /// Side of the actor.
        direction: Direction,
        /// Port index.
        port: PortId,
    },
    /// An edge from an actor to itself.
    SelfLoop(ActorId),
    /// A declared port has no edge.
    UnconnectedPort {
        /// Actor owning the port.
        actor: ActorId,
        /// Side of the actor.
        direction: Direction,
        /// Port index.
        port: PortId,
    },
    /// Channel could not be created or preloaded.
    Channel(ChannelError),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidActor(id) => write!(f, "{id} does not exist"),
            GraphError::InvalidPort {
                actor,
                direction,
                port,
            } => write!(f, "{actor} has no {direction} port {}", port.0),
            GraphError::TokenTypeMismatch {
                actor,
                direction,
                expected,
                found,
            } => write!(
                f,
                "{actor} {direction} port carries {expected}, edge carries {found}"
            ),
            GraphError::PortAlreadyConnected {
                actor,
                direction,
                port,
            } => write!(f, "{actor} {direction} port {} already connected", port.0),
            GraphError::SelfLoop(id) => write!(f, "{id} cannot feed itself"),
            GraphError::UnconnectedPort {
                actor,
                direction,
                port,
            } => write!(f, "{actor} {direction} port {} is not connected", port.0),
            GraphError::Channel(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<ChannelError> for GraphError {
    fn from(e: ChannelError) -> Self {
        GraphError::Channel(e)
    }
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            actors: Vec::new(),
            edges: Vec::new(),
            channels: Vec::new(),
        }
    }

    /// Add an actor.
    pub fn add_actor<A: Actor + 'static>(&mut self, actor: A) -> ActorId {
        self.add_boxed(Box::new(actor))
    }

    /// Add an already boxed actor.
    pub fn add_boxed(&mut self, actor: Box<dyn Actor>) -> ActorId {
        let id = ActorId(self.actors.len());
        let rates = actor.rates();
        assert_invariant(
            RATES_DECLARED,
            rates.inputs.iter().chain(&rates.outputs).all(|p| p.rate > 0),
            "Every port declares a positive rate",
            Some(actor.name()),
        );
        debug!(
            "add {id} '{}' ({} in, {} out)",
            actor.name(),
            rates.inputs.len(),
            rates.outputs.len()
        );
        self.actors.push(actor);
        id
    }

    /// Connect `from`'s output port to `to`'s input port through a channel
    /// of `capacity` tokens.
    pub fn connect<T: Token>(
        &mut self,
        from: ActorId,
        from_port: PortId,
        to: ActorId,
        to_port: PortId,
        capacity: usize,
    ) -> Result<EdgeId, GraphError> {
        self.delay::<T>(from, from_port, to, to_port, capacity, &[])
    }

    /// Like [`Graph::connect`], seeding the channel with `preload` tokens.
    /// Feedback edges need these to execute.
    pub fn delay<T: Token>(
        &mut self,
        from: ActorId,
        from_port: PortId,
        to: ActorId,
        to_port: PortId,
        capacity: usize,
        preload: &[T],
    ) -> Result<EdgeId, GraphError> {
        let token = TokenType::of::<T>();
        self.check_endpoint(from, Direction::Output, from_port, token)?;
        self.check_endpoint(to, Direction::Input, to_port, token)?;

        if from == to {
            assert_invariant(
                GRAPH_REJECTS_INVALID,
                from == to,
                "Self loop rejected",
                Some("Graph::delay"),
            );
            return Err(GraphError::SelfLoop(from));
        }

        let mut channel = Channel::<T>::new(capacity)?;
        channel.preload(preload)?;

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            from_actor: from,
            from_port,
            to_actor: to,
            to_port,
            token,
            capacity,
            delay: preload.len(),
        });
        self.channels.push(Box::new(channel));

        assert_invariant(
            GRAPH_LEGALITY,
            self.edges.len() == self.channels.len(),
            "Every edge owns exactly one channel",
            Some("Graph::delay"),
        );
        debug!(
            "connect {from}:{} -> {to}:{} as {id} ({token}, capacity {capacity}, delay {})",
            from_port.0,
            to_port.0,
            preload.len()
        );
        Ok(id)
    }

    fn check_endpoint(
        &self,
        actor: ActorId,
        direction: Direction,
        port: PortId,
        token: TokenType,
    ) -> Result<(), GraphError> {
        let def = self
            .actors
            .get(actor.0)
            .ok_or(GraphError::InvalidActor(actor))?;
        let declared = def
            .rates()
            .ports(direction)
            .get(port.0)
            .ok_or(GraphError::InvalidPort {
                actor,
                direction,
                port,
            })?;
        if declared.token != token {
            return Err(GraphError::TokenTypeMismatch {
                actor,
                direction,
                expected: declared.token,
                found: token,
            });
        }
        if self.edge_at(actor, direction, port).is_some() {
            return Err(GraphError::PortAlreadyConnected {
                actor,
                direction,
                port,
            });
        }
        Ok(())
    }

    /// Check that every declared port is connected.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (i, actor) in self.actors.iter().enumerate() {
            let id = ActorId(i);
            for direction in [Direction::Input, Direction::Output] {
                for p in 0..actor.rates().ports(direction).len() {
                    if self.edge_at(id, direction, PortId(p)).is_none() {
                        assert_invariant(
                            GRAPH_REJECTS_INVALID,
                            true,
                            "Unconnected port rejected",
                            Some("Graph::validate"),
                        );
                        return Err(GraphError::UnconnectedPort {
                            actor: id,
                            direction,
                            port: PortId(p),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The edge attached to a port, if any.
    pub fn edge_at(&self, actor: ActorId, direction: Direction, port: PortId) -> Option<EdgeId> {
        self.edges
            .iter()
            .position(|e| match direction {
                Direction::Input => e.to_actor == actor && e.to_port == port,
                Direction::Output => e.from_actor == actor && e.from_port == port,
            })
            .map(EdgeId)
    }

    /// Edges feeding `actor`, in input-port order. Unconnected ports are skipped.
    pub fn input_edges(&self, actor: ActorId) -> Vec<EdgeId> {
        self.port_edges(actor, Direction::Input)
    }

    /// Edges leaving `actor`, in output-port order.
    pub fn output_edges(&self, actor: ActorId) -> Vec<EdgeId> {
        self.port_edges(actor, Direction::Output)
    }

    fn port_edges(&self, actor: ActorId, direction: Direction) -> Vec<EdgeId> {
        let ports = self
            .actors
            .get(actor.0)
            .map_or(0, |a| a.rates().ports(direction).len());
        (0..ports)
            .filter_map(|p| self.edge_at(actor, direction, PortId(p)))
            .collect()
    }

    /// Number of actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Look up an actor.
    pub fn actor(&self, id: ActorId) -> Option<&dyn Actor> {
        self.actors.get(id.0).map(|a| a.as_ref())
    }

    /// All edges, indexed by [`EdgeId`].
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up an edge.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// Type-erased channel of an edge.
    pub fn channel(&self, id: EdgeId) -> Option<&dyn AnyChannel> {
        self.channels.get(id.0).map(|c| c.as_ref())
    }

    /// Typed channel of an edge; `None` for a wrong id or token type.
    pub fn channel_of<T: Token>(&self, id: EdgeId) -> Option<&Channel<T>> {
        self.channel(id).and_then(downcast_ref::<T>)
    }

    pub(crate) fn into_parts(self) -> (Vec<Box<dyn Actor>>, Vec<Edge>, Vec<Box<dyn AnyChannel>>) {
        (self.actors, self.edges, self.channels)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field(
                "actors",
                &self.actors.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges)
            .finish()
    }
}
