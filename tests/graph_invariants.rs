use sdflow::actor::{Actor11, Direction, Sink, Source};
use sdflow::graph::{ActorId, EdgeId, Graph, GraphError, PortId};
use sdflow::plan::{Plan, Schedule};

fn source(name: &str) -> impl sdflow::actor::Actor {
    Source::new(name, 1, |o: &mut Vec<i32>| o.push(1)).unwrap()
}

fn pass(name: &str) -> impl sdflow::actor::Actor {
    Actor11::new(name, 1, 1, |i: &[i32], o: &mut Vec<i32>| o.push(i[0])).unwrap()
}

fn sink(name: &str) -> impl sdflow::actor::Actor {
    Sink::new(name, 1, |_: &[i32]| {}).unwrap()
}

#[test]
fn cycles_need_a_delay_to_run() {
    let mut graph = Graph::new();
    let a = graph.add_actor(pass("a"));
    let b = graph.add_actor(pass("b"));
    graph.connect::<i32>(a, PortId(0), b, PortId(0), 1).unwrap();
    graph.connect::<i32>(b, PortId(0), a, PortId(0), 1).unwrap();
    // The cycle itself is legal; without initial tokens no actor can start.
    assert!(Plan::compile(&graph, &Schedule::new([a, b])).is_err());

    let mut graph = Graph::new();
    let a = graph.add_actor(pass("a"));
    let b = graph.add_actor(pass("b"));
    graph.connect::<i32>(a, PortId(0), b, PortId(0), 1).unwrap();
    graph
        .delay::<i32>(b, PortId(0), a, PortId(0), 1, &[0])
        .unwrap();
    assert!(Plan::compile(&graph, &Schedule::new([a, b])).is_ok());
}

#[test]
fn self_loops_are_rejected() {
    let mut graph = Graph::new();
    let a = graph.add_actor(pass("a"));
    assert_eq!(
        graph.delay::<i32>(a, PortId(0), a, PortId(0), 1, &[0]),
        Err(GraphError::SelfLoop(a))
    );
    assert!(graph.edges().is_empty());
}

#[test]
fn every_port_must_be_connected() {
    let mut graph = Graph::new();
    let src = graph.add_actor(source("src"));
    let mid = graph.add_actor(pass("mid"));
    graph.connect::<i32>(src, PortId(0), mid, PortId(0), 1).unwrap();
    assert_eq!(
        graph.validate(),
        Err(GraphError::UnconnectedPort {
            actor: mid,
            direction: Direction::Output,
            port: PortId(0),
        })
    );
    assert!(Plan::compile(&graph, &Schedule::new([src, mid])).is_err());

    let out = graph.add_actor(sink("out"));
    graph.connect::<i32>(mid, PortId(0), out, PortId(0), 1).unwrap();
    assert_eq!(graph.validate(), Ok(()));
}

#[test]
fn a_port_takes_one_edge() {
    let mut graph = Graph::new();
    let src = graph.add_actor(source("src"));
    let a = graph.add_actor(sink("a"));
    let b = graph.add_actor(sink("b"));
    graph.connect::<i32>(src, PortId(0), a, PortId(0), 1).unwrap();
    // Fan-out needs an explicit splitter actor.
    assert_eq!(
        graph.connect::<i32>(src, PortId(0), b, PortId(0), 1),
        Err(GraphError::PortAlreadyConnected {
            actor: src,
            direction: Direction::Output,
            port: PortId(0),
        })
    );
}

#[test]
fn actor_ids_stable_monotonic() {
    let mut graph = Graph::new();
    assert_eq!(graph.add_actor(source("a")), ActorId(0));
    assert_eq!(graph.add_actor(pass("b")), ActorId(1));
    assert_eq!(graph.add_actor(sink("c")), ActorId(2));
    assert_eq!(graph.actor_count(), 3);
    assert_eq!(graph.actor(ActorId(1)).map(|a| a.name()), Some("b"));
}

#[test]
fn edge_direction_validation() {
    let mut graph = Graph::new();
    let src = graph.add_actor(source("src"));
    let out = graph.add_actor(sink("out"));

    // A sink has no output port, a source no input port.
    assert_eq!(
        graph.connect::<i32>(out, PortId(0), src, PortId(0), 1),
        Err(GraphError::InvalidPort {
            actor: out,
            direction: Direction::Output,
            port: PortId(0),
        })
    );
    assert!(matches!(
        graph.connect::<i32>(src, PortId(1), out, PortId(0), 1),
        Err(GraphError::InvalidPort { .. })
    ));
    assert!(matches!(
        graph.connect::<u8>(src, PortId(0), out, PortId(0), 1),
        Err(GraphError::TokenTypeMismatch {
            direction: Direction::Output,
            ..
        })
    ));
    assert_eq!(
        graph.connect::<i32>(src, PortId(0), out, PortId(0), 1),
        Ok(EdgeId(0))
    );
}

#[test]
fn invalid_actor_bounds_check() {
    let mut graph = Graph::new();
    let src = graph.add_actor(source("src"));
    assert_eq!(
        graph.connect::<i32>(src, PortId(0), ActorId(999), PortId(0), 1),
        Err(GraphError::InvalidActor(ActorId(999)))
    );
}

#[test]
fn zero_capacity_and_oversized_preload_fail() {
    let mut graph = Graph::new();
    let a = graph.add_actor(pass("a"));
    let b = graph.add_actor(pass("b"));
    assert!(matches!(
        graph.connect::<i32>(a, PortId(0), b, PortId(0), 0),
        Err(GraphError::Channel(_))
    ));
    assert!(matches!(
        graph.delay::<i32>(a, PortId(0), b, PortId(0), 1, &[0, 0]),
        Err(GraphError::Channel(_))
    ));
    let e = graph
        .delay::<i32>(a, PortId(0), b, PortId(0), 2, &[4, 5])
        .unwrap();
    assert_eq!(graph.edge(e).map(|e| e.delay), Some(2));
    let preloaded: Vec<i32> = graph.channel_of::<i32>(e).unwrap().iter().collect();
    assert_eq!(preloaded, vec![4, 5]);
}
