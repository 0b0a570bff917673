use sdflow::actor::{Sink, Source};
use sdflow::dsl::GraphBuilder;
use sdflow::mealy::{mealy_actor, MealyMachine};
use sdflow::pipelines::compile;
use std::sync::{Arc, Mutex};

fn replay(seq: Vec<bool>) -> impl FnMut(&mut Vec<bool>) + Send {
    let mut at = 0;
    move |o: &mut Vec<bool>| {
        o.push(seq[at % seq.len()]);
        at += 1;
    }
}

#[test]
fn mealy_actor_matches_the_machine() {
    let a = vec![true, false, true, false, true, false];
    let b = vec![false, false, false, true, true, false];
    let xs = Arc::new(Mutex::new(Vec::new()));
    let ys = Arc::new(Mutex::new(Vec::new()));
    let (xs_in, ys_in) = (Arc::clone(&xs), Arc::clone(&ys));

    let mut g = GraphBuilder::new();
    g.actor(Source::new("a", 1, replay(a.clone())).unwrap()).unwrap();
    g.actor(Source::new("b", 1, replay(b.clone())).unwrap()).unwrap();
    g.actor(mealy_actor("mealy").unwrap()).unwrap();
    g.actor(Sink::new("x", 1, move |t: &[bool]| xs_in.lock().unwrap().push(t[0])).unwrap())
        .unwrap();
    g.actor(Sink::new("y", 1, move |t: &[bool]| ys_in.lock().unwrap().push(t[0])).unwrap())
        .unwrap();
    g.connect::<bool>(("a", 0), ("mealy", 0), 1).unwrap();
    g.connect::<bool>(("b", 0), ("mealy", 1), 1).unwrap();
    g.connect::<bool>(("mealy", 0), ("x", 0), 1).unwrap();
    g.connect::<bool>(("mealy", 1), ("y", 0), 1).unwrap();
    let schedule = g.schedule(&["a", "b", "mealy", "x", "y"]).unwrap();
    let mut runtime = compile(g.build().unwrap(), &schedule).unwrap();
    runtime.run_periods(a.len() as u64).unwrap();

    let mut machine = MealyMachine::new();
    let (ex, ey): (Vec<bool>, Vec<bool>) =
        a.iter().zip(&b).map(|(&a, &b)| machine.step(a, b)).unzip();
    assert_eq!(*xs.lock().unwrap(), ex);
    assert_eq!(*ys.lock().unwrap(), ey);
    // The forbidden step (both inputs high) produced nothing.
    assert_eq!((ex[4], ey[4]), (false, false));
}
