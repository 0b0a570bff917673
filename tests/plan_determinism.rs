use sdflow::pipelines::{feedback_graph, numeric_graph};
use sdflow::plan::{Plan, ScheduleError};

fn numeric() -> (sdflow::graph::Graph, sdflow::plan::Schedule) {
    numeric_graph(
        |o: &mut Vec<i32>| o.extend([1, 2]),
        |o: &mut Vec<i32>| o.push(3),
        |_: &[i32]| {},
    )
    .unwrap()
}

#[test]
fn plan_deterministic_compilation() {
    let (graph, schedule) = numeric();
    let plan1 = Plan::compile(&graph, &schedule).unwrap();
    let plan2 = Plan::compile(&graph, &schedule).unwrap();
    assert_eq!(plan1, plan2);
    assert_eq!(plan1.schedule.to_string(), "0 2 0 2 1 3 4 5 6");
}

#[test]
fn repetition_vector_matches_rates() {
    let (graph, schedule) = numeric();
    let plan = Plan::compile(&graph, &schedule).unwrap();
    // in1, in2, a, b, c, d, out
    assert_eq!(plan.repetitions, vec![2, 1, 2, 1, 1, 1, 1]);

    let (graph, schedule) = feedback_graph(|o: &mut Vec<i32>| o.extend([0, 0]), |_: &[i32]| {}).unwrap();
    let plan = Plan::compile(&graph, &schedule).unwrap();
    // src, p1, p2, p3, p4, p5, sink
    assert_eq!(plan.repetitions, vec![2, 2, 2, 1, 2, 2, 2]);
}

#[test]
fn plan_rejects_reordered_schedule() {
    let (graph, schedule) = numeric();
    // Firing c before both a firings leaves it short of tokens.
    let mut steps = schedule.steps().to_vec();
    steps.swap(3, 6);
    let reordered = sdflow::plan::Schedule::new(steps);
    assert!(matches!(
        Plan::compile(&graph, &reordered),
        Err(ScheduleError::Underflow { step: 3, .. })
    ));
}
