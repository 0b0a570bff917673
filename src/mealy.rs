//! Two-input, two-output Mealy machine with one bit of state.
//!
//! Inputs `a` and `b` must not be active together; such a step outputs
//! `(false, false)` and leaves the state alone. Otherwise the next state is
//! `(!s && a) || (s && !a && !b)`, and the outputs are computed from it as
//! `x = b || (a && s')` and `y = s' && b`.

use crate::actor::{Actor22, ActorError};

/// The machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MealyMachine {
    state: bool,
}

impl MealyMachine {
    /// Machine in the `false` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state bit.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Advance one step, returning `(x, y)`.
    pub fn step(&mut self, a: bool, b: bool) -> (bool, bool) {
        if a && b {
            return (false, false);
        }
        let s = self.state;
        self.state = (!s && a) || (s && !a && !b);
        (b || (a && self.state), self.state && b)
    }
}

/// The machine as an SDF actor: one `a` and one `b` in, one `x` and one
/// `y` out per firing. The state lives in the actor.
pub fn mealy_actor(
    name: &str,
) -> Result<
    Actor22<bool, bool, bool, bool, impl FnMut(&[bool], &[bool], &mut Vec<bool>, &mut Vec<bool>) + Send>,
    ActorError,
> {
    let mut machine = MealyMachine::new();
    Actor22::new(name, (1, 1), (1, 1), move |a: &[bool], b: &[bool], x: &mut Vec<bool>, y: &mut Vec<bool>| {
        let (ox, oy) = machine.step(a[0], b[0]);
        x.push(ox);
        y.push(oy);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_input_outputs_nothing_and_keeps_state() {
        let mut m = MealyMachine::new();
        m.step(true, false);
        assert!(m.state());
        assert_eq!(m.step(true, true), (false, false));
        assert!(m.state());
    }

    #[test]
    fn trace_toggles_on_a_and_holds_when_idle() {
        let mut m = MealyMachine::new();
        let inputs = [
            (true, false),
            (false, false),
            (true, false),
            (false, true),
            (false, false),
        ];
        let outputs: Vec<_> = inputs.iter().map(|&(a, b)| m.step(a, b)).collect();
        assert_eq!(
            outputs,
            vec![
                (true, false),
                (false, false),
                (false, false),
                (true, false),
                (false, false)
            ]
        );
        assert!(!m.state());
    }
}
