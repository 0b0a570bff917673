//! Fixed-rate actors and the shapes used to build SDF graphs.
//!
//! Every actor declares its [`Rates`] up front. A firing is atomic: the
//! transfer function runs on peeked copies of the input tokens, and inputs
//! are consumed and outputs written only once the produced counts match the
//! declaration.

#![forbid(unsafe_code)]

use crate::channel::{downcast_mut, AnyChannel, Channel, ChannelError, Token, TokenType};
use std::fmt;

/// Side of an actor a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Consumes tokens.
    Input,
    /// Produces tokens.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// A port: tokens moved per firing and the token type.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    /// Tokens consumed or produced per firing.
    pub rate: usize,
    /// Token type carried.
    pub token: TokenType,
}

impl Port {
    /// Port carrying `T` at `rate` tokens per firing.
    pub fn of<T: Token>(rate: usize) -> Self {
        Self {
            rate,
            token: TokenType::of::<T>(),
        }
    }
}

/// Declared consumption and production of an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Rates {
    /// Input ports in index order.
    pub inputs: Vec<Port>,
    /// Output ports in index order.
    pub outputs: Vec<Port>,
}

impl Rates {
    /// Build a rate declaration; every rate must be at least one.
    pub fn new(inputs: Vec<Port>, outputs: Vec<Port>) -> Result<Self, ActorError> {
        if let Some(port) = inputs.iter().position(|p| p.rate == 0) {
            return Err(ActorError::ZeroRate {
                direction: Direction::Input,
                port,
            });
        }
        if let Some(port) = outputs.iter().position(|p| p.rate == 0) {
            return Err(ActorError::ZeroRate {
                direction: Direction::Output,
                port,
            });
        }
        Ok(Self { inputs, outputs })
    }

    /// Tokens consumed per firing on input `port`.
    pub fn consumption(&self, port: usize) -> Option<usize> {
        self.inputs.get(port).map(|p| p.rate)
    }

    /// Tokens produced per firing on output `port`.
    pub fn production(&self, port: usize) -> Option<usize> {
        self.outputs.get(port).map(|p| p.rate)
    }

    /// Ports on one side.
    pub fn ports(&self, direction: Direction) -> &[Port] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    fn check_input(&self, port: usize, channel: &dyn AnyChannel) -> Result<(), ActorError> {
        let declared = &self.inputs[port];
        check_type(Direction::Input, port, declared, channel)?;
        if channel.len() < declared.rate {
            return Err(ActorError::Underflow {
                port,
                required: declared.rate,
                available: channel.len(),
            });
        }
        Ok(())
    }

    fn check_output(&self, port: usize, channel: &dyn AnyChannel) -> Result<(), ActorError> {
        let declared = &self.outputs[port];
        check_type(Direction::Output, port, declared, channel)?;
        let free = channel.capacity() - channel.len();
        if free < declared.rate {
            return Err(ActorError::Overflow {
                port,
                required: declared.rate,
                free,
            });
        }
        Ok(())
    }
}

fn check_type(
    direction: Direction,
    port: usize,
    declared: &Port,
    channel: &dyn AnyChannel,
) -> Result<(), ActorError> {
    let found = channel.token_type();
    if found != declared.token {
        return Err(ActorError::TokenType {
            direction,
            port,
            expected: declared.token,
            found,
        });
    }
    Ok(())
}

/// Errors raised while declaring or firing an actor.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorError {
    /// A port was declared with rate zero.
    ZeroRate {
        /// Side of the port.
        direction: Direction,
        /// Port index.
        port: usize,
    },
    /// The number of channels handed to `fire` does not match the shape.
    Arity {
        /// Declared (inputs, outputs).
        expected: (usize, usize),
        /// Supplied (inputs, outputs).
        found: (usize, usize),
    },
    /// A channel carries a different token type than the port.
    TokenType {
        /// Side of the port.
        direction: Direction,
        /// Port index.
        port: usize,
        /// Declared token type.
        expected: TokenType,
        /// Channel token type.
        found: TokenType,
    },
    /// An input channel holds fewer tokens than the consumption rate.
    Underflow {
        /// Input port.
        port: usize,
        /// Declared consumption.
        required: usize,
        /// Tokens present.
        available: usize,
    },
    /// An output channel has less room than the production rate.
    Overflow {
        /// Output port.
        port: usize,
        /// Declared production.
        required: usize,
        /// Free slots.
        free: usize,
    },
    /// The transfer function produced a different count than declared.
    RateViolation {
        /// Output port.
        port: usize,
        /// Declared production.
        declared: usize,
        /// Tokens actually produced.
        produced: usize,
    },
    /// Channel operation failed.
    Channel(ChannelError),
}

impl fmt::Display for ActorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorError::ZeroRate { direction, port } => {
                write!(f, "{direction} port {port} declared with rate 0")
            }
            ActorError::Arity { expected, found } => write!(
                f,
                "actor expects {}/{} input/output channels, got {}/{}",
                expected.0, expected.1, found.0, found.1
            ),
            ActorError::TokenType {
                direction,
                port,
                expected,
                found,
            } => write!(
                f,
                "{direction} port {port} carries {expected}, channel carries {found}"
            ),
            ActorError::Underflow {
                port,
                required,
                available,
            } => write!(
                f,
                "input port {port} needs {required} tokens, {available} available"
            ),
            ActorError::Overflow {
                port,
                required,
                free,
            } => write!(
                f,
                "output port {port} produces {required} tokens, {free} slots free"
            ),
            ActorError::RateViolation {
                port,
                declared,
                produced,
            } => write!(
                f,
                "output port {port} declared {declared} tokens per firing, produced {produced}"
            ),
            ActorError::Channel(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ActorError {}

impl From<ChannelError> for ActorError {
    fn from(e: ChannelError) -> Self {
        ActorError::Channel(e)
    }
}

/// A fixed-rate computational node.
///
/// `fire` receives the channels bound to the actor's ports in port order.
/// Implementations must either complete the firing or leave every channel
/// untouched.
pub trait Actor: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;
    /// Declared rates.
    fn rates(&self) -> &Rates;
    /// Consume the declared inputs, compute, produce the declared outputs.
    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError>;
}

fn typed<T: Token>(
    channel: &mut dyn AnyChannel,
    direction: Direction,
    port: usize,
) -> Result<&mut Channel<T>, ActorError> {
    let found = channel.token_type();
    downcast_mut::<T>(channel).ok_or(ActorError::TokenType {
        direction,
        port,
        expected: TokenType::of::<T>(),
        found,
    })
}

fn verify_production(port: usize, declared: usize, produced: usize) -> Result<(), ActorError> {
    if declared != produced {
        return Err(ActorError::RateViolation {
            port,
            declared,
            produced,
        });
    }
    Ok(())
}

/// Boundary actor producing `rate` tokens per firing from a generator.
pub struct Source<T, F> {
    name: String,
    rates: Rates,
    f: F,
    output: Vec<T>,
}

impl<T: Token, F> Source<T, F>
where
    F: FnMut(&mut Vec<T>) + Send,
{
    /// The generator must push exactly `rate` tokens per call.
    pub fn new(name: impl Into<String>, rate: usize, f: F) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(vec![], vec![Port::of::<T>(rate)])?,
            f,
            output: Vec::with_capacity(rate),
        })
    }
}

impl<T: Token, F> Actor for Source<T, F>
where
    F: FnMut(&mut Vec<T>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([], [out]) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (0, 1),
                found,
            });
        };
        self.rates.check_output(0, &**out)?;
        self.output.clear();
        (self.f)(&mut self.output);
        verify_production(0, self.rates.outputs[0].rate, self.output.len())?;
        typed::<T>(&mut **out, Direction::Output, 0)?.write_all(&self.output)?;
        Ok(())
    }
}

/// Boundary actor consuming `rate` tokens per firing.
pub struct Sink<T, F> {
    name: String,
    rates: Rates,
    f: F,
    input: Vec<T>,
}

impl<T: Token, F> Sink<T, F>
where
    F: FnMut(&[T]) + Send,
{
    /// `f` receives exactly `rate` tokens per firing.
    pub fn new(name: impl Into<String>, rate: usize, f: F) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(vec![Port::of::<T>(rate)], vec![])?,
            f,
            input: Vec::with_capacity(rate),
        })
    }
}

impl<T: Token, F> Actor for Sink<T, F>
where
    F: FnMut(&[T]) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([input], []) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (1, 0),
                found,
            });
        };
        self.rates.check_input(0, &**input)?;
        let rate = self.rates.inputs[0].rate;
        self.input.clear();
        let channel = typed::<T>(&mut **input, Direction::Input, 0)?;
        channel.peek_into(&mut self.input, rate)?;
        (self.f)(&self.input);
        channel.discard(rate)?;
        Ok(())
    }
}

/// One input, one output.
pub struct Actor11<I, O, F> {
    name: String,
    rates: Rates,
    f: F,
    input: Vec<I>,
    output: Vec<O>,
}

impl<I: Token, O: Token, F> Actor11<I, O, F>
where
    F: FnMut(&[I], &mut Vec<O>) + Send,
{
    /// Consume `consume` tokens, produce `produce` tokens per firing.
    pub fn new(
        name: impl Into<String>,
        consume: usize,
        produce: usize,
        f: F,
    ) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(vec![Port::of::<I>(consume)], vec![Port::of::<O>(produce)])?,
            f,
            input: Vec::with_capacity(consume),
            output: Vec::with_capacity(produce),
        })
    }
}

impl<I: Token, O: Token, F> Actor for Actor11<I, O, F>
where
    F: FnMut(&[I], &mut Vec<O>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([input], [out]) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (1, 1),
                found,
            });
        };
        self.rates.check_input(0, &**input)?;
        self.rates.check_output(0, &**out)?;
        let consume = self.rates.inputs[0].rate;

        self.input.clear();
        typed::<I>(&mut **input, Direction::Input, 0)?.peek_into(&mut self.input, consume)?;
        self.output.clear();
        (self.f)(&self.input, &mut self.output);
        verify_production(0, self.rates.outputs[0].rate, self.output.len())?;

        typed::<I>(&mut **input, Direction::Input, 0)?.discard(consume)?;
        typed::<O>(&mut **out, Direction::Output, 0)?.write_all(&self.output)?;
        Ok(())
    }
}

/// One input, two outputs (splitters).
pub struct Actor12<I, O1, O2, F> {
    name: String,
    rates: Rates,
    f: F,
    input: Vec<I>,
    output1: Vec<O1>,
    output2: Vec<O2>,
}

impl<I: Token, O1: Token, O2: Token, F> Actor12<I, O1, O2, F>
where
    F: FnMut(&[I], &mut Vec<O1>, &mut Vec<O2>) + Send,
{
    /// Rates are `consume` and `(produce1, produce2)`.
    pub fn new(
        name: impl Into<String>,
        consume: usize,
        produce: (usize, usize),
        f: F,
    ) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(
                vec![Port::of::<I>(consume)],
                vec![Port::of::<O1>(produce.0), Port::of::<O2>(produce.1)],
            )?,
            f,
            input: Vec::with_capacity(consume),
            output1: Vec::with_capacity(produce.0),
            output2: Vec::with_capacity(produce.1),
        })
    }
}

impl<I: Token, O1: Token, O2: Token, F> Actor for Actor12<I, O1, O2, F>
where
    F: FnMut(&[I], &mut Vec<O1>, &mut Vec<O2>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([input], [out1, out2]) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (1, 2),
                found,
            });
        };
        self.rates.check_input(0, &**input)?;
        self.rates.check_output(0, &**out1)?;
        self.rates.check_output(1, &**out2)?;
        let consume = self.rates.inputs[0].rate;

        self.input.clear();
        typed::<I>(&mut **input, Direction::Input, 0)?.peek_into(&mut self.input, consume)?;
        self.output1.clear();
        self.output2.clear();
        (self.f)(&self.input, &mut self.output1, &mut self.output2);
        verify_production(0, self.rates.outputs[0].rate, self.output1.len())?;
        verify_production(1, self.rates.outputs[1].rate, self.output2.len())?;

        typed::<I>(&mut **input, Direction::Input, 0)?.discard(consume)?;
        typed::<O1>(&mut **out1, Direction::Output, 0)?.write_all(&self.output1)?;
        typed::<O2>(&mut **out2, Direction::Output, 1)?.write_all(&self.output2)?;
        Ok(())
    }
}

/// Two inputs, one output (merging actors).
pub struct Actor21<I1, I2, O, F> {
    name: String,
    rates: Rates,
    f: F,
    input1: Vec<I1>,
    input2: Vec<I2>,
    output: Vec<O>,
}

impl<I1: Token, I2: Token, O: Token, F> Actor21<I1, I2, O, F>
where
    F: FnMut(&[I1], &[I2], &mut Vec<O>) + Send,
{
    /// Rates are `(consume1, consume2)` and `produce`.
    pub fn new(
        name: impl Into<String>,
        consume: (usize, usize),
        produce: usize,
        f: F,
    ) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(
                vec![Port::of::<I1>(consume.0), Port::of::<I2>(consume.1)],
                vec![Port::of::<O>(produce)],
            )?,
            f,
            input1: Vec::with_capacity(consume.0),
            input2: Vec::with_capacity(consume.1),
            output: Vec::with_capacity(produce),
        })
    }
}

impl<I1: Token, I2: Token, O: Token, F> Actor for Actor21<I1, I2, O, F>
where
    F: FnMut(&[I1], &[I2], &mut Vec<O>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([in1, in2], [out]) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (2, 1),
                found,
            });
        };
        self.rates.check_input(0, &**in1)?;
        self.rates.check_input(1, &**in2)?;
        self.rates.check_output(0, &**out)?;
        let (c1, c2) = (self.rates.inputs[0].rate, self.rates.inputs[1].rate);

        self.input1.clear();
        self.input2.clear();
        typed::<I1>(&mut **in1, Direction::Input, 0)?.peek_into(&mut self.input1, c1)?;
        typed::<I2>(&mut **in2, Direction::Input, 1)?.peek_into(&mut self.input2, c2)?;
        self.output.clear();
        (self.f)(&self.input1, &self.input2, &mut self.output);
        verify_production(0, self.rates.outputs[0].rate, self.output.len())?;

        typed::<I1>(&mut **in1, Direction::Input, 0)?.discard(c1)?;
        typed::<I2>(&mut **in2, Direction::Input, 1)?.discard(c2)?;
        typed::<O>(&mut **out, Direction::Output, 0)?.write_all(&self.output)?;
        Ok(())
    }
}

/// Two inputs, two outputs (split-and-sum actors).
pub struct Actor22<I1, I2, O1, O2, F> {
    name: String,
    rates: Rates,
    f: F,
    input1: Vec<I1>,
    input2: Vec<I2>,
    output1: Vec<O1>,
    output2: Vec<O2>,
}

impl<I1: Token, I2: Token, O1: Token, O2: Token, F> Actor22<I1, I2, O1, O2, F>
where
    F: FnMut(&[I1], &[I2], &mut Vec<O1>, &mut Vec<O2>) + Send,
{
    /// Rates are `(consume1, consume2)` and `(produce1, produce2)`.
    pub fn new(
        name: impl Into<String>,
        consume: (usize, usize),
        produce: (usize, usize),
        f: F,
    ) -> Result<Self, ActorError> {
        Ok(Self {
            name: name.into(),
            rates: Rates::new(
                vec![Port::of::<I1>(consume.0), Port::of::<I2>(consume.1)],
                vec![Port::of::<O1>(produce.0), Port::of::<O2>(produce.1)],
            )?,
            f,
            input1: Vec::with_capacity(consume.0),
            input2: Vec::with_capacity(consume.1),
            output1: Vec::with_capacity(produce.0),
            output2: Vec::with_capacity(produce.1),
        })
    }
}

impl<I1: Token, I2: Token, O1: Token, O2: Token, F> Actor for Actor22<I1, I2, O1, O2, F>
where
    F: FnMut(&[I1], &[I2], &mut Vec<O1>, &mut Vec<O2>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rates(&self) -> &Rates {
        &self.rates
    }

    fn fire(
        &mut self,
        inputs: &mut [Box<dyn AnyChannel>],
        outputs: &mut [Box<dyn AnyChannel>],
    ) -> Result<(), ActorError> {
        let found = (inputs.len(), outputs.len());
        let ([in1, in2], [out1, out2]) = (inputs, outputs) else {
            return Err(ActorError::Arity {
                expected: (2, 2),
                found,
            });
        };
        self.rates.check_input(0, &**in1)?;
        self.rates.check_input(1, &**in2)?;
        self.rates.check_output(0, &**out1)?;
        self.rates.check_output(1, &**out2)?;
        let (c1, c2) = (self.rates.inputs[0].rate, self.rates.inputs[1].rate);

        self.input1.clear();
        self.input2.clear();
        typed::<I1>(&mut **in1, Direction::Input, 0)?.peek_into(&mut self.input1, c1)?;
        typed::<I2>(&mut **in2, Direction::Input, 1)?.peek_into(&mut self.input2, c2)?;
        self.output1.clear();
        self.output2.clear();
        (self.f)(
            &self.input1,
            &self.input2,
            &mut self.output1,
            &mut self.output2,
        );
        verify_production(0, self.rates.outputs[0].rate, self.output1.len())?;
        verify_production(1, self.rates.outputs[1].rate, self.output2.len())?;

        typed::<I1>(&mut **in1, Direction::Input, 0)?.discard(c1)?;
        typed::<I2>(&mut **in2, Direction::Input, 1)?.discard(c2)?;
        typed::<O1>(&mut **out1, Direction::Output, 0)?.write_all(&self.output1)?;
        typed::<O2>(&mut **out2, Direction::Output, 1)?.write_all(&self.output2)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed<T: Token>(capacity: usize, tokens: &[T]) -> Box<dyn AnyChannel> {
        let mut ch = Channel::<T>::new(capacity).unwrap();
        ch.preload(tokens).unwrap();
        Box::new(ch)
    }

    fn contents<T: Token>(ch: &dyn AnyChannel) -> Vec<T> {
        crate::channel::downcast_ref::<T>(ch).unwrap().iter().collect()
    }

    #[test]
    fn zero_rate_rejected_at_construction() {
        let err = Actor11::<i32, i32, _>::new("a", 0, 1, |_, _| {}).err();
        assert_eq!(
            err,
            Some(ActorError::ZeroRate {
                direction: Direction::Input,
                port: 0
            })
        );
    }

    #[test]
    fn actor11_consumes_and_produces_declared_counts() {
        let mut a = Actor11::new("sum", 2, 1, |i: &[i32], o: &mut Vec<i32>| o.push(i[0] + i[1]))
            .unwrap();
        let mut inputs = vec![boxed::<i32>(4, &[3, 4, 5])];
        let mut outputs = vec![boxed::<i32>(1, &[])];
        a.fire(&mut inputs, &mut outputs).unwrap();
        assert_eq!(contents::<i32>(inputs[0].as_ref()), vec![5]);
        assert_eq!(contents::<i32>(outputs[0].as_ref()), vec![7]);
    }

    #[test]
    fn rate_violation_leaves_channels_untouched() {
        let mut a = Actor11::new("liar", 1, 2, |i: &[i32], o: &mut Vec<i32>| o.push(i[0])).unwrap();
        let mut inputs = vec![boxed::<i32>(2, &[9])];
        let mut outputs = vec![boxed::<i32>(2, &[])];
        let err = a.fire(&mut inputs, &mut outputs).unwrap_err();
        assert_eq!(
            err,
            ActorError::RateViolation {
                port: 0,
                declared: 2,
                produced: 1
            }
        );
        assert_eq!(contents::<i32>(inputs[0].as_ref()), vec![9]);
        assert!(outputs[0].is_empty());
    }

    #[test]
    fn underflow_and_overflow_are_checked_before_firing() {
        let mut a = Actor11::new("copy", 2, 1, |i: &[u8], o: &mut Vec<u8>| o.push(i[0])).unwrap();
        let mut inputs = vec![boxed::<u8>(2, &[1])];
        let mut outputs = vec![boxed::<u8>(1, &[])];
        assert!(matches!(
            a.fire(&mut inputs, &mut outputs),
            Err(ActorError::Underflow { required: 2, available: 1, .. })
        ));

        let mut inputs = vec![boxed::<u8>(2, &[1, 2])];
        let mut outputs = vec![boxed::<u8>(1, &[0])];
        assert!(matches!(
            a.fire(&mut inputs, &mut outputs),
            Err(ActorError::Overflow { required: 1, free: 0, .. })
        ));
        assert_eq!(inputs[0].len(), 2);
    }

    #[test]
    fn wrong_token_type_is_reported() {
        let mut a = Actor11::new("copy", 1, 1, |i: &[u8], o: &mut Vec<u8>| o.push(i[0])).unwrap();
        let mut inputs = vec![boxed::<char>(1, &['x'])];
        let mut outputs = vec![boxed::<u8>(1, &[])];
        assert!(matches!(
            a.fire(&mut inputs, &mut outputs),
            Err(ActorError::TokenType { direction: Direction::Input, port: 0, .. })
        ));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let mut a = Actor21::new("merge", (1, 1), 1, |a: &[i32], b: &[i32], o: &mut Vec<i32>| {
            o.push(a[0] + b[0])
        })
        .unwrap();
        let mut inputs = vec![boxed::<i32>(1, &[1])];
        let mut outputs = vec![boxed::<i32>(1, &[])];
        assert_eq!(
            a.fire(&mut inputs, &mut outputs),
            Err(ActorError::Arity {
                expected: (2, 1),
                found: (1, 1)
            })
        );
    }

    #[test]
    fn actor22_split_and_sum() {
        let mut d = Actor22::new(
            "d",
            (2, 1),
            (1, 2),
            |xy: &[i32], z: &[i32], o1: &mut Vec<i32>, o2: &mut Vec<i32>| {
                let s = xy[0] + xy[1];
                o1.push(s + z[0]);
                o2.extend([s, s + z[0]]);
            },
        )
        .unwrap();
        let mut inputs = vec![boxed::<i32>(2, &[1, 2]), boxed::<i32>(1, &[10])];
        let mut outputs = vec![boxed::<i32>(1, &[]), boxed::<i32>(2, &[])];
        d.fire(&mut inputs, &mut outputs).unwrap();
        assert_eq!(contents::<i32>(outputs[0].as_ref()), vec![13]);
        assert_eq!(contents::<i32>(outputs[1].as_ref()), vec![3, 13]);
        assert!(inputs.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn source_and_sink_move_boundary_tokens() {
        let mut n = 0;
        let mut src = Source::new("src", 2, move |o: &mut Vec<i32>| {
            o.extend([n, n + 1]);
            n += 2;
        })
        .unwrap();
        let mut seen = Vec::new();
        let mut outputs = vec![boxed::<i32>(2, &[])];
        src.fire(&mut [], &mut outputs).unwrap();
        {
            let mut sink = Sink::new("sink", 2, |t: &[i32]| seen.extend_from_slice(t)).unwrap();
            sink.fire(&mut outputs, &mut []).unwrap();
        }
        assert_eq!(seen, vec![0, 1]);
    }
}
