//! Token channels: fixed-capacity ring buffers owned by graph edges.
//!
//! Channels follow the bounded-correct policy: a correct schedule never
//! overflows or underflows them, so both conditions are reported as errors
//! instead of blocking. The blocking policy used between tasks lives in
//! [`crate::queue`].

#![forbid(unsafe_code)]

use crate::invariant_ppt::{assert_invariant, CHANNEL_ALLOCATION, PRELOAD_BEFORE_START};
use std::any::{Any, TypeId};
use std::fmt;

/// A value that can travel on a channel.
///
/// Tokens are small fixed-width values (numbers, pixel components,
/// characters), hence `Copy`.
pub trait Token: Copy + Default + fmt::Debug + Send + 'static {}

impl<T> Token for T where T: Copy + Default + fmt::Debug + Send + 'static {}

/// Runtime description of a token type, used to check edge wiring.
#[derive(Debug, Clone, Copy)]
pub struct TokenType {
    id: TypeId,
    name: &'static str,
}

impl TokenType {
    /// Describe token type `T`.
    pub fn of<T: Token>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Human-readable type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TokenType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TokenType {}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Errors raised by channel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Zero capacity requested or the buffer could not be reserved.
    Allocation {
        /// Requested capacity.
        capacity: usize,
    },
    /// Fewer tokens present than requested.
    Underflow {
        /// Tokens requested.
        requested: usize,
        /// Tokens present.
        available: usize,
    },
    /// Writing would exceed the channel capacity.
    Overflow {
        /// Channel capacity.
        capacity: usize,
        /// Tokens already present.
        occupied: usize,
        /// Tokens offered.
        incoming: usize,
    },
    /// Preload attempted after the channel has been read or written.
    PreloadAfterStart,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Allocation { capacity } => {
                write!(f, "cannot allocate channel of capacity {capacity}")
            }
            ChannelError::Underflow {
                requested,
                available,
            } => write!(
                f,
                "channel underflow: {requested} tokens requested, {available} available"
            ),
            ChannelError::Overflow {
                capacity,
                occupied,
                incoming,
            } => write!(
                f,
                "channel overflow: {incoming} tokens offered to {occupied}/{capacity}"
            ),
            ChannelError::PreloadAfterStart => {
                write!(f, "preload is only allowed before the schedule starts")
            }
        }
    }
}

impl std::error::Error for ChannelError {}

/// A bounded FIFO of tokens backed by a ring buffer.
#[derive(Debug, Clone)]
pub struct Channel<T> {
    buffer: Box<[T]>,
    read: usize,
    write: usize,
    count: usize,
    started: bool,
}

impl<T: Token> Channel<T> {
    /// Allocate a channel holding at most `capacity` tokens.
    pub fn new(capacity: usize) -> Result<Self, ChannelError> {
        if capacity == 0 {
            return Err(ChannelError::Allocation { capacity });
        }
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| ChannelError::Allocation { capacity })?;
        storage.resize(capacity, T::default());
        assert_invariant(
            CHANNEL_ALLOCATION,
            storage.len() == capacity,
            "Channel buffer matches requested capacity",
            Some("Channel::new"),
        );
        Ok(Self {
            buffer: storage.into_boxed_slice(),
            read: 0,
            write: 0,
            count: 0,
            started: false,
        })
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when no tokens are present.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when no more tokens fit.
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Free slots.
    pub fn free(&self) -> usize {
        self.capacity() - self.count
    }

    /// Seed tokens before the schedule starts (delay edges).
    pub fn preload(&mut self, tokens: &[T]) -> Result<(), ChannelError> {
        if self.started {
            return Err(ChannelError::PreloadAfterStart);
        }
        self.push_all(tokens)?;
        assert_invariant(
            PRELOAD_BEFORE_START,
            !self.started,
            "Delay tokens seeded before first firing",
            Some("Channel::preload"),
        );
        Ok(())
    }

    /// Append one token.
    pub fn write(&mut self, token: T) -> Result<(), ChannelError> {
        self.started = true;
        self.push_all(std::slice::from_ref(&token))
    }

    /// Append all tokens or none.
    pub fn write_all(&mut self, tokens: &[T]) -> Result<(), ChannelError> {
        self.started = true;
        self.push_all(tokens)
    }

    /// Remove and return exactly `count` tokens in FIFO order.
    pub fn read(&mut self, count: usize) -> Result<Vec<T>, ChannelError> {
        let mut out = Vec::with_capacity(count);
        self.read_into(&mut out, count)?;
        Ok(out)
    }

    /// Remove exactly `count` tokens, appending them to `out`.
    pub fn read_into(&mut self, out: &mut Vec<T>, count: usize) -> Result<(), ChannelError> {
        self.peek_into(out, count)?;
        self.discard(count)
    }

    /// Copy the oldest `count` tokens into `out` without removing them.
    pub fn peek_into(&self, out: &mut Vec<T>, count: usize) -> Result<(), ChannelError> {
        self.check_available(count)?;
        out.extend(self.iter().take(count));
        Ok(())
    }

    /// Drop the oldest `count` tokens.
    pub fn discard(&mut self, count: usize) -> Result<(), ChannelError> {
        self.check_available(count)?;
        self.started = true;
        self.read = (self.read + count) % self.capacity();
        self.count -= count;
        Ok(())
    }

    /// Remove the oldest token, if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let token = self.buffer[self.read];
        self.started = true;
        self.read = (self.read + 1) % self.capacity();
        self.count -= 1;
        Some(token)
    }

    /// Iterate live tokens oldest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let cap = self.capacity();
        (0..self.count).map(move |i| self.buffer[(self.read + i) % cap])
    }

    fn check_available(&self, count: usize) -> Result<(), ChannelError> {
        if count > self.count {
            return Err(ChannelError::Underflow {
                requested: count,
                available: self.count,
            });
        }
        Ok(())
    }

    fn push_all(&mut self, tokens: &[T]) -> Result<(), ChannelError> {
        if tokens.len() > self.free() {
            return Err(ChannelError::Overflow {
                capacity: self.capacity(),
                occupied: self.count,
                incoming: tokens.len(),
            });
        }
        let cap = self.capacity();
        for &token in tokens {
            self.buffer[self.write] = token;
            self.write = (self.write + 1) % cap;
        }
        self.count += tokens.len();
        Ok(())
    }
}

/// Object-safe view of a channel whose token type is known only at runtime.
pub trait AnyChannel: Send + fmt::Debug {
    /// Token type carried by the channel.
    fn token_type(&self) -> TokenType;
    /// Live tokens.
    fn len(&self) -> usize;
    /// Capacity.
    fn capacity(&self) -> usize;
    /// True when empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Upcast for downcasting to `Channel<T>`.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to `Channel<T>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Token> AnyChannel for Channel<T> {
    fn token_type(&self) -> TokenType {
        TokenType::of::<T>()
    }

    fn len(&self) -> usize {
        self.count
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcast an erased channel to its concrete token type.
pub fn downcast_ref<T: Token>(channel: &dyn AnyChannel) -> Option<&Channel<T>> {
    channel.as_any().downcast_ref::<Channel<T>>()
}

/// Mutable variant of [`downcast_ref`].
pub fn downcast_mut<T: Token>(channel: &mut dyn AnyChannel) -> Option<&mut Channel<T>> {
    channel.as_any_mut().downcast_mut::<Channel<T>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_capacity_is_allocation_error() {
        assert_eq!(
            Channel::<u8>::new(0).unwrap_err(),
            ChannelError::Allocation { capacity: 0 }
        );
    }

    #[test]
    fn fifo_across_wraparound() {
        let mut ch = Channel::<i32>::new(3).unwrap();
        ch.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(ch.read(2).unwrap(), vec![1, 2]);
        ch.write_all(&[4, 5]).unwrap();
        assert!(ch.is_full());
        assert_eq!(ch.read(3).unwrap(), vec![3, 4, 5]);
        assert!(ch.is_empty());
    }

    #[test]
    fn overflow_is_all_or_nothing() {
        let mut ch = Channel::<u8>::new(2).unwrap();
        ch.write(7).unwrap();
        let err = ch.write_all(&[8, 9]).unwrap_err();
        assert_eq!(
            err,
            ChannelError::Overflow {
                capacity: 2,
                occupied: 1,
                incoming: 2
            }
        );
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.pop(), Some(7));
    }

    #[test]
    fn underflow_leaves_tokens_in_place() {
        let mut ch = Channel::<char>::new(4).unwrap();
        ch.write('a').unwrap();
        assert_eq!(
            ch.read(2).unwrap_err(),
            ChannelError::Underflow {
                requested: 2,
                available: 1
            }
        );
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn preload_only_before_start() {
        let mut ch = Channel::<i32>::new(2).unwrap();
        ch.preload(&[0, 0]).unwrap();
        assert_eq!(ch.read(1).unwrap(), vec![0]);
        assert_eq!(ch.preload(&[0]), Err(ChannelError::PreloadAfterStart));
    }

    #[test]
    fn erased_channel_downcasts_to_its_token_type() {
        let mut ch: Box<dyn AnyChannel> = Box::new(Channel::<f64>::new(1).unwrap());
        assert_eq!(ch.token_type(), TokenType::of::<f64>());
        assert!(downcast_mut::<u8>(ch.as_mut()).is_none());
        downcast_mut::<f64>(ch.as_mut()).unwrap().write(1.5).unwrap();
        assert_eq!(ch.len(), 1);
    }

    proptest! {
        #[test]
        fn occupancy_stays_within_capacity(cap in 1usize..8, ops in proptest::collection::vec(0usize..4, 0..64)) {
            let mut ch = Channel::<u32>::new(cap).unwrap();
            let mut model = std::collections::VecDeque::new();
            let mut next = 0u32;
            for op in ops {
                if op == 0 {
                    let taken = ch.read(1.min(model.len()));
                    if let Some(v) = model.pop_front() {
                        prop_assert_eq!(taken.unwrap(), vec![v]);
                    }
                } else {
                    match ch.write(next) {
                        Ok(()) => model.push_back(next),
                        Err(_) => prop_assert_eq!(model.len(), cap),
                    }
                    next += 1;
                }
                prop_assert!(ch.len() <= ch.capacity());
                prop_assert_eq!(ch.iter().collect::<Vec<_>>(), model.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
