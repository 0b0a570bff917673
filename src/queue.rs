//! Blocking bounded queues between pipeline tasks.
//!
//! Each queue is a single-producer/single-consumer ring buffer. Posting to a
//! full queue retries until a slot frees up; pending on an empty queue
//! retries until a value arrives. Both give up when the stop signal is
//! raised or the peer endpoint has been dropped.

use crate::channel::ChannelError;
use crate::control::StopSignal;
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use std::fmt;
use std::time::Duration;

/// Capacity used between pipeline tasks unless configured otherwise.
pub const DEFAULT_TASK_QUEUE_CAPACITY: usize = 1;

/// Spins before a retry loop starts sleeping between attempts.
const SPINS_BEFORE_SLEEP: u32 = 64;
const RETRY_SLEEP: Duration = Duration::from_micros(50);

/// Errors from blocking queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The stop signal was raised while waiting.
    Stopped,
    /// The other endpoint was dropped.
    Disconnected,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Stopped => write!(f, "stopped while waiting on queue"),
            QueueError::Disconnected => write!(f, "queue peer disconnected"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Create a queue holding at most `capacity` values.
///
/// Fails with [`ChannelError::Allocation`] for zero capacity or when the
/// slots cannot be reserved.
pub fn task_queue<T>(capacity: usize) -> Result<(QueueSender<T>, QueueReceiver<T>), ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::Allocation { capacity });
    }
    // RingBuffer::new panics or aborts on failure; reserve first.
    Vec::<T>::new()
        .try_reserve_exact(capacity)
        .map_err(|_| ChannelError::Allocation { capacity })?;
    let (producer, consumer) = RingBuffer::new(capacity);
    Ok((
        QueueSender {
            producer,
            capacity,
        },
        QueueReceiver { consumer },
    ))
}

/// Producing end of a task queue.
pub struct QueueSender<T> {
    producer: Producer<T>,
    capacity: usize,
}

/// Consuming end of a task queue.
pub struct QueueReceiver<T> {
    consumer: Consumer<T>,
}

struct Retry {
    spins: u32,
}

impl Retry {
    fn new() -> Self {
        Self { spins: 0 }
    }

    fn pause(&mut self) {
        if self.spins < SPINS_BEFORE_SLEEP {
            self.spins += 1;
            std::thread::yield_now();
        } else {
            std::thread::sleep(RETRY_SLEEP);
        }
    }
}

impl<T> QueueSender<T> {
    /// Post without waiting; hands the value back if the queue is full.
    pub fn try_post(&mut self, value: T) -> Result<(), T> {
        self.producer.push(value).map_err(|PushError::Full(v)| v)
    }

    /// Post, retrying while the queue is full.
    pub fn post(&mut self, value: T, stop: &StopSignal) -> Result<(), QueueError> {
        let mut value = value;
        let mut retry = Retry::new();
        loop {
            if self.producer.is_abandoned() {
                return Err(QueueError::Disconnected);
            }
            match self.producer.push(value) {
                Ok(()) => return Ok(()),
                Err(PushError::Full(v)) => value = v,
            }
            if stop.is_stopped() {
                return Err(QueueError::Stopped);
            }
            retry.pause();
        }
    }

    /// Free slots.
    pub fn free(&self) -> usize {
        self.producer.slots()
    }

    /// Maximum number of queued values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> QueueReceiver<T> {
    /// Take a value without waiting.
    pub fn try_pend(&mut self) -> Option<T> {
        self.consumer.pop().ok()
    }

    /// Take a value, waiting while the queue is empty. Values already queued
    /// are still delivered after the sender is dropped.
    pub fn pend(&mut self, stop: &StopSignal) -> Result<T, QueueError> {
        let mut retry = Retry::new();
        loop {
            if let Ok(value) = self.consumer.pop() {
                return Ok(value);
            }
            if self.consumer.is_abandoned() && self.consumer.is_empty() {
                return Err(QueueError::Disconnected);
            }
            if stop.is_stopped() {
                return Err(QueueError::Stopped);
            }
            retry.pause();
        }
    }

    /// Queued values.
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("capacity", &self.capacity())
            .field("free", &self.free())
            .finish()
    }
}

impl<T> fmt::Debug for QueueReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            task_queue::<u8>(0),
            Err(ChannelError::Allocation { capacity: 0 })
        ));
    }

    #[test]
    fn unreservable_capacity_rejected() {
        let huge = usize::MAX / 2;
        assert!(matches!(
            task_queue::<u64>(huge),
            Err(ChannelError::Allocation { capacity }) if capacity == huge
        ));
    }

    #[test]
    fn try_post_hands_value_back_when_full() {
        let (mut tx, mut rx) = task_queue::<u32>(1).unwrap();
        assert_eq!(tx.try_post(1), Ok(()));
        assert_eq!(tx.try_post(2), Err(2));
        assert_eq!(rx.try_pend(), Some(1));
        assert_eq!(rx.try_pend(), None);
    }

    #[test]
    fn post_retries_until_consumer_drains() {
        let (mut tx, mut rx) = task_queue::<u32>(1).unwrap();
        let stop = StopSignal::new();
        let consumer_stop = stop.clone();
        let handle = thread::spawn(move || {
            let mut got = Vec::new();
            for _ in 0..100 {
                got.push(rx.pend(&consumer_stop).unwrap());
            }
            got
        });
        for i in 0..100 {
            tx.post(i, &stop).unwrap();
        }
        assert_eq!(handle.join().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn blocked_operations_observe_stop_and_disconnect() {
        let (mut tx, mut rx) = task_queue::<u32>(1).unwrap();
        let stop = StopSignal::new();
        tx.post(1, &stop).unwrap();
        stop.stop();
        assert_eq!(tx.post(2, &stop), Err(QueueError::Stopped));

        let live = StopSignal::new();
        drop(tx);
        assert_eq!(rx.pend(&live), Ok(1));
        assert_eq!(rx.pend(&live), Err(QueueError::Disconnected));
    }
}
