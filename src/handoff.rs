//! Flag-gated handoff of gray frames between stages on different cores.
//!
//! A [`SharedRegion`] is a flat byte area shared by all stages. Each stage
//! boundary owns one flag byte and one payload slot:
//!
//! ```text
//! offset 0 .. b              flag per boundary (0 EMPTY, 1 FULL)
//! b + k*(3+P)                slot k: width
//!         + 1                slot k: height
//!         + 2                slot k: reserved, always 0
//!         + 3 .. + 3 + P     slot k: gray payload, row-major
//! ```
//!
//! With two boundaries slot 0 starts at offset 2, so width, height and
//! payload of the first boundary land at offsets 2, 3 and 5.
//!
//! Ownership alternates strictly per boundary. The [`Publisher`] owns the
//! slot while the flag is EMPTY and hands it over by setting the flag as its
//! last store; the [`Subscriber`] owns it while the flag is FULL and hands it
//! back by clearing the flag after reading. There is one slot per boundary,
//! so a publisher must wait for the previous frame to be consumed.

use crate::control::StopSignal;
use crate::image::{GrayImage, ImageError};
use crate::invariant_ppt::{assert_invariant, HANDOFF_EXCLUSIVE, HANDOFF_LAYOUT};
use log::trace;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Flag value: the consumer may not proceed.
pub const EMPTY: u8 = 0;
/// Flag value: a frame is ready.
pub const FULL: u8 = 1;

const SLOT_HEADER: usize = 3;
/// Parked waiters re-check the stop signal at least this often.
const PARK_TIMEOUT: Duration = Duration::from_millis(5);
const SPINS_PER_YIELD: u32 = 1 << 10;

/// Errors from the handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    /// `try_publish` found the previous frame unconsumed.
    Occupied,
    /// The stop signal was raised while waiting.
    Stopped,
    /// Frame dimensions exceed 255 or its pixels exceed the slot.
    FrameTooLarge {
        /// Frame width.
        width: usize,
        /// Frame height.
        height: usize,
        /// Slot payload capacity.
        capacity: usize,
    },
    /// The boundary already has a publisher and subscriber.
    AlreadyClaimed(usize),
    /// No such boundary in the layout.
    InvalidBoundary(usize),
    /// A layout needs at least one boundary.
    NoBoundaries,
    /// Region storage could not be reserved.
    Allocation {
        /// Bytes requested.
        bytes: usize,
    },
    /// A consumed slot did not describe a valid frame.
    Image(ImageError),
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffError::Occupied => write!(f, "previous frame not consumed yet"),
            HandoffError::Stopped => write!(f, "stopped while waiting on handoff"),
            HandoffError::FrameTooLarge {
                width,
                height,
                capacity,
            } => write!(
                f,
                "{width}x{height} frame does not fit a {capacity}-byte slot"
            ),
            HandoffError::AlreadyClaimed(b) => write!(f, "boundary {b} already claimed"),
            HandoffError::InvalidBoundary(b) => write!(f, "boundary {b} does not exist"),
            HandoffError::NoBoundaries => write!(f, "layout needs at least one boundary"),
            HandoffError::Allocation { bytes } => {
                write!(f, "cannot allocate {bytes}-byte shared region")
            }
            HandoffError::Image(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HandoffError {}

impl From<ImageError> for HandoffError {
    fn from(e: ImageError) -> Self {
        HandoffError::Image(e)
    }
}

/// Byte offsets of the shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    boundaries: usize,
    payload_capacity: usize,
}

impl RegionLayout {
    /// Layout with `boundaries` flags and slots of `payload_capacity` bytes.
    pub fn new(boundaries: usize, payload_capacity: usize) -> Result<Self, HandoffError> {
        if boundaries == 0 {
            return Err(HandoffError::NoBoundaries);
        }
        let layout = Self {
            boundaries,
            payload_capacity,
        };
        layout
            .slot_stride()
            .checked_mul(boundaries)
            .and_then(|n| n.checked_add(boundaries))
            .ok_or(HandoffError::Allocation { bytes: usize::MAX })?;
        Ok(layout)
    }

    /// Number of stage boundaries.
    pub fn boundaries(&self) -> usize {
        self.boundaries
    }

    /// Payload bytes per slot.
    pub fn payload_capacity(&self) -> usize {
        self.payload_capacity
    }

    fn slot_stride(&self) -> usize {
        SLOT_HEADER + self.payload_capacity
    }

    /// Offset of a boundary's flag byte.
    pub fn flag_offset(&self, boundary: usize) -> usize {
        boundary
    }

    /// Offset of a boundary's width byte.
    pub fn width_offset(&self, boundary: usize) -> usize {
        self.boundaries + boundary * self.slot_stride()
    }

    /// Offset of a boundary's height byte.
    pub fn height_offset(&self, boundary: usize) -> usize {
        self.width_offset(boundary) + 1
    }

    /// Offset of a boundary's first payload byte.
    pub fn payload_offset(&self, boundary: usize) -> usize {
        self.width_offset(boundary) + SLOT_HEADER
    }

    /// Total region size in bytes.
    pub fn len(&self) -> usize {
        self.boundaries + self.boundaries * self.slot_stride()
    }

    /// Never true; a layout has at least its flag bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a blocked stage waits for a flag to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Busy-wait on the flag. Only sensible with one stage per core.
    Spin,
    /// Sleep on a condition variable until the flag changes.
    #[default]
    Park,
}

/// Shared memory between pipeline stages.
pub struct SharedRegion {
    layout: RegionLayout,
    bytes: Box<[AtomicU8]>,
    claimed: Box<[AtomicBool]>,
    wait: WaitStrategy,
    lock: Mutex<()>,
    changed: Condvar,
}

impl SharedRegion {
    /// Allocate a zeroed region; every boundary starts EMPTY.
    pub fn new(layout: RegionLayout, wait: WaitStrategy) -> Result<Arc<Self>, HandoffError> {
        let len = layout.len();
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| HandoffError::Allocation { bytes: len })?;
        bytes.extend((0..len).map(|_| AtomicU8::new(0)));
        assert_invariant(
            HANDOFF_LAYOUT,
            layout.payload_offset(layout.boundaries - 1) + layout.payload_capacity == len
                && layout.flag_offset(layout.boundaries - 1) < layout.width_offset(0),
            "Flags precede slots and slots tile the region",
            Some("SharedRegion::new"),
        );
        Ok(Arc::new(Self {
            layout,
            bytes: bytes.into_boxed_slice(),
            claimed: (0..layout.boundaries)
                .map(|_| AtomicBool::new(false))
                .collect(),
            wait,
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }))
    }

    /// Take the unique endpoints of a boundary.
    pub fn claim(self: &Arc<Self>, boundary: usize) -> Result<(Publisher, Subscriber), HandoffError> {
        let flag = self
            .claimed
            .get(boundary)
            .ok_or(HandoffError::InvalidBoundary(boundary))?;
        if flag.swap(true, Ordering::AcqRel) {
            return Err(HandoffError::AlreadyClaimed(boundary));
        }
        assert_invariant(
            HANDOFF_EXCLUSIVE,
            flag.load(Ordering::Acquire),
            "One publisher and one subscriber per boundary",
            Some("SharedRegion::claim"),
        );
        Ok((
            Publisher {
                region: Arc::clone(self),
                boundary,
            },
            Subscriber {
                region: Arc::clone(self),
                boundary,
            },
        ))
    }

    /// Byte layout.
    pub fn layout(&self) -> RegionLayout {
        self.layout
    }

    /// Wait strategy in use.
    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }

    /// Current flag of a boundary.
    pub fn flag(&self, boundary: usize) -> Option<u8> {
        if boundary >= self.layout.boundaries {
            return None;
        }
        Some(self.bytes[self.layout.flag_offset(boundary)].load(Ordering::Acquire))
    }

    /// Copy of the whole region, for inspection.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.load(Ordering::Acquire)).collect()
    }

    fn flag_byte(&self, boundary: usize) -> &AtomicU8 {
        &self.bytes[self.layout.flag_offset(boundary)]
    }

    fn set_flag(&self, boundary: usize, value: u8) {
        match self.wait {
            WaitStrategy::Spin => self.flag_byte(boundary).store(value, Ordering::Release),
            WaitStrategy::Park => {
                let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.flag_byte(boundary).store(value, Ordering::Release);
                self.changed.notify_all();
            }
        }
    }

    fn wait_for(&self, boundary: usize, want: u8, stop: &StopSignal) -> Result<(), HandoffError> {
        let flag = self.flag_byte(boundary);
        match self.wait {
            WaitStrategy::Spin => {
                let mut spins = 0u32;
                loop {
                    if flag.load(Ordering::Acquire) == want {
                        return Ok(());
                    }
                    if stop.is_stopped() {
                        return Err(HandoffError::Stopped);
                    }
                    spins = spins.wrapping_add(1);
                    if spins % SPINS_PER_YIELD == 0 {
                        std::thread::yield_now();
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }
            WaitStrategy::Park => {
                let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if flag.load(Ordering::Acquire) == want {
                        return Ok(());
                    }
                    if stop.is_stopped() {
                        return Err(HandoffError::Stopped);
                    }
                    guard = self
                        .changed
                        .wait_timeout(guard, PARK_TIMEOUT)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<u8> = (0..self.layout.boundaries)
            .filter_map(|b| self.flag(b))
            .collect();
        f.debug_struct("SharedRegion")
            .field("layout", &self.layout)
            .field("wait", &self.wait)
            .field("flags", &flags)
            .finish()
    }
}

/// Producing end of one boundary.
#[derive(Debug)]
pub struct Publisher {
    region: Arc<SharedRegion>,
    boundary: usize,
}

impl Publisher {
    /// Boundary index.
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// Publish if the slot is EMPTY, otherwise fail with `Occupied`.
    pub fn try_publish(&mut self, frame: &GrayImage) -> Result<(), HandoffError> {
        self.check(frame)?;
        if self.region.flag_byte(self.boundary).load(Ordering::Acquire) != EMPTY {
            return Err(HandoffError::Occupied);
        }
        self.write(frame);
        Ok(())
    }

    /// Wait until the slot is EMPTY, then publish.
    pub fn publish(&mut self, frame: &GrayImage, stop: &StopSignal) -> Result<(), HandoffError> {
        self.check(frame)?;
        self.region.wait_for(self.boundary, EMPTY, stop)?;
        self.write(frame);
        Ok(())
    }

    fn check(&self, frame: &GrayImage) -> Result<(), HandoffError> {
        let capacity = self.region.layout.payload_capacity;
        if frame.width() > usize::from(u8::MAX)
            || frame.height() > usize::from(u8::MAX)
            || frame.pixels().len() > capacity
        {
            return Err(HandoffError::FrameTooLarge {
                width: frame.width(),
                height: frame.height(),
                capacity,
            });
        }
        Ok(())
    }

    fn write(&mut self, frame: &GrayImage) {
        let layout = self.region.layout;
        let bytes = &self.region.bytes;
        let b = self.boundary;
        bytes[layout.width_offset(b)].store(frame.width() as u8, Ordering::Relaxed);
        bytes[layout.height_offset(b)].store(frame.height() as u8, Ordering::Relaxed);
        let payload = layout.payload_offset(b);
        for (slot, &p) in bytes[payload..payload + frame.pixels().len()]
            .iter()
            .zip(frame.pixels())
        {
            slot.store(p, Ordering::Relaxed);
        }
        // Flag store is last: nothing in the slot changes after this.
        self.region.set_flag(b, FULL);
        trace!(
            "boundary {b}: published {}x{}",
            frame.width(),
            frame.height()
        );
    }
}

/// Read-only view of a FULL slot, valid until the flag is cleared.
pub struct SlotView<'a> {
    region: &'a SharedRegion,
    boundary: usize,
}

impl SlotView<'_> {
    /// Frame width.
    pub fn width(&self) -> usize {
        let offset = self.region.layout.width_offset(self.boundary);
        usize::from(self.region.bytes[offset].load(Ordering::Relaxed))
    }

    /// Frame height.
    pub fn height(&self) -> usize {
        let offset = self.region.layout.height_offset(self.boundary);
        usize::from(self.region.bytes[offset].load(Ordering::Relaxed))
    }

    /// Payload bytes implied by width and height, clamped to the slot.
    pub fn len(&self) -> usize {
        (self.width() * self.height()).min(self.region.layout.payload_capacity)
    }

    /// True for a zero-sized frame.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel `i` of the payload.
    pub fn pixel(&self, i: usize) -> Option<u8> {
        if i >= self.len() {
            return None;
        }
        let offset = self.region.layout.payload_offset(self.boundary) + i;
        Some(self.region.bytes[offset].load(Ordering::Relaxed))
    }

    /// Append the payload to `out`.
    pub fn copy_into(&self, out: &mut Vec<u8>) {
        let start = self.region.layout.payload_offset(self.boundary);
        out.extend(
            self.region.bytes[start..start + self.len()]
                .iter()
                .map(|b| b.load(Ordering::Relaxed)),
        );
    }

    /// Owned copy of the frame.
    pub fn to_image(&self) -> Result<GrayImage, ImageError> {
        let mut pixels = Vec::with_capacity(self.len());
        self.copy_into(&mut pixels);
        GrayImage::new(self.width(), self.height(), pixels)
    }
}

/// Consuming end of one boundary.
#[derive(Debug)]
pub struct Subscriber {
    region: Arc<SharedRegion>,
    boundary: usize,
}

impl Subscriber {
    /// Boundary index.
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// Wait for FULL, copy the frame out, clear the flag.
    pub fn await_and_consume(&mut self, stop: &StopSignal) -> Result<GrayImage, HandoffError> {
        self.await_and_consume_with(stop, |view| view.to_image())?
            .map_err(HandoffError::from)
    }

    /// Wait for FULL, let `f` read the slot in place, clear the flag.
    pub fn await_and_consume_with<R>(
        &mut self,
        stop: &StopSignal,
        f: impl FnOnce(&SlotView<'_>) -> R,
    ) -> Result<R, HandoffError> {
        self.region.wait_for(self.boundary, FULL, stop)?;
        Ok(self.consume(f))
    }

    /// Consume only if a frame is ready.
    pub fn try_consume(&mut self) -> Option<Result<GrayImage, HandoffError>> {
        if self.region.flag_byte(self.boundary).load(Ordering::Acquire) != FULL {
            return None;
        }
        Some(self.consume(|view| view.to_image()).map_err(HandoffError::from))
    }

    fn consume<R>(&mut self, f: impl FnOnce(&SlotView<'_>) -> R) -> R {
        let view = SlotView {
            region: &self.region,
            boundary: self.boundary,
        };
        let out = f(&view);
        self.region.set_flag(self.boundary, EMPTY);
        trace!("boundary {}: consumed", self.boundary);
        out
    }
}
