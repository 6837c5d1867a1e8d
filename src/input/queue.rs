//! Interrupt-to-task edge queue.
//!
//! ```text
//! ┌───────────────┐ signal_edge  ┌───────────────────────┐  recv   ┌──────────────┐
//! │  GPIO ISR     │─────────────▶│ MpMcQueue<EdgeEvent>  │────────▶│ consumer task│
//! │ (EdgeProducer)│  ring ──────▶│ Doorbell (latched)    │  wait   │  (run loop)  │
//! └───────────────┘              └───────────────────────┘         └──────────────┘
//! ```
//!
//! The producer side is a lock-free CAS enqueue plus a doorbell ring; it
//! never blocks, allocates or logs.  A full queue drops the edge and bumps
//! an overflow counter.  The consumer blocks on the doorbell with no
//! timeout until an edge arrives or the queue is closed.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use heapless::mpmc::MpMcQueue;

use crate::app::ports::LineId;

/// Pending-edge capacity.  Must be a power of two for `MpMcQueue`.
pub const EDGE_QUEUE_DEPTH: usize = 16;

/// "An edge occurred on `line`."  The interrupt does not say which edge;
/// the consumer re-samples the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub line: LineId,
}

/// Bounded edge queue shared by one interrupt producer and one consumer.
pub struct EdgeQueue {
    slots: MpMcQueue<EdgeEvent, EDGE_QUEUE_DEPTH>,
    doorbell: Doorbell,
    closed: AtomicBool,
    dropped: AtomicU32,
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeQueue {
    pub fn new() -> Self {
        Self {
            slots: MpMcQueue::new(),
            doorbell: Doorbell::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Non-blocking enqueue.  Safe from interrupt context.
    ///
    /// Returns `false` if the edge was dropped (queue full or closed).
    /// Only overflow drops are counted; edges after close are expected.
    pub fn try_push(&self, event: EdgeEvent) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if self.slots.enqueue(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.doorbell.ring();
        true
    }

    /// Block until an edge is available.  Returns `None` once the queue is
    /// closed; edges still pending at that point are discarded.
    pub fn recv(&self) -> Option<EdgeEvent> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(event) = self.slots.dequeue() {
                return Some(event);
            }
            self.doorbell.wait();
        }
    }

    /// Close the queue and wake a blocked consumer.  Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.doorbell.ring();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Edges lost to overflow since creation.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Producer handle ───────────────────────────────────────────

/// Context handed to the interrupt layer for one line.
///
/// This is the only thing interrupt context ever touches: it carries an
/// `Arc` to its own pipeline's queue, so independent pipelines never share
/// state.
#[derive(Clone)]
pub struct EdgeProducer {
    queue: Arc<EdgeQueue>,
    line: LineId,
}

impl EdgeProducer {
    pub fn new(queue: Arc<EdgeQueue>, line: LineId) -> Self {
        Self { queue, line }
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    /// Interrupt entry point.  Lock-free; never blocks, allocates or logs.
    pub fn signal_edge(&self) -> bool {
        self.queue.try_push(EdgeEvent { line: self.line })
    }
}

impl core::fmt::Debug for EdgeProducer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EdgeProducer").field("line", &self.line).finish()
    }
}

// ── Doorbell ──────────────────────────────────────────────────
//
// Latched one-bit wakeup.  A ring with nobody waiting is remembered, so a
// ring that lands between the consumer's empty check and its wait is
// never lost.

/// On device: a one-slot FreeRTOS queue.  `send_back` detects interrupt
/// context and uses the `FromISR` variant, reporting whether it woke a
/// higher-priority task; `ring` yields in that case.
#[cfg(target_os = "espidf")]
struct Doorbell {
    slot: esp_idf_hal::task::queue::Queue<u8>,
}

#[cfg(target_os = "espidf")]
impl Doorbell {
    fn new() -> Self {
        Self {
            slot: esp_idf_hal::task::queue::Queue::new(1),
        }
    }

    fn ring(&self) {
        // Full slot means already rung.
        if let Ok(true) = self.slot.send_back(1, esp_idf_hal::delay::NON_BLOCK) {
            esp_idf_hal::task::do_yield();
        }
    }

    fn wait(&self) {
        let _ = self.slot.recv_front(esp_idf_hal::delay::BLOCK);
    }
}

/// On host the "interrupt" is another thread, so a condvar is enough.
#[cfg(not(target_os = "espidf"))]
struct Doorbell {
    rung: std::sync::Mutex<bool>,
    cv: std::sync::Condvar,
}

#[cfg(not(target_os = "espidf"))]
impl Doorbell {
    fn new() -> Self {
        Self {
            rung: std::sync::Mutex::new(false),
            cv: std::sync::Condvar::new(),
        }
    }

    fn ring(&self) {
        let mut rung = self.rung.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *rung = true;
        self.cv.notify_one();
    }

    fn wait(&self) {
        let mut rung = self.rung.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while !*rung {
            rung = self
                .cv
                .wait(rung)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        *rung = false;
    }
}
