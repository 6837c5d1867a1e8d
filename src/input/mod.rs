//! Debounced interrupt-to-task button pipeline.
//!
//! ## Flow
//!
//! ```text
//! falling edge ─▶ ISR: EdgeProducer::signal_edge ─▶ EdgeQueue ─▶ run():
//!                 (lock-free enqueue only)                       1. now = clock
//!                                                                2. inside window? drop
//!                                                                3. line still active? else drop
//!                                                                4. last_accepted = now, callback
//! ```
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up (the default
//! [`Activation::ActiveLow`]).  The interrupt only says *an* edge happened;
//! the consumer re-samples the line so a bounce that has already returned
//! to idle never fires the callback.
//!
//! ## Lifecycle
//!
//! `configure` → `set_callback` → `run` on a dedicated task → `teardown`
//! (or drop).  Teardown unregisters the interrupt and closes the queue,
//! which makes a blocked `run` return.

pub mod debounce;
pub mod queue;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};

use crate::app::ports::{
    Clock, EdgeInterruptPort, EdgePolarity, LineConfig, LineId, LineLevel, LinePort, Pull,
};
use crate::error::PipelineError;
use crate::time::duration_to_millis;

pub use debounce::{DebounceState, EdgeOutcome};
pub use queue::{EDGE_QUEUE_DEPTH, EdgeEvent, EdgeProducer, EdgeQueue};

/// Debounce window used by the PegaVox button.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Which logical level means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Pull-up input, falling-edge interrupt, pressed reads low.
    ActiveLow,
    /// Pull-down input, rising-edge interrupt, pressed reads high.
    ActiveHigh,
}

impl Activation {
    pub const fn active_level(self) -> LineLevel {
        match self {
            Self::ActiveLow => LineLevel::Low,
            Self::ActiveHigh => LineLevel::High,
        }
    }

    pub const fn pull(self) -> Pull {
        match self {
            Self::ActiveLow => Pull::Up,
            Self::ActiveHigh => Pull::Down,
        }
    }

    pub const fn polarity(self) -> EdgePolarity {
        match self {
            Self::ActiveLow => EdgePolarity::Falling,
            Self::ActiveHigh => EdgePolarity::Rising,
        }
    }
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Edges that fired the callback.
    pub accepted: u32,
    /// Edges discarded inside the debounce window.
    pub debounced: u32,
    /// Edges discarded because the line had returned to idle.
    pub rejected_level: u32,
    /// Edges lost to queue overflow in interrupt context.
    pub dropped: u32,
}

impl PipelineStats {
    /// Edges the consumer has fully handled.  Wraps like the counters.
    pub const fn processed(&self) -> u32 {
        self.accepted
            .wrapping_add(self.debounced)
            .wrapping_add(self.rejected_level)
    }
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU32,
    debounced: AtomicU32,
    rejected_level: AtomicU32,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    line: LineId,
    window_ms: u32,
    activation: Activation,
}

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Unconfigured,
    Configured(Binding),
    TornDown,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Converts noisy transitions on one input line into at most one callback
/// per debounce window.
///
/// Share it behind an `Arc`: one task calls [`run`](Self::run), any other
/// may call [`teardown`](Self::teardown) or [`stats`](Self::stats).
pub struct InputEventPipeline<P: LinePort + EdgeInterruptPort, C: Clock> {
    port: Mutex<P>,
    clock: C,
    queue: Arc<EdgeQueue>,
    lifecycle: Mutex<Lifecycle>,
    callback: Mutex<Option<Callback>>,
    running: AtomicBool,
    counters: Counters,
}

impl<P: LinePort + EdgeInterruptPort, C: Clock> InputEventPipeline<P, C> {
    pub fn new(port: P, clock: C) -> Self {
        Self {
            port: Mutex::new(port),
            clock,
            queue: Arc::new(EdgeQueue::new()),
            lifecycle: Mutex::new(Lifecycle::Unconfigured),
            callback: Mutex::new(None),
            running: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Bind an active-low button on `line` with the given debounce window.
    pub fn configure(&self, line: LineId, window: Duration) -> Result<(), PipelineError> {
        self.configure_with(line, window, Activation::ActiveLow)
    }

    /// Bind `line` with an explicit activation polarity.
    ///
    /// Configures the line as an interrupt-capable input and registers this
    /// pipeline's [`EdgeProducer`] for it.  A pipeline binds exactly once.
    pub fn configure_with(
        &self,
        line: LineId,
        window: Duration,
        activation: Activation,
    ) -> Result<(), PipelineError> {
        let mut lifecycle = lock(&self.lifecycle);
        match *lifecycle {
            Lifecycle::Unconfigured => {}
            Lifecycle::Configured(_) => return Err(PipelineError::AlreadyConfigured),
            Lifecycle::TornDown => return Err(PipelineError::TornDown),
        }

        let polarity = activation.polarity();
        {
            let mut port = lock(&self.port);
            port.configure_line(line, LineConfig::edge_input(activation.pull(), polarity))
                .map_err(PipelineError::HardwareConfig)?;
            let producer = EdgeProducer::new(Arc::clone(&self.queue), line);
            if let Err(e) = port.register_edge_handler(line, polarity, producer) {
                // Leave the line unarmed.
                let idle = LineConfig::edge_input(activation.pull(), EdgePolarity::Disabled);
                if let Err(reset) = port.configure_line(line, idle) {
                    warn!("input: line {} reset after failed bind: {}", line, reset);
                }
                return Err(PipelineError::HardwareConfig(e));
            }
        }

        let window_ms = duration_to_millis(window);
        *lifecycle = Lifecycle::Configured(Binding { line, window_ms, activation });
        info!("input: line {} bound ({:?}, {} ms window)", line, activation, window_ms);
        Ok(())
    }

    /// Register the activation handler, replacing any previous one.
    ///
    /// The handler runs on the consumer task, never in interrupt context.
    pub fn set_callback(&self, handler: impl Fn() + Send + Sync + 'static) {
        *lock(&self.callback) = Some(Arc::new(handler));
    }

    /// Consumer loop.  Blocks until [`teardown`](Self::teardown).
    ///
    /// Returns immediately with `Ok(())` if the pipeline was already torn down.
    pub fn run(&self) -> Result<(), PipelineError> {
        let binding = match *lock(&self.lifecycle) {
            Lifecycle::Unconfigured => return Err(PipelineError::NotConfigured),
            Lifecycle::TornDown => return Ok(()),
            Lifecycle::Configured(binding) => binding,
        };
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::AlreadyRunning);
        }
        let _running = RunningFlag(&self.running);

        let mut debounce = DebounceState::new(binding.window_ms);
        info!("input: line {} consumer started", binding.line);

        while let Some(event) = self.queue.recv() {
            self.service(&binding, &mut debounce, event);
        }

        info!("input: line {} consumer stopped", binding.line);
        Ok(())
    }

    /// Unregister the interrupt, close the queue and release a blocked
    /// [`run`](Self::run).  Calls after the first are no-ops.
    pub fn teardown(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        match core::mem::replace(&mut *lifecycle, Lifecycle::TornDown) {
            Lifecycle::TornDown => return,
            Lifecycle::Configured(binding) => {
                lock(&self.port).unregister_edge_handler(binding.line);
                info!("input: line {} released", binding.line);
            }
            Lifecycle::Unconfigured => {}
        }
        self.queue.close();
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(*lock(&self.lifecycle), Lifecycle::TornDown)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.counters.accepted.load(Ordering::Acquire),
            debounced: self.counters.debounced.load(Ordering::Acquire),
            rejected_level: self.counters.rejected_level.load(Ordering::Acquire),
            dropped: self.queue.dropped(),
        }
    }

    fn service(&self, binding: &Binding, debounce: &mut DebounceState, event: EdgeEvent) -> EdgeOutcome {
        let now = self.clock.now();
        let outcome = debounce.evaluate(now, binding.activation.active_level(), || {
            lock(&self.port).read_level(binding.line)
        });

        // Counters are bumped after the outcome is final (callback included)
        // so `stats().processed()` only moves once an edge is fully handled.
        match outcome {
            EdgeOutcome::Debounced => {
                trace!("input: line {} edge at {} ms debounced", event.line, now.as_millis());
                self.counters.debounced.fetch_add(1, Ordering::AcqRel);
            }
            EdgeOutcome::LevelMismatch => {
                debug!("input: line {} edge at {} ms, line already idle", event.line, now.as_millis());
                self.counters.rejected_level.fetch_add(1, Ordering::AcqRel);
            }
            EdgeOutcome::Accepted => {
                debug!("input: line {} activation at {} ms", event.line, now.as_millis());
                let handler = lock(&self.callback).clone();
                match handler {
                    Some(handler) => handler(),
                    None => warn!("input: line {} activation with no callback", event.line),
                }
                self.counters.accepted.fetch_add(1, Ordering::AcqRel);
            }
        }
        outcome
    }
}

impl<P: LinePort + EdgeInterruptPort, C: Clock> Drop for InputEventPipeline<P, C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Clears the single-consumer flag on every exit from `run`, unwinds included.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
