//! Core-pinned thread spawning for ESP32-S3 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread, so the config→spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::ffi::CStr;
use std::io;
use std::thread::JoinHandle;

use crate::config::TaskConfig;

/// CPU core identifiers for the ESP32-S3 Xtensa LX7 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU), shared with the protocol stacks.
    Pro = 0,
    /// Core 1 (APP_CPU), application logic.
    App = 1,
}

/// Where and how a task runs.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    pub name: &'static CStr,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    pub fn from_config(name: &'static CStr, core: Core, config: &TaskConfig) -> Self {
        Self { name, core, priority: config.priority, stack_kb: config.stack_kb }
    }

    fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }
}

/// Spawn a thread pinned to `spec.core` with the given priority and stack.
#[cfg(target_os = "espidf")]
pub fn spawn_pinned(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config is copied by esp_pthread_set_cfg; `thread_name`
    // points at a 'static NUL-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as _;
        cfg.prio = spec.priority as _;
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new().name(spec.display_name()).spawn(f)
}

/// Simulation fallback, ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_pinned(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}
