//! Unified error types for the PegaVox firmware.
//!
//! Each subsystem has its own small `Copy` enum; all of them convert into
//! the crate-level [`Error`] so the boot sequence can funnel failures
//! through one type (and from there into `anyhow` in `main`).

use core::fmt;

use crate::app::ports::PortError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The button pipeline could not be set up or run.
    Pipeline(PipelineError),
    /// The sensor bus could not be brought up.
    Bus(BusError),
    /// A raw port operation failed outside either subsystem.
    Port(PortError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(e) => write!(f, "pipeline: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Port(e) => write!(f, "port: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Input pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    /// The line could not be put into interrupt-capable input mode.
    HardwareConfig(PortError),
    /// `configure` was called on a pipeline that is already bound.
    AlreadyConfigured,
    /// `run` was called before `configure`.
    NotConfigured,
    /// Another consumer is already draining this pipeline.
    AlreadyRunning,
    /// The pipeline has been torn down and cannot be rebound.
    TornDown,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareConfig(e) => write!(f, "line configuration failed: {e}"),
            Self::AlreadyConfigured => write!(f, "already configured"),
            Self::NotConfigured => write!(f, "not configured"),
            Self::AlreadyRunning => write!(f, "consumer already running"),
            Self::TornDown => write!(f, "torn down"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The supplied bus configuration is unusable.
    InvalidConfig(&'static str),
    /// The peripheral rejected the configuration or the driver install failed.
    Init(PortError),
    /// `recover` was called before any configuration was supplied.
    NotConfigured,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Init(e) => write!(f, "init failed: {e}"),
            Self::NotConfigured => write!(f, "no configuration to recover with"),
        }
    }
}

impl std::error::Error for BusError {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
