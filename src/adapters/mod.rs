//! Adapters: concrete implementations of the port traits that are not
//! peripheral drivers.
//!
//! | Adapter    | Implements     | Connects to                    |
//! |------------|----------------|--------------------------------|
//! | `log_sink` | EventSink      | Serial log output              |
//! | `time`     | Clock, DelayNs | ESP32 system timer, task delay |

pub mod log_sink;
pub mod time;
