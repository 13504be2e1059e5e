//! Core systems for Horizon Compositor.
//!
//! This crate provides the event-loop plumbing shared by the compositing crates:
//!
//! - **Timers**: One-shot timers keyed by [`TimerId`], used to
//!   defer and coalesce redraw work
//! - **Errors**: The core error taxonomy ([`CoreError`], [`TimerError`])
//! - **Logging**: `tracing` target names and performance spans
//!
//! # Timer Example
//!
//! ```
//! use horizon_compositor_core::TimerManager;
//! use std::time::{Duration, Instant};
//!
//! let mut timers = TimerManager::new();
//! let id = timers.start_one_shot(Duration::from_millis(20));
//!
//! // Nothing is due yet.
//! assert!(timers.process_expired_at(Instant::now()).is_empty());
//!
//! // Once the deadline has passed the timer fires exactly once.
//! let fired = timers.process_expired_at(Instant::now() + Duration::from_millis(25));
//! assert_eq!(fired, vec![id]);
//! assert!(!timers.is_active(id));
//! ```

mod error;
pub mod logging;
mod timer;

pub use error::{CoreError, Result, TimerError};
pub use logging::PerfSpan;
pub use timer::{TimerId, TimerManager};
