//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → navigation driver, attached history forwarders exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → trigger() → CLI stops waiting on in-flight work
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task holds its own receiver
//! - Tasks stop at their next select point; in-flight loaders are abandoned,
//!   never force-aborted mid-poll

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
