//! Single-flight - at most one in-flight execution per key.
//!
//! Callers racing on the same key queue up in FIFO order; a caller that
//! finds the resource already created by its predecessor simply returns it.
//! Scope is one process. Cross-process exclusion needs a distributed lock
//! and is not provided here.
//!
//! ## Example
//!
//! ```
//! use sourced_adapter::SingleFlight;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let flight = SingleFlight::new();
//! let value = flight.run("jwks", async { 42 }).await;
//! assert_eq!(value, 42);
//! assert_eq!(flight.in_flight(), 0);
//! # });
//! ```

mod single_flight;

pub use single_flight::{RetryPolicy, SingleFlight};
