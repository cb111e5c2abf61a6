//! # Controller
//!
//! The reconciliation loop and its watch fan-in wiring, plus the Fibonacci
//! backoff used by `runtime::error_policy`.

pub mod backoff;
pub mod reconciler;
pub mod watches;
