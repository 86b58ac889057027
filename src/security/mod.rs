//! Admission control.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (derive key, check-and-increment the key's window)
//!     → admitted: pass to the gateway
//!     → rejected: 429 with retry-after
//! ```
//!
//! # Design Decisions
//! - The check runs before routing, so unmatched paths consume budget too
//! - Check-and-increment is atomic per key

pub mod rate_limit;

pub use rate_limit::{Admission, FixedWindowLimiter, RateLimit};
