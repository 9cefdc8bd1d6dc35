//! Sample format and channel conversion.
//!
//! Everything here runs inside the real-time callback: no allocation, no locks.

mod convert;

pub use convert::{downmix, sanitize_sample};
