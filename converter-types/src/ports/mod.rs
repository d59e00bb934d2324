//! Port traits (interfaces for adapters).
//!
//! The engine depends on these traits, not on concrete HTTP or storage code.

mod rate_source;
mod store;

pub use rate_source::RateSource;
pub use store::KeyValueStore;
