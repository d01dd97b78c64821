//! Request handlers.

pub mod health;
pub mod narratives;
pub mod runs;

pub use health::*;
pub use narratives::*;
pub use runs::*;
