//! Core types shared across the relay.

pub mod generation;
pub mod ids;
pub mod message;
pub mod stream;

pub use generation::*;
pub use ids::*;
pub use message::*;
pub use stream::*;
