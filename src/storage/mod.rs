//! Event persistence

pub mod events;

pub use events::*;
