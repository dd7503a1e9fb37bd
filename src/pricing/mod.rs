//! Reserve math, price resolution and time-weighted averages

pub mod oracle;
pub mod reserve_math;
pub mod twap;

pub use oracle::*;
pub use reserve_math::*;
pub use twap::*;
