//! Type definitions

pub mod address;
pub mod availability;
pub mod job;
pub mod snapshot;
pub mod technician;
pub mod unit;

pub use address::*;
pub use availability::*;
pub use job::*;
pub use snapshot::*;
pub use technician::*;
pub use unit::*;
