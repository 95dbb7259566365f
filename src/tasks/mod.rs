//! Background Tasks Module
//!
//! Background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Idle sweep: Removes expired cache entries at the configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
