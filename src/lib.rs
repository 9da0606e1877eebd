//! Distributed resource reclamation.
//!
//! Detects when the in-process proxy of a cluster-wide resource (cached
//! partitions, shuffle output, a broadcast, an accumulator, checkpoint
//! artifacts) becomes unreachable and asks the owning subsystem to remove
//! the resource, exactly once.

mod cleaner;
mod config;
mod errors;
pub mod metrics;
mod network;
mod storage;
pub mod utils;

pub use cleaner::*;
pub use config::*;
pub use errors::*;
pub use network::*;
pub use storage::*;


//-----------------------------------------------------------
// Test utils
