//! Automatic reclamation of cluster-wide resources.
//!
//! ```text
//! producers ── register / track ──> TrackingRegistry (pending set)
//!                                          │
//!          reclamation pass / last release │ surface(id)
//!                                          ▼
//!                                  ReclamationQueue
//!                                          │ poll (timeout)
//!                                          ▼
//!                                      Dispatcher ──> CleanupHandlers ──> collaborators
//!                                                            │
//!                                                            └──> listeners
//! PeriodicCollector ── every interval ──> reclamation pass
//! ```
//!
//! Unreachability is decided by reference counting instead of a tracing
//! collector: a weakly registered object is reclaimable once its last `Arc`
//! is dropped, and a [`Tracked`] handle reports its own release.

mod collaborators;
mod collector;
mod context_cleaner;
mod dispatcher;
mod handlers;
mod listener;
mod queue;
mod registry;
mod task;

pub use collaborators::*;
pub use context_cleaner::*;
pub use listener::*;
pub use queue::ReclamationQueue;
pub use queue::Tracked;
pub use task::*;
