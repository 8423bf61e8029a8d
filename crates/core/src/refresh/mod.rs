//! Background refresh of the banner snapshot.

mod policy;
mod scheduler;

pub use policy::{Backoff, RefreshPolicy};
pub use scheduler::{
    AttemptSequencer, RefreshCommand, RefreshScheduler, RefreshState, RefreshTrigger, SyncEvent,
};
