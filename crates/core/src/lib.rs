#![warn(clippy::all, missing_docs)]

//! Core engine for the bannerwatch client.
//!
//! This crate hosts the wire models, configuration handling, the refresh
//! scheduler with its hash-gated snapshot store, countdown derivation and
//! per-game status aggregation used by the terminal UI and any future
//! frontends.

pub mod api;
pub mod config;
pub mod countdown;
pub mod error;
pub mod i18n;
pub mod images;
pub mod models;
pub mod refresh;
pub mod snapshot;
pub mod status;
pub mod time;

pub use api::{ApiClient, DataSource};
pub use config::AppConfig;
pub use countdown::{BannerCountdown, CountdownEngine, Lifecycle, Remaining};
pub use error::{FetchError, ValidationError};
pub use models::{Banner, Envelope, GameId, GameStatus, StatusKind, VersionPhase};
pub use refresh::{RefreshCommand, RefreshScheduler, SyncEvent};
pub use snapshot::{HashGate, SnapshotCache, SnapshotStore};
pub use time::{ManualClock, SystemClock, TimeSource};
