//! Shared domain models mirroring the banner API contract.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Game backends tracked by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    /// Genshin Impact.
    Genshin,
    /// Honkai: Star Rail.
    Hsr,
    /// Zenless Zone Zero.
    Zzz,
}

impl GameId {
    /// Every known game, in display order.
    pub const ALL: [GameId; 3] = [GameId::Genshin, GameId::Hsr, GameId::Zzz];

    /// Wire identifier used by the API (`genshin`, `hsr`, `zzz`).
    pub fn as_str(&self) -> &'static str {
        match self {
            GameId::Genshin => "genshin",
            GameId::Hsr => "hsr",
            GameId::Zzz => "zzz",
        }
    }

    /// Translation key for the full game title.
    pub fn title_key(&self) -> &'static str {
        match self {
            GameId::Genshin => "game.genshin",
            GameId::Hsr => "game.hsr",
            GameId::Zzz => "game.zzz",
        }
    }

    /// Translation key for the short navigation label.
    pub fn nav_key(&self) -> &'static str {
        match self {
            GameId::Genshin => "nav.genshin",
            GameId::Hsr => "nav.hsr",
            GameId::Zzz => "nav.zzz",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed promotional event for a single game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    /// Stable identifier assigned by the server.
    pub id: String,
    /// Game the banner belongs to.
    pub game_id: GameId,
    /// Primary display name.
    pub character: String,
    /// Opening instant; banners without one are considered already open.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Closing instant.
    pub end_date: DateTime<Utc>,
    /// Presentation hint (hex colour such as `#60A5FA`).
    #[serde(default)]
    pub color: String,
    /// Names of every featured character, in server order.
    #[serde(default)]
    pub featured_characters: Vec<String>,
}

impl Banner {
    /// Check the banner window invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(start) = self.start_date {
            if start >= self.end_date {
                return Err(ValidationError::BannerWindow {
                    id: self.id.clone(),
                    start,
                    end: self.end_date,
                });
            }
        }
        Ok(())
    }
}

/// Server-reported health of a game backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Data was fetched normally.
    Ok,
    /// The game is in scheduled maintenance.
    Maintenance,
    /// The server failed to fetch data for the game.
    Error,
}

/// Per-game status entry of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    /// Game the status refers to.
    pub game_id: GameId,
    /// Reported status.
    pub status: StatusKind,
    /// Number of banners the server holds for the game.
    #[serde(default)]
    pub banner_count: u32,
}

/// One half of a game's version cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPhase {
    /// Stable identifier, used to request banner history.
    pub phase_id: String,
    /// Game the phase belongs to.
    pub game_id: GameId,
    /// Display label such as `5.3`.
    pub version: String,
    /// Half of the version cycle (1 or 2).
    pub phase: u8,
    /// Opening instant.
    pub start_date: DateTime<Utc>,
    /// Closing instant.
    pub end_date: DateTime<Utc>,
}

impl VersionPhase {
    /// Check the phase number and window invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.phase, 1 | 2) {
            return Err(ValidationError::PhaseNumber {
                id: self.phase_id.clone(),
                phase: self.phase,
            });
        }
        if self.start_date >= self.end_date {
            return Err(ValidationError::PhaseWindow {
                id: self.phase_id.clone(),
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Label such as `5.3 · 2`.
    pub fn label(&self) -> String {
        format!("{} · {}", self.version, self.phase)
    }
}

/// Full snapshot returned by the banners endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Banners currently published by the server.
    pub banners: Vec<Banner>,
    /// Per-game statuses.
    pub game_statuses: Vec<GameStatus>,
    /// When the server computed the snapshot.
    pub fetched_at: DateTime<Utc>,
    /// When the server expects fresh data to be available.
    pub next_refresh_at: DateTime<Utc>,
    /// Opaque change-detection token.
    pub data_hash: String,
}

impl Envelope {
    /// Validate every contained banner and the refresh window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_refresh_window(&self.data_hash, self.fetched_at, self.next_refresh_at)?;
        for banner in &self.banners {
            banner.validate()?;
        }
        Ok(())
    }

    /// Banners belonging to `game`.
    pub fn banners_for(&self, game: GameId) -> impl Iterator<Item = &Banner> {
        self.banners
            .iter()
            .filter(move |banner| banner.game_id == game)
    }

    /// Status reported for `game`, if any.
    pub fn status_for(&self, game: GameId) -> Option<&GameStatus> {
        self.game_statuses
            .iter()
            .find(|status| status.game_id == game)
    }
}

/// Lightweight payload of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Per-game statuses.
    pub game_statuses: Vec<GameStatus>,
    /// Hash of the full envelope content.
    pub data_hash: String,
    /// When the server computed the snapshot.
    pub fetched_at: DateTime<Utc>,
    /// When the server expects fresh data to be available.
    pub next_refresh_at: DateTime<Utc>,
}

impl StatusResponse {
    /// Validate the refresh window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_refresh_window(&self.data_hash, self.fetched_at, self.next_refresh_at)
    }
}

/// Payload of the versions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsResponse {
    /// Game the versions belong to.
    pub game_id: GameId,
    /// Phases, newest first.
    pub versions: Vec<VersionPhase>,
}

impl VersionsResponse {
    /// Validate each phase and return them sorted newest first.
    pub fn into_phases(self) -> Result<Vec<VersionPhase>, ValidationError> {
        let mut phases = self.versions;
        for phase in &phases {
            phase.validate()?;
            if phase.game_id != self.game_id {
                return Err(ValidationError::ForeignPhase {
                    id: phase.phase_id.clone(),
                    expected: self.game_id,
                    found: phase.game_id,
                });
            }
        }
        phases.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        for pair in phases.windows(2) {
            if pair[1].end_date > pair[0].start_date {
                return Err(ValidationError::PhaseOverlap {
                    newer: pair[0].phase_id.clone(),
                    older: pair[1].phase_id.clone(),
                });
            }
        }
        Ok(phases)
    }
}

/// Payload of the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Phase the banners ran in.
    pub phase: VersionPhase,
    /// Banners that ran during the phase.
    pub banners: Vec<Banner>,
}

impl HistoryResponse {
    /// Validate the phase and every banner.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.phase.validate()?;
        for banner in &self.banners {
            banner.validate()?;
        }
        Ok(())
    }
}

fn validate_refresh_window(
    data_hash: &str,
    fetched_at: DateTime<Utc>,
    next_refresh_at: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if data_hash.trim().is_empty() {
        return Err(ValidationError::EmptyHash);
    }
    if fetched_at > next_refresh_at {
        return Err(ValidationError::RefreshWindow {
            fetched_at,
            next_refresh_at,
        });
    }
    Ok(())
}
