//! Per-game health derived from server statuses.

use crate::{
    countdown::dedup_by_id,
    models::{Banner, GameId, GameStatus, StatusKind},
};

/// Health signal shown for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Reported `ok`.
    Ok,
    /// Reported `maintenance`.
    Maintenance,
    /// Reported `error`.
    Error,
    /// The server sent no status for the game.
    Unknown,
}

impl Health {
    /// Translation key describing the health.
    pub fn label_key(&self) -> &'static str {
        match self {
            Health::Ok => "status.ok",
            Health::Maintenance => "status.maintenance",
            Health::Error => "status.error",
            Health::Unknown => "status.unknown",
        }
    }
}

/// Aggregated view of one game, exposing both raw and derived signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    /// The game this view describes.
    pub game_id: GameId,
    /// Status exactly as reported by the server.
    pub reported: Option<StatusKind>,
    /// Banner count reported by the server.
    pub reported_banner_count: u32,
    /// Banners for the game present in the snapshot.
    pub live_banners: usize,
    /// Server says `ok` but there is nothing to show; a UI hint only.
    pub possible_maintenance: bool,
}

impl GameView {
    /// Passthrough of the reported status.
    pub fn health(&self) -> Health {
        match self.reported {
            Some(StatusKind::Ok) => Health::Ok,
            Some(StatusKind::Maintenance) => Health::Maintenance,
            Some(StatusKind::Error) => Health::Error,
            None => Health::Unknown,
        }
    }

    /// Whether the game should render in a degraded style.
    pub fn is_degraded(&self) -> bool {
        self.possible_maintenance || !matches!(self.health(), Health::Ok)
    }
}

/// Fold statuses and banners into one view per known game.
///
/// `error` is never derived locally; it only appears when the server reports it.
pub fn aggregate(statuses: &[GameStatus], banners: &[Banner]) -> Vec<GameView> {
    let banners = dedup_by_id(banners);
    GameId::ALL
        .iter()
        .map(|&game_id| {
            let status = statuses.iter().find(|status| status.game_id == game_id);
            let live_banners = banners
                .iter()
                .filter(|banner| banner.game_id == game_id)
                .count();
            let reported_banner_count = status.map(|status| status.banner_count).unwrap_or(0);
            let possible_maintenance = matches!(
                status.map(|status| status.status),
                Some(StatusKind::Ok)
            ) && reported_banner_count == 0
                && live_banners == 0;

            GameView {
                game_id,
                reported: status.map(|status| status.status),
                reported_banner_count,
                live_banners,
                possible_maintenance,
            }
        })
        .collect()
}
