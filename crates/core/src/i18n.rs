//! Locale-keyed string lookup.
//!
//! Unresolved keys fall back to the key itself so a missing translation is
//! visible but never fatal.

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Supported display languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Spanish.
    #[default]
    Es,
    /// English.
    En,
}

impl Locale {
    /// Every supported locale.
    pub const ALL: [Locale; 2] = [Locale::Es, Locale::En];

    /// The other locale; used by the UI toggle.
    pub fn toggled(self) -> Self {
        match self {
            Locale::Es => Locale::En,
            Locale::En => Locale::Es,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::Es => "es",
            Locale::En => "en",
        })
    }
}

type Table = HashMap<&'static str, &'static str>;

static ES: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("nav.all", "Todos"),
        ("nav.genshin", "Genshin"),
        ("nav.hsr", "HSR"),
        ("nav.zzz", "ZZZ"),
        ("game.genshin", "Genshin Impact"),
        ("game.hsr", "Honkai: Star Rail"),
        ("game.zzz", "Zenless Zone Zero"),
        ("nav.server", "Servidor"),
        ("server.america", "América"),
        ("server.europe", "Europa"),
        ("server.asia", "Asia"),
        ("server.sar", "SAR"),
        ("header.sync", "Sincronizado con servidores oficiales"),
        ("loading.message", "Consultando el rastro galáctico..."),
        ("error.title", "Error de Sincronización"),
        (
            "empty.message",
            "No se detectaron anomalías temporales para esta sección.",
        ),
        ("empty.submessage", "Vuelve en la siguiente actualización"),
        ("card.finished", "EXPIRADO"),
        ("card.open", "Portal Abierto"),
        ("card.upcoming", "Próximamente"),
        ("card.view", "Ver a"),
        ("card.sync", "SYNC_UTC"),
        ("card.days", "D"),
        ("card.hours", "H"),
        ("card.minutes", "M"),
        ("card.seconds", "S"),
        ("status.ok", "Operativo"),
        ("status.unknown", "Sin datos"),
        (
            "status.maintenance",
            "Sin banners activos — posible mantenimiento",
        ),
        ("status.error", "Error al obtener datos de este juego"),
        ("sync.fetching", "Sincronizando..."),
        ("sync.degraded", "Conexión degradada, reintentando"),
        ("sync.cooldown", "Espera antes de volver a actualizar"),
        ("versions.title", "Versiones"),
        ("history.title", "Historial"),
        ("ui.restored", "Instantánea en caché restaurada"),
        ("ui.status", "Estado"),
        ("ui.banner", "Banner"),
        ("ui.pick_game", "Elige primero una pestaña de juego"),
        ("sync.unavailable", "Planificador de actualización no disponible"),
        ("sync.next", "siguiente"),
        ("sync.retry_in", "reintento en"),
        ("detail.image", "Imagen"),
        ("detail.start", "Inicio"),
        ("detail.end", "Fin"),
        ("help.refresh", "actualizar"),
        ("help.versions", "versiones"),
        ("help.quit", "salir"),
        ("footer.madeBy", "Hecho por"),
        (
            "footer.disclaimer",
            "Este sitio es un proyecto fan no afiliado ni respaldado por COGNOSPHERE PTE. LTD. ni HoYoverse. Genshin Impact, Honkai: Star Rail y Zenless Zone Zero son marcas registradas de COGNOSPHERE PTE. LTD.",
        ),
    ])
});

static EN: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("nav.all", "All"),
        ("nav.genshin", "Genshin"),
        ("nav.hsr", "HSR"),
        ("nav.zzz", "ZZZ"),
        ("game.genshin", "Genshin Impact"),
        ("game.hsr", "Honkai: Star Rail"),
        ("game.zzz", "Zenless Zone Zero"),
        ("nav.server", "Server"),
        ("server.america", "America"),
        ("server.europe", "Europe"),
        ("server.asia", "Asia"),
        ("server.sar", "SAR"),
        ("header.sync", "Synchronized with official servers"),
        ("loading.message", "Scanning the galactic trail..."),
        ("error.title", "Synchronization Error"),
        (
            "empty.message",
            "No temporal anomalies detected in this sector.",
        ),
        ("empty.submessage", "Check back in the next update"),
        ("card.finished", "Event Finished"),
        ("card.open", "Portal Open"),
        ("card.upcoming", "Coming Soon"),
        ("card.view", "View"),
        ("card.sync", "SYNC_UTC"),
        ("card.days", "D"),
        ("card.hours", "H"),
        ("card.minutes", "M"),
        ("card.seconds", "S"),
        ("status.ok", "Operational"),
        ("status.unknown", "No data"),
        (
            "status.maintenance",
            "No active banners — possible maintenance",
        ),
        ("status.error", "Error fetching data for this game"),
        ("sync.fetching", "Synchronizing..."),
        ("sync.degraded", "Connection degraded, retrying"),
        ("sync.cooldown", "Wait before refreshing again"),
        ("versions.title", "Versions"),
        ("history.title", "History"),
        ("ui.restored", "Restored cached snapshot"),
        ("ui.status", "Status"),
        ("ui.banner", "Banner"),
        ("ui.pick_game", "Select a game tab first"),
        ("sync.unavailable", "Refresh scheduler unavailable"),
        ("sync.next", "next"),
        ("sync.retry_in", "retry in"),
        ("detail.image", "Image"),
        ("detail.start", "Start"),
        ("detail.end", "End"),
        ("help.refresh", "refresh"),
        ("help.versions", "versions"),
        ("help.quit", "quit"),
        ("footer.madeBy", "Made by"),
        (
            "footer.disclaimer",
            "This is a fan project not affiliated with or endorsed by COGNOSPHERE PTE. LTD. or HoYoverse. Genshin Impact, Honkai: Star Rail, and Zenless Zone Zero are trademarks of COGNOSPHERE PTE. LTD.",
        ),
    ])
});

fn table(locale: Locale) -> &'static Table {
    match locale {
        Locale::Es => &ES,
        Locale::En => &EN,
    }
}

/// String lookup bound to a selected locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    locale: Locale,
}

impl Translator {
    /// Translator for `locale`.
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Active locale.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Switch the active locale.
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    /// Translate `key`, returning the key itself when the table has no entry.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        match table(self.locale).get(key) {
            Some(value) => *value,
            None => key,
        }
    }
}
