//! Character name to local image path lookup.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_INDEX: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Genshin Impact
        ("neuvillette", "/images/genshin/fontaine/neuvillette.webp"),
        ("zibai", "/images/genshin/liyue/zibai.webp"),
        // Zenless Zone Zero
        ("sunna", "/images/zzz/season2/sunna.webp?v=update-01"),
        ("yixuan", "/images/zzz/season2/yixuan.webp?v=update-01"),
        // Honkai: Star Rail
        ("blackswan", "/images/hsr/penacony/blackswan.webp?v=update-02"),
        ("evernight", "/images/hsr/amphoreus/evernight.webp?v=initial"),
        ("hysilens", "/images/hsr/amphoreus/hysilens.webp?v=update-01"),
        ("yaoguang", "/images/hsr/planarcadia/yaoguang.webp?v=initial"),
    ])
});

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

/// Lowercase `name` and strip all whitespace (`"Black Swan"` → `"blackswan"`).
pub fn normalize_name(name: &str) -> String {
    WHITESPACE_RE
        .replace_all(name.trim(), "")
        .to_lowercase()
}

/// Image path for `name`, or `fallback` when the character is not mapped.
pub fn resolve_image<'a>(name: &str, fallback: &'a str) -> &'a str {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return fallback;
    }
    match IMAGE_INDEX.get(normalized.as_str()) {
        Some(path) => *path,
        None => fallback,
    }
}
