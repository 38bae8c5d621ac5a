//! Dashboard stats — win rate, weekly trend, invite link.

use shark_core::types::PlayerProfile;

/// Wins per day for the trend chart. Per-day tracking is not wired up yet.
pub const WEEKLY_TREND: [(&str, u32); 7] = [
    ("Mon", 2),
    ("Tue", 3),
    ("Wed", 1),
    ("Thu", 5),
    ("Fri", 4),
    ("Sat", 8),
    ("Sun", 6),
];

pub const APP_ORIGIN: &str = "https://shark-county.app";

/// Win percentage rounded to the nearest whole point. Zero games is 0, not
/// undefined.
pub fn win_rate(profile: &PlayerProfile) -> u32 {
    let games = profile.wins + profile.losses;
    if games == 0 {
        return 0;
    }
    ((profile.wins as f64 / games as f64) * 100.0).round() as u32
}

/// Shareable profile link. An empty id falls back to "shark".
pub fn invite_link(profile: &PlayerProfile) -> String {
    let id = if profile.id.is_empty() {
        "shark"
    } else {
        &profile.id
    };
    format!("{APP_ORIGIN}/#/profile?ref={id}")
}
