//! Profile edits and persistence.

use std::path::Path;

use shark_core::config::Config;
use shark_core::types::{GameType, PlayerProfile};

pub const SKILL_MIN: u8 = 1;
pub const SKILL_MAX: u8 = 10;

/// Rename the player. Blank names are ignored; the stored name is trimmed.
pub fn rename(profile: &mut PlayerProfile, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    profile.name = name.to_string();
}

pub fn set_skill(profile: &mut PlayerProfile, level: u8) {
    profile.skill_level = level.clamp(SKILL_MIN, SKILL_MAX);
}

/// Add the game to the preferred list, or drop it if already there.
pub fn toggle_game(profile: &mut PlayerProfile, game: GameType) {
    if let Some(index) = profile.preferred_games.iter().position(|g| *g == game) {
        profile.preferred_games.remove(index);
    } else {
        profile.preferred_games.push(game);
    }
}

pub fn toggle_pro(profile: &mut PlayerProfile) {
    profile.is_pro = !profile.is_pro;
}

pub fn record_result(profile: &mut PlayerProfile, won: bool) {
    if won {
        profile.wins += 1;
    } else {
        profile.losses += 1;
    }
}

/// Store the profile in the config and write it out.
pub fn save_profile(
    config: &mut Config,
    path: &Path,
    profile: PlayerProfile,
) -> anyhow::Result<()> {
    config.profile = Some(profile);
    config.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_trims_and_ignores_blank() {
        let mut profile = PlayerProfile::default();
        rename(&mut profile, "  Minnesota Fats  ");
        assert_eq!(profile.name, "Minnesota Fats");

        rename(&mut profile, "   ");
        assert_eq!(profile.name, "Minnesota Fats");
    }

    #[test]
    fn test_skill_clamps_to_range() {
        let mut profile = PlayerProfile::default();
        set_skill(&mut profile, 0);
        assert_eq!(profile.skill_level, 1);
        set_skill(&mut profile, 11);
        assert_eq!(profile.skill_level, 10);
        set_skill(&mut profile, 7);
        assert_eq!(profile.skill_level, 7);
    }

    #[test]
    fn test_toggle_game() {
        let mut profile = PlayerProfile::default();
        assert_eq!(
            profile.preferred_games,
            vec![GameType::EightBall, GameType::NineBall]
        );

        toggle_game(&mut profile, GameType::NineBall);
        assert_eq!(profile.preferred_games, vec![GameType::EightBall]);

        toggle_game(&mut profile, GameType::OnePocket);
        assert_eq!(
            profile.preferred_games,
            vec![GameType::EightBall, GameType::OnePocket]
        );
    }

    #[test]
    fn test_toggle_pro_and_results() {
        let mut profile = PlayerProfile::default();
        toggle_pro(&mut profile);
        assert!(profile.is_pro);
        toggle_pro(&mut profile);
        assert!(!profile.is_pro);

        record_result(&mut profile, true);
        record_result(&mut profile, false);
        assert_eq!(profile.wins, 13);
        assert_eq!(profile.losses, 5);
    }

    #[test]
    fn test_save_profile_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        let mut profile = PlayerProfile::default();
        rename(&mut profile, "Luther Lassiter");
        set_skill(&mut profile, 9);
        save_profile(&mut config, &path, profile).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.profile().name, "Luther Lassiter");
        assert_eq!(loaded.profile().skill_level, 9);
    }
}
