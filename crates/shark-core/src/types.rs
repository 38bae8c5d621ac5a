use serde::{Deserialize, Serialize};

/// Game variants played in Shark County.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "8-Ball")]
    EightBall,
    #[serde(rename = "9-Ball")]
    NineBall,
    #[serde(rename = "10-Ball")]
    TenBall,
    #[serde(rename = "Straight Pool")]
    StraightPool,
    #[serde(rename = "One Pocket")]
    OnePocket,
}

impl GameType {
    pub const ALL: [GameType; 5] = [
        GameType::EightBall,
        GameType::NineBall,
        GameType::TenBall,
        GameType::StraightPool,
        GameType::OnePocket,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GameType::EightBall => "8-Ball",
            GameType::NineBall => "9-Ball",
            GameType::TenBall => "10-Ball",
            GameType::StraightPool => "Straight Pool",
            GameType::OnePocket => "One Pocket",
        }
    }

    /// Parse a display label (case-insensitive).
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

/// A player of the county.
///
/// Mutated only through the profile editor; everywhere else it is a
/// read-only input to prompt construction and stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: String,
    pub name: String,
    /// Self-assessed skill, 1 (novice) to 10 (shark).
    pub skill_level: u8,
    pub preferred_games: Vec<GameType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    pub wins: u32,
    pub losses: u32,
    pub is_pro: bool,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            id: "current-user".into(),
            name: "Shark Player".into(),
            skill_level: 5,
            preferred_games: vec![GameType::EightBall, GameType::NineBall],
            location: None,
            wins: 12,
            losses: 4,
            is_pro: false,
        }
    }
}

/// Listing kind in the match finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Match,
    Tournament,
}

/// A nearby match or tournament listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: String,
    pub title: String,
    pub kind: MatchKind,
    pub distance_miles: f64,
    pub location_name: String,
    pub start_time: String,
    pub game_type: GameType,
    pub organizer: String,
    pub description: String,
    #[serde(default)]
    pub is_sponsored: bool,
}

/// Web link extracted from search grounding metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingLink {
    pub uri: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_labels_round_trip() {
        for game in GameType::ALL {
            let json = serde_json::to_string(&game).unwrap();
            assert_eq!(json, format!("\"{}\"", game.label()));
            let back: GameType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, game);
        }
    }

    #[test]
    fn test_game_type_parse() {
        assert_eq!(GameType::parse("9-Ball"), Some(GameType::NineBall));
        assert_eq!(GameType::parse("straight pool"), Some(GameType::StraightPool));
        assert_eq!(GameType::parse(" One Pocket "), Some(GameType::OnePocket));
        assert_eq!(GameType::parse("snooker"), None);
    }

    #[test]
    fn test_default_profile() {
        let profile = PlayerProfile::default();
        assert_eq!(profile.id, "current-user");
        assert_eq!(profile.skill_level, 5);
        assert_eq!(profile.wins, 12);
        assert_eq!(profile.losses, 4);
        assert!(!profile.is_pro);
        assert_eq!(
            profile.preferred_games,
            vec![GameType::EightBall, GameType::NineBall]
        );
    }

    #[test]
    fn test_profile_camel_case_wire_format() {
        let profile = PlayerProfile::default();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["skillLevel"], 5);
        assert_eq!(json["isPro"], false);
        assert_eq!(json["preferredGames"][0], "8-Ball");
        assert!(json.get("location").is_none());
    }
}
