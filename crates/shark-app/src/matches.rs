//! Match finder — seeded nearby listings plus AI venue suggestions.

use tracing::warn;

use shark_core::types::{Coordinates, GameType, GroundingLink, MatchEvent, MatchKind};
use shark_gemini::{GenerateRequest, TextClient, Turn};

pub const MIN_RADIUS_MILES: f64 = 1.0;
pub const MAX_RADIUS_MILES: f64 = 50.0;

/// The listings every scan draws from. Live event ingestion is not wired up
/// yet, so the board is seeded.
pub fn seeded_events() -> Vec<MatchEvent> {
    vec![
        MatchEvent {
            id: "e1".into(),
            title: "Amateur 8-Ball Shootout".into(),
            kind: MatchKind::Tournament,
            distance_miles: 1.2,
            location_name: "The Break Room".into(),
            start_time: "Tonight, 7:00 PM".into(),
            game_type: GameType::EightBall,
            organizer: "Shark County Official".into(),
            description: "Double elimination. $20 entry fee. House adds $100.".into(),
            is_sponsored: false,
        },
        MatchEvent {
            id: "e2".into(),
            title: "Match: Looking for 9-Ball Partner".into(),
            kind: MatchKind::Match,
            distance_miles: 0.8,
            location_name: "Tavern On The Green".into(),
            start_time: "Tomorrow, 6:00 PM".into(),
            game_type: GameType::NineBall,
            organizer: "Player_Ace".into(),
            description: "Casual games. Just looking to practice and meet new players.".into(),
            is_sponsored: false,
        },
    ]
}

/// Listings within the radius, in their original order.
pub fn events_within(events: &[MatchEvent], radius_miles: f64) -> Vec<MatchEvent> {
    events
        .iter()
        .filter(|e| e.distance_miles <= radius_miles)
        .cloned()
        .collect()
}

/// Ask the model for pool halls near the player, via search grounding.
///
/// The suggestions are the grounding citations, not the reply text. Failure
/// means no suggestions, never a failed scan.
pub async fn suggest_venues(
    client: &dyn TextClient,
    model: &str,
    coordinates: Coordinates,
    radius_miles: f64,
) -> Vec<GroundingLink> {
    let prompt = format!(
        "List the names and web addresses of highly rated pool halls, billiards clubs, \
         or sports bars with pool tables within a {radius_miles} mile radius of \
         coordinates {}, {}.",
        coordinates.lat, coordinates.lng
    );

    let request = GenerateRequest {
        model: model.to_string(),
        system_instruction: None,
        turns: vec![Turn::user_text(prompt)],
        search_grounding: true,
    };

    match client.generate(&request).await {
        Ok(reply) => reply.links,
        Err(e) => {
            warn!(%e, "Venue search failed");
            Vec::new()
        }
    }
}

/// Result of one scan: filtered listings plus venue suggestions.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub events: Vec<MatchEvent>,
    pub venues: Vec<GroundingLink>,
}

/// Scan around the player.
pub async fn scan(
    client: &dyn TextClient,
    model: &str,
    coordinates: Coordinates,
    radius_miles: f64,
) -> ScanReport {
    ScanReport {
        events: events_within(&seeded_events(), radius_miles),
        venues: suggest_venues(client, model, coordinates, radius_miles).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shark_gemini::{GenerateReply, Part};

    use super::*;

    struct FakeClient {
        reply: anyhow::Result<GenerateReply>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait]
    impl TextClient for FakeClient {
        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateReply> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => anyhow::bail!("{e}"),
            }
        }
    }

    fn coords() -> Coordinates {
        Coordinates {
            lat: 40.7,
            lng: -74.0,
        }
    }

    #[test]
    fn test_radius_filter_keeps_order() {
        let all = seeded_events();
        let within = events_within(&all, 10.0);
        assert_eq!(within.len(), 2);
        assert_eq!(within[0].id, "e1");
        assert_eq!(within[1].id, "e2");
    }

    #[test]
    fn test_tight_radius_drops_far_events() {
        let within = events_within(&seeded_events(), 1.0);
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].id, "e2");

        assert!(events_within(&seeded_events(), 0.5).is_empty());
    }

    #[tokio::test]
    async fn test_venue_prompt_shape() {
        let client = FakeClient {
            reply: Ok(GenerateReply::default()),
            seen: Mutex::new(Vec::new()),
        };
        suggest_venues(&client, "gemini-3-flash-preview", coords(), 10.0).await;

        let seen = client.seen.lock().unwrap();
        assert!(seen[0].search_grounding);
        assert!(seen[0].system_instruction.is_none());
        let Part::Text(prompt) = &seen[0].turns[0].parts[0] else {
            panic!("expected a text part");
        };
        assert!(prompt.contains("within a 10 mile radius of coordinates 40.7, -74."));
        assert!(prompt.starts_with("List the names and web addresses"));
    }

    #[tokio::test]
    async fn test_scan_composes_events_and_venues() {
        let client = FakeClient {
            reply: Ok(GenerateReply {
                text: "Found some.".into(),
                links: vec![GroundingLink {
                    uri: "https://rack.example".into(),
                    title: "The Rack".into(),
                }],
            }),
            seen: Mutex::new(Vec::new()),
        };

        let report = scan(&client, "gemini-3-flash-preview", coords(), 1.0).await;
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.venues.len(), 1);
        assert_eq!(report.venues[0].title, "The Rack");
    }

    #[tokio::test]
    async fn test_venue_failure_yields_empty_suggestions() {
        let client = FakeClient {
            reply: Err(anyhow::anyhow!("quota")),
            seen: Mutex::new(Vec::new()),
        };

        let report = scan(&client, "gemini-3-flash-preview", coords(), 10.0).await;
        // The listing side of the scan is unaffected
        assert_eq!(report.events.len(), 2);
        assert!(report.venues.is_empty());
    }
}
