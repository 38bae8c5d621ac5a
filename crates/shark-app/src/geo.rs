//! Player geolocation.
//!
//! Coordinates come from config when pinned, otherwise from an IP
//! geolocation lookup. Every surface that needs a position degrades
//! gracefully when neither works.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use shark_core::config::Config;
use shark_core::error::{Result, SharkError};
use shark_core::types::Coordinates;

#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates>;
}

/// Locator pinned to fixed coordinates from config.
pub struct FixedLocator(pub Coordinates);

#[async_trait]
impl Locator for FixedLocator {
    async fn locate(&self) -> Result<Coordinates> {
        Ok(self.0)
    }
}

/// Locator backed by an ip-api.com style endpoint.
pub struct IpLocator {
    client: reqwest::Client,
    url: String,
}

impl IpLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

/// Reply shape for ip-api.com. Note the longitude field is `lon`.
#[derive(Debug, Deserialize)]
struct IpApiReply {
    status: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

#[async_trait]
impl Locator for IpLocator {
    async fn locate(&self) -> Result<Coordinates> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SharkError::Location(format!("IP lookup failed: {e}")))?;

        let reply: IpApiReply = response
            .json()
            .await
            .map_err(|e| SharkError::Location(format!("IP lookup gave bad JSON: {e}")))?;

        if reply.status != "success" {
            return Err(SharkError::Location(format!(
                "IP lookup status: {}",
                reply.status
            )));
        }

        match (reply.lat, reply.lon) {
            (Some(lat), Some(lng)) => Ok(Coordinates { lat, lng }),
            _ => Err(SharkError::Location(
                "IP lookup reply missing coordinates".into(),
            )),
        }
    }
}

/// Pick a locator from config: pinned coordinates win over the IP lookup.
pub fn from_config(config: &Config) -> Box<dyn Locator> {
    if let Some(coords) = config
        .location
        .as_ref()
        .and_then(|l| l.fixed_coordinates())
    {
        return Box::new(FixedLocator(coords));
    }
    let url = config.location.clone().unwrap_or_default().ip_api_url;
    Box::new(IpLocator::new(url))
}

/// Locate the player, logging and swallowing the error.
///
/// Location-aware surfaces treat an unknown position as a degraded
/// mode rather than a failure.
pub async fn locate_or_none(locator: &dyn Locator) -> Option<Coordinates> {
    match locator.locate().await {
        Ok(coords) => Some(coords),
        Err(e) => {
            warn!("Geolocation failed: {e}");
            None
        }
    }
}
