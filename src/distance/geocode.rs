//! ジオコーディング

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ScraperError;

use super::types::Coordinates;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "cfb_distance_calculator";

/// 地名から座標を引く
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// 見つからない場合は `Ok(None)`
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, ScraperError>;
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// OpenStreetMap Nominatim
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_url(NOMINATIM_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, ScraperError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Geocode(format!(
                "ステータス {}: {}",
                status.as_u16(),
                query
            )));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let latitude = place
            .lat
            .parse()
            .map_err(|_| ScraperError::Geocode(format!("不正な緯度 {}", place.lat)))?;
        let longitude = place
            .lon
            .parse()
            .map_err(|_| ScraperError::Geocode(format!("不正な経度 {}", place.lon)))?;

        Ok(Some(Coordinates::new(latitude, longitude)))
    }
}

/// 空欄や `-` は地名として扱わない
pub fn usable_location(location: &str) -> Option<&str> {
    let trimmed = location.trim();
    if trimmed.is_empty() || trimmed == "-" {
        None
    } else {
        Some(trimmed)
    }
}

/// 結果をメモリにキャッシュするジオコーダ（見つかったものだけ保持）
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<String, Coordinates>>,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 失敗はログに残して `None`
    pub async fn locate(&self, location: &str) -> Option<Coordinates> {
        let query = usable_location(location)?;

        if let Some(coords) = self.cache.lock().await.get(query) {
            return Some(*coords);
        }

        match self.inner.geocode(query).await {
            Ok(Some(coords)) => {
                self.cache.lock().await.insert(query.to_string(), coords);
                Some(coords)
            }
            Ok(None) => {
                debug!("ジオコーディング結果なし: {}", query);
                None
            }
            Err(e) => {
                warn!("ジオコーディングに失敗 {}: {}", query, e);
                None
            }
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, ScraperError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match query {
                "Austin, TX" => Ok(Some(Coordinates::new(30.27, -97.74))),
                "Nowhere" => Ok(None),
                _ => Err(ScraperError::Geocode("service down".into())),
            }
        }
    }

    #[test]
    fn test_usable_location() {
        assert_eq!(usable_location("  Austin, TX "), Some("Austin, TX"));
        assert_eq!(usable_location(" - "), None);
        assert_eq!(usable_location(""), None);
    }

    #[tokio::test]
    async fn test_cached_geocoder() {
        let geocoder = CachedGeocoder::new(CountingGeocoder {
            calls: AtomicUsize::new(0),
        });

        assert!(geocoder.locate("Austin, TX").await.is_some());
        assert!(geocoder.locate(" Austin, TX").await.is_some());
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 1);

        assert!(geocoder.locate("Nowhere").await.is_none());
        assert!(geocoder.locate("Error City").await.is_none());
        assert!(geocoder.locate("-").await.is_none());
        assert_eq!(geocoder.inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(geocoder.cached_len().await, 1);
    }
}
