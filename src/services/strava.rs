// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for reading activities, GPX exports and streams.
//!
//! Handles:
//! - Token refresh (on startup and when the access token is about to expire)
//! - Paginated activity listing
//! - Native GPX export with "not available" detection
//! - Raw stream download for GPX reconstruction

use crate::config::StravaConfig;
use crate::error::{Result, SyncError};
use crate::models::{Activity, ActivityBounds, ActivityFilter, ActivityStreams};
use crate::services::http::{build_client, network_error, status_error};
use crate::time_utils::parse_rfc3339_utc;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use geo::BoundingRect;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio::sync::Mutex;

const SERVICE: &str = "Strava";

/// Maximum page size accepted by `/athlete/activities`.
const PAGE_SIZE: u32 = 200;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Streams requested for GPX reconstruction.
const STREAM_KEYS: &str = "time,latlng,altitude,heartrate,cadence,watts";

/// Read access to Source activities.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// All activities matching `filter`, oldest first.
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>>;

    /// A single activity by ID.
    async fn get_activity(&self, activity_id: u64) -> Result<Activity>;

    /// The native GPX export, or `None` when Strava has none for this activity.
    async fn fetch_track_export(&self, activity_id: u64) -> Result<Option<Vec<u8>>>;

    /// Raw telemetry streams. Activities without streams yield empty streams.
    async fn fetch_streams(&self, activity_id: u64) -> Result<ActivityStreams>;
}

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Strava API client.
pub struct StravaClient {
    http: ClientWithMiddleware,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token: Mutex<Option<CachedToken>>,
}

impl StravaClient {
    /// Create a client from OAuth credentials. No network traffic happens
    /// until the first call (or `authenticate`).
    pub fn new(config: &StravaConfig, max_retries: u32) -> Result<Self> {
        Ok(Self {
            http: build_client(max_retries)?,
            base_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth/token".to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            token: Mutex::new(None),
        })
    }

    /// Exchange the refresh token for an access token now, so bad
    /// credentials surface before any work is done.
    pub async fn authenticate(&self) -> Result<()> {
        let fresh = self.refresh().await?;
        *self.token.lock().await = Some(fresh);
        tracing::info!("Authenticated with Strava");
        Ok(())
    }

    /// Get a valid (non-expired) access token, refreshing if needed.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = guard.as_ref() {
            if Utc::now() + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
            tracing::info!("Strava access token expiring, refreshing");
        }

        let fresh = self.refresh().await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    /// Refresh an access token.
    async fn refresh(&self) -> Result<CachedToken> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| network_error(SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token refresh rejected");
            return Err(SyncError::Auth(format!(
                "Strava rejected the refresh token (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(status_error(SERVICE, response, SyncError::Auth).await);
        }

        let token: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to parse token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: DateTime::from_timestamp(token.expires_at, 0).unwrap_or_default(),
        })
    }

    /// Authorized GET; returns the response whatever its status.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let access_token = self.access_token().await?;
        self.http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| network_error(SERVICE, e))
    }

    /// Authorized GET with JSON response; 404 maps to a permanent error.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get(url, query).await?;

        if !response.status().is_success() {
            return Err(status_error(SERVICE, response, SyncError::Source).await);
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Source(format!("JSON parse error: {e}")))
    }

    /// Fetch one page of activity summaries.
    async fn list_page(
        &self,
        filter: &ActivityFilter,
        page: u32,
    ) -> Result<Vec<StravaActivitySummary>> {
        let url = format!("{}/athlete/activities", self.base_url);

        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        // Strava's `after` is exclusive; step back a second to keep it inclusive.
        if let Some(after) = filter.after {
            query.push(("after", (after.timestamp() - 1).to_string()));
        }
        if let Some(before) = filter.before {
            query.push(("before", before.timestamp().to_string()));
        }

        self.get_json(&url, &query).await
    }
}

#[async_trait]
impl ActivitySource for StravaClient {
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let mut activities = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.list_page(filter, page).await?;
            if batch.is_empty() {
                break;
            }
            tracing::debug!(page, count = batch.len(), "Fetched activity page");

            for summary in batch {
                let activity = summary.into_activity()?;
                if filter.matches(&activity) {
                    activities.push(activity);
                }
            }
            page += 1;
        }

        activities.sort_by_key(|a| a.start_date);
        tracing::info!(count = activities.len(), "Listed Strava activities");
        Ok(activities)
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Activity> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        let summary: StravaActivitySummary = self.get_json(&url, &[]).await?;
        summary.into_activity()
    }

    async fn fetch_track_export(&self, activity_id: u64) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/activities/{}/export_gpx", self.base_url, activity_id);
        let response = self.get(&url, &[]).await?;
        let status = response.status();

        if !status.is_success() {
            let err = status_error(SERVICE, response, SyncError::Source).await;
            return match err {
                SyncError::Source(_) => {
                    tracing::debug!(activity_id, status = %status, "Native GPX export not available");
                    Ok(None)
                }
                other => Err(other),
            };
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Transient(format!("Strava export body: {e}")))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }

    async fn fetch_streams(&self, activity_id: u64) -> Result<ActivityStreams> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let query = [
            ("keys", STREAM_KEYS.to_string()),
            ("key_by_type", "true".to_string()),
        ];
        let response = self.get(&url, &query).await?;

        // Manual and indoor activities have no streams at all
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ActivityStreams::default());
        }
        if !response.status().is_success() {
            return Err(status_error(SERVICE, response, SyncError::Source).await);
        }

        let set: StreamSet = response
            .json()
            .await
            .map_err(|e| SyncError::Source(format!("Malformed streams payload: {e}")))?;
        Ok(set.into())
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    expires_at: i64,
}

/// Activity as returned by the list and detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Fine-grained type (MountainBikeRide, TrailRun, ...)
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Legacy coarse type
    #[serde(rename = "type", default)]
    pub legacy_type: Option<String>,
    pub start_date: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub map: Option<StravaMap>,
}

/// Activity map data with polylines.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    pub polyline: Option<String>,
    pub summary_polyline: Option<String>,
}

impl StravaActivitySummary {
    /// The type tag used for sport mapping: `sport_type`, else `type`.
    pub fn type_tag(&self) -> String {
        self.sport_type
            .as_deref()
            .or(self.legacy_type.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    }

    /// Bounding box from the detailed polyline, falling back to the summary.
    fn bounds(&self) -> Option<ActivityBounds> {
        let map = self.map.as_ref()?;
        let encoded = map
            .polyline
            .as_deref()
            .or(map.summary_polyline.as_deref())
            .filter(|p| !p.is_empty())?;
        let line = polyline::decode_polyline(encoded, 5).ok()?;
        line.bounding_rect().map(ActivityBounds::from)
    }

    pub fn into_activity(self) -> Result<Activity> {
        let start_date = parse_rfc3339_utc(&self.start_date).ok_or_else(|| {
            SyncError::Source(format!(
                "Invalid start_date '{}' for activity {}",
                self.start_date, self.id
            ))
        })?;

        Ok(Activity {
            id: self.id,
            activity_type: self.type_tag(),
            bounds: self.bounds(),
            name: self.name,
            start_date,
            elapsed_time_secs: self.elapsed_time,
            distance_meters: self.distance,
        })
    }
}

/// Streams response with `key_by_type=true`.
#[derive(Debug, Default, Deserialize)]
struct StreamSet {
    time: Option<StreamData<u32>>,
    latlng: Option<StreamData<[f64; 2]>>,
    altitude: Option<StreamData<f64>>,
    heartrate: Option<StreamData<u16>>,
    cadence: Option<StreamData<u16>>,
    watts: Option<StreamData<Option<u16>>>,
}

#[derive(Debug, Deserialize)]
struct StreamData<T> {
    data: Vec<T>,
}

impl From<StreamSet> for ActivityStreams {
    fn from(set: StreamSet) -> Self {
        Self {
            time: set.time.map(|s| s.data).unwrap_or_default(),
            latlng: set.latlng.map(|s| s.data).unwrap_or_default(),
            altitude: set.altitude.map(|s| s.data),
            heartrate: set.heartrate.map(|s| s.data),
            cadence: set.cadence.map(|s| s.data),
            watts: set.watts.map(|s| s.data),
        }
    }
}
