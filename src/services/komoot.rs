// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Komoot API client for uploading recorded tours.

use crate::config::KomootConfig;
use crate::error::{Result, SyncError};
use crate::models::Activity;
use crate::services::http::{build_client, network_error, status_error};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Komoot";
const TOURS_PAGE_SIZE: u32 = 100;

/// Descriptive fields sent alongside an uploaded GPX.
#[derive(Debug, Clone)]
pub struct TourMetadata {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl TourMetadata {
    pub fn for_activity(activity: &Activity) -> Self {
        Self {
            name: activity.name.clone(),
            started_at: activity.start_date,
            duration: activity.duration(),
        }
    }

    /// Query parameters of the tour upload request.
    fn upload_query(&self, sport: &str) -> Vec<(&'static str, String)> {
        vec![
            ("data_type", "gpx".to_string()),
            ("sport", sport.to_string()),
            ("date", format_utc_rfc3339(self.started_at)),
            ("time_in_motion", self.duration.num_seconds().max(0).to_string()),
            ("name", self.name.clone()),
        ]
    }
}

/// Write access to the Destination.
#[async_trait]
pub trait TourDestination: Send + Sync {
    /// Upload a GPX document as a recorded tour and return the new tour ID.
    async fn upload_tour(&self, gpx: &[u8], sport: &str, metadata: &TourMetadata)
        -> Result<String>;
}

/// Komoot API client, authenticated as one user.
pub struct KomootClient {
    http: ClientWithMiddleware,
    base_url: String,
    /// Komoot user ID (returned as `username` by the login endpoint)
    user_id: String,
    /// API token used as basic-auth password
    token: String,
    display_name: Option<String>,
}

impl KomootClient {
    /// Log in with email and password.
    pub async fn login(config: &KomootConfig, max_retries: u32) -> Result<Self> {
        let http = build_client(max_retries)?;
        let base_url = "https://api.komoot.de".to_string();
        let url = format!(
            "{}/v006/account/email/{}/",
            base_url,
            urlencoding::encode(&config.email)
        );

        let response = http
            .get(&url)
            .basic_auth(&config.email, Some(&config.password))
            .send()
            .await
            .map_err(|e| network_error(SERVICE, e))?;

        if !response.status().is_success() {
            // Any rejection of the login itself is a credentials problem
            return Err(match status_error(SERVICE, response, SyncError::Auth).await {
                SyncError::Transient(msg) => SyncError::Transient(msg),
                other => SyncError::Auth(format!("Komoot login failed: {other}")),
            });
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to parse Komoot login response: {e}")))?;

        let display_name = account.user.and_then(|u| u.displayname);
        tracing::info!(
            user_id = %account.username,
            display_name = display_name.as_deref().unwrap_or(""),
            "Authenticated with Komoot"
        );

        Ok(Self {
            http,
            base_url,
            user_id: account.username,
            token: account.password,
            display_name,
        })
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// All recorded tours of the logged-in user.
    pub async fn list_tours(&self) -> Result<Vec<KomootTour>> {
        let url = format!("{}/v007/users/{}/tours/", self.base_url, self.user_id);
        let mut tours = Vec::new();
        let mut page = 0u32;

        loop {
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.user_id, Some(&self.token))
                .query(&[
                    ("type", "tour_recorded".to_string()),
                    ("page", page.to_string()),
                    ("limit", TOURS_PAGE_SIZE.to_string()),
                ])
                .send()
                .await
                .map_err(|e| network_error(SERVICE, e))?;

            if !response.status().is_success() {
                return Err(status_error(SERVICE, response, SyncError::Source).await);
            }

            let body: ToursPage = response
                .json()
                .await
                .map_err(|e| SyncError::Source(format!("Malformed Komoot tours page: {e}")))?;

            let batch = body.embedded.map(|e| e.tours).unwrap_or_default();
            let fetched = batch.len();
            tours.extend(batch);

            let last_page = body
                .page
                .map(|p| p.number + 1 >= p.total_pages)
                .unwrap_or(true);
            if last_page || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(tours)
    }
}

#[async_trait]
impl TourDestination for KomootClient {
    async fn upload_tour(
        &self,
        gpx: &[u8],
        sport: &str,
        metadata: &TourMetadata,
    ) -> Result<String> {
        let url = format!("{}/v007/tours/", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.user_id, Some(&self.token))
            .query(&metadata.upload_query(sport))
            .header(reqwest::header::CONTENT_TYPE, "application/gpx+xml")
            .body(gpx.to_vec())
            .send()
            .await
            .map_err(|e| network_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(status_error(SERVICE, response, SyncError::Upload).await);
        }

        let created: CreatedTour = response
            .json()
            .await
            .map_err(|e| SyncError::Upload(format!("Unexpected Komoot upload response: {e}")))?;
        let tour_id = created.id_string().ok_or_else(|| {
            SyncError::Upload("Komoot upload response did not contain a tour id".to_string())
        })?;

        tracing::debug!(tour_id = %tour_id, sport, "Tour uploaded");
        Ok(tour_id)
    }
}

/// Login response from `/v006/account/email/{email}/`.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    username: String,
    password: String,
    user: Option<AccountUser>,
}

#[derive(Debug, Deserialize)]
struct AccountUser {
    displayname: Option<String>,
}

/// Tour creation response. Komoot returns the id as a number.
#[derive(Debug, Deserialize)]
struct CreatedTour {
    id: serde_json::Value,
}

impl CreatedTour {
    fn id_string(&self) -> Option<String> {
        match &self.id {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

/// Tour summary from the user tours listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KomootTour {
    pub id: serde_json::Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl KomootTour {
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToursPage {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedTours>,
    page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedTours {
    #[serde(default)]
    tours: Vec<KomootTour>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    number: u32,
    #[serde(rename = "totalPages")]
    total_pages: u32,
}
