use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use serde::Deserialize;
use tracing::debug;

use crate::{config::AppConfig, error::FetchError};

/// Store details for one application, as returned by the remote source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreApp {
    /// Display name.
    pub name: String,
    /// One-paragraph description.
    #[serde(default)]
    pub short_description: Option<String>,
    /// Developer names.
    #[serde(default)]
    pub developers: Vec<String>,
    /// Publisher names.
    #[serde(default)]
    pub publishers: Vec<String>,
    /// Release information.
    #[serde(default)]
    pub release_date: Option<StoreReleaseDate>,
    /// Genre tags.
    #[serde(default)]
    pub genres: Vec<StoreGenre>,
    /// Header artwork URL.
    #[serde(default)]
    pub header_image: Option<String>,
    /// Screenshot URLs.
    #[serde(default)]
    pub screenshots: Vec<StoreScreenshot>,
}

/// `release_date` object of a store payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreReleaseDate {
    /// Human formatted date, e.g. `18 Apr, 2011`.
    #[serde(default)]
    pub date: Option<String>,
    /// Whether the title is unreleased.
    #[serde(default)]
    pub coming_soon: bool,
}

/// Entry of the `genres` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreGenre {
    /// Genre label.
    pub description: String,
}

/// Entry of the `screenshots` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StoreScreenshot {
    /// Full resolution image URL.
    pub path_full: String,
}

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Remote provider of store metadata and artwork.
///
/// Implemented over HTTP by [`SteamStoreClient`]; tests substitute in-memory sources.
pub trait MetadataSource: Send + Sync + 'static {
    /// Fetch store details for `app_id`.
    fn fetch_details(&self, app_id: u32)
        -> impl Future<Output = Result<StoreApp, FetchError>> + Send;

    /// Download the bytes of an image referenced by a store payload.
    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

impl<T: MetadataSource> MetadataSource for Arc<T> {
    fn fetch_details(
        &self,
        app_id: u32,
    ) -> impl Future<Output = Result<StoreApp, FetchError>> + Send {
        T::fetch_details(self, app_id)
    }

    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        T::fetch_image(self, url)
    }
}

/// Decode an `appdetails` response body for `app_id`.
///
/// The body maps the requested id to `{ "success": bool, "data": { ... } }`.
pub fn parse_app_details(app_id: u32, body: &str) -> Result<StoreApp, FetchError> {
    let mut envelopes: HashMap<String, AppDetailsEnvelope> = serde_json::from_str(body)?;
    let envelope = envelopes
        .remove(&app_id.to_string())
        .ok_or(FetchError::Unsuccessful { app_id })?;

    match envelope {
        AppDetailsEnvelope {
            success: true,
            data: Some(data),
        } => Ok(serde_json::from_value(data)?),
        _ => Err(FetchError::Unsuccessful { app_id }),
    }
}

/// HTTP client for the Steam storefront `appdetails` endpoint.
#[derive(Debug, Clone)]
pub struct SteamStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl SteamStoreClient {
    /// Build a client from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("gamecenter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.store_api_url.clone(),
        })
    }
}

impl MetadataSource for SteamStoreClient {
    fn fetch_details(
        &self,
        app_id: u32,
    ) -> impl Future<Output = Result<StoreApp, FetchError>> + Send {
        async move {
            debug!(app_id, "Requesting store details");
            let response = self
                .client
                .get(&self.base_url)
                .query(&[("appids", app_id)])
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body = response.text().await?;
            parse_app_details(app_id, &body)
        }
    }

    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let request = self.client.get(url);
        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            Ok(response.bytes().await?.to_vec())
        }
    }
}
