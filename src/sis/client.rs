//! Signed HTTP client for the remote SIS.
//!
//! Every request carries a bearer API key, a millisecond timestamp, and an
//! HMAC-SHA256 signature over `serialized_body + timestamp` (empty body for
//! parameter-less GETs). The remote side rejects stale timestamps and bad
//! signatures; this side only bounds calls with transport timeouts.

use super::error::SyncError;
use super::types::{RawRemoteSchedule, RawRemoteSection, RemoteListPayload};
use crate::config::SisConfig;
use crate::reconcile::types::{RemoteScheduleRecord, RemoteSectionRecord};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_HEADER: &str = "x-timestamp";
const SIGNATURE_HEADER: &str = "x-signature";

const SCHEDULES_PATH: &str = "available-schedules";
const SECTIONS_PATH: &str = "sections";

/// Client for the remote SIS API.
///
/// Explicitly constructed and injected through `AppState`; its lifetime is
/// tied to the process, never ambient global state.
pub struct SisClient {
    http: Client,
    base_url: Url,
    api_key: String,
    secret: Vec<u8>,
}

impl SisClient {
    /// Builds a client from validated configuration.
    pub fn new(config: &SisConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            secret: config.hmac_secret.as_bytes().to_vec(),
        })
    }

    /// Computes the hex HMAC-SHA256 signature for `body + timestamp`.
    fn sign(&self, body: &str, timestamp_millis: i64) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(body.as_bytes());
        mac.update(timestamp_millis.to_string().as_bytes());
        hex::encode(&mac.finalize().into_bytes())
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::config(format!("invalid endpoint path {path}: {e}")))
    }

    /// Sends one signed request and returns the parsed JSON response.
    ///
    /// Non-2xx responses fail with `RemoteRejected`; transport failures with
    /// `RemoteUnavailable`. This layer never retries (see `RetryPolicy`).
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, SyncError> {
        let url = self.endpoint(path)?;
        let body_str = match body {
            Some(value) => serde_json::to_string(value).map_err(|e| SyncError::MalformedRecord {
                message: format!("unserializable request body: {e}"),
            })?,
            None => String::new(),
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(&body_str, timestamp);

        debug!(method = %method, url = %url, "Calling remote SIS");

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature);

        if body.is_some() {
            // Sending the exact string that was signed keeps the signature
            // valid regardless of serializer quirks.
            request = request.header(CONTENT_TYPE, "application/json").body(body_str);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Remote SIS rejected request");
            return Err(SyncError::RemoteRejected {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| SyncError::MalformedRecord {
            message: format!("remote response is not valid JSON: {e}"),
        })
    }

    /// POST a JSON body to a write-back endpoint.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, SyncError> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// GET a parameter-less endpoint.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, SyncError> {
        self.call(Method::GET, path, None).await
    }

    /// Fetches and normalizes the full remote schedule dataset.
    ///
    /// Returns the normalized records plus the reasons for any rows dropped
    /// at ingestion; a malformed row never aborts the fetch.
    pub async fn fetch_schedules(
        &self,
    ) -> Result<(Vec<RemoteScheduleRecord>, Vec<String>), SyncError> {
        let payload = self
            .post_json(SCHEDULES_PATH, &json!({ "data": "fetch-all-schedules" }))
            .await?;
        let raw: RemoteListPayload<RawRemoteSchedule> = serde_json::from_value(payload)
            .map_err(|e| SyncError::MalformedRecord {
                message: format!("unexpected schedules payload shape: {e}"),
            })?;

        let mut records = Vec::new();
        let mut dropped = Vec::new();
        for row in raw.into_vec() {
            match row.normalize() {
                Ok(record) => records.push(record),
                Err(e) => dropped.push(e.to_string()),
            }
        }

        info!(
            fetched = records.len(),
            dropped = dropped.len(),
            "Fetched remote schedule dataset"
        );
        Ok((records, dropped))
    }

    /// Fetches and normalizes the remote section list.
    pub async fn fetch_sections(
        &self,
    ) -> Result<(Vec<RemoteSectionRecord>, Vec<String>), SyncError> {
        let payload = self.get_json(SECTIONS_PATH).await?;
        let raw: RemoteListPayload<RawRemoteSection> = serde_json::from_value(payload)
            .map_err(|e| SyncError::MalformedRecord {
                message: format!("unexpected sections payload shape: {e}"),
            })?;

        let mut records = Vec::new();
        let mut dropped = Vec::new();
        for row in raw.into_vec() {
            match row.normalize() {
                Ok(record) => records.push(record),
                Err(e) => dropped.push(e.to_string()),
            }
        }
        Ok((records, dropped))
    }
}

/// Helper module for hex encoding (avoiding extra dependency).
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SisClient {
        SisClient::new(&SisConfig::for_tests("https://sis.example.test/api/")).unwrap()
    }

    #[test]
    fn test_signature_is_stable_hex() {
        let client = test_client();
        let a = client.sign(r#"{"data":"fetch-all-schedules"}"#, 1_700_000_000_000);
        let b = client.sign(r#"{"data":"fetch-all-schedules"}"#, 1_700_000_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_signature_covers_body_and_timestamp() {
        let client = test_client();
        let base = client.sign("body", 1000);
        assert_ne!(base, client.sign("body", 1001));
        assert_ne!(base, client.sign("other", 1000));
        // Empty body still signs the timestamp alone (GET case).
        assert_ne!(client.sign("", 1000), client.sign("", 1001));
    }

    #[test]
    fn test_endpoint_join() {
        let client = test_client();
        assert_eq!(
            client.endpoint(SCHEDULES_PATH).unwrap().as_str(),
            "https://sis.example.test/api/available-schedules"
        );
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex::encode(&[0x00, 0xab, 0xff]), "00abff");
    }
}
