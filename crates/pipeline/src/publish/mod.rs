//! # Publisher
//!
//! Packages exported metadata and the transformed model into one multipart
//! upload and classifies the response.
//!
//! ## Table of Contents
//! 1. PendingUpload - what one publish attempt sends
//! 2. PublishOutcome - typed result (not an error)
//! 3. ScanPublisher / HttpPublisher
//! 4. classify_response - status + body to outcome
//!
//! ## Wire format
//!
//! `multipart/form-data`, parts in this order:
//!
//! | part | kind |
//! |------|------|
//! | `name` | text |
//! | `latitude` | text, only with a location |
//! | `longitude` | text, only with a location |
//! | `metadata_json` | file, `application/json` |
//! | `model` | file, `application/octet-stream` |
//!
//! Exactly one request per call. Retrying is up to the caller.

pub mod session;

pub use session::{BearerToken, RequestTemplate, SessionProvider, StaticSession};

use crate::error::ConfigError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// PendingUpload
// ============================================================================

/// WGS84 position of the scanned space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// File attachment of an upload
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read `path`, keeping its file name
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// One publish attempt
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub name: String,
    pub location: Option<GeoPoint>,
    pub metadata: UploadFile,
    pub model: UploadFile,
}

impl PendingUpload {
    /// Build an upload from files on disk
    pub async fn from_files(
        name: impl Into<String>,
        location: Option<GeoPoint>,
        metadata_path: &Path,
        model_path: &Path,
    ) -> std::io::Result<Self> {
        Ok(Self {
            name: name.into(),
            location,
            metadata: UploadFile::read(metadata_path).await?,
            model: UploadFile::read(model_path).await?,
        })
    }

    /// Multipart body in wire order
    pub fn into_form(self) -> reqwest::Result<Form> {
        let mut form = Form::new().text("name", self.name);
        if let Some(location) = self.location {
            form = form
                .text("latitude", location.latitude.to_string())
                .text("longitude", location.longitude.to_string());
        }

        let metadata = Part::bytes(self.metadata.bytes)
            .file_name(self.metadata.file_name)
            .mime_str("application/json")?;
        let model = Part::bytes(self.model.bytes)
            .file_name(self.model.file_name)
            .mime_str("application/octet-stream")?;

        Ok(form.part("metadata_json", metadata).part("model", model))
    }
}

// ============================================================================
// PublishOutcome
// ============================================================================

/// Result of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Success,
    /// Upload is gated behind an entitlement; needs the upgrade flow, not a retry
    SubscriptionRequired,
    /// Token rejected; session-level concern
    AuthInvalid,
    /// Server rejected the upload contents
    Validation(String),
    /// Timeout, DNS or connection failure
    Network(String),
    ServerError { code: u16, message: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success)
    }

    /// Whether retrying the same upload can help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublishOutcome::Validation(_) | PublishOutcome::Network(_) | PublishOutcome::ServerError { .. }
        )
    }
}

impl std::fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishOutcome::Success => write!(f, "Scan published"),
            PublishOutcome::SubscriptionRequired => write!(f, "A subscription is required to publish scans"),
            PublishOutcome::AuthInvalid => write!(f, "Your session has expired, please sign in again"),
            PublishOutcome::Validation(message) => write!(f, "{}", message),
            PublishOutcome::Network(cause) => write!(f, "Network error: {}", cause),
            PublishOutcome::ServerError { code, message } => write!(f, "Server error ({}): {}", code, message),
        }
    }
}

// ============================================================================
// Publishers
// ============================================================================

/// Sends uploads to the scan service
#[async_trait]
pub trait ScanPublisher: Send + Sync {
    async fn publish(&self, upload: PendingUpload, request: RequestTemplate) -> PublishOutcome;
}

/// reqwest-backed publisher
#[derive(Clone)]
pub struct HttpPublisher {
    client: Client,
}

impl HttpPublisher {
    /// Create a publisher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.without_url().to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScanPublisher for HttpPublisher {
    async fn publish(&self, upload: PendingUpload, request: RequestTemplate) -> PublishOutcome {
        let name = upload.name.clone();
        let form = match upload.into_form() {
            Ok(form) => form,
            Err(e) => return PublishOutcome::Network(transport_cause(e)),
        };

        debug!(method = %request.method, url = %request.url, scan = %name, "Uploading scan");
        let response = match self
            .client
            .request(request.method, &request.url)
            .bearer_auth(request.token.expose())
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let cause = transport_cause(e);
                warn!(%cause, "Scan upload failed");
                return PublishOutcome::Network(cause);
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => {
                debug!(status, error = %e.without_url(), "Response body unreadable");
                Vec::new()
            }
        };

        let outcome = classify_response(status, &body);
        info!(status, outcome = ?outcome, "Scan upload finished");
        outcome
    }
}

fn transport_cause(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not connect to server".to_string()
    } else {
        err.without_url().to_string()
    }
}

// ============================================================================
// Response classification
// ============================================================================

/// Error body returned by the scan service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    errors: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ErrorBody {
    /// `message`, with the first entry's first error appended
    fn display_message(&self) -> String {
        let detail = self
            .errors
            .as_ref()
            .and_then(|errors| errors.values().next())
            .and_then(|messages| messages.as_array())
            .and_then(|messages| messages.first())
            .and_then(|message| message.as_str());

        match detail {
            Some(detail) => format!("{}: {}", self.message, detail),
            None => self.message.clone(),
        }
    }
}

fn parse_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .map(|body| body.display_message())
        .filter(|message| !message.trim().is_empty())
}

/// Map an HTTP status and body to an outcome
pub fn classify_response(status: u16, body: &[u8]) -> PublishOutcome {
    match status {
        200..=299 => PublishOutcome::Success,
        401 => PublishOutcome::AuthInvalid,
        403 => PublishOutcome::SubscriptionRequired,
        400..=499 => match parse_message(body) {
            Some(message) => PublishOutcome::Validation(message),
            None => PublishOutcome::ServerError {
                code: status,
                message: reason(status),
            },
        },
        _ => PublishOutcome::ServerError {
            code: status,
            message: parse_message(body).unwrap_or_else(|| reason(status)),
        },
    }
}

fn reason(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use reqwest::Method;
    use std::sync::Arc;

    type Seen = Arc<Mutex<Option<(HeaderMap, Bytes)>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn upload(location: Option<GeoPoint>) -> PendingUpload {
        PendingUpload {
            name: "Living room".to_string(),
            location,
            metadata: UploadFile::new("metadata-1.json", br#"{"version":1}"#.to_vec()),
            model: UploadFile::new("model-1-styled.bin", b"RSCN\x00\x01".to_vec()),
        }
    }

    fn request(base: &str) -> RequestTemplate {
        StaticSession::new(base, Some("tok3n".into()))
            .authorize("/api/scans", Method::POST)
            .unwrap()
    }

    fn publisher(timeout: Duration) -> HttpPublisher {
        HttpPublisher::new(timeout).unwrap()
    }

    #[test]
    fn test_classify_forbidden_ignores_body() {
        let body = br#"{"message":"Validation failed","errors":{"name":["taken"]}}"#;
        assert_eq!(classify_response(403, body), PublishOutcome::SubscriptionRequired);
        assert_eq!(classify_response(403, b""), PublishOutcome::SubscriptionRequired);
    }

    #[test]
    fn test_classify_unauthorized_with_message() {
        assert_eq!(classify_response(401, br#"{"message":"Token expired"}"#), PublishOutcome::AuthInvalid);
    }

    #[test]
    fn test_classify_validation_appends_first_error() {
        let body = br#"{"message":"Invalid scan","errors":{"name":["must not be empty","too short"],"latitude":["out of range"]}}"#;
        assert_eq!(
            classify_response(422, body),
            PublishOutcome::Validation("Invalid scan: must not be empty".to_string())
        );
        assert_eq!(
            classify_response(400, br#"{"message":"Bad name"}"#),
            PublishOutcome::Validation("Bad name".to_string())
        );
    }

    #[test]
    fn test_classify_unparseable_and_server_errors() {
        assert_eq!(
            classify_response(400, b"<html>bad</html>"),
            PublishOutcome::ServerError { code: 400, message: "Bad Request".to_string() }
        );
        assert_eq!(
            classify_response(500, br#"{"message":"database down"}"#),
            PublishOutcome::ServerError { code: 500, message: "database down".to_string() }
        );
        assert_eq!(classify_response(204, b""), PublishOutcome::Success);
    }

    #[tokio::test]
    async fn test_multipart_parts_in_order() {
        let seen: Seen = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route(
                "/api/scans",
                post(|State(seen): State<Seen>, headers: HeaderMap, body: Bytes| async move {
                    *seen.lock() = Some((headers, body));
                    AxumStatus::CREATED
                }),
            )
            .with_state(seen.clone());
        let base = serve(router).await;

        let location = GeoPoint { latitude: 37.7749, longitude: -122.4194 };
        let outcome = publisher(Duration::from_secs(5)).publish(upload(Some(location)), request(&base)).await;
        assert_eq!(outcome, PublishOutcome::Success);

        let (headers, body) = seen.lock().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer tok3n");
        assert!(headers["content-type"].to_str().unwrap().starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&body);
        let position = |needle: &str| body.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
        let name = position("name=\"name\"");
        let latitude = position("name=\"latitude\"");
        let longitude = position("name=\"longitude\"");
        let metadata = position("name=\"metadata_json\"; filename=\"metadata-1.json\"");
        let model = position("name=\"model\"; filename=\"model-1-styled.bin\"");
        assert!(name < latitude && latitude < longitude && longitude < metadata && metadata < model);
        assert!(body.contains("37.7749"));
        assert!(body.contains("-122.4194"));
        assert!(position("application/json") > metadata);
        assert!(position("application/octet-stream") > model);
    }

    #[tokio::test]
    async fn test_location_parts_omitted() {
        let seen: Seen = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route(
                "/api/scans",
                post(|State(seen): State<Seen>, headers: HeaderMap, body: Bytes| async move {
                    *seen.lock() = Some((headers, body));
                    AxumStatus::OK
                }),
            )
            .with_state(seen.clone());
        let base = serve(router).await;

        publisher(Duration::from_secs(5)).publish(upload(None), request(&base)).await;
        let (_, body) = seen.lock().take().unwrap();
        let body = String::from_utf8_lossy(&body);
        assert!(!body.contains("name=\"latitude\""));
        assert!(!body.contains("name=\"longitude\""));
    }

    #[tokio::test]
    async fn test_status_classification_over_http() {
        let router = Router::new()
            .route(
                "/forbidden/api/scans",
                post(|| async { (AxumStatus::FORBIDDEN, r#"{"message":"Upgrade required"}"#) }),
            )
            .route(
                "/invalid/api/scans",
                post(|| async {
                    (
                        AxumStatus::UNPROCESSABLE_ENTITY,
                        r#"{"message":"Invalid scan","errors":{"name":["is required"]}}"#,
                    )
                }),
            )
            .route("/broken/api/scans", post(|| async { AxumStatus::BAD_GATEWAY }));
        let base = serve(router).await;
        let publisher = publisher(Duration::from_secs(5));

        assert_eq!(
            publisher.publish(upload(None), request(&format!("{}/forbidden", base))).await,
            PublishOutcome::SubscriptionRequired
        );
        assert_eq!(
            publisher.publish(upload(None), request(&format!("{}/invalid", base))).await,
            PublishOutcome::Validation("Invalid scan: is required".to_string())
        );
        assert_eq!(
            publisher.publish(upload(None), request(&format!("{}/broken", base))).await,
            PublishOutcome::ServerError { code: 502, message: "Bad Gateway".to_string() }
        );
    }

    #[tokio::test]
    async fn test_timeout_is_network_outcome() {
        let router = Router::new().route(
            "/api/scans",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                AxumStatus::OK
            }),
        );
        let base = serve(router).await;

        let outcome = publisher(Duration::from_millis(200)).publish(upload(None), request(&base)).await;
        assert!(matches!(outcome, PublishOutcome::Network(_)), "got {:?}", outcome);
        assert!(outcome.is_retryable());
        assert!(!outcome.to_string().contains("tok3n"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_outcome() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let outcome = publisher(Duration::from_secs(2)).publish(upload(None), request(&base)).await;
        assert!(matches!(outcome, PublishOutcome::Network(_)));
    }
}
