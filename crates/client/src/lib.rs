//! HTTP binding of the generation service.
//!
//! Talks to the deck backend: JSON in and PPTX out for structured data,
//! multipart upload for workbooks, and a plain GET for the template.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use status_core::{Error, GenerationService, Operation, ProjectUpdateRequest, Result};
use std::time::Duration;

/// Content type of uploaded workbooks.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Where the generation service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub generate_path: String,
    pub spreadsheet_path: String,
    pub template_path: String,
    /// Whole-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            generate_path: "/generate-pptx".to_string(),
            spreadsheet_path: "/generate-pptx-from-excel".to_string(),
            template_path: "/download-template".to_string(),
            timeout: None,
        }
    }
}

impl ServiceConfig {
    /// Default routes on a given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Generation service reached over HTTP.
pub struct HttpGenerationService {
    http: Client,
    config: ServiceConfig,
}

impl HttpGenerationService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Service(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Return the body of a successful response, or the service's reason.
    async fn read_payload(response: Response, operation: Operation) -> Result<Vec<u8>> {
        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| transport_error(operation, e))?;
            log::debug!("{} returned {} bytes", operation, bytes.len());
            return Ok(bytes.to_vec());
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body, operation);
        log::warn!("{} failed with HTTP {}: {}", operation, status.as_u16(), message);
        Err(Error::Service(message))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate_from_structured_data(&self, request: &ProjectUpdateRequest) -> Result<Vec<u8>> {
        let operation = Operation::GenerateFromForm;
        let url = self.config.url(&self.config.generate_path);
        log::debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        Self::read_payload(response, operation).await
    }

    async fn generate_from_spreadsheet(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let operation = Operation::GenerateFromSpreadsheet;
        let url = self.config.url(&self.config.spreadsheet_path);
        log::debug!("POST {} ({})", url, file_name);

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(XLSX_MIME)
            .map_err(|e| transport_error(operation, e))?;
        let response = self
            .http
            .post(url)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        Self::read_payload(response, operation).await
    }

    async fn download_template(&self) -> Result<Vec<u8>> {
        let operation = Operation::DownloadTemplate;
        let url = self.config.url(&self.config.template_path);
        log::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;
        Self::read_payload(response, operation).await
    }
}

fn transport_error(operation: Operation, e: reqwest::Error) -> Error {
    Error::Service(format!("{}: {}", operation.fallback_message(), e))
}

/// Pull a readable reason out of an error response.
///
/// The backend reports failures as `{"detail": "..."}`, or as a list of
/// `{"msg": "..."}` entries when request validation fails.
fn error_message(status: StatusCode, body: &str, operation: Operation) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    let message = match detail {
        Some(Value::String(text)) => Some(text),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    };

    match message {
        Some(text) if !text.trim().is_empty() => text,
        _ => format!("{} (HTTP {})", operation.fallback_message(), status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Multipart, State},
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use status_core::{DirectorySink, Row, RowField, Session, StatusForm, PRESENTATION_FILE_NAME};
    use std::sync::Arc;
    use tokio::{net::TcpListener, sync::Mutex};

    #[derive(Clone, Default)]
    struct ServerState {
        requests: Arc<Mutex<Vec<ProjectUpdateRequest>>>,
        uploads: Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>,
    }

    async fn handle_generate(
        State(state): State<ServerState>,
        Json(payload): Json<ProjectUpdateRequest>,
    ) -> Vec<u8> {
        state.requests.lock().await.push(payload);
        b"PK\x03\x04deck".to_vec()
    }

    async fn handle_upload(State(state): State<ServerState>, mut multipart: Multipart) -> impl IntoResponse {
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.unwrap_or_default().to_vec();
            state.uploads.lock().await.push((name, file_name, bytes));
        }
        b"PK\x03\x04from-sheet".to_vec()
    }

    async fn handle_template() -> Vec<u8> {
        b"PK\x03\x04template".to_vec()
    }

    async fn handle_rejected_upload() -> impl IntoResponse {
        (
            AxumStatus::BAD_REQUEST,
            Json(json!({ "detail": "Invalid Excel format" })),
        )
    }

    async fn handle_unprocessable() -> impl IntoResponse {
        (
            AxumStatus::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [
                { "loc": ["body", "title"], "msg": "field required", "type": "missing" },
                { "loc": ["body", "content"], "msg": "value is not a valid list", "type": "list_type" }
            ] })),
        )
    }

    async fn handle_plain_failure() -> impl IntoResponse {
        (AxumStatus::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    async fn spawn_server(app: Router) -> String {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    async fn spawn_backend() -> (String, ServerState) {
        let state = ServerState::default();
        let app = Router::new()
            .route("/generate-pptx", post(handle_generate))
            .route("/generate-pptx-from-excel", post(handle_upload))
            .route("/download-template", get(handle_template))
            .with_state(state.clone());
        (spawn_server(app).await, state)
    }

    async fn spawn_failing_backend() -> String {
        let app = Router::new()
            .route("/generate-pptx", post(handle_unprocessable))
            .route("/generate-pptx-from-excel", post(handle_rejected_upload))
            .route("/download-template", get(handle_plain_failure));
        spawn_server(app).await
    }

    fn service(base_url: &str) -> HttpGenerationService {
        HttpGenerationService::new(ServiceConfig::new(base_url)).expect("client")
    }

    #[test]
    fn test_config_urls() {
        let config = ServiceConfig::new("http://deck.local/");
        assert_eq!(config.url(&config.generate_path), "http://deck.local/generate-pptx");
        assert_eq!(
            ServiceConfig::default().url("/download-template"),
            "http://localhost:8000/download-template"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        let status = StatusCode::BAD_GATEWAY;
        assert_eq!(
            error_message(status, "<html>bad gateway</html>", Operation::GenerateFromForm),
            "Failed to generate PPTX (HTTP 502)"
        );
        assert_eq!(
            error_message(status, r#"{"detail": ""}"#, Operation::DownloadTemplate),
            "Failed to download template (HTTP 502)"
        );
        assert_eq!(
            error_message(status, r#"{"detail": "Sheet is empty"}"#, Operation::GenerateFromSpreadsheet),
            "Sheet is empty"
        );
    }

    #[tokio::test]
    async fn test_generate_posts_request_shape() {
        let (base_url, state) = spawn_backend().await;
        let request = ProjectUpdateRequest::new(
            "Gold Loan: Key Enhancements - Q1 2025",
            &[Row {
                brief: "Improved UX".into(),
                impact: "Higher conversion".into(),
                effort: "M".into(),
                remarks: "None".into(),
                eta: "15/03/2025".into(),
                status: "In Progress".into(),
            }],
        );

        let bytes = service(&base_url)
            .generate_from_structured_data(&request)
            .await
            .expect("generate");

        assert_eq!(bytes, b"PK\x03\x04deck".to_vec());
        let received = state.requests.lock().await;
        assert_eq!(received.as_slice(), &[request]);
    }

    #[tokio::test]
    async fn test_upload_sends_file_part() {
        let (base_url, state) = spawn_backend().await;

        let bytes = service(&base_url)
            .generate_from_spreadsheet("updates.xlsx", b"xlsx-bytes".to_vec())
            .await
            .expect("upload");

        assert_eq!(bytes, b"PK\x03\x04from-sheet".to_vec());
        let uploads = state.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "file");
        assert_eq!(uploads[0].1.as_deref(), Some("updates.xlsx"));
        assert_eq!(uploads[0].2, b"xlsx-bytes".to_vec());
    }

    #[tokio::test]
    async fn test_download_template() {
        let (base_url, _state) = spawn_backend().await;
        let bytes = service(&base_url).download_template().await.expect("template");
        assert_eq!(bytes, b"PK\x03\x04template".to_vec());
    }

    #[tokio::test]
    async fn test_detail_string_is_surfaced() {
        let base_url = spawn_failing_backend().await;
        let err = service(&base_url)
            .generate_from_spreadsheet("updates.xlsx", Vec::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.to_string(), "Invalid Excel format");
    }

    #[tokio::test]
    async fn test_validation_details_are_joined() {
        let base_url = spawn_failing_backend().await;
        let request = ProjectUpdateRequest::new("t", &[]);
        let err = service(&base_url)
            .generate_from_structured_data(&request)
            .await
            .expect_err("must fail");
        assert_eq!(err.to_string(), "field required; value is not a valid list");
    }

    #[tokio::test]
    async fn test_plain_failure_uses_fallback() {
        let base_url = spawn_failing_backend().await;
        let err = service(&base_url)
            .download_template()
            .await
            .expect_err("must fail");
        assert_eq!(err.to_string(), "Failed to download template (HTTP 500)");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let err = service(&format!("http://{addr}"))
            .download_template()
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::Service(_)));
        assert!(err.to_string().starts_with("Failed to download template: "));
    }

    #[tokio::test]
    async fn test_session_saves_generated_deck() {
        let (base_url, state) = spawn_backend().await;
        let temp = tempfile::tempdir().expect("tempdir");
        let session = Session::new(service(&base_url), DirectorySink::new(temp.path()));

        let mut form = StatusForm::new();
        form.set_tag("Gold Loan");
        form.set_subtag("Key Enhancements");
        form.set_metadata("Q1 2025");
        for (field, value) in [
            (RowField::Brief, "Improved UX"),
            (RowField::Impact, "Higher conversion"),
            (RowField::Effort, "M"),
            (RowField::Remarks, "None"),
            (RowField::Eta, "15/03/2025"),
            (RowField::Status, "In Progress"),
        ] {
            form.edit_field(0, field, value).expect("edit");
        }

        let saved = session.submit_form(&form).await.expect("submit");

        assert_eq!(saved.path, temp.path().join(PRESENTATION_FILE_NAME));
        assert_eq!(std::fs::read(&saved.path).expect("read"), b"PK\x03\x04deck".to_vec());
        assert_eq!(state.requests.lock().await[0].content[0][0], "1");
    }
}
