//! Asynchronous operations against the generation service.
//!
//! Each operation kind has its own in-flight flag. A second start of the
//! same kind fails with [`Error::Busy`] until the first one resolves; the
//! three kinds do not block one another.

use async_trait::async_trait;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::form::StatusForm;
use crate::types::ProjectUpdateRequest;

/// File name for generated presentations.
pub const PRESENTATION_FILE_NAME: &str = "project-status-update.pptx";

/// File name for the downloaded spreadsheet template.
pub const TEMPLATE_FILE_NAME: &str = "project-update-template.xlsx";

/// Extension an uploaded spreadsheet must carry.
pub const SPREADSHEET_EXTENSION: &str = ".xlsx";

/// Remote service that renders decks and serves the template.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Render a deck from a structured request.
    async fn generate_from_structured_data(&self, request: &ProjectUpdateRequest) -> Result<Vec<u8>>;

    /// Render a deck from an uploaded workbook.
    async fn generate_from_spreadsheet(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>>;

    /// Fetch the blank spreadsheet template.
    async fn download_template(&self) -> Result<Vec<u8>>;
}

/// Destination for payloads returned by the service.
pub trait PayloadSink: Send + Sync {
    /// Persist `bytes` under `file_name`, returning where they went.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves payloads into a directory on the local device.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PayloadSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// The three service-backed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GenerateFromForm,
    DownloadTemplate,
    GenerateFromSpreadsheet,
}

impl Operation {
    /// Message used when a failure carries no text of its own.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::GenerateFromForm => "Failed to generate PPTX",
            Operation::DownloadTemplate => "Failed to download template",
            Operation::GenerateFromSpreadsheet => "Failed to generate PPTX from Excel",
        }
    }

    /// Message reported on success.
    pub fn success_message(self) -> &'static str {
        match self {
            Operation::GenerateFromForm => "PPTX file generated and downloaded successfully!",
            Operation::DownloadTemplate => "Excel template downloaded successfully!",
            Operation::GenerateFromSpreadsheet => {
                "PPTX generated from Excel and downloaded successfully!"
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::GenerateFromForm => "PPTX generation",
            Operation::DownloadTemplate => "Template download",
            Operation::GenerateFromSpreadsheet => "Excel upload",
        })
    }
}

/// Where a payload was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub operation: Operation,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Clears its flag when dropped, whether the operation succeeded or not.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, operation: Operation) -> Result<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy(operation));
        }
        Ok(Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs form submissions, template downloads, and spreadsheet uploads.
pub struct Session<S, K> {
    service: S,
    sink: K,
    generating: AtomicBool,
    downloading_template: AtomicBool,
    uploading_spreadsheet: AtomicBool,
}

impl<S: GenerationService, K: PayloadSink> Session<S, K> {
    pub fn new(service: S, sink: K) -> Self {
        Self {
            service,
            sink,
            generating: AtomicBool::new(false),
            downloading_template: AtomicBool::new(false),
            uploading_spreadsheet: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    fn flag(&self, operation: Operation) -> &AtomicBool {
        match operation {
            Operation::GenerateFromForm => &self.generating,
            Operation::DownloadTemplate => &self.downloading_template,
            Operation::GenerateFromSpreadsheet => &self.uploading_spreadsheet,
        }
    }

    /// Whether an operation of this kind is currently running.
    pub fn is_in_flight(&self, operation: Operation) -> bool {
        self.flag(operation).load(Ordering::Acquire)
    }

    /// Validate the form, send it for rendering, and save the deck.
    ///
    /// Precondition failures never reach the service.
    pub async fn submit_form(&self, form: &StatusForm) -> Result<Saved> {
        let request = form.build_request()?;
        let operation = Operation::GenerateFromForm;
        let _guard = InFlight::acquire(self.flag(operation), operation)?;

        log::info!(
            "Generating \"{}\" with {} rows",
            request.title,
            request.content.len()
        );
        let bytes = self.service.generate_from_structured_data(&request).await?;
        self.store(operation, PRESENTATION_FILE_NAME, &bytes)
    }

    /// Fetch the spreadsheet template and save it.
    pub async fn download_template(&self) -> Result<Saved> {
        let operation = Operation::DownloadTemplate;
        let _guard = InFlight::acquire(self.flag(operation), operation)?;

        log::info!("Downloading spreadsheet template");
        let bytes = self.service.download_template().await?;
        self.store(operation, TEMPLATE_FILE_NAME, &bytes)
    }

    /// Send a workbook for rendering and save the deck.
    ///
    /// Files whose name does not end in `.xlsx` are rejected without
    /// calling the service.
    pub async fn upload_spreadsheet(&self, file_name: &str, bytes: Vec<u8>) -> Result<Saved> {
        if !file_name.ends_with(SPREADSHEET_EXTENSION) {
            return Err(Error::InvalidFile(file_name.to_string()));
        }
        let operation = Operation::GenerateFromSpreadsheet;
        let _guard = InFlight::acquire(self.flag(operation), operation)?;

        log::info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let deck = self.service.generate_from_spreadsheet(file_name, bytes).await?;
        self.store(operation, PRESENTATION_FILE_NAME, &deck)
    }

    fn store(&self, operation: Operation, file_name: &str, bytes: &[u8]) -> Result<Saved> {
        let path = self.sink.save(file_name, bytes)?;
        Ok(Saved {
            operation,
            path,
            bytes: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingService {
        requests: Mutex<Vec<ProjectUpdateRequest>>,
        uploads: Mutex<Vec<String>>,
        template_calls: Mutex<usize>,
        fail_with: Option<String>,
        gate: Option<Arc<Notify>>,
    }

    impl RecordingService {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        async fn respond(&self, body: &[u8]) -> Result<Vec<u8>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.fail_with {
                Some(message) => Err(Error::Service(message.clone())),
                None => Ok(body.to_vec()),
            }
        }
    }

    #[async_trait]
    impl GenerationService for RecordingService {
        async fn generate_from_structured_data(&self, request: &ProjectUpdateRequest) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            self.respond(b"deck").await
        }

        async fn generate_from_spreadsheet(&self, file_name: &str, _bytes: Vec<u8>) -> Result<Vec<u8>> {
            self.uploads.lock().unwrap().push(file_name.to_string());
            self.respond(b"deck-from-sheet").await
        }

        async fn download_template(&self) -> Result<Vec<u8>> {
            *self.template_calls.lock().unwrap() += 1;
            self.respond(b"template").await
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl PayloadSink for MemorySink {
        fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(file_name))
        }
    }

    fn filled_form() -> StatusForm {
        StatusForm::from_parts(
            "Gold Loan",
            "Key Enhancements",
            "Q1 2025",
            vec![Row {
                brief: "Improved UX".into(),
                impact: "Higher conversion".into(),
                effort: "M".into(),
                remarks: "None".into(),
                eta: "15/03/2025".into(),
                status: "In Progress".into(),
            }],
        )
    }

    #[tokio::test]
    async fn test_submit_form_saves_deck() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let saved = session.submit_form(&filled_form()).await.unwrap();

        assert_eq!(saved.operation, Operation::GenerateFromForm);
        assert_eq!(saved.path, PathBuf::from(PRESENTATION_FILE_NAME));
        assert_eq!(saved.bytes, 4);

        let requests = session.service().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].title, "Gold Loan: Key Enhancements - Q1 2025");

        let saved = session.sink().saved.lock().unwrap();
        assert_eq!(saved[0], (PRESENTATION_FILE_NAME.to_string(), b"deck".to_vec()));
    }

    #[tokio::test]
    async fn test_submit_blank_form_reports_title_first() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let err = session.submit_form(&StatusForm::new()).await.unwrap_err();

        assert!(matches!(err, Error::TitleIncomplete));
        assert!(session.service().requests.lock().unwrap().is_empty());
        assert!(!session.is_in_flight(Operation::GenerateFromForm));
    }

    #[tokio::test]
    async fn test_submit_blank_row_with_title() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let form = StatusForm::from_parts("Gold Loan", "Key Enhancements", "Q1 2025", vec![]);
        let err = session.submit_form(&form).await.unwrap_err();

        assert_eq!(err.to_string(), "Please fill in at least one row of data.");
        assert!(session.service().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_failure_leaves_nothing_saved() {
        let session = Session::new(RecordingService::failing("backend down"), MemorySink::default());
        let err = session.submit_form(&filled_form()).await.unwrap_err();

        assert_eq!(err.to_string(), "backend down");
        assert!(session.sink().saved.lock().unwrap().is_empty());
        assert!(!session.is_in_flight(Operation::GenerateFromForm));

        // Retrying is allowed after a failure.
        let err = session.submit_form(&filled_form()).await.unwrap_err();
        assert!(matches!(err, Error::Service(_)));
        assert_eq!(session.service().requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_download_template() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let saved = session.download_template().await.unwrap();

        assert_eq!(saved.path, PathBuf::from(TEMPLATE_FILE_NAME));
        assert_eq!(*session.service().template_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_extension() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let err = session
            .upload_spreadsheet("data.csv", b"a,b".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidFile(ref name) if name == "data.csv"));
        assert!(session.service().uploads.lock().unwrap().is_empty());
        assert!(session.sink().saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_spreadsheet_saves_deck() {
        let session = Session::new(RecordingService::default(), MemorySink::default());
        let saved = session
            .upload_spreadsheet("updates.xlsx", b"PK".to_vec())
            .await
            .unwrap();

        assert_eq!(saved.operation, Operation::GenerateFromSpreadsheet);
        assert_eq!(saved.path, PathBuf::from(PRESENTATION_FILE_NAME));
        assert_eq!(*session.service().uploads.lock().unwrap(), vec!["updates.xlsx"]);
    }

    #[tokio::test]
    async fn test_same_operation_is_exclusive() {
        let gate = Arc::new(Notify::new());
        let session = Session::new(RecordingService::gated(gate.clone()), MemorySink::default());
        let form = filled_form();

        let (first, second, _) = tokio::join!(
            session.submit_form(&form),
            async {
                assert!(session.is_in_flight(Operation::GenerateFromForm));
                session.submit_form(&form).await
            },
            async { gate.notify_one() },
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Busy(Operation::GenerateFromForm))));
        assert_eq!(session.service().requests.lock().unwrap().len(), 1);
        assert!(!session.is_in_flight(Operation::GenerateFromForm));
    }

    #[tokio::test]
    async fn test_different_operations_run_together() {
        let gate = Arc::new(Notify::new());
        let session = Session::new(RecordingService::gated(gate.clone()), MemorySink::default());
        let form = filled_form();

        let (deck, template, _) = tokio::join!(
            session.submit_form(&form),
            session.download_template(),
            async {
                gate.notify_one();
                gate.notify_one();
            },
        );

        assert!(deck.is_ok());
        assert!(template.is_ok());
        assert_eq!(session.sink().saved.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_directory_sink_creates_dir() {
        let temp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(temp.path().join("out"));
        let path = sink.save(TEMPLATE_FILE_NAME, b"xlsx").unwrap();

        assert_eq!(path, temp.path().join("out").join(TEMPLATE_FILE_NAME));
        assert_eq!(fs::read(path).unwrap(), b"xlsx");
    }
}
