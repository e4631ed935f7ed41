//! CLI for building project status update decks.

mod draft;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use status_client::{HttpGenerationService, ServiceConfig};
use status_core::{
    display_eta, off_list_fields, DirectorySink, GenerationService, Notification, Operation, PayloadSink, Row,
    RowErrors, RowField, Saved, Session, StatusForm, SPREADSHEET_EXTENSION,
};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use draft::Draft;

/// Generate project status update decks from drafts or Excel workbooks.
#[derive(Parser, Debug)]
#[command(name = "status-deck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the generation service
    #[arg(long, global = true, env = "STATUS_DECK_SERVICE_URL", default_value = "http://localhost:8000")]
    service_url: String,

    /// Directory that receives generated files
    #[arg(short, long, global = true, env = "STATUS_DECK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Give up on a service call after this many seconds
    #[arg(long, global = true, env = "STATUS_DECK_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Title fields given on the command line.
#[derive(clap::Args, Debug, Default)]
struct TitleParts {
    /// Team tag
    #[arg(long)]
    tag: Option<String>,

    /// Subtag
    #[arg(long)]
    subtag: Option<String>,

    /// Timeline text
    #[arg(long)]
    metadata: Option<String>,
}

impl TitleParts {
    fn apply(&self, form: &mut StatusForm) {
        if let Some(tag) = &self.tag {
            form.set_tag(tag.as_str());
        }
        if let Some(subtag) = &self.subtag {
            form.set_subtag(subtag.as_str());
        }
        if let Some(metadata) = &self.metadata {
            form.set_metadata(metadata.as_str());
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a blank draft
    Init {
        draft: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set the title fields of a draft
    Title {
        draft: PathBuf,

        #[command(flatten)]
        parts: TitleParts,
    },

    /// Set one field of one row (rows are numbered from 1)
    Set {
        draft: PathBuf,
        row: usize,

        /// brief, impact, effort, remarks, eta, or status
        #[arg(value_parser = parse_field)]
        field: RowField,

        value: String,
    },

    /// Append an empty row
    AddRow { draft: PathBuf },

    /// Remove the last row; the only row is never removed
    RemoveRow { draft: PathBuf },

    /// Set the go-live/ETA date of a row
    Eta {
        draft: PathBuf,
        row: usize,

        /// Date as yyyy-mm-dd
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        date: Option<NaiveDate>,

        /// Clear the date instead
        #[arg(long)]
        clear: bool,
    },

    /// Validate a draft without contacting the service
    Check { draft: PathBuf },

    /// Generate a deck from a draft
    Generate {
        draft: PathBuf,

        #[command(flatten)]
        parts: TitleParts,
    },

    /// Download the Excel template
    Template,

    /// Generate a deck from an Excel workbook
    Upload {
        file: PathBuf,

        /// Validate the workbook rows locally before uploading
        #[arg(long)]
        check: bool,
    },

    /// Show the rows of an Excel workbook and their validation errors
    Preview { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match &args.command {
        Command::Init { draft, force } => init_draft(draft, *force),
        Command::Title { draft, parts } => set_title(draft, parts),
        Command::Set {
            draft,
            row,
            field,
            value,
        } => set_field(draft, *row, *field, value),
        Command::AddRow { draft } => {
            let rows = add_row(draft)?;
            println!("{} rows", rows);
            Ok(())
        }
        Command::RemoveRow { draft } => {
            if !remove_row(draft)? {
                eprintln!("Nothing removed: a draft keeps at least one row");
            }
            Ok(())
        }
        Command::Eta {
            draft,
            row,
            date,
            clear,
        } => set_eta(draft, *row, if *clear { None } else { *date }),
        Command::Check { draft } => check_draft(draft),
        Command::Generate { draft, parts } => {
            let mut form = Draft::load(draft)?.into_form();
            parts.apply(&mut form);
            warn_off_list_title(&form);
            warn_off_list(form.rows());

            let session = open_session(&args)?;
            let result = session.submit_form(&form).await;
            print_path(report(result, Operation::GenerateFromForm)?);
            Ok(())
        }
        Command::Template => {
            let session = open_session(&args)?;
            let result = session.download_template().await;
            print_path(report(result, Operation::DownloadTemplate)?);
            Ok(())
        }
        Command::Upload { file, check } => {
            let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();

            let session = open_session(&args)?;
            print_path(upload_workbook(&session, &file_name, bytes, *check).await?);
            Ok(())
        }
        Command::Preview { file } => preview_workbook(file),
    }
}

fn open_session(args: &Args) -> Result<Session<HttpGenerationService, DirectorySink>> {
    let config =
        ServiceConfig::new(&args.service_url).with_timeout(args.timeout_secs.map(Duration::from_secs));
    log::debug!("Using service at {}", config.base_url);
    let service = HttpGenerationService::new(config)?;
    Ok(Session::new(service, DirectorySink::new(&args.output_dir)))
}

/// Turn the outcome of an operation into a notification.
///
/// Success is announced on stderr; failure becomes the error text.
fn report(result: status_core::Result<Saved>, operation: Operation) -> Result<PathBuf> {
    let notification = Notification::from_result(&result, operation);
    match result {
        Ok(saved) => {
            eprintln!("{}", notification);
            Ok(saved.path)
        }
        Err(_) => bail!("{}", notification),
    }
}

fn print_path(path: PathBuf) {
    println!("{}", path.display());
}

/// Upload a workbook, optionally validating its rows first.
async fn upload_workbook<S: GenerationService, K: PayloadSink>(
    session: &Session<S, K>,
    file_name: &str,
    bytes: Vec<u8>,
    check: bool,
) -> Result<PathBuf> {
    // Wrong extensions fall through to the session, which reports them.
    if check && file_name.ends_with(SPREADSHEET_EXTENSION) {
        let rows = check_workbook(&bytes)?;
        log::info!("{} workbook rows passed validation", rows);
    }

    let result = session.upload_spreadsheet(file_name, bytes).await;
    report(result, Operation::GenerateFromSpreadsheet)
}

/// Read a workbook and refuse it if any data row fails validation.
///
/// Returns the number of data rows.
fn check_workbook(bytes: &[u8]) -> Result<usize> {
    let sheet = status_xlsx::read_status_sheet(Cursor::new(bytes))?;
    let invalid = sheet.invalid_rows();
    if !invalid.is_empty() {
        for (line, errors) in &invalid {
            print_row_errors(&format!("Sheet row {}", line), errors);
        }
        bail!("{} workbook row(s) failed validation; nothing uploaded", invalid.len());
    }
    Ok(sheet.rows.len())
}

fn init_draft(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Draft::blank().save(path)?;
    println!("{}", path.display());
    Ok(())
}

/// Load a draft, apply one edit, and save it back.
fn edit_draft<T>(path: &Path, edit: impl FnOnce(&mut StatusForm) -> Result<T>) -> Result<T> {
    let mut form = Draft::load(path)?.into_form();
    let outcome = edit(&mut form)?;
    Draft::from_form(&form).save(path)?;
    Ok(outcome)
}

/// Convert a 1-based row number from the command line.
fn row_index(row: usize) -> Result<usize> {
    row.checked_sub(1).context("Rows are numbered from 1")
}

fn parse_field(name: &str) -> std::result::Result<RowField, String> {
    RowField::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = RowField::ALL.iter().map(|f| f.name()).collect();
        format!("unknown field '{}' (expected one of {})", name, names.join(", "))
    })
}

fn set_title(path: &Path, parts: &TitleParts) -> Result<()> {
    let title = edit_draft(path, |form| {
        parts.apply(form);
        warn_off_list_title(form);
        Ok(form.title())
    })?;
    println!("Title: {}", title);
    Ok(())
}

fn set_field(path: &Path, row: usize, field: RowField, value: &str) -> Result<()> {
    let index = row_index(row)?;
    let errors = edit_draft(path, |form| {
        form.edit_field(index, field, value)?;
        Ok(form.errors().swap_remove(index))
    })?;
    if let Some(message) = errors.get(&field) {
        println!("Row {}: {}: {}", row, field.label(), message);
    }
    Ok(())
}

/// Returns the number of rows afterwards.
fn add_row(path: &Path) -> Result<usize> {
    edit_draft(path, |form| {
        form.append_row();
        Ok(form.rows().len())
    })
}

/// Returns whether a row was removed.
fn remove_row(path: &Path) -> Result<bool> {
    edit_draft(path, |form| Ok(form.remove_last_row()))
}

fn set_eta(path: &Path, row: usize, date: Option<NaiveDate>) -> Result<()> {
    let index = row_index(row)?;
    edit_draft(path, |form| {
        form.pick_eta(index, date)?;
        Ok(())
    })
}

fn check_draft(path: &Path) -> Result<()> {
    let form = Draft::load(path)?.into_form();
    warn_off_list_title(&form);
    warn_off_list(form.rows());

    println!("Title: {}", form.title());
    let errors = form.errors();
    for (idx, row_errors) in errors.iter().enumerate() {
        if !row_errors.is_empty() {
            print_row_errors(&format!("Row {}", idx + 1), row_errors);
        }
    }

    match form.build_request() {
        Ok(request) => {
            println!("{} rows ready to submit", request.content.len());
            Ok(())
        }
        Err(e) => bail!("{}", Notification::from_error(&e, Operation::GenerateFromForm)),
    }
}

fn preview_workbook(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let sheet = status_xlsx::read_status_sheet(Cursor::new(bytes))?;

    if let Some(title) = &sheet.title {
        println!("Title: {}", title);
    }
    for sheet_row in &sheet.rows {
        println!("{:>4}  {}", sheet_row.line, summarize(&sheet_row.row));
    }

    warn_off_list(&sheet.to_rows());
    for (line, errors) in &sheet.invalid_rows() {
        print_row_errors(&format!("Sheet row {}", line), errors);
    }
    Ok(())
}

/// One-line summary of a row for previews.
fn summarize(row: &Row) -> String {
    let eta = display_eta(&row.eta).unwrap_or_else(|| {
        if row.eta.is_empty() {
            "-".to_string()
        } else {
            format!("{}?", row.eta)
        }
    });
    format!(
        "{} | {} | {} | {} | {} | {}",
        row.brief, row.impact, row.effort, row.remarks, eta, row.status
    )
}

fn print_row_errors(prefix: &str, errors: &RowErrors) {
    for (field, message) in errors {
        println!("{}: {}: {}", prefix, field.label(), message);
    }
}

/// Warn about a tag or subtag outside the suggested values.
fn warn_off_list_title(form: &StatusForm) {
    for (part, value) in form.off_list_title_parts() {
        log::warn!("Title {} {:?} is not one of the suggested values", part, value);
    }
}

/// Warn about effort and status values outside the suggested options.
fn warn_off_list(rows: &[Row]) {
    for (idx, row) in rows.iter().enumerate() {
        for field in off_list_fields(row) {
            let options = field.options().unwrap_or_default();
            log::warn!(
                "Row {}: {} {:?} is not one of {}",
                idx + 1,
                field.label(),
                row.get(field),
                options.join(", ")
            );
        }
    }
}
