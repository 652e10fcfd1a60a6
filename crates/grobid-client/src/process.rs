//! Bounded-concurrency directory processing.
//!
//! One producer walks the tree and feeds eligible paths into a bounded
//! channel; `num_workers` workers submit each file and invoke the result
//! handler exactly once per dispatched file; an aggregator collects per-file
//! failures so one bad file never aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::client::Submitter;
use crate::{sink, ClientError, InputKind, Options, ProcessResult, Service, STATUS_INCOMPLETE};

/// Called once per dispatched file, from worker tasks. Returning `Err`
/// records the file as failed without stopping the run.
pub type ResultHandler =
    Arc<dyn Fn(&ProcessResult, &Options) -> Result<(), ClientError> + Send + Sync>;

/// One file the handler rejected.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{} file(s) failed: {}", .0.len(), summarize(.0))]
    Partial(Vec<FileFailure>),
}

/// Counts for a fully successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    /// Files dispatched to workers.
    pub processed: usize,
    /// Eligible files skipped because an output already existed.
    pub skipped: usize,
}

fn summarize(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.path.display(), f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Process every eligible file under `dir`.
///
/// Eligibility is positive: a file is dispatched only when it matches the
/// input kind of `service` (content-sniffed for PDF, by extension for text
/// and XML). Unless `opts.force` is set, files whose output already exists
/// are skipped before dispatch. Cancelling `cancel` stops enqueueing new
/// paths; files already queued still drain through the workers.
pub async fn process_directory(
    submitter: Arc<dyn Submitter>,
    dir: &Path,
    service: Service,
    num_workers: usize,
    handler: ResultHandler,
    opts: &Options,
    cancel: CancellationToken,
) -> Result<ProcessReport, ProcessError> {
    let num_workers = num_workers.max(1);
    let (path_tx, path_rx) = async_channel::bounded::<PathBuf>(num_workers);
    let (outcome_tx, outcome_rx) = async_channel::bounded::<Result<(), FileFailure>>(num_workers);

    let mut workers = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        workers.push(tokio::spawn(worker_loop(
            path_rx.clone(),
            outcome_tx.clone(),
            submitter.clone(),
            service,
            handler.clone(),
            opts.clone(),
        )));
    }
    drop(path_rx);
    drop(outcome_tx);

    let aggregator = tokio::spawn(async move {
        let mut failures = Vec::new();
        while let Ok(outcome) = outcome_rx.recv().await {
            if let Err(failure) = outcome {
                failures.push(failure);
            }
        }
        failures
    });

    let mut walk_err = None;
    let mut dispatched = 0usize;
    let mut skipped = 0usize;
    for entry in WalkDir::new(dir) {
        if cancel.is_cancelled() {
            tracing::info!("cancelled, no further files will be queued");
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                walk_err = Some(err);
                break;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if !is_eligible(service, &path) {
            tracing::debug!(path = %path.display(), service = %service, "skipping ineligible file");
            continue;
        }
        if !opts.force && sink::is_already_processed(&path, opts) {
            tracing::info!(path = %path.display(), "output exists, skipping");
            skipped += 1;
            continue;
        }
        if path_tx.send(path).await.is_err() {
            break;
        }
        dispatched += 1;
    }

    // Closing the path channel lets workers drain and exit.
    drop(path_tx);
    for worker in workers {
        let _ = worker.await;
    }
    let failures = aggregator.await.unwrap_or_default();

    if let Some(err) = walk_err {
        return Err(ProcessError::Walk(err));
    }
    tracing::info!(
        dispatched,
        skipped,
        failed = failures.len(),
        "directory run complete"
    );
    if !failures.is_empty() {
        return Err(ProcessError::Partial(failures));
    }
    Ok(ProcessReport {
        processed: dispatched,
        skipped,
    })
}

async fn worker_loop(
    path_rx: async_channel::Receiver<PathBuf>,
    outcome_tx: async_channel::Sender<Result<(), FileFailure>>,
    submitter: Arc<dyn Submitter>,
    service: Service,
    handler: ResultHandler,
    opts: Options,
) {
    while let Ok(path) = path_rx.recv().await {
        let result = match submitter.submit(&path, service, &opts).await {
            Ok(result) => result,
            // Submission never completed; hand the handler a synthetic
            // result so every dispatched file is accounted for.
            Err(err) => ProcessResult {
                filename: path.clone(),
                sha256: String::new(),
                status: STATUS_INCOMPLETE,
                body: Vec::new(),
                elapsed: Duration::ZERO,
                error_message: Some(format!("submit failed: {err}")),
            },
        };
        let outcome = handler(&result, &opts).map_err(|err| FileFailure {
            path: path.clone(),
            error: err.to_string(),
        });
        if outcome_tx.send(outcome).await.is_err() {
            break;
        }
    }
}

/// Positive match against the payload shape the service consumes.
fn is_eligible(service: Service, path: &Path) -> bool {
    match service.input_kind() {
        InputKind::Pdf => is_pdf(path),
        InputKind::Text => has_extension(path, "txt"),
        InputKind::Xml => has_extension(path, "xml"),
    }
}

/// Content sniff first, extension as fallback when the file is unreadable
/// or the magic bytes are inconclusive.
fn is_pdf(path: &Path) -> bool {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => kind.mime_type() == "application/pdf",
        _ => has_extension(path, "pdf"),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn pdf_detected_by_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let disguised = dir.path().join("paper.bin");
        fs::write(&disguised, b"%PDF-1.7\n%stuff\n").unwrap();
        assert!(is_pdf(&disguised));
        assert!(is_eligible(Service::ProcessFulltextDocument, &disguised));
    }

    #[test]
    fn non_pdf_content_with_pdf_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("notes.pdf");
        fs::write(&fake, b"\x89PNG\r\n\x1a\n0000").unwrap();
        assert!(!is_pdf(&fake));
    }

    #[test]
    fn missing_file_falls_back_to_extension() {
        assert!(is_pdf(Path::new("/nonexistent/paper.PDF")));
        assert!(!is_pdf(Path::new("/nonexistent/paper.txt")));
    }

    #[test]
    fn text_and_xml_services_match_by_extension() {
        assert!(is_eligible(Service::ProcessCitationList, Path::new("refs.txt")));
        assert!(!is_eligible(Service::ProcessCitationList, Path::new("refs.xml")));
        assert!(is_eligible(
            Service::ProcessCitationPatentST36,
            Path::new("patent.XML")
        ));
        assert!(!is_eligible(
            Service::ProcessCitationPatentST36,
            Path::new("patent")
        ));
    }

    #[test]
    fn partial_error_enumerates_failures() {
        let err = ProcessError::Partial(vec![
            FileFailure {
                path: PathBuf::from("a.pdf"),
                error: "processing failed: timeout".into(),
            },
            FileFailure {
                path: PathBuf::from("b.pdf"),
                error: "processing failed: refused".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 file(s) failed"));
        assert!(msg.contains("a.pdf"));
        assert!(msg.contains("refused"));
    }
}
