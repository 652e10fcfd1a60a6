//! Integration tests for the directory processor.
//!
//! These tests use a mock [`Submitter`] so no HTTP requests are made; the
//! pipeline itself (walking, eligibility, skip detection, fan-out, failure
//! aggregation) runs for real against a temp directory.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grobid_client::{
    log_result, process_directory, write_result, ClientError, Options, ProcessError,
    ProcessResult, ResultHandler, Service, Submitter,
};
use tokio_util::sync::CancellationToken;

/// Submitter that records every path it sees and either succeeds with a
/// canned TEI body or fails outright.
struct MockSubmitter {
    calls: Arc<Mutex<Vec<PathBuf>>>,
    fail: bool,
}

impl MockSubmitter {
    fn ok() -> Self {
        MockSubmitter {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    fn failing() -> Self {
        MockSubmitter {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Submitter for MockSubmitter {
    fn submit<'a>(
        &'a self,
        path: &'a Path,
        _service: Service,
        _opts: &'a Options,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessResult, ClientError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(path.to_path_buf());
            if self.fail {
                return Err(ClientError::Submission("connection refused".into()));
            }
            Ok(ProcessResult {
                filename: path.to_path_buf(),
                sha256: "f".repeat(64),
                status: 200,
                body: b"<TEI/>".to_vec(),
                elapsed: Duration::from_millis(1),
                error_message: None,
            })
        })
    }
}

/// Populate a directory with `n` small PDFs (real magic bytes) plus one
/// text file that PDF services must ignore.
fn seed_pdfs(dir: &Path, n: usize) {
    for i in 0..n {
        fs::write(dir.join(format!("paper{i}.pdf")), b"%PDF-1.7\ncontent\n").unwrap();
    }
    fs::write(dir.join("notes.txt"), b"not a pdf").unwrap();
}

fn counting_handler() -> (ResultHandler, Arc<Mutex<usize>>) {
    let count = Arc::new(Mutex::new(0usize));
    let count_clone = count.clone();
    let handler: ResultHandler = Arc::new(move |_result, _opts| {
        *count_clone.lock().unwrap() += 1;
        Ok(())
    });
    (handler, count)
}

#[tokio::test]
async fn every_eligible_file_dispatched_once() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 6);

    let submitter = Arc::new(MockSubmitter::ok());
    let calls = submitter.calls.clone();
    let (handler, count) = counting_handler();

    let report = process_directory(
        submitter,
        dir.path(),
        Service::ProcessFulltextDocument,
        3,
        handler,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .expect("run should succeed");

    assert_eq!(report.processed, 6);
    assert_eq!(report.skipped, 0);
    assert_eq!(*count.lock().unwrap(), 6);

    let mut seen = calls.lock().unwrap().clone();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 6, "no file should be submitted twice");
    assert!(seen.iter().all(|p| p.extension().unwrap() == "pdf"));
}

#[tokio::test]
async fn failing_submitter_aggregates_every_failure() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 4);

    let handler: ResultHandler = Arc::new(log_result);
    let err = process_directory(
        Arc::new(MockSubmitter::failing()),
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .expect_err("run should report failures");

    match err {
        ProcessError::Partial(failures) => {
            assert_eq!(failures.len(), 4);
            for failure in &failures {
                assert!(failure.error.contains("connection refused"));
            }
        }
        other => panic!("expected Partial, got: {other}"),
    }
}

#[tokio::test]
async fn second_run_skips_already_processed_files() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 3);

    let handler: ResultHandler = Arc::new(write_result);
    let opts = Options::default();

    let first = process_directory(
        Arc::new(MockSubmitter::ok()),
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler.clone(),
        &opts,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(first.processed, 3);

    let submitter = Arc::new(MockSubmitter::ok());
    let calls = submitter.calls.clone();
    let second = process_directory(
        submitter,
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler,
        &opts,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 3);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn force_reprocesses_existing_outputs() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 2);

    let handler: ResultHandler = Arc::new(write_result);
    let opts = Options::default();
    process_directory(
        Arc::new(MockSubmitter::ok()),
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler.clone(),
        &opts,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let forced = Options {
        force: true,
        ..Options::default()
    };
    let report = process_directory(
        Arc::new(MockSubmitter::ok()),
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler,
        &forced,
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn single_worker_drains_without_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 5);

    let (handler, count) = counting_handler();
    let report = process_directory(
        Arc::new(MockSubmitter::ok()),
        dir.path(),
        Service::ProcessFulltextDocument,
        1,
        handler,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.processed, 5);
    assert_eq!(*count.lock().unwrap(), 5);
}

#[tokio::test]
async fn cancellation_stops_enqueueing() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 10);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (handler, count) = counting_handler();
    let report = process_directory(
        Arc::new(MockSubmitter::ok()),
        dir.path(),
        Service::ProcessFulltextDocument,
        2,
        handler,
        &Options::default(),
        cancel,
    )
    .await
    .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(*count.lock().unwrap(), 0);
}

#[tokio::test]
async fn citation_list_service_only_picks_text_files() {
    let dir = tempfile::tempdir().unwrap();
    seed_pdfs(dir.path(), 2);
    fs::write(dir.path().join("refs.txt"), b"One ref per line\n").unwrap();

    let submitter = Arc::new(MockSubmitter::ok());
    let calls = submitter.calls.clone();
    let (handler, _count) = counting_handler();
    let report = process_directory(
        submitter,
        dir.path(),
        Service::ProcessCitationList,
        2,
        handler,
        &Options::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    // notes.txt from seed_pdfs plus refs.txt
    assert_eq!(report.processed, 2);
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .all(|p| p.extension().unwrap() == "txt"));
}
