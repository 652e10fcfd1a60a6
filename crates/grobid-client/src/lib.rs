//! Client for a GROBID structured-metadata extraction server.
//!
//! [`Client`] wraps the HTTP API (multipart PDF upload, citation list
//! submission, health check). [`process_directory`] drives a bounded pool of
//! workers over every eligible file under a directory, handing each
//! [`ProcessResult`] to a caller-supplied handler and aggregating per-file
//! failures instead of aborting the run.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod process;
pub mod sink;

pub use client::{Client, Submitter};
pub use process::{process_directory, FileFailure, ProcessError, ProcessReport, ResultHandler};
pub use sink::{log_result, output_filename, write_result};

/// Extension appended to processed outputs, e.g. `paper.grobid.tei.xml`.
pub const DEFAULT_EXT: &str = "grobid.tei.xml";

/// Status recorded on a result whose submission never produced an HTTP
/// response. Distinguishable from every real status code.
pub const STATUS_INCOMPLETE: i32 = -1;

/// The GROBID endpoints this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    ProcessFulltextDocument,
    ProcessHeaderDocument,
    ProcessReferences,
    ProcessCitationList,
    ProcessCitationPatentST36,
    ProcessCitationPatentPDF,
}

/// Payload shape a service expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Text,
    Xml,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::ProcessFulltextDocument => "processFulltextDocument",
            Service::ProcessHeaderDocument => "processHeaderDocument",
            Service::ProcessReferences => "processReferences",
            Service::ProcessCitationList => "processCitationList",
            Service::ProcessCitationPatentST36 => "processCitationPatentST36",
            Service::ProcessCitationPatentPDF => "processCitationPatentPDF",
        }
    }

    /// What kind of file this service consumes.
    pub fn input_kind(&self) -> InputKind {
        match self {
            Service::ProcessFulltextDocument
            | Service::ProcessHeaderDocument
            | Service::ProcessReferences
            | Service::ProcessCitationPatentPDF => InputKind::Pdf,
            Service::ProcessCitationList => InputKind::Text,
            Service::ProcessCitationPatentST36 => InputKind::Xml,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processFulltextDocument" => Ok(Service::ProcessFulltextDocument),
            "processHeaderDocument" => Ok(Service::ProcessHeaderDocument),
            "processReferences" => Ok(Service::ProcessReferences),
            "processCitationList" => Ok(Service::ProcessCitationList),
            "processCitationPatentST36" => Ok(Service::ProcessCitationPatentST36),
            "processCitationPatentPDF" => Ok(Service::ProcessCitationPatentPDF),
            other => Err(ClientError::InvalidService(other.to_string())),
        }
    }
}

/// Request parameters forwarded to the server plus local output behavior.
#[derive(Debug, Clone)]
pub struct Options {
    pub generate_ids: bool,
    pub consolidate_header: bool,
    pub consolidate_citations: bool,
    pub include_raw_citations: bool,
    pub include_raw_affiliations: bool,
    /// Element names to request PDF coordinates for; empty disables.
    pub tei_coordinates: Vec<String>,
    pub segment_sentences: bool,
    /// Reprocess files even when an output file already exists.
    pub force: bool,
    /// Where outputs land; `None` writes next to each input.
    pub output_dir: Option<PathBuf>,
    /// Also create a `<sha256>.grobid.tei.xml` symlink next to each output.
    pub create_hash_symlinks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            generate_ids: true,
            consolidate_header: true,
            consolidate_citations: true,
            include_raw_citations: true,
            include_raw_affiliations: true,
            tei_coordinates: default_coordinates(),
            segment_sentences: true,
            force: false,
            output_dir: None,
            create_hash_symlinks: false,
        }
    }
}

/// Coordinate element names GROBID accepts by default.
pub fn default_coordinates() -> Vec<String> {
    ["ref", "figure", "persName", "formula", "biblStruct"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Outcome of one file submission. A result exists for every dispatched
/// file; submissions that never reached the server carry
/// [`STATUS_INCOMPLETE`] and an `error_message`.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub filename: PathBuf,
    /// Hex SHA-256 of the uploaded bytes; empty for text submissions.
    pub sha256: String,
    pub status: i32,
    pub body: Vec<u8>,
    pub elapsed: Duration,
    pub error_message: Option<String>,
}

impl ProcessResult {
    /// Response body as text, lossy on invalid UTF-8.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid service: {0}")]
    InvalidService(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server responded with status {0}")]
    ServerStatus(u16),
    #[error("processing failed: {0}")]
    Submission(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_round_trips_through_str() {
        for name in [
            "processFulltextDocument",
            "processHeaderDocument",
            "processReferences",
            "processCitationList",
            "processCitationPatentST36",
            "processCitationPatentPDF",
        ] {
            let service = Service::from_str(name).unwrap();
            assert_eq!(service.as_str(), name);
        }
    }

    #[test]
    fn unknown_service_is_rejected() {
        let err = Service::from_str("processEverything").unwrap_err();
        assert!(matches!(err, ClientError::InvalidService(_)));
        assert!(err.to_string().contains("processEverything"));
    }

    #[test]
    fn input_kinds_match_services() {
        assert_eq!(Service::ProcessFulltextDocument.input_kind(), InputKind::Pdf);
        assert_eq!(Service::ProcessCitationPatentPDF.input_kind(), InputKind::Pdf);
        assert_eq!(Service::ProcessCitationList.input_kind(), InputKind::Text);
        assert_eq!(Service::ProcessCitationPatentST36.input_kind(), InputKind::Xml);
    }

    #[test]
    fn default_options_enable_consolidation() {
        let opts = Options::default();
        assert!(opts.consolidate_header);
        assert!(opts.consolidate_citations);
        assert!(!opts.force);
        assert!(opts.tei_coordinates.contains(&"biblStruct".to_string()));
    }
}
