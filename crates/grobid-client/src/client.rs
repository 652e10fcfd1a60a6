//! HTTP client for the GROBID API.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{ClientError, Options, ProcessResult, Service};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anything that can turn a file path into a [`ProcessResult`]. The
/// directory processor is written against this trait so tests can stand in
/// for a live server.
pub trait Submitter: Send + Sync {
    fn submit<'a>(
        &'a self,
        path: &'a Path,
        service: Service,
        opts: &'a Options,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessResult, ClientError>> + Send + 'a>>;
}

/// Client for one GROBID server.
#[derive(Debug, Clone)]
pub struct Client {
    server: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CitationListPayload<'a> {
    #[serde(rename = "consolidateCitations", skip_serializing_if = "Option::is_none")]
    consolidate_citations: Option<&'static str>,
    #[serde(rename = "consolidateHeader", skip_serializing_if = "Option::is_none")]
    consolidate_header: Option<&'static str>,
    citations: &'a [String],
}

impl Client {
    /// Client with the default 60 second request timeout.
    pub fn new(server: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(server, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Client with an explicit request timeout.
    pub fn with_timeout(server: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(server, http))
    }

    /// Client reusing a preconfigured `reqwest::Client`.
    pub fn with_http(server: impl Into<String>, http: reqwest::Client) -> Self {
        let mut server = server.into();
        while server.ends_with('/') {
            server.pop();
        }
        Client { server, http }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn service_url(&self, service: Service) -> String {
        format!("{}/api/{}", self.server, service.as_str())
    }

    /// Health check against `/api/isalive`.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let url = format!("{}/api/isalive", self.server);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::ServerStatus(status.as_u16()));
        }
        Ok(())
    }

    /// Upload one PDF as a multipart form. Any HTTP status yields a result;
    /// only transport and local IO failures are errors.
    pub async fn process_pdf(
        &self,
        path: &Path,
        service: Service,
        opts: &Options,
    ) -> Result<ProcessResult, ClientError> {
        let started = Instant::now();
        let bytes = tokio::fs::read(path).await?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());

        let mut form = option_fields(opts);
        form = form.part("input", Part::bytes(bytes).file_name(file_name));

        let resp = self
            .http
            .post(self.service_url(service))
            .header(ACCEPT, "application/xml")
            .multipart(form)
            .send()
            .await?;
        let status = i32::from(resp.status().as_u16());
        let body = resp.bytes().await?.to_vec();
        tracing::debug!(path = %path.display(), status, "submitted");

        Ok(ProcessResult {
            filename: path.to_path_buf(),
            sha256,
            status,
            body,
            elapsed: started.elapsed(),
            error_message: None,
        })
    }

    /// Submit a plain-text citation file, one raw reference per line. Blank
    /// lines are dropped.
    pub async fn process_text(
        &self,
        path: &Path,
        service: Service,
        opts: &Options,
    ) -> Result<ProcessResult, ClientError> {
        let started = Instant::now();
        let content = tokio::fs::read_to_string(path).await?;
        let citations: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let payload = CitationListPayload {
            consolidate_citations: opts.consolidate_citations.then_some("1"),
            consolidate_header: opts.consolidate_header.then_some("1"),
            citations: &citations,
        };

        let resp = self
            .http
            .post(self.service_url(service))
            .header(ACCEPT, "application/xml")
            .json(&payload)
            .send()
            .await?;
        let status = i32::from(resp.status().as_u16());
        let body = resp.bytes().await?.to_vec();
        tracing::debug!(path = %path.display(), status, lines = citations.len(), "submitted");

        Ok(ProcessResult {
            filename: path.to_path_buf(),
            sha256: String::new(),
            status,
            body,
            elapsed: started.elapsed(),
            error_message: None,
        })
    }

    /// Dispatch on the payload shape the service expects.
    pub async fn process_file(
        &self,
        path: &Path,
        service: Service,
        opts: &Options,
    ) -> Result<ProcessResult, ClientError> {
        match service {
            Service::ProcessCitationList => self.process_text(path, service, opts).await,
            _ => self.process_pdf(path, service, opts).await,
        }
    }
}

impl Submitter for Client {
    fn submit<'a>(
        &'a self,
        path: &'a Path,
        service: Service,
        opts: &'a Options,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessResult, ClientError>> + Send + 'a>> {
        Box::pin(self.process_file(path, service, opts))
    }
}

fn option_fields(opts: &Options) -> Form {
    let mut form = Form::new();
    if opts.generate_ids {
        form = form.text("generateIDs", "1");
    }
    if opts.consolidate_header {
        form = form.text("consolidateHeader", "1");
    }
    if opts.consolidate_citations {
        form = form.text("consolidateCitations", "1");
    }
    if opts.include_raw_citations {
        form = form.text("includeRawCitations", "1");
    }
    if opts.include_raw_affiliations {
        form = form.text("includeRawAffiliations", "1");
    }
    if opts.segment_sentences {
        form = form.text("segmentSentences", "1");
    }
    for name in &opts.tei_coordinates {
        form = form.text("teiCoordinates", name.clone());
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let client = Client::with_http("http://localhost:8070///", reqwest::Client::new());
        assert_eq!(client.server(), "http://localhost:8070");
        assert_eq!(
            client.service_url(Service::ProcessFulltextDocument),
            "http://localhost:8070/api/processFulltextDocument"
        );
    }

    #[test]
    fn citation_payload_omits_disabled_fields() {
        let citations = vec!["One ref.".to_string()];
        let payload = CitationListPayload {
            consolidate_citations: None,
            consolidate_header: Some("1"),
            citations: &citations,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("consolidateCitations").is_none());
        assert_eq!(v["consolidateHeader"], "1");
        assert_eq!(v["citations"][0], "One ref.");
    }
}
