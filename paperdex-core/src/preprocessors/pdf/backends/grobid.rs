//! GROBID HTTP backend
//!
//! Talks to a running GROBID server over its REST API with a blocking
//! reqwest client. `processFulltextDocument` takes a multipart form with the
//! PDF under `input` and one text field per enabled option.

use super::PdfBackend;
use crate::config::GrobidConfig;
use crate::error::GrobidError;
use anyhow::Result;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub struct GrobidBackend {
    client: Client,
    server_url: String,
    max_retries: u32,
    retry_delay: Duration,
    /// Form flags sent with every document, as (name, "1")
    flags: Vec<&'static str>,
}

impl GrobidBackend {
    pub fn new(config: &GrobidConfig) -> Result<Self, GrobidError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GrobidError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let flags = [
            ("consolidateHeader", config.consolidate_header),
            ("consolidateCitations", config.consolidate_citations),
            ("includeRawCitations", config.include_raw_citations),
            ("teiCoordinates", config.tei_coordinates),
            ("segmentSentences", config.segment_sentences),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect();

        Ok(Self {
            client,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            flags,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, service: &str) -> String {
        format!("{}/api/{}", self.server_url, service)
    }

    fn get_text(&self, service: &str) -> Result<String, GrobidError> {
        let unreachable = |e: reqwest::Error| GrobidError::Unreachable {
            url: self.server_url.clone(),
            message: e.to_string(),
        };
        self.client
            .get(self.endpoint(service))
            .send()
            .and_then(Response::error_for_status)
            .map_err(unreachable)?
            .text()
            .map_err(unreachable)
    }

    /// `GET /api/isalive`
    pub fn check_alive(&self) -> Result<(), GrobidError> {
        let body = self.get_text("isalive")?;
        if body.trim() == "true" {
            Ok(())
        } else {
            Err(GrobidError::Unreachable {
                url: self.server_url.clone(),
                message: format!("isalive answered '{}'", body.trim()),
            })
        }
    }

    /// `GET /api/version`
    pub fn version(&self) -> Result<String, GrobidError> {
        Ok(self.get_text("version")?.trim().to_string())
    }

    fn fulltext_form(&self, pdf_bytes: &[u8], file_name: &str) -> Result<multipart::Form, GrobidError> {
        let part = multipart::Part::bytes(pdf_bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| GrobidError::Transport(e.to_string()))?;
        let form = self
            .flags
            .iter()
            .fold(multipart::Form::new(), |form, flag| form.text(*flag, "1"));
        Ok(form.part("input", part))
    }

    /// Send one PDF to `processFulltextDocument`, retrying while the server
    /// reports 503 (all workers busy).
    pub fn process_fulltext(&self, pdf_bytes: &[u8], file_name: &str) -> Result<String, GrobidError> {
        let url = self.endpoint("processFulltextDocument");

        for attempt in 1..=self.max_retries {
            // A form is consumed by the request, so each attempt builds its own.
            let form = self.fulltext_form(pdf_bytes, file_name)?;
            let response = self
                .client
                .post(&url)
                .header(ACCEPT, "application/xml")
                .multipart(form)
                .send()
                .map_err(|e| GrobidError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                debug!(file = file_name, attempt, "GROBID returned TEI");
                return response
                    .text()
                    .map_err(|e| GrobidError::Transport(e.to_string()));
            }
            if status == StatusCode::SERVICE_UNAVAILABLE {
                warn!(
                    file = file_name,
                    attempt,
                    max_retries = self.max_retries,
                    "GROBID busy, retrying"
                );
                if attempt < self.max_retries {
                    thread::sleep(self.retry_delay);
                }
                continue;
            }

            let body = response.text().unwrap_or_default();
            return Err(GrobidError::Status {
                status: status.as_u16(),
                file: file_name.to_string(),
                body: body.trim().to_string(),
            });
        }

        Err(GrobidError::Busy {
            attempts: self.max_retries,
            file: file_name.to_string(),
        })
    }
}

impl PdfBackend for GrobidBackend {
    fn extract_to_tei(&self, pdf_bytes: &[u8], file_name: &str) -> Result<String> {
        Ok(self.process_fulltext(pdf_bytes, file_name)?)
    }

    fn name(&self) -> &str {
        "grobid"
    }

    fn is_healthy(&self) -> bool {
        self.check_alive().is_ok()
    }
}
