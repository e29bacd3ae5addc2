//! Fetchers turning a resource locator into a parsed SVG root
//!
//! The cache is transport-agnostic: anything implementing [`SvgFetcher`] can
//! back it. [`HttpFetcher`] covers served resources over reqwest and
//! [`FileFetcher`] covers the local, non-served case where reading the file
//! directly is the success path.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use futures::StreamExt;
use kuchiki::NodeRef;
use reqwest::Client;

use crate::config::FetchLimits;
use crate::document::parse_svg_document;
use crate::error::InjectError;

/// Browser-like User-Agent sent with SVG downloads.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Type alias for an in-flight fetch.
///
/// Futures are boxed without a `Send` bound: the whole pipeline runs on one
/// cooperative thread and the resolved node is an `Rc`-based DOM handle.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<NodeRef, InjectError>> + 'a>>;

/// Asynchronous resource → parsed SVG root collaborator.
///
/// Implementations must request the resource typed as SVG markup regardless of
/// what the server declares, and must treat a successful-but-statusless
/// response (local file access) as success.
pub trait SvgFetcher {
    fn fetch(&self, locator: &str) -> FetchFuture<'_>;
}

/// HTTP fetcher with streaming size enforcement.
pub struct HttpFetcher {
    client: Client,
    limits: FetchLimits,
}

impl HttpFetcher {
    /// Build a fetcher with default limits.
    ///
    /// Fails with `TransportUnavailable` when no TLS/connector backend can be
    /// initialized in this environment.
    pub fn new() -> Result<Self, InjectError> {
        Self::with_limits(FetchLimits::default())
    }

    pub fn with_limits(limits: FetchLimits) -> Result<Self, InjectError> {
        let client = Client::builder()
            .build()
            .map_err(|e| InjectError::TransportUnavailable(e.to_string()))?;
        Ok(Self { client, limits })
    }

    async fn fetch_http(&self, locator: String) -> Result<NodeRef, InjectError> {
        // Download with timeout and browser-like headers. The Accept header is
        // deliberate: the resource is requested as SVG markup no matter what
        // content type the server would otherwise declare.
        let response = self
            .client
            .get(&locator)
            .timeout(self.limits.timeout)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "image/svg+xml,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| {
                log::warn!("SVG request failed for {locator}: {e}");
                InjectError::Transport {
                    status: 0,
                    status_text: e.to_string(),
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            log::info!(
                "When loading SVGs from a local, non-served context the HTTP layer cannot \
                 reach them; use FileFetcher for direct file access."
            );
            return Err(InjectError::LoadFailed(locator));
        }
        if !status.is_success() {
            return Err(InjectError::Transport {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        // Get expected size and enforce the limit BEFORE downloading
        let expected_size = response.content_length().unwrap_or(0);
        if expected_size > self.limits.max_svg_size as u64 {
            log::warn!(
                "SVG too large: {expected_size} bytes exceeds limit of {} bytes: {locator}",
                self.limits.max_svg_size
            );
            return Err(InjectError::LoadFailed(locator));
        }

        let mut buffer = if expected_size > 0 {
            Vec::with_capacity(expected_size as usize)
        } else {
            Vec::new()
        };

        // Stream response with size checking (second line of defense)
        let mut stream = response.bytes_stream();
        let mut total_size = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| {
                log::warn!("Failed to read SVG chunk from {locator}: {e}");
                InjectError::LoadFailed(locator.clone())
            })?;

            let new_total = total_size + chunk.len();
            if new_total > self.limits.max_svg_size {
                log::warn!(
                    "SVG download exceeded size limit: {new_total} bytes (max: {}): {locator}",
                    self.limits.max_svg_size
                );
                return Err(InjectError::LoadFailed(locator));
            }

            buffer.extend_from_slice(&chunk);
            total_size = new_total;
        }

        let text = String::from_utf8(buffer)
            .map_err(|_| InjectError::ParseFailed(locator.clone()))?;

        parse_svg_document(&prepare_markup(text), &locator)
    }
}

impl SvgFetcher for HttpFetcher {
    fn fetch(&self, locator: &str) -> FetchFuture<'_> {
        let locator = locator.to_string();
        Box::pin(self.fetch_http(locator))
    }
}

/// Fetcher for local, non-served contexts.
///
/// A readable file is a success even though no transport status exists; a
/// missing file maps to the same load failure a 404 would.
#[derive(Debug, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_file(locator: String) -> Result<NodeRef, InjectError> {
        let text = match tokio::fs::read_to_string(Path::new(&locator)).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "SVG injection from a local, non-served context reads files directly; \
                     {locator} was not found on disk."
                );
                return Err(InjectError::LoadFailed(locator));
            }
            Err(e) => {
                return Err(InjectError::Transport {
                    status: 0,
                    status_text: e.to_string(),
                });
            }
        };

        parse_svg_document(&prepare_markup(text), &locator)
    }
}

impl SvgFetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> FetchFuture<'_> {
        Box::pin(Self::fetch_file(locator.to_string()))
    }
}

/// Clean up fetched SVG markup for inline usage.
///
/// Removes the XML declaration and comments out a `<!DOCTYPE svg ...>` so the
/// body parses as a fragment of the host document.
fn prepare_markup(text: String) -> String {
    let mut cleaned = text;

    // Remove XML declaration
    if let Some(prolog_start) = cleaned.find("<?xml") {
        if let Some(prolog_end_offset) = cleaned[prolog_start..].find("?>") {
            let prolog_end = prolog_start + prolog_end_offset + 2;
            cleaned.replace_range(prolog_start..prolog_end, "");
        }
    }

    // Comment out DOCTYPE if present
    if let Some(doctype_start) = cleaned.find("<!DOCTYPE svg") {
        if let Some(doctype_end_offset) = cleaned[doctype_start..].find('>') {
            let doctype_end = doctype_start + doctype_end_offset + 1;
            let doctype = &cleaned[doctype_start..doctype_end];
            let commented = format!("<!--{doctype}-->");
            cleaned.replace_range(doctype_start..doctype_end, &commented);
        }
    }

    cleaned
}
