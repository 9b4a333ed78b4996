/**
 * Live Page
 *
 * A page as the client holds it: the live document, the nonce the server
 * handed out with the initial load, and the build version the page was
 * rendered by. Payloads pushed over the stream are applied through
 * `PayloadSink`, which the reconnector is generic over.
 */

use crate::client::dom::{parse_document, Document};
use crate::client::error::ClientError;
use crate::client::morph::{morph, MorphOptions, MorphStats};
use crate::shared::{Nonce, LIVE_CONNECTION_HEADER, VERSION_HEADER};
use reqwest::header::HeaderMap;

/// Receives each HTML payload read off a live stream
pub trait PayloadSink: Send + 'static {
    fn apply_payload(&mut self, html: &str) -> Result<MorphStats, ClientError>;
}

#[derive(Debug)]
pub struct LivePage {
    document: Document,
    path: String,
    nonce: Option<Nonce>,
    version: String,
    options: MorphOptions,
}

impl LivePage {
    /// Fetch `path` and build the page from the response
    pub async fn load(http: &reqwest::Client, base_url: &str, path: &str) -> Result<Self, ClientError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        tracing::debug!("[Client] Loading {}", url);

        let response = http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        let headers = response.headers().clone();
        let version = header_text(&headers, VERSION_HEADER)
            .ok_or(ClientError::MissingHeader(VERSION_HEADER))?;
        let nonce = match header_text(&headers, LIVE_CONNECTION_HEADER) {
            Some(value) => Some(Nonce::parse(&value)?),
            None => None,
        };
        let html = response.text().await?;

        Self::from_html(path, &html, nonce, version)
    }

    pub fn from_html(
        path: impl Into<String>,
        html: &str,
        nonce: Option<Nonce>,
        version: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            document: Document::from_node(&parse_document(html)?),
            path: path.into(),
            nonce,
            version: version.into(),
            options: MorphOptions::default(),
        })
    }

    pub fn with_options(mut self, options: MorphOptions) -> Self {
        self.options = options;
        self
    }

    /// Morph the live document into `html`
    pub fn apply(&mut self, html: &str) -> Result<MorphStats, ClientError> {
        let fresh = parse_document(html)?;
        let root = self.document.root();
        Ok(morph(&mut self.document, root, &fresh, &self.options))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Nonce handed out with the initial load, if the server registered one
    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn to_html(&self) -> String {
        self.document.to_html()
    }
}

impl PayloadSink for LivePage {
    fn apply_payload(&mut self, html: &str) -> Result<MorphStats, ClientError> {
        self.apply(html)
    }
}

pub(crate) fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}
