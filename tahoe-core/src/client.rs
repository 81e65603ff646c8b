use reqwest::header::ACCEPT;
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use url::Url;

use crate::listing::{Capability, RemoteListing, parse_listing};

const UPLOAD_FORMAT: &str = "CHK";

#[derive(Debug, Error)]
pub enum TahoeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("gateway url cannot carry path segments: {0}")]
    InvalidBaseUrl(String),
    #[error("gateway returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("malformed gateway response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unsupported node type {0}")]
    UnsupportedNodeType(String),
    #[error("entry {0} carries no capability")]
    MissingCapability(String),
}

/// Client for the `/uri` surface of a Tahoe-LAFS web gateway.
#[derive(Clone)]
pub struct TahoeClient {
    http: Client,
    base_url: Url,
}

impl TahoeClient {
    pub fn new(base_url: &str) -> Result<Self, TahoeError> {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, TahoeError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(TahoeError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches a fresh snapshot of the children of a directory capability.
    pub async fn list_directory(&self, dir: &Capability) -> Result<RemoteListing, TahoeError> {
        let mut url = self.node_url(dir, None)?;
        url.query_pairs_mut().append_pair("t", "json");
        let response = self.send(self.http.get(url)).await?;
        let response = Self::require_status(response, |status| status == StatusCode::OK).await?;
        let body = response.text().await?;
        parse_listing(&body)
    }

    /// Uploads `body` as an immutable file named `name` under `parent`.
    ///
    /// The body is sent as is, so a streaming body is never buffered here.
    /// Returns the cap of the new file.
    pub async fn put_file(
        &self,
        parent: &Capability,
        name: &str,
        body: impl Into<Body>,
    ) -> Result<Capability, TahoeError> {
        let mut url = self.node_url(parent, Some(name))?;
        url.query_pairs_mut().append_pair("format", UPLOAD_FORMAT);
        let response = self.send(self.http.put(url).body(body)).await?;
        let response =
            Self::require_status(response, |status| status == StatusCode::CREATED).await?;
        Ok(Capability::new(response.text().await?.trim()))
    }

    /// Unlinks the child `name` from `parent`, whatever kind of node it is.
    pub async fn unlink(&self, parent: &Capability, name: &str) -> Result<(), TahoeError> {
        let url = self.node_url(parent, Some(name))?;
        let response = self.send(self.http.delete(url)).await?;
        Self::require_status(response, |status| status == StatusCode::OK).await?;
        Ok(())
    }

    /// Creates an empty directory `name` under `parent` and returns its cap.
    pub async fn mkdir(&self, parent: &Capability, name: &str) -> Result<Capability, TahoeError> {
        let mut url = self.node_url(parent, Some(name))?;
        url.query_pairs_mut().append_pair("t", "mkdir");
        let response = self.send(self.http.post(url)).await?;
        let response = Self::require_status(response, |status| status.is_success()).await?;
        Ok(Capability::new(response.text().await?.trim()))
    }

    /// Opens the contents of a file node for streaming reads.
    pub async fn read_file(&self, file: &Capability) -> Result<Response, TahoeError> {
        let url = self.node_url(file, None)?;
        let response = self.send(self.http.get(url)).await?;
        Self::require_status(response, |status| status == StatusCode::OK).await
    }

    fn node_url(&self, cap: &Capability, child: Option<&str>) -> Result<Url, TahoeError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| TahoeError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("uri").push(cap.as_str());
            if let Some(child) = child {
                segments.push(child);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TahoeError> {
        Ok(request.header(ACCEPT, "text/plain").send().await?)
    }

    async fn require_status(
        response: Response,
        accepted: impl Fn(StatusCode) -> bool,
    ) -> Result<Response, TahoeError> {
        let status = response.status();
        if accepted(status) {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TahoeError::Api { status, body })
        }
    }
}

impl TahoeError {
    /// Status of a rejected request, when the gateway answered at all.
    pub fn api_status(&self) -> Option<StatusCode> {
        match self {
            TahoeError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
