use std::path::PathBuf;
use std::time::Duration;

use flog_api_types::{
    API_PREFIX, ApiEnvelope, AuthRequest, EntryPayload, SidebarRequest, UploadRequest,
};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no credentials file found in {} or any parent directory", .start.display())]
    ConfigurationNotFound { start: PathBuf },
    #[error("invalid credentials file {path}: {reason}")]
    Credentials { path: String, reason: String },
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("referenced media file {path} cannot be read: {source}")]
    MissingMedia {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to rewrite html: {0}")]
    Rewrite(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed (status {status})")]
    AuthenticationFailed { status: StatusCode },
    #[error("entry submission failed: {0}")]
    EntrySubmission(String),
    #[error("sidebar submission failed: {0}")]
    SidebarSubmission(String),
    #[error("{broken} broken link(s) found; the entry was left as a draft")]
    LinkValidation { broken: usize },
    #[error("server error: {0}")]
    Server(String),
}

/// Session-carrying HTTP context for one publish invocation.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
}

impl Ctx {
    pub fn new(domain: &str, timeout: Duration) -> Result<Self, CliError> {
        let base = Url::parse(domain)?.join("/")?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("flog-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    fn api_url(&self, route: &str) -> Result<Url, CliError> {
        self.url(&format!("{API_PREFIX}/{route}"))
    }

    /// Log in and keep the session cookie for the following stages.
    pub async fn authenticate(&self, auth: &AuthRequest) -> Result<(), CliError> {
        let resp = self
            .client
            .post(self.api_url("auth/")?)
            .json(auth)
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(CliError::AuthenticationFailed { status });
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), CliError> {
        self.client.post(self.api_url("auth/logout/")?).send().await?;
        Ok(())
    }

    /// Best-effort logout once a run no longer needs the session.
    pub async fn close(&self) {
        if let Err(err) = self.logout().await {
            debug!(target = "flog_cli::client", error = %err, "logout failed");
        }
    }

    pub async fn upload(&self, request: &UploadRequest) -> Result<ApiEnvelope, CliError> {
        let route = format!("upload/{}", request.slug);
        self.send_json(Method::POST, &route, request).await
    }

    pub async fn submit_entry(&self, payload: &EntryPayload) -> Result<ApiEnvelope, CliError> {
        self.send_json(Method::POST, "entry/", payload).await
    }

    pub async fn update_entry(&self, payload: &EntryPayload) -> Result<ApiEnvelope, CliError> {
        self.send_json(Method::PUT, "entry/", payload).await
    }

    pub async fn read_entry(&self, slug: &str) -> Result<EntryPayload, CliError> {
        let resp = self
            .client
            .get(self.api_url(&format!("entry/{slug}"))?)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))
    }

    pub async fn delete_entry(&self, slug: &str) -> Result<ApiEnvelope, CliError> {
        let resp = self
            .client
            .delete(self.api_url(&format!("entry/{slug}"))?)
            .send()
            .await?;
        Self::envelope(resp).await
    }

    pub async fn submit_sidebar(&self, request: &SidebarRequest) -> Result<ApiEnvelope, CliError> {
        self.send_json(Method::POST, "sidebar/", request).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        route: &str,
        body: &B,
    ) -> Result<ApiEnvelope, CliError> {
        let url = self.api_url(route)?;
        debug!(target = "flog_cli::client", method = %method, url = %url, "sending request");
        let resp = self.client.request(method, url).json(body).send().await?;
        Self::envelope(resp).await
    }

    /// Decode the `{success, error?}` envelope. Failure envelopes are returned
    /// as values so each stage can decide whether they are fatal.
    async fn envelope(resp: Response) -> Result<ApiEnvelope, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        match serde_json::from_slice::<ApiEnvelope>(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(_) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                Err(CliError::Server(format!("status {status} body {text}")))
            }
        }
    }
}
