use std::fmt;
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result, summarize_error_body};
use crate::job::{JobCreated, JobOptions, JobRequest, JobStatus, poll_until_complete};
use crate::util::urljoin;

/// Default bound on poll attempts, roughly an hour at the default interval.
pub const DEFAULT_MAX_RETRIES: u32 = 3600;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const TOKEN_PATH: &str = "/oauth/token";
const BATCH_QUERY_PATH: &str = "/v1/batch-query/";

/// OAuth client credentials. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Base URLs for the REST API and the file storage host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST API host, e.g. `https://rest.zuora.com`.
    pub api: String,
    /// File download host, e.g. `https://zuora.com`.
    pub file: String,
}

impl Endpoints {
    pub fn production() -> Self {
        Self {
            api: "https://rest.zuora.com".to_string(),
            file: "https://zuora.com".to_string(),
        }
    }

    pub fn sandbox() -> Self {
        Self {
            api: "https://rest.apisandbox.zuora.com".to_string(),
            file: "https://apisandbox.zuora.com".to_string(),
        }
    }

    pub fn for_production(production: bool) -> Self {
        if production {
            Self::production()
        } else {
            Self::sandbox()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub job: JobOptions,
    /// `None` polls until the job completes.
    pub max_retries: Option<u32>,
    pub poll_interval: Duration,
    /// Per-request timeout; `None` disables it.
    pub timeout: Option<Duration>,
    /// Show a spinner on stderr while polling.
    pub progress: bool,
}

impl ClientConfig {
    pub fn new(credentials: Credentials, endpoints: Endpoints) -> Self {
        Self {
            credentials,
            endpoints,
            job: JobOptions::default(),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            progress: false,
        }
    }

    pub fn with_job_options(mut self, job: JobOptions) -> Self {
        self.job = job;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authenticated AQuA client. The bearer token is fetched once, on connect.
#[derive(Clone)]
pub struct ZuoraClient {
    config: ClientConfig,
    token: String,
    http: HttpClient,
}

impl fmt::Debug for ZuoraClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZuoraClient")
            .field("endpoints", &self.config.endpoints)
            .field("max_retries", &self.config.max_retries)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ZuoraClient {
    /// Builds the HTTP client and exchanges the credentials for a bearer token.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("zacc-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("zacc-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(config.timeout)
            .build()
            .map_err(Error::HttpClient)?;

        let token = fetch_token(&http, &config.endpoints, &config.credentials)?;
        Ok(Self {
            config,
            token,
            http,
        })
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    /// Value for the `Authorization` header, `Bearer <token>`.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs the whole workflow: submit, poll, then download every result file.
    ///
    /// Results are returned in the order the queries were given.
    pub fn query(&self, queries: &[String]) -> Result<Vec<String>> {
        let job_url = self.start_job(queries)?;
        let file_ids = self.poll_job(&job_url, queries.len())?;
        file_ids
            .iter()
            .map(|file_id| self.get_file_content(file_id))
            .collect()
    }

    /// Submits a batch-query job and returns its status URL.
    pub fn start_job(&self, queries: &[String]) -> Result<String> {
        let url = urljoin(&self.config.endpoints.api, BATCH_QUERY_PATH);
        let request = JobRequest::new(queries, &self.config.job, chrono::Local::now());

        let resp = self.send(&url, self.authorized(self.http.post(&url)).json(&request))?;
        let text = self.read_success(&url, resp)?;

        let id = serde_json::from_str::<JobCreated>(&text)
            .ok()
            .and_then(|created| created.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidQuery { body: text.clone() })?;

        tracing::info!(job_id = %id, queries = queries.len(), "batch query job submitted");
        Ok(format!("{}/jobs/{}", url.trim_end_matches('/'), id))
    }

    /// Blocks until the job completes and returns its result file ids.
    pub fn poll_job(&self, job_url: &str, expected_files: usize) -> Result<Vec<String>> {
        let spinner = self.spinner();
        let interval = self.config.poll_interval;

        let status = poll_until_complete(
            || self.api_json::<JobStatus>(job_url),
            |attempt| {
                if let Some(pb) = &spinner {
                    pb.set_message(format!("waiting for job, attempt {}", attempt + 1));
                }
                thread::sleep(interval);
            },
            self.config.max_retries,
        );
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }
        let status = status?;

        let file_ids = status.file_ids().ok_or_else(|| Error::MalformedResponse {
            url: job_url.to_string(),
            message: "completed job has a batch without fileId".to_string(),
        })?;
        if file_ids.len() != expected_files {
            return Err(Error::MalformedResponse {
                url: job_url.to_string(),
                message: format!(
                    "expected {} result file(s), job reported {}",
                    expected_files,
                    file_ids.len()
                ),
            });
        }
        Ok(file_ids)
    }

    /// Downloads one result file as text.
    pub fn get_file_content(&self, file_id: &str) -> Result<String> {
        let url = urljoin(
            &self.config.endpoints.file,
            &format!("/apps/api/file/{}", file_id),
        );
        tracing::debug!(file_id, "downloading result file");

        let resp = self.send(&url, self.authorized(self.http.get(&url)))?;
        let status = resp.status();
        let bytes = resp.bytes().map_err(|source| Error::Transport {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
                message: summarize_error_body(status, &String::from_utf8_lossy(&bytes)),
            });
        }

        String::from_utf8(bytes.to_vec()).map_err(|e| Error::MalformedResponse {
            url,
            message: format!("result file is not valid UTF-8: {}", e),
        })
    }

    /// Fetches the raw XML description of a Zuora object.
    pub fn get_resource(&self, resource: &str) -> Result<String> {
        let url = urljoin(
            &self.config.endpoints.api,
            &format!("/v1/describe/{}", resource),
        );
        let resp = self.send(&url, self.authorized(self.http.get(&url)))?;
        self.read_success(&url, resp)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, self.authorization())
            .header(CONTENT_TYPE, "application/json")
    }

    fn send(&self, url: &str, req: RequestBuilder) -> Result<Response> {
        req.send().map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })
    }

    fn read_success(&self, url: &str, resp: Response) -> Result<String> {
        let status = resp.status();
        let text = resp.text().map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
                message: summarize_error_body(status, &text),
            });
        }
        Ok(text)
    }

    fn api_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.send(url, self.authorized(self.http.get(url)))?;
        let text = self.read_success(url, resp)?;
        serde_json::from_str::<T>(&text).map_err(|e| Error::MalformedResponse {
            url: url.to_string(),
            message: format!("failed to parse API JSON: {}", e),
        })
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.config.progress {
            return None;
        }
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("waiting for job");
        Some(pb)
    }
}

fn fetch_token(http: &HttpClient, endpoints: &Endpoints, credentials: &Credentials) -> Result<String> {
    let url = urljoin(&endpoints.api, TOKEN_PATH);
    let form = [
        ("client_id", credentials.client_id()),
        ("client_secret", credentials.client_secret()),
        ("grant_type", "client_credentials"),
    ];

    tracing::debug!(url = %url, "requesting bearer token");
    let resp = http
        .post(&url)
        .form(&form)
        .send()
        .map_err(|source| Error::Connection {
            url: url.clone(),
            source,
        })?;

    let status = resp.status();
    let text = resp.text().map_err(|source| Error::Connection {
        url: url.clone(),
        source,
    })?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "token request rejected");
        return Err(Error::Authentication {
            status: status.as_u16(),
            body: text,
        });
    }

    let token: TokenResponse =
        serde_json::from_str(&text).map_err(|e| Error::MalformedResponse {
            url,
            message: format!("missing access_token: {}", e),
        })?;
    Ok(token.access_token)
}
