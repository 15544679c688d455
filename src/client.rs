// src/client.rs

use std::path::{Path, PathBuf};

use headers::{Authorization, ContentType, HeaderMapExt};
use reqwest::{Method, RequestBuilder, Url, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{auth::AccessToken, config::Config, error::ApiError, models::ApiResponse};

/// Typed client for the PhysioFlow REST API.
///
/// Paths are relative to the configured base URL (`/v1/patients`, ...).
/// Request bodies and query strings are snake_case; responses are decoded
/// from the `{data, meta}` envelope.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<AccessToken>,
}

#[derive(Serialize)]
struct NoQuery {}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let cleaned = cfg.api_url.trim_end_matches('/');

        let parsed = Url::parse(cleaned)
            .map_err(|e| ApiError::Config(format!("invalid API url '{cleaned}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "API url must use http or https, got: {}",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(cfg.request_timeout)
            .timeout(cfg.request_timeout)
            .build()?;

        let token = cfg.access_token.as_deref().map(AccessToken::new);
        let fingerprint = token.as_ref().map(|t| t.fingerprint()).unwrap_or_default();
        info!(base_url = cleaned, token = %fingerprint, "PhysioFlow API client ready");

        Ok(Self {
            http,
            base_url: cleaned.to_string(),
            token,
        })
    }

    pub fn with_token(mut self, token: AccessToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        debug!(%method, path, "api request");
        let builder = self.http.request(method, self.url(path));

        let Some(token) = &self.token else {
            return Ok(builder);
        };
        if token.is_expired() {
            return Err(ApiError::session_expired());
        }

        let authz = Authorization::bearer(token.as_str())
            .map_err(|_| ApiError::Config("access token is not a valid bearer value".into()))?;
        let mut headers = HeaderMap::new();
        headers.typed_insert(authz);
        Ok(builder.headers(headers))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<ApiResponse<T>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let builder = self.request(Method::GET, path)?.query(query);
        self.send(builder).await
    }

    pub async fn get_plain<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.get(path, &NoQuery {}).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(builder).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.request(Method::PUT, path)?.json(body);
        self.send(builder).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.request(Method::PATCH, path)?.json(body);
        self.send(builder).await
    }

    /// DELETE ignores any response body; 204 and `{data: ...}` are both success.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self.request(Method::DELETE, path)?.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body))
    }

    /// Fetches a generated file (claim XML, discharge PDF, CSV export).
    pub async fn download<Q>(&self, path: &str, query: &Q, fallback_name: &str) -> Result<DownloadedFile, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self.request(Method::GET, path)?.query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| fallback_name.to_string());
        let content_type = response
            .headers()
            .typed_get::<ContentType>()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = response.bytes().await?.to_vec();
        let sha256 = hex::encode(Sha256::digest(&bytes));

        info!(path, filename = %filename, size = bytes.len(), %sha256, "downloaded file");

        Ok(DownloadedFile {
            filename,
            content_type,
            bytes,
            sha256,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl DownloadedFile {
    /// Writes the file into `dir`, keeping only the final path component of the name.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let name = Path::new(&self.filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download.bin".into());
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let rest = part.strip_prefix("filename=")?;
        let name = rest.trim_matches('"').trim();
        if name.is_empty() { None } else { Some(name.to_string()) }
    })
}
