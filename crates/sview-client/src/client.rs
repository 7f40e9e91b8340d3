//! Analysis backend HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use sview_models::{
    AnalysisDetails, AnalysisId, AnalysisPage, AnalysisStatus, Quota, StatusResponse, Team,
    UploadResponse, UserProfile,
};

use crate::api::AnalysisApi;
use crate::auth::{TokenStore, Tokens};
use crate::config::ClientConfig;
use crate::error::{extract_server_message, ClientError, ClientResult};
use crate::upload::VideoUpload;

/// Filters for the analysis listing.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub status: Option<AnalysisStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            params.push(("page_size", page_size.to_string()));
        }
        params
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Client for the analysis backend.
pub struct HttpAnalysisClient {
    http: Client,
    config: ClientConfig,
    tokens: TokenStore,
}

impl HttpAnalysisClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ClientError::Config(format!("invalid base URL {}: {}", config.base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "unsupported URL scheme: {}",
                base.scheme()
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;

        let tokens = TokenStore::new(Tokens {
            access: config.access_token.clone(),
            refresh: config.refresh_token.clone(),
        });

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Exchange credentials for a token pair and keep it for later requests.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<()> {
        let url = self.config.endpoint("login/");
        debug!("Logging in at {}", url);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Http {
                status: 401,
                message: Some("Invalid credentials".to_string()),
            });
        }

        let login: LoginResponse = read_json(check(response).await?).await?;
        self.tokens
            .set(Tokens {
                access: Some(login.access),
                refresh: Some(login.refresh),
            })
            .await;
        info!("Login succeeded");
        Ok(())
    }

    /// Profile of the signed-in user, including the current subscription.
    pub async fn profile(&self) -> ClientResult<UserProfile> {
        self.get_json("users/me/").await
    }

    /// List analyses, newest first.
    pub async fn list_analyses(&self, query: &ListQuery) -> ClientResult<AnalysisPage> {
        let url = self.config.endpoint("video-analysis/");
        let params = query.params();
        let response = self
            .send_authorized(|http| Ok(http.get(&url).query(&params)))
            .await?;
        read_json(response).await
    }

    pub async fn delete_analysis(&self, id: &AnalysisId) -> ClientResult<()> {
        let url = self.config.endpoint(&format!("video-analysis/{}/", id));
        self.send_authorized(|http| Ok(http.delete(&url))).await?;
        info!(analysis_id = %id, "Deleted analysis");
        Ok(())
    }

    /// Archive with every clip and report of an analysis.
    pub async fn download_zip(&self, id: &AnalysisId) -> ClientResult<Bytes> {
        let url = self.config.endpoint(&format!("video-analysis/{}/download_zip/", id));
        let response = self
            .send_authorized(|http| Ok(http.get(&url).timeout(self.config.upload_timeout)))
            .await?;
        Ok(response.bytes().await?)
    }

    /// PDF report for one side of the match.
    pub async fn download_pdf(&self, id: &AnalysisId, team: Team) -> ClientResult<Bytes> {
        let url = self.config.endpoint(&format!("video-analysis/{}/download_pdf/", id));
        let response = self
            .send_authorized(|http| Ok(http.get(&url).query(&[("type", team.as_str())])))
            .await?;
        Ok(response.bytes().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = self.config.endpoint(path);
        debug!("GET {}", url);
        let response = self.send_authorized(|http| Ok(http.get(&url))).await?;
        read_json(response).await
    }

    async fn refresh_access_token(&self, refresh_token: String) -> ClientResult<String> {
        let url = self.config.endpoint("token/refresh/");
        debug!("Refreshing access token at {}", url);

        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await?;

        let refreshed: RefreshResponse = read_json(check(response).await?).await?;
        Ok(refreshed.access)
    }

    /// Send a request with the bearer token, rotating it once on 401.
    ///
    /// `build` is called again for the retry, so request bodies must be
    /// rebuildable.
    async fn send_authorized<F>(&self, build: F) -> ClientResult<Response>
    where
        F: Fn(&Client) -> ClientResult<RequestBuilder>,
    {
        let token = self.tokens.access_token().await;
        let response = with_bearer(build(&self.http)?, token.as_deref()).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check(response).await;
        }

        warn!("Request rejected with 401, refreshing access token");
        let fresh = self
            .tokens
            .rotate(token.as_deref(), |refresh| self.refresh_access_token(refresh))
            .await?;

        let retry = build(&self.http)?.bearer_auth(&fresh).send().await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        check(retry).await
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Turn non-2xx responses into `ClientError::Http`.
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Http {
        status: status.as_u16(),
        message: extract_server_message(&body),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn video_form(upload: &VideoUpload) -> ClientResult<Form> {
    let part = Part::stream_with_length(Body::from(upload.data.clone()), upload.size_bytes())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)?;

    let mut form = Form::new().part("video", part);
    if let Some(title) = upload.title.as_ref().filter(|t| !t.is_empty()) {
        form = form.text("title", title.clone());
    }
    Ok(form)
}

#[async_trait]
impl AnalysisApi for HttpAnalysisClient {
    async fn submit(&self, upload: &VideoUpload) -> ClientResult<UploadResponse> {
        let url = self.config.endpoint("video-analysis/upload/");
        info!(
            file_name = %upload.file_name,
            size_bytes = upload.size_bytes(),
            "Uploading video for analysis"
        );

        let response = self
            .send_authorized(|http| {
                Ok(http
                    .post(&url)
                    .timeout(self.config.upload_timeout)
                    .multipart(video_form(upload)?))
            })
            .await?;

        let accepted: UploadResponse = read_json(response).await?;
        if accepted.id.as_str().is_empty() {
            return Err(ClientError::InvalidResponse(
                "upload accepted without an analysis id".to_string(),
            ));
        }
        info!(analysis_id = %accepted.id, "Upload accepted");
        Ok(accepted)
    }

    async fn get_status(&self, id: &AnalysisId) -> ClientResult<StatusResponse> {
        self.get_json(&format!("video-analysis/{}/status/", id)).await
    }

    async fn get_details(&self, id: &AnalysisId) -> ClientResult<AnalysisDetails> {
        self.get_json(&format!("video-analysis/{}/", id)).await
    }

    async fn refresh_quota(&self) -> ClientResult<Quota> {
        Ok(self.profile().await?.quota())
    }
}
