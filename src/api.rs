use std::collections::BTreeMap;
use std::path::Path;

use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::error::{CONNECTIVITY_MESSAGE, ServiceError};
use crate::fetcher::Fetcher;

pub const UPLOAD_FAILED_MESSAGE: &str = "Image upload failed. Please check your Internet connection.";
pub const URL_CHECK_UNAVAILABLE_MESSAGE: &str =
    "Service is temporarily unavailable, Please try again later.";
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    fn path(self) -> &'static str {
        match self {
            VoteDirection::Up => "comments/upvote.json",
            VoteDirection::Down => "comments/downvote.json",
        }
    }
}

/// Score and voter sets returned after an up/down vote on a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteTally {
    pub score: f64,
    #[serde(default)]
    pub upvotes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub downvotes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlCheck {
    Available,
    /// Another post already links to this URL.
    Duplicate { url: String },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct UploadedImage {
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub uid: serde_json::Value,
}

#[derive(Deserialize)]
struct ScoresResponse {
    #[serde(default)]
    score_table: BTreeMap<String, Option<f64>>,
}

#[derive(Deserialize)]
struct ExistsResponse {
    result: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    response: UploadedImage,
}

/// Client for the platform's JSON API.
#[derive(Clone)]
pub struct ApiClient {
    fetcher: Fetcher,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(fetcher: Fetcher, mut base: Url, token: Option<String>) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            fetcher,
            base,
            token,
        }
    }

    /// Ranking scores keyed by content id, for the given voters of each content id.
    pub async fn scores(
        &self,
        active_voters: &BTreeMap<String, Vec<String>>,
    ) -> Result<BTreeMap<String, f64>, ServiceError> {
        // The service expects the voter map as a JSON string inside the JSON body.
        let encoded = serde_json::to_string(active_voters)
            .map_err(|e| ServiceError::Unreachable(e.to_string()))?;
        let body = json!({ "active_voters": encoded });
        let url = self.endpoint("comments/scores.json")?;
        let resp: ScoresResponse = self
            .request("POST comments/scores.json", CONNECTIVITY_MESSAGE, |client| {
                client.post(url.clone()).json(&body)
            })
            .await?;
        Ok(resp
            .score_table
            .into_iter()
            .map(|(id, score)| (id, score.unwrap_or(0.0)))
            .collect())
    }

    pub async fn vote(
        &self,
        comment_id: u64,
        direction: VoteDirection,
    ) -> Result<VoteTally, ServiceError> {
        let body = json!({ "key": comment_id });
        let url = self.endpoint(direction.path())?;
        let label = format!("POST {}", direction.path());
        self.request(&label, CONNECTIVITY_MESSAGE, |client| {
            client.post(url.clone()).json(&body)
        })
        .await
    }

    /// Whether a product URL is still free to submit.
    pub async fn check_url(&self, candidate: &str) -> Result<UrlCheck, ServiceError> {
        let mut url = self.endpoint("posts/exists.json")?;
        url.query_pairs_mut().append_pair("url", candidate);
        let resp: ExistsResponse = self
            .request("GET posts/exists.json", URL_CHECK_UNAVAILABLE_MESSAGE, |client| {
                client.get(url.clone())
            })
            .await
            .map_err(|e| match e {
                ServiceError::Rejected { status, .. } if status >= 500 => {
                    ServiceError::Unreachable(URL_CHECK_UNAVAILABLE_MESSAGE.to_string())
                }
                other => other,
            })?;

        Ok(if resp.result == "OK" {
            UrlCheck::Available
        } else if let Some(url) = resp.url {
            UrlCheck::Duplicate { url }
        } else {
            UrlCheck::Rejected {
                reason: resp.result,
            }
        })
    }

    pub async fn upload_image(&self, path: &Path) -> Result<UploadedImage, ServiceError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "read image");
            ServiceError::Unreachable(format!("Could not read {}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = validate_image(&name, bytes.len())
            .map_err(ServiceError::Invalid)?;

        let url = self.endpoint("images/upload.json")?;
        let resp: UploadResponse = self
            .request("POST images/upload.json", UPLOAD_FAILED_MESSAGE, |client| {
                let part = Part::bytes(bytes.clone())
                    .file_name(name.clone())
                    .mime_str(mime)
                    .unwrap_or_else(|_| Part::bytes(bytes.clone()).file_name(name.clone()));
                client
                    .post(url.clone())
                    .multipart(Form::new().part("image", part))
            })
            .await?;
        Ok(resp.response)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base
            .join(path)
            .map_err(|e| ServiceError::Unreachable(format!("invalid API url: {e}")))
    }

    async fn request<T, F>(&self, label: &str, fallback: &str, build: F) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let (status, body) = self
            .fetcher
            .send(label, |client| {
                let req = build(client);
                match &self.token {
                    Some(token) => req.bearer_auth(token),
                    None => req,
                }
            })
            .await
            .map_err(|e| {
                tracing::error!(request = label, error = %format!("{e:#}"), "request failed");
                ServiceError::Unreachable(fallback.to_string())
            })?;

        if !status.is_success() {
            tracing::warn!(request = label, %status, "service rejected request");
            return Err(ServiceError::from_response(status.as_u16(), &body, fallback));
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(request = label, error = %e, "unexpected response body");
            ServiceError::Unreachable(fallback.to_string())
        })
    }
}

/// Checks an image before upload and returns its MIME type.
pub fn validate_image(file_name: &str, size: usize) -> Result<&'static str, String> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => return Err("You can only upload JPG, PNG or GIF images.".to_string()),
    };
    if size > MAX_IMAGE_BYTES {
        return Err("Image must be smaller than 5MB.".to_string());
    }
    Ok(mime)
}
