//! XRPC client for a Bluesky PDS.
//!
//! Covers exactly what publishing needs: app-password login, session
//! refresh, blob upload, and post creation.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::record::{
    CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, Embed, EmbedImage,
    PostRecord, SessionResponse, UploadBlobResponse, XrpcErrorBody, POST_COLLECTION,
};
use super::{PostUri, PublishError, Publisher};
use crate::content::{LinkFacet, PostImage, PostVideo};

/// Default PDS entryway.
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Authenticated session tokens.
#[derive(Clone)]
struct Session {
    access_jwt: String,
    refresh_jwt: String,
    did: String,
    handle: String,
}

impl From<SessionResponse> for Session {
    fn from(r: SessionResponse) -> Self {
        Self {
            access_jwt: r.access_jwt,
            refresh_jwt: r.refresh_jwt,
            did: r.did,
            handle: r.handle,
        }
    }
}

/// Logged-in Bluesky client implementing [`Publisher`].
pub struct BlueskyClient {
    http: reqwest::Client,
    service: Url,
    langs: Vec<String>,
    session: Mutex<Session>,
}

impl std::fmt::Debug for BlueskyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueskyClient")
            .field("service", &self.service.as_str())
            .field("langs", &self.langs)
            .field("session", &"[REDACTED]")
            .finish()
    }
}

impl BlueskyClient {
    /// Log in with an app password.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the service URL is invalid or login fails.
    pub async fn login(
        service: &str,
        identifier: &str,
        password: &str,
        langs: Vec<String>,
    ) -> Result<Self, PublishError> {
        let service = Url::parse(service)
            .map_err(|e| PublishError::Parse(format!("invalid service url {service:?}: {e}")))?;
        let http = reqwest::Client::new();

        let response = http
            .post(endpoint(&service, CREATE_SESSION)?)
            .json(&CreateSessionRequest {
                identifier,
                password,
            })
            .send()
            .await?;
        let session: SessionResponse = parse_json(&check_xrpc_response(response).await?)?;
        info!(handle = %session.handle, did = %session.did, "logged in to bluesky");

        Ok(Self {
            http,
            service,
            langs,
            session: Mutex::new(session.into()),
        })
    }

    /// DID of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Session`] if the session lock is poisoned.
    pub fn did(&self) -> Result<String, PublishError> {
        Ok(self.session()?.did)
    }

    /// Handle of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Session`] if the session lock is poisoned.
    pub fn handle(&self) -> Result<String, PublishError> {
        Ok(self.session()?.handle)
    }

    fn session(&self) -> Result<Session, PublishError> {
        self.session
            .lock()
            .map(|s| s.clone())
            .map_err(|e| PublishError::Session(format!("lock poisoned: {e}")))
    }

    async fn refresh(&self) -> Result<(), PublishError> {
        let refresh_jwt = self.session()?.refresh_jwt;
        let response = self
            .http
            .post(endpoint(&self.service, REFRESH_SESSION)?)
            .bearer_auth(refresh_jwt)
            .send()
            .await?;
        let fresh: SessionResponse = parse_json(&check_xrpc_response(response).await?)?;
        debug!(did = %fresh.did, "bluesky session refreshed");

        let mut session = self
            .session
            .lock()
            .map_err(|e| PublishError::Session(format!("lock poisoned: {e}")))?;
        *session = fresh.into();
        Ok(())
    }

    /// Send an authenticated request, refreshing the session once if the
    /// access token has expired.
    async fn send_authed<F>(&self, build: F) -> Result<String, PublishError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder + Send + Sync,
    {
        let token = self.session()?.access_jwt;
        let first = check_xrpc_response(build(&token).send().await?).await;
        match first {
            Err(e) if e.is_expired_token() => {
                warn!("bluesky access token expired, refreshing session");
                self.refresh().await?;
                let token = self.session()?.access_jwt;
                check_xrpc_response(build(&token).send().await?).await
            }
            other => other,
        }
    }

    /// Upload a blob and return its reference.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the upload fails.
    pub async fn upload_blob(
        &self,
        data: &[u8],
        mime: &str,
    ) -> Result<serde_json::Value, PublishError> {
        let url = endpoint(&self.service, UPLOAD_BLOB)?;
        let body = self
            .send_authed(|token| {
                self.http
                    .post(url.clone())
                    .bearer_auth(token)
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(data.to_vec())
            })
            .await?;
        let uploaded: UploadBlobResponse = parse_json(&body)?;
        debug!(bytes = data.len(), mime, "blob uploaded");
        Ok(uploaded.blob)
    }

    /// Create a post record and return its URI.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the record is rejected.
    pub async fn create_post(&self, record: &PostRecord) -> Result<PostUri, PublishError> {
        let url = endpoint(&self.service, CREATE_RECORD)?;
        let did = self.did()?;
        let request = CreateRecordRequest {
            repo: &did,
            collection: POST_COLLECTION,
            record,
        };
        let body = self
            .send_authed(|token| self.http.post(url.clone()).bearer_auth(token).json(&request))
            .await?;
        let created: CreateRecordResponse = parse_json(&body)?;
        info!(uri = %created.uri, cid = %created.cid, "post created");
        PostUri::parse(&created.uri)
    }
}

#[async_trait]
impl Publisher for BlueskyClient {
    async fn publish_text(
        &self,
        text: &str,
        facets: &[LinkFacet],
    ) -> Result<PostUri, PublishError> {
        let record = PostRecord::new(text, facets, None, &self.langs);
        self.create_post(&record).await
    }

    async fn publish_images(
        &self,
        text: &str,
        facets: &[LinkFacet],
        images: &[PostImage],
    ) -> Result<PostUri, PublishError> {
        let mut embedded = Vec::with_capacity(images.len());
        for image in images {
            let blob = self.upload_blob(&image.data, &image.mime).await?;
            embedded.push(EmbedImage {
                alt: image.alt.clone(),
                image: blob,
                aspect_ratio: image.aspect_ratio.map(Into::into),
            });
        }
        let embed = Embed::Images { images: embedded };
        let record = PostRecord::new(text, facets, Some(embed), &self.langs);
        self.create_post(&record).await
    }

    async fn publish_video(
        &self,
        text: &str,
        facets: &[LinkFacet],
        video: &PostVideo,
    ) -> Result<PostUri, PublishError> {
        let blob = self.upload_blob(&video.data, &video.mime).await?;
        let embed = Embed::Video {
            video: blob,
            aspect_ratio: video.aspect_ratio.map(Into::into),
        };
        let record = PostRecord::new(text, facets, Some(embed), &self.langs);
        self.create_post(&record).await
    }
}

fn endpoint(service: &Url, nsid: &str) -> Result<Url, PublishError> {
    service
        .join(&format!("xrpc/{nsid}"))
        .map_err(|e| PublishError::Parse(format!("cannot build endpoint for {nsid}: {e}")))
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, PublishError> {
    serde_json::from_str(body).map_err(|e| PublishError::Parse(e.to_string()))
}

/// Check an XRPC response status and return the body, or the server's
/// error as [`PublishError::Rejected`].
///
/// # Errors
///
/// Returns [`PublishError::Request`] on transport failure and
/// [`PublishError::Rejected`] on a non-2xx status.
pub async fn check_xrpc_response(response: reqwest::Response) -> Result<String, PublishError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    Err(rejection(status.as_u16(), &body))
}

/// Convert an error status and body into [`PublishError::Rejected`].
pub fn rejection(status: u16, body: &str) -> PublishError {
    const MAX_ERROR_BODY_CHARS: usize = 256;

    match serde_json::from_str::<XrpcErrorBody>(body) {
        Ok(parsed) => PublishError::Rejected {
            status,
            message: parsed
                .message
                .or_else(|| parsed.error.clone())
                .unwrap_or_else(|| format!("HTTP {status}")),
            error: parsed.error,
        },
        Err(_) => {
            let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
            let message = if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
                let shortened = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
                format!("{shortened}...[truncated]")
            } else if collapsed.is_empty() {
                format!("HTTP {status}")
            } else {
                collapsed
            };
            PublishError::Rejected {
                status,
                error: None,
                message,
            }
        }
    }
}
