//! Shared request/response plumbing for the remote speech and language services.
//!
//! Each service client is a thin configuration over [`RemoteEndpoint`]: it
//! picks the URL, the authentication scheme and a [`ResponseBody`] decoder,
//! and the endpoint maps non-success statuses onto the service's error.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, RevoiceError};

/// Which remote service an endpoint talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Transcription,
    Translation,
    Synthesis,
}

impl ServiceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Translation => "translation",
            Self::Synthesis => "speech synthesis",
        }
    }

    /// The service-specific error for a failed call.
    pub fn error(self, status: u16, body: String) -> RevoiceError {
        match self {
            Self::Transcription => RevoiceError::TranscriptionService { status, body },
            Self::Translation => RevoiceError::TranslationService { status, body },
            Self::Synthesis => RevoiceError::SynthesisService { status, body },
        }
    }
}

/// How the credential is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Header(&'static str),
}

/// Decodes a successful response.
#[async_trait]
pub trait ResponseBody: Sized + Send {
    async fn decode(response: reqwest::Response) -> std::result::Result<Self, String>;
}

/// JSON response body.
pub struct Json<T>(pub T);

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> ResponseBody for Json<T> {
    async fn decode(response: reqwest::Response) -> std::result::Result<Self, String> {
        response
            .json::<T>()
            .await
            .map(Json)
            .map_err(|e| format!("malformed response body: {}", e))
    }
}

/// Raw binary response body.
#[async_trait]
impl ResponseBody for Vec<u8> {
    async fn decode(response: reqwest::Response) -> std::result::Result<Self, String> {
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| format!("failed to read response body: {}", e))
    }
}

/// One remote service endpoint with its credential.
pub struct RemoteEndpoint {
    client: Client,
    url: String,
    api_key: Option<String>,
    auth: AuthScheme,
    accept: Option<&'static str>,
    kind: ServiceKind,
}

impl RemoteEndpoint {
    pub fn new(
        kind: ServiceKind,
        url: impl Into<String>,
        api_key: Option<String>,
        auth: AuthScheme,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RevoiceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            api_key,
            auth,
            accept: None,
            kind,
        })
    }

    /// Send `Accept: <mime>` with every request.
    pub fn accept(mut self, mime: &'static str) -> Self {
        self.accept = Some(mime);
        self
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Fails with `Configuration` when no credential is available.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            RevoiceError::Configuration(format!(
                "No API key configured for the {} service",
                self.kind.label()
            ))
        })
    }

    /// POST `body` as JSON to the endpoint URL extended by `path` segments and
    /// decode a successful response with `R`.
    pub async fn post<B, R>(&self, path: &[&str], body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: ResponseBody,
    {
        let api_key = self.require_api_key()?;

        let mut url = self.url.clone();
        for segment in path {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }

        debug!("Sending {} request to: {}", self.kind.label(), url);

        let mut request = self.client.post(&url).json(body);
        request = match self.auth {
            AuthScheme::Bearer => request.bearer_auth(api_key),
            AuthScheme::Header(name) => request.header(name, api_key),
        };
        if let Some(mime) = self.accept {
            request = request.header(reqwest::header::ACCEPT, mime);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} service returned {}: {}", self.kind.label(), status, body);
            return Err(self.kind.error(status.as_u16(), body));
        }

        R::decode(response)
            .await
            .map_err(|message| self.kind.error(status.as_u16(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize)]
    struct Echo {
        value: String,
    }

    fn endpoint(server: &MockServer, key: Option<&str>, auth: AuthScheme) -> RemoteEndpoint {
        RemoteEndpoint::new(
            ServiceKind::Translation,
            format!("{}/v1/echo/", server.uri()),
            key.map(str::to_string),
            auth,
            5,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_post_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/echo/extra"))
            .and(header("authorization", "Bearer k1"))
            .and(body_json(json!({"value": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "hi back"})))
            .expect(1)
            .mount(&server)
            .await;

        let Json(echo): Json<Echo> = endpoint(&server, Some("k1"), AuthScheme::Bearer)
            .post(&["extra"], &json!({"value": "hi"}))
            .await
            .unwrap();
        assert_eq!(echo.value, "hi back");
    }

    #[tokio::test]
    async fn test_post_uses_custom_auth_header_and_accept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("xi-api-key", "k2"))
            .and(header("accept", "audio/mpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let bytes: Vec<u8> = endpoint(&server, Some("k2"), AuthScheme::Header("xi-api-key"))
            .accept("audio/mpeg")
            .post(&[], &json!({}))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_non_success_maps_to_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = endpoint(&server, Some("k"), AuthScheme::Bearer)
            .post::<_, Json<Echo>>(&[], &json!({}))
            .await
            .err()
            .unwrap();
        match err {
            RevoiceError::TranslationService { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = endpoint(&server, Some("k"), AuthScheme::Bearer)
            .post::<_, Json<Echo>>(&[], &json!({}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RevoiceError::TranslationService { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = endpoint(&server, None, AuthScheme::Bearer)
            .post::<_, Vec<u8>>(&[], &json!({}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RevoiceError::Configuration(_)));
    }
}
