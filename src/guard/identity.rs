//! Managed identity provider integration.
//!
//! Verifies the provider's RS256 session JWTs against a configured public key
//! and forwards `/__identity/*` calls to the provider's frontend API.

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{
        HeaderMap, StatusCode,
        header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING},
    },
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{API_KEY_HEADER, PIN_HEADER};
use crate::config::ConfigError;
use crate::error::ApiError;

const JWT_LEEWAY_SECS: u64 = 5;
const MAX_PROXY_BODY_BYTES: usize = 1024 * 1024;

/// Claims read from a provider session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub exp: u64,
}

/// RS256 verifier for provider session tokens.
pub struct IdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl IdentityVerifier {
    pub fn new(public_key_pem: &str, issuer: Option<&str>) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes()).map_err(|e| {
            ConfigError::InvalidIdentityPublicKey {
                error: e.to_string(),
            }
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = JWT_LEEWAY_SECS;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, jsonwebtoken::errors::Error> {
        decode::<IdentityClaims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

/// Passthrough to the provider's frontend API.
#[derive(Debug, Clone)]
pub struct IdentityProxy {
    client: Client,
    upstream: String,
}

impl IdentityProxy {
    pub fn new(upstream: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                error: e.to_string(),
            })?;

        Ok(Self {
            client,
            upstream: upstream.trim_end_matches('/').to_string(),
        })
    }

    /// Forward `request` to `{upstream}/{tail}`. Upstream statuses pass
    /// through; transport failures become 502, timeouts 503.
    pub async fn forward(&self, tail: &str, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let url = match parts.uri.query() {
            Some(query) => format!("{}/{}?{}", self.upstream, tail, query),
            None => format!("{}/{}", self.upstream, tail),
        };

        let body = match axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES).await {
            Ok(body) => body,
            Err(_) => {
                return ApiError::new(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "PAYLOAD_TOO_LARGE",
                    "Request body too large",
                )
                .into_response();
            }
        };

        let mut headers = parts.headers;
        strip_hop_headers(&mut headers);
        headers.remove(HOST);
        headers.remove(PIN_HEADER);
        headers.remove(API_KEY_HEADER);

        debug!(method = %parts.method, tail, "Forwarding identity provider request");
        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(upstream) => upstream,
            Err(error) => return upstream_failure(&error),
        };

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_headers(&mut response_headers);

        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => return upstream_failure(&error),
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        response
    }
}

fn strip_hop_headers(headers: &mut HeaderMap) {
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONTENT_LENGTH);
}

fn upstream_failure(error: &reqwest::Error) -> Response {
    if error.is_timeout() {
        warn!(error = %error, "Identity provider timed out");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "UPSTREAM_TIMEOUT",
            "Identity provider did not respond in time",
        )
        .into_response()
    } else {
        warn!(error = %error, "Identity provider unreachable");
        ApiError::new(
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_ERROR",
            "Identity provider request failed",
        )
        .into_response()
    }
}
