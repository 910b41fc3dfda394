use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by a verified Google ID token.
#[derive(Clone, Debug, PartialEq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, ApiError>;
}

/// Checks ID tokens with Google's `tokeninfo` endpoint and pins the audience
/// to our client id.
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleTokenInfo {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenInfo {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, ApiError> {
        let response = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|err| ApiError::Internal(format!("Google tokeninfo request failed: {err}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Google rejected ID token");
            return Err(ApiError::Unauthorized("Invalid Google credential".to_owned()));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|err| ApiError::Internal(format!("Malformed tokeninfo response: {err}")))?;

        identity_from(info, &self.client_id)
    }
}

fn identity_from(info: TokenInfo, client_id: &str) -> Result<GoogleIdentity, ApiError> {
    if info.aud != client_id {
        return Err(ApiError::Unauthorized(
            "Google credential was issued for another client".to_owned(),
        ));
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(ApiError::Unauthorized(
            "Google account email is not verified".to_owned(),
        ));
    }
    let email = info
        .email
        .ok_or_else(|| ApiError::Unauthorized("Google credential has no email".to_owned()))?;

    Ok(GoogleIdentity {
        subject: info.sub,
        email,
        name: info.name,
    })
}

/// Used when `GOOGLE_CLIENT_ID` is not configured.
pub struct DisabledVerifier;

#[async_trait]
impl IdTokenVerifier for DisabledVerifier {
    async fn verify(&self, _credential: &str) -> Result<GoogleIdentity, ApiError> {
        Err(ApiError::ServiceUnavailable(
            "Google sign-in is not configured".to_owned(),
        ))
    }
}
