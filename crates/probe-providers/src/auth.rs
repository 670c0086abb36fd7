use anyhow::Context;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Authorized-user token file as written by Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    pub fn expires_at(&self) -> anyhow::Result<Option<OffsetDateTime>> {
        self.expiry
            .as_deref()
            .map(|value| {
                OffsetDateTime::parse(value, &Rfc3339)
                    .with_context(|| format!("parse token expiry {value:?}"))
            })
            .transpose()
    }

    pub fn requires_refresh(&self) -> anyhow::Result<bool> {
        self.requires_refresh_at(OffsetDateTime::now_utc(), EXPIRY_LEEWAY_SECS)
    }

    fn requires_refresh_at(&self, now: OffsetDateTime, leeway_secs: i64) -> anyhow::Result<bool> {
        if self.token.is_empty() {
            return Ok(true);
        }
        Ok(match self.expires_at()? {
            Some(expires_at) => expires_at <= now + time::Duration::seconds(leeway_secs),
            None => false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RefreshTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AuthorizedUser> {
        if !self.path.exists() {
            anyhow::bail!(
                "token file {} not found; authorize the sending account first",
                self.path.display()
            );
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("read token file {}", self.path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("parse token file {}", self.path.display()))
    }

    pub fn save(&self, user: &AuthorizedUser) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(user).context("serialize token")?;
        fs::write(&self.path, data)
            .with_context(|| format!("write token file {}", self.path.display()))
    }
}

/// Exchanges the refresh token for a new access token, updating `user`.
pub fn refresh_access_token(client: &Client, user: &mut AuthorizedUser) -> anyhow::Result<()> {
    let refresh_token = user
        .refresh_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("token expired and no refresh token is stored"))?;
    let client_id = user
        .client_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("token file is missing client_id"))?;
    let mut form = vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = user.client_secret.clone() {
        form.push(("client_secret", secret));
    }

    let response = client
        .post(&user.token_uri)
        .form(&form)
        .send()
        .context("request oauth refresh token")?;
    let status = response.status();
    let body: RefreshTokenResponse = response.json().context("decode refresh token response")?;
    apply_refresh(user, status.is_success(), body, OffsetDateTime::now_utc())?;
    info!(expiry = user.expiry.as_deref().unwrap_or("none"), "access token refreshed");
    Ok(())
}

fn apply_refresh(
    user: &mut AuthorizedUser,
    success: bool,
    response: RefreshTokenResponse,
    now: OffsetDateTime,
) -> anyhow::Result<()> {
    if let Some(error) = response.error {
        let message = response.error_description.unwrap_or(error);
        anyhow::bail!("oauth refresh failed: {message}");
    }
    if !success {
        anyhow::bail!("oauth refresh failed with an unexpected response");
    }
    user.token = response
        .access_token
        .ok_or_else(|| anyhow::anyhow!("oauth refresh response has no access_token"))?;
    if let Some(refresh) = response.refresh_token {
        user.refresh_token = Some(refresh);
    }
    if let Some(expires_in) = response.expires_in {
        let expiry = now + time::Duration::seconds(expires_in);
        user.expiry = Some(expiry.format(&Rfc3339).context("format token expiry")?);
    }
    Ok(())
}
