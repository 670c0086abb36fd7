use crate::auth::{AuthorizedUser, TokenStore, refresh_access_token};
use crate::gmail::GmailSender;
use anyhow::Context;
use probe_core::mailer::{CredentialProvider, MailSender};
use reqwest::blocking::Client;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail credentials backed by a token file. Refreshes happen under the
/// cache mutex, so concurrent trials never refresh twice.
pub struct GmailCredentials {
    store: TokenStore,
    client: Client,
    endpoint: String,
    cached: Mutex<AuthorizedUser>,
}

impl GmailCredentials {
    pub fn load(token_path: &Path, endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let store = TokenStore::new(token_path);
        let user = store.load()?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            store,
            client,
            endpoint: endpoint.into(),
            cached: Mutex::new(user),
        })
    }

    /// Refreshes regardless of expiry and returns the new expiry, if any.
    pub fn force_refresh(&self) -> anyhow::Result<Option<String>> {
        let mut user = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh_locked(&mut user)?;
        Ok(user.expiry.clone())
    }

    fn access_token(&self) -> anyhow::Result<String> {
        let mut user = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if user.requires_refresh()? {
            self.refresh_locked(&mut user)?;
        }
        Ok(user.token.clone())
    }

    fn refresh_locked(&self, user: &mut AuthorizedUser) -> anyhow::Result<()> {
        let mut refreshed = user.clone();
        refresh_access_token(&self.client, &mut refreshed)?;
        self.store.save(&refreshed)?;
        *user = refreshed;
        Ok(())
    }
}

impl CredentialProvider for GmailCredentials {
    fn ensure_valid(&self) -> anyhow::Result<()> {
        self.access_token().map(|_| ())
    }

    fn sender(&self) -> anyhow::Result<Arc<dyn MailSender>> {
        let token = self.access_token()?;
        let sender: Arc<dyn MailSender> = Arc::new(GmailSender::new(
            self.client.clone(),
            self.endpoint.clone(),
            token,
        ));
        Ok(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_fails_fast_without_token_file() {
        let tmp = TempDir::new().unwrap();
        let result = GmailCredentials::load(&tmp.path().join("token.json"), "http://localhost");
        assert!(result.is_err());
    }

    #[test]
    fn valid_token_needs_no_refresh() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        fs::write(
            &path,
            r#"{"token":"access","refresh_token":"refresh","client_id":"c","expiry":"2999-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let credentials = GmailCredentials::load(&path, "http://localhost").unwrap();
        credentials.ensure_valid().unwrap();
        assert_eq!(credentials.access_token().unwrap(), "access");
        assert!(credentials.sender().is_ok());
    }

    #[test]
    fn expired_token_without_refresh_token_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.json");
        fs::write(&path, r#"{"token":"access","expiry":"2000-01-01T00:00:00Z"}"#).unwrap();
        let credentials = GmailCredentials::load(&path, "http://localhost").unwrap();
        let err = credentials.ensure_valid().unwrap_err();
        assert!(err.to_string().contains("no refresh token"));
    }
}
