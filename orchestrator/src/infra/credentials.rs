//! Game-server credential issuers.
//!
//! [`GameServerAccountIssuer`] registers one game-server account per
//! instance through the account web API and deletes it on teardown.
//! [`StaticTokenIssuer`] hands every instance the same preconfigured token.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::CredentialIssuer;
use crate::domain::Credential;

const DEFAULT_API_BASE: &str = "https://api.steampowered.com/IGameServersService";
const APP_ID: &str = "730";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct CreatedAccount {
    steamid: String,
    login_token: String,
}

/// Per-instance accounts from the game-server account web API.
pub struct GameServerAccountIssuer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GameServerAccountIssuer {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    /// Point the issuer at another API root (tests, proxies).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building account api client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}/v1/", self.base_url)
    }
}

#[async_trait]
impl CredentialIssuer for GameServerAccountIssuer {
    async fn issue(&self, name: &str) -> Result<Credential> {
        let body: Envelope<CreatedAccount> = self
            .client
            .post(self.endpoint("CreateAccount"))
            .query(&[
                ("key", self.api_key.as_str()),
                ("appid", APP_ID),
                ("memo", name),
            ])
            .send()
            .await
            .context("CreateAccount request")?
            .error_for_status()
            .context("CreateAccount rejected")?
            .json()
            .await
            .context("decoding CreateAccount response")?;
        tracing::info!(instance = %name, account = %body.response.steamid, "server account created");
        Ok(Credential {
            account_id: Some(body.response.steamid),
            token: body.response.login_token,
        })
    }

    async fn revoke(&self, account_id: &str) -> Result<()> {
        self.client
            .post(self.endpoint("DeleteAccount"))
            .query(&[("key", self.api_key.as_str()), ("steamid", account_id)])
            .send()
            .await
            .context("DeleteAccount request")?
            .error_for_status()
            .context("DeleteAccount rejected")?;
        tracing::info!(account = %account_id, "server account deleted");
        Ok(())
    }
}

/// One token shared by every instance; nothing to revoke.
pub struct StaticTokenIssuer {
    token: String,
}

impl StaticTokenIssuer {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialIssuer for StaticTokenIssuer {
    async fn issue(&self, _name: &str) -> Result<Credential> {
        Ok(Credential {
            account_id: None,
            token: self.token.clone(),
        })
    }

    async fn revoke(&self, _account_id: &str) -> Result<()> {
        Ok(())
    }
}
