//! Coin balance client.

use serde::Deserialize;

use crate::remote::{TokenProvider, authorize, send_json};

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// Client for `GET /wallet/balance`.
#[derive(Clone)]
pub struct WalletClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Option<TokenProvider>,
}

impl WalletClient {
    pub fn new(client: reqwest::Client, base_url: &str, tokens: Option<TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Create an unauthenticated client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str) -> Self {
        Self::new(reqwest::Client::new(), base_url, None)
    }

    /// Fetch the current coin balance.
    pub async fn get_balance(&self) -> anyhow::Result<i64> {
        let url = format!("{}/wallet/balance", self.base_url);
        let request = authorize(self.client.get(&url), self.tokens.as_ref()).await?;
        let data: BalanceResponse = send_json(request, self.tokens.as_ref()).await?;
        Ok(data.balance)
    }
}
