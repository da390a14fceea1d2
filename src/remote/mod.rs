//! Clients for the remote services the controller depends on.
//!
//! # Services
//!
//! - [`pet_api`]: care actions, stats and diary for a pet
//! - [`wallet`]: coin balance
//! - [`auth`]: bearer token provider with a short-lived cache
//! - [`chat`]: assistant messages and slash-commands
//! - [`accessories`]: accessory catalog, equip state and realtime fan-in
//!
//! All clients treat any non-2xx status as an error. None of them retry.

pub mod accessories;
pub mod auth;
pub mod chat;
pub mod pet_api;
pub mod wallet;

pub use accessories::{AccessoryClient, Closet, ClosetEvent};
pub use auth::TokenProvider;
pub use chat::{ChatClient, ChatCommand};
pub use pet_api::PetApiClient;
pub use wallet::WalletClient;

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Build the shared HTTP client used by every service client.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Attach a bearer token when a provider is configured.
pub(crate) async fn authorize(
    request: reqwest::RequestBuilder,
    tokens: Option<&TokenProvider>,
) -> anyhow::Result<reqwest::RequestBuilder> {
    match tokens {
        Some(tokens) => {
            let token = tokens.get_token().await?;
            Ok(request.bearer_auth(token))
        }
        None => Ok(request),
    }
}

/// Send a request and decode a JSON body, failing on any non-2xx status.
///
/// A 401 drops the cached token so the next call fetches a fresh one.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    tokens: Option<&TokenProvider>,
) -> anyhow::Result<T> {
    let response = request.send().await?;

    if response.status() == StatusCode::UNAUTHORIZED {
        if let Some(tokens) = tokens {
            tokens.invalidate().await;
        }
    }

    let data = response.error_for_status()?.json::<T>().await?;
    Ok(data)
}
