//! Pet Action Service client.
//!
//! # Endpoints
//!
//! - `POST /pets/{id}/feed` - `{ "food_type": "standard" }`
//! - `POST /pets/{id}/play` - `{ "game_type": "ball" }`
//! - `POST /pets/{id}/bathe` - `{}`
//! - `POST /pets/{id}/rest` - `{ "duration_hours": 2 }`
//! - `GET /pets/{id}/stats`
//! - `GET /pets/{id}/diary`
//! - `PATCH /pets/{id}` - `{ "name": "Mochi" }`
//!
//! Action endpoints answer with a [`PetActionResponse`].

use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::model::{CareAction, DiaryEntry, PetActionResponse, PetStats};
use crate::remote::{TokenProvider, authorize, send_json};

/// Client for the pet action, stats and diary endpoints.
#[derive(Clone)]
pub struct PetApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Option<TokenProvider>,
}

#[derive(Debug, Serialize)]
struct FeedRequest<'a> {
    food_type: &'a str,
}

#[derive(Debug, Serialize)]
struct PlayRequest<'a> {
    game_type: &'a str,
}

#[derive(Debug, Serialize)]
struct RestRequest {
    duration_hours: u32,
}

impl PetApiClient {
    /// Create a client for the backend at `base_url`.
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

    fn pet_url(&self, pet_id: &str, tail: &str) -> String {
        format!(
            "{}/pets/{}/{}",
            self.base_url,
            urlencoding::encode(pet_id),
            tail
        )
    }

    async fn post_action<B: Serialize>(
        &self,
        pet_id: &str,
        action: &str,
        body: &B,
    ) -> anyhow::Result<PetActionResponse> {
        let url = self.pet_url(pet_id, action);
        let request = authorize(self.client.post(&url).json(body), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }

    /// Feed the pet.
    pub async fn feed(&self, pet_id: &str, food_type: &str) -> anyhow::Result<PetActionResponse> {
        self.post_action(pet_id, "feed", &FeedRequest { food_type })
            .await
    }

    /// Play a game with the pet.
    pub async fn play(&self, pet_id: &str, game_type: &str) -> anyhow::Result<PetActionResponse> {
        self.post_action(pet_id, "play", &PlayRequest { game_type })
            .await
    }

    /// Give the pet a bath.
    pub async fn bathe(&self, pet_id: &str) -> anyhow::Result<PetActionResponse> {
        self.post_action(pet_id, "bathe", &json!({})).await
    }

    /// Put the pet to rest for a number of hours.
    pub async fn rest(
        &self,
        pet_id: &str,
        duration_hours: u32,
    ) -> anyhow::Result<PetActionResponse> {
        self.post_action(pet_id, "rest", &RestRequest { duration_hours })
            .await
    }

    /// Dispatch any care action to its endpoint.
    #[instrument(skip(self), fields(action = %action.kind()))]
    pub async fn perform(
        &self,
        pet_id: &str,
        action: &CareAction,
    ) -> anyhow::Result<PetActionResponse> {
        match action {
            CareAction::Feed { food_type } => self.feed(pet_id, food_type).await,
            CareAction::Play { game_type } => self.play(pet_id, game_type).await,
            CareAction::Bathe => self.bathe(pet_id).await,
            CareAction::Rest { duration_hours } => self.rest(pet_id, *duration_hours).await,
        }
    }

    /// Fetch the pet's current stats.
    pub async fn get_stats(&self, pet_id: &str) -> anyhow::Result<PetStats> {
        let url = self.pet_url(pet_id, "stats");
        let request = authorize(self.client.get(&url), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }

    /// Rename the pet.
    pub async fn rename(&self, pet_id: &str, name: &str) -> anyhow::Result<()> {
        let url = format!("{}/pets/{}", self.base_url, urlencoding::encode(pet_id));
        let request = authorize(
            self.client.patch(&url).json(&json!({ "name": name })),
            self.tokens.as_ref(),
        )
        .await?;
        request.send().await?.error_for_status()?;
        Ok(())
    }

    /// Fetch the pet's diary, newest entries as the server orders them.
    pub async fn get_diary(&self, pet_id: &str) -> anyhow::Result<Vec<DiaryEntry>> {
        let url = self.pet_url(pet_id, "diary");
        let request = authorize(self.client.get(&url), self.tokens.as_ref()).await?;
        send_json(request, self.tokens.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pet_url_encodes_id() {
        let client = PetApiClient::with_base_url("http://localhost:8080/");
        assert_eq!(
            client.pet_url("pet 1/2", "stats"),
            "http://localhost:8080/pets/pet%201%2F2/stats"
        );
    }
}
