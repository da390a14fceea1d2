//! Assistant chat client.
//!
//! A message is either free text or a slash-command. Recognised commands are
//! forwarded as their action name; anything else (including unknown
//! commands) is sent as a plain `talk` action with the original text.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::CareError;
use crate::model::ChatReply;
use crate::remote::{TokenProvider, authorize, send_json};
use crate::validation::validate_chat_message;

/// Action requested by a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatCommand {
    Feed,
    Play,
    Sleep,
    Pet,
    Train,
    Clean,
    Status,
    Talk,
}

impl ChatCommand {
    /// Work out which action a message asks for.
    pub fn parse(message: &str) -> Self {
        let Some(command) = message.trim_start().strip_prefix('/') else {
            return ChatCommand::Talk;
        };

        let name = command.split_whitespace().next().unwrap_or_default();
        match name.to_ascii_lowercase().as_str() {
            "feed" => ChatCommand::Feed,
            "play" => ChatCommand::Play,
            "sleep" => ChatCommand::Sleep,
            "pet" => ChatCommand::Pet,
            "train" => ChatCommand::Train,
            "clean" => ChatCommand::Clean,
            "status" => ChatCommand::Status,
            _ => ChatCommand::Talk,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChatCommand::Feed => "feed",
            ChatCommand::Play => "play",
            ChatCommand::Sleep => "sleep",
            ChatCommand::Pet => "pet",
            ChatCommand::Train => "train",
            ChatCommand::Clean => "clean",
            ChatCommand::Status => "status",
            ChatCommand::Talk => "talk",
        }
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: &'a str,
    pet_id: Option<&'a str>,
    action: ChatCommand,
}

/// Client for `POST /chat`. Always authorized.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenProvider,
}

impl ChatClient {
    pub fn new(client: reqwest::Client, base_url: &str, tokens: TokenProvider) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, tokens: TokenProvider) -> Self {
        Self::new(reqwest::Client::new(), base_url, tokens)
    }

    /// Validate and send a message.
    ///
    /// Validation failures are returned without touching the network.
    #[instrument(skip(self, message), fields(action))]
    pub async fn send(
        &self,
        pet_id: Option<&str>,
        session_id: &str,
        message: &str,
    ) -> Result<ChatReply, CareError> {
        validate_chat_message(message)?;

        let action = ChatCommand::parse(message);
        tracing::Span::current().record("action", action.label());

        let url = format!("{}/chat", self.base_url);
        let body = ChatRequest {
            message: message.trim(),
            session_id,
            pet_id,
            action,
        };

        let reply = self.post(&url, &body).await.map_err(CareError::remote)?;

        info!(
            action = %action,
            has_pet_state = reply.pet_state.is_some(),
            "Chat reply received"
        );
        Ok(reply)
    }

    async fn post(&self, url: &str, body: &ChatRequest<'_>) -> anyhow::Result<ChatReply> {
        let request = authorize(self.client.post(url).json(body), Some(&self.tokens)).await?;
        send_json(request, Some(&self.tokens)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_commands() {
        assert_eq!(ChatCommand::parse("/feed"), ChatCommand::Feed);
        assert_eq!(ChatCommand::parse("/play fetch"), ChatCommand::Play);
        assert_eq!(ChatCommand::parse("/sleep"), ChatCommand::Sleep);
        assert_eq!(ChatCommand::parse("/pet"), ChatCommand::Pet);
        assert_eq!(ChatCommand::parse("/train sit"), ChatCommand::Train);
        assert_eq!(ChatCommand::parse("/clean"), ChatCommand::Clean);
        assert_eq!(ChatCommand::parse("  /STATUS"), ChatCommand::Status);
    }

    #[test]
    fn test_everything_else_is_talk() {
        assert_eq!(ChatCommand::parse("hello there"), ChatCommand::Talk);
        assert_eq!(ChatCommand::parse("/dance"), ChatCommand::Talk);
        assert_eq!(ChatCommand::parse("/"), ChatCommand::Talk);
        assert_eq!(ChatCommand::parse("feed me"), ChatCommand::Talk);
    }

    #[tokio::test]
    async fn test_invalid_message_never_dispatched() {
        // Nothing listens on this port; a dispatched request would fail with
        // a network error instead of a validation error.
        let client = ChatClient::with_base_url("http://127.0.0.1:9", TokenProvider::fixed("t"));

        let err = client.send(Some("pet-1"), "session", "   ").await.unwrap_err();
        assert!(matches!(err, CareError::ValidationFailure(_)));
    }
}
