//! Client-side input checks. Nothing that fails here reaches the network.

use crate::error::{CareError, FieldError};
use crate::model::{
    CareAction, CareActionKind, DEFAULT_FOOD, DEFAULT_GAME, DEFAULT_REST_HOURS,
};

/// Longest chat message accepted, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 1000;

/// Longest pet name accepted, in characters.
pub const MAX_PET_NAME_CHARS: usize = 20;

/// Check a chat message before it is sent to the assistant.
pub fn validate_chat_message(message: &str) -> Result<(), CareError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(CareError::invalid("message", "Message cannot be empty."));
    }

    let chars = trimmed.chars().count();
    if chars > MAX_CHAT_MESSAGE_CHARS {
        return Err(CareError::invalid(
            "message",
            format!("Message is too long ({chars}/{MAX_CHAT_MESSAGE_CHARS} characters)."),
        ));
    }

    Ok(())
}

/// Check a pet name. Collects every problem rather than stopping at the first.
pub fn validate_pet_name(name: &str) -> Result<(), CareError> {
    let trimmed = name.trim();
    let mut errors = Vec::new();

    let chars = trimmed.chars().count();
    if chars == 0 {
        errors.push(FieldError::new("name", "Name cannot be empty."));
    } else if chars > MAX_PET_NAME_CHARS {
        errors.push(FieldError::new(
            "name",
            format!("Name must be at most {MAX_PET_NAME_CHARS} characters."),
        ));
    }

    if trimmed
        .chars()
        .any(|c| !(c.is_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '_')))
    {
        errors.push(FieldError::new(
            "name",
            "Name may only contain letters, numbers, spaces, hyphens, apostrophes and underscores.",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CareError::ValidationFailure(errors))
    }
}

impl CareAction {
    /// Build an action from a kind and its optional free-form parameter.
    ///
    /// Feed and play take a food/game id; rest takes a positive number of
    /// hours. Bathe ignores the parameter. No upper bound is enforced here.
    pub fn from_request(kind: CareActionKind, param: Option<&str>) -> Result<Self, CareError> {
        let param = param.map(str::trim).filter(|p| !p.is_empty());

        Ok(match kind {
            CareActionKind::Feed => CareAction::Feed {
                food_type: param.unwrap_or(DEFAULT_FOOD).to_string(),
            },
            CareActionKind::Play => CareAction::Play {
                game_type: param.unwrap_or(DEFAULT_GAME).to_string(),
            },
            CareActionKind::Bathe => CareAction::Bathe,
            CareActionKind::Rest => {
                let duration_hours = match param {
                    None => DEFAULT_REST_HOURS,
                    Some(raw) => match raw.parse::<u32>() {
                        Ok(hours) if hours > 0 => hours,
                        _ => {
                            return Err(CareError::invalid(
                                "duration_hours",
                                "Rest duration must be a positive whole number of hours.",
                            ));
                        }
                    },
                };
                CareAction::Rest { duration_hours }
            }
        })
    }
}
