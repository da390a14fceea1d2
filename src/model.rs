//! Data models for petcare.
//!
//! # Normalization
//!
//! The backend is loose about the shape of pet statistics: any field may be
//! missing and hygiene arrives under one of two names (`hygiene` or
//! `cleanliness`). Every payload passes through [`RawPetStats`] and is
//! normalized exactly once into the canonical [`PetStats`]. Nothing past this
//! module ever has to ask "which alias did the server use?".

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hygiene assumed when the server sends neither `hygiene` nor `cleanliness`.
pub const DEFAULT_HYGIENE: f64 = 60.0;

/// The fixed set of mood labels a pet can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Excited,
    Content,
    Playful,
    Sleepy,
    Tired,
    Hungry,
    Sad,
    Sick,
    Angry,
    Anxious,
    Bored,
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(Mood::Happy),
            "excited" => Ok(Mood::Excited),
            "content" => Ok(Mood::Content),
            "playful" => Ok(Mood::Playful),
            "sleepy" => Ok(Mood::Sleepy),
            "tired" => Ok(Mood::Tired),
            "hungry" => Ok(Mood::Hungry),
            "sad" => Ok(Mood::Sad),
            "sick" => Ok(Mood::Sick),
            "angry" => Ok(Mood::Angry),
            "anxious" => Ok(Mood::Anxious),
            "bored" => Ok(Mood::Bored),
            other => Err(format!("unknown mood '{other}'")),
        }
    }
}

/// Pet statistics exactly as the backend sends them.
///
/// Every field is optional. Use [`RawPetStats::normalize`] (or deserialize
/// [`PetStats`] directly, which does it for you).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPetStats {
    #[serde(default)]
    pub hunger: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub health: Option<f64>,
    #[serde(default)]
    pub hygiene: Option<f64>,
    #[serde(default)]
    pub cleanliness: Option<f64>,
    #[serde(default)]
    pub happiness: Option<f64>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub xp: Option<u64>,
    #[serde(default)]
    pub is_sick: Option<bool>,
}

impl RawPetStats {
    /// Produce the canonical record.
    ///
    /// - `hygiene` is preferred, then `cleanliness`, then [`DEFAULT_HYGIENE`]
    /// - a missing or zero `level` becomes 1
    /// - missing hunger/energy/health/xp become 0, missing `is_sick` is false
    /// - an unrecognised mood label becomes `None`
    pub fn normalize(self) -> PetStats {
        let mood = self.mood.as_deref().and_then(|label| match label.parse() {
            Ok(mood) => Some(mood),
            Err(e) => {
                debug!(error = %e, "Dropping unrecognised mood label");
                None
            }
        });

        PetStats {
            hunger: self.hunger.unwrap_or(0.0),
            energy: self.energy.unwrap_or(0.0),
            health: self.health.unwrap_or(0.0),
            hygiene: self.hygiene.or(self.cleanliness).unwrap_or(DEFAULT_HYGIENE),
            happiness: self.happiness,
            mood,
            level: self.level.unwrap_or(1).max(1),
            xp: self.xp.unwrap_or(0),
            is_sick: self.is_sick.unwrap_or(false),
        }
    }
}

/// Canonical snapshot of a pet's mutable condition.
///
/// Values are stored exactly as the server reported them (after alias
/// normalization); they are **not** clamped. Call [`PetStats::clamped`] before
/// showing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPetStats")]
pub struct PetStats {
    /// Satiation, nominally 0-100.
    pub hunger: f64,

    /// Energy, nominally 0-100.
    pub energy: f64,

    /// Health, nominally 0-100.
    pub health: f64,

    /// Hygiene (a.k.a. cleanliness on some endpoints), nominally 0-100.
    pub hygiene: f64,

    /// Happiness as reported by the server, if it reported one.
    pub happiness: Option<f64>,

    /// Current mood label.
    pub mood: Option<Mood>,

    /// Level, always >= 1.
    pub level: u32,

    /// Experience points.
    pub xp: u64,

    /// Whether the pet is currently sick.
    pub is_sick: bool,
}

impl From<RawPetStats> for PetStats {
    fn from(raw: RawPetStats) -> Self {
        raw.normalize()
    }
}

impl PetStats {
    /// Happiness to display: the server's value when present, otherwise the
    /// weighted value derived from the other stats.
    pub fn display_happiness(&self) -> f64 {
        self.happiness
            .unwrap_or_else(|| crate::stats::derived_happiness(self))
    }

    /// Copy with every percentage-like field clamped to [0, 100].
    pub fn clamped(&self) -> Self {
        Self {
            hunger: clamp_percent(self.hunger),
            energy: clamp_percent(self.energy),
            health: clamp_percent(self.health),
            hygiene: clamp_percent(self.hygiene),
            happiness: self.happiness.map(clamp_percent),
            ..self.clone()
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Parameterless tag for a care action; one in-flight slot per pet and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareActionKind {
    Feed,
    Play,
    Bathe,
    Rest,
}

impl CareActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            CareActionKind::Feed => "feed",
            CareActionKind::Play => "play",
            CareActionKind::Bathe => "bathe",
            CareActionKind::Rest => "rest",
        }
    }
}

impl fmt::Display for CareActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CareActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(CareActionKind::Feed),
            "play" => Ok(CareActionKind::Play),
            "bathe" => Ok(CareActionKind::Bathe),
            "rest" => Ok(CareActionKind::Rest),
            other => Err(format!("unknown care action '{other}'")),
        }
    }
}

/// Food offered when a feed request names none.
pub const DEFAULT_FOOD: &str = "standard";

/// Game played when a play request names none.
pub const DEFAULT_GAME: &str = "ball";

/// Nap length when a rest request names none.
pub const DEFAULT_REST_HOURS: u32 = 1;

/// A request to affect a pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CareAction {
    Feed { food_type: String },
    Play { game_type: String },
    Bathe,
    Rest { duration_hours: u32 },
}

impl CareAction {
    pub fn kind(&self) -> CareActionKind {
        match self {
            CareAction::Feed { .. } => CareActionKind::Feed,
            CareAction::Play { .. } => CareActionKind::Play,
            CareAction::Bathe => CareActionKind::Bathe,
            CareAction::Rest { .. } => CareActionKind::Rest,
        }
    }
}

/// Updated pet carried by an action response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPet {
    pub stats: PetStats,

    /// The server's latest diary, when the action produced one.
    #[serde(default)]
    pub diary: Option<Vec<DiaryEntry>>,
}

/// Result of a care action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetActionResponse {
    pub pet: ActionPet,

    /// Assistant-style commentary on the action.
    #[serde(default)]
    pub reaction: String,

    /// Short advisory strings ("Your pet is getting sleepy").
    #[serde(default)]
    pub notifications: Vec<String>,
}

/// An immutable, server-authored diary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: String,

    /// Mood label at the time of writing.
    #[serde(default)]
    pub mood: Option<String>,

    #[serde(alias = "entry_text", default)]
    pub note: String,

    pub created_at: DateTime<Utc>,
}

/// Coarse lifecycle bucket derived from level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvolutionStage {
    Egg,
    Juvenile,
    Adult,
    Legendary,
}

/// A stage transition worth celebrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub old_stage: EvolutionStage,
    pub new_stage: EvolutionStage,
    pub level: u32,
}

/// Stats tracked for "+N / -N" feedback, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKey {
    Happiness,
    Hunger,
    Hygiene,
    Energy,
    Health,
}

impl StatKey {
    pub const ALL: [StatKey; 5] = [
        StatKey::Happiness,
        StatKey::Hunger,
        StatKey::Hygiene,
        StatKey::Energy,
        StatKey::Health,
    ];
}

/// Signed change of one stat between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDelta {
    pub key: StatKey,
    pub delta: i64,
}

/// Signed change of the coin balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinChange {
    pub delta: i64,
    pub balance: i64,
}

/// A catalog accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Equip state of one accessory on one pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetAccessory {
    pub accessory_id: String,
    pub pet_id: String,
    pub equipped: bool,
}

/// Assistant reply to a chat message or slash-command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,

    /// Updated pet state when the command changed the pet.
    #[serde(default)]
    pub pet_state: Option<PetStats>,
}
