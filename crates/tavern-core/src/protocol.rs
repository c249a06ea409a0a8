//! Wire format shared by every viewer.
//!
//! Each text frame is `{"event": <name>, "data": <payload>}`. `data` may be
//! omitted for events that carry nothing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dice::{RollOutcome, RollRequest};
use crate::errors::ProtocolError;
use crate::model::{Character, GameState};

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// `updateStats` payload. Every field is raw so an unusable one is skipped
/// without losing the others.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct StatsUpdate {
    #[serde(default)]
    pub hp_current: Value,
    #[serde(default)]
    pub hp_max: Value,
    #[serde(default)]
    pub armor: Value,
    #[serde(default)]
    pub gold: Value,
    #[serde(default, rename = "customStats")]
    pub custom_stats: Value,
}

/// `updateBoss` payload. Absent, null or mistyped fields leave the boss
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossUpdate {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub hp: Value,
    #[serde(default)]
    pub max_hp: Value,
    #[serde(default)]
    pub armor: Value,
    #[serde(default)]
    pub status: Value,
}

/// Messages a viewer may send.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    ClaimCharacter(String),
    UpdateStats(StatsUpdate),
    UpdateBoss(BossUpdate),
    RollDice(RollRequest),
    DisplayImage(String),
    HideImage,
    ResetDice,
    ListImages,
}

impl ClientMessage {
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let Envelope { event, data } = serde_json::from_str(raw)?;
        let msg = match event.as_str() {
            "claimCharacter" => Self::ClaimCharacter(payload(&event, data)?),
            "updateStats" => Self::UpdateStats(payload(&event, data)?),
            "updateBoss" => Self::UpdateBoss(payload(&event, data)?),
            "rollDice" => Self::RollDice(payload(&event, data)?),
            "displayImage" | "projectImage" => Self::DisplayImage(payload(&event, data)?),
            "hideImage" => Self::HideImage,
            "resetDice" => Self::ResetDice,
            "listImages" => Self::ListImages,
            _ => return Err(ProtocolError::UnknownEvent(event)),
        };
        Ok(msg)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ClaimCharacter(_) => "claimCharacter",
            Self::UpdateStats(_) => "updateStats",
            Self::UpdateBoss(_) => "updateBoss",
            Self::RollDice(_) => "rollDice",
            Self::DisplayImage(_) => "displayImage",
            Self::HideImage => "hideImage",
            Self::ResetDice => "resetDice",
            Self::ListImages => "listImages",
        }
    }

    /// Events that only the GM console should send when roles are enforced.
    pub fn is_gm_only(&self) -> bool {
        matches!(
            self,
            Self::UpdateBoss(_) | Self::DisplayImage(_) | Self::HideImage | Self::ResetDice | Self::ListImages
        )
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

/// Events pushed to viewers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GameStateUpdate(GameState),
    ClaimSuccess(Character),
    ClaimError(String),
    DiceRolled(RollOutcome),
    ShowImage(String),
    HideImage,
    DiceCleared,
    RefreshImageList,
    ImageList(Vec<String>),
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::GameStateUpdate(_) => "gameStateUpdate",
            Self::ClaimSuccess(_) => "claimSuccess",
            Self::ClaimError(_) => "claimError",
            Self::DiceRolled(_) => "diceRolled",
            Self::ShowImage(_) => "showImage",
            Self::HideImage => "hideImage",
            Self::DiceCleared => "diceCleared",
            Self::RefreshImageList => "refreshImageList",
            Self::ImageList(_) => "imageList",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
