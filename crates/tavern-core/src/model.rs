use serde::{Deserialize, Serialize};

use crate::ids::CharacterId;

pub const DEFAULT_HP: i64 = 10;
pub const DEFAULT_ARMOR: i64 = 10;

/// A custom gauge attached to a character sheet.
///
/// Viewers send one of two shapes depending on their variant. The server
/// never interprets the fields; anything matching neither shape is kept as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomStat {
    Gauge(NumericGauge),
    Text(TextGauge),
    Opaque(serde_json::Value),
}

impl CustomStat {
    /// Classify one raw list entry. Never fails: unknown shapes stay opaque.
    pub fn from_value(value: serde_json::Value) -> Self {
        Self::deserialize(&value).unwrap_or(Self::Opaque(value))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericGauge {
    pub name: String,
    pub current: serde_json::Value,
    pub max: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextGauge {
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub hp: i64,
    pub max_hp: i64,
    pub armor: i64,
    pub gold: i64,
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub custom_stats: Vec<CustomStat>,
}

impl Character {
    /// A fresh sheet with the default stats handed out on first claim.
    pub fn new(id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hp: DEFAULT_HP,
            max_hp: DEFAULT_HP,
            armor: DEFAULT_ARMOR,
            gold: 0,
            class_name: None,
            custom_stats: Vec::new(),
        }
    }

    /// Case-insensitive name match used by claims.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boss {
    pub name: String,
    pub hp: i64,
    pub max_hp: i64,
    pub armor: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The authoritative session aggregate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub players: Vec<Character>,
    pub boss: Boss,
}

impl GameState {
    /// Demo table used by `--seed-demo`.
    pub fn demo() -> Self {
        let seed = |id: u64, name: &str, hp: i64, armor: i64, class: &str| Character {
            hp,
            max_hp: hp,
            armor,
            class_name: Some(class.to_string()),
            ..Character::new(CharacterId(id), name)
        };
        Self {
            players: vec![
                seed(1, "Grog", 45, 16, "Barbarian"),
                seed(2, "Vex", 30, 14, "Ranger"),
                seed(3, "Scanlan", 25, 12, "Bard"),
            ],
            boss: Boss {
                name: "Vampire Lord".into(),
                hp: 250,
                max_hp: 250,
                armor: 18,
                status: Some("Enraged".into()),
            },
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Character> {
        self.players.iter().find(|c| c.answers_to(name))
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.players.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.players.iter_mut().find(|c| c.id == id)
    }

    /// Max existing id + 1, or 1 on an empty table.
    pub fn next_id(&self) -> CharacterId {
        self.players
            .iter()
            .map(|c| c.id)
            .max()
            .map_or(CharacterId(1), CharacterId::next)
    }

    /// Append a new default character and return a reference to it.
    pub fn create_character(&mut self, name: &str) -> &Character {
        let character = Character::new(self.next_id(), name);
        self.players.push(character);
        &self.players[self.players.len() - 1]
    }
}

/// Viewer role chosen at handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Player,
    Gm,
    Overlay,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Gm => "gm",
            Self::Overlay => "overlay",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
