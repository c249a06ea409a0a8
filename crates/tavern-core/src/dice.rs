//! Dice parsing, rolling and aggregation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::parse_int;

/// Upper bound on dice resolved for a single request.
pub const MAX_DICE_PER_ROLL: usize = 1000;

/// Label used when a roll has no claimed character and no supplied name.
pub const ANONYMOUS_ROLLER: &str = "Anonymous";

/// Roll one die with `sides` faces: uniform over `1..=sides`.
pub fn roll_die<R: Rng + ?Sized>(rng: &mut R, sides: u32) -> u32 {
    rng.gen_range(1..=sides.max(1))
}

/// A validated die token such as `d20`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Die {
    pub token: String,
    pub sides: u32,
}

impl Die {
    /// Accepts `d20`, `D20` or `20`. Zero or non-numeric side counts are rejected.
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        let digits = trimmed
            .strip_prefix('d')
            .or_else(|| trimmed.strip_prefix('D'))
            .unwrap_or(trimmed);
        let sides: u32 = digits.parse().ok()?;
        if sides == 0 {
            return None;
        }
        Some(Self {
            token: format!("d{sides}"),
            sides,
        })
    }
}

/// One `{type, qty}` entry of a dice basket. Both fields stay raw so a bad
/// entry is dropped on its own instead of failing the whole basket.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiceGroup {
    #[serde(rename = "type", default)]
    pub die_type: Value,
    #[serde(default)]
    pub qty: Value,
}

/// What the client asked to roll.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiceSpec {
    Single(String),
    Groups(Vec<DiceGroup>),
}

impl DiceSpec {
    /// Read a bare token or basket. Anything else is an empty basket.
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(token) => Self::Single(token),
            Value::Array(items) => Self::Groups(
                items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value::<DiceGroup>(item) {
                        Ok(group) => Some(group),
                        Err(e) => {
                            tracing::debug!(error = %e, "dropping malformed dice group");
                            None
                        }
                    })
                    .collect(),
            ),
            other => {
                if !other.is_null() {
                    tracing::debug!(dice = %other, "unrecognized dice spec");
                }
                Self::Groups(Vec::new())
            }
        }
    }
}

/// Full `rollDice` payload.
///
/// Accepts a bare token, a bare basket, or `{dice, player?}`. Decoding never
/// fails: unusable parts are dropped and the rest is still rolled.
#[derive(Clone, Debug, PartialEq)]
pub struct RollRequest {
    pub dice: DiceSpec,
    pub player: Option<String>,
}

impl<'de> Deserialize<'de> for RollRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl RollRequest {
    pub fn new(dice: DiceSpec) -> Self {
        Self { dice, player: None }
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                let player = match fields.remove("player") {
                    Some(Value::String(name)) => Some(name),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        tracing::debug!(player = %other, "ignoring non-string roller name");
                        None
                    }
                };
                let dice = DiceSpec::from_value(fields.remove("dice").unwrap_or_default());
                Self { dice, player }
            }
            other => Self::new(DiceSpec::from_value(other)),
        }
    }

    /// Flatten into individual dice, dropping malformed tokens.
    pub fn dice(&self) -> Vec<Die> {
        let mut out = Vec::new();
        match &self.dice {
            DiceSpec::Single(token) => out.extend(parse_logged(token)),
            DiceSpec::Groups(groups) => {
                for group in groups {
                    let Some(die) = group.die_type.as_str().and_then(parse_logged) else {
                        if !group.die_type.is_string() {
                            tracing::debug!(token = %group.die_type, "dropping non-string die token");
                        }
                        continue;
                    };
                    let qty = parse_int(&group.qty).unwrap_or(0).max(0) as usize;
                    let room = MAX_DICE_PER_ROLL - out.len();
                    if qty > room {
                        tracing::warn!(die = %die.token, qty, limit = MAX_DICE_PER_ROLL, "roll truncated");
                    }
                    out.extend(std::iter::repeat(die).take(qty.min(room)));
                }
            }
        }
        out
    }
}

fn parse_logged(token: &str) -> Option<Die> {
    let die = Die::parse(token);
    if die.is_none() {
        tracing::debug!(token, "dropping malformed die token");
    }
    die
}

/// One resolved die in an aggregate roll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieResult {
    #[serde(rename = "type")]
    pub die_type: String,
    pub value: u32,
}

/// Broadcast payload of `diceRolled`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RollOutcome {
    #[serde(rename_all = "camelCase")]
    Single {
        player: String,
        die_type: String,
        result: u32,
    },
    Aggregate {
        player: String,
        results: Vec<DieResult>,
        total: u64,
    },
}

impl RollOutcome {
    pub fn player(&self) -> &str {
        match self {
            Self::Single { player, .. } | Self::Aggregate { player, .. } => player,
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            Self::Single { result, .. } => u64::from(*result),
            Self::Aggregate { total, .. } => *total,
        }
    }
}

/// Pick the display name for a roll: claimed character, then supplied name.
pub fn roller_name(claimed: Option<&str>, supplied: Option<&str>) -> String {
    claimed
        .or_else(|| supplied.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(ANONYMOUS_ROLLER)
        .to_string()
}

/// Resolve every die of `request` with fresh draws from `rng`.
///
/// A request naming exactly one valid die yields the single-die shape; every
/// other request, including an empty one, yields an aggregate.
pub fn resolve<R: Rng + ?Sized>(rng: &mut R, request: &RollRequest, player: String) -> RollOutcome {
    let dice = request.dice();

    if let (DiceSpec::Single(_), [die]) = (&request.dice, dice.as_slice()) {
        return RollOutcome::Single {
            player,
            die_type: die.token.clone(),
            result: roll_die(rng, die.sides),
        };
    }

    let results: Vec<DieResult> = dice
        .into_iter()
        .map(|die| {
            let value = roll_die(rng, die.sides);
            DieResult {
                die_type: die.token,
                value,
            }
        })
        .collect();
    let total = results.iter().map(|r| u64::from(r.value)).sum();

    RollOutcome::Aggregate {
        player,
        results,
        total,
    }
}
