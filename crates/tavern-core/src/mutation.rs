//! Stat and boss updates.

use rand::Rng;
use serde_json::Value;

use crate::ids::ConnectionId;
use crate::model::CustomStat;
use crate::parse::parse_int;
use crate::protocol::{BossUpdate, StatsUpdate};
use crate::sink::EventSink;
use crate::table::Table;

/// Overwrite `slot` when `raw` parses as an integer. Returns whether it did.
fn apply_int(slot: &mut i64, raw: &Value) -> bool {
    match parse_int(raw) {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

impl<R: Rng> Table<R> {
    /// Apply a player's sheet edit to the character they control.
    ///
    /// Connections without a claim are ignored without any reply. Returns
    /// whether anything was applied (and therefore broadcast).
    pub fn update_stats(
        &mut self,
        connection: &ConnectionId,
        update: StatsUpdate,
        sink: &dyn EventSink,
    ) -> bool {
        let Some(id) = self.claims.claimed_id(connection) else {
            tracing::debug!(connection_id = %connection, "stat update without a claim ignored");
            return false;
        };
        let Some(character) = self.state.get_mut(id) else {
            return false;
        };

        let mut applied = false;
        applied |= apply_int(&mut character.hp, &update.hp_current);
        applied |= apply_int(&mut character.max_hp, &update.hp_max);
        applied |= apply_int(&mut character.armor, &update.armor);
        applied |= apply_int(&mut character.gold, &update.gold);
        match update.custom_stats {
            Value::Null => {}
            Value::Array(items) => {
                character.custom_stats = items.into_iter().map(CustomStat::from_value).collect();
                applied = true;
            }
            other => {
                tracing::debug!(connection_id = %connection, custom_stats = %other, "ignoring non-list customStats");
            }
        }

        if applied {
            tracing::debug!(
                connection_id = %connection,
                character = %character.name,
                hp = character.hp,
                max_hp = character.max_hp,
                "stats updated"
            );
            self.broadcast_state(sink);
        }
        applied
    }

    /// Shallow-merge a GM edit onto the boss record and broadcast.
    pub fn update_boss(&mut self, update: BossUpdate, sink: &dyn EventSink) {
        let boss = &mut self.state.boss;
        if let Some(name) = update.name.as_str() {
            boss.name = name.to_string();
        }
        apply_int(&mut boss.hp, &update.hp);
        apply_int(&mut boss.max_hp, &update.max_hp);
        apply_int(&mut boss.armor, &update.armor);
        if let Some(status) = update.status.as_str() {
            boss.status = Some(status.to_string());
        }
        tracing::debug!(boss = %boss.name, hp = boss.hp, "boss updated");
        self.broadcast_state(sink);
    }
}
