//! Claim table: which connection controls which character.

use std::collections::HashMap;

use crate::errors::ClaimError;
use crate::ids::{CharacterId, ConnectionId};
use crate::model::{Character, GameState};

/// Injective map connection → character.
///
/// Both directions are kept so the exclusivity check is a single lookup.
/// The two maps always hold the same pairs.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_connection: HashMap<ConnectionId, CharacterId>,
    by_character: HashMap<CharacterId, ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a character by name, creating it if no one by that name exists.
    ///
    /// A connection already holding another character switches to the new one
    /// only if the new claim succeeds.
    pub fn claim(
        &mut self,
        state: &mut GameState,
        connection: &ConnectionId,
        name: &str,
    ) -> Result<Character, ClaimError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClaimError::EmptyName);
        }

        let character = match state.find_by_name(name) {
            Some(existing) => {
                match self.by_character.get(&existing.id) {
                    Some(owner) if owner == connection => return Ok(existing.clone()),
                    Some(_) => {
                        return Err(ClaimError::AlreadyClaimed {
                            name: existing.name.clone(),
                        })
                    }
                    None => existing.clone(),
                }
            }
            None => {
                let created = state.create_character(name).clone();
                tracing::info!(character = %created.name, id = %created.id, "character created");
                created
            }
        };

        self.release(connection);
        self.by_connection.insert(connection.clone(), character.id);
        self.by_character.insert(character.id, connection.clone());
        Ok(character)
    }

    /// Character currently controlled by `connection`.
    pub fn resolve<'a>(&self, state: &'a GameState, connection: &ConnectionId) -> Option<&'a Character> {
        self.claimed_id(connection).and_then(|id| state.get(id))
    }

    pub fn claimed_id(&self, connection: &ConnectionId) -> Option<CharacterId> {
        self.by_connection.get(connection).copied()
    }

    /// Drop whatever `connection` holds. Safe to call repeatedly.
    pub fn release(&mut self, connection: &ConnectionId) -> Option<CharacterId> {
        let id = self.by_connection.remove(connection)?;
        self.by_character.remove(&id);
        Some(id)
    }

    pub fn owner_of(&self, id: CharacterId) -> Option<&ConnectionId> {
        self.by_character.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}
