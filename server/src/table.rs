//! In-memory `players` table backing the store
//!
//! Every successful mutation yields the change event the store publishes to
//! its subscribers. Updates and deletes that match no row succeed without an
//! event, the same way a filtered write that touches nothing succeeds.

use log::{debug, info};
use shared::{ChangeEvent, Player, PlayerId, StoreFault};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate key value violates unique constraint on players.id")]
    DuplicateId(PlayerId),
    #[error("player name must not be empty")]
    EmptyName,
}

impl From<TableError> for StoreFault {
    fn from(err: TableError) -> Self {
        match &err {
            TableError::DuplicateId(id) => StoreFault::new("23505", err.to_string())
                .with_details(format!("Key (id)=({}) already exists.", id)),
            TableError::EmptyName => StoreFault::new("23514", err.to_string())
                .with_hint("choose a non-empty name"),
        }
    }
}

#[derive(Debug, Default)]
pub struct PlayerTable {
    rows: HashMap<PlayerId, Player>,
}

impl PlayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.rows.get(id)
    }

    /// Inserts a new row and returns it along with the insert event
    pub fn insert(&mut self, player: Player) -> Result<(Player, ChangeEvent), TableError> {
        if player.name.trim().is_empty() {
            return Err(TableError::EmptyName);
        }
        if self.rows.contains_key(&player.id) {
            return Err(TableError::DuplicateId(player.id));
        }

        info!("Player {} ({}) joined", player.id, player.name);
        self.rows.insert(player.id, player.clone());
        Ok((player.clone(), ChangeEvent::Insert { new: player }))
    }

    pub fn update(&mut self, id: PlayerId, x: i32, y: i32) -> Option<ChangeEvent> {
        let row = self.rows.get_mut(&id)?;
        let old = row.clone();
        row.x = x;
        row.y = y;

        debug!("Player {} moved to ({}, {})", id, x, y);
        Some(ChangeEvent::Update {
            old: Some(old),
            new: row.clone(),
        })
    }

    pub fn delete(&mut self, id: PlayerId) -> Option<ChangeEvent> {
        let old = self.rows.remove(&id)?;
        info!("Player {} ({}) left", id, old.name);
        Some(ChangeEvent::Delete { old })
    }

    /// All rows, ordered by id
    pub fn select_all(&self) -> Vec<Player> {
        let mut rows: Vec<Player> = self.rows.values().cloned().collect();
        rows.sort_by_key(|player| player.id);
        rows
    }
}
