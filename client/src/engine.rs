//! Session and reconciliation engine for the local player
//!
//! The engine owns everything one client knows about the shared world:
//! - The identity of the local player and an exclusive copy of its record
//! - The merged map of every player, keyed by id
//! - The change-feed subscription for the session
//!
//! It performs no I/O. Operations that need the player store hand back the
//! request to issue, and the caller feeds each completion back through the
//! matching `complete_*` method. Completions and change-feed deliveries may
//! therefore interleave in any order, all on one thread.

use log::{debug, error, info, warn};
use rand::Rng;
use shared::{
    random_color, step, ChangeEvent, Direction, Player, PlayerId, StoreFault, SubscriptionStatus,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Lifecycle of one session
///
/// `Joining` falls back to `Uninitialized` when the store rejects the join.
/// Nothing leaves `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Joining,
    Joined,
    Terminating,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("player name must not be empty")]
    EmptyName,
    #[error("session has already ended")]
    SessionTerminated,
    #[error("could not join: {0}")]
    JoinFailed(#[source] StoreFault),
    #[error("could not join: the store returned no player record")]
    JoinReturnedNoRecord,
}

/// An optimistic move waiting for the store to confirm it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub id: PlayerId,
    /// Record to restore if the store rejects the move
    pub previous: Player,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(PlayerId),
    /// The store created a record for a session that has since ended
    Orphaned(PlayerId),
    Ignored,
}

/// Requests the caller must issue to end the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeavePlan {
    pub delete: Option<PlayerId>,
    pub unsubscribe: Option<String>,
}

/// Handle on the change feed for one collection
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    live: bool,
}

impl Subscription {
    fn acquire(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            live: true,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Returns true only for the call that actually released the handle
    pub fn release(&mut self) -> bool {
        std::mem::replace(&mut self.live, false)
    }
}

#[derive(Debug)]
pub struct Engine {
    phase: SessionPhase,
    my_player_id: Option<PlayerId>,
    my_player: Option<Player>,
    players: HashMap<PlayerId, Player>,
    subscription: Option<Subscription>,
    hydrated: bool,
    revision: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            my_player_id: None,
            my_player: None,
            players: HashMap::new(),
            subscription: None,
            hydrated: false,
            revision: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn my_player_id(&self) -> Option<PlayerId> {
        self.my_player_id
    }

    pub fn my_player(&self) -> Option<&Player> {
        self.my_player.as_ref()
    }

    pub fn players(&self) -> &HashMap<PlayerId, Player> {
        &self.players
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Increases every time the visible state changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn is_over(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Terminating | SessionPhase::Terminated
        )
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Starts joining under `name`
    ///
    /// Returns the record to create in the store, or `None` when a join is
    /// already in flight or has already succeeded.
    pub fn join<R: Rng + ?Sized>(
        &mut self,
        name: &str,
        rng: &mut R,
    ) -> Result<Option<Player>, EngineError> {
        match self.phase {
            SessionPhase::Terminating | SessionPhase::Terminated => {
                return Err(EngineError::SessionTerminated)
            }
            SessionPhase::Joining | SessionPhase::Joined => {
                debug!("join: player already initialized, skipping");
                return Ok(None);
            }
            SessionPhase::Uninitialized => {}
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName);
        }

        let player = Player::spawn(PlayerId::new(), name, random_color(rng));
        info!(
            "Attempting to create player {} ({}) at ({}, {})",
            player.id, player.name, player.x, player.y
        );
        self.phase = SessionPhase::Joining;
        Ok(Some(player))
    }

    /// Applies the store's answer to the create request issued by `join`
    pub fn complete_join(
        &mut self,
        result: Result<Option<Player>, StoreFault>,
    ) -> Result<JoinOutcome, EngineError> {
        match self.phase {
            SessionPhase::Joining => {}
            SessionPhase::Terminating | SessionPhase::Terminated => {
                return Ok(match result {
                    Ok(Some(record)) => {
                        warn!("Player {} was created after the session ended", record.id);
                        JoinOutcome::Orphaned(record.id)
                    }
                    _ => JoinOutcome::Ignored,
                });
            }
            phase => {
                debug!("Ignoring join completion in phase {:?}", phase);
                return Ok(JoinOutcome::Ignored);
            }
        }

        match result {
            Ok(Some(record)) => {
                let id = record.id;
                info!("Player {} created in store", id);
                self.my_player_id = Some(id);
                self.players.insert(id, record.clone());
                self.my_player = Some(record);
                self.phase = SessionPhase::Joined;
                self.touch();
                Ok(JoinOutcome::Joined(id))
            }
            Ok(None) => {
                error!("Error creating player: store returned no record");
                self.phase = SessionPhase::Uninitialized;
                Err(EngineError::JoinReturnedNoRecord)
            }
            Err(fault) => {
                error!(
                    "Error creating player: code={} message={} details={:?} hint={:?}",
                    fault.code, fault.message, fault.details, fault.hint
                );
                self.phase = SessionPhase::Uninitialized;
                Err(EngineError::JoinFailed(fault))
            }
        }
    }

    /// Moves the local player one unit, optimistically
    ///
    /// Returns `None` without touching any state when there is no joined
    /// player or the move is blocked by the grid edge.
    pub fn move_player(&mut self, direction: Direction) -> Option<PendingMove> {
        if self.phase != SessionPhase::Joined {
            return None;
        }
        let current = self.my_player.as_ref()?;

        let (x, y) = step(current.x, current.y, direction);
        if (x, y) == current.position() {
            return None;
        }

        let previous = current.clone();
        let updated = previous.at(x, y);
        self.players.insert(updated.id, updated.clone());
        self.my_player = Some(updated);
        self.touch();

        debug!("Moving player {} to ({}, {})", previous.id, x, y);
        Some(PendingMove {
            id: previous.id,
            previous,
            x,
            y,
        })
    }

    /// Applies the store's answer to an update issued for `pending`
    ///
    /// Overlapping moves are not serialized: a failure restores the snapshot
    /// taken by its own move even if a later move has been applied since.
    pub fn complete_move(&mut self, pending: PendingMove, result: Result<(), StoreFault>) {
        let fault = match result {
            Ok(()) => return,
            Err(fault) => fault,
        };

        error!(
            "Error updating player {} position: code={} message={} details={:?} hint={:?}",
            pending.id, fault.code, fault.message, fault.details, fault.hint
        );

        if self.phase != SessionPhase::Joined || self.my_player_id != Some(pending.id) {
            debug!("Session no longer owns player {}, not reverting", pending.id);
            return;
        }

        let id = pending.id;
        self.players.insert(id, pending.previous.clone());
        self.my_player = Some(pending.previous);
        self.touch();
        warn!("Reverted optimistic update for player {}", id);
    }

    /// Reconciles one change-feed notification into the player map
    ///
    /// Returns true when the visible state changed.
    ///
    /// Known limitations for the local player's own id:
    /// - A delete removes only the map entry; `my_player` is kept.
    /// - A late insert echo, arriving after a move, puts the map entry back
    ///   at the spawn point. Update echoes are suppressed, so the entry
    ///   stays there until the next local move.
    pub fn apply_remote_event(&mut self, event: ChangeEvent) -> bool {
        if self.is_over() {
            return false;
        }

        let own = Some(event.player_id()) == self.my_player_id;
        match event {
            ChangeEvent::Update { new, .. } if own => {
                // echo of our own optimistic write
                debug!("Suppressing echo for player {}", new.id);
                false
            }
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => {
                if self.players.get(&new.id) == Some(&new) {
                    return false;
                }
                debug!("Upserting player {} at ({}, {})", new.id, new.x, new.y);
                self.players.insert(new.id, new);
                self.touch();
                true
            }
            ChangeEvent::Delete { old } => {
                if self.players.remove(&old.id).is_none() {
                    return false;
                }
                if own {
                    warn!("Own player {} was deleted by another client", old.id);
                } else {
                    debug!("Player {} left", old.id);
                }
                self.touch();
                true
            }
        }
    }

    /// Merges the initial snapshot of the collection, once per session
    ///
    /// Rows for ids already in the map are skipped. Returns how many rows
    /// were added.
    pub fn hydrate(&mut self, rows: Vec<Player>) -> usize {
        if self.is_over() {
            return 0;
        }
        if self.hydrated {
            debug!("Ignoring repeated snapshot of {} players", rows.len());
            return 0;
        }
        self.hydrated = true;

        let mut added = 0;
        for row in rows {
            if let Entry::Vacant(slot) = self.players.entry(row.id) {
                slot.insert(row);
                added += 1;
            }
        }
        if added > 0 {
            self.touch();
        }

        info!("Fetched initial players, {} added", added);
        added
    }

    /// Acquires the session's subscription; true only on the first call
    pub fn subscribe(&mut self, channel: &str) -> bool {
        if self.is_over() || self.subscription.is_some() {
            return false;
        }
        info!("Setting up change-feed subscription on {}", channel);
        self.subscription = Some(Subscription::acquire(channel));
        true
    }

    /// Releases the subscription, returning its channel if it was live
    pub fn release_subscription(&mut self) -> Option<String> {
        let subscription = self.subscription.as_mut()?;
        if !subscription.release() {
            return None;
        }
        info!("Removed subscription on {}", subscription.channel());
        Some(subscription.channel().to_string())
    }

    pub fn on_subscription_status(&mut self, status: &SubscriptionStatus) {
        let live = self.subscription.as_ref().is_some_and(Subscription::is_live);
        if !live {
            debug!("Subscription status after release: {:?}", status);
            return;
        }

        match status {
            SubscriptionStatus::Subscribed => info!("Subscribed to players channel"),
            SubscriptionStatus::ChannelError(Some(fault)) => error!(
                "Channel error: code={} message={} details={:?} hint={:?}",
                fault.code, fault.message, fault.details, fault.hint
            ),
            SubscriptionStatus::ChannelError(None) => error!("Channel error: unknown channel error"),
            SubscriptionStatus::TimedOut => error!("Channel error: timed out"),
            SubscriptionStatus::Closed => error!("Channel error: closed"),
        }
    }

    /// Ends the session
    ///
    /// The returned plan is issued by the caller before control returns to
    /// the event loop, so the session is already `Terminated` when this
    /// returns. Calling it again yields an empty plan.
    pub fn leave(&mut self) -> LeavePlan {
        let mut plan = LeavePlan::default();
        match self.phase {
            SessionPhase::Terminating | SessionPhase::Terminated => return plan,
            SessionPhase::Joined => {
                self.phase = SessionPhase::Terminating;
                plan.delete = self.my_player_id;
                if let Some(id) = plan.delete {
                    info!("Leaving, attempting to delete player {}", id);
                }
            }
            SessionPhase::Uninitialized | SessionPhase::Joining => {
                info!("Leaving, no current player to delete");
            }
        }

        plan.unsubscribe = self.release_subscription();
        self.phase = SessionPhase::Terminated;
        plan
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{LOGICAL_HEIGHT, LOGICAL_WIDTH};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn joined_engine(name: &str) -> (Engine, PlayerId) {
        let mut engine = Engine::new();
        let player = engine.join(name, &mut rng()).unwrap().unwrap();
        let id = player.id;
        engine.complete_join(Ok(Some(player))).unwrap();
        (engine, id)
    }

    fn other_player(name: &str, x: i32, y: i32) -> Player {
        Player::new(PlayerId::new(), name, "#00FF00", x, y)
    }

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new();
        assert_eq!(engine.phase(), SessionPhase::Uninitialized);
        assert!(engine.my_player_id().is_none());
        assert!(engine.my_player().is_none());
        assert!(engine.players().is_empty());
    }

    #[test]
    fn test_join_builds_player_at_center() {
        let mut engine = Engine::new();
        let player = engine.join("Alice", &mut rng()).unwrap().unwrap();

        assert_eq!(player.name, "Alice");
        assert_eq!(player.position(), (100, 75));
        assert_eq!(player.color.len(), 7);
        assert_eq!(engine.phase(), SessionPhase::Joining);
        // identity is not optimistic
        assert!(engine.my_player_id().is_none());
        assert!(engine.players().is_empty());
    }

    #[test]
    fn test_join_rejects_empty_name() {
        let mut engine = Engine::new();
        assert_eq!(
            engine.join("   ", &mut rng()),
            Err(EngineError::EmptyName)
        );
        assert_eq!(engine.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn test_join_is_noop_while_joining_or_joined() {
        let mut engine = Engine::new();
        engine.join("Alice", &mut rng()).unwrap();
        assert_eq!(engine.join("Alice", &mut rng()), Ok(None));

        let (mut joined, id) = joined_engine("Bob");
        assert_eq!(joined.join("Bob", &mut rng()), Ok(None));
        assert_eq!(joined.my_player_id(), Some(id));
    }

    #[test]
    fn test_complete_join_success() {
        let (engine, id) = joined_engine("Alice");
        assert_eq!(engine.phase(), SessionPhase::Joined);
        assert_eq!(engine.my_player().map(|p| p.id), Some(id));
        assert_eq!(engine.players().get(&id).map(|p| p.name.as_str()), Some("Alice"));
        assert!(engine.revision() > 0);
    }

    #[test]
    fn test_complete_join_failure_allows_retry() {
        let mut engine = Engine::new();
        engine.join("Alice", &mut rng()).unwrap();

        let fault = StoreFault::new("XX000", "insert failed");
        let result = engine.complete_join(Err(fault.clone()));

        assert_eq!(result, Err(EngineError::JoinFailed(fault)));
        assert_eq!(engine.phase(), SessionPhase::Uninitialized);
        assert!(engine.my_player().is_none());
        assert!(engine.players().is_empty());

        let retry = engine.join("Alice", &mut rng()).unwrap();
        assert!(retry.is_some());
    }

    #[test]
    fn test_complete_join_without_record_fails() {
        let mut engine = Engine::new();
        engine.join("Alice", &mut rng()).unwrap();
        assert_eq!(
            engine.complete_join(Ok(None)),
            Err(EngineError::JoinReturnedNoRecord)
        );
        assert_eq!(engine.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn test_join_confirmed_after_leave_is_orphaned() {
        let mut engine = Engine::new();
        let player = engine.join("Alice", &mut rng()).unwrap().unwrap();
        let plan = engine.leave();
        assert!(plan.delete.is_none());

        let outcome = engine.complete_join(Ok(Some(player.clone())));
        assert_eq!(outcome, Ok(JoinOutcome::Orphaned(player.id)));
        assert!(engine.players().is_empty());
        assert_eq!(engine.phase(), SessionPhase::Terminated);
    }

    #[test]
    fn test_two_moves_up() {
        let (mut engine, id) = joined_engine("Alice");

        let first = engine.move_player(Direction::Up).unwrap();
        let second = engine.move_player(Direction::Up).unwrap();

        assert_eq!((first.x, first.y), (100, 74));
        assert_eq!((second.x, second.y), (100, 73));
        assert_eq!(engine.my_player().unwrap().position(), (100, 73));
        assert_eq!(engine.players()[&id].position(), (100, 73));
    }

    #[test]
    fn test_move_blocked_at_bound_issues_nothing() {
        let mut engine = Engine::new();
        let player = engine.join("Alice", &mut rng()).unwrap().unwrap();
        engine
            .complete_join(Ok(Some(player.at(0, 10))))
            .unwrap();
        let revision = engine.revision();

        let issued = (0..101)
            .filter_map(|_| engine.move_player(Direction::Left))
            .count();

        assert_eq!(issued, 0);
        assert_eq!(engine.my_player().unwrap().position(), (0, 10));
        assert_eq!(engine.revision(), revision);
    }

    #[test]
    fn test_moves_clamped_on_every_edge() {
        let mut engine = Engine::new();
        let player = engine.join("Alice", &mut rng()).unwrap().unwrap();
        engine
            .complete_join(Ok(Some(
                player.at(LOGICAL_WIDTH - 1, LOGICAL_HEIGHT - 1),
            )))
            .unwrap();

        assert!(engine.move_player(Direction::Right).is_none());
        assert!(engine.move_player(Direction::Down).is_none());
        assert!(engine.move_player(Direction::Left).is_some());
        assert!(engine.move_player(Direction::Up).is_some());
        assert_eq!(
            engine.my_player().unwrap().position(),
            (LOGICAL_WIDTH - 2, LOGICAL_HEIGHT - 2)
        );
    }

    #[test]
    fn test_move_requires_joined_session() {
        let mut engine = Engine::new();
        assert!(engine.move_player(Direction::Up).is_none());
        engine.join("Alice", &mut rng()).unwrap();
        assert!(engine.move_player(Direction::Up).is_none());
    }

    #[test]
    fn test_failed_move_reverts() {
        let (mut engine, id) = joined_engine("Alice");
        let pending = engine.move_player(Direction::Right).unwrap();
        assert_eq!(engine.players()[&id].position(), (101, 75));

        engine.complete_move(pending, Err(StoreFault::new("XX000", "update failed")));

        assert_eq!(engine.my_player().unwrap().position(), (100, 75));
        assert_eq!(engine.players()[&id].position(), (100, 75));
    }

    #[test]
    fn test_successful_move_keeps_optimistic_state() {
        let (mut engine, id) = joined_engine("Alice");
        let pending = engine.move_player(Direction::Down).unwrap();
        let revision = engine.revision();

        engine.complete_move(pending, Ok(()));

        assert_eq!(engine.players()[&id].position(), (100, 76));
        assert_eq!(engine.revision(), revision);
    }

    #[test]
    fn test_out_of_order_revert_clobbers_newer_move() {
        let (mut engine, _) = joined_engine("Alice");
        let first = engine.move_player(Direction::Right).unwrap();
        let second = engine.move_player(Direction::Right).unwrap();

        engine.complete_move(second, Ok(()));
        engine.complete_move(first, Err(StoreFault::new("XX000", "late failure")));

        assert_eq!(engine.my_player().unwrap().position(), (100, 75));
    }

    #[test]
    fn test_failed_move_after_leave_is_noop() {
        let (mut engine, id) = joined_engine("Alice");
        let pending = engine.move_player(Direction::Up).unwrap();
        engine.leave();

        engine.complete_move(pending, Err(StoreFault::new("XX000", "update failed")));

        assert_eq!(engine.players()[&id].position(), (100, 74));
    }

    #[test]
    fn test_remote_insert_and_update_upsert() {
        let (mut engine, _) = joined_engine("Alice");
        let bob = other_player("Bob", 10, 10);

        assert!(engine.apply_remote_event(ChangeEvent::Insert { new: bob.clone() }));
        assert_eq!(engine.players()[&bob.id].position(), (10, 10));

        let moved = bob.at(11, 10);
        assert!(engine.apply_remote_event(ChangeEvent::Update {
            old: Some(bob.clone()),
            new: moved
        }));
        assert_eq!(engine.players()[&bob.id].position(), (11, 10));
        assert_eq!(engine.players().len(), 2);
    }

    #[test]
    fn test_remote_update_is_idempotent() {
        let (mut engine, _) = joined_engine("Alice");
        let bob = other_player("Bob", 20, 30);
        let event = ChangeEvent::Update {
            old: None,
            new: bob.clone(),
        };

        engine.apply_remote_event(event.clone());
        let once = engine.players().clone();
        let changed = engine.apply_remote_event(event);

        assert!(!changed);
        assert_eq!(engine.players(), &once);
    }

    #[test]
    fn test_remote_delete_of_unknown_id_is_noop() {
        let (mut engine, _) = joined_engine("Alice");
        let before = engine.players().clone();
        let revision = engine.revision();

        let changed = engine.apply_remote_event(ChangeEvent::Delete {
            old: other_player("Ghost", 0, 0),
        });

        assert!(!changed);
        assert_eq!(engine.players(), &before);
        assert_eq!(engine.revision(), revision);
    }

    #[test]
    fn test_own_update_echo_is_suppressed() {
        let (mut engine, id) = joined_engine("Alice");
        let mine = engine.my_player().cloned().unwrap();
        let before_map = engine.players().clone();

        let forged = Player {
            name: "Mallory".to_string(),
            color: "#000000".to_string(),
            ..mine.at(0, 0)
        };
        let changed = engine.apply_remote_event(ChangeEvent::Update {
            old: Some(mine.clone()),
            new: forged,
        });

        assert!(!changed);
        assert_eq!(engine.players(), &before_map);
        assert_eq!(engine.my_player(), Some(&mine));
        assert_eq!(engine.my_player_id(), Some(id));
    }

    #[test]
    fn test_own_insert_echo_is_applied() {
        let mut engine = Engine::new();
        let player = engine.join("Alice", &mut rng()).unwrap().unwrap();

        // the insert echo can beat the create reply
        engine.apply_remote_event(ChangeEvent::Insert {
            new: player.clone(),
        });
        engine.complete_join(Ok(Some(player.clone()))).unwrap();

        assert_eq!(engine.players().len(), 1);
        assert_eq!(engine.players()[&player.id], player);
    }

    #[test]
    fn test_late_own_insert_echo_resets_map_entry_until_next_move() {
        let (mut engine, id) = joined_engine("Alice");
        let spawned = engine.my_player().cloned().unwrap();
        engine.move_player(Direction::Up).unwrap();

        assert!(engine.apply_remote_event(ChangeEvent::Insert {
            new: spawned.clone()
        }));
        assert_eq!(engine.players()[&id].position(), (100, 75));
        assert_eq!(engine.my_player().unwrap().position(), (100, 74));

        engine.move_player(Direction::Up).unwrap();
        assert_eq!(engine.players()[&id].position(), (100, 73));
    }

    #[test]
    fn test_remote_delete_of_own_id_removes_map_entry_only() {
        let (mut engine, id) = joined_engine("Alice");

        let mine = engine.my_player().cloned().unwrap();
        assert!(engine.apply_remote_event(ChangeEvent::Delete { old: mine }));

        assert!(!engine.players().contains_key(&id));
        assert_eq!(engine.phase(), SessionPhase::Joined);
        assert_eq!(engine.my_player_id(), Some(id));
        assert!(engine.my_player().is_some());
    }

    #[test]
    fn test_hydrate_never_overwrites_local_entry() {
        let (mut engine, id) = joined_engine("Alice");
        engine.move_player(Direction::Left).unwrap();
        let stale = engine.players()[&id].at(100, 75);
        let bob = other_player("Bob", 5, 5);

        let added = engine.hydrate(vec![stale, bob.clone()]);

        assert_eq!(added, 1);
        assert_eq!(engine.players()[&id].position(), (99, 75));
        assert_eq!(engine.players()[&bob.id], bob);
    }

    #[test]
    fn test_hydrate_runs_once() {
        let mut engine = Engine::new();
        assert_eq!(engine.hydrate(vec![other_player("Bob", 1, 1)]), 1);
        assert_eq!(engine.hydrate(vec![other_player("Carol", 2, 2)]), 0);
        assert_eq!(engine.players().len(), 1);
    }

    #[test]
    fn test_subscription_acquired_once_and_released_once() {
        let mut engine = Engine::new();
        assert!(engine.subscribe("players"));
        assert!(!engine.subscribe("players"));

        assert_eq!(engine.release_subscription().as_deref(), Some("players"));
        assert_eq!(engine.release_subscription(), None);
        assert!(!engine.subscription().unwrap().is_live());
        // no second subscription in the same session
        assert!(!engine.subscribe("players"));
    }

    #[test]
    fn test_leave_from_joined() {
        let (mut engine, id) = joined_engine("Alice");
        engine.subscribe("players");

        let plan = engine.leave();

        assert_eq!(plan.delete, Some(id));
        assert_eq!(plan.unsubscribe.as_deref(), Some("players"));
        assert_eq!(engine.phase(), SessionPhase::Terminated);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let (mut engine, _) = joined_engine("Alice");
        engine.leave();
        assert_eq!(engine.leave(), LeavePlan::default());
        assert_eq!(
            engine.join("Alice", &mut rng()),
            Err(EngineError::SessionTerminated)
        );
    }

    #[test]
    fn test_leave_without_player_deletes_nothing() {
        let mut engine = Engine::new();
        engine.subscribe("players");
        let plan = engine.leave();
        assert!(plan.delete.is_none());
        assert_eq!(plan.unsubscribe.as_deref(), Some("players"));
    }

    #[test]
    fn test_events_after_leave_are_ignored() {
        let (mut engine, _) = joined_engine("Alice");
        engine.leave();
        let before = engine.players().clone();

        assert!(!engine.apply_remote_event(ChangeEvent::Insert {
            new: other_player("Bob", 3, 3)
        }));
        assert_eq!(engine.hydrate(vec![other_player("Carol", 4, 4)]), 0);
        assert!(engine.move_player(Direction::Up).is_none());
        assert_eq!(engine.players(), &before);
    }
}
