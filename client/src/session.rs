//! Drives one engine against the player store
//!
//! The session turns engine requests into store packets, tags each request
//! with an id, and routes replies, change events and subscription status
//! back into the engine as they arrive.

use crate::engine::{Engine, EngineError, JoinOutcome, PendingMove, SessionPhase};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Direction, Packet, PlayerId, Reply, StoreFault, PLAYERS_TABLE};
use std::collections::HashMap;

/// Carries packets between a session and the player store
pub trait Transport {
    fn send(&mut self, packet: Packet);
    fn try_recv(&mut self) -> Option<Packet>;
}

#[derive(Debug)]
enum PendingRequest {
    Join(PlayerId),
    Move(PendingMove),
    Hydrate,
    Leave(PlayerId),
    Orphan(PlayerId),
}

pub struct Session<T: Transport> {
    engine: Engine,
    transport: T,
    name: String,
    next_request_id: u64,
    pending: HashMap<u64, PendingRequest>,
    join_error: Option<EngineError>,
    rng: StdRng,
}

impl<T: Transport> Session<T> {
    /// Subscribes to the change feed, requests the initial snapshot and
    /// issues the join for `name`
    pub fn start(transport: T, name: &str) -> Result<Self, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName);
        }

        let mut session = Self {
            engine: Engine::new(),
            transport,
            name: name.to_string(),
            next_request_id: 1,
            pending: HashMap::new(),
            join_error: None,
            rng: StdRng::from_entropy(),
        };

        if session.engine.subscribe(PLAYERS_TABLE) {
            session.transport.send(Packet::Subscribe {
                table: PLAYERS_TABLE.to_string(),
            });
        }

        let request_id = session.track(PendingRequest::Hydrate);
        session.transport.send(Packet::SelectAll { request_id });

        session.join()?;
        Ok(session)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The last join failure, kept until the next retry
    pub fn join_error(&self) -> Option<&EngineError> {
        self.join_error.as_ref()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn track(&mut self, request: PendingRequest) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.insert(request_id, request);
        request_id
    }

    fn join(&mut self) -> Result<(), EngineError> {
        if let Some(player) = self.engine.join(&self.name, &mut self.rng)? {
            let request_id = self.track(PendingRequest::Join(player.id));
            self.transport.send(Packet::Insert { request_id, player });
        }
        Ok(())
    }

    pub fn retry_join(&mut self) -> Result<(), EngineError> {
        self.join_error = None;
        self.join()
    }

    /// Returns true when a move was applied and sent to the store
    pub fn handle_direction(&mut self, direction: Direction) -> bool {
        let Some(pending) = self.engine.move_player(direction) else {
            return false;
        };

        let (id, x, y) = (pending.id, pending.x, pending.y);
        let request_id = self.track(PendingRequest::Move(pending));
        self.transport.send(Packet::Update {
            request_id,
            id,
            x,
            y,
        });
        true
    }

    /// Processes every packet that has arrived so far
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(packet) = self.transport.try_recv() {
            self.handle_packet(packet);
            handled += 1;
        }
        handled
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Reply { request_id, result } => self.handle_reply(request_id, result),
            Packet::Change(event) => {
                self.engine.apply_remote_event(event);
            }
            Packet::Status(status) => self.engine.on_subscription_status(&status),
            other => warn!("Unexpected packet from store: {:?}", other),
        }
    }

    fn handle_reply(&mut self, request_id: u64, result: Result<Reply, StoreFault>) {
        let Some(request) = self.pending.remove(&request_id) else {
            debug!("Ignoring reply for unknown request {}", request_id);
            return;
        };

        match request {
            PendingRequest::Join(_) => {
                let record = result.map(|reply| match reply {
                    Reply::Inserted(player) => player,
                    other => {
                        warn!("Unexpected reply to insert: {:?}", other);
                        None
                    }
                });
                match self.engine.complete_join(record) {
                    Ok(JoinOutcome::Orphaned(id)) => self.send_delete(id, PendingRequest::Orphan(id)),
                    Ok(_) => {}
                    Err(e) => self.join_error = Some(e),
                }
            }
            PendingRequest::Move(pending) => {
                self.engine.complete_move(pending, result.map(|_| ()));
            }
            PendingRequest::Hydrate => match result {
                Ok(Reply::Rows(rows)) => {
                    self.engine.hydrate(rows);
                }
                Ok(other) => warn!("Unexpected reply to snapshot request: {:?}", other),
                Err(fault) => error!(
                    "Error fetching initial players: code={} message={} details={:?} hint={:?}",
                    fault.code, fault.message, fault.details, fault.hint
                ),
            },
            PendingRequest::Leave(id) | PendingRequest::Orphan(id) => match result {
                Ok(_) => debug!("Player {} removed", id),
                Err(fault) => debug!("Error removing player {}: {}", id, fault),
            },
        }
    }

    fn in_flight_join(&self) -> Option<(u64, PlayerId)> {
        if self.engine.phase() != SessionPhase::Joining {
            return None;
        }
        self.pending.iter().find_map(|(request_id, request)| match request {
            PendingRequest::Join(id) => Some((*request_id, *id)),
            _ => None,
        })
    }

    fn send_delete(&mut self, id: PlayerId, request: PendingRequest) {
        let request_id = self.track(request);
        self.transport.send(Packet::Delete { request_id, id });
    }

    /// Ends the session; safe to call more than once
    ///
    /// A join still in flight is deleted right away. The store handles this
    /// link's datagrams in order, so the delete lands after the insert even
    /// if the reply is never read.
    pub fn leave(&mut self) {
        let in_flight = self.in_flight_join();
        let plan = self.engine.leave();
        if let Some(id) = plan.delete {
            self.send_delete(id, PendingRequest::Leave(id));
        }
        if let Some((request_id, id)) = in_flight {
            info!("Leaving while join of player {} is in flight, deleting it", id);
            self.pending.insert(request_id, PendingRequest::Orphan(id));
            self.send_delete(id, PendingRequest::Orphan(id));
        }
        if plan.unsubscribe.is_some() {
            self.transport.send(Packet::Unsubscribe);
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.leave();
    }
}
