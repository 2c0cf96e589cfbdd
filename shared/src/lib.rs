use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const VISUAL_WIDTH: i32 = 800;
pub const VISUAL_HEIGHT: i32 = 600;
/// Each logical unit is drawn as a PIXEL_SCALE x PIXEL_SCALE block
pub const PIXEL_SCALE: i32 = 4;
pub const LOGICAL_WIDTH: i32 = VISUAL_WIDTH / PIXEL_SCALE;
pub const LOGICAL_HEIGHT: i32 = VISUAL_HEIGHT / PIXEL_SCALE;
pub const PLAYER_SIZE: i32 = 1;

/// Name of the only collection the store publishes changes for
pub const PLAYERS_TABLE: &str = "players";
pub const MAX_DATAGRAM: usize = 65_507;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: i32,
    pub y: i32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, color: impl Into<String>, x: i32, y: i32) -> Self {
        let (x, y) = clamp_to_grid(x, y);
        Self {
            id,
            name: name.into(),
            color: color.into(),
            x,
            y,
        }
    }

    /// Builds a player standing on the spawn point
    pub fn spawn(id: PlayerId, name: impl Into<String>, color: impl Into<String>) -> Self {
        let (x, y) = spawn_point();
        Self::new(id, name, color, x, y)
    }

    pub fn at(&self, x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..self.clone()
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

pub fn spawn_point() -> (i32, i32) {
    (LOGICAL_WIDTH / 2, LOGICAL_HEIGHT / 2)
}

pub fn clamp_to_grid(x: i32, y: i32) -> (i32, i32) {
    (x.clamp(0, LOGICAL_WIDTH - 1), y.clamp(0, LOGICAL_HEIGHT - 1))
}

/// Moves one unit in `direction`, saturating at the grid edges
pub fn step(x: i32, y: i32, direction: Direction) -> (i32, i32) {
    let (dx, dy) = direction.delta();
    clamp_to_grid(x.saturating_add(dx), y.saturating_add(dy))
}

pub fn to_visual(logical: i32) -> f32 {
    (logical * PIXEL_SCALE) as f32
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut color = String::with_capacity(7);
    color.push('#');
    for _ in 0..6 {
        color.push(DIGITS[rng.gen_range(0..16)] as char);
    }
    color
}

/// Failure reported by the player store for a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct StoreFault {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl StoreFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// One notification from the store's change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    Insert { new: Player },
    Update { old: Option<Player>, new: Player },
    Delete { old: Player },
}

impl ChangeEvent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => new.id,
            ChangeEvent::Delete { old } => old.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Subscribed,
    ChannelError(Option<StoreFault>),
    TimedOut,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Inserted(Option<Player>),
    Updated,
    Deleted,
    Rows(Vec<Player>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Insert {
        request_id: u64,
        player: Player,
    },
    Update {
        request_id: u64,
        id: PlayerId,
        x: i32,
        y: i32,
    },
    Delete {
        request_id: u64,
        id: PlayerId,
    },
    SelectAll {
        request_id: u64,
    },
    Subscribe {
        table: String,
    },
    Unsubscribe,
    Heartbeat,

    Reply {
        request_id: u64,
        result: Result<Reply, StoreFault>,
    },
    Change(ChangeEvent),
    Status(SubscriptionStatus),
}
