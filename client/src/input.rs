//! Keyboard adapter turning WASD presses into movement intents

use macroquad::prelude::*;
use shared::Direction;

/// What the adapter did with one key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// One of the movement keys; its default action is consumed
    Handled(Direction),
    PassThrough,
}

/// Case-insensitive WASD mapping
pub fn direction_for_key(key: &str) -> Option<Direction> {
    match key.to_lowercase().as_str() {
        "w" => Some(Direction::Up),
        "s" => Some(Direction::Down),
        "a" => Some(Direction::Left),
        "d" => Some(Direction::Right),
        _ => None,
    }
}

pub fn handle_key(key: &str) -> KeyDisposition {
    match direction_for_key(key) {
        Some(direction) => KeyDisposition::Handled(direction),
        None => KeyDisposition::PassThrough,
    }
}

pub fn handle_char(c: char) -> KeyDisposition {
    let mut buf = [0u8; 4];
    handle_key(c.encode_utf8(&mut buf))
}

/// Keys seen during one frame
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameInput {
    pub directions: Vec<Direction>,
    pub passed_through: Vec<char>,
}

impl FrameInput {
    pub fn push(&mut self, c: char) {
        match handle_char(c) {
            KeyDisposition::Handled(direction) => self.directions.push(direction),
            KeyDisposition::PassThrough => self.passed_through.push(c),
        }
    }

    pub fn saw(&self, c: char) -> bool {
        self.passed_through
            .iter()
            .any(|seen| seen.eq_ignore_ascii_case(&c))
    }
}

pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// Drains every character queued since the last frame
    ///
    /// Key-repeat characters are included, so holding a key keeps producing
    /// moves at the platform's repeat rate.
    pub fn poll(&mut self) -> FrameInput {
        let mut frame = FrameInput::default();
        while let Some(c) = get_char_pressed() {
            frame.push(c);
        }
        frame
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
