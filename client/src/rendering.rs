use crate::engine::{Engine, EngineError};
use macroquad::prelude::*;
use shared::{to_visual, Player, PlayerId, PLAYER_SIZE, VISUAL_HEIGHT, VISUAL_WIDTH};
use std::collections::HashMap;

pub const BACKGROUND_COLOR: &str = "#222222";
pub const LABEL_COLOR: &str = "#FFFFFF";
/// Names are drawn for everyone only while fewer players than this are present
pub const NAME_LABEL_THRESHOLD: usize = 10;
pub const LABEL_FONT_SIZE: f32 = 14.0;
pub const HUD_HEIGHT: i32 = 170;

const ROSTER_ROWS: usize = 6;
const LEAVE_BUTTON: Rect = Rect {
    x: VISUAL_WIDTH as f32 - 150.0,
    y: VISUAL_HEIGHT as f32 + 20.0,
    w: 130.0,
    h: 36.0,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear { color: String },
    Square { x: f32, y: f32, size: f32, color: String },
    Label { text: String, x: f32, y: f32 },
}

/// Derives the canvas contents from the player map
pub fn plan_frame(players: &HashMap<PlayerId, Player>, my_id: Option<PlayerId>) -> Vec<DrawCommand> {
    let mut ordered: Vec<&Player> = players.values().collect();
    ordered.sort_by_key(|player| player.id);

    let label_everyone = players.len() < NAME_LABEL_THRESHOLD;
    let size = to_visual(PLAYER_SIZE);

    let mut commands = Vec::with_capacity(1 + ordered.len() * 2);
    commands.push(DrawCommand::Clear {
        color: BACKGROUND_COLOR.to_string(),
    });

    for player in ordered {
        let x = to_visual(player.x);
        let y = to_visual(player.y);
        commands.push(DrawCommand::Square {
            x,
            y,
            size,
            color: player.color.clone(),
        });

        if label_everyone || Some(player.id) == my_id {
            commands.push(DrawCommand::Label {
                text: player.name.clone(),
                x: x + size / 2.0,
                y: y - 5.0,
            });
        }
    }

    commands
}

/// Parses `#RGB` or `#RRGGBB`
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }

    match hex.len() {
        6 => Some((
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        3 => {
            let mut channels = [0u8; 3];
            for (channel, digit) in channels.iter_mut().zip(hex.chars()) {
                let value = digit.to_digit(16)? as u8;
                *channel = value * 17;
            }
            Some((channels[0], channels[1], channels[2]))
        }
        _ => None,
    }
}

fn to_color(value: &str) -> Color {
    parse_hex_color(value)
        .map(|(r, g, b)| Color::from_rgba(r, g, b, 255))
        .unwrap_or(WHITE)
}

pub struct Renderer {
    planned_revision: Option<u64>,
    commands: Vec<DrawCommand>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            planned_revision: None,
            commands: Vec::new(),
        }
    }

    /// Re-plans the canvas only when the engine state changed
    pub fn render(&mut self, engine: &Engine, name: &str, join_error: Option<&EngineError>) {
        if self.planned_revision != Some(engine.revision()) {
            self.commands = plan_frame(engine.players(), engine.my_player_id());
            self.planned_revision = Some(engine.revision());
        }

        clear_background(Color::from_rgba(31, 41, 55, 255));
        for command in &self.commands {
            Self::paint(command);
        }

        self.draw_hud(engine, name, join_error);
    }

    fn paint(command: &DrawCommand) {
        match command {
            DrawCommand::Clear { color } => draw_rectangle(
                0.0,
                0.0,
                VISUAL_WIDTH as f32,
                VISUAL_HEIGHT as f32,
                to_color(color),
            ),
            DrawCommand::Square { x, y, size, color } => {
                draw_rectangle(*x, *y, *size, *size, to_color(color))
            }
            DrawCommand::Label { text, x, y } => {
                let dims = measure_text(text, None, LABEL_FONT_SIZE as u16, 1.0);
                draw_text(
                    text,
                    x - dims.width / 2.0,
                    *y,
                    LABEL_FONT_SIZE,
                    to_color(LABEL_COLOR),
                );
            }
        }
    }

    fn draw_hud(&self, engine: &Engine, name: &str, join_error: Option<&EngineError>) {
        let top = VISUAL_HEIGHT as f32;
        draw_line(0.0, top, VISUAL_WIDTH as f32, top, 1.0, GRAY);

        draw_text(&format!("Player: {}", name), 20.0, top + 24.0, 20.0, YELLOW);
        draw_text("Controls: W, A, S, D to move", 20.0, top + 44.0, 16.0, WHITE);

        if let Some(error) = join_error {
            draw_text(&error.to_string(), 20.0, top + 64.0, 16.0, RED);
            draw_text("Press R to retry", 20.0, top + 82.0, 16.0, RED);
        }

        let players = engine.players();
        let roster_x = 360.0;
        draw_text(
            &format!("Active Players ({}):", players.len()),
            roster_x,
            top + 24.0,
            18.0,
            WHITE,
        );

        let mut roster: Vec<&Player> = players.values().collect();
        roster.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        for (row, player) in roster.iter().take(ROSTER_ROWS).enumerate() {
            let suffix = if Some(player.id) == engine.my_player_id() {
                " (You)"
            } else {
                ""
            };
            draw_text(
                &format!("{}{}", player.name, suffix),
                roster_x,
                top + 46.0 + row as f32 * 18.0,
                16.0,
                to_color(&player.color),
            );
        }
        if roster.len() > ROSTER_ROWS {
            draw_text(
                &format!("... and {} more", roster.len() - ROSTER_ROWS),
                roster_x,
                top + 46.0 + ROSTER_ROWS as f32 * 18.0,
                16.0,
                GRAY,
            );
        }

        let hovered = LEAVE_BUTTON.contains(mouse_position().into());
        let fill = if hovered {
            Color::from_rgba(220, 38, 38, 255)
        } else {
            Color::from_rgba(185, 28, 28, 255)
        };
        draw_rectangle(LEAVE_BUTTON.x, LEAVE_BUTTON.y, LEAVE_BUTTON.w, LEAVE_BUTTON.h, fill);
        draw_text(
            "Leave Game",
            LEAVE_BUTTON.x + 18.0,
            LEAVE_BUTTON.y + 24.0,
            20.0,
            WHITE,
        );
    }

    pub fn leave_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
            || (is_mouse_button_pressed(MouseButton::Left)
                && LEAVE_BUTTON.contains(mouse_position().into()))
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn player(name: &str, x: i32, y: i32) -> Player {
        Player::new(PlayerId::new(), name, "#FF8800", x, y)
    }

    fn map(players: &[Player]) -> HashMap<PlayerId, Player> {
        players.iter().map(|p| (p.id, p.clone())).collect()
    }

    fn labels(commands: &[DrawCommand]) -> Vec<&str> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Label { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_frame_only_clears() {
        let commands = plan_frame(&HashMap::new(), None);
        assert_eq!(
            commands,
            vec![DrawCommand::Clear {
                color: BACKGROUND_COLOR.to_string()
            }]
        );
    }

    #[test]
    fn test_square_scaled_into_visual_space() {
        let alice = player("Alice", 100, 75);
        let commands = plan_frame(&map(&[alice.clone()]), Some(alice.id));

        match &commands[1] {
            DrawCommand::Square { x, y, size, color } => {
                assert_approx_eq!(*x, 400.0);
                assert_approx_eq!(*y, 300.0);
                assert_approx_eq!(*size, 4.0);
                assert_eq!(color, "#FF8800");
            }
            other => panic!("expected square, got {:?}", other),
        }
        match &commands[2] {
            DrawCommand::Label { text, x, y } => {
                assert_eq!(text, "Alice");
                assert_approx_eq!(*x, 402.0);
                assert_approx_eq!(*y, 295.0);
            }
            other => panic!("expected label, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_for_everyone_below_threshold() {
        let players: Vec<Player> = (0..NAME_LABEL_THRESHOLD - 1)
            .map(|i| player(&format!("p{}", i), i as i32, 0))
            .collect();
        let commands = plan_frame(&map(&players), None);
        assert_eq!(labels(&commands).len(), NAME_LABEL_THRESHOLD - 1);
    }

    #[test]
    fn test_only_own_label_at_threshold() {
        let players: Vec<Player> = (0..NAME_LABEL_THRESHOLD)
            .map(|i| player(&format!("p{}", i), i as i32, 0))
            .collect();
        let me = players[3].id;

        let commands = plan_frame(&map(&players), Some(me));

        assert_eq!(labels(&commands), vec!["p3"]);
        let squares = commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::Square { .. }))
            .count();
        assert_eq!(squares, NAME_LABEL_THRESHOLD);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF8800"), Some((255, 136, 0)));
        assert_eq!(parse_hex_color("#222"), Some((34, 34, 34)));
        assert_eq!(parse_hex_color("#abcdef"), Some((171, 205, 239)));
        assert_eq!(parse_hex_color("FF8800"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }
}
