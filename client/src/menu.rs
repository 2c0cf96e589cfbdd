//! Name-entry form shown before joining

use macroquad::prelude::*;

pub const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Default)]
pub struct NameForm {
    input: String,
    error: Option<String>,
}

impl NameForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn push_char(&mut self, c: char) {
        if c.is_control() || self.input.chars().count() >= MAX_NAME_LEN {
            return;
        }
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// Returns the trimmed name when it is not blank
    pub fn submit(&self) -> Option<String> {
        let name = self.input.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Reads this frame's keyboard input; returns a name once submitted
    pub fn update(&mut self) -> Option<String> {
        while let Some(c) = get_char_pressed() {
            self.push_char(c);
        }
        if is_key_pressed(KeyCode::Backspace) {
            self.backspace();
        }
        if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
            return self.submit();
        }
        None
    }

    pub fn draw(&self) {
        clear_background(Color::from_rgba(17, 24, 39, 255));

        let card_w = 380.0;
        let card_h = 220.0;
        let card_x = (screen_width() - card_w) / 2.0;
        let card_y = (screen_height() - card_h) / 2.0;

        draw_rectangle(card_x, card_y, card_w, card_h, Color::from_rgba(31, 41, 55, 255));
        draw_rectangle_lines(card_x, card_y, card_w, card_h, 1.0, GRAY);

        draw_text("Enter the Pixelverse", card_x + 24.0, card_y + 44.0, 30.0, WHITE);
        draw_text(
            "Choose a name to join the game.",
            card_x + 24.0,
            card_y + 70.0,
            18.0,
            LIGHTGRAY,
        );

        let field_y = card_y + 95.0;
        draw_rectangle(card_x + 24.0, field_y, card_w - 48.0, 36.0, WHITE);
        let shown = if self.input.is_empty() {
            "Your Name"
        } else {
            self.input.as_str()
        };
        let shown_color = if self.input.is_empty() { GRAY } else { BLACK };
        draw_text(shown, card_x + 32.0, field_y + 24.0, 22.0, shown_color);

        draw_text(
            "Press Enter to join",
            card_x + 24.0,
            card_y + 160.0,
            18.0,
            LIGHTGRAY,
        );

        if let Some(error) = &self.error {
            draw_text(error, card_x + 24.0, card_y + 190.0, 16.0, RED);
        }
    }
}
