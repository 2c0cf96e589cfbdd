use crate::input::InputManager;
use crate::menu::NameForm;
use crate::network::StoreLink;
use crate::rendering::Renderer;
use crate::session::Session;
use log::{error, info};
use macroquad::prelude::*;

pub struct AppConfig {
    pub store_addr: String,
    pub fake_ping_ms: u64,
    pub player_name: Option<String>,
}

enum Scene {
    NameEntry(NameForm),
    Playing(Session<StoreLink>),
}

/// Owns the window loop and switches between the form and the game view
pub struct App {
    config: AppConfig,
    input: InputManager,
    renderer: Renderer,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            input: InputManager::new(),
            renderer: Renderer::new(),
        }
    }

    fn start_session(&self, name: &str) -> Result<Session<StoreLink>, Box<dyn std::error::Error>> {
        let link = StoreLink::connect(&self.config.store_addr, self.config.fake_ping_ms)?;
        let session = Session::start(link, name)?;
        info!("Joining as {}", session.name());
        Ok(session)
    }

    fn enter_game(&self, name: &str, mut form: NameForm) -> Scene {
        match self.start_session(name) {
            Ok(session) => Scene::Playing(session),
            Err(e) => {
                error!("Could not start session: {}", e);
                form.set_error(e.to_string());
                Scene::NameEntry(form)
            }
        }
    }

    pub async fn run(&mut self) {
        prevent_quit();

        let mut scene = match self.config.player_name.clone() {
            Some(name) => self.enter_game(&name, NameForm::new()),
            None => Scene::NameEntry(NameForm::new()),
        };

        loop {
            if is_quit_requested() {
                if let Scene::Playing(session) = &mut scene {
                    session.leave();
                }
                break;
            }

            scene = match scene {
                Scene::NameEntry(mut form) => match form.update() {
                    Some(name) => self.enter_game(&name, form),
                    None => {
                        form.draw();
                        Scene::NameEntry(form)
                    }
                },
                Scene::Playing(session) => self.play_frame(session),
            };

            next_frame().await;
        }

        // dropping the scene flushes the delete before the window closes
        drop(scene);
        info!("Client shut down");
    }

    fn play_frame(&mut self, mut session: Session<StoreLink>) -> Scene {
        session.pump();

        let frame = self.input.poll();
        for &direction in &frame.directions {
            session.handle_direction(direction);
        }

        if session.join_error().is_some() && frame.saw('r') {
            if let Err(e) = session.retry_join() {
                error!("Retry failed: {}", e);
            }
        }

        if self.renderer.leave_requested() {
            session.leave();
            return Scene::NameEntry(NameForm::new());
        }

        self.renderer
            .render(session.engine(), session.name(), session.join_error());
        Scene::Playing(session)
    }
}
