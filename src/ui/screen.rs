use ratatui::Frame;

use crate::{ui::render_mode_select, App, AppState};

/// A UI Screen boundary: one per [`AppState`]
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

/// Mode selection with the optional label table overlay
pub struct ModeSelectScreen;

impl Screen for ModeSelectScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        let area = f.area();
        render_mode_select(app, area, f.buffer_mut());
    }
}

/// Running session - HUD, camera view and input
pub struct PlayScreen;

impl Screen for PlayScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Final score, with the celebration on an all-clear
pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::ModeSelect => Box::new(ModeSelectScreen),
        AppState::Playing => Box::new(PlayScreen),
        AppState::Results => Box::new(ResultsScreen),
    }
}
