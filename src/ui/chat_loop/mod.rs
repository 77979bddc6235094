//! Terminal chat loop: lifecycle, input routing, and background work.

mod event_loop;
mod keybindings;
mod lifecycle;

use std::sync::Arc;

use ratatui::crossterm::event::Event;
use tokio::sync::Mutex;

use crate::core::app::App;

pub use event_loop::{run_chat, ChatOptions};
pub use keybindings::{map_key, map_mouse, KeyContext, KeyMode, KeyResult};
pub use lifecycle::{restore_terminal, setup_terminal, SharedTerminal};

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

/// Shared access to the app for the loop and the tasks it spawns.
#[derive(Clone)]
pub struct AppHandle {
    inner: Arc<Mutex<App>>,
}

impl AppHandle {
    pub fn new(inner: Arc<Mutex<App>>) -> Self {
        Self { inner }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&App) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&guard)
    }

    pub async fn update<R>(&self, f: impl FnOnce(&mut App) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}
