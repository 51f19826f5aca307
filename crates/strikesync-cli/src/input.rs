use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::debug;

use crate::shutdown::ShutdownSignal;

/// Match control requested from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Space: start the countdown
    Start,
    /// r/R: back to waiting with fresh fighters
    Rematch,
    /// Esc, q/Q or Ctrl+C
    Quit,
}

/// Spawn a thread that turns key presses into [`KeyCommand`]s.
///
/// `Quit` also triggers `shutdown` directly, so the game loop stops even if
/// it is not draining the channel. The thread exits on shutdown or when the
/// receiver is dropped.
pub fn spawn_keyboard_monitor(
    shutdown: Arc<ShutdownSignal>,
    commands: Sender<KeyCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("Keyboard monitor started");

        while !shutdown.is_shutdown() {
            // Poll with a timeout so the shutdown flag is re-checked
            if event::poll(Duration::from_millis(100)).unwrap_or(false)
                && let Ok(Event::Key(key_event)) = event::read()
                && let Some(command) = command_for(&key_event)
            {
                debug!("Key {:?} -> {:?}", key_event.code, command);
                if command == KeyCommand::Quit {
                    shutdown.trigger();
                }
                if commands.send(command).is_err() {
                    break;
                }
            }
        }

        debug!("Keyboard monitor stopped");
    })
}

fn command_for(event: &KeyEvent) -> Option<KeyCommand> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    match event.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(KeyCommand::Quit),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Quit)
        }
        KeyCode::Char(' ') => Some(KeyCommand::Start),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(KeyCommand::Rematch),
        _ => None,
    }
}
