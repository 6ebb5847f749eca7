use super::state::ActivityTracker;
use crate::events::{AutoHdrEvent, EventBus};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Abort the running analysis, capture or composition
    Cancel,
    /// Abort and shut down
    Quit,
}

impl KeyAction {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => Some(KeyAction::Cancel),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(KeyAction::Quit),
            _ => None,
        }
    }
}

/// Terminal key handler: `c` or Esc cancels the current activity, `q` quits
pub struct KeyboardInputHandler {
    activity: ActivityTracker,
    shutdown: CancellationToken,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(
        activity: ActivityTracker,
        shutdown: CancellationToken,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            activity,
            shutdown,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Apply one key action; returns false once the handler should stop
    pub fn handle(&self, action: KeyAction, runtime: &Handle) -> bool {
        match action {
            KeyAction::Cancel => {
                if !self.activity.abort() {
                    debug!("Cancel key pressed while idle");
                }
                true
            }
            KeyAction::Quit => {
                info!("Quit key pressed - requesting shutdown");
                self.activity.abort();
                self.shutdown.cancel();

                let event_bus = Arc::clone(&self.event_bus);
                runtime.spawn(async move {
                    let _ = event_bus
                        .publish(AutoHdrEvent::ShutdownRequested {
                            timestamp: SystemTime::now(),
                            reason: "User requested via keyboard".to_string(),
                        })
                        .await;
                });
                false
            }
        }
    }

    /// Start listening for key presses on a blocking thread
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        info!("Keyboard input active - press 'c' or Esc to cancel, 'q' to quit");

        let handler = Arc::clone(self);
        let runtime = Handle::current();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !handler.cancellation_token.is_cancelled() && !handler.shutdown.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        match KeyAction::from_key(key_event.code) {
                            Some(action) => {
                                if !handler.handle(action, &runtime) {
                                    break;
                                }
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        })
    }

    pub async fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Let the polling loop notice and leave raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();
    }
}
