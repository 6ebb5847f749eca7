pub mod keyboard_input;

mod runtime;
mod session;
mod state;
mod types;


pub use keyboard_input::{KeyAction, KeyboardInputHandler};
pub use session::AutoHdrSession;
pub use state::{ActivityGuard, ActivityTracker};
pub use types::{Activity, ShutdownReason};
