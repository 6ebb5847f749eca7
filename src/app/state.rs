use super::types::Activity;
use crate::error::AutoHdrError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct Current {
    activity: Activity,
    cancel: Option<CancellationToken>,
}

/// Tracks the single running activity and how to cancel it.
///
/// Cloning shares the same state, so signal and keyboard handlers can abort
/// whatever the session is doing.
#[derive(Clone)]
pub struct ActivityTracker {
    inner: Arc<Mutex<Current>>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Current {
                activity: Activity::Idle,
                cancel: None,
            })),
        }
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Activity {
        self.inner.lock().activity
    }

    /// Claim the camera for `activity`; the token is a child of `parent`
    pub fn begin(
        &self,
        activity: Activity,
        parent: &CancellationToken,
    ) -> Result<ActivityGuard, AutoHdrError> {
        let mut current = self.inner.lock();
        if current.activity != Activity::Idle {
            return Err(AutoHdrError::Busy {
                requested: activity.to_string(),
                current: current.activity.to_string(),
            });
        }

        let token = parent.child_token();
        current.activity = activity;
        current.cancel = Some(token.clone());
        debug!("Activity changed to: {}", activity);

        Ok(ActivityGuard {
            tracker: self.clone(),
            token,
        })
    }

    /// Cancel the running activity; false when idle
    pub fn abort(&self) -> bool {
        let current = self.inner.lock();
        match &current.cancel {
            Some(token) => {
                info!("Aborting {}", current.activity);
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Returns the tracker to idle when dropped
pub struct ActivityGuard {
    tracker: ActivityTracker,
    token: CancellationToken,
}

impl ActivityGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        let mut current = self.tracker.inner.lock();
        debug!("Activity {} finished", current.activity);
        current.activity = Activity::Idle;
        current.cancel = None;
    }
}
