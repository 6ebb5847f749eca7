use super::{AutoHdrSession, ShutdownReason};
use tokio::task::JoinHandle;
use tracing::{info, warn};

impl AutoHdrSession {
    /// Ctrl+C aborts the running activity; a second Ctrl+C while idle, or
    /// SIGTERM, shuts the session down.
    pub fn spawn_signal_handlers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let activity = self.activity_tracker();
        let shutdown = self.shutdown_token();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(e) = signal {
                            warn!("Cannot listen for Ctrl+C: {}", e);
                            break;
                        }
                        info!("Received SIGINT signal (Ctrl+C)");
                        if !activity.abort() {
                            info!("Nothing to abort, shutting down");
                            shutdown.cancel();
                            break;
                        }
                    }
                }
            }
        }));

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let shutdown = self.shutdown_token();
            let event_bus = self.event_bus();
            handles.push(tokio::spawn(async move {
                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Cannot register SIGTERM handler: {}", e);
                        return;
                    }
                };
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        shutdown.cancel();
                        let _ = event_bus
                            .publish(crate::events::AutoHdrEvent::ShutdownRequested {
                                timestamp: std::time::SystemTime::now(),
                                reason: ShutdownReason::Signal("SIGTERM".to_string()).to_string(),
                            })
                            .await;
                    }
                }
            }));
        }

        handles
    }
}
