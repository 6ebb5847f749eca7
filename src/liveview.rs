use crate::camera::CameraHandle;
use crate::config::LiveViewConfig;
use crate::error::CameraError;
use crate::events::{AutoHdrEvent, EventBus};
use crate::frame::PreviewFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Continuous live-view acquisition feeding the analysis channel.
///
/// Frames are pulled from the shared camera at a fixed pace and pushed into a
/// bounded channel; a slow consumer holds the producer back instead of
/// queueing frames.
pub struct LiveViewProducer {
    camera: CameraHandle,
    event_bus: Arc<EventBus>,
    interval: Duration,
    capacity: usize,
    frame_counter: Arc<AtomicU64>,
}

impl LiveViewProducer {
    pub fn new(camera: CameraHandle, config: &LiveViewConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            camera,
            event_bus,
            interval: Duration::from_millis(config.interval_ms.max(1)),
            capacity: config.frame_channel_capacity.max(1),
            frame_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of frames delivered so far
    pub fn frames_delivered(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    /// Start acquisition on its own task; it stops when `cancel` fires, the
    /// receiver is dropped or the camera disconnects.
    pub fn spawn(&self, cancel: CancellationToken) -> (mpsc::Receiver<PreviewFrame>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let camera = self.camera.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let frame_counter = Arc::clone(&self.frame_counter);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            Self::run(camera, event_bus, frame_counter, interval, tx, cancel).await;
        });

        (rx, task)
    }

    async fn run(
        camera: CameraHandle,
        event_bus: Arc<EventBus>,
        frame_counter: Arc<AtomicU64>,
        interval: Duration,
        tx: mpsc::Sender<PreviewFrame>,
        cancel: CancellationToken,
    ) {
        let mut interval_timer = tokio::time::interval(interval);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Live view started ({:?} between frames)", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval_timer.tick() => {}
            }

            let capture_camera = camera.clone();
            let captured =
                tokio::task::spawn_blocking(move || capture_camera.lock().capture_preview()).await;

            let frame = match captured {
                Ok(Ok(frame)) => frame,
                Ok(Err(CameraError::Disconnected)) => {
                    error!("Camera disconnected, stopping live view");
                    let _ = event_bus
                        .publish(AutoHdrEvent::CameraStatusChanged {
                            connected: false,
                            timestamp: SystemTime::now(),
                        })
                        .await;
                    break;
                }
                Ok(Err(e)) => {
                    // Live view is lossy; the next tick tries again
                    warn!("Live view frame lost: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("Live view capture task failed: {}", e);
                    break;
                }
            };

            let mut frame = frame;
            frame.id = frame_counter.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Live view frame {} ({}x{}, exposure {:?})",
                frame.id,
                frame.width,
                frame.height,
                frame.exposure
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(frame) => {
                    if sent.is_err() {
                        debug!("Live view consumer gone");
                        break;
                    }
                }
            }
        }

        info!("Live view stopped");
    }
}
