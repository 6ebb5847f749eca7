use crate::error::EventBusError;
use crate::sequence::{Boundary, SequenceState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Events emitted while analysing, capturing and composing a bracket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AutoHdrEvent {
    /// Analysis run started with the given criteria
    AnalysisStarted {
        run_id: Uuid,
        lower_pct: u8,
        upper_pct: u8,
        max_shots: usize,
        timestamp: SystemTime,
    },
    /// Named status of an analysis phase
    AnalysisStatus {
        run_id: Uuid,
        phase: SequenceState,
        message: String,
        progress: u8,
    },
    /// Exposure was moved one step while seeking a boundary
    ExposureStepped {
        run_id: Uuid,
        exposure: String,
        stops: usize,
    },
    /// A boundary shot met its criterion
    BoundaryFound {
        run_id: Uuid,
        boundary: Boundary,
        exposure: String,
    },
    /// Shot list is ready for capture
    AnalysisCompleted {
        run_id: Uuid,
        shot_count: usize,
        exposures: Vec<String>,
    },
    AnalysisFailed { run_id: Uuid, error: String },
    AnalysisAborted { run_id: Uuid },
    CaptureStarted { total: usize, timestamp: SystemTime },
    /// Shot `index` (1-based) of `total` was written to `path`
    CaptureProgress {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    CaptureCompleted { total: usize },
    CaptureFailed {
        index: usize,
        total: usize,
        error: String,
    },
    CaptureAborted { captured: usize, total: usize },
    CompositionStarted { inputs: usize, timestamp: SystemTime },
    /// External tool exited normally with `code`
    CompositionFinished { code: i32 },
    CompositionFailed { error: String },
    /// Camera connection status changed
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl AutoHdrEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            AutoHdrEvent::AnalysisStarted {
                lower_pct,
                upper_pct,
                max_shots,
                ..
            } => format!(
                "Analysis started (lower {}%, upper {}%, at most {} shots)",
                lower_pct, upper_pct, max_shots
            ),
            AutoHdrEvent::AnalysisStatus { message, .. } => message.clone(),
            AutoHdrEvent::ExposureStepped {
                exposure, stops, ..
            } => format!("Exposure set to {} ({} stops travelled)", exposure, stops),
            AutoHdrEvent::BoundaryFound {
                boundary, exposure, ..
            } => format!("{} boundary found at {}", boundary, exposure),
            AutoHdrEvent::AnalysisCompleted {
                shot_count,
                exposures,
                ..
            } => format!(
                "Measurements completed ! Capture will take {} shot(s): {}",
                shot_count,
                exposures.join(" ")
            ),
            AutoHdrEvent::AnalysisFailed { error, .. } => format!("Analysis failed: {}", error),
            AutoHdrEvent::AnalysisAborted { .. } => "Analysis aborted".to_string(),
            AutoHdrEvent::CaptureStarted { total, .. } => {
                format!("Capture of {} shot(s) started", total)
            }
            AutoHdrEvent::CaptureProgress { index, total, path } => {
                format!("Took shot {} of {} ({})", index, total, path.display())
            }
            AutoHdrEvent::CaptureCompleted { total } => {
                format!("{} images successfully captured.", total)
            }
            AutoHdrEvent::CaptureFailed {
                index,
                total,
                error,
            } => format!("Sequence capture failed at shot {} of {}: {}", index, total, error),
            AutoHdrEvent::CaptureAborted { captured, total } => {
                format!("Capture aborted after {} of {} shot(s)", captured, total)
            }
            AutoHdrEvent::CompositionStarted { inputs, .. } => {
                format!("Composition of {} image(s) started", inputs)
            }
            AutoHdrEvent::CompositionFinished { code } => {
                format!("Composition finished with exit code {}", code)
            }
            AutoHdrEvent::CompositionFailed { error } => format!("Composition failed: {}", error),
            AutoHdrEvent::CameraStatusChanged { connected, .. } => {
                format!(
                    "Camera {}",
                    if *connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            }
            AutoHdrEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AutoHdrEvent::AnalysisStarted { .. } => "analysis_started",
            AutoHdrEvent::AnalysisStatus { .. } => "analysis_status",
            AutoHdrEvent::ExposureStepped { .. } => "exposure_stepped",
            AutoHdrEvent::BoundaryFound { .. } => "boundary_found",
            AutoHdrEvent::AnalysisCompleted { .. } => "analysis_completed",
            AutoHdrEvent::AnalysisFailed { .. } => "analysis_failed",
            AutoHdrEvent::AnalysisAborted { .. } => "analysis_aborted",
            AutoHdrEvent::CaptureStarted { .. } => "capture_started",
            AutoHdrEvent::CaptureProgress { .. } => "capture_progress",
            AutoHdrEvent::CaptureCompleted { .. } => "capture_completed",
            AutoHdrEvent::CaptureFailed { .. } => "capture_failed",
            AutoHdrEvent::CaptureAborted { .. } => "capture_aborted",
            AutoHdrEvent::CompositionStarted { .. } => "composition_started",
            AutoHdrEvent::CompositionFinished { .. } => "composition_finished",
            AutoHdrEvent::CompositionFailed { .. } => "composition_failed",
            AutoHdrEvent::CameraStatusChanged { .. } => "camera_status_changed",
            AutoHdrEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Whether the event ends an analysis, capture or composition activity
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AutoHdrEvent::AnalysisCompleted { .. }
                | AutoHdrEvent::AnalysisFailed { .. }
                | AutoHdrEvent::AnalysisAborted { .. }
                | AutoHdrEvent::CaptureCompleted { .. }
                | AutoHdrEvent::CaptureFailed { .. }
                | AutoHdrEvent::CaptureAborted { .. }
                | AutoHdrEvent::CompositionFinished { .. }
                | AutoHdrEvent::CompositionFailed { .. }
        )
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AutoHdrEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<AutoHdrEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: AutoHdrEvent) -> Result<usize, EventBusError> {
        match &event {
            AutoHdrEvent::AnalysisCompleted { .. }
            | AutoHdrEvent::CaptureCompleted { .. }
            | AutoHdrEvent::CompositionFinished { .. } => {
                info!("{}", event.description());
            }
            AutoHdrEvent::AnalysisFailed { .. }
            | AutoHdrEvent::CaptureFailed { .. }
            | AutoHdrEvent::CompositionFailed { .. } => {
                error!("{}", event.description());
            }
            AutoHdrEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("Camera connected");
                } else {
                    warn!("Camera disconnected");
                }
            }
            AutoHdrEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events of one analysis run
    Run(Uuid),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &AutoHdrEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Run(id) => match event {
                AutoHdrEvent::AnalysisStarted { run_id, .. }
                | AutoHdrEvent::AnalysisStatus { run_id, .. }
                | AutoHdrEvent::ExposureStepped { run_id, .. }
                | AutoHdrEvent::BoundaryFound { run_id, .. }
                | AutoHdrEvent::AnalysisCompleted { run_id, .. }
                | AutoHdrEvent::AnalysisFailed { run_id, .. }
                | AutoHdrEvent::AnalysisAborted { run_id } => run_id == id,
                _ => false,
            },
        }
    }
}

/// Broadcast receiver that skips events its filter rejects.
///
/// Lag is reported to the caller instead of being skipped silently, so a
/// progress display can tell it missed updates.
pub struct EventReceiver {
    receiver: broadcast::Receiver<AutoHdrEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<AutoHdrEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lagged(&self, skipped: u64) -> EventBusError {
        warn!("Receiver '{}' missed {} event(s)", self.name, skipped);
        EventBusError::Lagged { skipped }
    }

    /// Next event accepted by the filter
    pub async fn recv(&mut self) -> Result<AutoHdrEvent, EventBusError> {
        use broadcast::error::RecvError;

        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => return Err(self.lagged(skipped)),
                Err(RecvError::Closed) => return Err(EventBusError::ChannelClosed),
            };
            if self.filter.matches(&event) {
                trace!("{} <- {}", self.name, event.event_type());
                return Ok(event);
            }
        }
    }

    /// Next accepted event already queued, if any
    pub fn try_recv(&mut self) -> Result<Option<AutoHdrEvent>, EventBusError> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(skipped)) => return Err(self.lagged(skipped)),
                Err(TryRecvError::Closed) => return Err(EventBusError::ChannelClosed),
            };
            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(AutoHdrEvent::CaptureCompleted { total: 4 })
            .await
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            AutoHdrEvent::CaptureCompleted { total } => assert_eq!(total, 4),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus
            .publish(AutoHdrEvent::CaptureCompleted { total: 1 })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(AutoHdrEvent::CameraStatusChanged {
                connected: false,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["capture_progress", "capture_failed"]);

        let progress = AutoHdrEvent::CaptureProgress {
            index: 1,
            total: 3,
            path: PathBuf::from("Image_0.jpg"),
        };
        let completed = AutoHdrEvent::CaptureCompleted { total: 3 };

        assert!(filter.matches(&progress));
        assert!(!filter.matches(&completed));
    }

    #[test]
    fn test_run_filter() {
        let run_id = Uuid::new_v4();
        let filter = EventFilter::Run(run_id);

        assert!(filter.matches(&AutoHdrEvent::AnalysisAborted { run_id }));
        assert!(!filter.matches(&AutoHdrEvent::AnalysisAborted {
            run_id: Uuid::new_v4()
        }));
        assert!(!filter.matches(&AutoHdrEvent::CaptureCompleted { total: 1 }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["composition_finished"]),
            "test",
        );

        event_bus
            .publish(AutoHdrEvent::CompositionStarted {
                inputs: 3,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();
        event_bus
            .publish(AutoHdrEvent::CompositionFinished { code: 0 })
            .await
            .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "composition_finished");
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = AutoHdrEvent::CaptureProgress {
            index: 2,
            total: 5,
            path: PathBuf::from("/tmp/Image_1.jpg"),
        };
        assert_eq!(event.event_type(), "capture_progress");
        assert!(event.description().contains("Took shot 2 of 5"));
        assert!(!event.is_terminal());
        assert!(AutoHdrEvent::CaptureAborted {
            captured: 1,
            total: 5
        }
        .is_terminal());
    }

    #[test]
    fn test_event_serializes_to_json() {
        let event = AutoHdrEvent::BoundaryFound {
            run_id: Uuid::nil(),
            boundary: Boundary::Lower,
            exposure: "1/500".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("BoundaryFound"));
        assert!(json.contains("1/500"));
    }
}
