use crate::wizard::Step;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus closed")]
    ChannelClosed,
}

/// Progress of a registration session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WizardEvent {
    /// The wizard moved to another step
    StepChanged { from: Step, to: Step },
    /// A sensor poll finished without a reading
    SensorPollAttempt { attempt: u32, waiting: bool },
    /// The sensor reported a tag
    SensorReadingAcquired {
        tag_id: String,
        weight_kg: f64,
        height_cm: f64,
    },
    /// No reading arrived before the stage deadline
    SensorTimedOut { deadline: Duration },
    /// A capture request was issued for a slot
    ShotRequested { slot: usize, attempt: u32 },
    /// A slot was filled
    ShotCaptured { slot: usize, bytes: usize },
    /// A capture attempt failed and will be retried
    ShotFailed {
        slot: usize,
        attempt: u32,
        error: String,
    },
    /// Waiting for the goat to be turned before the next slot
    Repositioning { next_slot: usize, delay: Duration },
    /// All slots are filled
    ReviewReady { shot_count: usize },
    /// Every slot was cleared to shoot again
    RetakeRequested,
    SubmitStarted { attempt: u32 },
    SubmitFailed { error: String },
    Submitted { record_id: String },
    /// Seconds left on the completion screen
    CountdownTick { remaining_seconds: u64 },
    /// The session was abandoned and its draft discarded
    Terminated { timestamp: SystemTime },
}

impl WizardEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            WizardEvent::StepChanged { from, to } => format!("Step {} -> {}", from, to),
            WizardEvent::SensorPollAttempt { attempt, waiting } => {
                if *waiting {
                    format!("Sensor poll {}: waiting for tag", attempt)
                } else {
                    format!("Sensor poll {}: no answer", attempt)
                }
            }
            WizardEvent::SensorReadingAcquired {
                tag_id,
                weight_kg,
                height_cm,
            } => format!(
                "Tag {} read ({:.1} kg, {:.1} cm)",
                tag_id, weight_kg, height_cm
            ),
            WizardEvent::SensorTimedOut { deadline } => {
                format!("No tag within {}s", deadline.as_secs())
            }
            WizardEvent::ShotRequested { slot, attempt } => {
                format!("Capturing photo {} (attempt {})", slot + 1, attempt)
            }
            WizardEvent::ShotCaptured { slot, bytes } => {
                format!("Photo {} captured ({} bytes)", slot + 1, bytes)
            }
            WizardEvent::ShotFailed {
                slot,
                attempt,
                error,
            } => format!("Photo {} attempt {} failed: {}", slot + 1, attempt, error),
            WizardEvent::Repositioning { next_slot, delay } => format!(
                "Turn the goat for photo {} ({:.1}s)",
                next_slot + 1,
                delay.as_secs_f32()
            ),
            WizardEvent::ReviewReady { shot_count } => {
                format!("{} photos ready for review", shot_count)
            }
            WizardEvent::RetakeRequested => "Retaking all photos".to_string(),
            WizardEvent::SubmitStarted { attempt } => format!("Saving goat (attempt {})", attempt),
            WizardEvent::SubmitFailed { error } => format!("Saving failed: {}", error),
            WizardEvent::Submitted { record_id } => format!("Goat saved as {}", record_id),
            WizardEvent::CountdownTick { remaining_seconds } => {
                format!("Returning home in {} seconds", remaining_seconds)
            }
            WizardEvent::Terminated { .. } => "Registration terminated".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            WizardEvent::StepChanged { .. } => "step_changed",
            WizardEvent::SensorPollAttempt { .. } => "sensor_poll_attempt",
            WizardEvent::SensorReadingAcquired { .. } => "sensor_reading_acquired",
            WizardEvent::SensorTimedOut { .. } => "sensor_timed_out",
            WizardEvent::ShotRequested { .. } => "shot_requested",
            WizardEvent::ShotCaptured { .. } => "shot_captured",
            WizardEvent::ShotFailed { .. } => "shot_failed",
            WizardEvent::Repositioning { .. } => "repositioning",
            WizardEvent::ReviewReady { .. } => "review_ready",
            WizardEvent::RetakeRequested => "retake_requested",
            WizardEvent::SubmitStarted { .. } => "submit_started",
            WizardEvent::SubmitFailed { .. } => "submit_failed",
            WizardEvent::Submitted { .. } => "submitted",
            WizardEvent::CountdownTick { .. } => "countdown_tick",
            WizardEvent::Terminated { .. } => "terminated",
        }
    }
}

/// Broadcast bus the wizard stages report progress on
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WizardEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events accepted by `filter`
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: WizardEvent) -> usize {
        match &event {
            WizardEvent::StepChanged { .. }
            | WizardEvent::SensorReadingAcquired { .. }
            | WizardEvent::ReviewReady { .. }
            | WizardEvent::Submitted { .. }
            | WizardEvent::Terminated { .. } => info!("{}", event.description()),
            WizardEvent::SensorTimedOut { .. } | WizardEvent::ShotFailed { .. } => {
                warn!("{}", event.description())
            }
            WizardEvent::SubmitFailed { .. } => error!("{}", event.description()),
            _ => debug!("Event: {}", event.description()),
        }

        // no subscribers is fine: progress is informational
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&WizardEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &WizardEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<WizardEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<WizardEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<WizardEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                    return Err(EventBusError::Lagged { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event already queued that passes the filter
    pub fn drain(&mut self) -> Vec<WizardEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => events.push(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                }
                Err(_) => return events,
            }
        }
    }
}
