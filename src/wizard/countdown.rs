use crate::events::{EventBus, WizardEvent};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Elapsed,
    Dismissed,
}

/// Seconds shown on the completion screen before the wizard closes itself
pub struct CompletionCountdown {
    duration: Duration,
    bus: EventBus,
}

impl CompletionCountdown {
    pub fn new(duration: Duration, bus: EventBus) -> Self {
        Self { duration, bus }
    }

    /// Tick once per second until the time is up or `dismiss` fires
    pub async fn run(&self, dismiss: &CancellationToken) -> CountdownOutcome {
        let mut remaining = self.duration.as_secs();

        while remaining > 0 {
            self.bus.publish(WizardEvent::CountdownTick {
                remaining_seconds: remaining,
            });

            tokio::select! {
                _ = dismiss.cancelled() => {
                    debug!("Completion screen dismissed with {}s left", remaining);
                    return CountdownOutcome::Dismissed;
                }
                _ = sleep(Duration::from_secs(1)) => {}
            }
            remaining -= 1;
        }

        CountdownOutcome::Elapsed
    }
}
