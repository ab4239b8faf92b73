use super::keys::{KeyboardConsole, OperatorCommand};
use super::prompt::read_attributes;
use crate::backend::{GoatRecord, NameSuggester};
use crate::capture::CapturePhase;
use crate::draft::GoatAttributes;
use crate::error::{Result, SmartGidError};
use crate::events::{EventBus, EventBusError, EventFilter, WizardEvent};
use crate::wizard::{Step, WizardController};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Keys = mpsc::Receiver<OperatorCommand>;

enum Interrupted<T> {
    Done(T),
    Quit,
}

/// Print a line that also renders correctly in raw mode
pub fn say(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{}\r\n", message);
    let _ = stdout.flush();
}

fn operator_visible(event: &WizardEvent) -> bool {
    !matches!(event, WizardEvent::SensorPollAttempt { waiting: true, .. })
}

fn spawn_progress_printer(bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe_filtered(EventFilter::Custom(operator_visible), "console");
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => say(&format!("  {}", event.description())),
                Err(EventBusError::Lagged { .. }) => continue,
                Err(EventBusError::ChannelClosed) => break,
            }
        }
    })
}

/// Resolves on the next terminate key; other keys are ignored
async fn terminate_requested(keys: &mut Keys) {
    while let Some(command) = keys.recv().await {
        if command == OperatorCommand::Terminate {
            return;
        }
    }
    std::future::pending::<()>().await
}

async fn next_command(keys: &mut Keys) -> OperatorCommand {
    match keys.recv().await {
        Some(command) => command,
        None => std::future::pending().await,
    }
}

/// Interactive registration driven from the terminal
pub struct RegistrationSession {
    wizard: WizardController,
    preset: GoatAttributes,
    suggester: Option<NameSuggester>,
}

impl RegistrationSession {
    pub fn new(wizard: WizardController, preset: GoatAttributes) -> Self {
        Self {
            wizard,
            preset,
            suggester: None,
        }
    }

    pub fn with_name_suggestions(mut self, suggester: NameSuggester) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn wizard(&self) -> &WizardController {
        &self.wizard
    }

    /// Run until the goat is saved or the operator leaves.
    /// Returns the saved record, `None` when terminated.
    pub async fn run(mut self) -> Result<Option<GoatRecord>> {
        let printer = spawn_progress_printer(self.wizard.bus());
        let (mut console, mut keys) = KeyboardConsole::start();
        let mut saved = None;

        let result = loop {
            let step = self.wizard.step();
            debug!("Console at step {}", step);

            let outcome = match step {
                Step::Start => self.wizard.start(),
                Step::AcquireSensor => self.acquire(&mut keys).await,
                Step::EnterDetails => {
                    let (restarted, keys_after, outcome) = self.details(console, keys).await;
                    console = restarted;
                    keys = keys_after;
                    outcome
                }
                Step::Capture => match self.capture(&mut keys).await {
                    Ok(Some(record)) => {
                        saved = Some(record);
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(e) => Err(e),
                },
                Step::Complete => self.complete(&mut keys).await,
                Step::Exited => break Ok(()),
            };

            match outcome {
                Ok(()) => {}
                Err(SmartGidError::Terminated) => {
                    say("Registration aborted");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        console.stop().await;
        printer.abort();
        result.map(|_| saved)
    }

    async fn acquire(&mut self, keys: &mut Keys) -> Result<()> {
        say("Scanning: walk the goat onto the scale and hold its tag to the reader (q to quit)");

        let outcome = tokio::select! {
            result = self.wizard.acquire_sensor() => Interrupted::Done(result),
            _ = terminate_requested(keys) => Interrupted::Quit,
        };

        match outcome {
            Interrupted::Done(Ok(reading)) => {
                say(&format!(
                    "Tag {}  weight {:.1} kg  height {:.1} cm",
                    reading.tag_id, reading.weight_kg, reading.height_cm
                ));
                Ok(())
            }
            Interrupted::Done(Err(e)) if e.is_recoverable() => {
                say(&e.user_message());
                loop {
                    match next_command(keys).await {
                        OperatorCommand::RetryScan => return Ok(()),
                        OperatorCommand::Terminate => return self.confirm_terminate(keys).await,
                        _ => say("Press 'r' to scan again or 'q' to quit"),
                    }
                }
            }
            Interrupted::Done(Err(e)) => Err(e),
            Interrupted::Quit => self.confirm_terminate(keys).await,
        }
    }

    async fn details(
        &mut self,
        console: KeyboardConsole,
        mut keys: Keys,
    ) -> (KeyboardConsole, Keys, Result<()>) {
        say("Enter to fill in the details, 'r' to scan again, 'q' to quit");
        loop {
            match next_command(&mut keys).await {
                OperatorCommand::Finish => break,
                OperatorCommand::RetryScan => {
                    let outcome = self.wizard.retry_scan().await;
                    return (console, keys, outcome);
                }
                OperatorCommand::Terminate => {
                    let outcome = self.confirm_terminate(&mut keys).await;
                    return (console, keys, outcome);
                }
                _ => {}
            }
        }

        let mut attributes = self.wizard.draft().attributes.clone();
        if attributes == GoatAttributes::default() {
            attributes = self.preset.clone();
        }

        if !attributes.is_complete() {
            console.stop().await;
            let suggestion = match &self.suggester {
                Some(suggester) if attributes.name.is_empty() => Some(suggester.suggest().await),
                _ => None,
            };
            let current = attributes.clone();
            let prompted = tokio::task::spawn_blocking(move || {
                let stdin = std::io::stdin();
                let mut stdout = std::io::stdout();
                read_attributes(&mut stdin.lock(), &mut stdout, &current, suggestion.as_deref())
            })
            .await;

            let (restarted, keys) = KeyboardConsole::start();
            attributes = match prompted {
                Ok(Ok(attributes)) => attributes,
                Ok(Err(e)) => return (restarted, keys, Err(e.into())),
                Err(e) => {
                    return (
                        restarted,
                        keys,
                        Err(SmartGidError::component("console", e.to_string())),
                    )
                }
            };
            let outcome = self.submit_details(attributes).await;
            return (restarted, keys, outcome);
        }

        let outcome = self.submit_details(attributes).await;
        (console, keys, outcome)
    }

    async fn submit_details(&mut self, attributes: GoatAttributes) -> Result<()> {
        match self.wizard.submit_details(attributes).await {
            Err(e @ SmartGidError::ValidationFailed { .. }) => {
                // stay on the details step; the partial entry is kept
                self.preset = GoatAttributes::default();
                say(&e.user_message());
                Ok(())
            }
            other => other,
        }
    }

    async fn capture(&mut self, keys: &mut Keys) -> Result<Option<GoatRecord>> {
        if self.wizard.capture_phase() != CapturePhase::Reviewing {
            say("Taking photos, turn the goat when asked (q to quit)");
            let outcome = tokio::select! {
                result = self.wizard.capture() => Interrupted::Done(result),
                _ = terminate_requested(keys) => Interrupted::Quit,
            };

            return match outcome {
                Interrupted::Done(Ok(())) => Ok(None),
                Interrupted::Done(Err(e @ SmartGidError::CaptureExhausted { .. })) => {
                    say(&e.user_message());
                    say("'t' restarts the photos, 'r' retries this photo, 'q' quits");
                    loop {
                        match next_command(keys).await {
                            OperatorCommand::RetakeAll => {
                                self.wizard.retake().await?;
                                return Ok(None);
                            }
                            OperatorCommand::RetryScan | OperatorCommand::Finish => return Ok(None),
                            OperatorCommand::Terminate => {
                                self.confirm_terminate(keys).await?;
                                return Ok(None);
                            }
                            _ => {}
                        }
                    }
                }
                Interrupted::Done(Err(e)) => Err(e),
                Interrupted::Quit => {
                    self.confirm_terminate(keys).await?;
                    Ok(None)
                }
            };
        }

        say("Review the photos: 'f'/Enter saves the goat, 't' retakes all photos, 'q' quits");
        loop {
            match next_command(keys).await {
                OperatorCommand::Finish => {
                    return match self.wizard.finish().await {
                        Ok(record) => Ok(Some(record)),
                        Err(e) if e.is_recoverable() => {
                            say(&e.user_message());
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    };
                }
                OperatorCommand::RetakeAll => {
                    self.wizard.retake().await?;
                    return Ok(None);
                }
                OperatorCommand::Terminate => {
                    self.confirm_terminate(keys).await?;
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    async fn complete(&mut self, keys: &mut Keys) -> Result<()> {
        say("Goat saved. Press any key to close.");
        let dismiss = self.wizard.dismiss_handle();
        let key_watch = async {
            if keys.recv().await.is_some() {
                dismiss.cancel();
            }
            std::future::pending::<()>().await
        };

        tokio::select! {
            outcome = self.wizard.complete_countdown() => {
                info!("Completion screen closed ({:?})", outcome?);
                Ok(())
            }
            _ = key_watch => Ok(()),
        }
    }

    async fn confirm_terminate(&mut self, keys: &mut Keys) -> Result<()> {
        say("Discard this registration? (y/N)");
        let confirmed = next_command(keys).await == OperatorCommand::Confirm;
        if self.wizard.terminate(confirmed).await? {
            say("Registration discarded");
        } else {
            say("Continuing");
        }
        Ok(())
    }
}
