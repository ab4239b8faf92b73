use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Key press understood by the registration session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    RetryScan,
    RetakeAll,
    Finish,
    Terminate,
    Confirm,
    Other,
}

pub fn map_key(code: KeyCode) -> OperatorCommand {
    match code {
        KeyCode::Char('r') | KeyCode::Char('R') => OperatorCommand::RetryScan,
        KeyCode::Char('t') | KeyCode::Char('T') => OperatorCommand::RetakeAll,
        KeyCode::Char('f') | KeyCode::Char('F') | KeyCode::Enter => OperatorCommand::Finish,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => OperatorCommand::Terminate,
        KeyCode::Char('y') | KeyCode::Char('Y') => OperatorCommand::Confirm,
        _ => OperatorCommand::Other,
    }
}

/// Raw-mode key reader feeding [`OperatorCommand`]s into a channel.
///
/// Line prompts need cooked mode, so the reader is stopped around them and
/// started again afterwards.
pub struct KeyboardConsole {
    cancellation_token: CancellationToken,
    task: task::JoinHandle<()>,
}

impl KeyboardConsole {
    pub fn start() -> (Self, mpsc::Receiver<OperatorCommand>) {
        let (sender, receiver) = mpsc::channel(16);
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let task = task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }
                            let command = if key_event.modifiers.contains(KeyModifiers::CONTROL)
                                && key_event.code == KeyCode::Char('c')
                            {
                                OperatorCommand::Terminate
                            } else {
                                map_key(key_event.code)
                            };
                            debug!("Key {:?} -> {:?}", key_event.code, command);
                            if sender.blocking_send(command).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
        });

        (
            Self {
                cancellation_token,
                task,
            },
            receiver,
        )
    }

    /// Stop reading keys and leave raw mode
    pub async fn stop(self) {
        self.cancellation_token.cancel();
        if let Err(e) = self.task.await {
            warn!("Keyboard reader ended abnormally: {}", e);
        }
        let _ = disable_raw_mode();
    }
}
