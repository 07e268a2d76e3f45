//! Interactive client session.

use std::{io::Write, sync::Arc};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot};

use crate::{
    domain::IdentityProvider,
    infrastructure::identity::SessionIdentity,
    usecase::{JoinStateStore, RealtimeConnectionHandle},
};

use super::{
    command::{Command, HELP, parse_command},
    error::ClientError,
    formatter::OutputFormatter,
};

const PROMPT: &str = "boss> ";

/// Whether the session keeps reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Everything a running session drives
pub struct Session {
    store: JoinStateStore,
    preview: RealtimeConnectionHandle,
    identity: Arc<SessionIdentity>,
}

impl Session {
    pub fn new(
        store: JoinStateStore,
        preview: RealtimeConnectionHandle,
        identity: Arc<SessionIdentity>,
    ) -> Self {
        Self {
            store,
            preview,
            identity,
        }
    }

    async fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Join {
                boss_id,
                event_id,
                nickname,
            } => {
                let record = self.store.join(boss_id, event_id, nickname).await;
                print!("{}", OutputFormatter::format_joined(&record));
            }
            Command::TryJoin {
                boss_id,
                event_id,
                nickname,
            } => match self.store.try_join(boss_id, event_id, nickname).await {
                Ok(record) => print!("{}", OutputFormatter::format_joined(&record)),
                Err(e) => print!("{}", OutputFormatter::format_join_rejected(&e)),
            },
            Command::Leave => {
                let previous = self.store.current();
                self.store.leave().await;
                print!("{}", OutputFormatter::format_left(previous.as_ref()));
            }
            Command::Status => {
                let identity = self.store.identity().await;
                let record = self.store.current();
                print!(
                    "{}",
                    OutputFormatter::format_status(
                        &identity,
                        self.identity.current().is_some(),
                        record.as_ref(),
                        self.preview.status(),
                        self.preview.target(),
                    )
                );
            }
            Command::CanJoin { boss_id } => {
                let allowed = self.store.can_join(&boss_id);
                print!("{}", OutputFormatter::format_can_join(&boss_id, allowed));
            }
            Command::Preview { boss_id, event_id } => {
                let (boss_id, event_id) = match (boss_id, event_id) {
                    (Some(boss_id), Some(event_id)) => (Some(boss_id), Some(event_id)),
                    _ => match self.store.current() {
                        Some(record) => (Some(record.boss_id), Some(record.event_id)),
                        None => (None, None),
                    },
                };
                if boss_id.is_none() || event_id.is_none() {
                    print!("{}", OutputFormatter::format_preview_idle());
                }
                self.preview.activate(boss_id, event_id).await;
            }
            Command::Stop => self.preview.deactivate().await,
            Command::Login { token } => {
                self.preview.set_credential(Some(token.clone()));
                self.identity.login(token);
            }
            Command::Logout => {
                self.preview.set_credential(None);
                self.identity.logout();
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }
}

/// Run the interactive session until the user quits or input ends
pub async fn run_client_session(mut session: Session) -> Result<(), ClientError> {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

    // rustyline blocks, so it gets its own thread
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => {
                let _ = ready_tx.send(Ok(()));
                rl
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    ready_rx
        .await
        .map_err(|_| ClientError::Readline("input thread exited during startup".to_string()))?
        .map_err(ClientError::Readline)?;

    println!("\nType 'help' for the list of commands. Press Ctrl+C to exit.\n");

    let mut join_changes = session.store.subscribe();
    let mut status_changes = session.preview.status_changes();

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                let flow = match parse_command(&line) {
                    Ok(command) => session.execute(command).await,
                    Err(e) => {
                        print!("{}", OutputFormatter::format_error(&e.to_string()));
                        Flow::Continue
                    }
                };
                if flow == Flow::Quit {
                    break;
                }
            }
            changed = join_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let record = join_changes.borrow_and_update().clone();
                print!("{}", OutputFormatter::format_join_changed(record.as_ref()));
                redisplay_prompt();
            }
            change = status_changes.recv() => match change {
                Ok(change) => {
                    print!("{}", OutputFormatter::format_status_change(&change));
                    redisplay_prompt();
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} preview status changes", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.preview.deactivate().await;
    tracing::info!("Client session ended");
    Ok(())
}

/// Redisplay the prompt after printing asynchronous output
fn redisplay_prompt() {
    print!("{}", PROMPT);
    std::io::stdout().flush().ok();
}
