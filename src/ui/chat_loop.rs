//! Interactive line-based chat.
//!
//! Backend calls run on spawned tasks and report back over channels, so the
//! loop keeps reading input (and rejecting overlapping questions) while an
//! answer is outstanding.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{Backend, BackendError, ChatReply, UploadResponse};
use crate::commands::{process_input, CommandResult};
use crate::core::controller::{ChatController, FeedbackCue, Presenter, SubmitError};
use crate::core::session::SessionState;
use crate::ui::terminal::TerminalPresenter;
use crate::utils::logging::TranscriptLog;

pub type TerminalOut = Box<dyn Write + Send>;

/// Everything a running interactive chat owns besides its channels.
pub struct ChatSession {
    pub controller: ChatController<TerminalPresenter<TerminalOut>>,
    pub transcript: TranscriptLog,
    logged: usize,
    confirming_clear: bool,
}

impl ChatSession {
    pub fn new(
        session: SessionState,
        presenter: TerminalPresenter<TerminalOut>,
        sources_used_only: bool,
    ) -> Self {
        Self {
            controller: ChatController::new(session, presenter)
                .with_sources_used_only(sources_used_only),
            transcript: TranscriptLog::new(),
            logged: 0,
            confirming_clear: false,
        }
    }

    /// Draws the persisted conversation. Restored turns are not re-logged.
    pub fn restore(&mut self) -> usize {
        let restored = self.controller.restore();
        self.logged = restored;
        restored
    }

    pub fn notice(&mut self, text: &str) {
        self.controller.presenter_mut().notice(text);
    }

    pub fn request_clear_confirmation(&mut self) {
        self.confirming_clear = true;
    }

    /// Returns whether a clear confirmation was outstanding, and consumes it.
    pub fn take_clear_confirmation(&mut self) -> bool {
        std::mem::take(&mut self.confirming_clear)
    }

    pub fn clear_history(&mut self) {
        if let Err(err) = self.controller.clear_history() {
            warn!(error = %err, "failed to remove stored history");
            self.notice(&format!("❌ {err}"));
        }
        self.sync_transcript();
    }

    pub fn reset(&mut self) {
        if let Err(err) = self.controller.reset() {
            warn!(error = %err, "failed to remove stored history");
            self.notice(&format!("❌ {err}"));
        }
        self.sync_transcript();
        self.notice("Session reset.");
    }

    pub fn submit(&mut self, message: &str) -> Option<(u64, String)> {
        let pending = match self.controller.begin_send(message) {
            Ok(request) => Some((request.id, request.message)),
            Err(SubmitError::Busy) => {
                self.notice(&SubmitError::Busy.to_string());
                None
            }
            Err(SubmitError::Empty) => None,
        };
        self.sync_transcript();
        pending
    }

    pub fn complete(&mut self, request_id: u64, outcome: Result<ChatReply, BackendError>) {
        if self.controller.complete(request_id, outcome) {
            self.sync_transcript();
        }
    }

    pub fn finish_upload(&mut self, outcome: Result<UploadResponse, BackendError>) {
        match outcome {
            Ok(response) => {
                info!(summary = %response.summary(), "upload finished");
                self.notice(&response.summary());
                self.controller.presenter_mut().feedback(FeedbackCue::Upload);
            }
            Err(err) => {
                warn!(error = %err, "upload failed");
                self.notice(&err.user_message());
            }
        }
    }

    /// Appends turns added since the last sync; rewrites the log when the
    /// conversation shrank.
    fn sync_transcript(&mut self) {
        let turns = self.controller.session().conversation().turns();
        let result = if turns.len() < self.logged {
            self.transcript.rewrite(turns)
        } else {
            turns[self.logged..]
                .iter()
                .try_for_each(|turn| self.transcript.log_turn(turn))
        };
        if let Err(err) = result {
            warn!(error = %err, "transcript log write failed");
        }
        self.logged = turns.len();
    }
}

enum LoopEvent {
    Input(std::io::Result<usize>),
    Reply(u64, Result<ChatReply, BackendError>),
    Upload(Result<UploadResponse, BackendError>),
}

/// Runs the interactive session until input ends or `/quit`.
///
/// Leaving does not abandon work in flight: an outstanding answer is still
/// recorded, and upload outcomes are still reported, before this returns.
pub async fn run_chat<B, R>(
    session: &mut ChatSession,
    backend: Arc<B>,
    mut input: R,
) -> Result<(), Box<dyn Error>>
where
    B: Backend + 'static,
    R: AsyncBufRead + Unpin,
{
    let (reply_tx, mut reply_rx) =
        mpsc::unbounded_channel::<(u64, Result<ChatReply, BackendError>)>();
    let (upload_tx, mut upload_rx) =
        mpsc::unbounded_channel::<Result<UploadResponse, BackendError>>();
    let mut uploading = 0usize;
    // Survives cancelled reads, so a partial line is never lost.
    let mut buf = Vec::new();

    session.notice("Type a question, or /help for commands.");

    loop {
        let event = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => LoopEvent::Input(read),
            Some((request_id, outcome)) = reply_rx.recv() => LoopEvent::Reply(request_id, outcome),
            Some(outcome) = upload_rx.recv() => LoopEvent::Upload(outcome),
        };

        match event {
            LoopEvent::Input(Err(err)) => {
                warn!(error = %err, "reading input failed");
                break;
            }
            LoopEvent::Input(Ok(0)) if buf.is_empty() => {
                debug!("input closed");
                break;
            }
            LoopEvent::Input(Ok(_)) => {
                let line = decode_line(&buf);
                buf.clear();
                match process_input(session, &line) {
                    CommandResult::Continue => {}
                    CommandResult::Quit => break,
                    CommandResult::ProcessAsMessage(message) => {
                        if let Some((request_id, message)) = session.submit(&message) {
                            spawn_ask(backend.clone(), request_id, message, reply_tx.clone());
                        }
                    }
                    CommandResult::Upload(path) => {
                        session.notice(&format!("Uploading {}…", path.display()));
                        uploading += 1;
                        spawn_upload(backend.clone(), path, upload_tx.clone());
                    }
                }
            }
            LoopEvent::Reply(request_id, outcome) => session.complete(request_id, outcome),
            LoopEvent::Upload(outcome) => {
                uploading = uploading.saturating_sub(1);
                session.finish_upload(outcome);
            }
        }
    }

    while session.controller.is_pending() || uploading > 0 {
        debug!(
            pending = session.controller.is_pending(),
            uploading, "waiting for outstanding work"
        );
        tokio::select! {
            Some((request_id, outcome)) = reply_rx.recv() => {
                session.complete(request_id, outcome);
            }
            Some(outcome) = upload_rx.recv() => {
                uploading = uploading.saturating_sub(1);
                session.finish_upload(outcome);
            }
        }
    }

    Ok(())
}

/// One input line without its terminator. Invalid UTF-8 is replaced rather
/// than ending the session.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if std::str::from_utf8(line).is_err() {
        warn!(bytes = line.len(), "input line is not valid UTF-8");
    }
    String::from_utf8_lossy(line).into_owned()
}

fn spawn_ask<B: Backend + 'static>(
    backend: Arc<B>,
    request_id: u64,
    message: String,
    tx: mpsc::UnboundedSender<(u64, Result<ChatReply, BackendError>)>,
) {
    tokio::spawn(async move {
        let outcome = backend.ask(&message).await;
        if tx.send((request_id, outcome)).is_err() {
            debug!(request_id, "chat loop gone before answer arrived");
        }
    });
}

fn spawn_upload<B: Backend + 'static>(
    backend: Arc<B>,
    path: PathBuf,
    tx: mpsc::UnboundedSender<Result<UploadResponse, BackendError>>,
) {
    tokio::spawn(async move {
        let outcome = backend.upload(&path).await;
        if tx.send(outcome).is_err() {
            debug!("chat loop gone before upload finished");
        }
    });
}
