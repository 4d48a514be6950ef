use crate::api::{Backend, BackendError, ChatReply, UploadResponse};
use crate::core::controller::{FeedbackCue, Presenter};
use crate::core::history::{MemorySnapshotStore, DEFAULT_HISTORY_KEY};
use crate::core::message::Sender;
use crate::core::renderer::{DisplayTurn, SourcesView};
use crate::core::session::SessionState;
use crate::ui::chat_loop::ChatSession;
use crate::ui::terminal::TerminalPresenter;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Render(usize),
    ScrollToLatest,
    /// Number of cards in the highlighted view.
    Highlight(usize),
    Pending(bool),
    Feedback(FeedbackCue),
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub events: Vec<PresenterEvent>,
    pub last_render: Vec<(Sender, String)>,
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, turns: &[DisplayTurn<'_>]) {
        self.events.push(PresenterEvent::Render(turns.len()));
        self.last_render = turns
            .iter()
            .map(|turn| (turn.sender, turn.text.to_string()))
            .collect();
    }

    fn scroll_to_latest(&mut self) {
        self.events.push(PresenterEvent::ScrollToLatest);
    }

    fn highlight_evidence(&mut self, view: &SourcesView) {
        self.events.push(PresenterEvent::Highlight(view.cards.len()));
    }

    fn set_pending(&mut self, pending: bool) {
        self.events.push(PresenterEvent::Pending(pending));
    }

    fn feedback(&mut self, cue: FeedbackCue) {
        self.events.push(PresenterEvent::Feedback(cue));
    }
}

/// Replies with canned outcomes in order and records every message asked.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
    uploads: Mutex<VecDeque<Result<UploadResponse, BackendError>>>,
    received: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ChatReply, BackendError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            uploads: Mutex::new(VecDeque::new()),
            received: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_uploads(self, uploads: Vec<Result<UploadResponse, BackendError>>) -> Self {
        *self.uploads.lock().unwrap() = uploads.into();
        self
    }

    /// Holds every reply back, so callers observe the pending state.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn ask(&self, message: &str) -> Result<ChatReply, BackendError> {
        self.received.lock().unwrap().push(message.to_string());
        tokio::time::sleep(self.delay).await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no scripted reply".to_string())))
    }

    async fn upload(&self, _path: &Path) -> Result<UploadResponse, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no scripted upload".to_string())))
    }
}

/// Cloneable in-memory writer for inspecting terminal output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn test_chat_session(storage: MemorySnapshotStore) -> (ChatSession, SharedBuffer) {
    let out = SharedBuffer::default();
    let presenter = TerminalPresenter::new(Box::new(out.clone()) as Box<dyn Write + Send>);
    let state = SessionState::new(Box::new(storage), DEFAULT_HISTORY_KEY);
    (ChatSession::new(state, presenter, false), out)
}
