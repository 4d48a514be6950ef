//! Send/receive cycle for one chat session.
//!
//! A cycle is split in two so the caller can run the backend request
//! wherever it likes: [`ChatController::begin_send`] records the user turn and
//! moves to `Pending`, and [`ChatController::complete`] applies the outcome
//! and returns to `Idle`. Only one request may be pending at a time.

use std::error::Error as StdError;
use std::fmt;

use tracing::{debug, warn};

use crate::api::{Backend, BackendError, ChatReply};
use crate::core::history::StorageError;
use crate::core::message::ChatTurn;
use crate::core::renderer::{
    render_sources, render_transcript, DisplayTurn, EvidenceLink, SourcesView,
};
use crate::core::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCue {
    Submit,
    Receive,
    Upload,
    Clear,
}

/// Presentation capabilities the controller drives. Every call is
/// fire-and-forget.
pub trait Presenter {
    fn render(&mut self, turns: &[DisplayTurn<'_>]);

    /// Must be safe to call redundantly.
    fn scroll_to_latest(&mut self);

    fn highlight_evidence(&mut self, view: &SourcesView);

    fn set_pending(&mut self, pending: bool);

    fn feedback(&mut self, cue: FeedbackCue);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending { request_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: u64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Blank input; nothing happened.
    Empty,
    /// A request is already pending; nothing happened.
    Busy,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty => write!(f, "Message is empty"),
            SubmitError::Busy => write!(f, "Still waiting for the previous answer"),
        }
    }
}

impl StdError for SubmitError {}

pub struct ChatController<P: Presenter> {
    session: SessionState,
    presenter: P,
    phase: Phase,
    next_request_id: u64,
    sources_used_only: bool,
}

impl<P: Presenter> ChatController<P> {
    pub fn new(session: SessionState, presenter: P) -> Self {
        Self {
            session,
            presenter,
            phase: Phase::Idle,
            next_request_id: 1,
            sources_used_only: false,
        }
    }

    pub fn with_sources_used_only(mut self, used_only: bool) -> Self {
        self.sources_used_only = used_only;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    /// Loads the persisted conversation and draws it. Nothing is written back.
    pub fn restore(&mut self) -> usize {
        let restored = self.session.restore().len();
        self.refresh();
        restored
    }

    pub fn begin_send(&mut self, input: &str) -> Result<PendingRequest, SubmitError> {
        let turn = ChatTurn::user(input).ok_or(SubmitError::Empty)?;
        if self.is_pending() {
            return Err(SubmitError::Busy);
        }

        let message = turn.text().to_string();
        self.append(turn);

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.phase = Phase::Pending { request_id: id };
        debug!(request_id = id, "chat request pending");

        self.refresh();
        self.presenter.feedback(FeedbackCue::Submit);
        self.presenter.set_pending(true);
        Ok(PendingRequest { id, message })
    }

    /// Applies the backend outcome for `request_id`. Outcomes for anything
    /// other than the pending request are ignored and `false` is returned.
    pub fn complete(
        &mut self,
        request_id: u64,
        outcome: Result<ChatReply, BackendError>,
    ) -> bool {
        match self.phase {
            Phase::Pending { request_id: pending } if pending == request_id => {}
            phase => {
                debug!(request_id, ?phase, "ignoring stale chat response");
                return false;
            }
        }

        self.phase = Phase::Idle;
        self.presenter.set_pending(false);

        match outcome {
            Ok(ChatReply { answer, sources }) => {
                self.append(ChatTurn::bot(answer));
                if !sources.is_empty() {
                    self.session.evidence_mut().set_current_batch(sources);
                }
                self.refresh();
                self.presenter.feedback(FeedbackCue::Receive);
            }
            Err(err) => {
                warn!(request_id, error = %err, "chat request failed");
                self.append(ChatTurn::bot_error(&err.user_message()));
                self.refresh();
            }
        }
        true
    }

    /// Runs a whole cycle in place.
    pub async fn send(&mut self, backend: &dyn Backend, input: &str) -> Result<(), SubmitError> {
        let request = self.begin_send(input)?;
        let outcome = backend.ask(&request.message).await;
        self.complete(request.id, outcome);
        Ok(())
    }

    pub fn sources_used_only(&self) -> bool {
        self.sources_used_only
    }

    pub fn set_sources_used_only(&mut self, used_only: bool) {
        self.sources_used_only = used_only;
    }

    pub fn sources_view(&self) -> SourcesView {
        render_sources(self.session.evidence(), self.sources_used_only)
    }

    /// Click-through from a rendered bot turn to the evidence display.
    pub fn open_evidence(&mut self, link: EvidenceLink) -> bool {
        let is_bot = self
            .session
            .conversation()
            .turns()
            .get(link.turn_index)
            .map(ChatTurn::is_bot)
            .unwrap_or(false);
        if !is_bot {
            return false;
        }
        let view = self.sources_view();
        self.presenter.highlight_evidence(&view);
        true
    }

    /// Same as [`Self::open_evidence`], addressed by 1-based turn number.
    pub fn open_evidence_for_turn(&mut self, number: usize) -> bool {
        match number.checked_sub(1) {
            Some(turn_index) => self.open_evidence(EvidenceLink { turn_index }),
            None => false,
        }
    }

    /// Clears the conversation and its snapshot. Sources are untouched.
    pub fn clear_history(&mut self) -> Result<(), StorageError> {
        let result = self.session.clear_history();
        self.refresh();
        self.presenter.feedback(FeedbackCue::Clear);
        result
    }

    pub fn clear_sources(&mut self) {
        self.session.clear_sources();
    }

    /// Clears conversation, snapshot and evidence together. A pending
    /// request is not cancelled; its answer lands in the fresh conversation.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        let result = self.session.reset();
        self.refresh();
        self.presenter.feedback(FeedbackCue::Clear);
        result
    }

    fn append(&mut self, turn: ChatTurn) {
        if let Err(err) = self.session.conversation_mut().append(turn) {
            warn!(error = %err, "failed to persist chat history");
        }
    }

    fn refresh(&mut self) {
        let turns = render_transcript(self.session.conversation().turns());
        self.presenter.render(&turns);
        self.presenter.scroll_to_latest();
    }
}
