use std::io::Write;

use tracing::debug;

use crate::core::controller::{FeedbackCue, Presenter};
use crate::core::renderer::{format_turn, DisplayTurn, SourcesView};

pub const PREVIEW_WIDTH: usize = 80;
const PENDING_TEXT: &str = "… waiting for an answer";
const CLEARED_TEXT: &str = "Chat history cleared.";
const BELL: &str = "\x07";

/// Line-oriented presenter: new turns are appended to the output as they
/// appear, so "scrolling to the latest" is just a flush.
pub struct TerminalPresenter<W: Write> {
    out: W,
    printed: usize,
    bell: bool,
    pending_on_stderr: bool,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            bell: false,
            pending_on_stderr: false,
        }
    }

    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    /// Keeps the pending indicator out of `out`, for output that is piped.
    pub fn with_pending_on_stderr(mut self) -> Self {
        self.pending_on_stderr = true;
        self
    }

    /// Treats the first `count` turns as already on screen.
    pub fn skip_turns(&mut self, count: usize) {
        self.printed = count;
    }

    /// Out-of-band status line (command results, upload outcomes).
    pub fn notice(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
        self.flush();
    }

    pub fn show_sources(&mut self, view: &SourcesView) {
        let mut block = String::new();
        for line in view.lines(PREVIEW_WIDTH) {
            block.push_str(&line);
            block.push('\n');
        }
        self.write(&block);
        self.flush();
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            debug!(error = %err, "terminal write failed");
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.out.flush() {
            debug!(error = %err, "terminal flush failed");
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render(&mut self, turns: &[DisplayTurn<'_>]) {
        if turns.len() < self.printed {
            if turns.is_empty() {
                self.write(&format!("{CLEARED_TEXT}\n\n"));
            }
            self.printed = 0;
        }
        let mut block = String::new();
        for turn in &turns[self.printed..] {
            block.push_str(&format_turn(turn));
            block.push_str("\n\n");
        }
        self.write(&block);
        self.printed = turns.len();
    }

    fn scroll_to_latest(&mut self) {
        self.flush();
    }

    fn highlight_evidence(&mut self, view: &SourcesView) {
        let mut block = String::from("┌─\n");
        for line in view.lines(PREVIEW_WIDTH - 2) {
            block.push_str("│ ");
            block.push_str(&line);
            block.push('\n');
        }
        block.push_str("└─\n");
        self.write(&block);
        self.flush();
    }

    fn set_pending(&mut self, pending: bool) {
        if !pending {
            return;
        }
        if self.pending_on_stderr {
            eprintln!("{PENDING_TEXT}");
        } else {
            self.write(&format!("{PENDING_TEXT}\n"));
            self.flush();
        }
    }

    fn feedback(&mut self, cue: FeedbackCue) {
        if self.bell {
            debug!(?cue, "bell");
            self.write(BELL);
            self.flush();
        }
    }
}
