//! Pure projections from session state to display records.
//!
//! Nothing here holds state or reads rendered output back; presenters get a
//! fresh projection after every change and decide how to draw it.

use crate::core::evidence::{EvidenceRegistry, EvidenceStats, SourceChunk};
use crate::core::message::{ChatTurn, Sender};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

pub const SOURCES_HEADING: &str = "Sources used for this response:";
pub const NO_SOURCES_TEXT: &str = "No relevant source documents found for this response.";

/// Click-through target for a bot turn: the evidence view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceLink {
    pub turn_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTurn<'a> {
    /// 1-based position in the conversation.
    pub number: usize,
    pub sender: Sender,
    pub text: &'a str,
    pub is_error: bool,
    pub evidence: Option<EvidenceLink>,
}

pub fn render_transcript(turns: &[ChatTurn]) -> Vec<DisplayTurn<'_>> {
    turns
        .iter()
        .enumerate()
        .map(|(index, turn)| DisplayTurn {
            number: index + 1,
            sender: turn.sender(),
            text: turn.text(),
            is_error: turn.is_error(),
            evidence: turn.is_bot().then_some(EvidenceLink { turn_index: index }),
        })
        .collect()
}

pub fn sender_label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "You",
        Sender::Bot => "Bot",
    }
}

/// One terminal line per turn; continuation lines are indented under the
/// label.
pub fn format_turn(turn: &DisplayTurn<'_>) -> String {
    let prefix = format!("[{}] {}: ", turn.number, sender_label(turn.sender));
    let indent = " ".repeat(UnicodeWidthStr::width(prefix.as_str()));
    let mut lines = turn.text.lines();
    let mut out = format!("{prefix}{}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCard {
    /// 1-based position in the view.
    pub position: usize,
    pub chunk_id: String,
    pub source_name: String,
    pub content: String,
    pub word_count: u32,
    pub is_paragraph: bool,
    pub relevance: f64,
    pub used: bool,
}

impl SourceCard {
    fn from_chunk(position: usize, chunk: &SourceChunk, used: bool) -> Self {
        Self {
            position,
            chunk_id: chunk.chunk_id.to_string(),
            source_name: chunk.source_name.clone(),
            content: chunk.content.clone(),
            word_count: chunk.word_count,
            is_paragraph: chunk.is_paragraph,
            relevance: chunk.relevance_score,
            used,
        }
    }

    pub fn title_line(&self, preview_width: usize) -> String {
        let label = format!("Chunk {}: ", self.position);
        let budget = preview_width.saturating_sub(UnicodeWidthStr::width(label.as_str()));
        format!("{label}{}", truncate_to_width(&self.content, budget))
    }

    pub fn detail_line(&self) -> String {
        let mut parts = vec![
            self.source_name.clone(),
            format!("relevance {:.2}", self.relevance),
            format!("{} words", self.word_count),
        ];
        if self.is_paragraph {
            parts.push("paragraph".to_string());
        }
        parts.join(" · ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcesView {
    pub cards: Vec<SourceCard>,
    pub stats: EvidenceStats,
    pub used_only: bool,
}

impl SourcesView {
    pub fn heading(&self) -> &'static str {
        if self.cards.is_empty() {
            NO_SOURCES_TEXT
        } else {
            SOURCES_HEADING
        }
    }

    pub fn summary_line(&self) -> String {
        let filter = if self.used_only { " (used only)" } else { "" };
        format!(
            "{} of {} in this answer{filter} · {} used this session",
            self.cards.len(),
            self.stats.total,
            self.stats.used
        )
    }

    pub fn lines(&self, preview_width: usize) -> Vec<String> {
        let mut lines = vec![self.heading().to_string()];
        for card in &self.cards {
            lines.push(card.title_line(preview_width));
            lines.push(format!("    {}", card.detail_line()));
        }
        lines.push(self.summary_line());
        lines
    }
}

pub fn render_sources(registry: &EvidenceRegistry, used_only: bool) -> SourcesView {
    let cards = registry
        .view(used_only)
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            SourceCard::from_chunk(index + 1, chunk, registry.is_used(&chunk.chunk_id))
        })
        .collect();
    SourcesView {
        cards,
        stats: registry.stats(),
        used_only,
    }
}

/// Collapse whitespace and cut on a grapheme boundary so the result fits in
/// `max_width` columns, marking the cut with an ellipsis.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if UnicodeWidthStr::width(collapsed.as_str()) <= max_width {
        return collapsed;
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for grapheme in collapsed.graphemes(true) {
        let width = UnicodeWidthStr::width(grapheme);
        if used + width > max_width - 1 {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}
