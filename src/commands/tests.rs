use super::*;
use crate::api::ChatReply;
use crate::core::evidence::SourceChunk;
use crate::core::history::{MemorySnapshotStore, DEFAULT_HISTORY_KEY};
use crate::core::renderer::{NO_SOURCES_TEXT, SOURCES_HEADING};
use crate::utils::test_utils::{test_chat_session, SharedBuffer};

fn answered_session() -> (ChatSession, SharedBuffer, MemorySnapshotStore) {
    let storage = MemorySnapshotStore::new();
    let (mut session, out) = test_chat_session(storage.clone());
    let (id, _) = session.submit("What is X?").unwrap();
    let sources = vec![
        SourceChunk::new(3_u64, "doc.pdf", "alpha passage").with_relevance(0.91),
        SourceChunk::new(4_u64, "doc.pdf", "beta passage").with_relevance(0.42),
    ];
    session.complete(id, Ok(ChatReply::new("X is Y.").with_sources(sources)));
    (session, out, storage)
}

#[test]
fn plain_text_and_unknown_commands_are_messages() {
    let (mut session, _out) = test_chat_session(MemorySnapshotStore::new());
    assert_eq!(
        process_input(&mut session, "What is X?"),
        CommandResult::ProcessAsMessage("What is X?".to_string())
    );
    assert_eq!(
        process_input(&mut session, "/etc/hosts is a file"),
        CommandResult::ProcessAsMessage("/etc/hosts is a file".to_string())
    );
    assert_eq!(
        process_input(&mut session, "/"),
        CommandResult::ProcessAsMessage("/".to_string())
    );
}

#[test]
fn quit_and_help() {
    let (mut session, out) = test_chat_session(MemorySnapshotStore::new());
    assert_eq!(process_input(&mut session, "/quit"), CommandResult::Quit);
    assert_eq!(process_input(&mut session, "/HELP"), CommandResult::Continue);
    for command in all_commands() {
        assert!(out.contents().contains(command.usage));
    }
    assert!(out.contents().contains("Transcript log: disabled"));
}

#[test]
fn clear_needs_explicit_confirmation() {
    let (mut session, out, storage) = answered_session();

    assert_eq!(process_input(&mut session, "/clear"), CommandResult::Continue);
    assert!(out.contents().contains(CLEAR_PROMPT));
    assert_eq!(process_input(&mut session, "no"), CommandResult::Continue);
    assert_eq!(session.controller.session().conversation().len(), 2);
    assert!(out.contents().contains("Clear cancelled."));

    process_input(&mut session, "/clear");
    process_input(&mut session, " Yes ");
    assert!(session.controller.session().conversation().is_empty());
    assert!(storage.get(DEFAULT_HISTORY_KEY).is_none());
    assert_eq!(
        session.controller.session().evidence().current_batch().len(),
        2
    );

    // The confirmation is consumed; the next line is an ordinary message.
    assert_eq!(
        process_input(&mut session, "y"),
        CommandResult::ProcessAsMessage("y".to_string())
    );
}

#[test]
fn affirmative_answers() {
    assert!(is_affirmative("y"));
    assert!(is_affirmative("YES"));
    assert!(!is_affirmative(""));
    assert!(!is_affirmative("yep"));
    assert!(!is_affirmative("n"));
}

#[test]
fn clear_sources_keeps_history() {
    let (mut session, _out, _storage) = answered_session();
    process_input(&mut session, "/clear-sources");

    assert!(session.controller.session().evidence().is_empty());
    assert_eq!(session.controller.session().conversation().len(), 2);
}

#[test]
fn reset_clears_everything() {
    let (mut session, _out, storage) = answered_session();
    process_input(&mut session, "/reset");

    assert!(session.controller.session().evidence().is_empty());
    assert!(session.controller.session().conversation().is_empty());
    assert!(storage.get(DEFAULT_HISTORY_KEY).is_none());
}

#[test]
fn sources_command_prints_and_switches_filter() {
    let (mut session, out, _storage) = answered_session();

    process_input(&mut session, "/sources");
    let text = out.contents();
    assert!(text.contains(SOURCES_HEADING));
    assert!(text.contains("Chunk 1: alpha passage"));
    assert!(text.contains("Chunk 2: beta passage"));

    process_input(&mut session, "/sources used");
    assert!(session.controller.sources_used_only());
    process_input(&mut session, "/sources all");
    assert!(!session.controller.sources_used_only());

    process_input(&mut session, "/sources newest");
    assert!(out.contents().contains("Usage: /sources [used|all]"));

    process_input(&mut session, "/clear-sources");
    process_input(&mut session, "/sources");
    assert!(out.contents().contains(NO_SOURCES_TEXT));
}

#[test]
fn source_command_targets_bot_turns() {
    let (mut session, out, _storage) = answered_session();

    process_input(&mut session, "/source 2");
    assert!(out.contents().contains("│ Chunk 1: alpha passage"));

    process_input(&mut session, "/source 1");
    assert!(out.contents().contains("Turn 1 is not a bot answer."));

    process_input(&mut session, "/source two");
    assert!(out.contents().contains("Usage: /source <turn>"));
}

#[test]
fn upload_checks_file_type_before_sending() {
    let (mut session, out) = test_chat_session(MemorySnapshotStore::new());

    assert_eq!(
        process_input(&mut session, "/upload notes.docx"),
        CommandResult::Continue
    );
    assert!(out.contents().contains("Unsupported file type."));

    assert_eq!(
        process_input(&mut session, "/upload papers/Report.PDF"),
        CommandResult::Upload(PathBuf::from("papers/Report.PDF"))
    );

    assert_eq!(process_input(&mut session, "/upload"), CommandResult::Continue);
    assert!(out.contents().contains("Usage: /upload <file>"));
}

#[test]
fn log_command_enables_and_toggles() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("session.log");
    let (mut session, out) = test_chat_session(MemorySnapshotStore::new());

    process_input(&mut session, "/log");
    assert!(out.contents().contains("Log error: No log file specified"));

    process_input(&mut session, &format!("/log {}", path.display()));
    assert!(session.transcript.is_active());
    assert!(out.contents().contains("Logging enabled to:"));

    process_input(&mut session, "/log");
    assert!(!session.transcript.is_active());
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .contains("## Logging paused"));
}

#[test]
fn log_path_may_contain_spaces() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("my chat log.txt");
    let (mut session, out) = test_chat_session(MemorySnapshotStore::new());

    process_input(&mut session, &format!("/log {}", path.display()));
    assert!(session.transcript.is_active());
    assert!(path.exists());

    process_input(&mut session, "/help");
    assert!(out
        .contents()
        .contains("Transcript log: active (my chat log.txt)"));
}
