//! Slash commands for the interactive chat.
//!
//! Input that is not a known `/command` is sent to the backend as a message.

mod registry;

pub use registry::{all_commands, CommandInvocation};

use std::path::PathBuf;

use crate::api::client::validate_upload_path;
use crate::ui::chat_loop::ChatSession;

pub const CLEAR_PROMPT: &str = "Are you sure you want to clear the chat history? [y/N]";

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    Upload(PathBuf),
    Quit,
}

pub fn process_input(session: &mut ChatSession, input: &str) -> CommandResult {
    if session.take_clear_confirmation() {
        if is_affirmative(input) {
            session.clear_history();
        } else {
            session.notice("Clear cancelled.");
        }
        return CommandResult::Continue;
    }

    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(input.to_string());
    }

    let mut parts = trimmed[1..].splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => {
            (command.handler)(session, CommandInvocation { args })
        }
        None => CommandResult::ProcessAsMessage(input.to_string()),
    }
}

/// Only an explicit yes confirms.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(super) fn handle_help(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    let width = all_commands()
        .iter()
        .map(|command| command.usage.len())
        .max()
        .unwrap_or(0);
    let mut text = String::from("Commands:\n");
    for command in all_commands() {
        text.push_str(&format!("  {:<width$}  {}\n", command.usage, command.help));
    }
    text.push_str(&format!(
        "Transcript log: {}\n",
        session.transcript.status_string()
    ));
    text.push_str("Anything else is sent as a question.");
    session.notice(&text);
    CommandResult::Continue
}

pub(super) fn handle_sources(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    match invocation.args.to_ascii_lowercase().as_str() {
        "" => {}
        "used" => session.controller.set_sources_used_only(true),
        "all" => session.controller.set_sources_used_only(false),
        _ => {
            session.notice("Usage: /sources [used|all]");
            return CommandResult::Continue;
        }
    }
    let view = session.controller.sources_view();
    session.controller.presenter_mut().show_sources(&view);
    CommandResult::Continue
}

pub(super) fn handle_source(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    match invocation.args.parse::<usize>() {
        Ok(number) => {
            if !session.controller.open_evidence_for_turn(number) {
                session.notice(&format!("Turn {number} is not a bot answer."));
            }
        }
        Err(_) => session.notice("Usage: /source <turn>"),
    }
    CommandResult::Continue
}

pub(super) fn handle_upload(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    if invocation.args.is_empty() {
        session.notice("Usage: /upload <file>");
        return CommandResult::Continue;
    }
    let path = PathBuf::from(invocation.args);
    match validate_upload_path(&path) {
        Ok(_) => CommandResult::Upload(path),
        Err(err) => {
            session.notice(&err.user_message());
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_clear(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    session.request_clear_confirmation();
    session.notice(CLEAR_PROMPT);
    CommandResult::Continue
}

pub(super) fn handle_clear_sources(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    session.controller.clear_sources();
    session.notice("Sources cleared.");
    CommandResult::Continue
}

pub(super) fn handle_reset(
    session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    session.reset();
    CommandResult::Continue
}

pub(super) fn handle_log(
    session: &mut ChatSession,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let outcome = if invocation.args.is_empty() {
        session
            .transcript
            .toggle("Logging paused")
            .map_err(|e| format!("Log error: {e}"))
    } else {
        session
            .transcript
            .set_log_file(invocation.args.to_string())
            .map_err(|e| format!("Logfile error: {e}"))
    };
    match outcome {
        Ok(message) | Err(message) => session.notice(&message),
    }
    CommandResult::Continue
}

pub(super) fn handle_quit(
    _session: &mut ChatSession,
    _invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::Quit
}

#[cfg(test)]
mod tests;
