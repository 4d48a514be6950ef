use super::CommandResult;
use crate::ui::chat_loop::ChatSession;

pub type CommandHandler = fn(&mut ChatSession, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    /// Everything after the command name, trimmed.
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "sources",
        usage: "/sources [used|all]",
        help: "Show the sources of the latest answer, optionally changing the filter.",
        handler: super::handle_sources,
    },
    Command {
        name: "source",
        usage: "/source <turn>",
        help: "Jump to the evidence behind a numbered bot answer.",
        handler: super::handle_source,
    },
    Command {
        name: "upload",
        usage: "/upload <file>",
        help: "Upload a .pdf or .txt document to the server's index.",
        handler: super::handle_upload,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Clear the chat history (asks for confirmation).",
        handler: super::handle_clear,
    },
    Command {
        name: "clear-sources",
        usage: "/clear-sources",
        help: "Forget the current sources and the used-source tally.",
        handler: super::handle_clear_sources,
    },
    Command {
        name: "reset",
        usage: "/reset",
        help: "Clear history and sources together.",
        handler: super::handle_reset,
    },
    Command {
        name: "log",
        usage: "/log [file]",
        help: "Start a transcript log, or pause/resume the current one.",
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
