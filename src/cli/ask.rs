//! One-shot "ask" command

use std::error::Error;
use std::io;

use crate::api::HttpBackend;
use crate::core::controller::ChatController;
use crate::core::session::SessionState;
use crate::ui::terminal::TerminalPresenter;

/// Runs one send cycle against the persisted session, then prints the
/// sources of the answer.
pub async fn run_ask(
    prompt: Vec<String>,
    mut session: SessionState,
    backend: &HttpBackend,
    sources_used_only: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: docchat ask <prompt>");
        std::process::exit(1);
    }

    // Earlier turns are loaded so the new ones are appended, but not printed.
    let earlier = session.restore().len();
    let mut presenter = TerminalPresenter::new(io::stdout()).with_pending_on_stderr();
    presenter.skip_turns(earlier);
    let mut controller =
        ChatController::new(session, presenter).with_sources_used_only(sources_used_only);

    controller.send(backend, &prompt).await?;

    let last_is_error = controller
        .session()
        .conversation()
        .turns()
        .last()
        .map(|turn| turn.is_error())
        .unwrap_or(false);
    if last_is_error {
        std::process::exit(1);
    }

    let view = controller.sources_view();
    controller.presenter_mut().show_sources(&view);
    Ok(())
}
