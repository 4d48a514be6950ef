//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod ask;

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::{Backend, HttpBackend};
use crate::cli::ask::run_ask;
use crate::core::config::{path_display, Config};
use crate::core::history::FileSnapshotStore;
use crate::core::renderer::{format_turn, render_transcript};
use crate::core::session::SessionState;
use crate::ui::chat_loop::{run_chat, ChatSession, TerminalOut};
use crate::ui::terminal::TerminalPresenter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal client for document-grounded chat services")]
#[command(
    long_about = "docchat talks to a retrieval-augmented chat service: every question is \
answered from the documents uploaded to the server, and the passages behind each answer \
are kept alongside the conversation. The conversation is saved locally and restored on the \
next start.\n\n\
Commands inside the chat:\n\
  /help             Show all commands\n\
  /sources [used]   Show the sources of the latest answer\n\
  /source <turn>    Jump to the evidence behind a numbered answer\n\
  /upload <file>    Upload a .pdf or .txt document\n\
  /clear            Clear the chat history\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume\n\n\
Environment Variables:\n\
  RUST_LOG          Diagnostic log filter (default: docchat=warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the chat service
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Storage key the conversation is saved under
    #[arg(short = 'k', long, global = true, value_name = "KEY")]
    pub history_key: Option<String>,

    /// Directory holding saved conversations
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Use this config file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Ask a single question and print the answer with its sources
    Ask {
        /// Question to ask (multiple words are joined)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Upload a .pdf or .txt document to the service's index
    Upload {
        /// File to upload
        path: PathBuf,
    },
    /// Print the saved conversation
    History {
        /// Delete the saved conversation instead
        #[arg(long)]
        clear: bool,
    },
    /// Show the current configuration
    Config,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        value: String,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

impl Args {
    /// Command-line flags win over the config file.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.backend_url = Some(url.clone());
        }
        if let Some(key) = &self.history_key {
            config.history_key = Some(key.clone());
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(log) = &self.log {
            config.log_file = Some(log.clone());
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

/// Diagnostics go to stderr so they never interleave with answers on stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "docchat=warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config_path = Config::resolve_path(args.config.as_deref())?;
    let mut config = Config::load_from_path(&config_path)?;
    debug!(path = %path_display(&config_path), "configuration loaded");

    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Config => {
            println!("Configuration ({}):", path_display(&config_path));
            for (key, value) in config.entries() {
                println!("  {key}: {value}");
            }
            Ok(())
        }
        Commands::Set { key, value } => {
            if let Err(e) = config.set_value(key, value) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            config.save_to_path(&config_path)?;
            println!("✅ Set {key} to: {}", value.trim());
            Ok(())
        }
        Commands::Unset { key } => {
            if let Err(e) = config.unset_value(key) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            config.save_to_path(&config_path)?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::History { clear } => {
            args.apply_overrides(&mut config);
            let mut session = open_session(&config)?;
            if *clear {
                session.clear_history()?;
                println!("✅ Chat history cleared");
            } else {
                let turns = session.restore();
                if turns.is_empty() {
                    println!("No saved conversation.");
                }
                for turn in render_transcript(turns) {
                    println!("{}\n", format_turn(&turn));
                }
            }
            Ok(())
        }
        Commands::Upload { path } => {
            args.apply_overrides(&mut config);
            let backend = build_backend(&config)?;
            match backend.upload(path).await {
                Ok(response) => {
                    println!("✅ {}", response.summary());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("❌ {}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Ask { prompt } => {
            args.apply_overrides(&mut config);
            let backend = build_backend(&config)?;
            let session = open_session(&config)?;
            run_ask(prompt.clone(), session, &backend, config.sources_used_only()).await
        }
        Commands::Chat => {
            args.apply_overrides(&mut config);
            let backend = Arc::new(build_backend(&config)?);
            info!(
                chat = %backend.chat_url(),
                upload = %backend.upload_url(),
                "starting chat"
            );

            let out: TerminalOut = Box::new(io::stdout());
            let presenter = TerminalPresenter::new(out).with_bell(config.bell());
            let mut session =
                ChatSession::new(open_session(&config)?, presenter, config.sources_used_only());
            if let Some(log_file) = config.log_file.clone() {
                match session.transcript.set_log_file(log_file) {
                    Ok(message) => session.notice(&message),
                    Err(e) => session.notice(&format!("Logfile error: {e}")),
                }
            }
            session.restore();
            let input = BufReader::new(tokio::io::stdin());
            run_chat(&mut session, backend, input).await
        }
    }
}

fn open_session(config: &Config) -> Result<SessionState, Box<dyn Error>> {
    let store = FileSnapshotStore::new(config.data_dir()?);
    debug!(
        dir = %path_display(store.dir()),
        key = %config.history_key(),
        "opening history"
    );
    Ok(SessionState::new(Box::new(store), config.history_key()))
}

fn build_backend(config: &Config) -> Result<HttpBackend, Box<dyn Error>> {
    let client = HttpBackend::build_client(config.request_timeout())?;
    Ok(HttpBackend::new(
        client,
        config.backend_url(),
        config.chat_endpoint(),
        config.upload_endpoint(),
    ))
}
