//! docchat is a terminal client for document-grounded chat services.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns session state: the persisted conversation, the evidence
//!   registry of retrieved passages, configuration, and the controller that
//!   drives one question/answer cycle at a time.
//! - [`api`] defines the backend wire format and the HTTP client behind the
//!   [`api::Backend`] trait.
//! - [`ui`] draws the display records produced by `core::renderer` and runs
//!   the interactive loop; [`commands`] implements its slash commands.
//! - [`utils`] holds URL helpers and the plain-text transcript log.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
