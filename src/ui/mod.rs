//! Terminal presentation for chat sessions.
//!
//! Display records come from [`crate::core::renderer`]; this layer only draws
//! them.
//!
//! - [`terminal`]: the line-oriented [`crate::core::controller::Presenter`].
//! - [`chat_loop`]: the interactive loop dispatching input to
//!   [`crate::commands`] and backend calls to background tasks.
//!
//! Ownership boundary: this layer presents and captures interaction state, while
//! [`crate::core`] owns domain logic.

pub mod chat_loop;
pub mod terminal;
