pub mod config;
pub mod controller;
pub mod evidence;
pub mod history;
pub mod message;
pub mod renderer;
pub mod session;
