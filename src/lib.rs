//! murmur is a full-screen terminal chat client for OpenAI-compatible APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversation state, the streaming display controller,
//!   affordance coordination (copy, regenerate, listen), request dispatch,
//!   and persistence of chats and configuration.
//! - [`ui`] renders the terminal interface and runs the interactive event loop
//!   that drives user input and display updates.
//! - [`api`] defines the wire payloads for chat, image, and speech requests.
//! - [`cli`] parses arguments and routes to the chat loop or a subcommand.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;
pub mod utils;
