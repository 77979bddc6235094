//! Terminal UI layer for interactive chat sessions.
//!
//! The UI module owns rendering, layout, and loop control for the text user
//! interface.
//!
//! Key submodules include:
//! - [`chat_loop`]: the main interaction loop that maps input to
//!   [`crate::core::app::AppAction`]s and runs streams and speech in the
//!   background.
//! - [`render`] and [`markdown`]: the streaming and final renditions of a
//!   response.
//! - [`transcript`], [`layout`], and [`renderer`]: view composition and frame
//!   output.
//! - [`dialog`], [`settings`], [`personas`], [`sidebar`], and
//!   [`notifications`]: overlays and side panels.
//!
//! Ownership boundary: this layer presents and captures interaction state, while
//! [`crate::core`] owns domain logic and backend coordination.

pub mod chat_loop;
pub mod dialog;
pub mod layout;
pub mod markdown;
pub mod notifications;
pub mod personas;
pub mod render;
pub mod renderer;
pub mod settings;
pub mod sidebar;
pub mod theme;
pub mod transcript;
pub mod welcome;
