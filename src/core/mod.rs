pub mod affordances;
pub mod app;
pub mod attachments;
pub mod capabilities;
pub mod config;
pub mod dispatch;
pub mod history;
pub mod keyring;
pub mod message;
pub mod persona;
pub mod providers;
pub mod sessions;
pub mod speech;
pub mod stream_controller;
