//! CLI commands

pub mod build;
pub mod channel;
pub mod export;
pub mod info;
pub mod origin;
pub mod resolve;
pub mod search;
pub mod secret;
pub mod upload;
pub mod verify;
