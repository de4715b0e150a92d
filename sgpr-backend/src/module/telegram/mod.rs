//! Telegram Bot API frontend
//!
//! Delivers rendered records with `sendMessage` and serves admin commands
//! received through `getUpdates` long polling.

pub mod client;
pub mod command;

pub use client::{TelegramClient, TelegramError};
pub use command::{CommandType, ParsedCommand};
