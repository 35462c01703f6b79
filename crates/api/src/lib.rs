//! Notification transports for the watcher.
//!
//! This crate provides HTTP clients for:
//! - Telegram: operational alerts to the internal chat channel
//! - Mail service: margin-call notices to borrowers

mod error;
mod mail;
mod telegram;

#[cfg(test)]
mod test_support;

pub use error::NotifyError;
pub use mail::{MailServiceClient, MarginCallMailer, MarginCallNotice, MarginCallParams};
pub use telegram::{ChatAlerter, TelegramClient};
