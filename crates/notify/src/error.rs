//! Delivery failures.

use thiserror::Error;

/// Why a channel could not deliver an event.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Webhook could not be reached
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with something other than 200
    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No webhook URL for this channel
    #[error("{0} channel has no webhook configured")]
    NotConfigured(String),
}
