//! Delivery sinks for remediation events.

pub mod feishu;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::NotifyEvent;

/// A place escalations and patch confirmations are sent to.
///
/// Delivery is one attempt; retries are the caller's business.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// False when the channel has nowhere to deliver to.
    fn enabled(&self) -> bool;

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError>;
}
