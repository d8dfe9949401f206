//! Notification channels for remediation events.
//!
//! Channels are plain message sinks: the caller decides which channel an
//! event goes to and whether a delivery failure matters.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{FeishuChannel, NotifyChannel, NotifyEvent};
//!
//! # async fn run() -> Result<(), notify::ChannelError> {
//! let channel = FeishuChannel::new("https://www.feishu.cn/flow/api/trigger-webhook/abc");
//! channel
//!     .send(&NotifyEvent::escalation(
//!         "payments",
//!         "api",
//!         "[feishu] database unreachable",
//!     ))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`FeishuChannel`] implements Feishu flow webhook notifications

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::feishu::FeishuChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::NotifyEvent;
