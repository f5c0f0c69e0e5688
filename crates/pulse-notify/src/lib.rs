//! pulse-notify: alert delivery for the Pulse monitor.
//!
//! Delivery is best-effort. A [`Notifier`] never fails its caller: it
//! retries a fixed number of times, logs each failure and then drops the
//! message, reporting what happened as a [`Delivery`].

pub mod error;
pub mod slack;

use async_trait::async_trait;

pub use error::NotifyError;
pub use slack::SlackNotifier;

/// Outcome of a best-effort delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    Dropped { attempts: u32 },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}

/// Sends a text alert to a single preconfigured channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Delivery;
}
