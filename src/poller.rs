//! The polling loop.
//!
//! [`Poller`] queries the stores over and over, forwards every listing that
//! differs from the last one sent to a [`Notifier`], and reminds the operator
//! of the orders waiting for pickup. Pacing inside the pipeline spaces the
//! iterations; the loop itself never sleeps.

use std::fmt::Write as _;

use thiserror::Error;

use crate::clients::{ApiClient, QueryError};
use crate::models::{collection_changed, Store};

/// Error returned by a [`Notifier`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The message could not be written.
    #[error("Cannot write notification: {0}")]
    Io(#[from] std::io::Error),

    /// The channel refused the message.
    #[error("Notification rejected: {reason}")]
    Rejected {
        /// Why the message was refused.
        reason: String,
    },
}

/// A channel receiving store listings.
pub trait Notifier: Send {
    /// Delivers `message`, one line per store.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be delivered.
    fn notify(&mut self, message: &str) -> Result<(), NotifyError>;
}

/// Notifier writing listings to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str) -> Result<(), NotifyError> {
        for line in message.lines() {
            tracing::info!("{}", line);
        }
        Ok(())
    }
}

/// Formats a listing, one store per line.
#[must_use]
pub fn stores_message(stores: &[Store]) -> String {
    let mut message = String::new();
    for store in stores {
        // Writing to a String cannot fail.
        let _ = writeln!(message, "{store}");
    }
    message
}

/// Drives an [`ApiClient`] until shutdown is requested.
#[derive(Debug)]
pub struct Poller<N> {
    client: ApiClient,
    notifier: N,
    last_sent: Vec<Store>,
}

impl<N: Notifier> Poller<N> {
    /// Creates a poller.
    #[must_use]
    pub const fn new(client: ApiClient, notifier: N) -> Self {
        Self {
            client,
            notifier,
            last_sent: Vec::new(),
        }
    }

    /// Returns the client.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Returns the notifier.
    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Returns the last listing sent to the notifier.
    #[must_use]
    pub fn last_sent(&self) -> &[Store] {
        &self.last_sent
    }

    /// Polls until the client's cancellation token fires, then writes the
    /// session snapshots.
    ///
    /// A shutdown request met in the middle of an iteration ends the loop
    /// cleanly.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueryError`] that is not caused by shutdown.
    pub async fn run(&mut self) -> Result<(), QueryError> {
        let cancel = self.client.cancellation_token().clone();
        tracing::info!(
            "starting too good to go ant for {} account(s)",
            self.client.config().accounts().len()
        );

        let mut result = Ok(());
        while !cancel.is_cancelled() {
            if let Err(e) = self.poll_once().await {
                if !e.is_cancelled() {
                    result = Err(e);
                }
                break;
            }
        }

        if let Err(e) = self.client.close() {
            tracing::warn!("cannot write session snapshots: {}", e);
        }
        tracing::info!("exiting too good to go ant");
        result
    }

    /// Runs one iteration: stores, then open orders.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if either query fails.
    pub async fn poll_once(&mut self) -> Result<(), QueryError> {
        let stores = self.client.list_stores().await?;
        if !stores.is_empty() && collection_changed(&self.last_sent, &stores) {
            if let Err(e) = self.notifier.notify(&stores_message(&stores)) {
                tracing::warn!("{}", e);
            }
            self.last_sent = stores;
        }

        self.client.list_open_orders().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    #[test]
    fn test_stores_message_has_one_line_per_store() {
        let stores = vec![
            Store {
                id: "1".to_string(),
                name: "Bakery".to_string(),
                rating: 4.5,
                price: Price::new(399, 2, "EUR"),
                available_bags: 2,
            },
            Store {
                id: "2".to_string(),
                name: "Grocery".to_string(),
                rating: 0.0,
                price: Price::new(500, 2, "EUR"),
                available_bags: 1,
            },
        ];
        let message = stores_message(&stores);
        assert_eq!(
            message,
            "Bakery, rated 4.5, price 3.99 EUR, 2 bag(s) available\n\
             Grocery, rated 0, price 5 EUR, 1 bag(s) available\n"
        );
    }

    #[test]
    fn test_log_notifier_accepts_everything() {
        let mut notifier = LogNotifier;
        notifier.notify("a\nb").unwrap();
        notifier.notify("").unwrap();
    }
}
