use anyhow::Result;
use chrono::NaiveDate;
use sentinel_core::{Watch, WatchId};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{WatchCommand, WatchStatus};

/// Cloneable handle to one watch actor's mailbox.
#[derive(Clone, Debug)]
pub struct WatchHandle {
    watch_id: WatchId,
    tx: mpsc::Sender<WatchCommand>,
}

impl WatchHandle {
    #[must_use]
    pub const fn new(watch_id: WatchId, tx: mpsc::Sender<WatchCommand>) -> Self {
        Self { watch_id, tx }
    }

    #[must_use]
    pub const fn watch_id(&self) -> &WatchId {
        &self.watch_id
    }

    /// Resumes evaluation for the watch.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn enable(&self) -> Result<()> {
        self.tx.send(WatchCommand::Enable).await?;
        Ok(())
    }

    /// Suspends evaluation for the watch.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn disable(&self) -> Result<()> {
        self.tx.send(WatchCommand::Disable).await?;
        Ok(())
    }

    /// Flips auto-trading without touching `enabled`.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn set_auto_trade(&self, auto_trade: bool) -> Result<()> {
        self.tx.send(WatchCommand::SetAutoTrade(auto_trade)).await?;
        Ok(())
    }

    /// Replaces the watch configuration.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn update_config(&self, watch: Watch) -> Result<()> {
        self.tx
            .send(WatchCommand::UpdateConfig(Box::new(watch)))
            .await?;
        Ok(())
    }

    /// Forces a triggered watch back to watching.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn reset_signal(&self) -> Result<()> {
        self.tx.send(WatchCommand::ResetSignal).await?;
        Ok(())
    }

    /// Re-fetches the option ladder at the current indicator value.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn refilter(&self) -> Result<()> {
        self.tx.send(WatchCommand::Refilter).await?;
        Ok(())
    }

    /// Re-quotes cached contracts; `None` refreshes every expiry.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn refresh(&self, expiry: Option<NaiveDate>) -> Result<()> {
        self.tx.send(WatchCommand::Refresh { expiry }).await?;
        Ok(())
    }

    /// Switches which expiry's contracts the ladder exposes.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn select_expiry(&self, expiry: NaiveDate) -> Result<()> {
        self.tx.send(WatchCommand::SelectExpiry(expiry)).await?;
        Ok(())
    }

    /// Submits the configured legs for a triggered watch.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn place_order(&self) -> Result<()> {
        self.tx.send(WatchCommand::PlaceOrder).await?;
        Ok(())
    }

    /// Closes the open trade at market.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn close_trade(&self) -> Result<()> {
        self.tx.send(WatchCommand::CloseTrade).await?;
        Ok(())
    }

    /// Fetches the actor's current status.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent or the response cannot
    /// be received.
    pub async fn status(&self) -> Result<WatchStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(WatchCommand::GetStatus(tx)).await?;
        let status = rx.await?;
        Ok(status)
    }

    /// Shuts the actor down.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the watch actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(WatchCommand::Shutdown).await?;
        Ok(())
    }
}
