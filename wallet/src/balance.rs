use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::blockchain::{Address, Amount};
use crate::blockchain_client::ChainRpc;

/// Periodic balance refresh for one address against one endpoint.
pub struct BalancePoller;

impl BalancePoller {
    /// Fetch immediately, then every `period`. Each result is passed to
    /// `sink`; a failed fetch is reported as `None`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(
        rpc: Arc<dyn ChainRpc>,
        address: Address,
        period: Duration,
        mut sink: F,
    ) -> PollerHandle
    where
        F: FnMut(Option<Amount>) + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let period = period.max(Duration::from_millis(10));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let fetched = tokio::select! {
                    _ = child.cancelled() => break,
                    result = rpc.get_balance(&address) => result,
                };

                match fetched {
                    Ok(balance) => sink(Some(balance)),
                    Err(err) => {
                        log::warn!("Balance refresh for {} failed: {}", address.short(), err);
                        sink(None);
                    }
                }
            }
            log::debug!("Balance poller for {} stopped", address.short());
        });

        PollerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owns a running poller. Dropping it stops polling.
#[derive(Debug)]
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the polling task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::warn!("Balance poller task ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
