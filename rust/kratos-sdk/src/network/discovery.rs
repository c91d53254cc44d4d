// Network discovery - address-book reads and the periodic updater

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{NetworkSnapshot, NodeRegistry};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::execute::ExecutionContext;
use crate::query::{AddressBookQuery, Query};
use crate::types::NodeAddress;

/// Read the address book through `ctx` (built over the bootstrap nodes)
/// and swap the result into `target`.
///
/// Entries without endpoints are dropped. The current topology stays in
/// place when the read fails or leaves nothing usable.
pub async fn refresh_from(
    ctx: &ExecutionContext,
    target: &NodeRegistry,
) -> Result<Arc<NetworkSnapshot>> {
    let book = Query::new(AddressBookQuery).execute_in(ctx).await?;
    let total = book.len();

    let addresses: Vec<NodeAddress> = book
        .into_iter()
        .filter(|address| {
            if address.endpoints.is_empty() {
                warn!("Address book entry {} has no endpoints, skipping", address.account_id);
                false
            } else {
                true
            }
        })
        .collect();

    debug!("Address book: {}/{} usable entries", addresses.len(), total);
    if addresses.is_empty() {
        return Err(Error::NoNodes);
    }
    target.refresh(&addresses)
}

/// Spawn the periodic network refresh.
///
/// The first refresh happens one `period` after the call; the task ends
/// when `cancel` fires. Failed refreshes keep the previous topology.
pub fn spawn_updater(client: Client, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately on the first tick
        interval.tick().await;

        info!("🌐 Network updater started (interval: {:?})", period);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            match client.refresh_network().await {
                Ok(snapshot) => debug!(
                    "🌐 Periodic refresh: {} nodes (generation {})",
                    snapshot.len(),
                    snapshot.generation()
                ),
                Err(e) => warn!("🌐 Network refresh failed, keeping current nodes: {}", e),
            }
        }

        info!("🌐 Network updater stopped");
    })
}
