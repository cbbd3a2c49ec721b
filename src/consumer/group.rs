//! Consumer worker supervision

use super::types::{ConsumerError, ConsumerStats};
use super::worker::TradeConsumer;
use crate::broker::BrokerConsumer;
use crate::config::ConsumerConfig;
use crate::store::TradeStore;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Run one worker per broker consumer against a shared store
///
/// Workers are independent; when one fails the rest are asked to stop after
/// their current unit of work, and the first failure is returned.
pub async fn run_workers<C, S>(
    consumers: Vec<C>,
    store: Arc<S>,
    config: ConsumerConfig,
    shutdown: CancellationToken,
) -> Result<ConsumerStats, ConsumerError>
where
    C: BrokerConsumer + 'static,
    S: TradeStore + 'static,
{
    let group = shutdown.child_token();
    let mut tasks = JoinSet::new();

    for (worker_id, consumer) in consumers.into_iter().enumerate() {
        let mut worker =
            TradeConsumer::new(worker_id, consumer, Arc::clone(&store), config.clone());
        let token = group.clone();
        tasks.spawn(async move { worker.run(&token).await });
    }

    let mut total = ConsumerStats::default();
    let mut first_error: Option<ConsumerError> = None;

    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(ConsumerError::WorkerPanicked(e.to_string())),
        };

        match result {
            Ok(stats) => total.merge(&stats),
            Err(e) => {
                tracing::error!(error = %e, "Consumer worker failed, stopping remaining workers");
                group.cancel();
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total),
    }
}
