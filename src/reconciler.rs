use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::color::ColorAssigner;
use crate::config::TailConfig;
use crate::error::TailError;
use crate::kubernetes::PodApi;
use crate::pod_tail::PodTail;
use crate::selector::Selector;
use crate::types::{PodDescriptor, PodKey};

/// Pods started and stopped by one reconciliation tick.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub started: Vec<PodKey>,
    pub stopped: Vec<PodKey>,
}

/// Cloneable trigger for a running [`Reconciler`].
#[derive(Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }
}

/// Keeps one [`PodTail`] per matching pod, polling the cluster on a fixed interval.
pub struct Reconciler {
    client: Arc<dyn PodApi>,
    assigner: Arc<ColorAssigner>,
    namespace: Option<String>,
    selector: Selector,
    refresh_interval: Duration,
    cancel: CancellationToken,
    pods: HashMap<PodKey, PodTail>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn PodApi>, assigner: Arc<ColorAssigner>, config: TailConfig) -> Self {
        Self {
            client,
            assigner,
            namespace: config.namespace,
            selector: config.selector,
            refresh_interval: config.refresh_interval,
            cancel: CancellationToken::new(),
            pods: HashMap::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    #[cfg(test)]
    pub fn tracked(&self) -> Vec<PodKey> {
        let mut keys: Vec<_> = self.pods.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Poll until stopped, then wait for every tail to wind down.
    ///
    /// The first tick runs immediately. A failed listing is reported and the
    /// loop carries on at the next interval.
    pub async fn run(&mut self) {
        info!(
            "Watching pods in {} matching \"{}\" every {:?}",
            self.namespace.as_deref().unwrap_or("all namespaces"),
            self.selector,
            self.refresh_interval
        );

        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!("{}", err);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// One list-and-diff pass.
    ///
    /// On a list failure the tracked pods are left exactly as they were.
    pub async fn tick(&mut self) -> Result<TickSummary, TailError> {
        let listed = self
            .client
            .list_pods(self.namespace.as_deref(), &self.selector)
            .await
            .map_err(TailError::List)?;

        self.reap_failed().await;

        let found: BTreeMap<PodKey, PodDescriptor> =
            listed.into_iter().map(|pod| (pod.key(), pod)).collect();
        let mut summary = TickSummary::default();

        let mut stale: Vec<PodKey> = self
            .pods
            .keys()
            .filter(|key| !found.contains_key(*key))
            .cloned()
            .collect();
        stale.sort();
        for key in stale {
            if let Some(tail) = self.pods.remove(&key) {
                info!("Removing {}", key);
                tail.stop();
                summary.stopped.push(key);
            }
        }

        for (key, descriptor) in found {
            if self.pods.contains_key(&key) {
                continue;
            }
            info!("Adding {}", key);
            let tail = PodTail::start(
                descriptor,
                &self.cancel,
                self.client.clone(),
                self.assigner.clone(),
            );
            self.pods.insert(key.clone(), tail);
            summary.started.push(key);
        }

        Ok(summary)
    }

    /// Drop tails that ended with an error so the next listing can start a
    /// fresh one. Cleanly finished tails stay tracked and are not restarted.
    ///
    /// A clean end covers a completed pod, but also a container restart or a
    /// pod recreated under the same name: those keep their `PodKey`, so their
    /// new logs are only picked up once the pod drops out of a listing.
    async fn reap_failed(&mut self) {
        let mut failed = Vec::new();
        for (key, tail) in self.pods.iter_mut() {
            match tail.take_outcome().await {
                Some(Err(err)) => {
                    debug!("Tail for {} ended with error: {}", key, err);
                    failed.push(key.clone());
                }
                Some(Ok(())) => debug!("Tail for {} finished", key),
                None => {}
            }
        }
        for key in failed {
            self.pods.remove(&key);
        }
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        let count = self.pods.len();
        for (_, tail) in self.pods.drain() {
            tail.stop();
            let key = tail.key().clone();
            if let Err(err) = tail.join().await {
                debug!("Tail for {} ended with error during shutdown: {}", key, err);
            }
        }
        info!("Stopped tailing {} pods", count);
    }
}
