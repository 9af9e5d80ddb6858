use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::color::ColorAssigner;
use crate::container_tail::ContainerTail;
use crate::error::TailError;
use crate::kubernetes::PodApi;
use crate::types::{PodDescriptor, PodKey};

/// Handle to the tails of every container in one pod.
pub struct PodTail {
    key: PodKey,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), TailError>>>,
}

impl PodTail {
    /// Spawn one tail per container, scoped to a child of `parent`.
    pub fn start(
        descriptor: PodDescriptor,
        parent: &CancellationToken,
        client: Arc<dyn PodApi>,
        assigner: Arc<ColorAssigner>,
    ) -> Self {
        let key = descriptor.key();
        let cancel = parent.child_token();
        let task = tokio::spawn(run(descriptor, cancel.clone(), client, assigner));
        Self {
            key,
            cancel,
            task: Some(task),
        }
    }

    pub fn key(&self) -> &PodKey {
        &self.key
    }

    /// Cancel every container tail of this pod. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// True once every container tail has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Collect the outcome of a finished tail. Each outcome is handed out once.
    pub async fn take_outcome(&mut self) -> Option<Result<(), TailError>> {
        if !self.is_finished() {
            return None;
        }
        let task = self.task.take()?;
        Some(flatten(&self.key, task.await))
    }

    /// Wait for all container tails to end.
    pub async fn join(mut self) -> Result<(), TailError> {
        match self.task.take() {
            Some(task) => flatten(&self.key, task.await),
            None => Ok(()),
        }
    }
}

fn flatten(
    key: &PodKey,
    joined: Result<Result<(), TailError>, tokio::task::JoinError>,
) -> Result<(), TailError> {
    joined.unwrap_or_else(|err| {
        error!("Tail task for pod {} failed: {}", key, err);
        Ok(())
    })
}

/// Tail every container concurrently and return the first error seen.
///
/// A failing container is reported immediately and never stops its siblings.
async fn run(
    descriptor: PodDescriptor,
    cancel: CancellationToken,
    client: Arc<dyn PodApi>,
    assigner: Arc<ColorAssigner>,
) -> Result<(), TailError> {
    let mut tails = JoinSet::new();
    for container in &descriptor.containers {
        let tail = ContainerTail::new(
            client.clone(),
            &descriptor,
            container,
            assigner.next_printer(),
            cancel.child_token(),
        );
        debug!("Spawning tail for {}", tail.label());
        tails.spawn(tail.run());
    }

    let mut first_error = None;
    while let Some(joined) = tails.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!("{}", err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
            Err(err) => error!("Container tail for pod {} failed: {}", descriptor.key(), err),
        }
    }

    debug!("All container tails for pod {} ended", descriptor.key());
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorMode;
    use crate::testing::{CaptureSink, FakeCluster, eventually};

    fn descriptor(name: &str, containers: &[&str]) -> PodDescriptor {
        PodDescriptor {
            namespace: "ns".to_string(),
            name: name.to_string(),
            containers: containers.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn assigner(sink: &Arc<CaptureSink>) -> Arc<ColorAssigner> {
        Arc::new(ColorAssigner::new(ColorMode::Off, sink.clone()))
    }

    #[tokio::test]
    async fn test_pod_without_containers_completes_immediately() {
        let cluster = FakeCluster::new();
        let sink = Arc::new(CaptureSink::default());
        let root = CancellationToken::new();

        let tail = PodTail::start(descriptor("empty", &[]), &root, cluster, assigner(&sink));
        assert_eq!(tail.key(), &PodKey::new("ns", "empty"));
        tail.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_container_does_not_stop_sibling() {
        let cluster = FakeCluster::new();
        cluster.fail_open("ns/app-1/broken");
        let sink = Arc::new(CaptureSink::default());
        let root = CancellationToken::new();

        let tail = PodTail::start(
            descriptor("app-1", &["broken", "web"]),
            &root,
            cluster.clone(),
            assigner(&sink),
        );

        assert!(eventually(|| cluster.is_streaming("ns/app-1/web")).await);
        assert!(cluster.send_line("ns/app-1/web", "still here"));
        assert!(eventually(|| sink.lines() == vec!["ns/app-1/web still here".to_string()]).await);
        assert!(!tail.is_finished());

        cluster.end_stream("ns/app-1/web");
        match tail.join().await {
            Err(TailError::StreamOpen { label, .. }) => assert_eq!(label, "ns/app-1/broken"),
            other => panic!("expected StreamOpen, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_cancels_own_containers_only() {
        let cluster = FakeCluster::new();
        let sink = Arc::new(CaptureSink::default());
        let root = CancellationToken::new();

        let first = PodTail::start(
            descriptor("app-1", &["web", "sidecar"]),
            &root,
            cluster.clone(),
            assigner(&sink),
        );
        let other = PodTail::start(
            descriptor("app-2", &["web"]),
            &root,
            cluster.clone(),
            assigner(&sink),
        );

        assert!(eventually(|| {
            cluster.is_streaming("ns/app-1/web")
                && cluster.is_streaming("ns/app-1/sidecar")
                && cluster.is_streaming("ns/app-2/web")
        })
        .await);

        first.stop();
        first.stop();
        first.join().await.unwrap();

        assert!(!cluster.is_streaming("ns/app-1/web"));
        assert!(!cluster.is_streaming("ns/app-1/sidecar"));
        assert!(cluster.is_streaming("ns/app-2/web"));
        assert!(cluster.send_line("ns/app-2/web", "unaffected"));
        assert!(eventually(|| sink.lines().contains(&"ns/app-2/web unaffected".to_string())).await);
        assert!(!other.is_finished());

        root.cancel();
        other.join().await.unwrap();
        assert!(!cluster.is_streaming("ns/app-2/web"));
    }

    #[tokio::test]
    async fn test_take_outcome_once_finished() {
        let cluster = FakeCluster::new();
        cluster.fail_open("ns/app-1/web");
        let sink = Arc::new(CaptureSink::default());
        let root = CancellationToken::new();

        let mut tail = PodTail::start(
            descriptor("app-1", &["web"]),
            &root,
            cluster,
            assigner(&sink),
        );

        assert!(eventually(|| tail.is_finished()).await);
        assert!(matches!(
            tail.take_outcome().await,
            Some(Err(TailError::StreamOpen { .. }))
        ));
        assert!(tail.take_outcome().await.is_none());
        assert!(tail.is_finished());
    }
}
