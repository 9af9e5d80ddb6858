//! In-memory stand-ins for the cluster API and the console.

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::color::LineSink;
use crate::error::BoxError;
use crate::kubernetes::{LogStream, PodApi};
use crate::selector::Selector;
use crate::types::PodDescriptor;

type Chunk = io::Result<Vec<u8>>;

struct FakePod {
    labels: BTreeMap<String, String>,
    descriptor: PodDescriptor,
}

#[derive(Default)]
struct FakeState {
    pods: Vec<FakePod>,
    fail_list: bool,
    fail_open: HashSet<String>,
    streams: HashMap<String, UnboundedSender<Chunk>>,
    opened: HashMap<String, usize>,
    list_calls: usize,
}

/// Scripted cluster. Streams are keyed by `namespace/pod/container`.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_pod(&self, namespace: &str, name: &str, containers: &[&str]) {
        self.add_labeled_pod(namespace, name, &[], containers);
    }

    pub fn add_labeled_pod(
        &self,
        namespace: &str,
        name: &str,
        labels: &[(&str, &str)],
        containers: &[&str],
    ) {
        let pod = FakePod {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            descriptor: PodDescriptor {
                namespace: namespace.to_string(),
                name: name.to_string(),
                containers: containers.iter().map(|c| c.to_string()).collect(),
            },
        };
        self.state.lock().pods.push(pod);
    }

    pub fn remove_pod(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .pods
            .retain(|p| !(p.descriptor.namespace == namespace && p.descriptor.name == name));
    }

    pub fn set_list_failure(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    pub fn fail_open(&self, label: &str) {
        self.state.lock().fail_open.insert(label.to_string());
    }

    pub fn allow_open(&self, label: &str) {
        self.state.lock().fail_open.remove(label);
    }

    /// Deliver one line to an open stream. Returns false if nobody is reading.
    pub fn send_line(&self, label: &str, line: &str) -> bool {
        self.send(label, Ok(format!("{line}\n").into_bytes()))
    }

    /// Deliver raw bytes as-is, without appending a newline.
    pub fn send_bytes(&self, label: &str, bytes: &[u8]) -> bool {
        self.send(label, Ok(bytes.to_vec()))
    }

    pub fn send_error(&self, label: &str) -> bool {
        self.send(
            label,
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        )
    }

    fn send(&self, label: &str, chunk: Chunk) -> bool {
        let state = self.state.lock();
        match state.streams.get(label) {
            Some(tx) => tx.unbounded_send(chunk).is_ok(),
            None => false,
        }
    }

    /// Close the server side of a stream, which the reader sees as EOF.
    pub fn end_stream(&self, label: &str) {
        self.state.lock().streams.remove(label);
    }

    pub fn is_streaming(&self, label: &str) -> bool {
        self.state
            .lock()
            .streams
            .get(label)
            .is_some_and(|tx| !tx.is_closed())
    }

    pub fn open_count(&self, label: &str) -> usize {
        self.state.lock().opened.get(label).copied().unwrap_or(0)
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }
}

#[async_trait]
impl PodApi for FakeCluster {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<PodDescriptor>, BoxError> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if state.fail_list {
            return Err("the server is currently unable to handle the request".into());
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| namespace.is_none_or(|ns| p.descriptor.namespace == ns))
            .filter(|p| selector.matches(&p.labels))
            .map(|p| p.descriptor.clone())
            .collect())
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, BoxError> {
        let label = format!("{namespace}/{pod}/{container}");
        let mut state = self.state.lock();
        *state.opened.entry(label.clone()).or_default() += 1;
        if state.fail_open.contains(&label) {
            return Err(format!("container \"{container}\" is waiting to start").into());
        }
        let (tx, rx) = unbounded::<Chunk>();
        state.streams.insert(label, tx);
        Ok(Box::pin(rx.into_async_read()))
    }
}

/// Collects rendered lines instead of printing them.
#[derive(Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<String>>,
}

impl CaptureSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LineSink for CaptureSink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
