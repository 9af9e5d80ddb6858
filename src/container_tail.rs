use futures::AsyncBufReadExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::color::Printer;
use crate::error::TailError;
use crate::kubernetes::PodApi;
use crate::types::PodDescriptor;

/// Follows the log stream of a single container.
pub struct ContainerTail {
    client: Arc<dyn PodApi>,
    namespace: String,
    pod: String,
    container: String,
    label: String,
    printer: Printer,
    cancel: CancellationToken,
}

impl ContainerTail {
    pub fn new(
        client: Arc<dyn PodApi>,
        pod: &PodDescriptor,
        container: &str,
        printer: Printer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace: pod.namespace.clone(),
            pod: pod.name.clone(),
            container: container.to_string(),
            label: pod.container_label(container),
            printer,
            cancel,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Print lines until the stream ends, fails, or the tail is cancelled.
    ///
    /// Cancellation is not an error. The stream is dropped on every exit path.
    pub async fn run(self) -> Result<(), TailError> {
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancelled {} before its log stream opened", self.label);
                return Ok(());
            }
            opened = self.client.open_log_stream(&self.namespace, &self.pod, &self.container) => {
                opened.map_err(|source| TailError::StreamOpen {
                    label: self.label.clone(),
                    source,
                })?
            }
        };

        debug!("Starting to tail logs for {}", self.label);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Stopped tailing {}", self.label);
                    return Ok(());
                }
                read = stream.read_until(b'\n', &mut buf) => read,
            };
            match read {
                Ok(0) => {
                    debug!("Log stream ended for {}", self.label);
                    return Ok(());
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_line_ending(&buf));
                    self.printer.print(&self.label, &line);
                }
                Err(source) => {
                    return Err(TailError::StreamRead {
                        label: self.label.clone(),
                        source,
                    });
                }
            }
        }
    }
}

/// Strip a trailing `\n` or `\r\n`. Log lines are not required to be UTF-8.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
