use std::fmt;

/// Stable identity of a pod across listings: `namespace/name`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Snapshot of a pod taken from a single list call.
///
/// The container list is fixed for the lifetime of the tail built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodDescriptor {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<String>,
}

impl PodDescriptor {
    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }

    /// Label printed in front of every line: `namespace/pod/container`.
    pub fn container_label(&self, container: &str) -> String {
        format!("{}/{}/{}", self.namespace, self.name, container)
    }
}
