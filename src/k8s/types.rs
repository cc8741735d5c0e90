use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;

/// Snapshot of a node's metadata labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the labels as `name="value"` pairs, sorted by their rendered
    /// text and joined with commas.
    ///
    /// Values are inserted verbatim; quotes, backslashes and newlines are not
    /// escaped.
    pub fn fragment(&self) -> String {
        let mut pairs: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, value))
            .collect();
        pairs.sort();
        pairs.join(",")
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The parts of a cluster node object the cache mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub labels: LabelSet,
}

impl NodeRecord {
    /// Returns `None` for objects without a name.
    pub fn from_k8s_node(node: &Node) -> Option<Self> {
        let name = node.metadata.name.clone()?;
        let labels = node.metadata.labels.clone().unwrap_or_default();

        Some(Self {
            name,
            labels: LabelSet::from(labels),
        })
    }
}
