pub mod cache;
pub mod client;
pub mod types;

pub use cache::{LabelSource, NodeLabelCache, NodeMirror};
pub use client::K8sClient;
pub use types::{LabelSet, NodeRecord};
