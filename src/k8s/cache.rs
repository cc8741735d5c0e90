//! Node label cache backed by a Kubernetes watch on this process's node.
//!
//! A single background task owns all writes to the [`NodeMirror`], applying
//! list/watch events in order. Request handlers read it through
//! [`NodeLabelCache::lookup`], which never touches the network.

use crate::config::{Config, NodeIdentity};
use crate::k8s::types::{LabelSet, NodeRecord};
use crate::{LabelerError, Result};
use dashmap::DashMap;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Api;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Synchronous access to the current labels of a node.
pub trait LabelSource: Send + Sync {
    fn labels(&self, node: &NodeIdentity) -> Result<LabelSet>;
}

/// Thread-safe mirror of node objects keyed by name
#[derive(Clone, Default)]
pub struct NodeMirror {
    inner: Arc<DashMap<String, LabelSet>>,
}

impl NodeMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node's labels
    pub fn apply(&self, record: NodeRecord) {
        self.inner.insert(record.name, record.labels);
    }

    pub fn remove(&self, name: &str) -> Option<LabelSet> {
        self.inner.remove(name).map(|(_, labels)| labels)
    }

    /// Make the mirror hold exactly `records`.
    ///
    /// Each entry is replaced atomically, so a reader sees either the old or
    /// the new labels of a node, never a mix.
    pub fn replace_all(&self, records: Vec<NodeRecord>) {
        let keep: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
        self.inner.retain(|name, _| keep.contains(name.as_str()));

        for record in records {
            self.apply(record);
        }
    }

    pub fn get(&self, name: &str) -> Option<LabelSet> {
        self.inner.get(name).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Applies watcher events to a mirror and reports the first completed sync.
pub struct MirrorUpdater {
    mirror: NodeMirror,
    relist: Option<Vec<NodeRecord>>,
    synced: Option<oneshot::Sender<()>>,
}

impl MirrorUpdater {
    pub fn new(mirror: NodeMirror, synced: oneshot::Sender<()>) -> Self {
        Self {
            mirror,
            relist: None,
            synced: Some(synced),
        }
    }

    pub fn handle(&mut self, event: Event<Node>) {
        match event {
            Event::Init => {
                debug!("Node watcher (re)listing");
                self.relist = Some(Vec::new());
            }
            Event::InitApply(node) => {
                if let Some(record) = NodeRecord::from_k8s_node(&node) {
                    self.relist.get_or_insert_with(Vec::new).push(record);
                }
            }
            Event::InitDone => {
                let records = self.relist.take().unwrap_or_default();
                self.mirror.replace_all(records);

                info!(
                    "Node watcher sync complete. Tracking {} nodes",
                    self.mirror.len()
                );

                if let Some(synced) = self.synced.take() {
                    let _ = synced.send(());
                }
            }
            Event::Apply(node) => {
                if let Some(record) = NodeRecord::from_k8s_node(&node) {
                    debug!("Node {} updated ({} labels)", record.name, record.labels.len());
                    self.mirror.apply(record);
                }
            }
            Event::Delete(node) => {
                if let Some(name) = node.metadata.name.as_deref() {
                    self.mirror.remove(name);
                    debug!("Removed node {} from cache", name);
                }
            }
        }
    }
}

/// Background watch of a single node object.
pub struct NodeWatcher {
    api: Api<Node>,
    node: NodeIdentity,
    updater: MirrorUpdater,
}

impl NodeWatcher {
    pub fn new(api: Api<Node>, node: NodeIdentity, updater: MirrorUpdater) -> Self {
        Self { api, node, updater }
    }

    /// Runs until `cancel` fires. Transient watch failures are retried with
    /// backoff and followed by a relist.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Starting Kubernetes node watcher for {}", self.node);

        let config = watcher::Config::default().fields(&format!("metadata.name={}", self.node));
        let mut stream = watcher::watcher(self.api.clone(), config)
            .default_backoff()
            .boxed();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Node watcher stopping");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.updater.handle(event),
                    Some(Err(e)) => warn!("Node watch failed: {}, retrying", e),
                    None => {
                        warn!("Node watch stream ended");
                        break;
                    }
                },
            }
        }
    }
}

/// Label lookup for nodes, served from the local mirror.
#[derive(Clone)]
pub struct NodeLabelCache {
    mirror: NodeMirror,
}

impl NodeLabelCache {
    /// Spawns the node watcher on `tracker` and waits for its first full sync.
    ///
    /// Fails if the sync does not finish within `config.sync_timeout` or
    /// `cancel` fires first; the watcher is stopped in both cases.
    pub async fn start(
        api: Api<Node>,
        config: &Config,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mirror = NodeMirror::new();
        let (synced_tx, synced_rx) = oneshot::channel();

        let watch_cancel = cancel.child_token();
        let node_watcher = NodeWatcher::new(
            api,
            config.node.clone(),
            MirrorUpdater::new(mirror.clone(), synced_tx),
        );
        tracker.spawn(node_watcher.run(watch_cancel.clone()));

        if let Err(e) = wait_for_sync(synced_rx, config.sync_timeout, cancel).await {
            watch_cancel.cancel();
            return Err(e);
        }

        Ok(Self { mirror })
    }

    /// Wraps an already populated mirror.
    pub fn with_mirror(mirror: NodeMirror) -> Self {
        Self { mirror }
    }

    pub fn lookup(&self, node: &NodeIdentity) -> Result<LabelSet> {
        self.mirror
            .get(node.as_str())
            .ok_or_else(|| LabelerError::NodeNotFound {
                name: node.to_string(),
            })
    }
}

impl LabelSource for NodeLabelCache {
    fn labels(&self, node: &NodeIdentity) -> Result<LabelSet> {
        self.lookup(node)
    }
}

async fn wait_for_sync(
    synced: oneshot::Receiver<()>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LabelerError::CacheSyncCancelled),
        res = tokio::time::timeout(timeout, synced) => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(LabelerError::KubernetesError(
                "node watcher exited before the initial sync".to_string(),
            )),
            Err(_) => Err(LabelerError::CacheSyncTimeout(timeout)),
        },
    }
}
