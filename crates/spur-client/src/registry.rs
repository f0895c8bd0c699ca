//! Catalog of the streams known in one region.
//!
//! The registry maps stream names to a [`RegistryEntry`] (the canonical
//! [`StreamHandle`] plus the last remote description) and keeps a single
//! "current stream" selection for the command layer.
//!
//! ## Locking
//!
//! All state sits behind one `std::sync::Mutex`. The lock is taken only to
//! read or write the map and is never held across a remote call, so a
//! lifecycle watcher completing on its own task can update entries while a
//! command is in flight.
//!
//! ## Deletion
//!
//! `delete` removes the entry *before* asking the service to delete the
//! stream. The service keeps listing a deleting stream for a while; the
//! registry remembers names it deleted and does not re-register them from a
//! listing until the service stops reporting them (or they are created
//! again).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::stream::{
    StartPosition, StreamDescription, StreamHandle, StreamStatus, DEFAULT_PARTITION_KEY,
    DEFAULT_SHARD_ID,
};
use crate::transport::StreamDirectory;

/// One registered stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub handle: StreamHandle,
    /// `None` until the stream has been described.
    pub description: Option<StreamDescription>,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn status(&self) -> Option<&StreamStatus> {
        self.description.as_ref().map(|d| &d.status)
    }
}

/// Result of [`StreamRegistry::delete`].
#[derive(Debug)]
pub struct Deletion {
    /// The entry as it was when removed.
    pub entry: RegistryEntry,
    /// Outcome of the remote delete call.
    pub remote: Result<()>,
}

/// Settings applied to handles the registry creates.
#[derive(Debug, Clone)]
pub struct HandleDefaults {
    pub partition_key: String,
    pub shard_id: String,
    pub start: StartPosition,
}

impl Default for HandleDefaults {
    fn default() -> Self {
        Self {
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            start: StartPosition::default(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    entries: BTreeMap<String, RegistryEntry>,
    current: Option<String>,
    /// Deleted here, possibly still listed remotely.
    deleted: HashSet<String>,
}

/// Streams known in one region.
pub struct StreamRegistry {
    directory: Arc<dyn StreamDirectory>,
    region: String,
    defaults: HandleDefaults,
    state: Mutex<RegistryState>,
}

impl StreamRegistry {
    pub fn new(directory: Arc<dyn StreamDirectory>, region: impl Into<String>) -> Self {
        Self {
            directory,
            region: region.into(),
            defaults: HandleDefaults::default(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_defaults(mut self, defaults: HandleDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bare_entry(&self, name: &str) -> RegistryEntry {
        RegistryEntry {
            handle: StreamHandle::new(name)
                .with_partition_key(self.defaults.partition_key.clone())
                .with_shard_id(self.defaults.shard_id.clone())
                .with_start(self.defaults.start.clone()),
            description: None,
        }
    }

    /// List every stream with its current description.
    ///
    /// Follows the paginated listing to its end, registering streams seen
    /// for the first time. Streams deleted through this registry are not
    /// described, and a stream that vanishes between the listing and its
    /// describe is skipped. Registered streams the service does not list
    /// (yet) are appended after the listed ones.
    pub async fn list(&self) -> Result<Vec<RegistryEntry>> {
        let mut listed = HashSet::new();
        let mut described = Vec::new();
        let mut exclusive_start: Option<String> = None;

        loop {
            let page = self
                .directory
                .list_streams(exclusive_start.as_deref())
                .await
                .map_err(|e| ClientError::service("ListStreams", e))?;

            for name in &page.names {
                listed.insert(name.clone());
                let tombstoned = self.state().deleted.contains(name);
                if tombstoned {
                    continue;
                }
                match self.directory.describe_stream(name).await {
                    Ok(description) => described.push(description),
                    Err(e) if e.is_not_found() => {
                        debug!(stream = %name, "Stream disappeared while listing");
                    }
                    Err(e) => return Err(ClientError::service("DescribeStream", e)),
                }
            }

            match (page.has_more, page.names.last()) {
                (true, Some(last)) => exclusive_start = Some(last.clone()),
                _ => break,
            }
        }

        debug!(region = %self.region, streams = listed.len(), "Listed streams");

        let mut state = self.state();
        state.deleted.retain(|name| listed.contains(name));

        let mut shown = HashSet::with_capacity(described.len());
        let mut result = Vec::with_capacity(described.len());
        for description in described {
            if state.deleted.contains(&description.name) {
                continue;
            }
            let name = description.name.clone();
            let entry = state
                .entries
                .entry(name.clone())
                .or_insert_with(|| self.bare_entry(&name));
            entry.description = Some(description);
            result.push(entry.clone());
            shown.insert(name);
        }

        result.extend(
            state
                .entries
                .values()
                .filter(|entry| !shown.contains(entry.name()))
                .cloned(),
        );

        Ok(result)
    }

    /// Create a stream remotely and register it.
    ///
    /// The new entry has no description; the stream typically reports
    /// `CREATING` until the service finishes provisioning it.
    pub async fn create(&self, name: &str, shard_count: u32) -> Result<RegistryEntry> {
        self.directory
            .create_stream(name, shard_count)
            .await
            .map_err(|e| ClientError::service("CreateStream", e))?;

        let entry = self.bare_entry(name);
        let mut state = self.state();
        state.deleted.remove(name);
        state.entries.insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    /// Unregister a stream, then delete it remotely.
    ///
    /// The entry is gone before the remote call is made, and the outcome of
    /// that call is only reported in [`Deletion::remote`]. A failed remote
    /// delete does not bring the entry back: `list` keeps hiding the name
    /// for as long as the service lists it, and a second `delete` fails
    /// with [`ClientError::UnknownStream`]. Creating the name again (or
    /// deleting it through another client) clears this.
    pub async fn delete(&self, name: &str) -> Result<Deletion> {
        let entry = {
            let mut state = self.state();
            let entry = state
                .entries
                .remove(name)
                .ok_or_else(|| ClientError::UnknownStream(name.to_string()))?;
            if state.current.as_deref() == Some(name) {
                state.current = None;
            }
            state.deleted.insert(name.to_string());
            entry
        };

        let remote = self
            .directory
            .delete_stream(name)
            .await
            .map_err(|e| ClientError::service("DeleteStream", e));

        Ok(Deletion { entry, remote })
    }

    pub fn get(&self, name: &str) -> Result<RegistryEntry> {
        self.state()
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::UnknownStream(name.to_string()))
    }

    pub fn set_current(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if !state.entries.contains_key(name) {
            return Err(ClientError::UnknownStream(name.to_string()));
        }
        state.current = Some(name.to_string());
        Ok(())
    }

    pub fn current(&self) -> Option<RegistryEntry> {
        let state = self.state();
        state
            .current
            .as_ref()
            .and_then(|name| state.entries.get(name))
            .cloned()
    }

    /// Describe one stream and refresh its entry if registered.
    pub async fn describe(&self, name: &str) -> Result<StreamDescription> {
        let description = self
            .directory
            .describe_stream(name)
            .await
            .map_err(|e| ClientError::service("DescribeStream", e))?;

        if let Some(entry) = self.state().entries.get_mut(name) {
            entry.description = Some(description.clone());
        }
        Ok(description)
    }

    /// Store a status observed elsewhere (e.g. by a lifecycle watch).
    ///
    /// Returns `false` when the stream is not registered.
    pub fn record_status(&self, name: &str, status: StreamStatus) -> bool {
        let mut state = self.state();
        let Some(entry) = state.entries.get_mut(name) else {
            return false;
        };
        match entry.description.as_mut() {
            Some(description) => description.status = status,
            None => {
                entry.description = Some(StreamDescription {
                    name: name.to_string(),
                    status,
                    arn: String::new(),
                    shards: Vec::new(),
                })
            }
        }
        true
    }

    /// Snapshot of the registered entries, ordered by name.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.state().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for StreamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        write!(
            f,
            "In {} there are {} streams, current: {}",
            self.region,
            state.entries.len(),
            state.current.as_deref().unwrap_or("<none>")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn registry() -> (Arc<MemoryBackend>, StreamRegistry) {
        let backend = Arc::new(MemoryBackend::new());
        let registry = StreamRegistry::new(backend.clone(), "us-west-1");
        (backend, registry)
    }

    #[tokio::test]
    async fn test_unknown_stream_errors() {
        let (_backend, registry) = registry();

        assert!(matches!(
            registry.get("nope"),
            Err(ClientError::UnknownStream(name)) if name == "nope"
        ));
        assert!(matches!(
            registry.set_current("nope"),
            Err(ClientError::UnknownStream(_))
        ));
        assert!(matches!(
            registry.delete("nope").await,
            Err(ClientError::UnknownStream(_))
        ));
    }

    #[tokio::test]
    async fn test_create_registers_bare_entry_with_defaults() {
        let (_backend, registry) = registry();
        let registry = registry.with_defaults(HandleDefaults {
            partition_key: "p1".to_string(),
            shard_id: "shardId-000000000001".to_string(),
            start: StartPosition::TrimHorizon,
        });

        let entry = registry.create("orders", 2).await.unwrap();
        assert_eq!(entry.name(), "orders");
        assert!(entry.description.is_none());
        assert_eq!(entry.handle.partition_key(), "p1");
        assert_eq!(entry.handle.shard_id(), "shardId-000000000001");
        assert_eq!(entry.handle.start(), &StartPosition::TrimHorizon);
        assert_eq!(registry.get("orders").unwrap(), entry);
    }

    #[tokio::test]
    async fn test_set_current_and_summary() {
        let (_backend, registry) = registry();
        registry.create("orders", 1).await.unwrap();
        assert!(registry.current().is_none());
        assert_eq!(
            registry.to_string(),
            "In us-west-1 there are 1 streams, current: <none>"
        );

        registry.set_current("orders").unwrap();
        assert_eq!(registry.current().unwrap().name(), "orders");
        assert_eq!(
            registry.to_string(),
            "In us-west-1 there are 1 streams, current: orders"
        );
    }

    #[tokio::test]
    async fn test_delete_clears_current_selection() {
        let (_backend, registry) = registry();
        registry.create("orders", 1).await.unwrap();
        registry.set_current("orders").unwrap();

        let deletion = registry.delete("orders").await.unwrap();
        assert_eq!(deletion.entry.name(), "orders");
        assert!(deletion.remote.is_ok());
        assert!(registry.current().is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_record_status_updates_entry() {
        let (_backend, registry) = registry();
        registry.create("orders", 1).await.unwrap();

        assert!(registry.record_status("orders", StreamStatus::Active));
        assert_eq!(
            registry.get("orders").unwrap().status(),
            Some(&StreamStatus::Active)
        );
        assert!(!registry.record_status("missing", StreamStatus::Active));
    }
}
