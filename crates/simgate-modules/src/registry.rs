//! The shared endpoint registry.
//!
//! Data sources and actions live in per-module maps keyed by lowercase
//! module name, then lowercase endpoint name. Enhancers live in one global
//! map keyed by lowercase base endpoint; each value is an immutable,
//! priority-sorted list that is replaced wholesale on every change
//! (copy-on-write). Readers clone the `Arc` and iterate without holding any
//! map lock.
//!
//! A snapshot taken by a running pipeline may still list an enhancer that
//! has since been unregistered. Every entry therefore carries a liveness
//! flag that removal clears: an invocation already in progress finishes,
//! but no invocation starts against an entry once its removal returned.
//!
//! Modules never touch this type directly; they go through
//! [`ModuleContext`](crate::context::ModuleContext), which pins the owner
//! to the module's own name.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::capability::{Action, DataSource, Enhancer};

/// One enhancer registration.
#[derive(Clone)]
pub struct EnhancerEntry {
    /// Name of the module that registered it.
    pub owner: String,
    /// Priority captured at registration time.
    pub priority: i32,
    /// The enhancer itself.
    pub enhancer: Arc<dyn Enhancer>,
    live: Arc<AtomicBool>,
}

impl EnhancerEntry {
    /// Whether the registration is still in place.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EnhancerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancerEntry")
            .field("owner", &self.owner)
            .field("priority", &self.priority)
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

/// An immutable, priority-ordered snapshot of the enhancers for one base
/// endpoint.
pub type EnhancerList = Arc<Vec<EnhancerEntry>>;

type EndpointMap<T> = DashMap<String, DashMap<String, Arc<T>>>;

/// Concurrency-safe store of every module registration.
#[derive(Default)]
pub struct EndpointRegistry {
    data_sources: EndpointMap<dyn DataSource>,
    actions: EndpointMap<dyn Action>,
    enhancers: DashMap<String, EnhancerList>,
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("modules_with_data_sources", &self.data_sources.len())
            .field("modules_with_actions", &self.actions.len())
            .field("enhanced_endpoints", &self.enhancers.len())
            .finish()
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl EndpointRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Data sources
    // -----------------------------------------------------------------------

    /// Register `source` at `(module, endpoint)`. Returns `false` and
    /// leaves the existing entry untouched if one is already present.
    pub fn register_data_source(
        &self,
        module: &str,
        endpoint: &str,
        source: Arc<dyn DataSource>,
    ) -> bool {
        insert_unique(&self.data_sources, module, endpoint, source, "data source")
    }

    /// Remove the data source at `(module, endpoint)`.
    pub fn unregister_data_source(&self, module: &str, endpoint: &str) -> bool {
        remove_one(&self.data_sources, module, endpoint)
    }

    /// Look up a data source (case-insensitive on both keys).
    pub fn data_source(&self, module: &str, endpoint: &str) -> Option<Arc<dyn DataSource>> {
        lookup(&self.data_sources, module, endpoint)
    }

    /// Snapshot of a module's data sources, sorted by endpoint.
    pub fn data_sources_of(&self, module: &str) -> Vec<(String, Arc<dyn DataSource>)> {
        snapshot(&self.data_sources, module)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Register `action` at `(module, endpoint)`. Same contract as
    /// [`register_data_source`](Self::register_data_source).
    pub fn register_action(&self, module: &str, endpoint: &str, action: Arc<dyn Action>) -> bool {
        insert_unique(&self.actions, module, endpoint, action, "action")
    }

    /// Remove the action at `(module, endpoint)`.
    pub fn unregister_action(&self, module: &str, endpoint: &str) -> bool {
        remove_one(&self.actions, module, endpoint)
    }

    /// Look up an action (case-insensitive on both keys).
    pub fn action(&self, module: &str, endpoint: &str) -> Option<Arc<dyn Action>> {
        lookup(&self.actions, module, endpoint)
    }

    /// Snapshot of a module's actions, sorted by endpoint.
    pub fn actions_of(&self, module: &str) -> Vec<(String, Arc<dyn Action>)> {
        snapshot(&self.actions, module)
    }

    // -----------------------------------------------------------------------
    // Enhancers
    // -----------------------------------------------------------------------

    /// Append an enhancer for `base_endpoint`. Always succeeds.
    ///
    /// The list stays sorted by ascending priority; an enhancer is placed
    /// after every existing entry of equal priority.
    pub fn register_enhancer(&self, owner: &str, base_endpoint: &str, enhancer: Arc<dyn Enhancer>) {
        let priority = enhancer.priority();
        let entry = EnhancerEntry {
            owner: key(owner),
            priority,
            enhancer,
            live: Arc::new(AtomicBool::new(true)),
        };

        let mut slot = self.enhancers.entry(key(base_endpoint)).or_default();
        let mut next = slot.value().as_slice().to_vec();
        let at = next.partition_point(|existing| existing.priority <= priority);
        next.insert(at, entry);
        *slot = Arc::new(next);

        debug!(owner, base_endpoint, priority, "Registered enhancer");
    }

    /// Remove every enhancer `owner` registered for `base_endpoint`.
    /// Returns how many were removed.
    pub fn unregister_enhancers(&self, base_endpoint: &str, owner: &str) -> usize {
        let owner = key(owner);
        let base = key(base_endpoint);
        let removed = self
            .enhancers
            .get_mut(&base)
            .map_or(0, |mut slot| retain_not_owned(&mut slot, &owner));
        self.enhancers.remove_if(&base, |_, list| list.is_empty());
        removed
    }

    /// Current enhancer snapshot for `base_endpoint`, in execution order.
    pub fn enhancers_for(&self, base_endpoint: &str) -> EnhancerList {
        self.enhancers
            .get(&key(base_endpoint))
            .map(|slot| Arc::clone(slot.value()))
            .unwrap_or_default()
    }

    /// Every enhancer registered by `owner`, as `(base_endpoint, entry)`
    /// pairs sorted by base endpoint.
    pub fn enhancers_of(&self, owner: &str) -> Vec<(String, EnhancerEntry)> {
        let owner = key(owner);
        let mut found: Vec<(String, EnhancerEntry)> = self
            .enhancers
            .iter()
            .flat_map(|slot| {
                let base = slot.key().clone();
                slot.value()
                    .iter()
                    .filter(|e| e.owner == owner)
                    .map(|e| (base.clone(), e.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    // -----------------------------------------------------------------------
    // Bulk removal
    // -----------------------------------------------------------------------

    /// Remove every registration owned by `owner` from every structure.
    pub fn unregister_owner(&self, owner: &str) {
        let owner = key(owner);
        self.data_sources.remove(&owner);
        self.actions.remove(&owner);
        for mut slot in self.enhancers.iter_mut() {
            retain_not_owned(&mut slot, &owner);
        }
        self.enhancers.retain(|_, list| !list.is_empty());
        debug!(owner = %owner, "Removed all registrations");
    }

    /// Drop every registration of every module.
    pub fn clear(&self) {
        self.data_sources.clear();
        self.actions.clear();
        for slot in self.enhancers.iter() {
            slot.value().iter().for_each(EnhancerEntry::retire);
        }
        self.enhancers.clear();
    }

    /// Whether nothing at all is registered.
    pub fn is_empty(&self) -> bool {
        self.data_sources.iter().all(|m| m.is_empty())
            && self.actions.iter().all(|m| m.is_empty())
            && self.enhancers.is_empty()
    }
}

fn insert_unique<T: ?Sized>(
    map: &EndpointMap<T>,
    module: &str,
    endpoint: &str,
    value: Arc<T>,
    kind: &str,
) -> bool {
    let module_map = map.entry(key(module)).or_default();
    let inserted = match module_map.entry(key(endpoint)) {
        Entry::Occupied(_) => false,
        Entry::Vacant(vacant) => {
            vacant.insert(value);
            true
        }
    };
    if inserted {
        debug!(module, endpoint, kind, "Registered endpoint");
    } else {
        warn!(module, endpoint, kind, "Endpoint already registered");
    }
    inserted
}

fn remove_one<T: ?Sized>(map: &EndpointMap<T>, module: &str, endpoint: &str) -> bool {
    map.get(&key(module))
        .is_some_and(|module_map| module_map.remove(&key(endpoint)).is_some())
}

fn lookup<T: ?Sized>(map: &EndpointMap<T>, module: &str, endpoint: &str) -> Option<Arc<T>> {
    let module_map = map.get(&key(module))?;
    module_map
        .get(&key(endpoint))
        .map(|found| Arc::clone(found.value()))
}

fn snapshot<T: ?Sized>(map: &EndpointMap<T>, module: &str) -> Vec<(String, Arc<T>)> {
    let mut entries: Vec<(String, Arc<T>)> = map
        .get(&key(module))
        .map(|module_map| {
            module_map
                .iter()
                .map(|e| (e.key().clone(), Arc::clone(e.value())))
                .collect()
        })
        .unwrap_or_default();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn retain_not_owned(slot: &mut EnhancerList, owner: &str) -> usize {
    let before = slot.len();
    if slot.iter().any(|e| e.owner == owner) {
        let (removed, kept): (Vec<EnhancerEntry>, Vec<EnhancerEntry>) =
            slot.iter().cloned().partition(|e| e.owner == owner);
        *slot = Arc::new(kept);
        removed.iter().for_each(EnhancerEntry::retire);
    }
    before.saturating_sub(slot.len())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::capability::{DataRequest, EnhanceRequest, JsonObject};
    use crate::error::CapabilityError;

    struct Fixed(&'static str);

    impl DataSource for Fixed {
        fn fetch(&self, _request: &DataRequest<'_>) -> Result<Value, CapabilityError> {
            Ok(Value::from(self.0))
        }

        fn description(&self) -> &str {
            self.0
        }
    }

    struct Tag(i32);

    impl Enhancer for Tag {
        fn enhance(
            &self,
            _response: &mut JsonObject,
            _original: &JsonObject,
            _request: &EnhanceRequest<'_>,
        ) -> Result<(), CapabilityError> {
            Ok(())
        }

        fn description(&self) -> &str {
            "tag"
        }

        fn priority(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn duplicate_data_source_is_rejected_and_first_kept() {
        let registry = EndpointRegistry::new();
        assert!(registry.register_data_source("Eco", "Balance", Arc::new(Fixed("first"))));
        assert!(!registry.register_data_source("eco", "balance", Arc::new(Fixed("second"))));

        let found = registry.data_source("ECO", "BALANCE");
        assert_eq!(found.map(|s| s.description().to_owned()), Some("first".to_owned()));
    }

    #[test]
    fn same_endpoint_in_two_modules_is_allowed() {
        let registry = EndpointRegistry::new();
        assert!(registry.register_data_source("a", "stats", Arc::new(Fixed("a"))));
        assert!(registry.register_data_source("b", "stats", Arc::new(Fixed("b"))));
    }

    #[test]
    fn unregister_reports_whether_something_was_removed() {
        let registry = EndpointRegistry::new();
        assert!(!registry.unregister_data_source("eco", "balance"));
        registry.register_data_source("eco", "balance", Arc::new(Fixed("x")));
        assert!(registry.unregister_data_source("eco", "Balance"));
        assert!(registry.data_source("eco", "balance").is_none());
    }

    #[test]
    fn enhancers_are_sorted_by_priority_then_registration() {
        let registry = EndpointRegistry::new();
        registry.register_enhancer("c", "server", Arc::new(Tag(200)));
        registry.register_enhancer("a", "server", Arc::new(Tag(100)));
        registry.register_enhancer("b", "Server", Arc::new(Tag(100)));
        registry.register_enhancer("d", "server", Arc::new(Tag(50)));

        let snapshot = registry.enhancers_for("server");
        let owners: Vec<&str> = snapshot.iter().map(|e| e.owner.as_str()).collect();
        assert_eq!(owners, vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_changes() {
        let registry = EndpointRegistry::new();
        registry.register_enhancer("a", "server", Arc::new(Tag(100)));
        let before = registry.enhancers_for("server");
        registry.unregister_enhancers("server", "a");
        assert_eq!(before.len(), 1);
        assert!(registry.enhancers_for("server").is_empty());
    }

    #[test]
    fn unregister_owner_purges_every_structure() {
        let registry = EndpointRegistry::new();
        registry.register_data_source("eco", "balance", Arc::new(Fixed("x")));
        registry.register_enhancer("eco", "server", Arc::new(Tag(100)));
        registry.register_enhancer("eco", "players", Arc::new(Tag(100)));
        registry.register_enhancer("other", "server", Arc::new(Tag(100)));

        registry.unregister_owner("ECO");

        assert!(registry.data_source("eco", "balance").is_none());
        assert!(registry.enhancers_of("eco").is_empty());
        assert!(registry.enhancers_for("players").is_empty());
        assert_eq!(registry.enhancers_for("server").len(), 1);
    }
}
