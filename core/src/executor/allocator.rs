use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::error::ScopeConflict;
use crate::executor::scope::{first_overlap, ScopePattern};
use crate::executor::types::Unit;

/// Reservation of one unit's scope patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceLock {
    pub id: u64,
    pub unit_id: String,
    #[serde(serialize_with = "serialize_patterns")]
    pub patterns: Vec<ScopePattern>,
}

fn serialize_patterns<S>(patterns: &[ScopePattern], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(patterns.iter().map(ScopePattern::as_str))
}

#[derive(Debug, Default)]
struct LockTable {
    /// lock id -> lock; ordered so conflicts name the oldest holder
    held: BTreeMap<u64, WorkspaceLock>,
}

#[derive(Debug, Default)]
struct AllocatorInner {
    table: Mutex<LockTable>,
    next_id: AtomicU64,
}

/// Lock table over unit scopes.
///
/// Cloning is cheap and every clone shares the same table. The overlap check
/// and the reservation happen under a single mutex acquisition, so two
/// concurrent acquirers can never both win an overlapping scope.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceAllocator {
    inner: Arc<AllocatorInner>,
}

impl WorkspaceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        match self.inner.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reserve `unit`'s scope.
    ///
    /// Fails with [`ScopeConflict`] when any pattern overlaps a lock held by
    /// another unit. Units without a scope always succeed.
    pub fn acquire(&self, unit: &Unit) -> Result<WorkspaceLock, ScopeConflict> {
        let mut table = self.table();

        for held in table.held.values() {
            if held.unit_id == unit.id {
                continue;
            }
            if let Some((mine, theirs)) = first_overlap(&unit.scope, &held.patterns) {
                tracing::debug!(
                    unit_id = %unit.id,
                    held_by = %held.unit_id,
                    "workspace scope conflict"
                );
                return Err(ScopeConflict {
                    unit_id: unit.id.clone(),
                    pattern: mine.to_string(),
                    held_by: held.unit_id.clone(),
                    held_pattern: theirs.to_string(),
                });
            }
        }

        let lock = WorkspaceLock {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            unit_id: unit.id.clone(),
            patterns: unit.scope.clone(),
        };
        table.held.insert(lock.id, lock.clone());
        tracing::trace!(unit_id = %unit.id, lock_id = lock.id, "workspace lock acquired");

        Ok(lock)
    }

    /// Like [`acquire`](Self::acquire) but returns a guard that releases on drop.
    pub fn acquire_scoped(&self, unit: &Unit) -> Result<WorkspaceGuard, ScopeConflict> {
        let lock = self.acquire(unit)?;
        Ok(WorkspaceGuard {
            allocator: self.clone(),
            lock,
        })
    }

    /// Release `lock`. Returns false when it was already released.
    pub fn release(&self, lock: &WorkspaceLock) -> bool {
        let released = self.table().held.remove(&lock.id).is_some();
        if released {
            tracing::trace!(unit_id = %lock.unit_id, lock_id = lock.id, "workspace lock released");
        }
        released
    }

    /// Snapshot of currently held locks, oldest first.
    pub fn held(&self) -> Vec<WorkspaceLock> {
        self.table().held.values().cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.table().held.is_empty()
    }
}

/// Holds a [`WorkspaceLock`] until dropped.
#[derive(Debug)]
pub struct WorkspaceGuard {
    allocator: WorkspaceAllocator,
    lock: WorkspaceLock,
}

impl WorkspaceGuard {
    pub fn lock(&self) -> &WorkspaceLock {
        &self.lock
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.allocator.release(&self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::graph::Graph;
    use crate::executor::types::UnitSpec;

    fn units(specs: Vec<UnitSpec>) -> Graph {
        Graph::build(specs).unwrap()
    }

    #[test]
    fn second_overlapping_acquirer_conflicts() {
        let graph = units(vec![
            UnitSpec::new("A").with_scope(["src/a/*"]),
            UnitSpec::new("B").with_scope(["src/a/utils.py"]),
        ]);
        let allocator = WorkspaceAllocator::new();

        let _a = allocator.acquire(graph.unit("A").unwrap()).unwrap();
        let conflict = allocator.acquire(graph.unit("B").unwrap()).unwrap_err();

        assert_eq!(conflict.unit_id, "B");
        assert_eq!(conflict.held_by, "A");
        assert_eq!(conflict.pattern, "src/a/utils.py");
        assert_eq!(conflict.held_pattern, "src/a/*");
        assert_eq!(allocator.held().len(), 1);
    }

    #[test]
    fn disjoint_scopes_coexist() {
        let graph = units(vec![
            UnitSpec::new("A").with_scope(["src/a/**"]),
            UnitSpec::new("B").with_scope(["src/b/**"]),
            UnitSpec::new("C"),
        ]);
        let allocator = WorkspaceAllocator::new();
        for id in ["A", "B", "C"] {
            allocator.acquire(graph.unit(id).unwrap()).unwrap();
        }
        assert_eq!(allocator.held().len(), 3);
    }

    #[test]
    fn release_is_idempotent_and_keyed_by_lock_id() {
        let graph = units(vec![
            UnitSpec::new("A").with_scope(["docs/**"]),
            UnitSpec::new("B").with_scope(["docs/api.md"]),
        ]);
        let allocator = WorkspaceAllocator::new();

        let stale = allocator.acquire(graph.unit("A").unwrap()).unwrap();
        assert!(allocator.release(&stale));

        let fresh = allocator.acquire(graph.unit("B").unwrap()).unwrap();
        // A second release of the old lock must not free B's reservation.
        assert!(!allocator.release(&stale));
        assert_eq!(allocator.held(), vec![fresh.clone()]);
        assert!(allocator.acquire(graph.unit("A").unwrap()).is_err());

        assert!(allocator.release(&fresh));
        assert!(allocator.is_idle());
    }

    #[test]
    fn guard_releases_on_drop() {
        let graph = units(vec![UnitSpec::new("A").with_scope(["src/**"])]);
        let allocator = WorkspaceAllocator::new();
        {
            let guard = allocator.acquire_scoped(graph.unit("A").unwrap()).unwrap();
            assert_eq!(guard.lock().unit_id, "A");
            assert!(!allocator.is_idle());
        }
        assert!(allocator.is_idle());
    }

    #[test]
    fn guard_releases_when_holder_panics() {
        let graph = units(vec![UnitSpec::new("A").with_scope(["src/**"])]);
        let allocator = WorkspaceAllocator::new();
        let guard = allocator.acquire_scoped(graph.unit("A").unwrap()).unwrap();

        let result = std::thread::spawn(move || {
            let _held = guard;
            panic!("worker crashed");
        })
        .join();

        assert!(result.is_err());
        assert!(allocator.is_idle());
    }

    #[test]
    fn concurrent_acquirers_never_both_win() {
        let graph = Arc::new(units(
            (0..8)
                .map(|i| UnitSpec::new(format!("u{i}")).with_scope(["shared/**"]))
                .collect(),
        ));
        let allocator = WorkspaceAllocator::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let graph = graph.clone();
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    allocator
                        .acquire(graph.unit(&format!("u{i}")).unwrap())
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(allocator.held().len(), 1);
    }

    #[test]
    fn lock_serializes_patterns_as_strings() {
        let graph = units(vec![UnitSpec::new("A").with_scope(["src/a/*"])]);
        let lock = WorkspaceAllocator::new()
            .acquire(graph.unit("A").unwrap())
            .unwrap();
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["patterns"], serde_json::json!(["src/a/*"]));
        assert_eq!(json["unit_id"], "A");
    }
}
