// ABOUTME: Snapshot lookup with fallback into the preceding compatible phase.
// ABOUTME: Refuses to borrow state across unrelated services or infrastructures.

use std::sync::Arc;

use tracing::debug;

use super::{SnapshotKey, SnapshotStore, StoreError};
use crate::hooks::{ExpressionRenderer, PhaseRecord, PhaseRegistry};
use crate::snapshot::PhaseSnapshot;

/// Reads snapshots, borrowing from earlier phases of the same deployment
/// when the current phase has not produced one.
///
/// Multi-phase workflows (e.g. canary-style staged rollouts) often run
/// Setup in phase 1 and Resize in phase 2; phase 2's lookup walks back to
/// phase 1, but only after verifying both phases target the same service
/// and the same infrastructure. Differing targets are a workflow authoring
/// error and fail loudly.
pub struct FallbackReader {
    store: Arc<dyn SnapshotStore>,
    registry: Arc<dyn PhaseRegistry>,
    renderer: Arc<dyn ExpressionRenderer>,
}

impl FallbackReader {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        registry: Arc<dyn PhaseRegistry>,
        renderer: Arc<dyn ExpressionRenderer>,
    ) -> Self {
        Self {
            store,
            registry,
            renderer,
        }
    }

    /// Direct read, else recurse into the immediately preceding phase.
    ///
    /// Returns `PhaseSnapshot::default()` when no preceding phase exists:
    /// "rollback with nothing to roll back" is a legitimate state, not an
    /// error. Idempotent as long as no write intervenes.
    pub fn read_with_fallback(&self, key: &SnapshotKey) -> Result<PhaseSnapshot, StoreError> {
        if let Some(snapshot) = self.store.read(key)? {
            return Ok(snapshot);
        }

        let Some(previous) = self
            .registry
            .previous_phase(&key.execution_id, &key.phase_name)
        else {
            debug!(phase = %key.phase_name, "no preceding phase, returning empty snapshot");
            return Ok(PhaseSnapshot::default());
        };

        let current = self
            .registry
            .record(&key.execution_id, &key.phase_name)
            .ok_or_else(|| StoreError::UnknownPhase(key.phase_name.clone()))?;

        if !self.same_service_and_infra(&current, &previous) {
            return Err(StoreError::PhaseMismatch);
        }

        debug!(
            phase = %key.phase_name,
            previous = %previous.phase_name,
            "snapshot missing, falling back to preceding phase"
        );

        let previous_key = SnapshotKey {
            execution_id: key.execution_id.clone(),
            phase_name: previous.phase_name,
            rollback: key.rollback,
        };
        self.read_with_fallback(&previous_key)
    }

    /// Targets match when the service is the same and the infrastructure's
    /// endpoint, organization, and space agree. Organization and space may
    /// hold templating expressions, so they are compared rendered.
    fn same_service_and_infra(&self, current: &PhaseRecord, previous: &PhaseRecord) -> bool {
        if current.service_id != previous.service_id {
            return false;
        }

        let cur = &current.infra;
        let prev = &previous.infra;
        cur.endpoint == prev.endpoint
            && self.renderer.render(&cur.organization) == self.renderer.render(&prev.organization)
            && self.renderer.render(&cur.space) == self.renderer.render(&prev.space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ExecutionId, InfraTarget, PhaseName, ServiceId};
    use std::collections::HashMap;

    struct Identity;
    impl ExpressionRenderer for Identity {
        fn render(&self, expr: &str) -> String {
            expr.to_string()
        }
    }

    /// Renders `${org}` and `${space}` to fixed values.
    struct Templating;
    impl ExpressionRenderer for Templating {
        fn render(&self, expr: &str) -> String {
            match expr {
                "${org}" => "acme".to_string(),
                "${space}" => "prod".to_string(),
                other => other.to_string(),
            }
        }
    }

    struct StaticRegistry {
        records: HashMap<String, PhaseRecord>,
        order: Vec<String>,
    }

    impl StaticRegistry {
        fn new(records: Vec<PhaseRecord>) -> Self {
            let order: Vec<String> = records
                .iter()
                .map(|r| r.phase_name.as_str().to_string())
                .collect();
            let records = records
                .into_iter()
                .map(|r| (r.phase_name.as_str().to_string(), r))
                .collect();
            Self { records, order }
        }
    }

    impl PhaseRegistry for StaticRegistry {
        fn record(&self, _execution: &ExecutionId, phase: &PhaseName) -> Option<PhaseRecord> {
            self.records.get(phase.as_str()).cloned()
        }

        fn previous_phase(&self, _execution: &ExecutionId, phase: &PhaseName) -> Option<PhaseRecord> {
            let idx = self.order.iter().position(|n| n == phase.as_str())?;
            if idx == 0 {
                return None;
            }
            self.records.get(&self.order[idx - 1]).cloned()
        }
    }

    fn infra(org: &str) -> InfraTarget {
        InfraTarget {
            endpoint: "https://api.example.com".to_string(),
            organization: org.to_string(),
            space: "prod".to_string(),
        }
    }

    fn record(phase: &str, service: &str, org: &str) -> PhaseRecord {
        PhaseRecord {
            phase_name: PhaseName::new(phase).unwrap(),
            service_id: ServiceId::new(service),
            infra: infra(org),
        }
    }

    fn key(phase: &str) -> SnapshotKey {
        SnapshotKey::forward(ExecutionId::new("exec-1"), PhaseName::new(phase).unwrap())
    }

    fn reader(store: Arc<MemoryStore>, registry: StaticRegistry) -> FallbackReader {
        FallbackReader::new(store, Arc::new(registry), Arc::new(Identity))
    }

    #[test]
    fn direct_hit_wins() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = PhaseSnapshot {
            is_success: true,
            ..PhaseSnapshot::default()
        };
        store.write(key("Phase 2"), snapshot.clone()).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "acme"),
            record("Phase 2", "svc", "acme"),
        ]);
        let reader = reader(store, registry);
        assert_eq!(reader.read_with_fallback(&key("Phase 2")).unwrap(), snapshot);
    }

    #[test]
    fn falls_back_to_matching_previous_phase() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = PhaseSnapshot {
            is_success: true,
            max_count: Some(4),
            ..PhaseSnapshot::default()
        };
        store.write(key("Phase 1"), snapshot.clone()).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "acme"),
            record("Phase 2", "svc", "acme"),
        ]);
        let reader = reader(store, registry);
        assert_eq!(reader.read_with_fallback(&key("Phase 2")).unwrap(), snapshot);
    }

    #[test]
    fn mismatched_service_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.write(key("Phase 1"), PhaseSnapshot::default()).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc-a", "acme"),
            record("Phase 2", "svc-b", "acme"),
        ]);
        let reader = reader(store, registry);
        let err = reader.read_with_fallback(&key("Phase 2")).unwrap_err();
        assert!(matches!(err, StoreError::PhaseMismatch));
    }

    #[test]
    fn mismatched_infra_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "acme"),
            record("Phase 2", "svc", "globex"),
        ]);
        let reader = reader(store, registry);
        let err = reader.read_with_fallback(&key("Phase 2")).unwrap_err();
        assert!(matches!(err, StoreError::PhaseMismatch));
    }

    #[test]
    fn templated_org_compared_rendered() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = PhaseSnapshot {
            is_success: true,
            ..PhaseSnapshot::default()
        };
        store.write(key("Phase 1"), snapshot.clone()).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "${org}"),
            record("Phase 2", "svc", "acme"),
        ]);
        let reader = FallbackReader::new(store, Arc::new(registry), Arc::new(Templating));
        assert_eq!(reader.read_with_fallback(&key("Phase 2")).unwrap(), snapshot);
    }

    #[test]
    fn no_preceding_phase_returns_empty_default() {
        let store = Arc::new(MemoryStore::new());
        let registry = StaticRegistry::new(vec![record("Phase 1", "svc", "acme")]);
        let reader = reader(store, registry);
        let snapshot = reader.read_with_fallback(&key("Phase 1")).unwrap();
        assert_eq!(snapshot, PhaseSnapshot::default());
        assert!(!snapshot.completed_successfully());
    }

    #[test]
    fn read_with_fallback_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = PhaseSnapshot {
            is_success: true,
            ..PhaseSnapshot::default()
        };
        store.write(key("Phase 1"), snapshot).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "acme"),
            record("Phase 2", "svc", "acme"),
        ]);
        let reader = reader(store, registry);
        let first = reader.read_with_fallback(&key("Phase 2")).unwrap();
        let second = reader.read_with_fallback(&key("Phase 2")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn recursion_walks_multiple_phases() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = PhaseSnapshot {
            is_success: true,
            desired_count: Some(3),
            ..PhaseSnapshot::default()
        };
        store.write(key("Phase 1"), snapshot.clone()).unwrap();

        let registry = StaticRegistry::new(vec![
            record("Phase 1", "svc", "acme"),
            record("Phase 2", "svc", "acme"),
            record("Phase 3", "svc", "acme"),
        ]);
        let reader = reader(store, registry);
        assert_eq!(reader.read_with_fallback(&key("Phase 3")).unwrap(), snapshot);
    }
}
