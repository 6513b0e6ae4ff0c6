// ABOUTME: Test support utilities.
// ABOUTME: Mock dispatcher and host collaborators for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use klimaka::dispatch::{CliVersion, CommandDescriptor, DispatchError, TaskDispatcher};
use klimaka::hooks::{
    ActivityEntry, ActivityLog, ExpressionRenderer, FeatureFlag, FeatureFlags, PhaseRecord,
    PhaseRegistry,
};
use klimaka::phase::{Orchestrator, PhaseContext};
use klimaka::store::{MemoryStore, SnapshotStore};
use klimaka::types::{
    AccountId, ActivityId, CorrelationId, CredentialHandle, ExecutionId, InfraTarget, PhaseName,
    Route, ServiceId,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("klimaka=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Records every submitted descriptor and hands out sequential ids.
#[derive(Default)]
pub struct MockDispatcher {
    submitted: Mutex<Vec<CommandDescriptor>>,
    reject_next: Mutex<bool>,
}

impl MockDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submitted(&self) -> Vec<CommandDescriptor> {
        self.submitted.lock().clone()
    }

    pub fn last(&self) -> CommandDescriptor {
        self.submitted
            .lock()
            .last()
            .cloned()
            .expect("a task should have been submitted")
    }

    pub fn reject_next(&self) {
        *self.reject_next.lock() = true;
    }
}

#[async_trait]
impl TaskDispatcher for MockDispatcher {
    async fn submit(&self, descriptor: CommandDescriptor) -> Result<CorrelationId, DispatchError> {
        if std::mem::take(&mut *self.reject_next.lock()) {
            return Err(DispatchError::Rejected("worker queue full".to_string()));
        }
        let mut submitted = self.submitted.lock();
        submitted.push(descriptor);
        Ok(CorrelationId::new(format!("task-{}", submitted.len())))
    }
}

/// Fixed phase ordering and targeting for one execution.
pub struct StaticRegistry {
    records: HashMap<String, PhaseRecord>,
    order: Vec<String>,
}

impl StaticRegistry {
    pub fn new(records: Vec<PhaseRecord>) -> Arc<Self> {
        let order: Vec<String> = records
            .iter()
            .map(|r| r.phase_name.as_str().to_string())
            .collect();
        let records = records
            .into_iter()
            .map(|r| (r.phase_name.as_str().to_string(), r))
            .collect();
        Arc::new(Self { records, order })
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

/// Flags enabled by explicit opt-in only.
#[derive(Default)]
pub struct StaticFlags {
    enabled: HashSet<FeatureFlag>,
}

impl StaticFlags {
    pub fn none() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[allow(dead_code)]
    pub fn with(flags: &[FeatureFlag]) -> Arc<Self> {
        Arc::new(Self {
            enabled: flags.iter().copied().collect(),
        })
    }
}

impl FeatureFlags for StaticFlags {
    fn is_enabled(&self, flag: FeatureFlag, _account: &AccountId) -> bool {
        self.enabled.contains(&flag)
    }
}

pub struct IdentityRenderer;

impl ExpressionRenderer for IdentityRenderer {
    fn render(&self, expr: &str) -> String {
        expr.to_string()
    }
}

/// Captures activity entries for assertions.
#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl RecordingLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().clone()
    }
}

impl ActivityLog for RecordingLog {
    fn record(&self, entry: ActivityEntry) {
        self.entries.lock().push(entry);
    }
}

pub fn infra() -> InfraTarget {
    InfraTarget {
        endpoint: "https://api.platform.example.com".to_string(),
        organization: "acme".to_string(),
        space: "prod".to_string(),
    }
}

pub fn phase_record(name: &str) -> PhaseRecord {
    PhaseRecord {
        phase_name: PhaseName::new(name).unwrap(),
        service_id: ServiceId::new("orders-svc"),
        infra: infra(),
    }
}

pub fn context(phase: &str) -> PhaseContext {
    PhaseContext {
        execution_id: ExecutionId::new("exec-1"),
        activity_id: ActivityId::new("act-1"),
        account_id: AccountId::new("acct-1"),
        service_id: ServiceId::new("orders-svc"),
        phase_name: PhaseName::new(phase).unwrap(),
        rollback_of: None,
        infra: infra(),
        credential: CredentialHandle::new("cred-ref"),
        infra_routes: vec![Route::new("orders.example.com").unwrap()],
        infra_temp_routes: vec![Route::new("orders-stage.example.com").unwrap()],
        cli_version: CliVersion::V6,
        enforce_ssl_validation: true,
    }
}

/// A full test harness: one orchestrator wired to mocks, with handles to
/// everything worth asserting on.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub dispatcher: Arc<MockDispatcher>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<RecordingLog>,
}

impl Harness {
    pub fn new(phases: Vec<PhaseRecord>) -> Self {
        Self::with_flags(phases, StaticFlags::none())
    }

    pub fn with_flags(phases: Vec<PhaseRecord>, flags: Arc<StaticFlags>) -> Self {
        init_tracing();
        let dispatcher = MockDispatcher::new();
        let store = Arc::new(MemoryStore::new());
        let audit = RecordingLog::new();
        let orchestrator = Orchestrator::new(
            Arc::clone(&dispatcher) as Arc<dyn TaskDispatcher>,
            Arc::clone(&store) as Arc<dyn SnapshotStore>,
            StaticRegistry::new(phases),
            flags,
            Arc::new(IdentityRenderer),
            Arc::clone(&audit) as Arc<dyn ActivityLog>,
        );
        Self {
            orchestrator,
            dispatcher,
            store,
            audit,
        }
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(600);
