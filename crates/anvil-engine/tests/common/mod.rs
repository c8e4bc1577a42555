//! Scripted capability doubles shared by the anvil-engine integration tests.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use anvil_core::{
    BuildRequest, Builder, CancellationOracle, Capabilities, CheckpointStore, ComplexityAssessment,
    ComplexityAssessor, ComplexityRequest, ConfidenceAssessment, ConfidenceAssessor,
    ConfidenceRequest, ContextBundle, ContextSource, DiagnoseRequest, Diagnoser, Diagnosis,
    EngineConfig, EngineError, ExecutionContext, FileAction, FileContent, GeneratedFile, JobHandle,
    KnowledgeBase, MergeCapability, Metered, Notifier, Phase, Plan, PlanRequest, PlanStep,
    Planner, RecommendedAction, RepoCoordinates, RepoLock, Result, ReviseRequest, RootCause,
    SandboxHandle, SandboxProvider, StepAction, SubAgentNode, SubAgentRunner, TaskId,
    TrackerEvent, Usage, ValidationReport, Validator,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests (idempotent).
/// Honors `RUST_LOG` if set, otherwise defaults to "debug".
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
        if fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init()
            .is_err()
        {
            // tracing already initialized in this process
        }
    });
}

/// Queue of scripted values with a fallback once the queue runs dry.
pub struct Script<T: Clone> {
    queue: Mutex<VecDeque<T>>,
    fallback: Mutex<T>,
}

impl<T: Clone> Script<T> {
    pub fn new(fallback: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
        }
    }

    pub fn push(&self, value: T) {
        self.queue.lock().expect("lock").push_back(value);
    }

    pub fn set_fallback(&self, value: T) {
        *self.fallback.lock().expect("lock") = value;
    }

    fn next(&self) -> T {
        self.queue
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().expect("lock").clone())
    }
}

/// Records every request a mock receives.
pub struct Calls<T> {
    inner: Mutex<Vec<T>>,
}

impl<T: Clone> Calls<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, value: T) {
        self.inner.lock().expect("lock").push(value);
    }

    pub fn count(&self) -> usize {
        self.inner.lock().expect("lock").len()
    }

    pub fn all(&self) -> Vec<T> {
        self.inner.lock().expect("lock").clone()
    }

    pub fn last(&self) -> Option<T> {
        self.inner.lock().expect("lock").last().cloned()
    }
}

pub fn plan_with_steps(count: usize) -> Plan {
    Plan::new(
        (0..count)
            .map(|index| {
                PlanStep::new(format!("step {}", index + 1), StepAction::ModifyFile)
                    .with_path(format!("src/step{index}.rs"))
            })
            .collect(),
    )
}

pub fn file(path: &str, content: &str) -> GeneratedFile {
    GeneratedFile::new(path, content, FileAction::Create)
}

pub fn assessment(overall: u8, action: RecommendedAction) -> ConfidenceAssessment {
    ConfidenceAssessment {
        overall,
        recommended_action: action,
        uncertainties: vec!["which endpoint".to_owned()],
        clarifying_questions: vec!["Which API version?".to_owned()],
        suggested_subtasks: vec!["split the handler".to_owned()],
    }
}

pub fn repo_bundle() -> ContextBundle {
    ContextBundle {
        tree: "src/\n  lib.rs\n  api.rs".to_owned(),
        tree_list: vec!["src/lib.rs".to_owned(), "src/api.rs".to_owned()],
        manifest: Some("[package]\nname = \"widgets\"".to_owned()),
        files: vec![FileContent::new("src/lib.rs", "pub mod api;")],
        memories: vec!["widgets uses axum".to_owned()],
        docs: vec!["README: widget service".to_owned()],
        tools: Vec::new(),
    }
}

pub struct MockPlanner {
    pub plans: Script<Plan>,
    pub revisions: Script<Plan>,
    pub plan_calls: Calls<PlanRequest>,
    pub revise_calls: Calls<ReviseRequest>,
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, request: PlanRequest) -> Result<Metered<Plan>> {
        self.plan_calls.record(request);
        Ok(Metered::new(self.plans.next(), Usage::new(0.01, 100)))
    }

    async fn revise(&self, request: ReviseRequest) -> Result<Metered<Plan>> {
        self.revise_calls.record(request);
        Ok(Metered::new(self.revisions.next(), Usage::new(0.01, 100)))
    }
}

pub struct MockDiagnoser {
    pub diagnoses: Script<Diagnosis>,
    pub calls: Calls<DiagnoseRequest>,
}

#[async_trait]
impl Diagnoser for MockDiagnoser {
    async fn diagnose(&self, request: DiagnoseRequest) -> Result<Metered<Diagnosis>> {
        self.calls.record(request);
        Ok(Metered::new(self.diagnoses.next(), Usage::new(0.005, 50)))
    }
}

pub struct MockConfidence {
    pub assessments: Script<ConfidenceAssessment>,
    pub calls: Calls<ConfidenceRequest>,
}

#[async_trait]
impl ConfidenceAssessor for MockConfidence {
    async fn assess(&self, request: ConfidenceRequest) -> Result<Metered<ConfidenceAssessment>> {
        self.calls.record(request);
        Ok(Metered::new(self.assessments.next(), Usage::new(0.002, 20)))
    }
}

pub struct MockComplexity {
    pub scores: Script<Option<u8>>,
    pub calls: Calls<ComplexityRequest>,
}

#[async_trait]
impl ComplexityAssessor for MockComplexity {
    async fn assess_complexity(&self, request: ComplexityRequest) -> Result<ComplexityAssessment> {
        self.calls.record(request);
        match self.scores.next() {
            Some(score) => Ok(ComplexityAssessment {
                score,
                reasoning: "scripted".to_owned(),
            }),
            None => Err(EngineError::capability("complexity", "model offline")),
        }
    }
}

pub struct MockBuilder {
    pub outputs: Script<Vec<GeneratedFile>>,
    pub calls: Calls<BuildRequest>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Builder for MockBuilder {
    async fn build(&self, request: BuildRequest) -> Result<Metered<Vec<GeneratedFile>>> {
        self.calls.record(request);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::capability("build", "builder crashed"));
        }
        Ok(Metered::new(self.outputs.next(), Usage::new(0.02, 200)))
    }
}

pub struct MockValidator {
    pub results: Script<bool>,
    pub calls: Calls<SandboxHandle>,
}

#[async_trait]
impl Validator for MockValidator {
    async fn validate(&self, sandbox: &SandboxHandle) -> Result<ValidationReport> {
        self.calls.record(sandbox.clone());
        let success = self.results.next();
        let output = if success {
            "all checks passed".to_owned()
        } else {
            format!("error[E0425]: cannot find value `widget` (run {})", self.calls.count())
        };
        Ok(ValidationReport { success, output })
    }
}

pub struct MockSandboxes {
    pub created: Calls<RepoCoordinates>,
    pub destroyed: Calls<SandboxHandle>,
}

#[async_trait]
impl SandboxProvider for MockSandboxes {
    async fn create(&self, repo: &RepoCoordinates) -> Result<SandboxHandle> {
        self.created.record(repo.clone());
        Ok(SandboxHandle::new(format!("sandbox-{}", self.created.count())))
    }

    async fn destroy(&self, sandbox: &SandboxHandle) -> Result<()> {
        self.destroyed.record(sandbox.clone());
        Ok(())
    }
}

/// Reports cancellation from the `cancel_from`-th check onwards (0-based).
pub struct MockCancellation {
    pub cancel_from: Mutex<Option<usize>>,
    pub calls: Calls<TaskId>,
}

#[async_trait]
impl CancellationOracle for MockCancellation {
    async fn is_cancelled(&self, task_id: TaskId) -> Result<bool> {
        let index = self.calls.count();
        self.calls.record(task_id);
        Ok(self
            .cancel_from
            .lock()
            .expect("lock")
            .is_some_and(|from| index >= from))
    }
}

pub struct MockContext {
    pub bundle: Script<ContextBundle>,
    pub calls: Calls<TaskId>,
}

#[async_trait]
impl ContextSource for MockContext {
    async fn gather(&self, ctx: &ExecutionContext) -> Result<ContextBundle> {
        self.calls.record(ctx.task_id);
        Ok(self.bundle.next())
    }
}

pub struct MockSubAgents {
    pub calls: Calls<SubAgentNode>,
}

#[async_trait]
impl SubAgentRunner for MockSubAgents {
    async fn run(&self, node: &SubAgentNode) -> Result<Metered<String>> {
        self.calls.record(node.clone());
        Ok(Metered::new(
            format!("{} notes for the build", node.role),
            Usage::new(0.001, 10),
        ))
    }
}

pub struct MockMerger {
    pub calls: Calls<String>,
}

#[async_trait]
impl MergeCapability for MockMerger {
    async fn merge(&self, model: &str, _prompt: &str) -> Result<Metered<String>> {
        self.calls.record(model.to_owned());
        Ok(Metered::new("merged sub-agent notes".to_owned(), Usage::new(0.001, 10)))
    }
}

pub struct MockCheckpoints {
    pub writes: Calls<(Phase, JsonValue)>,
}

#[async_trait]
impl CheckpointStore for MockCheckpoints {
    async fn write(
        &self,
        _job: &JobHandle,
        phase: Phase,
        snapshot: JsonValue,
        _cost_delta: Option<f64>,
    ) -> Result<()> {
        self.writes.record((phase, snapshot));
        Ok(())
    }
}

pub struct MockLock {
    pub available: AtomicBool,
    pub acquired: Calls<String>,
    pub released: Calls<String>,
}

#[async_trait]
impl RepoLock for MockLock {
    async fn try_acquire(&self, owner: &str, name: &str) -> Result<bool> {
        self.acquired.record(format!("{owner}/{name}"));
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn release(&self, owner: &str, name: &str) -> Result<()> {
        self.released.record(format!("{owner}/{name}"));
        Ok(())
    }
}

pub struct MockKnowledge {
    pub memories: Script<Vec<String>>,
    pub fail: AtomicBool,
    pub searches: Calls<String>,
}

#[async_trait]
impl KnowledgeBase for MockKnowledge {
    async fn search_memories(&self, _repo: &RepoCoordinates, query: &str) -> Result<Vec<String>> {
        self.searches.record(query.to_owned());
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::capability("memory", "index unavailable"));
        }
        Ok(self.memories.next())
    }

    async fn error_patterns(&self, _task: &str) -> Result<Vec<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::capability("memory", "index unavailable"));
        }
        Ok(vec!["forgot to re-export module".to_owned()])
    }

    async fn strategy_hint(&self, _task: &str) -> Result<Option<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::capability("memory", "index unavailable"));
        }
        Ok(Some("add the route before the handler".to_owned()))
    }
}

pub struct MockNotifier {
    pub events: Calls<TrackerEvent>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, _tracker_id: &str, event: TrackerEvent) -> Result<()> {
        self.events.record(event);
        Ok(())
    }
}

/// Every mock, wired with defaults for a task that succeeds on the first attempt.
pub struct World {
    pub planner: Arc<MockPlanner>,
    pub diagnoser: Arc<MockDiagnoser>,
    pub confidence: Arc<MockConfidence>,
    pub complexity: Arc<MockComplexity>,
    pub builder: Arc<MockBuilder>,
    pub validator: Arc<MockValidator>,
    pub sandboxes: Arc<MockSandboxes>,
    pub cancellation: Arc<MockCancellation>,
    pub context: Arc<MockContext>,
    pub sub_agents: Arc<MockSubAgents>,
    pub merger: Arc<MockMerger>,
    pub checkpoints: Arc<MockCheckpoints>,
    pub lock: Arc<MockLock>,
    pub knowledge: Arc<MockKnowledge>,
    pub notifier: Arc<MockNotifier>,
}

impl World {
    pub fn new() -> Self {
        init_tracing();
        Self {
            planner: Arc::new(MockPlanner {
                plans: Script::new(plan_with_steps(1)),
                revisions: Script::new(plan_with_steps(1)),
                plan_calls: Calls::new(),
                revise_calls: Calls::new(),
            }),
            diagnoser: Arc::new(MockDiagnoser {
                diagnoses: Script::new(Diagnosis::new(RootCause::ImplementationError)),
                calls: Calls::new(),
            }),
            confidence: Arc::new(MockConfidence {
                assessments: Script::new(assessment(95, RecommendedAction::Proceed)),
                calls: Calls::new(),
            }),
            complexity: Arc::new(MockComplexity {
                scores: Script::new(Some(5)),
                calls: Calls::new(),
            }),
            builder: Arc::new(MockBuilder {
                outputs: Script::new(vec![file("src/api.rs", "pub fn list() {}")]),
                calls: Calls::new(),
                fail: AtomicBool::new(false),
            }),
            validator: Arc::new(MockValidator {
                results: Script::new(true),
                calls: Calls::new(),
            }),
            sandboxes: Arc::new(MockSandboxes {
                created: Calls::new(),
                destroyed: Calls::new(),
            }),
            cancellation: Arc::new(MockCancellation {
                cancel_from: Mutex::new(None),
                calls: Calls::new(),
            }),
            context: Arc::new(MockContext {
                bundle: Script::new(repo_bundle()),
                calls: Calls::new(),
            }),
            sub_agents: Arc::new(MockSubAgents {
                calls: Calls::new(),
            }),
            merger: Arc::new(MockMerger {
                calls: Calls::new(),
            }),
            checkpoints: Arc::new(MockCheckpoints {
                writes: Calls::new(),
            }),
            lock: Arc::new(MockLock {
                available: AtomicBool::new(true),
                acquired: Calls::new(),
                released: Calls::new(),
            }),
            knowledge: Arc::new(MockKnowledge {
                memories: Script::new(Vec::new()),
                fail: AtomicBool::new(false),
                searches: Calls::new(),
            }),
            notifier: Arc::new(MockNotifier {
                events: Calls::new(),
            }),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            planner: Arc::clone(&self.planner) as Arc<dyn Planner>,
            diagnoser: Arc::clone(&self.diagnoser) as Arc<dyn Diagnoser>,
            confidence: Arc::clone(&self.confidence) as Arc<dyn ConfidenceAssessor>,
            complexity: Arc::clone(&self.complexity) as Arc<dyn ComplexityAssessor>,
            builder: Arc::clone(&self.builder) as Arc<dyn Builder>,
            validator: Arc::clone(&self.validator) as Arc<dyn Validator>,
            sandboxes: Arc::clone(&self.sandboxes) as Arc<dyn SandboxProvider>,
            cancellation: Arc::clone(&self.cancellation) as Arc<dyn CancellationOracle>,
            context: Arc::clone(&self.context) as Arc<dyn ContextSource>,
            sub_agents: Arc::clone(&self.sub_agents) as Arc<dyn SubAgentRunner>,
            merger: Arc::clone(&self.merger) as Arc<dyn MergeCapability>,
            checkpoints: Some(Arc::clone(&self.checkpoints) as Arc<dyn CheckpointStore>),
            repo_lock: Some(Arc::clone(&self.lock) as Arc<dyn RepoLock>),
            knowledge: Some(Arc::clone(&self.knowledge) as Arc<dyn KnowledgeBase>),
            notifier: Some(Arc::clone(&self.notifier) as Arc<dyn Notifier>),
        }
    }

    pub fn cancel_from(&self, check: usize) {
        *self.cancellation.cancel_from.lock().expect("lock") = Some(check);
    }
}

/// Configuration with no backoff wait.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.environment_backoff_secs = 0;
    config
}

pub fn context() -> ExecutionContext {
    ExecutionContext::new(
        RepoCoordinates::new("acme", "widgets"),
        "Add a paginated list endpoint to the widget API",
    )
    .with_tracker("ISSUE-42")
    .with_job(JobHandle("job-1".to_owned()))
}
