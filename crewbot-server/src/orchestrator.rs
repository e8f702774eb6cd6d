//! Turns requests and webhook events into concurrently running agent tasks.
//!
//! `submit` plans the request and spawns one tokio task per planned agent
//! without waiting for any of them. Tasks hand results to each other only
//! through the artifact store, and every task, including one that panics,
//! ends with exactly one [`TaskOutcome`] on the outcome channel.
//!
//! The Tester writes its report and the Reviewer reads one back with no
//! ordering between them. Under [`ReportLookup::Any`] the Reviewer may see no
//! report yet, or a report for an unrelated pull request.

use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::{
    format_review_comment, format_test_comment, CoderAgent, FixProducer, ReviewerAgent,
    TestRunner,
};
use crate::host::RepositoryHost;
use crate::recording::{
    new_event, Direction, EventType, RecordedEvent, RecordingLogger, Sanitizer,
};
use crate::webhook::PullRequestEventPayload;
use crewbot_core::{
    placeholder_embedding, pr_artifact_key, Agent, ArtifactStore, Planner, Priority, RepoSlug,
    Request, RequestType, Task, TestReport, TestTarget,
};

const FIX_TITLE: &str = "Auto-fix";

/// How the Reviewer finds a test report in the artifact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportLookup {
    /// Take whatever single artifact the store returns first.
    #[default]
    Any,
    /// Read the artifact keyed by this request's PR (or branch).
    Keyed,
}

impl FromStr for ReportLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(ReportLookup::Any),
            "keyed" => Ok(ReportLookup::Keyed),
            other => Err(format!(
                "unknown report lookup '{}', expected 'any' or 'keyed'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Used when a webhook payload does not name a usable repository.
    pub default_repo: RepoSlug,
    pub base_branch: String,
    pub report_lookup: ReportLookup,
}

impl OrchestratorSettings {
    pub fn new(default_repo: RepoSlug) -> Self {
        Self {
            default_repo,
            base_branch: "main".to_string(),
            report_lookup: ReportLookup::default(),
        }
    }
}

/// The pluggable agent implementations.
#[derive(Clone)]
pub struct Agents {
    pub test_runner: Arc<dyn TestRunner>,
    pub fix_producer: Arc<dyn FixProducer>,
    pub reviewer: ReviewerAgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub request_id: Uuid,
    pub status: String,
    pub assigned_agents: Vec<Agent>,
}

/// How one spawned task ended. `result` holds a summary or the failure message.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub plan_id: Uuid,
    pub task_id: String,
    pub agent: Agent,
    pub repo: RepoSlug,
    pub pr_number: Option<u64>,
    pub result: Result<String, String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    planner: Planner,
    store: Arc<dyn ArtifactStore>,
    host: Arc<dyn RepositoryHost>,
    agents: Agents,
    coder: CoderAgent,
    settings: OrchestratorSettings,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
    recording_logger: Option<RecordingLogger>,
}

impl Orchestrator {
    /// Returns the orchestrator and the receiving end of its outcome channel.
    pub fn new(
        planner: Planner,
        store: Arc<dyn ArtifactStore>,
        host: Arc<dyn RepositoryHost>,
        agents: Agents,
        settings: OrchestratorSettings,
        recording_logger: Option<RecordingLogger>,
    ) -> (Self, mpsc::UnboundedReceiver<TaskOutcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        let coder = CoderAgent::new(host.clone());

        let orchestrator = Self {
            inner: Arc::new(Inner {
                planner,
                store,
                host,
                agents,
                coder,
                settings,
                outcomes,
                recording_logger,
            }),
        };

        (orchestrator, receiver)
    }

    /// Plan `request`, spawn its tasks and return without waiting for them.
    pub fn submit(&self, request: Request) -> SubmitResponse {
        let plan = self.inner.planner.decompose(&request);
        let assigned_agents = plan.agents();

        info!(
            "Plan {} for {} ({:?}): {:?}",
            plan.plan_id, request.repo, request.request_type, assigned_agents
        );
        self.record(
            new_event(
                &plan.plan_id.to_string(),
                EventType::RequestAccepted,
                Direction::Request,
                "request_review",
                json!({ "request": &request, "plan": &plan }),
            ),
            &request.repo,
            request.pr_number,
        );

        self.dispatch(plan.plan_id, plan.tasks, request);

        SubmitResponse {
            request_id: plan.plan_id,
            status: "queued".to_string(),
            assigned_agents,
        }
    }

    /// Schedule a test run and a review for opened, synchronized or reopened
    /// pull requests. Returns whether anything was scheduled.
    pub fn handle_webhook_event(&self, event_type: &str, payload: &serde_json::Value) -> bool {
        if event_type != "pull_request" {
            debug!("Ignoring {} webhook event", event_type);
            return false;
        }

        let event: PullRequestEventPayload = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Unparseable pull_request payload: {}", e);
                return false;
            }
        };

        if !matches!(
            event.action.as_deref(),
            Some("opened") | Some("synchronize") | Some("reopened")
        ) {
            debug!("Ignoring pull_request action {:?}", event.action);
            return false;
        }

        let Some(pr_number) = event.pull_request.map(|pr| pr.number) else {
            warn!("pull_request event without a pull request number");
            return false;
        };

        let full_name = event.repository.and_then(|r| r.full_name);
        let repo = match full_name.as_deref().map(str::parse::<RepoSlug>) {
            Some(Ok(repo)) => repo,
            Some(Err(e)) => {
                warn!(
                    "{}; using default repository {}",
                    e, self.inner.settings.default_repo
                );
                self.inner.settings.default_repo.clone()
            }
            None => {
                debug!(
                    "pull_request event names no repository; using default repository {}",
                    self.inner.settings.default_repo
                );
                self.inner.settings.default_repo.clone()
            }
        };

        let plan_id = Uuid::new_v4();
        info!(
            "Scheduling webhook-triggered test and review for PR #{} in {} ({})",
            pr_number, repo, plan_id
        );

        let request = Request::new(RequestType::ReviewPr, repo).with_pr_number(pr_number);
        let tasks = vec![
            Task {
                id: "t1".to_string(),
                agent: Agent::Tester,
                instruction: "Webhook-triggered test run".to_string(),
                priority: Priority::High,
            },
            Task {
                id: "t2".to_string(),
                agent: Agent::Reviewer,
                instruction: "Webhook-triggered review".to_string(),
                priority: Priority::High,
            },
        ];
        self.dispatch(plan_id, tasks, request);

        true
    }

    fn dispatch(&self, plan_id: Uuid, tasks: Vec<Task>, request: Request) {
        let request = Arc::new(request);

        for task in tasks {
            let orchestrator = self.clone();
            let request = request.clone();

            tokio::spawn(async move {
                let task_id = task.id.clone();
                let agent = task.agent;

                // The inner spawn turns a panic into a JoinError instead of a lost outcome
                let worker = {
                    let orchestrator = orchestrator.clone();
                    let request = request.clone();
                    tokio::spawn(
                        async move { orchestrator.run_task(plan_id, &task, &request).await },
                    )
                };

                let result = match worker.await {
                    Ok(result) => result,
                    Err(e) => Err(format!("task aborted: {}", e)),
                };

                orchestrator.report(TaskOutcome {
                    plan_id,
                    task_id,
                    agent,
                    repo: request.repo.clone(),
                    pr_number: request.pr_number,
                    result,
                });
            });
        }
    }

    async fn run_task(
        &self,
        plan_id: Uuid,
        task: &Task,
        request: &Request,
    ) -> Result<String, String> {
        let correlation_id = plan_id.to_string();
        info!(
            "Running {} task {} of plan {}: {}",
            task.agent, task.id, plan_id, task.instruction
        );

        match task.agent {
            Agent::Tester => self.run_tester(&correlation_id, request).await,
            Agent::Reviewer => self.run_reviewer(&correlation_id, request).await,
            Agent::Coder => self.run_coder(&correlation_id, task, request).await,
        }
    }

    async fn run_tester(&self, correlation_id: &str, request: &Request) -> Result<String, String> {
        // Without a PR (auto_fix plans) the fix branch does not exist yet, so the
        // base branch is tested instead.
        let target = match request.pr_number {
            Some(number) => TestTarget::PullRequest(number),
            None => TestTarget::Branch(self.inner.settings.base_branch.clone()),
        };

        let report = self
            .inner
            .agents
            .test_runner
            .run_tests(&request.repo, &target)
            .await;

        let report_value = serde_json::to_value(&report)
            .map_err(|e| format!("Failed to serialize test report: {}", e))?;
        self.inner
            .store
            .upsert(
                &target.artifact_key(),
                json!({ "report": report_value }),
                placeholder_embedding(),
            )
            .await;

        match target {
            TestTarget::PullRequest(number) => {
                let body = format_test_comment(number, &report);
                let posted = self
                    .inner
                    .host
                    .comment_on_pr(Some(correlation_id), &request.repo, number, &body)
                    .await
                    .map_err(|failure| failure.to_string())?;
                Ok(format!(
                    "tests {} for PR #{}; report posted at {}",
                    report.status, number, posted.comment_url
                ))
            }
            TestTarget::Branch(name) => Ok(format!(
                "tests {} on base branch {}; no pull request to comment on",
                report.status, name
            )),
        }
    }

    async fn run_reviewer(
        &self,
        correlation_id: &str,
        request: &Request,
    ) -> Result<String, String> {
        let report = self.lookup_report(request).await;
        let review = self.inner.agents.reviewer.review_pr(
            &request.repo,
            request.pr_number,
            None,
            report.as_ref(),
        );

        match request.pr_number {
            Some(number) => {
                let body = format_review_comment(&review);
                let posted = self
                    .inner
                    .host
                    .comment_on_pr(Some(correlation_id), &request.repo, number, &body)
                    .await
                    .map_err(|failure| failure.to_string())?;
                Ok(format!(
                    "review for PR #{} (approve: {}) posted at {}",
                    number, review.approve, posted.comment_url
                ))
            }
            None => Ok(format!(
                "review without a pull request (approve: {})",
                review.approve
            )),
        }
    }

    async fn run_coder(
        &self,
        correlation_id: &str,
        task: &Task,
        request: &Request,
    ) -> Result<String, String> {
        let changes = self
            .inner
            .agents
            .fix_producer
            .produce_fix(&request.repo, &task.instruction)
            .await;

        let pr = self
            .inner
            .coder
            .create_fix_pr(
                Some(correlation_id),
                &request.repo,
                &self.inner.settings.base_branch,
                &changes,
                FIX_TITLE,
                &request.instructions,
            )
            .await
            .map_err(|failure| failure.to_string())?;

        Ok(format!(
            "opened PR #{} from {}: {}",
            pr.number, pr.branch, pr.url
        ))
    }

    async fn lookup_report(&self, request: &Request) -> Option<TestReport> {
        let artifact = match self.inner.settings.report_lookup {
            ReportLookup::Any => self
                .inner
                .store
                .query(&placeholder_embedding(), 1)
                .await
                .into_iter()
                .next(),
            ReportLookup::Keyed => {
                let key = match request.pr_number {
                    Some(number) => pr_artifact_key(number),
                    None => TestTarget::Branch(self.inner.settings.base_branch.clone())
                        .artifact_key(),
                };
                self.inner.store.get(&key).await
            }
        }?;

        let report = artifact.payload.get("report")?.clone();
        match serde_json::from_value(report) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Ignoring malformed report in artifact {}: {}", artifact.key, e);
                None
            }
        }
    }

    fn report(&self, outcome: TaskOutcome) {
        self.record(
            new_event(
                &outcome.plan_id.to_string(),
                EventType::TaskOutcome,
                Direction::Internal,
                outcome.agent.to_string(),
                serde_json::to_value(&outcome).unwrap_or(serde_json::Value::Null),
            )
            .with_metadata("task_id", &outcome.task_id),
            &outcome.repo,
            outcome.pr_number,
        );

        if let Err(e) = self.inner.outcomes.send(outcome) {
            error!(
                "Outcome channel closed, dropping outcome of task {}: {:?}",
                e.0.task_id, e.0.result
            );
        }
    }

    /// Sanitize the event data, tag it with the repository and PR, and record it.
    fn record(&self, event: RecordedEvent, repo: &RepoSlug, pr_number: Option<u64>) {
        let Some(logger) = &self.inner.recording_logger else {
            return;
        };

        let mut event = RecordedEvent {
            data: Sanitizer::sanitize_json(&event.data),
            ..event
        }
        .with_metadata("repo", repo);
        if let Some(number) = pr_number {
            event = event.with_metadata("pr_number", number);
        }
        logger.record(event);
    }
}

/// Drain the outcome channel into the log until every sender is gone.
pub async fn log_outcomes(mut receiver: mpsc::UnboundedReceiver<TaskOutcome>) {
    while let Some(outcome) = receiver.recv().await {
        match &outcome.result {
            Ok(summary) => info!(
                "{} task {} of plan {} for {} succeeded: {}",
                outcome.agent, outcome.task_id, outcome.plan_id, outcome.repo, summary
            ),
            Err(message) => error!(
                "{} task {} of plan {} for {} failed: {}",
                outcome.agent, outcome.task_id, outcome.plan_id, outcome.repo, message
            ),
        }
    }
    info!("Outcome channel closed");
}
