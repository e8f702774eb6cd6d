pub mod artifact;
pub mod change_set;
pub mod plan;
pub mod planner;
pub mod recording;
pub mod remote;
pub mod report;
pub mod request;

pub use artifact::{
    placeholder_embedding, Artifact, ArtifactStore, InMemoryArtifactStore, EMBEDDING_DIM,
};
pub use change_set::ChangeSet;
pub use plan::{Agent, Plan, Task};
pub use planner::Planner;
pub use recording::{
    CorrelationId, Direction, EventType, RecordedEvent, Sanitizer, CORRELATION_ID_HEADER,
};
pub use remote::{
    CommentPosted, CommentResult, FailureKind, PullRequestCreated, PullRequestResult,
    RemoteFailure,
};
pub use report::{
    pr_artifact_key, Review, ReviewComment, Severity, TestReport, TestStatus, TestTarget,
};
pub use request::{Priority, RepoSlug, RepoSlugError, Request, RequestType, UnknownVariant};
