//! Narrow-contract task executors driven by the orchestrator.

pub mod coder;
pub mod reviewer;
pub mod tester;

pub use coder::{auto_fix_branch_name, CoderAgent, FixProducer, PlaceholderFixProducer};
pub use reviewer::{format_review_comment, ReviewerAgent};
pub use tester::{format_test_comment, HttpTestRunner, SimulatedTestRunner, TestRunner};
