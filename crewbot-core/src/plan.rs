use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::request::Priority;

/// One of the narrow-contract task executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agent {
    Coder,
    Tester,
    Reviewer,
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::Coder => write!(f, "Coder"),
            Agent::Tester => write!(f, "Tester"),
            Agent::Reviewer => write!(f, "Reviewer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within its plan (`t1`, `t2`, ...).
    pub id: String,
    pub agent: Agent,
    pub instruction: String,
    pub priority: Priority,
}

/// Ordered agent tasks derived from one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub tasks: Vec<Task>,
    pub context_references: BTreeSet<String>,
}

impl Plan {
    pub fn agents(&self) -> Vec<Agent> {
        self.tasks.iter().map(|task| task.agent).collect()
    }
}
