//! Request decomposition.
//!
//! The planner is a pure mapping from a [`Request`] to a [`Plan`]. The only
//! non-deterministic part is the freshly generated plan id.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::plan::{Agent, Plan, Task};
use crate::request::{Priority, Request, RequestType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    /// Turn a request into an ordered task list.
    ///
    /// Order reflects the intended logical dependency (tests before review) but
    /// nothing downstream enforces it.
    pub fn decompose(&self, request: &Request) -> Plan {
        let pr_label = match request.pr_number {
            Some(number) => format!("PR #{}", number),
            None => "PR".to_string(),
        };

        let specs = match request.request_type {
            RequestType::ReviewPr => vec![
                (
                    Agent::Tester,
                    format!("Run tests for {}", pr_label),
                    Priority::High,
                ),
                (
                    Agent::Reviewer,
                    format!(
                        "Review {} focusing on: {}",
                        pr_label, request.instructions
                    ),
                    Priority::High,
                ),
            ],
            RequestType::AutoFix => vec![
                (
                    Agent::Coder,
                    format!("Create fix for issue: {}", request.instructions),
                    Priority::High,
                ),
                (
                    Agent::Tester,
                    "Run tests for the new branch".to_string(),
                    Priority::High,
                ),
                (Agent::Reviewer, "Review the fix".to_string(), Priority::High),
            ],
            RequestType::Other => vec![(
                Agent::Reviewer,
                "Generic review".to_string(),
                Priority::Low,
            )],
        };

        let tasks = specs
            .into_iter()
            .enumerate()
            .map(|(index, (agent, instruction, priority))| Task {
                id: format!("t{}", index + 1),
                agent,
                instruction,
                priority,
            })
            .collect();

        Plan {
            plan_id: Uuid::new_v4(),
            tasks,
            context_references: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RepoSlug;
    use proptest::prelude::*;

    fn request(request_type: RequestType) -> Request {
        Request::new(request_type, RepoSlug::new("acme", "widgets"))
    }

    #[test]
    fn test_review_pr_plans_tester_then_reviewer() {
        let plan = Planner::new().decompose(
            &request(RequestType::ReviewPr)
                .with_pr_number(1)
                .with_instructions("Security focus"),
        );

        assert_eq!(plan.agents(), vec![Agent::Tester, Agent::Reviewer]);
        assert_eq!(plan.tasks[0].instruction, "Run tests for PR #1");
        assert_eq!(
            plan.tasks[1].instruction,
            "Review PR #1 focusing on: Security focus"
        );
    }

    #[test]
    fn test_auto_fix_plans_coder_tester_reviewer() {
        let plan = Planner::new()
            .decompose(&request(RequestType::AutoFix).with_instructions("null deref in parser"));

        assert_eq!(
            plan.agents(),
            vec![Agent::Coder, Agent::Tester, Agent::Reviewer]
        );
        assert_eq!(
            plan.tasks[0].instruction,
            "Create fix for issue: null deref in parser"
        );
    }

    #[test]
    fn test_missing_pr_number_omits_number_from_instruction() {
        let plan = Planner::new().decompose(&request(RequestType::ReviewPr));
        assert_eq!(plan.tasks[0].instruction, "Run tests for PR");
    }

    #[test]
    fn test_task_ids_are_unique_within_plan() {
        let plan = Planner::new().decompose(&request(RequestType::AutoFix));
        let ids: Vec<&str> = plan.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_each_plan_gets_fresh_id() {
        let planner = Planner::new();
        let req = request(RequestType::Other);
        assert_ne!(planner.decompose(&req).plan_id, planner.decompose(&req).plan_id);
    }

    #[test]
    fn test_plan_has_no_context_references() {
        let plan = Planner::new().decompose(&request(RequestType::ReviewPr));
        assert!(plan.context_references.is_empty());
    }

    fn arb_request(request_type: RequestType) -> impl Strategy<Value = Request> {
        (proptest::option::of(1u64..100_000), ".*", any::<bool>()).prop_map(
            move |(pr_number, instructions, high)| Request {
                request_type,
                repo: RepoSlug::new("acme", "widgets"),
                pr_number,
                requester: None,
                priority: if high { Priority::High } else { Priority::Low },
                instructions,
            },
        )
    }

    proptest! {
        #[test]
        fn review_pr_always_two_high_priority_tasks(req in arb_request(RequestType::ReviewPr)) {
            let plan = Planner::new().decompose(&req);
            prop_assert_eq!(plan.agents(), vec![Agent::Tester, Agent::Reviewer]);
            prop_assert!(plan.tasks.iter().all(|t| t.priority == Priority::High));
        }

        #[test]
        fn auto_fix_always_three_high_priority_tasks(req in arb_request(RequestType::AutoFix)) {
            let plan = Planner::new().decompose(&req);
            prop_assert_eq!(plan.agents(), vec![Agent::Coder, Agent::Tester, Agent::Reviewer]);
            prop_assert!(plan.tasks.iter().all(|t| t.priority == Priority::High));
        }

        #[test]
        fn other_always_single_low_priority_review(req in arb_request(RequestType::Other)) {
            let plan = Planner::new().decompose(&req);
            prop_assert_eq!(plan.agents(), vec![Agent::Reviewer]);
            prop_assert_eq!(plan.tasks[0].priority, Priority::Low);
        }
    }
}
