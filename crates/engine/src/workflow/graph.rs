//! Step graph scheduling — topological order for SEQUENTIAL workflows,
//! dependency-frontier computation for PARALLEL ones.
//!
//! Kahn's-algorithm DAG validation, generalized from a flat node/edge
//! list onto steps whose dependencies are named in `depends_on`.

use std::collections::{HashMap, HashSet};

use crate::error::SpineError;
use crate::workflow::definition::{Step, Workflow};

/// A step's terminal disposition as tracked by the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
    Cancelled,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed | Self::Cancelled)
    }
}

/// Topological order respecting `depends_on`, ties broken by declaration
/// order (Kahn's algorithm, seeded and drained in declaration order so a
/// deterministic tie-break falls out for free).
pub fn topological_order(workflow: &Workflow) -> Result<Vec<String>, SpineError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in &workflow.steps {
        in_degree.entry(step.name.as_str()).or_insert(0);
        dependents.entry(step.name.as_str()).or_default();
    }
    for step in &workflow.steps {
        for dep in &step.depends_on {
            *in_degree.get_mut(step.name.as_str()).unwrap() += 1;
            dependents.get_mut(dep.as_str()).unwrap().push(step.name.as_str());
        }
    }

    let mut ready: Vec<&str> = workflow
        .steps
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| in_degree[name] == 0)
        .collect();

    let mut order = Vec::with_capacity(workflow.steps.len());
    let mut cursor = 0;
    while cursor < ready.len() {
        let name = ready[cursor];
        cursor += 1;
        order.push(name.to_string());
        for &dependent in &dependents[name] {
            let degree = in_degree.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != workflow.steps.len() {
        return Err(SpineError::Validation(format!(
            "workflow '{}' has a dependency cycle",
            workflow.name
        )));
    }
    Ok(order)
}

/// Steps whose dependencies have all COMPLETED and which are themselves
/// still PENDING — the next batch a PARALLEL scheduler may launch
/// concurrently. A SKIPPED dependency does *not* satisfy readiness:
/// downstream steps of a skipped predecessor are themselves skipped
/// rather than run (see [`propagate_skips`]).
pub fn frontier<'a>(workflow: &'a Workflow, states: &HashMap<String, StepState>) -> Vec<&'a Step> {
    workflow
        .steps
        .iter()
        .filter(|step| matches!(states.get(&step.name), None | Some(StepState::Pending)))
        .filter(|step| step.depends_on.iter().all(|dep| matches!(states.get(dep), Some(StepState::Completed))))
        .collect()
}

/// Steps that can never run because a dependency failed, was cancelled,
/// or was itself SKIPPED — propagated transitively so e.g. the untaken
/// branch of a CHOICE step skips its whole downstream chain.
pub fn propagate_skips(workflow: &Workflow, states: &HashMap<String, StepState>) -> HashSet<String> {
    let mut skipped = HashSet::new();
    loop {
        let mut changed = false;
        for step in &workflow.steps {
            if states.contains_key(&step.name) || skipped.contains(&step.name) {
                continue;
            }
            let blocked = step.depends_on.iter().any(|dep| {
                matches!(states.get(dep), Some(StepState::Failed) | Some(StepState::Cancelled) | Some(StepState::Skipped))
                    || skipped.contains(dep)
            });
            if blocked {
                skipped.insert(step.name.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::{ExecutionPolicy, StepType};
    use serde_json::Value;

    fn lambda_step(name: &str, depends_on: Vec<&str>) -> Step {
        Step {
            name: name.to_string(),
            step_type: StepType::Lambda { handler_name: "noop".into() },
            depends_on: depends_on.into_iter().map(String::from).collect(),
            config: Value::Null,
        }
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let wf = Workflow::new(
            "wf",
            "test",
            ExecutionPolicy::Sequential,
            vec![lambda_step("c", vec!["b"]), lambda_step("a", vec![]), lambda_step("b", vec!["a"])],
        )
        .unwrap();
        let order = topological_order(&wf).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn frontier_only_includes_steps_with_satisfied_dependencies() {
        let wf = Workflow::new(
            "wf",
            "test",
            ExecutionPolicy::Parallel { max_concurrency: 2 },
            vec![lambda_step("a", vec![]), lambda_step("b", vec![]), lambda_step("c", vec!["a", "b"])],
        )
        .unwrap();

        let states = HashMap::new();
        let first = frontier(&wf, &states);
        assert_eq!(first.iter().map(|s| s.name.as_str()).collect::<HashSet<_>>(), HashSet::from(["a", "b"]));

        let mut states = HashMap::new();
        states.insert("a".to_string(), StepState::Completed);
        states.insert("b".to_string(), StepState::Completed);
        let second = frontier(&wf, &states);
        assert_eq!(second.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn unreachable_steps_propagate_transitively() {
        let wf = Workflow::new(
            "wf",
            "test",
            ExecutionPolicy::Sequential,
            vec![lambda_step("a", vec![]), lambda_step("b", vec!["a"]), lambda_step("c", vec!["b"])],
        )
        .unwrap();
        let mut states = HashMap::new();
        states.insert("a".to_string(), StepState::Failed);
        let skipped = propagate_skips(&wf, &states);
        assert_eq!(skipped, HashSet::from(["b".to_string(), "c".to_string()]));
    }
}
