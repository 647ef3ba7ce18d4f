//! Workflow definition types — `Step`, `StepType`, `ExecutionPolicy`, and
//! `Workflow` itself, with construction-time validation.
//!
//! A step is one of five kinds, and dependencies are expressed as a
//! `depends_on` list rather than a separate edge table.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpineError;

/// The five step kinds a workflow step may be.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepType {
    /// Dispatches a child `WorkSpec(kind=task|operation, name=pipeline_name)`.
    Pipeline {
        pipeline_name: String,
        #[serde(default)]
        kind: PipelineKind,
    },
    /// Runs a registered in-process handler keyed by `handler_name`.
    Lambda { handler_name: String },
    /// Evaluates a registered condition keyed by `condition_name`.
    Choice {
        condition_name: String,
        then_step: String,
        else_step: Option<String>,
    },
    /// Suspends the step for `duration_seconds`.
    Wait { duration_seconds: u64 },
    /// Iterates a registered items provider, invoking a registered handler
    /// per item.
    Map {
        items_name: String,
        body_handler_name: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    #[default]
    Task,
    Operation,
}

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Stop,
    Continue,
}

impl Default for OnFailure {
    fn default() -> Self {
        Self::Stop
    }
}

/// How the engine schedules a workflow's steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionPolicy {
    Sequential,
    Parallel {
        #[serde(default = "default_parallel_width")]
        max_concurrency: usize,
    },
}

fn default_parallel_width() -> usize {
    4
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::Sequential
    }
}

/// One node of a workflow's step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(flatten)]
    pub step_type: StepType,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub config: Value,
}

/// A complete, versioned workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub defaults: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub execution_policy: ExecutionPolicy,
    #[serde(default)]
    pub on_failure: OnFailure,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Construct a workflow, validating its step graph.
    ///
    /// Fails VALIDATION if: `steps` is
    /// empty; two steps share a name; a `depends_on` or choice branch
    /// references an unknown step name; or the dependency graph contains
    /// a cycle.
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        execution_policy: ExecutionPolicy,
        steps: Vec<Step>,
    ) -> Result<Self, SpineError> {
        let workflow = Self {
            name: name.into(),
            domain: domain.into(),
            description: None,
            defaults: Value::Null,
            tags: Vec::new(),
            execution_policy,
            on_failure: OnFailure::default(),
            steps,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    fn validate(&self) -> Result<(), SpineError> {
        if self.steps.is_empty() {
            return Err(SpineError::Validation(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(SpineError::Validation(format!(
                    "duplicate step name '{}'",
                    step.name
                )));
            }
        }

        let names: HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();

        for step in &self.steps {
            for dep in &step.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(SpineError::Validation(format!(
                        "step '{}' depends on unknown step '{dep}'",
                        step.name
                    )));
                }
            }
            if let StepType::Choice { then_step, else_step, .. } = &step.step_type {
                if !names.contains(then_step.as_str()) {
                    return Err(SpineError::Validation(format!(
                        "choice step '{}' references unknown then_step '{then_step}'",
                        step.name
                    )));
                }
                if let Some(else_step) = else_step {
                    if !names.contains(else_step.as_str()) {
                        return Err(SpineError::Validation(format!(
                            "choice step '{}' references unknown else_step '{else_step}'",
                            step.name
                        )));
                    }
                }
            }
        }

        detect_cycle(&self.steps)?;
        Ok(())
    }
}

fn detect_cycle(steps: &[Step]) -> Result<(), SpineError> {
    let adjacency: HashMap<&str, Vec<&str>> = steps
        .iter()
        .map(|s| (s.name.as_str(), s.depends_on.iter().map(String::as_str).collect()))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> =
        steps.iter().map(|s| (s.name.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), SpineError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(SpineError::Validation(format!(
                    "dependency cycle detected at step '{node}'"
                )))
            }
            _ => {}
        }
        marks.insert(node, Mark::Visiting);
        if let Some(deps) = adjacency.get(node) {
            for dep in deps {
                visit(dep, adjacency, marks)?;
            }
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    for step in steps {
        visit(step.name.as_str(), &adjacency, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lambda_step(name: &str, depends_on: Vec<&str>) -> Step {
        Step {
            name: name.to_string(),
            step_type: StepType::Lambda { handler_name: "noop".into() },
            depends_on: depends_on.into_iter().map(String::from).collect(),
            config: Value::Null,
        }
    }

    #[test]
    fn empty_steps_fails_validation() {
        let err = Workflow::new("empty", "test", ExecutionPolicy::Sequential, vec![]).unwrap_err();
        assert!(matches!(err, SpineError::Validation(_)));
    }

    #[test]
    fn duplicate_step_name_fails_validation() {
        let steps = vec![lambda_step("a", vec![]), lambda_step("a", vec![])];
        let err = Workflow::new("dup", "test", ExecutionPolicy::Sequential, steps).unwrap_err();
        assert!(matches!(err, SpineError::Validation(_)));
    }

    #[test]
    fn unknown_dependency_fails_validation() {
        let steps = vec![lambda_step("a", vec!["ghost"])];
        let err = Workflow::new("bad-dep", "test", ExecutionPolicy::Sequential, steps).unwrap_err();
        assert!(matches!(err, SpineError::Validation(_)));
    }

    #[test]
    fn choice_referencing_unknown_step_fails_validation() {
        let steps = vec![
            Step {
                name: "check".into(),
                step_type: StepType::Choice {
                    condition_name: "always_true".into(),
                    then_step: "ghost".into(),
                    else_step: None,
                },
                depends_on: vec![],
                config: Value::Null,
            },
            lambda_step("ghost_sibling", vec![]),
        ];
        let err = Workflow::new("bad-choice", "test", ExecutionPolicy::Sequential, steps).unwrap_err();
        assert!(matches!(err, SpineError::Validation(_)));
    }

    #[test]
    fn cyclic_dependency_fails_validation() {
        let steps = vec![lambda_step("a", vec!["b"]), lambda_step("b", vec!["a"])];
        let err = Workflow::new("cycle", "test", ExecutionPolicy::Sequential, steps).unwrap_err();
        assert!(matches!(err, SpineError::Validation(_)));
    }

    #[test]
    fn valid_workflow_constructs() {
        let steps = vec![lambda_step("a", vec![]), lambda_step("b", vec!["a"])];
        let wf = Workflow::new("ok", "test", ExecutionPolicy::Sequential, steps).unwrap();
        assert_eq!(wf.steps.len(), 2);
    }
}
