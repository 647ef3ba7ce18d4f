//! `SpecValidator` — checks a `ContainerJobSpec` against an adapter's
//! advertised capabilities and constraints. Collects every violation
//! instead of failing on the first one, so a caller can surface the
//! whole list in one VALIDATION error.

use super::error::JobError;
use super::router::{AdapterCapabilities, AdapterConstraints, ContainerJobSpec};

pub struct SpecValidator;

impl SpecValidator {
    /// Returns the list of violations, empty if the job is runnable on
    /// an adapter with these capabilities/constraints.
    pub fn validate(
        spec: &ContainerJobSpec,
        capabilities: &AdapterCapabilities,
        constraints: &AdapterConstraints,
    ) -> Vec<String> {
        let mut violations = Vec::new();

        if spec.resources.gpu.is_some() && !capabilities.supports_gpu {
            violations.push("adapter does not support GPU resources".to_string());
        }
        if !spec.volumes.is_empty() && !capabilities.supports_volumes {
            violations.push("adapter does not support volumes".to_string());
        }
        if !spec.sidecars.is_empty() && !capabilities.supports_sidecars {
            violations.push("adapter does not support sidecars".to_string());
        }
        if !spec.init_containers.is_empty() && !capabilities.supports_init_containers {
            violations.push("adapter does not support init containers".to_string());
        }

        if let Some(max_env) = constraints.max_env_var_count {
            if spec.env.len() as u32 > max_env {
                violations.push(format!("env var count {} exceeds adapter limit {}", spec.env.len(), max_env));
            }
        }
        if let Some(max_timeout) = constraints.max_timeout_seconds {
            if let Some(timeout) = spec.timeout_seconds {
                if timeout > max_timeout {
                    violations.push(format!("timeout_seconds {timeout} exceeds adapter limit {max_timeout}"));
                }
            }
        }
        if let Some(max_sidecars) = constraints.max_sidecars {
            if spec.sidecars.len() as u32 > max_sidecars {
                violations.push(format!("sidecar count {} exceeds adapter limit {}", spec.sidecars.len(), max_sidecars));
            }
        }

        if let Some(max_cost) = spec.max_cost_usd {
            if max_cost < 0.0 {
                violations.push("max_cost_usd must not be negative".to_string());
            }
        }

        violations
    }

    /// Runs `validate` and joins any violations into a single VALIDATION
    /// `JobError(retryable=false)`.
    pub fn validate_or_err(
        spec: &ContainerJobSpec,
        capabilities: &AdapterCapabilities,
        constraints: &AdapterConstraints,
    ) -> Result<(), JobError> {
        let violations = Self::validate(spec, capabilities, constraints);
        if violations.is_empty() {
            return Ok(());
        }
        Err(JobError::validation(violations.join("; ")).with_retryable(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec() -> ContainerJobSpec {
        ContainerJobSpec {
            name: "job".into(),
            image: "alpine:3".into(),
            command: vec!["echo".into(), "hi".into()],
            env: HashMap::new(),
            resources: super::super::router::ResourceRequest { cpu: None, memory: None, gpu: None },
            volumes: Vec::new(),
            sidecars: Vec::new(),
            init_containers: Vec::new(),
            timeout_seconds: None,
            max_cost_usd: None,
            runtime: None,
        }
    }

    fn caps(gpu: bool) -> AdapterCapabilities {
        AdapterCapabilities {
            supports_gpu: gpu,
            supports_volumes: false,
            supports_sidecars: false,
            supports_init_containers: false,
        }
    }

    #[test]
    fn gpu_request_against_adapter_without_gpu_is_a_violation() {
        let mut s = spec();
        s.resources.gpu = Some("1".to_string());
        let violations = SpecValidator::validate(&s, &caps(false), &AdapterConstraints::default());
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn negative_max_cost_is_rejected() {
        let mut s = spec();
        s.max_cost_usd = Some(-1.0);
        let violations = SpecValidator::validate(&s, &caps(true), &AdapterConstraints::default());
        assert!(violations.iter().any(|v| v.contains("max_cost_usd")));
    }

    #[test]
    fn clean_spec_has_no_violations() {
        let s = spec();
        let violations = SpecValidator::validate(&s, &caps(true), &AdapterConstraints::default());
        assert!(violations.is_empty());
    }
}
