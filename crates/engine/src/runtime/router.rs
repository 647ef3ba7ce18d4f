//! Runtime Adapter Router — routes `container-job` workloads to a named
//! adapter (Docker, Kubernetes, a cloud batch service, …). Only the
//! adapter *contract* lives here; concrete adapters are external
//! collaborators, treated as plug-ins behind a trait the same way the
//! executor abstraction treats concrete executors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::JobError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub gpu: Option<String>,
}

/// One container-job submission. `runtime` is an optional hint naming
/// the adapter to route to; absent, the router's default is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerJobSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub resources: ResourceRequest,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub sidecars: Vec<String>,
    #[serde(default)]
    pub init_containers: Vec<String>,
    pub timeout_seconds: Option<i64>,
    pub max_cost_usd: Option<f64>,
    pub runtime: Option<String>,
}

/// Feature flags an adapter advertises so the validator can reject specs
/// it can't satisfy before ever calling `submit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterCapabilities {
    pub supports_gpu: bool,
    pub supports_volumes: bool,
    pub supports_sidecars: bool,
    pub supports_init_containers: bool,
}

/// Numeric limits an adapter enforces. `None` means unconstrained.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterConstraints {
    pub max_env_var_count: Option<u32>,
    pub max_timeout_seconds: Option<i64>,
    pub max_sidecars: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A handle to a running (or completed) container job, returned by
/// `submit` and passed back into `status`/`logs`/`cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// The contract every container-runtime adapter satisfies. Adapters are
/// external collaborators (Docker, Kubernetes, a cloud batch API); this
/// crate only routes to and validates against them.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    fn runtime_name(&self) -> &str;
    fn capabilities(&self) -> AdapterCapabilities;
    fn constraints(&self) -> AdapterConstraints;

    async fn submit(&self, spec: &ContainerJobSpec) -> Result<JobHandle, JobError>;
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, JobError>;
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError>;
    async fn health(&self) -> HealthStatus;
}

/// Registry of named adapters. The first one registered becomes the
/// default, mirroring the handler registry's `kind:__all__` fallback:
/// callers that don't care about the concrete runtime just get
/// `route()`'d somewhere sane.
#[derive(Default, Clone)]
pub struct Router {
    adapters: HashMap<String, Arc<dyn RuntimeAdapter>>,
    default: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn RuntimeAdapter>) {
        let name = adapter.runtime_name().to_string();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.adapters.insert(name, adapter);
    }

    pub fn unregister(&mut self, name: &str) {
        self.adapters.remove(name);
        if self.default.as_deref() == Some(name) {
            self.default = self.adapters.keys().next().cloned();
        }
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), JobError> {
        if !self.adapters.contains_key(name) {
            return Err(JobError::not_found(format!("no runtime adapter registered as '{name}'")));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    /// Routes a spec to its named adapter, or the default when
    /// `spec.runtime` is unset.
    pub fn route(&self, spec: &ContainerJobSpec) -> Result<Arc<dyn RuntimeAdapter>, JobError> {
        let name = match &spec.runtime {
            Some(name) => name.clone(),
            None => self
                .default
                .clone()
                .ok_or_else(|| JobError::not_found("no default runtime adapter registered"))?,
        };
        self.adapters
            .get(&name)
            .cloned()
            .ok_or_else(|| JobError::not_found(format!("no runtime adapter registered as '{name}'")))
    }

    /// Validates and submits in one call, so callers can't skip the
    /// validation step before reaching the adapter.
    pub async fn submit(&self, spec: &ContainerJobSpec) -> Result<JobHandle, JobError> {
        let adapter = self.route(spec)?;
        super::validator::SpecValidator::validate_or_err(spec, &adapter.capabilities(), &adapter.constraints())?;
        adapter.submit(spec).await
    }

    /// Fans a health probe out to every registered adapter.
    pub async fn health_all(&self) -> HashMap<String, HealthStatus> {
        let mut out = HashMap::with_capacity(self.adapters.len());
        for (name, adapter) in &self.adapters {
            out.insert(name.clone(), adapter.health().await);
        }
        out
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAdapter {
        name: String,
        caps: AdapterCapabilities,
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl RuntimeAdapter for FakeAdapter {
        fn runtime_name(&self) -> &str {
            &self.name
        }
        fn capabilities(&self) -> AdapterCapabilities {
            self.caps
        }
        fn constraints(&self) -> AdapterConstraints {
            AdapterConstraints::default()
        }
        async fn submit(&self, _spec: &ContainerJobSpec) -> Result<JobHandle, JobError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(JobHandle(format!("{}-job", self.name)))
        }
        async fn status(&self, _handle: &JobHandle) -> Result<JobStatus, JobError> {
            Ok(JobStatus::Running)
        }
        async fn cancel(&self, _handle: &JobHandle) -> Result<(), JobError> {
            Ok(())
        }
        async fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    fn spec(runtime: Option<&str>) -> ContainerJobSpec {
        ContainerJobSpec {
            name: "job".into(),
            image: "alpine:3".into(),
            command: vec!["true".into()],
            env: HashMap::new(),
            resources: ResourceRequest::default(),
            volumes: Vec::new(),
            sidecars: Vec::new(),
            init_containers: Vec::new(),
            timeout_seconds: None,
            max_cost_usd: None,
            runtime: runtime.map(String::from),
        }
    }

    #[tokio::test]
    async fn first_registered_adapter_becomes_default() {
        let mut router = Router::new();
        router.register(Arc::new(FakeAdapter {
            name: "docker".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));
        router.register(Arc::new(FakeAdapter {
            name: "k8s".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));

        let adapter = router.route(&spec(None)).unwrap();
        assert_eq!(adapter.runtime_name(), "docker");
    }

    #[tokio::test]
    async fn explicit_runtime_hint_overrides_default() {
        let mut router = Router::new();
        router.register(Arc::new(FakeAdapter {
            name: "docker".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));
        router.register(Arc::new(FakeAdapter {
            name: "k8s".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));

        let adapter = router.route(&spec(Some("k8s"))).unwrap();
        assert_eq!(adapter.runtime_name(), "k8s");
    }

    #[tokio::test]
    async fn unknown_runtime_hint_is_not_found() {
        let router = Router::new();
        let err = router.route(&spec(Some("nope"))).unwrap_err();
        assert_eq!(err.category, super::super::error::JobErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn submit_rejects_spec_the_adapter_cannot_satisfy() {
        let mut router = Router::new();
        router.register(Arc::new(FakeAdapter {
            name: "docker".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));
        let mut s = spec(None);
        s.resources.gpu = Some("1".into());
        let err = router.submit(&s).await.unwrap_err();
        assert_eq!(err.category, super::super::error::JobErrorCategory::Validation);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn health_all_reports_every_registered_adapter() {
        let mut router = Router::new();
        router.register(Arc::new(FakeAdapter {
            name: "docker".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));
        router.register(Arc::new(FakeAdapter {
            name: "k8s".into(),
            caps: AdapterCapabilities::default(),
            submissions: AtomicUsize::new(0),
        }));
        let health = router.health_all().await;
        assert_eq!(health.len(), 2);
    }
}
