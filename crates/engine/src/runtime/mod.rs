//! Runtime Adapter Router — the `container-job` workload path. This is
//! deliberately boundary-only: concrete adapters (Docker,
//! Kubernetes, a cloud batch API) are external collaborators this crate
//! never implements, only routes to and validates against.

pub mod error;
pub mod router;
pub mod validator;

pub use error::{JobError, JobErrorCategory};
pub use router::{
    AdapterCapabilities, AdapterConstraints, ContainerJobSpec, HealthStatus, JobHandle, JobStatus, ResourceRequest,
    Router, RuntimeAdapter,
};
pub use validator::SpecValidator;
