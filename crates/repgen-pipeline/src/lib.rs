pub mod catalog;
pub mod clock;
pub mod coerce;
pub mod document;
pub mod fallback;
pub mod orchestrator;
pub mod records;
pub mod secrets;
pub mod service;
pub mod stage;
pub mod storage;
pub mod tools;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::catalog::ComponentCatalog;
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::coerce::{Coercible, RawOutput, coerce};
    pub use crate::document::{ComponentKind, ComponentSpec, ContentSource, ReportDocument};
    pub use crate::fallback::{FallbackAssembler, FallbackStyle};
    pub use crate::orchestrator::{PipelineOptions, PipelineRun, ReportPipeline, ValidationOutcome};
    pub use crate::service::{GenerationMode, ReportService};
    pub use crate::stage::{StageId, StageInput, StageRunner};
    pub use crate::storage::{HttpObjectStore, MemoryObjectStore, ObjectStore, S3Path};
    pub use crate::secrets::{EnvSecretStore, FileSecretStore, SecretStore};
}
