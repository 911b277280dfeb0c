pub mod archive;
pub mod builder;
pub mod capture;
pub mod catalog;
pub mod copy;
pub mod detect;
pub mod env;
mod error;
pub mod manifest;
pub mod migrate;
pub mod progress;
pub mod reconcile;
pub mod resolve;
pub mod restore;
pub mod sources;
pub mod store;
mod timeouts;
mod types;

pub use builder::{BackupBuilder, BackupOutcome, BackupResults, FailedCapture, SkippedTool};
pub use capture::Capturer;
pub use catalog::{Catalog, ToolCatalogEntry};
pub use detect::{DetectionCache, Detector, parse_detection_output};
pub use error::{BackupError, CaptureError, CatalogError, DetectError, StoreError};
pub use manifest::{Manifest, ToolManifestEntry};
pub use progress::ProgressEvent;
pub use reconcile::{InstalledTool, MissingTool, ReconciliationResult, VersionMismatch, reconcile};
pub use restore::{RestoreEngine, RestoreReport};
pub use sources::{DownloadSource, InstallPlan, InstallSources};
pub use store::{BackupDescriptor, BackupDetails, BackupStore};
pub use timeouts::Timeouts;
pub use types::{
    ArtifactKind, ArtifactSpec, CapturedArtifact, DetectedTool, EnvVar, ToolCapabilities, ToolId,
};
