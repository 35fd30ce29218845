//! Harvester engine: drives a portal session through the scan state machine.
//!
//! The engine owns every side effect: UI driving through [`UiDriver`],
//! downloads, archive extraction and publishing. Scan decisions live in
//! `harvester_core`.
mod completion;
mod diagnostics;
mod driver;
mod engine;
mod error;
mod filename;
mod materialize;
mod orchestrator;
mod paginator;
mod persist;
mod progress;
mod publish;
pub mod replay;
mod session;
mod settings;
mod transfer;
mod wait;

pub use completion::{classify_status, CompletionMonitor, CompletionOutcome, StatusMarker};
pub use diagnostics::{capture_failure_screenshot, screenshot_file_name};
pub use driver::{
    ClickModifiers, DriverError, DriverEvent, ElementHandle, EventKind, FileChooser,
    PendingDownload, UiDriver,
};
pub use engine::{harvest, send, Harvester};
pub use error::{FailureKind, HarvestError};
pub use filename::safe_file_name;
pub use materialize::{extract_all, ArchiveMaterializer, MaterializeError};
pub use orchestrator::ItemDownloadOrchestrator;
pub use paginator::{FeedPaginator, VisibleEntry};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, HarvestEvent, ItemStage, NullProgressSink, ProgressSink};
pub use publish::{
    sha256_hex, storage_key, write_manifest, DirectoryUploadSink, UploadSink, MANIFEST_FILENAME,
};
pub use session::{authenticate, with_session};
pub use settings::{
    load_config, parse_config, FailurePolicy, HarvestSettings, HarvesterConfig, PortalSelectors,
    SessionConfig, SettingsError, PASSWORD_ENV,
};
pub use transfer::send_transfer;
