//! Services module
//!
//! Domain logic for the writing workspace and the coordinator that keeps it
//! in sync with durable storage.

pub mod backup;
pub mod context;
pub mod entities;
pub mod generation;
pub mod lifecycle;
pub mod persistence;
pub mod session;
pub mod settings;
pub mod workspace;

pub use backup::{BackupInfo, BackupService};
pub use entities::EntityStore;
pub use generation::{
    GenerationClient, GenerationContext, GenerationOutcome, GenerationRequest, GenerationTicket,
};
pub use lifecycle::{lifecycle_channel, Coordinator, LifecycleSignal};
pub use session::{SessionState, WritingSession};
pub use settings::{AppSettings, GenerationConfigPatch, GenerationServiceConfig, ThemeMode};
pub use workspace::Workspace;
