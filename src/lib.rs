//! Core library for BPMN Property Sync.
//! Keeps element extension properties consistent between a diagram's live model and the
//! BPMN XML text, with debounced two-way synchronization and byte-preserving file round-trips.

mod config;
mod debounce;
mod document;
mod error;
mod gui;
mod model;
mod properties;
pub mod statics;
mod sync;
mod validate;
pub mod xml;

pub use config::SyncConfig;
pub use debounce::Debouncer;
pub use document::{LineEnding, LoadedDocument};
pub use error::{SyncError, ValidationError};
pub use gui::run_gui;
pub use model::{ApplyOutcome, ElementModel, ElementRegistry, ModelElement, apply};
pub use properties::{ElementProperties, PropertyCache, is_blank};
pub use sync::{SyncOrchestrator, SyncReport, ViewState};
pub use validate::{PropertyRule, Validator};
pub use xml::{extract, inject};
