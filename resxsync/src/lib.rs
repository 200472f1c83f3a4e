#![forbid(unsafe_code)]
//! Resource entity model and interchange synchronization for per-culture
//! `.resx` files.
//!
//! A *resource entity* is one neutral file (`Resources.resx`) plus its
//! culture-specific siblings (`Resources.de.resx`, `Resources.fr-FR.resx`).
//! The crate loads entities from a project tree, edits them with
//! format-preserving writes, and keeps them in sync with XLIFF 1.2
//! interchange files used by translation tooling.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resxsync::{CancellationToken, Configuration, CultureKey, ResourceManager, SyncOptions};
//!
//! let root = "path/to/solution";
//! let mut manager = ResourceManager::new(Configuration::discover(root)?);
//! manager.load(root, &CancellationToken::new())?;
//!
//! // Mirror every entity into `<base>.de.xlf` and pull translations back.
//! let de = CultureKey::parse("de")?;
//! for report in manager.synchronize(&de, SyncOptions::default())? {
//!     println!("{}: {} units added", report.entity, report.added);
//! }
//! manager.save();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Layout
//!
//! - [`ResourceManager`]: discovery, gated edits, save and synchronization
//!   of every entity below a root folder.
//! - [`ResourceEntity`], [`ResourceLanguage`], [`ResourceTableEntry`]: the
//!   data model.
//! - [`Synchronizer`]: reconciliation of one entity with one interchange
//!   document.
//! - [`formats`]: the native, interchange and tabular codecs.

pub mod config;
pub mod culture;
pub mod discovery;
pub mod entity;
pub mod entry;
pub mod error;
pub mod formats;
pub mod host;
pub mod language;
pub mod manager;
pub mod scope;
pub mod sync;
pub mod traits;
pub mod xml;

// Re-export most used types for easy consumption
pub use crate::{
    config::{CONFIG_FILE_NAME, Configuration, DuplicateKeyHandling, KeyComparison},
    culture::CultureKey,
    discovery::{FileGroup, ProjectFile, discover_files, group_files},
    entity::{ResourceChange, ResourceEntity, SaveOutcome},
    entry::{INVARIANT_MARKER, ResourceTableEntry},
    error::Error,
    formats::{FormatType, ResxFile, TranslationState, XliffDocument},
    host::{AllowAll, CancellationToken, DenyAll, LogTracer, ResourceHost, Tracer},
    language::ResourceLanguage,
    manager::{DuplicateKey, ResourceManager},
    scope::{ImportReport, ResourceScope, ScopedEntry, export_csv, import_csv},
    sync::{SyncOptions, SyncReport, Synchronizer},
    traits::Parser,
};
