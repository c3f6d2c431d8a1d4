//! # Scanward Core
//!
//! Core library for the Scanward security-scan metadata service: providers,
//! the checks defined for each provider, scans that execute those checks and
//! the findings they record.
//!
//! ## Overview
//!
//! - [`domain`]: entities, identifiers, the scan state machine and the
//!   read-time aggregation of scan counters
//! - [`database`]: repository ports with PostgreSQL and in-memory adapters
//! - [`queue`]: at-least-once scan-run queue and worker heartbeats
//! - [`runner`]: the scan runner that simulates check execution
//! - [`worker`]: background workers consuming the queue
//! - [`api`]: route constants and transport DTOs
//! - [`seed`]: development fixtures
//!
//! ## Examples
//!
//! ```no_run
//! use scanward_core::{
//!     application::AppUnitOfWork,
//!     database::MemoryStore,
//!     domain::NewScan,
//!     runner::{RunnerSettings, ScanRunner},
//! };
//!
//! async fn scan_once() -> scanward_core::Result<()> {
//!     let uow = AppUnitOfWork::in_memory(&MemoryStore::new());
//!     let provider = uow.providers.create("AWS").await?;
//!     uow.checks.create(provider.id, "s3_bucket_public_access").await?;
//!     let scan = uow
//!         .scans
//!         .create(NewScan {
//!             provider_id: provider.id,
//!             name: "nightly".into(),
//!             comment: None,
//!         })
//!         .await?;
//!
//!     ScanRunner::new(uow, RunnerSettings::default()).run(scan.id).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Route constants and transport DTOs shared with clients
pub mod api;

/// Application-level composition utilities (Unit of Work)
pub mod application;

/// Repository ports and storage adapters
pub mod database;

/// Entities, identifiers and scan aggregation
pub mod domain;

/// Error types and error handling utilities
pub mod error;

/// Scan-run job queue and worker liveness
pub mod queue;

/// Scan execution
pub mod runner;

/// Development fixtures
pub mod seed;

/// Background queue consumers
pub mod worker;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{CoreError, Result};
