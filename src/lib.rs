//! Focus lifecycle & clustering engine.
//!
//! Groups a user's browsing attention into "Focus" sessions: labeled,
//! evolving spans of sustained attention on a topic. An external scheduler
//! drives one processing cycle per user on a recurring cadence; within a
//! cycle the engine reaps inactive focuses, selects the attention window,
//! gates thin or duplicate batches, asks a pluggable decision policy for
//! actions, and applies each one through the validated mutation layer.
//!
//! Wiring sketch:
//!
//! ```no_run
//! use std::sync::Arc;
//! use focuscore::{
//!     db::Database,
//!     engine::{
//!         DedupCache, FocusBatchDriver, FocusLifecycleOrchestrator, HeuristicPolicy,
//!         ProcessingGuard,
//!     },
//!     events::BroadcastPublisher,
//!     EngineConfig,
//! };
//! # use focuscore::engine::AttentionSource;
//! # fn capture_source() -> Arc<dyn AttentionSource> { unimplemented!() }
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let db = Database::new("focus.db".into())?;
//! let publisher = Arc::new(BroadcastPublisher::new(64));
//! let dedup = Arc::new(DedupCache::new(config.dedup_ttl_ms));
//!
//! let orchestrator = Arc::new(FocusLifecycleOrchestrator::new(
//!     db.clone(),
//!     ProcessingGuard::new(),
//!     Arc::clone(&dedup),
//!     publisher.clone(),
//!     Arc::new(HeuristicPolicy::default()),
//!     capture_source(),
//!     config,
//! ));
//! let driver = FocusBatchDriver::new(db, dedup, orchestrator);
//!
//! // The external scheduler calls this on its tick
//! let summary = driver.run_tick().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;

pub use config::EngineConfig;
pub use error::MutationError;
