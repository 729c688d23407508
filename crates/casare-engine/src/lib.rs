//! CasareRPA workflow execution engine.
//!
//! This crate is the graph interpreter: given a loaded `casare_workflow::Workflow`
//! and a fresh `ExecutionContext`, it steps the graph to a terminal status,
//! handling node timeouts, try/catch capture, retry backoff, loop/for-each
//! re-entry, bypassed (disabled) nodes, and cooperative pause/cancel.
//!
//! ```ignore
//! use casare_engine::{Engine, ExecutionContext, PauseController, NodeMetrics};
//!
//! let pause = PauseController::new();
//! let metrics = NodeMetrics::new();
//! let engine = Engine::new(&workflow, &registry, &pause, &metrics);
//! let summary = engine.run(&mut ctx, &job_id).await;
//! ctx.cleanup().await;
//! ```

mod context;
mod control;
mod error;
mod event;
mod frames;
mod metrics;
mod resource;
mod stepper;

pub use context::{capture_from, ExecutionContext};
pub use control::PauseController;
pub use error::{EngineError, ErrorRecord, TerminalStatus};
pub use event::{Event, EventBus};
pub use frames::{CapturedError, LoopFrame, RetryFrame, TryFrame};
pub use metrics::{MetricsSnapshot, NodeMetrics};
pub use resource::ManagedResource;
pub use stepper::{Engine, ExecutionSummary};
