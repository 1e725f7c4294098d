//! Incremental builds over a set of sources.
//!
//! A [`CompilationSet`] turns source paths into units and runs one task per (unit, output
//! language). Whether a task can be skipped is decided by timestamps from the [`FileStore`]
//! and by a [`CompilationManager`]; [`DependencyGraph`] persists what each unit saw of its
//! callees so the next build can tell when a caller must be regenerated.

pub mod manager;
pub mod set;
pub mod store;

pub use manager::{BuildTask, CompilationManager, DependencyGraph, SimpleCompilationManager};
pub use set::{BuildConfig, BuildReport, CompilationSet, TaskOutcome, TaskStatus};
pub use store::{DiskFileStore, FileStore, MemoryFileStore};
