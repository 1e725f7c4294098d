//! Up-to-date decisions.
//!
//! The scheduler asks a [`CompilationManager`] two questions about a task whose artifact is
//! newer than its source: has the source changed in a way timestamps cannot see, and has a
//! template the unit calls changed its interface. [`DependencyGraph`] answers both from a
//! cache written at the end of the previous build.
//!
//! Interface changes are checked one hop deep: a unit is reconsidered when a template it
//! calls directly changes its parameters, not when something further down the call chain
//! does.

use super::store::FileStore;
use crate::ast::{CallableSignature, TemplateName};
use crate::error::{Error, Result};
use crate::lang::OutputLanguage;
use crate::phases::CallableResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One (unit, output language) pair the build may execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
    pub unit: TemplateName,
    pub source: PathBuf,
    pub output: PathBuf,
    pub language: OutputLanguage,
}

pub trait CompilationManager {
    /// Whether the unit's source changed since its artifacts were last generated.
    fn source_changed(&self, task: &BuildTask, store: &dyn FileStore) -> bool;

    /// Whether a template the unit calls changed what callers can see of it.
    fn used_interfaces_changed(&self, task: &BuildTask, resolver: &dyn CallableResolver)
        -> bool;

    /// Called once for every unit the build compiled, with the signatures of its callees.
    fn unit_compiled(
        &mut self,
        _unit: &TemplateName,
        _source_modified: Option<SystemTime>,
        _requirements: &BTreeSet<CallableSignature>,
    ) {
    }
}

/// Treats every task as changed: every build is a full build.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCompilationManager;

impl CompilationManager for SimpleCompilationManager {
    fn source_changed(&self, _task: &BuildTask, _store: &dyn FileStore) -> bool {
        true
    }

    fn used_interfaces_changed(
        &self,
        _task: &BuildTask,
        _resolver: &dyn CallableResolver,
    ) -> bool {
        true
    }
}

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UnitRecord {
    /// Milliseconds since the epoch.
    source_modified: Option<u64>,
    requirements: BTreeSet<CallableSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    units: BTreeMap<TemplateName, UnitRecord>,
}

fn millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
}

/// What each unit observed of its callees at the last build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    units: BTreeMap<TemplateName, UnitRecord>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the cache at `path`. A missing file is an empty graph.
    pub fn load(store: &dyn FileStore, path: &Path) -> Result<Self> {
        if !store.exists(path) {
            tracing::debug!(path = %path.display(), "no dependency cache");
            return Ok(Self::new());
        }
        let text = store.read(path).map_err(|e| Error::io(path, &e))?;
        let cache: CacheFile =
            serde_json::from_str(&text).map_err(|e| Error::DependencyCache {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if cache.version != FORMAT_VERSION {
            return Err(Error::DependencyCache {
                path: path.to_path_buf(),
                message: format!(
                    "format version {} is not supported (expected {FORMAT_VERSION})",
                    cache.version
                ),
            });
        }
        Ok(DependencyGraph { units: cache.units })
    }

    pub fn save(&self, store: &dyn FileStore, path: &Path) -> Result<()> {
        let cache = CacheFile {
            version: FORMAT_VERSION,
            units: self.units.clone(),
        };
        let text = serde_json::to_string_pretty(&cache).map_err(|e| Error::DependencyCache {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        store
            .write(path, &format!("{text}\n"))
            .map_err(|e| Error::io(path, &e))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Callees of `unit` as recorded, if it was ever compiled.
    pub fn requirements(&self, unit: &TemplateName) -> Option<&BTreeSet<CallableSignature>> {
        self.units.get(unit).map(|record| &record.requirements)
    }
}

impl CompilationManager for DependencyGraph {
    fn source_changed(&self, task: &BuildTask, store: &dyn FileStore) -> bool {
        let Some(record) = self.units.get(&task.unit) else {
            return true;
        };
        let current = store.last_modified(&task.source).and_then(millis);
        current.is_none() || current != record.source_modified
    }

    fn used_interfaces_changed(
        &self,
        task: &BuildTask,
        resolver: &dyn CallableResolver,
    ) -> bool {
        let Some(record) = self.units.get(&task.unit) else {
            return true;
        };
        record.requirements.iter().any(|seen| {
            let current = resolver.resolve(&seen.name).map(|c| c.signature());
            let changed = current.as_ref() != Some(seen);
            if changed {
                tracing::debug!(unit = %task.unit, callee = %seen.name, "callee interface changed");
            }
            changed
        })
    }

    fn unit_compiled(
        &mut self,
        unit: &TemplateName,
        source_modified: Option<SystemTime>,
        requirements: &BTreeSet<CallableSignature>,
    ) {
        self.units.insert(
            unit.clone(),
            UnitRecord {
                source_modified: source_modified.and_then(millis),
                requirements: requirements.clone(),
            },
        );
    }
}
