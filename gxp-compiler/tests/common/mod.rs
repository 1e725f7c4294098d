//! Shared helpers: fixture loading and builds against an in-memory store.

use gxp_compiler::alert::{Alert, DefaultAlertPolicy};
use gxp_compiler::build::{
    BuildConfig, BuildReport, CompilationManager, CompilationSet, FileStore, MemoryFileStore,
};
use gxp_compiler::lang::OutputLanguage;
use gxp_compiler::schema::BuiltinSchemaFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const HELLO: &str = "src/com/example/Hello.gxp";
pub const CARD: &str = "src/com/example/Card.gxp";

pub fn fixture(relative: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {path:?}: {e}"))
}

/// A store holding the Hello and Card fixtures under `src/`.
pub fn fixture_store() -> Arc<MemoryFileStore> {
    let store = Arc::new(MemoryFileStore::new());
    store
        .write(Path::new(HELLO), &fixture("com/example/Hello.gxp"))
        .unwrap();
    store
        .write(Path::new(CARD), &fixture("com/example/Card.gxp"))
        .unwrap();
    store
}

pub fn config() -> BuildConfig {
    BuildConfig {
        source_root: PathBuf::from("src"),
        output_dir: PathBuf::from("out"),
        ..BuildConfig::default()
    }
}

/// Every `.gxp` file in the store.
pub fn sources(store: &MemoryFileStore) -> Vec<PathBuf> {
    store
        .paths()
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "gxp"))
        .collect()
}

pub fn build(
    store: &Arc<MemoryFileStore>,
    languages: &[OutputLanguage],
    manager: &mut dyn CompilationManager,
) -> (BuildReport, Vec<Alert>) {
    let set = CompilationSet::new(
        config(),
        store.clone(),
        Arc::new(BuiltinSchemaFactory::new().unwrap()),
        sources(store),
    );
    let mut alerts = Vec::new();
    let report = set.compile(
        languages,
        &|_| true,
        manager,
        &DefaultAlertPolicy,
        &mut alerts,
    );
    (report, alerts)
}

/// One `path status` line per task, in build order.
pub fn statuses(report: &BuildReport) -> String {
    report
        .outcomes
        .iter()
        .map(|o| format!("{} {:?}", o.task.output.display(), o.status))
        .collect::<Vec<_>>()
        .join("\n")
}
