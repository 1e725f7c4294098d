//! The set of units compiled together, and the build schedule over it.

use super::manager::{BuildTask, CompilationManager};
use super::store::FileStore;
use crate::alert::{
    Alert, AlertCounter, AlertKind, AlertPolicy, AlertSet, AlertSetBuilder, AlertSink, Severity,
    SourcePosition,
};
use crate::ast::{Callable, TemplateName};
use crate::codegen::{GenerateOptions, GeneratorRegistry};
use crate::lang::OutputLanguage;
use crate::phases::CallableResolver;
use crate::schema::SchemaFactory;
use crate::unit::{template_name_for, CompilationUnit};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Where sources come from and artifacts go.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Source paths are named relative to this directory.
    pub source_root: PathBuf,
    pub output_dir: PathBuf,
    pub generate: GenerateOptions,
    /// Where to write `id=presentation` lines for every extracted message.
    pub message_bundle: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Compiled without errors; the artifact was written.
    Written,
    /// Compiled with errors; nothing was written.
    Failed,
    UpToDate,
    /// The allow predicate rejected the output path.
    Disallowed,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: BuildTask,
    pub status: TaskStatus,
    /// Alerts of the unit plus those raised generating this output.
    pub alerts: AlertSet,
    /// Executed only because a callee's interface changed.
    pub reconsidered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub outcomes: Vec<TaskOutcome>,
    /// Effective errors reported to the sink.
    pub error_count: usize,
    pub warning_count: usize,
    pub message_bundle: Option<PathBuf>,
}

impl BuildReport {
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.with_status(TaskStatus::Written)
    }

    pub fn with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(move |o| o.status == status)
            .map(|o| o.task.output.as_path())
    }

    pub fn outcome(&self, output: &Path) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task.output == output)
    }
}

struct Entry {
    unit: CompilationUnit,
    source: PathBuf,
    /// Source path relative to the source root, `/`-separated, without `.gxp`.
    stem: String,
}

/// Units compiled together. Calls between them are resolved within the set.
pub struct CompilationSet {
    config: BuildConfig,
    store: Arc<dyn FileStore>,
    registry: GeneratorRegistry,
    entries: Vec<Entry>,
    by_name: HashMap<TemplateName, usize>,
    /// Sources that could not become units.
    rejected: Vec<Alert>,
}

fn relative_stem(source: &Path, root: &Path) -> Option<String> {
    let relative = match source.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => pathdiff::diff_paths(source, root)?,
    };
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    let joined = segments.join("/");
    Some(joined.strip_suffix(".gxp").unwrap_or(&joined).to_string())
}

impl CompilationSet {
    pub fn new(
        config: BuildConfig,
        store: Arc<dyn FileStore>,
        schemas: Arc<dyn SchemaFactory>,
        sources: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();
        let mut rejected = Vec::new();
        for source in sources {
            let source_name = source.display().to_string();
            let position = SourcePosition::whole_file(source_name.as_str());
            let Some((stem, name)) = relative_stem(&source, &config.source_root)
                .and_then(|stem| template_name_for(&stem).map(|name| (stem, name)))
            else {
                rejected.push(Alert::new(
                    AlertKind::IllegalName,
                    position,
                    format!(
                        "{source_name} does not name a template relative to {}",
                        config.source_root.display()
                    ),
                ));
                continue;
            };
            if by_name.contains_key(&name) {
                rejected.push(Alert::new(
                    AlertKind::IllegalName,
                    position,
                    format!("template {name} is given more than once"),
                ));
                continue;
            }
            let text = store.read(&source).map_err(|e| e.to_string());
            if let Err(problem) = &text {
                tracing::warn!(source = %source_name, error = %problem, "cannot read source");
            }
            by_name.insert(name.clone(), entries.len());
            entries.push(Entry {
                unit: CompilationUnit::new(source_name, name, text, schemas.clone()),
                source,
                stem,
            });
        }
        CompilationSet {
            config,
            store,
            registry: GeneratorRegistry::with_defaults(),
            entries,
            by_name,
            rejected,
        }
    }

    /// Replaces the generators used for output.
    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Alerts for sources that could not become units, in input order.
    pub fn rejected(&self) -> &[Alert] {
        &self.rejected
    }

    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.entries.iter().map(|e| &e.unit)
    }

    pub fn unit(&self, name: &TemplateName) -> Option<&CompilationUnit> {
        self.by_name.get(name).map(|&i| &self.entries[i].unit)
    }

    pub fn output_path(&self, stem: &str, language: OutputLanguage) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{stem}{}", language.suffix()))
    }

    fn task(&self, index: usize, language: OutputLanguage) -> BuildTask {
        let entry = &self.entries[index];
        BuildTask {
            unit: entry.unit.name().clone(),
            source: entry.source.clone(),
            output: self.output_path(&entry.stem, language),
            language,
        }
    }

    fn is_up_to_date(&self, task: &BuildTask, manager: &dyn CompilationManager) -> bool {
        if !self.store.exists(&task.output) {
            return false;
        }
        let newer = match (
            self.store.last_modified(&task.output),
            self.store.last_modified(&task.source),
        ) {
            (Some(output), Some(source)) => output >= source,
            _ => false,
        };
        newer && !manager.source_changed(task, self.store.as_ref())
    }

    /// Builds `languages` for every unit.
    ///
    /// A task is skipped if `allow` rejects its output or the output is up to date. Skipped
    /// up-to-date tasks get a second look: if a template the unit calls changed its interface
    /// the task runs anyway. A task writes its artifact only if compiling the unit and
    /// generating the output raised no effective errors.
    pub fn compile(
        &self,
        languages: &[OutputLanguage],
        allow: &dyn Fn(&Path) -> bool,
        manager: &mut dyn CompilationManager,
        policy: &dyn AlertPolicy,
        sink: &mut dyn AlertSink,
    ) -> BuildReport {
        let mut counter = AlertCounter::forwarding(policy, sink);
        let mut outcomes = Vec::new();
        for alert in self.rejected() {
            counter.add(alert.clone());
        }

        let mut pending = Vec::new();
        let mut up_to_date = Vec::new();
        for index in 0..self.entries.len() {
            for &language in languages {
                let task = self.task(index, language);
                if !allow(&task.output) {
                    tracing::debug!(output = %task.output.display(), "output not allowed");
                    outcomes.push(TaskOutcome {
                        task,
                        status: TaskStatus::Disallowed,
                        alerts: AlertSet::empty(),
                        reconsidered: false,
                    });
                } else if self.is_up_to_date(&task, manager) {
                    up_to_date.push((index, task));
                } else {
                    pending.push((index, task, None));
                }
            }
        }

        for (index, task) in up_to_date {
            if manager.used_interfaces_changed(&task, self) {
                let alert = Alert::new(
                    AlertKind::Reconsidered,
                    SourcePosition::whole_file(self.entries[index].unit.source_name()),
                    format!(
                        "{} is up to date but a template it calls has changed; rebuilding",
                        task.output.display()
                    ),
                );
                counter.add(alert.clone());
                pending.push((index, task, Some(alert)));
            } else {
                tracing::info!(output = %task.output.display(), "up to date");
                outcomes.push(TaskOutcome {
                    task,
                    status: TaskStatus::UpToDate,
                    alerts: AlertSet::empty(),
                    reconsidered: false,
                });
            }
        }

        let order: HashMap<OutputLanguage, usize> =
            languages.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        pending.sort_by_key(|(index, task, _)| (*index, order.get(&task.language).copied()));

        let mut compiled = BTreeSet::new();
        let mut produced = BTreeSet::new();
        for (index, task, reconsidered) in pending {
            let first_for_unit = compiled.insert(index);
            let outcome = self.execute(index, task, reconsidered, first_for_unit, policy, &mut counter);
            if first_for_unit {
                self.record(index, manager);
            }
            if outcome.status == TaskStatus::Written {
                produced.insert(index);
            }
            outcomes.push(outcome);
        }

        let message_bundle = self.write_message_bundle(&produced, &mut counter);
        BuildReport {
            outcomes,
            error_count: counter.error_count(),
            warning_count: counter.warning_count(),
            message_bundle,
        }
    }

    fn execute(
        &self,
        index: usize,
        task: BuildTask,
        reconsidered: Option<Alert>,
        first_for_unit: bool,
        policy: &dyn AlertPolicy,
        sink: &mut dyn AlertSink,
    ) -> TaskOutcome {
        let mut alerts = AlertSetBuilder::new();
        let was_reconsidered = reconsidered.is_some();
        if let Some(alert) = reconsidered {
            alerts.add(alert);
        }
        let status = self.run(index, &task, first_for_unit, policy, &mut alerts, sink);
        TaskOutcome {
            task,
            status,
            alerts: alerts.build(),
            reconsidered: was_reconsidered,
        }
    }

    /// Compiles and generates one task. Every alert lands in `alerts`; the unit's own alerts
    /// reach `sink` only for the first task of the unit.
    fn run(
        &self,
        index: usize,
        task: &BuildTask,
        first_for_unit: bool,
        policy: &dyn AlertPolicy,
        alerts: &mut AlertSetBuilder,
        sink: &mut dyn AlertSink,
    ) -> TaskStatus {
        let unit = &self.entries[index].unit;
        let position = SourcePosition::whole_file(unit.source_name());

        let tree = match unit.extracted_tree(self) {
            Ok(tree) => tree,
            Err(err) => {
                let alert = Alert::new(AlertKind::Internal, position, err.to_string());
                if first_for_unit {
                    sink.add(alert.clone());
                }
                alerts.add(alert);
                return TaskStatus::Failed;
            }
        };
        if first_for_unit {
            sink.add_all(tree.tree.alerts());
        }
        alerts.add_all(tree.tree.alerts());

        let mut generated = Vec::new();
        let code = self
            .registry
            .generate(task.language, &tree, &self.config.generate, &mut generated);
        let is_error = |alert: &Alert| policy.severity(alert) == Severity::Error;
        let errors = tree.tree.alerts().iter().filter(|a| is_error(a)).count()
            + generated.iter().filter(|a| is_error(a)).count();
        for alert in generated {
            sink.add(alert.clone());
            alerts.add(alert);
        }
        let code = match code {
            Ok(code) => code,
            Err(err) => {
                let alert = Alert::new(AlertKind::Internal, position, err.to_string());
                sink.add(alert.clone());
                alerts.add(alert);
                return TaskStatus::Failed;
            }
        };

        if errors > 0 {
            tracing::info!(output = %task.output.display(), errors, "not written");
            return TaskStatus::Failed;
        }
        if let Err(err) = self.store.write(&task.output, &code) {
            tracing::warn!(output = %task.output.display(), error = %err, "write failed");
            let alert = Alert::new(
                AlertKind::Io,
                position,
                format!("cannot write {}: {err}", task.output.display()),
            );
            sink.add(alert.clone());
            alerts.add(alert);
            return TaskStatus::Failed;
        }
        tracing::info!(output = %task.output.display(), "written");
        TaskStatus::Written
    }

    fn record(&self, index: usize, manager: &mut dyn CompilationManager) {
        let entry = &self.entries[index];
        let Ok(bound) = entry.unit.bound_tree(self) else {
            return;
        };
        manager.unit_compiled(
            entry.unit.name(),
            self.store.last_modified(&entry.source),
            &bound.requirements,
        );
    }

    fn write_message_bundle(
        &self,
        produced: &BTreeSet<usize>,
        sink: &mut dyn AlertSink,
    ) -> Option<PathBuf> {
        let path = self.config.message_bundle.as_ref()?;
        if produced.is_empty() {
            return None;
        }
        let mut messages = BTreeMap::new();
        for &index in produced {
            if let Ok(tree) = self.entries[index].unit.extracted_tree(self) {
                for message in &tree.messages {
                    messages.insert(message.id.clone(), message.presentation.clone());
                }
            }
        }
        let text: String = messages
            .iter()
            .map(|(id, presentation)| format!("{id}={presentation}\n"))
            .collect();
        match self.store.write(path, &text) {
            Ok(()) => {
                tracing::info!(path = %path.display(), messages = messages.len(), "message bundle written");
                Some(path.clone())
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "write failed");
                sink.add(Alert::new(
                    AlertKind::Io,
                    SourcePosition::whole_file(path.display().to_string()),
                    format!("cannot write message bundle: {err}"),
                ));
                None
            }
        }
    }
}

impl CallableResolver for CompilationSet {
    fn resolve(&self, name: &TemplateName) -> Option<Arc<Callable>> {
        self.unit(name).and_then(|unit| unit.callable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::alert::DefaultAlertPolicy;
    use crate::build::manager::DependencyGraph;
    use crate::build::store::MemoryFileStore;
    use crate::codegen::testing::{CARD, HELLO, NAMESPACES};
    use crate::schema::BuiltinSchemaFactory;
    use std::time::Duration;

    const HELLO_PATH: &str = "src/com/example/Hello.gxp";
    const CARD_PATH: &str = "src/com/example/Card.gxp";

    fn config() -> BuildConfig {
        BuildConfig {
            source_root: PathBuf::from("src"),
            output_dir: PathBuf::from("out"),
            ..BuildConfig::default()
        }
    }

    fn store() -> Arc<MemoryFileStore> {
        let store = Arc::new(MemoryFileStore::new());
        store
            .write(Path::new(HELLO_PATH), &HELLO.replace("NS", NAMESPACES))
            .unwrap();
        store
            .write(Path::new(CARD_PATH), &CARD.replace("NS", NAMESPACES))
            .unwrap();
        store
    }

    fn set(store: &Arc<MemoryFileStore>, config: BuildConfig) -> CompilationSet {
        CompilationSet::new(
            config,
            store.clone(),
            Arc::new(BuiltinSchemaFactory::new().unwrap()),
            [PathBuf::from(HELLO_PATH), PathBuf::from(CARD_PATH)],
        )
    }

    fn build(
        store: &Arc<MemoryFileStore>,
        languages: &[OutputLanguage],
        manager: &mut dyn CompilationManager,
    ) -> (BuildReport, Vec<Alert>) {
        let mut alerts = Vec::new();
        let report = set(store, config()).compile(
            languages,
            &|_| true,
            manager,
            &DefaultAlertPolicy,
            &mut alerts,
        );
        (report, alerts)
    }

    fn hello_java() -> &'static Path {
        Path::new("out/com/example/Hello.java")
    }

    #[test]
    fn test_full_build_writes_every_artifact() {
        let store = store();
        let (report, _) = build(
            &store,
            &[OutputLanguage::Java, OutputLanguage::Xmb],
            &mut DependencyGraph::new(),
        );
        assert!(!report.has_errors(), "{report:?}");
        let written: Vec<_> = report.written().collect();
        assert_eq!(
            written,
            vec![
                hello_java(),
                Path::new("out/com/example/Hello.xmb"),
                Path::new("out/com/example/Card.java"),
                Path::new("out/com/example/Card.xmb"),
            ]
        );
        let java = store.read(hello_java()).unwrap();
        assert!(java.contains("public class Hello {"), "{java}");
    }

    #[test]
    fn test_second_build_is_up_to_date() {
        let store = store();
        let mut graph = DependencyGraph::new();
        build(&store, &[OutputLanguage::Java], &mut graph);
        store.advance(Duration::from_secs(1));
        let (report, alerts) = build(&store, &[OutputLanguage::Java], &mut graph);
        assert_eq!(report.with_status(TaskStatus::UpToDate).count(), 2);
        assert_eq!(report.written().count(), 0);
        assert!(alerts.is_empty(), "{alerts:?}");
    }

    #[test]
    fn test_callee_interface_change_reconsiders_caller() {
        let store = store();
        let mut graph = DependencyGraph::new();
        build(&store, &[OutputLanguage::Java], &mut graph);

        store.advance(Duration::from_secs(1));
        let card = CARD
            .replace("NS", NAMESPACES)
            .replace(
                "<gxp:param name=\"body\"",
                "<gxp:param name=\"subtitle\" type=\"String\" default=\"&quot;&quot;\"/>\n  <gxp:param name=\"body\"",
            );
        store.write(Path::new(CARD_PATH), &card).unwrap();

        let (report, alerts) = build(&store, &[OutputLanguage::Java], &mut graph);
        let hello = report.outcome(hello_java()).unwrap();
        assert!(hello.reconsidered);
        assert_eq!(hello.status, TaskStatus::Written);
        assert_eq!(
            alerts
                .iter()
                .filter(|a| a.kind() == AlertKind::Reconsidered)
                .count(),
            1
        );
        let java = store.read(hello_java()).unwrap();
        assert!(java.contains("getDefaultSubtitle"), "{java}");
    }

    #[test]
    fn test_errors_prevent_every_artifact_of_the_unit() {
        let store = store();
        store
            .write(
                Path::new(HELLO_PATH),
                &format!("<gxp:bogus {NAMESPACES}/>"),
            )
            .unwrap();
        let (report, alerts) = build(
            &store,
            &[OutputLanguage::Java, OutputLanguage::Xmb],
            &mut crate::build::manager::SimpleCompilationManager,
        );
        assert!(report.has_errors());
        assert!(!store.exists(hello_java()));
        assert!(!store.exists(Path::new("out/com/example/Hello.xmb")));
        assert_eq!(report.with_status(TaskStatus::Failed).count(), 2);
        // reported once, not once per language
        let hello_errors: Vec<_> = alerts
            .iter()
            .filter(|a| a.position().source() == HELLO_PATH)
            .collect();
        let failed = report.outcome(hello_java()).unwrap();
        assert_eq!(hello_errors.len(), failed.alerts.len());
    }

    #[test]
    fn test_disallowed_outputs_are_skipped() {
        let store = store();
        let mut alerts = Vec::new();
        let report = set(&store, config()).compile(
            &[OutputLanguage::Java],
            &|path| !path.ends_with("Card.java"),
            &mut DependencyGraph::new(),
            &DefaultAlertPolicy,
            &mut alerts,
        );
        assert_eq!(
            report.with_status(TaskStatus::Disallowed).collect::<Vec<_>>(),
            vec![Path::new("out/com/example/Card.java")]
        );
        assert!(!store.exists(Path::new("out/com/example/Card.java")));
        assert!(store.exists(hello_java()));
    }

    #[test]
    fn test_message_bundle() {
        let store = store();
        let mut alerts = Vec::new();
        let report = set(
            &store,
            BuildConfig {
                message_bundle: Some(PathBuf::from("out/messages.txt")),
                ..config()
            },
        )
        .compile(
            &[OutputLanguage::Java],
            &|_| true,
            &mut DependencyGraph::new(),
            &DefaultAlertPolicy,
            &mut alerts,
        );
        assert_eq!(report.message_bundle.as_deref(), Some(Path::new("out/messages.txt")));
        let bundle = store.read(Path::new("out/messages.txt")).unwrap();
        assert_eq!(bundle.lines().count(), 1);
        assert!(bundle.trim_end().ends_with("=Hello %1!"), "{bundle}");
    }

    #[test]
    fn test_source_outside_root_is_rejected() {
        let store = store();
        store.write(Path::new("elsewhere/X.gxp"), "<x/>").unwrap();
        let set = CompilationSet::new(
            config(),
            store.clone(),
            Arc::new(BuiltinSchemaFactory::new().unwrap()),
            [PathBuf::from("elsewhere/X.gxp")],
        );
        assert_eq!(set.units().count(), 0);
        assert_eq!(set.rejected().len(), 1);
        let mut alerts = Vec::new();
        let report = set.compile(
            &[OutputLanguage::Java],
            &|_| true,
            &mut DependencyGraph::new(),
            &DefaultAlertPolicy,
            &mut alerts,
        );
        assert_eq!(report.error_count, 1);
        assert_eq!(alerts[0].kind(), AlertKind::IllegalName);
    }

    #[test]
    fn test_resolves_callables_within_the_set() {
        let store = store();
        let set = set(&store, config());
        let card = TemplateName::parse("com.example.Card").unwrap();
        let callable = set.resolve(&card).unwrap();
        assert!(callable.parameter("title").is_some());
        assert!(set.resolve(&TemplateName::parse("com.example.Nope").unwrap()).is_none());
    }

    #[test]
    fn test_relative_stem() {
        let root = Path::new("src");
        assert_eq!(
            relative_stem(Path::new("src/com/example/Hello.gxp"), root).as_deref(),
            Some("com/example/Hello")
        );
        assert_eq!(
            relative_stem(Path::new("./com/example/Hello.gxp"), Path::new("")).as_deref(),
            Some("com/example/Hello")
        );
        assert_eq!(relative_stem(Path::new("other/Hello.gxp"), root), None);
    }
}
