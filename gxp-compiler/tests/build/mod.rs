//! Whole builds: artifacts, up-to-date checks and reconsidering callers.

use crate::common::{build, config, fixture, fixture_store, statuses, CARD, HELLO};
use gxp_compiler::alert::{AlertKind, DefaultAlertPolicy, Severity};
use gxp_compiler::build::{
    BuildReport, CompilationSet, DependencyGraph, DiskFileStore, FileStore,
    SimpleCompilationManager, TaskStatus,
};
use gxp_compiler::lang::OutputLanguage;
use gxp_compiler::schema::BuiltinSchemaFactory;
use insta::assert_snapshot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const JAVA: &[OutputLanguage] = &[OutputLanguage::Java];

#[test]
fn test_full_build_statuses() {
    let store = fixture_store();
    let (report, _) = build(
        &store,
        &[OutputLanguage::Java, OutputLanguage::Xmb],
        &mut DependencyGraph::new(),
    );
    assert_snapshot!(statuses(&report), @r"
    out/com/example/Card.java Written
    out/com/example/Card.xmb Written
    out/com/example/Hello.java Written
    out/com/example/Hello.xmb Written
    ");
}

#[test]
fn test_build_on_disk() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    let sources = [
        src.join("com/example/Hello.gxp"),
        src.join("com/example/Card.gxp"),
    ];
    for (path, name) in sources.iter().zip(["Hello", "Card"]) {
        DiskFileStore
            .write(path, &fixture(&format!("com/example/{name}.gxp")))
            .unwrap();
    }
    let set = CompilationSet::new(
        gxp_compiler::build::BuildConfig {
            source_root: src,
            output_dir: out.clone(),
            ..config()
        },
        Arc::new(DiskFileStore),
        Arc::new(BuiltinSchemaFactory::new().unwrap()),
        sources,
    );
    let mut alerts = Vec::new();
    let report = set.compile(
        &OutputLanguage::ALL,
        &|_| true,
        &mut SimpleCompilationManager,
        &DefaultAlertPolicy,
        &mut alerts,
    );
    assert!(!report.has_errors(), "{alerts:?}");
    for suffix in [".java", ".cc", ".h", ".js", ".xmb"] {
        let path = out.join(format!("com/example/Hello{suffix}"));
        assert!(path.is_file(), "{path:?} missing");
    }
}

#[test]
fn test_unchanged_sources_are_up_to_date() {
    let store = fixture_store();
    let mut graph = DependencyGraph::new();
    build(&store, JAVA, &mut graph);
    store.advance(Duration::from_secs(1));
    let (report, alerts) = build(&store, JAVA, &mut graph);
    assert_snapshot!(statuses(&report), @r"
    out/com/example/Card.java UpToDate
    out/com/example/Hello.java UpToDate
    ");
    assert!(alerts.is_empty(), "{alerts:?}");
}

#[test]
fn test_changed_source_is_rebuilt_alone() {
    let store = fixture_store();
    let mut graph = DependencyGraph::new();
    build(&store, JAVA, &mut graph);
    store.advance(Duration::from_secs(1));
    // same interface, different body
    let hello = fixture("com/example/Hello.gxp").replace("greeting", "welcome");
    store.write(Path::new(HELLO), &hello).unwrap();

    let (report, alerts) = build(&store, JAVA, &mut graph);
    assert_snapshot!(statuses(&report), @r"
    out/com/example/Card.java UpToDate
    out/com/example/Hello.java Written
    ");
    assert!(alerts.iter().all(|a| a.kind() != AlertKind::Reconsidered));
}

#[test]
fn test_callee_interface_change_reconsiders_callers() {
    let store = fixture_store();
    let mut graph = DependencyGraph::new();
    build(&store, JAVA, &mut graph);
    store.advance(Duration::from_secs(1));
    let card = fixture("com/example/Card.gxp").replace(
        "<gxp:param name=\"body\"",
        "<gxp:param name=\"footer\" type=\"String\" default=\"&quot;&quot;\"/>\n  <gxp:param name=\"body\"",
    );
    store.write(Path::new(CARD), &card).unwrap();

    let (report, alerts) = build(&store, JAVA, &mut graph);
    assert_snapshot!(statuses(&report), @r"
    out/com/example/Card.java Written
    out/com/example/Hello.java Written
    ");
    let hello = report
        .outcome(Path::new("out/com/example/Hello.java"))
        .unwrap();
    assert!(hello.reconsidered);
    let reconsidered: Vec<_> = alerts
        .iter()
        .filter(|a| a.kind() == AlertKind::Reconsidered)
        .collect();
    assert_eq!(reconsidered.len(), 1);
    assert_eq!(reconsidered[0].position().source(), HELLO);
}

#[test]
fn test_dependency_cache_survives_between_builds() {
    let store = fixture_store();
    let cache = Path::new("out/.gxp-deps.json");
    let mut graph = DependencyGraph::load(store.as_ref(), cache).unwrap();
    build(&store, JAVA, &mut graph);
    graph.save(store.as_ref(), cache).unwrap();

    store.advance(Duration::from_secs(1));
    let mut reloaded = DependencyGraph::load(store.as_ref(), cache).unwrap();
    assert_eq!(reloaded, graph);
    let (report, _) = build(&store, JAVA, &mut reloaded);
    assert_eq!(report.with_status(TaskStatus::UpToDate).count(), 2);
}

#[test]
fn test_unknown_root_element_produces_nothing() {
    let store = fixture_store();
    store
        .write(
            Path::new(HELLO),
            r#"<gxp:tempate name="com.example.Hello" xmlns:gxp="http://google.com/2001/gxp"/>"#,
        )
        .unwrap();
    let (report, alerts) = build(&store, JAVA, &mut SimpleCompilationManager);
    assert!(report.has_errors());
    assert!(!store.exists(Path::new("out/com/example/Hello.java")));
    assert!(store.exists(Path::new("out/com/example/Card.java")));
    assert!(alerts
        .iter()
        .any(|a| a.position().source() == HELLO && a.severity() == Severity::Error));
}

#[test]
fn test_errors_are_reported_once_across_languages() {
    let store = fixture_store();
    let broken = fixture("com/example/Hello.gxp").replace("<gxp:eval expr=\"user\"", "<gxp:eval");
    store.write(Path::new(HELLO), &broken).unwrap();
    let (report, alerts) = build(
        &store,
        &[OutputLanguage::Java, OutputLanguage::JavaScript],
        &mut SimpleCompilationManager,
    );
    let java = report
        .outcome(Path::new("out/com/example/Hello.java"))
        .unwrap();
    let js = report.outcome(Path::new("out/com/example/Hello.js")).unwrap();
    assert_eq!(java.status, TaskStatus::Failed);
    assert_eq!(js.status, TaskStatus::Failed);
    assert_eq!(java.alerts, js.alerts);
    assert!(java.alerts.has_kind(AlertKind::MissingAttribute));
    let from_hello = alerts
        .iter()
        .filter(|a| a.position().source() == HELLO)
        .count();
    assert_eq!(from_hello, java.alerts.len());
}

#[test]
fn test_full_builds_are_idempotent() {
    let first = fixture_store();
    build(&first, &OutputLanguage::ALL, &mut SimpleCompilationManager);
    let second = fixture_store();
    build(&second, &OutputLanguage::ALL, &mut SimpleCompilationManager);
    build(&second, &OutputLanguage::ALL, &mut SimpleCompilationManager);

    let outputs: Vec<PathBuf> = first
        .paths()
        .into_iter()
        .filter(|p| p.starts_with("out"))
        .collect();
    assert_eq!(outputs.len(), 10);
    for path in outputs {
        assert_eq!(first.read(&path).unwrap(), second.read(&path).unwrap(), "{path:?}");
    }
}

#[test]
fn test_repeated_builds_report_identical_alerts() {
    let broken = fixture("com/example/Hello.gxp")
        .replace("<gxp:eval expr=\"user\"", "<gxp:eval")
        .replace(
            "<call:Card title=\"Welcome\">",
            "<call:Card title=\"Welcome\" colour=\"red\">",
        )
        .replace(
            "<gxp:param name=\"user\"",
            "<gxp:param name=\"this\" type=\"int\"/>\n  <gxp:param name=\"user\"",
        );
    let broken_store = || {
        let store = fixture_store();
        store.write(Path::new(HELLO), &broken).unwrap();
        store
    };
    let hello_alerts = |report: &BuildReport| {
        report
            .outcome(Path::new("out/com/example/Hello.java"))
            .map(|outcome| outcome.alerts.clone())
            .unwrap()
    };

    let store = broken_store();
    let (first, first_alerts) = build(&store, &OutputLanguage::ALL, &mut SimpleCompilationManager);
    let (again, again_alerts) = build(&store, &OutputLanguage::ALL, &mut SimpleCompilationManager);
    let (fresh, fresh_alerts) =
        build(&broken_store(), &OutputLanguage::ALL, &mut SimpleCompilationManager);

    let expected = hello_alerts(&first);
    assert!(expected.has_kind(AlertKind::MissingAttribute));
    assert!(expected.has_kind(AlertKind::BadParameter));
    assert!(expected.has_kind(AlertKind::IllegalVariableName));
    for report in [&again, &fresh] {
        assert_eq!(statuses(report), statuses(&first));
        assert_eq!(hello_alerts(report), expected);
        for (outcome, original) in report.outcomes.iter().zip(&first.outcomes) {
            assert_eq!(outcome.alerts, original.alerts, "{:?}", outcome.task.output);
        }
    }
    assert_eq!(again_alerts, first_alerts);
    assert_eq!(fresh_alerts, first_alerts);
}
