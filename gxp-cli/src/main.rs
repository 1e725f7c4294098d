// Command-line interface for the gxp template compiler
//
// gxpc compiles a set of .gxp templates into the requested output languages. Everything it
// knows about templates comes from gxp-compiler; this binary only turns flags and config
// files into a build, prints alerts, and picks the exit code.
//
// Usage:
//  gxpc <sources>... [--output-language <lang>]... [--output-dir <dir>]   - Build
//  gxpc <sources>... --dump-tree <phase>                                  - Print a phase's tree
//
// Configuration is layered: built-in defaults, then gxp.toml in the working directory, then
// --config, then flags.
//
// Exit codes: 0 success, 1 an effective error was reported, 2 bad configuration or usage.

mod sources;

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use gxp_compiler::alert::{AlertCounter, AlertPolicy, AlertSink, PrintingAlertSink};
use gxp_compiler::build::{
    CompilationManager, CompilationSet, DependencyGraph, DiskFileStore, SimpleCompilationManager,
};
use gxp_compiler::lang::OutputLanguage;
use gxp_compiler::schema::{BuiltinSchemaFactory, FileSchemaFactory, SchemaFactory};
use gxp_compiler::unit::Phase;
use gxp_config::{ConfigError, GxpConfig, Loader};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const EXIT_ERRORS: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn build_cli() -> Command {
    Command::new("gxpc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles gxp templates into Java, C++, JavaScript and XMB")
        .long_about(
            "gxpc compiles gxp templates into code that writes their markup.\n\n\
            Template names come from source paths relative to --source-root, so\n\
            src/com/example/Hello.gxp with --source-root src is com.example.Hello.\n\
            Directories given as sources contribute every .gxp file beneath them.\n\n\
            Examples:\n  \
            gxpc --source-root src --output-dir gen src                 # Java for every template\n  \
            gxpc src --output-language cpp --output-language cpp-header # C++ header and source\n  \
            gxpc src/com/example/Hello.gxp --dump-tree bind             # Inspect the bound tree",
        )
        .arg_required_else_help(true)
        .arg(
            Arg::new("sources")
                .help("Template files or directories")
                .required(true)
                .num_args(1..)
                .value_hint(ValueHint::AnyPath),
        )
        .arg(
            Arg::new("source-root")
                .long("source-root")
                .value_name("DIR")
                .help("Directory template names are relative to")
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("DIR")
                .help("Directory generated files are written under")
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("output-language")
                .long("output-language")
                .value_name("LANG")
                .help("Output language to generate (repeatable)")
                .action(ArgAction::Append)
                .value_parser(clap::builder::PossibleValuesParser::new(
                    OutputLanguage::ALL.map(|l| l.name()),
                )),
        )
        .arg(
            Arg::new("allow-output")
                .long("allow-output")
                .value_name("SUFFIX")
                .help("Only write outputs ending in SUFFIX (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("PATH")
                .help("Extra schema definition file (repeatable)")
                .action(ArgAction::Append)
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("dependency-file")
                .long("dependency-file")
                .value_name("PATH")
                .help("Dependency cache enabling incremental builds")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("message-bundle")
                .long("message-bundle")
                .value_name("PATH")
                .help("Write every extracted message as id=presentation lines")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Emit source positions as comments in generated code")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("warnings-as-errors")
                .long("warnings-as-errors")
                .help("Treat every warning as an error")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a gxp.toml configuration file")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("dump-tree")
                .long("dump-tree")
                .value_name("PHASE")
                .help("Print the tree produced by PHASE instead of building")
                .value_parser(clap::builder::PossibleValuesParser::new(
                    Phase::ALL.map(|p| p.name()),
                )),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log progress and show informational alerts")
                .action(ArgAction::SetTrue),
        )
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn strings(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
}

/// Defaults, then gxp.toml, then --config, then flags.
fn load_cli_config(matches: &ArgMatches) -> Result<GxpConfig, ConfigError> {
    let mut loader = Loader::new().with_project_file(".");
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    for (flag, key) in [
        ("source-root", "compiler.source_root"),
        ("output-dir", "compiler.output_dir"),
        ("dependency-file", "compiler.dependency_file"),
        ("message-bundle", "compiler.message_bundle"),
    ] {
        if let Some(value) = matches.get_one::<String>(flag) {
            loader = loader.set_override(key, value.as_str())?;
        }
    }
    for (flag, key) in [
        ("output-language", "compiler.output_languages"),
        ("allow-output", "compiler.allowed_outputs"),
        ("schema", "compiler.schemas"),
    ] {
        if let Some(values) = strings(matches, flag) {
            loader = loader.set_override(key, values)?;
        }
    }
    if matches.get_flag("debug") {
        loader = loader.set_override("compiler.debug", true)?;
    }
    if matches.get_flag("warnings-as-errors") {
        loader = loader.set_override("alerts.warnings_as_errors", true)?;
    }
    loader.build()
}

fn schema_factory(config: &GxpConfig) -> gxp_compiler::Result<Arc<dyn SchemaFactory>> {
    let builtin = BuiltinSchemaFactory::new()?;
    if config.compiler.schemas.is_empty() {
        return Ok(Arc::new(builtin));
    }
    let factory = FileSchemaFactory::load(&config.compiler.schemas, Box::new(builtin))?;
    Ok(Arc::new(factory))
}

/// The dependency cache, or a fresh one if it cannot be used.
fn load_dependencies(path: &PathBuf) -> DependencyGraph {
    DependencyGraph::load(&DiskFileStore, path).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring dependency cache; rebuilding everything");
        DependencyGraph::new()
    })
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    let verbose = matches.get_flag("verbose");
    init_tracing(verbose);

    let config = match load_cli_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let (languages, policy) = match (
        config.compiler.output_languages(),
        config.alerts.policy(),
    ) {
        (Ok(languages), Ok(policy)) => (languages, policy),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("Failed to load configuration: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let schemas = match schema_factory(&config) {
        Ok(schemas) => schemas,
        Err(err) => {
            eprintln!("Failed to load schemas: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let paths = strings(&matches, "sources").unwrap_or_default();
    let sources = match sources::collect_sources(&paths) {
        Ok(sources) => sources,
        Err(err) => {
            eprintln!("Error reading sources: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let set = CompilationSet::new(
        config.compiler.build_config(),
        Arc::new(DiskFileStore),
        schemas,
        sources,
    );
    let mut printer = PrintingAlertSink::new(std::io::stderr(), &policy).show_info(verbose);

    if let Some(phase) = matches.get_one::<String>("dump-tree") {
        let Ok(phase) = phase.parse::<Phase>() else {
            return ExitCode::from(EXIT_CONFIG);
        };
        return dump_trees(&set, phase, &policy, &mut printer);
    }

    let mut graph = config
        .compiler
        .dependency_file
        .as_ref()
        .map(load_dependencies);
    let mut full_build = SimpleCompilationManager;
    let manager: &mut dyn CompilationManager = match graph.as_mut() {
        Some(graph) => graph,
        None => &mut full_build,
    };
    let report = set.compile(
        &languages,
        &|path: &Path| config.compiler.allows(path),
        manager,
        &policy,
        &mut printer,
    );
    if let (Some(graph), Some(path)) = (&graph, &config.compiler.dependency_file) {
        if let Err(err) = graph.save(&DiskFileStore, path) {
            eprintln!("Error writing dependency cache: {err}");
        }
    }
    tracing::info!(
        written = report.written().count(),
        errors = report.error_count,
        warnings = report.warning_count,
        "build finished"
    );
    if report.has_errors() {
        ExitCode::from(EXIT_ERRORS)
    } else {
        ExitCode::SUCCESS
    }
}

/// Prints each unit's tree after `phase` to stdout and its alerts so far to stderr.
fn dump_trees(
    set: &CompilationSet,
    phase: Phase,
    policy: &dyn AlertPolicy,
    printer: &mut dyn AlertSink,
) -> ExitCode {
    let mut counter = AlertCounter::forwarding(policy, printer);
    for alert in set.rejected() {
        counter.add(alert.clone());
    }
    let mut stdout = std::io::stdout().lock();
    for unit in set.units() {
        let dumped = unit
            .dump(phase, set)
            .and_then(|tree| unit.alerts(phase, set).map(|alerts| (tree, alerts)));
        match dumped {
            Ok((tree, alerts)) => {
                let _ = writeln!(stdout, "== {} ({phase}) ==\n{tree}", unit.source_name());
                counter.add_all(&alerts);
            }
            Err(err) => {
                eprintln!("{}: internal error: {err}", unit.source_name());
                return ExitCode::from(EXIT_ERRORS);
            }
        }
    }
    if counter.error_count() > 0 {
        ExitCode::from(EXIT_ERRORS)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let matches = build_cli().get_matches_from([
            "gxpc",
            "src",
            "--output-language",
            "javascript",
            "--output-language",
            "xmb",
            "--output-dir",
            "gen",
            "--warnings-as-errors",
        ]);
        let config = load_cli_config(&matches).unwrap();
        assert_eq!(
            config.compiler.output_languages().unwrap(),
            vec![OutputLanguage::JavaScript, OutputLanguage::Xmb]
        );
        assert_eq!(config.compiler.output_dir, PathBuf::from("gen"));
        assert!(config.alerts.warnings_as_errors);
    }
}
