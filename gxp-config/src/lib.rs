//! Shared configuration loader for the gxp toolchain.
//!
//! `defaults/gxp.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`GxpConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use gxp_compiler::alert::{AlertKind, ConfigurableAlertPolicy, Severity};
use gxp_compiler::build::BuildConfig;
use gxp_compiler::codegen::GenerateOptions;
use gxp_compiler::lang::OutputLanguage;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_TOML: &str = include_str!("../defaults/gxp.default.toml");

/// File picked up from the working directory when present.
pub const PROJECT_FILE: &str = "gxp.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("compiler.output_languages: unknown output language '{0}'")]
    UnknownLanguage(String),

    #[error("alerts.overrides: unknown alert kind '{0}'")]
    UnknownAlertKind(String),

    #[error("alerts.overrides.{kind}: '{value}' is not one of info, warning, error")]
    InvalidSeverity { kind: String, value: String },
}

/// Top-level configuration consumed by gxp applications.
#[derive(Debug, Clone, Deserialize)]
pub struct GxpConfig {
    pub compiler: CompilerConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    pub output_languages: Vec<String>,
    pub source_root: PathBuf,
    pub output_dir: PathBuf,
    pub schemas: Vec<PathBuf>,
    pub allowed_outputs: Vec<String>,
    pub debug: bool,
    #[serde(default)]
    pub dependency_file: Option<PathBuf>,
    #[serde(default)]
    pub message_bundle: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub warnings_as_errors: bool,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl CompilerConfig {
    /// The configured languages, in order, without repeats.
    pub fn output_languages(&self) -> Result<Vec<OutputLanguage>, ConfigError> {
        let mut languages = Vec::new();
        for name in &self.output_languages {
            let language: OutputLanguage = name
                .parse()
                .map_err(|_| ConfigError::UnknownLanguage(name.clone()))?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        Ok(languages)
    }

    /// Whether the build may write `output`.
    pub fn allows(&self, output: &Path) -> bool {
        if self.allowed_outputs.is_empty() {
            return true;
        }
        let name = output.to_string_lossy();
        self.allowed_outputs
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            source_root: self.source_root.clone(),
            output_dir: self.output_dir.clone(),
            generate: GenerateOptions {
                debug_comments: self.debug,
            },
            message_bundle: self.message_bundle.clone(),
        }
    }
}

impl AlertsConfig {
    pub fn policy(&self) -> Result<ConfigurableAlertPolicy, ConfigError> {
        let mut policy = ConfigurableAlertPolicy::new();
        policy.set_warnings_as_errors(self.warnings_as_errors);
        for (kind, severity) in &self.overrides {
            let parsed_kind: AlertKind = kind
                .parse()
                .map_err(|_| ConfigError::UnknownAlertKind(kind.clone()))?;
            let parsed_severity: Severity =
                severity
                    .parse()
                    .map_err(|_| ConfigError::InvalidSeverity {
                        kind: kind.clone(),
                        value: severity.clone(),
                    })?;
            policy.set_severity(parsed_kind, parsed_severity);
        }
        Ok(policy)
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer `gxp.toml` from `dir` if it exists.
    pub fn with_project_file(self, dir: impl AsRef<Path>) -> Self {
        self.with_optional_file(dir.as_ref().join(PROJECT_FILE))
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    ///
    /// Language names and alert overrides are checked here so a bad file fails before any
    /// source is read.
    pub fn build(self) -> Result<GxpConfig, ConfigError> {
        let config: GxpConfig = self.builder.build()?.try_deserialize()?;
        config.compiler.output_languages()?;
        config.alerts.policy()?;
        Ok(config)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<GxpConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gxp_compiler::alert::{Alert, AlertPolicy, SourcePosition};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn alert(kind: AlertKind) -> Alert {
        Alert::new(kind, SourcePosition::whole_file("a.gxp"), "x")
    }

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(
            config.compiler.output_languages().unwrap(),
            vec![OutputLanguage::Java]
        );
        assert_eq!(config.compiler.source_root, PathBuf::from("."));
        assert!(config.compiler.dependency_file.is_none());
        assert!(config.compiler.message_bundle.is_none());
        assert!(!config.compiler.debug);
        assert!(!config.alerts.warnings_as_errors);
        assert!(config.alerts.overrides.is_empty());
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("compiler.output_languages", vec!["cpp", "cpp-header", "cpp"])
            .expect("override to apply")
            .set_override("compiler.debug", true)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(
            config.compiler.output_languages().unwrap(),
            vec![OutputLanguage::Cpp, OutputLanguage::CppHeader]
        );
        assert!(config.compiler.build_config().generate.debug_comments);
    }

    #[test]
    fn layers_project_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "[compiler]\noutput_dir = \"gen\"\nmessage_bundle = \"gen/messages.properties\"\n\n[alerts.overrides]\nunextractable-content = \"error\"\n",
        )
        .unwrap();
        let config = Loader::new()
            .with_project_file(dir.path())
            .build()
            .expect("config to build");
        assert_eq!(config.compiler.output_dir, PathBuf::from("gen"));
        assert_eq!(
            config.compiler.build_config().message_bundle,
            Some(PathBuf::from("gen/messages.properties"))
        );
        let policy = config.alerts.policy().unwrap();
        assert_eq!(
            policy.severity(&alert(AlertKind::UnextractableContent)),
            Severity::Error
        );
    }

    #[test]
    fn missing_project_file_is_fine() {
        let dir = TempDir::new().unwrap();
        assert!(Loader::new().with_project_file(dir.path()).build().is_ok());
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = Loader::new().with_file(dir.path().join("nope.toml")).build();
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn rejects_unknown_language() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[compiler]\noutput_languages = [\"cobol\"]").unwrap();
        let result = Loader::new()
            .with_file(file.path())
            .set_override("compiler.debug", false)
            .unwrap()
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownLanguage(name)) if name == "cobol"));
    }

    #[test]
    fn rejects_bad_alert_overrides() {
        let config = load_defaults().unwrap();
        let mut alerts = config.alerts.clone();
        alerts
            .overrides
            .insert("no-such-kind".to_string(), "error".to_string());
        assert!(matches!(
            alerts.policy(),
            Err(ConfigError::UnknownAlertKind(kind)) if kind == "no-such-kind"
        ));

        let mut alerts = config.alerts;
        alerts
            .overrides
            .insert("io".to_string(), "fatal".to_string());
        assert!(matches!(
            alerts.policy(),
            Err(ConfigError::InvalidSeverity { .. })
        ));
    }

    #[test]
    fn warnings_as_errors() {
        let config = Loader::new()
            .set_override("alerts.warnings_as_errors", true)
            .unwrap()
            .build()
            .unwrap();
        let policy = config.alerts.policy().unwrap();
        assert_eq!(
            policy.severity(&alert(AlertKind::DeprecatedElement)),
            Severity::Error
        );
        assert_eq!(policy.severity(&alert(AlertKind::Progress)), Severity::Info);
    }

    #[test]
    fn allowed_outputs_filter_by_suffix() {
        let mut config = load_defaults().unwrap().compiler;
        assert!(config.allows(Path::new("out/A.java")));
        config.allowed_outputs = vec![".h".to_string()];
        assert!(config.allows(Path::new("out/A.h")));
        assert!(!config.allows(Path::new("out/A.cc")));
    }
}
