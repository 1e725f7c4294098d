//! Generator registry for output language discovery and selection
//!
//! The build asks the registry for the generator of each requested output language.
//! Generators can be registered and retrieved by language name.

use super::{CodeGenerator, GenerateOptions};
use crate::alert::AlertSink;
use crate::error::{Error, Result};
use crate::lang::OutputLanguage;
use crate::phases::MessageExtractedTree;
use std::collections::HashMap;

/// Registry of code generators, keyed by output language name.
///
/// # Examples
///
/// ```ignore
/// let registry = GeneratorRegistry::with_defaults();
/// let java = registry.get("java")?;
/// let code = java.generate(&tree, &GenerateOptions::default(), &mut alerts)?;
/// ```
pub struct GeneratorRegistry {
    generators: HashMap<String, Box<dyn CodeGenerator>>,
}

impl GeneratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        GeneratorRegistry {
            generators: HashMap::new(),
        }
    }

    /// Register a generator
    ///
    /// A generator already registered for the same language is replaced.
    pub fn register<G: CodeGenerator + 'static>(&mut self, generator: G) {
        self.generators
            .insert(generator.language().name().to_string(), Box::new(generator));
    }

    /// Get a generator by language name
    pub fn get(&self, name: &str) -> Result<&dyn CodeGenerator> {
        self.generators
            .get(name)
            .map(|g| g.as_ref())
            .ok_or_else(|| Error::GeneratorNotFound(name.to_string()))
    }

    pub fn for_language(&self, language: OutputLanguage) -> Result<&dyn CodeGenerator> {
        self.get(language.name())
    }

    pub fn has(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    /// All registered language names, sorted
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<_> = self.generators.keys().cloned().collect();
        names.sort();
        names
    }

    /// The output language whose file suffix `filename` ends with.
    ///
    /// Suffixes are compared whole, so `Hello.h` is a C++ header and not C++ source.
    pub fn detect_language_from_filename(&self, filename: &str) -> Option<OutputLanguage> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?;
        self.generators
            .values()
            .map(|g| g.language())
            .find(|lang| lang.suffix().trim_start_matches('.') == extension)
    }

    /// Generate the file for `language`
    pub fn generate(
        &self,
        language: OutputLanguage,
        tree: &MessageExtractedTree,
        options: &GenerateOptions,
        sink: &mut dyn AlertSink,
    ) -> Result<String> {
        self.for_language(language)?.generate(tree, options, sink)
    }

    /// Create a registry with every built-in generator
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(super::java::JavaGenerator);
        registry.register(super::cpp::CppGenerator);
        registry.register(super::cpp::CppHeaderGenerator);
        registry.register(super::javascript::JavaScriptGenerator);
        registry.register(super::xmb::XmbGenerator);
        registry
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
