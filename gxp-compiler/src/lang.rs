//! Target languages.
//!
//! [`NativeLanguage`] names a language whose code can be embedded in a template through a
//! `…/gxp/code/<lang>` namespace. [`OutputLanguage`] names an artifact the build can produce;
//! several output languages can share one native language (C++ source and header).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeLanguage {
    Cpp,
    Java,
    JavaScript,
}

impl NativeLanguage {
    pub const ALL: [NativeLanguage; 3] = [
        NativeLanguage::Cpp,
        NativeLanguage::Java,
        NativeLanguage::JavaScript,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NativeLanguage::Cpp => "cpp",
            NativeLanguage::Java => "java",
            NativeLanguage::JavaScript => "javascript",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.name() == name)
    }
}

impl fmt::Display for NativeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An artifact kind produced per compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLanguage {
    Java,
    Cpp,
    CppHeader,
    #[serde(rename = "javascript")]
    JavaScript,
    Xmb,
}

impl OutputLanguage {
    pub const ALL: [OutputLanguage; 5] = [
        OutputLanguage::Java,
        OutputLanguage::Cpp,
        OutputLanguage::CppHeader,
        OutputLanguage::JavaScript,
        OutputLanguage::Xmb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputLanguage::Java => "java",
            OutputLanguage::Cpp => "cpp",
            OutputLanguage::CppHeader => "cpp-header",
            OutputLanguage::JavaScript => "javascript",
            OutputLanguage::Xmb => "xmb",
        }
    }

    /// File suffix of generated artifacts, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            OutputLanguage::Java => ".java",
            OutputLanguage::Cpp => ".cc",
            OutputLanguage::CppHeader => ".h",
            OutputLanguage::JavaScript => ".js",
            OutputLanguage::Xmb => ".xmb",
        }
    }

    /// The native code namespace consulted when generating this output.
    pub fn native_language(self) -> Option<NativeLanguage> {
        match self {
            OutputLanguage::Java => Some(NativeLanguage::Java),
            OutputLanguage::Cpp | OutputLanguage::CppHeader => Some(NativeLanguage::Cpp),
            OutputLanguage::JavaScript => Some(NativeLanguage::JavaScript),
            OutputLanguage::Xmb => None,
        }
    }
}

impl fmt::Display for OutputLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.name() == s)
            .ok_or_else(|| format!("unknown output language '{s}'"))
    }
}
