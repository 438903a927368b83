//! `$(VAR)` expansion for download URLs and install paths.
//!
//! Unknown placeholders are not left behind silently: expansion reports them
//! through [`Expansion::Unresolved`], and the expanded text carries the
//! `$(MISSING)` sentinel in their place.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::error::ToolchainError;

/// Text substituted for placeholders that have no value.
pub const MISSING: &str = "$(MISSING)";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)").expect("static placeholder regex"));

/// Known template variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateVar {
    Version,
    Os,
    Arch,
    Goos,
    Goarch,
    Home,
    Gdpath,
    Ext,
}

impl TemplateVar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Version => "VERSION",
            Self::Os => "OS",
            Self::Arch => "ARCH",
            Self::Goos => "GOOS",
            Self::Goarch => "GOARCH",
            Self::Home => "HOME",
            Self::Gdpath => "GDPATH",
            Self::Ext => "EXT",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "VERSION" => Some(Self::Version),
            "OS" => Some(Self::Os),
            "ARCH" => Some(Self::Arch),
            "GOOS" => Some(Self::Goos),
            "GOARCH" => Some(Self::Goarch),
            "HOME" => Some(Self::Home),
            "GDPATH" => Some(Self::Gdpath),
            "EXT" => Some(Self::Ext),
            _ => None,
        }
    }
}

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<TemplateVar, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, var: TemplateVar, value: impl Into<String>) -> &mut Self {
        self.values.insert(var, value.into());
        self
    }

    pub fn with(mut self, var: TemplateVar, value: impl Into<String>) -> Self {
        self.set(var, value);
        self
    }

    pub fn get(&self, var: TemplateVar) -> Option<&str> {
        self.values.get(&var).map(String::as_str)
    }
}

/// Result of expanding a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Resolved(String),
    /// At least one placeholder had no value.
    Unresolved {
        /// Expanded text with `$(MISSING)` in place of each unknown placeholder.
        text: String,
        /// Names of the placeholders that had no value, in order of appearance.
        missing: Vec<String>,
    },
}

impl Expansion {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Converts into the expanded string, failing on the first missing value.
    pub fn into_result(self, template: &str) -> Result<String, ToolchainError> {
        match self {
            Self::Resolved(text) => Ok(text),
            Self::Unresolved { missing, .. } => Err(ToolchainError::UnresolvedTemplate {
                template: template.to_string(),
                placeholder: missing.into_iter().next().unwrap_or_default(),
            }),
        }
    }
}

/// Substitutes every `$(VAR)` in `template`.
pub fn expand(template: &str, vars: &TemplateVars) -> Expansion {
    let mut missing = Vec::new();
    let text = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match TemplateVar::from_name(name).and_then(|var| vars.get(var)) {
            Some(value) => value.to_string(),
            None => {
                missing.push(name.to_string());
                MISSING.to_string()
            }
        }
    });

    if missing.is_empty() {
        Expansion::Resolved(text.into_owned())
    } else {
        Expansion::Unresolved {
            text: text.into_owned(),
            missing,
        }
    }
}
