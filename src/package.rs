use std::fmt;
use serde::Serialize;

/// One installable tool, as declared in the tools file.
///
/// `module` and `version` stay empty until the package is resolved against the
/// dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Full import path, e.g. `github.com/a-h/templ/cmd/templ`.
    pub path: String,
    /// Root path of the module that owns `path`.
    pub module: String,
    /// Exact pinned version of `module`, e.g. `v0.3.819`.
    pub version: String,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        Package {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.module.is_empty() && !self.version.is_empty()
    }

    /// Last segment of the import path. This is the name `go install` gives the binary.
    pub fn command_name(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.path,
        }
    }

    /// Versioned file name used in the binary cache: `<command>@<version>`.
    pub fn bin_name(&self) -> String {
        format!("{}@{}", self.command_name(), self.version)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}@{}", self.path, self.version)
        }
    }
}

/// Splits a cached binary name back into `(command, version)` on the last `@`.
pub fn split_bin_name(bin_name: &str) -> Option<(&str, &str)> {
    let (command, version) = bin_name.rsplit_once('@')?;
    if command.is_empty() || version.is_empty() {
        return None;
    }
    Some((command, version))
}
