use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use anyhow::{anyhow, Context, Result};

/// Name of the optional per-project settings file.
pub const CONFIG_FILE: &str = "toolpin.toml";
pub const DEFAULT_TOOLS_FILE: &str = "tools.go";
pub const DEFAULT_MANIFEST: &str = "go.mod";
pub const DEFAULT_GO: &str = "go";

/// Contents of a `toolpin.toml` file. Every key is optional.
///
/// ```toml
/// tools-file = "internal/tools/tools.go"
/// manifest = "go.mod"
/// cache-dir = "/var/cache/toolpin"
/// go = "/usr/local/go/bin/go"
/// ```
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolpinToml {
    pub tools_file: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub go: Option<PathBuf>,
}

impl ToolpinToml {
    /// Loads `toolpin.toml` from `root`, or the empty config if there is none.
    pub fn load_or_default<P: AsRef<Path>>(root: P) -> Result<ToolpinToml> {
        let path = root.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            return Ok(ToolpinToml::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))
    }
}

/// Settings given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub tools_file: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub go: Option<PathBuf>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tools_file: PathBuf,
    pub manifest: PathBuf,
    pub cache_dir: PathBuf,
    pub go: PathBuf,
}

impl Settings {
    /// Overrides win over `toolpin.toml`, which wins over the defaults. Relative
    /// paths from the config file are taken relative to `root`.
    pub fn resolve<P: AsRef<Path>>(root: P, overrides: Overrides, file: ToolpinToml) -> Result<Settings> {
        let root = root.as_ref();
        let from_file = |p: Option<PathBuf>| p.map(|p| root.join(p));
        let cache_dir = match overrides.cache_dir.or_else(|| from_file(file.cache_dir)) {
            Some(dir) => dir,
            None => get_global_cache_dir()?,
        };
        Ok(Settings {
            tools_file: overrides
                .tools_file
                .or_else(|| from_file(file.tools_file))
                .unwrap_or_else(|| root.join(DEFAULT_TOOLS_FILE)),
            manifest: overrides
                .manifest
                .or_else(|| from_file(file.manifest))
                .unwrap_or_else(|| root.join(DEFAULT_MANIFEST)),
            cache_dir,
            go: overrides
                .go
                .or(file.go)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GO)),
        })
    }
}

/// Platform cache directory for compiled tools, e.g. `~/.cache/toolpin` on Linux.
pub fn get_global_cache_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "toolpin", "toolpin")
        .ok_or_else(|| anyhow!("Could not determine the user cache directory, maybe set $TOOLPIN_BIN?"))?;
    Ok(proj_dirs.cache_dir().to_path_buf())
}
