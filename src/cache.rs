use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use colored::Colorize;
use filetime::FileTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use crate::cancel::CancelSignal;
use crate::error::{Result, ToolError};
use crate::package::{split_bin_name, Package};
use crate::toolchain::{Toolchain, EXEC_EXT};

/// Directory of compiled tools, one file per `<command>@<version>`.
///
/// A file's modification time records when it was last run.
#[derive(Debug, Clone)]
pub struct BinaryCache {
    dir: PathBuf,
}

/// One file found in the cache directory.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub file_name: String,
    pub command: Option<String>,
    pub version: Option<String>,
    /// Time since the file was last used.
    pub age: Duration,
}

/// Result of [`BinaryCache::evict`].
#[derive(Debug, Default)]
pub struct EvictReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, std::io::Error)>,
}

/// What [`BinaryCache::run`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Installed,
    Cached,
}

impl BinaryCache {
    /// Uses `dir` as is. The directory must already exist and be writable.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Makes `dir` absolute, creates it if missing and checks it is a directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = std::path::absolute(dir.as_ref())
            .map_err(|e| ToolError::io("resolve", dir.as_ref(), e))?;
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ToolError::Config(format!(
                    "{} exists, but is not a directory",
                    dir.display()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(&dir).map_err(|e| ToolError::io("create", &dir, e))?;
                debug!(dir = %dir.display(), "created cache directory");
            }
            Err(e) => return Err(ToolError::io("inspect", &dir, e)),
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the versioned binary for `package`.
    pub fn bin_path(&self, package: &Package) -> PathBuf {
        self.dir.join(format!("{}{}", package.bin_name(), EXEC_EXT))
    }

    pub fn exists(&self, package: &Package) -> bool {
        package.is_resolved() && self.bin_path(package).is_file()
    }

    /// Builds `package` and moves the result to its versioned name.
    ///
    /// The build happens in a private staging directory inside the cache, so a
    /// failed or interrupted build never leaves a versioned entry behind.
    pub async fn install<T: Toolchain>(
        &self,
        toolchain: &T,
        package: &Package,
        cancel: &CancelSignal,
    ) -> Result<PathBuf> {
        ensure_resolved(package)?;
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(&self.dir)
            .map_err(|e| ToolError::io("create staging directory in", &self.dir, e))?;

        eprint!("Installing {package}... ");
        let _ = std::io::stderr().flush();
        let built = match toolchain.build(package, staging.path(), cancel).await {
            Ok(built) => built,
            Err(e) => {
                eprintln!("{}", "✗".red());
                return Err(e);
            }
        };

        let target = self.bin_path(package);
        if let Err(e) = std::fs::rename(&built, &target) {
            eprintln!("{}", "✗".red());
            return Err(ToolError::io("rename build output to", target, e));
        }
        eprintln!("{}", "✓".green());
        info!(package = %package, path = %target.display(), "installed");
        Ok(target)
    }

    /// Runs the cached binary and marks it as used.
    pub async fn execute<T: Toolchain>(
        &self,
        toolchain: &T,
        package: &Package,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<()> {
        ensure_resolved(package)?;
        toolchain
            .run(package, &self.bin_path(package), args, cancel)
            .await?;
        if let Err(e) = self.touch(package) {
            warn!(package = %package, error = ?e, "could not mark binary as used");
        }
        Ok(())
    }

    /// Installs `package` if it is not cached yet, then runs it.
    pub async fn run<T: Toolchain>(
        &self,
        toolchain: &T,
        package: &Package,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<RunOutcome> {
        let outcome = if self.exists(package) {
            debug!(package = %package, "cache hit");
            RunOutcome::Cached
        } else {
            self.install(toolchain, package, cancel).await?;
            RunOutcome::Installed
        };
        self.execute(toolchain, package, args, cancel).await?;
        Ok(outcome)
    }

    /// Sets the binary's modification time to now.
    pub fn touch(&self, package: &Package) -> Result<()> {
        let path = self.bin_path(package);
        filetime::set_file_mtime(&path, FileTime::now())
            .map_err(|e| ToolError::io("touch", path, e))
    }

    /// Lists the binaries in the cache. Subdirectories are skipped.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let now = SystemTime::now();
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| self.walk_error(e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = entry.metadata().map_err(|e| self.walk_error(e))?;
            let modified = meta
                .modified()
                .map_err(|e| ToolError::io("read modification time of", entry.path(), e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let stem = file_name.strip_suffix(EXEC_EXT).unwrap_or(&file_name);
            let (command, version) = match split_bin_name(stem) {
                Some((c, v)) => (Some(c.to_string()), Some(v.to_string())),
                None => (None, None),
            };
            entries.push(CacheEntry {
                age: now.duration_since(modified).unwrap_or_default(),
                file_name,
                command,
                version,
            });
        }
        Ok(entries)
    }

    /// Removes every binary not used within `older_than`.
    ///
    /// Failing to list the directory or read a timestamp aborts the sweep; a
    /// file that cannot be removed is recorded in the report and skipped.
    pub fn evict(&self, older_than: Duration) -> Result<EvictReport> {
        Ok(self.remove_older(self.entries()?, older_than))
    }

    fn remove_older(&self, entries: Vec<CacheEntry>, older_than: Duration) -> EvictReport {
        let mut report = EvictReport::default();
        for entry in entries {
            if entry.age <= older_than {
                continue;
            }
            let path = self.dir.join(&entry.file_name);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(file = %entry.file_name, age = ?entry.age, "evicted");
                    report.removed.push(entry.file_name);
                }
                Err(e) => {
                    warn!(file = %entry.file_name, error = %e, "could not remove");
                    report.failed.push((entry.file_name, e));
                }
            }
        }
        report
    }

    fn walk_error(&self, e: walkdir::Error) -> ToolError {
        let path = e.path().unwrap_or(&self.dir).to_path_buf();
        ToolError::io("read", path, e.into())
    }
}

fn ensure_resolved(package: &Package) -> Result<()> {
    if package.is_resolved() {
        Ok(())
    } else {
        Err(ToolError::Unresolved {
            path: package.path.clone(),
        })
    }
}
