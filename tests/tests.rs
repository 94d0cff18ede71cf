use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant, SystemTime};
use filetime::FileTime;
use tempfile::TempDir;
use toolpin::*;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Stands in for `go install`: writes a dummy binary and records every call.
#[derive(Default)]
struct FakeToolchain {
    builds: Cell<usize>,
    runs: RefCell<Vec<(PathBuf, Vec<String>)>>,
    fail_build: bool,
    skip_output: bool,
    fail_run: bool,
    delete_on_run: bool,
}

fn failed_status() -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(1)
    }
}

impl Toolchain for FakeToolchain {
    async fn build(&self, package: &Package, out_dir: &Path, cancel: &CancelSignal) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled(package.to_string()));
        }
        self.builds.set(self.builds.get() + 1);
        if self.fail_build {
            return Err(ToolError::Build {
                package: package.to_string(),
                status: failed_status(),
                diagnostics: "cannot find module providing package".to_string(),
            });
        }
        let artifact = out_dir.join(format!("{}{}", package.command_name(), EXEC_EXT));
        if !self.skip_output {
            std::fs::write(&artifact, b"#!/bin/sh\n").unwrap();
        }
        Ok(artifact)
    }

    async fn run(
        &self,
        package: &Package,
        binary: &Path,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled(package.to_string()));
        }
        self.runs.borrow_mut().push((binary.to_path_buf(), args.to_vec()));
        if self.delete_on_run {
            std::fs::remove_file(binary).unwrap();
        }
        if self.fail_run {
            return Err(ToolError::Run {
                package: package.to_string(),
                status: failed_status(),
            });
        }
        Ok(())
    }
}

fn tool() -> Package {
    Package {
        path: "example.org/org/tool/cmd/tool".to_string(),
        module: "example.org/org/tool".to_string(),
        version: "v1.0.0".to_string(),
    }
}

fn setup_cache() -> (TempDir, BinaryCache) {
    let dir = TempDir::new().unwrap();
    let cache = BinaryCache::new(dir.path());
    (dir, cache)
}

fn cancelled() -> CancelSignal {
    let (handle, signal) = cancel::channel();
    handle.cancel();
    signal
}

/// Backdates `path` and returns the modification time as stored on disk.
fn set_age(path: &Path, age: Duration) -> FileTime {
    let time = FileTime::from_system_time(SystemTime::now() - age);
    filetime::set_file_mtime(path, time).unwrap();
    mtime(path)
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap())
}

/// Writes an executable shell script.
#[cfg(unix)]
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_then_execute() {
        let (dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();
        let args = vec!["generate".to_string()];

        let outcome = cache.run(&toolchain, &tool(), &args, &CancelSignal::never()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Installed);
        assert_eq!(toolchain.builds.get(), 1);
        assert_eq!(file_names(dir.path()), vec![format!("tool@v1.0.0{EXEC_EXT}")]);
        assert_eq!(toolchain.runs.borrow()[0], (cache.bin_path(&tool()), args.clone()));

        let old = set_age(&cache.bin_path(&tool()), 5 * DAY);
        let outcome = cache.run(&toolchain, &tool(), &args, &CancelSignal::never()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cached);
        assert_eq!(toolchain.builds.get(), 1);
        assert_eq!(toolchain.runs.borrow().len(), 2);
        assert!(mtime(&cache.bin_path(&tool())) > old);
    }

    #[tokio::test]
    async fn test_build_failure_leaves_no_entry() {
        let (dir, cache) = setup_cache();
        let toolchain = FakeToolchain { fail_build: true, ..Default::default() };

        let err = cache.install(&toolchain, &tool(), &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, ToolError::Build { .. }));
        assert!(err.to_string().contains("cannot find module providing package"));
        assert!(!cache.exists(&tool()));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_build_output_is_a_filesystem_error() {
        let (dir, cache) = setup_cache();
        let toolchain = FakeToolchain { skip_output: true, ..Default::default() };

        let err = cache.install(&toolchain, &tool(), &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
        assert!(!cache.exists(&tool()));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_is_not_touched() {
        let (_dir, cache) = setup_cache();
        let toolchain = FakeToolchain { fail_run: true, ..Default::default() };
        cache.install(&toolchain, &tool(), &CancelSignal::never()).await.unwrap();
        let old = set_age(&cache.bin_path(&tool()), 3 * DAY);

        let err = cache.execute(&toolchain, &tool(), &[], &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(&err, ToolError::Run { package, .. } if package == "example.org/org/tool/cmd/tool@v1.0.0"));
        assert_eq!(mtime(&cache.bin_path(&tool())), old);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_not_touched() {
        let (_dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();
        cache.install(&toolchain, &tool(), &CancelSignal::never()).await.unwrap();
        let old = set_age(&cache.bin_path(&tool()), 3 * DAY);

        let err = cache.execute(&toolchain, &tool(), &[], &cancelled()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(toolchain.runs.borrow().is_empty());
        assert_eq!(mtime(&cache.bin_path(&tool())), old);
    }

    #[tokio::test]
    async fn test_touch_failure_after_run_is_not_fatal() {
        let (_dir, cache) = setup_cache();
        let toolchain = FakeToolchain { delete_on_run: true, ..Default::default() };
        cache.install(&toolchain, &tool(), &CancelSignal::never()).await.unwrap();

        cache.execute(&toolchain, &tool(), &[], &CancelSignal::never()).await.unwrap();
        assert_eq!(toolchain.runs.borrow().len(), 1);
        assert!(!cache.bin_path(&tool()).exists());
    }

    #[tokio::test]
    async fn test_cancelled_install() {
        let (dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();

        let err = cache.run(&toolchain, &tool(), &[], &cancelled()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(toolchain.builds.get(), 0);
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_package_never_reaches_cache() {
        let (dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();
        let unresolved = Package::new("example.org/org/tool/cmd/tool");

        let err = cache.run(&toolchain, &unresolved, &[], &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unresolved { .. }));
        assert_eq!(toolchain.builds.get(), 0);
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_install_packages_skips_cached_unless_forced() {
        let (_dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();
        let mut other = tool();
        other.path = "example.org/org/tool/cmd/other".to_string();
        let packages = vec![tool(), other];

        let never = CancelSignal::never();
        assert_eq!(install_packages(&packages, &cache, &toolchain, false, &never).await.unwrap(), 2);
        assert_eq!(install_packages(&packages, &cache, &toolchain, false, &never).await.unwrap(), 0);
        assert_eq!(install_packages(&packages, &cache, &toolchain, true, &never).await.unwrap(), 2);
        assert_eq!(toolchain.builds.get(), 4);
    }

    #[tokio::test]
    async fn test_run_tool_by_name() {
        let (_dir, cache) = setup_cache();
        let toolchain = FakeToolchain::default();
        let packages = vec![tool()];
        let never = CancelSignal::never();

        run_tool(&packages, "tool", &[], &cache, &toolchain, &never).await.unwrap();
        assert!(cache.exists(&tool()));
        assert!(run_tool(&packages, "nope", &[], &cache, &toolchain, &never).await.is_err());
        assert_eq!(toolchain.builds.get(), 1);
    }

    #[test]
    fn test_evict_removes_only_old_files() {
        let (dir, cache) = setup_cache();
        let fresh = dir.path().join("fresh@v1.0.0");
        let recent = dir.path().join("recent@v1.0.0");
        let stale = dir.path().join("stale@v1.0.0");
        for path in [&fresh, &recent, &stale] {
            std::fs::write(path, b"bin").unwrap();
        }
        let fresh_time = set_age(&fresh, DAY);
        let recent_time = set_age(&recent, 10 * DAY);
        set_age(&stale, 40 * DAY);

        let report = cache.evict(30 * DAY).unwrap();
        assert_eq!(report.removed, vec!["stale@v1.0.0".to_string()]);
        assert!(report.failed.is_empty());
        assert!(!stale.exists());
        assert_eq!(mtime(&fresh), fresh_time);
        assert_eq!(mtime(&recent), recent_time);
    }

    #[test]
    fn test_evict_skips_directories() {
        let (dir, cache) = setup_cache();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("deep@v1.0.0"), b"bin").unwrap();
        set_age(&sub.join("deep@v1.0.0"), 100 * DAY);
        set_age(&sub, 100 * DAY);

        let report = cache.evict(DAY).unwrap();
        assert!(report.removed.is_empty());
        assert!(sub.join("deep@v1.0.0").exists());
    }

    #[test]
    fn test_evict_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cache = BinaryCache::new(dir.path().join("gone"));
        assert!(cache.evict(DAY).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_go_build_is_killed_on_cancel() {
        let bin = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let go = GoToolchain::new(script(bin.path(), "go", "exec sleep 30"));
        let (handle, signal) = cancel::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = go.build(&tool(), out.path(), &signal).await.unwrap_err();
        assert!(err.is_cancelled(), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_go_run_is_killed_on_cancel() {
        let bin = TempDir::new().unwrap();
        let binary = script(bin.path(), "tool@v1.0.0", "exec sleep 30");
        let (handle, signal) = cancel::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = GoToolchain::default().run(&tool(), &binary, &[], &signal).await.unwrap_err();
        assert!(err.is_cancelled(), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Ctrl-C in a terminal reaches the child as well, so it can exit with a
    /// failure before the cancellation is observed.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_exiting_on_interrupt_is_cancelled() {
        let bin = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let go = GoToolchain::new(script(bin.path(), "go", "sleep 0.2\nexit 130"));
        let binary = script(bin.path(), "tool@v1.0.0", "sleep 0.2\nexit 130");

        for _ in 0..4 {
            let (handle, signal) = cancel::channel();
            let t = tool();
            let build = go.build(&t, out.path(), &signal);
            tokio::pin!(build);
            assert!(tokio::time::timeout(Duration::from_millis(50), &mut build).await.is_err());
            // block the runtime until the child is gone, then cancel
            std::thread::sleep(Duration::from_millis(600));
            handle.cancel();
            let err = build.await.unwrap_err();
            assert!(err.is_cancelled(), "{err}");

            let (handle, signal) = cancel::channel();
            let t = tool();
            let run = go.run(&t, &binary, &[], &signal);
            tokio::pin!(run);
            assert!(tokio::time::timeout(Duration::from_millis(50), &mut run).await.is_err());
            std::thread::sleep(Duration::from_millis(600));
            handle.cancel();
            let err = run.await.unwrap_err();
            assert!(err.is_cancelled(), "{err}");
        }
    }

    #[test]
    fn test_resolve_and_name() {
        let tools = "//go:build tools\n\npackage tools\n\nimport (\n\t_ \"example.org/org/tool/cmd/tool\"\n)\n";
        let manifest = "module example.org/me/app\n\ngo 1.22\n\nrequire (\n\texample.org/org/tool v1.0.0\n\texample.org/unrelated v0.2.0 // indirect\n)\n";
        let packages = list_packages(
            Source { name: "tools.go", text: tools },
            Source { name: "go.mod", text: manifest },
        )
        .unwrap();
        assert_eq!(packages, vec![tool()]);
        assert_eq!(packages[0].command_name(), "tool");
        assert_eq!(packages[0].bin_name(), "tool@v1.0.0");
    }
}
