use std::path::Path;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use toolpin::cache::BinaryCache;
use toolpin::cancel::CancelSignal;
use toolpin::config::{Overrides, Settings, ToolpinToml};
use toolpin::installer::{find_package, install_packages, run_tool};
use toolpin::package::Package;
use toolpin::resolve::{list_packages, Source};
use toolpin::toolchain::GoToolchain;
use crate::cli::{ToolpinCommand, CLI};

pub async fn execute(cli: CLI, cancel: CancelSignal) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let overrides = Overrides {
        tools_file: cli.tools_file,
        manifest: cli.manifest,
        cache_dir: cli.cache_dir,
        go: cli.go,
    };
    let settings = Settings::resolve(&cwd, overrides, ToolpinToml::load_or_default(&cwd)?)?;
    let cache = BinaryCache::open(&settings.cache_dir)?;
    let toolchain = GoToolchain::new(&settings.go);

    match cli.command {
        ToolpinCommand::Clean { older_than } => {
            execute_clean(&cache, older_than)
        }
        ToolpinCommand::Cache => {
            execute_cache(&cache)
        }
        ToolpinCommand::Install { force, name } => {
            let packages = load_packages(&settings)?;
            execute_install(&packages, name, force, &cache, &toolchain, &cancel).await
        }
        ToolpinCommand::List { json } => {
            let packages = load_packages(&settings)?;
            execute_list(&packages, &cache, json)
        }
        ToolpinCommand::Run { argv: mut argv } | ToolpinCommand::Tool(mut argv) => {
            if argv.is_empty() {
                bail!("No tool given");
            }
            let name = argv.remove(0);
            let packages = load_packages(&settings)?;
            run_tool(&packages, &name, &argv, &cache, &toolchain, &cancel).await?;
            Ok(())
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| {
        format!(
            "Could not read {}. Remember to run this command in the root of your project",
            path.display()
        )
    })
}

fn load_packages(settings: &Settings) -> Result<Vec<Package>> {
    let tools = read_source(&settings.tools_file)?;
    let manifest = read_source(&settings.manifest)?;
    let tools_name = settings.tools_file.display().to_string();
    let manifest_name = settings.manifest.display().to_string();
    let packages = list_packages(
        Source { name: &tools_name, text: &tools },
        Source { name: &manifest_name, text: &manifest },
    )?;
    Ok(packages)
}

pub async fn execute_install(
    packages: &[Package],
    name: Option<String>,
    force: bool,
    cache: &BinaryCache,
    toolchain: &GoToolchain,
    cancel: &CancelSignal,
) -> Result<()> {
    match name {
        Some(name) => {
            let package = find_package(packages, &name)?;
            install_packages(std::slice::from_ref(package), cache, toolchain, force, cancel).await?;
        }
        None => {
            install_packages(packages, cache, toolchain, force, cancel).await?;
        }
    }
    Ok(())
}

pub fn execute_clean(cache: &BinaryCache, older_than: Duration) -> Result<()> {
    let report = cache.evict(older_than)?;
    for name in &report.removed {
        println!("Removing {name} ... {}", "✓".green());
    }
    for (name, err) in &report.failed {
        eprintln!("Could not remove {name}: {err}");
    }
    if report.removed.is_empty() && report.failed.is_empty() {
        println!("Nothing to clean");
    }
    Ok(())
}

pub fn execute_cache(cache: &BinaryCache) -> Result<()> {
    let entries = cache.entries()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache.dir().display());
        return Ok(());
    }
    for entry in entries {
        let age = humantime::format_duration(Duration::from_secs(entry.age.as_secs()));
        match (entry.command, entry.version) {
            (Some(command), Some(version)) => {
                println!("{command} {version}");
            }
            _ => {
                println!("{} (not a versioned binary)", entry.file_name);
            }
        }
        println!("   last used {age} ago");
    }
    Ok(())
}

#[derive(Serialize)]
struct ListedPackage<'a> {
    #[serde(flatten)]
    package: &'a Package,
    command: &'a str,
    installed: bool,
}

pub fn execute_list(packages: &[Package], cache: &BinaryCache, json: bool) -> Result<()> {
    if json {
        let listed: Vec<_> = packages
            .iter()
            .map(|package| ListedPackage {
                package,
                command: package.command_name(),
                installed: cache.exists(package),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if packages.is_empty() {
        println!("No tools");
        return Ok(());
    }
    for package in packages {
        println!("{}: {}", package.command_name(), package.version);
        println!("   {}", package.path);
        match cache.exists(package) {
            true => println!("   installed"),
            false => println!("   not installed"),
        }
    }
    Ok(())
}
