use anyhow::{anyhow, Result};
use crate::cache::{BinaryCache, RunOutcome};
use crate::cancel::CancelSignal;
use crate::package::Package;
use crate::toolchain::Toolchain;

/// Installs every package, skipping the ones already cached unless `force` is set.
///
/// Returns how many packages were built.
pub async fn install_packages<T: Toolchain>(
    packages: &[Package],
    cache: &BinaryCache,
    toolchain: &T,
    force: bool,
    cancel: &CancelSignal,
) -> Result<usize> {
    let mut installed = 0;
    for package in packages {
        if !force && cache.exists(package) {
            println!("{package} is already installed");
            continue;
        }
        cache.install(toolchain, package, cancel).await?;
        installed += 1;
    }
    Ok(installed)
}

/// Finds the declared tool whose command name is `name`.
pub fn find_package<'a>(packages: &'a [Package], name: &str) -> Result<&'a Package> {
    packages
        .iter()
        .find(|p| p.command_name() == name)
        .ok_or_else(|| anyhow!("Unknown tool: {name}\n{}", available_tools(packages)))
}

/// Runs the declared tool `name`, installing it first if needed.
pub async fn run_tool<T: Toolchain>(
    packages: &[Package],
    name: &str,
    args: &[String],
    cache: &BinaryCache,
    toolchain: &T,
    cancel: &CancelSignal,
) -> Result<RunOutcome> {
    let package = find_package(packages, name)?;
    Ok(cache.run(toolchain, package, args, cancel).await?)
}

/// Help text listing the tools that can be run.
pub fn available_tools(packages: &[Package]) -> String {
    if packages.is_empty() {
        return "No tools are declared".to_string();
    }
    let mut help = String::from("Available tools:\n");
    for package in packages {
        help.push_str(&format!("\t{} - Execute {}\n", package.command_name(), package.bin_name()));
    }
    help
}
