use crate::error::{Result, ToolError};
use crate::imports::list_tools;
use crate::modfile::ModFile;
use crate::package::Package;
use crate::trie::ModuleTrie;
use tracing::debug;

/// Builds a [`ModuleTrie`] from the direct requirements of a manifest.
pub fn module_trie(modfile: &ModFile) -> ModuleTrie {
    let mut modules = ModuleTrie::new();
    for require in modfile.direct() {
        modules.add(&require.path, &require.version);
    }
    modules
}

/// Pins every package to the version of the deepest module that covers it.
///
/// Fails on the first package no direct requirement covers.
pub fn populate_versions(
    mut packages: Vec<Package>,
    manifest_name: &str,
    manifest_src: &str,
) -> Result<Vec<Package>> {
    let modfile = ModFile::parse(manifest_name, manifest_src)?;
    let modules = module_trie(&modfile);

    for package in &mut packages {
        let Some(found) = modules.deepest_match(&package.path) else {
            return Err(ToolError::Unresolved {
                path: package.path.clone(),
            });
        };
        debug!(package = %package.path, module = found.module, version = found.version, "resolved");
        package.module = found.module.to_string();
        package.version = found.version.to_string();
    }

    Ok(packages)
}

/// Source text and display name of one input file.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

/// Extracts the declared tools and resolves each to its pinned version.
pub fn list_packages(tools: Source<'_>, manifest: Source<'_>) -> Result<Vec<Package>> {
    let packages = list_tools(tools.name, tools.text)?;
    populate_versions(packages, manifest.name, manifest.text)
}
