use std::collections::HashMap;

/// Prefix tree over `/`-separated module paths.
///
/// Only nodes that terminate a declared module carry a module path and version;
/// intermediate nodes leave both empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleTrie {
    children: HashMap<String, ModuleTrie>,
    module: String,
    version: String,
}

/// The module that covers an import path, as found by [`ModuleTrie::deepest_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleMatch<'a> {
    pub module: &'a str,
    pub version: &'a str,
}

impl ModuleTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `version` for `module`. Adding the same path again overwrites it.
    pub fn add(&mut self, module: &str, version: &str) {
        let mut current = self;
        for segment in module.split('/') {
            current = current.children.entry(segment.to_string()).or_default();
        }
        current.module = module.to_string();
        current.version = version.to_string();
    }

    /// Walks `path` segment by segment and returns the deepest declared module on
    /// the way, i.e. the longest module path that prefixes `path`.
    pub fn deepest_match(&self, path: &str) -> Option<ModuleMatch<'_>> {
        let mut current = self;
        let mut found = None;
        for segment in path.split('/') {
            match current.children.get(segment) {
                Some(child) => current = child,
                None => break,
            }
            if current.is_terminal() {
                found = Some(ModuleMatch {
                    module: &current.module,
                    version: &current.version,
                });
            }
        }
        found
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn is_terminal(&self) -> bool {
        !self.module.is_empty()
    }
}
