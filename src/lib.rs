//! # Toolpin Core Library
//!
//! This crate contains the core logic of the `toolpin` tool: it runs the Go
//! tools a project declares in its `tools.go`, pinned to the exact versions
//! recorded in `go.mod`, and keeps one compiled binary per tool and version in
//! a cache directory so repeated runs skip the build.
//!
//! ## Modules Overview
//! - [`imports`] – Extracting tool import paths from the declarations file
//! - [`modfile`] – Parsing the `go.mod` dependency manifest
//! - [`trie`] – Prefix tree mapping import paths to their enclosing module
//! - [`resolve`] – Pinning every declared tool to a module version
//! - [`package`] – The `Package` entity and its command/binary names
//! - [`cache`] – The versioned binary cache (install, run, touch, evict)
//! - [`installer`] – Install-all and run-by-name on top of the cache
//! - [`toolchain`] – The build/run capability and its `go install` implementation
//! - [`cancel`] – Cancellation signal for subprocesses
//! - [`config`] – `toolpin.toml` and cache directory discovery
//! - [`error`] – Error type shared by the modules above

pub mod error;
pub mod cancel;
pub mod package;
pub mod imports;
pub mod modfile;
pub mod trie;
pub mod resolve;
pub mod toolchain;
pub mod cache;
pub mod installer;
pub mod config;

pub use error::*;
pub use cancel::*;
pub use package::*;
pub use imports::*;
pub use modfile::*;
pub use trie::*;
pub use resolve::*;
pub use toolchain::*;
pub use cache::*;
pub use installer::*;
pub use config::*;
