use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Declarations file listing the tools as imports. Defaults to `tools.go`
    #[clap(long, global = true)]
    pub tools_file: Option<PathBuf>,
    /// Dependency manifest pinning the tool modules. Defaults to `go.mod`
    #[clap(long, global = true)]
    pub manifest: Option<PathBuf>,
    /// Directory holding the compiled tools
    #[clap(long, global = true, env = "TOOLPIN_BIN")]
    pub cache_dir: Option<PathBuf>,
    /// The `go` command used to build tools
    #[clap(long, global = true, env = "TOOLPIN_GO")]
    pub go: Option<PathBuf>,
    /// Log what is going on to stderr
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub(crate) command: ToolpinCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ToolpinCommand {
    /// Installs every tool declared in the tools file
    Install {
        /// Rebuild tools that are already cached
        #[clap(short, long)]
        force: bool,
        /// Install one specific tool
        #[clap(long)]
        name: Option<String>,
    },
    /// Removes cached binaries that have not been used for a while
    Clean {
        /// Delete binaries older than this, e.g. `30d` or `12h`
        #[clap(long, default_value = "30d", value_parser = humantime::parse_duration)]
        older_than: Duration,
    },
    /// Lists the declared tools with their pinned versions
    List {
        /// Print as JSON
        #[clap(long)]
        json: bool,
    },
    /// Lists the binaries in the cache directory
    Cache,
    /// Runs a tool, installing it first if needed
    Run {
        /// The tool's command name followed by its arguments, passed through untouched
        #[clap(
            value_name = "TOOL",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        argv: Vec<String>,
    },
    /// `toolpin <tool> [args...]` is short for `toolpin run <tool> [args...]`.
    ///
    /// A tool named like one of the built-in commands can only be reached
    /// through `toolpin run`.
    #[command(external_subcommand)]
    Tool(Vec<String>),
}
