use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: TetherCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum TetherCommand {
    /// Write link scripts for packages into the link directory. One script per declared bin
    Link {
        /// Package(s) to link
        #[clap(required = true)]
        names: Vec<String>,
        /// Overwrite existing files that were not written by tether
        #[clap(long)]
        overwrite: bool,
    },
    /// Remove link scripts for packages from the link directory
    Unlink {
        /// Package(s) to unlink
        #[clap(required = true)]
        names: Vec<String>,
        /// Remove the files even if they were not written by tether
        #[clap(long)]
        force: bool,
    },
    /// Run a package's binary, downloading it first if needed
    Run {
        /// Bin of the package to run. Defaults to the one named after the package
        #[clap(long)]
        bin: Option<String>,
        /// Version to use instead of the pinned one
        #[clap(long = "use")]
        version: Option<String>,
        name: String,
        /// Arguments passed through to the binary
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Clone or update the package catalog
    SyncCatalog,
    /// List the packages available in the local catalog
    List,
    /// Run a package's self-test command
    Test {
        name: String,
        /// Version to use instead of the pinned one
        #[clap(long = "use")]
        version: Option<String>,
    },
    /// Print the tether version
    Version,
}
