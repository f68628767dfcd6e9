//! Command-line flags of the publishing client.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "flog-cli",
    version,
    about = "Publish entries and sidebar modules to a Flog blog"
)]
pub struct Cli {
    /// Publish `entry.md` (the default action)
    #[arg(long, conflicts_with = "sidebar")]
    pub entry: bool,

    /// Publish `sidebar.yaml`, replacing every sidebar module
    #[arg(long)]
    pub sidebar: bool,

    /// Target the remote domain instead of the local one
    #[arg(long)]
    pub remote: bool,

    /// Skip link checking and submit with the authored visibility
    #[arg(long)]
    pub nocheck: bool,

    /// Directory holding the source files (defaults to the working directory)
    #[arg(long, env = "FLOG_DIR", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, value_name = "SECONDS")]
    pub timeout: u64,

    /// Emit debug diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Entry,
    Sidebar,
}

impl Cli {
    pub fn action(&self) -> Action {
        if self.sidebar {
            Action::Sidebar
        } else {
            Action::Entry
        }
    }
}
