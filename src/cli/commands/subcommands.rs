use clap::Subcommand;

/// Page cache subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommands {
    /// List cached pages, most recently used first
    List,
    /// Remove one page, or every cached page when no URL is given
    Clear {
        /// Page URL to remove
        #[arg(long)]
        url: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the current configuration as TOML
    Show,
    /// Restore the default configuration
    Reset,
}
