use crate::extract::ExtractionMethod;
use clap::{Parser, Subcommand};

mod subcommands;

pub use subcommands::{CacheCommands, ConfigCommands};

/// `ReadBot` - read a web page, cache it, and chat about it with an LLM.
#[derive(Parser, Debug)]
#[command(name = "readbot")]
#[command(version)]
#[command(about = "Read a web page and chat about it with an LLM.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway for the extension UI
    Serve {
        /// Host to bind to (defaults to gateway.host, 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (use 0 for a random available port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract a page's readable content and print it as Markdown
    Extract {
        /// Page URL
        url: String,

        /// Extraction method (readability, jina, downloadApi); defaults to config
        #[arg(short, long)]
        method: Option<ExtractionMethod>,
    },

    /// Ask a question about a page
    Ask {
        /// Page URL
        url: String,

        /// Question to ask
        question: String,

        /// Print the whole answer at once instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Inspect or clear the page cache
    Cache {
        #[command(subcommand)]
        cache_command: CacheCommands,
    },

    /// Show or reset the configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}
