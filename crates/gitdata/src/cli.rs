use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch CSV files from a public GitHub repository and collect the rows
    /// into per-ticker files.
    Fetch {
        /// GitHub branch to fetch from.
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Local directory to save the per-ticker data.
        #[arg(short, long, default_value = "./data")]
        save_dir: String,
    },

    /// Summarise the per-ticker files already saved to disk.
    Summary {
        /// Local directory holding the per-ticker data.
        #[arg(short, long, default_value = "./data")]
        save_dir: String,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}
