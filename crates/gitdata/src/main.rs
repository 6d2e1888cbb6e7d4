mod cli;
mod run;

// remote imports
use clap::Parser;
use cli::{Cli, TraceLevel};
use tracing::{subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

// preprocess the trace level
fn preprocess(trace_level: Level) {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber).expect("Set subscriber");
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // open the .env file; GITHUB_TOKEN is read from it, when present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        });
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui output
    let tui = match cli.trace {
        Some(_) => false,
        None => true,
    };

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `gitdata fetch`: prompt for a repository and collect its csv files
        Fetch { branch, save_dir } => run::fetch(&branch, &save_dir, tui).await?,

        // `gitdata summary`: report the per-ticker files already on disk
        Summary { save_dir } => run::summary(&save_dir)?,
    }

    Ok(())
}
