use crate::http::*;
use crate::{github, process};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info};

/// Totals from one collection run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// CSV files discovered by the repository walk.
    pub files_found: usize,
    /// Files whose rows were appended to at least one ticker file.
    pub processed: usize,
    /// Files that failed to download or parse and were skipped.
    pub skipped: usize,
    /// Rows appended per ticker across the whole run.
    pub rows_by_ticker: BTreeMap<String, u64>,
}

/// Fetch every `.csv` file from `owner/repo` and append the rows to
/// per-ticker files under `save_dir`.
///
/// Files are processed one at a time; a file that fails is counted as
/// skipped and the run carries on.
pub async fn run(
    owner: &str,
    repo: &str,
    branch: &str,
    save_dir: &Path,
    tui: bool,
) -> anyhow::Result<RunStats> {
    let time = std::time::Instant::now();
    let http_client = crate::std_client_build();

    tokio::fs::create_dir_all(save_dir).await?;

    info!("fetching csv files from {owner}/{repo} (branch: {branch}) ...");
    let csv_files = github::fetch_csv_files(&http_client, owner, repo, branch).await?;

    let mut stats = RunStats {
        files_found: csv_files.len(),
        ..Default::default()
    };
    if csv_files.is_empty() {
        return Ok(stats);
    }
    debug!("{} csv files found", csv_files.len());

    // progress bar
    let pb = crate::tui::progress_bar(csv_files.len(), tui)?;

    for file in &csv_files {
        pb.set_message(file.name.clone());
        match process_one(&http_client, file, save_dir).await {
            Ok(outcome) => {
                stats.processed += 1;
                debug!(
                    "{}: {} rows appended across {} tickers",
                    file.name,
                    outcome.rows(),
                    outcome.rows_by_ticker.len()
                );
                for (ticker, rows) in outcome.rows_by_ticker {
                    *stats.rows_by_ticker.entry(ticker).or_default() += rows;
                }
            }
            Err(err) => {
                stats.skipped += 1;
                error!("skipped {}, error({err})", file.name);
                if tui {
                    pb.println(format!("skipped {}: {err}", file.name));
                }
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("collection finished, {}", crate::time_elapsed(time));

    Ok(stats)
}

async fn process_one(
    http_client: &HttpClient,
    file: &github::CsvFile,
    save_dir: &Path,
) -> anyhow::Result<process::Outcome> {
    let content = github::download_csv(http_client, file).await?;
    process::process_csv(&content, &file.name, save_dir)
}
