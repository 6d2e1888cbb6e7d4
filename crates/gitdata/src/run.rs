use colored::Colorize;
use dialoguer::Input;
use gitdata_spider as spider;
use std::path::Path;
use tracing::info;

/// Prompt for an owner/repository pair and run a full collection pass.
pub(crate) async fn fetch(branch: &str, save_dir: &str, tui: bool) -> anyhow::Result<()> {
    if tui {
        println!("{}", "gitdata - financial data fetcher".bold());
        println!("{}", "=".repeat(40));
    }

    let owner = prompt("GitHub username")?;
    let repo = prompt("Repository name")?;

    if tui {
        println!("\ndownloading csv files from {owner}/{repo} (branch: {branch}) ...");
    }

    let time = std::time::Instant::now();
    let stats = spider::collect::run(&owner, &repo, branch, Path::new(save_dir), tui).await?;

    if stats.files_found == 0 {
        info!("no csv files found in {owner}/{repo}");
        if tui {
            println!("{}", "no csv files found in the repository".yellow());
        }
        return Ok(());
    }

    info!(
        "{owner}/{repo} collected, time elapsed: {:?}",
        time.elapsed()
    );

    if tui {
        println!("\n{}", "processing summary:".bold());
        println!("   files found:     {}", stats.files_found);
        println!("   files processed: {}", stats.processed);
        println!("   files skipped:   {}", stats.skipped);
        println!("   tickers saved:   {}", stats.rows_by_ticker.len());

        if !stats.rows_by_ticker.is_empty() {
            println!("\n{}", "ticker summary:".bold());
            for (ticker, rows) in &stats.rows_by_ticker {
                println!("   {} ({rows} rows)", format!("{ticker}.csv").green());
            }
        }

        println!("\nall files processed; raw data saved in {save_dir}");
    }

    Ok(())
}

/// Print the on-disk per-ticker summary.
pub(crate) fn summary(save_dir: &str) -> anyhow::Result<()> {
    let summary = spider::process::ticker_summary(Path::new(save_dir))?;

    if summary.is_empty() {
        println!("no ticker files found in {save_dir}");
        return Ok(());
    }

    println!(
        "{}",
        format!("{} ticker files in {save_dir}", summary.len()).bold()
    );
    for (ticker, info) in summary {
        println!(
            "   {:<16} {:>8} rows {:>12} bytes",
            format!("{ticker}.csv").green(),
            info.rows,
            info.file_size
        );
    }

    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let input: String = Input::new()
        .with_prompt(label)
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("input cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(input.trim().to_string())
}
