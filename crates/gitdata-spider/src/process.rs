use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{trace, warn};

/// Header names accepted as the ticker column, first match wins.
const TICKER_COLUMNS: [&str; 6] = ["symbol", "ticker", "Symbol", "Ticker", "SYMBOL", "TICKER"];

// group & append
// ----------------------------------------------------------------------------

/// What one processed file wrote to disk.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Rows appended per ticker.
    pub rows_by_ticker: BTreeMap<String, u64>,
}

impl Outcome {
    /// Total rows appended across all tickers.
    pub fn rows(&self) -> u64 {
        self.rows_by_ticker.values().sum()
    }
}

/// Parse one downloaded CSV payload, group its rows by ticker, and append
/// each group to `<save_dir>/<ticker>.csv`.
///
/// The ticker column is dropped from the written rows; a brand-new output
/// file gets the remaining header first, an existing one gets rows only.
/// Rows with an empty ticker cell are skipped. A group whose write fails is
/// logged and skipped, the rest carry on.
pub fn process_csv(content: &str, filename: &str, save_dir: &Path) -> anyhow::Result<Outcome> {
    if content.trim().is_empty() {
        anyhow::bail!("file {filename} is empty");
    }

    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| anyhow::anyhow!("failed to parse {filename}, error({err})"))?
        .clone();

    let ticker_col = TICKER_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|header| header == *name))
        .ok_or_else(|| anyhow::anyhow!("file {filename} missing ticker/symbol column"))?;

    // group rows by ticker value, arrival order kept within a group
    let mut row_count = 0u64;
    let mut groups: BTreeMap<String, Vec<csv::StringRecord>> = BTreeMap::new();
    for record in reader.records() {
        let record =
            record.map_err(|err| anyhow::anyhow!("failed to parse {filename}, error({err})"))?;
        row_count += 1;

        let ticker = record.get(ticker_col).unwrap_or("");
        if ticker.is_empty() {
            trace!("skipping row {row_count} of {filename}: empty ticker cell");
            continue;
        }
        groups.entry(ticker.to_string()).or_default().push(record);
    }

    if row_count == 0 {
        anyhow::bail!("file {filename} is empty");
    }

    let mut outcome = Outcome::default();
    for (ticker, rows) in groups {
        // the ticker becomes the output filename; never let it leave save_dir
        if ticker.contains(['/', '\\']) {
            warn!("skipping ticker {ticker:?} from {filename}: not a usable filename");
            continue;
        }

        let path = save_dir.join(format!("{ticker}.csv"));
        match append_group(&path, &headers, ticker_col, &rows) {
            Ok(written) => {
                trace!("{written} rows appended to {}", path.display());
                outcome.rows_by_ticker.insert(ticker, written);
            }
            Err(err) => {
                warn!("failed to write ticker {ticker} from {filename}, error({err})")
            }
        }
    }

    if outcome.rows_by_ticker.is_empty() {
        anyhow::bail!("no valid ticker data found in {filename}");
    }
    Ok(outcome)
}

fn append_group(
    path: &Path,
    headers: &csv::StringRecord,
    ticker_col: usize,
    rows: &[csv::StringRecord],
) -> anyhow::Result<u64> {
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_new {
        writer.write_record(drop_column(headers, ticker_col))?;
    }
    for row in rows {
        writer.write_record(drop_column(row, ticker_col))?;
    }
    writer.flush()?;

    Ok(rows.len() as u64)
}

fn drop_column<'a>(
    record: &'a csv::StringRecord,
    col: usize,
) -> impl Iterator<Item = &'a str> {
    record
        .iter()
        .enumerate()
        .filter(move |(i, _)| *i != col)
        .map(|(_, field)| field)
}

// summary
// ----------------------------------------------------------------------------

/// Row count and byte size of one per-ticker output file.
#[derive(Debug)]
pub struct TickerSummary {
    pub rows: u64,
    pub file_size: u64,
}

/// Scan `save_dir` and report every `<ticker>.csv` already on disk. A missing
/// directory is an empty summary; an unreadable file is logged and skipped.
pub fn ticker_summary(save_dir: &Path) -> anyhow::Result<BTreeMap<String, TickerSummary>> {
    let mut summary = BTreeMap::new();
    if !save_dir.exists() {
        return Ok(summary);
    }

    for entry in std::fs::read_dir(save_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry in {}, error({err})", save_dir.display());
                continue;
            }
        };
        let path = entry.path();
        match path.extension() {
            Some(ext) if ext == "csv" => {}
            _ => continue,
        }
        let ticker = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let rows = match count_rows(&path) {
            Ok(rows) => rows,
            Err(err) => {
                warn!("could not read {}, error({err})", path.display());
                continue;
            }
        };
        let file_size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!("could not stat {}, error({err})", path.display());
                continue;
            }
        };
        summary.insert(ticker, TickerSummary { rows, file_size });
    }

    Ok(summary)
}

// data rows only; the header is not counted
fn count_rows(path: &Path) -> anyhow::Result<u64> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = 0;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(rows)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
