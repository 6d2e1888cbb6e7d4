use crate::http::*;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

// anonymous API access is rate-limited to 60 requests/hour;
// a GITHUB_TOKEN bearer header raises that to 5000
//
// repos = `https://api.github.com/repos/{owner}/{repo}`
//
// contents = `https://api.github.com/repos/{owner}/{repo}/contents/{path}?ref={branch}`

const BASE_URL: &'static str = "https://api.github.com";

const MAX_RETRIES: usize = 3;
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
const RETRY_WAIT: Duration = Duration::from_secs(2);

// discovery
// ----------------------------------------------------------------------------

/// A `.csv` file found by the repository walk; consumed once by
/// [`download_csv`].
#[derive(Clone, Debug)]
pub struct CsvFile {
    pub name: String,
    pub path: String,
    pub download_url: Option<String>,
    pub size: u64,
}

/// Walk `owner/repo` recursively and collect a descriptor for every `.csv`
/// file on `branch`.
///
/// The repository is verified first; a missing or private repository is an
/// error. A directory listing that fails mid-walk is logged and skipped, and
/// the walk carries on.
pub async fn fetch_csv_files(
    http_client: &HttpClient,
    owner: &str,
    repo: &str,
    branch: &str,
) -> anyhow::Result<Vec<CsvFile>> {
    fetch_csv_files_at(http_client, BASE_URL, owner, repo, branch).await
}

// the walk itself, with the API host injectable
async fn fetch_csv_files_at(
    http_client: &HttpClient,
    base_url: &str,
    owner: &str,
    repo: &str,
    branch: &str,
) -> anyhow::Result<Vec<CsvFile>> {
    // verify the repository exists before walking it
    let url = format!("{base_url}/repos/{owner}/{repo}");
    let response = get_with_retry(http_client, &url).await.map_err(|err| {
        error!("failed to reach the GitHub API, error({err})");
        err
    })?;
    match response.status() {
        reqwest::StatusCode::OK => trace!("repository {owner}/{repo} verified"),
        reqwest::StatusCode::NOT_FOUND => {
            anyhow::bail!("repository {owner}/{repo} not found or is not public")
        }
        status => anyhow::bail!("failed to access repository {owner}/{repo}: HTTP {status}"),
    }

    // walk the contents tree, async recursion flattened to a work stack
    let mut csv_files = Vec::new();
    let mut dirs = vec![String::new()];
    while let Some(path) = dirs.pop() {
        let url = format!("{base_url}/repos/{owner}/{repo}/contents/{path}?ref={branch}");
        let response = match get_with_retry(http_client, &url).await {
            Ok(response) => response,
            Err(err) => {
                warn!("could not access directory \"{path}\", error({err})");
                continue;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            warn!(
                "could not access directory \"{path}\": HTTP {}",
                response.status()
            );
            continue;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("could not read listing of \"{path}\", error({err})");
                continue;
            }
        };
        let listing: Listing = match serde_json::from_str(&body) {
            Ok(listing) => listing,
            Err(err) => {
                warn!("could not parse listing of \"{path}\", error({err})");
                continue;
            }
        };

        for entry in listing.entries() {
            match entry.kind.as_str() {
                "file" if is_csv_name(&entry.name) => {
                    trace!("found {} ({} bytes)", entry.path, entry.size);
                    csv_files.push(CsvFile {
                        name: entry.name,
                        path: entry.path,
                        download_url: entry.download_url,
                        size: entry.size,
                    });
                }
                "dir" => dirs.push(entry.path),
                // symlinks and submodules are ignored
                _ => {}
            }
        }
    }

    debug!("{} csv files discovered in {owner}/{repo}", csv_files.len());
    Ok(csv_files)
}

fn is_csv_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

// download
// ----------------------------------------------------------------------------

/// Download the raw content of one discovered file as UTF-8 text.
pub async fn download_csv(http_client: &HttpClient, file: &CsvFile) -> anyhow::Result<String> {
    let url = file
        .download_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("no download url for {}", file.path))?;

    trace!("downloading {}", file.path);
    let response = get_with_retry(http_client, url).await.map_err(|err| {
        error!("failed to download {}, error({err})", file.path);
        err
    })?;
    if response.status() != reqwest::StatusCode::OK {
        anyhow::bail!(
            "failed to download {}: HTTP {}",
            file.path,
            response.status()
        );
    }

    let content = response.text().await.map_err(|err| {
        error!("failed to read body of {}, error({err})", file.path);
        err
    })?;
    Ok(content)
}

// retry
// ----------------------------------------------------------------------------

/// GET `url` with up to [`MAX_RETRIES`] attempts.
///
/// A 403 whose body mentions the rate limit sleeps a minute before the next
/// attempt; a timeout or transport error sleeps two seconds. Any other
/// response is handed back to the caller untouched, status handling included.
pub async fn get_with_retry(
    http_client: &HttpClient,
    url: &str,
) -> anyhow::Result<reqwest::Response> {
    for attempt in 1..=MAX_RETRIES {
        let response = match http_client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                if attempt < MAX_RETRIES {
                    warn!("request failed, retrying (attempt {attempt}/{MAX_RETRIES}), error({err})");
                    tokio::time::sleep(RETRY_WAIT).await;
                    continue;
                }
                error!("request failed after {MAX_RETRIES} attempts, error({err})");
                return Err(err.into());
            }
        };

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            if is_rate_limited(&body) {
                if attempt < MAX_RETRIES {
                    warn!(
                        "rate limited; waiting {}s before retry ...",
                        RATE_LIMIT_WAIT.as_secs()
                    );
                    tokio::time::sleep(RATE_LIMIT_WAIT).await;
                    continue;
                }
                anyhow::bail!("GitHub API rate limit exceeded, try again later");
            }
            anyhow::bail!("request to {url} forbidden: HTTP 403");
        }

        return Ok(response);
    }

    anyhow::bail!("maximum retries exceeded")
}

fn is_rate_limited(body: &str) -> bool {
    body.to_lowercase().contains("rate limit")
}

// de
// ----------------------------------------------------------------------------

// the contents endpoint answers with an array for a directory, and with a
// bare object when the path points at a single file
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum Listing {
    Directory(Vec<Entry>),
    Single(Entry),
}

impl Listing {
    fn entries(self) -> Vec<Entry> {
        match self {
            Listing::Directory(entries) => entries,
            Listing::Single(entry) => vec![entry],
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct Entry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    download_url: Option<String>,
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detection() {
        assert!(is_rate_limited(
            "{\"message\": \"API rate limit exceeded for 1.2.3.4.\"}"
        ));
        assert!(is_rate_limited("Secondary Rate Limit hit"));
        assert!(!is_rate_limited("{\"message\": \"Forbidden\"}"));
        assert!(!is_rate_limited(""));
    }

    #[test]
    fn csv_suffix_filter() {
        assert!(is_csv_name("prices.csv"));
        assert!(is_csv_name("PRICES.CSV"));
        assert!(!is_csv_name("prices.csv.bak"));
        assert!(!is_csv_name("notes.txt"));
        assert!(!is_csv_name("csv"));
    }

    #[test]
    fn directory_listing_parses() {
        let body = r#"[
            {
                "name": "prices.csv",
                "path": "data/prices.csv",
                "type": "file",
                "size": 1024,
                "download_url": "https://raw.githubusercontent.com/o/r/main/data/prices.csv"
            },
            {
                "name": "nested",
                "path": "data/nested",
                "type": "dir",
                "size": 0,
                "download_url": null
            }
        ]"#;

        let entries = serde_json::from_str::<Listing>(body).unwrap().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "file");
        assert_eq!(entries[0].size, 1024);
        assert!(entries[0].download_url.is_some());
        assert_eq!(entries[1].kind, "dir");
        assert!(entries[1].download_url.is_none());
    }

    #[test]
    fn single_file_listing_parses() {
        let body = r#"{
            "name": "prices.csv",
            "path": "prices.csv",
            "type": "file",
            "size": 42,
            "download_url": "https://raw.githubusercontent.com/o/r/main/prices.csv"
        }"#;

        let entries = serde_json::from_str::<Listing>(body).unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "prices.csv");
    }

    // network contracts, against a local mock of the API
    // ------------------------------------------------------------------------

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn repository_not_found_is_user_facing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/ghost/nothing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = crate::std_client_build();
        let err = fetch_csv_files_at(&client, &server.uri(), "ghost", "nothing", "main")
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("ghost/nothing not found or is not public"));
    }

    #[tokio::test]
    async fn walk_collects_nested_csv_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/contents/"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"name": "top.csv", "path": "top.csv", "type": "file",
                     "size": 10, "download_url": "https://example.com/top.csv"},
                    {"name": "readme.md", "path": "readme.md", "type": "file",
                     "size": 5, "download_url": "https://example.com/readme.md"},
                    {"name": "sub", "path": "sub", "type": "dir",
                     "size": 0, "download_url": null}
                ]"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/contents/sub"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"name": "nested.csv", "path": "sub/nested.csv", "type": "file",
                     "size": 20, "download_url": "https://example.com/nested.csv"}
                ]"#,
            ))
            .mount(&server)
            .await;

        let client = crate::std_client_build();
        let files = fetch_csv_files_at(&client, &server.uri(), "o", "r", "main")
            .await
            .unwrap();

        let mut paths: Vec<&str> = files.iter().map(|file| file.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["sub/nested.csv", "top.csv"]);
    }

    #[tokio::test]
    async fn plain_403_is_an_error_not_a_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(r#"{"message": "Forbidden"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = crate::std_client_build();
        let url = format!("{}/repos/o/r", server.uri());
        let err = get_with_retry(&client, &url).await.unwrap_err();
        assert!(err.to_string().contains("forbidden"));
    }

    #[tokio::test]
    async fn transport_failures_retry_before_propagating() {
        // bind then drop, so the port refuses connections
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let client = crate::std_client_build();
        let time = std::time::Instant::now();
        let err = get_with_retry(&client, &url).await.unwrap_err();

        // two retry waits before the transport error comes back
        assert!(
            time.elapsed() >= Duration::from_millis(3900),
            "expected two retry waits, got {:?}",
            time.elapsed()
        );
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }
}
