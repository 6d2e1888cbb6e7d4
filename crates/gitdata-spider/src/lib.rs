/// Full collection run: discovery, download, group-and-append.
pub mod collect;

/// [GitHub REST API](https://docs.github.com/en/rest/repos/contents): repository
/// verification, recursive contents walk, raw file download.
pub mod github;

/// Group downloaded rows by ticker and append them to per-ticker files.
pub mod process;

pub(crate) mod tui;

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use reqwest::Client as HttpClient;
}

/// Build the standard client: 30s request timeout, package user agent, and a
/// bearer token from the `GITHUB_TOKEN` environment variable if one is set
/// (anonymous access otherwise).
pub fn std_client_build() -> reqwest::Client {
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

    let mut headers = HeaderMap::new();
    if let Ok(token) = dotenv::var("GITHUB_TOKEN") {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(err) => tracing::warn!("ignoring unusable GITHUB_TOKEN, error({err})"),
        }
    }

    reqwest::ClientBuilder::new()
        .user_agent(concat!("gitdata/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .default_headers(headers)
        .build()
        .expect("failed to build reqwest client")
}

// readable elapsed time for debug logs
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:.2}s", time.elapsed().as_secs_f64())
}
