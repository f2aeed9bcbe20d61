//! Single blocking network fetch
//!
//! A URL source is read fully into memory before any resolution or
//! decoding starts, so the rest of the pipeline never touches the network
//! and a timeout can only surface here, as a `FetchError`.

use log::debug;

use crate::error::{IngestError, IngestResult};
use crate::resolve::ResolveOptions;

fn fetch_error(url: &str, reason: impl std::fmt::Display) -> IngestError {
    IngestError::FetchError {
        source_name: url.to_owned(),
        reason: reason.to_string(),
    }
}

/// Fetch `url` with one blocking GET, honoring the configured timeout.
///
/// Non-2xx statuses are failures; the body of an error page is never
/// handed to the sniffer.
pub fn fetch_url(url: &str, options: &ResolveOptions) -> IngestResult<(Vec<u8>, Option<String>)> {
    let client = reqwest::blocking::Client::builder()
        .timeout(options.fetch_timeout)
        .build()
        .map_err(|e| fetch_error(url, e))?;

    let response = client.get(url).send().map_err(|e| fetch_error(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(url, format!("HTTP status {status}")));
    }

    let bytes = response
        .bytes()
        .map_err(|e| fetch_error(url, e))?
        .to_vec();
    debug!("fetched {} bytes from {url}", bytes.len());
    Ok((bytes, filename_from_url(url)))
}

/// Last path segment of the URL, query and fragment stripped; `None` when
/// the URL has no path to speak of.
fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let (_, last) = after_scheme.rsplit_once('/')?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_owned())
    }
}
