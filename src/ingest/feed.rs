//! Site feed client.
//!
//! Fetches the record list over HTTP with caching disabled, so every cycle
//! sees what the sheet holds right now. After a successful live fetch the
//! raw body is written to the configured cache path; when the live source
//! is unreachable the cached copy is decoded instead.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};

use crate::config::{CsvColumns, SourceFormat, SourceSettings};
use crate::ingest::{RawRecord, RecordSource, SourcePayload, decode_body};
use crate::logging::{Channel, log_source_failure};
use crate::model::{DataOrigin, SourceError};

/// Raw response of one live fetch.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: String,
    pub content_type: Option<String>,
}

pub struct FeedClient {
    client: reqwest::blocking::Client,
    url: Option<String>,
    format: SourceFormat,
    columns: CsvColumns,
    cache_path: Option<PathBuf>,
}

impl FeedClient {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        let timeout = (settings.timeout_secs > 0).then(|| Duration::from_secs(settings.timeout_secs));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            format: settings.format.clone(),
            columns: settings.csv_columns.clone(),
            cache_path: settings.cache_path.clone(),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Fetch the feed body, bypassing any HTTP cache.
    ///
    /// Non-2xx responses become `SourceError::HttpStatus`; transport failures
    /// become `SourceError::Network`.
    pub fn fetch_live(&self) -> Result<FetchedBody, SourceError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SourceError::Network("no feed url configured".to_string()))?;

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .map_err(|e| SourceError::Network(format!("reading response body: {e}")))?;

        tracing::debug!(channel = %Channel::Source, bytes = body.len(), "fetched feed");
        Ok(FetchedBody { body, content_type })
    }

    /// Fetch and decode the live feed only, no cache involved.
    pub fn load_live(&self) -> Result<Vec<RawRecord>, SourceError> {
        let fetched = self.fetch_live()?;
        self.decode(&fetched)
    }

    /// Live feed first; on a transport failure, the cached copy if one is
    /// configured. Parse failures of a live body do not fall back.
    pub fn load(&self) -> Result<SourcePayload, SourceError> {
        // Static snapshot mode: a generated file and no live endpoint.
        if let (None, Some(path)) = (&self.url, &self.cache_path) {
            return self.load_static(path);
        }
        match self.fetch_live() {
            Ok(fetched) => {
                let records = self.decode(&fetched)?;
                if let Some(path) = &self.cache_path {
                    write_cache(path, &fetched.body);
                }
                Ok(SourcePayload {
                    records,
                    origin: DataOrigin::Live,
                })
            }
            Err(err) if err.is_fetch() => match &self.cache_path {
                Some(path) => {
                    log_source_failure(Channel::Source, "live fetch", &err);
                    self.load_cache(path)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Decode the cached copy at `path`.
    pub fn load_cache(&self, path: &Path) -> Result<SourcePayload, SourceError> {
        let records = self.read_file(path)?;
        let saved_at = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        tracing::warn!(
            channel = %Channel::Cache,
            path = %path.display(),
            records = records.len(),
            "serving cached copy of the feed"
        );
        Ok(SourcePayload {
            records,
            origin: DataOrigin::Cache { saved_at },
        })
    }

    /// Decode the configured snapshot file when there is no live endpoint.
    pub fn load_static(&self, path: &Path) -> Result<SourcePayload, SourceError> {
        let records = self.read_file(path)?;
        tracing::debug!(
            channel = %Channel::Source,
            path = %path.display(),
            records = records.len(),
            "read static feed file"
        );
        Ok(SourcePayload {
            records,
            origin: DataOrigin::Static,
        })
    }

    fn read_file(&self, path: &Path) -> Result<Vec<RawRecord>, SourceError> {
        let body = fs::read_to_string(path).map_err(|e| SourceError::Cache {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        decode_body(&body, &self.format, None, &self.columns)
    }

    fn decode(&self, fetched: &FetchedBody) -> Result<Vec<RawRecord>, SourceError> {
        decode_body(
            &fetched.body,
            &self.format,
            fetched.content_type.as_deref(),
            &self.columns,
        )
    }
}

impl RecordSource for FeedClient {
    fn fetch(&mut self) -> Result<SourcePayload, SourceError> {
        self.load()
    }
}

/// Best effort: a cache that cannot be written only costs the fallback.
fn write_cache(path: &Path, body: &str) {
    let result = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(path, body));
    if let Err(e) = result {
        tracing::warn!(
            channel = %Channel::Cache,
            path = %path.display(),
            "failed to write feed cache: {e}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: Option<String>, cache_path: Option<PathBuf>) -> SourceSettings {
        SourceSettings {
            url,
            cache_path,
            ..SourceSettings::default()
        }
    }

    const BODY: &str = r#"[{"siteName":"A","lat":24.1,"lng":46.2,"nextFuelDate":"2024-05-01"}]"#;

    #[test]
    fn test_live_fetch_sends_no_cache_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/sites")
            .match_header("cache-control", "no-cache, no-store")
            .match_header("pragma", "no-cache")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create();

        let client = FeedClient::new(&settings(Some(format!("{}/sites", server.url())), None))
            .expect("client should build");
        let payload = client.load().expect("live fetch should succeed");

        mock.assert();
        assert_eq!(payload.records.len(), 1);
        assert_eq!(payload.origin, DataOrigin::Live);
    }

    #[test]
    fn test_http_error_without_cache_is_fetch_error() {
        let mut server = mockito::Server::new();
        let _failing = server.mock("GET", "/sites").with_status(500).create();

        let url = format!("{}/sites", server.url());
        let client = FeedClient::new(&settings(Some(url.clone()), None)).unwrap();
        assert_eq!(
            client.load(),
            Err(SourceError::HttpStatus { status: 500, url })
        );
    }

    #[test]
    fn test_successful_fetch_refreshes_cache_and_failure_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("nested").join("sites.json");
        let mut server = mockito::Server::new();
        let ok = server
            .mock("GET", "/sites")
            .with_status(200)
            .with_body(BODY)
            .create();

        let client = FeedClient::new(&settings(
            Some(format!("{}/sites", server.url())),
            Some(cache.clone()),
        ))
        .unwrap();
        client.load().expect("live fetch should succeed");
        assert_eq!(fs::read_to_string(&cache).unwrap(), BODY);

        ok.remove();
        let _outage = server.mock("GET", "/sites").with_status(503).create();

        let payload = client.load().expect("cache should cover the outage");
        assert_eq!(payload.records.len(), 1);
        assert!(matches!(payload.origin, DataOrigin::Cache { saved_at: Some(_) }));
    }

    #[test]
    fn test_parse_error_does_not_fall_back_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("sites.json");
        fs::write(&cache, BODY).unwrap();

        let mut server = mockito::Server::new();
        let _garbled = server
            .mock("GET", "/sites")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{not json")
            .create();

        let client = FeedClient::new(&settings(
            Some(format!("{}/sites", server.url())),
            Some(cache.clone()),
        ))
        .unwrap();
        assert!(matches!(client.load(), Err(SourceError::Parse(_))));
        assert_eq!(fs::read_to_string(&cache).unwrap(), BODY, "cache must be untouched");
    }

    #[test]
    fn test_cache_only_configuration_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("sites.csv");
        fs::write(
            &cache,
            "Site Name,Region,Latitude,Longitude,Next Fueling Plan\nA,Central,24.1,46.2,2024-05-01\n",
        )
        .unwrap();

        let client = FeedClient::new(&settings(None, Some(cache))).unwrap();
        let payload = client.load().expect("static file should load");
        assert_eq!(payload.records.len(), 1);
        assert_eq!(
            payload.origin,
            DataOrigin::Static,
            "a static snapshot is not a cache fallback"
        );
    }

    #[test]
    fn test_missing_cache_reports_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let client =
            FeedClient::new(&settings(None, Some(dir.path().join("absent.json")))).unwrap();
        assert!(matches!(client.load(), Err(SourceError::Cache { .. })));
    }
}
