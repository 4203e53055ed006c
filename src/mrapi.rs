//! Thin client for the Marvel Rivals stats API.
//!
//! Only parameters the caller sets end up in the query string, so the
//! service applies its own defaults for everything else.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::error::MrApiError;
use crate::http_client::http_client;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = MrApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(ApiVersion::V1),
            "v2" => Ok(ApiVersion::V2),
            _ => Err(MrApiError::UnknownVersion(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Player,
    Match,
    Heroes,
    MatchHistory,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Player => "player",
            Endpoint::Match => "match",
            Endpoint::Heroes => "heroes",
            Endpoint::MatchHistory => "match-history",
        }
    }

    pub fn needs_identifier(self) -> bool {
        !matches!(self, Endpoint::Heroes)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = MrApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "player" => Ok(Endpoint::Player),
            "match" => Ok(Endpoint::Match),
            "heroes" => Ok(Endpoint::Heroes),
            "match-history" => Ok(Endpoint::MatchHistory),
            _ => Err(MrApiError::UnknownEndpoint(raw.to_string())),
        }
    }
}

/// Query parameters for one request. `None` means "not sent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub season: Option<u32>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    /// 0 = all, 1 = ranked, 2 = casual.
    pub gamemode: Option<u8>,
    /// Only matches after this epoch second.
    pub timestamp: Option<i64>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn season(self, season: u32) -> Self {
        Self {
            season: Some(season),
            ..self
        }
    }

    pub fn page(self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self
        }
    }

    pub fn limit(self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn skip(self, skip: u32) -> Self {
        Self {
            skip: Some(skip),
            ..self
        }
    }

    pub fn gamemode(self, gamemode: u8) -> Self {
        Self {
            gamemode: Some(gamemode),
            ..self
        }
    }

    pub fn timestamp(self, timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = self.season {
            out.push(("season", v.to_string()));
        }
        if let Some(v) = self.page {
            out.push(("page", v.to_string()));
        }
        if let Some(v) = self.limit {
            out.push(("limit", v.to_string()));
        }
        if let Some(v) = self.skip {
            out.push(("skip", v.to_string()));
        }
        if let Some(v) = self.gamemode {
            out.push(("gamemode", v.to_string()));
        }
        if let Some(v) = self.timestamp {
            out.push(("timestamp", v.to_string()));
        }
        out
    }

    pub fn query_string(&self) -> String {
        self.query_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

pub fn build_url(
    base_url: &str,
    version: ApiVersion,
    endpoint: Endpoint,
    uid: Option<&str>,
    params: &RequestParams,
) -> Result<String, MrApiError> {
    let uid = uid.map(str::trim).filter(|uid| !uid.is_empty());
    let base = base_url.trim_end_matches('/');

    let mut url = match (endpoint, uid) {
        (Endpoint::Heroes, _) => format!("{base}/{version}/heroes"),
        (Endpoint::MatchHistory, Some(uid)) => format!("{base}/{version}/player/{uid}/match-history"),
        (Endpoint::Player | Endpoint::Match, Some(uid)) => format!("{base}/{version}/{endpoint}/{uid}"),
        (_, None) => {
            return Err(MrApiError::MissingIdentifier {
                endpoint: endpoint.as_str(),
            });
        }
    };

    let query = params.query_string();
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP seam. Production code goes through [`HttpTransport`].
pub trait Transport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse>;
}

pub struct HttpTransport {
    client: &'static Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status().as_u16();
        let body = resp.text().context("failed reading body")?;
        Ok(RawResponse { status, body })
    }
}

pub struct MrApiClient<T = HttpTransport> {
    api_key: String,
    base_url: String,
    transport: T,
}

impl MrApiClient<HttpTransport> {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_api_key()?;
        Ok(Self::with_transport(
            api_key,
            &settings.base_url,
            HttpTransport::new()?,
        ))
    }
}

impl<T: Transport> MrApiClient<T> {
    pub fn with_transport(api_key: &str, base_url: &str, transport: T) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issues one GET and parses the JSON body. Any non-2xx status becomes
    /// [`MrApiError::Api`].
    pub fn fetch(
        &self,
        version: ApiVersion,
        endpoint: Endpoint,
        uid: Option<&str>,
        params: &RequestParams,
    ) -> Result<Value> {
        let url = build_url(&self.base_url, version, endpoint, uid, params)?;
        debug!(%url, "GET");

        let resp = self
            .transport
            .get(&url, &[(API_KEY_HEADER, self.api_key.as_str())])
            .with_context(|| format!("GET {url}"))?;
        if !resp.is_success() {
            return Err(MrApiError::Api {
                status: resp.status,
                body: resp.body,
            }
            .into());
        }

        serde_json::from_str(&resp.body).with_context(|| format!("invalid json from {url}"))
    }
}
