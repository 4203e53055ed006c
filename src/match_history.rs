use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::MrApiError;
use crate::mrapi::{ApiVersion, Endpoint, MrApiClient, RequestParams, Transport};
use crate::records::{ParsedMatches, parse_match_documents};

const FIRST_PAGE: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct MatchHistory {
    /// Every history entry seen, in page order (duplicates included).
    pub entries: Vec<Value>,
    pub match_uids: BTreeSet<String>,
    /// Number of page requests issued, including the final empty one.
    pub pages_fetched: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedMatches {
    pub documents: Vec<Value>,
    pub parsed: ParsedMatches,
}

/// Walks the player's match history from page 1 until a page comes back
/// empty. `base` carries any filters (season, gamemode); its `page` is
/// overwritten.
pub fn fetch_all_match_history<T: Transport>(
    client: &MrApiClient<T>,
    player_id: &str,
    base: &RequestParams,
) -> Result<MatchHistory> {
    let mut history = MatchHistory::default();
    let mut page = FIRST_PAGE;

    loop {
        let params = base.page(page);
        let body = client.fetch(
            ApiVersion::V2,
            Endpoint::MatchHistory,
            Some(player_id),
            &params,
        )?;
        history.pages_fetched += 1;

        let entries = page_entries(&body)?;
        if entries.is_empty() {
            info!(player_id, page, "no more matches");
            break;
        }
        info!(player_id, page, matches = entries.len(), "fetched match history page");

        for entry in entries {
            match entry.get("match_uid").and_then(match_uid_text) {
                Some(uid) => {
                    history.match_uids.insert(uid);
                }
                None => warn!(player_id, page, "history entry without match_uid"),
            }
            history.entries.push(entry.clone());
        }
        page += 1;
    }

    info!(
        player_id,
        unique = history.match_uids.len(),
        seen = history.entries.len(),
        "collected match uids"
    );
    Ok(history)
}

fn page_entries(body: &Value) -> Result<&Vec<Value>, MrApiError> {
    match body.get("match_history") {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Err(MrApiError::UnexpectedPayload {
            endpoint: Endpoint::MatchHistory.as_str(),
            reason: "match_history is null".to_string(),
        }),
        Some(_) => Err(MrApiError::UnexpectedPayload {
            endpoint: Endpoint::MatchHistory.as_str(),
            reason: "match_history is not a list".to_string(),
        }),
        None => Err(MrApiError::UnexpectedPayload {
            endpoint: Endpoint::MatchHistory.as_str(),
            reason: "missing match_history".to_string(),
        }),
    }
}

fn match_uid_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One request per match, in uid order. The first failed request aborts.
pub fn fetch_matches<T: Transport>(
    client: &MrApiClient<T>,
    match_uids: &BTreeSet<String>,
) -> Result<FetchedMatches> {
    let mut documents = Vec::with_capacity(match_uids.len());
    for (idx, uid) in match_uids.iter().enumerate() {
        info!(match_uid = %uid, n = idx + 1, total = match_uids.len(), "fetching match");
        let doc = client.fetch(ApiVersion::V1, Endpoint::Match, Some(uid), &RequestParams::new())?;
        documents.push(doc);
    }

    let parsed = parse_match_documents(&documents);
    for err in &parsed.malformed {
        warn!(%err, "malformed match record");
    }
    Ok(FetchedMatches { documents, parsed })
}
