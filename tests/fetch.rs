use std::cell::RefCell;
use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::{Value, json};

use rivals_stats::error::MrApiError;
use rivals_stats::match_history::{fetch_all_match_history, fetch_matches};
use rivals_stats::mrapi::{
    ApiVersion, Endpoint, MrApiClient, RawResponse, RequestParams, Transport, build_url,
};

const BASE: &str = "https://example.test/api/";

/// Serves match-history pages of fixed sizes and records every request.
struct PagedHistory {
    page_sizes: Vec<usize>,
    urls: RefCell<Vec<String>>,
    api_keys: RefCell<Vec<String>>,
}

impl PagedHistory {
    fn new(page_sizes: &[usize]) -> Self {
        Self {
            page_sizes: page_sizes.to_vec(),
            urls: RefCell::new(Vec::new()),
            api_keys: RefCell::new(Vec::new()),
        }
    }
}

fn query_value(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

impl Transport for PagedHistory {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse> {
        self.urls.borrow_mut().push(url.to_string());
        for (name, value) in headers {
            if *name == "x-api-key" {
                self.api_keys.borrow_mut().push(value.to_string());
            }
        }
        let page = query_value(url, "page")
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(1);
        let size = self.page_sizes.get(page - 1).copied().unwrap_or(0);
        let entries = (0..size)
            .map(|i| json!({"match_uid": format!("p{page}-{i}"), "match_map_id": 1}))
            .collect::<Vec<_>>();
        Ok(RawResponse {
            status: 200,
            body: json!({ "match_history": entries }).to_string(),
        })
    }
}

/// Answers match requests from a fixed table; unknown uids get a 404.
struct MatchServer {
    calls: RefCell<usize>,
}

impl Transport for MatchServer {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<RawResponse> {
        *self.calls.borrow_mut() += 1;
        let uid = url.rsplit('/').next().unwrap_or_default().to_string();
        if uid.starts_with("missing") {
            return Ok(RawResponse {
                status: 404,
                body: r#"{"error":"match not found"}"#.to_string(),
            });
        }
        let body: Value = json!({
            "match_details": {
                "match_uid": uid,
                "match_players": [
                    {"player_uid": 1, "is_win": 1, "cur_hero_id": 1011, "player_heroes": []}
                ]
            }
        });
        Ok(RawResponse {
            status: 200,
            body: body.to_string(),
        })
    }
}

#[test]
fn pagination_stops_at_first_empty_page() {
    let client = MrApiClient::with_transport("secret", BASE, PagedHistory::new(&[40, 40, 0]));
    let history = fetch_all_match_history(&client, "12345", &RequestParams::new()).unwrap();

    assert_eq!(history.match_uids.len(), 80);
    assert_eq!(history.entries.len(), 80);
    assert_eq!(history.pages_fetched, 3);

    let urls = client.transport().urls.borrow();
    assert_eq!(urls.len(), 3);
    assert_eq!(
        urls[0],
        "https://example.test/api/v2/player/12345/match-history?page=1"
    );
    assert!(urls[2].ends_with("page=3"));
    assert!(client.transport().api_keys.borrow().iter().all(|k| k == "secret"));
}

#[test]
fn pagination_carries_filters_on_every_page() {
    let client = MrApiClient::with_transport("k", BASE, PagedHistory::new(&[2, 0]));
    let params = RequestParams::new().season(2).gamemode(1);
    fetch_all_match_history(&client, "7", &params).unwrap();

    let urls = client.transport().urls.borrow();
    assert_eq!(urls.len(), 2);
    for url in urls.iter() {
        assert_eq!(query_value(url, "season").as_deref(), Some("2"));
        assert_eq!(query_value(url, "gamemode").as_deref(), Some("1"));
    }
}

#[test]
fn only_page_is_sent_when_only_page_is_set() {
    let url = build_url(
        BASE,
        ApiVersion::V2,
        Endpoint::MatchHistory,
        Some("12345"),
        &RequestParams::new().page(2),
    )
    .unwrap();
    let (_, query) = url.split_once('?').expect("query string present");
    assert_eq!(query, "page=2");
    for key in ["season", "limit", "skip", "gamemode", "timestamp"] {
        assert!(query_value(&url, key).is_none(), "{key} should be absent");
    }
}

#[test]
fn non_success_status_is_an_api_error() {
    let client = MrApiClient::with_transport(
        "k",
        BASE,
        MatchServer {
            calls: RefCell::new(0),
        },
    );
    let err = client
        .fetch(
            ApiVersion::V1,
            Endpoint::Match,
            Some("missing-1"),
            &RequestParams::new(),
        )
        .unwrap_err();
    let api = err.downcast_ref::<MrApiError>().expect("typed api error");
    assert_eq!(api.status(), Some(404));
    assert!(api.to_string().contains("match not found"));
}

#[test]
fn fetch_matches_aborts_on_first_failure() {
    let client = MrApiClient::with_transport(
        "k",
        BASE,
        MatchServer {
            calls: RefCell::new(0),
        },
    );
    let uids = ["a-1", "b-2", "missing-3", "z-4"]
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<_>>();

    let err = fetch_matches(&client, &uids).unwrap_err();
    assert!(err.downcast_ref::<MrApiError>().is_some());
    // a-1, b-2, then missing-3 fails; z-4 is never requested.
    assert_eq!(*client.transport().calls.borrow(), 3);
}

#[test]
fn fetch_matches_parses_every_document() {
    let client = MrApiClient::with_transport(
        "k",
        BASE,
        MatchServer {
            calls: RefCell::new(0),
        },
    );
    let uids = ["a-1", "b-2"]
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<_>>();
    let fetched = fetch_matches(&client, &uids).unwrap();
    assert_eq!(fetched.documents.len(), 2);
    assert_eq!(fetched.parsed.matches.len(), 2);
    assert_eq!(fetched.parsed.matches[0].match_uid, "a-1");
    assert!(fetched.parsed.malformed.is_empty());
}

#[test]
fn history_page_without_list_is_rejected() {
    struct Broken;
    impl Transport for Broken {
        fn get(&self, _url: &str, _headers: &[(&str, &str)]) -> Result<RawResponse> {
            Ok(RawResponse {
                status: 200,
                body: r#"{"message":"rate limited"}"#.to_string(),
            })
        }
    }
    let client = MrApiClient::with_transport("k", BASE, Broken);
    let err = fetch_all_match_history(&client, "1", &RequestParams::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MrApiError>(),
        Some(MrApiError::UnexpectedPayload { .. })
    ));
}
