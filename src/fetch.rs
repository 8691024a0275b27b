//! Pages through the wiki's SMW `ask` API collecting every monster result.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::types::{value_as_i64, RawRecord};
use crate::{PAGE_SIZE, REQUIRED_PRINTOUTS, USER_AGENT};

/// Top level of an `action=ask` response.
#[derive(Debug, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub query: Option<AskQuery>,
    #[serde(rename = "query-continue-offset", default)]
    pub continue_offset: Option<Value>,
    /// MediaWiki error object (bad query, API disabled, ...)
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskQuery {
    /// An object keyed by result name, or `[]` when there are none.
    #[serde(default)]
    pub results: Option<Value>,
}

impl AskResponse {
    /// Decodes the results of this page. None means no more data.
    pub fn take_results(&mut self) -> Result<Option<BTreeMap<String, RawRecord>>> {
        let Some(results) = self.query.as_mut().and_then(|q| q.results.take()) else {
            return Ok(None);
        };
        match results {
            Value::Object(map) => {
                let mut records = BTreeMap::new();
                for (key, value) in map {
                    // A bad entry is left for normalize to reject; only the page shape is fatal
                    let record = serde_json::from_value::<RawRecord>(value).unwrap_or_else(|e| {
                        warn!("Result {} is not a record: {}", key, e);
                        RawRecord::default()
                    });
                    records.insert(key, record);
                }
                Ok(Some(records))
            }
            Value::Array(items) if items.is_empty() => Ok(None),
            other => bail!("Unexpected query.results shape: {}", other),
        }
    }

    pub fn next_offset(&self) -> Option<u64> {
        self.continue_offset
            .as_ref()
            .and_then(value_as_i64)
            .and_then(|n| u64::try_from(n).ok())
    }
}

/// Where the pagination loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Continuing { offset: u64 },
    Done,
}

impl Pagination {
    /// Only a strictly advancing continuation offset keeps the loop going.
    pub fn advance(current: u64, next: Option<u64>) -> Self {
        match next {
            Some(offset) if offset > current => Pagination::Continuing { offset },
            _ => Pagination::Done,
        }
    }
}

/// Source of ask pages. Implemented over HTTP by `WikiClient`.
pub trait AskApi {
    fn ask(&self, offset: u64) -> Result<AskResponse>;
}

/// Builds the SMW query selecting every monster infobox with all printouts.
pub fn build_query(offset: u64) -> String {
    let printouts: Vec<String> = REQUIRED_PRINTOUTS
        .iter()
        .map(|p| format!("?{}", p))
        .collect();
    format!(
        "[[Uses infobox::Monster]]|{}|limit={}|offset={}",
        printouts.join("|"),
        PAGE_SIZE,
        offset
    )
}

/// Fetches every page and merges the results by key.
///
/// Any transport or page decode failure aborts; a partial dataset is never
/// returned. Individual results that aren't records are kept as empty
/// records for `normalize` to skip.
pub fn fetch_all(api: &impl AskApi) -> Result<BTreeMap<String, RawRecord>> {
    let mut monsters = BTreeMap::new();
    let mut state = Pagination::Continuing { offset: 0 };

    while let Pagination::Continuing { offset } = state {
        info!("Fetching monster info: {}", offset);
        let mut response = api.ask(offset)?;

        if let Some(error) = &response.error {
            bail!("Ask API returned an error at offset {}: {}", offset, error);
        }

        let Some(results) = response.take_results()? else {
            debug!("No results at offset {}, stopping", offset);
            break;
        };
        debug!("Page at offset {} returned {} results", offset, results.len());
        monsters.extend(results);

        state = Pagination::advance(offset, response.next_offset());
    }

    info!("Fetched {} results", monsters.len());
    Ok(monsters)
}

/// HTTP client for the wiki's API and file resolver.
pub struct WikiClient {
    pub(crate) client: reqwest::blocking::Client,
    pub(crate) base: String,
}

impl WikiClient {
    pub fn new(base: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api.php", self.base)
    }
}

impl AskApi for WikiClient {
    fn ask(&self, offset: u64) -> Result<AskResponse> {
        let url = self.api_url();
        let query = build_query(offset);

        let response = self
            .client
            .get(&url)
            .query(&[("action", "ask"), ("format", "json"), ("query", query.as_str())])
            .send()
            .with_context(|| format!("Failed to fetch: {} (offset {})", url, offset))?
            .error_for_status()
            .with_context(|| format!("Ask API request failed at offset {}", offset))?;

        response
            .json()
            .with_context(|| format!("Failed to parse ask JSON at offset {}", offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::overrides::OverrideTable;
    use serde_json::json;
    use std::cell::RefCell;

    /// Serves canned pages and records the offsets requested.
    struct FakeApi {
        pages: Vec<Value>,
        calls: RefCell<Vec<u64>>,
    }

    impl FakeApi {
        fn new(pages: Vec<Value>) -> Self {
            Self {
                pages,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl AskApi for FakeApi {
        fn ask(&self, offset: u64) -> Result<AskResponse> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push(offset);
            let Some(page) = self.pages.get(index) else {
                bail!("unexpected request #{} at offset {}", index + 1, offset);
            };
            Ok(serde_json::from_value(page.clone())?)
        }
    }

    fn page(keys: &[&str], next: Option<u64>) -> Value {
        let mut results = serde_json::Map::new();
        for key in keys {
            results.insert(key.to_string(), json!({ "printouts": { "Hitpoints": [1] } }));
        }
        let mut page = json!({ "query": { "results": results } });
        if let Some(next) = next {
            page["query-continue-offset"] = json!(next);
        }
        page
    }

    #[test]
    fn test_pagination_advance() {
        assert_eq!(
            Pagination::advance(0, Some(500)),
            Pagination::Continuing { offset: 500 }
        );
        assert_eq!(Pagination::advance(500, Some(500)), Pagination::Done);
        assert_eq!(Pagination::advance(500, Some(100)), Pagination::Done);
        assert_eq!(Pagination::advance(500, None), Pagination::Done);
    }

    #[test]
    fn test_fetch_follows_offsets() {
        let api = FakeApi::new(vec![
            page(&["Goblin", "Imp"], Some(500)),
            page(&["Zulrah#Serpentine"], Some(1000)),
            page(&["Cow"], None),
        ]);
        let monsters = fetch_all(&api).unwrap();

        assert_eq!(*api.calls.borrow(), vec![0, 500, 1000]);
        let keys: Vec<&str> = monsters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Cow", "Goblin", "Imp", "Zulrah#Serpentine"]);
    }

    #[test]
    fn test_fetch_stops_on_unchanged_offset() {
        let api = FakeApi::new(vec![
            page(&["Goblin"], Some(500)),
            page(&["Imp"], Some(500)),
        ]);
        let monsters = fetch_all(&api).unwrap();

        assert_eq!(*api.calls.borrow(), vec![0, 500]);
        assert_eq!(monsters.len(), 2);
    }

    #[test]
    fn test_fetch_stops_without_results() {
        let api = FakeApi::new(vec![
            page(&["Goblin"], Some(500)),
            json!({ "query": { "results": [] }, "query-continue-offset": 1000 }),
        ]);
        let monsters = fetch_all(&api).unwrap();
        assert_eq!(api.calls.borrow().len(), 2);
        assert_eq!(monsters.len(), 1);

        let api = FakeApi::new(vec![json!({ "batchcomplete": "" })]);
        assert!(fetch_all(&api).unwrap().is_empty());
    }

    #[test]
    fn test_later_pages_overwrite() {
        let mut second = page(&[], Some(600));
        second["query"]["results"]["Goblin"] = json!({ "printouts": { "Hitpoints": [9] } });
        let api = FakeApi::new(vec![page(&["Goblin"], Some(500)), second, json!({})]);

        let monsters = fetch_all(&api).unwrap();
        let po = monsters["Goblin"].printouts().unwrap();
        assert_eq!(po.int("Hitpoints"), 9);
    }

    #[test]
    fn test_string_continue_offset() {
        let api = FakeApi::new(vec![
            json!({ "query": { "results": { "Goblin": { "printouts": [] } } }, "query-continue-offset": "500" }),
            json!({ "query": {} }),
        ]);
        fetch_all(&api).unwrap();
        assert_eq!(*api.calls.borrow(), vec![0, 500]);
    }

    #[test]
    fn test_malformed_entries_do_not_abort() {
        let api = FakeApi::new(vec![json!({
            "query": {
                "results": {
                    "Goblin": { "printouts": { "Hitpoints": [5], "NPC ID": [3029] } },
                    "Broken": null,
                    "Empty": [],
                    "Odd": 7
                }
            }
        })]);
        let monsters = fetch_all(&api).unwrap();
        assert_eq!(monsters.len(), 4);
        assert!(monsters["Broken"].printouts().is_none());
        assert!(monsters["Odd"].printouts().is_none());

        let out = normalize(&monsters, &OverrideTable::builtin());
        let names: Vec<&str> = out.monsters.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Goblin"]);
        assert_eq!(out.skipped, 3);
    }

    #[test]
    fn test_api_error_aborts() {
        let api = FakeApi::new(vec![
            page(&["Goblin"], Some(500)),
            json!({ "error": { "code": "smw-error", "info": "bad query" } }),
        ]);
        assert!(fetch_all(&api).is_err());
    }

    #[test]
    fn test_transport_error_aborts() {
        // only one page available; the second request fails
        let api = FakeApi::new(vec![page(&["Goblin"], Some(500))]);
        assert!(fetch_all(&api).is_err());
    }

    #[test]
    fn test_build_query() {
        let q = build_query(1000);
        assert!(q.starts_with("[[Uses infobox::Monster]]|?Attack bonus|?Attack level|"));
        assert!(q.ends_with("|?NPC ID|?Category|limit=500|offset=1000"));
        assert_eq!(q.matches("|?").count(), REQUIRED_PRINTOUTS.len());
    }
}
