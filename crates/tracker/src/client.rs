use async_trait::async_trait;
use punchcard_core::config::TrackerConfig;
use punchcard_core::domain::WorkItem;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("tracker rejected the query: {0}")]
    Query(String),
    #[error("tracker response was malformed: {0}")]
    Malformed(String),
}

/// Source of a user's currently-open work items.
///
/// An unresolvable identity (empty email) yields an empty list, never an
/// error: a picker with zero options is a valid degraded state downstream.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    async fn open_items(&self, assignee_email: &str) -> Result<Vec<WorkItem>, TrackerError>;
}

/// One page of query results plus the cursor to the next one, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ItemsPage {
    pub items: Vec<WorkItem>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub(crate) trait PageFetch: Send + Sync {
    async fn page(
        &self,
        assignee_email: &str,
        cursor: Option<&str>,
    ) -> Result<ItemsPage, TrackerError>;
}

/// Follows page cursors until the upstream reports no further page, so a
/// long item list is never silently truncated at one page.
pub(crate) async fn fetch_all_pages<F>(
    fetcher: &F,
    assignee_email: &str,
) -> Result<Vec<WorkItem>, TrackerError>
where
    F: PageFetch,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetcher.page(assignee_email, cursor.as_deref()).await?;
        items.extend(page.items);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(items)
}

const OPEN_ITEMS_QUERY: &str = "\
query OpenItems($email: String!, $first: Int!, $after: String) {
  issues(
    filter: {
      assignee: { email: { eq: $email } }
      state: { type: { in: [\"unstarted\", \"started\"] } }
    }
    first: $first
    after: $after
  ) {
    nodes { title url }
    pageInfo { hasNextPage endCursor }
  }
}";

/// GraphQL client for the issue tracker.
pub struct HttpTrackerClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
    page_size: u32,
}

impl HttpTrackerClient {
    pub fn new(http: Client, config: &TrackerConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
        }
    }
}

#[async_trait]
impl PageFetch for HttpTrackerClient {
    async fn page(
        &self,
        assignee_email: &str,
        cursor: Option<&str>,
    ) -> Result<ItemsPage, TrackerError> {
        let body = json!({
            "query": OPEN_ITEMS_QUERY,
            "variables": {
                "email": assignee_email,
                "first": self.page_size,
                "after": cursor,
            },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(TrackerError::Transport)?;

        let payload: Value = response.json().await.map_err(TrackerError::Transport)?;
        parse_items_page(&payload)
    }
}

#[async_trait]
impl WorkItemSource for HttpTrackerClient {
    async fn open_items(&self, assignee_email: &str) -> Result<Vec<WorkItem>, TrackerError> {
        if assignee_email.trim().is_empty() {
            debug!(
                event_name = "tracker.items.skipped",
                "no assignee email; returning zero work items without a query"
            );
            return Ok(Vec::new());
        }

        fetch_all_pages(self, assignee_email).await
    }
}

fn parse_items_page(payload: &Value) -> Result<ItemsPage, TrackerError> {
    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
        let detail = errors
            .iter()
            .filter_map(|error| error.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        let detail = if detail.is_empty() { "unspecified query error".to_string() } else { detail };
        return Err(TrackerError::Query(detail));
    }

    let issues = payload
        .pointer("/data/issues")
        .ok_or_else(|| TrackerError::Malformed("missing `data.issues` object".to_string()))?;

    let nodes = issues
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| TrackerError::Malformed("missing `issues.nodes` array".to_string()))?;

    let mut items = Vec::with_capacity(nodes.len());
    for node in nodes {
        let title = node
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::Malformed("issue node without a title".to_string()))?;
        let url = node
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::Malformed("issue node without a url".to_string()))?;
        items.push(WorkItem::new(title, url));
    }

    let has_next = issues.pointer("/pageInfo/hasNextPage").and_then(Value::as_bool).unwrap_or(false);
    let next_cursor = if has_next {
        let cursor = issues
            .pointer("/pageInfo/endCursor")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TrackerError::Malformed("hasNextPage set but endCursor missing".to_string())
            })?;
        Some(cursor.to_string())
    } else {
        None
    };

    Ok(ItemsPage { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use punchcard_core::config::AppConfig;
    use punchcard_core::domain::WorkItem;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{
        fetch_all_pages, parse_items_page, HttpTrackerClient, ItemsPage, PageFetch, TrackerError,
        WorkItemSource,
    };

    struct ScriptedPages {
        pages: Mutex<VecDeque<Result<ItemsPage, TrackerError>>>,
        cursors_seen: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Result<ItemsPage, TrackerError>>) -> Self {
            Self { pages: Mutex::new(pages.into()), cursors_seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl PageFetch for ScriptedPages {
        async fn page(
            &self,
            _assignee_email: &str,
            cursor: Option<&str>,
        ) -> Result<ItemsPage, TrackerError> {
            self.cursors_seen.lock().await.push(cursor.map(str::to_owned));
            self.pages
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(ItemsPage { items: Vec::new(), next_cursor: None }))
        }
    }

    fn item(index: usize) -> WorkItem {
        WorkItem::new(format!("Item {index}"), format!("https://tracker.test/item/{index}"))
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted_and_preserves_order() {
        let fetcher = ScriptedPages::new(vec![
            Ok(ItemsPage { items: vec![item(1), item(2)], next_cursor: Some("c1".to_owned()) }),
            Ok(ItemsPage { items: vec![item(3)], next_cursor: Some("c2".to_owned()) }),
            Ok(ItemsPage { items: vec![item(4)], next_cursor: None }),
        ]);

        let items = fetch_all_pages(&fetcher, "a@x.com").await.expect("fetch should succeed");

        assert_eq!(items, vec![item(1), item(2), item(3), item(4)]);
        assert_eq!(
            *fetcher.cursors_seen.lock().await,
            vec![None, Some("c1".to_owned()), Some("c2".to_owned())]
        );
    }

    #[tokio::test]
    async fn page_failure_propagates_without_partial_result() {
        let fetcher = ScriptedPages::new(vec![
            Ok(ItemsPage { items: vec![item(1)], next_cursor: Some("c1".to_owned()) }),
            Err(TrackerError::Query("rate limited".to_owned())),
        ]);

        let error = fetch_all_pages(&fetcher, "a@x.com").await.expect_err("second page fails");
        assert!(matches!(error, TrackerError::Query(ref detail) if detail == "rate limited"));
    }

    #[tokio::test]
    async fn empty_email_short_circuits_to_zero_items() {
        let mut config = AppConfig::default();
        config.tracker.api_key = "lin_api_test".to_string().into();
        let client = HttpTrackerClient::new(reqwest::Client::new(), &config.tracker);

        let items = client.open_items("  ").await.expect("blank email must not query upstream");
        assert!(items.is_empty());
    }

    #[test]
    fn parses_a_page_with_a_next_cursor() {
        let payload = json!({
            "data": {
                "issues": {
                    "nodes": [
                        { "title": "Fix bug #1", "url": "https://tracker.test/i/1" },
                        { "title": "Write docs", "url": "https://tracker.test/i/2" },
                    ],
                    "pageInfo": { "hasNextPage": true, "endCursor": "cursor-xyz" },
                }
            }
        });

        let page = parse_items_page(&payload).expect("well-formed page");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title, "Fix bug #1");
        assert_eq!(page.items[1].url, "https://tracker.test/i/2");
        assert_eq!(page.next_cursor.as_deref(), Some("cursor-xyz"));
    }

    #[test]
    fn parses_a_final_page_without_cursor() {
        let payload = json!({
            "data": {
                "issues": {
                    "nodes": [],
                    "pageInfo": { "hasNextPage": false, "endCursor": null },
                }
            }
        });

        let page = parse_items_page(&payload).expect("well-formed final page");
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn graphql_errors_surface_as_query_errors() {
        let payload = json!({
            "errors": [
                { "message": "field `issues` not found" },
                { "message": "unauthorized" },
            ]
        });

        let error = parse_items_page(&payload).expect_err("errors array must fail the page");
        assert!(matches!(
            error,
            TrackerError::Query(ref detail)
                if detail.contains("field `issues` not found") && detail.contains("unauthorized")
        ));
    }

    #[test]
    fn missing_node_fields_are_malformed() {
        let payload = json!({
            "data": {
                "issues": {
                    "nodes": [ { "title": "No url here" } ],
                    "pageInfo": { "hasNextPage": false },
                }
            }
        });

        let error = parse_items_page(&payload).expect_err("node without url must fail");
        assert!(matches!(error, TrackerError::Malformed(ref detail) if detail.contains("url")));
    }
}
