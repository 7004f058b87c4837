//! Bounded worker pool that fans search work out across rotating credentials.
//!
//! A run owns two pieces of shared mutable state, each behind its own mutex:
//! the work queue and the output collection. Workers hold a lock only for a
//! single pop or append, never across a network call. The credential pool's
//! cursor is the only other shared state and is advanced atomically.
//!
//! # Per-item flow
//!
//! 1. Pop the next unclaimed [`WorkItem`] (stop when the queue is empty or the
//!    run is cancelled)
//! 2. Take the next credential from the [`CredentialPool`]
//! 3. Search with the item's keyword
//! 4. On success, drop blank-url results, normalize the rest and append them
//! 5. On failure (including a panicking search), log and drop the item
//!    (no retry, no requeue)
//!
//! [`Dispatcher::run`] returns after every worker has finished. Results
//! gathered before a failure or a cancellation are always returned.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{SearchApi, is_rate_limited};
use crate::credentials::CredentialPool;
use crate::models::{DataPoint, FetchOutcome, WorkItem};
use crate::normalize::normalize;

type WorkQueue = Arc<Mutex<VecDeque<WorkItem>>>;
type SharedOutput = Arc<Mutex<Vec<DataPoint>>>;

/// Fans work items out over a fixed number of concurrent workers.
#[derive(Debug)]
pub struct Dispatcher<A> {
    api: Arc<A>,
    pool: Arc<CredentialPool>,
    workers: usize,
}

/// Per-worker counters, summed into the run summary.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerTally {
    claimed: usize,
    failed: usize,
    rate_limited: usize,
    articles: usize,
    skipped: usize,
}

impl WorkerTally {
    fn absorb(&mut self, other: WorkerTally) {
        self.claimed += other.claimed;
        self.failed += other.failed;
        self.rate_limited += other.rate_limited;
        self.articles += other.articles;
        self.skipped += other.skipped;
    }
}

impl<A> Dispatcher<A>
where
    A: SearchApi + 'static,
{
    /// `workers` is clamped to at least one.
    pub fn new(api: Arc<A>, pool: Arc<CredentialPool>, workers: usize) -> Self {
        Self {
            api,
            pool,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every item and collect the normalized results.
    ///
    /// Never fails: per-item errors are logged and the item is dropped.
    /// When `cancel` fires, workers stop claiming items, abandon any
    /// in-flight search, and whatever was already collected is returned.
    #[instrument(level = "info", skip_all, fields(items = items.len(), workers = self.workers))]
    pub async fn run(&self, items: Vec<WorkItem>, cancel: CancellationToken) -> FetchOutcome {
        let t0 = Instant::now();
        let total = items.len();
        if total == 0 {
            info!("No work items; nothing to fetch");
            return FetchOutcome::default();
        }

        let queue: WorkQueue = Arc::new(Mutex::new(VecDeque::from(items)));
        let output: SharedOutput = Arc::new(Mutex::new(Vec::new()));
        let worker_count = self.workers.min(total);

        let handles: Vec<_> = (0..worker_count)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&self.api),
                    Arc::clone(&self.pool),
                    Arc::clone(&queue),
                    Arc::clone(&output),
                    cancel.clone(),
                ))
            })
            .collect();

        let mut tally = WorkerTally::default();
        for (id, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(t) => tally.absorb(t),
                Err(e) => error!(worker = id, error = %e, "Worker terminated abnormally"),
            }
        }

        let data_points = std::mem::take(&mut *output.lock().await);
        let unclaimed = queue.lock().await.len();
        let elapsed = t0.elapsed();

        info!(
            total,
            claimed = tally.claimed,
            failed = tally.failed,
            rate_limited = tally.rate_limited,
            unclaimed,
            articles = tally.articles,
            skipped_no_url = tally.skipped,
            cancelled = cancel.is_cancelled(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Dispatch run finished"
        );

        FetchOutcome::new(data_points)
    }
}

async fn worker<A>(
    id: usize,
    api: Arc<A>,
    pool: Arc<CredentialPool>,
    queue: WorkQueue,
    output: SharedOutput,
    cancel: CancellationToken,
) -> WorkerTally
where
    A: SearchApi,
{
    let mut tally = WorkerTally::default();

    loop {
        if cancel.is_cancelled() {
            debug!(worker = id, "Run cancelled; not claiming more work");
            break;
        }
        let Some(item) = queue.lock().await.pop_front() else {
            break;
        };
        tally.claimed += 1;

        let credential = pool.next();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(
                    worker = id,
                    topic = %item.topic,
                    subtopic = %item.subtopic,
                    keyword = %item.keyword,
                    "Run cancelled mid-search; abandoning work item"
                );
                break;
            }
            res = AssertUnwindSafe(api.search(credential, &item.keyword)).catch_unwind() => res,
        };

        let result = match result {
            Ok(result) => result,
            Err(_) => {
                // The worker stays alive so the rest of the queue is still drained.
                tally.failed += 1;
                error!(
                    worker = id,
                    credential = %credential,
                    topic = %item.topic,
                    subtopic = %item.subtopic,
                    keyword = %item.keyword,
                    "Search panicked; dropping work item"
                );
                continue;
            }
        };

        match result {
            Ok(articles) => {
                let mut batch = Vec::with_capacity(articles.len());
                for raw in &articles {
                    if raw.url.trim().is_empty() {
                        tally.skipped += 1;
                        debug!(worker = id, title = %raw.title, "Result has no URL; skipping");
                        continue;
                    }
                    batch.push(normalize(raw, &item.topic, &item.subtopic));
                }
                debug!(
                    worker = id,
                    credential = %credential,
                    keyword = %item.keyword,
                    returned = articles.len(),
                    kept = batch.len(),
                    "Work item fetched"
                );
                tally.articles += batch.len();
                output.lock().await.extend(batch);
            }
            Err(e) => {
                tally.failed += 1;
                if is_rate_limited(&e) {
                    tally.rate_limited += 1;
                }
                warn!(
                    worker = id,
                    credential = %credential,
                    topic = %item.topic,
                    subtopic = %item.subtopic,
                    keyword = %item.keyword,
                    kind = e.kind(),
                    error = %e,
                    "Search failed; dropping work item"
                );
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NewsClient;
    use crate::error::FetchError;
    use crate::identity::id_for_article;
    use crate::models::{Credential, RawArticle};
    use reqwest::StatusCode;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory search API driven by keyword.
    #[derive(Default)]
    struct ScriptedApi {
        calls: StdMutex<Vec<(String, String)>>,
        fail: HashSet<String>,
        hang: HashSet<String>,
        no_url: HashSet<String>,
        panic_on: HashSet<String>,
        cancel_on: Option<(String, CancellationToken)>,
        completed: AtomicUsize,
    }

    impl ScriptedApi {
        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn article_for(keyword: &str) -> RawArticle {
        RawArticle {
            title: format!("About {keyword}"),
            description: format!("Story on {keyword}"),
            url: format!("https://example.com/{}", keyword.replace(' ', "-")),
            publishedAt: "2025-05-06T10:00:00Z".to_string(),
            ..RawArticle::default()
        }
    }

    impl SearchApi for ScriptedApi {
        async fn search(
            &self,
            credential: &Credential,
            query: &str,
        ) -> Result<Vec<RawArticle>, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((credential.label().to_string(), query.to_string()));

            if let Some((keyword, token)) = &self.cancel_on {
                if keyword == query {
                    token.cancel();
                    std::future::pending::<()>().await;
                }
            }
            if self.panic_on.contains(query) {
                panic!("scripted panic for {query}");
            }
            if self.hang.contains(query) {
                std::future::pending::<()>().await;
            }
            if self.fail.contains(query) {
                return Err(FetchError::Upstream {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: "rateLimited".to_string(),
                });
            }

            let mut out = vec![article_for(query)];
            if self.no_url.contains(query) {
                out.push(RawArticle {
                    title: "dangling".to_string(),
                    url: "  ".to_string(),
                    ..RawArticle::default()
                });
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(out)
        }
    }

    fn items(keywords: &[&str]) -> Vec<WorkItem> {
        keywords
            .iter()
            .map(|k| WorkItem::new("topic", format!("sub-{k}"), *k))
            .collect()
    }

    fn pool(n: usize) -> Arc<CredentialPool> {
        Arc::new(CredentialPool::from_keys((1..=n).map(|i| format!("secret-{i}"))).unwrap())
    }

    #[tokio::test]
    async fn test_empty_work_list_returns_empty_outcome() {
        let api = Arc::new(ScriptedApi::default());
        let d = Dispatcher::new(Arc::clone(&api), pool(2), 2);
        let out = d.run(Vec::new(), CancellationToken::new()).await;
        assert!(out.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_is_clamped() {
        let d = Dispatcher::new(Arc::new(ScriptedApi::default()), pool(1), 0);
        assert_eq!(d.workers(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_item_is_searched_exactly_once() {
        let keywords: Vec<String> = (0..40).map(|i| format!("kw{i}")).collect();
        let refs: Vec<&str> = keywords.iter().map(String::as_str).collect();

        let api = Arc::new(ScriptedApi::default());
        let d = Dispatcher::new(Arc::clone(&api), pool(4), 3);
        let out = d.run(items(&refs), CancellationToken::new()).await;

        assert_eq!(out.len(), 40);
        let mut searched: Vec<String> = api.calls().into_iter().map(|(_, q)| q).collect();
        searched.sort();
        let mut expected = keywords.clone();
        expected.sort();
        assert_eq!(searched, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_credentials_are_spread_evenly() {
        let keywords: Vec<String> = (0..20).map(|i| format!("kw{i}")).collect();
        let refs: Vec<&str> = keywords.iter().map(String::as_str).collect();

        let api = Arc::new(ScriptedApi::default());
        let d = Dispatcher::new(Arc::clone(&api), pool(4), 4);
        d.run(items(&refs), CancellationToken::new()).await;

        let mut per_key: HashMap<String, usize> = HashMap::new();
        for (label, _) in api.calls() {
            *per_key.entry(label).or_default() += 1;
        }
        assert_eq!(per_key.len(), 4);
        assert!(per_key.values().all(|&c| c == 5), "{per_key:?}");
    }

    #[tokio::test]
    async fn test_failing_item_is_isolated() {
        let api = Arc::new(ScriptedApi {
            fail: HashSet::from(["c".to_string()]),
            ..ScriptedApi::default()
        });
        let d = Dispatcher::new(Arc::clone(&api), pool(3), 2);
        let out = d
            .run(items(&["a", "b", "c", "d", "e"]), CancellationToken::new())
            .await;

        assert_eq!(out.len(), 4);
        assert_eq!(api.calls().len(), 5);
        assert!(out.data_points().iter().all(|dp| dp.subtopic != "sub-c"));
    }

    #[tokio::test]
    async fn test_panicking_search_does_not_strand_queued_items() {
        let api = Arc::new(ScriptedApi {
            panic_on: HashSet::from(["boom".to_string()]),
            ..ScriptedApi::default()
        });
        let d = Dispatcher::new(Arc::clone(&api), pool(1), 1);
        let out = d
            .run(items(&["x", "boom", "y"]), CancellationToken::new())
            .await;

        let queried: Vec<String> = api.calls().into_iter().map(|(_, q)| q).collect();
        assert_eq!(queried, vec!["x", "boom", "y"]);
        let mut subtopics: Vec<&str> = out
            .data_points()
            .iter()
            .map(|dp| dp.subtopic.as_str())
            .collect();
        subtopics.sort();
        assert_eq!(subtopics, vec!["sub-x", "sub-y"]);
    }

    #[tokio::test]
    async fn test_results_without_url_are_skipped() {
        let api = Arc::new(ScriptedApi {
            no_url: HashSet::from(["a".to_string()]),
            ..ScriptedApi::default()
        });
        let d = Dispatcher::new(Arc::clone(&api), pool(1), 1);
        let out = d.run(items(&["a"]), CancellationToken::new()).await;

        assert_eq!(out.len(), 1);
        let dp = &out.data_points()[0];
        assert_eq!(dp.id, id_for_article("https://example.com/a", "news"));
        assert_eq!(dp.topic, "topic");
        assert_eq!(dp.subtopic, "sub-a");
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let api = Arc::new(ScriptedApi::default());
        let d = Dispatcher::new(Arc::clone(&api), pool(2), 16);
        let out = d.run(items(&["a", "b"]), CancellationToken::new()).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_already_cancelled_run_claims_nothing() {
        let api = Arc::new(ScriptedApi::default());
        let d = Dispatcher::new(Arc::clone(&api), pool(2), 2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = d.run(items(&["a", "b", "c"]), cancel).await;
        assert!(out.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_keeps_partial_results() {
        let cancel = CancellationToken::new();
        let api = Arc::new(ScriptedApi {
            cancel_on: Some(("c".to_string(), cancel.clone())),
            ..ScriptedApi::default()
        });
        // single worker: a and b complete, c triggers cancellation mid-search
        let d = Dispatcher::new(Arc::clone(&api), pool(2), 1);
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            d.run(items(&["a", "b", "c", "d", "e"]), cancel),
        )
        .await
        .expect("cancelled run must return");

        assert_eq!(out.len(), 2);
        let subtopics: Vec<&str> = out.data_points().iter().map(|dp| dp.subtopic.as_str()).collect();
        assert_eq!(subtopics, vec!["sub-a", "sub-b"]);
        // d and e were never claimed
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancellation_abandons_in_flight_searches() {
        let api = Arc::new(ScriptedApi {
            hang: HashSet::from(["c".to_string(), "d".to_string(), "e".to_string()]),
            ..ScriptedApi::default()
        });
        let d = Arc::new(Dispatcher::new(Arc::clone(&api), pool(5), 5));
        let cancel = CancellationToken::new();

        let run = {
            let d = Arc::clone(&d);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                d.run(items(&["a", "b", "c", "d", "e"]), cancel).await
            })
        };

        // wait until every item is in flight and the two fast ones are done
        while api.calls().len() < 5 || api.completed.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let out = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("cancelled run must return")
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_against_http_upstream() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        for kw in ["alpha", "beta", "delta", "epsilon"] {
            let body = serde_json::json!({
                "status": "ok",
                "totalResults": 1,
                "articles": [{
                    "source": {"id": null, "name": "Example Wire"},
                    "author": "Reporter",
                    "title": format!("{kw} headline"),
                    "description": format!("{kw} description"),
                    "url": format!("https://example.com/{kw}"),
                    "urlToImage": null,
                    "publishedAt": "2025-05-06T10:00:00Z",
                    "content": null
                }]
            });
            Mock::given(method("GET"))
                .and(path("/everything"))
                .and(query_param("q", kw))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/everything"))
            .and(query_param("q", "gamma"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = Arc::new(NewsClient::new(&server.uri(), Duration::from_secs(5)).unwrap());
        let d = Dispatcher::new(client, pool(3), 3);
        let out = d
            .run(
                items(&["alpha", "beta", "gamma", "delta", "epsilon"]),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(out.len(), 4);
        let mut urls: Vec<&str> = out.data_points().iter().map(|dp| dp.url.as_str()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "https://example.com/alpha",
                "https://example.com/beta",
                "https://example.com/delta",
                "https://example.com/epsilon",
            ]
        );
        assert!(
            out.data_points()
                .iter()
                .all(|dp| dp.metadata["source_name"] == "Example Wire")
        );
    }
}
