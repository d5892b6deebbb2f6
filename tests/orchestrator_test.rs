use bibfetch::error::{ProviderError, Result};
use bibfetch::orchestrator::Orchestrator;
use bibfetch::registry::ProviderRegistry;
use bibfetch::types::{
    ActiveSource, BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome,
    SearchParams,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    SlowFail,
}

/// In-memory provider standing in for a network-backed adapter.
struct StubProvider {
    code: &'static str,
    behavior: Behavior,
    field_search: bool,
    calls: Arc<AtomicUsize>,
    last_isbn: Arc<Mutex<Option<String>>>,
}

impl StubProvider {
    fn new(code: &'static str, behavior: Behavior) -> (Box<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = Box::new(StubProvider {
            code,
            behavior,
            field_search: false,
            calls: calls.clone(),
            last_isbn: Arc::new(Mutex::new(None)),
        });
        (stub, calls)
    }
}

#[async_trait::async_trait]
impl BookProvider for StubProvider {
    fn code(&self) -> &'static str {
        self.code
    }

    fn name(&self) -> &'static str {
        "stub"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_isbn.lock().unwrap() = Some(isbn.to_string());

        match self.behavior {
            Behavior::Succeed => Ok(ProviderHit {
                record: BookRecord {
                    title: Some(format!("Title from {}", self.code)),
                    ..Default::default()
                },
                source_url: None,
            }),
            Behavior::Fail => Err(ProviderError::isbn_not_found()),
            Behavior::SlowFail => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(ProviderError::Api {
                    message: "operation timed out".to_string(),
                })
            }
        }
    }

    fn supports_field_search(&self) -> bool {
        self.field_search
    }

    async fn search_by_fields(&self, _params: &SearchParams) -> Result<SearchOutcome> {
        Ok(SearchOutcome::default())
    }
}

fn active(code: &str, priority: i32) -> ActiveSource {
    ActiveSource {
        code: code.to_string(),
        name: code.to_string(),
        country: None,
        kind: ProviderKind::Api,
        base_url: String::new(),
        is_active: true,
        priority,
    }
}

#[tokio::test]
async fn first_success_wins_and_later_sources_are_not_called() {
    let (a, a_calls) = StubProvider::new("alpha", Behavior::Fail);
    let (b, b_calls) = StubProvider::new("beta", Behavior::Succeed);
    let (c, c_calls) = StubProvider::new("gamma", Behavior::Succeed);
    let orchestrator =
        Orchestrator::new(ProviderRegistry::from_providers(vec![a, b, c]));

    let sources = vec![active("alpha", 1), active("beta", 2), active("gamma", 3)];
    let lookup = orchestrator.search_isbn("9780306406157", &sources).await;

    let result = lookup.result.expect("beta should have matched");
    assert_eq!(result.provider, "beta");
    assert_eq!(result.record.title.as_deref(), Some("Title from beta"));

    assert_eq!(lookup.attempted, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(lookup.errors.get("alpha").map(String::as_str), Some("ISBN not found"));

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0, "gamma must never be called");
}

#[tokio::test]
async fn priority_order_beats_list_order() {
    let (a, a_calls) = StubProvider::new("alpha", Behavior::Succeed);
    let (b, _) = StubProvider::new("beta", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a, b]));

    // beta is listed first but has the higher priority number
    let sources = vec![active("beta", 5), active("alpha", 1)];
    let lookup = orchestrator.search_isbn("9780306406157", &sources).await;

    assert_eq!(lookup.result.unwrap().provider, "alpha");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn equal_priorities_keep_insertion_order() {
    let (a, _) = StubProvider::new("alpha", Behavior::Succeed);
    let (b, _) = StubProvider::new("beta", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a, b]));

    let sources = vec![active("beta", 1), active("alpha", 1)];
    let lookup = orchestrator.search_isbn("9780306406157", &sources).await;

    // stable sort: the caller's order breaks the tie
    assert_eq!(lookup.result.unwrap().provider, "beta");
}

#[tokio::test]
async fn empty_source_list_returns_nothing() {
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![]));
    let lookup = orchestrator.search_isbn("9780306406157", &[]).await;

    assert!(lookup.result.is_none());
    assert!(lookup.attempted.is_empty());
    assert!(lookup.errors.is_empty());
}

#[tokio::test]
async fn inactive_sources_are_skipped_entirely() {
    let (a, a_calls) = StubProvider::new("alpha", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a]));

    let mut source = active("alpha", 1);
    source.is_active = false;
    let lookup = orchestrator.search_isbn("9780306406157", &[source]).await;

    assert!(lookup.result.is_none());
    assert!(lookup.attempted.is_empty());
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unimplemented_code_is_recorded_but_does_not_abort() {
    let (b, _) = StubProvider::new("beta", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![b]));

    let sources = vec![active("nonexistent", 1), active("beta", 2)];
    let lookup = orchestrator.search_isbn("9780306406157", &sources).await;

    assert_eq!(lookup.result.unwrap().provider, "beta");
    // not implemented → recorded in errors, not in attempted
    assert_eq!(lookup.attempted, vec!["beta".to_string()]);
    assert_eq!(
        lookup.errors.get("nonexistent").map(String::as_str),
        Some("Provider not implemented")
    );
}

#[tokio::test]
async fn all_sources_failing_reports_every_error() {
    let (a, _) = StubProvider::new("alpha", Behavior::Fail);
    let (b, _) = StubProvider::new("beta", Behavior::Fail);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a, b]));

    let sources = vec![active("alpha", 1), active("beta", 2)];
    let lookup = orchestrator.search_isbn("9780306406157", &sources).await;

    assert!(lookup.result.is_none());
    assert_eq!(lookup.attempted.len(), 2);
    assert_eq!(lookup.errors.len(), 2);
}

#[tokio::test]
async fn slow_failure_does_not_block_the_next_source() {
    let (a, _) = StubProvider::new("alpha", Behavior::SlowFail);
    let (b, b_calls) = StubProvider::new("beta", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a, b]));

    let sources = vec![active("alpha", 1), active("beta", 2)];
    let lookup = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.search_isbn("9780306406157", &sources),
    )
    .await
    .expect("lookup must finish well inside the bound");

    assert_eq!(lookup.result.unwrap().provider, "beta");
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        lookup.errors.get("alpha").map(String::as_str),
        Some("API error: operation timed out")
    );
}

#[tokio::test]
async fn identifier_is_normalized_once_before_dispatch() {
    let (a, _) = StubProvider::new("alpha", Behavior::Succeed);
    let last_isbn = a.last_isbn.clone();
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a]));

    let sources = vec![active("alpha", 1)];
    orchestrator.search_isbn("978-0-306-40615-7", &sources).await;

    assert_eq!(
        last_isbn.lock().unwrap().as_deref(),
        Some("9780306406157")
    );
}

#[tokio::test]
async fn field_search_on_unsupporting_source_is_a_capability_error() {
    let (a, _) = StubProvider::new("alpha", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a]));

    let params = SearchParams {
        title: Some("Dune".to_string()),
        ..Default::default()
    };
    let err = orchestrator
        .search_by_fields("alpha", &params)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "alpha does not support field search");

    let err = orchestrator
        .search_by_fields("nonexistent", &params)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Provider not implemented");
}

#[tokio::test]
async fn details_on_unsupporting_source_is_a_capability_error() {
    let (a, _) = StubProvider::new("alpha", Behavior::Succeed);
    let orchestrator = Orchestrator::new(ProviderRegistry::from_providers(vec![a]));

    let err = orchestrator
        .get_details("alpha", "some-key")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "alpha does not support detail lookup");
}

#[tokio::test]
async fn registry_capability_introspection() {
    let (a, _) = StubProvider::new("alpha", Behavior::Succeed);
    let registry = ProviderRegistry::from_providers(vec![a]);

    assert!(registry.is_implemented("alpha"));
    assert!(!registry.is_implemented("nonexistent"));
    assert!(!registry.supports_field_search("alpha"));
    assert!(!registry.supports_details("alpha"));
    assert_eq!(registry.implemented_codes(), vec!["alpha"]);
}
