use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bowerer_rs::fetch::{FetchError, FetchedCandidate, PackageFetcher};
use bowerer_rs::{Endpoint, Project, ResolverStatus};
use bowerer_rs_test_utils::{package, ProjectFixture, StaticFetcher};
use serde_json::json;

fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn missing_root_dependency_aborts() {
	init_logger();
	let fixture = ProjectFixture::new(json!({"name": "app", "dependencies": {"a": "*", "ghost": "*"}})).unwrap();
	let fetcher = Arc::new(StaticFetcher::new().with(package("a", "1.0.0", [])));

	let result = Project::new(fixture.options()).install(vec![], fetcher).await;
	match result {
		Err(bowerer_rs::Error::Fetch { name, source }) => {
			assert_eq!(name, "ghost");
			assert!(matches!(source, FetchError::NotFound(_)));
		},
		other => panic!("expected a fetch error, got {:?}", other.map(|_| ())),
	}
}

#[tokio::test]
async fn transitive_failure_is_reported() {
	init_logger();
	let fixture = ProjectFixture::new(json!({"name": "app", "dependencies": {"b": "*"}})).unwrap();
	let fetcher = Arc::new(StaticFetcher::new()
		.with(package("b", "1.0.0", [("ghost", "~1.0.0")]))
		.failing("ghost", FetchError::Fatal("repository is gone".to_string())));

	let finalized = Project::new(fixture.options()).install(vec![], fetcher).await.unwrap();

	assert!(matches!(finalized.status(), ResolverStatus::Converged));
	assert!(finalized.plan().contains("b"));

	let failures = finalized.failures();
	assert_eq!(failures.len(), 1);
	assert_eq!(failures[0].endpoint.name, "ghost");
	assert_eq!(failures[0].dependants, ["b"]);
	assert!(failures[0].to_string().ends_with("#~1.0.0: repository is gone (required by b)"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
	init_logger();
	let fixture = ProjectFixture::new(json!({"name": "app", "dependencies": {"a": "*"}})).unwrap();
	let fetcher = Arc::new(StaticFetcher::new()
		.with(package("a", "1.0.0", []))
		.flaky("a", 2));

	let finalized = Project::new(fixture.options()).install(vec![], fetcher.clone()).await.unwrap();

	assert_eq!(fetcher.calls("a"), 3);
	assert_eq!(finalized.plan().version("a"), Some("1.0.0"));
}

#[tokio::test]
async fn retries_are_bounded() {
	init_logger();
	let fixture = ProjectFixture::new(json!({"name": "app", "dependencies": {"a": "*"}})).unwrap();
	let fetcher = Arc::new(StaticFetcher::new()
		.with(package("a", "1.0.0", []))
		.flaky("a", 5));

	let mut options = fixture.options();
	options.set_fetch_retries(1);
	let result = Project::new(options).install(vec![], fetcher.clone()).await;

	assert!(matches!(result, Err(bowerer_rs::Error::Fetch { source: FetchError::Exhausted { attempts: 2, .. }, .. })));
	assert_eq!(fetcher.calls("a"), 2);
}

/// Answers every name with a dependency free `1.0.0`, recording how many fetches overlap.
#[derive(Default)]
struct SlowFetcher {
	in_flight: AtomicUsize,
	peak: AtomicUsize,
}

#[async_trait::async_trait]
impl PackageFetcher for SlowFetcher {
	async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<FetchedCandidate>, FetchError> {
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(30)).await;
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
		Ok(vec![package(&endpoint.name, "1.0.0", []).into()])
	}
}

#[tokio::test]
async fn fetches_respect_concurrency_limit() {
	init_logger();
	let dependencies: serde_json::Map<_, _> = (0..8).map(|i| (format!("p{i}"), json!("*"))).collect();
	let fixture = ProjectFixture::new(json!({"name": "app", "dependencies": dependencies})).unwrap();
	let fetcher = Arc::new(SlowFetcher::default());

	let mut options = fixture.options();
	options.set_fetch_concurrency(2);
	let finalized = Project::new(options).install(vec![], fetcher.clone()).await.unwrap();

	assert_eq!(finalized.plan().len(), 8);
	let peak = fetcher.peak.load(Ordering::SeqCst);
	assert!((1..=2).contains(&peak), "{} fetches ran at once", peak);
}
