use async_trait::async_trait;
use carfacts_core::cache::{derive_key, CacheOptions, ConcurrencyMode, Namespace, ReportCache};
use carfacts_core::generator::ReportGenerator;
use carfacts_core::identifier::{IdentifierPolicy, Normalization, VehicleIdentifier};
use carfacts_core::prompt::PromptTemplate;
use carfacts_core::storage::{MemoryReportStore, ReportStore};
use carfacts_core::{ReportError, ReportSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Generator that counts calls and can be told to fail.
struct CountingGenerator {
    calls: AtomicUsize,
    fail_first: AtomicUsize,
    delay: Duration,
}

impl CountingGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(n),
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportGenerator for CountingGenerator {
    async fn generate(
        &self,
        identifier: &VehicleIdentifier,
        template: &PromptTemplate,
    ) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n <= self.fail_first.load(Ordering::SeqCst) {
            anyhow::bail!("upstream returned 503");
        }
        Ok(format!(
            "## {} ({})\nreport #{}",
            identifier, template.version, n
        ))
    }
}

struct BrokenStore;

#[async_trait]
impl ReportStore for BrokenStore {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("connection refused")
    }

    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

/// Reads succeed, writes fail.
struct ReadOnlyStore(MemoryReportStore);

#[async_trait]
impl ReportStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.0.get(key).await
    }

    async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        anyhow::bail!("READONLY You can't write against a read only replica")
    }

    fn backend_name(&self) -> &'static str {
        "read_only"
    }
}

fn cache(
    ns: &str,
    store: Arc<dyn ReportStore>,
    generator: Arc<CountingGenerator>,
    options: CacheOptions,
) -> ReportCache {
    ReportCache::new(
        Namespace::new(ns).unwrap(),
        store,
        generator,
        PromptTemplate::builtin(),
        options,
    )
}

fn id(raw: &str) -> VehicleIdentifier {
    VehicleIdentifier::parse(raw, &IdentifierPolicy::default()).unwrap()
}

#[tokio::test]
async fn populated_key_is_served_without_generation() -> anyhow::Result<()> {
    let store = Arc::new(MemoryReportStore::new());
    store.set("analysis:Audi A4", "stored report ✓").await?;
    let generator = CountingGenerator::new();
    let cache = cache("analysis", store, generator.clone(), CacheOptions::default());

    for _ in 0..5 {
        let got = cache.get_or_generate(&id("Audi A4")).await?;
        assert_eq!(got.report, "stored report ✓");
        assert_eq!(got.source, ReportSource::Cache);
    }
    assert_eq!(generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn miss_generates_once_then_hits() -> anyhow::Result<()> {
    let store = Arc::new(MemoryReportStore::new());
    let generator = CountingGenerator::new();
    let cache = cache("analysis", store.clone(), generator.clone(), CacheOptions::default());
    let accord = id("2010 Honda Accord EX");

    let first = cache.get_or_generate(&accord).await?;
    assert_eq!(first.source, ReportSource::Live);
    assert_eq!(generator.calls(), 1);
    assert_eq!(
        store.get("analysis:2010 Honda Accord EX").await?.as_deref(),
        Some(first.report.as_str())
    );

    let second = cache.get_or_generate(&accord).await?;
    assert_eq!(second.source, ReportSource::Cache);
    assert_eq!(second.report, first.report);
    assert_eq!(generator.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn namespaces_are_isolated() -> anyhow::Result<()> {
    let tesla = id("Tesla Model 3");
    let analysis = Namespace::new("analysis")?;
    let vehicle = Namespace::new("vehicle")?;
    assert_ne!(derive_key(&analysis, &tesla), derive_key(&vehicle, &tesla));

    let store: Arc<MemoryReportStore> = Arc::new(MemoryReportStore::new());
    let generator = CountingGenerator::new();
    let a = cache("analysis", store.clone(), generator.clone(), CacheOptions::default());
    let v = cache("vehicle", store.clone(), generator.clone(), CacheOptions::default());

    a.get_or_generate(&tesla).await?;
    let from_other = v.get_or_generate(&tesla).await?;
    assert_eq!(from_other.source, ReportSource::Live);
    assert_eq!(generator.calls(), 2);
    assert_eq!(store.len(), 2);
    Ok(())
}

#[tokio::test]
async fn raw_identifiers_are_case_sensitive() -> anyhow::Result<()> {
    let generator = CountingGenerator::new();
    let cache = cache(
        "analysis",
        Arc::new(MemoryReportStore::new()),
        generator.clone(),
        CacheOptions::default(),
    );

    let upper = cache.get_or_generate(&id("Honda Accord")).await?;
    let lower = cache.get_or_generate(&id("honda accord")).await?;
    assert_ne!(upper.key, lower.key);
    assert_eq!(lower.source, ReportSource::Live);
    assert_eq!(generator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_generation_leaves_no_trace() -> anyhow::Result<()> {
    let store = Arc::new(MemoryReportStore::new());
    let generator = CountingGenerator::failing_first(1);
    let cache = cache("analysis", store.clone(), generator.clone(), CacheOptions::default());
    let audi = id("Audi A4");

    let err = cache.get_or_generate(&audi).await.unwrap_err();
    match &err {
        ReportError::GenerationFailed { identifier, source } => {
            assert_eq!(identifier, "Audi A4");
            assert!(source.to_string().contains("503"));
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
    assert!(store.is_empty());

    let retry = cache.get_or_generate(&audi).await?;
    assert_eq!(retry.source, ReportSource::Live);
    assert_eq!(generator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_regenerate_keeps_previous_report() -> anyhow::Result<()> {
    let store = Arc::new(MemoryReportStore::new());
    store.set("analysis:Audi A4", "old report").await?;
    let generator = CountingGenerator::failing_first(1);
    let cache = cache("analysis", store.clone(), generator.clone(), CacheOptions::default());

    assert!(cache.regenerate(&id("Audi A4")).await.is_err());
    assert_eq!(store.get("analysis:Audi A4").await?.as_deref(), Some("old report"));

    let fresh = cache.regenerate(&id("Audi A4")).await?;
    assert_eq!(fresh.source, ReportSource::Live);
    assert_eq!(store.get("analysis:Audi A4").await?, Some(fresh.report.clone()));

    let after = cache.get_or_generate(&id("Audi A4")).await?;
    assert_eq!(after.report, fresh.report);
    Ok(())
}

#[tokio::test]
async fn store_outage_is_not_a_miss() {
    let generator = CountingGenerator::new();
    let cache = cache("analysis", Arc::new(BrokenStore), generator.clone(), CacheOptions::default());

    let err = cache.get_or_generate(&id("Audi A4")).await.unwrap_err();
    assert!(matches!(err, ReportError::StoreUnavailable { ref key, .. } if key == "analysis:Audi A4"));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn failed_write_is_store_unavailable() {
    let generator = CountingGenerator::new();
    let store = Arc::new(ReadOnlyStore(MemoryReportStore::new()));
    let cache = cache("analysis", store, generator.clone(), CacheOptions::default());

    let err = cache.get_or_generate(&id("Audi A4")).await.unwrap_err();
    assert!(matches!(err, ReportError::StoreUnavailable { .. }));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn single_flight_generates_once_for_concurrent_misses() -> anyhow::Result<()> {
    let generator = CountingGenerator::slow(Duration::from_millis(50));
    let cache = Arc::new(cache(
        "analysis",
        Arc::new(MemoryReportStore::new()),
        generator.clone(),
        CacheOptions {
            concurrency: ConcurrencyMode::SingleFlight,
            ..Default::default()
        },
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.get_or_generate(&id("Porsche 911")).await
        }));
    }

    let mut reports = Vec::new();
    for h in handles {
        reports.push(h.await??);
    }

    assert_eq!(generator.calls(), 1);
    let first = &reports[0].report;
    assert!(reports.iter().all(|r| &r.report == first));
    assert_eq!(
        reports.iter().filter(|r| r.source == ReportSource::Live).count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn unlocked_mode_lets_concurrent_misses_each_generate() -> anyhow::Result<()> {
    let generator = CountingGenerator::slow(Duration::from_millis(50));
    let store = Arc::new(MemoryReportStore::new());
    let cache = Arc::new(cache("analysis", store.clone(), generator.clone(), CacheOptions::default()));

    let id_a = id("Porsche 911");
    let id_b = id("Porsche 911");
    let (a, b) = tokio::join!(
        cache.get_or_generate(&id_a),
        cache.get_or_generate(&id_b)
    );
    let (a, b) = (a?, b?);

    assert_eq!(generator.calls(), 2);
    assert_eq!(a.source, ReportSource::Live);
    assert_eq!(b.source, ReportSource::Live);
    // Last write wins; the stored value is one of the two.
    let stored = store.get("analysis:Porsche 911").await?.unwrap();
    assert!(stored == a.report || stored == b.report);
    Ok(())
}

#[tokio::test]
async fn canonical_mode_shares_one_key() -> anyhow::Result<()> {
    let generator = CountingGenerator::new();
    let cache = cache(
        "analysis",
        Arc::new(MemoryReportStore::new()),
        generator.clone(),
        CacheOptions {
            identifier: IdentifierPolicy {
                normalize: Normalization::Canonical,
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let a = cache.parse_identifier("  honda   Accord ")?;
    let b = cache.parse_identifier("Honda accord")?;
    let first = cache.get_or_generate(&a).await?;
    let second = cache.get_or_generate(&b).await?;

    assert_eq!(first.key, "analysis:honda accord");
    assert_eq!(second.key, first.key);
    assert_eq!(second.source, ReportSource::Cache);
    assert_eq!(generator.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_identifier_touches_nothing() {
    let generator = CountingGenerator::new();
    let cache = cache("analysis", Arc::new(BrokenStore), generator.clone(), CacheOptions::default());

    let err = cache.parse_identifier("   ").unwrap_err();
    assert!(matches!(err, ReportError::InvalidIdentifier { .. }));
    assert_eq!(err.exit_code(), 2);

    let long = "x".repeat(201);
    assert!(cache.parse_identifier(&long).is_err());
    assert_eq!(generator.calls(), 0);
}
