use std::time::Duration;
use actix_web::HttpRequest;
use crate::config::ConfigurationSet;
use crate::error::{ConstructionError, Error};
use crate::key::{KeyTemplate, KEY_SEPARATOR};
use crate::store::SlidingWindowStore;

/// Deadline of a store round trip unless [LimiterBuilder::with_timeout] says otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Maps a request to its `(identity, category)`.
/// An empty identity marks the request as unidentifiable.
pub(crate) type ExtractFunc = Box<dyn Fn(&HttpRequest) -> (String, u32) + Send + Sync + 'static>;

/// [Usage] is what an admitted check observed in the store.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Usage {
    /// live entries in the window, including this request
    pub count: u64,
    pub limit: u32,
}

impl Usage {
    pub fn remaining(&self) -> u64 {
        u64::from(self.limit).saturating_sub(self.count)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Verdict {
    Allowed,
    /// the limit is exceeded, or the request can not be attributed to a configured limit
    Denied,
    /// the store could not answer, the count is unknown
    StoreFailure,
}

impl<U> From<&Result<U, Error>> for Verdict {
    fn from(result: &Result<U, Error>) -> Self {
        match result {
            Ok(_) => Self::Allowed,
            Err(Error::LimitExceeded) => Self::Denied,
            Err(Error::Store(_)) => Self::StoreFailure,
        }
    }
}

/// [Limiter] decides whether a request is admitted, using a sliding window
/// kept in a [SlidingWindowStore] shared by every instance of the service.
///
/// A [Limiter] only holds read-only state besides its store handle,
/// share it between workers with an [std::sync::Arc].
pub struct Limiter<T: SlidingWindowStore> {
    name: String,
    store: T,
    keys: KeyTemplate,
    configurations: ConfigurationSet,
    extractor: ExtractFunc,
    timeout: Option<Duration>,
}

impl<T: SlidingWindowStore> Limiter<T> {
    /// Start building a [Limiter]. `name` keeps limiters sharing a store apart.
    pub fn builder<N: ToString>(name: N) -> LimiterBuilder<T> {
        LimiterBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn configurations(&self) -> &ConfigurationSet {
        &self.configurations
    }

    /// Check `req` against its limit, recording it in the store.
    ///
    /// Returns [Error::LimitExceeded] when the request must be rejected
    /// and [Error::Store] when the store could not tell.
    pub async fn check_limit(&self, req: &HttpRequest) -> Result<(), Error> {
        self.check_request(req).await.map(|_| ())
    }

    pub async fn verdict(&self, req: &HttpRequest) -> Verdict {
        Verdict::from(&self.check_request(req).await)
    }

    /// Like [Self::check_limit], also returning the observed [Usage].
    /// The usage is `None` when the category is unlimited.
    pub async fn check_request(&self, req: &HttpRequest) -> Result<Option<Usage>, Error> {
        let (identity, category) = (self.extractor)(req);
        self.evaluate(&identity, category, req.path()).await
    }

    /// Evaluate one request of `identity` in `category` on `route`.
    pub async fn evaluate(&self, identity: &str, category: u32, route: &str) -> Result<Option<Usage>, Error> {
        if identity.is_empty() {
            tracing::debug!(limiter = %self.name, category, "request without identity rejected");
            return Err(Error::LimitExceeded);
        }

        let (configuration, scope) = match self.configurations.resolve_scoped(category, route) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(limiter = %self.name, route, error = %e, "request rejected");
                return Err(Error::LimitExceeded);
            }
        };

        let key = self.keys.build_scoped_key(identity, &self.name, category, scope);

        if configuration.is_unlimited() {
            return Ok(None);
        }

        let slide = self.store.slide(&key, configuration.window);
        let count = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, slide).await {
                Ok(count) => count.map_err(Error::store),
                Err(elapsed) => Err(Error::store(elapsed)),
            },
            None => slide.await.map_err(Error::store),
        };

        let count = match count {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(limiter = %self.name, key = %key, error = %e, "rate limit store failure");
                return Err(e);
            }
        };

        let usage = Usage { count, limit: configuration.request_limit };

        if count > u64::from(configuration.request_limit) {
            tracing::debug!(limiter = %self.name, key = %key, count, limit = usage.limit, "rate limited");
            return Err(Error::LimitExceeded);
        }

        tracing::trace!(limiter = %self.name, key = %key, count, limit = usage.limit, "request admitted");
        Ok(Some(usage))
    }
}

/// Builder of [Limiter]. Store and extractor are required.
///
/// Store calls are abandoned after [DEFAULT_STORE_TIMEOUT] unless
/// another deadline is set with [Self::with_timeout].
#[must_use = "builder does nothing until you call build()"]
pub struct LimiterBuilder<T: SlidingWindowStore> {
    name: String,
    store: Option<T>,
    keys: KeyTemplate,
    configurations: ConfigurationSet,
    extractor: Option<ExtractFunc>,
    timeout: Option<Duration>,
}

impl<T: SlidingWindowStore> LimiterBuilder<T> {
    pub fn new<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string(),
            store: None,
            keys: KeyTemplate::default(),
            configurations: ConfigurationSet::default(),
            extractor: None,
            timeout: Some(DEFAULT_STORE_TIMEOUT),
        }
    }

    pub fn with_store(mut self, store: T) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_extractor(mut self, f: impl Fn(&HttpRequest) -> (String, u32) + Send + Sync + 'static) -> Self {
        self.extractor = Some(Box::new(f));
        self
    }

    pub fn with_configurations(mut self, configurations: ConfigurationSet) -> Self {
        self.configurations = configurations;
        self
    }

    pub fn with_key_prefix<P: ToString>(mut self, prefix: P) -> Self {
        self.keys = KeyTemplate::new(prefix);
        self
    }

    /// Abandon store calls taking longer than `timeout`,
    /// they are reported as [Error::Store].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for the store as long as it takes. Only dropping the
    /// request then abandons a hung store call.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn build(self) -> Result<Limiter<T>, ConstructionError> {
        if self.name.is_empty() {
            return Err(ConstructionError::EmptyName);
        }
        if self.name.contains(KEY_SEPARATOR) {
            return Err(ConstructionError::InvalidName(self.name));
        }
        if self.keys.prefix().contains(KEY_SEPARATOR) {
            return Err(ConstructionError::InvalidName(self.keys.prefix().to_string()));
        }

        let store = self.store
            .ok_or_else(|| ConstructionError::InvalidStore("no store given".to_string()))?;
        let extractor = self.extractor.ok_or(ConstructionError::MissingExtractor)?;
        self.configurations.validate()?;

        Ok(Limiter {
            name: self.name,
            store,
            keys: self.keys,
            configurations: self.configurations,
            extractor,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use actix_web::test::TestRequest;
    use futures_util::future::join_all;
    use crate::config::{CategoryConfiguration, LimitConfiguration};
    use crate::error::ConfigError;
    use crate::store::MemStore;
    use super::*;

    /// [MemStore] that counts its calls and fails on demand, without recording anything.
    #[derive(Default)]
    pub(crate) struct TestStore {
        pub mem: MemStore,
        pub calls: AtomicUsize,
        pub failing: AtomicBool,
        pub delay: Option<Duration>,
    }

    impl TestStore {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SlidingWindowStore for TestStore {
        type Error = io::Error;

        async fn slide(&self, key: &str, window: Duration) -> Result<u64, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
            }
            Ok(self.mem.slide(key, window).await.unwrap_or_default())
        }
    }

    /// `x-user` header is the identity, `x-category` header the category (default 1).
    pub(crate) fn header_extractor(req: &HttpRequest) -> (String, u32) {
        let header = |name: &str| req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let identity = header("x-user").unwrap_or_default();
        let category = header("x-category")
            .and_then(|c| c.parse().ok())
            .unwrap_or(1);

        (identity, category)
    }

    fn limiter(name: &str, configurations: ConfigurationSet) -> Limiter<TestStore> {
        limiter_with(name, configurations, TestStore::default())
    }

    fn limiter_with(name: &str, configurations: ConfigurationSet, store: TestStore) -> Limiter<TestStore> {
        Limiter::builder(name)
            .with_store(store)
            .with_extractor(header_extractor)
            .with_configurations(configurations)
            .build()
            .unwrap()
    }

    /// Key of `identity` in category 1 of the limiter named "api".
    fn key(identity: &str, route: Option<&str>) -> String {
        KeyTemplate::default().build_scoped_key(identity, "api", 1, route)
    }

    fn single(limit: u32, window: Duration) -> ConfigurationSet {
        ConfigurationSet::new().with_category(1, LimitConfiguration::new(limit, window))
    }

    #[tokio::test]
    async fn unlimited_category_skips_store() {
        let limiter = limiter("api", ConfigurationSet::new().with_category(1, LimitConfiguration::unlimited()));
        limiter.store().fail(true);

        for _ in 0..100 {
            assert_eq!(limiter.evaluate("user-42", 1, "/").await.unwrap(), None);
        }
        assert_eq!(limiter.store().calls(), 0);
    }

    #[tokio::test]
    async fn empty_identity_is_denied() {
        let limiter = limiter("api", single(10, Duration::from_secs(1)));

        for _ in 0..3 {
            assert!(limiter.evaluate("", 1, "/").await.unwrap_err().is_limit_exceeded());
        }
        assert_eq!(limiter.store().calls(), 0);
    }

    #[tokio::test]
    async fn unknown_category_is_denied() {
        let limiter = limiter("api", single(10, Duration::from_secs(1)));

        assert!(limiter.evaluate("user-42", 2, "/").await.unwrap_err().is_limit_exceeded());
        assert_eq!(limiter.store().calls(), 0);
    }

    #[tokio::test]
    async fn limit_then_deny() -> anyhow::Result<()> {
        let limiter = limiter("api", single(5, Duration::from_secs(60)));

        for i in 1..=5u64 {
            assert_eq!(limiter.evaluate("user-42", 1, "/").await?, Some(Usage { count: i, limit: 5 }));
        }
        assert!(limiter.evaluate("user-42", 1, "/").await.unwrap_err().is_limit_exceeded());
        assert!(limiter.evaluate("user-42", 1, "/").await.unwrap_err().is_limit_exceeded());

        // denied requests are still recorded
        assert_eq!(limiter.store().mem.len(&key("user-42", None)).await, 7);

        Ok(())
    }

    #[tokio::test]
    async fn window_expires() -> anyhow::Result<()> {
        let limiter = limiter("api", single(2, Duration::from_millis(200)));

        limiter.evaluate("user-42", 1, "/").await?;
        limiter.evaluate("user-42", 1, "/").await?;
        assert!(limiter.evaluate("user-42", 1, "/").await.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(limiter.evaluate("user-42", 1, "/").await?, Some(Usage { count: 1, limit: 2 }));

        Ok(())
    }

    #[tokio::test]
    async fn route_override() -> anyhow::Result<()> {
        let configurations = ConfigurationSet::new().with_category(
            1,
            CategoryConfiguration::new(LimitConfiguration::new(10, Duration::from_secs(1)))
                .with_route("/upload", LimitConfiguration::new(2, Duration::from_secs(1))),
        );
        let limiter = limiter("api", configurations);

        let verdicts = [
            Verdict::from(&limiter.evaluate("user-42", 1, "/upload").await),
            Verdict::from(&limiter.evaluate("user-42", 1, "/upload").await),
            Verdict::from(&limiter.evaluate("user-42", 1, "/upload").await),
        ];
        assert_eq!(verdicts, [Verdict::Allowed, Verdict::Allowed, Verdict::Denied]);

        // overridden routes have their own window
        for _ in 0..10 {
            assert!(limiter.evaluate("user-42", 1, "/download").await.is_ok());
        }
        assert!(limiter.evaluate("user-42", 1, "/download").await.is_err());
        assert_eq!(limiter.store().mem.len(&key("user-42", Some("/upload"))).await, 3);

        Ok(())
    }

    #[tokio::test]
    async fn store_failure_leaves_nothing() -> anyhow::Result<()> {
        let limiter = limiter("api", single(1, Duration::from_secs(60)));

        limiter.store().fail(true);
        for _ in 0..3 {
            let err = limiter.evaluate("user-42", 1, "/").await.unwrap_err();
            assert!(err.is_store_error());
        }

        limiter.store().fail(false);
        assert_eq!(limiter.evaluate("user-42", 1, "/").await?, Some(Usage { count: 1, limit: 1 }));
        assert_eq!(limiter.store().calls(), 4);

        Ok(())
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let store = TestStore { delay: Some(Duration::from_millis(500)), ..Default::default() };
        let limiter = Limiter::builder("api")
            .with_store(store)
            .with_extractor(header_extractor)
            .with_configurations(single(10, Duration::from_secs(1)))
            .with_timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let result = limiter.evaluate("user-42", 1, "/").await;
        assert_eq!(Verdict::from(&result), Verdict::StoreFailure);
        assert_eq!(limiter.store().mem.len(&key("user-42", None)).await, 0);
    }

    #[tokio::test]
    async fn identities_are_isolated() {
        let limiter = limiter("api", single(20, Duration::from_secs(60)));

        let checks = (0..40).map(|i| {
            let identity = if i % 2 == 0 { "alice" } else { "bob" };
            limiter.evaluate(identity, 1, "/")
        });

        for result in join_all(checks).await {
            assert!(result.is_ok());
        }
        assert_eq!(limiter.store().mem.len(&key("alice", None)).await, 20);
        assert_eq!(limiter.store().mem.len(&key("bob", None)).await, 20);
    }

    #[tokio::test]
    async fn limiters_sharing_a_store_are_isolated() -> anyhow::Result<()> {
        let mem = MemStore::default();
        let configurations = single(1, Duration::from_secs(60));
        let reads = limiter_with("reads", configurations.clone(), TestStore { mem: mem.clone(), ..Default::default() });
        let writes = limiter_with("writes", configurations, TestStore { mem, ..Default::default() });

        assert!(reads.evaluate("user-42", 1, "/").await.is_ok());
        assert!(writes.evaluate("user-42", 1, "/").await.is_ok());
        assert!(reads.evaluate("user-42", 1, "/").await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn categories_are_isolated() -> anyhow::Result<()> {
        let configurations = ConfigurationSet::new()
            .with_category(1, LimitConfiguration::new(100, Duration::from_secs(60)))
            .with_category(2, LimitConfiguration::new(1, Duration::from_secs(60)));
        let limiter = limiter("api", configurations);

        for _ in 0..5 {
            limiter.evaluate("user-42", 1, "/").await?;
        }
        assert_eq!(limiter.evaluate("user-42", 2, "/").await?, Some(Usage { count: 1, limit: 1 }));
        assert!(limiter.evaluate("user-42", 2, "/").await.unwrap_err().is_limit_exceeded());
        assert_eq!(limiter.evaluate("user-42", 1, "/").await?, Some(Usage { count: 6, limit: 100 }));

        Ok(())
    }

    #[tokio::test]
    async fn short_window_keeps_long_window_entries() -> anyhow::Result<()> {
        let configurations = ConfigurationSet::new()
            .with_category(1, LimitConfiguration::new(3, Duration::from_secs(60)))
            .with_category(2, LimitConfiguration::new(3, Duration::from_millis(50)));
        let limiter = limiter("api", configurations);

        for _ in 0..3 {
            limiter.evaluate("user-42", 1, "/").await?;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        limiter.evaluate("user-42", 2, "/").await?;

        assert!(limiter.evaluate("user-42", 1, "/").await.unwrap_err().is_limit_exceeded());
        assert_eq!(limiter.store().mem.len(&key("user-42", None)).await, 4);

        Ok(())
    }

    #[tokio::test]
    async fn names_and_identities_with_dashes_do_not_collide() -> anyhow::Result<()> {
        let mem = MemStore::default();
        let configurations = single(1, Duration::from_secs(60));
        let bc = limiter_with("b-c", configurations.clone(), TestStore { mem: mem.clone(), ..Default::default() });
        let c = limiter_with("c", configurations, TestStore { mem, ..Default::default() });

        assert!(bc.evaluate("a", 1, "/").await.is_ok());
        assert!(c.evaluate("a-b", 1, "/").await.is_ok());
        assert!(c.evaluate("a:b", 1, "/").await.is_ok());

        Ok(())
    }

    #[test]
    fn default_timeout_applies() {
        let limiter = limiter("api", single(3, Duration::from_secs(1)));
        assert_eq!(limiter.timeout, Some(DEFAULT_STORE_TIMEOUT));

        let limiter = Limiter::builder("api")
            .with_store(TestStore::default())
            .with_extractor(header_extractor)
            .without_timeout()
            .build()
            .unwrap();
        assert_eq!(limiter.timeout, None);
    }

    #[tokio::test]
    async fn upload_svc() {
        let limiter = limiter("upload-svc", single(3, Duration::from_millis(500)));
        let request = || TestRequest::get()
            .uri("/upload")
            .insert_header(("x-user", "user-42"))
            .to_http_request();

        let mut verdicts = vec![];
        for _ in 0..4 {
            verdicts.push(limiter.verdict(&request()).await);
        }
        assert_eq!(verdicts, vec![Verdict::Allowed, Verdict::Allowed, Verdict::Allowed, Verdict::Denied]);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(limiter.check_limit(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn check_limit_without_identity() {
        let limiter = limiter("api", single(3, Duration::from_secs(1)));
        let req = TestRequest::get().uri("/").to_http_request();

        assert!(limiter.check_limit(&req).await.unwrap_err().is_limit_exceeded());
        assert_eq!(limiter.store().calls(), 0);
    }

    #[test]
    fn invalid_construction() {
        let err = Limiter::<TestStore>::builder("api")
            .with_extractor(header_extractor)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::InvalidStore(_)));

        let err = Limiter::builder("api")
            .with_store(TestStore::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::MissingExtractor));

        let err = Limiter::builder("")
            .with_store(TestStore::default())
            .with_extractor(header_extractor)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::EmptyName));

        let err = Limiter::builder("upload:svc")
            .with_store(TestStore::default())
            .with_extractor(header_extractor)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::InvalidName(name) if name == "upload:svc"));

        let err = Limiter::builder("api")
            .with_store(TestStore::default())
            .with_extractor(header_extractor)
            .with_key_prefix("edge:v1")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::InvalidName(_)));

        let err = Limiter::builder("api")
            .with_store(TestStore::default())
            .with_extractor(header_extractor)
            .with_configurations(single(3, Duration::ZERO))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::InvalidConfiguration(ConfigError::ZeroWindow { .. })));
    }
}
