//! Data provider registry resolving canonical requests with fallback.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument, warn};

use feed_core::{
    CompanyInfo, DataError, DataFrequency, DataProvider, FailureRecord, FinancialStatement,
    Industry, IndustryMember, OhlcvBar, Operation, Quote, Record, RecordCache, RecordPolicy,
    Request, Result, Retrier, RetryPolicy, Symbol, SymbolNormalizer, bars_to_dataframe,
    is_empty_record,
};

use crate::config::FeedConfig;
use crate::priority::ProviderPriority;

/// Default timeout of one provider attempt.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of single quotes resolved concurrently when a batch falls back.
pub const DEFAULT_BATCH_WINDOW: usize = 10;

/// Registry of providers that resolves requests with automatic fallback.
///
/// [`resolve`](Self::resolve) checks the cache, then walks the provider chain
/// for the request's operation. Each provider call runs under the retry policy
/// (with the provider's session manager, if it has one) and a per-attempt
/// timeout. The first acceptable record is cached and returned; when every
/// provider fails the caller gets
/// [`DataError::AllProvidersExhausted`] listing each failure.
///
/// # Example
///
/// ```rust,ignore
/// use feed::{DataProviderRegistry, Symbol};
///
/// let registry = DataProviderRegistry::new()
///     .with_eastmoney()
///     .with_sina();
///
/// let quote = registry.quote(&Symbol::parse("600000.SH")?).await?;
/// println!("{} {}", quote.symbol, quote.price);
/// ```
pub struct DataProviderRegistry {
    providers: Vec<Arc<dyn DataProvider>>,
    cache: Option<Arc<dyn RecordCache>>,
    priority: ProviderPriority,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
    record_policy: RecordPolicy,
    batch_window: usize,
    normalizer: SymbolNormalizer,
}

impl Default for DataProviderRegistry {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            cache: None,
            priority: ProviderPriority::new(),
            retry_policy: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            record_policy: RecordPolicy::default(),
            batch_window: DEFAULT_BATCH_WINDOW,
            normalizer: SymbolNormalizer::new(),
        }
    }
}

impl std::fmt::Debug for DataProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProviderRegistry")
            .field("providers", &self.provider_names())
            .field("cache", &self.cache.as_ref().map(|_| "configured"))
            .field("priority", &self.priority)
            .field("retry_policy", &self.retry_policy)
            .field("call_timeout", &self.call_timeout)
            .field("record_policy", &self.record_policy)
            .field("batch_window", &self.batch_window)
            .finish()
    }
}

impl DataProviderRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry with a cache.
    #[must_use]
    pub fn with_cache(cache: Arc<dyn RecordCache>) -> Self {
        Self {
            cache: Some(cache),
            ..Default::default()
        }
    }

    /// Set the cache for this registry.
    #[must_use]
    pub fn set_cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the per-operation provider order.
    #[must_use]
    pub fn with_priority(mut self, priority: ProviderPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the provider order for one operation.
    #[must_use]
    pub fn with_operation_priority(mut self, operation: Operation, providers: &[&str]) -> Self {
        self.priority.set(operation, providers);
        self
    }

    /// Sets the retry policy applied to every provider call.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the timeout of one provider attempt.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets whether partially populated records are accepted.
    #[must_use]
    pub const fn with_record_policy(mut self, policy: RecordPolicy) -> Self {
        self.record_policy = policy;
        self
    }

    /// Sets how many single quotes run concurrently when a batch falls back.
    #[must_use]
    pub const fn with_batch_window(mut self, window: usize) -> Self {
        self.batch_window = if window == 0 { 1 } else { window };
        self
    }

    /// Register a provider.
    ///
    /// Registering a second provider under the same name replaces the first.
    pub fn register(&mut self, provider: Arc<dyn DataProvider>) {
        debug!(
            provider = provider.name(),
            capabilities = ?provider.capabilities(),
            "Registering provider"
        );
        self.normalizer
            .register(provider.name(), provider.symbol_scheme());
        self.providers.retain(|p| p.name() != provider.name());
        self.providers.push(provider);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Names of the registered providers, in registration order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Symbol dialects of the registered providers.
    #[must_use]
    pub const fn normalizer(&self) -> &SymbolNormalizer {
        &self.normalizer
    }

    fn provider(&self, name: &str) -> Option<&Arc<dyn DataProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Providers to try for `operation`, in order.
    fn chain(
        &self,
        operation: Operation,
        explicit: Option<&[&str]>,
    ) -> Vec<&Arc<dyn DataProvider>> {
        if let Some(order) = explicit {
            return order
                .iter()
                .filter_map(|name| {
                    let provider = self.provider(name);
                    if provider.is_none() {
                        warn!(provider = %name, "Unknown provider in requested order, skipping");
                    }
                    provider
                })
                .collect();
        }
        match self.priority.order(operation) {
            Some(order) => order
                .iter()
                .filter_map(|name| {
                    let provider = self.provider(name);
                    if provider.is_none() {
                        debug!(provider = %name, %operation, "Prioritised provider not registered");
                    }
                    provider
                })
                .collect(),
            None => self.providers.iter().collect(),
        }
    }

    /// Resolve a request, trying providers in order until one answers.
    ///
    /// `provider_order` overrides the configured priority for this call.
    /// Providers that cannot serve the request are skipped without counting
    /// as failures. If none could serve it the result is
    /// [`DataError::UnsupportedOperation`]; if all that tried failed it is
    /// [`DataError::AllProvidersExhausted`].
    #[instrument(skip(self, request, provider_order), fields(operation = %request.operation()))]
    pub async fn resolve(
        &self,
        request: &Request,
        provider_order: Option<&[&str]>,
    ) -> Result<Record> {
        request.validate()?;
        let operation = request.operation();
        let key = request.cache_key();

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(record)) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(record);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Cache read failed"),
            }
        }

        let mut failures = Vec::new();
        for provider in self.chain(operation, provider_order) {
            if !provider.supports_request(request) {
                debug!(provider = provider.name(), "Provider cannot serve request, skipping");
                continue;
            }

            debug!(provider = provider.name(), "Querying provider");
            match self.attempt(&**provider, request).await {
                Ok(record) => {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.put(key, record.clone()).await {
                            warn!(
                                provider = provider.name(),
                                error = %e,
                                "Failed to cache record"
                            );
                        }
                    }
                    return Ok(record);
                }
                Err(reason) => {
                    warn!(
                        provider = provider.name(),
                        reason = %reason,
                        "Provider failed, trying next"
                    );
                    failures.push(FailureRecord::new(provider.name(), reason));
                }
            }
        }

        if failures.is_empty() {
            return Err(DataError::UnsupportedOperation(operation));
        }
        Err(DataError::AllProvidersExhausted {
            operation,
            failures,
        })
    }

    /// One provider's full turn: retries, timeouts and record checks.
    ///
    /// Returns the failure reason on error.
    async fn attempt(
        &self,
        provider: &dyn DataProvider,
        request: &Request,
    ) -> std::result::Result<Record, String> {
        let name = provider.name();
        let timeout = self.call_timeout;
        let outcome = Retrier::new(&self.retry_policy)
            .with_session(provider.session())
            .for_provider(name)
            .run(move || async move {
                match tokio::time::timeout(timeout, provider.execute(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(DataError::Timeout {
                        provider: name.to_string(),
                        after: timeout,
                    }),
                }
            })
            .await;

        let record = match outcome {
            Ok(Some(record)) => record,
            Ok(None) => return Err("no data".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        if record.operation() != request.operation() {
            return Err(format!(
                "answered {} to a {} request",
                record.operation(),
                request.operation()
            ));
        }
        if is_empty_record(&record) {
            return Err("empty result".to_string());
        }
        if !self.record_policy.accepts(&record) {
            return Err("partial record rejected".to_string());
        }
        Ok(record)
    }

    /// Realtime quote for one symbol.
    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote> {
        let request = Request::Quote {
            symbol: symbol.clone(),
        };
        self.resolve(&request, None)
            .await?
            .into_quote()
            .ok_or_else(|| unexpected(Operation::Quote))
    }

    /// Realtime quotes for several symbols.
    ///
    /// Tries a native batch provider first. If that fails, each symbol is
    /// resolved as a single quote, `batch_window` at a time. Symbols that
    /// cannot be resolved are left out; the call fails only when none can.
    pub async fn batch_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        let request = Request::BatchQuote {
            symbols: symbols.to_vec(),
        };
        request.validate()?;

        let mut failures = match self.resolve(&request, None).await {
            Ok(record) => {
                return record
                    .into_quotes()
                    .ok_or_else(|| unexpected(Operation::BatchQuote));
            }
            Err(DataError::AllProvidersExhausted { failures, .. }) => failures,
            Err(DataError::UnsupportedOperation(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        debug!(
            symbol_count = symbols.len(),
            window = self.batch_window,
            "Batch quote unavailable, falling back to single quotes"
        );

        let unique: Vec<&Symbol> = symbols.iter().collect::<BTreeSet<_>>().into_iter().collect();
        let mut quotes = Vec::with_capacity(unique.len());
        let mut any_supported = false;
        for window in unique.chunks(self.batch_window) {
            let results = join_all(window.iter().map(|symbol| self.quote(symbol))).await;
            for (symbol, result) in window.iter().zip(results) {
                match result {
                    Ok(quote) => {
                        any_supported = true;
                        quotes.push(quote);
                    }
                    Err(DataError::AllProvidersExhausted {
                        failures: symbol_failures,
                        ..
                    }) => {
                        any_supported = true;
                        failures.extend(symbol_failures.into_iter().map(|f| {
                            FailureRecord::new(f.provider, format!("{symbol}: {}", f.reason))
                        }));
                    }
                    Err(DataError::UnsupportedOperation(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if !quotes.is_empty() {
            return Ok(quotes);
        }
        if !any_supported && failures.is_empty() {
            return Err(DataError::UnsupportedOperation(Operation::BatchQuote));
        }
        Err(DataError::AllProvidersExhausted {
            operation: Operation::BatchQuote,
            failures,
        })
    }

    /// Historical OHLCV bars, oldest first.
    pub async fn historical_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<Vec<OhlcvBar>> {
        let request = Request::HistoricalBars {
            symbol: symbol.clone(),
            start,
            end,
            frequency,
        };
        self.resolve(&request, None)
            .await?
            .into_bars()
            .ok_or_else(|| unexpected(Operation::HistoricalBars))
    }

    /// Historical OHLCV bars as a polars `DataFrame`.
    pub async fn historical_frame(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<DataFrame> {
        let bars = self.historical_bars(symbol, start, end, frequency).await?;
        bars_to_dataframe(symbol, &bars)
    }

    /// Industry classification list.
    pub async fn industry_list(&self) -> Result<Vec<Industry>> {
        self.resolve(&Request::IndustryList, None)
            .await?
            .into_industries()
            .ok_or_else(|| unexpected(Operation::IndustryList))
    }

    /// Constituents of one industry.
    pub async fn industry_stocks(&self, industry: &str) -> Result<Vec<IndustryMember>> {
        let request = Request::IndustryStocks {
            industry: industry.to_string(),
        };
        self.resolve(&request, None)
            .await?
            .into_constituents()
            .ok_or_else(|| unexpected(Operation::IndustryStocks))
    }

    /// Company reference information.
    pub async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo> {
        let request = Request::CompanyInfo {
            symbol: symbol.clone(),
        };
        self.resolve(&request, None)
            .await?
            .into_company()
            .ok_or_else(|| unexpected(Operation::CompanyInfo))
    }

    /// Financial statement for one fiscal quarter.
    pub async fn financials(
        &self,
        symbol: &Symbol,
        year: i32,
        quarter: u8,
    ) -> Result<FinancialStatement> {
        let request = Request::Financials {
            symbol: symbol.clone(),
            year,
            quarter,
        };
        self.resolve(&request, None)
            .await?
            .into_financials()
            .ok_or_else(|| unexpected(Operation::Financials))
    }

    /// PE, PB and market capitalisation per industry.
    pub async fn industry_valuations(&self) -> Result<Vec<Industry>> {
        self.resolve(&Request::IndustryValuations, None)
            .await?
            .into_valuations()
            .ok_or_else(|| unexpected(Operation::IndustryValuations))
    }

    /// Shanghai Composite, Shenzhen Component and ChiNext snapshots.
    pub async fn market_indices(&self) -> Result<Vec<Quote>> {
        self.resolve(&Request::MarketIndex, None)
            .await?
            .into_indices()
            .ok_or_else(|| unexpected(Operation::MarketIndex))
    }

        /// Drops expired cache entries and returns how many were removed.
    pub async fn sweep_cache(&self) -> Result<usize> {
        match &self.cache {
            Some(cache) => cache.invalidate_stale().await,
            None => Ok(0),
        }
    }

    /// Shuts every provider down, ending login sessions.
    ///
    /// All providers are visited even if one fails; the first error is returned.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_error = None;
        for provider in &self.providers {
            if let Err(e) = provider.shutdown().await {
                warn!(provider = provider.name(), error = %e, "Provider shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // Builder methods for easy setup with specific providers

    /// Build a registry from configuration.
    ///
    /// Registers every provider enabled by cargo features. Tushare is only
    /// registered when a token is configured.
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new()
            .set_cache(Arc::new(config.build_cache()))
            .with_priority(config.priorities.clone())
            .with_retry_policy(config.retry_policy())
            .with_call_timeout(config.call_timeout())
            .with_record_policy(config.record_policy)
            .with_batch_window(config.batch_window);

        #[cfg(feature = "tushare")]
        match &config.tushare_token {
            Some(token) => {
                let mut provider = feed_tushare::TushareProvider::new(token.as_str());
                if let Some(url) = &config.tushare_base_url {
                    provider = provider.with_base_url(url.as_str());
                }
                registry.register(Arc::new(provider));
            }
            None => info!("No Tushare token configured, Tushare disabled"),
        }

        #[cfg(feature = "eastmoney")]
        registry.register(Arc::new(feed_eastmoney::EastMoneyProvider::new()));

        #[cfg(feature = "sina")]
        registry.register(Arc::new(feed_sina::SinaProvider::new()));

        #[cfg(feature = "baostock")]
        {
            let mut provider = feed_baostock::BaostockProvider::new(
                config
                    .baostock_base_url
                    .as_deref()
                    .unwrap_or(feed_baostock::BAOSTOCK_BASE_URL),
                config
                    .baostock_user
                    .as_deref()
                    .unwrap_or(feed_baostock::ANONYMOUS_USER),
                config
                    .baostock_password
                    .as_deref()
                    .unwrap_or(feed_baostock::ANONYMOUS_PASSWORD),
            );
            if let Some(max_age) = config.baostock_session_max_age() {
                provider = provider.with_session_max_age(max_age);
            }
            registry.register(Arc::new(provider));
        }

        info!(providers = ?registry.provider_names(), "Registry configured");
        registry
    }

    /// Add the Tushare Pro provider.
    #[cfg(feature = "tushare")]
    #[must_use]
    pub fn with_tushare(self, token: &str) -> Self {
        self.with_provider(Arc::new(feed_tushare::TushareProvider::new(token)))
    }

    /// Add the East Money provider.
    #[cfg(feature = "eastmoney")]
    #[must_use]
    pub fn with_eastmoney(self) -> Self {
        self.with_provider(Arc::new(feed_eastmoney::EastMoneyProvider::new()))
    }

    /// Add the Sina Finance provider.
    #[cfg(feature = "sina")]
    #[must_use]
    pub fn with_sina(self) -> Self {
        self.with_provider(Arc::new(feed_sina::SinaProvider::new()))
    }

    /// Add the BaoStock provider with the anonymous account.
    #[cfg(feature = "baostock")]
    #[must_use]
    pub fn with_baostock(self) -> Self {
        self.with_provider(Arc::new(feed_baostock::BaostockProvider::anonymous()))
    }
}

fn unexpected(operation: Operation) -> DataError {
    DataError::Other(format!("resolved record does not answer {operation}"))
}
