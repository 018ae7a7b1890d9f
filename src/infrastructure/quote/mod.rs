// src/infrastructure/quote/mod.rs
// Quote source implementations

pub mod synthetic;

use async_trait::async_trait;
use chrono::Utc;
use hyper::client::HttpConnector;
use hyper::{Body, Client, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::application::dto::parser::parse_quote_body;
use crate::domain::errors::{QuoteError, QuoteResult};
use crate::domain::model::{Quote, QuoteOrigin, Symbol};
use crate::domain::repository::QuoteSource;

pub use synthetic::SyntheticPriceGenerator;

/// HTTP quote endpoint (`GLOBAL_QUOTE` style API)
pub struct HttpQuoteSource {
    client: Client<HttpsConnector<HttpConnector>>,
    endpoint: String,
    api_key: String,
}

impl HttpQuoteSource {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());

        Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn quote_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.endpoint,
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult<Quote> {
        let uri: Uri = self
            .quote_url(symbol)
            .parse()
            .map_err(|e| QuoteError::Request(format!("Invalid quote URL: {}", e)))?;

        let response = self.client.get(uri).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(QuoteError::Http(status.as_u16()));
        }

        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        let body = std::str::from_utf8(&bytes).map_err(|e| QuoteError::Parse(e.to_string()))?;
        let price = parse_quote_body(body)?;

        Ok(Quote {
            symbol: symbol.clone(),
            price,
            origin: QuoteOrigin::Live,
            fetched_at: Utc::now(),
        })
    }
}

/// Counts of live vs synthetic quotes served
#[derive(Debug, Default)]
pub struct FetchStats {
    live: AtomicU64,
    synthetic: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub live: u64,
    pub synthetic: u64,
}

impl FetchStats {
    pub fn counts(&self) -> FetchCounts {
        FetchCounts {
            live: self.live.load(Ordering::Relaxed),
            synthetic: self.synthetic.load(Ordering::Relaxed),
        }
    }

    fn record(&self, origin: QuoteOrigin) {
        let counter = match origin {
            QuoteOrigin::Live => &self.live,
            QuoteOrigin::Synthetic => &self.synthetic,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Wraps a primary source with a per-fetch timeout and degrades to the
/// synthetic walk on any failure, so `fetch` never returns an error.
pub struct FallbackQuoteSource {
    primary: Arc<dyn QuoteSource>,
    generator: Mutex<SyntheticPriceGenerator>,
    timeout: Duration,
    stats: Arc<FetchStats>,
}

impl FallbackQuoteSource {
    pub fn new(
        primary: Arc<dyn QuoteSource>,
        generator: SyntheticPriceGenerator,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            generator: Mutex::new(generator),
            timeout,
            stats: Arc::new(FetchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<FetchStats> {
        self.stats.clone()
    }

    fn synthetic_quote(&self, symbol: &Symbol) -> Quote {
        let price = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_price(symbol);

        self.stats.record(QuoteOrigin::Synthetic);
        Quote {
            symbol: symbol.clone(),
            price,
            origin: QuoteOrigin::Synthetic,
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl QuoteSource for FallbackQuoteSource {
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult<Quote> {
        let error = match tokio::time::timeout(self.timeout, self.primary.fetch(symbol)).await {
            Ok(Ok(quote)) if quote.price.is_finite() && quote.price >= 0.0 => {
                self.stats.record(QuoteOrigin::Live);
                log::debug!("Live quote for {}: {:.4}", symbol, quote.price);
                return Ok(quote);
            }
            Ok(Ok(quote)) => QuoteError::InvalidPrice(quote.price),
            Ok(Err(e)) => e,
            Err(_) => QuoteError::Timeout(self.timeout.as_millis()),
        };

        let quote = self.synthetic_quote(symbol);
        log::warn!(
            "Live quote for {} unavailable ({}), using synthetic {:.4}",
            symbol,
            error,
            quote.price
        );
        Ok(quote)
    }
}
