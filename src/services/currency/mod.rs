// Currency conversion through the Frankfurter rates API

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::CurrencyError;
use crate::middleware::CircuitBreaker;
use crate::utils::{Metrics, Upstream};

/// Currency conversion backend
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` of `from` into `to`
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, CurrencyError>;
}

pub struct FrankfurterClient {
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct LatestReply {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    message: String,
}

impl FrankfurterClient {
    pub fn new(
        config: &Config,
        circuit_breaker: CircuitBreaker,
        metrics: Option<Metrics>,
    ) -> Result<Self, CurrencyError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            base_url: config.upstream.frankfurter_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker,
            metrics,
        })
    }

    async fn fetch(&self, from: &str, to: &str, amount: f64) -> Result<f64, CurrencyError> {
        let amount_s = amount.to_string();
        let response = self
            .http_client
            .get(format!("{}/latest", self.base_url))
            .query(&[("amount", amount_s.as_str()), ("from", from), ("to", to)])
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorReply>(&raw)
                .map(|e| e.message)
                .unwrap_or(raw);
            return Err(CurrencyError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        read_rate(&raw, to)
    }
}

/// Pull `rates[to]` out of a `/latest` response body
fn read_rate(raw: &str, to: &str) -> Result<f64, CurrencyError> {
    let reply: LatestReply =
        serde_json::from_str(raw).map_err(|_| CurrencyError::ConversionFailed { to: to.to_string() })?;

    reply
        .rates
        .get(to)
        .copied()
        .ok_or_else(|| CurrencyError::ConversionFailed { to: to.to_string() })
}

#[async_trait]
impl CurrencyConverter for FrankfurterClient {
    #[instrument(skip(self))]
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, CurrencyError> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from.is_empty() || to.is_empty() || amount == 0.0 || !amount.is_finite() {
            return Err(CurrencyError::MissingFields);
        }

        // The API refuses identical currencies
        if from == to {
            return Ok(amount);
        }

        let start = Instant::now();
        let result = self
            .circuit_breaker
            .run(self.fetch(&from, &to, amount))
            .await;

        if let Some(ref m) = self.metrics {
            m.record_upstream_call(Upstream::Currency, result.is_ok(), start.elapsed());
        }
        match &result {
            Ok(value) => debug!("{} {} = {} {}", amount, from, value, to),
            Err(e) => warn!("Currency conversion failed: {}", e),
        }
        result
    }
}
