//! Venue quoting and swap-instruction gateway

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use crate::errors::{BotError, BotResult};
use crate::execution::SwapInstructions;
use crate::network::{RetryConfig, VenueRateLimiter, retry_with_backoff, with_timeout};
use crate::types::{HopLeg, PriceQuote, TokenPair, Venue};

/// One hop worth of swap parameters sent to a venue's instruction API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub venue: Venue,
    pub pair: TokenPair,
    pub input_token: String,
    pub output_token: String,
    /// Amount of `input_token` to spend.
    pub amount: Decimal,
    pub slippage_bps: u32,
    pub user_public_key: String,
}

impl SwapRequest {
    pub fn for_hop(hop: &HopLeg, amount: Decimal, slippage_bps: u32, user: &str) -> Self {
        Self {
            venue: hop.venue,
            pair: hop.pair.clone(),
            input_token: hop.from_token.clone(),
            output_token: hop.to_token.clone(),
            amount,
            slippage_bps,
            user_public_key: user.to_string(),
        }
    }
}

/// Capability interface shared by every venue. Fees are a property of the
/// closed [`Venue`] set, so only I/O lives here.
#[async_trait]
pub trait VenueGateway: Send + Sync {
    async fn fetch_quote(&self, venue: Venue, pair: &TokenPair) -> BotResult<PriceQuote>;
    async fn build_swap_instructions(&self, request: &SwapRequest) -> BotResult<SwapInstructions>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    bid: Decimal,
    ask: Decimal,
    #[serde(default)]
    mid: Option<Decimal>,
    #[serde(default)]
    liquidity: Option<Decimal>,
    #[serde(default, rename = "volume24h")]
    volume_24h: Option<Decimal>,
    #[serde(default)]
    timestamp_ms: Option<i64>,
}

pub struct HttpVenueGateway {
    client: reqwest::Client,
    base_url: String,
    limits: VenueRateLimiter,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpVenueGateway {
    pub fn new(base_url: &str, calls_per_sec: u32, timeout: Duration, retry: RetryConfig) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::network("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limits: VenueRateLimiter::new(&Venue::ALL, calls_per_sec),
            timeout,
            retry,
        })
    }

    async fn quote_once(&self, venue: Venue, pair: &TokenPair) -> BotResult<PriceQuote> {
        self.limits.wait(venue).await;
        let url = format!("{}/{}/quote", self.base_url, venue.api_segment());
        let context = format!("{} {} quote", venue, pair);

        let body: QuoteResponse = with_timeout(self.timeout, &context, async {
            let response = self
                .client
                .get(&url)
                .query(&[("base", pair.base()), ("quote", pair.quote())])
                .send()
                .await
                .map_err(|e| BotError::network(format!("{} request failed", context), e))?;
            let response = check_status(response, &context).await?;
            response.json::<QuoteResponse>().await.map_err(|e| BotError::DataParsing {
                context: context.clone(),
                source: e.into(),
            })
        })
        .await?;

        let observed_at = body
            .timestamp_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        let mut quote = PriceQuote::new(venue, pair.clone(), body.bid, body.ask, observed_at);
        if let Some(mid) = body.mid {
            quote.mid = mid;
        }
        quote.liquidity = body.liquidity;
        quote.volume_24h = body.volume_24h;

        if !quote.is_well_formed() {
            return Err(BotError::DataParsing {
                context,
                source: anyhow::anyhow!("crossed or non-positive book: bid {} ask {}", quote.bid, quote.ask),
            });
        }
        Ok(quote)
    }

    async fn instructions_once(&self, request: &SwapRequest) -> BotResult<SwapInstructions> {
        self.limits.wait(request.venue).await;
        let url = format!("{}/{}/swap-instructions", self.base_url, request.venue.api_segment());
        let context = format!("{} {} swap instructions", request.venue, request.pair);

        let instructions: SwapInstructions = with_timeout(self.timeout, &context, async {
            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| BotError::network(format!("{} request failed", context), e))?;
            let response = check_status(response, &context).await?;
            response.json::<SwapInstructions>().await.map_err(|e| BotError::MalformedInstruction {
                context: context.clone(),
                source: Some(e.into()),
            })
        })
        .await?;

        instructions.validate()?;
        Ok(instructions)
    }
}

async fn check_status(response: reqwest::Response, context: &str) -> BotResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("⚠️ {} returned error status {}: {}", context, status, body);
    match status.as_u16() {
        429 => Err(BotError::RateLimited { service: context.to_string() }),
        code if code >= 500 => Err(BotError::RpcUnavailable {
            message: format!("{} returned {}", context, status),
        }),
        _ => Err(BotError::DataParsing {
            context: format!("{} returned {}", context, status),
            source: anyhow::anyhow!(body),
        }),
    }
}

#[async_trait]
impl VenueGateway for HttpVenueGateway {
    async fn fetch_quote(&self, venue: Venue, pair: &TokenPair) -> BotResult<PriceQuote> {
        retry_with_backoff(|| self.quote_once(venue, pair), &self.retry, "venue quote").await
    }

    async fn build_swap_instructions(&self, request: &SwapRequest) -> BotResult<SwapInstructions> {
        retry_with_backoff(|| self.instructions_once(request), &self.retry, "swap instructions").await
    }
}

/// Fetches every (venue, pair) quote concurrently. Failures are returned
/// alongside successes; a missing quote simply leaves a gap for this tick.
pub async fn poll_quotes(
    gateway: &Arc<dyn VenueGateway>,
    venues: &[Venue],
    pairs: &[TokenPair],
) -> Vec<BotResult<PriceQuote>> {
    let mut tasks = JoinSet::new();
    for &venue in venues {
        for pair in pairs {
            let gateway = gateway.clone();
            let pair = pair.clone();
            tasks.spawn(async move { gateway.fetch_quote(venue, &pair).await });
        }
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => debug!("Quote task aborted: {}", e),
        }
    }
    results
}
