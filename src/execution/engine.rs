//! Trade execution engine

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use crate::config::{Config, FlashLoanPolicy, MAX_COMPUTE_UNITS};
use crate::errors::{BotError, BotResult};
use crate::events::{BotEvent, EventBus};
use crate::network::{BundleRelay, RetryConfig, TransactionRpc, classify_onchain_failure, retry_counted, retry_with_backoff};
use crate::risk::ApprovedTrade;
use crate::types::{ExecutionPath, TradeOutcome, TradeResult};
use crate::venues::{SwapRequest, VenueGateway};
use super::{
    ConfirmationStatus, HopInstructions, SignedTransaction, SimulationReport, TransactionBuilder, TransactionSigner,
    merge_lookup_table_addresses, simulated_outcome, expected_profit,
};

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub dry_run: bool,
    pub flash_loan_policy: FlashLoanPolicy,
    /// Quote-token inventory available to the standard path.
    pub inventory: Decimal,
    pub use_private_relay: bool,
    pub relay_tip_lamports: u64,
    pub slippage_bps: u32,
    pub retry: RetryConfig,
    pub confirmation_timeout: Duration,
    pub confirmation_poll: Duration,
    /// Network cost, in percent of size, lost when a submitted trade fails.
    pub network_fee_pct: Decimal,
}

impl ExecutionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.dry_run,
            flash_loan_policy: config.flash_loan_policy,
            inventory: config.inventory_usd,
            use_private_relay: config.use_private_relay,
            relay_tip_lamports: config.relay_tip_lamports,
            slippage_bps: config.slippage_tolerance_bps,
            retry: RetryConfig::new(config.max_retry_attempts, config.retry_base_delay_ms),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            confirmation_poll: Duration::from_millis(400),
            network_fee_pct: config.network_fee_pct,
        }
    }

    /// Paths to try, in order. Only `FirstWithFallback` yields two.
    pub fn candidate_paths(&self, size: Decimal) -> Vec<ExecutionPath> {
        match self.flash_loan_policy {
            FlashLoanPolicy::Never => vec![ExecutionPath::Standard],
            FlashLoanPolicy::Always => vec![ExecutionPath::FlashLoan],
            FlashLoanPolicy::WhenExceedsInventory if size > self.inventory => vec![ExecutionPath::FlashLoan],
            FlashLoanPolicy::WhenExceedsInventory => vec![ExecutionPath::Standard],
            FlashLoanPolicy::FirstWithFallback => vec![ExecutionPath::FlashLoan, ExecutionPath::Standard],
        }
    }
}

/// A transaction that passed simulation and is ready to submit.
struct PreparedTrade {
    signed: SignedTransaction,
    simulation: SimulationReport,
}

pub struct ExecutionEngine {
    gateway: Arc<dyn VenueGateway>,
    rpc: Arc<dyn TransactionRpc>,
    relay: Option<Arc<dyn BundleRelay>>,
    builder: TransactionBuilder,
    signer: TransactionSigner,
    config: ExecutionConfig,
    events: EventBus,
}

impl ExecutionEngine {
    pub fn new(
        gateway: Arc<dyn VenueGateway>,
        rpc: Arc<dyn TransactionRpc>,
        relay: Option<Arc<dyn BundleRelay>>,
        builder: TransactionBuilder,
        signer: TransactionSigner,
        config: ExecutionConfig,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            rpc,
            relay,
            builder,
            signer,
            config,
            events,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Runs one approved trade to a final outcome. Never returns an error:
    /// every failure becomes a `Failed` result with its classified kind.
    pub async fn execute(&self, trade: &ApprovedTrade) -> TradeResult {
        let opportunity = trade.opportunity();
        info!(
            id = %opportunity.id,
            route = %opportunity.route_description(),
            size = %trade.size(),
            dry_run = self.config.dry_run,
            "🚀 Executing trade"
        );

        let paths = self.config.candidate_paths(trade.size());
        let mut last_error = None;

        for (index, path) in paths.iter().copied().enumerate() {
            match self.prepare(trade, path).await {
                Ok(prepared) => return self.finish(trade, path, prepared).await,
                Err(e) => {
                    if index + 1 < paths.len() {
                        warn!(id = %opportunity.id, path = %path, error = %e, "Path failed before submission, falling back");
                    }
                    last_error = Some((path, e));
                }
            }
        }

        match last_error {
            Some((path, e)) => self.failed(trade, Some(path), e, Decimal::ZERO, None, 0),
            None => self.failed(trade, None, BotError::malformed("no execution path configured"), Decimal::ZERO, None, 0),
        }
    }

    /// Everything up to submission: instructions, assembly, signing and
    /// simulation. Shared verbatim by live and dry runs.
    async fn prepare(&self, trade: &ApprovedTrade, path: ExecutionPath) -> BotResult<PreparedTrade> {
        let hops = self.fetch_hop_instructions(trade).await?;

        let table_addresses = merge_lookup_table_addresses(&hops);
        let lookup_tables = if table_addresses.is_empty() {
            Vec::new()
        } else {
            retry_with_backoff(
                || self.rpc.resolve_lookup_tables(&table_addresses),
                &self.config.retry,
                "lookup tables",
            )
            .await?
        };

        let blockhash = retry_with_backoff(|| self.rpc.latest_blockhash(), &self.config.retry, "blockhash").await?;
        let tip = self.relay_enabled().then_some(self.config.relay_tip_lamports);

        let assembled = self.builder.assemble(&hops, path, trade.size(), tip, blockhash, lookup_tables)?;
        let signed = self.signer.sign(&assembled)?;

        let simulation = retry_with_backoff(|| self.rpc.simulate(&signed), &self.config.retry, "simulation").await?;
        check_simulation(&simulation)?;

        Ok(PreparedTrade { signed, simulation })
    }

    /// Requests swap instructions hop by hop, carrying each hop's expected
    /// output forward as the next hop's input.
    async fn fetch_hop_instructions(&self, trade: &ApprovedTrade) -> BotResult<Vec<HopInstructions>> {
        let payer = self.builder.payer().to_string();
        let mut amount = trade.size();
        let mut hops = Vec::with_capacity(trade.opportunity().hops.len());

        for hop in &trade.opportunity().hops {
            let request = SwapRequest::for_hop(hop, amount, self.config.slippage_bps, &payer);
            hops.push(self.gateway.build_swap_instructions(&request).await?.to_native()?);
            amount *= hop.effective_rate();
        }
        Ok(hops)
    }

    async fn finish(&self, trade: &ApprovedTrade, path: ExecutionPath, prepared: PreparedTrade) -> TradeResult {
        let opportunity = trade.opportunity();

        if self.config.dry_run {
            let (outcome, pnl) = simulated_outcome(
                trade.size(),
                opportunity.net_profit_pct,
                path,
                prepared.simulation.units_consumed,
            );
            return self.result(trade, Some(path), outcome, pnl, None, 0);
        }

        let via_relay = self.relay_enabled();
        let submitted = match (&self.relay, via_relay) {
            // Bundle-only: the relay path never also broadcasts publicly.
            (Some(relay), true) => {
                let attempted = retry_counted(
                    || relay.send_bundle(slice::from_ref(&prepared.signed)),
                    &self.config.retry,
                    "bundle submission",
                )
                .await;
                (attempted.result.map(|_| prepared.signed.signature.to_string()), attempted.attempts)
            }
            _ => {
                let attempted =
                    retry_counted(|| self.rpc.send(&prepared.signed), &self.config.retry, "transaction submission").await;
                (attempted.result, attempted.attempts)
            }
        };

        let (signature, attempts) = match submitted {
            (Ok(signature), attempts) => (signature, attempts),
            (Err(e), attempts) => return self.failed(trade, Some(path), e, Decimal::ZERO, None, attempts),
        };

        info!(id = %opportunity.id, signature = %signature, path = %path, via_relay, "📡 Transaction submitted");
        self.events.publish(BotEvent::TradeSubmitted {
            opportunity_id: opportunity.id,
            signature: signature.clone(),
            path,
            via_relay,
            at: Utc::now(),
        });

        let landed_cost = -(trade.size() * self.config.network_fee_pct / dec!(100));
        match self.await_confirmation(&signature).await {
            Ok(()) => {
                let pnl = expected_profit(trade.size(), opportunity.net_profit_pct, path);
                self.result(trade, Some(path), TradeOutcome::Confirmed, pnl, Some(signature), attempts)
            }
            Err(e) => self.failed(trade, Some(path), e, landed_cost, Some(signature), attempts),
        }
    }

    async fn await_confirmation(&self, signature: &str) -> BotResult<()> {
        let deadline = Instant::now() + self.config.confirmation_timeout;

        loop {
            match self.rpc.confirm(signature).await {
                Ok(ConfirmationStatus::Confirmed) => return Ok(()),
                Ok(ConfirmationStatus::Failed(message)) => return Err(classify_onchain_failure(message)),
                Ok(ConfirmationStatus::Pending) => {}
                Err(e) if e.is_retryable() => warn!(signature, error = %e, "Confirmation poll failed, retrying"),
                Err(e) => return Err(e),
            }

            if Instant::now() + self.config.confirmation_poll > deadline {
                return Err(BotError::Timeout {
                    operation: format!("confirmation of {}", signature),
                    timeout_ms: self.config.confirmation_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.config.confirmation_poll).await;
        }
    }

    fn relay_enabled(&self) -> bool {
        self.config.use_private_relay && self.relay.is_some()
    }

    fn failed(
        &self,
        trade: &ApprovedTrade,
        path: Option<ExecutionPath>,
        error: BotError,
        pnl: Decimal,
        signature: Option<String>,
        attempts: u32,
    ) -> TradeResult {
        error!(
            id = %trade.opportunity().id,
            kind = ?error.kind(),
            class = ?error.class(),
            error = %error,
            "❌ Trade failed"
        );
        let outcome = TradeOutcome::Failed {
            kind: error.kind(),
            reason: error.to_string(),
        };
        self.result(trade, path, outcome, pnl, signature, attempts)
    }

    fn result(
        &self,
        trade: &ApprovedTrade,
        path: Option<ExecutionPath>,
        outcome: TradeOutcome,
        realized_pnl: Decimal,
        signature: Option<String>,
        attempts: u32,
    ) -> TradeResult {
        let opportunity = trade.opportunity();
        let completed_at = Utc::now();
        TradeResult {
            opportunity_id: opportunity.id,
            pair: opportunity.pair.clone(),
            path,
            outcome,
            size: trade.size(),
            realized_pnl,
            signature,
            latency_ms: (completed_at - opportunity.detected_at).num_milliseconds().max(0) as u64,
            attempts,
            completed_at,
        }
    }
}

/// Rejects a simulation that failed or would not fit in one transaction.
pub fn check_simulation(report: &SimulationReport) -> BotResult<()> {
    if let Some(error) = &report.error {
        let mentions_slippage = error.to_lowercase().contains("slippage")
            || report.logs.iter().any(|line| line.to_lowercase().contains("slippage"));
        if mentions_slippage {
            return Err(BotError::SlippageExceeded { message: error.clone() });
        }
        return Err(BotError::SimulationFailed {
            message: error.clone(),
            logs: report.logs.clone(),
        });
    }

    if let Some(used) = report.units_consumed {
        if used > MAX_COMPUTE_UNITS {
            return Err(BotError::ComputeUnitOverflow {
                used,
                limit: MAX_COMPUTE_UNITS,
            });
        }
    }
    Ok(())
}
