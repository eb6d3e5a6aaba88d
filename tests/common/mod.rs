#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cycle_arb_bot::errors::{BotError, BotResult};
use cycle_arb_bot::execution::{
    ApiInstruction, ConfirmationStatus, ExecutionConfig, ExecutionEngine, SignedTransaction, SimulationReport,
    SwapInstructions, TransactionBuilder, TransactionSigner, LendingReserve,
};
use cycle_arb_bot::config::{FlashLoanPolicy, RiskConfig};
use cycle_arb_bot::events::EventBus;
use cycle_arb_bot::network::{RetryConfig, TransactionRpc};
use cycle_arb_bot::types::{PriceQuote, TokenPair, Venue};
use cycle_arb_bot::venues::{SwapRequest, VenueGateway};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn quote(venue: Venue, base: &str, quote_token: &str, bid: Decimal, ask: Decimal, at: DateTime<Utc>) -> PriceQuote {
    PriceQuote::new(venue, TokenPair::new(base, quote_token), bid, ask, at)
}

/// Serves quotes from memory and hands back a trivial swap instruction for
/// every hop request.
#[derive(Default)]
pub struct MockGateway {
    quotes: Mutex<HashMap<(Venue, TokenPair), PriceQuote>>,
    swap_requests: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, quote: PriceQuote) {
        self.quotes.lock().unwrap().insert((quote.venue, quote.pair.clone()), quote);
    }

    pub fn swap_requests(&self) -> usize {
        self.swap_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueGateway for MockGateway {
    async fn fetch_quote(&self, venue: Venue, pair: &TokenPair) -> BotResult<PriceQuote> {
        self.quotes
            .lock()
            .unwrap()
            .get(&(venue, pair.clone()))
            .cloned()
            .ok_or_else(|| BotError::malformed(format!("no quote for {} on {}", pair, venue)))
    }

    async fn build_swap_instructions(&self, request: &SwapRequest) -> BotResult<SwapInstructions> {
        self.swap_requests.fetch_add(1, Ordering::SeqCst);
        let user = Pubkey::from_str(&request.user_public_key).unwrap();
        let swap = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 1, 2, 3],
            vec![AccountMeta::new(user, true)],
        );
        Ok(SwapInstructions {
            compute_budget_instructions: Vec::new(),
            setup_instructions: Vec::new(),
            swap_instruction: ApiInstruction::from_instruction(&swap),
            cleanup_instruction: None,
            address_lookup_table_addresses: Vec::new(),
        })
    }
}

/// Chain stand-in with a configurable simulation result. Counts every
/// submission so tests can assert nothing reached the network.
pub struct MockRpc {
    units: Mutex<Option<u64>>,
    simulation_error: Mutex<Option<String>>,
    confirmation: Mutex<ConfirmationStatus>,
    sends: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(Some(180_000)),
            simulation_error: Mutex::new(None),
            confirmation: Mutex::new(ConfirmationStatus::Confirmed),
            sends: AtomicUsize::new(0),
        }
    }

    pub fn with_units(self, units: u64) -> Self {
        *self.units.lock().unwrap() = Some(units);
        self
    }

    pub fn with_simulation_error(self, error: &str) -> Self {
        *self.simulation_error.lock().unwrap() = Some(error.to_string());
        self
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionRpc for MockRpc {
    async fn slot(&self) -> BotResult<u64> {
        Ok(250_000_000)
    }

    async fn latest_blockhash(&self) -> BotResult<Hash> {
        Ok(Hash::new_unique())
    }

    async fn resolve_lookup_tables(&self, addresses: &[Pubkey]) -> BotResult<Vec<AddressLookupTableAccount>> {
        Ok(addresses
            .iter()
            .map(|key| AddressLookupTableAccount {
                key: *key,
                addresses: Vec::new(),
            })
            .collect())
    }

    async fn simulate(&self, _tx: &SignedTransaction) -> BotResult<SimulationReport> {
        Ok(SimulationReport {
            units_consumed: *self.units.lock().unwrap(),
            error: self.simulation_error.lock().unwrap().clone(),
            logs: Vec::new(),
        })
    }

    async fn send(&self, tx: &SignedTransaction) -> BotResult<String> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(tx.signature.to_string())
    }

    async fn confirm(&self, _signature: &str) -> BotResult<ConfirmationStatus> {
        Ok(self.confirmation.lock().unwrap().clone())
    }
}

pub fn execution_config(dry_run: bool) -> ExecutionConfig {
    ExecutionConfig {
        dry_run,
        flash_loan_policy: FlashLoanPolicy::Never,
        inventory: dec!(5000),
        use_private_relay: false,
        relay_tip_lamports: 10_000,
        slippage_bps: 50,
        retry: RetryConfig::new(2, 1),
        confirmation_timeout: Duration::from_secs(1),
        confirmation_poll: Duration::from_millis(10),
        network_fee_pct: dec!(0.01),
    }
}

pub fn engine(
    gateway: Arc<MockGateway>,
    rpc: Arc<MockRpc>,
    config: ExecutionConfig,
    events: EventBus,
) -> ExecutionEngine {
    let signer = TransactionSigner::ephemeral();
    let builder = TransactionBuilder::new(signer.pubkey(), None, LendingReserve::default(), 6);
    ExecutionEngine::new(gateway, rpc, None, builder, signer, config, events)
}

pub fn risk_config() -> RiskConfig {
    RiskConfig {
        min_profit_threshold: dec!(0.1),
        max_position_size: dec!(1000),
        min_position_size: dec!(10),
        max_total_exposure: dec!(3000),
        max_consecutive_losses: 3,
        circuit_breaker_cooldown_secs: 60,
        pair_cooldown_secs: 0,
        ..RiskConfig::default()
    }
}
