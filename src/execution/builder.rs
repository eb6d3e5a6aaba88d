//! Transaction assembly for the standard and flash-loan paths

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::compute_budget::{self, ComputeBudgetInstruction};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{pubkey, system_instruction, system_program};
use crate::config::{
    FLASH_LOAN_FEE_BPS, MAX_COMPUTE_UNITS, MAX_PRIORITY_FEE_MICRO_LAMPORTS, MIN_PRIORITY_FEE_MICRO_LAMPORTS,
};
use crate::errors::{BotError, BotResult};
use crate::types::ExecutionPath;
use crate::utils::pow10;
use super::{AssembledTransaction, FlashLoanTerms, HopInstructions};

pub const TOKEN_PROGRAM: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const LENDING_PROGRAM: Pubkey = pubkey!("So1endDq2YkqhipRh3WViPa8hdiSpxWy6z3Z6tMCpAo");
pub const RELAY_TIP_ACCOUNT: Pubkey = pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5");

const FLASH_BORROW_DISCRIMINATOR: [u8; 8] = [139, 141, 178, 175, 49, 45, 115, 42];
const FLASH_REPAY_DISCRIMINATOR: [u8; 8] = [92, 159, 112, 159, 84, 26, 25, 187];

/// Lending reserve the flash loan borrows the quote token from.
#[derive(Debug, Clone)]
pub struct LendingReserve {
    pub program_id: Pubkey,
    pub reserve: Pubkey,
    pub liquidity_supply: Pubkey,
    pub lending_market: Pubkey,
}

impl Default for LendingReserve {
    /// Mainnet USDC reserve.
    fn default() -> Self {
        Self {
            program_id: LENDING_PROGRAM,
            reserve: pubkey!("BgxfHJDzm44T7XG68MYKx7YisTjZu73tVovyZSjJMpmw"),
            liquidity_supply: pubkey!("8SheGtsopRUDzdiD6v6BR9a6bqZ9QwywYQY99Fp5meNf"),
            lending_market: pubkey!("4UpD2fh7xH3VP9QQaXtsS1YY3bxzWhtfpks7FatyKvdY"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    payer: Pubkey,
    token_account: Pubkey,
    reserve: LendingReserve,
    compute_unit_limit: u32,
    quote_decimals: u32,
}

impl TransactionBuilder {
    pub fn new(payer: Pubkey, token_account: Option<Pubkey>, reserve: LendingReserve, quote_decimals: u32) -> Self {
        Self {
            token_account: token_account.unwrap_or(payer),
            payer,
            reserve,
            compute_unit_limit: MAX_COMPUTE_UNITS as u32,
            quote_decimals,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.payer
    }

    pub fn lending_program(&self) -> Pubkey {
        self.reserve.program_id
    }

    /// Converts a quote-token amount into integer base units.
    pub fn to_base_units(&self, amount: Decimal) -> BotResult<u64> {
        amount
            .checked_mul(pow10(self.quote_decimals as i32))
            .and_then(|scaled| scaled.trunc().to_u64())
            .ok_or_else(|| BotError::malformed(format!("amount {} does not fit in base units", amount)))
    }

    pub fn compute_budget_instructions(&self, priority_micro_lamports: u64) -> Vec<Instruction> {
        vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.compute_unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(priority_micro_lamports),
        ]
    }

    pub fn flash_loan_terms(&self, borrowed: u64) -> FlashLoanTerms {
        FlashLoanTerms {
            borrowed,
            fee: borrowed * FLASH_LOAN_FEE_BPS / 10_000,
        }
    }

    pub fn flash_borrow_instruction(&self, amount: u64) -> Instruction {
        let mut data = FLASH_BORROW_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&amount.to_le_bytes());

        Instruction::new_with_bytes(
            self.reserve.program_id,
            &data,
            vec![
                AccountMeta::new(self.reserve.liquidity_supply, false),
                AccountMeta::new(self.token_account, false),
                AccountMeta::new_readonly(self.reserve.reserve, false),
                AccountMeta::new_readonly(self.reserve.lending_market, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
            ],
        )
    }

    pub fn flash_repay_instruction(&self, repay_amount: u64, borrow_index: u8) -> Instruction {
        let mut data = FLASH_REPAY_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&repay_amount.to_le_bytes());
        data.push(borrow_index);

        Instruction::new_with_bytes(
            self.reserve.program_id,
            &data,
            vec![
                AccountMeta::new(self.token_account, false),
                AccountMeta::new(self.reserve.liquidity_supply, false),
                AccountMeta::new(self.reserve.reserve, false),
                AccountMeta::new_readonly(self.reserve.lending_market, false),
                AccountMeta::new_readonly(self.payer, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM, false),
            ],
        )
    }

    pub fn tip_instruction(&self, lamports: u64) -> Instruction {
        system_instruction::transfer(&self.payer, &RELAY_TIP_ACCOUNT, lamports)
    }

    /// Lays out compute budget, optional borrow, every hop's setup/swap/cleanup,
    /// optional repay and optional relay tip, in that order.
    pub fn assemble(
        &self,
        hops: &[HopInstructions],
        path: ExecutionPath,
        trade_size: Decimal,
        tip_lamports: Option<u64>,
        recent_blockhash: Hash,
        lookup_tables: Vec<AddressLookupTableAccount>,
    ) -> BotResult<AssembledTransaction> {
        if hops.is_empty() {
            return Err(BotError::malformed("route produced no swap instructions"));
        }

        let mut instructions = self.compute_budget_instructions(priority_fee(trade_size));

        let flash_loan = match path {
            ExecutionPath::FlashLoan => {
                let terms = self.flash_loan_terms(self.to_base_units(trade_size)?);
                instructions.push(self.flash_borrow_instruction(terms.borrowed));
                Some(terms)
            }
            ExecutionPath::Standard => None,
        };
        let borrow_index = instructions.len().saturating_sub(1) as u8;

        for hop in hops {
            for setup in &hop.setup {
                // Aggregators repeat idempotent setup (e.g. account creation) per hop.
                if !instructions.contains(setup) {
                    instructions.push(setup.clone());
                }
            }
            instructions.push(hop.swap.clone());
            if let Some(cleanup) = &hop.cleanup {
                instructions.push(cleanup.clone());
            }
        }

        if let Some(terms) = flash_loan {
            instructions.push(self.flash_repay_instruction(terms.repay_amount(), borrow_index));
            verify_flash_loan_order(&instructions, &self.reserve.program_id)?;
        }
        if let Some(lamports) = tip_lamports {
            instructions.push(self.tip_instruction(lamports));
        }

        Ok(AssembledTransaction {
            payer: self.payer,
            instructions,
            recent_blockhash,
            lookup_tables,
            path,
            flash_loan,
        })
    }
}

/// Checks a flash-loan layout: after the compute-budget prefix comes exactly
/// one borrow, then at least one swap, then exactly one repay that points
/// back at the borrow. A relay tip may follow the repay.
pub fn verify_flash_loan_order(instructions: &[Instruction], lending_program: &Pubkey) -> BotResult<()> {
    let start = instructions
        .iter()
        .position(|ix| ix.program_id != compute_budget::id())
        .unwrap_or(instructions.len());
    let end = instructions
        .iter()
        .rposition(|ix| ix.program_id != system_program::id())
        .map_or(start, |last| last + 1);
    let body = instructions.get(start..end).unwrap_or_default();

    if body.len() < 3 {
        return Err(BotError::malformed(
            "flash loan transaction needs a borrow, at least one swap and a repay",
        ));
    }

    let is_lending = |ix: &Instruction, discriminator: &[u8; 8]| {
        ix.program_id == *lending_program && ix.data.starts_with(discriminator)
    };
    let first = &body[0];
    let last = &body[body.len() - 1];

    if !is_lending(first, &FLASH_BORROW_DISCRIMINATOR) {
        return Err(BotError::malformed("first instruction after compute budget must be the flash borrow"));
    }
    if !is_lending(last, &FLASH_REPAY_DISCRIMINATOR) {
        return Err(BotError::malformed("last instruction before the tip must be the flash repay"));
    }
    if body[1..body.len() - 1].iter().any(|ix| ix.program_id == *lending_program) {
        return Err(BotError::malformed("lending instructions between borrow and repay"));
    }
    if last.data.get(16).copied() != Some(start as u8) {
        return Err(BotError::malformed("flash repay does not reference its borrow"));
    }
    Ok(())
}

/// Priority fee in micro-lamports per compute unit, scaled with trade size.
pub fn priority_fee(trade_size: Decimal) -> u64 {
    (trade_size * dec!(250))
        .to_u64()
        .unwrap_or(MAX_PRIORITY_FEE_MICRO_LAMPORTS)
        .clamp(MIN_PRIORITY_FEE_MICRO_LAMPORTS, MAX_PRIORITY_FEE_MICRO_LAMPORTS)
}

/// Union of lookup table addresses across hops, first occurrence wins.
pub fn merge_lookup_table_addresses(hops: &[HopInstructions]) -> Vec<Pubkey> {
    let mut merged: Vec<Pubkey> = Vec::new();
    for address in hops.iter().flat_map(|hop| hop.lookup_tables.iter()) {
        if !merged.contains(address) {
            merged.push(*address);
        }
    }
    merged
}
