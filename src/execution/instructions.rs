//! Instruction payloads returned by venue instruction APIs

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use crate::errors::{BotError, BotResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Program invocation as venues send it: string keys and base64 data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInstruction {
    pub program_id: String,
    pub accounts: Vec<ApiAccountMeta>,
    pub data: String,
}

impl ApiInstruction {
    pub fn from_instruction(ix: &Instruction) -> Self {
        Self {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| ApiAccountMeta {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: BASE64.encode(&ix.data),
        }
    }

    pub fn to_instruction(&self) -> BotResult<Instruction> {
        let program_id = parse_pubkey(&self.program_id, "program id")?;
        let accounts = self
            .accounts
            .iter()
            .map(|meta| {
                Ok(AccountMeta {
                    pubkey: parse_pubkey(&meta.pubkey, "account")?,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
            })
            .collect::<BotResult<Vec<_>>>()?;
        let data = BASE64.decode(&self.data).map_err(|e| BotError::MalformedInstruction {
            context: format!("instruction data for program {}", self.program_id),
            source: Some(e.into()),
        })?;

        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }
}

pub fn parse_pubkey(raw: &str, what: &str) -> BotResult<Pubkey> {
    Pubkey::from_str(raw.trim()).map_err(|e| BotError::MalformedInstruction {
        context: format!("invalid {} '{}'", what, raw),
        source: Some(e.into()),
    })
}

/// Instructions needed to perform one hop of a route on a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructions {
    #[serde(default)]
    pub compute_budget_instructions: Vec<ApiInstruction>,
    #[serde(default)]
    pub setup_instructions: Vec<ApiInstruction>,
    pub swap_instruction: ApiInstruction,
    #[serde(default)]
    pub cleanup_instruction: Option<ApiInstruction>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
}

/// A hop converted to native instructions. Venue compute-budget
/// instructions are dropped; the builder sets its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopInstructions {
    pub setup: Vec<Instruction>,
    pub swap: Instruction,
    pub cleanup: Option<Instruction>,
    pub lookup_tables: Vec<Pubkey>,
}

impl SwapInstructions {
    pub fn to_native(&self) -> BotResult<HopInstructions> {
        Ok(HopInstructions {
            setup: self
                .setup_instructions
                .iter()
                .map(ApiInstruction::to_instruction)
                .collect::<BotResult<_>>()?,
            swap: self.swap_instruction.to_instruction()?,
            cleanup: self.cleanup_instruction.as_ref().map(ApiInstruction::to_instruction).transpose()?,
            lookup_tables: self
                .address_lookup_table_addresses
                .iter()
                .map(|address| parse_pubkey(address, "lookup table"))
                .collect::<BotResult<_>>()?,
        })
    }

    pub fn validate(&self) -> BotResult<()> {
        self.to_native().map(|_| ())
    }
}
