//! Assembled and signed transactions

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{VersionedMessage, v0};
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer, read_keypair_file};
use solana_sdk::transaction::VersionedTransaction;
use std::path::Path;
use std::sync::Arc;
use crate::errors::{BotError, BotResult};
use crate::types::ExecutionPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLoanTerms {
    pub borrowed: u64,
    pub fee: u64,
}

impl FlashLoanTerms {
    pub fn repay_amount(&self) -> u64 {
        self.borrowed + self.fee
    }
}

#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub payer: Pubkey,
    pub instructions: Vec<Instruction>,
    pub recent_blockhash: Hash,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    pub path: ExecutionPath,
    pub flash_loan: Option<FlashLoanTerms>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub signature: Signature,
    pub transaction: VersionedTransaction,
    /// Base64 of the bincode wire bytes, as the relay expects them.
    pub payload: String,
    pub path: ExecutionPath,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub units_consumed: Option<u64>,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// Compiles assembled instructions into a v0 message and signs it with the
/// payer keypair.
#[derive(Debug, Clone)]
pub struct TransactionSigner {
    keypair: Arc<Keypair>,
}

impl TransactionSigner {
    /// Accepts a base58 secret key, a JSON byte array, or the path of a
    /// keypair file.
    pub fn from_private_key(private_key: &str) -> BotResult<Self> {
        let raw = private_key.trim();

        if Path::new(raw).is_file() {
            let keypair = read_keypair_file(raw).map_err(|e| BotError::Signing {
                message: format!("failed to read keypair file {}: {}", raw, e),
            })?;
            return Ok(Self::from_keypair(keypair));
        }

        let bytes = if raw.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(raw).map_err(|e| BotError::Signing {
                message: format!("failed to parse keypair bytes: {}", e),
            })?
        } else {
            bs58::decode(raw).into_vec().map_err(|e| BotError::Signing {
                message: format!("failed to decode base58 private key: {}", e),
            })?
        };

        let keypair = Keypair::from_bytes(&bytes).map_err(|e| BotError::Signing {
            message: format!("failed to parse private key: {}", e),
        })?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Throwaway key for dry runs, which never submit.
    pub fn ephemeral() -> Self {
        Self::from_keypair(Keypair::new())
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign(&self, tx: &AssembledTransaction) -> BotResult<SignedTransaction> {
        if tx.payer != self.pubkey() {
            return Err(BotError::Signing {
                message: format!("payer {} does not match signing key {}", tx.payer, self.pubkey()),
            });
        }

        let message = v0::Message::try_compile(&tx.payer, &tx.instructions, &tx.lookup_tables, tx.recent_blockhash)
            .map_err(|e| BotError::MalformedInstruction {
                context: "v0 message compilation".to_string(),
                source: Some(e.into()),
            })?;

        let transaction = VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.keypair.as_ref()])
            .map_err(|e| BotError::Signing { message: e.to_string() })?;

        let wire = bincode::serialize(&transaction).map_err(|e| BotError::MalformedInstruction {
            context: "transaction wire encoding".to_string(),
            source: Some(e.into()),
        })?;
        if wire.len() > PACKET_DATA_SIZE {
            return Err(BotError::malformed(format!(
                "transaction is {} bytes, above the {}-byte packet limit",
                wire.len(),
                PACKET_DATA_SIZE
            )));
        }

        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| BotError::Signing {
                message: "signed transaction carries no signature".to_string(),
            })?;

        Ok(SignedTransaction {
            signature,
            transaction,
            payload: BASE64.encode(wire),
            path: tx.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    fn sample_tx(payer: Pubkey, data_len: usize) -> AssembledTransaction {
        AssembledTransaction {
            payer,
            instructions: vec![Instruction::new_with_bytes(
                Pubkey::new_unique(),
                &vec![1; data_len],
                vec![AccountMeta::new(payer, true)],
            )],
            recent_blockhash: Hash::new_unique(),
            lookup_tables: vec![],
            path: ExecutionPath::Standard,
            flash_loan: None,
        }
    }

    #[test]
    fn signed_payload_is_a_verifiable_v0_transaction() {
        let signer = TransactionSigner::ephemeral();
        let signed = signer.sign(&sample_tx(signer.pubkey(), 8)).unwrap();

        let wire = BASE64.decode(&signed.payload).unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&wire).unwrap();

        assert_eq!(decoded, signed.transaction);
        assert_eq!(decoded.signatures[0], signed.signature);
        assert!(matches!(decoded.message, VersionedMessage::V0(_)));
        assert_eq!(decoded.message.static_account_keys()[0], signer.pubkey());
        assert!(decoded.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn foreign_payer_is_refused() {
        let signer = TransactionSigner::ephemeral();
        let result = signer.sign(&sample_tx(Pubkey::new_unique(), 8));
        assert!(matches!(result, Err(BotError::Signing { .. })));
    }

    #[test]
    fn oversized_transactions_are_malformed() {
        let signer = TransactionSigner::ephemeral();
        let err = signer.sign(&sample_tx(signer.pubkey(), 2_000)).unwrap_err();
        assert!(err.to_string().starts_with("Malformed instruction data"));
    }

    #[test]
    fn parses_base58_and_byte_array_keys() {
        let keypair = Keypair::new();
        let expected = keypair.pubkey();

        let from_base58 = TransactionSigner::from_private_key(&keypair.to_base58_string()).unwrap();
        assert_eq!(from_base58.pubkey(), expected);

        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        assert_eq!(TransactionSigner::from_private_key(&json).unwrap().pubkey(), expected);
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(matches!(
            TransactionSigner::from_private_key("not-a-key"),
            Err(BotError::Signing { .. })
        ));
    }

    #[test]
    fn repay_includes_fee() {
        let terms = FlashLoanTerms { borrowed: 1_000_000, fee: 300 };
        assert_eq!(terms.repay_amount(), 1_000_300);
    }
}
