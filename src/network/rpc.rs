//! Chain RPC client

use async_trait::async_trait;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::client_error::{Error as ClientError, ErrorKind as ClientErrorKind, Result as ClientResult};
use solana_rpc_client_api::config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_rpc_client_api::request::RpcError;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::address_lookup_table::state::AddressLookupTable;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use crate::errors::{BotError, BotResult};
use crate::execution::{ConfirmationStatus, SignedTransaction, SimulationReport};
use super::{ApiLimiter, with_timeout};

/// Everything the execution engine needs from the chain's RPC node.
#[async_trait]
pub trait TransactionRpc: Send + Sync {
    async fn slot(&self) -> BotResult<u64>;
    async fn latest_blockhash(&self) -> BotResult<Hash>;
    async fn resolve_lookup_tables(&self, addresses: &[Pubkey]) -> BotResult<Vec<AddressLookupTableAccount>>;
    async fn simulate(&self, tx: &SignedTransaction) -> BotResult<SimulationReport>;
    async fn send(&self, tx: &SignedTransaction) -> BotResult<String>;
    async fn confirm(&self, signature: &str) -> BotResult<ConfirmationStatus>;
}

pub struct JsonRpcClient {
    client: RpcClient,
    limiter: ApiLimiter,
    timeout: Duration,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, limiter: ApiLimiter, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.into(), timeout, CommitmentConfig::confirmed()),
            limiter,
            timeout,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    async fn call<T, Fut>(&self, method: &str, request: Fut) -> BotResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        self.limiter.until_ready().await;
        let result = with_timeout(self.timeout, method, async {
            request.await.map_err(|e| classify_client_error(method, self.timeout, e))
        })
        .await?;
        debug!(method, "RPC call succeeded");
        Ok(result)
    }
}

fn classify_client_error(method: &str, timeout: Duration, error: ClientError) -> BotError {
    match error.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
            classify_rpc_error(method, *code, message.clone())
        }
        ClientErrorKind::RpcError(RpcError::ParseError(message)) => BotError::DataParsing {
            context: format!("{} response", method),
            source: anyhow::anyhow!(message.clone()),
        },
        ClientErrorKind::RpcError(_) => BotError::RpcRejected {
            method: method.to_string(),
            code: 0,
            message: error.to_string(),
        },
        ClientErrorKind::Reqwest(e) if e.is_timeout() => BotError::Timeout {
            operation: method.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        ClientErrorKind::Reqwest(e) => match e.status().map(|status| status.as_u16()) {
            Some(429) => BotError::RateLimited { service: format!("rpc {}", method) },
            Some(status) if status >= 500 => BotError::RpcUnavailable {
                message: format!("{} returned {}", method, status),
            },
            _ => BotError::network(format!("{} request failed", method), anyhow::anyhow!(error.to_string())),
        },
        ClientErrorKind::SerdeJson(_) => BotError::DataParsing {
            context: format!("{} response", method),
            source: anyhow::anyhow!(error.to_string()),
        },
        ClientErrorKind::TransactionError(e) => classify_onchain_failure(e.to_string()),
        _ => BotError::network(format!("{} request failed", method), anyhow::anyhow!(error.to_string())),
    }
}

/// Maps node error codes onto the error taxonomy. Only codes known to clear
/// on their own are transient; anything unrecognised is a rejection.
pub fn classify_rpc_error(method: &str, code: i64, message: String) -> BotError {
    let lowered = message.to_lowercase();
    match code {
        // Node behind, unhealthy, or not yet at the requested slot.
        -32004 | -32005 | -32014 | -32016 => BotError::RpcUnavailable { message },
        -32603 => BotError::RpcUnavailable { message },
        -32429 | 429 => BotError::RateLimited { service: format!("rpc {}", method) },
        _ if lowered.contains("insufficient funds") || lowered.contains("insufficient lamports") => {
            BotError::InsufficientFunds { message }
        }
        _ if lowered.contains("slippage") => BotError::SlippageExceeded { message },
        -32002 => BotError::SimulationFailed { message, logs: Vec::new() },
        -32602 | -32600 => BotError::malformed(message),
        _ => BotError::RpcRejected {
            method: method.to_string(),
            code,
            message,
        },
    }
}

/// Failure reported for a transaction that reached the chain.
pub fn classify_onchain_failure(message: String) -> BotError {
    let lower = message.to_lowercase();
    if lower.contains("slippage") {
        BotError::SlippageExceeded { message }
    } else if lower.contains("insufficient") {
        BotError::InsufficientFunds { message }
    } else {
        BotError::SimulationFailed {
            message: format!("transaction failed on chain: {}", message),
            logs: Vec::new(),
        }
    }
}

#[async_trait]
impl TransactionRpc for JsonRpcClient {
    async fn slot(&self) -> BotResult<u64> {
        self.call("getSlot", self.client.get_slot()).await
    }

    async fn latest_blockhash(&self) -> BotResult<Hash> {
        self.call("getLatestBlockhash", self.client.get_latest_blockhash()).await
    }

    async fn resolve_lookup_tables(&self, addresses: &[Pubkey]) -> BotResult<Vec<AddressLookupTableAccount>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let accounts = self
            .call("getMultipleAccounts", self.client.get_multiple_accounts(addresses))
            .await?;

        addresses
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let account = accounts
                    .get(i)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| BotError::malformed(format!("lookup table {} not found", key)))?;
                let table = AddressLookupTable::deserialize(&account.data).map_err(|e| BotError::MalformedInstruction {
                    context: format!("lookup table {}", key),
                    source: Some(e.into()),
                })?;
                Ok(AddressLookupTableAccount {
                    key: *key,
                    addresses: table.addresses.to_vec(),
                })
            })
            .collect()
    }

    async fn simulate(&self, tx: &SignedTransaction) -> BotResult<SimulationReport> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(CommitmentConfig::processed()),
            ..Default::default()
        };
        let response = self
            .call(
                "simulateTransaction",
                self.client.simulate_transaction_with_config(&tx.transaction, config),
            )
            .await?;

        let value = response.value;
        Ok(SimulationReport {
            units_consumed: value.units_consumed,
            error: value.err.map(|err| err.to_string()),
            logs: value.logs.unwrap_or_default(),
        })
    }

    async fn send(&self, tx: &SignedTransaction) -> BotResult<String> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..Default::default()
        };
        let signature = self
            .call(
                "sendTransaction",
                self.client.send_transaction_with_config(&tx.transaction, config),
            )
            .await?;
        Ok(signature.to_string())
    }

    async fn confirm(&self, signature: &str) -> BotResult<ConfirmationStatus> {
        let parsed = Signature::from_str(signature).map_err(|e| BotError::MalformedInstruction {
            context: format!("signature {}", signature),
            source: Some(e.into()),
        })?;
        let response = self
            .call("getSignatureStatuses", self.client.get_signature_statuses(&[parsed]))
            .await?;

        let Some(status) = response.value.into_iter().next().flatten() else {
            return Ok(ConfirmationStatus::Pending);
        };
        if let Some(err) = &status.err {
            return Ok(ConfirmationStatus::Failed(err.to_string()));
        }
        if status.satisfies_commitment(CommitmentConfig::confirmed()) {
            Ok(ConfirmationStatus::Confirmed)
        } else {
            Ok(ConfirmationStatus::Pending)
        }
    }
}
