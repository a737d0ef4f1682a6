// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ledger RPC access.
//!
//! [`LedgerRpc`] is the seam between the transaction pipeline and the
//! network: account lookup and simulation. [`HttpRpc`] speaks Soroban
//! JSON-RPC 2.0 over HTTP; ledger keys, envelopes and results travel as
//! base64 XDR inside the JSON payloads.

use crate::SorosaveError;
use crate::base::Address;
use crate::envelope::{SourceAccount, UnsignedTransaction};
use crate::keys::decode_account_id;
use crate::scval::ScVal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, PublicKey, ReadXdr,
    SorobanAuthorizationEntry, SorobanTransactionData, Uint256, WriteXdr,
};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Network operations the pipeline needs from a ledger endpoint.
pub trait LedgerRpc: Send + Sync {
    /// Current sequence state of `address`.
    ///
    /// Fails with [`SorosaveError::AccountNotFound`] if the account does
    /// not exist.
    fn get_account(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<SourceAccount, SorosaveError>> + Send;

    /// Dry-runs `transaction` against current ledger state.
    fn simulate_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> impl Future<Output = Result<SimulateResponse, SorosaveError>> + Send;
}

/// Raw `simulateTransaction` result; XDR fields are still base64.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64 `SorobanTransactionData`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_data: Option<String>,
    /// Decimal string, as the RPC reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_resource_fee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<HostFunctionResult>,
    #[serde(default)]
    pub latest_ledger: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFunctionResult {
    /// Base64 `SorobanAuthorizationEntry` values the call requires.
    #[serde(default)]
    pub auth: Vec<String>,
    /// Base64 `ScVal` return value.
    pub xdr: String,
}

/// A successful simulation, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    pub transaction_data: Option<SorobanTransactionData>,
    pub min_resource_fee: i64,
    /// Return value of the invocation, if the simulator produced one.
    pub retval: Option<ScVal>,
    pub auth: Vec<SorobanAuthorizationEntry>,
    pub latest_ledger: u32,
}

impl SimulateResponse {
    /// Splits the response into success or failure and decodes its XDR.
    ///
    /// # Errors
    ///
    /// - [`SorosaveError::SimulationFailed`] - The simulator reported an error;
    ///   its text is kept verbatim.
    /// - [`SorosaveError::Transport`] - The resource fee is not an integer or
    ///   an XDR field does not decode.
    pub fn into_simulation(self) -> Result<Simulation, SorosaveError> {
        if let Some(reason) = self.error {
            return Err(SorosaveError::SimulationFailed { reason });
        }

        let min_resource_fee = match self.min_resource_fee.as_deref() {
            None => 0,
            Some(text) => text.parse().map_err(|_| {
                SorosaveError::Transport(format!("malformed minResourceFee {text:?}"))
            })?,
        };
        let transaction_data = self
            .transaction_data
            .as_deref()
            .map(|data| from_base64::<SorobanTransactionData>("transactionData", data))
            .transpose()?;

        let (retval, auth) = match self.results.into_iter().next() {
            None => (None, Vec::new()),
            Some(result) => {
                let retval = from_base64::<ScVal>("results[0].xdr", &result.xdr)?;
                let auth = result
                    .auth
                    .iter()
                    .map(|entry| from_base64("results[0].auth", entry))
                    .collect::<Result<Vec<SorobanAuthorizationEntry>, _>>()?;
                (Some(retval), auth)
            }
        };

        Ok(Simulation {
            transaction_data,
            min_resource_fee,
            retval,
            auth,
            latest_ledger: self.latest_ledger,
        })
    }
}

fn from_base64<T: ReadXdr>(field: &str, data: &str) -> Result<T, SorosaveError> {
    T::from_xdr_base64(data, Limits::none())
        .map_err(|e| SorosaveError::Transport(format!("malformed {field} XDR: {e}")))
}

/// Base64 ledger key of an account entry.
///
/// # Errors
///
/// Returns [`SorosaveError::Encoding`] if `address` is not an account strkey.
pub fn account_ledger_key(address: &Address) -> Result<String, SorosaveError> {
    let key = decode_account_id(address.as_str()).ok_or_else(|| {
        SorosaveError::encoding("address", format!("`{address}` is not an account strkey"))
    })?;
    LedgerKey::Account(LedgerKeyAccount {
        account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))),
    })
    .to_xdr_base64(Limits::none())
    .map_err(|e| SorosaveError::encoding("address", format!("{e}")))
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntriesResult {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntryResult {
    xdr: String,
}

/// Failure of one JSON-RPC round trip.
#[derive(Debug)]
enum CallError {
    Transport(String),
    Rpc { code: i64, message: String },
    Missing,
}

impl From<CallError> for SorosaveError {
    fn from(error: CallError) -> Self {
        match error {
            CallError::Transport(msg) => SorosaveError::Transport(msg),
            CallError::Rpc { code, message } => {
                SorosaveError::Transport(format!("rpc error {code}: {message}"))
            }
            CallError::Missing => SorosaveError::Transport("rpc response has no result".into()),
        }
    }
}

/// JSON-RPC client for a ledger endpoint.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpRpc {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>) -> Result<Self, SorosaveError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SorosaveError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, url = %self.url, "rpc request");

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Transport(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    CallError::Transport(format!("connection failed: {e}"))
                } else {
                    CallError::Transport(format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(CallError::Transport(format!(
                "rpc returned HTTP {}",
                response.status()
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("invalid rpc response: {e}")))?;

        if let Some(RpcErrorBody { code, message }) = parsed.error {
            return Err(CallError::Rpc { code, message });
        }
        parsed.result.ok_or(CallError::Missing)
    }
}

impl LedgerRpc for HttpRpc {
    async fn get_account(&self, address: &Address) -> Result<SourceAccount, SorosaveError> {
        let key = account_ledger_key(address)?;
        let result: LedgerEntriesResult = match self
            .call("getLedgerEntries", json!({ "keys": [key] }))
            .await
        {
            Ok(result) => result,
            Err(CallError::Missing) => {
                return Err(SorosaveError::AccountNotFound(address.to_string()));
            }
            Err(other) => return Err(other.into()),
        };

        let Some(entry) = result.entries.unwrap_or_default().into_iter().next() else {
            return Err(SorosaveError::AccountNotFound(address.to_string()));
        };
        match from_base64::<LedgerEntryData>("entries[0].xdr", &entry.xdr)? {
            LedgerEntryData::Account(account) => {
                Ok(SourceAccount::new(address.clone(), account.seq_num.0))
            }
            other => Err(SorosaveError::Transport(format!(
                "expected an account entry, got {}",
                other.name()
            ))),
        }
    }

    async fn simulate_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<SimulateResponse, SorosaveError> {
        let envelope = transaction.to_xdr_base64()?;
        let response = self
            .call("simulateTransaction", json!({ "transaction": envelope }))
            .await?;
        Ok(response)
    }
}
