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

//! Transaction envelopes.
//!
//! An envelope wraps exactly one contract invocation. It is built with a
//! placeholder fee, simulated, then assembled: the simulator's resource
//! footprint, resource fee and authorization entries are attached and the
//! result is ready to sign.
//!
//! ```text
//! build (base fee) ──simulate──► assemble (base + resource fee, footprint, auth)
//! ```

use crate::SorosaveError;
use crate::base::Address;
use crate::keys::{decode_account_id, encode_account_id};
use crate::rpc::Simulation;
use crate::scval::{self, ScVal};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use stellar_xdr::curr::{
    Hash, HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo, MuxedAccount,
    Operation, OperationBody, Preconditions, SequenceNumber, SorobanAuthorizationEntry,
    SorobanTransactionData, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, Uint256, VecM, WriteXdr,
};

/// Inclusion fee in stroops before resource fees are added.
pub const BASE_FEE: u32 = 100;

/// Seconds an envelope stays valid for submission.
pub const TIMEOUT_SECS: u64 = 30;

/// Builds the host function call for one contract method.
///
/// # Errors
///
/// Returns [`SorosaveError::Encoding`] if `contract_id` is not a contract
/// strkey or `function` is not a valid symbol.
pub fn invoke_contract(
    contract_id: &Address,
    function: &str,
    args: Vec<ScVal>,
) -> Result<InvokeContractArgs, SorosaveError> {
    let contract_address = scval::sc_address("contract_id", contract_id)?;
    let function_name = scval::symbol("function", function)?;
    let args = args
        .try_into()
        .map_err(|e| SorosaveError::encoding("args", format!("{e}")))?;
    Ok(InvokeContractArgs {
        contract_address,
        function_name,
        args,
    })
}

/// An account and its current sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    pub address: Address,
    /// Last sequence number used; the next envelope uses `sequence + 1`.
    pub sequence: i64,
}

impl SourceAccount {
    pub fn new(address: Address, sequence: i64) -> Self {
        Self { address, sequence }
    }
}

/// An unsigned transaction bound to one network.
///
/// Serializes to a base64 `TransactionEnvelope` with no signatures; the
/// [`hash`](Self::hash) is what a wallet signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx: Transaction,
    network_passphrase: String,
}

impl UnsignedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    pub fn source_account(&self) -> Address {
        let key = match &self.tx.source_account {
            MuxedAccount::Ed25519(Uint256(key)) => key,
            MuxedAccount::MuxedEd25519(muxed) => &muxed.ed25519.0,
        };
        Address::new(encode_account_id(key))
    }

    pub fn fee(&self) -> u32 {
        self.tx.fee
    }

    pub fn seq_num(&self) -> i64 {
        self.tx.seq_num.0
    }

    /// Latest close time (unix seconds) at which the ledger accepts it.
    pub fn max_time(&self) -> Option<u64> {
        match &self.tx.cond {
            Preconditions::Time(bounds) => Some(bounds.max_time.0),
            _ => None,
        }
    }

    /// The single contract call this transaction carries.
    pub fn invocation(&self) -> Option<&InvokeContractArgs> {
        match &self.host_function_op()?.host_function {
            HostFunction::InvokeContract(args) => Some(args),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<String> {
        self.invocation()
            .map(|call| String::from_utf8_lossy(&call.function_name.0).into_owned())
    }

    pub fn args(&self) -> &[ScVal] {
        self.invocation()
            .map(|call| call.args.as_slice())
            .unwrap_or_default()
    }

    pub fn auth(&self) -> &[SorobanAuthorizationEntry] {
        self.host_function_op()
            .map(|op| op.auth.as_slice())
            .unwrap_or_default()
    }

    pub fn soroban_data(&self) -> Option<&SorobanTransactionData> {
        match &self.tx.ext {
            TransactionExt::V1(data) => Some(data),
            TransactionExt::V0 => None,
        }
    }

    pub fn is_assembled(&self) -> bool {
        self.soroban_data().is_some()
    }

    fn host_function_op(&self) -> Option<&InvokeHostFunctionOp> {
        match self.tx.operations.as_slice() {
            [
                Operation {
                    body: OperationBody::InvokeHostFunction(op),
                    ..
                },
            ] => Some(op),
            _ => None,
        }
    }

    /// Reconciles fee, resources and authorization with a simulation.
    ///
    /// The fee becomes the base fee plus the simulator's minimum resource
    /// fee, the footprint is attached, and the simulator's authorization
    /// entries fill in an operation that has none. Source, sequence and
    /// time bounds are left untouched.
    ///
    /// # Errors
    ///
    /// - [`SorosaveError::Transport`] - The simulation carried no
    ///   transaction data.
    /// - [`SorosaveError::Encoding`] - The resulting fee does not fit in
    ///   the ledger's 32-bit fee field.
    pub fn assemble(mut self, simulation: &Simulation) -> Result<Self, SorosaveError> {
        let data = simulation.transaction_data.clone().ok_or_else(|| {
            SorosaveError::Transport("simulation returned no transaction data".into())
        })?;
        let fee = i64::from(self.tx.fee)
            .checked_add(simulation.min_resource_fee)
            .and_then(|fee| u32::try_from(fee).ok())
            .ok_or_else(|| {
                SorosaveError::encoding(
                    "fee",
                    format!(
                        "base fee {} plus resource fee {} exceeds u32",
                        self.tx.fee, simulation.min_resource_fee
                    ),
                )
            })?;

        if !simulation.auth.is_empty() {
            let mut operations = self.tx.operations.to_vec();
            for operation in &mut operations {
                if let OperationBody::InvokeHostFunction(op) = &mut operation.body
                    && op.auth.is_empty()
                {
                    op.auth = simulation
                        .auth
                        .clone()
                        .try_into()
                        .map_err(|e| SorosaveError::encoding("auth", format!("{e}")))?;
                }
            }
            self.tx.operations = operations
                .try_into()
                .map_err(|e| SorosaveError::encoding("operations", format!("{e}")))?;
        }

        self.tx.fee = fee;
        self.tx.ext = TransactionExt::V1(data);
        Ok(self)
    }

    /// The unsigned `TransactionEnvelope`.
    pub fn to_envelope(&self) -> TransactionEnvelope {
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: self.tx.clone(),
            signatures: VecM::default(),
        })
    }

    /// Base64 XDR of the unsigned envelope, as wallets and RPC expect it.
    pub fn to_xdr_base64(&self) -> Result<String, SorosaveError> {
        self.to_envelope()
            .to_xdr_base64(Limits::none())
            .map_err(|e| SorosaveError::encoding("transaction", format!("{e}")))
    }

    /// Hash a signer signs: SHA-256 over the network id and the transaction.
    pub fn hash(&self) -> Result<[u8; 32], SorosaveError> {
        let network_id = Hash(Sha256::digest(self.network_passphrase.as_bytes()).into());
        let payload = TransactionSignaturePayload {
            network_id,
            tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(self.tx.clone()),
        };
        let bytes = payload
            .to_xdr(Limits::none())
            .map_err(|e| SorosaveError::encoding("transaction", format!("{e}")))?;
        Ok(Sha256::digest(bytes).into())
    }

    pub fn hash_hex(&self) -> Result<String, SorosaveError> {
        self.hash().map(hex::encode)
    }
}

/// Builder for single-invocation transactions.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    source: SourceAccount,
    network_passphrase: String,
    fee: u32,
    timeout_secs: u64,
    operation: Option<InvokeContractArgs>,
}

impl TransactionBuilder {
    pub fn new(source: SourceAccount, network_passphrase: impl Into<String>) -> Self {
        Self {
            source,
            network_passphrase: network_passphrase.into(),
            fee: BASE_FEE,
            timeout_secs: TIMEOUT_SECS,
            operation: None,
        }
    }

    pub fn fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn operation(mut self, operation: InvokeContractArgs) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn build(self) -> Result<UnsignedTransaction, SorosaveError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.build_at(now)
    }

    /// Builds with `now` as the start of the validity window.
    ///
    /// # Errors
    ///
    /// Returns [`SorosaveError::Encoding`] if no operation was set, the
    /// source is not an account strkey, or its sequence is exhausted.
    pub fn build_at(self, now: u64) -> Result<UnsignedTransaction, SorosaveError> {
        let operation = self
            .operation
            .ok_or_else(|| SorosaveError::encoding("operation", "envelope has no operation"))?;
        let source = decode_account_id(self.source.address.as_str()).ok_or_else(|| {
            SorosaveError::encoding(
                "source",
                format!("`{}` is not an account strkey", self.source.address),
            )
        })?;
        let seq_num = self
            .source
            .sequence
            .checked_add(1)
            .ok_or_else(|| SorosaveError::encoding("sequence", "sequence number exhausted"))?;
        let max_time = if self.timeout_secs == 0 {
            0
        } else {
            now.saturating_add(self.timeout_secs)
        };

        let operation = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(operation),
                auth: VecM::default(),
            }),
        };
        let tx = Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(source)),
            fee: self.fee,
            seq_num: SequenceNumber(seq_num),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(0),
                max_time: TimePoint(max_time),
            }),
            memo: Memo::None,
            operations: vec![operation]
                .try_into()
                .map_err(|e| SorosaveError::encoding("operations", format!("{e}")))?,
            ext: TransactionExt::V0,
        };

        Ok(UnsignedTransaction {
            tx,
            network_passphrase: self.network_passphrase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::encode_contract_id;
    use crate::types::{MAINNET_PASSPHRASE, TESTNET_PASSPHRASE};
    use stellar_xdr::curr::{
        ExtensionPoint, LedgerFootprint, ReadXdr, SorobanAuthorizedFunction,
        SorobanAuthorizedInvocation, SorobanCredentials, SorobanResources,
    };

    fn contract() -> Address {
        Address::new(encode_contract_id(&[3; 32]))
    }

    fn source() -> Address {
        Address::new(encode_account_id(&[1; 32]))
    }

    fn invocation() -> InvokeContractArgs {
        invoke_contract(&contract(), "distribute_payout", vec![scval::u64(7)]).unwrap()
    }

    fn unsigned(passphrase: &str) -> UnsignedTransaction {
        TransactionBuilder::new(SourceAccount::new(source(), 41), passphrase)
            .operation(invocation())
            .build_at(1_700_000_000)
            .unwrap()
    }

    fn simulation(min_resource_fee: i64) -> Simulation {
        Simulation {
            transaction_data: Some(SorobanTransactionData {
                ext: ExtensionPoint::V0,
                resources: SorobanResources {
                    footprint: LedgerFootprint {
                        read_only: VecM::default(),
                        read_write: VecM::default(),
                    },
                    instructions: 1_000_000,
                    read_bytes: 2_000,
                    write_bytes: 500,
                },
                resource_fee: min_resource_fee,
            }),
            min_resource_fee,
            retval: None,
            auth: Vec::new(),
            latest_ledger: 1,
        }
    }

    #[test]
    fn builds_single_operation_envelope() {
        let tx = unsigned(TESTNET_PASSPHRASE);
        assert_eq!(tx.fee(), BASE_FEE);
        assert_eq!(tx.seq_num(), 42);
        assert_eq!(tx.max_time(), Some(1_700_000_030));
        assert_eq!(tx.source_account(), source());
        assert_eq!(tx.invocation(), Some(&invocation()));
        assert_eq!(tx.function().as_deref(), Some("distribute_payout"));
        assert_eq!(tx.args(), &[scval::u64(7)]);
        assert!(!tx.is_assembled());
    }

    #[test]
    fn build_requires_operation_and_account_source() {
        let result = TransactionBuilder::new(SourceAccount::new(source(), 0), TESTNET_PASSPHRASE)
            .build_at(0);
        assert!(matches!(
            result,
            Err(SorosaveError::Encoding { field: "operation", .. })
        ));

        let result = TransactionBuilder::new(SourceAccount::new(contract(), 0), TESTNET_PASSPHRASE)
            .operation(invocation())
            .build_at(0);
        assert!(matches!(
            result,
            Err(SorosaveError::Encoding { field: "source", .. })
        ));
    }

    #[test]
    fn invocation_validates_contract_and_function() {
        assert!(invoke_contract(&contract(), "get group", vec![]).is_err());
        assert!(matches!(
            invoke_contract(&source(), "get_group", vec![]),
            Err(SorosaveError::Encoding { field: "contract_id", .. })
        ));
    }

    #[test]
    fn assemble_adds_resource_fee_and_footprint() {
        let assembled = unsigned(TESTNET_PASSPHRASE)
            .assemble(&simulation(25_000))
            .unwrap();
        assert_eq!(assembled.fee(), 25_100);
        assert_eq!(
            assembled.soroban_data().map(|data| data.resource_fee),
            Some(25_000)
        );
        assert_eq!(assembled.seq_num(), 42);
        assert!(assembled.auth().is_empty());
    }

    #[test]
    fn assemble_attaches_simulated_auth() {
        let entry = SorobanAuthorizationEntry {
            credentials: SorobanCredentials::SourceAccount,
            root_invocation: SorobanAuthorizedInvocation {
                function: SorobanAuthorizedFunction::ContractFn(invocation()),
                sub_invocations: VecM::default(),
            },
        };
        let mut simulated = simulation(10);
        simulated.auth = vec![entry.clone()];

        let assembled = unsigned(TESTNET_PASSPHRASE).assemble(&simulated).unwrap();

        assert_eq!(assembled.auth(), &[entry]);
    }

    #[test]
    fn assemble_requires_transaction_data() {
        let mut simulated = simulation(10);
        simulated.transaction_data = None;
        assert!(matches!(
            unsigned(TESTNET_PASSPHRASE).assemble(&simulated),
            Err(SorosaveError::Transport(_))
        ));
    }

    #[test]
    fn assemble_rejects_fee_overflow() {
        assert!(
            unsigned(TESTNET_PASSPHRASE)
                .assemble(&simulation(i64::from(u32::MAX)))
                .is_err()
        );
    }

    #[test]
    fn xdr_envelope_is_unsigned_and_parses_back() {
        let tx = unsigned(TESTNET_PASSPHRASE);
        let encoded = tx.to_xdr_base64().unwrap();

        let TransactionEnvelope::Tx(envelope) =
            TransactionEnvelope::from_xdr_base64(&encoded, Limits::none()).unwrap()
        else {
            panic!("expected a v1 envelope");
        };
        assert!(envelope.signatures.is_empty());
        assert_eq!(&envelope.tx, tx.transaction());
    }

    #[test]
    fn hash_depends_on_network() {
        let testnet = unsigned(TESTNET_PASSPHRASE);
        assert_eq!(testnet.hash().unwrap(), testnet.clone().hash().unwrap());
        assert_ne!(
            testnet.hash().unwrap(),
            unsigned(MAINNET_PASSPHRASE).hash().unwrap()
        );
        assert_eq!(testnet.hash_hex().unwrap().len(), 64);
    }
}
