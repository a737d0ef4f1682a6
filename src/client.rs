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

//! Savings contract client.
//!
//! Every public method encodes its arguments, then runs the shared
//! pipeline:
//!
//! ```text
//! encode ──► source account ──► build envelope ──► simulate ──┬─► assemble ──► envelope
//!                                                             └─► extract ───► decode
//! ```
//!
//! Mutating calls look up the caller's account and return an assembled,
//! unsigned transaction. Queries simulate from a throwaway key pair with
//! sequence zero and return the decoded value; simulation never touches
//! the source account, so it need not exist or be funded.
//!
//! Nothing is signed or submitted here, and nothing is retried.

use crate::SorosaveError;
use crate::base::{Address, GroupId};
use crate::decode::{Decoder, StatusPolicy};
use crate::envelope::{
    BASE_FEE, SourceAccount, TIMEOUT_SECS, TransactionBuilder, UnsignedTransaction,
    invoke_contract,
};
use crate::keys::KeyPair;
use crate::rpc::{HttpRpc, LedgerRpc, Simulation};
use crate::scval::{self, ScVal};
use crate::types::{CreateGroupParams, RoundInfo, SavingsGroup, SoroSaveConfig};
use serde_json::Value;
use tracing::debug;

/// Source of the envelope a pipeline run simulates.
enum Source<'a> {
    /// The caller's account, looked up for its current sequence.
    Account(&'a Address),
    /// A fresh random key pair at sequence zero, never submitted.
    Throwaway,
}

/// Typed client for one deployed savings contract.
///
/// Holds no mutable state; calls may run concurrently. Ordering between
/// concurrent submissions is left to the ledger's sequence numbers.
#[derive(Debug, Clone)]
pub struct SoroSaveClient<R = HttpRpc> {
    rpc: R,
    contract_id: Address,
    network_passphrase: String,
    decoder: Decoder,
}

impl SoroSaveClient<HttpRpc> {
    /// Creates a client talking JSON-RPC to `config.rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SorosaveError::Config`] for an invalid configuration.
    pub fn new(config: SoroSaveConfig) -> Result<Self, SorosaveError> {
        config.validate()?;
        let rpc = HttpRpc::new(config.rpc_url.clone())?;
        Self::with_rpc(config, rpc)
    }
}

impl<R: LedgerRpc> SoroSaveClient<R> {
    /// Creates a client over any [`LedgerRpc`] implementation.
    pub fn with_rpc(config: SoroSaveConfig, rpc: R) -> Result<Self, SorosaveError> {
        config.validate()?;
        Ok(Self {
            rpc,
            contract_id: Address::new(config.contract_id),
            network_passphrase: config.network_passphrase,
            decoder: Decoder::default(),
        })
    }

    /// Sets how unrecognized group status labels are decoded.
    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.decoder = Decoder::new(policy);
        self
    }

    pub fn contract_id(&self) -> &Address {
        &self.contract_id
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    // === Group lifecycle ===

    pub async fn create_group(
        &self,
        params: &CreateGroupParams,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = vec![
            scval::address("admin", &params.admin)?,
            scval::string("name", &params.name)?,
            scval::address("token", &params.token)?,
            scval::i128(params.contribution_amount),
            scval::u64(params.cycle_length),
            scval::u32(params.max_members),
        ];
        self.submit("create_group", args, source).await
    }

    pub async fn join_group(
        &self,
        member: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("member", member, group_id)?;
        self.submit("join_group", args, source).await
    }

    /// Leaves a group that is still forming.
    pub async fn leave_group(
        &self,
        member: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("member", member, group_id)?;
        self.submit("leave_group", args, source).await
    }

    pub async fn start_group(
        &self,
        admin: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("admin", admin, group_id)?;
        self.submit("start_group", args, source).await
    }

    // === Contributions and payouts ===

    /// Pays `member`'s contribution into the current round.
    pub async fn contribute(
        &self,
        member: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("member", member, group_id)?;
        self.submit("contribute", args, source).await
    }

    /// Sends the pot to the current round's recipient.
    pub async fn distribute_payout(
        &self,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        self.submit("distribute_payout", vec![scval::group_id(group_id)], source)
            .await
    }

    // === Admin ===

    pub async fn pause_group(
        &self,
        admin: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("admin", admin, group_id)?;
        self.submit("pause_group", args, source).await
    }

    pub async fn resume_group(
        &self,
        admin: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("admin", admin, group_id)?;
        self.submit("resume_group", args, source).await
    }

    pub async fn raise_dispute(
        &self,
        member: &Address,
        group_id: GroupId,
        reason: &str,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let mut args = member_args("member", member, group_id)?;
        args.push(scval::string("reason", reason)?);
        self.submit("raise_dispute", args, source).await
    }

    pub async fn resolve_dispute(
        &self,
        admin: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("admin", admin, group_id)?;
        self.submit("resolve_dispute", args, source).await
    }

    /// Returns remaining funds to members proportionally.
    pub async fn emergency_withdraw(
        &self,
        admin: &Address,
        group_id: GroupId,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let args = member_args("admin", admin, group_id)?;
        self.submit("emergency_withdraw", args, source).await
    }

    pub async fn set_group_admin(
        &self,
        current_admin: &Address,
        group_id: GroupId,
        new_admin: &Address,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let mut args = member_args("current_admin", current_admin, group_id)?;
        args.push(scval::address("new_admin", new_admin)?);
        self.submit("set_group_admin", args, source).await
    }

    // === Queries ===

    pub async fn get_group(&self, group_id: GroupId) -> Result<SavingsGroup, SorosaveError> {
        self.query("get_group", vec![scval::group_id(group_id)], Decoder::group)
            .await
    }

    pub async fn get_round_status(
        &self,
        group_id: GroupId,
        round: u32,
    ) -> Result<RoundInfo, SorosaveError> {
        let args = vec![scval::group_id(group_id), scval::u32(round)];
        self.query("get_round_status", args, Decoder::round).await
    }

    /// Groups `member` has joined.
    pub async fn get_member_groups(&self, member: &Address) -> Result<Vec<GroupId>, SorosaveError> {
        let args = vec![scval::address("member", member)?];
        self.query("get_member_groups", args, Decoder::group_ids)
            .await
    }

    pub async fn has_contributed(
        &self,
        member: &Address,
        group_id: GroupId,
        round: u32,
    ) -> Result<bool, SorosaveError> {
        let mut args = member_args("member", member, group_id)?;
        args.push(scval::u32(round));
        self.query("has_contributed", args, Decoder::bool).await
    }

    pub async fn get_payout_order(&self, group_id: GroupId) -> Result<Vec<Address>, SorosaveError> {
        self.query(
            "get_payout_order",
            vec![scval::group_id(group_id)],
            Decoder::addresses,
        )
        .await
    }

    pub async fn get_current_recipient(&self, group_id: GroupId) -> Result<Address, SorosaveError> {
        self.query(
            "get_current_recipient",
            vec![scval::group_id(group_id)],
            Decoder::address,
        )
        .await
    }

    // === Pipeline ===

    /// Simulates, then assembles the envelope for `source` to sign.
    async fn submit(
        &self,
        function: &'static str,
        args: Vec<ScVal>,
        source: &Address,
    ) -> Result<UnsignedTransaction, SorosaveError> {
        let (envelope, simulation) = self
            .simulate(function, args, Source::Account(source))
            .await?;
        let assembled = envelope.assemble(&simulation)?;
        debug!(function, fee = assembled.fee(), "assembled envelope");
        Ok(assembled)
    }

    /// Simulates, then decodes the return value.
    async fn query<T>(
        &self,
        function: &'static str,
        args: Vec<ScVal>,
        decode: impl FnOnce(&Decoder, &Value) -> Result<T, SorosaveError>,
    ) -> Result<T, SorosaveError> {
        let (_, simulation) = self.simulate(function, args, Source::Throwaway).await?;
        let retval = simulation.retval.ok_or(SorosaveError::EmptyResult)?;
        self.decoder.from_scval(&retval, decode)
    }

    /// Shared stage of every call: encode, build, simulate.
    async fn simulate(
        &self,
        function: &'static str,
        args: Vec<ScVal>,
        source: Source<'_>,
    ) -> Result<(UnsignedTransaction, Simulation), SorosaveError> {
        let invocation = invoke_contract(&self.contract_id, function, args)?;
        debug!(function, args = invocation.args.len(), "encoded invocation");

        let account = match source {
            Source::Account(address) => {
                let account = self.rpc.get_account(address).await?;
                debug!(
                    function,
                    source = %account.address,
                    sequence = account.sequence,
                    "loaded source account"
                );
                account
            }
            Source::Throwaway => SourceAccount::new(KeyPair::random().address(), 0),
        };

        let envelope = TransactionBuilder::new(account, self.network_passphrase.as_str())
            .fee(BASE_FEE)
            .timeout(TIMEOUT_SECS)
            .operation(invocation)
            .build()?;

        let simulation = self
            .rpc
            .simulate_transaction(&envelope)
            .await?
            .into_simulation()
            .inspect_err(|e| debug!(function, error = %e, "simulation rejected"))?;
        debug!(
            function,
            min_resource_fee = simulation.min_resource_fee,
            latest_ledger = simulation.latest_ledger,
            "simulated"
        );

        Ok((envelope, simulation))
    }
}

/// `(address, group_id)`, the leading arguments of most contract methods.
fn member_args(
    field: &'static str,
    address: &Address,
    group_id: GroupId,
) -> Result<Vec<ScVal>, SorosaveError> {
    Ok(vec![scval::address(field, address)?, scval::group_id(group_id)])
}
