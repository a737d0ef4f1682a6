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

//! Savings group domain records.
//!
//! Records are immutable snapshots produced by decoding query results.
//! A fresh query yields a fresh snapshot; nothing here is updated in place.

use crate::SorosaveError;
use crate::amount;
use crate::base::{Address, GroupId};
use crate::keys::decode_contract_id;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of a savings group.
///
/// ```text
/// Forming ──start──► Active ──last round──► Completed
///                     │  ▲
///          dispute ◄──┘  └──resume── Paused ◄──pause── Active
/// ```
///
/// Labels the SDK does not recognize decode to [`GroupStatus::Unknown`]
/// carrying the raw text, so callers decide how to treat them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupStatus {
    Forming,
    Active,
    Completed,
    Disputed,
    Paused,
    Unknown(String),
}

impl GroupStatus {
    /// Parses a contract variant name.
    pub fn parse(label: &str) -> Self {
        match label {
            "Forming" => Self::Forming,
            "Active" => Self::Active,
            "Completed" => Self::Completed,
            "Disputed" => Self::Disputed,
            "Paused" => Self::Paused,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Contract variant name, or the raw label for unknown statuses.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Forming => "Forming",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Disputed => "Disputed",
            Self::Paused => "Paused",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GroupStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Snapshot of one on-ledger savings group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavingsGroup {
    pub id: GroupId,
    pub name: String,
    pub admin: Address,
    pub token: Address,
    /// Per-round contribution in token base units.
    #[serde(with = "i128_str")]
    pub contribution_amount: i128,
    /// Seconds between rounds.
    pub cycle_length: u64,
    pub max_members: u32,
    /// Members in join order.
    pub members: Vec<Address>,
    /// Payout rotation, fixed when the group starts.
    pub payout_order: Vec<Address>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub status: GroupStatus,
    /// Unix seconds.
    pub created_at: u64,
}

impl SavingsGroup {
    /// Amount paid out each round once every member has contributed.
    pub fn pot_size(&self) -> Option<i128> {
        let members = u32::try_from(self.members.len()).ok()?;
        amount::pot_size(self.contribution_amount, members)
    }

    /// One-based round in which `member` receives the pot.
    pub fn payout_round(&self, member: &Address) -> Option<u32> {
        let index = self.payout_order.iter().position(|a| a == member)?;
        u32::try_from(index + 1).ok()
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.members.contains(address)
    }
}

/// Snapshot of one contribution round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundInfo {
    pub round_number: u32,
    pub recipient: Address,
    /// Whether each member has paid into this round.
    pub contributions: BTreeMap<Address, bool>,
    #[serde(with = "i128_str")]
    pub total_contributed: i128,
    pub is_complete: bool,
    /// Unix seconds.
    pub deadline: u64,
}

impl RoundInfo {
    /// Members that have not contributed yet.
    pub fn outstanding(&self) -> impl Iterator<Item = &Address> {
        self.contributions
            .iter()
            .filter(|(_, paid)| !**paid)
            .map(|(member, _)| member)
    }
}

/// A dispute raised against a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispute {
    pub raised_by: Address,
    pub reason: String,
    pub raised_at: u64,
}

/// Arguments for `create_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub admin: Address,
    pub name: String,
    /// Token contract used for contributions and payouts.
    pub token: Address,
    #[serde(with = "i128_str")]
    pub contribution_amount: i128,
    pub cycle_length: u64,
    pub max_members: u32,
}

/// Passphrase of the public Stellar test network.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Passphrase of the public Stellar network.
pub const MAINNET_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// Public testnet RPC endpoint.
pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";

/// Connection settings for a [`SoroSaveClient`](crate::SoroSaveClient).
///
/// Fixed at client construction; there is no way to change them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoroSaveConfig {
    pub contract_id: String,
    pub rpc_url: String,
    pub network_passphrase: String,
}

impl SoroSaveConfig {
    pub fn new(
        contract_id: impl Into<String>,
        rpc_url: impl Into<String>,
        network_passphrase: impl Into<String>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            rpc_url: rpc_url.into(),
            network_passphrase: network_passphrase.into(),
        }
    }

    pub fn testnet(contract_id: impl Into<String>) -> Self {
        Self::new(contract_id, TESTNET_RPC_URL, TESTNET_PASSPHRASE)
    }

    /// # Errors
    ///
    /// Returns [`SorosaveError::Config`] if a field is blank, the contract
    /// id is not a `C...` strkey, or the RPC URL is not http(s).
    pub fn validate(&self) -> Result<(), SorosaveError> {
        if self.contract_id.trim().is_empty() {
            return Err(SorosaveError::Config("contract id is empty".into()));
        }
        if decode_contract_id(&self.contract_id).is_none() {
            return Err(SorosaveError::Config(format!(
                "contract id is not a contract strkey: {}",
                self.contract_id
            )));
        }
        if self.network_passphrase.trim().is_empty() {
            return Err(SorosaveError::Config("network passphrase is empty".into()));
        }
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(SorosaveError::Config(format!(
                "rpc url must be http(s): {}",
                self.rpc_url
            )));
        }
        Ok(())
    }
}

/// `i128` amounts travel as decimal strings; JSON numbers cannot hold them.
mod i128_str {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(D::Error::custom),
            Repr::Number(n) => Ok(i128::from(n)),
        }
    }
}
