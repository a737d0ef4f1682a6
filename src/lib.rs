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

//! # SoroSave SDK
//!
//! Typed client for the SoroSave rotating-savings contract. Group
//! operations become simulated, fee-assembled, unsigned Stellar
//! transactions; queries come back as decoded records.
//!
//! ## Core Components
//!
//! - [`SoroSaveClient`]: One method per contract function, over a shared
//!   encode → build → simulate pipeline
//! - [`scval`]: Argument encoder onto XDR [`ScVal`] and its native form
//! - [`UnsignedTransaction`]: Base64 envelope and hash ready for a wallet
//! - [`Decoder`]: Return values to [`SavingsGroup`], [`RoundInfo`] and friends
//! - [`amount`]: Fixed-point amount codec
//! - [`notify`]: Subscription registry and alert fan-out for chat bots
//! - [`SorosaveError`]: Failure taxonomy, one variant per pipeline stage
//!
//! ## Example
//!
//! ```no_run
//! use sorosave_sdk::{GroupId, SoroSaveClient, SoroSaveConfig};
//!
//! # async fn run() -> Result<(), sorosave_sdk::SorosaveError> {
//! let config = SoroSaveConfig::testnet("CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABSC4");
//! let client = SoroSaveClient::new(config)?;
//!
//! let group = client.get_group(GroupId(7)).await?;
//! println!("{} has {} members", group.name, group.members.len());
//!
//! let member = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF".into();
//! let transaction = client.contribute(&member, group.id, &member).await?;
//! // Sign `transaction.hash()?` with your wallet and submit the envelope.
//! println!("{}", transaction.to_xdr_base64()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The client holds no mutable state and may be shared across tasks.
//! Each call performs at most two sequential network round trips.

pub mod amount;
mod base;
mod client;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod format;
pub mod keys;
pub mod notify;
pub mod rpc;
pub mod scval;
mod types;

pub use base::{Address, GroupId};
pub use client::SoroSaveClient;
pub use decode::{Decoder, StatusPolicy};
pub use envelope::{SourceAccount, TransactionBuilder, UnsignedTransaction, invoke_contract};
pub use error::{ContractError, SorosaveError, Stage};
pub use rpc::{HostFunctionResult, HttpRpc, LedgerRpc, SimulateResponse, Simulation};
pub use scval::{ScMapEntry, ScVal};
pub use stellar_xdr::curr as xdr;
pub use types::{
    CreateGroupParams, Dispute, GroupStatus, MAINNET_PASSPHRASE, RoundInfo, SavingsGroup,
    SoroSaveConfig, TESTNET_PASSPHRASE, TESTNET_RPC_URL,
};
