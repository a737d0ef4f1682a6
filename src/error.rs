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

//! Error types for transaction construction and result decoding.

use thiserror::Error;

/// SDK errors, one variant per failing stage of a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SorosaveError {
    /// Argument does not fit its wire type
    #[error("cannot encode `{field}`: {reason}")]
    Encoding { field: &'static str, reason: String },

    /// Amount text is not a valid decimal literal
    #[error("invalid amount format: {0}")]
    InvalidFormat(String),

    /// Source account does not exist on the ledger
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// RPC endpoint unreachable or returned a malformed response
    #[error("transport error: {0}")]
    Transport(String),

    /// Ledger rejected the invocation during simulation
    #[error("simulation failed: {reason}")]
    SimulationFailed { reason: String },

    /// Simulation succeeded but returned no value
    #[error("no result from simulation")]
    EmptyResult,

    /// Return value did not have the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Client configuration is incomplete or malformed
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    AccountLookup,
    Simulate,
    Extract,
    Decode,
    Config,
}

impl SorosaveError {
    pub(crate) fn encoding(field: &'static str, reason: impl Into<String>) -> Self {
        SorosaveError::Encoding {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        SorosaveError::Decode(reason.into())
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Encoding { .. } | Self::InvalidFormat(_) => Stage::Encode,
            Self::AccountNotFound(_) => Stage::AccountLookup,
            Self::Transport(_) | Self::SimulationFailed { .. } => Stage::Simulate,
            Self::EmptyResult => Stage::Extract,
            Self::Decode(_) => Stage::Decode,
            Self::Config(_) => Stage::Config,
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Simulation failures are business-rule rejections and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::AccountNotFound(_))
    }

    /// Contract error embedded in a simulation failure, if any.
    ///
    /// The simulator reports contract panics as `Error(Contract, #N)`.
    pub fn contract_error(&self) -> Option<ContractError> {
        let Self::SimulationFailed { reason } = self else {
            return None;
        };
        let start = reason.find("Error(Contract, #")? + "Error(Contract, #".len();
        let digits: String = reason[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        ContractError::from_code(digits.parse().ok()?)
    }
}

/// Error codes raised by the savings contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ContractError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    GroupNotFound = 4,
    GroupFull = 5,
    AlreadyMember = 6,
    NotMember = 7,
    GroupNotActive = 8,
    AlreadyContributed = 9,
    RoundNotActive = 10,
    InvalidAmount = 11,
    GroupNotForming = 12,
    PayoutFailed = 13,
    GroupPaused = 14,
    DisputeActive = 15,
    InsufficientMembers = 16,
    RoundNotComplete = 17,
    GroupCompleted = 18,
}

impl ContractError {
    pub fn from_code(code: u32) -> Option<Self> {
        use ContractError::*;
        let error = match code {
            1 => NotInitialized,
            2 => AlreadyInitialized,
            3 => Unauthorized,
            4 => GroupNotFound,
            5 => GroupFull,
            6 => AlreadyMember,
            7 => NotMember,
            8 => GroupNotActive,
            9 => AlreadyContributed,
            10 => RoundNotActive,
            11 => InvalidAmount,
            12 => GroupNotForming,
            13 => PayoutFailed,
            14 => GroupPaused,
            15 => DisputeActive,
            16 => InsufficientMembers,
            17 => RoundNotComplete,
            18 => GroupCompleted,
            _ => return None,
        };
        Some(error)
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            SorosaveError::encoding("max_members", "out of range").to_string(),
            "cannot encode `max_members`: out of range"
        );
        assert_eq!(
            SorosaveError::AccountNotFound("G_SOURCE".into()).to_string(),
            "account not found: G_SOURCE"
        );
        assert_eq!(
            SorosaveError::SimulationFailed {
                reason: "group already active".into()
            }
            .to_string(),
            "simulation failed: group already active"
        );
        assert_eq!(SorosaveError::EmptyResult.to_string(), "no result from simulation");
        assert_eq!(
            SorosaveError::decode("expected a map").to_string(),
            "decode error: expected a map"
        );
    }

    #[test]
    fn stages_and_retry_policy() {
        assert_eq!(SorosaveError::EmptyResult.stage(), Stage::Extract);
        assert_eq!(
            SorosaveError::AccountNotFound("G".into()).stage(),
            Stage::AccountLookup
        );
        assert!(SorosaveError::Transport("connection refused".into()).is_retryable());
        assert!(
            !SorosaveError::SimulationFailed {
                reason: "x".into()
            }
            .is_retryable()
        );
        assert!(!SorosaveError::decode("x").is_retryable());
    }

    #[test]
    fn contract_error_parsed_from_reason() {
        let error = SorosaveError::SimulationFailed {
            reason: "HostError: Error(Contract, #8)\n\nEvent log (newest first): ...".into(),
        };
        assert_eq!(error.contract_error(), Some(ContractError::GroupNotActive));
        assert_eq!(ContractError::GroupNotActive.code(), 8);
    }

    #[test]
    fn contract_error_absent_for_other_failures() {
        let error = SorosaveError::SimulationFailed {
            reason: "Error(Auth, InvalidAction)".into(),
        };
        assert_eq!(error.contract_error(), None);
        assert_eq!(SorosaveError::EmptyResult.contract_error(), None);
        assert_eq!(ContractError::from_code(99), None);
    }
}
