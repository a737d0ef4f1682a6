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

//! Decoding of contract return values into domain records.
//!
//! Input is the untagged native form produced by [`scval::to_native`]:
//! plain strings, numbers, arrays and objects. Amounts are parsed from
//! their decimal-string form straight into `i128`, never through floats.

use crate::SorosaveError;
use crate::base::{Address, GroupId};
use crate::scval::{self, ScVal};
use crate::types::{Dispute, GroupStatus, RoundInfo, SavingsGroup};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// How unrecognized status labels are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Surface the raw label as [`GroupStatus::Unknown`].
    #[default]
    Preserve,
    /// Treat unrecognized labels as [`GroupStatus::Forming`].
    FallbackToForming,
}

/// Reshapes native values into records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    status_policy: StatusPolicy,
}

impl Decoder {
    pub fn new(status_policy: StatusPolicy) -> Self {
        Self { status_policy }
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.status_policy
    }

    /// # Errors
    ///
    /// Returns [`SorosaveError::Decode`] if `raw` is not a map or a field
    /// is missing or has the wrong type.
    pub fn group(&self, raw: &Value) -> Result<SavingsGroup, SorosaveError> {
        let fields = Fields::of(raw, "group")?;
        Ok(SavingsGroup {
            id: GroupId(fields.u64("id")?),
            name: fields.string("name")?,
            admin: fields.address("admin")?,
            token: fields.address("token")?,
            contribution_amount: fields.i128("contribution_amount")?,
            cycle_length: fields.u64("cycle_length")?,
            max_members: fields.u32("max_members")?,
            members: fields.addresses("members")?,
            payout_order: fields.addresses("payout_order")?,
            current_round: fields.u32("current_round")?,
            total_rounds: fields.u32("total_rounds")?,
            status: self.status(fields.get("status")?)?,
            created_at: fields.u64("created_at")?,
        })
    }

    pub fn round(&self, raw: &Value) -> Result<RoundInfo, SorosaveError> {
        let fields = Fields::of(raw, "round")?;
        Ok(RoundInfo {
            round_number: fields.u32("round_number")?,
            recipient: fields.address("recipient")?,
            contributions: fields.contributions("contributions")?,
            total_contributed: fields.i128("total_contributed")?,
            is_complete: fields.bool("is_complete")?,
            deadline: fields.u64("deadline")?,
        })
    }

    pub fn dispute(&self, raw: &Value) -> Result<Dispute, SorosaveError> {
        let fields = Fields::of(raw, "dispute")?;
        Ok(Dispute {
            raised_by: fields.address("raised_by")?,
            reason: fields.string("reason")?,
            raised_at: fields.u64("raised_at")?,
        })
    }

    /// Decodes a status label.
    ///
    /// Contract enums arrive either as the bare variant name or as a
    /// one-element list holding it.
    pub fn status(&self, raw: &Value) -> Result<GroupStatus, SorosaveError> {
        let label = match raw {
            Value::String(label) => label.as_str(),
            Value::Array(items) if items.len() == 1 => items[0]
                .as_str()
                .ok_or_else(|| SorosaveError::decode("status variant is not a string"))?,
            other => {
                return Err(SorosaveError::decode(format!(
                    "status must be a string, got {other}"
                )));
            }
        };

        match (GroupStatus::parse(label), self.status_policy) {
            (GroupStatus::Unknown(raw), StatusPolicy::FallbackToForming) => {
                warn!(label = %raw, "unrecognized group status, treating as Forming");
                Ok(GroupStatus::Forming)
            }
            (status, _) => Ok(status),
        }
    }

    pub fn group_ids(&self, raw: &Value) -> Result<Vec<GroupId>, SorosaveError> {
        list(raw, "group ids")?
            .iter()
            .map(|item| to_u64(item, "group id").map(GroupId))
            .collect()
    }

    pub fn addresses(&self, raw: &Value) -> Result<Vec<Address>, SorosaveError> {
        list(raw, "addresses")?
            .iter()
            .map(|item| to_address(item, "address"))
            .collect()
    }

    pub fn address(&self, raw: &Value) -> Result<Address, SorosaveError> {
        to_address(raw, "address")
    }

    pub fn bool(&self, raw: &Value) -> Result<bool, SorosaveError> {
        raw.as_bool()
            .ok_or_else(|| SorosaveError::decode(format!("expected a bool, got {raw}")))
    }

    /// Untags a ledger value and decodes it with `decode`.
    pub fn from_scval<T>(
        &self,
        value: &ScVal,
        decode: impl FnOnce(&Self, &Value) -> Result<T, SorosaveError>,
    ) -> Result<T, SorosaveError> {
        decode(self, &scval::to_native(value))
    }
}

/// Borrowed view over a record's fields.
struct Fields<'a> {
    record: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn of(raw: &'a Value, record: &'static str) -> Result<Self, SorosaveError> {
        match raw {
            Value::Object(map) => Ok(Self { record, map }),
            other => Err(SorosaveError::decode(format!(
                "{record}: expected a map, got {}",
                kind(other)
            ))),
        }
    }

    fn get(&self, name: &str) -> Result<&'a Value, SorosaveError> {
        self.map
            .get(name)
            .ok_or_else(|| SorosaveError::decode(format!("{}: missing field `{name}`", self.record)))
    }

    fn context(&self, name: &str) -> String {
        format!("{}.{name}", self.record)
    }

    fn u64(&self, name: &str) -> Result<u64, SorosaveError> {
        to_u64(self.get(name)?, &self.context(name))
    }

    fn u32(&self, name: &str) -> Result<u32, SorosaveError> {
        let value = self.u64(name)?;
        u32::try_from(value).map_err(|_| {
            SorosaveError::decode(format!("{}: {value} does not fit in u32", self.context(name)))
        })
    }

    fn i128(&self, name: &str) -> Result<i128, SorosaveError> {
        let value = self.get(name)?;
        let parsed = match value {
            Value::String(text) => text.parse::<i128>().ok(),
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from)),
            _ => None,
        };
        parsed.ok_or_else(|| {
            SorosaveError::decode(format!(
                "{}: expected a 128-bit integer, got {value}",
                self.context(name)
            ))
        })
    }

    fn string(&self, name: &str) -> Result<String, SorosaveError> {
        match self.get(name)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(SorosaveError::decode(format!(
                "{}: expected a string, got {}",
                self.context(name),
                kind(other)
            ))),
        }
    }

    fn bool(&self, name: &str) -> Result<bool, SorosaveError> {
        self.get(name)?.as_bool().ok_or_else(|| {
            SorosaveError::decode(format!("{}: expected a bool", self.context(name)))
        })
    }

    fn address(&self, name: &str) -> Result<Address, SorosaveError> {
        to_address(self.get(name)?, &self.context(name))
    }

    fn addresses(&self, name: &str) -> Result<Vec<Address>, SorosaveError> {
        let context = self.context(name);
        list(self.get(name)?, &context)?
            .iter()
            .map(|item| to_address(item, &context))
            .collect()
    }

    fn contributions(&self, name: &str) -> Result<BTreeMap<Address, bool>, SorosaveError> {
        let context = self.context(name);
        let Value::Object(entries) = self.get(name)? else {
            return Err(SorosaveError::decode(format!("{context}: expected a map")));
        };
        entries
            .iter()
            .map(|(member, paid)| -> Result<(Address, bool), SorosaveError> {
                let paid = paid.as_bool().ok_or_else(|| {
                    SorosaveError::decode(format!("{context}[{member}]: expected a bool"))
                })?;
                Ok((Address::new(member.clone()), paid))
            })
            .collect()
    }
}

fn list<'a>(raw: &'a Value, context: &str) -> Result<&'a Vec<Value>, SorosaveError> {
    raw.as_array().ok_or_else(|| {
        SorosaveError::decode(format!("{context}: expected a list, got {}", kind(raw)))
    })
}

fn to_u64(raw: &Value, context: &str) -> Result<u64, SorosaveError> {
    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SorosaveError::decode(format!("{context}: expected an unsigned integer, got {raw}"))
    })
}

fn to_address(raw: &Value, context: &str) -> Result<Address, SorosaveError> {
    raw.as_str()
        .map(Address::from)
        .ok_or_else(|| SorosaveError::decode(format!("{context}: expected an address, got {raw}")))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_json(status: Value) -> Value {
        json!({
            "id": 7,
            "name": "Pool A",
            "admin": "G_ADMIN",
            "token": "TOKEN1",
            "contribution_amount": "10000000",
            "cycle_length": 604800,
            "max_members": 5,
            "members": ["G1", "G2"],
            "payout_order": [],
            "current_round": 0,
            "total_rounds": 5,
            "status": status,
            "created_at": 1700000000u64
        })
    }

    #[test]
    fn decodes_group_snapshot() {
        let group = Decoder::default().group(&group_json(json!("Forming"))).unwrap();
        assert_eq!(group.id, GroupId(7));
        assert_eq!(group.contribution_amount, 10_000_000);
        assert_eq!(group.status, GroupStatus::Forming);
        assert_eq!(group.members, vec![Address::from("G1"), Address::from("G2")]);
        assert!(group.payout_order.is_empty());
        assert_eq!(group.created_at, 1_700_000_000);
    }

    #[test]
    fn status_as_enum_vector() {
        let group = Decoder::default().group(&group_json(json!(["Active"]))).unwrap();
        assert_eq!(group.status, GroupStatus::Active);
    }

    #[test]
    fn unknown_status_preserved_by_default() {
        let status = Decoder::default().status(&json!("SomeUnknownLabel")).unwrap();
        assert_eq!(status, GroupStatus::Unknown("SomeUnknownLabel".into()));
    }

    #[test]
    fn unknown_status_falls_back_when_lenient() {
        let decoder = Decoder::new(StatusPolicy::FallbackToForming);
        assert_eq!(
            decoder.status(&json!("SomeUnknownLabel")).unwrap(),
            GroupStatus::Forming
        );
        assert_eq!(decoder.status(&json!("Active")).unwrap(), GroupStatus::Active);
    }

    #[test]
    fn non_map_payload_is_an_error() {
        let result = Decoder::default().group(&json!(42));
        assert_eq!(
            result,
            Err(SorosaveError::Decode("group: expected a map, got number".into()))
        );
    }

    #[test]
    fn missing_or_mistyped_fields_are_errors() {
        let mut raw = group_json(json!("Active"));
        raw.as_object_mut().unwrap().remove("admin");
        assert!(matches!(
            Decoder::default().group(&raw),
            Err(SorosaveError::Decode(msg)) if msg.contains("`admin`")
        ));

        let mut raw = group_json(json!("Active"));
        raw["max_members"] = json!(5_000_000_000u64);
        assert!(Decoder::default().group(&raw).is_err());

        let mut raw = group_json(json!("Active"));
        raw["contribution_amount"] = json!(1.5);
        assert!(Decoder::default().group(&raw).is_err());
    }

    #[test]
    fn decodes_round() {
        let round = Decoder::default()
            .round(&json!({
                "round_number": 2,
                "recipient": "G2",
                "contributions": {"G1": true, "G2": false},
                "total_contributed": "170141183460469231731687303715884105727",
                "is_complete": false,
                "deadline": 1700604800u64
            }))
            .unwrap();
        assert_eq!(round.round_number, 2);
        assert_eq!(round.contributions.len(), 2);
        assert!(round.contributions[&Address::from("G1")]);
        assert_eq!(round.total_contributed, i128::MAX);
        assert!(!round.is_complete);
    }

    #[test]
    fn decodes_dispute() {
        let dispute = Decoder::default()
            .dispute(&json!({"raised_by": "G1", "reason": "late payout", "raised_at": 5}))
            .unwrap();
        assert_eq!(dispute.raised_by, Address::from("G1"));
        assert_eq!(dispute.reason, "late payout");
    }

    #[test]
    fn decodes_lists() {
        let decoder = Decoder::default();
        assert_eq!(
            decoder.group_ids(&json!([1, 4])).unwrap(),
            vec![GroupId(1), GroupId(4)]
        );
        assert!(decoder.group_ids(&json!({"a": 1})).is_err());
        assert_eq!(
            decoder.addresses(&json!(["G1"])).unwrap(),
            vec![Address::from("G1")]
        );
    }
}
