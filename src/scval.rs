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

//! Contract argument encoding and return value untagging.
//!
//! Arguments are [`ScVal`]s, the ledger's own tagged value type. Each
//! encoder picks the wire width for its parameter and rejects input the
//! ledger cannot represent before anything reaches the network.
//! [`to_native`] turns a returned value into plain JSON for the decoder:
//!
//! ```text
//! Vec[Address(G...), U64(7), I128(10000000)]  ──►  ["G...", 7, "10000000"]
//! ```
//!
//! 128-bit integers untag to decimal strings so they survive JSON intact.

use crate::SorosaveError;
use crate::base::{Address, GroupId};
use crate::keys::{decode_account_id, decode_contract_id, encode_account_id, encode_contract_id};
use serde_json::{Map, Value};
use stellar_xdr::curr::{
    AccountId, Hash, Int128Parts, PublicKey, ScAddress, ScString, ScSymbol, StringM, UInt128Parts,
    Uint256,
};

pub use stellar_xdr::curr::{ScMapEntry, ScVal};

/// Longest symbol the ledger accepts (contract function names).
pub const SYMBOL_MAX_LEN: usize = 32;

/// Encodes an address argument.
///
/// # Errors
///
/// Returns [`SorosaveError::Encoding`] unless `address` is a valid `G...`
/// account or `C...` contract strkey.
pub fn address(field: &'static str, address: &Address) -> Result<ScVal, SorosaveError> {
    sc_address(field, address).map(ScVal::Address)
}

/// Parses a strkey into the ledger's address type.
pub fn sc_address(field: &'static str, address: &Address) -> Result<ScAddress, SorosaveError> {
    let text = address.as_str();
    let parsed = match text.chars().next() {
        Some('G') => decode_account_id(text)
            .map(|key| ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key))))),
        Some('C') => decode_contract_id(text).map(|hash| ScAddress::Contract(Hash(hash))),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SorosaveError::encoding(
            field,
            format!("`{text}` is not an account or contract strkey"),
        )
    })
}

/// Renders a ledger address as its strkey.
pub fn strkey(address: &ScAddress) -> String {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))) => {
            encode_account_id(key)
        }
        ScAddress::Contract(Hash(hash)) => encode_contract_id(hash),
    }
}

/// Encodes a UTF-8 string argument.
pub fn string(field: &'static str, text: &str) -> Result<ScVal, SorosaveError> {
    let text: StringM = text
        .try_into()
        .map_err(|e| SorosaveError::encoding(field, format!("string too long: {e}")))?;
    Ok(ScVal::String(ScString(text)))
}

/// Encodes a symbol: at most 32 characters from `[A-Za-z0-9_]`.
pub fn symbol(field: &'static str, name: &str) -> Result<ScSymbol, SorosaveError> {
    if name.is_empty() || name.len() > SYMBOL_MAX_LEN {
        return Err(SorosaveError::encoding(
            field,
            format!("symbol `{name}` must be 1..={SYMBOL_MAX_LEN} characters"),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SorosaveError::encoding(
            field,
            format!("symbol `{name}` may only contain [A-Za-z0-9_]"),
        ));
    }
    let name: StringM<32> = name
        .try_into()
        .map_err(|e| SorosaveError::encoding(field, format!("{e}")))?;
    Ok(ScSymbol(name))
}

pub fn u32(value: u32) -> ScVal {
    ScVal::U32(value)
}

pub fn u64(value: u64) -> ScVal {
    ScVal::U64(value)
}

pub fn i128(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

pub fn group_id(id: GroupId) -> ScVal {
    ScVal::U64(id.0)
}

/// Reassembles a signed 128-bit integer from its XDR halves.
pub fn i128_value(parts: &Int128Parts) -> i128 {
    (i128::from(parts.hi) << 64) | i128::from(parts.lo)
}

fn u128_value(parts: &UInt128Parts) -> u128 {
    (u128::from(parts.hi) << 64) | u128::from(parts.lo)
}

/// Untags a value into JSON.
///
/// Map keys become their native text; host-only values (errors, ledger
/// keys, contract instances, 256-bit integers) become `null`.
pub fn to_native(value: &ScVal) -> Value {
    match value {
        ScVal::Void => Value::Null,
        ScVal::Bool(b) => Value::Bool(*b),
        ScVal::U32(n) => Value::from(*n),
        ScVal::I32(n) => Value::from(*n),
        ScVal::U64(n) => Value::from(*n),
        ScVal::I64(n) => Value::from(*n),
        ScVal::Timepoint(t) => Value::from(t.0),
        ScVal::Duration(d) => Value::from(d.0),
        ScVal::U128(parts) => Value::String(u128_value(parts).to_string()),
        ScVal::I128(parts) => Value::String(i128_value(parts).to_string()),
        ScVal::String(s) => Value::String(String::from_utf8_lossy(&s.0).into_owned()),
        ScVal::Symbol(s) => Value::String(String::from_utf8_lossy(&s.0).into_owned()),
        ScVal::Address(a) => Value::String(strkey(a)),
        ScVal::Bytes(b) => Value::String(hex::encode(b.0.as_slice())),
        ScVal::Vec(items) => Value::Array(
            items
                .iter()
                .flat_map(|items| items.0.iter())
                .map(to_native)
                .collect(),
        ),
        ScVal::Map(entries) => {
            let mut object = Map::new();
            for entry in entries.iter().flat_map(|entries| entries.0.iter()) {
                let key = match to_native(&entry.key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                object.insert(key, to_native(&entry.val));
            }
            Value::Object(object)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stellar_xdr::curr::{Limits, ReadXdr, ScMap, ScVec, WriteXdr};

    fn account(byte: u8) -> Address {
        Address::new(encode_account_id(&[byte; 32]))
    }

    #[test]
    fn encodes_to_ledger_xdr() {
        assert_eq!(
            u64(7).to_xdr_base64(Limits::none()).unwrap(),
            "AAAABQAAAAAAAAAH"
        );
        assert_eq!(
            i128(10_000_000).to_xdr_base64(Limits::none()).unwrap(),
            "AAAACgAAAAAAAAAAAAAAAACYloA="
        );
        assert_eq!(
            ScVal::from_xdr_base64("AAAACv////////////////////s=", Limits::none()).unwrap(),
            i128(-5)
        );
    }

    #[test]
    fn i128_halves_cover_the_full_range() {
        for value in [0, 1, -1, i128::MAX, i128::MIN, 10_000_000, -10_000_000] {
            let ScVal::I128(parts) = i128(value) else {
                panic!("expected an i128");
            };
            assert_eq!(i128_value(&parts), value);
        }
    }

    #[test]
    fn addresses_must_be_strkeys() {
        let member = account(1);
        let ScVal::Address(parsed) = address("member", &member).unwrap() else {
            panic!("expected an address");
        };
        assert_eq!(strkey(&parsed), member.as_str());

        let contract = Address::new(encode_contract_id(&[9; 32]));
        assert!(matches!(
            sc_address("token", &contract).unwrap(),
            ScAddress::Contract(_)
        ));

        assert!(matches!(
            address("admin", &Address::from("G_ADMIN")),
            Err(SorosaveError::Encoding { field: "admin", .. })
        ));
        assert!(address("admin", &Address::from("")).is_err());
    }

    #[test]
    fn symbols_are_validated() {
        assert!(symbol("function", "create_group").is_ok());
        assert!(symbol("function", "create-group").is_err());
        assert!(symbol("function", "").is_err());
        assert!(symbol("function", &"x".repeat(33)).is_err());
    }

    #[test]
    fn native_form_untags_nested_values() {
        let entries = vec![
            ScMapEntry {
                key: ScVal::Symbol(symbol("key", "members").unwrap()),
                val: ScVal::Vec(Some(ScVec(
                    vec![address("m", &account(1)).unwrap()].try_into().unwrap(),
                ))),
            },
            ScMapEntry {
                key: ScVal::Symbol(symbol("key", "name").unwrap()),
                val: string("name", "Pool A").unwrap(),
            },
            ScMapEntry {
                key: ScVal::Symbol(symbol("key", "total").unwrap()),
                val: i128(-5),
            },
            ScMapEntry {
                key: u32(3),
                val: ScVal::Bool(true),
            },
        ];
        let value = ScVal::Map(Some(ScMap(entries.try_into().unwrap())));

        assert_eq!(
            to_native(&value),
            json!({
                "members": [account(1).as_str()],
                "name": "Pool A",
                "total": "-5",
                "3": true
            })
        );
        assert_eq!(to_native(&ScVal::Vec(None)), json!([]));
        assert_eq!(to_native(&ScVal::Void), Value::Null);
    }
}
