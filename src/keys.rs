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

//! Throwaway key pairs and strkey addresses.
//!
//! A strkey is `version byte | 32-byte payload | CRC16-XModem (LE)`,
//! base32-encoded without padding: 56 characters, `G...` for ed25519
//! accounts and `C...` for contracts.

use crate::base::Address;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

/// Strkey version byte for ed25519 account ids (`G...`).
const ACCOUNT_ID_VERSION: u8 = 6 << 3;
/// Strkey version byte for contract ids (`C...`).
const CONTRACT_VERSION: u8 = 2 << 3;

const STRKEY_LEN: usize = 56;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// An ed25519 key pair.
///
/// Used only as the source of simulation-only envelopes; the secret half
/// never leaves this struct.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        Address::new(encode_account_id(&self.public_key()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Renders an ed25519 public key as a `G...` account strkey.
pub fn encode_account_id(public_key: &[u8; 32]) -> String {
    encode_check(ACCOUNT_ID_VERSION, public_key)
}

/// Renders a contract hash as a `C...` contract strkey.
pub fn encode_contract_id(hash: &[u8; 32]) -> String {
    encode_check(CONTRACT_VERSION, hash)
}

/// Public key of a `G...` strkey; `None` if malformed or not an account.
pub fn decode_account_id(strkey: &str) -> Option<[u8; 32]> {
    decode_check(ACCOUNT_ID_VERSION, strkey)
}

/// Contract hash of a `C...` strkey; `None` if malformed or not a contract.
pub fn decode_contract_id(strkey: &str) -> Option<[u8; 32]> {
    decode_check(CONTRACT_VERSION, strkey)
}

fn encode_check(version: u8, payload: &[u8; 32]) -> String {
    let mut raw = [0u8; 35];
    raw[0] = version;
    raw[1..33].copy_from_slice(payload);
    let checksum = crc16_xmodem(&raw[..33]);
    raw[33..].copy_from_slice(&checksum.to_le_bytes());
    encode_base32(&raw)
}

fn decode_check(version: u8, strkey: &str) -> Option<[u8; 32]> {
    if strkey.len() != STRKEY_LEN {
        return None;
    }
    let raw: [u8; 35] = decode_base32_fixed(strkey)?;
    if raw[0] != version {
        return None;
    }
    let checksum = u16::from_le_bytes([raw[33], raw[34]]);
    if crc16_xmodem(&raw[..33]) != checksum {
        return None;
    }
    let mut payload = [0u8; 32];
    payload.copy_from_slice(&raw[1..33]);
    Some(payload)
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// RFC 4648 base32 without padding.
fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 31) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 31) as usize] as char);
    }
    out
}

/// Decodes into exactly `N` bytes; `None` on invalid characters, wrong
/// length or non-zero trailing bits.
fn decode_base32_fixed<const N: usize>(text: &str) -> Option<[u8; N]> {
    let mut result = [0u8; N];
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    let mut pos = 0;

    for c in text.bytes() {
        let value = *BASE32_DECODE.get(usize::from(c))?;
        if value == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            *result.get_mut(pos)? = (buffer >> bits) as u8;
            pos += 1;
        }
        buffer &= (1 << bits) - 1;
    }

    (pos == N && buffer == 0).then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ACCOUNT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";
    const ZERO_CONTRACT: &str = "CAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABSC4";

    #[test]
    fn zero_keys_match_known_strkeys() {
        assert_eq!(encode_account_id(&[0u8; 32]), ZERO_ACCOUNT);
        assert_eq!(encode_contract_id(&[0u8; 32]), ZERO_CONTRACT);
    }

    #[test]
    fn sequential_keys_match_known_strkeys() {
        let key: [u8; 32] = std::array::from_fn(|i| i as u8);
        assert_eq!(
            encode_account_id(&key),
            "GAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB7JZX"
        );
        assert_eq!(
            encode_contract_id(&key),
            "CAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB6N4O"
        );
    }

    #[test]
    fn decode_reverses_encode() {
        let key = [7u8; 32];
        assert_eq!(decode_account_id(&encode_account_id(&key)), Some(key));
        assert_eq!(decode_contract_id(&encode_contract_id(&key)), Some(key));
    }

    #[test]
    fn decode_rejects_wrong_kind_and_bad_checksum() {
        assert_eq!(decode_contract_id(ZERO_ACCOUNT), None);
        assert_eq!(decode_account_id(ZERO_CONTRACT), None);

        let tampered = ZERO_ACCOUNT.replace("WHF", "WHG");
        assert_eq!(decode_account_id(&tampered), None);
        assert_eq!(decode_account_id("G_ADMIN"), None);
        assert_eq!(decode_account_id(&ZERO_ACCOUNT.to_lowercase()), None);
    }

    #[test]
    fn random_key_pairs_are_distinct_accounts() {
        let a = KeyPair::random().address();
        let b = KeyPair::random().address();
        assert_ne!(a, b);
        assert!(decode_account_id(a.as_str()).is_some());
    }
}
