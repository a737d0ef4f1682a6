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

//! Fixed-point amount codec.
//!
//! Ledger amounts are `i128` base units with an implied decimal scale
//! (7 for Stellar assets). Conversions use integer arithmetic only.
//!
//! # Example
//!
//! ```
//! use sorosave_sdk::amount::{from_display, to_display};
//!
//! assert_eq!(to_display(12_345_678, 7), "1.2345678");
//! assert_eq!(from_display("1.5", 7).unwrap(), 15_000_000);
//! ```

use crate::SorosaveError;

/// Decimal places used by Stellar asset contracts.
pub const DEFAULT_SCALE: u32 = 7;

/// Renders base units as a decimal string.
///
/// Trailing zeros of the fraction are dropped; a whole amount prints
/// without a decimal point.
pub fn to_display(base_units: i128, scale: u32) -> String {
    let sign = if base_units < 0 { "-" } else { "" };
    let magnitude = base_units.unsigned_abs();

    // Scales above 38 overflow u128; every representable value is then a pure fraction.
    let (whole, fraction) = match 10u128.checked_pow(scale) {
        Some(divisor) => (magnitude / divisor, magnitude % divisor),
        None => (0, magnitude),
    };

    if fraction == 0 {
        return format!("{sign}{whole}");
    }

    let padded = format!("{:0>width$}", fraction, width = scale as usize);
    format!("{sign}{whole}.{}", padded.trim_end_matches('0'))
}

/// Parses a decimal string into base units.
///
/// Fraction digits beyond `scale` are truncated, not rounded.
///
/// # Errors
///
/// Returns [`SorosaveError::InvalidFormat`] if either part is not a
/// digit string or the value does not fit in an `i128`.
pub fn from_display(text: &str, scale: u32) -> Result<i128, SorosaveError> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (whole_text, fraction_text) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };

    if whole_text.is_empty() && fraction_text.is_none_or(str::is_empty) {
        return Err(invalid(text));
    }

    let whole = parse_digits(whole_text).ok_or_else(|| invalid(text))?;
    let divisor = 10u128.checked_pow(scale).ok_or_else(|| invalid(text))?;
    let mut magnitude = whole.checked_mul(divisor).ok_or_else(|| invalid(text))?;

    if let Some(fraction_text) = fraction_text {
        let kept: String = fraction_text
            .chars()
            .chain(std::iter::repeat('0'))
            .take(scale as usize)
            .collect();
        if !fraction_text.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(text));
        }
        let fraction = parse_digits(&kept).ok_or_else(|| invalid(text))?;
        magnitude = magnitude
            .checked_add(fraction)
            .ok_or_else(|| invalid(text))?;
    }

    let value = if negative {
        0i128.checked_sub_unsigned(magnitude)
    } else {
        i128::try_from(magnitude).ok()
    };
    value.ok_or_else(|| invalid(text))
}

/// Total pot for one round: contribution times member count.
///
/// Returns `None` on `i128` overflow.
pub fn pot_size(contribution_amount: i128, member_count: u32) -> Option<i128> {
    contribution_amount.checked_mul(i128::from(member_count))
}

fn parse_digits(digits: &str) -> Option<u128> {
    if digits.is_empty() {
        return Some(0);
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn invalid(text: &str) -> SorosaveError {
    SorosaveError::InvalidFormat(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_amounts_have_no_fraction() {
        assert_eq!(to_display(1000_0000000, 7), "1000");
        assert_eq!(to_display(10_000_000, 7), "1");
        assert_eq!(to_display(0, 7), "0");
    }

    #[test]
    fn fraction_is_padded_then_trimmed() {
        assert_eq!(to_display(12_345_678, 7), "1.2345678");
        assert_eq!(to_display(15_000_000, 7), "1.5");
        assert_eq!(to_display(1, 7), "0.0000001");
        assert_eq!(to_display(-15_000_000, 7), "-1.5");
    }

    #[test]
    fn extreme_values_are_exact() {
        assert_eq!(
            to_display(i128::MAX, 7),
            "17014118346046923173168730371588.4105727"
        );
        assert_eq!(
            to_display(i128::MIN, 0),
            "-170141183460469231731687303715884105728"
        );
        assert_eq!(to_display(5, 40), "0.0000000000000000000000000000000000000005");
    }

    #[test]
    fn parse_pads_and_truncates_fraction() {
        assert_eq!(from_display("1.5", 7).unwrap(), 15_000_000);
        assert_eq!(from_display("1.23456789", 7).unwrap(), 12_345_678);
        assert_eq!(from_display("1000", 7).unwrap(), 10_000_000_000);
        assert_eq!(from_display(".5", 7).unwrap(), 5_000_000);
        assert_eq!(from_display("-2.25", 7).unwrap(), -22_500_000);
    }

    #[test]
    fn parse_rejects_non_numeric_text() {
        assert!(matches!(
            from_display("abc", 7),
            Err(SorosaveError::InvalidFormat(_))
        ));
        assert!(from_display("1.2x", 7).is_err());
        assert!(from_display("", 7).is_err());
        assert!(from_display("1e5", 7).is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(from_display("170141183460469231731687303715884105728", 0).is_err());
        assert_eq!(
            from_display("-170141183460469231731687303715884105728", 0).unwrap(),
            i128::MIN
        );
        assert!(from_display("17014118346046923173168730371588.4105728", 7).is_err());
    }

    #[test]
    fn pot_size_uses_integer_arithmetic() {
        assert_eq!(pot_size(10_000_000, 5), Some(50_000_000));
        assert_eq!(pot_size(i128::MAX, 2), None);
    }
}
