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

//! Display helpers for group data.

use crate::types::GroupStatus;

/// Human-facing label for a group status.
pub fn status_label(status: &GroupStatus) -> &str {
    match status {
        GroupStatus::Forming => "Accepting Members",
        GroupStatus::Active => "Active",
        GroupStatus::Completed => "Completed",
        GroupStatus::Disputed => "Under Dispute",
        GroupStatus::Paused => "Paused",
        GroupStatus::Unknown(raw) => raw,
    }
}

/// Keeps `chars` characters at each end of an address: `GABC...WXYZ`.
pub fn shorten_address(address: &str, chars: usize) -> String {
    abbreviate(address, chars, chars)
}

/// Keeps `head` leading and `tail` trailing characters.
///
/// Addresses too short to benefit are returned unchanged.
pub fn abbreviate(address: &str, head: usize, tail: usize) -> String {
    let count = address.chars().count();
    if count <= head + tail + 3 {
        return address.to_string();
    }
    let start: String = address.chars().take(head).collect();
    let end: String = address.chars().skip(count - tail).collect();
    format!("{start}...{end}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_for_each_status() {
        assert_eq!(status_label(&GroupStatus::Forming), "Accepting Members");
        assert_eq!(status_label(&GroupStatus::Disputed), "Under Dispute");
        assert_eq!(status_label(&GroupStatus::Unknown("Frozen".into())), "Frozen");
    }

    #[test]
    fn shortens_long_addresses() {
        let address = "GAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB7JZX";
        assert_eq!(shorten_address(address, 4), "GAAA...7JZX");
        assert_eq!(abbreviate(address, 6, 4), "GAAACA...7JZX");
    }

    #[test]
    fn short_addresses_unchanged() {
        assert_eq!(shorten_address("G_ADMIN", 4), "G_ADMIN");
        assert_eq!(abbreviate("GABCDEFGHIJ", 6, 4), "GABCDEFGHIJ");
    }
}
