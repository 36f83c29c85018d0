// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Postgres SQLSTATE → [`ErrorKind`] mapping (spec §7 "Mapping (authoritative)").

use docbase_core::ErrorKind;

/// Map a Postgres SQLSTATE code to the backend-neutral taxonomy. Codes not
/// in the authoritative table pass through as `None`, letting the caller
/// fall back to [`ErrorKind::Database`] (spec §7 "unknown error codes pass
/// through unwrapped").
pub fn map_code(code: &str) -> Option<ErrorKind> {
    match code {
        "57014" => Some(ErrorKind::Timeout),
        "42P07" => Some(ErrorKind::Duplicate),
        "42701" => Some(ErrorKind::Duplicate),
        "23505" => Some(ErrorKind::Duplicate),
        "22001" => Some(ErrorKind::Truncation),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(map_code("57014"), Some(ErrorKind::Timeout));
        assert_eq!(map_code("23505"), Some(ErrorKind::Duplicate));
        assert_eq!(map_code("42P07"), Some(ErrorKind::Duplicate));
        assert_eq!(map_code("22001"), Some(ErrorKind::Truncation));
    }

    #[test]
    fn unknown_code_maps_to_none() {
        assert_eq!(map_code("99999"), None);
    }
}
