// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! MariaDB/MySQL numeric error-code → [`ErrorKind`] mapping (spec §7
//! "Mapping (authoritative)").

use docbase_core::ErrorKind;

/// Map a MySQL/MariaDB numeric error code (as returned by `sqlx`'s
/// `DatabaseError::code()`) to the backend-neutral taxonomy.
///
/// `1969` (`ER_STATEMENT_TIMEOUT`) is MariaDB's own extension, raised when a
/// `SET STATEMENT max_statement_time = <s> FOR <sql>`-wrapped statement
/// (spec §4.3 "Timeouts") exceeds its budget; it stands in for the spec's
/// backend-agnostic "PROTOCOL_SEQUENCE_TIMEOUT" row since vanilla MySQL has
/// no equivalent code.
pub fn map_code(code: &str) -> Option<ErrorKind> {
    match code {
        "1969" => Some(ErrorKind::Timeout),
        "1050" => Some(ErrorKind::Duplicate),
        "1060" => Some(ErrorKind::Duplicate),
        "1061" => Some(ErrorKind::Duplicate),
        "1062" => Some(ErrorKind::Duplicate),
        "1406" | "1264" => Some(ErrorKind::Truncation),
        "1049" => Some(ErrorKind::NotFound),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(map_code("1969"), Some(ErrorKind::Timeout));
        assert_eq!(map_code("1062"), Some(ErrorKind::Duplicate));
        assert_eq!(map_code("1406"), Some(ErrorKind::Truncation));
        assert_eq!(map_code("1049"), Some(ErrorKind::NotFound));
    }

    #[test]
    fn unknown_code_maps_to_none() {
        assert_eq!(map_code("99999"), None);
    }
}
