// The line-checksum wire format: `<payload>@xx` where `xx` is the
// two-digit lowercase hex rendering of the running XOR of every byte in
// `<payload>`. A line with no trailing `@xx` is passed through as-is -
// the checksum is an optional guard, not a framing requirement.

use crate::error::{Result, RuntimeError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TRAILER: Regex = Regex::new(r"^(?P<payload>.*)@(?P<sum>[0-9a-f]{2})$").unwrap();
}

fn xor_all(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Append a checksum trailer to `payload`, as emitted for every
/// diagnostic line.
pub fn append(payload: &str) -> String {
    format!("{}@{:02x}", payload, xor_all(payload.as_bytes()))
}

/// Verify and strip a trailing checksum, if present. Returns the
/// payload with the trailer removed; fails with `ChecksumMismatch` if a
/// trailer is present but does not match.
pub fn strip_and_verify(line: &str) -> Result<&str> {
    match TRAILER.captures(line) {
        None => Ok(line),
        Some(caps) => {
            let payload = caps.name("payload").unwrap().as_str();
            let expect = u8::from_str_radix(caps.name("sum").unwrap().as_str(), 16).unwrap();
            if xor_all(payload.as_bytes()) == expect {
                Ok(payload)
            } else {
                Err(RuntimeError::ChecksumMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let line = append("number x = 1.5");
        assert_eq!(strip_and_verify(&line).unwrap(), "number x = 1.5");
    }

    #[test]
    fn rejects_tampered_payload() {
        let mut line = append("m.on()");
        line.replace_range(0..1, "n");
        assert!(matches!(strip_and_verify(&line), Err(RuntimeError::ChecksumMismatch)));
    }

    #[test]
    fn passes_through_lines_without_a_trailer() {
        assert_eq!(strip_and_verify("m.on()").unwrap(), "m.on()");
    }
}
