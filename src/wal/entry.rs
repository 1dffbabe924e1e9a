//! WAL record format and line codec

use crate::wal::writer::WalError;

/// A single logged mutation.
///
/// The on-disk form is one line per record. A `SET` value may contain
/// spaces but never a newline; the key is a single whitespace-free token so
/// that replay can tokenize `op key` and take the rest of the line as the
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    Set { key: String, value: String },
    Del { key: String },
}

impl WalRecord {
    /// Encode the record as its on-disk line, including the trailing newline.
    pub fn encode(&self) -> String {
        match self {
            WalRecord::Set { key, value } => format!("SET {} {}\n", key, value),
            WalRecord::Del { key } => format!("DEL {}\n", key),
        }
    }

    /// Parse one log line (without its trailing newline).
    ///
    /// Exactly one space separates `op` from `key` and `key` from `value`;
    /// any further spaces belong to the value.
    pub fn parse(line: &str) -> Result<Self, WalError> {
        let malformed = || WalError::MalformedRecord {
            line: line.to_string(),
        };

        let (op, rest) = line.split_once(' ').ok_or_else(malformed)?;
        match op {
            "SET" => {
                let (key, value) = rest.split_once(' ').ok_or_else(malformed)?;
                if key.is_empty() {
                    return Err(malformed());
                }
                Ok(WalRecord::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "DEL" => {
                if rest.is_empty() {
                    return Err(malformed());
                }
                Ok(WalRecord::Del {
                    key: rest.to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }

    /// The key this record mutates.
    pub fn key(&self) -> &str {
        match self {
            WalRecord::Set { key, .. } => key,
            WalRecord::Del { key } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_set() {
        let record = WalRecord::Set {
            key: "user_1".to_string(),
            value: "Alice".to_string(),
        };
        assert_eq!(record.encode(), "SET user_1 Alice\n");
    }

    #[test]
    fn test_encode_del() {
        let record = WalRecord::Del {
            key: "user_1".to_string(),
        };
        assert_eq!(record.encode(), "DEL user_1\n");
    }

    #[test]
    fn test_parse_set_value_with_spaces() {
        let record = WalRecord::parse("SET greeting hello world again").unwrap();
        assert_eq!(
            record,
            WalRecord::Set {
                key: "greeting".to_string(),
                value: "hello world again".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_set_empty_value() {
        // "SET k " round-trips an empty value
        let record = WalRecord::parse("SET k ").unwrap();
        assert_eq!(
            record,
            WalRecord::Set {
                key: "k".to_string(),
                value: String::new(),
            }
        );
    }

    #[test]
    fn test_roundtrip() {
        let records = vec![
            WalRecord::Set {
                key: "a".to_string(),
                value: "1 2 3".to_string(),
            },
            WalRecord::Del {
                key: "a".to_string(),
            },
        ];
        for record in records {
            let line = record.encode();
            let parsed = WalRecord::parse(line.trim_end_matches('\n')).unwrap();
            assert_eq!(parsed, record);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(WalRecord::parse("").is_err());
        assert!(WalRecord::parse("SET").is_err());
        assert!(WalRecord::parse("SET keyonly").is_err());
        assert!(WalRecord::parse("DEL ").is_err());
        assert!(WalRecord::parse("PUT k v").is_err());
        assert!(WalRecord::parse("garbage").is_err());
    }
}
