//! Canonical sign-in message text.
//!
//! The layout follows Sign-In-With-Solana:
//!
//! ```text
//! {domain} wants you to sign in with your Solana account:
//! {address}
//!
//! {statement}
//!
//! URI: {uri}
//! Version: 1
//! Chain ID: {chain_id}
//! Nonce: {nonce}
//! Issued At: {issued_at}
//! Expiration Time: {expiration_time}
//! ```
//!
//! Encoding is deterministic. Decoding is strict and only accepts text that
//! encodes back to the identical bytes.

use crate::auth::identity::Identity;
use chrono::{DateTime, SecondsFormat, Utc};

const HEADER_SUFFIX: &str = " wants you to sign in with your Solana account:";
const URI_PREFIX: &str = "URI: ";
const VERSION_LINE: &str = "Version: 1";
const CHAIN_PREFIX: &str = "Chain ID: ";
const NONCE_PREFIX: &str = "Nonce: ";
const ISSUED_AT_PREFIX: &str = "Issued At: ";
const EXPIRATION_PREFIX: &str = "Expiration Time: ";

/// Malformed message, signature, or wire encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("missing line: {0}")]
    MissingLine(&'static str),

    #[error("malformed {field} line: {line:?}")]
    MalformedLine { field: &'static str, line: String },

    #[error("unexpected trailing content")]
    TrailingContent,

    #[error("invalid {0}: {1}")]
    InvalidField(&'static str, String),

    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// The fields a wallet is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    pub domain: String,
    pub address: Identity,
    pub statement: String,
    pub uri: String,
    pub chain_id: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
}

/// Canonical timestamp text: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(field: &'static str, text: &str) -> Result<DateTime<Utc>, FormatError> {
    let ts = DateTime::parse_from_rfc3339(text)
        .map_err(|e| FormatError::InvalidField(field, e.to_string()))?
        .with_timezone(&Utc);
    // Only the canonical spelling is accepted, so decode never normalizes
    if format_timestamp(&ts) != text {
        return Err(FormatError::InvalidField(
            field,
            format!("non-canonical timestamp {:?}", text),
        ));
    }
    Ok(ts)
}

fn check_value(field: &'static str, value: &str) -> Result<(), FormatError> {
    if value.is_empty() {
        return Err(FormatError::InvalidField(field, "empty".to_string()));
    }
    if value.contains(['\n', '\r']) {
        return Err(FormatError::InvalidField(
            field,
            "contains a line break".to_string(),
        ));
    }
    Ok(())
}

fn prefixed<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
    prefix: &str,
) -> Result<&'a str, FormatError> {
    let line = lines.next().ok_or(FormatError::MissingLine(field))?;
    match line.strip_prefix(prefix) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(FormatError::MalformedLine {
            field,
            line: line.to_string(),
        }),
    }
}

fn exact<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
    expected: &str,
) -> Result<(), FormatError> {
    let line = lines.next().ok_or(FormatError::MissingLine(field))?;
    if line != expected {
        return Err(FormatError::MalformedLine {
            field,
            line: line.to_string(),
        });
    }
    Ok(())
}

impl SignInMessage {
    /// Render the canonical text.
    ///
    /// Fails if any field is empty or contains a line break.
    pub fn to_text(&self) -> Result<String, FormatError> {
        check_value("domain", &self.domain)?;
        check_value("statement", &self.statement)?;
        check_value("uri", &self.uri)?;
        check_value("chain id", &self.chain_id)?;
        check_value("nonce", &self.nonce)?;

        let mut lines = vec![
            format!("{}{}", self.domain, HEADER_SUFFIX),
            self.address.to_base58(),
            String::new(),
            self.statement.clone(),
            String::new(),
            format!("{}{}", URI_PREFIX, self.uri),
            VERSION_LINE.to_string(),
            format!("{}{}", CHAIN_PREFIX, self.chain_id),
            format!("{}{}", NONCE_PREFIX, self.nonce),
            format!("{}{}", ISSUED_AT_PREFIX, format_timestamp(&self.issued_at)),
        ];
        if let Some(expiration) = &self.expiration_time {
            lines.push(format!("{}{}", EXPIRATION_PREFIX, format_timestamp(expiration)));
        }
        Ok(lines.join("\n"))
    }

    /// Canonical bytes, the exact input to signing and verification.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        self.to_text().map(String::into_bytes)
    }

    /// Strict parse of canonical bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8)?;
        if text.contains('\r') {
            return Err(FormatError::InvalidField(
                "message",
                "carriage return".to_string(),
            ));
        }
        let mut lines = text.split('\n');

        let header = lines.next().ok_or(FormatError::MissingLine("header"))?;
        let domain = match header.strip_suffix(HEADER_SUFFIX) {
            Some(domain) if !domain.is_empty() => domain,
            _ => {
                return Err(FormatError::MalformedLine {
                    field: "header",
                    line: header.to_string(),
                })
            }
        };

        let address_line = lines.next().ok_or(FormatError::MissingLine("address"))?;
        let address = Identity::parse(address_line)
            .map_err(|e| FormatError::InvalidField("address", e.to_string()))?;

        exact(&mut lines, "blank", "")?;
        let statement = lines.next().ok_or(FormatError::MissingLine("statement"))?;
        if statement.is_empty() {
            return Err(FormatError::InvalidField("statement", "empty".to_string()));
        }
        exact(&mut lines, "blank", "")?;

        let uri = prefixed(&mut lines, "uri", URI_PREFIX)?;
        exact(&mut lines, "version", VERSION_LINE)?;
        let chain_id = prefixed(&mut lines, "chain id", CHAIN_PREFIX)?;
        let nonce = prefixed(&mut lines, "nonce", NONCE_PREFIX)?;
        let issued_at = parse_timestamp(
            "issued at",
            prefixed(&mut lines, "issued at", ISSUED_AT_PREFIX)?,
        )?;

        let expiration_time = match lines.next() {
            None => None,
            Some(line) => {
                let value =
                    line.strip_prefix(EXPIRATION_PREFIX)
                        .ok_or_else(|| FormatError::MalformedLine {
                            field: "expiration time",
                            line: line.to_string(),
                        })?;
                Some(parse_timestamp("expiration time", value)?)
            }
        };

        if lines.next().is_some() {
            return Err(FormatError::TrailingContent);
        }

        Ok(SignInMessage {
            domain: domain.to_string(),
            address,
            statement: statement.to_string(),
            uri: uri.to_string(),
            chain_id: chain_id.to_string(),
            nonce: nonce.to_string(),
            issued_at,
            expiration_time,
        })
    }
}
