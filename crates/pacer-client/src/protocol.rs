//! Wire documents for the remote record service
//!
//! Requests are JSON documents carrying the operation, the credential pair and
//! the record key. Responses carry either a `document` object or a `fault`
//! envelope.

use chrono::NaiveDate;
use pacer_core::credentials::CredentialPair;
use serde::{Deserialize, Serialize};

use crate::error::TransientFailure;

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 200;

/// Remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// Look a record up by its primary key
    Lookup {
        /// Record identifier
        primary_key: String,
    },
    /// Refresh the secondary entity a record belongs to
    Refresh {
        /// Secondary entity identifier
        secondary_key: String,
    },
}

impl ApiRequest {
    /// Lookup request
    pub fn lookup(primary_key: impl Into<String>) -> Self {
        Self::Lookup {
            primary_key: primary_key.into(),
        }
    }

    /// Refresh request
    pub fn refresh(secondary_key: impl Into<String>) -> Self {
        Self::Refresh {
            secondary_key: secondary_key.into(),
        }
    }

    /// Operation name on the wire
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Lookup { .. } => "lookup",
            Self::Refresh { .. } => "refresh",
        }
    }

    /// The key this request is about
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Lookup { primary_key } => primary_key,
            Self::Refresh { secondary_key } => secondary_key,
        }
    }

    /// Encode the request document with the credential pair embedded
    pub fn encode(&self, credentials: &CredentialPair) -> serde_json::Result<String> {
        let (primary_key, secondary_key) = match self {
            Self::Lookup { primary_key } => (Some(primary_key.as_str()), None),
            Self::Refresh { secondary_key } => (None, Some(secondary_key.as_str())),
        };
        serde_json::to_string(&RequestDocument {
            operation: self.operation(),
            credentials: WireCredentials {
                key: credentials.key.expose(),
                secret: credentials.secret.expose(),
            },
            primary_key,
            secondary_key,
        })
    }
}

#[derive(Serialize)]
struct RequestDocument<'a> {
    operation: &'a str,
    credentials: WireCredentials<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary_key: Option<&'a str>,
}

#[derive(Serialize)]
struct WireCredentials<'a> {
    key: &'a str,
    secret: &'a str,
}

/// Fault envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fault {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Response document
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseDocument {
    /// Business-level success flag
    pub success: bool,
    /// Failure reason when `success` is false
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    document: Option<serde_json::Value>,
    #[serde(default)]
    fault: Option<Fault>,
}

/// Classified HTTP response
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Parsed response document
    Document(ResponseDocument),
    /// Fault envelope
    Fault(Fault),
    /// Worth retrying
    Transient(TransientFailure),
    /// Not retryable, no fault envelope
    Terminal {
        /// Status code
        status: u16,
        /// Truncated body
        body: String,
    },
}

/// Classify a raw HTTP response
#[must_use]
pub fn classify(status: u16, body: &str) -> Classified {
    let envelope = if body.trim().is_empty() {
        None
    } else {
        serde_json::from_str::<Envelope>(body).ok()
    };

    if let Some(fault) = envelope.as_ref().and_then(|e| e.fault.clone()) {
        return Classified::Fault(fault);
    }

    match status {
        429 => Classified::Transient(TransientFailure::RateLimited),
        408 => Classified::Transient(TransientFailure::RequestTimeout),
        500..=599 => Classified::Transient(TransientFailure::ServerError(status)),
        200..=299 => {
            if body.trim().is_empty() {
                return Classified::Transient(TransientFailure::Malformed("empty body".to_string()));
            }
            let Some(envelope) = envelope else {
                return Classified::Transient(TransientFailure::Malformed(
                    "body is not a JSON document".to_string(),
                ));
            };
            match envelope.document.map(serde_json::from_value::<ResponseDocument>) {
                Some(Ok(document)) => Classified::Document(document),
                Some(Err(e)) => {
                    Classified::Transient(TransientFailure::Malformed(format!("invalid document: {e}")))
                }
                None => Classified::Transient(TransientFailure::Malformed(
                    "response has no document".to_string(),
                )),
            }
        }
        _ => Classified::Terminal {
            status,
            body: truncate(body, MAX_ERROR_BODY),
        },
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Locale settings applied to response fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    /// Decimal separator
    pub decimal_separator: String,
    /// Thousands separator (empty for none)
    pub group_separator: String,
    /// Prefix for monetary amounts
    pub currency_symbol: String,
    /// Digits after the decimal separator
    pub decimals: u32,
    /// `chrono` format string for dates
    pub date_format: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ".".to_string(),
            group_separator: ",".to_string(),
            currency_symbol: String::new(),
            decimals: 2,
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

impl NumberFormat {
    /// Format a monetary amount
    #[must_use]
    pub fn format_amount(&self, value: f64) -> String {
        let decimals = self.decimals.min(9);
        let scale = 10u64.pow(decimals);
        let scaled = (value.abs() * scale as f64).round() as u64;
        let (whole, frac) = (scaled / scale, scaled % scale);

        let digits = whole.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push_str(&self.group_separator);
            }
            grouped.push(c);
        }

        let sign = if value < 0.0 && scaled > 0 { "-" } else { "" };
        if decimals == 0 {
            format!("{sign}{}{grouped}", self.currency_symbol)
        } else {
            format!(
                "{sign}{}{grouped}{}{frac:0width$}",
                self.currency_symbol,
                self.decimal_separator,
                width = decimals as usize
            )
        }
    }

    /// Format a date
    #[must_use]
    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(&self.date_format).to_string()
    }
}

/// Formatted field set extracted from a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    /// Record status
    pub status: String,
    /// Name, amount, date
    pub fields: [String; 3],
}

impl RecordFields {
    /// Extract and format fields from a response document
    #[must_use]
    pub fn from_document(document: &ResponseDocument, format: &NumberFormat) -> Self {
        Self {
            status: document.status.clone().unwrap_or_default(),
            fields: [
                document.name.clone().unwrap_or_default(),
                document
                    .balance
                    .map(|b| format.format_amount(b))
                    .unwrap_or_default(),
                document
                    .due_date
                    .map(|d| format.format_date(d))
                    .unwrap_or_default(),
            ],
        }
    }
}
