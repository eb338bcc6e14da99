use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::PayoutValidationError;

/// Widest recipient identifier the claim table accepts (VARCHAR(20)).
pub const MAX_RECIPIENT_LEN: u64 = 20;

/// Largest magnitude NUMERIC(16, 2) can hold.
const MAX_AMOUNT_UNITS: i64 = 100_000_000_000_000;

/// Producer-side payout lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutState {
    Notifying,
    Processing,
    Error,
}

impl PayoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutState::Notifying => "notifying",
            PayoutState::Processing => "processing",
            PayoutState::Error => "error",
        }
    }
}

impl fmt::Display for PayoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payout exactly as the producer lists it. Every field is optional so one
/// malformed element never poisons the whole listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PayoutRecord {
    #[validate(required)]
    pub id: Option<String>,

    #[validate(required)]
    pub create_time: Option<String>,

    /// JSON string or number, parsed textually.
    #[validate(required)]
    pub amount: Option<serde_json::Value>,

    #[validate(required, length(max = 20))]
    pub recipient_account_identifier: Option<String>,

    #[serde(default)]
    pub state: Option<String>,
}

impl PayoutRecord {
    /// Best-effort identifier for log lines.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

/// A payout that passed validation and can be claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub id: Uuid,
    pub create_time: DateTime<Utc>,
    pub amount: Decimal,
    pub recipient_account_identifier: String,
}

impl TryFrom<&PayoutRecord> for Payout {
    type Error = PayoutValidationError;

    fn try_from(record: &PayoutRecord) -> Result<Self, Self::Error> {
        if let Err(errors) = record.validate() {
            return Err(first_violation(&errors));
        }

        let (Some(id), Some(create_time), Some(amount), Some(recipient)) = (
            record.id.as_deref(),
            record.create_time.as_deref(),
            record.amount.as_ref(),
            record.recipient_account_identifier.as_deref(),
        ) else {
            return Err(PayoutValidationError::MissingField("id"));
        };

        let id = Uuid::parse_str(id.trim())
            .map_err(|_| PayoutValidationError::InvalidIdentifier(id.to_string()))?;

        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(PayoutValidationError::MissingField("recipient_account_identifier"));
        }

        Ok(Self {
            id,
            create_time: parse_timestamp(create_time)?,
            amount: parse_amount(amount)?,
            recipient_account_identifier: recipient.to_string(),
        })
    }
}

fn first_violation(errors: &validator::ValidationErrors) -> PayoutValidationError {
    let field_errors = errors.field_errors();
    for field in ["id", "create_time", "amount", "recipient_account_identifier"] {
        let Some(violations) = field_errors.get(field) else {
            continue;
        };
        if violations.iter().any(|v| v.code == "required") {
            return PayoutValidationError::MissingField(field);
        }
        if field == "recipient_account_identifier" {
            return PayoutValidationError::InvalidRecipient(format!(
                "longer than {} characters",
                MAX_RECIPIENT_LEN
            ));
        }
    }
    PayoutValidationError::MissingField("id")
}

/// Accepts RFC 3339, RFC 2822 (HTTP-date style) and naive ISO-8601 (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PayoutValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PayoutValidationError::MissingField("create_time"));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(PayoutValidationError::InvalidTimestamp(raw.to_string()))
}

/// Fixed-point only: numbers are parsed from their JSON text, never through f64.
pub fn parse_amount(raw: &serde_json::Value) -> Result<Decimal, PayoutValidationError> {
    let text = match raw {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(PayoutValidationError::InvalidAmount(other.to_string())),
    };

    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| PayoutValidationError::InvalidAmount(text.clone()))?
        .normalize();

    if amount <= Decimal::ZERO {
        return Err(PayoutValidationError::InvalidAmount(format!("{} is not positive", text)));
    }
    if amount.scale() > 2 {
        return Err(PayoutValidationError::InvalidAmount(format!(
            "{} has more than 2 fractional digits",
            text
        )));
    }
    if amount >= Decimal::from(MAX_AMOUNT_UNITS) {
        return Err(PayoutValidationError::InvalidAmount(format!("{} is out of range", text)));
    }

    Ok(amount)
}
