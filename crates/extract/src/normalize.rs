use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use paisa_core::{derive_key, Amount, AmountError, CanonicalTransaction, CategoryTable, Direction, OTHERS};
use paisa_mail::DecodedEmail;
use thiserror::Error;

use crate::rules::{Capture, ExtractionRule};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("no amount captured")]
    MissingAmount,
    #[error("bad amount: {0}")]
    BadAmount(#[from] AmountError),
    #[error("direction could not be classified")]
    UnknownDirection,
    #[error("no merchant or counterparty and category defaulted")]
    MissingCounterparty,
}

/// Map one rule's raw captures into a canonical record, or reject.
///
/// `ingested_at` is the caller-supplied substitute timestamp; it is used only
/// when the message itself carries neither a transaction date nor a header
/// timestamp, and it never feeds the idempotency key.
pub fn normalize(
    rule: &ExtractionRule,
    capture: &Capture,
    email: &DecodedEmail,
    categories: &CategoryTable,
    ingested_at: DateTime<Utc>,
) -> Result<CanonicalTransaction, NormalizeError> {
    let amount = Amount::parse(
        capture
            .amount
            .as_deref()
            .ok_or(NormalizeError::MissingAmount)?,
    )?;

    let currency = canonical_currency(capture.currency.as_deref());

    let merchant = capture
        .merchant
        .clone()
        .or_else(|| capture.counterparty.clone())
        .or_else(|| {
            capture
                .transaction_info
                .as_deref()
                .and_then(upi_counterparty)
                .map(str::to_string)
        })
        .map(|m| m.trim().trim_end_matches('.').to_string())
        .unwrap_or_default();

    let captured_date = capture.date.as_deref().and_then(parse_txn_date);
    let captured_time = capture
        .time
        .as_deref()
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S").ok());

    let source_timestamp = match captured_date {
        Some(date) => {
            let time = captured_time.unwrap_or(NaiveTime::MIN);
            Utc.from_utc_datetime(&date.and_time(time))
        }
        None => email.timestamp.unwrap_or(ingested_at),
    };

    let direction = classify_direction(rule.kind(), &email.body)
        .ok_or(NormalizeError::UnknownDirection)?;

    let category = categories.resolve(&email.sender, &merchant);
    if merchant.is_empty() && category == OTHERS {
        return Err(NormalizeError::MissingCounterparty);
    }

    let card_ref = capture.card_ref.clone().or_else(|| capture.account_ref.clone());

    let idempotency_key = capture
        .transaction_id
        .clone()
        .or_else(|| {
            capture
                .transaction_info
                .as_deref()
                .and_then(upi_reference)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            // Stable-field derivation. The date must survive a reprocess of
            // the same email, so ingestion time is excluded here.
            let stable_date = captured_date
                .or_else(|| email.timestamp.map(|t| t.date_naive()))
                .unwrap_or(NaiveDate::MIN);
            derive_key(card_ref.as_deref(), amount, stable_date, rule.institution())
        });

    Ok(CanonicalTransaction {
        idempotency_key,
        amount,
        direction,
        category,
        merchant,
        currency,
        source_timestamp,
        card_ref,
        counterparty_payment_id: capture.counterparty_payment_id.clone(),
        remarks: capture.remarks.clone(),
        institution: rule.institution().map(str::to_string),
    })
}

/// Accepts the date orderings seen across senders. When the first component
/// exceeds 31 it can only be a year, so year-first formats are tried;
/// otherwise day-first, with two-digit years read as 2000-based.
pub fn parse_txn_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();

    for fmt in ["%d-%b-%Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let first_component: Option<u32> = s
        .split(['-', '/'])
        .next()
        .and_then(|p| p.trim().parse().ok());
    let formats: &[&str] = if first_component.is_some_and(|n| n > 31) {
        &["%Y-%m-%d", "%Y/%m/%d"]
    } else {
        &["%d-%m-%y", "%d/%m/%y", "%d-%m-%Y", "%d/%m/%Y"]
    };
    for fmt in formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

fn canonical_currency(raw: Option<&str>) -> String {
    match raw.map(|c| c.trim().trim_end_matches('.').to_lowercase()) {
        Some(c) if c == "₹" || c == "rs" || c == "inr" => "INR".to_string(),
        Some(c) if c == "$" || c == "usd" => "USD".to_string(),
        Some(c) if !c.is_empty() => c.to_uppercase(),
        _ => "INR".to_string(),
    }
}

/// Channel kind first, body keywords as fallback. A card transaction notice
/// is a spend (money out) even when the instrument is a credit card; UPI is
/// kept distinct for downstream card-vs-account attribution.
fn classify_direction(kind: Option<&str>, body: &str) -> Option<Direction> {
    if let Some(kind) = kind {
        let k = kind.to_lowercase();
        if k.contains("upi") {
            return Some(Direction::Upi);
        }
        if k.contains("credit") && !k.contains("card") {
            return Some(Direction::Credit);
        }
        if k.contains("debit") || k.contains("card") {
            return Some(Direction::Debit);
        }
    }
    let body = body.to_lowercase();
    if body.contains("credited") {
        Some(Direction::Credit)
    } else if body.contains("debited") || body.contains("spent") {
        Some(Direction::Debit)
    } else {
        None
    }
}

/// "UPI/P2A/1234567890/AMAZON" → reference number component.
fn upi_reference(info: &str) -> Option<&str> {
    let part = info.split('/').nth(2)?;
    (!part.is_empty() && part.chars().all(|c| c.is_ascii_digit())).then_some(part)
}

/// "UPI/P2A/1234567890/AMAZON" → counterparty component.
fn upi_counterparty(info: &str) -> Option<&str> {
    info.split('/').nth(3).filter(|p| !p.is_empty())
}
