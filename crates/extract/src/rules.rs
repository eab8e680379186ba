use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The typed fields a matcher group can bind to. Replaces the string-keyed
/// field bags of ad-hoc scrapers: a rule that names a field the pipeline
/// does not know about fails to load, instead of silently dropping data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Currency,
    Amount,
    CardRef,
    AccountRef,
    Merchant,
    Counterparty,
    CounterpartyAccount,
    CounterpartyIfsc,
    CounterpartyPaymentId,
    TransactionId,
    TransactionInfo,
    Date,
    Time,
    Remarks,
    ContactEmail,
    ContactMobile,
}

/// Raw substrings captured by one rule application. Values are untyped text;
/// the normalizer owns canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Capture {
    pub currency: Option<String>,
    pub amount: Option<String>,
    pub card_ref: Option<String>,
    pub account_ref: Option<String>,
    pub merchant: Option<String>,
    pub counterparty: Option<String>,
    pub counterparty_account: Option<String>,
    pub counterparty_ifsc: Option<String>,
    pub counterparty_payment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_info: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub remarks: Option<String>,
    pub contact_email: Option<String>,
    pub contact_mobile: Option<String>,
}

impl Capture {
    fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Currency => &mut self.currency,
            Field::Amount => &mut self.amount,
            Field::CardRef => &mut self.card_ref,
            Field::AccountRef => &mut self.account_ref,
            Field::Merchant => &mut self.merchant,
            Field::Counterparty => &mut self.counterparty,
            Field::CounterpartyAccount => &mut self.counterparty_account,
            Field::CounterpartyIfsc => &mut self.counterparty_ifsc,
            Field::CounterpartyPaymentId => &mut self.counterparty_payment_id,
            Field::TransactionId => &mut self.transaction_id,
            Field::TransactionInfo => &mut self.transaction_info,
            Field::Date => &mut self.date,
            Field::Time => &mut self.time,
            Field::Remarks => &mut self.remarks,
            Field::ContactEmail => &mut self.contact_email,
            Field::ContactMobile => &mut self.contact_mobile,
        };
        *slot = Some(value.to_string());
    }
}

/// One declarative extraction rule: a matcher plus the field each capture
/// group binds to, and the static facts the format implies. Loadable from
/// TOML so rules are data assets, testable without the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub pattern: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub institution: Option<String>,
    /// Channel descriptor ("card", "imps debit", "card upi", ...) feeding
    /// direction classification.
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule '{id}': invalid pattern: {source}")]
    BadPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to parse rule set: {0}")]
    Parse(String),
}

pub struct ExtractionRule {
    spec: RuleSpec,
    regex: Regex,
}

impl ExtractionRule {
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn institution(&self) -> Option<&str> {
        self.spec.institution.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.spec.kind.as_deref()
    }

    /// Apply this rule's matcher alone. Groups that did not participate
    /// (optional captures) leave their field unset.
    pub fn apply(&self, body: &str) -> Option<Capture> {
        let caps = self.regex.captures(body)?;
        let mut capture = Capture::default();
        for (idx, field) in self.spec.fields.iter().enumerate() {
            if let Some(m) = caps.get(idx + 1) {
                capture.set(*field, m.as_str());
            }
        }
        Some(capture)
    }
}

/// A selected rule with its captures.
pub struct RuleMatch<'a> {
    pub rule: &'a ExtractionRule,
    pub capture: Capture,
}

/// Ordered, immutable rule registry. Loaded once at startup; selection is
/// strict first-match-wins, so more specific institution rules must be
/// listed before generic fallbacks.
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
}

impl RuleSet {
    pub fn new(specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let regex = RegexBuilder::new(&spec.pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .map_err(|source| RuleError::BadPattern {
                    id: spec.id.clone(),
                    source,
                })?;
            rules.push(ExtractionRule { spec, regex });
        }
        Ok(Self { rules })
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        #[derive(Deserialize)]
        struct RuleFile {
            rule: Vec<RuleSpec>,
        }
        let file: RuleFile =
            toml::from_str(toml_content).map_err(|e| RuleError::Parse(e.to_string()))?;
        Self::new(file.rule)
    }

    /// The formats recovered from the production deployment's registry,
    /// most specific first, generic amount fallback last.
    pub fn builtin() -> Result<Self, RuleError> {
        Self::new(builtin_specs())
    }

    /// First rule whose matcher succeeds, in registry order.
    pub fn select(&self, body: &str) -> Option<RuleMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.apply(body).map(|capture| RuleMatch { rule, capture })
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn spec(
    id: &str,
    pattern: &str,
    fields: Vec<Field>,
    institution: Option<&str>,
    kind: &str,
) -> RuleSpec {
    RuleSpec {
        id: id.to_string(),
        pattern: pattern.to_string(),
        fields,
        institution: institution.map(str::to_string),
        kind: Some(kind.to_string()),
    }
}

fn builtin_specs() -> Vec<RuleSpec> {
    use Field::*;
    vec![
        spec(
            "sbi_card_spend",
            r"(Rs|₹|INR)\.?\s*([\d,]+\.\d{2})\s+spent on your SBI Credit Card ending\s+(\d{4})\s+at\s+(.*?)\s+on\s+(\d{2}/\d{2}/\d{2})",
            vec![Currency, Amount, CardRef, Merchant, Date],
            Some("SBI Credit Card"),
            "card",
        ),
        spec(
            "hdfc_card_upi",
            r"(Rs|₹|INR)\.?\s*([\d,]+\.\d{2}) has been debited from your HDFC Bank RuPay Credit Card\s+(XX\d{4}) to\s+([\w@.]+)\s+(.*?)\s+on\s+(\d{2}-\d{2}-\d{2})\. Your UPI transaction reference number is\s+(\d+)",
            vec![Currency, Amount, CardRef, CounterpartyPaymentId, Merchant, Date, TransactionId],
            Some("HDFC Bank RuPay Credit Card"),
            "card upi",
        ),
        spec(
            "icici_card_spend",
            r"ICICI Bank Credit Card\s+(XX\d{4}).*?transaction of (INR|Rs\.?|₹)\s*([\d,]+\.\d{2}).*?on\s+([A-Za-z]+\s+\d{2},\s+\d{4})(?: at ([\d:]+))?.*?Info:\s*([^.]+)",
            vec![CardRef, Currency, Amount, Date, Time, Merchant],
            Some("ICICI Bank Credit Card"),
            "card",
        ),
        spec(
            "kotak_imps_debit",
            r"account\s+xx\d+\s+is debited for (INR|Rs\.?|₹)\s*([\d,]+\.\d{2}) on (\d{2}-[A-Za-z]{3}-\d{4}|\d{2}-\d{2}-\d{4}).*?Beneficiary Name:\s+(.*?)\s+Beneficiary Account No:\s+(.*?)\s+Beneficiary IFSC:\s+(.*?)\s+IMPS Reference No:\s*(\d+).*?Remarks\s*:\s*([\w \-]+)",
            vec![Currency, Amount, Date, Counterparty, CounterpartyAccount, CounterpartyIfsc, TransactionId, Remarks],
            Some("Kotak Mahindra Bank"),
            "imps debit",
        ),
        spec(
            "kotak_imps_credit",
            r"account\s+xx\d+\s+is credited by (INR|Rs\.?|₹)\s*([\d,]+\.\d{2}) on (\d{2}-[A-Za-z]{3}-\d{4}|\d{2}-\d{2}-\d{4}).*?Sender Name:\s+(.*?)\s+Sender Mobile No:\s+(.*?)\s+IMPS Reference No:\s*(\d+).*?Remarks\s*:\s*([\w \-]+)",
            vec![Currency, Amount, Date, Counterparty, ContactMobile, TransactionId, Remarks],
            Some("Kotak Mahindra Bank"),
            "imps credit",
        ),
        spec(
            "axis_emi_debit",
            r"A/c no\. (XX\d+).*?debited with (INR|Rs\.?|₹) ([\d,]+\.\d{2}) on (\d{2}-\d{2}-\d{4}) (\d{2}:\d{2}:\d{2}) IST by ([\w\-]+)",
            vec![AccountRef, Currency, Amount, Date, Time, TransactionId],
            Some("Axis Bank"),
            "emi debit",
        ),
        spec(
            "axis_neft",
            r"NEFT for your A/c no\. (XX\d+) for an amount of (INR|Rs\.?|₹) ([\d,]+\.\d{2}) has been initiated with transaction reference no\. (\w+)",
            vec![AccountRef, Currency, Amount, TransactionId],
            Some("Axis Bank"),
            "neft debit",
        ),
        spec(
            "axis_upi_debit",
            r"Amount Debited:\s+(INR|Rs|₹)\s*([\d,]+\.\d{2})\s+Account Number:\s+(XX\d{4})\s+Date & Time:\s+(\d{2}-\d{2}-\d{2}),\s+(\d{2}:\d{2}:\d{2})\s+IST\s+Transaction Info:\s+(UPI/P2A/\d+/\S+)",
            vec![Currency, Amount, AccountRef, Date, Time, TransactionInfo],
            Some("Axis Bank"),
            "upi debit",
        ),
        spec(
            "rbl_card_spend",
            r"(INR|Rs|₹)\.?\s*([\d,]+\.\d{2})\s+spent at\s+(.*?)\s+on\s+(\d{2}-\d{2}-\d{4})\s+.*?RBL Bank credit card\s+\((\d{4})\)",
            vec![Currency, Amount, Merchant, Date, CardRef],
            Some("RBL Bank Credit Card"),
            "card",
        ),
        spec(
            "razorpay_card_payment",
            r"(?:₹|INR)\s*([\d,]+\.\d{2})\s*Paid Successfully.*?Payment Id\s*(pay_\w+).*?Method\s*card\s+.*?(\d{4}).*?Paid On\s*([\d\s:APM]+?)\s+Email\s*(\S+)\s+Mobile Number\s*(\+\d+)",
            vec![Amount, TransactionId, CardRef, Date, ContactEmail, ContactMobile],
            Some("Razorpay"),
            "card payment",
        ),
        // Amount-only fallback: keeps a currency-marked body in the pipeline
        // long enough for the normalizer to log a precise rejection instead
        // of sending it straight to the review file.
        spec(
            "generic_amount",
            r"(?:INR|Rs\.?|₹)\s*([\d,]+\.\d{2})",
            vec![Amount],
            None,
            "unknown",
        ),
    ]
}
