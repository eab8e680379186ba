use paisa_core::Destination;
use paisa_mail::DecodedEmail;
use serde::Deserialize;

/// One skip category: a name (for the rejection reason) and the phrases
/// that put a message in it.
#[derive(Debug, Clone, Deserialize)]
pub struct SkipRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Pre-filter configuration. Immutable after construction, built once at
/// startup. All keywords are stored lowercased.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// At least one of these must appear in the body, or the message is
    /// rejected before any pattern work.
    positive: Vec<String>,
    skip: Vec<SkipRule>,
    /// Whitelist overrides: if both phrases of a pair appear in the body,
    /// the negative filter is overruled.
    allow_pairs: Vec<(String, String)>,
}

/// Gatekeeper outcome. Rejection is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Candidate(Destination),
    Rejected(String),
}

impl Verdict {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Verdict::Candidate(_))
    }
}

impl GateConfig {
    pub fn new(
        positive: Vec<String>,
        skip: Vec<SkipRule>,
        allow_pairs: Vec<(String, String)>,
    ) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> {
            v.into_iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            positive: lower(positive),
            skip: skip
                .into_iter()
                .map(|s| SkipRule {
                    category: s.category,
                    keywords: lower(s.keywords),
                })
                .collect(),
            allow_pairs: allow_pairs
                .into_iter()
                .map(|(a, b)| (a.to_lowercase(), b.to_lowercase()))
                .collect(),
        }
    }

    /// The keyword sets recovered from the production deployment.
    pub fn builtin() -> Self {
        let skip = vec![
            SkipRule {
                category: "corporate-action".to_string(),
                keywords: [
                    "demat account",
                    "equity contract note",
                    "securities balance",
                    "outcome of board meeting",
                    "e-voting",
                    "contract note",
                ]
                .map(str::to_string)
                .to_vec(),
            },
            SkipRule {
                category: "dividend".to_string(),
                keywords: ["dividend", "annual general meeting"]
                    .map(str::to_string)
                    .to_vec(),
            },
            SkipRule {
                category: "promotion".to_string(),
                keywords: [
                    "promotion",
                    "gift voucher",
                    "add-on card",
                    "deals",
                    "offer expires",
                    "invite",
                ]
                .map(str::to_string)
                .to_vec(),
            },
            SkipRule {
                category: "security-notice".to_string(),
                keywords: [
                    "one time password",
                    "otp",
                    "login notification",
                    "login alert",
                    "oauth application",
                ]
                .map(str::to_string)
                .to_vec(),
            },
        ];
        Self::new(
            [
                "₹", "rs.", "rs ", "inr", "upi", "neft", "imps", "debited", "credited", "spent",
                "withdrawn", "transaction", "payment",
            ]
            .map(str::to_string)
            .to_vec(),
            skip,
            vec![("credit card".to_string(), "transaction".to_string())],
        )
    }

    /// Decide whether a decoded email is a transaction candidate.
    ///
    /// Stage order is load-bearing: positive filter first (cheap rejection),
    /// then the negative skip-lists, with the whitelist override taking
    /// precedence over a negative hit. Reordering changes which boundary
    /// emails are accepted.
    pub fn admit(&self, email: &DecodedEmail) -> Verdict {
        let body = email.body.to_lowercase();
        let subject = email.subject.to_lowercase();

        if !self.positive.iter().any(|k| body.contains(k.as_str())) {
            return Verdict::Rejected("no financial keywords".to_string());
        }

        let skip_hit = self.skip.iter().find(|rule| {
            rule.keywords
                .iter()
                .any(|k| subject.contains(k.as_str()) || body.contains(k.as_str()))
        });
        if let Some(rule) = skip_hit {
            let overridden = self
                .allow_pairs
                .iter()
                .any(|(a, b)| body.contains(a.as_str()) && body.contains(b.as_str()));
            if !overridden {
                tracing::debug!(category = %rule.category, subject = %email.subject, "gatekeeper rejected");
                return Verdict::Rejected(format!("skip category: {}", rule.category));
            }
        }

        Verdict::Candidate(destination_hint(&subject, &body))
    }
}

/// Destination routing from subject/body evidence; plain spends go to the
/// transaction table.
fn destination_hint(subject: &str, body: &str) -> Destination {
    if subject.contains("statement") || body.contains("statement is ready") {
        Destination::Statement
    } else if subject.contains("bill") || body.contains("bill due") || body.contains("bill payment")
    {
        Destination::Bill
    } else {
        Destination::Transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, body: &str) -> DecodedEmail {
        DecodedEmail {
            subject: subject.to_string(),
            body: body.to_string(),
            sender: "alerts@bank.example".to_string(),
            timestamp: None,
        }
    }

    const DIVIDEND_NOTICE: &str = "We are pleased to inform you that the Board of Directors have approved and recommended payment of final dividend of Rs. 20.55 per equity share, subject to approval of shareholders at the ensuing Annual General Meeting.";

    #[test]
    fn no_positive_keyword_rejects_regardless_of_other_rules() {
        let gate = GateConfig::builtin();
        // Even mentions of whitelisted vocabulary cannot rescue a body with
        // no financial keyword at all.
        let v = gate.admit(&email("Board meeting", "The board met on Thursday."));
        assert_eq!(v, Verdict::Rejected("no financial keywords".to_string()));
    }

    #[test]
    fn empty_body_is_rejected() {
        let gate = GateConfig::builtin();
        assert!(!gate.admit(&email("anything", "")).is_candidate());
    }

    #[test]
    fn dividend_notice_rejected_by_negative_filter() {
        let gate = GateConfig::builtin();
        let v = gate.admit(&email("Final Dividend", DIVIDEND_NOTICE));
        assert_eq!(v, Verdict::Rejected("skip category: dividend".to_string()));
    }

    #[test]
    fn skip_keywords_also_match_subject() {
        let gate = GateConfig::builtin();
        let v = gate.admit(&email(
            "One Time Password for your account",
            "Use 482913 to complete your payment.",
        ));
        assert!(matches!(v, Verdict::Rejected(reason) if reason.contains("security-notice")));
    }

    #[test]
    fn whitelist_override_beats_negative_filter() {
        let gate = GateConfig::builtin();
        // Promotional vocabulary ("deals") would normally skip this, but a
        // body carrying both "credit card" and "transaction" is a genuine
        // spend notice.
        let v = gate.admit(&email(
            "New deals for you",
            "Great deals this week. A transaction of Rs. 500.00 was made on your credit card XX1039.",
        ));
        assert_eq!(v, Verdict::Candidate(Destination::Transaction));
    }

    #[test]
    fn plain_spend_notice_is_a_candidate() {
        let gate = GateConfig::builtin();
        let v = gate.admit(&email(
            "Transaction alert",
            "Rs. 149.00 spent on your SBI Credit Card ending 1234 at AMAZON on 15/08/25",
        ));
        assert_eq!(v, Verdict::Candidate(Destination::Transaction));
    }

    #[test]
    fn statement_subject_routes_to_statement() {
        let gate = GateConfig::builtin();
        let v = gate.admit(&email(
            "Your credit card statement for May",
            "Your statement shows a total transaction amount of Rs. 10,000.00 on your credit card.",
        ));
        assert_eq!(v, Verdict::Candidate(Destination::Statement));
    }

    #[test]
    fn bill_subject_routes_to_bill() {
        let gate = GateConfig::builtin();
        let v = gate.admit(&email(
            "Electricity bill",
            "Your bill due of Rs. 1,200.00 is payable by 20-08-25.",
        ));
        assert_eq!(v, Verdict::Candidate(Destination::Bill));
    }
}
