pub mod gatekeeper;
pub mod normalize;
pub mod review;
pub mod rules;

pub use gatekeeper::{GateConfig, SkipRule, Verdict};
pub use normalize::{normalize, parse_txn_date, NormalizeError};
pub use review::ReviewLog;
pub use rules::{Capture, ExtractionRule, Field, RuleError, RuleMatch, RuleSet, RuleSpec};
