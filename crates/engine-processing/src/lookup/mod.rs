pub mod resolver;
pub mod review;

pub use resolver::{LookupResolver, LookupSummary, is_canonical_id};
pub use review::{AcceptAll, ReviewDecision, ReviewPolicy, ScriptedReview};
