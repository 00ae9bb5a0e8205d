pub mod matcher;
pub mod model;
pub mod reconcile;
pub mod taxonomy;
pub mod tokenizer;

pub use matcher::{overlap_score, Candidate, MatchType, Matcher, TargetMatch, DEFAULT_THRESHOLD};
pub use model::{CampaignRecord, TargetRow, Week, WriteInstruction};
pub use reconcile::{
    reconcile, DataQualityWarning, MatchResult, Reconciler, Reconciliation, TargetIndex,
};
pub use taxonomy::{classify, vocabulary_groups, Token, TokenGroup};
pub use tokenizer::{analyze, tokenize, Analysis, TokenSet};
