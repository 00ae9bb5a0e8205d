use serde::{Deserialize, Serialize};

use crate::model::TargetRow;
use crate::taxonomy::{Token, TokenGroup};
use crate::tokenizer::{tokenize, TokenSet};

pub const DEFAULT_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchType {
    /// Geography, funnel and bidding filters narrowed the field to one row.
    Rule,
    /// Best token overlap at or above the threshold.
    Overlap { score: f64 },
    None,
}

/// A sheet row with its label already tokenized.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: TargetRow,
    pub tokens: TokenSet,
}

impl Candidate {
    pub fn new(row: TargetRow) -> Self {
        let tokens = tokenize(&row.label);
        Self { row, tokens }
    }
}

#[derive(Debug, Clone)]
pub struct TargetMatch {
    pub target: Option<TargetRow>,
    /// Overlap of the selected candidate, in [0.0, 1.0].
    pub confidence: f64,
    pub matched_tokens: TokenSet,
    pub match_type: MatchType,
}

impl TargetMatch {
    fn none(confidence: f64, matched_tokens: TokenSet) -> Self {
        Self {
            target: None,
            confidence,
            matched_tokens,
            match_type: MatchType::None,
        }
    }
}

/// Which bidding row a name points at. Smart+ wins over cost cap when a name
/// carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BiddingVariant {
    SmartPlus,
    CostCap,
    Plain,
}

impl BiddingVariant {
    fn of(tokens: &TokenSet) -> Self {
        if tokens.contains(Token::SmartPlus) {
            BiddingVariant::SmartPlus
        } else if tokens.contains(Token::CostCap) {
            BiddingVariant::CostCap
        } else {
            BiddingVariant::Plain
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Matcher {
    pub threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn accepts(&self, overlap: f64) -> bool {
        overlap >= self.threshold
    }

    /// Tokenizes the candidate labels and matches. Prefer `find_best_match`
    /// with prebuilt candidates when matching many sources against one sheet.
    pub fn match_rows(&self, source: &TokenSet, rows: &[TargetRow]) -> TargetMatch {
        let candidates: Vec<Candidate> = rows.iter().cloned().map(Candidate::new).collect();
        self.find_best_match(source, &candidates)
    }

    /// Priority cascade: geography filter, funnel filter, bidding variant,
    /// then overlap scoring. Never fails; a miss is `target: None`.
    pub fn find_best_match(&self, source: &TokenSet, candidates: &[Candidate]) -> TargetMatch {
        if source.is_empty() {
            return TargetMatch::none(0.0, TokenSet::new());
        }

        let source_geo = source.primary(TokenGroup::Geography);
        let same_geography: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| match (source_geo, c.tokens.primary(TokenGroup::Geography)) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            })
            .collect();

        let same_funnel: Vec<&Candidate> = match source.primary(TokenGroup::Funnel) {
            Some(funnel) => same_geography
                .iter()
                .copied()
                .filter(|c| c.tokens.primary(TokenGroup::Funnel) == Some(funnel))
                .collect(),
            None => Vec::new(),
        };

        let decisive = !same_funnel.is_empty();
        let pool = if decisive { same_funnel } else { same_geography };
        let pool = prefer_variant(BiddingVariant::of(source), pool);

        if decisive && pool.len() == 1 {
            let chosen = pool[0];
            let matched_tokens = source.intersection(&chosen.tokens);
            return TargetMatch {
                target: Some(chosen.row.clone()),
                confidence: overlap_score(source, &chosen.tokens),
                matched_tokens,
                match_type: MatchType::Rule,
            };
        }

        // Replace only on a strictly better score: ties keep the earliest candidate.
        let best = pool.iter().copied().fold(None::<(&Candidate, f64)>, |best, c| {
            let score = overlap_score(source, &c.tokens);
            match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((c, score)),
            }
        });

        match best {
            Some((chosen, score)) if self.accepts(score) => TargetMatch {
                target: Some(chosen.row.clone()),
                confidence: score,
                matched_tokens: source.intersection(&chosen.tokens),
                match_type: MatchType::Overlap { score },
            },
            Some((chosen, score)) => {
                TargetMatch::none(score, source.intersection(&chosen.tokens))
            }
            None => TargetMatch::none(0.0, TokenSet::new()),
        }
    }
}

/// Narrow to candidates of the wanted bidding variant, if there are any.
fn prefer_variant(wanted: BiddingVariant, pool: Vec<&Candidate>) -> Vec<&Candidate> {
    let preferred: Vec<&Candidate> = pool
        .iter()
        .copied()
        .filter(|c| BiddingVariant::of(&c.tokens) == wanted)
        .collect();
    if preferred.is_empty() {
        pool
    } else {
        preferred
    }
}

/// |a ∩ b| / min(|a|, |b|), or 0.0 when either set is empty.
pub fn overlap_score(a: &TokenSet, b: &TokenSet) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).len() as f64 / smaller as f64
}
