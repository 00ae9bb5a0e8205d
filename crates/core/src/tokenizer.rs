use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::taxonomy::{self, Token, TokenGroup};

/// Set of recognized tokens, iterated in vocabulary order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSet(BTreeSet<Token>);

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: Token) -> bool {
        self.0.insert(token)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.0.contains(&token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Token> + '_ {
        self.0.iter().copied()
    }

    pub fn intersection(&self, other: &TokenSet) -> TokenSet {
        self.0.intersection(&other.0).copied().collect()
    }

    pub fn in_group(&self, group: TokenGroup) -> impl Iterator<Item = Token> + '_ {
        self.iter().filter(move |t| t.group() == group)
    }

    /// Highest-precedence token of `group`, if any.
    pub fn primary(&self, group: TokenGroup) -> Option<Token> {
        self.in_group(group).max_by_key(|t| t.precedence())
    }

    /// Groups holding two tokens that should not appear together.
    pub fn conflicts(&self) -> Vec<TokenGroup> {
        taxonomy::vocabulary_groups()
            .into_iter()
            .filter(|group| {
                let members: Vec<Token> = self.in_group(*group).collect();
                members
                    .iter()
                    .enumerate()
                    .any(|(i, a)| members[i + 1..].iter().any(|b| !a.is_compatible_with(*b)))
            })
            .collect()
    }
}

impl FromIterator<Token> for TokenSet {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        TokenSet(iter.into_iter().collect())
    }
}

impl fmt::Display for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Token::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Full tokenizer output, including what was discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub tokens: TokenSet,
    /// Fragments with no taxonomy entry, lower-cased, in order of appearance.
    pub unrecognized: Vec<String>,
    pub conflicts: Vec<TokenGroup>,
}

pub fn tokenize(raw_name: &str) -> TokenSet {
    analyze(raw_name).tokens
}

/// Lower-case, split into fragments and classify. Parenthesized content
/// (usually geography or bidding, e.g. "(US)", "(Cost Cap)") is scanned as
/// its own segment so that phrases never span a parenthesis.
pub fn analyze(raw_name: &str) -> Analysis {
    let lowered = raw_name.to_lowercase();
    let mut analysis = Analysis::default();

    for segment in lowered.split(['(', ')']) {
        let fragments = fragments(segment);
        let mut i = 0;
        while i < fragments.len() {
            if let Some(next) = fragments.get(i + 1) {
                if let Some(token) = taxonomy::classify_phrase(fragments[i], next) {
                    analysis.tokens.insert(token);
                    i += 2;
                    continue;
                }
            }
            match taxonomy::classify(fragments[i]) {
                Some(token) => {
                    analysis.tokens.insert(token);
                }
                None => analysis.unrecognized.push(fragments[i].to_string()),
            }
            i += 1;
        }
    }

    analysis.conflicts = analysis.tokens.conflicts();
    analysis
}

/// Split on anything that is not alphanumeric or `+`. A `+` closes its
/// fragment ("s+2" -> "s+", "2"); fragments without letters or digits are dropped.
fn fragments(segment: &str) -> Vec<&str> {
    segment
        .split(|c: char| !(c.is_alphanumeric() || c == '+'))
        .flat_map(|piece| piece.split_inclusive('+'))
        .filter(|f| f.chars().any(char::is_alphanumeric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[Token]) -> TokenSet {
        tokens.iter().copied().collect()
    }

    #[test]
    fn email_campaign_name() {
        let tokens = tokenize("EVRGN-CNS-SMART_PROS_DM (CA)");
        assert_eq!(
            tokens,
            set(&[
                Token::Canada,
                Token::Evergreen,
                Token::Prospecting,
                Token::Conversions,
                Token::SmartPlus,
            ])
        );
    }

    #[test]
    fn sheet_labels() {
        assert_eq!(
            tokenize("S+ 2.0 US Evergreen Prospecting (Lowest Cost)"),
            set(&[
                Token::UnitedStates,
                Token::Evergreen,
                Token::Prospecting,
                Token::LowestCost,
                Token::SmartPlus,
            ])
        );
        assert_eq!(
            tokenize("US Evergreen Prospecting (Cost Cap)"),
            set(&[Token::UnitedStates, Token::Evergreen, Token::Prospecting, Token::CostCap])
        );
        assert_eq!(
            tokenize("Canada CNS Manual (carousel ads only - Lowest Cost)"),
            set(&[Token::Canada, Token::Conversions, Token::LowestCost])
        );
    }

    #[test]
    fn plus_closes_a_fragment() {
        assert!(tokenize("S+2.0 US").contains(Token::SmartPlus));
        assert!(tokenize("Smart+ campaign").contains(Token::SmartPlus));
    }

    #[test]
    fn duplicates_collapse() {
        let tokens = tokenize("US us (US) usa");
        assert_eq!(tokens, set(&[Token::UnitedStates]));
    }

    #[test]
    fn empty_and_garbage_names_yield_empty_set() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("--__()").is_empty());
        assert!(tokenize("hello world 123").is_empty());
    }

    #[test]
    fn unrecognized_fragments_are_reported_not_fatal() {
        let analysis = analyze("EVRGN_TOF_DM (US)");
        assert_eq!(analysis.unrecognized, vec!["dm".to_string()]);
        assert_eq!(analysis.tokens.len(), 3);
    }

    #[test]
    fn tokenize_is_deterministic() {
        let name = "EVRGN-RTG-CC_DM (US)";
        let first = tokenize(name);
        for _ in 0..10 {
            assert_eq!(tokenize(name), first);
        }
    }

    #[test]
    fn primary_token_follows_precedence() {
        let tokens = tokenize("EVRGN-CNS-SMART_PROS_DM (CA)");
        assert_eq!(tokens.primary(TokenGroup::Funnel), Some(Token::Conversions));
        assert_eq!(tokens.primary(TokenGroup::Bidding), Some(Token::SmartPlus));
        assert_eq!(tokens.primary(TokenGroup::Geography), Some(Token::Canada));
        let plain = tokenize("US Evergreen Prospecting (Lowest Cost)");
        assert_eq!(plain.primary(TokenGroup::Funnel), Some(Token::Prospecting));
    }

    #[test]
    fn conflicts_flag_only_irregular_combinations() {
        assert!(tokenize("S+ 2.0 US Evergreen Prospecting (Lowest Cost)")
            .conflicts()
            .is_empty());
        assert_eq!(
            tokenize("EVRGN-CNS-SMART_PROS_DM (CA)").conflicts(),
            vec![TokenGroup::Funnel]
        );
        assert_eq!(
            tokenize("EVRGN_TOF (US) (CA)").conflicts(),
            vec![TokenGroup::Geography]
        );
    }

    #[test]
    fn display_lists_tokens_in_vocabulary_order() {
        let tokens = tokenize("SMART TOF US");
        assert_eq!(tokens.to_string(), "{UNITED_STATES, PROSPECTING, SMART_PLUS}");
    }
}
