use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Closed vocabulary shared by platform exports and sheet labels.
/// Declaration order is the canonical iteration order of a `TokenSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Token {
    UnitedStates,
    Canada,
    Evergreen,
    Prospecting,
    Retargeting,
    Reengagement,
    Conversions,
    CostCap,
    LowestCost,
    SmartPlus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenGroup {
    Geography,
    Funnel,
    Bidding,
}

impl fmt::Display for TokenGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenGroup::Geography => write!(f, "geography"),
            TokenGroup::Funnel => write!(f, "funnel"),
            TokenGroup::Bidding => write!(f, "bidding"),
        }
    }
}

impl Token {
    pub const ALL: [Token; 10] = [
        Token::UnitedStates,
        Token::Canada,
        Token::Evergreen,
        Token::Prospecting,
        Token::Retargeting,
        Token::Reengagement,
        Token::Conversions,
        Token::CostCap,
        Token::LowestCost,
        Token::SmartPlus,
    ];

    pub fn group(self) -> TokenGroup {
        match self {
            Token::UnitedStates | Token::Canada => TokenGroup::Geography,
            Token::Evergreen
            | Token::Prospecting
            | Token::Retargeting
            | Token::Reengagement
            | Token::Conversions => TokenGroup::Funnel,
            Token::CostCap | Token::LowestCost | Token::SmartPlus => TokenGroup::Bidding,
        }
    }

    /// Rank within the token's group; the highest-ranked token present is the
    /// group's primary token. Evergreen is the umbrella stage, so any specific
    /// stage outranks it. Smart+ outranks cost cap, which outranks lowest cost.
    pub fn precedence(self) -> u8 {
        match self {
            Token::UnitedStates | Token::Canada => 1,
            Token::Evergreen => 0,
            Token::Prospecting => 1,
            Token::Reengagement => 2,
            Token::Retargeting => 3,
            Token::Conversions => 4,
            Token::LowestCost => 0,
            Token::CostCap => 1,
            Token::SmartPlus => 2,
        }
    }

    /// Whether both tokens may appear in one campaign name without making it
    /// ambiguous. Tokens from different groups always can. Within a group only
    /// Evergreen next to a specific stage, and lowest cost next to Smart+, are
    /// regular naming.
    pub fn is_compatible_with(self, other: Token) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Token::Evergreen, b) | (b, Token::Evergreen) if b.group() == TokenGroup::Funnel => true,
            (Token::SmartPlus, Token::LowestCost) | (Token::LowestCost, Token::SmartPlus) => true,
            (a, b) => a.group() != b.group(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Token::UnitedStates => "UNITED_STATES",
            Token::Canada => "CANADA",
            Token::Evergreen => "EVERGREEN",
            Token::Prospecting => "PROSPECTING",
            Token::Retargeting => "RETARGETING",
            Token::Reengagement => "REENGAGEMENT",
            Token::Conversions => "CONVERSIONS",
            Token::CostCap => "COST_CAP",
            Token::LowestCost => "LOWEST_COST",
            Token::SmartPlus => "SMART_PLUS",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Abbreviation table ────────────────────────────────────────────────────────

/// Single-fragment spellings, lower-case. Every abbreviation seen in platform
/// exports must map here, otherwise those names only ever reach low-confidence
/// overlap scoring.
const ABBREVIATIONS: &[(&str, Token)] = &[
    // geography
    ("us", Token::UnitedStates),
    ("usa", Token::UnitedStates),
    ("ca", Token::Canada),
    ("canada", Token::Canada),
    // funnel
    ("evrgn", Token::Evergreen),
    ("evg", Token::Evergreen),
    ("evergreen", Token::Evergreen),
    ("tof", Token::Prospecting),
    ("pros", Token::Prospecting),
    ("prospecting", Token::Prospecting),
    ("rtg", Token::Retargeting),
    ("retargeting", Token::Retargeting),
    ("reeng", Token::Reengagement),
    ("reengagement", Token::Reengagement),
    ("cns", Token::Conversions),
    ("conv", Token::Conversions),
    ("conversions", Token::Conversions),
    // bidding
    ("cc", Token::CostCap),
    ("costcap", Token::CostCap),
    ("lc", Token::LowestCost),
    ("manual", Token::LowestCost),
    ("lowestcost", Token::LowestCost),
    ("smart", Token::SmartPlus),
    ("smart+", Token::SmartPlus),
    ("s+", Token::SmartPlus),
    ("splus", Token::SmartPlus),
];

/// Two-fragment spellings used by sheet labels.
const PHRASES: &[(&str, &str, Token)] = &[
    ("cost", "cap", Token::CostCap),
    ("lowest", "cost", Token::LowestCost),
];

/// Map one name fragment to its token. Case-insensitive.
pub fn classify(fragment: &str) -> Option<Token> {
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| abbr.eq_ignore_ascii_case(fragment))
        .map(|(_, token)| *token)
}

/// Map two adjacent fragments to a token when together they spell one.
pub fn classify_phrase(first: &str, second: &str) -> Option<Token> {
    PHRASES
        .iter()
        .find(|(a, b, _)| a.eq_ignore_ascii_case(first) && b.eq_ignore_ascii_case(second))
        .map(|(_, _, token)| *token)
}

pub fn vocabulary_groups() -> BTreeSet<TokenGroup> {
    Token::ALL.iter().map(|t| t.group()).collect()
}
