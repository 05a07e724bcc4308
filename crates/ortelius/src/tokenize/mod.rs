//! Query tokenization and decomposition.
//!
//! Raw queries are normalized with the exact same routine the store-side
//! indexer uses (see [`ortelius_gazetteer::normalize`]), then classified:
//! leading/trailing numerics become house-number tokens, postcode shapes
//! are recognized, a `near` word becomes a qualifier. Because phrase
//! boundaries in free text are ambiguous, the tokenizer emits a finite,
//! consumed-once sequence of decomposition candidates for the retriever
//! to try in turn.

use once_cell::sync::Lazy;
use ortelius_gazetteer::normalize_tokens;
use regex::Regex;
use tracing::trace;

use crate::error::InputError;
use crate::options::FINEST_RANK;

/// Address rank implied by a postcode-shaped query.
const POSTCODE_RANK: u8 = 25;

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,4}[a-z]?$").unwrap());
static POSTCODE_NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(\d{4})?$").unwrap());
static UK_POSTCODE_OUT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{1,2}\d[a-z\d]?$").unwrap());
static UK_POSTCODE_IN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d[a-z]{2}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word,
    /// Several words grouped as one unit by a decomposition.
    Phrase,
    Postcode,
    HouseNumber,
    /// A spatial-relation word such as `near`; kept out of the match set.
    Qualifier,
}

/// A normalized text unit with a kind tag and a match weight.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub weight: f32,
}

impl Token {
    fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        let weight = match kind {
            TokenKind::Word | TokenKind::Phrase => 1.0,
            TokenKind::Postcode => 1.2,
            TokenKind::HouseNumber => 0.8,
            TokenKind::Qualifier => 0.0,
        };
        Self {
            text: text.into(),
            kind,
            weight,
        }
    }

    /// The individual index tokens this token stands for.
    pub(crate) fn store_tokens(&self) -> impl Iterator<Item = &str> {
        self.text.split(' ').filter(|t| !t.is_empty())
    }
}

/// A tokenized query: the literal word sequence plus recognized
/// structured sub-patterns.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenizedQuery {
    pub words: Vec<Token>,
    pub house_number: Option<Token>,
    pub postcode: Option<Token>,
    pub has_qualifier: bool,
}

impl TokenizedQuery {
    /// Tokenize a raw query string.
    pub(crate) fn parse(raw: &str) -> Result<Self, InputError> {
        let mut tokens = normalize_tokens(raw);
        if tokens.is_empty() {
            return Err(InputError::EmptyQuery);
        }

        let mut query = Self::default();

        // UK-style postcode: two trailing tokens like `sw1a 2aa`.
        if tokens.len() >= 2 {
            let n = tokens.len();
            if UK_POSTCODE_OUT_RE.is_match(&tokens[n - 2]) && UK_POSTCODE_IN_RE.is_match(&tokens[n - 1]) {
                let inward = tokens.pop().unwrap_or_default();
                let outward = tokens.pop().unwrap_or_default();
                query.postcode = Some(Token::new(format!("{outward} {inward}"), TokenKind::Postcode));
            }
        }

        // Single-token numeric postcode (5+ digits, never a house number).
        if query.postcode.is_none()
            && tokens.len() >= 2
            && tokens.last().is_some_and(|t| POSTCODE_NUMERIC_RE.is_match(t))
        {
            let text = tokens.pop().unwrap_or_default();
            query.postcode = Some(Token::new(text, TokenKind::Postcode));
        }

        // Trailing, then leading, short numeric token is a house number,
        // provided words remain to match a name against.
        if tokens.len() >= 2 {
            if tokens.last().is_some_and(|t| NUMERIC_RE.is_match(t)) {
                let text = tokens.pop().unwrap_or_default();
                query.house_number = Some(Token::new(text, TokenKind::HouseNumber));
            } else if tokens.first().is_some_and(|t| NUMERIC_RE.is_match(t)) {
                let text = tokens.remove(0);
                query.house_number = Some(Token::new(text, TokenKind::HouseNumber));
            }
        }

        for token in tokens {
            if token == "near" {
                query.has_qualifier = true;
                continue;
            }
            query.words.push(Token::new(token, TokenKind::Word));
        }

        if query.words.is_empty() && query.house_number.is_none() && query.postcode.is_none() {
            return Err(InputError::EmptyQuery);
        }
        trace!(?query, "query tokenized");
        Ok(query)
    }

    /// Build directly from already-classified parts (structured search).
    pub(crate) fn from_parts(
        words: Vec<String>,
        house_number: Option<String>,
        postcode: Option<String>,
    ) -> Self {
        Self {
            words: words
                .into_iter()
                .map(|w| Token::new(w, TokenKind::Word))
                .collect(),
            house_number: house_number.map(|h| Token::new(h, TokenKind::HouseNumber)),
            postcode: postcode.map(|p| Token::new(p, TokenKind::Postcode)),
            has_qualifier: false,
        }
    }

    /// Address rank the query shape points at, if any: a house number
    /// means house level, a postcode means postcode level.
    pub(crate) fn implied_rank(&self) -> Option<u8> {
        if self.house_number.is_some() {
            Some(FINEST_RANK)
        } else if self.postcode.is_some() {
            Some(POSTCODE_RANK)
        } else {
            None
        }
    }

    /// The finite, consumed-once sequence of decomposition candidates.
    pub(crate) fn decompositions(self, max: usize) -> Decompositions {
        Decompositions {
            query: self,
            next_variant: 0,
            max: max.max(1),
        }
    }

    fn with_extras(&self, mut tokens: Vec<Token>, postcode: bool, house: bool) -> Vec<Token> {
        if house {
            if let Some(h) = &self.house_number {
                tokens.push(h.clone());
            }
        }
        if postcode {
            if let Some(p) = &self.postcode {
                tokens.push(p.clone());
            }
        }
        tokens
    }

    /// Group the word sequence into two phrases split before `at`.
    fn split_at_phrase(&self, at: usize) -> Vec<Token> {
        let join = |tokens: &[Token]| {
            tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut out = Vec::with_capacity(2);
        if at > 0 {
            out.push(Token::new(join(&self.words[..at]), TokenKind::Phrase));
        }
        if at < self.words.len() {
            out.push(Token::new(join(&self.words[at..]), TokenKind::Phrase));
        }
        out
    }
}

/// Iterator over decomposition candidates.
///
/// Variants, in order: the literal token sequence with all structured
/// extras, then every two-way phrase split, then the sequence without the
/// postcode, then without the house number. Finite and non-restartable;
/// the retriever consumes each decomposition exactly once.
#[derive(Debug)]
pub(crate) struct Decompositions {
    query: TokenizedQuery,
    next_variant: usize,
    max: usize,
}

impl Iterator for Decompositions {
    type Item = Vec<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.next_variant >= self.max {
                return None;
            }
            let variant = self.next_variant;
            self.next_variant += 1;

            let word_count = self.query.words.len();
            // Variant 0: literal sequence. 1..word_count: phrase splits.
            // Then structured-extra drops.
            let splits = word_count.saturating_sub(1);
            let candidate = if variant == 0 {
                Some(
                    self.query
                        .with_extras(self.query.words.clone(), true, true),
                )
            } else if variant <= splits {
                Some(
                    self.query
                        .with_extras(self.query.split_at_phrase(variant), true, true),
                )
            } else if variant == splits + 1 && self.query.postcode.is_some() {
                Some(self.query.with_extras(self.query.words.clone(), false, true))
            } else if variant == splits + 2 && self.query.house_number.is_some() {
                Some(self.query.with_extras(self.query.words.clone(), true, false))
            } else if variant > splits + 2 {
                self.next_variant = self.max;
                None
            } else {
                continue;
            };

            match candidate {
                Some(tokens) if !tokens.is_empty() => return Some(tokens),
                Some(_) => continue,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected() {
        assert!(matches!(
            TokenizedQuery::parse(""),
            Err(InputError::EmptyQuery)
        ));
        assert!(matches!(
            TokenizedQuery::parse("   \t "),
            Err(InputError::EmptyQuery)
        ));
        assert!(matches!(
            TokenizedQuery::parse(",,;;"),
            Err(InputError::EmptyQuery)
        ));
    }

    #[test]
    fn leading_house_number_is_extracted() {
        let q = TokenizedQuery::parse("10 Downing Street").unwrap();
        assert_eq!(q.house_number.as_ref().unwrap().text, "10");
        let words: Vec<&str> = q.words.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["downing", "street"]);
        assert_eq!(q.implied_rank(), Some(FINEST_RANK));
    }

    #[test]
    fn trailing_house_number_is_extracted() {
        let q = TokenizedQuery::parse("Hauptstraße 12a").unwrap();
        assert_eq!(q.house_number.as_ref().unwrap().text, "12a");
        assert_eq!(q.words.len(), 1);
        assert_eq!(q.words[0].text, "hauptstraße");
    }

    #[test]
    fn uk_postcode_is_recognized() {
        let q = TokenizedQuery::parse("Downing Street SW1A 2AA").unwrap();
        assert_eq!(q.postcode.as_ref().unwrap().text, "sw1a 2aa");
        assert_eq!(q.words.len(), 2);
        assert_eq!(q.implied_rank(), Some(POSTCODE_RANK));
    }

    #[test]
    fn five_digit_postcode_is_recognized() {
        let q = TokenizedQuery::parse("Berlin 10117").unwrap();
        assert_eq!(q.postcode.as_ref().unwrap().text, "10117");
        assert_eq!(q.words.len(), 1);
    }

    #[test]
    fn near_becomes_qualifier() {
        let q = TokenizedQuery::parse("restaurants near city hall").unwrap();
        assert!(q.has_qualifier);
        let words: Vec<&str> = q.words.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["restaurants", "city", "hall"]);
    }

    #[test]
    fn bare_number_stays_a_word() {
        // A single numeric token has nothing to be a house number of.
        let q = TokenizedQuery::parse("42").unwrap();
        assert!(q.house_number.is_none());
        assert_eq!(q.words.len(), 1);
        assert_eq!(q.implied_rank(), None);
    }

    #[test]
    fn decompositions_are_finite_and_start_literal() {
        let q = TokenizedQuery::parse("new york city hall").unwrap();
        let variants: Vec<Vec<Token>> = q.decompositions(8).collect();
        assert!(!variants.is_empty());
        assert!(variants.len() <= 8);

        // First variant is the literal word sequence.
        let first: Vec<&str> = variants[0].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(first, vec!["new", "york", "city", "hall"]);

        // Phrase splits follow, e.g. "new york" / "city hall".
        assert!(variants.iter().any(|v| {
            v.iter()
                .any(|t| t.kind == TokenKind::Phrase && t.text == "new york")
        }));
    }

    #[test]
    fn decomposition_drops_house_number_variant() {
        let q = TokenizedQuery::parse("10 example street").unwrap();
        let variants: Vec<Vec<Token>> = q.decompositions(8).collect();
        // Some variant must try the words without the house number.
        assert!(
            variants
                .iter()
                .any(|v| v.iter().all(|t| t.kind != TokenKind::HouseNumber))
        );
    }

    #[test]
    fn decompositions_respect_cap() {
        let q = TokenizedQuery::parse("a b c d e f g h i j").unwrap();
        assert_eq!(q.decompositions(3).count(), 3);
    }
}
