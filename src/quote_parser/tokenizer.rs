// WHY: Compiles a quote system into one matcher per nesting depth
// Each marker is its own pattern so the match's pattern id tells the parser what was found

use regex_automata::{meta::Regex, Input};
use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::error::QuoteSystemError;
use crate::quote_system::QuotationMark;

/// What a matched marker means at the depth it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Closer for the current depth
    Closer,
    /// Explicit end of a dialogue-dash quote (depth 1)
    DialogueEnd,
    /// Opener for the next depth
    Opener,
    /// Dialogue dash that may open a level-1 quote (depth 0)
    DialogueStart,
    /// Paragraph continuation marker for the current depth
    Continuer,
}

/// One match: `start..marker_end` is the marker itself, `marker_end..end` the
/// trailing punctuation and whitespace consumed up to the next letter or digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteToken {
    pub kind: TokenKind,
    pub start: usize,
    pub marker_end: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct DepthMatcher {
    /// None when no marker is defined for this depth: matches nothing
    regex: Option<Regex>,
    tokens: Vec<(TokenKind, String)>,
}

impl DepthMatcher {
    /// Find the next token at or after byte offset `from`
    pub fn find(&self, text: &str, from: usize) -> Option<QuoteToken> {
        let regex = self.regex.as_ref()?;
        if from >= text.len() {
            return None;
        }
        let found = regex.find(Input::new(text).span(from..text.len()))?;
        let (kind, marker) = &self.tokens[found.pattern().as_usize()];
        Some(QuoteToken {
            kind: *kind,
            start: found.start(),
            marker_end: found.start() + marker.len(),
            end: found.end(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    /// Markers in match-priority order
    pub fn markers(&self) -> impl Iterator<Item = (TokenKind, &str)> {
        self.tokens.iter().map(|(kind, marker)| (*kind, marker.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct QuoteTokenizer {
    depths: Vec<DepthMatcher>,
}

impl QuoteTokenizer {
    pub(crate) fn build(
        levels: &[QuotationMark],
        dialogue: Option<&QuotationMark>,
    ) -> Result<Self, QuoteSystemError> {
        let trailing = trailing_pattern(levels, dialogue);
        let deepest = levels.len().max(usize::from(dialogue.is_some()));

        let mut depths = Vec::with_capacity(deepest + 1);
        for depth in 0..=deepest {
            let tokens = tokens_for_depth(depth, levels, dialogue);
            let regex = if tokens.is_empty() {
                None
            } else {
                let patterns: Vec<String> = tokens
                    .iter()
                    .map(|(_, marker)| format!("{}{trailing}", regex_syntax::escape(marker)))
                    .collect();
                let regex = Regex::new_many(&patterns)
                    .map_err(|e| QuoteSystemError::Pattern { depth, message: e.to_string() })?;
                Some(regex)
            };
            depths.push(DepthMatcher { regex, tokens });
        }

        Ok(Self { depths })
    }

    /// Matcher for a depth; depths past the deepest defined level reuse the deepest matcher
    pub fn matcher(&self, depth: usize) -> &DepthMatcher {
        &self.depths[depth.min(self.depths.len() - 1)]
    }

    pub fn depth_count(&self) -> usize {
        self.depths.len()
    }
}

fn tokens_for_depth(
    depth: usize,
    levels: &[QuotationMark],
    dialogue: Option<&QuotationMark>,
) -> Vec<(TokenKind, String)> {
    let mut candidates: Vec<(TokenKind, &str)> = Vec::new();

    if let Some(current) = depth.checked_sub(1).and_then(|index| levels.get(index)) {
        candidates.push((TokenKind::Closer, &current.close));
    }
    if depth == 1 {
        if let Some(end) = dialogue.map(|mark| mark.close.as_str()).filter(|end| !end.is_empty()) {
            candidates.push((TokenKind::DialogueEnd, end));
        }
    }
    if let Some(next) = levels.get(depth) {
        candidates.push((TokenKind::Opener, &next.open));
    }
    if depth == 0 {
        let start = dialogue.map(|mark| mark.open.as_str()).filter(|start| !start.is_empty());
        if let Some(start) = start {
            candidates.push((TokenKind::DialogueStart, start));
        }
    }
    if let Some(current) = depth.checked_sub(1).and_then(|index| levels.get(index)) {
        candidates.push((TokenKind::Continuer, &current.continuation));
    }

    // Same literal twice: the earlier (higher priority) meaning wins
    let mut seen = BTreeSet::new();
    let mut tokens: Vec<(TokenKind, String)> = candidates
        .into_iter()
        .filter(|(_, marker)| !marker.is_empty() && seen.insert(marker.to_string()))
        .map(|(kind, marker)| (kind, marker.to_string()))
        .collect();

    // Space-containing and longer markers first so "“ ‘" is never read as a bare "“"
    tokens.sort_by_key(|(_, marker)| {
        (!marker.chars().any(char::is_whitespace), Reverse(marker.chars().count()))
    });
    tokens
}

/// Everything up to the next letter or digit, stopping at any quotation marker character
fn trailing_pattern(levels: &[QuotationMark], dialogue: Option<&QuotationMark>) -> String {
    let marker_chars: BTreeSet<char> = levels
        .iter()
        .chain(dialogue)
        .flat_map(|mark| [mark.open.as_str(), mark.close.as_str(), mark.continuation.as_str()])
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut class = String::from(r"[^\p{L}\p{N}\p{M}");
    for c in marker_chars {
        class.push_str(&regex_syntax::escape(&c.to_string()));
    }
    class.push_str("]*");
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_levels() -> Vec<QuotationMark> {
        vec![
            QuotationMark::normal("“", "”", "“", 1),
            QuotationMark::normal("‘", "’", "“ ‘", 2),
            QuotationMark::normal("“", "”", "“ ‘ “", 3),
        ]
    }

    #[test]
    fn test_depth_zero_finds_opener_with_trailing_space() {
        let tokenizer = QuoteTokenizer::build(&english_levels(), None).unwrap();
        let text = "He said, “ Go home.”";
        let token = tokenizer.matcher(0).find(text, 0).unwrap();
        assert_eq!(token.kind, TokenKind::Opener);
        assert_eq!(&text[token.start..token.marker_end], "“");
        assert_eq!(&text[token.marker_end..token.end], " ");
    }

    #[test]
    fn test_closer_consumes_trailing_punctuation_but_not_other_markers() {
        let tokenizer = QuoteTokenizer::build(&english_levels(), None).unwrap();
        let text = "home’”, he said";
        let inner = tokenizer.matcher(2).find(text, 0).unwrap();
        assert_eq!(inner.kind, TokenKind::Closer);
        assert_eq!(inner.end, inner.marker_end, "Level-1 closer must not be swallowed");

        let outer = tokenizer.matcher(1).find(text, inner.end).unwrap();
        assert_eq!(outer.kind, TokenKind::Closer);
        assert_eq!(&text[outer.marker_end..outer.end], ", ");
    }

    #[test]
    fn test_space_containing_continuer_is_preferred() {
        let tokenizer = QuoteTokenizer::build(&english_levels(), None).unwrap();
        let markers: Vec<_> = tokenizer.matcher(2).markers().collect();
        assert_eq!(markers[0], (TokenKind::Continuer, "“ ‘"));
    }

    #[test]
    fn test_deep_text_reuses_deepest_matcher() {
        let tokenizer = QuoteTokenizer::build(&english_levels(), None).unwrap();
        assert_eq!(tokenizer.depth_count(), 4);
        let deepest: Vec<_> = tokenizer.matcher(3).markers().collect();
        let beyond: Vec<_> = tokenizer.matcher(9).markers().collect();
        assert_eq!(deepest, beyond);
        assert!(!deepest.iter().any(|(kind, _)| *kind == TokenKind::Opener));
    }

    #[test]
    fn test_depth_without_markers_matches_nothing() {
        let tokenizer = QuoteTokenizer::build(&[], None).unwrap();
        let matcher = tokenizer.matcher(0);
        assert!(matcher.is_empty());
        assert_eq!(matcher.find("anything “at” all", 0), None);
    }

    #[test]
    fn test_dialogue_only_system() {
        let dash = QuotationMark::dialogue_dash("—", None);
        let tokenizer = QuoteTokenizer::build(&[], Some(&dash)).unwrap();
        let token = tokenizer.matcher(0).find("—Go home.", 0).unwrap();
        assert_eq!(token.kind, TokenKind::DialogueStart);
        assert!(tokenizer.matcher(1).is_empty());
    }

    #[test]
    fn test_dialogue_end_shares_depth_one_with_closer() {
        let dash = QuotationMark::dialogue_dash("«", Some("»"));
        let levels = [QuotationMark::normal("“", "”", "", 1)];
        let tokenizer = QuoteTokenizer::build(&levels, Some(&dash)).unwrap();
        let kinds: Vec<_> = tokenizer.matcher(1).markers().map(|(kind, _)| kind).collect();
        assert!(kinds.contains(&TokenKind::Closer));
        assert!(kinds.contains(&TokenKind::DialogueEnd));
        let text = "Mbəɗanafwa» ka";
        let token = tokenizer.matcher(1).find(text, 0).unwrap();
        assert_eq!(token.kind, TokenKind::DialogueEnd);
    }
}
