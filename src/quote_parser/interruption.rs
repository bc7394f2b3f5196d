// WHY: Asides such as "(let the reader understand)" inside a quotation belong to another speaker
// Splitting them out leaves the surrounding quotation blocks to be resolved as one run

use std::ops::Range;

use crate::block::{Block, BlockElement, MultiBlockQuote};
use crate::character_verse::CharacterSpeakingMode;
use crate::speaker::SpeakerId;

/// A quote block cut around one interruption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptionSplit {
    pub before: Option<Block>,
    pub interruption: Block,
    pub after: Option<Block>,
}

/// Byte range of the first parenthetical or dash-delimited aside in `text`,
/// including the punctuation and whitespace that follow it
pub fn find_interruption(text: &str) -> Option<Range<usize>> {
    find_delimited(text, '(', ')').or_else(|| find_delimited(text, '—', '—'))
}

fn find_delimited(text: &str, open: char, close: char) -> Option<Range<usize>> {
    let start = text.find(open)?;
    let inner_start = start + open.len_utf8();
    let inner_end = inner_start + text[inner_start..].find(close)?;
    if !text[inner_start..inner_end].chars().any(char::is_alphanumeric) {
        return None;
    }
    let end = inner_end + close.len_utf8();
    Some(start..end + trailing_len(&text[end..]))
}

fn trailing_len(rest: &str) -> usize {
    let punctuation = rest
        .chars()
        .next()
        .filter(|c| matches!(c, ',' | ';' | ':'))
        .map_or(0, char::len_utf8);
    let spaces: usize = rest[punctuation..]
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    punctuation + spaces
}

/// Cut the first aside out of `block` and give it to `interrupter`
pub fn split_interruption(
    block: &Block,
    interrupter: &CharacterSpeakingMode,
) -> Option<InterruptionSplit> {
    let (index, range) =
        block.elements.iter().enumerate().find_map(|(index, element)| match element {
            BlockElement::Text(text) => find_interruption(text).map(|range| (index, range)),
            BlockElement::Verse(_) => None,
        })?;
    let BlockElement::Text(text) = &block.elements[index] else {
        return None;
    };

    let head = &text[..range.start];
    let aside = &text[range.clone()];
    let tail = &text[range.end..];

    let mut elements = block.elements[..index].to_vec();
    elements.extend(
        [head, aside, tail]
            .into_iter()
            .filter(|piece| !piece.is_empty())
            .map(|piece| BlockElement::Text(piece.to_string())),
    );
    elements.extend_from_slice(&block.elements[index + 1..]);
    let mut working = block.clone();
    working.elements = elements;

    let aside_index = index + usize::from(!head.is_empty());
    let (mut before, rest) = working.split_at_element(aside_index);
    let (mut interruption, mut after) = rest.split_at_element(1);

    // The aside takes over any verse markers that would otherwise end the head
    while let Some(BlockElement::Verse(verse)) = before.elements.last().cloned() {
        before.elements.pop();
        interruption.elements.insert(0, BlockElement::Verse(verse.clone()));
        let verses = verse.range();
        interruption.initial_start_verse = verses.start;
        interruption.initial_end_verse = if verses.end > verses.start { verses.end } else { 0 };
    }

    let before = if before.text().trim().is_empty() {
        interruption.is_paragraph_start = before.is_paragraph_start;
        for element in before.elements.into_iter().rev() {
            interruption.elements.insert(0, element);
        }
        if before.initial_start_verse != 0 && !interruption.starts_with_verse_marker() {
            interruption.initial_start_verse = before.initial_start_verse;
            interruption.initial_end_verse = before.initial_end_verse;
        }
        None
    } else {
        Some(before)
    };

    let after = if after.text().trim().is_empty() {
        for element in after.elements.drain(..) {
            match element {
                BlockElement::Text(text) => interruption.add_text(&text),
                verse => interruption.elements.push(verse),
            }
        }
        None
    } else {
        Some(after)
    };

    interruption.set_speaker(
        SpeakerId::from_character_id(&interrupter.character),
        interrupter.delivery.clone(),
    );
    interruption.character_id_in_script = interrupter.character_in_script();
    interruption.multi_block_quote = MultiBlockQuote::None;

    Some(InterruptionSplit { before, interruption, after })
}
