// WHY: Some verses are spoken by one character with no quotation marks at all (psalms, discourses)
// Runs once over the finished book and only reconsiders blocks still given to the narrator

use tracing::debug;

use super::{ParserSettings, Resolution};
use crate::block::{Block, BlockElement, VerseRange};
use crate::character_verse::{CharacterSpeakingMode, CharacterVerseRepository, Versification};
use crate::speaker::{BookId, SpeakerId};

/// What the pass needs to know about the blocks around the one it is changing
#[derive(Debug, Clone)]
struct Neighbor {
    character: SpeakerId,
    delivery: Option<String>,
    character_id_in_script: Option<String>,
    chapter: u32,
    last_verses: VerseRange,
}

impl Neighbor {
    fn of(block: &Block) -> Option<Self> {
        block.is_scripture().then(|| Self {
            character: block.character.clone(),
            delivery: block.delivery.clone(),
            character_id_in_script: block.character_id_in_script.clone(),
            chapter: block.chapter_number,
            last_verses: block.last_verses(),
        })
    }

    /// Assigned to a named character by quote detection
    fn is_explicitly(&self, speaker: &SpeakerId) -> bool {
        matches!(self.character, SpeakerId::Known(_)) && self.character == *speaker
    }
}

/// Consecutive verse segments sharing the same implicit speaker
#[derive(Debug)]
struct Piece {
    element_start: usize,
    implicit: Option<CharacterSpeakingMode>,
}

/// Give narrator blocks to the implicit speaker of their verses, splitting where that changes
pub fn apply_implicit_characters(
    book: &BookId,
    blocks: Vec<Block>,
    repository: &dyn CharacterVerseRepository,
    versification: &Versification,
    settings: &ParserSettings,
) -> Vec<Block> {
    let neighbors: Vec<Option<Neighbor>> = blocks.iter().map(Neighbor::of).collect();
    let mut result = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.into_iter().enumerate() {
        if !block.character.is_narrator() || !block.is_scripture() {
            result.push(block);
            continue;
        }

        let pieces = implicit_pieces(book, &block, repository, versification);
        if pieces.iter().all(|piece| piece.implicit.is_none()) {
            result.push(block);
            continue;
        }

        let previous = index.checked_sub(1).and_then(|i| neighbors[i].as_ref());
        let next = neighbors.get(index + 1).and_then(Option::as_ref);

        if let [piece] = pieces.as_slice() {
            let mut block = block;
            if let Some(mode) = &piece.implicit {
                assign_implicit(&mut block, mode, previous, next);
            }
            debug!(
                book = %book,
                chapter = block.chapter_number,
                character = %block.character,
                "Implicit speaker for whole block"
            );
            result.push(block);
            continue;
        }

        let parts = split_into_pieces(block, &pieces);
        let last = parts.len() - 1;
        for (position, (mut part, piece)) in parts.into_iter().zip(&pieces).enumerate() {
            let before = if position == 0 { previous } else { None };
            let after = if position == last { next } else { None };

            match &piece.implicit {
                Some(mode) => assign_implicit(&mut part, mode, before, after),
                None if position == 0 => {
                    let following = pieces.get(1).and_then(|piece| piece.implicit.as_ref());
                    let lead_in = lead_in_speaker(&part, following, previous, settings);
                    if let Some(resolution) = lead_in {
                        resolution.apply_to(&mut part);
                    }
                }
                None => {}
            }
            debug!(
                book = %book,
                chapter = part.chapter_number,
                verse = part.initial_start_verse,
                character = %part.character,
                "Implicit speaker for split block"
            );
            result.push(part);
        }
    }

    result
}

fn implicit_pieces(
    book: &BookId,
    block: &Block,
    repository: &dyn CharacterVerseRepository,
    versification: &Versification,
) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    for segment in block.verse_segments() {
        let implicit = repository.get_implicit_character(
            book,
            block.chapter_number,
            segment.verses.start,
            segment.verses.end,
            versification,
        );
        match pieces.last() {
            Some(last) if last.implicit == implicit => {}
            _ => pieces.push(Piece { element_start: segment.element_start, implicit }),
        }
    }
    pieces
}

fn split_into_pieces(block: Block, pieces: &[Piece]) -> Vec<Block> {
    let mut parts = Vec::with_capacity(pieces.len());
    let mut rest = block;
    for piece in pieces[1..].iter().rev() {
        let (mut head, mut tail) = rest.split_at_element(piece.element_start);
        move_trailing_verses(&mut head, &mut tail);
        parts.push(tail);
        rest = head;
    }
    parts.push(rest);
    parts.reverse();
    parts
}

/// A verse with no text of its own travels with the verse after it
fn move_trailing_verses(head: &mut Block, tail: &mut Block) {
    while let Some(BlockElement::Verse(verse)) = head.elements.last().cloned() {
        head.elements.pop();
        let verses = verse.range();
        tail.initial_start_verse = verses.start;
        tail.initial_end_verse = if verses.end > verses.start { verses.end } else { 0 };
        tail.elements.insert(0, BlockElement::Verse(verse));
    }
}

fn assign_implicit(
    block: &mut Block,
    mode: &CharacterSpeakingMode,
    previous: Option<&Neighbor>,
    next: Option<&Neighbor>,
) {
    let speaker = SpeakerId::from_character_id(&mode.character);
    if [previous, next].into_iter().flatten().any(|neighbor| neighbor.is_explicitly(&speaker)) {
        // Explicit quote right next to an implicit span of the same speaker: data is suspect
        Resolution::sentinel(SpeakerId::NeedsReview).apply_to(block);
        return;
    }

    block.set_speaker(speaker, mode.delivery.clone());
    block.character_id_in_script = script_character(mode, previous, next);
}

/// Prefer the alternative of a composite id that an adjoining block already uses
fn script_character(
    mode: &CharacterSpeakingMode,
    previous: Option<&Neighbor>,
    next: Option<&Neighbor>,
) -> Option<String> {
    if !mode.is_composite() {
        return None;
    }
    for neighbor in [previous, next].into_iter().flatten() {
        match neighbor.character.character_id() {
            Some(id) if id == mode.character => {
                if let Some(in_script) = &neighbor.character_id_in_script {
                    return Some(in_script.clone());
                }
            }
            Some(id)
                if neighbor.delivery == mode.delivery
                    && mode.character_ids().any(|part| part == id) =>
            {
                return Some(id.to_string());
            }
            _ => {}
        }
    }
    mode.character_in_script()
}

/// Short partial verse before the first verse marker, continuing the previous block's verse
fn lead_in_speaker(
    part: &Block,
    following: Option<&CharacterSpeakingMode>,
    previous: Option<&Neighbor>,
    settings: &ParserSettings,
) -> Option<Resolution> {
    let previous = previous?;
    let continues_verse = !part.starts_with_verse_marker()
        && previous.chapter == part.chapter_number
        && previous.last_verses.contains(part.initial_start_verse);
    if !continues_verse || part.word_count() > settings.lead_in_max_words {
        return None;
    }

    if previous.character.is_narrator() {
        return None;
    }
    let following = following.map(|mode| SpeakerId::from_character_id(&mode.character));
    if !previous.character.is_sentinel() && following.as_ref() == Some(&previous.character) {
        return Some(Resolution {
            character: previous.character.clone(),
            delivery: previous.delivery.clone(),
            character_id_in_script: previous.character_id_in_script.clone(),
        });
    }
    // Adjoining speaker does not carry on into the implicit span
    Some(Resolution::sentinel(SpeakerId::NeedsReview))
}
