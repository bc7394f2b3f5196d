// WHY: Per-book quote attribution state machine driven by the per-depth token matchers
// One parser instance per book, consumed by `parse`; nothing in it is shared between books

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::mem;
use tracing::{debug, warn};

use crate::block::{Block, BlockElement, Verse, VerseRange, DEFAULT_FOLLOW_ON_STYLES};
use crate::character_verse::{
    CharacterSpeakingMode, CharacterVerseRepository, QuoteType, Versification,
};
use crate::error::ParseError;
use crate::parallel_processing::ProgressCounter;
use crate::quote_system::QuoteSystem;
use crate::speaker::{BookId, SpeakerId};

pub mod implicit;
pub mod interruption;
pub mod multi_block;
pub mod tokenizer;

use tokenizer::{QuoteToken, TokenKind};

const SENTENCE_FINAL: &[char] = &['.', '!', '?', '…', '։', '؟', '।', '。', '！', '？'];
const CLOSING_PUNCTUATION: &[char] = &['”', '’', '»', '›', '"', '\'', ')', ']'];

/// Tunable heuristics; may appear as a `[parser]` table next to the quote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Longest dialogue span after a colon still read as a labeled expression, in words
    pub colon_label_max_words: usize,
    /// Same limit in characters
    pub colon_label_max_chars: usize,
    /// Longest partial-verse lead segment the implicit pass attaches to a neighbor
    pub lead_in_max_words: usize,
    /// Consider Alternate and Rare reference entries as candidates
    pub include_alternates: bool,
    /// Paragraph styles that continue the preceding paragraph
    pub follow_on_styles: Vec<String>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            colon_label_max_words: 3,
            colon_label_max_chars: 30,
            lead_in_max_words: 4,
            include_alternates: false,
            follow_on_styles: DEFAULT_FOLLOW_ON_STYLES
                .iter()
                .map(|style| style.to_string())
                .collect(),
        }
    }
}

impl ParserSettings {
    pub fn is_follow_on(&self, style_tag: &str) -> bool {
        self.follow_on_styles.iter().any(|style| style == style_tag)
    }
}

/// Speaker chosen for a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub character: SpeakerId,
    pub delivery: Option<String>,
    pub character_id_in_script: Option<String>,
}

impl Resolution {
    pub fn sentinel(character: SpeakerId) -> Self {
        Self { character, delivery: None, character_id_in_script: None }
    }

    fn from_mode(mode: &CharacterSpeakingMode, delivery: Option<String>) -> Self {
        Self {
            character: SpeakerId::from_character_id(&mode.character),
            delivery,
            character_id_in_script: mode.character_in_script(),
        }
    }

    pub fn apply_to(&self, block: &mut Block) {
        block.set_speaker(self.character.clone(), self.delivery.clone());
        block.character_id_in_script = self.character_id_in_script.clone();
    }
}

/// Pick the speaker of a quotation from the candidates left for the verses it covers
///
/// Interruption entries never speak a quotation. A delivery hint from the
/// surrounding quote narrows the choice first; a tie on that delivery needs review.
/// With several characters, a single one among the expected quote types wins.
pub fn resolve_speaker(
    candidates: &[CharacterSpeakingMode],
    delivery_hint: Option<&str>,
) -> Resolution {
    let speaking: Vec<&CharacterSpeakingMode> = candidates
        .iter()
        .filter(|mode| mode.quote_type != QuoteType::Interruption)
        .collect();
    if speaking.is_empty() {
        return Resolution::sentinel(SpeakerId::Unexpected);
    }

    if let Some(hint) = delivery_hint {
        let matching: Vec<&CharacterSpeakingMode> = speaking
            .iter()
            .copied()
            .filter(|mode| mode.delivery.as_deref() == Some(hint))
            .collect();
        match distinct_characters(&matching).len() {
            0 => {}
            1 => return Resolution::from_mode(matching[0], Some(hint.to_string())),
            _ => return Resolution::sentinel(SpeakerId::NeedsReview),
        }
    }

    let chosen = if distinct_characters(&speaking).len() == 1 {
        speaking
    } else {
        let expected: Vec<&CharacterSpeakingMode> =
            speaking.iter().copied().filter(|mode| mode.quote_type.is_expected()).collect();
        if distinct_characters(&expected).len() != 1 {
            return Resolution::sentinel(SpeakerId::Ambiguous);
        }
        expected
    };

    let deliveries: BTreeSet<Option<&str>> =
        chosen.iter().map(|mode| mode.delivery.as_deref()).collect();
    let delivery = if deliveries.len() == 1 { chosen[0].delivery.clone() } else { None };
    Resolution::from_mode(chosen[0], delivery)
}

fn distinct_characters<'m>(modes: &[&'m CharacterSpeakingMode]) -> BTreeSet<&'m str> {
    modes.iter().map(|mode| mode.character.as_str()).collect()
}

/// Text ends with sentence-final punctuation, ignoring closing quotes and brackets
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end_matches(|c: char| c.is_whitespace() || CLOSING_PUNCTUATION.contains(&c))
        .ends_with(SENTENCE_FINAL)
}

/// Blocks of one quotation held back until the quotation closes
#[derive(Debug)]
enum Member {
    Quote(Block),
    Interruption(Block),
    /// Heading or other non-scripture block inside a paired quotation
    PassThrough(Block),
}

impl Member {
    fn into_block(self) -> Block {
        match self {
            Member::Quote(block) | Member::Interruption(block) | Member::PassThrough(block) => {
                block
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupEnd {
    Closed,
    /// Book ended with the quotation still open
    Unclosed,
}

#[derive(Debug, Default)]
struct ParserState {
    quote_level: usize,
    /// Level-1 quote was opened by the dialogue marker rather than a paired opener
    in_dialogue: bool,
    /// Input block in which the open dialogue quote started
    dialogue_quote_block: Option<usize>,
    /// A contextual dialogue quote closed earlier in this paragraph (speech tag follows)
    dialogue_closed_in_paragraph: bool,
    possible_characters: Vec<CharacterSpeakingMode>,
    /// Candidates ran out at a verse boundary; attribution of this quote is frozen
    quote_unexpected: bool,
    last_span_ended_sentence: bool,

    chapter: u32,
    verses: VerseRange,
    style_tag: String,
    input_index: usize,
    paragraph_start_pending: bool,

    current: Option<Block>,
    current_is_quote: bool,
    /// Elements waiting for the next block (verse markers never end a block)
    carry: Vec<BlockElement>,
    group: Vec<Member>,
    output: Vec<Block>,
}

impl ParserState {
    fn start_block(&mut self) -> Block {
        let elements = mem::take(&mut self.carry);
        let verses = match elements.first() {
            Some(BlockElement::Verse(verse)) => verse.range(),
            _ => self.verses,
        };
        let mut block = Block::new(self.style_tag.clone(), self.chapter, verses.start);
        if verses.end > verses.start {
            block.initial_end_verse = verses.end;
        }
        block.is_paragraph_start = mem::take(&mut self.paragraph_start_pending);
        block.elements = elements;
        block
    }

    fn current_block(&mut self) -> &mut Block {
        let block = match self.current.take() {
            Some(block) => block,
            None => self.start_block(),
        };
        self.current.insert(block)
    }

    fn append(&mut self, text: &str) {
        if !text.is_empty() {
            self.current_block().add_text(text);
        }
    }

    fn current_text(&self) -> String {
        self.current.as_ref().map(Block::text).unwrap_or_default()
    }

    fn at_paragraph_start(&self) -> bool {
        match &self.current {
            Some(block) => block.is_paragraph_start && block.text().trim().is_empty(),
            None => self.paragraph_start_pending,
        }
    }

    fn last_quote_delivery(&self) -> Option<&str> {
        self.group.iter().rev().find_map(|member| match member {
            Member::Quote(block) => Some(block.delivery.as_deref()),
            _ => None,
        })?
    }

    fn reset_quote(&mut self) {
        self.quote_level = 0;
        self.in_dialogue = false;
        self.dialogue_quote_block = None;
        self.possible_characters.clear();
        self.quote_unexpected = false;
        self.current_is_quote = false;
    }
}

/// Single-use parser for one book
pub struct QuoteParser<'a> {
    book: BookId,
    quote_system: &'a QuoteSystem,
    repository: &'a dyn CharacterVerseRepository,
    versification: &'a Versification,
    settings: ParserSettings,
    progress: Option<&'a ProgressCounter>,
    state: ParserState,
}

impl<'a> QuoteParser<'a> {
    pub fn new(
        book: BookId,
        quote_system: &'a QuoteSystem,
        repository: &'a dyn CharacterVerseRepository,
        versification: &'a Versification,
    ) -> Self {
        Self {
            book,
            quote_system,
            repository,
            versification,
            settings: ParserSettings::default(),
            progress: None,
            state: ParserState::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Report one step per input block to a shared counter
    pub fn with_progress(mut self, progress: &'a ProgressCounter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Split narration from quotations and attribute every block of the book
    pub fn parse(mut self, blocks: &[Block]) -> Result<Vec<Block>, ParseError> {
        let confirmed = blocks.iter().enumerate().find(|(_, block)| block.user_confirmed);
        if let Some((index, block)) = confirmed {
            return Err(ParseError::UserConfirmedBlock {
                book: self.book.clone(),
                index,
                chapter: block.chapter_number,
                verse: block.initial_start_verse,
            });
        }

        debug!(book = %self.book, blocks = blocks.len(), "Parsing book");

        for (index, block) in blocks.iter().enumerate() {
            self.state.input_index = index;
            if block.is_scripture() {
                self.process_scripture_block(block);
            } else {
                self.pass_through(block);
            }
            if let Some(progress) = self.progress {
                progress.advance(1);
            }
        }
        self.finish_book();

        let output = mem::take(&mut self.state.output);
        let output = implicit::apply_implicit_characters(
            &self.book,
            output,
            self.repository,
            self.versification,
            &self.settings,
        );

        debug!(book = %self.book, input = blocks.len(), output = output.len(), "Parsed book");
        Ok(output)
    }

    fn process_scripture_block(&mut self, block: &Block) {
        self.state.style_tag = block.style_tag.clone();
        if block.is_paragraph_start {
            self.begin_paragraph(block);
        }
        self.state.paragraph_start_pending = block.is_paragraph_start;

        let verses = block.initial_verses();
        if block.chapter_number != self.state.chapter || verses != self.state.verses {
            self.state.chapter = block.chapter_number;
            self.state.verses = verses;
            if self.state.quote_level > 0 {
                self.narrow_candidates();
            }
        }

        for element in &block.elements {
            match element {
                BlockElement::Verse(verse) => self.process_verse(verse),
                BlockElement::Text(text) => self.process_text(text),
            }
        }

        self.state.last_span_ended_sentence = ends_sentence(&block.text());
        self.flush_current();
    }

    /// Decide whether a quotation left open by the previous paragraph carries on
    fn begin_paragraph(&mut self, block: &Block) {
        self.state.dialogue_closed_in_paragraph = false;
        self.state.carry.retain(|element| !element.is_text());
        if self.state.quote_level == 0 {
            return;
        }

        let continues = if self.state.in_dialogue {
            self.settings.is_follow_on(&block.style_tag) && !self.state.last_span_ended_sentence
        } else {
            self.paired_quote_continues(block)
        };

        if !continues {
            debug!(
                book = %self.book,
                chapter = block.chapter_number,
                level = self.state.quote_level,
                opened_in = ?self.state.dialogue_quote_block,
                "Quote closed at paragraph break"
            );
            self.close_quote();
        }
    }

    fn paired_quote_continues(&mut self, block: &Block) -> bool {
        if self.settings.is_follow_on(&block.style_tag) {
            return true;
        }
        let level = self.state.quote_level;
        if self.quote_system.continuer(level).is_none() {
            return true;
        }
        let first_text = block.elements.iter().find_map(|element| match element {
            BlockElement::Text(text) => Some(text.trim_start()),
            BlockElement::Verse(_) => None,
        });
        let Some(first_text) = first_text else {
            return true;
        };

        // Deepest first: a level-2 continuer usually starts with the level-1 one
        for candidate in (1..=level).rev() {
            if let Some(continuer) = self.quote_system.continuer(candidate) {
                if first_text.starts_with(continuer) {
                    self.state.quote_level = candidate;
                    return true;
                }
            }
        }
        false
    }

    fn pass_through(&mut self, block: &Block) {
        self.flush_current();
        if self.state.in_dialogue {
            self.close_quote();
        }
        if self.state.quote_level > 0 {
            self.state.group.push(Member::PassThrough(block.clone()));
        } else {
            self.state.output.push(block.clone());
        }
    }

    fn process_verse(&mut self, verse: &Verse) {
        self.state.current_block().add_verse(verse.number());
        self.state.verses = verse.range();
        if self.state.quote_level > 0 {
            self.narrow_candidates();
        }
    }

    fn process_text(&mut self, text: &str) {
        let quote_system = self.quote_system;
        let tokenizer = quote_system.tokenizer();
        let mut position = 0;

        while position < text.len() {
            let Some(token) = tokenizer.matcher(self.state.quote_level).find(text, position) else {
                break;
            };
            self.state.append(&text[position..token.start]);
            position = self.handle_token(text, token);
        }

        if position < text.len() {
            self.state.append(&text[position..]);
        }
    }

    /// Apply one token; returns the offset scanning resumes from
    fn handle_token(&mut self, text: &str, token: QuoteToken) -> usize {
        let whole = &text[token.start..token.end];
        let marker = &text[token.start..token.marker_end];

        match token.kind {
            TokenKind::Continuer => {
                self.state.append(whole);
                token.end
            }
            TokenKind::Opener => {
                if self.state.quote_level == 0 {
                    self.open_quote(false);
                } else {
                    self.state.quote_level += 1;
                }
                self.state.append(whole);
                token.end
            }
            TokenKind::Closer => {
                if is_apostrophe(text, &token) {
                    self.state.append(whole);
                    return token.end;
                }
                if self.state.in_dialogue && self.state.quote_level == 1 {
                    if self.quote_system.dialogue_end() == Some(marker) {
                        return self.close_dialogue(text, token);
                    }
                    self.state.append(whole);
                    return token.end;
                }
                self.state.append(whole);
                self.state.quote_level -= 1;
                if self.state.quote_level == 0 {
                    self.close_quote();
                }
                token.end
            }
            TokenKind::DialogueEnd => {
                if self.state.in_dialogue {
                    self.close_dialogue(text, token)
                } else {
                    self.state.append(whole);
                    token.end
                }
            }
            TokenKind::DialogueStart => self.dialogue_start(text, token),
        }
    }

    fn dialogue_start(&mut self, text: &str, token: QuoteToken) -> usize {
        let whole = &text[token.start..token.end];
        let preceding = self.state.current_text();
        let preceding = preceding.trim_end();
        let after_colon = preceding.ends_with(':');

        if self.quote_system.has_contextual_dialogue_dash() {
            let opens_here =
                self.state.at_paragraph_start() || after_colon || ends_sentence(preceding);
            if !opens_here {
                let resumes = self.state.dialogue_closed_in_paragraph
                    && text[token.end..].chars().any(char::is_alphanumeric);
                self.state.append(whole);
                if resumes {
                    // Dash closing the speech tag stays with the narration
                    self.open_quote(true);
                }
                return token.end;
            }
        }

        if after_colon {
            if let Some(end) = self.colon_label_end(text, &token) {
                debug!(
                    book = %self.book,
                    label = &text[token.end..end],
                    "Short labeled expression after colon"
                );
                self.state.append(&text[token.start..end]);
                return end;
            }
        }

        self.open_quote(true);
        self.state.append(whole);
        token.end
    }

    /// End offset of a short dialogue span that follows a colon and leaves the sentence running
    fn colon_label_end(&self, text: &str, token: &QuoteToken) -> Option<usize> {
        let end = self.quote_system.tokenizer().matcher(1).find(text, token.end)?;
        let closes = match end.kind {
            TokenKind::DialogueEnd => true,
            TokenKind::Closer => {
                self.quote_system.dialogue_end() == Some(&text[end.start..end.marker_end])
            }
            _ => false,
        };
        if !closes {
            return None;
        }

        let label = text[token.end..end.start].trim();
        let short = label.split_whitespace().count() <= self.settings.colon_label_max_words
            && label.chars().count() <= self.settings.colon_label_max_chars;
        let sentence_continues =
            !ends_sentence(label) && text[end.end..].chars().any(char::is_alphabetic);

        (!label.is_empty() && short && sentence_continues).then_some(end.end)
    }

    fn close_dialogue(&mut self, text: &str, token: QuoteToken) -> usize {
        let whole = &text[token.start..token.end];
        if self.quote_system.has_contextual_dialogue_dash() {
            self.close_quote();
            self.state.dialogue_closed_in_paragraph = true;
            self.state.append(whole);
        } else {
            self.state.append(whole);
            self.close_quote();
        }
        token.end
    }

    fn open_quote(&mut self, dialogue: bool) {
        self.flush_current();
        let candidates = self.candidates_here();
        debug!(
            book = %self.book,
            chapter = self.state.chapter,
            verse = %self.state.verses,
            candidates = candidates.len(),
            dialogue,
            "Quote opened"
        );

        let state = &mut self.state;
        state.quote_level = 1;
        state.in_dialogue = dialogue;
        state.dialogue_quote_block = dialogue.then_some(state.input_index);
        state.possible_characters = candidates;
        state.quote_unexpected = false;
        state.current_is_quote = true;
    }

    fn close_quote(&mut self) {
        self.flush_current();
        self.finish_group(GroupEnd::Closed);
        self.state.reset_quote();
    }

    /// Candidates for the verse in effect, sorted so resolution is deterministic
    fn candidates_here(&self) -> Vec<CharacterSpeakingMode> {
        let mut found: Vec<CharacterSpeakingMode> = self
            .repository
            .get_candidates(
                &self.book,
                self.state.chapter,
                self.state.verses,
                self.versification,
                self.settings.include_alternates,
            )
            .into_iter()
            .collect();
        found.sort();
        found
    }

    fn narrow_candidates(&mut self) {
        if self.state.quote_unexpected {
            return;
        }
        // Intersect on character; the new verse's entries carry the delivery now in effect
        let speaking: BTreeSet<&str> = self
            .state
            .possible_characters
            .iter()
            .filter(|mode| mode.quote_type != QuoteType::Interruption)
            .map(|mode| mode.character.as_str())
            .collect();
        let narrowed: Vec<CharacterSpeakingMode> = self
            .candidates_here()
            .into_iter()
            .filter(|mode| mode.quote_type != QuoteType::Interruption)
            .filter(|mode| speaking.contains(mode.character.as_str()))
            .collect();

        if narrowed.is_empty() {
            debug!(
                book = %self.book,
                chapter = self.state.chapter,
                verse = %self.state.verses,
                "No candidate continues across verse boundary; quote marked Unexpected"
            );
            self.mark_quote_unexpected();
        } else {
            self.state.possible_characters = narrowed;
        }
    }

    fn mark_quote_unexpected(&mut self) {
        self.state.quote_unexpected = true;
        let unexpected = Resolution::sentinel(SpeakerId::Unexpected);
        for member in &mut self.state.group {
            if let Member::Quote(block) = member {
                unexpected.apply_to(block);
            }
        }
    }

    /// Emit the block being built; trailing verse markers move on to the next block
    fn flush_current(&mut self) {
        let Some(mut block) = self.state.current.take() else {
            return;
        };

        let split = block
            .elements
            .iter()
            .rposition(BlockElement::is_text)
            .map_or(0, |index| index + 1);
        let trailing = block.elements.split_off(split);

        if block.text().trim().is_empty() {
            block.elements.extend(trailing);
            self.state.carry = block.elements;
            self.state.paragraph_start_pending |= block.is_paragraph_start;
            return;
        }
        self.state.carry = trailing;

        if self.state.current_is_quote {
            let resolution = if self.state.quote_unexpected {
                Resolution::sentinel(SpeakerId::Unexpected)
            } else {
                resolve_speaker(&self.state.possible_characters, self.state.last_quote_delivery())
            };
            resolution.apply_to(&mut block);
            self.state.group.push(Member::Quote(block));
        } else {
            block.set_speaker(SpeakerId::narrator(&self.book), None);
            self.state.output.push(block);
        }
    }

    fn finish_group(&mut self, end: GroupEnd) {
        let members = mem::take(&mut self.state.group);
        if members.is_empty() {
            return;
        }

        let mut members = match end {
            GroupEnd::Closed if !self.state.quote_unexpected => self.split_interruptions(members),
            GroupEnd::Closed => members,
            GroupEnd::Unclosed => {
                let unexpected = Resolution::sentinel(SpeakerId::Unexpected);
                members
                    .into_iter()
                    .map(|member| match member {
                        Member::Quote(mut block) => {
                            unexpected.apply_to(&mut block);
                            Member::Quote(block)
                        }
                        other => other,
                    })
                    .collect()
            }
        };

        let outcome = multi_block::resolve(members.iter_mut().filter_map(|member| match member {
            Member::Quote(block) => Some(block),
            _ => None,
        }));
        debug!(book = %self.book, blocks = members.len(), ?end, ?outcome, "Quote group resolved");

        self.state.output.extend(members.into_iter().map(Member::into_block));
    }

    fn split_interruptions(&self, members: Vec<Member>) -> Vec<Member> {
        let mut result = Vec::with_capacity(members.len());

        for member in members {
            let block = match member {
                Member::Quote(block) => block,
                other => {
                    result.push(other);
                    continue;
                }
            };

            let verses = VerseRange::new(block.initial_start_verse, block.last_verses().end);
            let interrupter = self
                .repository
                .get_candidates(
                    &self.book,
                    block.chapter_number,
                    verses,
                    self.versification,
                    self.settings.include_alternates,
                )
                .into_iter()
                .filter(|mode| mode.quote_type == QuoteType::Interruption)
                .min();
            let Some(interrupter) = interrupter else {
                result.push(Member::Quote(block));
                continue;
            };

            let mut remaining = Some(block);
            while let Some(block) = remaining.take() {
                match interruption::split_interruption(&block, &interrupter) {
                    Some(split) => {
                        debug!(
                            book = %self.book,
                            chapter = block.chapter_number,
                            text = %split.interruption.text(),
                            "Split interruption out of quote"
                        );
                        result.extend(split.before.map(Member::Quote));
                        result.push(Member::Interruption(split.interruption));
                        remaining = split.after;
                    }
                    None => result.push(Member::Quote(block)),
                }
            }
        }

        result
    }

    fn finish_book(&mut self) {
        self.flush_current();

        if self.state.quote_level > 0 {
            if self.state.in_dialogue {
                self.close_quote();
            } else {
                warn!(
                    book = %self.book,
                    level = self.state.quote_level,
                    "Quotation still open at end of book; blocks marked Unexpected"
                );
                self.finish_group(GroupEnd::Unclosed);
                self.state.reset_quote();
            }
        }

        let dropped = self.state.carry.iter().filter(|element| !element.is_text()).count();
        if dropped > 0 {
            warn!(
                book = %self.book,
                dropped,
                "Verse markers with no following text at end of book"
            );
        }
        self.state.carry.clear();
    }
}

/// A closer between two letters is an apostrophe (`don’t`)
fn is_apostrophe(text: &str, token: &QuoteToken) -> bool {
    let before = text[..token.start].chars().next_back();
    let after = text[token.marker_end..].chars().next();
    matches!(
        (before, after),
        (Some(before), Some(after)) if before.is_alphabetic() && after.is_alphabetic()
    )
}

/// Parse one book with default settings
pub fn parse_book(
    book_id: &BookId,
    blocks: &[Block],
    quote_system: &QuoteSystem,
    repository: &dyn CharacterVerseRepository,
    versification: &Versification,
) -> Result<Vec<Block>, ParseError> {
    QuoteParser::new(book_id.clone(), quote_system, repository, versification).parse(blocks)
}
