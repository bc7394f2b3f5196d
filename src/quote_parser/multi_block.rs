// WHY: Reconciles speakers across the blocks of one quotation once it closes
// Never fails: anything it cannot settle becomes a sentinel a reviewer can act on

use crate::block::{Block, MultiBlockQuote};
use crate::speaker::SpeakerId;

/// How a run was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Empty,
    /// One block: not a multi-block quote at all
    Single,
    /// Every block now carries the same speaker and delivery
    Uniform(SpeakerId),
    /// One speaker whose delivery changes along the run
    ChangeOfDelivery(SpeakerId),
    /// Only sentinel values were present and they all agreed
    Sentinel(SpeakerId),
    Ambiguous,
}

/// Resolve the blocks of one quotation, in order
///
/// Sentinels (Ambiguous, Unknown, Needs Review, Unexpected) are placeholders and
/// yield to a single real character. More than one real character, or a mix of
/// sentinels with none, makes the whole run Ambiguous.
pub fn resolve<'b>(run: impl IntoIterator<Item = &'b mut Block>) -> RunOutcome {
    let mut blocks: Vec<&mut Block> = run.into_iter().collect();

    match blocks.len() {
        0 => return RunOutcome::Empty,
        1 => {
            blocks[0].multi_block_quote = MultiBlockQuote::None;
            return RunOutcome::Single;
        }
        _ => {}
    }

    let mut real: Vec<SpeakerId> = Vec::new();
    let mut sentinels: Vec<SpeakerId> = Vec::new();
    for block in &blocks {
        let bucket = if block.character.is_sentinel() { &mut sentinels } else { &mut real };
        if !bucket.contains(&block.character) {
            bucket.push(block.character.clone());
        }
    }

    let outcome = match (real.as_slice(), sentinels.as_slice()) {
        ([], [only]) => {
            let only = only.clone();
            set_all(&mut blocks, &only);
            RunOutcome::Sentinel(only)
        }
        ([character], _) => settle_single_character(&mut blocks, character.clone()),
        _ => {
            set_all(&mut blocks, &SpeakerId::Ambiguous);
            RunOutcome::Ambiguous
        }
    };

    mark_roles(&mut blocks);
    outcome
}

fn set_all(blocks: &mut [&mut Block], character: &SpeakerId) {
    for block in blocks.iter_mut() {
        block.set_speaker(character.clone(), None);
        block.character_id_in_script = None;
    }
}

fn settle_single_character(blocks: &mut [&mut Block], character: SpeakerId) -> RunOutcome {
    let owner = blocks.iter().position(|block| block.character == character).unwrap_or(0);
    let character_in_script = blocks[owner].character_id_in_script.clone();
    let first_delivery = blocks
        .iter()
        .find(|block| block.character == character && block.delivery.is_some())
        .and_then(|block| block.delivery.clone());

    // Placeholders and unspecified deliveries follow the block before them
    let mut previous = first_delivery;
    for block in blocks.iter_mut() {
        let delivery = if block.character == character && block.delivery.is_some() {
            block.delivery.clone()
        } else {
            previous.clone()
        };
        block.set_speaker(character.clone(), delivery.clone());
        block.character_id_in_script = character_in_script.clone();
        previous = delivery;
    }

    let changes = blocks.windows(2).filter(|pair| pair[0].delivery != pair[1].delivery).count();
    if changes == 0 {
        return RunOutcome::Uniform(character);
    }
    RunOutcome::ChangeOfDelivery(character)
}

fn mark_roles(blocks: &mut [&mut Block]) {
    let mut previous_delivery: Option<Option<String>> = None;
    for (index, block) in blocks.iter_mut().enumerate() {
        block.multi_block_quote = match &previous_delivery {
            None if index == 0 => MultiBlockQuote::Start,
            Some(previous) if *previous != block.delivery => MultiBlockQuote::ChangeOfDelivery,
            _ => MultiBlockQuote::Continuation,
        };
        previous_delivery = Some(block.delivery.clone());
    }
}
