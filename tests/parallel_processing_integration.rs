// Integration tests for casting several books concurrently
// WHY: Books are independent, so a parallel run must match a sequential one exactly

use std::sync::{Arc, Mutex};

use versecast::parallel_processing::{
    parse_books_parallel, total_blocks, BookInput, ProgressCounter,
};
use versecast::{
    parse_book, Block, BookId, CharacterVerseData, CharacterVerseRepository, ParserSettings,
    Versification,
};

mod integration;
use integration::{english, fixtures, verse_paragraph};

fn library() -> Vec<BookInput> {
    let mark = vec![
        verse_paragraph(1, 7, "And he preached, saying, “After me comes one mightier than I."),
        verse_paragraph(1, 8, "“I have baptized you with water.”"),
        verse_paragraph(1, 17, "And Jesus said to them, “Follow me.” And they left."),
        verse_paragraph(1, 27, "And they were all amazed, saying, “What is this?”"),
    ];
    let psalms = vec![Block::paragraph("q1", 2, 7)
        .with_verse("7")
        .with_text("You are my Son; today I have begotten you. ")
        .with_verse("10")
        .with_text("Now therefore, O kings, be wise;")];
    let john = vec![verse_paragraph(8, 11, "She said, “No one, Lord.”")];

    vec![
        BookInput::new(BookId::new("MRK"), mark),
        BookInput::new(BookId::new("PSA"), psalms),
        BookInput::new(BookId::new("JHN"), john),
    ]
}

fn shared_repository() -> Arc<dyn CharacterVerseRepository> {
    Arc::new(CharacterVerseData::from_tab_delimited(fixtures::CHARACTER_VERSE_DATA).unwrap())
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let books = library();
    let repository = shared_repository();
    let quote_system = Arc::new(english().clone());

    let results = parse_books_parallel(
        books.clone(),
        Arc::clone(&quote_system),
        Arc::clone(&repository),
        Versification::default(),
        ParserSettings::default(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), books.len());
    for (result, input) in results.iter().zip(&books) {
        assert_eq!(result.book_id, input.book_id, "Results must keep input order");
        let sequential = parse_book(
            &input.book_id,
            &input.blocks,
            &quote_system,
            repository.as_ref(),
            &Versification::default(),
        );
        assert_eq!(result.blocks, sequential);
        assert_eq!(result.stats.status, "success");
        assert_eq!(result.stats.input_blocks, input.blocks.len() as u64);
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_with_single_completion() {
    let books = library();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = Arc::new(ProgressCounter::new(total_blocks(&books), move |percent| {
        sink.lock().unwrap().push(percent)
    }));

    parse_books_parallel(
        books,
        Arc::new(english().clone()),
        shared_repository(),
        Versification::default(),
        ParserSettings::default(),
        Some(Arc::clone(&progress)),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "Percentages must only grow: {seen:?}");
    assert_eq!(seen.iter().filter(|&&percent| percent == 100).count(), 1);
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(progress.completed(), 6);
}

#[tokio::test]
async fn test_rejected_book_does_not_stop_the_others() {
    let mut books = library();
    books[1].blocks[0].user_confirmed = true;

    let results = parse_books_parallel(
        books,
        Arc::new(english().clone()),
        shared_repository(),
        Versification::default(),
        ParserSettings::default(),
        None,
    )
    .await
    .unwrap();

    assert!(results[0].blocks.is_ok());
    assert!(results[1].blocks.is_err());
    assert_eq!(results[1].stats.status, "failed");
    assert!(results[1].stats.error.as_deref().unwrap().contains("user-confirmed"));
    assert!(results[2].blocks.is_ok());
}
