// Tests for the host-side public API: discovery, loading and output naming
// WHY: These functions are what an embedding application calls around the parser

use versecast::discovery::find_book_files;
use versecast::incremental::{book_id_from_path, generate_output_path, output_exists, write_output};
use versecast::reader::{
    read_character_verse, read_project_config, AsyncFileReader, BookFile, ReaderConfig,
};
use versecast::{parse_book, BookId, CharacterVerseRepository, SpeakerId, VerseRange, Versification};

mod integration;
use integration::{fixtures, verse_paragraph, TestFixture};

#[tokio::test]
async fn test_project_round_trip() {
    let fixture = TestFixture::new();
    let book_path = fixture.create_book_file(
        "nt/MRK.blocks.json",
        "MRK",
        &[verse_paragraph(1, 17, "And Jesus said to them, “Follow me.”")],
    );
    let config_path = fixture.create_file("project.toml", fixtures::ENGLISH_QUOTE_SYSTEM);
    let data_path = fixture.create_file("CharacterVerse.txt", fixtures::CHARACTER_VERSE_DATA);

    let paths = find_book_files(&fixture.root_path).await.expect("Discovery failed");
    assert_eq!(paths, vec![book_path.clone()]);
    assert_eq!(book_id_from_path(&book_path).as_deref(), Some("MRK"));

    let config = read_project_config(&config_path).await.expect("Config failed to load");
    let quote_system = config.build_quote_system().expect("Quote system failed to compile");
    let data = read_character_verse(&data_path).await.expect("Reference data failed to load");

    let reader = AsyncFileReader::new(ReaderConfig::default());
    let (book, stats) = reader.read_book(&book_path).await.expect("Read failed");
    let book = book.expect("Book must parse");
    assert_eq!(stats.blocks_read, 1);

    let versification = Versification::default();
    let blocks = parse_book(&book.book, &book.blocks, &quote_system, &data, &versification)
        .expect("Parse failed");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].character, SpeakerId::Known("Jesus".to_string()));

    assert!(!output_exists(&book_path));
    let output = BookFile { book: book.book.clone(), blocks };
    let written = write_output(&book_path, &output).await.expect("Write failed");
    assert_eq!(written, generate_output_path(&book_path));
    assert!(written.to_string_lossy().ends_with("MRK.cast.json"));
    assert!(output_exists(&book_path));

    // Cast output is not itself picked up as input
    let paths = find_book_files(&fixture.root_path).await.expect("Discovery failed");
    assert_eq!(paths.len(), 1);
}

#[tokio::test]
async fn test_overrides_extend_reference_data() {
    let fixture = TestFixture::new();
    let base = fixture.create_file("base.txt", fixtures::CHARACTER_VERSE_DATA);
    let extra = fixture.create_file("overrides.txt", "MRK\t1\t17\tAndrew\t\t\tPotential\n");

    let data = read_character_verse(&base)
        .await
        .unwrap()
        .with_overrides(read_character_verse(&extra).await.unwrap());

    let candidates = data.get_candidates(
        &BookId::new("MRK"),
        1,
        VerseRange::single(17),
        &Versification::default(),
        false,
    );
    let names: Vec<&str> = candidates.iter().map(|mode| mode.character.as_str()).collect();
    assert_eq!(candidates.len(), 2);
    assert!(names.contains(&"Jesus"));
    assert!(names.contains(&"Andrew"));
}

#[tokio::test]
async fn test_invalid_quote_system_is_reported() {
    let fixture = TestFixture::new();
    let config_path =
        fixture.create_file("project.toml", "[[levels]]\nopen = \"“\"\nclose = \"\"\n");

    let config = read_project_config(&config_path).await.expect("TOML itself is valid");
    let error = config.build_quote_system().unwrap_err();
    assert!(error.to_string().contains("empty close marker"));
}
