use std::path::{Path, PathBuf};
use xword_core::{Direction, LoadWarning, SquareFlags, compute_checksums};
use xword_external::{
    ConversionStatus, ConvertOptions, ExternalError, FileFormat, convert_batch, load,
    load_bytes, save, save_bytes,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

#[test]
fn test_mini_fixture() {
    let puzzle = load(fixture("mini.puz"), None).unwrap();
    assert!(puzzle.warnings.is_empty());
    assert_eq!(puzzle.title, "Mini");
    assert_eq!(puzzle.author, "Tester");
    assert_eq!(puzzle.copyright, "© 2024 Example");
    assert_eq!(puzzle.grid.width(), 3);
    assert_eq!(puzzle.grid.height(), 3);

    let across: Vec<_> = puzzle.across().iter().map(|c| c.number).collect();
    let down: Vec<_> = puzzle.down().iter().map(|c| c.number).collect();
    assert_eq!(across, [1, 3]);
    assert_eq!(down, [1, 2]);
    assert_eq!(
        puzzle.word_clue(7, Direction::Across).unwrap().text,
        "Bend at the waist"
    );

    let checksums = compute_checksums(&puzzle).unwrap();
    assert_eq!(checksums.cib, 0x5200);
    assert_eq!(checksums.primary, 0x60b6);
    assert_eq!(checksums.masked, [73, 220, 17, 61, 19, 137, 166, 94]);
}

#[test]
fn test_puz_round_trip_is_byte_identical() {
    for name in ["mini.puz", "mini_sections.puz", "scrambled.puz"] {
        let bytes = fixture_bytes(name);
        let puzzle = load_bytes(&bytes, FileFormat::Puz).unwrap();
        assert!(puzzle.warnings.is_empty(), "{name}: {:?}", puzzle.warnings);
        assert_eq!(save_bytes(&puzzle, FileFormat::Puz).unwrap(), bytes, "{name}");
    }
}

#[test]
fn test_sections_fixture() {
    let puzzle = load(fixture("mini_sections.puz"), None).unwrap();
    let timer = puzzle.timer.unwrap();
    assert_eq!(timer.seconds, 42);
    assert!(timer.paused);

    let first = puzzle.grid.square(0).unwrap();
    assert_eq!(first.text(), "C");
    assert!(first.has_flag(SquareFlags::CIRCLED));
    assert!(puzzle.format.sections.is_empty());
}

#[test]
fn test_scrambled_fixture() {
    let mut puzzle = load(fixture("scrambled.puz"), None).unwrap();
    assert!(puzzle.is_scrambled());
    assert_eq!(puzzle.grid.cksum(), 0x7);

    assert!(!puzzle.unscramble(4321));
    assert!(puzzle.is_scrambled());

    assert!(puzzle.unscramble(1234));
    let rows: Vec<String> = puzzle
        .grid
        .squares()
        .chunks(4)
        .map(|row| row.iter().map(|s| s.solution()).collect())
        .collect();
    assert_eq!(rows, ["ABCD", "EFGH", "IJKL", "MNOP"]);
}

#[test]
fn test_notes_with_old_version_checksum() {
    let puzzle = load(fixture("notes_v12.puz"), None).unwrap();
    assert!(puzzle.warnings.is_empty(), "{:?}", puzzle.warnings);
    assert_eq!(puzzle.notes, "Have fun");
    assert_eq!(&puzzle.format.version, b"1.2\0");
}

#[test]
fn test_save_and_load_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let puzzle = load(fixture("mini.puz"), None).unwrap();

    let txt = dir.path().join("mini.txt");
    save(&puzzle, &txt, None).unwrap();
    let from_txt = load(&txt, None).unwrap();
    assert_eq!(from_txt.clues(), puzzle.clues());
    assert_eq!(from_txt.copyright, puzzle.copyright);

    let json = dir.path().join("mini.snapshot");
    save(&puzzle, &json, Some("json")).unwrap();
    assert_eq!(load(&json, Some(".JSON")).unwrap(), puzzle);
}

#[test]
fn test_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.puz");
    match load(&missing, None) {
        Err(ExternalError::File { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected {other:?}"),
    }

    assert!(matches!(
        load(fixture("mini.puz"), Some("ipuz")),
        Err(ExternalError::MissingHandler(ext)) if ext == "ipuz"
    ));
    assert!(matches!(
        load(fixture("mini.puz"), Some("txt")),
        Err(ExternalError::MissingTag { line: 1, .. })
    ));

    let not_puz = dir.path().join("notes.puz");
    std::fs::write(&not_puz, "just some text").unwrap();
    assert!(matches!(load(&not_puz, None), Err(ExternalError::FileType("puz"))));
}

#[test]
fn test_extension_registry() {
    assert!(xword_external::can_load("puz"));
    assert!(xword_external::can_save(".TXT"));
    assert!(xword_external::can_load("jpz"));
    assert!(!xword_external::can_save("jpz"));
    assert!(!xword_external::can_load("ipuz"));
    assert_eq!(xword_external::file_filters().len(), 4);
}

#[test]
fn test_save_to_load_only_format() {
    let dir = tempfile::tempdir().unwrap();
    let puzzle = load(fixture("mini.puz"), None).unwrap();
    let target = dir.path().join("mini.jpz");
    assert!(matches!(
        save(&puzzle, &target, None),
        Err(ExternalError::MissingHandler(ext)) if ext == "jpz"
    ));
    assert!(!target.exists());
}

#[test]
fn test_batch_with_one_malformed_input() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.puz");
    std::fs::copy(fixture("mini.puz"), &good).unwrap();
    let bad = dir.path().join("bad.puz");
    std::fs::write(&bad, b"ACROSS&DOWN").unwrap();

    let options = ConvertOptions {
        output_dir: Some(dir.path().join("out")),
        ..Default::default()
    };
    let outcomes = convert_batch(&[&bad, &good], &options);
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].status, ConversionStatus::Failed(_)));
    assert!(matches!(outcomes[1].status, ConversionStatus::Done));

    let output = dir.path().join("out/good.txt");
    assert_eq!(outcomes[1].job.output, output);
    assert_eq!(load(&output, None).unwrap().title, "Mini");
    assert!(!dir.path().join("out/bad.txt").exists());
}

#[test]
fn test_batch_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = fixture_bytes("mini.puz");
    bytes[0] ^= 0x01;
    let damaged = dir.path().join("damaged.puz");
    std::fs::write(&damaged, &bytes).unwrap();

    let outcomes = convert_batch(&[&damaged], &ConvertOptions::default());
    match &outcomes[0].status {
        ConversionStatus::DoneWithWarnings(warnings) => {
            assert_eq!(warnings, &[LoadWarning::ChecksumMismatch]);
        }
        other => panic!("unexpected {other:?}"),
    }

    let strict = ConvertOptions {
        strict: true,
        ..Default::default()
    };
    let outcomes = convert_batch(&[&damaged], &strict);
    assert_eq!(outcomes[0].job.output, dir.path().join("damaged_1.txt"));
    assert!(!outcomes[0].status.is_done());
}

#[test]
fn test_other_readers_agree() {
    let parsed = puz_parse::parse_bytes(&fixture_bytes("mini.puz")).unwrap();
    assert_eq!(parsed.info.title, "Mini");
    assert_eq!(parsed.info.width, 3);
    assert_eq!(parsed.info.height, 3);
    assert_eq!(parsed.clues.across.get(&1).map(String::as_str), Some("Feline pet"));
    assert_eq!(parsed.grid.solution, ["CAT", "A.O", "BOW"]);
    assert!(!parsed.info.is_scrambled);

    let parsed = puz_parse::parse_bytes(&fixture_bytes("mini_sections.puz")).unwrap();
    let circles = parsed.extensions.circles.unwrap();
    assert!(circles[0][0]);
    assert_eq!(circles.iter().flatten().filter(|c| **c).count(), 1);
    assert_eq!(parsed.grid.blank[0], "C--");

    let parsed = puz_parse::parse_bytes(&fixture_bytes("notes_v12.puz")).unwrap();
    assert_eq!(parsed.info.version, "1.2");
    assert_eq!(parsed.info.notes, "Have fun");

    let parsed = puz_parse::parse_bytes(&fixture_bytes("scrambled.puz")).unwrap();
    assert!(parsed.info.is_scrambled);
    assert_eq!(parsed.info.title, "Locked");
}

#[test]
fn test_other_readers_accept_saved_files() {
    let mut puzzle = load(fixture("mini_sections.puz"), None).unwrap();
    puzzle.grid.set_text(8, "W").unwrap();
    puzzle.notes = "Saved again".to_string();
    let bytes = save_bytes(&puzzle, FileFormat::Puz).unwrap();

    let parsed = puz_parse::parse_bytes(&bytes).unwrap();
    assert_eq!(parsed.grid.blank, ["C--", "-.-", "--W"]);
    assert_eq!(parsed.info.notes, "Saved again");
    assert!(parsed.extensions.circles.unwrap()[0][0]);
    assert_eq!(parsed.clues.down.get(&2).map(String::as_str), Some("Pull a boat"));
}

#[test]
fn test_batch_reads_crossword_compiler_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mini.jpz");
    std::fs::write(
        &input,
        r#"<crossword-compiler xmlns="http://crossword.info/xml/crossword-compiler">
  <rectangular-puzzle xmlns="http://crossword.info/xml/rectangular-puzzle">
    <metadata><title>Mini</title><creator>Tester</creator></metadata>
    <crossword>
      <grid width="3" height="3">
        <cell x="1" y="1" solution="C" number="1"/>
        <cell x="2" y="1" solution="A"/>
        <cell x="3" y="1" solution="T" number="2"/>
        <cell x="1" y="2" solution="A"/>
        <cell x="2" y="2" type="block"/>
        <cell x="3" y="2" solution="O"/>
        <cell x="1" y="3" solution="B" number="3"/>
        <cell x="2" y="3" solution="O"/>
        <cell x="3" y="3" solution="W"/>
      </grid>
      <clues><title>Across</title><clue number="1">Feline pet</clue><clue number="3">Bend at the waist</clue></clues>
      <clues><title>Down</title><clue number="1">Taxi</clue><clue number="2">Pull a boat</clue></clues>
    </crossword>
  </rectangular-puzzle>
</crossword-compiler>
"#,
    )
    .unwrap();

    let outcomes = convert_batch(&[&input], &ConvertOptions::default());
    assert!(matches!(outcomes[0].status, ConversionStatus::Done));
    assert_eq!(outcomes[0].job.output, dir.path().join("mini.puz"));

    let puzzle = load(&outcomes[0].job.output, None).unwrap();
    assert!(puzzle.warnings.is_empty());
    assert_eq!(puzzle.author, "Tester");
    assert_eq!(puzzle.word_clue(7, Direction::Across).unwrap().text, "Bend at the waist");
}
