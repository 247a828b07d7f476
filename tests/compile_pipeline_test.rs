// Compile Pipeline Tests
// Loads the sample project and checks the page images end to end

use std::path::PathBuf;

use bitvec::prelude::*;
use test_log::test;

use pagesmith::content_compiler::element::Label;
use pagesmith::content_compiler::huffman::CodeTable;
use pagesmith::content_compiler::project::{Chapter, Project};
use pagesmith::content_compiler::text::encode_text;
use pagesmith::content_compiler::{ChapterImage, CompiledProject, CompilerConfig, CompilerError, ContentCompiler};

fn sample_project() -> Project {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/castle/project.toml");
    Project::load(&path).expect("sample project should load")
}

fn compile_sample() -> CompiledProject {
    let project = sample_project();
    ContentCompiler::new(project.config.clone())
        .compile(&project)
        .expect("sample project should compile")
}

fn chapter<'a>(compiled: &'a CompiledProject, suffix: &str) -> &'a ChapterImage {
    compiled
        .chapters
        .iter()
        .find(|c| c.suffix == suffix)
        .expect("chapter present")
}

/// Placed bytes of a label, `len` bytes long, or everything to the page end.
fn bytes_at(image: &ChapterImage, label: &Label, len: Option<usize>) -> Vec<u8> {
    let place = image
        .resolution
        .get(label)
        .unwrap_or_else(|| panic!("{} was not placed", label));
    let page = image
        .pages
        .iter()
        .find(|p| p.index == place.page)
        .expect("page of placement");
    let bytes = page.bytes();
    let start = place.offset as usize;
    let end = len.map_or(bytes.len(), |len| start + len);
    bytes[start..end].to_vec()
}

/// The far reference bytes the engine would read for `label`.
fn far(image: &ChapterImage, label: &Label) -> Vec<u8> {
    let place = image.resolution.get(label).expect("label placed");
    let [lo, hi] = place.address.to_le_bytes();
    vec![place.page, lo, hi]
}

fn decode(table: &CodeTable, encoded: &[u8]) -> Vec<u8> {
    let table = table.to_bytes();
    let mut out = Vec::new();
    let mut node = 1;
    for bit in encoded.view_bits::<Lsb0>().iter() {
        node += table[node + *bit as usize] as usize;
        if table[node + 1] == 0 {
            if table[node] == table[0] {
                return out;
            }
            out.push(table[node]);
            node = 1;
        }
    }
    panic!("text has no end token");
}

#[test]
fn test_sample_project_loads() {
    let project = sample_project();
    assert_eq!(project.chapters.len(), 2);
    assert_eq!(project.config.view_width, 2);
    assert_eq!(project.config.view_height, 2);
    assert_eq!(project.config.page_capacity, CompilerConfig::default().page_capacity);
    assert_eq!(
        project.config.default_entry_script.as_deref(),
        Some("EnterAnywhere")
    );

    let first = &project.chapters[0];
    assert_eq!(first.suffix, "ch1");
    assert_eq!(first.tiles.tiles.len(), 3);
    assert!(first.script_source.contains("SCRIPT GoCellar:"));
    assert!(first.items["Lamp"].scripts.contains_key("use"));
    assert!(!first.items["Key"].is_static);
}

#[test]
fn test_pages_are_well_formed() {
    let compiled = compile_sample();
    let capacity = CompilerConfig::default().page_capacity;
    for image in &compiled.chapters {
        assert!(image.pages.len().is_power_of_two());
        for (i, page) in image.pages.iter().enumerate() {
            assert_eq!(page.index as usize, i);
            assert!(page.used() <= capacity);
        }
        let table = image.resolution.get(&Label::ItemTable).unwrap();
        assert_eq!((table.page, table.offset), (0, 0));
        assert_eq!(image.pages[0].elements.len(), 1);
    }
}

#[test]
fn test_diagnostics_report_missing_declarations() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");
    assert_eq!(ch1.diagnostics.texts, vec!["Smell"]);
    assert_eq!(ch1.diagnostics.scripts, vec!["LampHint"]);
    assert_eq!(ch1.diagnostics.locations, vec!["Tower"]);
    assert!(ch1.diagnostics.items.is_empty());
    assert_eq!(ch1.diagnostics.graphics, vec!["attic"]);

    // the location without graphics is left out entirely
    assert!(ch1.resolution.get(&Label::Location("Attic".to_string())).is_none());

    let ch2 = chapter(&compiled, "ch2");
    assert!(ch2.diagnostics.is_empty());
}

#[test]
fn test_missing_targets_become_null_references() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");
    let script = bytes_at(ch1, &Label::Script("TryTower".to_string()), Some(4));
    assert_eq!(script, vec![9, 0xFF, 0xFF, 0xFF]);

    // ISOBJECT Lamp, then IFTRUE of the missing LampHint
    let enter = bytes_at(ch1, &Label::Script("EnterCellar".to_string()), Some(9));
    let mut expected = vec![13, 1];
    expected.extend(far(ch1, &Label::Item("Lamp".to_string())));
    expected.extend([4, 0xFF, 0xFF, 0xFF]);
    assert_eq!(enter, expected);
}

#[test]
fn test_location_record_points_at_placed_labels() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");

    // 5 header refs, count, 2 dispatch entries, entrance script
    let hall = bytes_at(ch1, &Label::Location("Hall".to_string()), Some(26));
    assert_eq!(hall[0..3], far(ch1, &Label::Text("HallDesc".to_string()))[..]);
    assert_eq!(hall[3..6], far(ch1, &Label::TilePatterns("tileblock_0".to_string()))[..]);
    let colours = ch1
        .resolution
        .get(&Label::TileColours("tileblock_0".to_string()))
        .unwrap();
    assert_eq!(hall[6..8], colours.address.to_le_bytes());
    assert_eq!(hall[12], 2);
    assert_eq!(hall[13..15], [0, 1]); // here, look
    assert_eq!(hall[15..18], far(ch1, &Label::Script("LookHall".to_string()))[..]);
    assert_eq!(hall[18..20], [6, 0]); // down, go
    assert_eq!(hall[23..26], far(ch1, &Label::Script("EnterAnywhere".to_string()))[..]);

    let cellar = bytes_at(ch1, &Label::Location("Cellar".to_string()), Some(21));
    assert_eq!(cellar[18..21], far(ch1, &Label::Script("EnterCellar".to_string()))[..]);
}

#[test]
fn test_header_and_item_table() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");

    let mut expected = far(ch1, &Label::Location("Hall".to_string()));
    expected.extend([0, 0x00, 0x80]); // ITEM_ADDRESS_LIST
    expected.extend([0, 0x07, 0x80]); // ITEM_INIT_LOCATIONS after 2 far refs
    expected.push(0);
    assert_eq!(ch1.header, expected);

    let table = bytes_at(ch1, &Label::ItemTable, Some(13));
    assert_eq!(table[0], 2);
    assert_eq!(table[1..4], far(ch1, &Label::Item("Key".to_string()))[..]);
    assert_eq!(table[4..7], far(ch1, &Label::Item("Lamp".to_string()))[..]);
    assert_eq!(table[7..10], [0, 2, 0]); // key starts in the inventory
    assert_eq!(table[10..13], far(ch1, &Label::Location("Hall".to_string()))[..]);

    // items get RAM slots in name order
    let key = bytes_at(ch1, &Label::Item("Key".to_string()), Some(5));
    assert_eq!(key[3..5], [0x00, 0xC0]);
    let lamp = bytes_at(ch1, &Label::Item("Lamp".to_string()), Some(5));
    assert_eq!(lamp[3..5], [0x03, 0xC0]);

    // chapter 2 has no items but keeps room for chapter 1's two
    let ch2 = chapter(&compiled, "ch2");
    assert_eq!(ch2.pages[0].used(), 1 + 2 * 6);
    assert_eq!(ch2.header[9], 0);
}

#[test]
fn test_text_round_trips_through_pages() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");
    let line_length = CompilerConfig::default().line_length;

    let welcome = bytes_at(ch1, &Label::Text("Welcome".to_string()), None);
    assert_eq!(
        decode(&compiled.code_table, &welcome),
        encode_text("Welcome", "Welcome, traveller!", false, line_length).unwrap()
    );

    // the garden text of chapter 2 uses the same code table
    let ch2 = chapter(&compiled, "ch2");
    let garden = bytes_at(ch2, &Label::Text("GardenDesc".to_string()), None);
    assert_eq!(
        decode(&compiled.code_table, &garden),
        encode_text("GardenDesc", "An overgrown garden.", false, line_length).unwrap()
    );
}

#[test]
fn test_long_text_is_split_into_chunks() {
    let compiled = compile_sample();
    let ch1 = chapter(&compiled, "ch1");

    assert!(ch1.resolution.get(&Label::Text("Story".to_string())).is_none());
    assert!(ch1.resolution.get(&Label::Text("Story_PT0".to_string())).is_some());
    assert!(ch1.resolution.get(&Label::Text("Story_PT1".to_string())).is_some());

    // TEXT, WAITFORFIRE, TEXT, END
    let look = bytes_at(ch1, &Label::Script("LookHall".to_string()), Some(10));
    let mut expected = vec![3];
    expected.extend(far(ch1, &Label::Text("Story_PT0".to_string())));
    expected.push(15);
    expected.push(3);
    expected.extend(far(ch1, &Label::Text("Story_PT1".to_string())));
    expected.push(0);
    assert_eq!(look, expected);
}

#[test]
fn test_name_tables() {
    let compiled = compile_sample();
    for image in &compiled.chapters {
        assert_eq!(image.direction_names[..2], [20, 0]);
        assert_eq!(image.command_names[..2], [32, 0]);
    }
    assert_eq!(compiled.chapters[0].command_names, compiled.chapters[1].command_names);
}

#[test]
fn test_compilation_is_deterministic() {
    let first = compile_sample();
    let second = compile_sample();
    assert_eq!(first.code_table, second.code_table);
    for (a, b) in first.chapters.iter().zip(&second.chapters) {
        assert_eq!(a.pages, b.pages);
        assert_eq!(a.header, b.header);
        assert_eq!(a.resolution.listing(), b.resolution.listing());
    }
}

const MINIMAL_CHAPTER: &str = r#"
tiles = ["1111111111111111111111111111111111111111111111111111111111111111"]

[general]
suffix = "mini"
starting_location = "Room"

[text]
RoomDesc = "A room."

[locations.Room]
description = "RoomDesc"
gfx = "room"

[graphics.room]
width = 1
height = 1
cells = [0]
"#;

fn tiny_views() -> CompilerConfig {
    CompilerConfig {
        view_width: 1,
        view_height: 1,
        ..CompilerConfig::default()
    }
}

#[test]
fn test_minimal_chapter_from_toml() {
    let chapter = Chapter::from_toml(MINIMAL_CHAPTER, String::new()).unwrap();
    let compiled = ContentCompiler::new(tiny_views())
        .compile_chapters(&[chapter])
        .unwrap();
    let image = &compiled.chapters[0];
    assert_eq!(image.pages.len(), 2);
    assert!(image.diagnostics.is_empty());
    // no entrance script anywhere
    let room = bytes_at(image, &Label::Location("Room".to_string()), Some(16));
    assert_eq!(room[12], 0);
    assert_eq!(room[13..16], [0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_script_errors_stop_compilation() {
    let chapter = Chapter::from_toml(MINIMAL_CHAPTER, "SCRIPT Broken:\n    TEXT RoomDesc\n".to_string()).unwrap();
    assert_eq!(
        ContentCompiler::new(tiny_views())
            .compile_chapters(&[chapter])
            .unwrap_err(),
        CompilerError::UnterminatedScript("Broken".to_string(), 1)
    );
}

#[test]
fn test_view_size_is_checked() {
    let chapter = Chapter::from_toml(MINIMAL_CHAPTER, String::new()).unwrap();
    assert!(matches!(
        ContentCompiler::new(CompilerConfig::default()).compile_chapters(&[chapter]),
        Err(CompilerError::GraphicsError(_))
    ));
}

#[test]
fn test_unsupported_text_character() {
    let source = MINIMAL_CHAPTER.replace("A room.", "A room @ night.");
    let chapter = Chapter::from_toml(&source, String::new()).unwrap();
    assert_eq!(
        ContentCompiler::new(tiny_views())
            .compile_chapters(&[chapter])
            .unwrap_err(),
        CompilerError::UnsupportedCharacter('@', "RoomDesc".to_string())
    );
}

#[test]
fn test_declaration_errors() {
    let unknown_key = MINIMAL_CHAPTER.replace("gfx = \"room\"", "gfx = \"room\"\ncolour = 3");
    assert!(matches!(
        Chapter::from_toml(&unknown_key, String::new()),
        Err(CompilerError::ConfigError(_))
    ));

    let bad_tile = MINIMAL_CHAPTER.replace("\"1111", "\"zz11");
    assert!(matches!(
        Chapter::from_toml(&bad_tile, String::new()),
        Err(CompilerError::GraphicsError(_))
    ));
}

#[test]
fn test_compiler_config_from_toml() {
    let config = CompilerConfig::from_toml("page_capacity = 8000\nline_length = 20").unwrap();
    assert_eq!(config.page_capacity, 8000);
    assert_eq!(config.line_length, 20);
    assert_eq!(config.chunk_length(), 120);
    assert_eq!(config.view_cells(), 196);

    assert!(matches!(
        CompilerConfig::from_toml("page_capacity = 20000"),
        Err(CompilerError::ConfigError(_))
    ));
    assert!(matches!(
        CompilerConfig::from_toml("pages = 3"),
        Err(CompilerError::ConfigError(_))
    ));

    let invalid = CompilerConfig {
        page_capacity: 0,
        ..CompilerConfig::default()
    };
    assert!(matches!(
        ContentCompiler::new(invalid).compile_chapters(&[]),
        Err(CompilerError::ConfigError(_))
    ));
}
