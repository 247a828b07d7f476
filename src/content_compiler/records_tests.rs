// Record compiler tests

#[cfg(test)]
mod records_tests {
    use indexmap::IndexMap;
    use test_log::test;

    use crate::content_compiler::config::CompilerConfig;
    use crate::content_compiler::context::{CompilationContext, Diagnostics, TextEntry};
    use crate::content_compiler::element::{ElementKind, Label, RefWidth};
    use crate::content_compiler::error::CompilerError;
    use crate::content_compiler::huffman::{CodeTable, SymbolHistogram};
    use crate::content_compiler::project::{ItemDecl, LocationDecl};
    use crate::content_compiler::records::*;
    use crate::content_compiler::script::{Command, Direction};
    use crate::content_compiler::text::encode_text;

    const FF: u8 = 0xFF;

    /// A code table covering every letter and the space.
    fn alphabet_codec() -> CodeTable {
        let mut histogram = SymbolHistogram::new();
        let letters = "abcdefghijklmnopqrstuvwxyz ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        histogram.add_symbols(&encode_text("k", letters, true, 30).unwrap());
        CodeTable::build(&histogram).unwrap()
    }

    fn context(texts: &[(&str, &str)]) -> CompilationContext {
        let texts: IndexMap<String, String> = texts
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CompilationContext::new(&texts, 10, 10)
    }

    fn hall() -> LocationDecl {
        let mut scripts = IndexMap::new();
        let mut north = IndexMap::new();
        north.insert("go".to_string(), "GoNorth".to_string());
        let mut here = IndexMap::new();
        here.insert("look".to_string(), "LookHere".to_string());
        here.insert("examine".to_string(), "ExamineHere".to_string());
        scripts.insert("north".to_string(), north);
        scripts.insert("here".to_string(), here);
        LocationDecl {
            description: "HallDesc".to_string(),
            gfx: "hall".to_string(),
            entrance_script: None,
            scripts,
        }
    }

    fn item(location: &str) -> ItemDecl {
        ItemDecl {
            name: "LampName".to_string(),
            location: location.to_string(),
            is_static: false,
            scripts: IndexMap::new(),
        }
    }

    #[test]
    fn test_location_record_layout() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let element = records
            .compile_location("Hall", &hall(), "tileblock_0", Some("Enter"), &mut context)
            .unwrap();

        assert_eq!(element.kind, ElementKind::Location);
        assert_eq!(element.label, Label::Location("Hall".to_string()));
        let mut expected = vec![FF; 12];
        expected.push(3);
        expected.extend_from_slice(&[0, 1, FF, FF, FF]); // here, look
        expected.extend_from_slice(&[0, 6, FF, FF, FF]); // here, examine
        expected.extend_from_slice(&[1, 0, FF, FF, FF]); // north, go
        expected.extend_from_slice(&[FF, FF, FF]); // entrance
        assert_eq!(element.payload, expected);

        let targets: Vec<(Label, usize, RefWidth)> = element
            .refs
            .iter()
            .map(|r| (r.target.clone(), r.offset, r.width))
            .collect();
        assert_eq!(
            targets,
            vec![
                (Label::Text("HallDesc".to_string()), 0, RefWidth::Far),
                (Label::TilePatterns("tileblock_0".to_string()), 3, RefWidth::Far),
                (Label::TileColours("tileblock_0".to_string()), 6, RefWidth::Near),
                (Label::Palette("hall".to_string()), 8, RefWidth::Near),
                (Label::GraphicsView("hall".to_string()), 10, RefWidth::Near),
                (Label::Script("LookHere".to_string()), 15, RefWidth::Far),
                (Label::Script("ExamineHere".to_string()), 20, RefWidth::Far),
                (Label::Script("GoNorth".to_string()), 25, RefWidth::Far),
                (Label::Script("Enter".to_string()), 28, RefWidth::Far),
            ]
        );
        assert!(context.used_texts.contains("HallDesc"));
        assert_eq!(context.used_scripts.len(), 4);
    }

    #[test]
    fn test_location_without_entrance_script() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let element = records
            .compile_location("Hall", &hall(), "tileblock_0", None, &mut context)
            .unwrap();
        assert_eq!(element.byte_length(), 31);
        assert_eq!(element.payload[28..], [FF, FF, FF]);
        assert_eq!(element.refs.len(), 8);
    }

    #[test]
    fn test_own_entrance_script_wins() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let mut decl = hall();
        decl.entrance_script = Some("Special".to_string());
        let element = records
            .compile_location("Hall", &decl, "tileblock_0", Some("Enter"), &mut context)
            .unwrap();
        let last = element.refs.last().unwrap();
        assert_eq!(last.target, Label::Script("Special".to_string()));
        assert!(!context.used_scripts.contains("Enter"));
    }

    #[test]
    fn test_location_with_unknown_command() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let mut decl = hall();
        decl.scripts["north"].insert("dance".to_string(), "Dance".to_string());
        assert_eq!(
            records
                .compile_location("Hall", &decl, "tileblock_0", None, &mut context)
                .unwrap_err(),
            CompilerError::UnknownCommand("dance".to_string())
        );
    }

    #[test]
    fn test_location_with_repeated_dispatch_pair() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let mut decl = hall();
        let mut north = IndexMap::new();
        north.insert("GO".to_string(), "GoNorthAgain".to_string());
        decl.scripts.insert("North".to_string(), north);
        assert_eq!(
            records
                .compile_location("Hall", &decl, "tileblock_0", None, &mut context(&[]))
                .unwrap_err(),
            CompilerError::DuplicateSymbol("north go in location Hall".to_string())
        );

        let mut decl = hall();
        decl.scripts["here"].insert("Look".to_string(), "LookAgain".to_string());
        assert!(matches!(
            records.compile_location("Hall", &decl, "tileblock_0", None, &mut context(&[])),
            Err(CompilerError::DuplicateSymbol(_))
        ));
    }

    #[test]
    fn test_item_with_repeated_command() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let mut decl = item("Hall");
        decl.scripts.insert("talk about".to_string(), "Chat".to_string());
        decl.scripts.insert("Talk_About".to_string(), "ChatAgain".to_string());
        assert_eq!(
            records
                .compile_item("Lamp", &decl, 0, &mut context(&[]))
                .unwrap_err(),
            CompilerError::DuplicateSymbol("talk about in item Lamp".to_string())
        );
    }

    #[test]
    fn test_item_record_layout() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let mut decl = item("Hall");
        decl.is_static = true;
        decl.scripts.insert("use".to_string(), "UseLamp".to_string());
        decl.scripts.insert("take".to_string(), "TakeLamp".to_string());

        let element = records.compile_item("Lamp", &decl, 2, &mut context).unwrap();
        assert_eq!(element.label, Label::Item("Lamp".to_string()));
        assert_eq!(
            element.payload,
            vec![FF, FF, FF, 0x06, 0xC0, ITEM_FLAG_STATIC, 2, 4, FF, FF, FF, 2, FF, FF, FF]
        );
        assert_eq!(element.refs[0].target, Label::Text("LampName".to_string()));
        assert_eq!(element.refs[1].target, Label::Script("UseLamp".to_string()));
        assert_eq!(element.refs[2].offset, 12);
    }

    #[test]
    fn test_item_ram_address_overflow() {
        let config = CompilerConfig {
            item_ram_base: 0xFFFE,
            ..CompilerConfig::default()
        };
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        assert!(records.compile_item("A", &item("Hall"), 0, &mut context).is_ok());
        assert!(matches!(
            records.compile_item("B", &item("Hall"), 1, &mut context),
            Err(CompilerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_item_table_layout() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let mut items = IndexMap::new();
        items.insert("Lamp".to_string(), item("Hall"));
        items.insert("Apple".to_string(), item("_INVENTORY"));

        let element = records.compile_item_table(&items, 4, &mut context).unwrap();
        assert_eq!(element.label, Label::ItemTable);
        assert_eq!(element.exports, vec![(Label::ItemInitLocations, 7)]);

        let mut expected = vec![2, FF, FF, FF, FF, FF, FF, 0, 2, 0, FF, FF, FF];
        expected.extend_from_slice(&[0; 2 * ITEM_TABLE_ENTRY_SIZE]);
        assert_eq!(element.payload, expected);

        let targets: Vec<(&Label, usize)> = element.refs.iter().map(|r| (&r.target, r.offset)).collect();
        assert_eq!(
            targets,
            vec![
                (&Label::Item("Apple".to_string()), 1),
                (&Label::Item("Lamp".to_string()), 4),
                (&Label::Location("Hall".to_string()), 10),
            ]
        );
        assert!(context.used_locations.contains("Hall"));
        assert_eq!(context.used_locations.len(), 1);
    }

    #[test]
    fn test_empty_item_table_is_padded() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[]);

        let element = records
            .compile_item_table(&IndexMap::new(), 1, &mut context)
            .unwrap();
        assert_eq!(element.payload, vec![0; 1 + ITEM_TABLE_ENTRY_SIZE]);
        assert_eq!(element.exports, vec![(Label::ItemInitLocations, 1)]);
    }

    #[test]
    fn test_chapter_header() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let mut context = context(&[]);
        let header = records.compile_header("Hall", &mut context);
        assert_eq!(header.kind, ElementKind::Header);
        assert_eq!(header.payload, vec![FF; 9]);
        let targets: Vec<&Label> = header.refs.iter().map(|r| &r.target).collect();
        assert_eq!(
            targets,
            vec![
                &Label::Location("Hall".to_string()),
                &Label::ItemTable,
                &Label::ItemInitLocations,
            ]
        );
        assert!(context.used_locations.contains("Hall"));

        let mut context = self::context(&[]);
        let header = records.compile_header("_LOST", &mut context);
        assert_eq!(header.payload[..3], [0, 0, 0]);
        assert_eq!(header.refs.len(), 2);
    }

    #[test]
    fn test_compile_text_uses_code_table() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let entry = TextEntry {
            text: "Hello there".to_string(),
            prewrapped: false,
        };
        let element = records.compile_text("Greeting", &entry).unwrap();
        assert_eq!(element.kind, ElementKind::Text);
        assert_eq!(element.label, Label::Text("Greeting".to_string()));
        let symbols = encode_text("Greeting", "Hello there", false, config.line_length).unwrap();
        assert_eq!(element.payload, codec.encode(&symbols).unwrap());
    }

    #[test]
    fn test_compile_text_outside_alphabet() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let entry = TextEntry {
            text: "Hello, there".to_string(),
            prewrapped: false,
        };
        assert_eq!(
            records.compile_text("Greeting", &entry).unwrap_err(),
            CompilerError::UnencodableSymbol(14 + 55)
        );
    }

    #[test]
    fn test_compile_texts_skips_replaced_long_text() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);
        let mut context = context(&[
            ("Intro", "aaaa bbbb cccc dddd eeee ffff"),
            ("Plain", "hi"),
        ]);
        context.expand_long_text("Intro").unwrap();

        let labels: Vec<Label> = records
            .compile_texts(&context)
            .unwrap()
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                Label::Text("Plain".to_string()),
                Label::Text("Intro_PT0".to_string()),
                Label::Text("Intro_PT1".to_string()),
                Label::Text("Intro_PT2".to_string()),
            ]
        );
    }

    #[test]
    fn test_name_table_layout() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let table = records.compile_name_table(["ab", "c"]).unwrap();
        let entry = |text: &str| TextEntry {
            text: text.to_string(),
            prewrapped: false,
        };
        let first = records.compress("ab", &entry("ab")).unwrap();
        let second = records.compress("c", &entry("c")).unwrap();

        let mut expected = vec![4, 0];
        expected.extend_from_slice(&(4 + first.len() as u16).to_le_bytes());
        expected.extend_from_slice(&first);
        expected.extend_from_slice(&second);
        assert_eq!(table, expected);
    }

    #[test]
    fn test_direction_and_command_tables() {
        let config = CompilerConfig::default();
        let codec = alphabet_codec();
        let records = RecordCompiler::new(&config, &codec);

        let directions = records.direction_names().unwrap();
        let offset_bytes = 2 * Direction::ALL.len();
        assert_eq!(directions[..2], (offset_bytes as u16).to_le_bytes());

        let commands = records.command_names().unwrap();
        let offset_bytes = 2 * Command::ALL.len();
        assert_eq!(commands[..2], (offset_bytes as u16).to_le_bytes());
        let last = u16::from_le_bytes([commands[offset_bytes - 2], commands[offset_bytes - 1]]);
        assert!((last as usize) < commands.len());
    }

    #[test]
    fn test_diagnostic_stubs() {
        assert_eq!(Diagnostics::text_stub("Old_Door"), "Old_Door=TODO Old Door");
        assert_eq!(
            Diagnostics::script_stub("LookAtDoor"),
            "SCRIPT LookAtDoor:\n    TEXTEND LookAtDoor"
        );
        assert_eq!(
            Diagnostics::script_stub("ExamineKey"),
            "SCRIPT ExamineKey:\n    TEXTEND ExamineKey"
        );
        assert_eq!(Diagnostics::script_stub("OpenDoor"), "SCRIPT OpenDoor:\n    END");
    }

    #[test]
    fn test_diagnose_lists_sorted_missing_names() {
        let mut context = context(&[("Known", "x")]);
        context.use_text("Zebra");
        context.use_text("Known");
        context.use_text("Apple");
        context.use_script("Defined");
        context.use_script("Ghost");
        context.use_location("Hall");
        context.use_item("Sword");
        context.missing_graphics.insert("cellar".to_string());

        let scripts = vec!["Defined".to_string()];
        let locations = vec!["Hall".to_string()];
        let items: Vec<String> = Vec::new();
        let diagnostics = context.diagnose(scripts.iter(), locations.iter(), items.iter());

        assert_eq!(diagnostics.texts, vec!["Apple", "Zebra"]);
        assert_eq!(diagnostics.scripts, vec!["Ghost"]);
        assert!(diagnostics.locations.is_empty());
        assert_eq!(diagnostics.items, vec!["Sword"]);
        assert_eq!(diagnostics.graphics, vec!["cellar"]);
        assert!(!diagnostics.is_empty());

        assert!(diagnostics.reports(&Label::Text("Zebra".to_string())));
        assert!(!diagnostics.reports(&Label::Text("Known".to_string())));
        assert!(!diagnostics.reports(&Label::ItemTable));

        let report = diagnostics.to_string();
        assert!(report.contains("ERROR! Missing text entries\nApple=TODO Apple\nZebra=TODO Zebra\n"));
        assert!(report.contains("ERROR! Missing scripts\nSCRIPT Ghost:\n    END\n"));
        assert!(report.contains("ERROR! Missing items\nSword\n"));
        assert!(report.contains("cellar"));
        assert!(!report.contains("Missing locations"));
    }
}
