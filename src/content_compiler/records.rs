// Record Compiler
//
// Turns declarations into elements: location and item records, the item
// master table, compressed text, the chapter header and the direction and
// command name tables. Every label reference goes through the compilation
// context so undefined targets show up in the diagnostics.

use indexmap::IndexMap;
use log::debug;

use crate::content_compiler::config::CompilerConfig;
use crate::content_compiler::context::{CompilationContext, TextEntry};
use crate::content_compiler::element::{Element, ElementKind, Label, RefWidth, NULL_FAR_REFERENCE};
use crate::content_compiler::error::CompilerError;
use crate::content_compiler::huffman::CodeTable;
use crate::content_compiler::project::{ItemDecl, LocationDecl};
use crate::content_compiler::script::{emit_location, Command, Direction, LocationRef};
use crate::content_compiler::text::encode_text;

/// Item flag bit: the item cannot be picked up.
pub const ITEM_FLAG_STATIC: u8 = 0x01;

/// Bytes of one item in the master table: far item ref plus far location ref.
pub const ITEM_TABLE_ENTRY_SIZE: usize = 6;

pub struct RecordCompiler<'a> {
    config: &'a CompilerConfig,
    codec: &'a CodeTable,
}

impl<'a> RecordCompiler<'a> {
    pub fn new(config: &'a CompilerConfig, codec: &'a CodeTable) -> Self {
        RecordCompiler { config, codec }
    }

    /// Compress one string: symbol conversion, then the shared code table.
    pub fn compress(&self, key: &str, entry: &TextEntry) -> Result<Vec<u8>, CompilerError> {
        let symbols = encode_text(key, &entry.text, entry.prewrapped, self.config.line_length)?;
        self.codec.encode(&symbols)
    }

    pub fn compile_text(&self, key: &str, entry: &TextEntry) -> Result<Element, CompilerError> {
        let mut element = Element::new(ElementKind::Text, Label::Text(key.to_string()));
        element.emit_bytes(&self.compress(key, entry)?);
        Ok(element)
    }

    /// Text elements for every defined text the chapter keeps.
    pub fn compile_texts(&self, context: &CompilationContext) -> Result<Vec<Element>, CompilerError> {
        let mut elements = Vec::new();
        for (key, entry) in &context.texts {
            if context.emits_text(key) {
                elements.push(self.compile_text(key, entry)?);
            }
        }
        debug!("Compiled {} text elements", elements.len());
        Ok(elements)
    }

    /// Location record; `bundle` names the graphics bundle holding the
    /// location's view.
    pub fn compile_location(
        &self,
        name: &str,
        decl: &LocationDecl,
        bundle: &str,
        default_entry_script: Option<&str>,
        context: &mut CompilationContext,
    ) -> Result<Element, CompilerError> {
        let mut element = Element::new(ElementKind::Location, Label::Location(name.to_string()));

        let description = context.use_text(&decl.description);
        element.emit_reference(description, RefWidth::Far);
        element.emit_reference(Label::TilePatterns(bundle.to_string()), RefWidth::Far);
        element.emit_reference(Label::TileColours(bundle.to_string()), RefWidth::Near);
        element.emit_reference(Label::Palette(decl.gfx.clone()), RefWidth::Near);
        element.emit_reference(Label::GraphicsView(decl.gfx.clone()), RefWidth::Near);

        let mut dispatch: Vec<(Direction, Command, &String)> = Vec::new();
        for (direction, commands) in &decl.scripts {
            let direction = Direction::from_name(direction)?;
            for (command, script) in commands {
                dispatch.push((direction, Command::from_name(command)?, script));
            }
        }
        dispatch.sort_by_key(|&(direction, command, _)| (direction, command));
        // names are case-folded, so two spellings can collide
        if let Some(pair) = dispatch.windows(2).find(|w| (w[0].0, w[0].1) == (w[1].0, w[1].1)) {
            return Err(CompilerError::DuplicateSymbol(format!(
                "{} {} in location {}",
                pair[0].0.name(),
                pair[0].1.name(),
                name
            )));
        }

        element.emit_byte(dispatch.len() as u8);
        for (direction, command, script) in dispatch {
            element.emit_bytes(&[direction.code(), command.code()]);
            let target = context.use_script(script);
            element.emit_reference(target, RefWidth::Far);
        }

        match decl.entrance_script.as_deref().or(default_entry_script) {
            Some(script) => {
                let target = context.use_script(script);
                element.emit_reference(target, RefWidth::Far);
            }
            None => element.emit_bytes(&NULL_FAR_REFERENCE),
        }
        Ok(element)
    }

    /// Item record; `slot` is the item's index in sorted name order.
    pub fn compile_item(
        &self,
        name: &str,
        decl: &ItemDecl,
        slot: usize,
        context: &mut CompilationContext,
    ) -> Result<Element, CompilerError> {
        let mut element = Element::new(ElementKind::Item, Label::Item(name.to_string()));

        let text = context.use_text(&decl.name);
        element.emit_reference(text, RefWidth::Far);
        element.emit_word(self.ram_address(name, slot)?);
        element.emit_byte(if decl.is_static { ITEM_FLAG_STATIC } else { 0 });

        let mut commands = Vec::with_capacity(decl.scripts.len());
        for (command, script) in &decl.scripts {
            let command = Command::from_name(command)?;
            if commands.iter().any(|&(seen, _)| seen == command) {
                return Err(CompilerError::DuplicateSymbol(format!(
                    "{} in item {}",
                    command.name(),
                    name
                )));
            }
            commands.push((command, script));
        }

        element.emit_byte(commands.len() as u8);
        for (command, script) in commands {
            element.emit_byte(command.code());
            let target = context.use_script(script);
            element.emit_reference(target, RefWidth::Far);
        }
        Ok(element)
    }

    fn ram_address(&self, name: &str, slot: usize) -> Result<u16, CompilerError> {
        u16::try_from(slot)
            .ok()
            .and_then(|slot| slot.checked_mul(self.config.item_ram_stride))
            .and_then(|offset| self.config.item_ram_base.checked_add(offset))
            .ok_or_else(|| {
                CompilerError::ConfigError(format!("RAM slot {} of item '{}' is out of range", slot, name))
            })
    }

    /// The item master table: count, far ref per item, then the initial
    /// location of every item, padded with empty entries to `max_items`.
    pub fn compile_item_table(
        &self,
        items: &IndexMap<String, ItemDecl>,
        max_items: usize,
        context: &mut CompilationContext,
    ) -> Result<Element, CompilerError> {
        let mut names: Vec<&String> = items.keys().collect();
        names.sort();

        let count = u8::try_from(names.len())
            .map_err(|_| CompilerError::ConfigError(format!("{} items; at most 255 fit", names.len())))?;

        let mut element = Element::new(ElementKind::ItemTable, Label::ItemTable);
        element.emit_byte(count);
        for name in &names {
            element.emit_reference(Label::Item((*name).clone()), RefWidth::Far);
        }

        element.export_here(Label::ItemInitLocations);
        for name in &names {
            let location = LocationRef::parse(&items[*name].location);
            if let LocationRef::Named(target) = &location {
                context.use_location(target);
            }
            emit_location(&mut element, &location);
        }
        for _ in names.len()..max_items {
            element.emit_bytes(&[0; ITEM_TABLE_ENTRY_SIZE]);
        }
        Ok(element)
    }

    /// Chapter header, patched once the item table has been placed.
    pub fn compile_header(&self, starting_location: &str, context: &mut CompilationContext) -> Element {
        let mut element = Element::new(ElementKind::Header, Label::ChapterHeader);
        let start = LocationRef::parse(starting_location);
        if let LocationRef::Named(target) = &start {
            context.use_location(target);
        }
        emit_location(&mut element, &start);
        element.emit_reference(Label::ItemTable, RefWidth::Far);
        element.emit_reference(Label::ItemInitLocations, RefWidth::Far);
        element
    }

    /// Offset table plus compressed names, in code order.
    pub fn compile_name_table<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<Vec<u8>, CompilerError> {
        let mut compressed = Vec::new();
        for name in names {
            let entry = TextEntry {
                text: name.to_string(),
                prewrapped: false,
            };
            compressed.push(self.compress(name, &entry)?);
        }

        let mut offset = compressed.len() * 2;
        let mut table = Vec::with_capacity(offset + compressed.iter().map(Vec::len).sum::<usize>());
        for bytes in &compressed {
            let word = u16::try_from(offset)
                .map_err(|_| CompilerError::ConfigError("name table exceeds 64 KiB".to_string()))?;
            table.extend_from_slice(&word.to_le_bytes());
            offset += bytes.len();
        }
        for bytes in compressed {
            table.extend_from_slice(&bytes);
        }
        Ok(table)
    }

    pub fn direction_names(&self) -> Result<Vec<u8>, CompilerError> {
        self.compile_name_table(Direction::ALL.iter().map(|d| d.name()))
    }

    pub fn command_names(&self) -> Result<Vec<u8>, CompilerError> {
        self.compile_name_table(Command::ALL.iter().map(|c| c.name()))
    }
}
