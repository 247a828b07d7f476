// Content Compiler Module
// Turns a declarative game world into banked page images for the engine

pub mod colours;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod graphics;
pub mod huffman;
pub mod pages;
pub mod project;
pub mod records;
pub mod script;
pub mod text;
pub mod tiles;

#[cfg(test)]
mod records_tests;

use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

pub use config::CompilerConfig;
pub use context::Diagnostics;
pub use error::CompilerError;

use context::CompilationContext;
use element::{Element, Label};
use graphics::{compile_bundle, BundlePlanner};
use huffman::{CodeTable, SymbolHistogram};
use pages::{Page, PageAllocator, ResolutionTable};
use project::{Chapter, Project};
use records::RecordCompiler;
use script::{compile_script, parse_scripts, Command, Direction, Script};
use text::encode_text;

/// Everything produced for one chapter.
#[derive(Debug, Clone)]
pub struct ChapterImage {
    pub suffix: String,
    pub pages: Vec<Page>,
    pub resolution: ResolutionTable,
    pub header: Vec<u8>,
    pub direction_names: Vec<u8>,
    pub command_names: Vec<u8>,
    pub diagnostics: Diagnostics,
}

/// A compiled project: the shared code table and every chapter image.
#[derive(Debug, Clone)]
pub struct CompiledProject {
    pub code_table: CodeTable,
    pub chapters: Vec<ChapterImage>,
}

/// Chapter state between script parsing and record compilation.
struct ParsedChapter<'a> {
    chapter: &'a Chapter,
    context: CompilationContext,
    scripts: IndexMap<String, Script>,
}

/// Main compiler structure
pub struct ContentCompiler {
    config: CompilerConfig,
}

impl ContentCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        ContentCompiler { config }
    }

    /// Compile every chapter of a project against one shared code table
    pub fn compile(&self, project: &Project) -> Result<CompiledProject, CompilerError> {
        self.compile_chapters(&project.chapters)
    }

    pub fn compile_chapters(&self, chapters: &[Chapter]) -> Result<CompiledProject, CompilerError> {
        self.config.validate()?;

        // Phase 1: parse scripts; LONGTEXT expansion adds the chunk texts
        info!("Phase 1: parsing scripts for {} chapters", chapters.len());
        let mut parsed = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let mut context = CompilationContext::new(
                &chapter.texts,
                self.config.line_length,
                self.config.chunk_length(),
            );
            let items: IndexSet<String> = chapter.items.keys().cloned().collect();
            let scripts = parse_scripts(&chapter.script_source, &items, &mut context)?;
            debug!("Chapter {}: {} scripts", chapter.suffix, scripts.len());
            parsed.push(ParsedChapter {
                chapter,
                context,
                scripts,
            });
        }

        // Phase 2: one code table for every displayed string
        info!("Phase 2: building the symbol code table");
        let code_table = self.build_code_table(&parsed)?;

        // Phase 3: records, graphics and pages per chapter
        info!("Phase 3: compiling chapter records");
        let max_items = chapters.iter().map(|c| c.items.len()).max().unwrap_or(0);
        let mut images = Vec::with_capacity(parsed.len());
        for chapter in parsed {
            images.push(self.compile_chapter(chapter, &code_table, max_items)?);
        }

        Ok(CompiledProject {
            code_table,
            chapters: images,
        })
    }

    fn build_code_table(&self, parsed: &[ParsedChapter]) -> Result<CodeTable, CompilerError> {
        let line_length = self.config.line_length;
        let mut histogram = SymbolHistogram::new();
        for chapter in parsed {
            for (key, entry) in &chapter.context.texts {
                histogram.add_symbols(&encode_text(key, &entry.text, entry.prewrapped, line_length)?);
            }
        }
        let names = Direction::ALL
            .iter()
            .map(|d| d.name())
            .chain(Command::ALL.iter().map(|c| c.name()));
        for name in names {
            histogram.add_symbols(&encode_text(name, name, false, line_length)?);
        }
        CodeTable::build(&histogram)
    }

    fn compile_chapter(
        &self,
        parsed: ParsedChapter,
        codec: &CodeTable,
        max_items: usize,
    ) -> Result<ChapterImage, CompilerError> {
        let ParsedChapter {
            chapter,
            mut context,
            scripts,
        } = parsed;
        let records = RecordCompiler::new(&self.config, codec);
        let mut elements: Vec<Element> = Vec::new();

        // Graphics sources in first-use order; missing ones skip their location
        let mut grids = IndexMap::new();
        for decl in chapter.locations.values() {
            if let Some(grid) = chapter.graphics.get(&decl.gfx) {
                if !grids.contains_key(&decl.gfx) {
                    grid.check_view(&decl.gfx, self.config.view_width, self.config.view_height)?;
                    grids.insert(decl.gfx.clone(), grid.clone());
                }
            } else {
                context.missing_graphics.insert(decl.gfx.clone());
            }
        }
        let bundles = BundlePlanner::new(&self.config, &chapter.tiles).plan(&grids)?;
        let mut bundle_of: IndexMap<&str, &str> = IndexMap::new();
        for bundle in &bundles {
            for source in &bundle.sources {
                bundle_of.insert(source.as_str(), bundle.name.as_str());
            }
            elements.push(compile_bundle(bundle, &chapter.tiles, &grids)?);
        }

        let default_entry = chapter
            .default_entry_script
            .as_deref()
            .or(self.config.default_entry_script.as_deref());
        let mut locations = Vec::new();
        for (name, decl) in &chapter.locations {
            let Some(bundle) = bundle_of.get(decl.gfx.as_str()) else {
                warn!("Location {} skipped: graphics '{}' not found", name, decl.gfx);
                continue;
            };
            elements.push(records.compile_location(name, decl, bundle, default_entry, &mut context)?);
            locations.push(name.clone());
        }

        let mut item_names: Vec<&String> = chapter.items.keys().collect();
        item_names.sort();
        for (slot, name) in item_names.iter().enumerate() {
            elements.push(records.compile_item(name, &chapter.items[*name], slot, &mut context)?);
        }
        let item_table = records.compile_item_table(&chapter.items, max_items, &mut context)?;
        let mut header = records.compile_header(&chapter.starting_location, &mut context);

        for script in scripts.values() {
            elements.push(compile_script(script));
        }
        elements.extend(records.compile_texts(&context)?);

        let diagnostics = context.diagnose(scripts.keys(), locations.iter(), chapter.items.keys());
        if !diagnostics.is_empty() {
            warn!("Chapter {} has unresolved references", chapter.suffix);
        }

        let allocation = PageAllocator::new(&self.config).allocate(elements, vec![item_table], &diagnostics)?;

        allocation.resolution.patch(&mut header, &diagnostics)?;
        let item_page = allocation
            .resolution
            .get(&Label::ItemTable)
            .map(|place| place.page)
            .ok_or_else(|| CompilerError::UnresolvedLabel(Label::ItemTable.to_string()))?;
        let mut header_bytes = header.payload;
        header_bytes.push(item_page);

        info!(
            "Chapter {}: {} locations, {} items, {} scripts, {} pages",
            chapter.suffix,
            locations.len(),
            chapter.items.len(),
            scripts.len(),
            allocation.pages.len()
        );

        Ok(ChapterImage {
            suffix: chapter.suffix.clone(),
            pages: allocation.pages,
            resolution: allocation.resolution,
            header: header_bytes,
            direction_names: records.direction_names()?,
            command_names: records.command_names()?,
            diagnostics,
        })
    }
}
