// Project Loading
//
// Reads the declarative world description: a TOML manifest naming the
// compiler settings and chapter files, and per chapter the texts, locations,
// items, tiles, graphics views and a script source file.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::info;
use serde::Deserialize;

use crate::content_compiler::config::CompilerConfig;
use crate::content_compiler::error::CompilerError;
use crate::content_compiler::tiles::{TileGrid, TilePixels, TileRegistry};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationDecl {
    pub description: String,
    pub gfx: String,
    #[serde(default)]
    pub entrance_script: Option<String>,
    /// direction -> command -> script
    #[serde(default)]
    pub scripts: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemDecl {
    /// Text key of the item's display name.
    pub name: String,
    pub location: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// command -> script
    #[serde(default)]
    pub scripts: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneralSection {
    suffix: String,
    starting_location: String,
    #[serde(default)]
    default_entry_script: Option<String>,
    #[serde(default)]
    scripts: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChapterFile {
    general: GeneralSection,
    #[serde(default)]
    text: IndexMap<String, String>,
    #[serde(default)]
    locations: IndexMap<String, LocationDecl>,
    #[serde(default)]
    items: IndexMap<String, ItemDecl>,
    #[serde(default)]
    tiles: Vec<String>,
    #[serde(default)]
    graphics: IndexMap<String, TileGrid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    compiler: CompilerConfig,
    chapters: Vec<PathBuf>,
}

/// One compilation unit sharing the project's code table.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub suffix: String,
    pub starting_location: String,
    pub default_entry_script: Option<String>,
    pub texts: IndexMap<String, String>,
    pub locations: IndexMap<String, LocationDecl>,
    pub items: IndexMap<String, ItemDecl>,
    pub script_source: String,
    pub tiles: TileRegistry,
    pub graphics: IndexMap<String, TileGrid>,
}

impl Chapter {
    /// Parse a chapter description; the script source is supplied separately.
    pub fn from_toml(source: &str, script_source: String) -> Result<Chapter, CompilerError> {
        let file: ChapterFile = toml::from_str(source)?;
        Chapter::from_file(file, script_source)
    }

    /// Read a chapter file and the script file it names, relative to it.
    pub fn load(path: &Path) -> Result<Chapter, CompilerError> {
        let source = read_file(path)?;
        let file: ChapterFile = toml::from_str(&source)
            .map_err(|e| CompilerError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let script_source = match &file.general.scripts {
            Some(scripts) => read_file(&relative_to(path, scripts))?,
            None => String::new(),
        };
        Chapter::from_file(file, script_source)
    }

    fn from_file(file: ChapterFile, script_source: String) -> Result<Chapter, CompilerError> {
        let tiles = file
            .tiles
            .iter()
            .map(|hex| TilePixels::from_hex(hex))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chapter {
            suffix: file.general.suffix,
            starting_location: file.general.starting_location,
            default_entry_script: file.general.default_entry_script,
            texts: file.text,
            locations: file.locations,
            items: file.items,
            script_source,
            tiles: TileRegistry { tiles },
            graphics: file.graphics,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub config: CompilerConfig,
    pub chapters: Vec<Chapter>,
}

impl Project {
    /// Load a manifest and every chapter it lists.
    pub fn load(path: &Path) -> Result<Project, CompilerError> {
        let source = read_file(path)?;
        let manifest: ManifestFile = toml::from_str(&source)
            .map_err(|e| CompilerError::ConfigError(format!("{}: {}", path.display(), e)))?;
        manifest.compiler.validate()?;

        let mut chapters = Vec::with_capacity(manifest.chapters.len());
        for chapter in &manifest.chapters {
            chapters.push(Chapter::load(&relative_to(path, chapter))?);
        }
        info!(
            "Loaded project {} with {} chapters",
            path.display(),
            chapters.len()
        );

        Ok(Project {
            config: manifest.compiler,
            chapters,
        })
    }
}

fn relative_to(base_file: &Path, path: &Path) -> PathBuf {
    match base_file.parent() {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn read_file(path: &Path) -> Result<String, CompilerError> {
    fs::read_to_string(path)
        .map_err(|e| CompilerError::IOError(format!("{}: {}", path.display(), e)))
}
