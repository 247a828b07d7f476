// Compiler configuration
//
// Read from the [compiler] table of a project manifest. Every key is optional.

use serde::Deserialize;

use crate::content_compiler::error::CompilerError;

/// Bytes usable per page: a 16 KiB window minus the engine's 22 reserved bytes.
pub const DEFAULT_PAGE_CAPACITY: usize = (1 << 14) - 22;
pub const DEFAULT_PAGE_SIZE: usize = 1 << 14;
pub const DEFAULT_WINDOW_BASE: u16 = 0x8000;

/// Upper bound on partial colour groups kept while growing one merge group.
/// Trades merge quality for time; any value >= 1 gives a valid result.
pub const DEFAULT_COLOUR_MERGE_FRONTIER: usize = 500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub page_capacity: usize,
    pub page_size: usize,
    pub window_base: u16,
    pub first_page_index: u8,
    pub line_length: usize,
    pub lines_per_chunk: usize,
    pub colour_merge_frontier: usize,
    pub bundle_merge_rounds: usize,
    pub bundle_size_limit: usize,
    pub view_width: usize,
    pub view_height: usize,
    pub item_ram_base: u16,
    pub item_ram_stride: u16,
    pub default_entry_script: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            page_capacity: DEFAULT_PAGE_CAPACITY,
            page_size: DEFAULT_PAGE_SIZE,
            window_base: DEFAULT_WINDOW_BASE,
            first_page_index: 0,
            line_length: 32 - 2,
            lines_per_chunk: 6,
            colour_merge_frontier: DEFAULT_COLOUR_MERGE_FRONTIER,
            bundle_merge_rounds: 4,
            bundle_size_limit: 16000,
            view_width: 14,
            view_height: 14,
            item_ram_base: 0xC000,
            item_ram_stride: 3,
            default_entry_script: None,
        }
    }
}

impl CompilerConfig {
    /// Parse a standalone `[compiler]`-style TOML table.
    pub fn from_toml(source: &str) -> Result<Self, CompilerError> {
        let config: CompilerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CompilerError> {
        if self.page_capacity == 0 || self.page_capacity > self.page_size {
            return Err(CompilerError::ConfigError(format!(
                "page_capacity {} must be between 1 and page_size {}",
                self.page_capacity, self.page_size
            )));
        }
        if self.window_base as usize + self.page_size > 0x10000 {
            return Err(CompilerError::ConfigError(format!(
                "window at 0x{:04x} of {} bytes exceeds the 16-bit address space",
                self.window_base, self.page_size
            )));
        }
        if self.line_length == 0 || self.lines_per_chunk == 0 {
            return Err(CompilerError::ConfigError(
                "line_length and lines_per_chunk must be positive".to_string(),
            ));
        }
        if self.colour_merge_frontier == 0 {
            return Err(CompilerError::ConfigError(
                "colour_merge_frontier must be at least 1".to_string(),
            ));
        }
        if self.view_width == 0 || self.view_height == 0 {
            return Err(CompilerError::ConfigError(
                "view dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Characters in one LONGTEXT chunk.
    pub fn chunk_length(&self) -> usize {
        self.line_length * self.lines_per_chunk
    }

    pub fn view_cells(&self) -> usize {
        self.view_width * self.view_height
    }
}
