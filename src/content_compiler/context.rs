// Compilation Context
//
// Per-chapter state shared by the record compiler stages: the text table,
// the labels referenced so far, and the diagnostics derived from them once
// every record has been compiled.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::content_compiler::element::Label;
use crate::content_compiler::error::CompilerError;
use crate::content_compiler::text::{chunk_key, split_long_text};

#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub text: String,
    pub prewrapped: bool,
}

#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub texts: IndexMap<String, TextEntry>,
    long_texts: IndexMap<String, Vec<String>>,
    pub used_texts: IndexSet<String>,
    pub used_scripts: IndexSet<String>,
    pub used_locations: IndexSet<String>,
    pub used_items: IndexSet<String>,
    pub missing_graphics: IndexSet<String>,
    line_length: usize,
    chunk_length: usize,
}

impl CompilationContext {
    pub fn new(texts: &IndexMap<String, String>, line_length: usize, chunk_length: usize) -> Self {
        CompilationContext {
            texts: texts
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        TextEntry {
                            text: v.clone(),
                            prewrapped: false,
                        },
                    )
                })
                .collect(),
            long_texts: IndexMap::new(),
            used_texts: IndexSet::new(),
            used_scripts: IndexSet::new(),
            used_locations: IndexSet::new(),
            used_items: IndexSet::new(),
            missing_graphics: IndexSet::new(),
            line_length,
            chunk_length,
        }
    }

    pub fn use_text(&mut self, key: &str) -> Label {
        self.used_texts.insert(key.to_string());
        Label::Text(key.to_string())
    }

    pub fn use_script(&mut self, name: &str) -> Label {
        self.used_scripts.insert(name.to_string());
        Label::Script(name.to_string())
    }

    pub fn use_location(&mut self, name: &str) -> Label {
        self.used_locations.insert(name.to_string());
        Label::Location(name.to_string())
    }

    pub fn use_item(&mut self, name: &str) -> Label {
        self.used_items.insert(name.to_string());
        Label::Item(name.to_string())
    }

    /// Text keys a LONGTEXT of `key` expands to.
    ///
    /// The first expansion splits the text into prewrapped chunks registered
    /// as `key_PT0..`; later expansions reuse them. A key with no text
    /// expands to itself so the missing text is still diagnosed. A chunk
    /// name that is already a declared text is an error.
    pub fn expand_long_text(&mut self, key: &str) -> Result<Vec<String>, CompilerError> {
        if let Some(chunks) = self.long_texts.get(key) {
            for chunk in chunks {
                self.used_texts.insert(chunk.clone());
            }
            return Ok(chunks.clone());
        }

        let Some(entry) = self.texts.get(key) else {
            self.used_texts.insert(key.to_string());
            return Ok(vec![key.to_string()]);
        };

        let pieces = split_long_text(&entry.text, self.line_length, self.chunk_length);
        if let Some(taken) = (0..pieces.len())
            .map(|i| chunk_key(key, i))
            .find(|name| self.texts.contains_key(name))
        {
            return Err(CompilerError::DuplicateSymbol(taken));
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.into_iter().enumerate() {
            let name = chunk_key(key, i);
            self.texts.insert(
                name.clone(),
                TextEntry {
                    text: piece,
                    prewrapped: true,
                },
            );
            self.used_texts.insert(name.clone());
            chunks.push(name);
        }
        debug!("LONGTEXT {} split into {} chunks", key, chunks.len());
        self.long_texts.insert(key.to_string(), chunks.clone());
        Ok(chunks)
    }

    /// Whether a text becomes a text element. A key replaced by its LONGTEXT
    /// chunks is kept only when something also references it directly.
    pub fn emits_text(&self, key: &str) -> bool {
        !self.long_texts.contains_key(key) || self.used_texts.contains(key)
    }

    /// Compare every used label against what was actually defined.
    pub fn diagnose<'a>(
        &self,
        scripts: impl IntoIterator<Item = &'a String>,
        locations: impl IntoIterator<Item = &'a String>,
        items: impl IntoIterator<Item = &'a String>,
    ) -> Diagnostics {
        let scripts: IndexSet<&String> = scripts.into_iter().collect();
        let locations: IndexSet<&String> = locations.into_iter().collect();
        let items: IndexSet<&String> = items.into_iter().collect();

        let missing = |used: &IndexSet<String>, defined: &dyn Fn(&String) -> bool| {
            let mut names: Vec<String> = used.iter().filter(|n| !defined(*n)).cloned().collect();
            names.sort();
            names
        };

        let mut graphics: Vec<String> = self.missing_graphics.iter().cloned().collect();
        graphics.sort();

        Diagnostics {
            texts: missing(&self.used_texts, &|n| self.texts.contains_key(n)),
            scripts: missing(&self.used_scripts, &|n| scripts.contains(n)),
            locations: missing(&self.used_locations, &|n| locations.contains(n)),
            items: missing(&self.used_items, &|n| items.contains(n)),
            graphics,
        }
    }
}

/// Referenced-but-undefined labels of one chapter, each list sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub texts: Vec<String>,
    pub scripts: Vec<String>,
    pub locations: Vec<String>,
    pub items: Vec<String>,
    pub graphics: Vec<String>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
            && self.scripts.is_empty()
            && self.locations.is_empty()
            && self.items.is_empty()
            && self.graphics.is_empty()
    }

    /// Whether references to `label` were reported rather than fatal.
    pub fn reports(&self, label: &Label) -> bool {
        let (list, name) = match label {
            Label::Text(name) => (&self.texts, name),
            Label::Script(name) => (&self.scripts, name),
            Label::Location(name) => (&self.locations, name),
            Label::Item(name) => (&self.items, name),
            _ => return false,
        };
        list.binary_search(name).is_ok()
    }

    /// Ready-to-paste declaration for a missing text.
    pub fn text_stub(key: &str) -> String {
        format!("{}=TODO {}", key, key.replace('_', " "))
    }

    /// Ready-to-paste declaration for a missing script.
    pub fn script_stub(name: &str) -> String {
        if name.starts_with("Look") || name.starts_with("Examine") {
            format!("SCRIPT {}:\n    TEXTEND {}", name, name)
        } else {
            format!("SCRIPT {}:\n    END", name)
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.graphics.is_empty() {
            writeln!(f, "ERROR! Missing graphics sources:")?;
            for source in &self.graphics {
                writeln!(f, "{}", source)?;
            }
        }
        if !self.texts.is_empty() {
            writeln!(f, "ERROR! Missing text entries")?;
            for key in &self.texts {
                writeln!(f, "{}", Diagnostics::text_stub(key))?;
            }
        }
        if !self.scripts.is_empty() {
            writeln!(f, "ERROR! Missing scripts")?;
            for name in &self.scripts {
                writeln!(f, "{}", Diagnostics::script_stub(name))?;
            }
        }
        if !self.locations.is_empty() {
            writeln!(f, "ERROR! Missing locations")?;
            for name in &self.locations {
                writeln!(f, "{}", name)?;
            }
        }
        if !self.items.is_empty() {
            writeln!(f, "ERROR! Missing items")?;
            for name in &self.items {
                writeln!(f, "{}", name)?;
            }
        }
        Ok(())
    }
}
