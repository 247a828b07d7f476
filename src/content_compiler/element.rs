/// Compiled output units and their symbolic cross-references
///
/// An [`Element`] is one self-contained record (script, location, item, text,
/// graphics bundle, item table). Wherever its payload embeds the address of
/// another element, the bytes are placeholders and a [`CrossReference`]
/// records the target label and offset. References have fixed width, so an
/// element's size is final before any page is assigned.
///
/// # Reference encoding
///
/// - **Far**: `page:u8, address:u16le` (3 bytes)
/// - **Near**: `address:u16le` (2 bytes); the page is implied by the far
///   reference that precedes it in the record
use std::fmt;

/// Placeholder byte written where a reference will be patched.
pub const PLACEHOLDER_BYTE: u8 = 0xFF;

/// Encoding of "no target" (no entrance script, missing declaration).
pub const NULL_FAR_REFERENCE: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Symbolic name of something another element can point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Text(String),
    Script(String),
    Location(String),
    Item(String),
    TileColours(String),  // colour table of a graphics bundle
    TilePatterns(String), // pattern table of a graphics bundle
    Palette(String),      // per graphics source
    GraphicsView(String), // per graphics source
    ItemTable,
    ItemInitLocations,
    ChapterHeader,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Text(name) => write!(f, "__TXT_{}", name),
            Label::Script(name) => write!(f, "__S_{}", name),
            Label::Location(name) => write!(f, "__LOCATION_{}", name),
            Label::Item(name) => write!(f, "__ITEM_{}", name),
            Label::TileColours(name) => write!(f, "__TILECLR_{}", name),
            Label::TilePatterns(name) => write!(f, "__TILEGFX_{}", name),
            Label::Palette(name) => write!(f, "__PALETTE_{}", name),
            Label::GraphicsView(name) => write!(f, "__GFXVIEW_{}", name),
            Label::ItemTable => write!(f, "ITEM_ADDRESS_LIST"),
            Label::ItemInitLocations => write!(f, "ITEM_INIT_LOCATIONS"),
            Label::ChapterHeader => write!(f, "CHAPTER_HEADER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefWidth {
    Far,
    Near,
}

impl RefWidth {
    pub const fn size(self) -> usize {
        match self {
            RefWidth::Far => 3,
            RefWidth::Near => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossReference {
    pub target: Label,
    pub offset: usize, // byte offset of the reference inside the payload
    pub width: RefWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Script,
    Location,
    Item,
    ItemTable,
    Text,
    TileBundle,
    Header, // kept outside the pages
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ElementKind::Script => "script",
            ElementKind::Location => "location",
            ElementKind::Item => "item",
            ElementKind::ItemTable => "items",
            ElementKind::Text => "text",
            ElementKind::TileBundle => "tilegfx",
            ElementKind::Header => "header",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub label: Label, // exported at offset 0
    pub payload: Vec<u8>,
    pub exports: Vec<(Label, usize)>, // labels inside the payload
    pub refs: Vec<CrossReference>,
}

impl Element {
    pub fn new(kind: ElementKind, label: Label) -> Self {
        Element {
            kind,
            label,
            payload: Vec::new(),
            exports: Vec::new(),
            refs: Vec::new(),
        }
    }

    /// Size once placed; references are fixed width so this never changes.
    pub fn byte_length(&self) -> usize {
        self.payload.len()
    }

    /// Every label this element defines, with its offset.
    pub fn labels(&self) -> impl Iterator<Item = (&Label, usize)> {
        std::iter::once((&self.label, 0)).chain(self.exports.iter().map(|(l, o)| (l, *o)))
    }

    pub fn emit_byte(&mut self, byte: u8) {
        self.payload.push(byte);
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.payload.extend_from_slice(bytes);
    }

    pub fn emit_word(&mut self, word: u16) {
        self.payload.extend_from_slice(&word.to_le_bytes());
    }

    /// Record a reference at the current end of the payload and reserve its
    /// placeholder bytes.
    pub fn emit_reference(&mut self, target: Label, width: RefWidth) {
        self.refs.push(CrossReference {
            target,
            offset: self.payload.len(),
            width,
        });
        self.payload
            .extend(std::iter::repeat(PLACEHOLDER_BYTE).take(width.size()));
    }

    pub fn export_here(&mut self, label: Label) {
        self.exports.push((label, self.payload.len()));
    }
}
