// Page Allocation
//
// Packs compiled elements into fixed-capacity pages, records where every
// label landed, and patches each cross-reference with its final page and
// window address.
//
// Pages are mapped one at a time into the CPU window at `window_base`, so an
// in-page address is `window_base + offset`.

use indexmap::IndexMap;
use log::{debug, info};

use crate::content_compiler::config::CompilerConfig;
use crate::content_compiler::context::Diagnostics;
use crate::content_compiler::element::{Element, Label, RefWidth, PLACEHOLDER_BYTE};
use crate::content_compiler::error::CompilerError;

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: u8,
    pub capacity: usize,
    pub elements: Vec<Element>,
}

impl Page {
    pub fn new(index: u8, capacity: usize) -> Self {
        Page {
            index,
            capacity,
            elements: Vec::new(),
        }
    }

    pub fn used(&self) -> usize {
        self.elements.iter().map(Element::byte_length).sum()
    }

    pub fn fits(&self, element: &Element) -> bool {
        self.used() + element.byte_length() <= self.capacity
    }

    /// Element payloads in packing order.
    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.used());
        for element in &self.elements {
            bytes.extend_from_slice(&element.payload);
        }
        bytes
    }

    /// Page contents padded with 0xFF to the physical page size.
    pub fn image(&self, page_size: usize) -> Vec<u8> {
        let mut bytes = self.bytes();
        if bytes.len() < page_size {
            bytes.resize(page_size, 0xFF);
        }
        bytes
    }
}

/// Where a label was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub page: u8,
    pub offset: u16,
    pub address: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionTable {
    entries: IndexMap<Label, Placement>,
}

impl ResolutionTable {
    pub fn get(&self, label: &Label) -> Option<Placement> {
        self.entries.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, &Placement)> {
        self.entries.iter()
    }

    fn insert(&mut self, label: Label, placement: Placement) -> Result<(), CompilerError> {
        if self.entries.contains_key(&label) {
            return Err(CompilerError::DuplicateSymbol(label.to_string()));
        }
        self.entries.insert(label, placement);
        Ok(())
    }

    /// Rewrite every reference of `element`. Labels the diagnostics already
    /// reported resolve to the null reference; anything else unplaced is fatal.
    pub fn patch(&self, element: &mut Element, diagnostics: &Diagnostics) -> Result<(), CompilerError> {
        for reference in &element.refs {
            let bytes: Vec<u8> = match (self.get(&reference.target), reference.width) {
                (Some(place), RefWidth::Far) => {
                    let [lo, hi] = place.address.to_le_bytes();
                    vec![place.page, lo, hi]
                }
                (Some(place), RefWidth::Near) => place.address.to_le_bytes().to_vec(),
                (None, width) if diagnostics.reports(&reference.target) => {
                    vec![PLACEHOLDER_BYTE; width.size()]
                }
                (None, _) => return Err(CompilerError::UnresolvedLabel(reference.target.to_string())),
            };
            element.payload[reference.offset..reference.offset + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(())
    }

    /// Assembler-style listing, one `label: EQU page, address` per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (label, place) in &self.entries {
            out.push_str(&format!("{}: EQU {}, ${:04x}\n", label, place.page, place.address));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub pages: Vec<Page>,
    pub resolution: ResolutionTable,
}

pub struct PageAllocator<'a> {
    config: &'a CompilerConfig,
}

impl<'a> PageAllocator<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        PageAllocator { config }
    }

    /// Pack `elements` after a first page holding only `reserved`, pad the
    /// page count to a power of two and resolve every reference.
    ///
    /// Elements go in descending size order (ties keep input order). Each
    /// page takes, in that order, every remaining element that still fits;
    /// the next page starts with whatever is left.
    pub fn allocate(
        &self,
        elements: Vec<Element>,
        reserved: Vec<Element>,
        diagnostics: &Diagnostics,
    ) -> Result<Allocation, CompilerError> {
        let capacity = self.config.page_capacity;
        let first = self.config.first_page_index as usize;

        let reserved_size: usize = reserved.iter().map(Element::byte_length).sum();
        if reserved_size > capacity {
            return Err(CompilerError::ReservedPageOverflow(reserved_size, capacity));
        }
        if let Some(big) = elements.iter().find(|e| e.byte_length() > capacity) {
            return Err(CompilerError::ElementTooLarge(
                big.label.to_string(),
                big.byte_length(),
                capacity,
            ));
        }

        let mut first_page = Page::new(self.config.first_page_index, capacity);
        first_page.elements = reserved;
        let mut pages = vec![first_page];

        let mut remaining = elements;
        remaining.sort_by(|a, b| b.byte_length().cmp(&a.byte_length()));

        while !remaining.is_empty() {
            let index = page_index(first + pages.len())?;
            let mut page = Page::new(index, capacity);
            let mut rest = Vec::with_capacity(remaining.len());
            for element in remaining {
                if page.fits(&element) {
                    debug!(
                        "  {} {} ({} bytes) at page {} offset {}",
                        element.kind,
                        element.label,
                        element.byte_length(),
                        index,
                        page.used()
                    );
                    page.elements.push(element);
                } else {
                    rest.push(element);
                }
            }
            debug!(
                "Page {}: {} elements, {} / {} bytes",
                page.index,
                page.elements.len(),
                page.used(),
                capacity
            );
            pages.push(page);
            remaining = rest;
        }

        let used_pages = pages.len();
        let padded = (first + used_pages).next_power_of_two();
        if padded > 256 {
            return Err(CompilerError::TooManyPages(padded));
        }
        while first + pages.len() < padded {
            let index = page_index(first + pages.len())?;
            pages.push(Page::new(index, capacity));
        }

        for page in &pages {
            assert!(
                page.used() <= page.capacity,
                "page {} overfilled: {} > {}",
                page.index,
                page.used(),
                page.capacity
            );
        }

        let resolution = self.resolve(&pages)?;
        for page in &mut pages {
            for element in &mut page.elements {
                resolution.patch(element, diagnostics)?;
            }
        }

        info!(
            "Allocated {} pages ({} padding), {} labels",
            pages.len(),
            pages.len() - used_pages,
            resolution.len()
        );
        Ok(Allocation { pages, resolution })
    }

    fn resolve(&self, pages: &[Page]) -> Result<ResolutionTable, CompilerError> {
        let mut table = ResolutionTable::default();
        for page in pages {
            let mut base = 0usize;
            for element in &page.elements {
                for (label, offset) in element.labels() {
                    let offset = base + offset;
                    let address = self.config.window_base as usize + offset;
                    table.insert(
                        label.clone(),
                        Placement {
                            page: page.index,
                            offset: offset as u16,
                            address: address as u16,
                        },
                    )?;
                }
                base += element.byte_length();
            }
        }
        Ok(table)
    }
}

fn page_index(index: usize) -> Result<u8, CompilerError> {
    u8::try_from(index).map_err(|_| CompilerError::TooManyPages(index + 1))
}
