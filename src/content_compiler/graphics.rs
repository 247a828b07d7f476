// Graphics Bundles
//
// Groups location views that share tiles into bundles, each carrying one
// pattern table and one merged colour table, and compiles every bundle into
// a single element so all of its views land on the same page as their tiles.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use log::{debug, info};

use crate::content_compiler::colours::{
    distinct_classes, merge_colours, ColourAttr, ColourClass, MAX_COLOUR_CLASSES,
};
use crate::content_compiler::config::CompilerConfig;
use crate::content_compiler::element::{Element, ElementKind, Label};
use crate::content_compiler::error::CompilerError;
use crate::content_compiler::tiles::{pattern_for, tile_colours, Palette, TileGrid, TileRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsBundle {
    pub name: String,
    pub sources: Vec<String>,
    pub tiles: BTreeSet<u16>,
    pub colours: BTreeMap<ColourAttr, ColourClass>,
    pub estimated_size: usize,
}

impl GraphicsBundle {
    /// Colour classes in colour-table order.
    pub fn classes(&self) -> Vec<ColourClass> {
        self.colours
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

struct MergeCandidate {
    delta: i64,
    size: usize,
    first: usize,
    second: usize,
    tiles: BTreeSet<u16>,
    colours: BTreeMap<ColourAttr, ColourClass>,
}

pub struct BundlePlanner<'a> {
    config: &'a CompilerConfig,
    registry: &'a TileRegistry,
    merged: HashMap<Vec<u16>, Result<BTreeMap<ColourAttr, ColourClass>, CompilerError>>,
}

impl<'a> BundlePlanner<'a> {
    pub fn new(config: &'a CompilerConfig, registry: &'a TileRegistry) -> Self {
        BundlePlanner {
            config,
            registry,
            merged: HashMap::new(),
        }
    }

    /// Colour merge of a tile set, cached since pair evaluation revisits
    /// the same unions every round.
    fn merged_colours(
        &mut self,
        tiles: &BTreeSet<u16>,
    ) -> Result<BTreeMap<ColourAttr, ColourClass>, CompilerError> {
        let key: Vec<u16> = tiles.iter().copied().collect();
        if let Some(hit) = self.merged.get(&key) {
            return hit.clone();
        }
        let mut attrs = BTreeSet::new();
        for &tile in tiles {
            attrs.insert(tile_colours(self.registry.get(tile)?));
        }
        let result = merge_colours(&attrs, self.config.colour_merge_frontier);
        self.merged.insert(key, result.clone());
        result
    }

    fn estimate(&self, tiles: usize, classes: usize, sources: usize) -> usize {
        let cells = self.config.view_cells();
        9 * tiles + 8 * classes + (cells + cells * 2) * sources
    }

    /// Start with one bundle per source, then repeatedly merge the pair that
    /// saves the most space while staying under the colour and size limits.
    pub fn plan(
        &mut self,
        grids: &IndexMap<String, TileGrid>,
    ) -> Result<Vec<GraphicsBundle>, CompilerError> {
        let mut bundles = Vec::with_capacity(grids.len());
        for (source, grid) in grids {
            let tiles = grid.used_tiles();
            let colours = self.merged_colours(&tiles)?;
            let estimated_size = self.estimate(tiles.len(), distinct_classes(&colours), 1);
            debug!("Graphics source {}: estimated {} bytes", source, estimated_size);
            bundles.push(GraphicsBundle {
                name: String::new(),
                sources: vec![source.clone()],
                tiles,
                colours,
                estimated_size,
            });
        }

        for round in 0..self.config.bundle_merge_rounds {
            let mut best: Option<MergeCandidate> = None;
            for i in 0..bundles.len() {
                for j in i + 1..bundles.len() {
                    let tiles: BTreeSet<u16> =
                        bundles[i].tiles.union(&bundles[j].tiles).copied().collect();
                    let colours = match self.merged_colours(&tiles) {
                        Ok(colours) => colours,
                        Err(CompilerError::TooManyColourClasses(_)) => continue,
                        Err(e) => return Err(e),
                    };
                    let classes = distinct_classes(&colours);
                    if classes > MAX_COLOUR_CLASSES - 1 {
                        continue;
                    }
                    let sources = bundles[i].sources.len() + bundles[j].sources.len();
                    let size = self.estimate(tiles.len(), classes, sources);
                    if size > self.config.bundle_size_limit {
                        continue;
                    }
                    let delta =
                        size as i64 - (bundles[i].estimated_size + bundles[j].estimated_size) as i64;
                    if delta == 0 {
                        continue;
                    }
                    let better = match &best {
                        Some(current) => (delta, size) < (current.delta, current.size),
                        None => true,
                    };
                    if better {
                        best = Some(MergeCandidate {
                            delta,
                            size,
                            first: i,
                            second: j,
                            tiles,
                            colours,
                        });
                    }
                }
            }

            let Some(merge) = best else {
                break;
            };
            debug!(
                "Bundle merge round {}: {} + {} saves {} bytes, {} bytes total",
                round,
                bundles[merge.first].sources.join(","),
                bundles[merge.second].sources.join(","),
                -merge.delta,
                merge.size
            );
            // second > first, so removing it first keeps the other index valid
            let second = bundles.remove(merge.second);
            let first = bundles.remove(merge.first);
            let mut sources = first.sources;
            sources.extend(second.sources);
            bundles.push(GraphicsBundle {
                name: String::new(),
                sources,
                tiles: merge.tiles,
                colours: merge.colours,
                estimated_size: merge.size,
            });
        }

        for (index, bundle) in bundles.iter_mut().enumerate() {
            bundle.name = format!("tileblock_{}", index);
        }
        info!(
            "Graphics: {} sources in {} bundles, estimated {} bytes",
            grids.len(),
            bundles.len(),
            bundles.iter().map(|b| b.estimated_size).sum::<usize>()
        );
        Ok(bundles)
    }
}

/// Compile one bundle: colour table, pattern table, then a palette and a
/// view per source. Tiles are renumbered densely in sorted id order.
pub fn compile_bundle(
    bundle: &GraphicsBundle,
    registry: &TileRegistry,
    grids: &IndexMap<String, TileGrid>,
) -> Result<Element, CompilerError> {
    let mut element = Element::new(ElementKind::TileBundle, Label::TileColours(bundle.name.clone()));
    let classes = bundle.classes();
    for class in &classes {
        element.emit_bytes(class.bytes());
    }

    element.export_here(Label::TilePatterns(bundle.name.clone()));
    for &tile in &bundle.tiles {
        let pixels = registry.get(tile)?;
        let attr = tile_colours(pixels);
        let class = bundle.colours.get(&attr).ok_or_else(|| {
            CompilerError::GraphicsError(format!("tile {} has no colour class", tile))
        })?;
        let index = classes.binary_search(class).map_err(|_| {
            CompilerError::GraphicsError(format!("colour class {} missing from table", class))
        })?;
        element.emit_bytes(&pattern_for(pixels, class));
        element.emit_byte(index as u8);
    }

    let renumbered: BTreeMap<u16, u16> = bundle
        .tiles
        .iter()
        .enumerate()
        .map(|(i, &tile)| (tile, i as u16))
        .collect();

    for source in &bundle.sources {
        let grid = grids
            .get(source)
            .ok_or_else(|| CompilerError::GraphicsError(format!("unknown source '{}'", source)))?;
        let cells: Vec<u16> = grid
            .cells
            .iter()
            .map(|cell| renumbered.get(cell).copied())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                CompilerError::GraphicsError(format!("'{}' uses a tile outside its bundle", source))
            })?;
        let used: BTreeSet<u16> = cells.iter().copied().collect();
        if used.len() >= MAX_COLOUR_CLASSES {
            return Err(CompilerError::GraphicsError(format!(
                "'{}' uses {} distinct tiles; a view palette holds at most 254",
                source,
                used.len()
            )));
        }
        let palette = Palette::from_tiles(&used);

        element.export_here(Label::Palette(source.clone()));
        element.emit_bytes(&palette.encode());

        element.export_here(Label::GraphicsView(source.clone()));
        for &cell in &cells {
            let index = palette.index_of(cell).ok_or_else(|| {
                CompilerError::GraphicsError(format!("tile {} missing from palette of '{}'", cell, source))
            })?;
            element.emit_byte(index);
        }
    }

    debug!(
        "Bundle {}: {} classes, {} tiles, {} views, {} bytes",
        bundle.name,
        classes.len(),
        bundle.tiles.len(),
        bundle.sources.len(),
        element.byte_length()
    );
    Ok(element)
}
