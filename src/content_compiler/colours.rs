// Colour Attribute Merging
//
// Each 8x8 tile carries one colour byte per pixel row: two 4-bit colour
// register indices, (c0 << 4) | c1, with 0 meaning transparent/background.
// Tiles whose rows never need more than two non-zero colours between them
// can share one colour table entry. This module finds such groups with a
// bounded greedy search.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};

use crate::content_compiler::error::CompilerError;

/// Most colour classes one colour table can index (byte index, 255 reserved).
pub const MAX_COLOUR_CLASSES: usize = 255;

/// The 8 row colour bytes of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColourAttr(pub [u8; 8]);

/// A canonical attribute that one or more attributes were merged into.
pub type ColourClass = ColourAttr;

impl fmt::Display for ColourAttr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl ColourAttr {
    pub fn bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

/// Row-wise compatibility test.
///
/// Returns the merged attribute when every row's combined non-zero colours
/// number at most two; each merged row is `(min << 4) | max` of that union,
/// and a row with no non-zero colours stays 0.
pub fn compatible(a: &ColourAttr, b: &ColourAttr) -> Option<ColourAttr> {
    let mut merged = [0u8; 8];
    for (row, (&ra, &rb)) in a.0.iter().zip(b.0.iter()).enumerate() {
        let mut colours = BTreeSet::new();
        for value in [ra >> 4, ra & 0x0f, rb >> 4, rb & 0x0f] {
            if value != 0 {
                colours.insert(value);
            }
        }
        if colours.len() > 2 {
            return None;
        }
        merged[row] = match (colours.first(), colours.last()) {
            (Some(&lo), Some(&hi)) => (lo << 4) | hi,
            _ => 0,
        };
    }
    Some(ColourAttr(merged))
}

/// Merge colour attributes into as few classes as the heuristic finds.
///
/// Each round picks the class with the most compatible partners (ties go to
/// the lexicographically smallest class), grows compatible groups from it
/// while keeping at most `frontier_cap` partial groups (largest first), and
/// commits the largest group found. Rounds stop when no two classes are
/// compatible. Fails if 256 or more classes remain.
pub fn merge_colours(
    codes: &BTreeSet<ColourAttr>,
    frontier_cap: usize,
) -> Result<BTreeMap<ColourAttr, ColourClass>, CompilerError> {
    let mut remap: BTreeMap<ColourAttr, ColourClass> = codes.iter().map(|&c| (c, c)).collect();
    let frontier_cap = frontier_cap.max(1);
    let mut rounds = 0;

    loop {
        let classes: BTreeSet<ColourClass> = remap.values().copied().collect();

        // Class with the most compatible partners.
        let mut best: Option<(ColourClass, Vec<ColourClass>)> = None;
        for &class in &classes {
            let partners: Vec<ColourClass> = classes
                .iter()
                .filter(|&&other| other != class && compatible(&class, &other).is_some())
                .copied()
                .collect();
            if partners.is_empty() {
                continue;
            }
            let better = match &best {
                Some((_, current)) => partners.len() > current.len(),
                None => true,
            };
            if better {
                best = Some((class, partners));
            }
        }

        let Some((seed, partners)) = best else {
            break;
        };

        let (group, merged) = grow_group(seed, &partners, frontier_cap);
        debug!(
            "Colour merge round {}: {} classes into {} ({} candidates)",
            rounds,
            group.len(),
            merged,
            partners.len()
        );

        let group: BTreeSet<ColourClass> = group.into_iter().collect();
        for class in remap.values_mut() {
            if group.contains(class) {
                *class = merged;
            }
        }
        rounds += 1;
    }

    let distinct = distinct_classes(&remap);
    info!(
        "Colour classes used: {}, originally {} ({} merge rounds)",
        distinct,
        codes.len(),
        rounds
    );
    if distinct > MAX_COLOUR_CLASSES {
        return Err(CompilerError::TooManyColourClasses(distinct));
    }
    Ok(remap)
}

/// Grow compatible groups from `seed`, trying each partner against every
/// group found so far. Returns the largest group and its merged class;
/// among equally large groups the earliest found wins.
fn grow_group(
    seed: ColourClass,
    partners: &[ColourClass],
    frontier_cap: usize,
) -> (Vec<ColourClass>, ColourClass) {
    let mut frontier: Vec<(Vec<ColourClass>, ColourClass)> = vec![(vec![seed], seed)];

    for &candidate in partners {
        let extended: Vec<(Vec<ColourClass>, ColourClass)> = frontier
            .iter()
            .filter_map(|(members, merged)| {
                compatible(&candidate, merged).map(|code| {
                    let mut members = members.clone();
                    members.push(candidate);
                    (members, code)
                })
            })
            .collect();
        frontier.extend(extended);

        if frontier.len() > frontier_cap {
            // Stable sort keeps discovery order among equal sizes.
            frontier.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            frontier.truncate(frontier_cap);
        }
    }

    let mut best = 0;
    for (i, (members, _)) in frontier.iter().enumerate() {
        if members.len() > frontier[best].0.len() {
            best = i;
        }
    }
    frontier.swap_remove(best)
}

pub fn distinct_classes(remap: &BTreeMap<ColourAttr, ColourClass>) -> usize {
    remap.values().collect::<BTreeSet<_>>().len()
}
