// Symbol Codec
//
// Frequency-adaptive prefix code over the byte alphabet, with a compact
// serialized decoding table for the engine's tree-walking decoder.
//
// Serialized table format: all nodes are 2 bytes, preceded by the end token.
// If the second byte of a node is 0, the first byte is the symbol of a leaf.
// Otherwise the two bytes are the forward distances from the node's first
// byte to the first byte of child 0 and child 1.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use bitvec::prelude::*;
use log::debug;

use crate::content_compiler::error::CompilerError;

/// Heap-layout slots grow as 2^depth; deeper trees are refused there.
const MAX_HEAP_LAYOUT_DEPTH: usize = 24;

/// Running frequency count of every symbol in the display corpus.
#[derive(Debug, Clone)]
pub struct SymbolHistogram {
    counts: [u64; 256],
}

impl Default for SymbolHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolHistogram {
    pub fn new() -> Self {
        SymbolHistogram { counts: [0; 256] }
    }

    pub fn add_symbols(&mut self, symbols: &[u8]) {
        for &symbol in symbols {
            self.counts[symbol as usize] += 1;
        }
    }

    pub fn set_count(&mut self, symbol: u8, count: u64) {
        self.counts[symbol as usize] = count;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn is_present(&self, symbol: u8) -> bool {
        self.counts[symbol as usize] > 0
    }

    pub fn distinct_symbols(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

#[derive(Debug, Clone, Copy)]
enum CodeNode {
    Leaf(u8),
    Internal { ch0: usize, ch1: usize },
}

/// Arena-built prefix code tree. Nodes are addressed by index; the tree is
/// never mutated after construction.
#[derive(Debug, Clone)]
struct CodeTree {
    nodes: Vec<CodeNode>,
    root: usize,
}

impl CodeTree {
    /// Repeatedly merge the two lowest-priority nodes. Priority is
    /// `(frequency, rank, key)`; a merged node takes the key of the second
    /// node popped, and the child with the higher rank becomes child 0.
    fn build(leaves: &[(u8, u64)]) -> CodeTree {
        let mut nodes = Vec::with_capacity(leaves.len() * 2);
        let mut ranks = Vec::with_capacity(leaves.len() * 2);
        let mut queue = BinaryHeap::new();

        for &(symbol, frequency) in leaves {
            let index = nodes.len();
            nodes.push(CodeNode::Leaf(symbol));
            ranks.push(1u32);
            queue.push(Reverse((frequency, 1u32, symbol, index)));
        }

        while queue.len() > 1 {
            let Some(Reverse((f0, _, _, n0))) = queue.pop() else {
                break;
            };
            let Some(Reverse((f1, _, key, n1))) = queue.pop() else {
                break;
            };
            let (r0, r1) = (ranks[n0], ranks[n1]);
            let (ch0, ch1) = if r0 < r1 { (n1, n0) } else { (n0, n1) };
            let rank = r0.max(r1) + 1;

            let index = nodes.len();
            nodes.push(CodeNode::Internal { ch0, ch1 });
            ranks.push(rank);
            queue.push(Reverse((f0 + f1, rank, key, index)));
        }

        let root = match queue.pop() {
            Some(Reverse((_, _, _, index))) => index,
            None => 0,
        };
        CodeTree { nodes, root }
    }
}

/// Finished code table: per-symbol codes plus the serialized decoder table.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeTable {
    end_token: u8,
    null_token: u8,
    codes: Vec<Option<BitVec<u8, Lsb0>>>,
    entries: Vec<u8>,
}

impl CodeTable {
    /// Build the code from a frozen histogram.
    ///
    /// Fails when all 256 byte values are in use, since the end and null
    /// tokens must be values the corpus never produces.
    pub fn build(histogram: &SymbolHistogram) -> Result<CodeTable, CompilerError> {
        let mut absent = (0..=255u8).filter(|&s| !histogram.is_present(s));
        let end_token = absent.next().ok_or(CompilerError::AlphabetExhausted)?;
        let null_token = absent.next().ok_or(CompilerError::AlphabetExhausted)?;

        let mut leaves: Vec<(u8, u64)> = (0..=255u8)
            .filter(|&s| histogram.is_present(s))
            .map(|s| (s, histogram.count(s)))
            .collect();
        leaves.push((end_token, 0));

        let tree = CodeTree::build(&leaves);

        let mut codes: Vec<Option<BitVec<u8, Lsb0>>> = vec![None; 256];
        let mut positions = vec![0usize; tree.nodes.len()];
        let mut internal = Vec::new();
        let mut entries = Vec::with_capacity(tree.nodes.len() * 2);

        // Pre-order walk with an explicit stack; child 1 is visited first.
        let mut stack = vec![(tree.root, BitVec::<u8, Lsb0>::new())];
        while let Some((index, prefix)) = stack.pop() {
            positions[index] = entries.len();
            match tree.nodes[index] {
                CodeNode::Leaf(symbol) => {
                    entries.extend_from_slice(&[symbol, 0]);
                    codes[symbol as usize] = Some(prefix);
                }
                CodeNode::Internal { ch0, ch1 } => {
                    internal.push((entries.len(), ch0, ch1));
                    entries.extend_from_slice(&[0, 0]);
                    let mut left = prefix.clone();
                    left.push(false);
                    let mut right = prefix;
                    right.push(true);
                    stack.push((ch0, left));
                    stack.push((ch1, right));
                }
            }
        }

        for (at, ch0, ch1) in internal {
            for (slot, child) in [(at, ch0), (at + 1, ch1)] {
                let distance = positions[child] - at;
                if distance == 0 || distance > u8::MAX as usize {
                    return Err(CompilerError::CodeTableOverflow(distance));
                }
                entries[slot] = distance as u8;
            }
        }

        debug!(
            "Code table: {} symbols, end token {}, null token {}, {} table bytes",
            leaves.len(),
            end_token,
            null_token,
            entries.len() + 1
        );

        Ok(CodeTable {
            end_token,
            null_token,
            codes,
            entries,
        })
    }

    pub fn end_token(&self) -> u8 {
        self.end_token
    }

    pub fn null_token(&self) -> u8 {
        self.null_token
    }

    pub fn code(&self, symbol: u8) -> Option<&BitSlice<u8, Lsb0>> {
        self.codes[symbol as usize].as_deref()
    }

    /// Code of `symbol` as a string of '0'/'1', first bit first.
    pub fn code_string(&self, symbol: u8) -> Option<String> {
        self.code(symbol)
            .map(|bits| bits.iter().map(|b| if *b { '1' } else { '0' }).collect())
    }

    /// The decoder table: end token followed by 2-byte node entries.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.entries.len() + 1);
        bytes.push(self.end_token);
        bytes.extend_from_slice(&self.entries);
        bytes
    }

    /// Complete-binary-heap view of the tree: end token, then slots from
    /// index 0 where the node with code `p` of length `d` sits at
    /// `2^d + value(p)`. Leaves hold their symbol, all other slots the null
    /// token.
    pub fn heap_layout(&self) -> Result<Vec<u8>, CompilerError> {
        let mut max_index = 1;
        let mut slots = Vec::new();
        for (symbol, code) in self.codes.iter().enumerate() {
            if let Some(code) = code {
                if code.len() > MAX_HEAP_LAYOUT_DEPTH {
                    return Err(CompilerError::CodeTreeTooDeep(code.len()));
                }
                let value = code.iter().fold(0usize, |acc, bit| (acc << 1) | *bit as usize);
                let index = (1usize << code.len()) + value;
                max_index = max_index.max(index);
                slots.push((index, symbol as u8));
            }
        }

        let mut layout = vec![self.null_token; max_index + 2];
        layout[0] = self.end_token;
        for (index, symbol) in slots {
            layout[index + 1] = symbol;
        }
        Ok(layout)
    }

    /// Compress a symbol stream. The end token's code follows the message
    /// and the last byte is padded with 0 bits. Within each byte the first
    /// bit occupies the least significant position.
    pub fn encode(&self, symbols: &[u8]) -> Result<Vec<u8>, CompilerError> {
        let mut bits: BitVec<u8, Lsb0> = BitVec::new();
        for &symbol in symbols.iter().chain(std::iter::once(&self.end_token)) {
            let code = self
                .code(symbol)
                .ok_or(CompilerError::UnencodableSymbol(symbol))?;
            bits.extend_from_bitslice(code);
        }
        while bits.len() % 8 != 0 {
            bits.push(false);
        }
        Ok(bits.into_vec())
    }
}
