//! Access to quantized DCT coefficient blocks
//!
//! A JPEG codec exposes its coefficients one block row at a time per colour
//! component. [`BlockAccess`] is that interface; every scrambling stage is
//! written against it. [`CoefficientImage`] is the in-memory implementation.

use crate::error::{CryptoError, Result};

/// Coefficients per 8×8 block
pub const DCTSIZE2: usize = 64;

/// One 8×8 block: index 0 is DC, 1..63 are AC
pub type Block = [i16; DCTSIZE2];

/// Row-oriented access to the blocks of each colour component.
///
/// A row borrowed from one call must be released before the next row is
/// requested; the borrow checker enforces this for `row_mut`.
pub trait BlockAccess {
    fn num_components(&self) -> usize;

    /// `(width_in_blocks, height_in_blocks)` of a component
    fn dimensions(&self, component: usize) -> (usize, usize);

    fn row(&self, component: usize, y: usize) -> &[Block];

    fn row_mut(&mut self, component: usize, y: usize) -> &mut [Block];

    fn block_count(&self, component: usize) -> usize {
        let (width, height) = self.dimensions(component);
        width * height
    }
}

/// One colour plane's block grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    width_in_blocks: usize,
    height_in_blocks: usize,
    blocks: Vec<Block>,
}

impl Component {
    /// All-zero component
    pub fn new(width_in_blocks: usize, height_in_blocks: usize) -> Self {
        Self {
            width_in_blocks,
            height_in_blocks,
            blocks: vec![[0; DCTSIZE2]; width_in_blocks * height_in_blocks],
        }
    }

    /// Blocks in raster order
    pub fn from_blocks(
        width_in_blocks: usize,
        height_in_blocks: usize,
        blocks: Vec<Block>,
    ) -> Result<Self> {
        if blocks.len() != width_in_blocks * height_in_blocks {
            return Err(CryptoError::DimensionMismatch(format!(
                "{} blocks for a {}x{} grid",
                blocks.len(),
                width_in_blocks,
                height_in_blocks
            )));
        }
        Ok(Self {
            width_in_blocks,
            height_in_blocks,
            blocks,
        })
    }

    pub fn width_in_blocks(&self) -> usize {
        self.width_in_blocks
    }

    pub fn height_in_blocks(&self) -> usize {
        self.height_in_blocks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, x: usize, y: usize) -> &Block {
        &self.blocks[y * self.width_in_blocks + x]
    }

    pub fn block_mut(&mut self, x: usize, y: usize) -> &mut Block {
        &mut self.blocks[y * self.width_in_blocks + x]
    }

    /// DC coefficients in raster order
    pub fn dc_values(&self) -> Vec<i16> {
        self.blocks.iter().map(|b| b[0]).collect()
    }
}

/// Decoded coefficient arrays of a whole image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoefficientImage {
    components: Vec<Component>,
}

impl CoefficientImage {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, index: usize) -> &Component {
        &self.components[index]
    }

    pub fn component_mut(&mut self, index: usize) -> &mut Component {
        &mut self.components[index]
    }
}

impl BlockAccess for CoefficientImage {
    fn num_components(&self) -> usize {
        self.components.len()
    }

    fn dimensions(&self, component: usize) -> (usize, usize) {
        let c = &self.components[component];
        (c.width_in_blocks, c.height_in_blocks)
    }

    fn row(&self, component: usize, y: usize) -> &[Block] {
        let c = &self.components[component];
        let start = y * c.width_in_blocks;
        &c.blocks[start..start + c.width_in_blocks]
    }

    fn row_mut(&mut self, component: usize, y: usize) -> &mut [Block] {
        let c = &mut self.components[component];
        let start = y * c.width_in_blocks;
        &mut c.blocks[start..start + c.width_in_blocks]
    }
}

/// Copy column `x` of a component, reading one row at a time.
pub(crate) fn read_column<S: BlockAccess + ?Sized>(
    store: &S,
    component: usize,
    x: usize,
    out: &mut Vec<Block>,
) {
    let (_, height) = store.dimensions(component);
    out.clear();
    out.extend((0..height).map(|y| store.row(component, y)[x]));
}

/// Write column `x` back, one row at a time.
pub(crate) fn write_column<S: BlockAccess + ?Sized>(
    store: &mut S,
    component: usize,
    x: usize,
    column: &[Block],
) {
    for (y, block) in column.iter().enumerate() {
        store.row_mut(component, y)[x] = *block;
    }
}
