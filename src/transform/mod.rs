//! Source-to-source loop transformations.
//!
//! Both transformations are total: a loop they cannot handle comes back as
//! its original text, so callers detect "not applied" by text equality.

pub mod normalize;
pub mod tiling;

pub use normalize::{normalize, Normalizer};
pub use tiling::{tile, TilePlan, Tiling};

use crate::frontend::LoopBlock;

/// A text-to-text rewrite of one loop block.
pub trait LoopTransform {
    /// Apply the transformation.
    fn apply(&self, block: &LoopBlock) -> String;

    /// Get transformation name.
    fn name(&self) -> &str;

    /// Whether the transformation changes `block`.
    fn applies_to(&self, block: &LoopBlock) -> bool {
        self.apply(block) != block.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_after_normalize() {
        let block = LoopBlock::from_text("for (int i = 4; i < n; i++) a[i] = 0;").unwrap();
        let normalized = LoopBlock::from_text(&Normalizer.apply(&block)).unwrap();
        let tiled = Tiling::new(8).apply(&normalized);
        assert!(tiled.starts_with("for (int i_norm_tile = 0; i_norm_tile < n - 4; i_norm_tile += 8) {"));
        assert!(tiled.contains("a[(4 + i_norm)] = 0;"));
    }

    #[test]
    fn test_applies_to() {
        let block = LoopBlock::from_text("for (int i = 0; i < n; i++) a[i] = 0;").unwrap();
        assert!(!Normalizer.applies_to(&block));
        assert!(Tiling::new(16).applies_to(&block));
    }
}
