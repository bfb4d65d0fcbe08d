//! Analysis passes over extracted loop blocks.
//!
//! Every pass is a pure function of the block text. Nothing here changes
//! source; the passes feed the code generator and the thread planner.

pub mod access;
pub mod complexity;
pub mod dependence;
pub mod variables;

pub use access::{dimensionality, has_io, literal_trip_count, loop_index_names, Dimensionality};
pub use complexity::{score, ComplexityScore};
pub use dependence::{analyze_dependencies, DependencyVerdict, Hazard};
pub use variables::{classify, ReductionOp, VariableClassification};

use crate::frontend::LoopBlock;

/// Dependence screening with the block's own loop indices.
pub fn screen(block: &LoopBlock) -> DependencyVerdict {
    analyze_dependencies(block, &loop_index_names(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_elementwise() {
        let block = LoopBlock::from_text("for (int i = 0; i < n; i++) { c[i] = a[i] + b[i]; }").unwrap();
        let vars = classify(&block);
        assert_eq!(vars.private.iter().collect::<Vec<_>>(), vec!["i"]);
        assert_eq!(vars.shared.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(screen(&block).is_safe());
        assert_eq!(dimensionality(&block), Dimensionality::OneD);
    }

    #[test]
    fn test_scenario_recurrence() {
        let block = LoopBlock::from_text("for (int i = 1; i < n; i++) { a[i] = a[i-1] + 1; }").unwrap();
        assert_eq!(screen(&block).conflict_line(), Some(1));
    }
}
