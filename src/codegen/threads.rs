//! Thread-count planning.

use crate::analysis::access::{dimensionality, literal_trip_count, Dimensionality};
use crate::frontend::LoopBlock;
use serde::{Deserialize, Serialize};

/// Hard ceiling on threads regardless of processor count.
pub const MAX_THREADS: usize = 16;

/// OpenMP loop schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// `schedule(static)`
    Static,
    /// `schedule(dynamic)`
    Dynamic,
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Static => write!(f, "static"),
            Schedule::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Thread count and schedule for one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPlan {
    /// Threads to request
    pub thread_count: usize,
    /// OpenMP schedule kind
    pub schedule: Schedule,
}

impl ThreadPlan {
    /// The same plan with a dynamic schedule.
    pub fn balanced(self) -> Self {
        Self {
            schedule: Schedule::Dynamic,
            ..self
        }
    }
}

/// Iteration estimate used when the bounds are not literal.
pub fn estimated_iterations(class: u8, block: &LoopBlock) -> i64 {
    literal_trip_count(block).unwrap_or(match class {
        c if c >= 4 => 10_000,
        3 => 1_000,
        _ => 100,
    })
}

/// Pick a thread count for `block` from its complexity class.
pub fn choose_thread_plan(class: u8, processor_count: usize, block: &LoopBlock) -> ThreadPlan {
    let base = processor_count.clamp(1, MAX_THREADS);

    let mut threads = match class {
        c if c >= 4 => base,
        3 => (base * 3 / 4).max(2),
        _ => (base / 2).max(2),
    };

    threads = match dimensionality(block) {
        Dimensionality::ThreeD | Dimensionality::ND(_) => (threads * 2 / 3).max(2),
        Dimensionality::TwoD => (threads * 3 / 4).max(2),
        _ => threads,
    };

    let iterations = estimated_iterations(class, block);
    if iterations < 100 {
        threads = threads.min(4);
    } else if iterations < 1_000 {
        threads = threads.min(8);
    }

    ThreadPlan {
        thread_count: threads.clamp(1, base),
        schedule: Schedule::Static,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(src: &str) -> LoopBlock {
        LoopBlock::from_text(src).unwrap()
    }

    #[test]
    fn test_class_scaling() {
        let b = block("for (int i = 0; i < n; i++) a[i] = 0;");
        // class 4 estimates 10000 iterations: no cap
        assert_eq!(choose_thread_plan(4, 16, &b).thread_count, 16);
        // class 3 estimates 1000: no cap
        assert_eq!(choose_thread_plan(3, 16, &b).thread_count, 12);
        // class 1 estimates 100: capped at 8
        assert_eq!(choose_thread_plan(1, 16, &b).thread_count, 8);
        assert_eq!(choose_thread_plan(1, 64, &b).thread_count, 8);
    }

    #[test]
    fn test_dimensionality_scaling() {
        let b2 = block("for (int i = 0; i < n; i++) for (int j = 0; j < n; j++) a[i][j] = 0;");
        assert_eq!(choose_thread_plan(5, 16, &b2).thread_count, 12);
        let b3 = block("for (int i = 0; i < n; i++) t[i][i][i] = 0;");
        assert_eq!(choose_thread_plan(5, 16, &b3).thread_count, 10);
    }

    #[test]
    fn test_small_trip_count() {
        let b = block("for (int i = 0; i < 50; i++) a[i] = 0;");
        assert_eq!(choose_thread_plan(5, 16, &b).thread_count, 4);
        let b = block("for (int i = 0; i < 500; i++) a[i] = 0;");
        assert_eq!(choose_thread_plan(5, 16, &b).thread_count, 8);
    }

    #[test]
    fn test_never_exceeds_processors() {
        let b = block("for (int i = 0; i < n; i++) a[i] = 0;");
        assert_eq!(choose_thread_plan(1, 1, &b).thread_count, 1);
        assert_eq!(choose_thread_plan(1, 0, &b).thread_count, 1);
        assert_eq!(choose_thread_plan(2, 3, &b).thread_count, 2);
    }

    #[test]
    fn test_schedule() {
        let plan = choose_thread_plan(4, 8, &block("for (i = 0; i < n; i++) a[i] = 0;"));
        assert_eq!(plan.schedule, Schedule::Static);
        assert_eq!(plan.balanced().schedule, Schedule::Dynamic);
        assert_eq!(Schedule::Dynamic.to_string(), "dynamic");
    }
}
