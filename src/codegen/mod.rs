//! Code generation: OpenMP directives and thread planning.

pub mod openmp;
pub mod threads;

pub use openmp::{
    annotate, balance, directive, rewrite_break_return, Annotation, NonParallelReason,
    NOT_PARALLELIZABLE,
};
pub use threads::{choose_thread_plan, estimated_iterations, Schedule, ThreadPlan};
