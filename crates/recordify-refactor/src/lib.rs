//! Class-to-record conversion for Java sources.
//!
//! Each top-level class, and each static member class, goes through four
//! stages:
//! - classification decides whether it can become a record (`classify`)
//! - member partitioning splits what the record provides implicitly from
//!   what is kept verbatim (`partition`)
//! - declaration rewriting assembles the record node (`rewrite`)
//! - trivia preservation moves comments onto the new tree (`preserve_trivia`)
//!
//! [`convert_unit`] runs them over a parsed tree, [`convert_source`] over text
//! and [`convert_files`] over many files in parallel.

mod batch;
mod class;
mod classify;
mod error;
mod partition;
mod pipeline;
mod preview;
mod rewrite;
mod trivia;

pub use batch::{convert_files, summarize, BatchSummary, FileConversion, FileInput};
pub use class::{resolve_class, ClassView, Member};
pub use classify::{
    classify, classify_class, classify_with_diagnostics, is_eligible, Classification, Component,
    Eligible, IneligibleReason,
};
pub use error::{Diagnostic, StructuralAssumptionViolation};
pub use partition::{partition, Disposition, ElideReason, Partition};
pub use pipeline::{
    convert_class, convert_source, convert_unit, ClassOutcome, ClassReport, SourceConversion,
    UnitConversion,
};
pub use preview::{
    preview_file, relative_path, unified_diff, FilePreview, DEFAULT_CONTEXT_RADIUS,
};
pub use rewrite::rewrite;
pub use trivia::preserve_trivia;
