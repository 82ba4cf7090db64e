//! Scope and usage analyses shared by the normalization passes.

pub mod binders;
pub mod interpolation;
pub mod naming;
pub mod scope;
pub mod usage;

pub use binders::{
    bound_in_node, classify, collect_bound, collect_bound_params, rename_all, rename_clause,
    rename_consistently, rename_reads, PatternShape,
};
pub use scope::{map_scope_bodies, map_statements, OwnerKind, ScopeInfo};
pub use usage::{collect_reads, reads, references, ReadSet, UsageIndex};
