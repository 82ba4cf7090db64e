//! Tree model for generated target-language code.

pub mod metadata;
pub mod node;
pub mod pattern;
pub mod transform;
pub mod validate;
pub mod visit;

pub use metadata::{MetaFlags, Metadata};
pub use node::{
    BinaryOp, CaseClause, CondClause, DefKind, FnClause, FunctionDef, Generator, Literal, Node,
    NodeKind, ReceiveAfter, RescueClause, UnaryOp, WithClause,
};
pub use pattern::Pattern;
pub use transform::transform;
pub use validate::validate;
pub use visit::{any_node, walk, walk_patterns};
