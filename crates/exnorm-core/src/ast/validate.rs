//! Structural validation run by the driver between passes.
//!
//! A failure here means a pass (or the upstream builder) produced a tree the
//! printer cannot serialize. It is a defect in the pipeline, never a
//! property of the program being compiled.

use super::node::{Node, NodeKind};
use super::visit::walk;

/// Check every node of `tree`, returning the first defect found.
pub fn validate(tree: &Node) -> Result<(), String> {
    let mut defect: Option<String> = None;
    walk(tree, &mut |node| {
        if defect.is_none() {
            defect = check_node(node).err().map(|msg| format!("{} at {}", msg, node.span));
        }
    });
    match defect {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

fn check_node(node: &Node) -> Result<(), String> {
    match &node.kind {
        NodeKind::Var(name) if name.is_empty() => Err("variable with empty name".into()),
        NodeKind::Case { clauses, .. } if clauses.is_empty() => Err("case without clauses".into()),
        NodeKind::Cond(clauses) if clauses.is_empty() => Err("cond without clauses".into()),
        NodeKind::Receive { clauses, after } if clauses.is_empty() && after.is_none() => {
            Err("receive without clauses or after".into())
        }
        NodeKind::With { clauses, .. } if clauses.is_empty() => Err("with without clauses".into()),
        NodeKind::For { generators, .. } if generators.is_empty() => {
            Err("comprehension without generators".into())
        }
        NodeKind::Fn(clauses) => {
            let Some(first) = clauses.first() else {
                return Err("fn without clauses".into());
            };
            let arity = first.params.len();
            if clauses.iter().any(|c| c.params.len() != arity) {
                return Err(format!("fn clauses disagree on arity (expected {})", arity));
            }
            Ok(())
        }
        NodeKind::Def(def) if def.name.is_empty() => Err("def with empty name".into()),
        NodeKind::Module { name, .. } if name.is_empty() => Err("module with empty name".into()),
        NodeKind::Call { name, .. } if name.is_empty() => Err("call with empty name".into()),
        NodeKind::CaptureArg(0) => Err("capture argument &0 (arguments are 1-based)".into()),
        _ => Ok(()),
    }
}
