// =============================================================================
// Block Flattening Pass
// =============================================================================

use crate::ast::{transform, Node, NodeKind};
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};

/// Splices nested blocks in statement position into their parent, unwraps
/// one-statement blocks and replaces empty blocks with `nil`.
///
/// Blocks introduce no scope in the target language, so splicing never
/// changes which bindings a later statement sees.
pub struct BlockFlatteningPass;

impl BlockFlatteningPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for BlockFlatteningPass {
    fn name(&self) -> &'static str {
        "block-flattening"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_BLOCKS
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        transform(tree, &mut flatten)
    }
}

fn flatten(node: Node) -> Node {
    let Node { kind, meta, span } = node;
    match kind {
        NodeKind::Block(stmts) => {
            let mut flat = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                match stmt.kind {
                    NodeKind::Block(inner) => flat.extend(inner),
                    kind => flat.push(Node { kind, ..stmt }),
                }
            }
            match flat.len() {
                0 => Node::nil().with_span(span),
                1 => flat.pop().unwrap_or_else(Node::nil),
                _ => Node {
                    kind: NodeKind::Block(flat),
                    meta,
                    span,
                },
            }
        }
        kind => Node { kind, meta, span },
    }
}
