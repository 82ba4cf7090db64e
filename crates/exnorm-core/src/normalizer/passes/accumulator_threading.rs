// =============================================================================
// Accumulator Threading Pass
// =============================================================================

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::analysis::binders::{binds_anywhere, bound_in_node, collect_bound};
use crate::analysis::naming::{contains_token, is_underscored};
use crate::analysis::usage::any_references;
use crate::analysis::{map_statements, references, ScopeInfo, UsageIndex};
use crate::ast::{
    any_node, transform, BinaryOp, CondClause, Generator, MetaFlags, Node, NodeKind, Pattern,
};
use crate::normalizer::passes::{
    as_assignment, branch_bodies, is_conditional, map_branches, rebound_value, thread_branches,
    yield_from_branches,
};
use crate::normalizer::{
    rewrite_blocks, BlockRewrite, NormalizationPass, PassContext, TreeFeatures,
};

/// Rewrites folds whose step function tries to update an accumulator by
/// rebinding it, which the target language's scoping silently ignores.
///
/// Folds (`Enum.reduce/3`, `Enum.reduce_while/3`) go through the
/// [`ScanState`] recognizer:
///
/// - a step body that only appends one element to an accumulator starting
///   at `[]` becomes a comprehension;
/// - a step body that rebinds the accumulator inside a branch has every
///   rebinding threaded into the value the step returns;
/// - a `reduce_while` that never halts becomes a plain `reduce`.
///
/// `Enum.each` statements that rebind an outer variable are rewritten at
/// the statement level into `name = Enum.reduce(coll, name, fn x, name ->
/// ... end)`, or into a comprehension for the `acc = []` append loop.
pub struct AccumulatorThreadingPass;

impl AccumulatorThreadingPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for AccumulatorThreadingPass {
    fn name(&self) -> &'static str {
        "accumulator-threading"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_FOLDS
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        let tree = transform(tree, &mut rewrite_fold);
        rewrite_blocks(tree, self, ctx)
    }
}

// =============================================================================
// Fold recognizer
// =============================================================================

/// States of the fold recognizer. Scanning states advance until a terminal
/// state is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for the fold call and its initial accumulator
    ScanningInit,
    /// Fold found, classifying the body of its two-parameter step function
    ScanningStepBody,
    /// Every step result is a `{:cont, acc}` or `{:halt, acc}` pair
    MatchedContHalt,
    /// The step body rebinds the accumulator inside a branch
    MatchedIllegalRebind,
    /// The step body only appends one element to an empty-list accumulator
    MatchedAppend,
    NoMatch,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScanState::ScanningInit | ScanState::ScanningStepBody)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldKind {
    Reduce,
    ReduceWhile,
}

impl FoldKind {
    fn function(self) -> &'static str {
        match self {
            FoldKind::Reduce => "reduce",
            FoldKind::ReduceWhile => "reduce_while",
        }
    }
}

/// The parts of a recognized fold
struct Fold<'a> {
    kind: FoldKind,
    collection: &'a Node,
    init: &'a Node,
    item: &'a Pattern,
    acc: &'a str,
    body: &'a Node,
}

struct FoldScanner<'a> {
    node: &'a Node,
    state: ScanState,
    fold: Option<Fold<'a>>,
}

/// Run the recognizer over `node` to a terminal state
pub fn scan_fold(node: &Node) -> ScanState {
    FoldScanner::new(node).run().0
}

impl<'a> FoldScanner<'a> {
    fn new(node: &'a Node) -> Self {
        Self {
            node,
            state: ScanState::ScanningInit,
            fold: None,
        }
    }

    fn run(mut self) -> (ScanState, Option<Fold<'a>>) {
        while !self.state.is_terminal() {
            self.state = match self.state {
                ScanState::ScanningInit => self.scan_init(),
                ScanState::ScanningStepBody => self.scan_step_body(),
                terminal => terminal,
            };
            trace!(state = ?self.state, "fold scan");
        }
        (self.state, self.fold)
    }

    fn scan_init(&mut self) -> ScanState {
        if self.node.has_flag(MetaFlags::ACCUMULATOR_THREADED) {
            return ScanState::NoMatch;
        }
        let node = self.node;
        let Some(("Enum", function, [collection, init, step])) = node.as_remote_call() else {
            return ScanState::NoMatch;
        };
        let kind = match function {
            "reduce" => FoldKind::Reduce,
            "reduce_while" => FoldKind::ReduceWhile,
            _ => return ScanState::NoMatch,
        };
        let NodeKind::Fn(clauses) = &step.kind else {
            return ScanState::NoMatch;
        };
        let [clause] = clauses.as_slice() else {
            return ScanState::NoMatch;
        };
        let [item, Pattern::Var(acc)] = clause.params.as_slice() else {
            return ScanState::NoMatch;
        };
        if clause.guard.is_some() || collect_bound(item).contains(acc.as_str()) {
            return ScanState::NoMatch;
        }
        self.fold = Some(Fold {
            kind,
            collection,
            init,
            item,
            acc,
            body: &clause.body,
        });
        ScanState::ScanningStepBody
    }

    fn scan_step_body(&self) -> ScanState {
        let Some(fold) = &self.fold else {
            return ScanState::NoMatch;
        };
        // The comprehension is strictly simpler, so it wins over threading.
        if fold.appended().is_some() {
            ScanState::MatchedAppend
        } else if fold.illegal_rebinds().is_some() {
            ScanState::MatchedIllegalRebind
        } else if fold.kind == FoldKind::ReduceWhile && fold.has_pair_tails() {
            ScanState::MatchedContHalt
        } else {
            ScanState::NoMatch
        }
    }
}

impl<'a> Fold<'a> {
    /// Element appended by an `acc ++ [e]` step (`{:cont, acc ++ [e]}` for
    /// `reduce_while`) over an accumulator starting at `[]`
    fn appended(&self) -> Option<&'a Node> {
        if !is_empty_list(self.init) || !self.item.is_irrefutable() {
            return None;
        }
        let [stmt] = self.body.statements() else {
            return None;
        };
        let value = match self.kind {
            FoldKind::Reduce => stmt,
            FoldKind::ReduceWhile => tagged_payload(stmt, "cont")?,
        };
        appended_element(value, self.acc).filter(|element| !references(element, self.acc))
    }

    fn illegal_rebinds(&self) -> Option<Vec<usize>> {
        rebind_sites(self.body.statements(), self.acc).filter(|sites| !sites.is_empty())
    }

    fn has_pair_tails(&self) -> bool {
        let mut tails = Vec::new();
        collect_tails(self.body, &mut tails)
            && tails.iter().all(|tail| {
                tagged_payload(tail, "cont").is_some() || tagged_payload(tail, "halt").is_some()
            })
    }

    fn rebuild(&self, kind: FoldKind, body: Node) -> Node {
        let step = Node::lambda(vec![self.item.clone(), Pattern::var(self.acc)], body);
        Node::remote(
            "Enum",
            kind.function(),
            vec![self.collection.clone(), self.init.clone(), step],
        )
    }

    fn to_comprehension(&self) -> Option<Node> {
        let element = self.appended()?;
        Some(comprehension(
            self.item.clone(),
            self.collection.clone(),
            element.clone(),
        ))
    }

    /// `reduce_while` that can never halt is a `reduce`
    fn without_cont_tags(&self) -> Option<Node> {
        if mentions_halt(self.body) {
            return None;
        }
        let body = map_tails(self.body.clone(), &mut untag_cont);
        Some(self.rebuild(FoldKind::Reduce, body))
    }

    /// Wrapper producing this fold's step result from an accumulator value,
    /// when `tail` returns the bare accumulator
    fn tail_wrapper(&self, tail: &Node) -> Option<Box<dyn Fn(Node) -> Node>> {
        match self.kind {
            FoldKind::Reduce => tail
                .is_var(self.acc)
                .then(|| Box::new(|value: Node| value) as Box<dyn Fn(Node) -> Node>),
            FoldKind::ReduceWhile => {
                let tag = accumulator_tag(tail, self.acc)?.to_string();
                Some(Box::new(move |value: Node| Node::tagged(tag.clone(), value)))
            }
        }
    }

    fn thread_rebinds(&self) -> Option<Node> {
        let stmts = self.body.statements();
        let sites = self.illegal_rebinds()?;
        let n = stmts.len();

        let mut out = Vec::with_capacity(n);
        for (i, stmt) in stmts.iter().enumerate() {
            if !sites.contains(&i) {
                out.push(stmt.clone());
                continue;
            }
            if i + 2 == n {
                if let Some(wrap) = self.tail_wrapper(&stmts[n - 1]) {
                    out.push(thread_branches(stmt.clone(), self.acc, wrap.as_ref()));
                    break;
                }
            }
            out.push(hoist(stmt.clone(), self.acc));
        }
        debug!(acc = self.acc, fold = self.kind.function(), "threaded accumulator rebinds");
        let body = Node::from_statements(out, self.body.span);
        Some(self.rebuild(self.kind, body))
    }
}

fn rewrite_fold(node: Node) -> Node {
    let (state, fold) = FoldScanner::new(&node).run();
    let rewritten = match (state, fold) {
        (ScanState::MatchedAppend, Some(fold)) => fold.to_comprehension(),
        (ScanState::MatchedIllegalRebind, Some(fold)) => fold.thread_rebinds(),
        (ScanState::MatchedContHalt, Some(fold)) => fold.without_cont_tags(),
        _ => None,
    };
    match rewritten {
        Some(mut new) => {
            debug!(state = ?state, "rewrote fold");
            new.meta = node.meta.with(MetaFlags::ACCUMULATOR_THREADED);
            new.span = node.span;
            new
        }
        None => node,
    }
}

// =============================================================================
// Shape helpers
// =============================================================================

fn is_empty_list(node: &Node) -> bool {
    matches!(&node.kind, NodeKind::List(items) if items.is_empty())
}

/// Payload of `{:tag, payload}`
fn tagged_payload<'n>(node: &'n Node, tag: &str) -> Option<&'n Node> {
    match &node.kind {
        NodeKind::Tuple(items) => match items.as_slice() {
            [head, payload] if head.as_atom() == Some(tag) => Some(payload),
            _ => None,
        },
        _ => None,
    }
}

/// Tag of `{:tag, acc}`
fn accumulator_tag<'n>(node: &'n Node, acc: &str) -> Option<&'n str> {
    match &node.kind {
        NodeKind::Tuple(items) => match items.as_slice() {
            [head, payload] if payload.is_var(acc) => head.as_atom(),
            _ => None,
        },
        _ => None,
    }
}

/// `e` in `acc ++ [e]`
fn appended_element<'n>(value: &'n Node, acc: &str) -> Option<&'n Node> {
    match &value.kind {
        NodeKind::Binary(BinaryOp::ListConcat, left, right) if left.is_var(acc) => {
            match &right.kind {
                NodeKind::List(items) if items.len() == 1 => items.first(),
                _ => None,
            }
        }
        _ => None,
    }
}

fn mentions_halt(body: &Node) -> bool {
    any_node(body, &mut |n| match &n.kind {
        NodeKind::Raw(text) => contains_token(text, "halt"),
        _ => n.as_atom() == Some("halt"),
    })
}

fn comprehension(item: Pattern, source: Node, body: Node) -> Node {
    Node::new(NodeKind::For {
        generators: vec![Generator {
            pattern: item,
            source,
        }],
        filters: Vec::new(),
        into: None,
        body: Box::new(body),
    })
}

fn untag_cont(node: Node) -> Node {
    match node.kind {
        NodeKind::Tuple(mut items)
            if items.len() == 2 && items.first().and_then(Node::as_atom) == Some("cont") =>
        {
            items.pop().unwrap_or_else(Node::nil)
        }
        kind => Node { kind, ..node },
    }
}

/// Result positions of a body. Returns false when some path ends without
/// an explicit value (an `if` without `else`, an empty body).
fn collect_tails<'n>(body: &'n Node, out: &mut Vec<&'n Node>) -> bool {
    let Some(last) = body.statements().last() else {
        return false;
    };
    match &last.kind {
        NodeKind::If {
            then_branch,
            else_branch,
            ..
        }
        | NodeKind::Unless {
            then_branch,
            else_branch,
            ..
        } => match else_branch {
            Some(else_branch) => collect_tails(then_branch, out) && collect_tails(else_branch, out),
            None => false,
        },
        NodeKind::Case { clauses, .. } => clauses.iter().all(|c| collect_tails(&c.body, out)),
        NodeKind::Cond(clauses) => clauses.iter().all(|c| collect_tails(&c.body, out)),
        _ => {
            out.push(last);
            true
        }
    }
}

/// Rewrite every result position of `node` with `g`
fn map_tails(node: Node, g: &mut dyn FnMut(Node) -> Node) -> Node {
    if matches!(node.kind, NodeKind::Block(_)) {
        return map_statements(node, |stmts| map_last(stmts, &mut *g));
    }
    if is_conditional(&node) {
        return map_branches(node, &mut |stmts| map_last(stmts, &mut *g));
    }
    let Node { kind, meta, span } = node;
    match kind {
        NodeKind::Cond(clauses) => {
            let clauses = clauses
                .into_iter()
                .map(|c| CondClause {
                    body: map_statements(c.body, |stmts| map_last(stmts, &mut *g)),
                    condition: c.condition,
                })
                .collect();
            Node {
                kind: NodeKind::Cond(clauses),
                meta,
                span,
            }
        }
        kind => g(Node { kind, meta, span }),
    }
}

fn map_last(mut stmts: Vec<Node>, g: &mut dyn FnMut(Node) -> Node) -> Vec<Node> {
    if let Some(last) = stmts.pop() {
        stmts.push(map_tails(last, g));
    }
    stmts
}

// =============================================================================
// Rebind analysis
// =============================================================================

/// Whether every binding of `name` in `stmt` is the statement's own
/// top-level match
fn rebinds_only_at_top(stmt: &Node, name: &str) -> bool {
    if !binds_anywhere(stmt, name) {
        return true;
    }
    match &stmt.kind {
        NodeKind::Match(pattern, value) => {
            collect_bound(pattern).contains(name) && !binds_anywhere(value, name)
        }
        _ => false,
    }
}

/// Whether some branch of `conditional` rebinds `name` at its top level.
/// `None` when a rebinding sits anywhere that cannot be threaded (a clause
/// pattern, a nested construct).
fn branch_rebinds(conditional: &Node, name: &str) -> Option<bool> {
    let head_clean = match &conditional.kind {
        NodeKind::If { condition, .. } | NodeKind::Unless { condition, .. } => {
            !binds_anywhere(condition, name)
        }
        NodeKind::Case { subject, clauses } => {
            !binds_anywhere(subject, name)
                && clauses.iter().all(|c| {
                    !collect_bound(&c.pattern).contains(name)
                        && c.guard.as_ref().map_or(true, |g| !binds_anywhere(g, name))
                })
        }
        _ => false,
    };
    if !head_clean {
        return None;
    }
    let mut rebinds = false;
    for body in branch_bodies(conditional)?.into_iter().flatten() {
        for stmt in body.statements() {
            if !rebinds_only_at_top(stmt, name) {
                return None;
            }
            rebinds |= bound_in_node(stmt).contains(name);
        }
    }
    Some(rebinds)
}

/// Non-final conditional statements whose branch rebinding of `name` is
/// read afterwards. `None` when `name` is rebound anywhere that cannot be
/// threaded.
fn rebind_sites(stmts: &[Node], name: &str) -> Option<Vec<usize>> {
    let mut sites = Vec::new();
    for (i, stmt) in stmts.iter().enumerate() {
        if is_conditional(stmt) {
            let rebinds = branch_rebinds(stmt, name)?;
            if rebinds && i + 1 < stmts.len() && any_references(&stmts[i + 1..], name) {
                sites.push(i);
            }
        } else if !rebinds_only_at_top(stmt, name) {
            return None;
        }
    }
    Some(sites)
}

/// `name = <conditional yielding name from every branch>`
fn hoist(conditional: Node, name: &str) -> Node {
    let span = conditional.span;
    Node::matching(Pattern::var(name), yield_from_branches(conditional, name)).with_span(span)
}

// =============================================================================
// Enum.each statements
// =============================================================================

struct EachLoop<'a> {
    collection: &'a Node,
    item: &'a Pattern,
    body: &'a Node,
}

fn each_loop(stmt: &Node) -> Option<EachLoop<'_>> {
    if stmt.has_flag(MetaFlags::ACCUMULATOR_THREADED) {
        return None;
    }
    let ("Enum", "each", [collection, step]) = stmt.as_remote_call()? else {
        return None;
    };
    let NodeKind::Fn(clauses) = &step.kind else {
        return None;
    };
    let [clause] = clauses.as_slice() else {
        return None;
    };
    let [item] = clause.params.as_slice() else {
        return None;
    };
    clause.guard.is_none().then_some(EachLoop {
        collection,
        item,
        body: &clause.body,
    })
}

/// `acc = []` followed by `Enum.each(coll, fn x -> acc = acc ++ [e] end)`:
/// the accumulator name and the equivalent comprehension
fn append_loop(init: &Node, each: &Node) -> Option<(String, Node)> {
    let (name, value) = as_assignment(init)?;
    if !is_empty_list(value) || is_underscored(name) {
        return None;
    }
    let each_loop = each_loop(each)?;
    if !each_loop.item.is_irrefutable()
        || collect_bound(each_loop.item).contains(name)
        || references(each_loop.collection, name)
    {
        return None;
    }
    let [stmt] = each_loop.body.statements() else {
        return None;
    };
    let element = appended_element(rebound_value(stmt, name)?, name)?;
    if references(element, name) {
        return None;
    }
    let result = comprehension(
        each_loop.item.clone(),
        each_loop.collection.clone(),
        element.clone(),
    )
    .with_span(each.span)
    .with_flag(MetaFlags::ACCUMULATOR_THREADED);
    Some((name.to_string(), result))
}

/// The single outer variable an `Enum.each` body rebinds, when it was bound
/// before the loop and is read after it
fn outer_accumulator(
    each: &EachLoop<'_>,
    at: usize,
    index: &UsageIndex,
    scope: &ScopeInfo,
) -> Option<String> {
    let item_bound = collect_bound(each.item);
    let mut rebound: IndexSet<String> = IndexSet::new();
    for stmt in each.body.statements() {
        rebound.extend(bound_in_node(stmt));
        if is_conditional(stmt) {
            for body in branch_bodies(stmt).into_iter().flatten().flatten() {
                for inner in body.statements() {
                    rebound.extend(bound_in_node(inner));
                }
            }
        }
    }
    let mut outer = rebound.into_iter().filter(|name| {
        !item_bound.contains(name)
            && !is_underscored(name)
            && (index.bound_before(at, name) || scope.bound_by_owner.contains(name))
            && index.used_later(at + 1, name)
    });
    let name = outer.next()?;
    if outer.next().is_some() {
        debug!("Enum.each rebinds several outer variables, left alone");
        return None;
    }
    Some(name)
}

/// `Enum.each(coll, fn x -> ... name = e ... end)` with `name` read later
/// becomes `name = Enum.reduce(coll, name, fn x, name -> ... e end)`.
fn thread_each(stmt: &Node, at: usize, index: &UsageIndex, scope: &ScopeInfo) -> Option<Node> {
    let each = each_loop(stmt)?;
    let name = outer_accumulator(&each, at, index, scope)?;
    let body_stmts = each.body.statements();
    let sites = rebind_sites(body_stmts, &name)?;

    let mut body: Vec<Node> = body_stmts
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if sites.contains(&i) {
                hoist(s.clone(), &name)
            } else {
                s.clone()
            }
        })
        .collect();
    let final_stmt = body.pop()?;
    let rebound = rebound_value(&final_stmt, &name).cloned();
    match rebound {
        Some(value) => body.push(value),
        None if is_conditional(&final_stmt) && branch_rebinds(&final_stmt, &name) == Some(true) => {
            body.push(yield_from_branches(final_stmt, &name))
        }
        None => {
            body.push(final_stmt);
            body.push(Node::var(name.as_str()));
        }
    }

    debug!(acc = %name, "threaded Enum.each into Enum.reduce");
    let step = Node::lambda(
        vec![each.item.clone(), Pattern::var(name.as_str())],
        Node::from_statements(body, each.body.span),
    );
    let reduce = Node::remote(
        "Enum",
        "reduce",
        vec![each.collection.clone(), Node::var(name.as_str()), step],
    )
    .with_span(stmt.span)
    .with_flag(MetaFlags::ACCUMULATOR_THREADED);
    Some(Node::matching(Pattern::var(name), reduce).with_span(stmt.span))
}

impl BlockRewrite for AccumulatorThreadingPass {
    fn rewrite_block(
        &self,
        scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !stmts.iter().any(|s| each_loop(s).is_some()) {
            return stmts;
        }
        let index = UsageIndex::build(&stmts);
        let last = stmts.len() - 1;
        let mut out = Vec::with_capacity(stmts.len());
        let mut i = 0;
        while i < stmts.len() {
            if i < last {
                if let Some((name, result)) = append_loop(&stmts[i], &stmts[i + 1]) {
                    debug!(acc = %name, "append loop rewritten to comprehension");
                    if i + 2 == last && stmts[last].is_var(&name) {
                        out.push(result);
                        i += 3;
                    } else {
                        let span = stmts[i].span;
                        out.push(Node::matching(Pattern::var(name), result).with_span(span));
                        i += 2;
                    }
                    continue;
                }
            }
            let stmt = &stmts[i];
            out.push(thread_each(stmt, i, &index, scope).unwrap_or_else(|| stmt.clone()));
            i += 1;
        }
        out
    }
}
