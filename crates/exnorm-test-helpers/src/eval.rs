//! Reference evaluator for a small, side-effect-free subset of the tree
//!
//! Used to check that rewrites preserve results. Two scoping disciplines
//! are available:
//!
//! - [`Scoping::Strict`] follows the target language: bindings made inside a
//!   branch, clause or closure body never escape it, and closures capture
//!   the environment at creation.
//! - [`Scoping::Leaky`] models what the upstream lowering meant when it
//!   emitted a rebinding: assigning a name that already exists updates that
//!   variable wherever it lives, even from inside a closure or branch.
//!
//! A tree that needs rewriting gives different results under the two
//! disciplines; after normalization the strict result must match the leaky
//! result of the input.
//!
//! Local calls are treated as opaque effects: their arguments are evaluated
//! and the call yields `:ok`.

use std::fmt;
use std::rc::Rc;

use exnorm_core::ast::{BinaryOp, FnClause, Literal, Node, NodeKind, Pattern, UnaryOp};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoping {
    Strict,
    Leaky,
}

pub struct Closure {
    clauses: Vec<FnClause>,
    /// Environment snapshot, taken under strict scoping only
    captured: Option<FxHashMap<String, Value>>,
}

#[derive(Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Atom(String),
    Str(String),
    Nil,
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn atom(name: &str) -> Self {
        Value::Atom(name.to_string())
    }

    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Value::List(values.into_iter().map(Value::Int).collect())
    }

    fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Atom(a), Value::Atom(b)) | (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Atom(a) => write!(f, ":{}", a),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Nil => write!(f, "nil"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Tuple(items) => {
                let mut t = f.debug_tuple("");
                for item in items {
                    t.field(item);
                }
                t.finish()
            }
            Value::Closure(_) => write!(f, "#Function<>"),
        }
    }
}

type Frame = FxHashMap<String, Value>;

pub struct Evaluator {
    scoping: Scoping,
    frames: Vec<Frame>,
}

impl Evaluator {
    pub fn new(scoping: Scoping) -> Self {
        Self {
            scoping,
            frames: vec![Frame::default()],
        }
    }

    /// Pre-bind a variable in the outermost frame
    pub fn with_binding(mut self, name: &str, value: Value) -> Self {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name.to_string(), value);
        }
        self
    }

    /// Call a `def` node with `args` bound to its parameters
    pub fn call_def(&mut self, def: &Node, args: Vec<Value>) -> Result<Value, String> {
        let NodeKind::Def(def) = &def.kind else {
            return Err("expected a def".to_string());
        };
        let clause = FnClause {
            params: def.params.clone(),
            guard: def.guard.as_deref().cloned(),
            body: (*def.body).clone(),
        };
        let closure = Closure {
            clauses: vec![clause],
            captured: Some(Frame::default()),
        };
        // A def never sees its caller's variables, whatever the scoping.
        let saved = std::mem::replace(&mut self.frames, vec![Frame::default()]);
        let result = self.call_clauses(&closure, args);
        self.frames = saved;
        result
    }

    fn lookup(&self, name: &str) -> Result<Value, String> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
            .ok_or_else(|| format!("unbound variable {}", name))
    }

    /// Bind as an assignment statement does
    fn assign(&mut self, name: String, value: Value) {
        let index = match self.scoping {
            Scoping::Strict => None,
            Scoping::Leaky => self.frames.iter().rposition(|f| f.contains_key(&name)),
        };
        let index = index.unwrap_or(self.frames.len() - 1);
        self.frames[index].insert(name, value);
    }

    /// Bind in the innermost frame, shadowing
    fn bind_local(&mut self, bindings: Vec<(String, Value)>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.extend(bindings);
        }
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        self.frames.push(Frame::default());
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Evaluate a body: the value of its last statement
    pub fn eval(&mut self, node: &Node) -> Result<Value, String> {
        match &node.kind {
            NodeKind::Block(stmts) => {
                let mut last = Value::Nil;
                for stmt in stmts {
                    last = self.eval(stmt)?;
                }
                Ok(last)
            }
            NodeKind::Literal(lit) => literal_value(lit),
            NodeKind::Var(name) => self.lookup(name),
            NodeKind::List(items) => Ok(Value::List(self.eval_all(items)?)),
            NodeKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            NodeKind::Cons(head, tail) => {
                let head = self.eval(head)?;
                match self.eval(tail)? {
                    Value::List(mut items) => {
                        items.insert(0, head);
                        Ok(Value::List(items))
                    }
                    other => Err(format!("improper list tail {:?}", other)),
                }
            }
            NodeKind::Range(first, last) => match (self.eval(first)?, self.eval(last)?) {
                (Value::Int(a), Value::Int(b)) if a <= b => Ok(Value::ints(a..=b)),
                (Value::Int(a), Value::Int(b)) => Ok(Value::ints((b..=a).rev())),
                other => Err(format!("bad range {:?}", other)),
            },
            NodeKind::Binary(op, left, right) => self.eval_binary(*op, left, right),
            NodeKind::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
                    (UnaryOp::Not | UnaryOp::Bang, v) => Ok(Value::Bool(!v.is_truthy())),
                    (_, v) => Err(format!("bad operand {:?}", v)),
                }
            }
            NodeKind::Match(pattern, value) => {
                let value = self.eval(value)?;
                let bindings = self
                    .match_pattern(pattern, &value)?
                    .ok_or_else(|| format!("no match of {:?}", value))?;
                for (name, bound) in bindings {
                    self.assign(name, bound);
                }
                Ok(value)
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), false),
            NodeKind::Unless {
                condition,
                then_branch,
                else_branch,
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), true),
            NodeKind::Case { subject, clauses } => {
                let subject = self.eval(subject)?;
                for clause in clauses {
                    let Some(bindings) = self.match_pattern(&clause.pattern, &subject)? else {
                        continue;
                    };
                    let guard = clause.guard.as_ref();
                    let outcome = self.scoped(|ev| {
                        ev.bind_local(bindings);
                        if let Some(guard) = guard {
                            if !ev.eval(guard)?.is_truthy() {
                                return Ok(None);
                            }
                        }
                        ev.eval(&clause.body).map(Some)
                    })?;
                    if let Some(value) = outcome {
                        return Ok(value);
                    }
                }
                Err(format!("no case clause matching {:?}", subject))
            }
            NodeKind::Cond(clauses) => {
                for clause in clauses {
                    if self.eval(&clause.condition)?.is_truthy() {
                        return self.scoped(|ev| ev.eval(&clause.body));
                    }
                }
                Err("no cond clause evaluated to a truthy value".to_string())
            }
            NodeKind::For {
                generators,
                filters,
                into: None,
                body,
            } => {
                let mut out = Vec::new();
                self.scoped(|ev| ev.eval_generators(generators, filters, body, &mut out))?;
                Ok(Value::List(out))
            }
            NodeKind::Fn(clauses) => {
                let captured = match self.scoping {
                    Scoping::Strict => Some(self.snapshot()),
                    Scoping::Leaky => None,
                };
                Ok(Value::Closure(Rc::new(Closure {
                    clauses: clauses.clone(),
                    captured,
                })))
            }
            NodeKind::DynamicCall { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                self.apply(&callee, args)
            }
            NodeKind::Call { args, .. } => {
                self.eval_all(args)?;
                Ok(Value::atom("ok"))
            }
            NodeKind::RemoteCall { .. } => self.eval_remote(node),
            other => Err(format!("unsupported node {:?}", other)),
        }
    }

    fn eval_all(&mut self, nodes: &[Node]) -> Result<Vec<Value>, String> {
        nodes.iter().map(|n| self.eval(n)).collect()
    }

    fn snapshot(&self) -> Frame {
        let mut flat = Frame::default();
        for frame in &self.frames {
            flat.extend(frame.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        flat
    }

    fn eval_if(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
        negate: bool,
    ) -> Result<Value, String> {
        let truthy = self.eval(condition)?.is_truthy() != negate;
        let branch = if truthy { Some(then_branch) } else { else_branch };
        match branch {
            Some(body) => self.scoped(|ev| ev.eval(body)),
            None => Ok(Value::Nil),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Result<Value, String> {
        match op {
            BinaryOp::AndAlso | BinaryOp::And => {
                let l = self.eval(left)?;
                return if l.is_truthy() { self.eval(right) } else { Ok(l) };
            }
            BinaryOp::OrElse | BinaryOp::Or => {
                let l = self.eval(left)?;
                return if l.is_truthy() { Ok(l) } else { self.eval(right) };
            }
            _ => {}
        }
        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let value = match (op, l, r) {
            (BinaryOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => Value::Int(a - b),
            (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => Value::Int(a * b),
            (BinaryOp::Lt, Value::Int(a), Value::Int(b)) => Value::Bool(a < b),
            (BinaryOp::LtEq, Value::Int(a), Value::Int(b)) => Value::Bool(a <= b),
            (BinaryOp::Gt, Value::Int(a), Value::Int(b)) => Value::Bool(a > b),
            (BinaryOp::GtEq, Value::Int(a), Value::Int(b)) => Value::Bool(a >= b),
            (BinaryOp::Eq | BinaryOp::StrictEq, a, b) => Value::Bool(a == b),
            (BinaryOp::NotEq | BinaryOp::StrictNotEq, a, b) => Value::Bool(a != b),
            (BinaryOp::Concat, Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
            (BinaryOp::ListConcat, Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Value::List(a)
            }
            (op, a, b) => return Err(format!("bad operands {:?} {} {:?}", a, op.symbol(), b)),
        };
        Ok(value)
    }

    fn eval_generators(
        &mut self,
        generators: &[exnorm_core::ast::Generator],
        filters: &[Node],
        body: &Node,
        out: &mut Vec<Value>,
    ) -> Result<(), String> {
        let Some((first, rest)) = generators.split_first() else {
            for filter in filters {
                if !self.eval(filter)?.is_truthy() {
                    return Ok(());
                }
            }
            out.push(self.eval(body)?);
            return Ok(());
        };
        let Value::List(items) = self.eval(&first.source)? else {
            return Err("generator source is not a list".to_string());
        };
        for item in items {
            if let Some(bindings) = self.match_pattern(&first.pattern, &item)? {
                self.scoped(|ev| {
                    ev.bind_local(bindings);
                    ev.eval_generators(rest, filters, body, out)
                })?;
            }
        }
        Ok(())
    }

    fn eval_remote(&mut self, node: &Node) -> Result<Value, String> {
        let Some((module, function, args)) = node.as_remote_call() else {
            return Err("dynamic module".to_string());
        };
        let args = self.eval_all(args)?;
        match (module, function, args.as_slice()) {
            ("Enum", "reduce", [Value::List(items), init, f]) => {
                let mut acc = init.clone();
                for item in items {
                    acc = self.apply(f, vec![item.clone(), acc])?;
                }
                Ok(acc)
            }
            ("Enum", "reduce_while", [Value::List(items), init, f]) => {
                let mut acc = init.clone();
                for item in items {
                    match self.apply(f, vec![item.clone(), acc])? {
                        Value::Tuple(pair) => match pair.as_slice() {
                            [Value::Atom(tag), next] if tag == "cont" => acc = next.clone(),
                            [Value::Atom(tag), next] if tag == "halt" => return Ok(next.clone()),
                            _ => return Err("bad reduce_while step result".to_string()),
                        },
                        other => return Err(format!("bad reduce_while step result {:?}", other)),
                    }
                }
                Ok(acc)
            }
            ("Enum", "each", [Value::List(items), f]) => {
                for item in items {
                    self.apply(f, vec![item.clone()])?;
                }
                Ok(Value::atom("ok"))
            }
            ("Enum", "map", [Value::List(items), f]) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.apply(f, vec![item.clone()])?);
                }
                Ok(Value::List(out))
            }
            ("Enum", "reverse", [Value::List(items)]) => {
                Ok(Value::List(items.iter().rev().cloned().collect()))
            }
            _ => Err(format!("unsupported call {}.{}", module, function)),
        }
    }

    fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, String> {
        match callee {
            Value::Closure(closure) => {
                let closure = Rc::clone(closure);
                match &closure.captured {
                    Some(captured) => {
                        let saved = std::mem::replace(&mut self.frames, vec![captured.clone()]);
                        let result = self.call_clauses(&closure, args);
                        self.frames = saved;
                        result
                    }
                    None => self.call_clauses(&closure, args),
                }
            }
            other => Err(format!("not a function: {:?}", other)),
        }
    }

    fn call_clauses(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, String> {
        for clause in &closure.clauses {
            if clause.params.len() != args.len() {
                continue;
            }
            let mut bindings = Vec::new();
            let mut matched = true;
            for (param, arg) in clause.params.iter().zip(&args) {
                match self.match_pattern(param, arg)? {
                    Some(b) => bindings.extend(b),
                    None => {
                        matched = false;
                        break;
                    }
                }
            }
            if !matched {
                continue;
            }
            let outcome = self.scoped(|ev| {
                ev.bind_local(bindings);
                if let Some(guard) = &clause.guard {
                    if !ev.eval(guard)?.is_truthy() {
                        return Ok(None);
                    }
                }
                ev.eval(&clause.body).map(Some)
            })?;
            if let Some(value) = outcome {
                return Ok(value);
            }
        }
        Err("no function clause matching".to_string())
    }

    /// Bindings produced by matching, or `None` on mismatch
    fn match_pattern(
        &self,
        pattern: &Pattern,
        value: &Value,
    ) -> Result<Option<Vec<(String, Value)>>, String> {
        let mut bindings = Vec::new();
        let matched = self.match_into(pattern, value, &mut bindings)?;
        Ok(matched.then_some(bindings))
    }

    fn match_into(
        &self,
        pattern: &Pattern,
        value: &Value,
        out: &mut Vec<(String, Value)>,
    ) -> Result<bool, String> {
        let matched = match (pattern, value) {
            (Pattern::Wildcard, _) => true,
            (Pattern::Var(name), v) => match out.iter().find(|(n, _)| n == name) {
                Some((_, earlier)) => earlier == v,
                None => {
                    out.push((name.clone(), v.clone()));
                    true
                }
            },
            (Pattern::Pin(name), v) => self.lookup(name)? == *v,
            (Pattern::Literal(lit), v) => literal_value(lit)? == *v,
            (Pattern::Alias { name, inner }, v) => {
                out.push((name.clone(), v.clone()));
                self.match_into(inner, v, out)?
            }
            (Pattern::Tuple(ps), Value::Tuple(vs)) | (Pattern::List(ps), Value::List(vs)) => {
                if ps.len() != vs.len() {
                    return Ok(false);
                }
                for (p, v) in ps.iter().zip(vs) {
                    if !self.match_into(p, v, out)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Pattern::Cons { head, tail }, Value::List(vs)) => match vs.split_first() {
                Some((first, rest)) => {
                    self.match_into(head, first, out)?
                        && self.match_into(tail, &Value::List(rest.to_vec()), out)?
                }
                None => false,
            },
            _ => false,
        };
        Ok(matched)
    }
}

fn literal_value(lit: &Literal) -> Result<Value, String> {
    Ok(match lit {
        Literal::Integer(n) => Value::Int(*n),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Nil => Value::Nil,
        Literal::Atom(a) if a == "true" => Value::Bool(true),
        Literal::Atom(a) if a == "false" => Value::Bool(false),
        Literal::Atom(a) if a == "nil" => Value::Nil,
        Literal::Atom(a) => Value::Atom(a.clone()),
        Literal::String(s) if s.contains("#{") => {
            return Err("interpolation is not supported".to_string())
        }
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Float(_) => return Err("floats are not supported".to_string()),
    })
}

/// Evaluate `node` with `bindings` in scope
pub fn eval_with(node: &Node, scoping: Scoping, bindings: &[(&str, Value)]) -> Result<Value, String> {
    let mut evaluator = bindings
        .iter()
        .fold(Evaluator::new(scoping), |ev, (name, value)| {
            ev.with_binding(name, value.clone())
        });
    evaluator.eval(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: i64) -> Value {
        Value::ints(1..=n)
    }

    fn each_sum() -> Node {
        Node::block(vec![
            Node::assign("total", Node::int(0)),
            Node::remote(
                "Enum",
                "each",
                vec![
                    Node::var("xs"),
                    Node::lambda(
                        vec![Pattern::var("x")],
                        Node::assign(
                            "total",
                            Node::binary(BinaryOp::Add, Node::var("total"), Node::var("x")),
                        ),
                    ),
                ],
            ),
            Node::var("total"),
        ])
    }

    #[test]
    fn test_scoping_disciplines_differ_on_closure_rebind() {
        let leaky = eval_with(&each_sum(), Scoping::Leaky, &[("xs", items(4))]).unwrap();
        let strict = eval_with(&each_sum(), Scoping::Strict, &[("xs", items(4))]).unwrap();
        assert_eq!(leaky, Value::Int(10));
        assert_eq!(strict, Value::Int(0));
    }

    #[test]
    fn test_branch_bindings_do_not_escape_under_strict() {
        let tree = Node::block(vec![
            Node::assign("x", Node::int(1)),
            Node::if_else(Node::boolean(true), Node::assign("x", Node::int(2)), None),
            Node::var("x"),
        ]);
        assert_eq!(eval_with(&tree, Scoping::Strict, &[]).unwrap(), Value::Int(1));
        assert_eq!(eval_with(&tree, Scoping::Leaky, &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_reduce_while_halts() {
        let step = Node::lambda(
            vec![Pattern::var("x"), Pattern::var("acc")],
            Node::if_else(
                Node::binary(BinaryOp::Gt, Node::var("x"), Node::int(2)),
                Node::tagged("halt", Node::var("acc")),
                Some(Node::tagged(
                    "cont",
                    Node::binary(BinaryOp::Add, Node::var("acc"), Node::var("x")),
                )),
            ),
        );
        let tree = Node::remote(
            "Enum",
            "reduce_while",
            vec![Node::var("xs"), Node::int(0), step],
        );
        let result = eval_with(&tree, Scoping::Strict, &[("xs", items(10))]).unwrap();
        assert_eq!(result, Value::Int(3));
    }

    #[test]
    fn test_comprehension_with_filter() {
        let tree = Node::new(NodeKind::For {
            generators: vec![exnorm_core::ast::Generator {
                pattern: Pattern::var("x"),
                source: Node::var("xs"),
            }],
            filters: vec![Node::binary(BinaryOp::Gt, Node::var("x"), Node::int(1))],
            into: None,
            body: Box::new(Node::binary(BinaryOp::Mul, Node::var("x"), Node::int(10))),
        });
        let result = eval_with(&tree, Scoping::Strict, &[("xs", items(3))]).unwrap();
        assert_eq!(result, Value::ints([20, 30]));
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        assert!(eval_with(&Node::var("missing"), Scoping::Strict, &[]).is_err());
    }
}
