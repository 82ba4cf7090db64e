use super::metadata::{MetaFlags, Metadata};
use super::pattern::Pattern;
use crate::span::Span;

/// A node of the generated target-language tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub meta: Metadata,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    /// May contain `#{...}` interpolation segments
    String(String),
    Boolean(bool),
    Atom(String),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `and`
    And,
    /// `or`
    Or,
    /// `&&`
    AndAlso,
    /// `||`
    OrElse,
    /// `<>`
    Concat,
    /// `++`
    ListConcat,
    /// `--`
    ListSubtract,
    In,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Concat => "<>",
            BinaryOp::ListConcat => "++",
            BinaryOp::ListSubtract => "--",
            BinaryOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `not`
    Not,
    /// `!`
    Bang,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Def,
    Defp,
    Defmacro,
    Defmacrop,
}

impl DefKind {
    pub fn is_private(self) -> bool {
        matches!(self, DefKind::Defp | DefKind::Defmacrop)
    }

    pub fn is_macro(self) -> bool {
        matches!(self, DefKind::Defmacro | DefKind::Defmacrop)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub kind: DefKind,
    pub name: String,
    pub params: Vec<Pattern>,
    pub guard: Option<Box<Node>>,
    pub body: Box<Node>,
}

impl FunctionDef {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Clause of `case`, `receive`, `catch` and `with ... else`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub pattern: Pattern,
    pub guard: Option<Node>,
    pub body: Node,
}

impl CaseClause {
    pub fn new(pattern: Pattern, body: Node) -> Self {
        Self {
            pattern,
            guard: None,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnClause {
    pub params: Vec<Pattern>,
    pub guard: Option<Node>,
    pub body: Node,
}

impl FnClause {
    pub fn new(params: Vec<Pattern>, body: Node) -> Self {
        Self {
            params,
            guard: None,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondClause {
    pub condition: Node,
    pub body: Node,
}

/// `pattern <- expr`, or a bare expression when `pattern` is `None`
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub pattern: Option<Pattern>,
    pub expr: Node,
}

/// `binder in [Exceptions] -> body`
#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    pub binder: Pattern,
    pub exceptions: Vec<String>,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub pattern: Pattern,
    pub source: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveAfter {
    pub timeout: Box<Node>,
    pub body: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Literals
    Literal(Literal),

    // Containers
    List(Vec<Node>),
    /// `[head | tail]`
    Cons(Box<Node>, Box<Node>),
    Tuple(Vec<Node>),
    Map(Vec<(Node, Node)>),
    /// `%{base | key => value}`
    MapUpdate {
        base: Box<Node>,
        updates: Vec<(Node, Node)>,
    },
    Struct {
        module: String,
        fields: Vec<(String, Node)>,
    },
    KeywordList(Vec<(String, Node)>),

    // References
    Var(String),
    ModuleRef(String),
    /// `expr.field`
    Field(Box<Node>, String),
    /// `expr[key]`
    Access(Box<Node>, Box<Node>),
    /// `@name` read
    AttributeRef(String),

    // Operators
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Unary(UnaryOp, Box<Node>),
    Pipe(Box<Node>, Box<Node>),
    Range(Box<Node>, Box<Node>),

    // Control forms
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Unless {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Case {
        subject: Box<Node>,
        clauses: Vec<CaseClause>,
    },
    Cond(Vec<CondClause>),
    With {
        clauses: Vec<WithClause>,
        body: Box<Node>,
        else_clauses: Vec<CaseClause>,
    },
    Try {
        body: Box<Node>,
        rescue: Vec<RescueClause>,
        catch: Vec<CaseClause>,
        else_clauses: Vec<CaseClause>,
        after: Option<Box<Node>>,
    },
    Receive {
        clauses: Vec<CaseClause>,
        after: Option<ReceiveAfter>,
    },
    Block(Vec<Node>),

    // Binding forms
    Match(Pattern, Box<Node>),
    For {
        generators: Vec<Generator>,
        filters: Vec<Node>,
        into: Option<Box<Node>>,
        body: Box<Node>,
    },

    // Calls
    Call {
        name: String,
        args: Vec<Node>,
    },
    RemoteCall {
        module: Box<Node>,
        function: String,
        args: Vec<Node>,
    },
    /// `callee.(args)`
    DynamicCall {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Fn(Vec<FnClause>),
    /// `&Module.fun/arity` or `&fun/arity`
    Capture {
        module: Option<String>,
        function: String,
        arity: usize,
    },
    /// `&(expr)` with `&1`, `&2`... placeholders
    CaptureExpr(Box<Node>),
    CaptureArg(usize),

    // Module-level forms
    Module {
        name: String,
        body: Box<Node>,
    },
    Def(FunctionDef),
    Import {
        module: String,
        opts: Vec<(String, Node)>,
    },
    Alias {
        module: String,
        as_name: Option<String>,
    },
    Require {
        module: String,
        as_name: Option<String>,
    },
    Use {
        module: String,
        opts: Vec<(String, Node)>,
    },
    ModuleAttribute {
        name: String,
        value: Box<Node>,
    },

    /// Text the upstream builder could not structure
    Raw(String),
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            meta: Metadata::default(),
            span: Span::dummy(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_flag(mut self, flag: MetaFlags) -> Self {
        self.meta = self.meta.with(flag);
        self
    }

    /// Replace the kind while keeping span and metadata
    pub fn rebuild(&self, kind: NodeKind) -> Node {
        Node {
            kind,
            meta: self.meta,
            span: self.span,
        }
    }

    pub fn has_flag(&self, flag: MetaFlags) -> bool {
        self.meta.has(flag)
    }

    pub fn literal(lit: Literal) -> Self {
        Node::new(NodeKind::Literal(lit))
    }

    pub fn int(value: i64) -> Self {
        Node::literal(Literal::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Node::literal(Literal::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Node::literal(Literal::Boolean(value))
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Node::literal(Literal::Atom(name.into()))
    }

    pub fn nil() -> Self {
        Node::literal(Literal::Nil)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Var(name.into()))
    }

    pub fn module_ref(name: impl Into<String>) -> Self {
        Node::new(NodeKind::ModuleRef(name.into()))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::new(NodeKind::List(items))
    }

    pub fn tuple(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Tuple(items))
    }

    /// `{:tag, value}`
    pub fn tagged(tag: impl Into<String>, value: Node) -> Self {
        Node::tuple(vec![Node::atom(tag), value])
    }

    pub fn block(stmts: Vec<Node>) -> Self {
        Node::new(NodeKind::Block(stmts))
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::new(NodeKind::Binary(op, Box::new(left), Box::new(right)))
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Node::new(NodeKind::Unary(op, Box::new(operand)))
    }

    pub fn matching(pattern: Pattern, value: Node) -> Self {
        Node::new(NodeKind::Match(pattern, Box::new(value)))
    }

    /// `name = value`
    pub fn assign(name: impl Into<String>, value: Node) -> Self {
        Node::matching(Pattern::var(name), value)
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::new(NodeKind::Call {
            name: name.into(),
            args,
        })
    }

    pub fn remote(module: impl Into<String>, function: impl Into<String>, args: Vec<Node>) -> Self {
        Node::new(NodeKind::RemoteCall {
            module: Box::new(Node::module_ref(module)),
            function: function.into(),
            args,
        })
    }

    pub fn fn_clauses(clauses: Vec<FnClause>) -> Self {
        Node::new(NodeKind::Fn(clauses))
    }

    /// Single-clause anonymous function
    pub fn lambda(params: Vec<Pattern>, body: Node) -> Self {
        Node::fn_clauses(vec![FnClause::new(params, body)])
    }

    pub fn if_else(condition: Node, then_branch: Node, else_branch: Option<Node>) -> Self {
        Node::new(NodeKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn unless(condition: Node, then_branch: Node, else_branch: Option<Node>) -> Self {
        Node::new(NodeKind::Unless {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn case(subject: Node, clauses: Vec<CaseClause>) -> Self {
        Node::new(NodeKind::Case {
            subject: Box::new(subject),
            clauses,
        })
    }

    pub fn def(kind: DefKind, name: impl Into<String>, params: Vec<Pattern>, body: Node) -> Self {
        Node::new(NodeKind::Def(FunctionDef {
            kind,
            name: name.into(),
            params,
            guard: None,
            body: Box::new(body),
        }))
    }

    pub fn module(name: impl Into<String>, body: Vec<Node>) -> Self {
        Node::new(NodeKind::Module {
            name: name.into(),
            body: Box::new(Node::block(body)),
        })
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Node::new(NodeKind::Raw(text.into()))
    }

    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Literal(Literal::Atom(name)) => Some(name),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(Literal::Nil))
    }

    pub fn is_var(&self, name: &str) -> bool {
        self.as_var() == Some(name)
    }

    /// `Module.function(args)` with a static module reference
    pub fn as_remote_call(&self) -> Option<(&str, &str, &[Node])> {
        match &self.kind {
            NodeKind::RemoteCall {
                module,
                function,
                args,
            } => match &module.kind {
                NodeKind::ModuleRef(m) => Some((m.as_str(), function.as_str(), args.as_slice())),
                _ => None,
            },
            _ => None,
        }
    }

    /// A constant literal, or a list/tuple/map built only from constants.
    /// Interpolated strings are not constant.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            NodeKind::Literal(Literal::String(s)) => !s.contains("#{"),
            NodeKind::Literal(_) => true,
            NodeKind::List(items) | NodeKind::Tuple(items) => items.iter().all(Node::is_constant),
            NodeKind::Map(entries) => entries
                .iter()
                .all(|(k, v)| k.is_constant() && v.is_constant()),
            NodeKind::KeywordList(entries) => entries.iter().all(|(_, v)| v.is_constant()),
            _ => false,
        }
    }

    /// Evaluating the node has no effect and cannot raise: constants,
    /// variable reads and containers of those.
    pub fn is_pure(&self) -> bool {
        match &self.kind {
            NodeKind::Var(_) | NodeKind::AttributeRef(_) | NodeKind::ModuleRef(_) => true,
            NodeKind::Literal(_) => true,
            NodeKind::List(items) | NodeKind::Tuple(items) => items.iter().all(Node::is_pure),
            NodeKind::Map(entries) => entries.iter().all(|(k, v)| k.is_pure() && v.is_pure()),
            NodeKind::KeywordList(entries) => entries.iter().all(|(_, v)| v.is_pure()),
            NodeKind::Capture { .. } => true,
            _ => false,
        }
    }

    /// Statements of a body: a block yields its statements, anything else is
    /// a single statement.
    pub fn into_statements(self) -> Vec<Node> {
        match self.kind {
            NodeKind::Block(stmts) => stmts,
            _ => vec![self],
        }
    }

    pub fn statements(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Block(stmts) => stmts,
            _ => std::slice::from_ref(self),
        }
    }

    /// Inverse of [`Node::into_statements`]: no statements is `nil`, one
    /// statement stands alone, more become a block carrying `span`.
    pub fn from_statements(mut stmts: Vec<Node>, span: Span) -> Node {
        match stmts.len() {
            0 => Node::nil().with_span(span),
            1 => stmts.pop().unwrap_or_else(Node::nil),
            _ => Node::block(stmts).with_span(span),
        }
    }
}
