use super::node::Literal;

/// Binding-position tree: case clauses, function parameters, match
/// left-hand sides, comprehension generators.
///
/// Patterns are never visited by [`crate::ast::transform`]; a pass that
/// renames binders must rewrite the patterns it owns explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Var(String),
    Wildcard,
    Literal(Literal),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
    Cons {
        head: Box<Pattern>,
        tail: Box<Pattern>,
    },
    Map(Vec<(Literal, Pattern)>),
    Struct {
        module: String,
        fields: Vec<(String, Pattern)>,
    },
    /// `^name`: matches the current value of an already bound variable
    Pin(String),
    /// `inner = name`
    Alias {
        name: String,
        inner: Box<Pattern>,
    },
}

impl Pattern {
    /// Binder for `name`; a lone underscore is the wildcard.
    pub fn var(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == "_" {
            Pattern::Wildcard
        } else {
            Pattern::Var(name)
        }
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Pattern::Literal(Literal::Atom(name.into()))
    }

    /// `{:tag, payload}`
    pub fn tagged(tag: impl Into<String>, payload: Pattern) -> Self {
        Pattern::Tuple(vec![Pattern::atom(tag), payload])
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Pattern::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Pattern::Wildcard)
    }

    /// Whether matching this pattern can never fail
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pattern::Var(_) | Pattern::Wildcard => true,
            Pattern::Alias { inner, .. } => inner.is_irrefutable(),
            _ => false,
        }
    }

    /// Apply `f` to this pattern and every sub-pattern, children first.
    pub fn map(self, f: &mut impl FnMut(Pattern) -> Pattern) -> Pattern {
        let rebuilt = match self {
            Pattern::Tuple(items) => Pattern::Tuple(items.into_iter().map(|p| p.map(f)).collect()),
            Pattern::List(items) => Pattern::List(items.into_iter().map(|p| p.map(f)).collect()),
            Pattern::Cons { head, tail } => Pattern::Cons {
                head: Box::new(head.map(f)),
                tail: Box::new(tail.map(f)),
            },
            Pattern::Map(entries) => {
                Pattern::Map(entries.into_iter().map(|(k, p)| (k, p.map(f))).collect())
            }
            Pattern::Struct { module, fields } => Pattern::Struct {
                module,
                fields: fields.into_iter().map(|(k, p)| (k, p.map(f))).collect(),
            },
            Pattern::Alias { name, inner } => Pattern::Alias {
                name,
                inner: Box::new(inner.map(f)),
            },
            leaf @ (Pattern::Var(_)
            | Pattern::Wildcard
            | Pattern::Literal(_)
            | Pattern::Pin(_)) => leaf,
        };
        f(rebuilt)
    }

    /// Visit this pattern and every sub-pattern, parents first.
    pub fn walk(&self, f: &mut impl FnMut(&Pattern)) {
        f(self);
        match self {
            Pattern::Tuple(items) | Pattern::List(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Pattern::Cons { head, tail } => {
                head.walk(f);
                tail.walk(f);
            }
            Pattern::Map(entries) => {
                for (_, p) in entries {
                    p.walk(f);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, p) in fields {
                    p.walk(f);
                }
            }
            Pattern::Alias { inner, .. } => inner.walk(f),
            Pattern::Var(_) | Pattern::Wildcard | Pattern::Literal(_) | Pattern::Pin(_) => {}
        }
    }
}
