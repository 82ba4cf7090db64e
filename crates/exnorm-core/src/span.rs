use std::fmt;

/// Source position attached to every node, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, column: u32) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    /// Span for nodes that have no source counterpart (synthesized code, tests).
    pub fn dummy() -> Self {
        Span::default()
    }

    pub fn is_dummy(&self) -> bool {
        *self == Span::default()
    }

    /// Smallest span covering both `self` and `other`.
    pub fn combine(&self, other: &Span) -> Span {
        if self.is_dummy() {
            return *other;
        }
        if other.is_dummy() {
            return *self;
        }
        let (line, column) = if (self.line, self.column) <= (other.line, other.column) {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_ignores_dummy() {
        let a = Span::new(10, 20, 2, 3);
        assert_eq!(a.combine(&Span::dummy()), a);
        assert_eq!(Span::dummy().combine(&a), a);
    }

    #[test]
    fn test_combine_covers_both() {
        let a = Span::new(10, 20, 2, 3);
        let b = Span::new(5, 12, 1, 7);
        let c = a.combine(&b);
        assert_eq!(c.start, 5);
        assert_eq!(c.end, 20);
        assert_eq!((c.line, c.column), (1, 7));
    }

    #[test]
    fn test_display() {
        assert_eq!(Span::new(0, 1, 4, 9).to_string(), "4:9");
    }
}
