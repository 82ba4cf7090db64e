use std::fmt;
use std::ops::BitOr;

/// Advisory flags passed between passes.
///
/// Flags can only be added. Nothing in the crate can clear a flag once set,
/// so a later pass can never undo a decision an earlier pass (or the
/// upstream builder) recorded on a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MetaFlags(u8);

impl MetaFlags {
    pub const NONE: MetaFlags = MetaFlags(0);
    /// Binders introduced by this node must keep their names.
    pub const KEEP_BINDER_NAMES: MetaFlags = MetaFlags(1 << 0);
    /// Node was created by a pass rather than the upstream builder.
    pub const SYNTHESIZED: MetaFlags = MetaFlags(1 << 1);
    /// Fold construct already rewritten by accumulator threading.
    pub const ACCUMULATOR_THREADED: MetaFlags = MetaFlags(1 << 2);
    /// Module reference already qualified with the application root.
    pub const QUALIFIED: MetaFlags = MetaFlags(1 << 3);

    const NAMES: [(MetaFlags, &'static str); 4] = [
        (Self::KEEP_BINDER_NAMES, "KEEP_BINDER_NAMES"),
        (Self::SYNTHESIZED, "SYNTHESIZED"),
        (Self::ACCUMULATOR_THREADED, "ACCUMULATOR_THREADED"),
        (Self::QUALIFIED, "QUALIFIED"),
    ];

    pub const fn empty() -> Self {
        Self::NONE
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: MetaFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: MetaFlags) -> Self {
        MetaFlags(self.0 | other.0)
    }
}

impl BitOr for MetaFlags {
    type Output = MetaFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Debug for MetaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "MetaFlags({})", names.join(" | "))
    }
}

/// Per-node metadata bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Metadata {
    flags: MetaFlags,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> MetaFlags {
        self.flags
    }

    pub fn has(&self, flag: MetaFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Copy of this metadata with `flag` added
    pub fn with(self, flag: MetaFlags) -> Self {
        Metadata {
            flags: self.flags | flag,
        }
    }

    /// Union of two metadata bags, used when a rewrite merges nodes
    pub fn merge(self, other: Metadata) -> Self {
        Metadata {
            flags: self.flags | other.flags,
        }
    }
}
