//! # Elementary Chunk Roles
//!
//! The BIO-like roles every tagset is built from, and the adjacency rule
//! that decides which role may follow which.

use std::fmt;

/// Elementary role of a position in the flat stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Segment or sentence boundary.
    Stop,
    /// First token of a multi-token chunk.
    Begin,
    /// Non-initial token of a multi-token chunk.
    Inside,
    /// Final token of a multi-token chunk (BILO only).
    Last,
    /// Single-token chunk.
    Outside,
}

impl Role {
    /// All roles in their canonical order.
    pub const ALL: [Role; 5] = [
        Role::Stop,
        Role::Begin,
        Role::Inside,
        Role::Last,
        Role::Outside,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// True for roles that continue a chunk opened earlier.
    pub fn continues_chunk(self) -> bool {
        matches!(self, Role::Inside | Role::Last)
    }

    /// Check if role `to` may directly follow role `from`.
    ///
    /// `I`/`L` only after `B`/`I`; `B` only before `I`/`L`; when chunks are
    /// closed with `L`, `I` is also only followed by `I`/`L`.
    pub fn is_valid_transition(from: Role, to: Role, closes_with_last: bool) -> bool {
        if to.continues_chunk() && !matches!(from, Role::Begin | Role::Inside) {
            return false;
        }
        match from {
            Role::Begin => to.continues_chunk(),
            Role::Inside if closes_with_last => to.continues_chunk(),
            _ => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Stop => write!(f, "STOP"),
            Role::Begin => write!(f, "B"),
            Role::Inside => write!(f, "I"),
            Role::Last => write!(f, "L"),
            Role::Outside => write!(f, "O"),
        }
    }
}

/// Small set of candidate roles for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);

    pub fn of(roles: &[Role]) -> Self {
        RoleSet(roles.iter().fold(0, |acc, r| acc | r.bit()))
    }

    pub fn single(role: Role) -> Self {
        RoleSet(role.bit())
    }

    pub fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= role.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::EMPTY;
        for role in iter {
            set.insert(role);
        }
        set
    }
}

/// Elementary tagset a chunk is spelled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `B I*` for multi-token chunks, `O` for singletons.
    Bio,
    /// `B I* L` for multi-token chunks, `O` for singletons.
    Bilo,
}

impl Scheme {
    /// Roles of the scheme in tag-id order.
    pub fn roles(self) -> &'static [Role] {
        match self {
            Scheme::Bio => &[Role::Stop, Role::Begin, Role::Inside, Role::Outside],
            Scheme::Bilo => &[
                Role::Stop,
                Role::Begin,
                Role::Inside,
                Role::Last,
                Role::Outside,
            ],
        }
    }

    pub fn closes_with_last(self) -> bool {
        matches!(self, Scheme::Bilo)
    }

    pub fn is_valid_transition(self, from: Role, to: Role) -> bool {
        Role::is_valid_transition(from, to, self.closes_with_last())
    }

    /// Tag id of `role` in this scheme, if the scheme has it.
    pub fn tag_of(self, role: Role) -> Option<usize> {
        self.roles().iter().position(|&r| r == role)
    }

    /// Spell a chunk of `len` tokens.
    pub fn chunk_roles(self, len: usize) -> impl Iterator<Item = Role> {
        (0..len).map(move |i| match (i, len) {
            (_, 1) => Role::Outside,
            (0, _) => Role::Begin,
            (i, n) if i + 1 == n && self.closes_with_last() => Role::Last,
            _ => Role::Inside,
        })
    }

    /// Non-stop roles of the scheme.
    pub fn non_stop_roles(self) -> RoleSet {
        self.roles()
            .iter()
            .copied()
            .filter(|&r| r != Role::Stop)
            .collect()
    }
}
