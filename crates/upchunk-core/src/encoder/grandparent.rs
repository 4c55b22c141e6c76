//! # Grandparent Tagsets
//!
//! Second-order tagsets emulated with a first-order chain: each tag packs
//! the previous and current elementary BIO role. The tagset is derived from
//! the elementary adjacency rule rather than listed by hand.

use std::fmt;

use super::roles::{Role, Scheme};

/// Whether `STOP` takes part in the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopPolicy {
    /// Every allowed pair is its own tag (11 tags).
    Paired,
    /// All pairs ending in `STOP` collapse into one atomic tag (9 tags).
    Atomic,
}

/// One composite tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Composite {
    /// `(previous role, current role)`.
    Pair(Role, Role),
    /// Atomic stop, whatever came before.
    Stop,
}

impl Composite {
    /// The role at the tagged position.
    pub fn current(self) -> Role {
        match self {
            Composite::Pair(_, cur) => cur,
            Composite::Stop => Role::Stop,
        }
    }

    /// The role required at the previous position, if the tag fixes it.
    pub fn previous(self) -> Option<Role> {
        match self {
            Composite::Pair(prev, _) => Some(prev),
            Composite::Stop => None,
        }
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Composite::Pair(prev, cur) => write!(f, "{prev}_{cur}"),
            Composite::Stop => write!(f, "STOP"),
        }
    }
}

/// Composite tagset over BIO roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrandparentTagset {
    policy: StopPolicy,
    tags: Vec<Composite>,
}

impl GrandparentTagset {
    pub fn new(policy: StopPolicy) -> Self {
        let roles = Scheme::Bio.roles();
        let mut pairs: Vec<(Role, Role)> = roles
            .iter()
            .flat_map(|&prev| roles.iter().map(move |&cur| (prev, cur)))
            .filter(|&(prev, cur)| Scheme::Bio.is_valid_transition(prev, cur))
            .collect();
        pairs.sort();

        let tags = match policy {
            StopPolicy::Paired => pairs
                .into_iter()
                .map(|(p, c)| Composite::Pair(p, c))
                .collect(),
            StopPolicy::Atomic => std::iter::once(Composite::Stop)
                .chain(
                    pairs
                        .into_iter()
                        .filter(|&(_, cur)| cur != Role::Stop)
                        .map(|(p, c)| Composite::Pair(p, c)),
                )
                .collect(),
        };
        Self { policy, tags }
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[Composite] {
        &self.tags
    }

    pub fn get(&self, tag: usize) -> Option<Composite> {
        self.tags.get(tag).copied()
    }

    /// Tag id for the role `cur` following `prev`.
    pub fn tag_of(&self, prev: Role, cur: Role) -> Option<usize> {
        let wanted = match (self.policy, cur) {
            (StopPolicy::Atomic, Role::Stop) => Composite::Stop,
            _ => Composite::Pair(prev, cur),
        };
        self.tags.iter().position(|&t| t == wanted)
    }

    /// Composite `x → y` is allowed iff the roles chain up.
    pub fn is_allowed(&self, from: Composite, to: Composite) -> bool {
        match to {
            Composite::Pair(prev, _) => from.current() == prev,
            Composite::Stop => Scheme::Bio.is_valid_transition(from.current(), Role::Stop),
        }
    }
}
