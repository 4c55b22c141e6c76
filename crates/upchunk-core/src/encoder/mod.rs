//! # Tag Encoders
//!
//! Conversion between the nested chunk structure and a flat, parallel
//! `(token, tag)` stream, plus the tag-level knowledge the sequence models
//! need: the forbidden-transition matrix, the initial-tag distribution and
//! the split of tags into stop and non-stop classes.

mod counts;
pub mod grandparent;
pub mod roles;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::corpus::{ChunkedCorpus, Segment, Sentence};
use crate::error::{Result, UpchunkError};
use crate::vocab::{Term, Vocabulary};

pub use grandparent::{Composite, GrandparentTagset, StopPolicy};
pub use roles::{Role, RoleSet, Scheme};

/// Encoder selection, as named on the command line and in config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncoderType {
    /// Basic BIO encoding.
    #[default]
    Bio,
    /// Basic BILO encoding.
    Bilo,
    /// BIO with a second-order tagset.
    BioGp,
    /// BIO with a second-order tagset, except on STOP.
    BioGpNostop,
    /// BIO with B/I replicated over several groups.
    Grouped { groups: usize },
}

impl fmt::Display for EncoderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bio => write!(f, "BIO"),
            Self::Bilo => write!(f, "BILO"),
            Self::BioGp => write!(f, "BIO_GP"),
            Self::BioGpNostop => write!(f, "BIO_GP_NOSTOP"),
            Self::Grouped { groups } => write!(f, "GROUPED:{groups}"),
        }
    }
}

impl FromStr for EncoderType {
    type Err = UpchunkError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "BIO" => Ok(Self::Bio),
            "BILO" => Ok(Self::Bilo),
            "BIO_GP" => Ok(Self::BioGp),
            "BIO_GP_NOSTOP" => Ok(Self::BioGpNostop),
            other => match other.strip_prefix("GROUPED:") {
                Some(n) => n
                    .parse()
                    .map(|groups| Self::Grouped { groups })
                    .map_err(|_| UpchunkError::InvalidConfig(format!("bad group count: {n}"))),
                None => Err(UpchunkError::InvalidConfig(format!(
                    "unknown encoder type: {s}"
                ))),
            },
        }
    }
}

/// A flat token stream with its parallel tag stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub tokens: Vec<Term>,
    pub tags: Vec<usize>,
}

/// Forbidden tag transitions, `true` = forbidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    num_tags: usize,
    forbidden: Vec<bool>,
}

impl Constraints {
    pub fn from_fn(num_tags: usize, forbidden: impl Fn(usize, usize) -> bool) -> Self {
        let forbidden = (0..num_tags)
            .flat_map(|a| (0..num_tags).map(move |b| (a, b)))
            .map(|(a, b)| forbidden(a, b))
            .collect();
        Self { num_tags, forbidden }
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    #[inline]
    pub fn is_forbidden(&self, from: usize, to: usize) -> bool {
        self.forbidden[from * self.num_tags + to]
    }

    #[inline]
    pub fn is_allowed(&self, from: usize, to: usize) -> bool {
        !self.is_forbidden(from, to)
    }

    /// Tags that may follow `from`, ascending.
    pub fn successors(&self, from: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_tags).filter(move |&to| self.is_allowed(from, to))
    }

    /// Row-major `bool[from][to]` matrix.
    pub fn to_matrix(&self) -> Vec<Vec<bool>> {
        self.forbidden
            .chunks(self.num_tags.max(1))
            .map(<[bool]>::to_vec)
            .collect()
    }
}

/// The closed family of tag encoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEncoder {
    /// STOP 0, B 1, I 2, O 3.
    Bio,
    /// STOP 0, B 1, I 2, L 3, O 4.
    Bilo,
    /// Composite `(previous, current)` BIO tags.
    Grandparent(GrandparentTagset),
    /// STOP 0, O 1, `B_g` 2+2g, `I_g` 3+2g.
    Grouped { groups: usize },
}

impl TagEncoder {
    /// Build the encoder for a configured type.
    pub fn new(kind: EncoderType) -> Result<Self> {
        Ok(match kind {
            EncoderType::Bio => Self::Bio,
            EncoderType::Bilo => Self::Bilo,
            EncoderType::BioGp => Self::Grandparent(GrandparentTagset::new(StopPolicy::Paired)),
            EncoderType::BioGpNostop => {
                Self::Grandparent(GrandparentTagset::new(StopPolicy::Atomic))
            }
            EncoderType::Grouped { groups: 0 } => {
                return Err(UpchunkError::InvalidConfig(
                    "grouped encoder needs at least one group".into(),
                ));
            }
            EncoderType::Grouped { groups } => Self::Grouped { groups },
        })
    }

    pub fn kind(&self) -> EncoderType {
        match self {
            Self::Bio => EncoderType::Bio,
            Self::Bilo => EncoderType::Bilo,
            Self::Grandparent(set) => match set.policy() {
                StopPolicy::Paired => EncoderType::BioGp,
                StopPolicy::Atomic => EncoderType::BioGpNostop,
            },
            Self::Grouped { groups } => EncoderType::Grouped { groups: *groups },
        }
    }

    /// Elementary scheme chunks are spelled in.
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Bilo => Scheme::Bilo,
            _ => Scheme::Bio,
        }
    }

    pub fn num_tags(&self) -> usize {
        match self {
            Self::Bio => 4,
            Self::Bilo => 5,
            Self::Grandparent(set) => set.len(),
            Self::Grouped { groups } => 2 + 2 * groups,
        }
    }

    /// Elementary role at a position tagged `tag`.
    pub fn role(&self, tag: usize) -> Option<Role> {
        if tag >= self.num_tags() {
            return None;
        }
        match self {
            Self::Bio | Self::Bilo => self.scheme().roles().get(tag).copied(),
            Self::Grandparent(set) => set.get(tag).map(Composite::current),
            Self::Grouped { .. } => Some(match tag {
                0 => Role::Stop,
                1 => Role::Outside,
                t if t % 2 == 0 => Role::Begin,
                _ => Role::Inside,
            }),
        }
    }

    /// Human-readable tag name.
    pub fn tag_name(&self, tag: usize) -> String {
        match (self, self.role(tag)) {
            (Self::Grandparent(set), _) => set
                .get(tag)
                .map_or_else(|| format!("?{tag}"), |c| c.to_string()),
            (Self::Grouped { .. }, Some(role @ (Role::Begin | Role::Inside))) => {
                format!("{role}_{}", (tag - 2) / 2)
            }
            (_, Some(role)) => role.to_string(),
            (_, None) => format!("?{tag}"),
        }
    }

    pub fn is_stop_tag(&self, tag: usize) -> bool {
        self.role(tag) == Some(Role::Stop)
    }

    pub fn stop_tags(&self) -> Vec<usize> {
        (0..self.num_tags()).filter(|&t| self.is_stop_tag(t)).collect()
    }

    pub fn non_stop_tags(&self) -> Vec<usize> {
        (0..self.num_tags()).filter(|&t| !self.is_stop_tag(t)).collect()
    }

    /// The sentinel tag every stream starts in.
    pub fn start_tag(&self) -> usize {
        0
    }

    /// One-hot distribution on the start tag.
    pub fn init_tag_distribution(&self) -> Vec<f64> {
        let mut dist = vec![0.0; self.num_tags()];
        dist[self.start_tag()] = 1.0;
        dist
    }

    /// Check if tag `to` may directly follow tag `from`.
    pub fn is_allowed(&self, from: usize, to: usize) -> bool {
        match self {
            Self::Grandparent(set) => match (set.get(from), set.get(to)) {
                (Some(a), Some(b)) => set.is_allowed(a, b),
                _ => false,
            },
            _ => match (self.role(from), self.role(to)) {
                (Some(a), Some(b)) => self.scheme().is_valid_transition(a, b),
                _ => false,
            },
        }
    }

    pub fn constraints(&self) -> Constraints {
        Constraints::from_fn(self.num_tags(), |a, b| !self.is_allowed(a, b))
    }

    /// Tag for role `cur` at a position whose predecessor had role `prev`.
    fn tag_for(&self, prev: Role, cur: Role) -> Option<usize> {
        match self {
            Self::Bio | Self::Bilo => self.scheme().tag_of(cur),
            Self::Grandparent(set) => set.tag_of(prev, cur),
            Self::Grouped { .. } => match cur {
                Role::Stop => Some(0),
                Role::Outside => Some(1),
                Role::Begin => Some(2),
                Role::Inside => Some(3),
                Role::Last => None,
            },
        }
    }

    /// Flatten a chunked corpus into parallel token and tag streams.
    pub fn encode(&self, corpus: &ChunkedCorpus) -> Result<Encoded> {
        corpus.validate()?;
        let scheme = self.scheme();
        let mut tokens = vec![Vocabulary::EOS];
        let mut roles = vec![Role::Stop];

        for sentence in corpus.sentences() {
            if sentence.is_empty() {
                tokens.push(Vocabulary::EOS);
                roles.push(Role::Stop);
                continue;
            }
            for (s, segment) in sentence.iter().enumerate() {
                for chunk in segment {
                    tokens.extend_from_slice(chunk);
                    roles.extend(scheme.chunk_roles(chunk.len()));
                }
                let last = s + 1 == sentence.len();
                tokens.push(if last { Vocabulary::EOS } else { Vocabulary::STOP });
                roles.push(Role::Stop);
            }
        }

        let mut tags = Vec::with_capacity(roles.len());
        let mut prev = Role::Stop;
        for (i, &role) in roles.iter().enumerate() {
            let tag = self.tag_for(prev, role).ok_or_else(|| {
                UpchunkError::encoding(i, format!("no tag for {role} after {prev}"))
            })?;
            tags.push(tag);
            prev = role;
        }

        Ok(Encoded { tokens, tags })
    }

    /// Rebuild the chunk structure from parallel token and tag streams.
    ///
    /// Sentences end at `__eos__`, segments at `__stop__`/`__eos__`; those
    /// tokens and only those must carry stop tags. Chunks are maximal
    /// `B I* (L)` runs and lone `O`s.
    pub fn decode(&self, tokens: &[Term], tags: &[usize]) -> Result<ChunkedCorpus> {
        if tokens.len() != tags.len() {
            return Err(UpchunkError::shape("tag stream", tokens.len(), tags.len()));
        }
        if tokens.is_empty() {
            return Ok(ChunkedCorpus::default());
        }
        if tokens[0] != Vocabulary::EOS {
            return Err(UpchunkError::encoding(0, "stream must open with __eos__"));
        }

        let scheme = self.scheme();
        let mut sentences = Vec::new();
        let mut sentence: Sentence = Vec::new();
        let mut segment: Segment = Vec::new();
        let mut open: Vec<Term> = Vec::new();
        let mut prev = Role::Stop;

        for (i, (&w, &tag)) in tokens.iter().zip(tags).enumerate() {
            let role = self
                .role(tag)
                .ok_or_else(|| UpchunkError::encoding(i, format!("tag {tag} out of range")))?;

            if let Self::Grandparent(set) = self {
                let expected = if i == 0 { Role::Stop } else { prev };
                match set.get(tag).and_then(Composite::previous) {
                    Some(p) if p != expected => {
                        return Err(UpchunkError::encoding(
                            i,
                            format!("{} does not follow {expected}", self.tag_name(tag)),
                        ));
                    }
                    _ => {}
                }
            }

            if i == 0 {
                if role != Role::Stop {
                    return Err(UpchunkError::encoding(0, "stream must open with a stop tag"));
                }
                continue;
            }

            if !scheme.is_valid_transition(prev, role) {
                return Err(UpchunkError::encoding(i, format!("{role} after {prev}")));
            }
            if Vocabulary::is_boundary(w) != (role == Role::Stop) {
                return Err(UpchunkError::encoding(
                    i,
                    format!("{role} tag on token {w}"),
                ));
            }

            if !open.is_empty() && !role.continues_chunk() {
                segment.push(std::mem::take(&mut open));
            }

            match role {
                Role::Stop => {
                    if w == Vocabulary::EOS {
                        if !(sentence.is_empty() && segment.is_empty()) {
                            sentence.push(std::mem::take(&mut segment));
                        }
                        sentences.push(std::mem::take(&mut sentence));
                    } else {
                        sentence.push(std::mem::take(&mut segment));
                    }
                }
                Role::Begin | Role::Inside => open.push(w),
                Role::Last => {
                    open.push(w);
                    segment.push(std::mem::take(&mut open));
                }
                Role::Outside => segment.push(vec![w]),
            }
            prev = role;
        }

        if !(open.is_empty() && segment.is_empty() && sentence.is_empty()) {
            return Err(UpchunkError::encoding(
                tokens.len(),
                "stream must close with __eos__",
            ));
        }
        Ok(ChunkedCorpus::new(sentences))
    }

    /// Spread unit weight per position uniformly over the tags whose roles
    /// are among the candidates. Composite tags also need their previous
    /// role among the previous position's candidates.
    pub fn soft_assign(&self, candidates: &[RoleSet]) -> Vec<Vec<f64>> {
        let n = self.num_tags();
        let start = RoleSet::single(Role::Stop);
        candidates
            .iter()
            .enumerate()
            .map(|(i, &here)| {
                let before = if i == 0 { start } else { candidates[i - 1] };
                let eligible: Vec<bool> = (0..n)
                    .map(|tag| match self {
                        Self::Grandparent(set) => set.get(tag).is_some_and(|c| {
                            here.contains(c.current())
                                && c.previous().is_none_or(|p| before.contains(p))
                        }),
                        _ => self.role(tag).is_some_and(|r| here.contains(r)),
                    })
                    .collect();
                let count = eligible.iter().filter(|&&e| e).count();
                eligible
                    .into_iter()
                    .map(|e| if e { 1.0 / count as f64 } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    /// Candidate roles for each position, read off the stop context alone.
    pub fn context_roles(&self, tokens: &[Term]) -> Vec<RoleSet> {
        let scheme = self.scheme();
        let boundary_at =
            |i: Option<usize>| i.and_then(|i| tokens.get(i)).is_none_or(|&w| Vocabulary::is_boundary(w));
        let closing = if scheme.closes_with_last() {
            Role::Last
        } else {
            Role::Inside
        };

        tokens
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                if Vocabulary::is_boundary(w) {
                    return RoleSet::single(Role::Stop);
                }
                let after_boundary = boundary_at(i.checked_sub(1));
                let before_boundary = boundary_at(Some(i + 1));
                match (after_boundary, before_boundary) {
                    (true, true) => RoleSet::single(Role::Outside),
                    (true, false) => RoleSet::of(&[Role::Begin, Role::Outside]),
                    (false, true) => RoleSet::of(&[Role::Outside, closing]),
                    (false, false) => scheme.non_stop_roles(),
                }
            })
            .collect()
    }

    /// Soft tag weights for an unchunked stream.
    ///
    /// Composite tags only look back, so for grandparent encoders a token
    /// with two non-boundary predecessors keeps every non-stop role even
    /// when it closes its segment. `soft_counts` then drops the pairs that
    /// cannot reach the following stop.
    pub fn soft_train(&self, tokens: &[Term]) -> Vec<Vec<f64>> {
        let mut candidates = self.context_roles(tokens);
        if let Self::Grandparent(_) = self {
            let all = self.scheme().non_stop_roles();
            for i in 2..tokens.len() {
                if !tokens[i - 2..=i].iter().any(|&w| Vocabulary::is_boundary(w)) {
                    candidates[i] = all;
                }
            }
        }
        self.soft_assign(&candidates)
    }
}
