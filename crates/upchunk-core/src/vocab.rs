//! # Vocabulary
//!
//! Append-only bijection between token strings and dense integer ids.
//! Codes are handed out on first sight and never reassigned. The two
//! structural sentinels always occupy the first two ids.

use std::collections::HashMap;

use crate::error::{Result, UpchunkError};

/// Dense token id.
pub type Term = u32;

/// Token string ↔ id table shared by every corpus of a run.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    stoi: HashMap<String, Term>,
    itos: Vec<String>,
}

impl Vocabulary {
    /// End-of-sentence sentinel id.
    pub const EOS: Term = 0;
    /// Segment-stop sentinel id.
    pub const STOP: Term = 1;

    pub const EOS_STR: &'static str = "__eos__";
    pub const STOP_STR: &'static str = "__stop__";

    /// Create a vocabulary holding only the two sentinels.
    pub fn new() -> Self {
        let mut vocab = Self {
            stoi: HashMap::new(),
            itos: Vec::new(),
        };
        vocab.code(Self::EOS_STR);
        vocab.code(Self::STOP_STR);
        vocab
    }

    /// Get the id for `term`, assigning the next free id if it is new.
    pub fn code(&mut self, term: &str) -> Term {
        if let Some(&code) = self.stoi.get(term) {
            return code;
        }
        let code = self.itos.len() as Term;
        self.stoi.insert(term.to_string(), code);
        self.itos.push(term.to_string());
        code
    }

    /// Look up an id without inserting.
    pub fn get(&self, term: &str) -> Option<Term> {
        self.stoi.get(term).copied()
    }

    /// The string for `code`, if it has been assigned.
    pub fn string(&self, code: Term) -> Option<&str> {
        self.itos.get(code as usize).map(String::as_str)
    }

    /// Number of assigned ids, sentinels included.
    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// True for the end-of-sentence and stop sentinels.
    #[must_use]
    pub fn is_boundary(term: Term) -> bool {
        term == Self::EOS || term == Self::STOP
    }
}

/// Fail unless every id in `tokens` is below `num_terms`.
pub(crate) fn check_terms(tokens: &[Term], num_terms: usize) -> Result<()> {
    match tokens.iter().max() {
        Some(&max) if max as usize >= num_terms => Err(UpchunkError::shape(
            "term id bound",
            num_terms,
            max as usize + 1,
        )),
        _ => Ok(()),
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
