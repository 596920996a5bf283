use std::collections::HashSet;
use std::fmt;

/// The type of error that can occur when compiling, resolving or sampling a grammar.
#[derive(Debug, PartialEq)]
pub struct Error(pub(crate) ErrorRepr);

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unmatched delimiters, malformed grammar source, blank rule names.
    Syntax,
    /// Unbalanced grouping found while building a graph.
    Structure,
    /// Empty graph operand or out of range splice position.
    Composition,
    /// Unknown references, self-recursion or duplicate rules.
    Resolution,
    /// Empty or zero weight choice sets, exhausted path budgets, empty samples.
    Sampling,
    /// Malformed, empty or misplaced weight annotations.
    Weight,
}

impl Error {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            ErrorRepr::Grammar(_)
            | ErrorRepr::DelimiterNotFound { .. }
            | ErrorRepr::DanglingEscape(_)
            | ErrorRepr::BlankRuleName => ErrorKind::Syntax,
            ErrorRepr::UnbalancedGroup(_) => ErrorKind::Structure,
            ErrorRepr::EmptyHost
            | ErrorRepr::EmptyGuest
            | ErrorRepr::PositionOutOfRange { .. } => ErrorKind::Composition,
            ErrorRepr::UnknownReference(_)
            | ErrorRepr::UnknownRule(_)
            | ErrorRepr::SelfReference(_)
            | ErrorRepr::DuplicateRules(_) => ErrorKind::Resolution,
            ErrorRepr::EmptyChoice
            | ErrorRepr::DeadEnd(_)
            | ErrorRepr::ZeroWeights
            | ErrorRepr::ArityMismatch { .. }
            | ErrorRepr::PathLimit(_)
            | ErrorRepr::EmptySentence
            | ErrorRepr::Unstructured(_) => ErrorKind::Sampling,
            ErrorRepr::MalformedWeight(_)
            | ErrorRepr::EmptyWeight(_)
            | ErrorRepr::MisplacedWeight(_) => ErrorKind::Weight,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            ErrorRepr::Grammar(e) => Some(e),
            ErrorRepr::Unstructured(e) => Some(e),
            _ => None,
        }
    }
}

impl From<arbitrary::Error> for Error {
    fn from(e: arbitrary::Error) -> Self {
        Error(ErrorRepr::Unstructured(e))
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum ErrorRepr {
    Grammar(peg::error::ParseError<peg::str::LineCol>),
    DelimiterNotFound { delimiter: char, position: usize },
    DanglingEscape(usize),
    BlankRuleName,
    UnbalancedGroup(usize),
    EmptyHost,
    EmptyGuest,
    PositionOutOfRange { position: usize, max: usize },
    UnknownReference(String),
    UnknownRule(String),
    SelfReference(String),
    DuplicateRules(HashSet<String>),
    EmptyChoice,
    DeadEnd(usize),
    ZeroWeights,
    ArityMismatch { choices: usize, weights: usize },
    PathLimit(usize),
    EmptySentence,
    Unstructured(arbitrary::Error),
    MalformedWeight(String),
    EmptyWeight(String),
    MisplacedWeight(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorRepr::Grammar(e) => e.fmt(f),
            ErrorRepr::DelimiterNotFound {
                delimiter,
                position,
            } => write!(
                f,
                "Delimiter {:?} not found for the one opened at {}",
                delimiter, position
            ),
            ErrorRepr::DanglingEscape(i) => write!(f, "Nothing to escape at {}", i),
            ErrorRepr::BlankRuleName => write!(f, "Rule name is blank"),
            ErrorRepr::UnbalancedGroup(i) => write!(f, "Unbalanced group at token {}", i),
            ErrorRepr::EmptyHost => write!(f, "Cannot splice into a graph without edges"),
            ErrorRepr::EmptyGuest => write!(f, "Cannot splice in a graph without edges"),
            ErrorRepr::PositionOutOfRange { position, max } => write!(
                f,
                "Splice position {} exceeds the last node {}",
                position, max
            ),
            ErrorRepr::UnknownReference(e) => write!(f, "Unknown rule reference: {}", e),
            ErrorRepr::UnknownRule(e) => write!(f, "No rule named {}", e),
            ErrorRepr::SelfReference(e) => write!(f, "Rule {} references itself", e),
            ErrorRepr::DuplicateRules(e) => write!(f, "Duplicate rule definitions: {:?}", e),
            ErrorRepr::EmptyChoice => write!(f, "Cannot choose from an empty set"),
            ErrorRepr::DeadEnd(i) => write!(f, "Node {} has no way to the sink", i),
            ErrorRepr::ZeroWeights => write!(f, "Every choice has a zero weight"),
            ErrorRepr::ArityMismatch { choices, weights } => write!(
                f,
                "{} choices but {} weights",
                choices, weights
            ),
            ErrorRepr::PathLimit(n) => write!(f, "More than {} paths", n),
            ErrorRepr::EmptySentence => write!(f, "Sampled path spells no sentence"),
            ErrorRepr::Unstructured(e) => e.fmt(f),
            ErrorRepr::MalformedWeight(e) => write!(f, "Malformed weight annotation: {}", e),
            ErrorRepr::EmptyWeight(e) => write!(f, "Empty weight annotation: {}", e),
            ErrorRepr::MisplacedWeight(i) => write!(
                f,
                "Weight annotation at {} does not start a branch or follows another one",
                i
            ),
        }
    }
}
