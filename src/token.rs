//! Tokens of a rule expression and the tokenizer producing them.

use crate::error::ErrorRepr;
use crate::Error;
use std::fmt;
use std::ops::Range;
use std::str::CharIndices;

/// Single character tokens that shape the graph but carry no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, enum_iterator::Sequence)]
pub enum Structural {
    /// `(`, opens a mandatory group.
    OpenGroup,
    /// `)`
    CloseGroup,
    /// `[`, opens an optional group.
    OpenOptional,
    /// `]`
    CloseOptional,
    /// `|`, separates alternatives.
    Alternative,
    /// `;`, ends the sequence.
    Terminator,
}

impl Structural {
    pub fn all() -> impl Iterator<Item = Self> {
        enum_iterator::all::<Self>()
    }

    /// Returns the opening structure this one closes, if it closes any.
    pub const fn opener(&self) -> Option<Self> {
        match self {
            Self::CloseGroup => Some(Self::OpenGroup),
            Self::CloseOptional => Some(Self::OpenOptional),
            _ => None,
        }
    }
}

/// One atom of a rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Start of sequence sentinel.
    Start,
    /// End of sequence sentinel.
    End,
    Structural(Structural),
    /// A rule reference, brackets included, e.g. `<city>`.
    Reference(String),
    /// A terminal, possibly still carrying tag annotations and one weight
    /// annotation, whose byte span in the text is kept until
    /// [`crate::Graph::apply_weights`] strips it.
    Text(String, Option<Range<usize>>),
}

impl Token {
    /// A terminal without a weight annotation.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Text(text.into(), None)
    }

    /// `true` for sentinels, structural tokens and blank terminals.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Text(s, _) => s.is_empty(),
            Self::Reference(_) => false,
            _ => true,
        }
    }

    /// Text this token contributes to a production.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(s, _) | Self::Reference(s) => s,
            _ => "",
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = CharTable::default();
        match self {
            Self::Start => write!(f, "START"),
            Self::End => write!(f, "END"),
            Self::Structural(s) => write!(f, "{}", table.char_of(*s)),
            Self::Reference(r) => write!(f, "{}", r),
            Self::Text(t, _) => write!(f, "{:?}", t),
        }
    }
}

/// Which characters play which role in a rule expression.
///
/// The default is the JSGF flavor: `<ref>`, `( )`, `[ ]`, `|`, `;`, `"quoted"`,
/// `\` escapes, `/weight/` and `{tag}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharTable {
    pub reference: (char, char),
    pub group: (char, char),
    pub optional: (char, char),
    pub alternative: char,
    pub terminator: char,
    pub quote: char,
    pub escape: char,
    pub weight: char,
    pub tag: (char, char),
}

impl Default for CharTable {
    fn default() -> Self {
        Self {
            reference: ('<', '>'),
            group: ('(', ')'),
            optional: ('[', ']'),
            alternative: '|',
            terminator: ';',
            quote: '"',
            escape: '\\',
            weight: '/',
            tag: ('{', '}'),
        }
    }
}

impl CharTable {
    pub const fn char_of(&self, s: Structural) -> char {
        match s {
            Structural::OpenGroup => self.group.0,
            Structural::CloseGroup => self.group.1,
            Structural::OpenOptional => self.optional.0,
            Structural::CloseOptional => self.optional.1,
            Structural::Alternative => self.alternative,
            Structural::Terminator => self.terminator,
        }
    }

    fn structural(&self, c: char) -> Option<Structural> {
        Structural::all().find(|s| self.char_of(*s) == c)
    }
}

/// Splits a rule expression into tokens, bracketed by [`Token::Start`] and [`Token::End`].
///
/// An empty expression yields no tokens at all.
pub fn tokenize(expression: &str, table: &CharTable) -> Result<Vec<Token>, Error> {
    if expression.is_empty() {
        return Ok(Vec::new());
    }

    let mut tokens = vec![Token::Start];
    let mut literal = String::new();
    // span of the weight annotation within `literal`
    let mut weight: Option<Range<usize>> = None;
    let mut chars = expression.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == table.escape {
            match chars.next() {
                Some((_, escaped)) => literal.push(escaped),
                None => return Err(Error(ErrorRepr::DanglingEscape(i))),
            }
        } else if c == table.reference.0 {
            flush(&mut literal, &mut weight, &mut tokens);
            let name = take_until(expression, &mut chars, i, c, table.reference.1)?;
            tokens.push(Token::Reference(format!(
                "{}{}{}",
                c, name, table.reference.1
            )));
        } else if c == table.quote {
            literal.push_str(take_until(expression, &mut chars, i, c, c)?);
        } else if c == table.weight {
            if weight.is_some() || is_sole_parent(tokens.last()) {
                return Err(Error(ErrorRepr::MisplacedWeight(i)));
            }
            let annotation = take_until(expression, &mut chars, i, c, c)?;
            let start = literal.len();
            literal.push(c);
            literal.push_str(annotation);
            literal.push(c);
            weight = Some(start..literal.len());
        } else if c == table.tag.0 {
            let annotation = take_until(expression, &mut chars, i, c, table.tag.1)?;
            literal.push(c);
            literal.push_str(annotation);
            literal.push(table.tag.1);
        } else if let Some(s) = table.structural(c) {
            flush(&mut literal, &mut weight, &mut tokens);
            tokens.push(Token::Structural(s));
        } else {
            literal.push(c);
        }
    }

    flush(&mut literal, &mut weight, &mut tokens);
    tokens.push(Token::End);
    Ok(tokens)
}

fn flush(literal: &mut String, weight: &mut Option<Range<usize>>, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Text(std::mem::take(literal), weight.take()));
    }
}

/// `true` if a terminal following `last` can only be reached from `last`, which
/// leaves a weight on it nothing to be weighed against.
fn is_sole_parent(last: Option<&Token>) -> bool {
    matches!(
        last,
        Some(
            Token::Reference(_)
                | Token::Structural(Structural::CloseGroup | Structural::CloseOptional)
        )
    )
}

/// Returns the text between the `open` char at byte `at` and the next `close`,
/// leaving `chars` just past `close`.
fn take_until<'a>(
    expression: &'a str,
    chars: &mut CharIndices<'a>,
    at: usize,
    open: char,
    close: char,
) -> Result<&'a str, Error> {
    let start = at + open.len_utf8();
    let len = expression[start..]
        .find(close)
        .ok_or(Error(ErrorRepr::DelimiterNotFound {
            delimiter: close,
            position: at,
        }))?;
    let end = start + len;
    for (j, _) in chars.by_ref() {
        if j == end {
            break;
        }
    }
    Ok(&expression[start..end])
}
