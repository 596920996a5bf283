use crate::error::ErrorRepr;
use crate::Error;
use std::ops::Range;

/// Splits the weight annotation at `span` off a terminal: `brew/0.2/` with span
/// `4..9` becomes `("brew", 0.2)`.
///
/// `span` covers the annotation with both delimiters, as recorded by
/// [`crate::tokenize`]. The text around it is kept as is.
pub fn parse_weight(
    text: &str,
    span: Range<usize>,
    delimiter: char,
) -> Result<(String, f64), Error> {
    let malformed = || Error(ErrorRepr::MalformedWeight(text.to_string()));
    let value = text
        .get(span.clone())
        .and_then(|a| a.strip_prefix(delimiter))
        .and_then(|a| a.strip_suffix(delimiter))
        .ok_or_else(malformed)?
        .trim();
    if value.is_empty() {
        return Err(Error(ErrorRepr::EmptyWeight(text.to_string())));
    }

    let weight: f64 = value.parse().map_err(|_| malformed())?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(malformed());
    }

    let mut stripped = String::with_capacity(text.len());
    stripped.push_str(&text[..span.start]);
    stripped.push_str(&text[span.end..]);
    Ok((stripped, weight))
}
