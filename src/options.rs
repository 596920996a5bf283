use crate::token::CharTable;

/// Settings for compiling a [`crate::Grammar`] and formatting its sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Characters with a special meaning in rule expressions.
    pub chars: CharTable,
    /// Elide structural nodes from every rule once it is resolved.
    pub minimize: bool,
    /// Upper bound on the paths enumerated per rule, `None` for no bound.
    pub max_paths: Option<usize>,
    /// Collapse whitespace runs to one space and trim both ends of sentences.
    pub trim: bool,
    /// Drop `{tag}` annotations from sentences.
    pub strip_tags: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chars: CharTable::default(),
            minimize: true,
            max_paths: Some(100_000),
            trim: true,
            strip_tags: false,
        }
    }
}

impl Options {
    /// Applies the cosmetic settings to a raw sentence. Returns `None` if nothing is left.
    pub fn format(&self, sentence: &str) -> Option<String> {
        let mut s = if self.strip_tags {
            strip_tags(sentence, self.chars.tag)
        } else {
            sentence.to_string()
        };
        if self.trim {
            s = s.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        (!s.is_empty()).then_some(s)
    }
}

fn strip_tags(sentence: &str, (open, close): (char, char)) -> String {
    let mut out = String::with_capacity(sentence.len());
    let mut rest = sentence;
    while let Some(i) = rest.find(open) {
        out.push_str(&rest[..i]);
        match rest[i..].find(close) {
            Some(j) => rest = &rest[i + j + close.len_utf8()..],
            None => {
                rest = &rest[i..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims() {
        let o = Options::default();
        assert_eq!(o.format("  good   morning "), Some("good morning".into()));
        assert_eq!(o.format(" \t "), None);
        assert_eq!(o.format("a{x}"), Some("a{x}".into()));
    }

    #[test]
    fn strips_tags() {
        let o = Options {
            strip_tags: true,
            ..Default::default()
        };
        assert_eq!(o.format("turn {on} the light{x}"), Some("turn the light".into()));
        assert_eq!(o.format("{only}"), None);
        assert_eq!(o.format("open {brace"), Some("open {brace".into()));

        let raw = Options {
            strip_tags: true,
            trim: false,
            ..Default::default()
        };
        assert_eq!(raw.format("a {b} c"), Some("a  c".into()));
    }
}
