use crate::error::ErrorRepr;
use crate::graph::{Graph, Path};
use crate::token::{tokenize, CharTable, Token};
use crate::{build, Error, Visitor};

use arbitrary::Unstructured;
use fxhash::{FxHashMap, FxHashSet};
use log::trace;

/// One named production of a grammar: `[public] <name> = expression;`.
///
/// A rule owns its compiled graph. Resolving its references returns a new rule
/// whose graph has the referenced rules' graphs spliced in, see [`Rule::resolve_references`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    expression: String,
    public: bool,
    // unique, in order of first occurrence
    references: Vec<String>,
    graph: Graph,
    // `template[i]` == text node `i` contributes to a sentence, "" for structural nodes
    template: Vec<String>,
}

impl Rule {
    /// Compiles `expression` (everything right of `=`, including the closing `;`)
    /// with the default character table.
    pub fn new(expression: &str, public: bool) -> Result<Self, Error> {
        Self::with_chars(expression, public, &CharTable::default())
    }

    pub fn with_chars(expression: &str, public: bool, table: &CharTable) -> Result<Self, Error> {
        let tokens = tokenize(expression, table)?;
        let mut references: Vec<String> = Vec::new();
        for name in tokens.iter().filter_map(Token::as_reference) {
            if !references.iter().any(|r| r == name) {
                references.push(name.to_string());
            }
        }
        let graph = build(&tokens)?.apply_weights(table.weight)?;
        Ok(Self {
            expression: expression.to_string(),
            public,
            references,
            template: template(graph.tokens()),
            graph,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Referenced rule names, brackets included, in order of first occurrence.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn tokens(&self) -> &[Token] {
        self.graph.tokens()
    }

    pub fn template(&self) -> &[String] {
        &self.template
    }

    pub(crate) fn into_private(self) -> Self {
        Self {
            public: false,
            ..self
        }
    }

    /// Returns this rule with structural nodes elided from its graph, see [`Graph::minimize`].
    pub fn minimized(&self) -> Self {
        Self {
            graph: self.graph.minimize(),
            ..self.clone()
        }
    }

    /// Returns a rule with every reference to a rule of `table` replaced by that
    /// rule's graph.
    ///
    /// Referenced rules are spliced in as they are, so they should be resolved
    /// first. [`crate::Grammar`] takes care of that ordering.
    pub fn resolve_references(&self, table: &FxHashMap<String, Rule>) -> Result<Self, Error> {
        if self.references.is_empty() {
            return Ok(self.clone());
        }

        // placeholders already spliced over have no edges left
        let connected: FxHashSet<usize> = self
            .graph
            .edges()
            .iter()
            .flat_map(|e| [e.from, e.to])
            .collect();
        let own = self.graph.tokens();
        let mut graph = self.graph.clone();
        for name in self.references.iter().filter(|n| !n.trim().is_empty()) {
            let referenced = table
                .get(name)
                .ok_or_else(|| Error(ErrorRepr::UnknownReference(name.clone())))?;
            for (i, _) in own.iter().enumerate().filter(|(i, t)| {
                connected.contains(i) && t.as_reference() == Some(name.as_str())
            }) {
                trace!("inlining {} at {}", name, i);
                graph = graph.compose(&referenced.graph, i)?;
            }
        }

        Ok(Self {
            template: template(graph.tokens()),
            graph,
            ..self.clone()
        })
    }

    /// Fails if `name` can be reached again by following references from this rule.
    ///
    /// References missing from `table` are not followed.
    pub fn validate_recursion(
        &self,
        name: &str,
        table: &FxHashMap<String, Rule>,
    ) -> Result<(), Error> {
        let mut seen = FxHashSet::default();
        let mut to_visit: Vec<&str> = self.references.iter().map(String::as_str).collect();
        while let Some(reference) = to_visit.pop() {
            if reference == name {
                return Err(Error(ErrorRepr::SelfReference(name.to_string())));
            }
            if !seen.insert(reference) {
                continue;
            }
            if let Some(rule) = table.get(reference) {
                to_visit.extend(rule.references.iter().map(String::as_str));
            }
        }
        Ok(())
    }

    /// Feeds the nodes of `path` and their text to a new `V`.
    pub fn materialize<V: Visitor>(&self, path: &[usize]) -> V {
        let mut visitor = V::new();
        let tokens = self.graph.tokens();
        for &p in path {
            visitor.visit_node(p);
            let text = self.template.get(p).map_or("", String::as_str);
            match tokens.get(p) {
                Some(Token::Reference(_)) => visitor.visit_reference(text),
                _ if !text.is_empty() => visitor.visit_text(text),
                _ => (),
            }
        }
        visitor
    }

    /// Materializes every path of the graph, see [`Graph::all_paths`].
    pub fn enumerate<V: Visitor>(&self, max_paths: Option<usize>) -> Result<Vec<V>, Error> {
        Ok(self
            .graph
            .all_paths(max_paths)?
            .iter()
            .map(|p| self.materialize(p))
            .collect())
    }

    /// Returns the sentence of every path, leaving out empty ones.
    pub fn productions(&self, max_paths: Option<usize>) -> Result<Vec<String>, Error> {
        let mut sentences: Vec<String> = self.enumerate(max_paths)?;
        sentences.retain(|s| !s.is_empty());
        Ok(sentences)
    }

    /// Materializes one weighted random path, see [`Graph::random_path`].
    pub fn sample<V: Visitor>(&self, u: &mut Unstructured<'_>) -> Result<V, Error> {
        let path: Path = self.graph.random_path(u)?;
        Ok(self.materialize(&path))
    }
}

fn template(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(|t| t.text().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rules: &[(&str, &str)]) -> FxHashMap<String, Rule> {
        rules
            .iter()
            .map(|(name, e)| (name.to_string(), Rule::new(e, true).unwrap()))
            .collect()
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn references_in_first_order() {
        let rule = Rule::new("<b> <a> (<b>|<c>) <a>;", true).unwrap();
        assert_eq!(rule.references(), ["<b>", "<a>", "<c>"]);
        assert!(Rule::new("plain;", false).unwrap().references().is_empty());
    }

    #[test]
    fn template_blanks_structure() {
        let rule = Rule::new("a[ b/2/];", true).unwrap();
        assert_eq!(rule.template(), ["", "a", "", " b", "", "", ""]);
    }

    #[test]
    fn productions() {
        let p = |e: &str| sorted(Rule::new(e, true).unwrap().productions(None).unwrap());
        assert_eq!(p("a|b|c;"), ["a", "b", "c"]);
        assert_eq!(p("a[b];"), ["a", "ab"]);
        assert_eq!(p("[a];"), ["a"]);
        assert_eq!(
            p("six[ seven][ eight];"),
            ["six", "six eight", "six seven", "six seven eight"]
        );
        assert!(p("").is_empty());
    }

    #[test]
    fn literal_slashes() {
        let p = |e: &str| sorted(Rule::new(e, true).unwrap().productions(None).unwrap());
        assert_eq!(p(r"a\/b;"), ["a/b"]);
        assert_eq!(p(r"x\/3\/;"), ["x/3/"]);
        assert_eq!(p(r#""1/2" cup;"#), ["1/2 cup"]);
        assert_eq!(p("tea{a/b};"), ["tea{a/b}"]);
        assert_eq!(p(r#""1/2" cup/0/ | "3/4" cup;"#), [" 3/4 cup", "1/2 cup "]);
    }

    #[test]
    fn suffix_weights_rejected() {
        for e in ["<a>/0/ | <b>/1/;", "(x)/0/ | y;"] {
            assert_eq!(
                Rule::new(e, true).unwrap_err().kind(),
                crate::ErrorKind::Weight
            );
        }
        let rule = Rule::new("/0/ <a> | /1/ <b>;", true).unwrap();
        let data = [0xa5u8; 64];
        let mut u = Unstructured::new(&data);
        for _ in 0..10 {
            assert_eq!(rule.sample::<String>(&mut u).unwrap(), "  <b>");
        }
    }

    #[test]
    fn resolves_reference() {
        let t = table(&[("<a>", "123;")]);
        let h = Rule::new("<a>bc;", true).unwrap();
        let resolved = h.resolve_references(&t).unwrap();
        assert_eq!(resolved.productions(None).unwrap(), ["123bc"]);
        assert_eq!(resolved.references(), ["<a>"]);
        assert_eq!(resolved.expression(), h.expression());
        // the original is untouched
        assert_eq!(h.productions(None).unwrap(), ["<a>bc"]);
    }

    #[test]
    fn resolves_each_occurrence() {
        let t = table(&[("<d>", "0|1;"), ("<s>", "+|-;")]);
        let rule = Rule::new("<d><s><d>;", true).unwrap();
        let resolved = rule.resolve_references(&t).unwrap();
        let p = sorted(resolved.productions(None).unwrap());
        assert_eq!(p.len(), 8);
        assert_eq!(p[0], "0+0");
        assert_eq!(p[7], "1-1");
        assert_eq!(sorted(resolved.minimized().productions(None).unwrap()), p);
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let t = table(&[("<a>", "x|y;")]);
        let once = Rule::new("<a>-<a>;", true)
            .unwrap()
            .resolve_references(&t)
            .unwrap();
        assert_eq!(once.resolve_references(&t).unwrap(), once);
        assert_eq!(once.productions(None).unwrap().len(), 4);
    }

    #[test]
    fn unknown_reference() {
        let rule = Rule::new("<nope>;", true).unwrap();
        assert_eq!(
            rule.resolve_references(&FxHashMap::default()),
            Err(Error(ErrorRepr::UnknownReference("<nope>".into())))
        );
    }

    #[test]
    fn self_recursion() {
        let t = table(&[("<rule>", "<rule>;")]);
        assert_eq!(
            t["<rule>"].validate_recursion("<rule>", &t),
            Err(Error(ErrorRepr::SelfReference("<rule>".into())))
        );

        let t = table(&[("<a>", "<b>;"), ("<b>", "x<c>;"), ("<c>", "[<a>];")]);
        for name in ["<a>", "<b>", "<c>"] {
            assert!(t[name].validate_recursion(name, &t).is_err());
        }

        // a cycle elsewhere does not concern `<top>`
        let t = table(&[("<top>", "<x>;"), ("<x>", "<y>;"), ("<y>", "<x>;")]);
        assert!(t["<top>"].validate_recursion("<top>", &t).is_ok());
    }

    #[test]
    fn sample_picks_weighted() {
        let rule = Rule::new("a/0/|b/1/|c/0/;", true).unwrap();
        let data = [0x5au8; 64];
        let mut u = Unstructured::new(&data);
        for _ in 0..100 {
            assert_eq!(rule.sample::<String>(&mut u).unwrap(), "b");
        }
    }

    #[test]
    fn materialize_unresolved() {
        let rule = Rule::new("hi <name>;", true).unwrap();
        let path = &rule.graph().all_paths(None).unwrap()[0];
        let (s, nodes): (String, Vec<usize>) = rule.materialize(path);
        assert_eq!(s, "hi <name>");
        assert_eq!(nodes, *path);
    }
}
