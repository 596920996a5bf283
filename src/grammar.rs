use crate::error::ErrorRepr;
use crate::Error;
use crate::{ir, Options, Rule, Visitor};

use arbitrary::Unstructured;
use fxhash::{FxHashMap, FxHashSet};
use log::debug;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::{fmt, str::FromStr};

/// A set of named rules compiled into graphs, producing the sentences the public rules accept.
///
/// # Implementation
/// ## Construction
/// `Grammar` is constructed using `from_str` of a grammar source, or with [`Grammar::define`]
/// and [`Grammar::insert`]:
/// - A peg parser splits the source into rule definitions (in ir.rs).
/// - Each rule expression is tokenized and built into a graph (see [`Rule::new`]).
/// - [`Grammar::resolve`] checks that no rule can reach itself, then splices
///   referenced graphs into their referencers, referenced rules first.
///
/// ## Sentence Generation
/// Every path of a resolved rule's graph, from its start to its end sentinel, spells one
/// sentence. [`Grammar::productions`] enumerates all of them, [`Grammar::sample`] walks one
/// path, choosing among branches by weight with `Unstructured`.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    name: Option<String>,
    imports: Vec<String>,
    // declaration order
    order: Vec<String>,
    rules: FxHashMap<String, Rule>,
    options: Options,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Parses and resolves a grammar source.
    pub fn parse_with(source: &str, options: Options) -> Result<Self, Error> {
        let parsed = ir::jsgf::source(source).map_err(|e| Error(ErrorRepr::Grammar(e)))?;

        let mut names: HashSet<&str> = HashSet::with_capacity(parsed.rules.len());
        let dups: HashSet<String> = parsed
            .rules
            .iter()
            .filter(|d| !names.insert(d.name.as_str()))
            .map(|d| d.name.clone())
            .collect();
        if !dups.is_empty() {
            return Err(Error(ErrorRepr::DuplicateRules(dups)));
        }

        let mut grammar = Self::with_options(options);
        grammar.name = parsed.name;
        grammar.imports = parsed.imports;
        for def in parsed.rules.iter() {
            grammar.define(&def.name, &def.expression, def.public)?;
        }
        grammar.resolve()?;
        Ok(grammar)
    }

    /// Compiles `expression` with this grammar's character table and adds it as `name`.
    pub fn define(&mut self, name: &str, expression: &str, public: bool) -> Result<(), Error> {
        let rule = Rule::with_chars(expression, public, &self.options.chars)?;
        self.insert(name, rule)
    }

    /// Adds `rule` as `name`. Names include their brackets, e.g. `<city>`.
    pub fn insert(&mut self, name: &str, rule: Rule) -> Result<(), Error> {
        if name.trim().is_empty() || name.trim() == "<>" {
            return Err(Error(ErrorRepr::BlankRuleName));
        }
        if self.rules.contains_key(name) {
            return Err(Error(ErrorRepr::DuplicateRules(
                [name.to_string()].into_iter().collect(),
            )));
        }
        self.order.push(name.to_string());
        self.rules.insert(name.to_string(), rule);
        Ok(())
    }

    /// Adds every rule of `other` not defined here, as a private rule.
    ///
    /// This is how rules of imported grammars become available to references.
    pub fn merge(&mut self, other: &Grammar) {
        for (name, rule) in other.rules() {
            if !self.rules.contains_key(name) {
                self.order.push(name.to_string());
                self.rules
                    .insert(name.to_string(), rule.clone().into_private());
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.order
            .iter()
            .filter_map(|n| self.rules.get(n).map(|r| (n.as_str(), r)))
    }

    pub fn public_rules(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules().filter(|(_, r)| r.is_public())
    }

    /// Fails if any rule can reach itself through references.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, rule) in self.rules() {
            rule.validate_recursion(name, &self.rules)?;
        }
        Ok(())
    }

    /// Returns rule names in breadth first order of references, starting from every public rule.
    ///
    /// A name appears once per way it is reached, so a rule always appears after
    /// every appearance of a rule referencing it.
    pub fn composition_order(&self) -> Result<Vec<String>, Error> {
        self.validate()?;
        let mut order = Vec::new();
        let mut queue: VecDeque<&str> = self.public_rules().map(|(n, _)| n).collect();
        while let Some(name) = queue.pop_front() {
            if let Some(rule) = self.rules.get(name) {
                queue.extend(rule.references().iter().map(String::as_str));
            }
            order.push(name.to_string());
        }
        Ok(order)
    }

    /// Splices every rule reachable from a public rule with the rules it references.
    ///
    /// Rules are handled in reverse composition order, each one once, so a referenced
    /// rule is already resolved when it is spliced in.
    pub fn resolve(&mut self) -> Result<(), Error> {
        let order = self.composition_order()?;
        debug!("composition order: {:?}", order);

        let mut seen = FxHashSet::default();
        for name in order.iter().rev() {
            if !seen.insert(name.as_str()) {
                continue;
            }
            // unknown names are reported by the rule referencing them
            let Some(rule) = self.rules.get(name) else {
                continue;
            };
            let mut resolved = rule.resolve_references(&self.rules)?;
            if self.options.minimize {
                resolved = resolved.minimized();
            }
            debug!(
                "resolved {}: {} tokens, {} edges",
                name,
                resolved.tokens().len(),
                resolved.graph().edges().len()
            );
            self.rules.insert(name.clone(), resolved);
        }
        Ok(())
    }

    /// Returns the formatted sentences of every public rule.
    pub fn productions(&self) -> Result<BTreeSet<String>, Error> {
        let mut all = BTreeSet::new();
        for (_, rule) in self.public_rules() {
            for sentence in rule.productions(self.options.max_paths)? {
                all.extend(self.options.format(&sentence));
            }
        }
        Ok(all)
    }

    /// Returns a formatted sentence of a public rule, both chosen with `u`.
    ///
    /// Fails if the chosen path spells nothing once formatted, as such a sentence
    /// is never among [`Grammar::productions`].
    pub fn sample(&self, u: &mut Unstructured<'_>) -> Result<String, Error> {
        let public: Vec<&Rule> = self.public_rules().map(|(_, r)| r).collect();
        if public.is_empty() {
            return Err(Error(ErrorRepr::EmptyChoice));
        }
        let rule = u.choose(&public)?;
        let sentence: String = rule.sample(u)?;
        self.options
            .format(&sentence)
            .ok_or(Error(ErrorRepr::EmptySentence))
    }

    /// Materializes a weighted random path of the rule `name`.
    pub fn sample_rule<V: Visitor>(
        &self,
        name: &str,
        u: &mut Unstructured<'_>,
    ) -> Result<V, Error> {
        self.rules
            .get(name)
            .ok_or_else(|| Error(ErrorRepr::UnknownRule(name.to_string())))?
            .sample(u)
    }
}

/// Prints the rules as they were defined.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for (name, rule) in self.rules() {
            if rule.is_public() {
                write!(f, "public ")?;
            }
            writeln!(f, "{} = {}", name, rule.expression())?;
        }
        Ok(())
    }
}

impl FromStr for Grammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, Options::default())
    }
}
