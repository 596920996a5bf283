use crate::error::ErrorRepr;
use crate::token::Token;
use crate::{parse_weight, Error};

use arbitrary::Unstructured;
use fxhash::{FxHashMap, FxHashSet};
use log::trace;
use std::collections::VecDeque;
use std::fmt;

/// A directed transition between two token positions of one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    /// `None` behaves as a weight of 1.0.
    pub weight: Option<f64>,
}

impl Edge {
    pub const fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            weight: None,
        }
    }

    pub const fn weighted(from: usize, to: usize, weight: f64) -> Self {
        Self {
            from,
            to,
            weight: Some(weight),
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Node positions from source to sink, inclusive.
pub type Path = Vec<usize>;

/// Tokens connected by edges, where a token's position is its node id.
///
/// Graphs are built acyclic (see [`crate::build`]) and stay acyclic under
/// [`Graph::compose`] and [`Graph::minimize`], which return new graphs.
///
/// `children[i]` == the `to` of every edge leaving `i`, in edge order.
/// `weights[(i, j)]` == the weight of the edge `i -> j` if one was set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    tokens: Vec<Token>,
    edges: Vec<Edge>,
    children: FxHashMap<usize, Vec<usize>>,
    weights: FxHashMap<(usize, usize), f64>,
}

impl Graph {
    /// Creates a graph, collapsing edges that share `(from, to)`, see [`Graph::minimize`].
    pub fn new(tokens: Vec<Token>, edges: Vec<Edge>) -> Self {
        debug_assert!(edges
            .iter()
            .all(|e| e.from < tokens.len() && e.to < tokens.len()));
        let edges = dedup(edges);
        let mut children: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let mut weights = FxHashMap::default();
        for e in edges.iter() {
            children.entry(e.from).or_default().push(e.to);
            if let Some(w) = e.weight {
                weights.insert((e.from, e.to), w);
            }
        }
        Self {
            tokens,
            edges,
            children,
            weights,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns `true` if the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn children(&self, node: usize) -> &[usize] {
        self.children.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Weight of the edge `from -> to`, 1.0 if it was never set.
    pub fn weight(&self, from: usize, to: usize) -> f64 {
        self.weights.get(&(from, to)).copied().unwrap_or(1.0)
    }

    /// Returns `(source, sink)`: the first `from` that is never a `to` and the
    /// first `to` that is never a `from`, in `(from, to)` order.
    ///
    /// Both are 0 for a graph without edges. The result is only meaningful
    /// for graphs with a single connected component.
    pub fn endpoints(&self) -> (usize, usize) {
        let mut sorted: Vec<_> = self.edges.iter().map(|e| (e.from, e.to)).collect();
        sorted.sort_unstable();
        let froms: FxHashSet<usize> = sorted.iter().map(|(f, _)| *f).collect();
        let tos: FxHashSet<usize> = sorted.iter().map(|(_, t)| *t).collect();
        let source = sorted
            .iter()
            .map(|(f, _)| *f)
            .find(|f| !tos.contains(f))
            .unwrap_or(0);
        let sink = sorted
            .iter()
            .map(|(_, t)| *t)
            .find(|t| !froms.contains(t))
            .unwrap_or(0);
        (source, sink)
    }

    /// Returns every path from source to sink, expanding partial paths breadth first.
    ///
    /// The number of paths can grow exponentially with the number of alternatives,
    /// so `max_paths` bounds the pending plus completed paths; going over it is an error.
    pub fn all_paths(&self, max_paths: Option<usize>) -> Result<Vec<Path>, Error> {
        if self.tokens.is_empty() {
            return Ok(Vec::new());
        }
        let limit = max_paths.unwrap_or(usize::MAX);
        let (source, sink) = self.endpoints();
        if self.edges.is_empty() {
            return Ok(vec![vec![source]]);
        }

        let mut done = Vec::new();
        let mut pending = VecDeque::from([vec![source]]);
        while let Some(path) = pending.pop_front() {
            let last = path[path.len() - 1];
            if last == sink {
                done.push(path);
                continue;
            }
            let (last_child, rest) = match self.children(last).split_last() {
                Some(x) => x,
                None => continue,
            };
            for child in rest {
                let mut next = path.clone();
                next.push(*child);
                pending.push_back(next);
            }
            let mut path = path;
            path.push(*last_child);
            pending.push_back(path);

            if done.len() + pending.len() > limit {
                return Err(Error(ErrorRepr::PathLimit(limit)));
            }
        }
        Ok(done)
    }

    /// Walks from source to sink, picking among several outgoing edges in proportion
    /// to their weights.
    pub fn random_path(&self, u: &mut Unstructured<'_>) -> Result<Path, Error> {
        if self.tokens.is_empty() {
            return Ok(Vec::new());
        }
        let (source, sink) = self.endpoints();
        let mut node = source;
        let mut path = vec![source];
        while node != sink {
            node = match self.children(node) {
                [] => return Err(Error(ErrorRepr::DeadEnd(node))),
                [only] => *only,
                children => {
                    let weights: Vec<f64> =
                        children.iter().map(|c| self.weight(node, *c)).collect();
                    *choose_weighted(children, &weights, u)?
                }
            };
            path.push(node);
        }
        Ok(path)
    }

    /// Inlines `guest` in place of the node at `position`.
    ///
    /// Guest nodes are renumbered past this graph's last token, edges into
    /// `position` are redirected to the guest's source and edges out of it start
    /// from the guest's sink instead. The node at `position` stays in the token
    /// list without any edges.
    pub fn compose(&self, guest: &Graph, position: usize) -> Result<Graph, Error> {
        if self.edges.is_empty() {
            return Err(Error(ErrorRepr::EmptyHost));
        }
        if guest.edges.is_empty() {
            return Err(Error(ErrorRepr::EmptyGuest));
        }
        let offset = self.tokens.len();
        if position >= offset {
            return Err(Error(ErrorRepr::PositionOutOfRange {
                position,
                max: offset - 1,
            }));
        }

        let (source, sink) = guest.endpoints();
        let (source, sink) = (source + offset, sink + offset);
        trace!(
            "splicing {} guest nodes at {} ({} -> {})",
            guest.tokens.len(),
            position,
            source,
            sink
        );

        let host_edges = self.edges.iter().map(|e| Edge {
            from: if e.from == position { sink } else { e.from },
            to: if e.to == position { source } else { e.to },
            weight: e.weight,
        });
        let guest_edges = guest.edges.iter().map(|e| Edge {
            from: e.from + offset,
            to: e.to + offset,
            weight: e.weight,
        });
        let edges = host_edges.chain(guest_edges).collect();

        let mut tokens = Vec::with_capacity(offset + guest.tokens.len());
        tokens.extend_from_slice(&self.tokens);
        tokens.extend_from_slice(&guest.tokens);
        Ok(Graph::new(tokens, edges))
    }

    /// Removes every structural node except the source and the sink, connecting
    /// each of its predecessors to each of its successors.
    ///
    /// Bridged edges carry the product of both weights. Edges left sharing
    /// `(from, to)` collapse into one carrying the largest of their weights, so
    /// a skippable blank like `a [/2/] c` yields a single `a -> c` edge of weight 2.
    pub fn minimize(&self) -> Graph {
        let (source, sink) = self.endpoints();
        let mut edges = self.edges.clone();
        for (k, token) in self.tokens.iter().enumerate() {
            if k == source || k == sink || !token.is_structural() {
                continue;
            }
            let (touching, rest): (Vec<Edge>, Vec<Edge>) =
                edges.into_iter().partition(|e| e.from == k || e.to == k);
            edges = rest;
            if touching.is_empty() {
                continue;
            }
            for x in touching.iter().filter(|e| e.to == k) {
                for y in touching.iter().filter(|e| e.from == k) {
                    let weight = match (x.weight, y.weight) {
                        (None, None) => None,
                        _ => Some(x.weight() * y.weight()),
                    };
                    edges.push(Edge {
                        from: x.from,
                        to: y.to,
                        weight,
                    });
                }
            }
            edges = dedup(edges);
        }
        trace!("minimized {} edges into {}", self.edges.len(), edges.len());
        Graph::new(self.tokens.clone(), edges)
    }

    /// Strips the `/number/` annotation the tokenizer recorded on each terminal,
    /// setting `number` as the weight of every edge leading to that terminal.
    ///
    /// Slashes the tokenizer took as text, escaped, quoted or inside tags, are
    /// left alone.
    pub fn apply_weights(&self, delimiter: char) -> Result<Graph, Error> {
        let mut tokens = self.tokens.clone();
        let mut weights = FxHashMap::default();
        for (i, token) in tokens.iter_mut().enumerate() {
            if let Token::Text(text, span) = token {
                if let Some(span) = span.take() {
                    let (stripped, weight) = parse_weight(text, span, delimiter)?;
                    *text = stripped;
                    weights.insert(i, weight);
                }
            }
        }
        if weights.is_empty() {
            return Ok(self.clone());
        }

        let edges = self
            .edges
            .iter()
            .map(|e| match weights.get(&e.to) {
                Some(w) => Edge::weighted(e.from, e.to, *w),
                None => *e,
            })
            .collect();
        Ok(Graph::new(tokens, edges))
    }
}

/// Picks one of `choices` with probability proportional to its weight.
///
/// Negative and non-finite weights count as zero.
pub fn choose_weighted<'a, T>(
    choices: &'a [T],
    weights: &[f64],
    u: &mut Unstructured<'_>,
) -> Result<&'a T, Error> {
    if choices.len() != weights.len() {
        return Err(Error(ErrorRepr::ArityMismatch {
            choices: choices.len(),
            weights: weights.len(),
        }));
    }
    if choices.is_empty() {
        return Err(Error(ErrorRepr::EmptyChoice));
    }
    let usable = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = weights.iter().map(|w| usable(*w)).sum();
    if total <= 0.0 {
        return Err(Error(ErrorRepr::ZeroWeights));
    }

    let draw = u.int_in_range(0..=u32::MAX)? as f64 / (u32::MAX as f64 + 1.0) * total;
    let mut acc = 0.0;
    let mut last = 0;
    for (i, w) in weights.iter().enumerate() {
        let w = usable(*w);
        if w == 0.0 {
            continue;
        }
        acc += w;
        last = i;
        if draw < acc {
            return Ok(&choices[i]);
        }
    }
    // rounding can leave `draw` just past the accumulated total
    Ok(&choices[last])
}

/// Collapses edges sharing `(from, to)` into the first of them, which takes the
/// largest weight among them. Unset weights count as 1.0 but stay unset if no
/// edge of the group has one.
fn dedup(edges: Vec<Edge>) -> Vec<Edge> {
    let mut index: FxHashMap<(usize, usize), usize> = FxHashMap::default();
    let mut unique: Vec<Edge> = Vec::with_capacity(edges.len());
    for e in edges {
        match index.get(&(e.from, e.to)) {
            Some(&i) => {
                let kept = &mut unique[i];
                if kept.weight.is_some() || e.weight.is_some() {
                    kept.weight = Some(kept.weight().max(e.weight()));
                }
            }
            None => {
                index.insert((e.from, e.to), unique.len());
                unique.push(e);
            }
        }
    }
    unique
}

/// Renders the graph in a DOT-like form: connected nodes with their tokens,
/// then edges, annotated when their weight is not the default.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let mut ids = itoa::Buffer::new();
        let mut nums = ryu::Buffer::new();
        let connected: FxHashSet<usize> =
            self.edges.iter().flat_map(|e| [e.from, e.to]).collect();

        writeln!(f, "digraph {{")?;
        for (i, token) in self.tokens.iter().enumerate() {
            if connected.contains(&i) {
                writeln!(f, "    {} [label={:?}];", ids.format(i), token.to_string())?;
            }
        }
        for e in self.edges.iter() {
            write!(f, "    {} -> ", ids.format(e.from))?;
            write!(f, "{}", ids.format(e.to))?;
            match e.weight {
                Some(w) => writeln!(f, " [weight={}];", nums.format(w))?,
                None => writeln!(f, ";")?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build, tokenize, CharTable};

    fn graph(expression: &str) -> Graph {
        let tokens = tokenize(expression, &CharTable::default()).unwrap();
        build(&tokens).unwrap().apply_weights('/').unwrap()
    }

    fn sorted(edges: &[Edge]) -> Vec<(usize, usize)> {
        let mut v: Vec<_> = edges.iter().map(|e| (e.from, e.to)).collect();
        v.sort_unstable();
        v
    }

    fn texts(g: &Graph, paths: &[Path]) -> Vec<String> {
        let mut v: Vec<String> = paths
            .iter()
            .map(|p| p.iter().map(|i| g.tokens()[*i].text()).collect())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn endpoints() {
        assert_eq!(Graph::default().endpoints(), (0, 0));
        let g = graph("a(b|c)d;");
        assert_eq!(g.endpoints(), (0, g.tokens().len() - 1));
    }

    #[test]
    fn concat_single_path() {
        for x in ["abc;", "a b c;", "\"x y\" z;"] {
            let g = graph(x);
            let paths = g.all_paths(None).unwrap();
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].len(), g.tokens().len());
        }
    }

    #[test]
    fn alternatives() {
        let g = graph("a|b|c;");
        let paths = g.all_paths(None).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(texts(&g, &paths), ["a", "b", "c"]);
        for p in paths.iter() {
            let terminals = p.iter().filter(|i| !g.tokens()[**i].is_structural());
            assert_eq!(terminals.count(), 1);
        }
    }

    #[test]
    fn nested_groups() {
        let g = graph("a[b(c|d)[e]]f;");
        let paths = g.all_paths(None).unwrap();
        assert_eq!(texts(&g, &paths), ["abcef", "abcf", "abdef", "abdf", "af"]);
    }

    #[test]
    fn path_limit() {
        let g = graph("(a|b)(c|d)(e|f);");
        assert_eq!(g.all_paths(Some(8)).unwrap().len(), 8);
        assert_eq!(g.all_paths(Some(7)), Err(Error(ErrorRepr::PathLimit(7))));
    }

    #[test]
    fn minimize_keeps_paths() {
        for x in ["a|b|c;", "a[b];", "six[ seven][ eight];", "(a|[b])[c|d]e;"] {
            let g = graph(x);
            let m = g.minimize();
            assert_eq!(m.endpoints(), g.endpoints());
            assert_eq!(
                texts(&m, &m.all_paths(None).unwrap()),
                texts(&g, &g.all_paths(None).unwrap())
            );
            let (source, sink) = m.endpoints();
            for e in m.edges() {
                for n in [e.from, e.to] {
                    assert!(n == source || n == sink || !m.tokens()[n].is_structural());
                }
            }
        }
    }

    #[test]
    fn minimize_idempotent() {
        for x in ["a|b|c;", "a[b];", "a[b(c|d)[e]]f;", "x/2/|[y/3/];"] {
            let once = graph(x).minimize();
            let twice = once.minimize();
            assert_eq!(sorted(once.edges()), sorted(twice.edges()));
            assert_eq!(once.edges(), twice.edges());
        }
    }

    #[test]
    fn minimize_bridges_weights() {
        let g = graph("[x/2/]|y/3/;").minimize();
        let (source, _) = g.endpoints();
        assert_eq!(g.weight(source, 2), 2.0);
        assert_eq!(g.weight(source, 5), 3.0);
    }

    #[test]
    fn minimize_merges_parallel_edges() {
        // the skip edge and the path through the weighted blank both bridge `a -> c`
        let g = graph("a [/2/] c;").minimize();
        let between: Vec<&Edge> = g.edges().iter().filter(|e| e.from == 1).collect();
        assert_eq!(between, [&Edge::weighted(1, 5, 2.0)]);
        assert_eq!(g.children(1), [5]);
        assert_eq!(g.all_paths(None).unwrap().len(), 1);

        let g = Graph::new(
            vec![Token::Start, Token::literal("a"), Token::End],
            vec![
                Edge::new(0, 1),
                Edge::weighted(0, 1, 0.5),
                Edge::new(0, 1),
                Edge::new(1, 2),
            ],
        );
        assert_eq!(g.edges(), [Edge::weighted(0, 1, 1.0), Edge::new(1, 2)]);
        assert_eq!(g.weight(0, 1), 1.0);
    }

    #[test]
    fn compose_splices_guest() {
        let host = graph("<a>bc;");
        let guest = graph("1(2|3);");
        let g = host.compose(&guest, 1).unwrap();
        assert_eq!(g.tokens().len(), host.tokens().len() + guest.tokens().len());
        assert!(g.edges().iter().all(|e| e.from != 1 && e.to != 1));
        assert_eq!(g.endpoints(), host.endpoints());
        assert_eq!(texts(&g, &g.all_paths(None).unwrap()), ["12bc", "13bc"]);
    }

    #[test]
    fn compose_placeholder_round_trip() {
        // a graph whose middle node is a placeholder, filled with the graph itself
        let g = graph("abc;");
        let placeholder = Graph::new(
            vec![Token::Start, Token::Reference("<x>".into()), Token::End],
            vec![Edge::new(0, 1), Edge::new(1, 2)],
        );
        let spliced = placeholder.compose(&g, 1).unwrap();
        let paths = spliced.all_paths(None).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(texts(&spliced, &paths), ["abc"]);
        let inner: Vec<usize> = paths[0][1..paths[0].len() - 1]
            .iter()
            .map(|i| i - 3)
            .collect();
        assert_eq!(inner, g.all_paths(None).unwrap()[0]);
    }

    #[test]
    fn compose_errors() {
        let g = graph("a;");
        assert_eq!(
            g.compose(&Graph::default(), 1),
            Err(Error(ErrorRepr::EmptyGuest))
        );
        assert_eq!(
            Graph::default().compose(&g, 0),
            Err(Error(ErrorRepr::EmptyHost))
        );
        assert_eq!(
            g.compose(&g, 4),
            Err(Error(ErrorRepr::PositionOutOfRange {
                position: 4,
                max: 3
            }))
        );
    }

    #[test]
    fn weights_on_incoming_edges() {
        let g = graph("a/0/|b/1.5/|c;");
        assert_eq!(g.tokens()[1], Token::literal("a"));
        // stripping is done once
        assert_eq!(g.apply_weights('/').unwrap(), g);
        assert_eq!(g.weight(0, 1), 0.0);
        assert_eq!(g.weight(0, 3), 1.5);
        assert_eq!(g.weight(0, 5), 1.0);
        assert_eq!(g.weight(5, 6), 1.0);

        let tokens = tokenize("a//;", &CharTable::default()).unwrap();
        assert_eq!(
            build(&tokens).unwrap().apply_weights('/').unwrap_err().kind(),
            crate::ErrorKind::Weight
        );
    }

    #[test]
    fn only_recorded_annotations_are_weights() {
        for (x, text) in [
            (r"a\/b;", "a/b"),
            (r"x\/3\/;", "x/3/"),
            (r#""1/2" cup;"#, "1/2 cup"),
            ("tea{a/b};", "tea{a/b}"),
        ] {
            let g = graph(x);
            assert_eq!(g.tokens()[1], Token::literal(text));
            assert!(g.edges().iter().all(|e| e.weight.is_none()), "{}", x);
        }
        let g = graph(r#""1/2" cup/4/|x;"#);
        assert_eq!(g.tokens()[1], Token::literal("1/2 cup"));
        assert_eq!(g.weight(0, 1), 4.0);
    }

    #[test]
    fn random_path_follows_weights() {
        let g = graph("a/0/|b/1/|c/0/;");
        let mut buf = [0u8; 4096];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i * 31 % 251) as u8;
        }
        let mut u = Unstructured::new(&buf);
        for _ in 0..1000 {
            let path = g.random_path(&mut u).unwrap();
            assert_eq!(texts(&g, &[path]), ["b"]);
        }
    }

    #[test]
    fn random_path_errors() {
        let mut u = Unstructured::new(&[1, 2, 3, 4]);
        let g = graph("a/0/|b/0/;");
        assert_eq!(g.random_path(&mut u), Err(Error(ErrorRepr::ZeroWeights)));

        // `c` is a leaf after the sink `END`, so a walk through `b` gets stuck on it
        let dead = Graph::new(
            vec![
                Token::Start,
                Token::literal("a"),
                Token::literal("b"),
                Token::End,
                Token::literal("c"),
            ],
            vec![Edge::new(0, 1), Edge::new(0, 2), Edge::new(1, 3), Edge::new(2, 4)],
        );
        assert_eq!(dead.endpoints(), (0, 3));
        let mut saw_dead_end = false;
        for seed in 0..=255u8 {
            let data = [seed; 8];
            let mut u = Unstructured::new(&data);
            match dead.random_path(&mut u) {
                Ok(path) => assert_eq!(path, [0, 1, 3]),
                Err(e) => {
                    assert_eq!(e, Error(ErrorRepr::DeadEnd(4)));
                    saw_dead_end = true;
                }
            }
        }
        assert!(saw_dead_end);
    }

    #[test]
    fn choose_weighted_errors() {
        let mut u = Unstructured::new(&[0; 8]);
        assert_eq!(
            choose_weighted(&[1, 2], &[1.0], &mut u),
            Err(Error(ErrorRepr::ArityMismatch {
                choices: 2,
                weights: 1
            }))
        );
        assert_eq!(
            choose_weighted::<u8>(&[], &[], &mut u),
            Err(Error(ErrorRepr::EmptyChoice))
        );
        assert_eq!(
            choose_weighted(&[1, 2], &[0.0, -1.0], &mut u),
            Err(Error(ErrorRepr::ZeroWeights))
        );
        assert_eq!(choose_weighted(&[1, 2], &[0.0, 2.0], &mut u), Ok(&2));
    }

    #[test]
    fn display() {
        let g = graph("a/0.5/;");
        let s = g.to_string();
        assert!(s.starts_with("digraph {"));
        assert!(s.contains("0 -> 1 [weight=0.5];"));
        assert!(s.contains("1 [label=\"\\\"a\\\"\"];"));
    }
}
