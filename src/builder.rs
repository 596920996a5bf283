use crate::error::ErrorRepr;
use crate::graph::{Edge, Graph};
use crate::token::{Structural, Token};
use crate::Error;

use fxhash::FxHashMap;

/// Builds the graph of a tokenized rule expression.
///
/// # Implementation
/// One left to right pass over `tokens`, keeping
/// - `from`: the node the next edge starts at,
/// - `open`: positions of the groups not closed yet, innermost last. The start
///   sentinel opens the outermost group.
/// - `branches[g]`: ends of the alternatives already seen inside group `g`.
///
/// A closing `)` or `]` joins every recorded alternative end of its group to itself.
/// `]` additionally gets an edge straight from its opening `[`, so the optional
/// group can be skipped.
pub fn build(tokens: &[Token]) -> Result<Graph, Error> {
    let mut builder = Builder::default();
    for (i, token) in tokens.iter().enumerate() {
        builder.visit(i, token, tokens)?;
    }
    if let Some(unclosed) = builder.open.get(1) {
        return Err(Error(ErrorRepr::UnbalancedGroup(*unclosed)));
    }
    Ok(Graph::new(tokens.to_vec(), builder.edges))
}

#[derive(Default)]
struct Builder {
    from: usize,
    open: Vec<usize>,
    branches: FxHashMap<usize, Vec<usize>>,
    edges: Vec<Edge>,
}

impl Builder {
    fn visit(&mut self, i: usize, token: &Token, tokens: &[Token]) -> Result<(), Error> {
        match token {
            Token::Start => {
                self.open.push(i);
                self.from = i;
            }
            Token::Structural(Structural::OpenGroup | Structural::OpenOptional) => {
                self.close(i);
                self.open.push(i);
            }
            Token::Structural(s @ (Structural::CloseGroup | Structural::CloseOptional)) => {
                let start = self.pop(i)?;
                if tokens[start] != Token::Structural(s.opener().unwrap_or(*s)) {
                    return Err(Error(ErrorRepr::UnbalancedGroup(i)));
                }
                for end in self.branches.remove(&start).unwrap_or_default() {
                    self.edges.push(Edge::new(end, i));
                }
                if *s == Structural::CloseOptional {
                    self.edges.push(Edge::new(start, i));
                }
                self.close(i);
            }
            Token::Structural(Structural::Alternative) => {
                let start = self.pop(i)?;
                self.branches.entry(start).or_default().push(self.from);
                self.open.push(start);
                self.from = start;
            }
            Token::Structural(Structural::Terminator) => {
                self.close(i);
                for group in self.open.iter() {
                    for end in self.branches.get(group).into_iter().flatten() {
                        self.edges.push(Edge::new(*end, i));
                    }
                }
            }
            Token::End | Token::Reference(_) | Token::Text(..) => self.close(i),
        }
        Ok(())
    }

    /// Adds the edge `from -> i` and continues from `i`.
    fn close(&mut self, i: usize) {
        self.edges.push(Edge::new(self.from, i));
        self.from = i;
    }

    /// Pops the innermost nested group. The start sentinel's group is never popped
    /// for good: `|` pushes it back right away.
    fn pop(&mut self, i: usize) -> Result<usize, Error> {
        match self.open.pop() {
            Some(start) => Ok(start),
            None => Err(Error(ErrorRepr::UnbalancedGroup(i))),
        }
    }
}
