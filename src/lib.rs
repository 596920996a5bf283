#![allow(rustdoc::bare_urls)]
#![doc = include_str!("../README.md")]

mod builder;
mod error;
mod grammar;
mod graph;
mod ir;
mod options;
mod rule;
mod token;
mod visitor;
mod weight;

pub use builder::build;
pub use error::{Error, ErrorKind};
pub use grammar::Grammar;
pub use graph::{choose_weighted, Edge, Graph, Path};
pub use options::Options;
pub use rule::Rule;
pub use token::{tokenize, CharTable, Structural, Token};
pub use visitor::Visitor;
pub use weight::parse_weight;
