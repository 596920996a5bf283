//! Intermediary representation (ir) for a parsed grammar source.
//!
//! Rule expressions are kept as raw text here, they are compiled by [`crate::Rule`].

use peg::parser;

parser! {
/// Splits a grammar source into its header, imports and rule definitions.
pub grammar jsgf() for str {
    pub rule source() -> Source
        = _ header()? _ name:grammar_name()? _ imports:(import() ** _) _ rules:(definition() ** _) _ {
            Source { name, imports, rules }
        }

    rule header()
        = "#JSGF" [^ ';']* ";"

    rule grammar_name() -> String
        = "grammar" __ n:$([^ ';' | ' ' | '\t' | '\n' | '\r']+) _ ";" { n.to_string() }

    rule import() -> String
        = "import" _ r:reference() _ ";" { r }

    rule definition() -> Definition
        = public:("public" __)? name:reference() _ "=" _ expression:expression() {
            Definition { public: public.is_some(), name, expression }
        }

    rule reference() -> String
        = r:$("<" [^ '>']* ">") { r.to_string() }

    // everything up to and including the first `;` that is not escaped, quoted
    // or inside an annotation or reference
    rule expression() -> String
        = e:$(expression_char()* ";") { e.to_string() }

    rule expression_char()
        = "\\" [_]
        / "\"" [^ '"']* "\""
        / "/" [^ '/']* "/"
        / "{" [^ '}']* "}"
        / "<" [^ '>']* ">"
        / [^ ';']

    rule _ = quiet!{ (whitespace() / comment())* }
    rule __ = quiet!{ (whitespace() / comment())+ }

    rule whitespace() = [' ' | '\t' | '\n' | '\r']

    rule comment()
        = "//" [^ '\n']*
        / "/*" (!"*/" [_])* "*/"
}}

#[derive(Debug, PartialEq)]
pub struct Source {
    pub name: Option<String>,
    pub imports: Vec<String>,
    pub rules: Vec<Definition>,
}

#[derive(Debug, PartialEq)]
pub struct Definition {
    pub public: bool,
    pub name: String,
    pub expression: String,
}
