//! Recursive-descent parser for placeholder expressions.
//!
//! Produces a small expression tree covering the supported grammar:
//!
//! ```text
//! expr    := postfix ( '||' postfix )*
//! postfix := primary trailer*
//! primary := string-literal | '$json' | "$('<node>')" | ident
//! trailer := '.' segment | '[' int ']'
//!          | '.trim()' | '.toJsonString()'
//!          | '.map(' ident '=>' ident '.' ident ')' '.join(' string ')'
//!          | '.join(' string ')'
//! ```
//!
//! Parsing is all-or-nothing: any token sequence outside the grammar
//! returns `None`, and the evaluator falls back to its conservative
//! defaults. Nothing here allocates an error.

use crate::template::lexer::Token;

/// A parsed placeholder expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `'literal'` or `"literal"`.
    Literal(String),
    /// `$json` with no path: the whole primary data scope.
    JsonRoot,
    /// `$json.<path>` as pre-split segments.
    JsonPath(Vec<String>),
    /// `$('<node>').first().json` with an optional trailing path.
    NodeRef { node: String, path: Vec<String> },
    /// A bare identifier resolved against `vars`, then `json`.
    Var(String),
    /// `$json.<path>.map(item => item.<field>).join('<delim>')`,
    /// the map clause optional.
    Join {
        base: Vec<String>,
        map_field: Option<String>,
        delimiter: String,
    },
    /// Postfix `.trim()`.
    Trim(Box<Expr>),
    /// Postfix `.toJsonString()`.
    ToJsonString(Box<Expr>),
    /// `a || b || c`: the first operand with a non-empty rendering wins.
    FirstNonEmpty(Vec<Expr>),
}

/// Parse a full token stream into an expression. Trailing tokens are a
/// parse failure.
pub fn parse(tokens: &[Token]) -> Option<Expr> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.alternation()?;
    if parser.pos == tokens.len() {
        Some(expr)
    } else {
        None
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

/// Postfix parse state: still extending a path, or already folded into a
/// finished expression node.
enum Pending {
    Json(Vec<String>),
    Node { node: String, path: Vec<String> },
    Done(Expr),
}

impl Pending {
    fn finish(self) -> Expr {
        match self {
            Pending::Json(segments) if segments.is_empty() => Expr::JsonRoot,
            Pending::Json(segments) => Expr::JsonPath(segments),
            Pending::Node { node, path } => Expr::NodeRef { node, path },
            Pending::Done(expr) => expr,
        }
    }

    fn segments_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Pending::Json(segments) => Some(segments),
            Pending::Node { path, .. } => Some(path),
            Pending::Done(_) => None,
        }
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        match self.next()? {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn expect_str(&mut self) -> Option<String> {
        match self.next()? {
            Token::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn alternation(&mut self) -> Option<Expr> {
        let first = self.postfix()?;
        let mut operands = vec![first];
        while self.eat(&Token::OrOr) {
            operands.push(self.postfix()?);
        }
        if operands.len() == 1 {
            operands.pop()
        } else {
            Some(Expr::FirstNonEmpty(operands))
        }
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut pending = self.primary()?;

        loop {
            if self.eat(&Token::Dot) {
                match self.next()? {
                    Token::Ident(name) => match name.as_str() {
                        "trim" => {
                            self.expect_call0()?;
                            pending = Pending::Done(Expr::Trim(Box::new(pending.finish())));
                        }
                        "toJsonString" => {
                            self.expect_call0()?;
                            pending =
                                Pending::Done(Expr::ToJsonString(Box::new(pending.finish())));
                        }
                        "map" => {
                            let field = self.map_clause()?;
                            let delimiter = self.join_clause()?;
                            pending = match pending {
                                Pending::Json(base) => Pending::Done(Expr::Join {
                                    base,
                                    map_field: Some(field),
                                    delimiter,
                                }),
                                _ => return None,
                            };
                        }
                        "join" => {
                            let delimiter = self.join_call_args()?;
                            pending = match pending {
                                Pending::Json(base) => Pending::Done(Expr::Join {
                                    base,
                                    map_field: None,
                                    delimiter,
                                }),
                                _ => return None,
                            };
                        }
                        _ => {
                            pending.segments_mut()?.push(name.clone());
                        }
                    },
                    Token::Int(index) => {
                        pending.segments_mut()?.push(index.clone());
                    }
                    _ => return None,
                }
            } else if self.peek() == Some(&Token::LBracket) {
                // Bracket indexing is only meaningful after at least one
                // dotted segment, matching the accepted corpus shapes.
                let segments = pending.segments_mut()?;
                if segments.is_empty() {
                    return None;
                }
                self.next();
                let index = match self.next()? {
                    Token::Int(index) => index.clone(),
                    _ => return None,
                };
                if !self.eat(&Token::RBracket) {
                    return None;
                }
                segments.push(index);
            } else {
                break;
            }
        }

        Some(pending.finish())
    }

    fn primary(&mut self) -> Option<Pending> {
        match self.next()? {
            Token::Str(s) => Some(Pending::Done(Expr::Literal(s.clone()))),
            Token::Ident(name) => Some(Pending::Done(Expr::Var(name.clone()))),
            Token::Dollar => match self.next()? {
                Token::Ident(name) if name == "json" => Some(Pending::Json(Vec::new())),
                Token::LParen => {
                    let node = self.expect_str()?;
                    if !self.eat(&Token::RParen) {
                        return None;
                    }
                    self.node_accessor()?;
                    Some(Pending::Node {
                        node,
                        path: Vec::new(),
                    })
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// `.first().json`, `.first.json`, or `.item.json` after a node
    /// reference.
    fn node_accessor(&mut self) -> Option<()> {
        if !self.eat(&Token::Dot) {
            return None;
        }
        match self.expect_ident()?.as_str() {
            "first" => {
                if self.eat(&Token::LParen) && !self.eat(&Token::RParen) {
                    return None;
                }
            }
            "item" => {}
            _ => return None,
        }
        if !self.eat(&Token::Dot) {
            return None;
        }
        match self.expect_ident()?.as_str() {
            "json" => Some(()),
            _ => None,
        }
    }

    /// `( ident => ident . ident )`: the single-level map projection.
    /// The closure parameter must be reused on the right-hand side.
    fn map_clause(&mut self) -> Option<String> {
        if !self.eat(&Token::LParen) {
            return None;
        }
        let param = self.expect_ident()?;
        if !self.eat(&Token::FatArrow) {
            return None;
        }
        let item = self.expect_ident()?;
        if item != param {
            return None;
        }
        if !self.eat(&Token::Dot) {
            return None;
        }
        let field = self.expect_ident()?;
        if !self.eat(&Token::RParen) {
            return None;
        }
        Some(field)
    }

    /// `. join ( '<delim>' )`, required immediately after a map clause.
    fn join_clause(&mut self) -> Option<String> {
        if !self.eat(&Token::Dot) {
            return None;
        }
        match self.expect_ident()?.as_str() {
            "join" => self.join_call_args(),
            _ => None,
        }
    }

    fn join_call_args(&mut self) -> Option<String> {
        if !self.eat(&Token::LParen) {
            return None;
        }
        let delimiter = self.expect_str()?;
        if !self.eat(&Token::RParen) {
            return None;
        }
        Some(delimiter)
    }

    /// `( )` with nothing inside.
    fn expect_call0(&mut self) -> Option<()> {
        if self.eat(&Token::LParen) && self.eat(&Token::RParen) {
            Some(())
        } else {
            None
        }
    }
}
