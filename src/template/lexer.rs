//! Tokenizer for placeholder expressions.
//!
//! The token set covers exactly the expression forms the template corpus
//! uses. Anything outside it fails to lex, which the evaluator treats as
//! "render empty", so the lexer never needs an error type richer than
//! `None`.

/// A single token of a placeholder expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `$`, introducing `$json` and `$('Node')` references.
    Dollar,
    /// A bare word: path segment, variable name, or method name.
    Ident(String),
    /// A quoted string literal (quotes stripped, content untouched).
    Str(String),
    /// An unsigned integer, as written.
    Int(String),
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// `||`
    OrOr,
    /// `=>`
    FatArrow,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Tokenize one placeholder expression. Returns `None` on any character
/// or construct outside the supported grammar.
pub fn lex(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '$' => tokens.push(Token::Dollar),
            '.' => tokens.push(Token::Dot),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            '|' => match chars.next() {
                Some((_, '|')) => tokens.push(Token::OrOr),
                _ => return None,
            },
            '=' => match chars.next() {
                Some((_, '>')) => tokens.push(Token::FatArrow),
                _ => return None,
            },
            '\'' | '"' => {
                let start = pos + c.len_utf8();
                let mut end = None;
                for (p, d) in chars.by_ref() {
                    if d == c {
                        end = Some(p);
                        break;
                    }
                }
                tokens.push(Token::Str(input[start..end?].to_string()));
            }
            c if c.is_ascii_digit() => {
                let mut end = pos + c.len_utf8();
                while let Some(&(p, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        end = p + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Int(input[pos..end].to_string()));
            }
            c if is_ident_start(c) => {
                let mut end = pos + c.len_utf8();
                while let Some(&(p, d)) = chars.peek() {
                    if is_ident_continue(d) {
                        end = p + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[pos..end].to_string()));
            }
            _ => return None,
        }
    }

    Some(tokens)
}
