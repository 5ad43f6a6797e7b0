//! Character stream -> tokens.
//!
//! Most of the surface is ordinary punctuation and identifiers; the two
//! interesting rules are braced strings (`%{ ... }`, ending at the first
//! closing brace) and the catch-all rule that turns any run of "unknown"
//! characters into an identifier. The catch-all is how operator names like
//! `++`, `|>` and `∈` enter the token stream without the lexer knowing
//! about them.

use std::fmt;
use std::rc::Rc;

pub use logos::{Lexer, Logos};

use crate::parser::SyntaxError;

/// A `(source name, byte offset)` pair. Carried by every token, AST node and
/// IR node; only diagnostics ever look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub source: Rc<str>,
    pub offset: usize,
}

impl Location {
    pub fn new(source: &Rc<str>, offset: usize) -> Self {
        Self {
            source: source.clone(),
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.offset)
    }
}

fn trim_braced(lexer: &mut Lexer<Token>) -> Box<str> {
    let slice = lexer.slice();
    Box::from(&slice[2..slice.len() - 1])
}

fn trim_quoted(lexer: &mut Lexer<Token>) -> Box<str> {
    let slice = lexer.slice();
    Box::from(&slice[1..slice.len() - 1])
}

fn check_number(lexer: &mut Lexer<Token>) -> Result<Box<str>, LexerError> {
    let slice = lexer.slice();
    // The lexer only promises the lexeme reads as a floating point literal;
    // whether it fits the VM's i32 is the generator's problem.
    match slice.parse::<f64>() {
        Ok(_) => Ok(Box::from(slice)),
        Err(_) => Err(LexerError::BadNum(Box::from(slice))),
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("bad number: {0}")]
    BadNum(Box<str>),
    #[error("unclosed string")]
    UnclosedString,
}

impl LexerError {
    fn at(self, loc: Location) -> SyntaxError {
        match self {
            LexerError::BadNum(lexeme) => SyntaxError::BadNum { lexeme, loc },
            LexerError::UnclosedString => SyntaxError::UnclosedString { loc },
            LexerError::Invalid => SyntaxError::UnexpectedToken {
                found: Box::from("an unreadable character"),
                loc,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("=")]
    Equal,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenCurly,
    #[token("}")]
    CloseCurly,
    #[token("[")]
    OpenSquare,
    #[token("]")]
    CloseSquare,

    #[regex(r"//[^\n]*", |l| Box::from(&l.slice()[2..]), priority = 10)]
    Comment(Box<str>),

    #[regex(r"%\{[^}]*\}", trim_braced)]
    #[regex(r#""[^"]*""#, trim_quoted)]
    #[token("%{", |_| Err(LexerError::UnclosedString))]
    #[token("\"", |_| Err(LexerError::UnclosedString))]
    Str(Box<str>),

    #[regex(r"'[^ \t\r\n,(){}\[\]]+", |l| Box::from(&l.slice()[1..]))]
    Symbol(Box<str>),

    #[regex(r"[0-9][0-9.]*", check_number)]
    Num(Box<str>),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |l| Box::from(l.slice()))]
    #[regex(r#"[^ \t\r\n0-9a-zA-Z_,.:=(){}\[\]'"]+"#, |l| Box::from(l.slice()), priority = 1)]
    Id(Box<str>),
}

impl Token {
    pub fn lexeme(&self) -> Option<&str> {
        match self {
            Token::Str(s) | Token::Symbol(s) | Token::Num(s) | Token::Id(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Comma => write!(f, "`,`"),
            Token::Dot => write!(f, "`.`"),
            Token::Colon => write!(f, "`:`"),
            Token::Equal => write!(f, "`=`"),
            Token::OpenParen => write!(f, "`(`"),
            Token::CloseParen => write!(f, "`)`"),
            Token::OpenCurly => write!(f, "`{{`"),
            Token::CloseCurly => write!(f, "`}}`"),
            Token::OpenSquare => write!(f, "`[`"),
            Token::CloseSquare => write!(f, "`]`"),
            Token::Comment(_) => write!(f, "a comment"),
            Token::Str(_) => write!(f, "a string"),
            Token::Symbol(name) => write!(f, "'{name}"),
            Token::Num(lexeme) => write!(f, "{lexeme}"),
            Token::Id(name) => write!(f, "`{name}`"),
        }
    }
}

/// A token bound to where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceToken {
    pub token: Token,
    pub loc: Location,
}

/// Lex a whole source string, attaching locations and dropping comments.
/// The first unreadable input short-circuits the pipeline.
pub fn tokenize(name: &str, src: &str) -> Result<Vec<SourceToken>, SyntaxError> {
    let source: Rc<str> = Rc::from(name);
    let mut tokens = Vec::new();

    for (token, span) in Token::lexer(src).spanned() {
        let loc = Location::new(&source, span.start);
        match token {
            Ok(Token::Comment(_)) => {}
            Ok(token) => tokens.push(SourceToken { token, loc }),
            Err(err) => return Err(err.at(loc)),
        }
    }

    Ok(tokens)
}
