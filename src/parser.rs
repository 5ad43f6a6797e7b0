//! Tokens -> AST. A Pratt-style expression parser under a small statement
//! layer. The statement layer owns the syntax table: whenever a top-level
//! node turns out to be an `operator('fixity, prec, 'name)` declaration it
//! is removed from the program and the table is rebuilt before the next
//! node is read, so a declaration starts working on the very next line.

use std::fmt;

use crate::lexer::{Location, SourceToken, Token};

pub mod ast;
pub mod syntax;

use ast::{Binding, Expr, ExprKind, Ident, Node, Param, Stmt, StmtKind, Tree};
use syntax::{Fixity, Precedence, Syntax};

/// Words the grammar claims for itself. They are ordinary `Id` tokens and
/// are recognized by lexeme comparison only.
pub const RESERVED: &[&str] = &[
    "def", "func", "if", "then", "else", "let", "in", "begin", "end", "opcode", "operator", "true",
    "false",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("bad number: {lexeme}")]
    BadNum { lexeme: Box<str>, loc: Location },
    #[error("unclosed string")]
    UnclosedString { loc: Location },
    #[error("unexpected {found}")]
    UnexpectedToken { found: Box<str>, loc: Location },
    #[error("expected {expected}, found {found}")]
    MissingExpectedToken {
        expected: &'static str,
        found: Box<str>,
        loc: Location,
    },
    #[error("expected {expected} after {after}, found {found}")]
    MissingExpectedTokenAfter {
        expected: &'static str,
        after: &'static str,
        found: Box<str>,
        loc: Location,
    },
    #[error("unexpected end of input")]
    UnexpectedEof { loc: Location },
    #[error("malformed operator declaration")]
    BadOperatorDefinition { loc: Location },
    #[error("begin block requires at least one expression")]
    EmptyBeginNotAllowed { loc: Location },
}

impl SyntaxError {
    pub fn location(&self) -> &Location {
        match self {
            SyntaxError::BadNum { loc, .. }
            | SyntaxError::UnclosedString { loc }
            | SyntaxError::UnexpectedToken { loc, .. }
            | SyntaxError::MissingExpectedToken { loc, .. }
            | SyntaxError::MissingExpectedTokenAfter { loc, .. }
            | SyntaxError::UnexpectedEof { loc }
            | SyntaxError::BadOperatorDefinition { loc }
            | SyntaxError::EmptyBeginNotAllowed { loc } => loc,
        }
    }
}

/// Lex and parse under the default syntax table.
pub fn parse(name: &str, src: &str) -> Result<Tree, SyntaxError> {
    parse_with(Syntax::default(), name, src).map(|(tree, _)| tree)
}

/// Lex and parse under a caller-provided syntax table, returning the table
/// as extended by any `operator` declarations the program contained.
pub fn parse_with(
    syntax: Syntax,
    name: &str,
    src: &str,
) -> Result<(Tree, Syntax), SyntaxError> {
    let tokens = crate::lexer::tokenize(name, src)?;
    let eof = Location::new(&std::rc::Rc::from(name), src.len());
    Parser { tokens, pos: 0, eof }.program(syntax)
}

struct Parser {
    tokens: Vec<SourceToken>,
    pos: usize,
    eof: Location,
}

impl Parser {
    fn peek(&self) -> Option<&SourceToken> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&SourceToken> {
        self.tokens.get(self.pos + ahead)
    }

    fn advance(&mut self) -> Option<SourceToken> {
        let st = self.tokens.get(self.pos).cloned();
        if st.is_some() {
            self.pos += 1;
        }
        st
    }

    fn peek_lexeme(&self) -> Option<&str> {
        match self.peek() {
            Some(SourceToken {
                token: Token::Id(name),
                ..
            }) => Some(name),
            _ => None,
        }
    }

    fn describe(&self) -> (Box<str>, Location) {
        match self.peek() {
            Some(st) => (Box::from(st.token.to_string()), st.loc.clone()),
            None => (Box::from("end of input"), self.eof.clone()),
        }
    }

    fn unexpected_eof(&self) -> SyntaxError {
        SyntaxError::UnexpectedEof {
            loc: self.eof.clone(),
        }
    }

    /// Consume a specific token or fail with [`SyntaxError::MissingExpectedToken`].
    fn expect(&mut self, want: &Token, expected: &'static str) -> Result<Location, SyntaxError> {
        match self.peek() {
            Some(st) if st.token == *want => Ok(self.advance().unwrap().loc),
            _ => {
                let (found, loc) = self.describe();
                Err(SyntaxError::MissingExpectedToken {
                    expected,
                    found,
                    loc,
                })
            }
        }
    }

    /// Like [`Parser::expect`] but names the construct the token should have
    /// followed.
    fn expect_after(
        &mut self,
        want: &Token,
        expected: &'static str,
        after: &'static str,
    ) -> Result<Location, SyntaxError> {
        match self.peek() {
            Some(st) if st.token == *want => Ok(self.advance().unwrap().loc),
            _ => {
                let (found, loc) = self.describe();
                Err(SyntaxError::MissingExpectedTokenAfter {
                    expected,
                    after,
                    found,
                    loc,
                })
            }
        }
    }

    fn expect_keyword(&mut self, word: &'static str) -> Result<Location, SyntaxError> {
        match self.peek_lexeme() {
            Some(name) if name == word => Ok(self.advance().unwrap().loc),
            _ => {
                let (found, loc) = self.describe();
                Err(SyntaxError::MissingExpectedToken {
                    expected: word,
                    found,
                    loc,
                })
            }
        }
    }

    /// Consume an identifier that can be bound to.
    fn ident(&mut self, expected: &'static str) -> Result<Ident, SyntaxError> {
        match self.peek() {
            Some(SourceToken {
                token: Token::Id(name),
                ..
            }) if !is_reserved(name) => {
                let st = self.advance().unwrap();
                match st.token {
                    Token::Id(name) => Ok(Ident { name, loc: st.loc }),
                    _ => unreachable!("peeked an identifier"),
                }
            }
            _ => {
                let (found, loc) = self.describe();
                Err(SyntaxError::MissingExpectedToken {
                    expected,
                    found,
                    loc,
                })
            }
        }
    }

    fn program(mut self, mut syntax: Syntax) -> Result<(Tree, Syntax), SyntaxError> {
        let mut tree = Tree::new();
        while self.peek().is_some() {
            let node = self.node(&syntax)?;
            match operator_declaration(&node)? {
                Some((fixity, name, prec)) => syntax = syntax.extended(fixity, &name, prec),
                None => tree.push(node),
            }
        }
        Ok((tree, syntax))
    }

    fn node(&mut self, sx: &Syntax) -> Result<Node, SyntaxError> {
        match self.peek_lexeme() {
            Some("def") => self.def(sx).map(Node::Stmt),
            Some(word @ ("module" | "import"))
                if matches!(
                    self.peek_at(1),
                    Some(SourceToken { token: Token::Id(name), .. }) if !is_reserved(name)
                ) =>
            {
                let is_module = word == "module";
                let loc = self.advance().unwrap().loc;
                let name = self.ident("a name")?;
                let kind = if is_module {
                    StmtKind::Module { name }
                } else {
                    StmtKind::Import { name }
                };
                Ok(Node::Stmt(Stmt { kind, loc }))
            }
            _ => self.expr(sx).map(Node::Expr),
        }
    }

    fn def(&mut self, sx: &Syntax) -> Result<Stmt, SyntaxError> {
        let loc = self.advance().unwrap().loc;
        let name = self.ident("a definition name")?;

        // `def f(a, b) = body` is sugar for binding a lambda
        let value = if matches!(self.peek(), Some(st) if st.token == Token::OpenParen) {
            let open = self.advance().unwrap().loc;
            let params = self.params()?;
            self.expect_after(&Token::Equal, "`=`", "the parameter list")?;
            let body = self.expr(sx)?;
            Expr::new(
                ExprKind::Lambda {
                    params,
                    body: Box::new(body),
                },
                open,
            )
        } else {
            self.expect_after(&Token::Equal, "`=`", "the definition name")?;
            self.expr(sx)?
        };

        Ok(Stmt {
            kind: StmtKind::Def { name, value },
            loc,
        })
    }

    fn expr(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let mut curr = match self.peek() {
            Some(SourceToken {
                token: Token::Id(name),
                ..
            }) if sx.prefix(name).is_some() && !is_reserved(name) => {
                let op = self.ident("an operator")?;
                let operand = self.primary(sx)?;
                let loc = op.loc.clone();
                Expr::new(
                    ExprKind::Uniop {
                        op,
                        expr: Box::new(operand),
                    },
                    loc,
                )
            }
            _ => self.primary(sx)?,
        };

        loop {
            match self.peek() {
                Some(SourceToken {
                    token: Token::Id(name),
                    ..
                }) if sx.postfix(name).is_some() && !is_reserved(name) => {
                    let op = self.ident("an operator")?;
                    let loc = curr.loc.clone();
                    curr = Expr::new(
                        ExprKind::Uniop {
                            op,
                            expr: Box::new(curr),
                        },
                        loc,
                    );
                }
                Some(SourceToken {
                    token: Token::Id(name),
                    ..
                }) if sx.infix(name).is_some() && !is_reserved(name) => {
                    let op = self.ident("an operator")?;
                    let rhs = self.expr(sx)?;
                    curr = rotate(sx, op, curr, rhs);
                }
                Some(SourceToken {
                    token: Token::OpenParen,
                    ..
                }) => {
                    self.advance();
                    let args = self.args(sx)?;
                    let loc = curr.loc.clone();
                    curr = Expr::new(
                        ExprKind::App {
                            fun: Box::new(curr),
                            args,
                        },
                        loc,
                    );
                }
                _ => break,
            }
        }

        Ok(curr)
    }

    fn primary(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let st = match self.peek() {
            Some(st) => st.clone(),
            None => return Err(self.unexpected_eof()),
        };

        match st.token {
            Token::Num(lexeme) => {
                self.advance();
                Ok(Expr::new(ExprKind::Num(lexeme), st.loc))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(value), st.loc))
            }
            Token::Symbol(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Symbol(name), st.loc))
            }
            Token::OpenParen => {
                self.advance();
                let inner = self.expr(sx)?;
                self.expect(&Token::CloseParen, "`)`")?;
                Ok(inner)
            }
            Token::Id(name) => match name.as_ref() {
                "func" => self.lambda(sx),
                "if" => self.cond(sx),
                "let" => self.letin(sx),
                "begin" => self.begin(sx),
                "then" | "else" | "in" | "end" | "def" => {
                    let (found, loc) = self.describe();
                    Err(SyntaxError::MissingExpectedToken {
                        expected: "an expression",
                        found,
                        loc,
                    })
                }
                _ => {
                    self.advance();
                    Ok(Expr::new(ExprKind::Id(name), st.loc))
                }
            },
            _ => {
                let (found, loc) = self.describe();
                Err(SyntaxError::UnexpectedToken { found, loc })
            }
        }
    }

    fn lambda(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let loc = self.advance().unwrap().loc;
        self.expect_after(&Token::OpenParen, "`(`", "`func`")?;
        let params = self.params()?;
        self.expect_after(&Token::Equal, "`=`", "the parameter list")?;
        let body = self.expr(sx)?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            loc,
        ))
    }

    /// Parses `name[:ty], ...` up to and including the closing paren.
    fn params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        let mut params = Vec::new();
        loop {
            match self.peek() {
                Some(st) if st.token == Token::CloseParen => {
                    self.advance();
                    return Ok(params);
                }
                Some(_) => {
                    let name = self.ident("a parameter name")?;
                    let ty = if matches!(self.peek(), Some(st) if st.token == Token::Colon) {
                        self.advance();
                        Some(self.ident("a type name")?)
                    } else {
                        None
                    };
                    params.push(Param { name, ty });
                    if matches!(self.peek(), Some(st) if st.token == Token::Comma) {
                        self.advance();
                    }
                }
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    fn cond(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let loc = self.advance().unwrap().loc;
        let cond = self.expr(sx)?;
        self.expect_keyword("then")?;
        let pass = self.expr(sx)?;
        self.expect_keyword("else")?;
        let fail = self.expr(sx)?;
        Ok(Expr::new(
            ExprKind::Cond {
                cond: Box::new(cond),
                pass: Box::new(pass),
                fail: Box::new(fail),
            },
            loc,
        ))
    }

    fn letin(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let loc = self.advance().unwrap().loc;
        let mut bindings = Vec::new();

        loop {
            match self.peek_lexeme() {
                Some("in") => break,
                _ if self.peek().is_none() => return Err(self.unexpected_eof()),
                _ => {
                    let name = self.ident("a binding name")?;
                    self.expect_after(&Token::Equal, "`=`", "the binding name")?;
                    let value = self.expr(sx)?;
                    bindings.push(Binding { name, value });
                }
            }
        }

        if bindings.is_empty() {
            let (found, loc) = self.describe();
            return Err(SyntaxError::MissingExpectedToken {
                expected: "a binding",
                found,
                loc,
            });
        }

        self.expect_keyword("in")?;
        let body = self.expr(sx)?;
        Ok(Expr::new(
            ExprKind::Let {
                bindings,
                body: Box::new(body),
            },
            loc,
        ))
    }

    fn begin(&mut self, sx: &Syntax) -> Result<Expr, SyntaxError> {
        let loc = self.advance().unwrap().loc;

        if self.peek_lexeme() == Some("end") {
            let end = self.advance().unwrap().loc;
            return Err(SyntaxError::EmptyBeginNotAllowed { loc: end });
        }

        let head = self.expr(sx)?;
        let mut tail = Vec::new();
        loop {
            match self.peek_lexeme() {
                Some("end") => {
                    self.advance();
                    break;
                }
                _ if self.peek().is_none() => return Err(self.unexpected_eof()),
                _ => tail.push(self.expr(sx)?),
            }
        }

        Ok(Expr::new(
            ExprKind::Begin {
                head: Box::new(head),
                tail,
            },
            loc,
        ))
    }

    /// Parses a comma-separated application argument list up to and
    /// including the closing paren. The opening paren is already consumed.
    fn args(&mut self, sx: &Syntax) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(st) if st.token == Token::CloseParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.expr(sx)?);
            match self.peek() {
                Some(st) if st.token == Token::Comma => {
                    self.advance();
                }
                Some(st) if st.token == Token::CloseParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => {
                    let (found, loc) = self.describe();
                    return Err(SyntaxError::MissingExpectedToken {
                        expected: "`,` or `)`",
                        found,
                        loc,
                    });
                }
            }
        }
    }
}

/// The tie-break that keeps chained infix operators honest: the recursive
/// right-hand parse returns a whole expression, and a tighter-binding outer
/// operator steals the left leg of the loose binop it got back.
fn rotate(sx: &Syntax, op: Ident, lhs: Expr, rhs: Expr) -> Expr {
    let Expr {
        kind: rhs_kind,
        loc: rhs_loc,
    } = rhs;

    match rhs_kind {
        ExprKind::Binop {
            op: op2,
            lhs: lhs2,
            rhs: rhs2,
        } if sx.infix(&op.name).unwrap_or(0) > sx.infix(&op2.name).unwrap_or(0) => {
            let loc = lhs.loc.clone();
            let stolen = Expr::new(
                ExprKind::Binop {
                    op,
                    lhs: Box::new(lhs),
                    rhs: lhs2,
                },
                loc.clone(),
            );
            Expr::new(
                ExprKind::Binop {
                    op: op2,
                    lhs: Box::new(stolen),
                    rhs: rhs2,
                },
                loc,
            )
        }
        kind => {
            let loc = lhs.loc.clone();
            Expr::new(
                ExprKind::Binop {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(Expr::new(kind, rhs_loc)),
                },
                loc,
            )
        }
    }
}

/// Recognize a top-level `operator('fixity, prec, 'name)` form. A node whose
/// head is the reserved word `operator` must be a well-formed declaration;
/// anything else about its shape is an error, not a call.
fn operator_declaration(
    node: &Node,
) -> Result<Option<(Fixity, Box<str>, Precedence)>, SyntaxError> {
    let Node::Expr(Expr {
        kind: ExprKind::App { fun, args },
        loc,
    }) = node
    else {
        return Ok(None);
    };
    if !matches!(&fun.kind, ExprKind::Id(name) if name.as_ref() == "operator") {
        return Ok(None);
    }

    let bad = || SyntaxError::BadOperatorDefinition { loc: loc.clone() };

    let [fixity, prec, name] = args.as_slice() else {
        return Err(bad());
    };
    let fixity = match &fixity.kind {
        ExprKind::Symbol(kind) => match kind.as_ref() {
            "prefix" => Fixity::Prefix,
            "infix" => Fixity::Infix,
            "postfix" => Fixity::Postfix,
            _ => return Err(bad()),
        },
        _ => return Err(bad()),
    };
    let prec = match &prec.kind {
        ExprKind::Num(lexeme) => match lexeme.parse::<f64>() {
            Ok(n) if n.fract() == 0.0 && (0.0..=99.0).contains(&n) => n as Precedence,
            _ => return Err(bad()),
        },
        _ => return Err(bad()),
    };
    let name = match &name.kind {
        ExprKind::Symbol(name) => name.clone(),
        _ => return Err(bad()),
    };

    Ok(Some((fixity, name, prec)))
}

impl fmt::Display for Fixity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fixity::Prefix => write!(f, "prefix"),
            Fixity::Infix => write!(f, "infix"),
            Fixity::Postfix => write!(f, "postfix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ast::{ExprKind, Node, StmtKind};
    use super::syntax::Syntax;
    use super::{parse, parse_with, SyntaxError};
    use assert2::{assert, check, let_assert};

    fn parse_expr(sx: Syntax, src: &str) -> ExprKind {
        let (tree, _) = parse_with(sx, "test.oat", src).unwrap();
        assert!(tree.len() == 1);
        let_assert!(Node::Expr(expr) = tree.into_iter().next().unwrap());
        expr.kind
    }

    /// Shorthand for digging a `Binop` apart in assertions.
    macro_rules! binop {
        ($expr:expr) => {{
            let_assert!(ExprKind::Binop { op, lhs, rhs } = $expr);
            (op.name, lhs.kind, rhs.kind)
        }};
    }

    #[test]
    fn tighter_operator_first_keeps_its_operands() {
        let sx = Syntax::empty().with_infix("*", 50).with_infix("-", 30);
        let (op, lhs, rhs) = binop!(parse_expr(sx, "a * b - c"));

        check!(op.as_ref() == "-");
        let (inner_op, a, b) = binop!(lhs);
        check!(inner_op.as_ref() == "*");
        check!(a == ExprKind::Id(Box::from("a")));
        check!(b == ExprKind::Id(Box::from("b")));
        check!(rhs == ExprKind::Id(Box::from("c")));
    }

    #[test]
    fn tighter_operator_second_takes_the_middle_operand() {
        let sx = Syntax::empty().with_infix("*", 50).with_infix("-", 30);
        let (op, lhs, rhs) = binop!(parse_expr(sx, "a - b * c"));

        check!(op.as_ref() == "-");
        check!(lhs == ExprKind::Id(Box::from("a")));
        let (inner_op, b, c) = binop!(rhs);
        check!(inner_op.as_ref() == "*");
        check!(b == ExprKind::Id(Box::from("b")));
        check!(c == ExprKind::Id(Box::from("c")));
    }

    #[test]
    fn prefix_and_postfix_operators() {
        let sx = Syntax::empty().with_prefix("-", 60).with_postfix("!", 70);

        let_assert!(ExprKind::Uniop { op, expr } = parse_expr(sx.clone(), "-x"));
        check!(op.name.as_ref() == "-");
        check!(expr.kind == ExprKind::Id(Box::from("x")));

        let_assert!(ExprKind::Uniop { op, .. } = parse_expr(sx, "x !"));
        check!(op.name.as_ref() == "!");
    }

    #[test]
    fn application_and_chained_application() {
        let_assert!(ExprKind::App { fun, args } = parse_expr(Syntax::default(), "f(1, 2)"));
        check!(fun.kind == ExprKind::Id(Box::from("f")));
        check!(args.len() == 2);

        // f()(7): the inner application lands in function position
        let_assert!(ExprKind::App { fun, args } = parse_expr(Syntax::default(), "f()(7)"));
        check!(args.len() == 1);
        let_assert!(ExprKind::App { fun: inner, args: inner_args } = fun.kind);
        check!(inner.kind == ExprKind::Id(Box::from("f")));
        check!(inner_args.is_empty());
    }

    #[test]
    fn operator_declarations_extend_the_table_mid_parse() {
        let src = "operator('infix, 50, '*)\n2 * 3";
        let tree = parse("test.oat", src).unwrap();

        // the declaration itself is removed from the program
        assert!(tree.len() == 1);
        let_assert!(Node::Expr(expr) = &tree[0]);
        let_assert!(ExprKind::Binop { op, .. } = &expr.kind);
        check!(op.name.as_ref() == "*");
    }

    #[test]
    fn malformed_operator_declarations() {
        let_assert!(
            Err(SyntaxError::BadOperatorDefinition { .. }) =
                parse("test.oat", "operator('infix, 50)")
        );
        let_assert!(
            Err(SyntaxError::BadOperatorDefinition { .. }) =
                parse("test.oat", "operator('sideways, 50, '*)")
        );
        let_assert!(
            Err(SyntaxError::BadOperatorDefinition { .. }) =
                parse("test.oat", "operator('infix, 500, '*)")
        );
    }

    #[test]
    fn def_sugar_builds_a_lambda() {
        let tree = parse("test.oat", "def twice(x) = x + x").unwrap();
        let_assert!(Node::Stmt(stmt) = &tree[0]);
        let_assert!(StmtKind::Def { name, value } = &stmt.kind);
        check!(name.name.as_ref() == "twice");
        let_assert!(ExprKind::Lambda { params, .. } = &value.kind);
        check!(params.len() == 1);
    }

    #[test]
    fn module_and_import_statements() {
        let tree = parse("test.oat", "module geometry\nimport prelude").unwrap();
        let_assert!(Node::Stmt(module) = &tree[0]);
        check!(matches!(&module.kind, StmtKind::Module { name } if name.name.as_ref() == "geometry"));
        let_assert!(Node::Stmt(import) = &tree[1]);
        check!(matches!(&import.kind, StmtKind::Import { name } if name.name.as_ref() == "prelude"));
    }

    #[test]
    fn let_with_missing_value_points_at_in() {
        let err = parse("test.oat", "let x = in x").unwrap_err();
        let_assert!(SyntaxError::MissingExpectedToken { expected, loc, .. } = err);
        check!(expected == "an expression");
        check!(loc.offset == 8);
    }

    #[test]
    fn forms_name_what_the_missing_token_should_follow() {
        let_assert!(
            Err(SyntaxError::MissingExpectedTokenAfter { expected, after, .. }) =
                parse("test.oat", "func x = x")
        );
        check!(expected == "`(`");
        check!(after == "`func`");

        let_assert!(
            Err(SyntaxError::MissingExpectedTokenAfter { expected: "`=`", .. }) =
                parse("test.oat", "def broken 5")
        );
    }

    #[test]
    fn empty_begin_is_refused() {
        let_assert!(
            Err(SyntaxError::EmptyBeginNotAllowed { .. }) = parse("test.oat", "begin end")
        );
    }

    #[test]
    fn sequences_short_circuit_on_the_first_error() {
        let_assert!(
            Err(SyntaxError::UnexpectedEof { .. }) = parse("test.oat", "begin 1 2")
        );
        let_assert!(
            Err(SyntaxError::MissingExpectedToken { expected: "then", .. }) =
                parse("test.oat", "if x else 2")
        );
    }

    #[test]
    fn parenthesized_grouping() {
        let sx = Syntax::empty().with_infix("*", 50).with_infix("-", 30);
        let (op, lhs, _) = {
            let_assert!(
                ExprKind::Binop { op, lhs, rhs } = parse_expr(sx, "(a - b) * c")
            );
            (op.name, lhs.kind, rhs.kind)
        };
        check!(op.as_ref() == "*");
        check!(matches!(lhs, ExprKind::Binop { .. }));
    }
}
