use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, ImportedName, Literal, Module, Pattern, Stmt, StmtKind, UnaryOp,
        WhenArm,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_module(source: &str) -> Result<Module, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_module()
}

type ParseFn = fn(&mut Parser) -> Result<Expr, Diagnostic>;

const OR_OPS: &[(TokenKind, BinaryOp)] = &[(TokenKind::DoublePipe, BinaryOp::Or)];
const AND_OPS: &[(TokenKind, BinaryOp)] = &[(TokenKind::DoubleAmpersand, BinaryOp::And)];
const EQUALITY_OPS: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::EqualEqual, BinaryOp::Equal),
    (TokenKind::BangEqual, BinaryOp::NotEqual),
];
const COMPARISON_OPS: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::LessEqual, BinaryOp::LessEqual),
    (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
    (TokenKind::Less, BinaryOp::Less),
    (TokenKind::Greater, BinaryOp::Greater),
];
const TERM_OPS: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Plus, BinaryOp::Add),
    (TokenKind::Minus, BinaryOp::Sub),
];
const FACTOR_OPS: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Star, BinaryOp::Mul),
    (TokenKind::Slash, BinaryOp::Div),
    (TokenKind::Percent, BinaryOp::Mod),
];

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_module(&mut self) -> Result<Module, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Module { items })
    }

    fn parse_module_path(&mut self) -> Result<(Vec<String>, SourceSpan), Diagnostic> {
        let first = self.consume_identifier("expected module name")?;
        let start = first.span.start;
        let mut end = first.span.end;
        let mut segments = vec![first.lexeme];
        while self.matches(TokenKind::Dot) {
            let segment = self.consume_identifier("expected module segment after `.`")?;
            end = segment.span.end;
            segments.push(segment.lexeme);
        }
        Ok((segments, SourceSpan::new(start, end)))
    }

    fn parse_alias(&mut self) -> Result<Option<Token>, Diagnostic> {
        if self.matches_keyword(Keyword::As) {
            Ok(Some(self.consume_identifier("expected alias after `as`")?))
        } else {
            Ok(None)
        }
    }

    fn parse_use(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Use)?.span.start;
        let (path, span) = self.parse_module_path()?;
        let alias = self.parse_alias()?;
        let end = alias.as_ref().map(|tok| tok.span.end).unwrap_or(span.end);
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan::new(start, end),
            kind: StmtKind::Use {
                path,
                alias: alias.map(|tok| tok.lexeme),
            },
        })
    }

    fn parse_use_from(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::From)?.span.start;
        let (path, _) = self.parse_module_path()?;
        self.consume_keyword(Keyword::Use)?;
        let mut names = Vec::new();
        let mut end;
        loop {
            let name = self.consume_identifier("expected name to import")?;
            end = name.span.end;
            let alias = self.parse_alias()?;
            if let Some(tok) = &alias {
                end = tok.span.end;
            }
            names.push(ImportedName {
                name: name.lexeme,
                alias: alias.map(|tok| tok.lexeme),
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan::new(start, end),
            kind: StmtKind::UseFrom { path, names },
        })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let start = self
            .consume(TokenKind::LBrace, "expected `{` to start block")?
            .span
            .start;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let end = self
            .consume(TokenKind::RBrace, "expected `}` to close block")?
            .span
            .end;
        Ok((items, SourceSpan::new(start, end)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let kind = self.peek().kind;
        match kind {
            TokenKind::Keyword(Keyword::Var) => self.parse_var_decl(),
            TokenKind::Keyword(Keyword::Const) => self.parse_const_decl(),
            TokenKind::Keyword(Keyword::Fn) => self.parse_function(),
            TokenKind::Keyword(Keyword::Use) => self.parse_use(),
            TokenKind::Keyword(Keyword::From) => self.parse_use_from(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::When) => self.parse_when(),
            TokenKind::Keyword(Keyword::Return) => {
                let token = self.advance();
                let expr = self.parse_optional_tail()?;
                let end = expr.as_ref().map(|e| e.span.end).unwrap_or(token.span.end);
                Ok(Stmt {
                    span: SourceSpan::new(token.span.start, end),
                    kind: StmtKind::Return(expr),
                })
            }
            TokenKind::Keyword(Keyword::Break) => {
                let token = self.advance();
                let expr = self.parse_optional_tail()?;
                let end = expr.as_ref().map(|e| e.span.end).unwrap_or(token.span.end);
                Ok(Stmt {
                    span: SourceSpan::new(token.span.start, end),
                    kind: StmtKind::Break(expr),
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let token = self.advance();
                self.consume_optional_semicolon();
                Ok(Stmt {
                    span: token.span,
                    kind: StmtKind::Continue,
                })
            }
            TokenKind::LBrace => {
                let (items, span) = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(items),
                    span,
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_optional_semicolon();
                Ok(Stmt {
                    span: expr.span,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    /// Value after `return`/`break`, absent when the statement ends right away.
    fn parse_optional_tail(&mut self) -> Result<Option<Expr>, Diagnostic> {
        let kind = self.peek().kind;
        let expr = match kind {
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        self.consume_optional_semicolon();
        Ok(expr)
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Var)?.span.start;
        let _ = self.matches_keyword(Keyword::Mut);
        let name = self.consume_identifier("expected variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = initializer
            .as_ref()
            .map(|expr| expr.span.end)
            .unwrap_or(name.span.end);
        Ok(Stmt {
            kind: StmtKind::VarDecl {
                name: name.lexeme,
                initializer,
            },
            span: SourceSpan::new(start, end),
        })
    }

    fn parse_const_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Const)?.span.start;
        let name = self.consume_identifier("expected constant name")?;
        self.consume(TokenKind::Assign, "expected `=` in constant declaration")?;
        let value = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan::new(start, value.span.end),
            kind: StmtKind::ConstDecl {
                name: name.lexeme,
                value,
            },
        })
    }

    fn parse_function(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Fn)?.span.start;
        let name = self.consume_identifier("expected function name")?;
        self.consume(TokenKind::LParen, "expected `(` after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.consume_identifier("expected parameter name")?.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::Function {
                name: name.lexeme,
                params,
                body,
            },
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span.start;
        let condition = self.parse_expression()?;
        let (then_branch, mut span) = self.parse_block()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let nested = self.parse_if()?;
                span = nested.span;
                Some(vec![nested])
            } else {
                let (branch, else_span) = self.parse_block()?;
                span = else_span;
                Some(branch)
            }
        } else {
            None
        };
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span.start;
        let condition = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Loop)?.span.start;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::Loop { body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span.start;
        let binding = self.consume_identifier("expected loop binding")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
        })
    }

    fn parse_when(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::When)?.span.start;
        let subject = self.parse_expression()?;
        self.consume(TokenKind::LBrace, "expected `{` after when subject")?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let pattern = if self.matches_keyword(Keyword::Else) {
                Pattern::Wildcard
            } else {
                self.parse_pattern()?
            };
            self.consume(TokenKind::Arrow, "expected `->` in when arm")?;
            let (body, span) = self.parse_block()?;
            arms.push(WhenArm {
                pattern,
                body,
                span,
            });
        }
        let end = self
            .consume(TokenKind::RBrace, "expected `}` after when arms")?
            .span
            .end;
        Ok(Stmt {
            span: SourceSpan::new(start, end),
            kind: StmtKind::When { subject, arms },
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern, Diagnostic> {
        let token = self.advance();
        let pattern = match token.kind {
            TokenKind::Identifier if token.lexeme == "_" => Pattern::Wildcard,
            TokenKind::Identifier => Pattern::Identifier(token.lexeme),
            TokenKind::Keyword(Keyword::True) => Pattern::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => Pattern::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::None) => Pattern::Literal(Literal::None),
            TokenKind::String => Pattern::Literal(Literal::String(token.lexeme)),
            TokenKind::Number => Pattern::Literal(number_literal(&token)?),
            TokenKind::Minus => {
                let number = self.consume(TokenKind::Number, "expected number after `-`")?;
                Pattern::Literal(match number_literal(&number)? {
                    Literal::Int(n) => Literal::Int(-n),
                    Literal::Float(n) => Literal::Float(-n),
                    other => other,
                })
            }
            TokenKind::LParen => {
                let mut elements = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        elements.push(self.parse_pattern()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "expected `)` to close tuple pattern")?;
                Pattern::Tuple(elements)
            }
            _ => return Err(error_at(&token, "unexpected token in pattern")),
        };
        Ok(pattern)
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        if !self.check(TokenKind::Assign) {
            return Ok(expr);
        }
        let equals = self.advance();
        let value = self.parse_expression()?;
        match expr.kind {
            ExprKind::Variable(_) | ExprKind::Index { .. } | ExprKind::Field { .. } => Ok(Expr {
                span: SourceSpan::new(expr.span.start, value.span.end),
                kind: ExprKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
            }),
            _ => Err(error_at(&equals, "invalid assignment target")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(OR_OPS, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(AND_OPS, Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(EQUALITY_OPS, Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(COMPARISON_OPS, Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(TERM_OPS, Self::parse_factor)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(FACTOR_OPS, Self::parse_unary)
    }

    /// Left-associative chain of one precedence level.
    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        operand: ParseFn,
    ) -> Result<Expr, Diagnostic> {
        let mut expr = operand(self)?;
        while let Some(op) = ops
            .iter()
            .find(|(kind, _)| self.check(*kind))
            .map(|(_, op)| *op)
        {
            self.advance();
            let right = operand(self)?;
            expr = Expr {
                span: SourceSpan::new(expr.span.start, right.span.end),
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let kind = self.peek().kind;
        let op = match kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_call(),
        };
        let start = self.advance().span.start;
        let operand = self.parse_unary()?;
        Ok(Expr {
            span: SourceSpan::new(start, operand.span.end),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let args = self.parse_list(TokenKind::RParen)?;
                let end = self
                    .consume(TokenKind::RParen, "expected `)` after arguments")?
                    .span
                    .end;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, end),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let end = self
                    .consume(TokenKind::RBracket, "expected `]` after index")?
                    .span
                    .end;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, end),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                let field = self.consume_identifier("expected field after `.`")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, field.span.end),
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        field: field.lexeme,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to (not including) `close`.
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(close) && !self.check(TokenKind::Eof) {
            items.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Keyword(Keyword::True) => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::None) => ExprKind::Literal(Literal::None),
            TokenKind::Number => ExprKind::Literal(number_literal(&token)?),
            TokenKind::String => ExprKind::Literal(Literal::String(token.lexeme)),
            TokenKind::Identifier => ExprKind::Variable(token.lexeme),
            TokenKind::LParen => return self.parse_group_or_tuple(token.span.start),
            TokenKind::LBracket => {
                let elements = self.parse_list(TokenKind::RBracket)?;
                let end = self
                    .consume(TokenKind::RBracket, "expected `]` after array literal")?
                    .span
                    .end;
                return Ok(Expr {
                    span: SourceSpan::new(token.span.start, end),
                    kind: ExprKind::ArrayLiteral(elements),
                });
            }
            TokenKind::LBrace => return self.parse_map_literal(token.span.start),
            TokenKind::Pipe => return self.parse_lambda(token.span.start, true),
            TokenKind::DoublePipe => return self.parse_lambda(token.span.start, false),
            TokenKind::Eof => return Err(error_at(&token, "unexpected end of input")),
            _ => return Err(error_at(&token, "unexpected token in expression")),
        };
        Ok(Expr {
            span: token.span,
            kind,
        })
    }

    fn parse_group_or_tuple(&mut self, start: usize) -> Result<Expr, Diagnostic> {
        if self.check(TokenKind::RParen) {
            let end = self.advance().span.end;
            return Ok(Expr {
                span: SourceSpan::new(start, end),
                kind: ExprKind::TupleLiteral(Vec::new()),
            });
        }
        let first = self.parse_expression()?;
        let kind = if self.matches(TokenKind::Comma) {
            let mut elements = vec![first];
            elements.extend(self.parse_list(TokenKind::RParen)?);
            ExprKind::TupleLiteral(elements)
        } else {
            ExprKind::Group(Box::new(first))
        };
        let end = self
            .consume(TokenKind::RParen, "expected `)` after expression")?
            .span
            .end;
        Ok(Expr {
            span: SourceSpan::new(start, end),
            kind,
        })
    }

    fn parse_map_literal(&mut self, start: usize) -> Result<Expr, Diagnostic> {
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let key = self.parse_expression()?;
            self.consume(TokenKind::Colon, "expected `:` in map literal")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self
            .consume(TokenKind::RBrace, "expected `}` after map literal")?
            .span
            .end;
        Ok(Expr {
            span: SourceSpan::new(start, end),
            kind: ExprKind::MapLiteral(entries),
        })
    }

    /// `|a, b| expr`, or `|| expr` when the opening bars lexed as one token.
    fn parse_lambda(&mut self, start: usize, has_params: bool) -> Result<Expr, Diagnostic> {
        let mut params = Vec::new();
        if has_params {
            while !self.check(TokenKind::Pipe) {
                params.push(self.consume_identifier("expected parameter in lambda")?.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::Pipe, "expected closing `|` in lambda")?;
        }
        let body_expr = self.parse_expression()?;
        let span = SourceSpan::new(start, body_expr.span.end);
        let body = vec![Stmt {
            span: body_expr.span,
            kind: StmtKind::Expr(body_expr),
        }];
        Ok(Expr {
            span,
            kind: ExprKind::Lambda { params, body },
        })
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(error_at(self.peek(), message))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let message = format!("expected `{}`", format!("{keyword:?}").to_lowercase());
        self.consume(TokenKind::Keyword(keyword), &message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with `Eof`.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }
}

fn number_literal(token: &Token) -> Result<Literal, Diagnostic> {
    let digits = token.lexeme.replace('_', "");
    let parsed = if digits.contains(['.', 'e', 'E']) {
        digits.parse().ok().map(Literal::Float)
    } else {
        digits.parse().ok().map(Literal::Int)
    };
    parsed.ok_or_else(|| error_at(token, "invalid number literal"))
}

fn error_at(token: &Token, message: &str) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
}
