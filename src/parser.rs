//! Hand-written recursive descent parser for the PEG surface syntax,
//! producing the typed [`Grammar`] tree the compiler pipeline runs on.

use thiserror::Error;

use crate::{
    ast::{CharClass, ClassPart, CodeBlock, Expr, ExprKind, Grammar, Rule},
    span::Span,
};

/// The ECMAScript 2015 reserved words, including the strict-mode and
/// module-mode additions. The parser rejects these as label names; plugins
/// may replace the list.
#[rustfmt::skip]
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "finally", "for",
    "function", "if", "import", "in", "instanceof", "new", "return", "super",
    "switch", "this", "throw", "try", "typeof", "var", "void", "while",
    "with", "null", "true", "false", "enum", "implements", "interface",
    "let", "package", "private", "protected", "public", "static", "yield",
    "await",
];

#[derive(Clone, Debug)]
pub struct ParseOptions {
    pub reserved_words: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            reserved_words: DEFAULT_RESERVED_WORDS
                .iter()
                .map(|word| word.to_string())
                .collect(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

pub fn parse(src: &str, options: &ParseOptions) -> Result<Grammar, SyntaxError> {
    assert!(src.len() <= u32::MAX as usize);
    Parser {
        lexer: Lexer::new(src),
        options,
    }
    .grammar()
}

struct Lexer<'a> {
    src: &'a str,
    pos: u32,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn pos(&self) -> u32 {
        self.pos
    }

    fn span_since(&self, start: u32) -> Span {
        Span::new(start, self.pos)
    }

    fn restore_pos(&mut self, pos: u32) {
        debug_assert!(pos as usize <= self.src.len());
        self.pos = pos;
    }

    fn is_empty(&self) -> bool {
        self.pos as usize == self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos as usize..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    fn consume(&mut self, value: char) -> bool {
        if self.peek() == Some(value) {
            self.next();
            true
        } else {
            false
        }
    }

    fn at(&self, sequence: &str) -> bool {
        self.rest().starts_with(sequence)
    }

    fn consume_str(&mut self, sequence: &str) -> bool {
        if self.at(sequence) {
            self.pos += sequence.len() as u32;
            true
        } else {
            false
        }
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) -> Span {
        let start = self.pos();
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.next();
            } else {
                break;
            }
        }
        self.span_since(start)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Ident {
    value: String,
    span: Span,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    fn grammar(mut self) -> Result<Grammar, SyntaxError> {
        let len = self.lexer.src.len() as u32;

        self.skip_ws()?;
        let top_level_initializer = if self.lexer.at("{{") {
            let block = self.top_level_code()?;
            self.skip_ws()?;
            Some(block)
        } else {
            None
        };
        let initializer = if self.lexer.peek() == Some('{') {
            let block = self.brace_code()?;
            self.skip_ws()?;
            Some(block)
        } else {
            None
        };

        let mut rules = Vec::new();
        while !self.lexer.is_empty() {
            rules.push(self.rule()?);
            self.skip_ws()?;
        }
        if rules.is_empty() {
            return Err(SyntaxError {
                message: "expected at least one rule".to_owned(),
                span: Span::at(self.lexer.pos()),
            });
        }

        Ok(Grammar::new(
            top_level_initializer,
            initializer,
            rules,
            Span::new(0, len),
        ))
    }

    fn rule(&mut self) -> Result<Rule, SyntaxError> {
        let start = self.lexer.pos();
        let name = self.identifier()?;
        self.skip_ws()?;

        let display = match self.lexer.peek() {
            Some('"' | '\'') => {
                let (value, _) = self.string_value()?;
                self.skip_ws()?;
                Some(value)
            }
            _ => None,
        };

        self.expect('=')?;
        self.skip_ws()?;
        let expr = self.expression()?;

        let save = self.lexer.pos();
        if !(self.skip_ws().is_ok() && self.lexer.consume(';')) {
            self.lexer.restore_pos(save);
        }

        let span = self.lexer.span_since(start);
        let expr = match display {
            Some(display_name) => {
                let expr_span = expr.span;
                Expr::new(
                    ExprKind::Named {
                        name: display_name,
                        expr: Box::new(expr),
                    },
                    expr_span,
                )
            }
            None => expr,
        };

        Ok(Rule::new(name.value, name.span, span, expr))
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.choice()
    }

    fn choice(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.action_expr()?;
        let start = first.span.start();
        let mut alternatives = vec![first];

        loop {
            let save = self.lexer.pos();
            self.skip_ws()?;
            if self.lexer.consume('/') {
                self.skip_ws()?;
                alternatives.push(self.action_expr()?);
            } else {
                self.lexer.restore_pos(save);
                break;
            }
        }

        if alternatives.len() == 1 {
            Ok(alternatives.pop().unwrap())
        } else {
            let end = alternatives.last().unwrap().span.end();
            Ok(Expr::new(
                ExprKind::Choice(alternatives),
                Span::new(start, end),
            ))
        }
    }

    fn action_expr(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.sequence()?;
        let save = self.lexer.pos();
        self.skip_ws()?;
        if self.lexer.peek() == Some('{') {
            let start = expr.span.start();
            let code = self.brace_code()?;
            Ok(Expr::new(
                ExprKind::Action {
                    expr: Box::new(expr),
                    code,
                },
                Span::new(start, self.lexer.pos()),
            ))
        } else {
            self.lexer.restore_pos(save);
            Ok(expr)
        }
    }

    fn sequence(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.labeled()?;
        let start = first.span.start();
        let mut elements = vec![first];

        loop {
            let save = self.lexer.pos();
            self.skip_ws()?;
            if self.at_element_start() && !self.at_rule_boundary() {
                elements.push(self.labeled()?);
            } else {
                self.lexer.restore_pos(save);
                break;
            }
        }

        // a lone plucked element keeps its sequence wrapper so that the
        // pluck has a frame to collect into
        let keep_sequence = elements.len() > 1
            || matches!(&elements[0].kind, ExprKind::Labeled { pick: true, .. });
        if keep_sequence {
            let end = elements.last().unwrap().span.end();
            Ok(Expr::new(
                ExprKind::Sequence(elements),
                Span::new(start, end),
            ))
        } else {
            Ok(elements.pop().unwrap())
        }
    }

    fn at_element_start(&self) -> bool {
        match self.lexer.peek() {
            Some(c) => {
                matches!(c, '"' | '\'' | '[' | '.' | '(' | '&' | '!' | '$' | '@')
                    || is_ident_start(c)
            }
            None => false,
        }
    }

    /// An identifier followed by `=` (possibly with a display name between)
    /// starts the next rule, not another sequence element.
    fn at_rule_boundary(&mut self) -> bool {
        match self.lexer.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return false,
        }
        let save = self.lexer.pos();
        let _ = self.identifier();
        let mut boundary = false;
        if self.skip_ws().is_ok() {
            if let Some('"' | '\'') = self.lexer.peek() {
                if self.string_value().is_ok() {
                    let _ = self.skip_ws();
                }
            }
            boundary = self.lexer.peek() == Some('=');
        }
        self.lexer.restore_pos(save);
        boundary
    }

    fn labeled(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.lexer.pos();
        if self.lexer.consume('@') {
            let at_span = self.lexer.span_since(start);
            self.skip_ws()?;
            let (label, label_span) = if self.label_ahead() {
                let ident = self.label_name()?;
                let span = ident.span;
                (Some(ident.value), span)
            } else {
                (None, at_span)
            };
            let expr = self.prefixed()?;
            let span = Span::new(start, expr.span.end());
            Ok(Expr::new(
                ExprKind::Labeled {
                    label,
                    label_span,
                    pick: true,
                    expr: Box::new(expr),
                },
                span,
            ))
        } else if self.label_ahead() {
            let ident = self.label_name()?;
            let expr = self.prefixed()?;
            let span = Span::new(start, expr.span.end());
            Ok(Expr::new(
                ExprKind::Labeled {
                    label: Some(ident.value),
                    label_span: ident.span,
                    pick: false,
                    expr: Box::new(expr),
                },
                span,
            ))
        } else {
            self.prefixed()
        }
    }

    fn label_ahead(&mut self) -> bool {
        match self.lexer.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return false,
        }
        let save = self.lexer.pos();
        let _ = self.identifier();
        let ahead = self.skip_ws().is_ok() && self.lexer.peek() == Some(':');
        self.lexer.restore_pos(save);
        ahead
    }

    fn label_name(&mut self) -> Result<Ident, SyntaxError> {
        let ident = self.identifier()?;
        if self.options.reserved_words.iter().any(|w| *w == ident.value) {
            return Err(SyntaxError {
                message: format!("Label can't be a reserved word \"{}\"", ident.value),
                span: ident.span,
            });
        }
        self.skip_ws()?;
        self.expect(':')?;
        self.skip_ws()?;
        Ok(ident)
    }

    fn prefixed(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.lexer.pos();
        match self.lexer.peek() {
            Some('$') => {
                self.lexer.next();
                self.skip_ws()?;
                let expr = self.suffixed()?;
                let span = Span::new(start, expr.span.end());
                Ok(Expr::new(ExprKind::Text(Box::new(expr)), span))
            }
            Some('&') => {
                self.lexer.next();
                if self.lexer.peek() == Some('{') {
                    let code = self.brace_code()?;
                    let span = self.lexer.span_since(start);
                    Ok(Expr::new(ExprKind::Predicate { not: false, code }, span))
                } else {
                    self.skip_ws()?;
                    let expr = self.suffixed()?;
                    let span = Span::new(start, expr.span.end());
                    Ok(Expr::new(ExprKind::And(Box::new(expr)), span))
                }
            }
            Some('!') => {
                self.lexer.next();
                if self.lexer.peek() == Some('{') {
                    let code = self.brace_code()?;
                    let span = self.lexer.span_since(start);
                    Ok(Expr::new(ExprKind::Predicate { not: true, code }, span))
                } else {
                    self.skip_ws()?;
                    let expr = self.suffixed()?;
                    let span = Span::new(start, expr.span.end());
                    Ok(Expr::new(ExprKind::Not(Box::new(expr)), span))
                }
            }
            _ => self.suffixed(),
        }
    }

    fn suffixed(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.primary()?;
        let start = expr.span.start();
        let save = self.lexer.pos();
        self.skip_ws()?;
        let kind = match self.lexer.peek() {
            Some('?') => ExprKind::Optional(Box::new(expr)),
            Some('*') => ExprKind::ZeroOrMore(Box::new(expr)),
            Some('+') => ExprKind::OneOrMore(Box::new(expr)),
            _ => {
                self.lexer.restore_pos(save);
                return Ok(expr);
            }
        };
        self.lexer.next();
        Ok(Expr::new(kind, Span::new(start, self.lexer.pos())))
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.lexer.pos();
        match self.lexer.peek() {
            Some('"' | '\'') => self.literal(),
            Some('[') => self.class(),
            Some('.') => {
                self.lexer.next();
                Ok(Expr::new(ExprKind::Any, self.lexer.span_since(start)))
            }
            Some('(') => {
                self.lexer.next();
                self.skip_ws()?;
                let expr = self.expression()?;
                self.skip_ws()?;
                self.expect(')')?;
                Ok(Expr::new(
                    ExprKind::Group(Box::new(expr)),
                    self.lexer.span_since(start),
                ))
            }
            Some(c) if is_ident_start(c) => {
                let ident = self.identifier()?;
                Ok(Expr::new(ExprKind::RuleReference(ident.value), ident.span))
            }
            _ => Err(self.expected("an expression")),
        }
    }

    fn literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.lexer.pos();
        let (value, _) = self.string_value()?;
        let ignore_case = self.lexer.consume('i');
        Ok(Expr::new(
            ExprKind::Literal { value, ignore_case },
            self.lexer.span_since(start),
        ))
    }

    fn string_value(&mut self) -> Result<(String, Span), SyntaxError> {
        let start = self.lexer.pos();
        let quote = self.lexer.next().unwrap();
        let mut value = String::new();
        loop {
            match self.lexer.next() {
                None | Some('\n' | '\r') => {
                    return Err(SyntaxError {
                        message: "unterminated string literal".to_owned(),
                        span: Span::new(start, self.lexer.pos()),
                    })
                }
                Some(c) if c == quote => break,
                Some('\\') => value.push(self.escape_char()?),
                Some(c) => value.push(c),
            }
        }
        Ok((value, self.lexer.span_since(start)))
    }

    fn class(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.lexer.pos();
        self.lexer.consume('[');
        let inverted = self.lexer.consume('^');
        let mut parts = Vec::new();
        loop {
            match self.lexer.peek() {
                None => {
                    return Err(SyntaxError {
                        message: "unterminated character class".to_owned(),
                        span: Span::new(start, self.lexer.pos()),
                    })
                }
                Some(']') => {
                    self.lexer.next();
                    break;
                }
                Some(_) => {
                    let part_start = self.lexer.pos();
                    let lo = self.class_char()?;
                    let save = self.lexer.pos();
                    if self.lexer.consume('-') && self.lexer.peek() != Some(']') {
                        let hi = self.class_char()?;
                        if lo > hi {
                            return Err(SyntaxError {
                                message: format!("invalid character range: {lo}-{hi}"),
                                span: self.lexer.span_since(part_start),
                            });
                        }
                        parts.push(ClassPart::Range(lo, hi));
                    } else {
                        self.lexer.restore_pos(save);
                        parts.push(ClassPart::Single(lo));
                    }
                }
            }
        }
        let ignore_case = self.lexer.consume('i');
        Ok(Expr::new(
            ExprKind::Class(CharClass {
                parts,
                inverted,
                ignore_case,
            }),
            self.lexer.span_since(start),
        ))
    }

    fn class_char(&mut self) -> Result<char, SyntaxError> {
        let start = self.lexer.pos();
        match self.lexer.next() {
            None | Some('\n' | '\r') => Err(SyntaxError {
                message: "unterminated character class".to_owned(),
                span: Span::new(start, self.lexer.pos()),
            }),
            Some('\\') => self.escape_char(),
            Some(c) => Ok(c),
        }
    }

    fn escape_char(&mut self) -> Result<char, SyntaxError> {
        let start = self.lexer.pos() - 1;
        let c = self.lexer.next().ok_or_else(|| SyntaxError {
            message: "unterminated escape sequence".to_owned(),
            span: Span::new(start, self.lexer.pos()),
        })?;
        let escaped = match c {
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{000B}',
            '0' => '\0',
            'x' => self.hex_escape(start, 2)?,
            'u' => self.hex_escape(start, 4)?,
            other => other,
        };
        Ok(escaped)
    }

    fn hex_escape(&mut self, start: u32, digits: u32) -> Result<char, SyntaxError> {
        let mut value = 0;
        for _ in 0..digits {
            let digit = self
                .lexer
                .next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.invalid_escape(start))?;
            value = value * 16 + digit;
        }
        char::from_u32(value).ok_or_else(|| self.invalid_escape(start))
    }

    fn invalid_escape(&self, start: u32) -> SyntaxError {
        SyntaxError {
            message: "invalid escape sequence".to_owned(),
            span: Span::new(start, self.lexer.pos()),
        }
    }

    fn top_level_code(&mut self) -> Result<CodeBlock, SyntaxError> {
        let open = self.lexer.pos();
        self.lexer.consume_str("{{");
        let start = self.lexer.pos();
        let mut depth = 0u32;
        loop {
            if depth == 0 && self.lexer.at("}}") {
                break;
            }
            match self.lexer.next() {
                Some('{') => depth += 1,
                Some('}') => depth = depth.saturating_sub(1),
                Some(_) => {}
                None => {
                    return Err(SyntaxError {
                        message: "unterminated top-level initializer".to_owned(),
                        span: Span::new(open, self.lexer.pos()),
                    })
                }
            }
        }
        let span = self.lexer.span_since(start);
        let code = span.as_str(self.lexer.src).to_owned();
        self.lexer.consume_str("}}");
        Ok(CodeBlock { code, span })
    }

    /// Parses a `{ ... }` block with balanced braces, starting at the `{`.
    fn brace_code(&mut self) -> Result<CodeBlock, SyntaxError> {
        let open = self.lexer.pos();
        self.lexer.consume('{');
        let start = self.lexer.pos();
        let mut depth = 1u32;
        loop {
            match self.lexer.next() {
                Some('{') => depth += 1,
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
                None => {
                    return Err(SyntaxError {
                        message: "unterminated code block".to_owned(),
                        span: Span::new(open, self.lexer.pos()),
                    })
                }
            }
        }
        let span = Span::new(start, self.lexer.pos() - 1);
        Ok(CodeBlock {
            code: span.as_str(self.lexer.src).to_owned(),
            span,
        })
    }

    fn identifier(&mut self) -> Result<Ident, SyntaxError> {
        match self.lexer.peek() {
            Some(c) if is_ident_start(c) => {}
            _ => return Err(self.expected("an identifier")),
        }
        let start = self.lexer.pos();
        self.lexer.next();
        self.lexer.consume_while(is_ident_continue);
        let span = self.lexer.span_since(start);
        Ok(Ident {
            value: span.as_str(self.lexer.src).to_owned(),
            span,
        })
    }

    fn skip_ws(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.lexer.peek() {
                Some(c) if c.is_whitespace() => {
                    self.lexer.next();
                }
                Some('/') if self.lexer.at("//") => {
                    self.lexer.consume_while(|c| c != '\n');
                }
                Some('/') if self.lexer.at("/*") => {
                    let open = self.lexer.pos();
                    self.lexer.consume_str("/*");
                    loop {
                        if self.lexer.consume_str("*/") {
                            break;
                        }
                        if self.lexer.next().is_none() {
                            return Err(SyntaxError {
                                message: "unterminated block comment".to_owned(),
                                span: Span::new(open, self.lexer.pos()),
                            });
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn expect(&mut self, c: char) -> Result<(), SyntaxError> {
        if self.lexer.consume(c) {
            Ok(())
        } else {
            Err(SyntaxError {
                message: format!("expected \"{c}\""),
                span: Span::at(self.lexer.pos()),
            })
        }
    }

    fn expected(&self, what: &str) -> SyntaxError {
        SyntaxError {
            message: format!("expected {what}"),
            span: Span::at(self.lexer.pos()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, ParseOptions, SyntaxError};
    use crate::ast::{ClassPart, Expr, ExprKind, Grammar};

    fn ok(src: &str) -> Grammar {
        parse(src, &ParseOptions::default()).unwrap()
    }

    fn err(src: &str) -> SyntaxError {
        parse(src, &ParseOptions::default()).unwrap_err()
    }

    fn body(src: &str) -> Expr {
        let mut grammar = ok(src);
        grammar.rules.remove(0).expr
    }

    #[test]
    fn rule_shape() {
        let g = ok("start = \"a\" ;");
        assert_eq!(g.rules.len(), 1);
        assert_eq!(g.rules[0].name, "start");
        assert_eq!(g.rules[0].name_span.as_str("start = \"a\" ;"), "start");
    }

    #[test]
    fn several_rules() {
        let g = ok("a = b c\nb = \"x\"\nc = \"y\"");
        let names: Vec<_> = g.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(matches!(&g.rules[0].expr.kind, ExprKind::Sequence(e) if e.len() == 2));
    }

    #[test]
    fn display_name_wraps_in_named() {
        let e = body("start \"the start\" = \"a\"");
        match e.kind {
            ExprKind::Named { name, expr } => {
                assert_eq!(name, "the start");
                assert!(matches!(expr.kind, ExprKind::Literal { .. }));
            }
            other => panic!("expected a named expression, got {other:?}"),
        }
    }

    #[test]
    fn initializers() {
        let g = ok("{{ import fs; }} { let n = 0; } start = \"a\"");
        assert_eq!(
            g.top_level_initializer.as_ref().unwrap().code.trim(),
            "import fs;"
        );
        assert_eq!(g.initializer.as_ref().unwrap().code.trim(), "let n = 0;");
    }

    #[test]
    fn literal_flags_and_escapes() {
        let e = body("start = \"a\\n\\x41\\u0042\\\\\"i");
        match e.kind {
            ExprKind::Literal { value, ignore_case } => {
                assert_eq!(value, "a\nAB\\");
                assert!(ignore_case);
            }
            other => panic!("expected a literal, got {other:?}"),
        }
    }

    #[test]
    fn class_parts() {
        let e = body("start = [^a-z0_-]i");
        match e.kind {
            ExprKind::Class(class) => {
                assert!(class.inverted);
                assert!(class.ignore_case);
                assert_eq!(
                    class.parts,
                    [
                        ClassPart::Range('a', 'z'),
                        ClassPart::Single('0'),
                        ClassPart::Single('_'),
                        ClassPart::Single('-'),
                    ]
                );
            }
            other => panic!("expected a class, got {other:?}"),
        }
    }

    #[test]
    fn invalid_class_range() {
        assert!(err("start = [z-a]").message.contains("invalid character range"));
    }

    #[test]
    fn prefix_and_suffix_nesting() {
        let e = body("start = !\"a\"*");
        match e.kind {
            ExprKind::Not(inner) => {
                assert!(matches!(inner.kind, ExprKind::ZeroOrMore(_)))
            }
            other => panic!("expected a lookahead, got {other:?}"),
        }
    }

    #[test]
    fn labels_and_pluck() {
        let e = body("start = @\"a\" tail:\"b\"");
        let ExprKind::Sequence(elements) = e.kind else {
            panic!("expected a sequence");
        };
        assert!(matches!(
            &elements[0].kind,
            ExprKind::Labeled { label: None, pick: true, .. }
        ));
        assert!(matches!(
            &elements[1].kind,
            ExprKind::Labeled { label: Some(l), pick: false, .. } if l == "tail"
        ));
    }

    #[test]
    fn lone_pluck_keeps_its_sequence() {
        let e = body("start = @name:\"a\"");
        let ExprKind::Sequence(elements) = e.kind else {
            panic!("expected a sequence");
        };
        assert_eq!(elements.len(), 1);
        assert!(matches!(
            &elements[0].kind,
            ExprKind::Labeled { label: Some(l), pick: true, .. } if l == "name"
        ));
    }

    #[test]
    fn reserved_label_is_rejected() {
        let e = err("start = return:\"a\"");
        assert_eq!(e.message, "Label can't be a reserved word \"return\"");
        assert_eq!(e.span.as_str("start = return:\"a\""), "return");
    }

    #[test]
    fn semantic_predicates() {
        let e = body("start = &{ before } \"a\" !{ after }");
        let ExprKind::Sequence(elements) = e.kind else {
            panic!("expected a sequence");
        };
        assert!(matches!(
            &elements[0].kind,
            ExprKind::Predicate { not: false, code } if code.code.trim() == "before"
        ));
        assert!(matches!(
            &elements[2].kind,
            ExprKind::Predicate { not: true, code } if code.code.trim() == "after"
        ));
    }

    #[test]
    fn action_binds_to_alternative() {
        let e = body("start = \"a\" { one } / \"b\"");
        let ExprKind::Choice(alternatives) = e.kind else {
            panic!("expected a choice");
        };
        assert!(matches!(&alternatives[0].kind, ExprKind::Action { .. }));
        assert!(matches!(&alternatives[1].kind, ExprKind::Literal { .. }));
    }

    #[test]
    fn nested_action_braces() {
        let e = body("start = \"a\" { if (x) { y } }");
        let ExprKind::Action { code, .. } = e.kind else {
            panic!("expected an action");
        };
        assert_eq!(code.code.trim(), "if (x) { y }");
    }

    #[test]
    fn comments_are_trivia() {
        let g = ok("// line\nstart = /* inline */ \"a\"");
        assert_eq!(g.rules.len(), 1);
    }

    #[test]
    fn unterminated_things() {
        assert_eq!(err("start = \"a").message, "unterminated string literal");
        assert_eq!(err("start = [a").message, "unterminated character class");
        assert_eq!(err("start = \"a\" { x").message, "unterminated code block");
        assert_eq!(err("start = \"a\" /*").message, "unterminated block comment");
    }

    #[test]
    fn empty_grammar() {
        assert_eq!(err("  \n ").message, "expected at least one rule");
    }

    #[test]
    fn rule_reference_span() {
        let src = "start = X";
        let g = ok(src);
        let ExprKind::RuleReference(name) = &g.rules[0].expr.kind else {
            panic!("expected a rule reference");
        };
        assert_eq!(name, "X");
        assert_eq!(g.rules[0].expr.span.as_str(src), "X");
    }
}
