pub mod display;
pub mod visit;

use std::cell::Cell;

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::span::Span;

/// Index into [`Grammar::literals`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LiteralId(u32);
entity_impl!(LiteralId);

/// Index into [`Grammar::classes`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassId(u32);
entity_impl!(ClassId);

/// Index into [`Grammar::expectations`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ExpectationId(u32);
entity_impl!(ExpectationId);

/// Index into [`Grammar::functions`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FunctionId(u32);
entity_impl!(FunctionId);

/// Static result of matching an expression: does it always succeed, never
/// succeed, or does the outcome depend on the input?
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Match {
    Never = -1,
    Sometimes = 0,
    Always = 1,
}

impl Match {
    pub fn negate(self) -> Match {
        match self {
            Match::Never => Match::Always,
            Match::Sometimes => Match::Sometimes,
            Match::Always => Match::Never,
        }
    }
}

/// A block of user code together with its source span.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CodeBlock {
    pub code: String,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClassPart {
    Single(char),
    Range(char, char),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CharClass {
    pub parts: Vec<ClassPart>,
    pub inverted: bool,
    pub ignore_case: bool,
}

/// A description of what input was expected at a failure position.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expectation {
    Rule(String),
    Literal { value: String, ignore_case: bool },
    Class(CharClass),
    Any,
}

/// A user-code body interned into [`Grammar::functions`].
///
/// Equality ignores the span, so two textually identical blocks with the
/// same parameter list share one pool slot even when they come from
/// different places in the grammar.
#[derive(Clone, Debug)]
pub struct FunctionDesc {
    pub predicate: bool,
    pub params: Vec<String>,
    pub body: String,
    pub span: Span,
}

impl PartialEq for FunctionDesc {
    fn eq(&self, other: &Self) -> bool {
        self.predicate == other.predicate
            && self.params == other.params
            && self.body == other.body
    }
}

impl Eq for FunctionDesc {}

#[derive(Clone, Debug)]
pub enum ExprKind {
    /// Ordered alternatives, first to match wins.
    Choice(Vec<Expr>),
    /// Ordered elements, all must match.
    Sequence(Vec<Expr>),
    /// Names the wrapped expression for error reporting.
    Named { name: String, expr: Box<Expr> },
    /// Expression with a user action block run on success.
    Action { expr: Box<Expr>, code: CodeBlock },
    /// Binds the sub-result to a label and/or marks it as plucked (`@`).
    Labeled {
        label: Option<String>,
        /// Span of the label, or of the `@` marker when there is no label.
        label_span: Span,
        pick: bool,
        expr: Box<Expr>,
    },
    /// `$expr` — the matched text instead of the structured value.
    Text(Box<Expr>),
    /// `&expr` — positive lookahead.
    And(Box<Expr>),
    /// `!expr` — negative lookahead.
    Not(Box<Expr>),
    Optional(Box<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
    Group(Box<Expr>),
    RuleReference(String),
    /// `&{..}` / `!{..}` — user predicate code.
    Predicate { not: bool, code: CodeBlock },
    Literal { value: String, ignore_case: bool },
    Class(CharClass),
    Any,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    match_: Cell<Option<Match>>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr {
            kind,
            span,
            match_: Cell::new(None),
        }
    }
    /// The inferred match result, once the inference pass has run.
    pub fn match_result(&self) -> Option<Match> {
        self.match_.get()
    }
    pub fn set_match_result(&self, result: Match) {
        self.match_.set(Some(result));
    }
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub expr: Expr,
    /// Populated by the generate stage.
    pub bytecode: Option<Vec<u32>>,
    match_: Cell<Option<Match>>,
}

impl Rule {
    pub fn new(name: String, name_span: Span, span: Span, expr: Expr) -> Rule {
        Rule {
            name,
            name_span,
            span,
            expr,
            bytecode: None,
            match_: Cell::new(None),
        }
    }
    pub fn match_result(&self) -> Option<Match> {
        self.match_.get()
    }
    pub fn set_match_result(&self, result: Match) {
        self.match_.set(Some(result));
    }
}

/// The root of a parsed grammar. Owns every descendant node; passes mutate
/// annotations (`match`, `bytecode`, the constant pools) in place.
#[derive(Debug)]
pub struct Grammar {
    pub top_level_initializer: Option<CodeBlock>,
    pub initializer: Option<CodeBlock>,
    pub rules: Vec<Rule>,
    /// Opaque identifier of the source, used when rendering diagnostics.
    pub source: Option<String>,
    pub span: Span,
    pub literals: PrimaryMap<LiteralId, String>,
    pub classes: PrimaryMap<ClassId, CharClass>,
    pub expectations: PrimaryMap<ExpectationId, Expectation>,
    pub functions: PrimaryMap<FunctionId, FunctionDesc>,
}

impl Grammar {
    pub fn new(
        top_level_initializer: Option<CodeBlock>,
        initializer: Option<CodeBlock>,
        rules: Vec<Rule>,
        span: Span,
    ) -> Grammar {
        Grammar {
            top_level_initializer,
            initializer,
            rules,
            source: None,
            span,
            literals: PrimaryMap::new(),
            classes: PrimaryMap::new(),
            expectations: PrimaryMap::new(),
            functions: PrimaryMap::new(),
        }
    }

    pub fn find_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn index_of_rule(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.name == name)
    }

    /// Does this expression, when it succeeds, always advance the input by at
    /// least one unit? Unresolved rule references count as non-consuming.
    pub fn always_consumes_on_success(&self, expr: &Expr) -> bool {
        self.consumes_on_success(expr, &mut Vec::new())
    }

    fn consumes_on_success<'a>(&'a self, expr: &'a Expr, visiting: &mut Vec<&'a str>) -> bool {
        match &expr.kind {
            ExprKind::Literal { value, .. } => !value.is_empty(),
            ExprKind::Class(_) | ExprKind::Any => true,
            ExprKind::And(_)
            | ExprKind::Not(_)
            | ExprKind::Optional(_)
            | ExprKind::ZeroOrMore(_)
            | ExprKind::Predicate { .. } => false,
            ExprKind::Choice(alternatives) => alternatives
                .iter()
                .all(|alternative| self.consumes_on_success(alternative, visiting)),
            ExprKind::Sequence(elements) => elements
                .iter()
                .any(|element| self.consumes_on_success(element, visiting)),
            ExprKind::RuleReference(name) => match self.find_rule(name) {
                // a reference cycle cannot prove consumption
                Some(rule) if !visiting.contains(&name.as_str()) => {
                    visiting.push(&rule.name);
                    let consumes = self.consumes_on_success(&rule.expr, visiting);
                    visiting.pop();
                    consumes
                }
                _ => false,
            },
            ExprKind::Named { expr, .. }
            | ExprKind::Action { expr, .. }
            | ExprKind::Labeled { expr, .. }
            | ExprKind::Text(expr)
            | ExprKind::OneOrMore(expr)
            | ExprKind::Group(expr) => self.consumes_on_success(expr, visiting),
        }
    }
}
