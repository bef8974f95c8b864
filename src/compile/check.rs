//! Semantic validation passes. Every pass walks the grammar once and reports
//! through the session; none of them mutate the tree.

use std::collections::{HashMap, HashSet};

use crate::{
    ast::{CodeBlock, Expr, ExprKind, Grammar, Rule},
    session::{Note, Session},
    span::Span,
};

use super::CompileOptions;

pub fn report_undefined_rules(grammar: &mut Grammar, _options: &CompileOptions, session: &Session) {
    let grammar = &*grammar;
    grammar.visit_exprs(&mut |expr| {
        if let ExprKind::RuleReference(name) = &expr.kind {
            if grammar.find_rule(name).is_none() {
                session.error(
                    format!("Rule \"{name}\" is not defined"),
                    Some(expr.span),
                    Vec::new(),
                );
            }
        }
    });
}

pub fn report_duplicate_rules(grammar: &mut Grammar, _options: &CompileOptions, session: &Session) {
    let mut seen: HashMap<&str, Span> = HashMap::new();

    for rule in &grammar.rules {
        match seen.get(rule.name.as_str()) {
            Some(&original) => session.error(
                format!("Rule \"{}\" is already defined", rule.name),
                Some(rule.name_span),
                vec![Note {
                    message: "Original rule location".to_owned(),
                    span: original,
                }],
            ),
            None => {
                seen.insert(&rule.name, rule.name_span);
            }
        }
    }
}

pub fn report_duplicate_labels(grammar: &mut Grammar, _options: &CompileOptions, session: &Session) {
    // Labels live in scopes: a rule opens a fresh one, choice alternatives
    // and the operands of lookaheads, repetitions, actions and groups each
    // see a snapshot, sequence elements extend the shared scope in order.
    fn check(expr: &Expr, scope: &mut HashMap<String, Span>, session: &Session) {
        match &expr.kind {
            ExprKind::Choice(alternatives) => {
                for alternative in alternatives {
                    check(alternative, &mut scope.clone(), session);
                }
            }
            ExprKind::Sequence(elements) => {
                for element in elements {
                    check(element, scope, session);
                }
            }
            ExprKind::Labeled {
                label,
                label_span,
                expr,
                ..
            } => {
                if let Some(label) = label {
                    if let Some(&original) = scope.get(label) {
                        session.error(
                            format!("Label \"{label}\" is already defined"),
                            Some(*label_span),
                            vec![Note {
                                message: "Original label location".to_owned(),
                                span: original,
                            }],
                        );
                    }
                }
                check(expr, scope, session);
                if let Some(label) = label {
                    scope.insert(label.clone(), *label_span);
                }
            }
            ExprKind::Action { expr, .. }
            | ExprKind::Text(expr)
            | ExprKind::And(expr)
            | ExprKind::Not(expr)
            | ExprKind::Optional(expr)
            | ExprKind::ZeroOrMore(expr)
            | ExprKind::OneOrMore(expr)
            | ExprKind::Group(expr) => check(expr, &mut scope.clone(), session),
            ExprKind::Named { expr, .. } => check(expr, scope, session),
            ExprKind::RuleReference(_)
            | ExprKind::Predicate { .. }
            | ExprKind::Literal { .. }
            | ExprKind::Class(_)
            | ExprKind::Any => {}
        }
    }

    for rule in &grammar.rules {
        check(&rule.expr, &mut HashMap::new(), session);
    }
}

pub fn report_infinite_repetition(
    grammar: &mut Grammar,
    _options: &CompileOptions,
    session: &Session,
) {
    let grammar = &*grammar;
    grammar.visit_exprs(&mut |expr| {
        if let ExprKind::ZeroOrMore(operand) | ExprKind::OneOrMore(operand) = &expr.kind {
            if !grammar.always_consumes_on_success(operand) {
                session.error(
                    "Possible infinite loop when parsing (repetition used with an expression that may not consume any input)",
                    Some(expr.span),
                    Vec::new(),
                );
            }
        }
    });
}

pub fn report_infinite_recursion(
    grammar: &mut Grammar,
    _options: &CompileOptions,
    session: &Session,
) {
    let grammar = &*grammar;
    let mut seen = HashSet::new();
    let mut path = Vec::new();
    let mut backtrace = Vec::new();

    for rule in &grammar.rules {
        visit_rule(grammar, rule, &mut seen, &mut path, &mut backtrace, session);
        debug_assert!(path.is_empty() && backtrace.is_empty());
    }
}

fn visit_rule<'a>(
    grammar: &'a Grammar,
    rule: &'a Rule,
    seen: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    backtrace: &mut Vec<(&'a str, Span)>,
    session: &Session,
) {
    if !seen.insert(&rule.name) {
        return;
    }
    path.push(&rule.name);
    visit_expr(grammar, &rule.expr, seen, path, backtrace, session);
    path.pop();
}

fn visit_expr<'a>(
    grammar: &'a Grammar,
    expr: &'a Expr,
    seen: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    backtrace: &mut Vec<(&'a str, Span)>,
    session: &Session,
) {
    match &expr.kind {
        ExprKind::RuleReference(name) => {
            backtrace.push((name.as_str(), expr.span));
            if path.contains(&name.as_str()) {
                report_left_recursion(grammar, name, path, backtrace, session);
            } else if let Some(rule) = grammar.find_rule(name) {
                visit_rule(grammar, rule, seen, path, backtrace, session);
            }
            backtrace.pop();
        }
        ExprKind::Sequence(elements) => {
            // elements after the first consuming one cannot extend a
            // left-recursive prefix
            for element in elements {
                visit_expr(grammar, element, seen, path, backtrace, session);
                if grammar.always_consumes_on_success(element) {
                    break;
                }
            }
        }
        _ => expr.for_each_child(|child| {
            visit_expr(grammar, child, seen, path, backtrace, session)
        }),
    }
}

fn report_left_recursion(
    grammar: &Grammar,
    target: &str,
    path: &[&str],
    backtrace: &[(&str, Span)],
    session: &Session,
) {
    let start = path.iter().position(|rule| *rule == target).unwrap();
    let mut chain = path[start..].join(" -> ");
    chain.push_str(" -> ");
    chain.push_str(target);

    let mut notes = Vec::with_capacity(backtrace.len() + 1);
    for (step, (name, span)) in backtrace.iter().enumerate() {
        notes.push(Note {
            message: format!(
                "Step {}: call of the rule \"{}\" without input consumption",
                step + 1,
                name
            ),
            span: *span,
        });
    }
    let (_, last_span) = *backtrace.last().unwrap();
    notes.push(Note {
        message: format!(
            "Step {}: call itself without input consumption - left recursion",
            backtrace.len() + 1
        ),
        span: last_span,
    });

    let rule = grammar.find_rule(target).unwrap();
    session.error(
        format!("Possible infinite loop when parsing (left recursion: {chain})"),
        Some(rule.name_span),
        notes,
    );
}

pub fn report_incorrect_plucking(
    grammar: &mut Grammar,
    _options: &CompileOptions,
    session: &Session,
) {
    fn check(expr: &Expr, action: Option<&CodeBlock>, session: &Session) {
        match &expr.kind {
            ExprKind::Action { expr, code } => check(expr, Some(code), session),
            ExprKind::Labeled {
                pick,
                label_span,
                expr,
                ..
            } => {
                if *pick {
                    if let Some(code) = action {
                        session.error(
                            "\"@\" cannot be used with an action block",
                            Some(*label_span),
                            vec![Note {
                                message: "Action block location".to_owned(),
                                span: code.span,
                            }],
                        );
                    }
                }
                check(expr, None, session);
            }
            _ => expr.for_each_child(|child| check(child, action, session)),
        }
    }

    for rule in &grammar.rules {
        check(&rule.expr, None, session);
    }
}
