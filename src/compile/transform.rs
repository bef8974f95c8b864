//! Tree transformations run between validation and bytecode generation.

use crate::{
    ast::{Expr, ExprKind, Grammar, Match, Rule},
    session::{Note, Session},
    span::Span,
};

use super::CompileOptions;

/// Replaces references to proxy rules (rules whose body is a single rule
/// reference) with the rule they forward to, then drops the proxies unless
/// they are allowed start rules.
pub fn remove_proxy_rules(grammar: &mut Grammar, options: &CompileOptions, session: &Session) {
    let mut removed = Vec::new();

    for index in 0..grammar.rules.len() {
        let rule = &grammar.rules[index];
        let ExprKind::RuleReference(target) = &rule.expr.kind else {
            continue;
        };
        let proxy = rule.name.clone();
        let target = target.clone();
        let target_span = grammar
            .find_rule(&target)
            .unwrap_or_else(|| panic!("proxy rule \"{proxy}\" forwards to the missing rule \"{target}\""))
            .name_span;

        replace_rule_refs(grammar, &proxy, &target, target_span, session);

        if !options.allowed_start_rules.contains(&proxy) {
            removed.push(index);
        }
    }

    // splice out back to front so the collected indices stay valid
    for &index in removed.iter().rev() {
        grammar.rules.remove(index);
    }
}

fn replace_rule_refs(
    grammar: &mut Grammar,
    proxy: &str,
    target: &str,
    target_span: Span,
    session: &Session,
) {
    grammar.visit_exprs_mut(&mut |expr| {
        let span = expr.span;
        if let ExprKind::RuleReference(name) = &mut expr.kind {
            if name == proxy {
                *name = target.to_owned();
                session.info(
                    format!("Proxy rule \"{proxy}\" replaced by the rule \"{target}\""),
                    Some(span),
                    vec![Note {
                        message: "This rule will be used".to_owned(),
                        span: target_span,
                    }],
                );
            }
        }
    });
}

/// Annotates every rule and expression with its three-valued match result.
pub fn infer_match_results(grammar: &mut Grammar, _options: &CompileOptions, _session: &Session) {
    let grammar = &*grammar;
    for rule in &grammar.rules {
        infer_rule(grammar, rule);
    }
}

fn infer_rule(grammar: &Grammar, rule: &Rule) -> Match {
    if let Some(result) = rule.match_result() {
        return result;
    }

    // Fixed point over the rule body; recursive references see the value of
    // the previous iteration. The three-valued lattice must stabilize within
    // 3! = 6 steps, anything more is a bug in the inference rules.
    rule.set_match_result(Match::Sometimes);
    let mut iterations = 0;
    loop {
        let previous = rule.match_result().unwrap();
        let inferred = infer_expr(grammar, &rule.expr);
        rule.set_match_result(inferred);

        iterations += 1;
        if iterations > 6 {
            panic!(
                "match-result inference did not converge for rule \"{}\"",
                rule.name
            );
        }
        if inferred == previous {
            return inferred;
        }
    }
}

fn infer_expr(grammar: &Grammar, expr: &Expr) -> Match {
    let result = match &expr.kind {
        ExprKind::Any | ExprKind::Predicate { .. } => Match::Sometimes,
        ExprKind::Literal { value, .. } => {
            if value.is_empty() {
                Match::Always
            } else {
                Match::Sometimes
            }
        }
        ExprKind::Class(class) => {
            if class.parts.is_empty() {
                Match::Never
            } else {
                Match::Sometimes
            }
        }
        ExprKind::Optional(operand) | ExprKind::ZeroOrMore(operand) => {
            infer_expr(grammar, operand);
            Match::Always
        }
        ExprKind::Not(operand) => infer_expr(grammar, operand).negate(),
        ExprKind::Named { expr, .. }
        | ExprKind::Action { expr, .. }
        | ExprKind::Labeled { expr, .. }
        | ExprKind::Text(expr)
        | ExprKind::And(expr)
        | ExprKind::OneOrMore(expr)
        | ExprKind::Group(expr) => infer_expr(grammar, expr),
        ExprKind::Choice(alternatives) => {
            let results: Vec<Match> = alternatives
                .iter()
                .map(|alternative| infer_expr(grammar, alternative))
                .collect();
            if results.iter().all(|&r| r == Match::Always) {
                Match::Always
            } else if results.iter().all(|&r| r == Match::Never) {
                Match::Never
            } else {
                Match::Sometimes
            }
        }
        ExprKind::Sequence(elements) => {
            let results: Vec<Match> = elements
                .iter()
                .map(|element| infer_expr(grammar, element))
                .collect();
            if results.iter().all(|&r| r == Match::Always) {
                Match::Always
            } else if results.iter().any(|&r| r == Match::Never) {
                Match::Never
            } else {
                Match::Sometimes
            }
        }
        ExprKind::RuleReference(name) => match grammar.find_rule(name) {
            Some(rule) => infer_rule(grammar, rule),
            None => Match::Sometimes,
        },
    };

    expr.set_match_result(result);
    result
}
