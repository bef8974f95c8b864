//! Traversal primitives. Expression nodes with a single child share one
//! recursion rule; container nodes iterate their children. Passes that carry
//! state (label scopes, call stacks, emission contexts) match on the kinds
//! they handle and fall back to [`Expr::for_each_child`] for the rest.

use super::{Expr, ExprKind, Grammar};

impl Expr {
    /// Calls `f` for every direct child of this expression.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match &self.kind {
            ExprKind::Choice(children) | ExprKind::Sequence(children) => {
                for child in children {
                    f(child);
                }
            }
            ExprKind::Named { expr, .. }
            | ExprKind::Action { expr, .. }
            | ExprKind::Labeled { expr, .. }
            | ExprKind::Text(expr)
            | ExprKind::And(expr)
            | ExprKind::Not(expr)
            | ExprKind::Optional(expr)
            | ExprKind::ZeroOrMore(expr)
            | ExprKind::OneOrMore(expr)
            | ExprKind::Group(expr) => f(expr),
            ExprKind::RuleReference(_)
            | ExprKind::Predicate { .. }
            | ExprKind::Literal { .. }
            | ExprKind::Class(_)
            | ExprKind::Any => {}
        }
    }

    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Choice(children) | ExprKind::Sequence(children) => {
                for child in children {
                    f(child);
                }
            }
            ExprKind::Named { expr, .. }
            | ExprKind::Action { expr, .. }
            | ExprKind::Labeled { expr, .. }
            | ExprKind::Text(expr)
            | ExprKind::And(expr)
            | ExprKind::Not(expr)
            | ExprKind::Optional(expr)
            | ExprKind::ZeroOrMore(expr)
            | ExprKind::OneOrMore(expr)
            | ExprKind::Group(expr) => f(expr),
            ExprKind::RuleReference(_)
            | ExprKind::Predicate { .. }
            | ExprKind::Literal { .. }
            | ExprKind::Class(_)
            | ExprKind::Any => {}
        }
    }

    /// Pre-order deep visit of this expression and every descendant.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        self.for_each_child(|child| child.visit(f));
    }

    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        self.for_each_child_mut(|child| child.visit_mut(f));
    }
}

impl Grammar {
    /// Deep visit of every expression in every rule, in rule order.
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        for rule in &self.rules {
            rule.expr.visit(f);
        }
    }

    pub fn visit_exprs_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        for rule in &mut self.rules {
            rule.expr.visit_mut(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse, ParseOptions};

    use super::super::ExprKind;

    #[test]
    fn visit_reaches_every_node() {
        let g = parse("start = a:\"x\"? (b / !c)+", &ParseOptions::default()).unwrap();
        let mut kinds = Vec::new();
        g.visit_exprs(&mut |expr| {
            kinds.push(std::mem::discriminant(&expr.kind));
        });
        // sequence, labeled, optional, literal, one-or-more, group, choice,
        // rule ref, not, rule ref
        assert_eq!(kinds.len(), 10);
    }

    #[test]
    fn visit_order_is_source_order() {
        let g = parse("start = a b c", &ParseOptions::default()).unwrap();
        let mut refs = Vec::new();
        g.visit_exprs(&mut |expr| {
            if let ExprKind::RuleReference(name) = &expr.kind {
                refs.push(name.clone());
            }
        });
        assert_eq!(refs, ["a", "b", "c"]);
    }
}
