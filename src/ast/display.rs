use std::fmt::Write;

use super::{CharClass, ClassPart, Expr, ExprKind, Grammar};

impl Grammar {
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        for rule in &self.rules {
            write!(buf, "\n")?;
            write!(buf, "{} =\n", rule.name)?;
            rule.expr.display_into_indent(buf, 1)?;
        }
        Ok(())
    }
}

impl CharClass {
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        write!(buf, "[")?;
        if self.inverted {
            write!(buf, "^")?;
        }
        for part in &self.parts {
            match *part {
                ClassPart::Single(c) => write!(buf, "{}", c.escape_default())?,
                ClassPart::Range(lo, hi) => {
                    write!(buf, "{}-{}", lo.escape_default(), hi.escape_default())?
                }
            }
        }
        write!(buf, "]")?;
        if self.ignore_case {
            write!(buf, "i")?;
        }
        Ok(())
    }
}

impl Expr {
    fn display_head(&self, buf: &mut dyn Write) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Choice(_) => write!(buf, "Choice"),
            ExprKind::Sequence(_) => write!(buf, "Sequence"),
            ExprKind::Named { name, .. } => write!(buf, "Named({name:?})"),
            ExprKind::Action { .. } => write!(buf, "Action"),
            ExprKind::Labeled { label, pick, .. } => {
                write!(buf, "Labeled(")?;
                if *pick {
                    write!(buf, "@")?;
                }
                if let Some(label) = label {
                    write!(buf, "{label}")?;
                }
                write!(buf, ")")
            }
            ExprKind::Text(_) => write!(buf, "Text"),
            ExprKind::And(_) => write!(buf, "And"),
            ExprKind::Not(_) => write!(buf, "Not"),
            ExprKind::Optional(_) => write!(buf, "Optional"),
            ExprKind::ZeroOrMore(_) => write!(buf, "ZeroOrMore"),
            ExprKind::OneOrMore(_) => write!(buf, "OneOrMore"),
            ExprKind::Group(_) => write!(buf, "Group"),
            ExprKind::RuleReference(name) => write!(buf, "RuleReference({name})"),
            ExprKind::Predicate { not: true, .. } => write!(buf, "PredicateNot"),
            ExprKind::Predicate { not: false, .. } => write!(buf, "PredicateAnd"),
            ExprKind::Literal { value, ignore_case } => {
                write!(buf, "Literal({value:?}")?;
                if *ignore_case {
                    write!(buf, " i")?;
                }
                write!(buf, ")")
            }
            ExprKind::Class(class) => {
                write!(buf, "Class(")?;
                class.display_into(buf)?;
                write!(buf, ")")
            }
            ExprKind::Any => write!(buf, "Any"),
        }
    }

    pub fn display_into_indent(&self, buf: &mut dyn Write, indent: u32) -> std::fmt::Result {
        for _ in 0..indent {
            write!(buf, "  ")?;
        }
        self.display_head(buf)?;
        write!(buf, "\n")?;
        let mut result = Ok(());
        self.for_each_child(|child| {
            if result.is_ok() {
                result = child.display_into_indent(&mut *buf, indent + 1);
            }
        });
        result
    }

    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        self.display_into_indent(buf, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{parse, ParseOptions};

    #[test]
    fn tree_dump() {
        let g = parse("start = @head:\"a\"i [b-d]* { x }", &ParseOptions::default()).unwrap();
        let mut buf = String::new();
        g.display_into(&mut buf).unwrap();
        assert_eq!(
            buf,
            "\nstart =\n\
             \x20 Action\n\
             \x20   Sequence\n\
             \x20     Labeled(@head)\n\
             \x20       Literal(\"a\" i)\n\
             \x20     ZeroOrMore\n\
             \x20       Class([b-d])\n"
        );
    }
}
