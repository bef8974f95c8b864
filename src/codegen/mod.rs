//! Lowers the analyzed grammar into stack-machine bytecode, one program per
//! rule, interning literals, character classes, expectations and user-code
//! bodies into the grammar's constant pools.
//!
//! Every emitted fragment pushes exactly one value (a match value or the
//! FAILED sentinel) onto the stack on exit; `sp` tracks the simulated stack
//! pointer so label bindings can be addressed relative to it.

pub mod opcode;

use cranelift_entity::PrimaryMap;

use crate::{
    ast::{
        CharClass, ClassId, CodeBlock, Expectation, ExpectationId, Expr, ExprKind, FunctionDesc,
        FunctionId, Grammar, LiteralId, Match, Rule,
    },
    session::Session,
};

use self::opcode::Opcode;

use crate::compile::CompileOptions;

pub fn generate_bytecode(grammar: &mut Grammar, _options: &CompileOptions, _session: &Session) {
    let mut generator = Generator::new(grammar.rules.iter().map(|rule| rule.name.clone()).collect());

    for index in 0..grammar.rules.len() {
        let bytecode = generator.emit_rule(&grammar.rules[index]);
        grammar.rules[index].bytecode = Some(bytecode);
    }

    let Generator {
        literals,
        classes,
        expectations,
        functions,
        ..
    } = generator;
    grammar.literals = literals;
    grammar.classes = classes;
    grammar.expectations = expectations;
    grammar.functions = functions;
}

/// Label bindings in insertion order, each mapping to the stack position of
/// its bound value. The order decides the parameter order of interned
/// user-code functions.
type Env = Vec<(String, i32)>;

struct Generator {
    rule_names: Vec<String>,
    literals: PrimaryMap<LiteralId, String>,
    classes: PrimaryMap<ClassId, CharClass>,
    expectations: PrimaryMap<ExpectationId, Expectation>,
    functions: PrimaryMap<FunctionId, FunctionDesc>,
}

fn result(expr: &Expr) -> Match {
    expr.match_result().unwrap_or(Match::Sometimes)
}

fn build_sequence(parts: impl IntoIterator<Item = Vec<u32>>) -> Vec<u32> {
    parts.into_iter().flatten().collect()
}

/// Emits `cond` with then/else branch lengths and bodies inline, dropping
/// everything but the statically-known branch when `m` decides the outcome.
fn build_condition(m: Match, cond: Vec<u32>, then_code: Vec<u32>, else_code: Vec<u32>) -> Vec<u32> {
    match m {
        Match::Always => then_code,
        Match::Never => else_code,
        Match::Sometimes => {
            let mut code = cond;
            code.push(then_code.len() as u32);
            code.push(else_code.len() as u32);
            code.extend(then_code);
            code.extend(else_code);
            code
        }
    }
}

fn build_loop(cond: Vec<u32>, body: Vec<u32>) -> Vec<u32> {
    let mut code = cond;
    code.push(body.len() as u32);
    code.extend(body);
    code
}

fn build_append_loop(body: Vec<u32>) -> Vec<u32> {
    build_loop(
        vec![Opcode::WhileNotError as u32],
        build_sequence([vec![Opcode::Append as u32], body]),
    )
}

fn env_keys(env: &Env) -> Vec<String> {
    env.iter().map(|(name, _)| name.clone()).collect()
}

impl Generator {
    fn new(rule_names: Vec<String>) -> Generator {
        Generator {
            rule_names,
            literals: PrimaryMap::new(),
            classes: PrimaryMap::new(),
            expectations: PrimaryMap::new(),
            functions: PrimaryMap::new(),
        }
    }

    fn rule_index(&self, name: &str) -> u32 {
        self.rule_names
            .iter()
            .position(|rule| rule == name)
            .unwrap_or_else(|| panic!("reference to the missing rule \"{name}\""))
            as u32
    }

    fn intern_literal(&mut self, value: &str) -> LiteralId {
        for (id, existing) in self.literals.iter() {
            if existing == value {
                return id;
            }
        }
        self.literals.push(value.to_owned())
    }

    fn intern_class(&mut self, class: &CharClass) -> ClassId {
        for (id, existing) in self.classes.iter() {
            if existing == class {
                return id;
            }
        }
        self.classes.push(class.clone())
    }

    fn intern_expectation(&mut self, expectation: Expectation) -> ExpectationId {
        for (id, existing) in self.expectations.iter() {
            if *existing == expectation {
                return id;
            }
        }
        self.expectations.push(expectation)
    }

    fn intern_function(&mut self, predicate: bool, params: Vec<String>, code: &CodeBlock) -> FunctionId {
        let desc = FunctionDesc {
            predicate,
            params,
            body: code.code.clone(),
            span: code.span,
        };
        for (id, existing) in self.functions.iter() {
            if *existing == desc {
                return id;
            }
        }
        self.functions.push(desc)
    }

    fn build_call(&self, function: FunctionId, delta: u32, env: &Env, sp: i32) -> Vec<u32> {
        let mut code = vec![
            Opcode::Call as u32,
            function.as_u32(),
            delta,
            env.len() as u32,
        ];
        code.extend(env.iter().map(|(_, pos)| (sp - pos) as u32));
        code
    }

    fn emit_rule(&mut self, rule: &Rule) -> Vec<u32> {
        let mut env = Env::new();
        self.emit_expr(&rule.expr, -1, &mut env, None, None)
    }

    fn emit_expr(
        &mut self,
        expr: &Expr,
        sp: i32,
        env: &mut Env,
        pluck: Option<&mut Vec<i32>>,
        action: Option<&CodeBlock>,
    ) -> Vec<u32> {
        match &expr.kind {
            ExprKind::Choice(alternatives) => self.emit_choice(alternatives, sp, env),
            ExprKind::Sequence(elements) => self.emit_sequence(elements, sp, env, action),
            ExprKind::Named { name, expr: inner } => {
                self.emit_named(expr, name, inner, sp, env, pluck, action)
            }
            ExprKind::Action { expr: inner, code } => self.emit_action(inner, code, sp, env),
            ExprKind::Labeled {
                label,
                pick,
                expr: inner,
                ..
            } => self.emit_labeled(label.as_deref(), *pick, inner, sp, env, pluck),
            ExprKind::Text(inner) => self.emit_text(inner, sp, env),
            ExprKind::And(inner) => self.emit_simple_predicate(inner, false, sp, env),
            ExprKind::Not(inner) => self.emit_simple_predicate(inner, true, sp, env),
            ExprKind::Optional(inner) => self.emit_optional(inner, sp, env),
            ExprKind::ZeroOrMore(inner) => self.emit_zero_or_more(inner, sp, env),
            ExprKind::OneOrMore(inner) => self.emit_one_or_more(inner, sp, env),
            ExprKind::Group(inner) => self.emit_expr(inner, sp, &mut env.clone(), None, None),
            ExprKind::RuleReference(name) => {
                vec![Opcode::Rule as u32, self.rule_index(name)]
            }
            ExprKind::Predicate { not, code } => {
                self.emit_semantic_predicate(*not, code, sp, env)
            }
            ExprKind::Literal { value, ignore_case } => {
                self.emit_literal(expr, value, *ignore_case)
            }
            ExprKind::Class(class) => self.emit_class(expr, class),
            ExprKind::Any => self.emit_any(expr),
        }
    }

    fn emit_choice(&mut self, alternatives: &[Expr], sp: i32, env: &Env) -> Vec<u32> {
        let (first, rest) = alternatives
            .split_first()
            .expect("choice with no alternatives");
        let first_code = self.emit_expr(first, sp, &mut env.clone(), None, None);

        // an alternative that always matches makes the rest unreachable
        if result(first) == Match::Always || rest.is_empty() {
            return first_code;
        }

        let rest_code = self.emit_choice(rest, sp, env);
        build_sequence([
            first_code,
            build_condition(
                Match::Sometimes,
                vec![Opcode::IfError as u32],
                build_sequence([vec![Opcode::Pop as u32], rest_code]),
                vec![],
            ),
        ])
    }

    fn emit_sequence(
        &mut self,
        elements: &[Expr],
        sp: i32,
        env: &mut Env,
        action: Option<&CodeBlock>,
    ) -> Vec<u32> {
        let total = elements.len() as u32;
        let mut pluck = Vec::new();
        let body = self.emit_elements(elements, total, sp + 1, env, &mut pluck, action);
        build_sequence([vec![Opcode::PushCurrPos as u32], body])
    }

    fn emit_elements(
        &mut self,
        rest: &[Expr],
        total: u32,
        sp: i32,
        env: &mut Env,
        pluck: &mut Vec<i32>,
        action: Option<&CodeBlock>,
    ) -> Vec<u32> {
        let Some((first, tail)) = rest.split_first() else {
            // all elements matched, build the sequence value
            if !pluck.is_empty() {
                let mut code = vec![Opcode::Pluck as u32, total + 1, pluck.len() as u32];
                code.extend(pluck.iter().map(|&pos| (sp - pos) as u32));
                return code;
            }
            if let Some(code_block) = action {
                let function = self.intern_function(false, env_keys(env), code_block);
                return build_sequence([
                    vec![Opcode::LoadSavedPos as u32, total],
                    self.build_call(function, total + 1, env, sp),
                ]);
            }
            return build_sequence([
                vec![Opcode::Wrap as u32, total],
                vec![Opcode::Nip as u32],
            ]);
        };

        let processed = total - rest.len() as u32 + 1;
        let first_code = self.emit_expr(first, sp, env, Some(&mut *pluck), None);
        let tail_code = self.emit_elements(tail, total, sp + 1, env, pluck, action);
        let fail_code = build_sequence([
            if processed > 1 {
                vec![Opcode::PopN as u32, processed]
            } else {
                vec![Opcode::Pop as u32]
            },
            vec![Opcode::PopCurrPos as u32],
            vec![Opcode::PushFailed as u32],
        ]);

        build_sequence([
            first_code,
            build_condition(
                result(first),
                vec![Opcode::IfNotError as u32],
                tail_code,
                fail_code,
            ),
        ])
    }

    fn emit_named(
        &mut self,
        node: &Expr,
        name: &str,
        inner: &Expr,
        sp: i32,
        env: &mut Env,
        pluck: Option<&mut Vec<i32>>,
        action: Option<&CodeBlock>,
    ) -> Vec<u32> {
        let m = result(node);
        let name_index = (m != Match::Always)
            .then(|| self.intern_expectation(Expectation::Rule(name.to_owned())));
        let inner_code = self.emit_expr(inner, sp, env, pluck, action);
        // FAIL pushes the sentinel, so the child's failure is popped first to
        // keep both branches stack-balanced
        let fail_code = match name_index {
            Some(index) => vec![Opcode::Pop as u32, Opcode::Fail as u32, index.as_u32()],
            None => vec![],
        };

        build_sequence([
            vec![Opcode::SilentFailsOn as u32],
            inner_code,
            vec![Opcode::SilentFailsOff as u32],
            build_condition(m.negate(), vec![Opcode::IfError as u32], fail_code, vec![]),
        ])
    }

    fn emit_action(&mut self, inner: &Expr, code: &CodeBlock, sp: i32, env: &Env) -> Vec<u32> {
        // a non-empty sequence child collapses the action into its own tail
        let emit_call = !matches!(&inner.kind, ExprKind::Sequence(elements) if !elements.is_empty());
        let mut scope = env.clone();
        let inner_code =
            self.emit_expr(inner, sp + emit_call as i32, &mut scope, None, Some(code));
        if !emit_call {
            return inner_code;
        }

        let m = result(inner);
        let call_code = if m != Match::Never {
            let function = self.intern_function(false, env_keys(&scope), code);
            build_sequence([
                vec![Opcode::LoadSavedPos as u32, 1],
                self.build_call(function, 1, &scope, sp + 2),
            ])
        } else {
            vec![]
        };

        build_sequence([
            vec![Opcode::PushCurrPos as u32],
            inner_code,
            build_condition(m, vec![Opcode::IfNotError as u32], call_code, vec![]),
            vec![Opcode::Nip as u32],
        ])
    }

    fn emit_labeled(
        &mut self,
        label: Option<&str>,
        pick: bool,
        inner: &Expr,
        sp: i32,
        env: &mut Env,
        pluck: Option<&mut Vec<i32>>,
    ) -> Vec<u32> {
        if pick {
            if let Some(list) = pluck {
                list.push(sp + 1);
            }
        }
        if let Some(label) = label {
            // the binding goes into the parent scope, the child runs in a
            // snapshot so its own bindings stay local
            let mut child_env = env.clone();
            env.push((label.to_owned(), sp + 1));
            self.emit_expr(inner, sp, &mut child_env, None, None)
        } else {
            self.emit_expr(inner, sp, env, None, None)
        }
    }

    fn emit_text(&mut self, inner: &Expr, sp: i32, env: &Env) -> Vec<u32> {
        let inner_code = self.emit_expr(inner, sp + 1, &mut env.clone(), None, None);
        build_sequence([
            vec![Opcode::PushCurrPos as u32],
            inner_code,
            build_condition(
                result(inner),
                vec![Opcode::IfNotError as u32],
                build_sequence([vec![Opcode::Pop as u32], vec![Opcode::Text as u32]]),
                vec![Opcode::Nip as u32],
            ),
        ])
    }

    fn emit_simple_predicate(&mut self, inner: &Expr, not: bool, sp: i32, env: &Env) -> Vec<u32> {
        let m = result(inner);
        let inner_code = self.emit_expr(inner, sp + 1, &mut env.clone(), None, None);
        let cond = if not { m.negate() } else { m };

        build_sequence([
            vec![Opcode::PushCurrPos as u32],
            vec![Opcode::SilentFailsOn as u32],
            inner_code,
            vec![Opcode::SilentFailsOff as u32],
            build_condition(
                cond,
                vec![if not {
                    Opcode::IfError as u32
                } else {
                    Opcode::IfNotError as u32
                }],
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![if not {
                        Opcode::Pop as u32
                    } else {
                        Opcode::PopCurrPos as u32
                    }],
                    vec![Opcode::PushUndefined as u32],
                ]),
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![if not {
                        Opcode::PopCurrPos as u32
                    } else {
                        Opcode::Pop as u32
                    }],
                    vec![Opcode::PushFailed as u32],
                ]),
            ),
        ])
    }

    fn emit_semantic_predicate(
        &mut self,
        not: bool,
        code: &CodeBlock,
        sp: i32,
        env: &Env,
    ) -> Vec<u32> {
        let function = self.intern_function(true, env_keys(env), code);

        build_sequence([
            vec![Opcode::UpdateSavedPos as u32],
            self.build_call(function, 0, env, sp),
            build_condition(
                Match::Sometimes,
                vec![Opcode::If as u32],
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![if not {
                        Opcode::PushFailed as u32
                    } else {
                        Opcode::PushUndefined as u32
                    }],
                ]),
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![if not {
                        Opcode::PushUndefined as u32
                    } else {
                        Opcode::PushFailed as u32
                    }],
                ]),
            ),
        ])
    }

    fn emit_optional(&mut self, inner: &Expr, sp: i32, env: &Env) -> Vec<u32> {
        let inner_code = self.emit_expr(inner, sp, &mut env.clone(), None, None);
        build_sequence([
            inner_code,
            build_condition(
                result(inner).negate(),
                vec![Opcode::IfError as u32],
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![Opcode::PushNull as u32],
                ]),
                vec![],
            ),
        ])
    }

    fn emit_zero_or_more(&mut self, inner: &Expr, sp: i32, env: &Env) -> Vec<u32> {
        let inner_code = self.emit_expr(inner, sp + 1, &mut env.clone(), None, None);
        build_sequence([
            vec![Opcode::PushEmptyArray as u32],
            inner_code.clone(),
            build_append_loop(inner_code),
            vec![Opcode::Pop as u32],
        ])
    }

    fn emit_one_or_more(&mut self, inner: &Expr, sp: i32, env: &Env) -> Vec<u32> {
        let inner_code = self.emit_expr(inner, sp + 1, &mut env.clone(), None, None);
        build_sequence([
            vec![Opcode::PushEmptyArray as u32],
            inner_code.clone(),
            build_condition(
                result(inner),
                vec![Opcode::IfNotError as u32],
                build_sequence([build_append_loop(inner_code), vec![Opcode::Pop as u32]]),
                build_sequence([
                    vec![Opcode::Pop as u32],
                    vec![Opcode::Pop as u32],
                    vec![Opcode::PushFailed as u32],
                ]),
            ),
        ])
    }

    fn emit_literal(&mut self, node: &Expr, value: &str, ignore_case: bool) -> Vec<u32> {
        if value.is_empty() {
            return vec![Opcode::PushEmptyString as u32];
        }

        match result(node) {
            Match::Always => {
                // the matched text is still pushed, so a case-sensitive
                // literal needs its pool entry even without a condition
                if ignore_case {
                    vec![Opcode::AcceptN as u32, value.chars().count() as u32]
                } else {
                    let literal = self.intern_literal(value);
                    vec![Opcode::AcceptString as u32, literal.as_u32()]
                }
            }
            Match::Never => {
                let expectation = self.intern_expectation(Expectation::Literal {
                    value: value.to_owned(),
                    ignore_case,
                });
                vec![Opcode::Fail as u32, expectation.as_u32()]
            }
            Match::Sometimes => {
                let literal = if ignore_case {
                    self.intern_literal(&value.to_lowercase())
                } else {
                    self.intern_literal(value)
                };
                let expectation = self.intern_expectation(Expectation::Literal {
                    value: value.to_owned(),
                    ignore_case,
                });
                build_condition(
                    Match::Sometimes,
                    if ignore_case {
                        vec![Opcode::MatchStringIc as u32, literal.as_u32()]
                    } else {
                        vec![Opcode::MatchString as u32, literal.as_u32()]
                    },
                    if ignore_case {
                        vec![Opcode::AcceptN as u32, value.chars().count() as u32]
                    } else {
                        vec![Opcode::AcceptString as u32, literal.as_u32()]
                    },
                    vec![Opcode::Fail as u32, expectation.as_u32()],
                )
            }
        }
    }

    fn emit_class(&mut self, node: &Expr, class: &CharClass) -> Vec<u32> {
        match result(node) {
            Match::Always => vec![Opcode::AcceptN as u32, 1],
            Match::Never => {
                let expectation = self.intern_expectation(Expectation::Class(class.clone()));
                vec![Opcode::Fail as u32, expectation.as_u32()]
            }
            Match::Sometimes => {
                let class_index = self.intern_class(class);
                let expectation = self.intern_expectation(Expectation::Class(class.clone()));
                build_condition(
                    Match::Sometimes,
                    vec![Opcode::MatchCharClass as u32, class_index.as_u32()],
                    vec![Opcode::AcceptN as u32, 1],
                    vec![Opcode::Fail as u32, expectation.as_u32()],
                )
            }
        }
    }

    fn emit_any(&mut self, node: &Expr) -> Vec<u32> {
        match result(node) {
            Match::Always => vec![Opcode::AcceptN as u32, 1],
            Match::Never => {
                let expectation = self.intern_expectation(Expectation::Any);
                vec![Opcode::Fail as u32, expectation.as_u32()]
            }
            Match::Sometimes => {
                let expectation = self.intern_expectation(Expectation::Any);
                build_condition(
                    Match::Sometimes,
                    vec![Opcode::MatchAny as u32],
                    vec![Opcode::AcceptN as u32, 1],
                    vec![Opcode::Fail as u32, expectation.as_u32()],
                )
            }
        }
    }
}
