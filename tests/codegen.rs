mod common;

use common::{check_bytecode, compile};
use pegc::{
    ast::{ClassPart, Expectation},
    codegen::opcode::Opcode,
};
use pretty_assertions::assert_eq;

fn op(opcode: Opcode) -> u32 {
    opcode as u32
}

/// Returns true if `window` occurs anywhere in `code`.
fn contains(code: &[u32], window: &[u32]) -> bool {
    code.windows(window.len()).any(|w| w == window)
}

#[test]
fn single_literal_rule() {
    let grammar = compile("start = \"a\"");

    assert_eq!(grammar.literals.values().collect::<Vec<_>>(), [&"a".to_string()]);
    assert_eq!(
        grammar.expectations.values().collect::<Vec<_>>(),
        [&Expectation::Literal {
            value: "a".to_owned(),
            ignore_case: false,
        }]
    );

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert_eq!(
        bytecode,
        &[
            op(Opcode::MatchString),
            0,
            2,
            2,
            op(Opcode::AcceptString),
            0,
            op(Opcode::Fail),
            0,
        ]
    );
}

#[test]
fn empty_literal_pushes_empty_string() {
    let grammar = compile("start = \"\"");
    assert_eq!(
        grammar.rules[0].bytecode.as_ref().unwrap(),
        &[op(Opcode::PushEmptyString)]
    );
    assert_eq!(grammar.literals.len(), 0);
    assert_eq!(grammar.expectations.len(), 0);
}

#[test]
fn case_insensitive_literal() {
    let grammar = compile("start = \"AbC\"i");

    // the pool holds the lowercased needle, the expectation the original
    assert_eq!(grammar.literals.values().collect::<Vec<_>>(), [&"abc".to_string()]);
    assert_eq!(
        grammar.expectations.values().collect::<Vec<_>>(),
        [&Expectation::Literal {
            value: "AbC".to_owned(),
            ignore_case: true,
        }]
    );

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::MatchStringIc), 0]));
    assert!(contains(bytecode, &[op(Opcode::AcceptN), 3]));
}

#[test]
fn character_class_and_any() {
    let grammar = compile("start = [a-z0]i .");

    let classes: Vec<_> = grammar.classes.values().collect();
    assert_eq!(classes.len(), 1);
    assert_eq!(
        classes[0].parts,
        [ClassPart::Range('a', 'z'), ClassPart::Single('0')]
    );
    assert!(classes[0].ignore_case);
    assert_eq!(
        grammar.expectations.values().collect::<Vec<_>>().len(),
        2 // the class and "any"
    );

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::MatchCharClass), 0]));
    assert!(contains(bytecode, &[op(Opcode::MatchAny)]));
    check_bytecode(&grammar);
}

#[test]
fn choice_drops_alternatives_after_always_match() {
    let grammar = compile("start = \"\" / \"a\"");
    assert_eq!(
        grammar.rules[0].bytecode.as_ref().unwrap(),
        &[op(Opcode::PushEmptyString)]
    );
    // nothing from the unreachable alternative was interned
    assert_eq!(grammar.literals.len(), 0);
}

#[test]
fn rule_reference_uses_rule_index() {
    let grammar = compile("start = b \".\"\nb = \"x\" start?");
    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::Rule), 1]));
    let callee = grammar.rules[1].bytecode.as_ref().unwrap();
    assert!(contains(callee, &[op(Opcode::Rule), 0]));
}

#[test]
fn sequence_action_collapses_into_tail_call() {
    let grammar = compile("start = a:\"x\" b:\"y\" { use(a, b) }");

    assert_eq!(grammar.functions.len(), 1);
    let function = grammar.functions.values().next().unwrap();
    assert!(!function.predicate);
    assert_eq!(function.params, ["a", "b"]);
    assert_eq!(function.body, " use(a, b) ");

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    // LOAD_SAVED_POS over both elements, then CALL with both labels passed
    assert!(contains(
        bytecode,
        &[op(Opcode::LoadSavedPos), 2, op(Opcode::Call), 0, 3, 2, 1, 0]
    ));
    check_bytecode(&grammar);
}

#[test]
fn plucked_sequence_emits_pluck() {
    let grammar = compile("start = @\"a\" \"b\"");
    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    // three stack slots (saved position + two elements), one pick at depth 1
    assert!(contains(bytecode, &[op(Opcode::Pluck), 3, 1, 1]));
    check_bytecode(&grammar);
}

#[test]
fn semantic_predicate_interns_a_predicate_function() {
    let grammar = compile("start = a:\"x\" &{ ok }");

    assert_eq!(grammar.functions.len(), 1);
    let function = grammar.functions.values().next().unwrap();
    assert!(function.predicate);
    assert_eq!(function.params, ["a"]);

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::UpdateSavedPos)]));
    check_bytecode(&grammar);
}

#[test]
fn identical_action_bodies_share_a_pool_slot() {
    let grammar = compile("start = \"a\" { go() } / \"b\" { go() }");
    assert_eq!(grammar.functions.len(), 1);
    check_bytecode(&grammar);
}

#[test]
fn named_rule_reports_through_its_display_name() {
    let grammar = compile("start \"the start\" = \"a\"");

    let expectations: Vec<_> = grammar.expectations.values().collect();
    assert_eq!(expectations[0], &Expectation::Rule("the start".to_owned()));

    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert_eq!(bytecode[0], op(Opcode::SilentFailsOn));
    assert!(contains(bytecode, &[op(Opcode::SilentFailsOff)]));
    assert!(contains(bytecode, &[op(Opcode::Pop), op(Opcode::Fail), 0]));
    check_bytecode(&grammar);
}

#[test]
fn pools_are_deterministic() {
    let src = "start = \"a\" \"b\" \"a\" [0-9] [0-9]i . &{ p } word\n\
               word = $[a-z]+ { text() }";
    let first = compile(src);
    let second = compile(src);

    assert_eq!(
        first.literals.values().collect::<Vec<_>>(),
        second.literals.values().collect::<Vec<_>>()
    );
    assert_eq!(
        first.classes.values().collect::<Vec<_>>(),
        second.classes.values().collect::<Vec<_>>()
    );
    assert_eq!(
        first.expectations.values().collect::<Vec<_>>(),
        second.expectations.values().collect::<Vec<_>>()
    );
    assert_eq!(
        first.functions.values().collect::<Vec<_>>(),
        second.functions.values().collect::<Vec<_>>()
    );
    for (a, b) in first.rules.iter().zip(&second.rules) {
        assert_eq!(a.bytecode, b.bytecode);
    }

    // repeated literals intern once, same class with distinct flags twice
    assert_eq!(
        first.literals.values().collect::<Vec<_>>(),
        [&"a".to_string(), &"b".to_string()]
    );
    assert_eq!(first.classes.len(), 3);
}

#[test]
fn stack_discipline_over_every_construct() {
    let grammar = compile(
        "start = \"\" item (\",\" item)* tail:(\".\" / \";\")? !.\n\
         item \"an item\" = @word:word &{ ok(word) } / $(\"0x\"i hex+) / fallback\n\
         word = chars:[a-z]+ { join(chars) }\n\
         hex = [0-9a-f]\n\
         fallback = &\"!\" (\"!\" { bang() } / \"?\") / sub*\n\
         sub = \"s\"",
    );
    check_bytecode(&grammar);
}

#[test]
fn lookahead_bytecode_shape() {
    let grammar = compile("start = &\"a\" !\"b\" \"c\"");
    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::SilentFailsOn)]));
    assert!(contains(bytecode, &[op(Opcode::PushUndefined)]));
    check_bytecode(&grammar);
}

#[test]
fn repetition_bytecode_shape() {
    let grammar = compile("start = \"a\"* \"b\"+");
    let bytecode = grammar.rules[0].bytecode.as_ref().unwrap();
    assert!(contains(bytecode, &[op(Opcode::PushEmptyArray)]));
    assert!(contains(bytecode, &[op(Opcode::WhileNotError)]));
    check_bytecode(&grammar);
}
