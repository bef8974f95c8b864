#![allow(dead_code)]

use pegc::{
    ast::Grammar, codegen::opcode::Opcode, CompileError, GenerateError, GenerateOptions,
};

pub fn compile(src: &str) -> Grammar {
    pegc::generate(src, GenerateOptions::default()).unwrap()
}

pub fn compile_with_start_rules(src: &str, start_rules: &[&str]) -> Grammar {
    let options = GenerateOptions {
        allowed_start_rules: start_rules.iter().map(|rule| rule.to_string()).collect(),
        ..GenerateOptions::default()
    };
    pegc::generate(src, options).unwrap()
}

pub fn compile_err(src: &str) -> CompileError {
    match pegc::generate(src, GenerateOptions::default()) {
        Err(GenerateError::Compile(error)) => error,
        other => panic!("expected a compile error, got {other:?}"),
    }
}

/// Reference walk over every rule's bytecode: opcodes must decode, branch
/// lengths must cover their inlined bodies exactly, pool and rule indices
/// must be valid, and each rule must net exactly one pushed value whatever
/// branches run.
pub fn check_bytecode(grammar: &Grammar) {
    for rule in &grammar.rules {
        let code = rule.bytecode.as_ref().expect("rule without bytecode");
        let delta = simulate(grammar, code);
        assert_eq!(delta, 1, "rule \"{}\" must net one pushed value", rule.name);
    }
}

fn arg(code: &[u32], pos: &mut usize) -> u32 {
    let value = *code.get(*pos).expect("truncated instruction");
    *pos += 1;
    value
}

fn simulate(grammar: &Grammar, code: &[u32]) -> i64 {
    let mut pos = 0;
    let mut sp = 0i64;

    while pos < code.len() {
        let word = code[pos];
        let opcode =
            Opcode::try_from(word).unwrap_or_else(|_| panic!("unknown opcode {word} at {pos}"));
        pos += 1;

        match opcode {
            Opcode::PushUndefined
            | Opcode::PushNull
            | Opcode::PushFailed
            | Opcode::PushEmptyArray
            | Opcode::PushCurrPos
            | Opcode::PushEmptyString => sp += 1,
            Opcode::Pop | Opcode::PopCurrPos | Opcode::Nip | Opcode::Append => sp -= 1,
            Opcode::PopN => sp -= arg(code, &mut pos) as i64,
            Opcode::Wrap => sp += 1 - arg(code, &mut pos) as i64,
            Opcode::Text
            | Opcode::UpdateSavedPos
            | Opcode::SilentFailsOn
            | Opcode::SilentFailsOff => {}
            Opcode::LoadSavedPos => {
                arg(code, &mut pos);
            }
            Opcode::Pluck => {
                let total = arg(code, &mut pos);
                let picked = arg(code, &mut pos);
                for _ in 0..picked {
                    arg(code, &mut pos);
                }
                sp += 1 - total as i64;
            }
            Opcode::If | Opcode::IfError | Opcode::IfNotError | Opcode::MatchAny => {
                sp += branch(grammar, code, &mut pos);
            }
            Opcode::MatchString | Opcode::MatchStringIc => {
                let index = arg(code, &mut pos) as usize;
                assert!(index < grammar.literals.len(), "literal index {index} out of range");
                sp += branch(grammar, code, &mut pos);
            }
            Opcode::MatchCharClass => {
                let index = arg(code, &mut pos) as usize;
                assert!(index < grammar.classes.len(), "class index {index} out of range");
                sp += branch(grammar, code, &mut pos);
            }
            Opcode::WhileNotError => {
                let len = arg(code, &mut pos) as usize;
                let body = code.get(pos..pos + len).expect("loop body exceeds code");
                assert_eq!(simulate(grammar, body), 0, "loop body must be stack neutral");
                pos += len;
            }
            Opcode::AcceptN => {
                arg(code, &mut pos);
                sp += 1;
            }
            Opcode::AcceptString => {
                let index = arg(code, &mut pos) as usize;
                assert!(index < grammar.literals.len(), "literal index {index} out of range");
                sp += 1;
            }
            Opcode::Fail => {
                let index = arg(code, &mut pos) as usize;
                assert!(
                    index < grammar.expectations.len(),
                    "expectation index {index} out of range"
                );
                sp += 1;
            }
            Opcode::Call => {
                let function = arg(code, &mut pos) as usize;
                assert!(
                    function < grammar.functions.len(),
                    "function index {function} out of range"
                );
                let delta = arg(code, &mut pos) as i64;
                let argc = arg(code, &mut pos);
                for _ in 0..argc {
                    arg(code, &mut pos);
                }
                sp += 1 - delta;
            }
            Opcode::Rule => {
                let index = arg(code, &mut pos) as usize;
                assert!(index < grammar.rules.len(), "rule index {index} out of range");
                sp += 1;
            }
        }
    }

    sp
}

fn branch(grammar: &Grammar, code: &[u32], pos: &mut usize) -> i64 {
    let then_len = arg(code, pos) as usize;
    let else_len = arg(code, pos) as usize;
    let then_body = code
        .get(*pos..*pos + then_len)
        .expect("then branch exceeds code");
    let else_body = code
        .get(*pos + then_len..*pos + then_len + else_len)
        .expect("else branch exceeds code");

    let then_delta = simulate(grammar, then_body);
    let else_delta = simulate(grammar, else_body);
    assert_eq!(then_delta, else_delta, "branches must agree on stack effect");

    *pos += then_len + else_len;
    then_delta
}
