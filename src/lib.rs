//! A compiler from parsing expression grammars to stack-machine bytecode.
//!
//! [`generate`] parses a grammar and runs the three-stage pipeline
//! (check → transform → generate) over it. The result is the same
//! [`Grammar`], annotated in place: every rule carries its bytecode and the
//! grammar carries the four constant pools (literals, character classes,
//! expectations, user-code functions) the bytecode indexes into. A separate
//! emitter turns that program into runnable parser source.
//!
//! ```
//! let grammar = pegc::generate("start = 'a'+", pegc::GenerateOptions::default()).unwrap();
//! assert!(grammar.rules[0].bytecode.is_some());
//! ```

pub mod ast;
pub mod codegen;
pub mod compile;
pub mod linemap;
pub mod parser;
pub mod session;
pub mod span;

pub use ast::{Grammar, Match};
pub use compile::{
    compile, generate, CompileOptions, Config, GenerateError, GenerateOptions, Pass, Plugin,
    Stages,
};
pub use parser::{parse, ParseOptions, SyntaxError};
pub use session::{CompileError, Note, Problem, Session, Severity, Stage};
pub use span::Span;
