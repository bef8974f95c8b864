//! The compiler pipeline: check → transform → generate, each stage an
//! ordered list of passes sharing the grammar, the options and the session.

pub mod check;
pub mod transform;

use thiserror::Error;
use tracing::debug;

use crate::{
    ast::Grammar,
    codegen,
    parser::{self, ParseOptions, SyntaxError, DEFAULT_RESERVED_WORDS},
    session::{CompileError, ProblemCallback, Session, Stage},
};

/// A single pipeline pass. Passes report through the session and never
/// unwind on semantic problems.
pub type Pass = fn(&mut Grammar, &CompileOptions, &Session);

/// The ordered pass lists of the three stages.
#[derive(Clone)]
pub struct Stages {
    pub check: Vec<Pass>,
    pub transform: Vec<Pass>,
    pub generate: Vec<Pass>,
}

impl Default for Stages {
    fn default() -> Self {
        Stages {
            check: vec![
                check::report_undefined_rules,
                check::report_duplicate_rules,
                check::report_duplicate_labels,
                check::report_infinite_repetition,
                check::report_infinite_recursion,
                check::report_incorrect_plucking,
            ],
            transform: vec![
                transform::remove_proxy_rules,
                transform::infer_match_results,
            ],
            generate: vec![codegen::generate_bytecode],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Rules usable as entry points. Empty means the first rule; the
    /// sentinel `*` expands to every rule.
    pub allowed_start_rules: Vec<String>,
    /// Passed through to the emitter, no effect on analysis.
    pub cache: bool,
    /// Passed through to the emitter, no effect on analysis.
    pub trace: bool,
}

#[derive(Default)]
pub struct GenerateOptions {
    pub allowed_start_rules: Vec<String>,
    pub cache: bool,
    pub trace: bool,
    /// Opaque identifier attached to the grammar for diagnostic rendering.
    pub grammar_source: Option<String>,
    pub plugins: Vec<Box<dyn Plugin>>,
    pub on_error: Option<ProblemCallback>,
    pub on_warning: Option<ProblemCallback>,
    pub on_info: Option<ProblemCallback>,
}

/// The per-invocation pipeline configuration plugins may alter.
pub struct Config {
    pub parser: GrammarParser,
    pub stages: Stages,
    pub reserved_words: Vec<String>,
}

pub type GrammarParser = fn(&str, &ParseOptions) -> Result<Grammar, SyntaxError>;

impl Default for Config {
    fn default() -> Self {
        Config {
            parser: parser::parse,
            stages: Stages::default(),
            reserved_words: DEFAULT_RESERVED_WORDS
                .iter()
                .map(|word| word.to_string())
                .collect(),
        }
    }
}

/// A configurator run before compilation starts. It may swap the parser,
/// register passes in any stage, or replace the reserved-word list.
pub trait Plugin {
    fn configure(&self, config: &mut Config, options: &mut GenerateOptions);
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("the grammar does not define any rules")]
    EmptyGrammar,
    #[error("unknown start rule \"{0}\"")]
    UnknownStartRule(String),
}

/// Runs every stage over the grammar, flushing collected errors at each
/// stage boundary.
pub fn compile(
    grammar: &mut Grammar,
    stages: &Stages,
    options: &CompileOptions,
    session: &Session,
) -> Result<(), GenerateError> {
    let options = resolve_start_rules(grammar, options)?;

    for (stage, passes) in [
        (Stage::Check, &stages.check),
        (Stage::Transform, &stages.transform),
        (Stage::Generate, &stages.generate),
    ] {
        debug!(%stage, passes = passes.len(), "running compiler stage");
        session.enter_stage(stage);
        for pass in passes {
            pass(grammar, &options, session);
        }
        session.check_errors()?;
    }

    Ok(())
}

fn resolve_start_rules(
    grammar: &Grammar,
    options: &CompileOptions,
) -> Result<CompileOptions, GenerateError> {
    let first = grammar.rules.first().ok_or(GenerateError::EmptyGrammar)?;

    let mut options = options.clone();
    if options.allowed_start_rules.is_empty() {
        options.allowed_start_rules = vec![first.name.clone()];
    } else if options.allowed_start_rules.iter().any(|name| name == "*") {
        options.allowed_start_rules = grammar.rules.iter().map(|rule| rule.name.clone()).collect();
    } else {
        for name in &options.allowed_start_rules {
            if grammar.find_rule(name).is_none() {
                return Err(GenerateError::UnknownStartRule(name.clone()));
            }
        }
    }
    Ok(options)
}

/// Parses and compiles a grammar, returning it with every rule's bytecode
/// and the four constant pools populated, ready for an emitter.
pub fn generate(source: &str, mut options: GenerateOptions) -> Result<Grammar, GenerateError> {
    let mut config = Config::default();
    let plugins = std::mem::take(&mut options.plugins);
    for plugin in &plugins {
        plugin.configure(&mut config, &mut options);
    }

    let parse_options = ParseOptions {
        reserved_words: config.reserved_words,
    };
    let mut grammar = (config.parser)(source, &parse_options)?;
    grammar.source = options.grammar_source.take();
    debug!(rules = grammar.rules.len(), "parsed grammar");

    let session = Session::with_callbacks(
        options.on_error.take(),
        options.on_warning.take(),
        options.on_info.take(),
    );
    let compile_options = CompileOptions {
        allowed_start_rules: options.allowed_start_rules,
        cache: options.cache,
        trace: options.trace,
    };
    compile(&mut grammar, &config.stages, &compile_options, &session)?;

    Ok(grammar)
}
