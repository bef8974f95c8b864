use std::{
    cell::{Cell, Ref, RefCell},
    fmt::{Display, Write},
};

use crate::{
    linemap::LineMap,
    span::Span,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(name)
    }
}

/// The pipeline stage a diagnostic was reported in. Error collection is
/// flushed at every stage boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    Check,
    Transform,
    Generate,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Check => "check",
            Stage::Transform => "transform",
            Stage::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// A secondary location attached to a problem, e.g. the first definition
/// a duplicate clashes with.
#[derive(Clone, PartialEq, Debug)]
pub struct Note {
    pub message: String,
    pub span: Span,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Problem {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<Note>,
    pub stage: Stage,
}

pub type ProblemCallback = Box<dyn Fn(&Problem)>;

/// Per-compilation diagnostics collector, shared by every pass.
///
/// Reporting an error does not unwind; passes use local control flow to stop
/// themselves and the driver calls [`Session::check_errors`] between stages.
#[derive(Default)]
pub struct Session {
    stage: Cell<Option<Stage>>,
    problems: RefCell<Vec<Problem>>,
    error_count: Cell<usize>,
    first_error_stage: Cell<Option<Stage>>,
    on_error: Option<ProblemCallback>,
    on_warning: Option<ProblemCallback>,
    on_info: Option<ProblemCallback>,
}

impl Session {
    pub fn new() -> Session {
        Self::default()
    }
    pub fn with_callbacks(
        on_error: Option<ProblemCallback>,
        on_warning: Option<ProblemCallback>,
        on_info: Option<ProblemCallback>,
    ) -> Session {
        Session {
            on_error,
            on_warning,
            on_info,
            ..Session::default()
        }
    }

    pub fn enter_stage(&self, stage: Stage) {
        self.stage.set(Some(stage));
    }
    pub fn stage(&self) -> Option<Stage> {
        self.stage.get()
    }

    pub fn error(&self, message: impl Into<String>, span: Option<Span>, notes: Vec<Note>) {
        self.report(Severity::Error, message.into(), span, notes);
    }
    pub fn warning(&self, message: impl Into<String>, span: Option<Span>, notes: Vec<Note>) {
        self.report(Severity::Warning, message.into(), span, notes);
    }
    pub fn info(&self, message: impl Into<String>, span: Option<Span>, notes: Vec<Note>) {
        self.report(Severity::Info, message.into(), span, notes);
    }

    fn report(&self, severity: Severity, message: String, span: Option<Span>, notes: Vec<Note>) {
        let stage = self
            .stage
            .get()
            .expect("diagnostic reported outside of a compilation stage");

        if severity == Severity::Error {
            self.error_count.set(self.error_count.get() + 1);
            if self.first_error_stage.get().is_none() {
                self.first_error_stage.set(Some(stage));
            }
        }

        let problem = Problem {
            severity,
            message,
            span,
            notes,
            stage,
        };

        let callback = match severity {
            Severity::Error => &self.on_error,
            Severity::Warning => &self.on_warning,
            Severity::Info => &self.on_info,
        };
        if let Some(callback) = callback {
            callback(&problem);
        }

        self.problems.borrow_mut().push(problem);
    }

    pub fn error_count(&self) -> usize {
        self.error_count.get()
    }
    pub fn problems(&self) -> Ref<'_, Vec<Problem>> {
        self.problems.borrow()
    }

    /// Raises the accumulated problems if any error was reported. Called by
    /// the driver at the end of every stage.
    pub fn check_errors(&self) -> Result<(), CompileError> {
        if self.error_count.get() == 0 {
            return Ok(());
        }
        let stage = self
            .first_error_stage
            .get()
            .expect("error count is non-zero but no error was recorded");
        Err(CompileError {
            stage,
            problems: self.problems.borrow().clone(),
        })
    }
}

/// A failed compilation: the stage that failed plus everything the session
/// accumulated up to the stage boundary, warnings and infos included.
#[derive(Clone, PartialEq, Debug)]
pub struct CompileError {
    pub stage: Stage,
    pub problems: Vec<Problem>,
}

impl CompileError {
    pub fn first_error(&self) -> &Problem {
        self.problems
            .iter()
            .find(|p| p.severity == Severity::Error)
            .expect("compile error without an error problem")
    }

    /// Renders every problem except infos as a caret-underlined block.
    pub fn render(&self, source_name: &str, source: &str) -> String {
        let map = LineMap::new(source);
        let mut out = String::new();

        for problem in &self.problems {
            if problem.severity == Severity::Info {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            _ = writeln!(out, "{}: {}", problem.severity, problem.message);
            if let Some(span) = problem.span {
                render_span(&mut out, &map, source_name, source, span);
            }
            for note in &problem.notes {
                _ = writeln!(out, "note: {}", note.message);
                render_span(&mut out, &map, source_name, source, note.span);
            }
        }

        out
    }
}

fn render_span(out: &mut String, map: &LineMap, source_name: &str, source: &str, span: Span) {
    let pos = map.offset_to_pos(source, span.start());
    let line_text = map
        .line_str(source, pos.line)
        .trim_end_matches(['\n', '\r']);

    let gutter = (pos.line + 1).to_string();
    // clamp the underline to the visible part of the line
    let line_end = map.line_start(pos.line) + line_text.len() as u32;
    let end = span.end().min(line_end).max(span.start());
    let width = source[span.start() as usize..end as usize]
        .chars()
        .count()
        .max(1);

    _ = writeln!(out, " --> {}:{}:{}", source_name, pos.line + 1, pos.column + 1);
    _ = writeln!(out, "{:1$} |", "", gutter.len());
    _ = writeln!(out, "{} | {}", gutter, line_text);
    _ = writeln!(
        out,
        "{:1$} | {2:3$}{4}",
        "",
        gutter.len(),
        "",
        pos.column as usize,
        "^".repeat(width)
    );
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let first = self.first_error();
        match first.span {
            Some(span) => write!(f, "{}: {}", span, first.message),
            None => f.write_str(&first.message),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "outside of a compilation stage")]
    fn report_requires_stage() {
        let session = Session::new();
        session.error("nope", None, Vec::new());
    }

    #[test]
    fn errors_are_counted() {
        let session = Session::new();
        session.enter_stage(Stage::Check);
        session.warning("w", None, Vec::new());
        session.info("i", None, Vec::new());
        assert_eq!(session.error_count(), 0);
        assert!(session.check_errors().is_ok());

        session.error("e", Some(Span::new(0, 1)), Vec::new());
        assert_eq!(session.error_count(), 1);

        let err = session.check_errors().unwrap_err();
        assert_eq!(err.stage, Stage::Check);
        assert_eq!(err.problems.len(), 3);
        assert_eq!(err.first_error().message, "e");
    }

    #[test]
    fn first_error_stage_is_retained() {
        let session = Session::new();
        session.enter_stage(Stage::Transform);
        session.error("first", None, Vec::new());
        session.enter_stage(Stage::Generate);
        session.error("second", None, Vec::new());
        assert_eq!(session.check_errors().unwrap_err().stage, Stage::Transform);
    }

    #[test]
    fn callbacks_fire_per_severity() {
        use std::cell::Cell;
        use std::rc::Rc;

        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        let session = Session::with_callbacks(
            Some(Box::new(move |_| seen.set(seen.get() + 1))),
            None,
            None,
        );
        session.enter_stage(Stage::Check);
        session.error("a", None, Vec::new());
        session.warning("b", None, Vec::new());
        session.error("c", None, Vec::new());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn render_shape() {
        let src = "start = X";
        let session = Session::new();
        session.enter_stage(Stage::Check);
        session.error(
            "Rule \"X\" is not defined",
            Some(Span::new(8, 9)),
            Vec::new(),
        );
        session.info("hidden", None, Vec::new());

        let err = session.check_errors().unwrap_err();
        let rendered = err.render("grammar", src);
        assert!(rendered.contains("error: Rule \"X\" is not defined"));
        assert!(rendered.contains(" --> grammar:1:9"));
        assert!(rendered.contains("1 | start = X"));
        assert!(rendered.contains("  |         ^"));
        assert!(!rendered.contains("hidden"));
    }
}
