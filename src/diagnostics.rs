//! Diagnostics shared by every phase of the compiler.
//!
//! Each phase records [`Diagnostic`]s instead of stopping at the first
//! problem, so a failed compilation reports everything it found. The
//! [`ErrorKind`] carries the message; the phase is derived from it.

use std::fmt;

use crate::analyzer::{Ty, MAX_SLOTS};
use crate::lexer::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Lexical,
    Syntactic,
    Semantic,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Lexical => "lexical",
            Phase::Syntactic => "syntax",
            Phase::Semantic => "semantic",
        })
    }
}

/// Finer grouping than [`Phase`], following the error kinds of the
/// semantic rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntactic,
    Binding,
    Type,
    Structural,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ErrorKind {
    // lexical
    #[error("unrecognized character '{0}'")]
    UnrecognizedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("integer literal {0} is out of range")]
    IntegerOutOfRange(String),

    // syntactic
    #[error("unexpected {found}, expected {}", .expected.join(" or "))]
    UnexpectedToken { found: String, expected: Vec<String> },
    #[error("unexpected end of input, expected {}", .expected.join(" or "))]
    UnexpectedEof { expected: Vec<String> },

    // binding
    #[error("'{0}' is already declared in this scope")]
    DuplicateDeclaration(String),
    #[error("unresolved identifier '{0}'")]
    UnresolvedIdentifier(String),
    #[error("'{0}' is not a type")]
    NotAType(String),

    // type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Ty, found: Ty },
    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands { op: String, left: Ty, right: Ty },
    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand { op: String, operand: Ty },
    #[error("argument {index} of '{callee}' must be a variable, it is passed by reference")]
    NonAddressableArgument { callee: String, index: usize },
    #[error("'{callee}' expects {expected} argument(s), found {found}")]
    WrongArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("condition must be boolean, found {0}")]
    InvalidConditionType(Ty),
    #[error("cannot index a value of type {0}")]
    NotAnArray(Ty),
    #[error("array index must be integer, found {0}")]
    NonIntegerIndex(Ty),
    #[error("cannot select field '{field}' from a value of type {ty}")]
    NotARecord { field: String, ty: Ty },
    #[error("record has no field named '{0}'")]
    UnknownField(String),
    #[error("'{0}' is not a procedure or function")]
    NotCallable(String),
    #[error("procedure '{0}' does not return a value")]
    NoValue(String),
    #[error("'{0}' cannot be used as a value")]
    NotAValue(String),
    #[error("invalid array bounds {low}..{high}")]
    InvalidArrayBounds { low: i64, high: i64 },
    #[error("array[{low}..{high}] does not fit in {} slots", MAX_SLOTS)]
    ArrayTooLarge { low: i64, high: i64 },
    #[error("record does not fit in {} slots", MAX_SLOTS)]
    RecordTooLarge,
    #[error("'{0}' does not fit in its frame of at most {max} slots", max = MAX_SLOTS)]
    FrameTooLarge(String),
    #[error("division by zero in constant expression")]
    DivisionByZero,
    #[error("expression is not a constant")]
    NotConstant,
    #[error("integer constant expected, found {0}")]
    NonIntegerConstant(Ty),
    #[error("parameter '{0}' has a composite type and must be passed by reference")]
    CompositeByValue(String),
    #[error("function '{0}' must return a scalar type")]
    CompositeResult(String),
    #[error("'{0}' cannot be used as a for-loop variable")]
    InvalidForVariable(String),
    #[error("case selector must be integer, char or boolean, found {0}")]
    InvalidSelector(Ty),
    #[error("duplicate case label {0}")]
    DuplicateCaseLabel(String),
    #[error("'{callee}' cannot take an argument of type {found}")]
    InvalidIntrinsicArgument { callee: String, found: Ty },

    // structural
    #[error("exit with a value is only allowed inside a function")]
    ExitWithValueOutsideFunction,
    #[error("exit without a value is only allowed inside a procedure")]
    BareExitOutsideProcedure,
    #[error("cannot assign to '{0}'")]
    AssignmentToNonVariable(String),
    #[error("cannot assign to a character of string '{0}'")]
    StringCharAssignment(String),
    #[error("routine '{0}' cannot be declared inside another routine")]
    NestedRoutine(String),
    #[error("{0} types are disabled")]
    FeatureDisabled(&'static str),

    // warnings
    #[error("declaration of '{0}' shadows an outer declaration")]
    Shadowing(String),
}

impl ErrorKind {
    pub fn category(&self) -> Category {
        use ErrorKind::*;
        match self {
            UnrecognizedCharacter(_) | UnterminatedString | UnterminatedComment
            | IntegerOutOfRange(_) => Category::Lexical,
            UnexpectedToken { .. } | UnexpectedEof { .. } => Category::Syntactic,
            DuplicateDeclaration(_) | UnresolvedIdentifier(_) | NotAType(_) | Shadowing(_) => {
                Category::Binding
            }
            ExitWithValueOutsideFunction
            | BareExitOutsideProcedure
            | AssignmentToNonVariable(_)
            | StringCharAssignment(_)
            | NestedRoutine(_)
            | FeatureDisabled(_) => Category::Structural,
            _ => Category::Type,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.category() {
            Category::Lexical => Phase::Lexical,
            Category::Syntactic => Phase::Syntactic,
            Category::Binding | Category::Type | Category::Structural => Phase::Semantic,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub pos: Position,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, pos: Position) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            pos,
        }
    }

    pub fn warning(kind: ErrorKind, pos: Position) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            pos,
        }
    }

    pub fn phase(&self) -> Phase {
        self.kind.phase()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {severity}[{}]: {}", self.pos, self.phase(), self.kind)
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
