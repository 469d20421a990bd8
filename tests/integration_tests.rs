use proptest::prelude::*;

use pvmc::analyzer::Ty;
use pvmc::codegen::{Executable, Opcode, Operand};
use pvmc::diagnostics::{ErrorKind, Phase};
use pvmc::options::CompileOptions;
use pvmc::{compile, compile_with, CompileError};

fn diagnostics(input: &str) -> Vec<pvmc::diagnostics::Diagnostic> {
    match compile(input) {
        Err(CompileError::Diagnostics(diagnostics)) => diagnostics,
        other => panic!("expected diagnostics, got {other:?}"),
    }
}

fn assert_resolved(exe: &Executable) {
    for (offset, instruction) in exe.instructions.iter().enumerate() {
        assert!(
            !matches!(instruction.operand, Some(Operand::Label(_))),
            "unresolved label at {offset}: {instruction}"
        );
        if instruction.opcode.is_branch() {
            let target = instruction.target().unwrap();
            assert!(target < exe.len(), "{instruction} at {offset} jumps outside the program");
        }
    }
}

#[test]
fn compiles_a_complete_program() {
    let input = "program Sort;
const N = 5;
type Vec = array[1..N] of integer;
var v: Vec;
    i, j: integer;
    sorted: boolean;

procedure Swap(var a, b: integer);
var tmp: integer;
begin
  tmp := a; a := b; b := tmp
end;

function Less(a, b: integer): boolean;
begin
  Less := a < b
end;

begin
  for i := 1 to N do read(v[i]);
  repeat
    sorted := true;
    for i := 1 to N - 1 do
      if Less(v[i + 1], v[i]) then
      begin
        Swap(v[i], v[i + 1]);
        sorted := false
      end
  until sorted;
  for i := 1 to N do
  begin
    write(v[i]);
    if i < N then write(' ')
  end;
  writeln
end.";
    let compilation = compile(input).unwrap();
    assert!(compilation.warnings.is_empty());
    let exe = compilation.executable;
    assert_resolved(&exe);
    assert_eq!(exe.instructions[0].opcode, Opcode::Start);
    assert!(exe.entry_point("swap").is_some());
    assert!(exe.entry_point("less").is_some());
    let stop = exe
        .instructions
        .iter()
        .position(|i| i.opcode == Opcode::Stop)
        .unwrap();
    assert!(stop < exe.entry_point("swap").unwrap());
}

#[test]
fn every_diagnostic_is_returned() {
    let ds = diagnostics(
        "program t;
var a: integer;
begin
  a := 3.5;
  b := 1;
  if a then a := 0
end.",
    );
    assert_eq!(ds.len(), 3);
    assert!(ds.iter().all(|d| d.phase() == Phase::Semantic));
    assert_eq!(
        ds[0].kind,
        ErrorKind::TypeMismatch {
            expected: Ty::Integer,
            found: Ty::Real
        }
    );
    assert_eq!(ds[0].to_string(), "4:8: error[semantic]: type mismatch: expected integer, found real");
}

#[test]
fn syntax_errors_stop_before_analysis() {
    let ds = diagnostics(
        "program t;
begin
  undeclared := 1
  x := 2
end.",
    );
    assert_eq!(ds.len(), 1);
    assert_eq!(ds[0].phase(), Phase::Syntactic);
}

#[test]
fn lexical_and_syntax_errors_together() {
    let ds = diagnostics("program t; begin x := 'abc\nend.");
    assert_eq!(ds[0].kind, ErrorKind::UnterminatedString);
    assert_eq!(ds[0].phase(), Phase::Lexical);
    assert!(ds.len() >= 2);
}

#[test]
fn warnings_do_not_block_output() {
    let compilation = compile(
        "program t;
var x: integer;
procedure P(x: real);
begin
  writeln(x)
end;
begin
  P(x)
end.",
    )
    .unwrap();
    assert_eq!(compilation.warnings.len(), 1);
    assert_eq!(
        compilation.warnings[0].kind,
        ErrorKind::Shadowing("x".to_string())
    );
    assert_eq!(
        compilation.warnings[0].to_string(),
        "3:13: warning[semantic]: declaration of 'x' shadows an outer declaration"
    );
}

#[test]
fn feature_switches() {
    let input = "program t; type Point = record x: integer end; var p: Point; begin p.x := 1 end.";
    assert!(compile(input).is_ok());
    let options = CompileOptions {
        arrays: true,
        records: false,
    };
    let Err(CompileError::Diagnostics(ds)) = compile_with(input, &options) else {
        panic!();
    };
    assert_eq!(ds[0].kind, ErrorKind::FeatureDisabled("record"));
}

#[test]
fn type_and_variable_names_share_one_namespace() {
    let input = "program t; type P = record x: integer end; var p: P; begin end.";
    let Err(CompileError::Diagnostics(ds)) = compile(input) else {
        panic!();
    };
    assert_eq!(ds[0].kind, ErrorKind::DuplicateDeclaration("p".to_string()));
}

#[test]
fn case_insensitive_names() {
    let exe = compile(
        "PROGRAM T;
VAR Count: INTEGER;
BEGIN
  count := MAXINT;
  WriteLn(COUNT)
END.",
    )
    .unwrap()
    .executable;
    assert_eq!(exe.instructions[2].to_string(), "PUSHI 2147483647");
}

/// A small well-typed statement over the globals `i`, `x` and `b`.
fn statement() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0i64..100).prop_map(|n| format!("i := i + {n}")),
        (0i64..100).prop_map(|n| format!("x := x * {n} / 2")),
        (0i64..10).prop_map(|n| format!("b := (i > {n}) and not b")),
        Just("writeln(i, x, b)".to_string()),
        Just("Bump(i)".to_string()),
        Just("x := Half(i)".to_string()),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| format!("if b or (i = 0) then {a} else {b}")),
            inner
                .clone()
                .prop_map(|s| format!("while i < 10 do begin {s}; i := i + 1 end")),
            inner.clone().prop_map(|s| format!("repeat {s} until b")),
            inner
                .clone()
                .prop_map(|s| format!("for j := 10 downto 1 do {s}")),
            (inner.clone(), inner)
                .prop_map(|(a, b)| format!("case i mod 3 of 0: {a}; 1, 2: {b} end")),
        ]
    })
}

fn program(body: Vec<String>) -> String {
    format!(
        "program gen;
var i, j: integer; x: real; b: boolean;
procedure Bump(var n: integer);
begin
  n := n + 1
end;
function Half(n: integer): real;
begin
  Half := n / 2
end;
begin
  {}
end.",
        body.join(";\n  ")
    )
}

proptest! {
    /// Same source, same instructions.
    #[test]
    fn compilation_is_deterministic(body in prop::collection::vec(statement(), 1..6)) {
        let input = program(body);
        let first = compile(&input).unwrap().executable;
        let second = compile(&input).unwrap().executable;
        prop_assert_eq!(first, second);
    }

    /// Every jump and call lands inside the program.
    #[test]
    fn labels_are_resolved(body in prop::collection::vec(statement(), 1..6)) {
        let exe = compile(&program(body)).unwrap().executable;
        assert_resolved(&exe);
        prop_assert_eq!(exe.entry_point("main"), Some(0));
    }
}
