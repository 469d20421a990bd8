use pvmc::analyzer::SymbolTable;
use pvmc::codegen::*;
use pvmc::lexer::Position;
use pvmc::parser::Parser;

fn compile(input: &str) -> Executable {
    pvmc::compile(input).unwrap().executable
}

fn listing(input: &str) -> Vec<String> {
    compile(input)
        .instructions
        .iter()
        .map(|i| i.to_string())
        .collect()
}

fn assert_listing(input: &str, expected: &[&str]) {
    assert_eq!(listing(input), expected);
}

#[test]
fn function_call_and_frame() {
    let input = "program t;
var r: integer;
function Square(x: integer): integer;
begin
  Square := x * x
end;
begin
  r := Square(5)
end.";
    assert_listing(
        input,
        &[
            "START", "PUSHN 1", "PUSHI 0", "PUSHI 5", "PUSHA 9", "CALL", "POP 1", "STOREG 0",
            "STOP", "PUSHL -1", "PUSHL -1", "MUL", "STOREL -2", "RETURN",
        ],
    );
    let exe = compile(input);
    assert_eq!(exe.entry_point("main"), Some(0));
    assert_eq!(exe.entry_point("Square"), Some(9));
}

#[test]
fn if_without_else_skips_to_the_next_instruction() {
    let exe = compile(
        "program t; var i: integer;
begin
  if i > 0 then i := 1;
  writeln
end.",
    );
    let jz = exe
        .instructions
        .iter()
        .position(|i| i.opcode == Opcode::Jz)
        .unwrap();
    let target = exe.instructions[jz].target().unwrap();
    assert_eq!(exe.instructions[target].opcode, Opcode::WriteLn);
    assert_eq!(target, jz + 3);
}

#[test]
fn if_with_else() {
    assert_listing(
        "program t; var i: integer;
begin
  if i = 0 then i := 1 else i := 2
end.",
        &[
            "START", "PUSHN 1", "PUSHG 0", "PUSHI 0", "EQUAL", "JZ 9", "PUSHI 1", "STOREG 0",
            "JUMP 11", "PUSHI 2", "STOREG 0", "STOP",
        ],
    );
}

#[test]
fn while_loop() {
    assert_listing(
        "program t; var i: integer;
begin
  while i < 10 do i := i + 1
end.",
        &[
            "START", "PUSHN 1", "PUSHG 0", "PUSHI 10", "INF", "JZ 11", "PUSHG 0", "PUSHI 1",
            "ADD", "STOREG 0", "JUMP 2", "STOP",
        ],
    );
}

#[test]
fn repeat_loop() {
    assert_listing(
        "program t; var i: integer;
begin
  repeat i := i - 1 until i <> 0
end.",
        &[
            "START", "PUSHN 1", "PUSHG 0", "PUSHI 1", "SUB", "STOREG 0", "PUSHG 0", "PUSHI 0",
            "EQUAL", "NOT", "JZ 2", "STOP",
        ],
    );
}

#[test]
fn for_loop_evaluates_the_bound_once() {
    assert_listing(
        "program t; var i: integer;
begin
  for i := 1 to 3 do write(i)
end.",
        &[
            "START", "PUSHN 2", "PUSHI 3", "STOREG 1", "PUSHI 1", "STOREG 0", "PUSHG 0",
            "PUSHG 1", "INFEQ", "JZ 17", "PUSHG 0", "WRITEI", "PUSHG 0", "PUSHI 1", "ADD",
            "STOREG 0", "JUMP 6", "STOP",
        ],
    );
}

#[test]
fn for_bound_is_read_before_the_variable_is_assigned() {
    let lines = listing(
        "program t; var i: integer;
begin
  i := 3;
  for i := 1 to i do writeln(i)
end.",
    );
    assert_eq!(
        lines[2..9],
        ["PUSHI 3", "STOREG 0", "PUSHG 0", "STOREG 1", "PUSHI 1", "STOREG 0", "PUSHG 0"]
    );
}

#[test]
fn downto_counts_down() {
    let lines = listing(
        "program t; var c: char;
begin
  for c := 'z' downto 'a' do write(c)
end.",
    );
    assert_eq!(lines[2], "PUSHI 97");
    assert_eq!(lines[4], "PUSHI 122");
    assert!(lines.contains(&"SUPEQ".to_string()));
    assert!(lines.contains(&"WRITECHR".to_string()));
    assert!(lines.contains(&"SUB".to_string()));
}

#[test]
fn case_statement() {
    assert_listing(
        "program t; var i: integer;
begin
  case i of
    1, 2: write(1);
    3: write(2)
  else
    write(0)
  end
end.",
        &[
            "START", "PUSHN 2", "PUSHG 0", "STOREG 1", // selector
            "PUSHG 1", "PUSHI 1", "EQUAL", "NOT", "JZ 15", // 1
            "PUSHG 1", "PUSHI 2", "EQUAL", "NOT", "JZ 15", // 2
            "JUMP 18", "PUSHI 1", "WRITEI", "JUMP 29", // first arm
            "PUSHG 1", "PUSHI 3", "EQUAL", "NOT", "JZ 24", // 3
            "JUMP 27", "PUSHI 2", "WRITEI", "JUMP 29", // second arm
            "PUSHI 0", "WRITEI", // else
            "STOP",
        ],
    );
}

#[test]
fn short_circuit_and() {
    assert_listing(
        "program t; var a, b: boolean;
begin
  a := a and b
end.",
        &[
            "START", "PUSHN 2", "PUSHG 0", "JZ 6", "PUSHG 1", "JUMP 7", "PUSHI 0", "STOREG 0",
            "STOP",
        ],
    );
}

#[test]
fn short_circuit_or() {
    assert_listing(
        "program t; var a, b: boolean;
begin
  a := a or b
end.",
        &[
            "START", "PUSHN 2", "PUSHG 0", "JZ 6", "PUSHI 1", "JUMP 7", "PUSHG 1", "STOREG 0",
            "STOP",
        ],
    );
}

#[test]
fn widening_precedes_the_operator() {
    assert_listing(
        "program t; var x: real; i: integer;
begin
  x := i + 1.5
end.",
        &[
            "START", "PUSHF 0.0", "PUSHN 1", "PUSHG 1", "ITOF", "PUSHF 1.5", "FADD", "STOREG 0",
            "STOP",
        ],
    );
}

#[test]
fn real_comparison_and_negation() {
    let lines = listing(
        "program t; var x: real; b: boolean;
begin
  b := -x <= 2
end.",
    );
    assert_eq!(
        &lines[3..],
        &[
            "PUSHG 0", "PUSHF -1.0", "FMUL", "PUSHI 2", "ITOF", "FINFEQ", "STOREG 1", "STOP"
        ]
    );
}

#[test]
fn array_elements_go_through_addresses() {
    assert_listing(
        "program t;
var a: array[1..3] of integer; i: integer;
begin
  a[i] := 7;
  i := a[2]
end.",
        &[
            "START", "PUSHN 4", "PUSHGP", "PUSHG 3", "PUSHI 1", "SUB", "PADD", "PUSHI 7",
            "STORE 0", "PUSHGP", "PUSHI 2", "PUSHI 1", "SUB", "PADD", "LOAD 0", "STOREG 3",
            "STOP",
        ],
    );
}

#[test]
fn nested_composites() {
    let lines = listing(
        "program t;
var i: integer;
    m: array[0..1, 0..2] of record x, y: integer end;
begin
  m[1, 2].y := i
end.",
    );
    assert_eq!(
        lines,
        [
            "START", "PUSHN 13", "PUSHGP", "PUSHI 1", "PADD", // m at slot 1
            "PUSHI 1", "PUSHI 6", "MUL", "PADD", // row of 3 records
            "PUSHI 2", "PUSHI 2", "MUL", "PADD", // record of 2 slots
            "PUSHI 1", "PADD", // field y
            "PUSHG 0", "STORE 0", "STOP",
        ]
    );
}

#[test]
fn reference_parameters() {
    assert_listing(
        "program t;
var n: integer;
procedure Inc(var x: integer);
begin
  x := x + 1
end;
begin
  Inc(n)
end.",
        &[
            "START", "PUSHN 1", "PUSHGP", "PUSHA 7", "CALL", "POP 1", "STOP", // main
            "PUSHL -1", "PUSHL -1", "LOAD 0", "PUSHI 1", "ADD", "STORE 0", "RETURN",
        ],
    );
}

#[test]
fn locals_exit_and_discarded_result() {
    assert_listing(
        "program t;
function F(a: integer): integer;
var t: real;
begin
  exit(a)
end;
begin
  F(1)
end.",
        &[
            "START", "PUSHI 0", "PUSHI 1", "PUSHA 8", "CALL", "POP 1", "POP 1", "STOP",
            "PUSHF 0.0", "PUSHL -1", "STOREL -2", "JUMP 12", "POP 1", "RETURN",
        ],
    );
}

#[test]
fn forward_call_is_resolved() {
    let exe = compile(
        "program t;
procedure A;
begin
  B
end;
procedure B;
begin
  writeln('b')
end;
begin
  A
end.",
    );
    let b = exe.entry_point("b").unwrap();
    let a = exe.entry_point("a").unwrap();
    assert!(a < b);
    assert_eq!(
        exe.instructions[a],
        Instruction::with(Opcode::PushA, Operand::Address(b))
    );
}

#[test]
fn write_and_read() {
    assert_listing(
        "program t; var b: boolean; i: integer; s: string; c: char;
begin
  writeln(b);
  read(i, s, c);
  readln
end.",
        &[
            "START", "PUSHN 2", "PUSHS \"\"", "PUSHN 1", // slots
            "PUSHG 0", "JZ 8", "PUSHS \"TRUE\"", "JUMP 9", "PUSHS \"FALSE\"", "WRITES",
            "WRITELN", "READ", "ATOI", "STOREG 1", "READ", "STOREG 2", "READ", "PUSHI 0",
            "CHARAT", "STOREG 3", "READ", "POP 1", "STOP",
        ],
    );
}

#[test]
fn string_characters_and_length() {
    assert_listing(
        "program t; var s: string; c: char; i: integer;
begin
  c := s[i];
  i := length(s);
  s := c;
  length(s)
end.",
        &[
            "START", "PUSHS \"\"", "PUSHN 2", // slots
            "PUSHG 0", "PUSHG 2", "PUSHI 1", "SUB", "CHARAT", "STOREG 1", "PUSHG 0", "STRLEN",
            "STOREG 2", "PUSHG 1", "STRC", "STOREG 0", "PUSHG 0", "STRLEN", "POP 1", "STOP",
        ],
    );
}

#[test]
fn string_literals_are_quoted() {
    let lines = listing("program t; begin write('say \"hi\"', 'it''s') end.");
    assert_eq!(lines[1], r#"PUSHS "say \"hi\"""#);
    assert_eq!(lines[3], r#"PUSHS "it's""#);
}

#[test]
fn executable_renders_one_instruction_per_line() {
    let exe = compile("program t; begin writeln(1) end.");
    assert_eq!(exe.to_string(), "START\nPUSHI 1\nWRITEI\nWRITELN\nSTOP\n");
}

#[test]
fn unanalyzed_program_is_rejected() {
    let outcome = Parser::new("program t; begin x := 1 end.").parse();
    let table = SymbolTable::new();
    let err = Codegen::new(&table).generate(&outcome.program).unwrap_err();
    assert_eq!(
        err,
        CodegenError::Unannotated {
            what: "variable",
            pos: Position::new(1, 18)
        }
    );
}
