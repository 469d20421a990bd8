use std::collections::BTreeMap;
use std::fmt;

/// Symbolic jump target. Replaced by an absolute offset once the whole
/// program has been emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    PushI,
    PushF,
    PushS,
    PushN,
    PushG,
    PushL,
    StoreG,
    StoreL,
    PushGP,
    PushFP,
    PAdd,
    Load,
    Store,
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    FAdd,
    FSub,
    FMul,
    FDiv,
    IToF,
    Not,
    Equal,
    Inf,
    InfEq,
    Sup,
    SupEq,
    FInf,
    FInfEq,
    FSup,
    FSupEq,
    Jump,
    Jz,
    PushA,
    Call,
    Return,
    Start,
    Stop,
    WriteI,
    WriteF,
    WriteS,
    WriteChr,
    WriteLn,
    Read,
    AToI,
    AToF,
    CharAt,
    StrLen,
    /// Character code to a one-character string.
    StrC,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::PushI => "PUSHI",
            Opcode::PushF => "PUSHF",
            Opcode::PushS => "PUSHS",
            Opcode::PushN => "PUSHN",
            Opcode::PushG => "PUSHG",
            Opcode::PushL => "PUSHL",
            Opcode::StoreG => "STOREG",
            Opcode::StoreL => "STOREL",
            Opcode::PushGP => "PUSHGP",
            Opcode::PushFP => "PUSHFP",
            Opcode::PAdd => "PADD",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Pop => "POP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::FAdd => "FADD",
            Opcode::FSub => "FSUB",
            Opcode::FMul => "FMUL",
            Opcode::FDiv => "FDIV",
            Opcode::IToF => "ITOF",
            Opcode::Not => "NOT",
            Opcode::Equal => "EQUAL",
            Opcode::Inf => "INF",
            Opcode::InfEq => "INFEQ",
            Opcode::Sup => "SUP",
            Opcode::SupEq => "SUPEQ",
            Opcode::FInf => "FINF",
            Opcode::FInfEq => "FINFEQ",
            Opcode::FSup => "FSUP",
            Opcode::FSupEq => "FSUPEQ",
            Opcode::Jump => "JUMP",
            Opcode::Jz => "JZ",
            Opcode::PushA => "PUSHA",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Start => "START",
            Opcode::Stop => "STOP",
            Opcode::WriteI => "WRITEI",
            Opcode::WriteF => "WRITEF",
            Opcode::WriteS => "WRITES",
            Opcode::WriteChr => "WRITECHR",
            Opcode::WriteLn => "WRITELN",
            Opcode::Read => "READ",
            Opcode::AToI => "ATOI",
            Opcode::AToF => "ATOF",
            Opcode::CharAt => "CHARAT",
            Opcode::StrLen => "STRLEN",
            Opcode::StrC => "STRC",
        }
    }

    /// Instructions whose operand is a code offset.
    pub fn is_branch(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Jz | Opcode::PushA)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Int(i64),
    Real(f64),
    Str(String),
    Label(Label),
    /// Absolute instruction offset.
    Address(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(n) => write!(f, "{n}"),
            Operand::Real(x) => write!(f, "{x:?}"),
            Operand::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Operand::Label(label) => write!(f, "{label}"),
            Operand::Address(offset) => write!(f, "{offset}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    pub fn with(opcode: Opcode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// Resolved target of a branch instruction.
    pub fn target(&self) -> Option<usize> {
        match self.operand {
            Some(Operand::Address(offset)) if self.opcode.is_branch() => Some(offset),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {operand}", self.opcode),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// A compiled program: the flat instruction sequence and the offset of
/// `main` and of every routine.
#[derive(Clone, Debug, PartialEq)]
pub struct Executable {
    pub instructions: Vec<Instruction>,
    pub entry_points: BTreeMap<String, usize>,
}

impl Executable {
    pub fn entry_point(&self, name: &str) -> Option<usize> {
        self.entry_points.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
