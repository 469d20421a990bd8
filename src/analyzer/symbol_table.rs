use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::diagnostics::ErrorKind;
use crate::parser::ExprKind;

use super::{push_run, run_len, Signature, SlotRun, Ty, MAX_SLOTS};

/// Depth of the frame holding the predefined identifiers.
pub const PRELUDE_DEPTH: usize = 0;
/// Depth of the program's global frame.
pub const GLOBAL_DEPTH: usize = 1;

pub const MAXINT: i64 = 2_147_483_647;

pub type RoutineId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intrinsic {
    Write,
    Writeln,
    Read,
    Readln,
    Length,
}

impl Intrinsic {
    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Write => "write",
            Intrinsic::Writeln => "writeln",
            Intrinsic::Read => "read",
            Intrinsic::Readln => "readln",
            Intrinsic::Length => "length",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Intrinsic::Read | Intrinsic::Readln)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Char(char),
    String(String),
}

impl ConstValue {
    pub fn ty(&self) -> Ty {
        match self {
            ConstValue::Integer(_) => Ty::Integer,
            ConstValue::Real(_) => Ty::Real,
            ConstValue::Boolean(_) => Ty::Boolean,
            ConstValue::Char(_) => Ty::Char,
            ConstValue::String(_) => Ty::String,
        }
    }

    /// The literal expression standing for this value.
    pub fn to_expr_kind(&self) -> ExprKind {
        match self {
            ConstValue::Integer(n) => ExprKind::Int(*n),
            ConstValue::Real(x) => ExprKind::Real(*x),
            ConstValue::Boolean(b) => ExprKind::Bool(*b),
            ConstValue::Char(c) => ExprKind::Char(*c),
            ConstValue::String(s) => ExprKind::Str(s.clone()),
        }
    }

    /// Ordinal value, for case labels and array bounds.
    pub fn ordinal(&self) -> Option<i64> {
        match self {
            ConstValue::Integer(n) => Some(*n),
            ConstValue::Boolean(b) => Some(*b as i64),
            ConstValue::Char(c) => Some(*c as i64),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Integer(n) => write!(f, "{n}"),
            ConstValue::Real(x) => write!(f, "{x}"),
            ConstValue::Boolean(b) => write!(f, "{b}"),
            ConstValue::Char(c) => write!(f, "'{c}'"),
            ConstValue::String(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Constant,
    Variable,
    TypeAlias,
    Procedure,
    Function,
    Parameter { by_ref: bool },
    Intrinsic,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Global(usize),
    Local(usize),
    Constant(ConstValue),
    Routine(RoutineId),
    Intrinsic(Intrinsic),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    /// Spelling at the declaration.
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Ty,
    /// Depth of the declaring frame, set by [`SymbolTable::declare`].
    pub depth: usize,
    pub storage: Option<Storage>,
}

impl Symbol {
    fn new(name: &str, kind: SymbolKind, ty: Ty, storage: Option<Storage>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ty,
            depth: 0,
            storage,
        }
    }

    pub fn variable(name: &str, ty: Ty) -> Self {
        Self::new(name, SymbolKind::Variable, ty, None)
    }

    pub fn parameter(name: &str, ty: Ty, by_ref: bool) -> Self {
        Self::new(name, SymbolKind::Parameter { by_ref }, ty, None)
    }

    pub fn constant(name: &str, value: ConstValue) -> Self {
        Self::new(
            name,
            SymbolKind::Constant,
            value.ty(),
            Some(Storage::Constant(value)),
        )
    }

    pub fn type_alias(name: &str, ty: Ty) -> Self {
        Self::new(name, SymbolKind::TypeAlias, ty, None)
    }

    pub fn routine(name: &str, signature: Signature, id: RoutineId) -> Self {
        let kind = if signature.ret.is_some() {
            SymbolKind::Function
        } else {
            SymbolKind::Procedure
        };
        Self::new(name, kind, Ty::Routine(signature), Some(Storage::Routine(id)))
    }

    fn intrinsic(intrinsic: Intrinsic) -> Self {
        let signature = Signature {
            params: vec![],
            ret: None,
        };
        Self::new(
            intrinsic.name(),
            SymbolKind::Intrinsic,
            Ty::Routine(signature),
            Some(Storage::Intrinsic(intrinsic)),
        )
    }

    /// Takes up storage slots when declared.
    fn occupies_slots(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter { .. })
    }

    /// Slot types this symbol takes in its frame. A by-reference parameter
    /// holds a single address.
    fn slot_runs(&self) -> Vec<SlotRun> {
        match self.kind {
            SymbolKind::Parameter { by_ref: true } => vec![SlotRun::new(Ty::Integer, 1)],
            _ => self.ty.slot_runs(),
        }
    }
}

/// One lexical scope: its symbols and the storage slots allocated so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    symbols: HashMap<String, Symbol>,
    slots: Vec<SlotRun>,
    len: usize,
}

impl Frame {
    /// Scalar slot types in allocation order, as runs.
    pub fn slots(&self) -> &[SlotRun] {
        &self.slots
    }

    /// Number of slots allocated.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `runs`, returning the first slot they occupy.
    fn allocate(&mut self, runs: &[SlotRun]) -> usize {
        let slot = self.len;
        for run in runs {
            push_run(&mut self.slots, &run.ty, run.count);
        }
        self.len += run_len(runs);
        slot
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoutineInfo {
    pub name: String,
    pub signature: Signature,
    /// Slot types of locals and temporaries, after the parameters.
    pub locals: Vec<SlotRun>,
}

impl RoutineInfo {
    pub fn param_count(&self) -> usize {
        self.signature.params.len()
    }

    pub fn locals(&self) -> &[SlotRun] {
        &self.locals
    }

    /// Number of local and temporary slots.
    pub fn local_count(&self) -> usize {
        run_len(&self.locals)
    }

    pub fn is_function(&self) -> bool {
        self.signature.ret.is_some()
    }
}

/// Stack of owned frames. Frame 0 is the prelude, frame 1 the globals;
/// routine bodies push one frame on top.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolTable {
    frames: Vec<Frame>,
    routines: Vec<RoutineInfo>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            frames: vec![Frame::default()],
            routines: vec![],
        };
        table.declare_prelude();
        table.open_scope();
        table
    }

    fn declare_prelude(&mut self) {
        let prelude = [
            Symbol::type_alias("integer", Ty::Integer),
            Symbol::type_alias("real", Ty::Real),
            Symbol::type_alias("boolean", Ty::Boolean),
            Symbol::type_alias("char", Ty::Char),
            Symbol::type_alias("string", Ty::String),
            Symbol::constant("true", ConstValue::Boolean(true)),
            Symbol::constant("false", ConstValue::Boolean(false)),
            Symbol::constant("maxint", ConstValue::Integer(MAXINT)),
            Symbol::intrinsic(Intrinsic::Write),
            Symbol::intrinsic(Intrinsic::Writeln),
            Symbol::intrinsic(Intrinsic::Read),
            Symbol::intrinsic(Intrinsic::Readln),
            Symbol::intrinsic(Intrinsic::Length),
        ];
        let frame = &mut self.frames[PRELUDE_DEPTH];
        for symbol in prelude {
            frame.symbols.insert(symbol.name.clone(), symbol);
        }
    }

    /// Depth of the innermost frame.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn open_scope(&mut self) {
        self.frames.push(Frame::default());
        trace!(depth = self.depth(), "open scope");
    }

    /// Pops the innermost frame and hands it back, so its slot layout can
    /// be recorded. The global and prelude frames are never popped.
    pub fn close_scope(&mut self) -> Option<Frame> {
        if self.depth() <= GLOBAL_DEPTH {
            return None;
        }
        trace!(depth = self.depth(), "close scope");
        self.frames.pop()
    }

    fn current(&mut self) -> &mut Frame {
        let depth = self.depth();
        &mut self.frames[depth]
    }

    /// Binds `symbol` in the innermost frame, allocating its storage if it
    /// is a variable or parameter.
    pub fn declare(&mut self, mut symbol: Symbol) -> Result<&Symbol, ErrorKind> {
        let key = symbol.name.to_ascii_lowercase();
        let depth = self.depth();
        if self.frames[depth].symbols.contains_key(&key) {
            return Err(ErrorKind::DuplicateDeclaration(symbol.name));
        }

        symbol.depth = depth;
        if symbol.occupies_slots() {
            let runs = symbol.slot_runs();
            let frame = self.current();
            let fits = frame
                .len
                .checked_add(run_len(&runs))
                .is_some_and(|len| len <= MAX_SLOTS);
            if !fits {
                return Err(ErrorKind::FrameTooLarge(symbol.name));
            }
            let slot = frame.allocate(&runs);
            symbol.storage = Some(if depth == GLOBAL_DEPTH {
                Storage::Global(slot)
            } else {
                Storage::Local(slot)
            });
        }
        trace!(name = %symbol.name, ?symbol.kind, ?symbol.storage, depth, "declare");

        Ok(&*self.current().symbols.entry(key).or_insert(symbol))
    }

    /// Whether declaring `name` now would hide a user declaration of an
    /// enclosing frame.
    pub fn is_shadowing(&self, name: &str) -> bool {
        let key = name.to_ascii_lowercase();
        self.frames[GLOBAL_DEPTH..self.depth()]
            .iter()
            .any(|frame| frame.symbols.contains_key(&key))
    }

    /// Innermost-first, case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Result<&Symbol, ErrorKind> {
        let key = name.to_ascii_lowercase();
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.symbols.get(&key))
            .ok_or_else(|| ErrorKind::UnresolvedIdentifier(name.to_string()))
    }

    /// Allocates a hidden slot in the innermost frame.
    pub fn reserve_temp(&mut self, ty: Ty) -> usize {
        self.current().allocate(&[SlotRun::new(ty, 1)])
    }

    pub fn add_routine(&mut self, name: &str, signature: Signature) -> RoutineId {
        self.routines.push(RoutineInfo {
            name: name.to_string(),
            signature,
            locals: vec![],
        });
        self.routines.len() - 1
    }

    /// Records the layout of a closed routine frame. Its first slots hold
    /// the parameters, one each.
    pub fn set_routine_frame(&mut self, id: RoutineId, frame: Frame) {
        if let Some(routine) = self.routines.get_mut(id) {
            let mut skip = routine.param_count();
            let mut locals = vec![];
            for run in frame.slots {
                let dropped = skip.min(run.count);
                skip -= dropped;
                push_run(&mut locals, &run.ty, run.count - dropped);
            }
            routine.locals = locals;
        }
    }

    pub fn routine(&self, id: RoutineId) -> Option<&RoutineInfo> {
        self.routines.get(id)
    }

    pub fn routines(&self) -> &[RoutineInfo] {
        &self.routines
    }

    /// Slot types of the global frame.
    pub fn globals(&self) -> &[SlotRun] {
        self.frames[GLOBAL_DEPTH].slots()
    }

    /// Number of global slots.
    pub fn global_count(&self) -> usize {
        self.frames[GLOBAL_DEPTH].len()
    }
}
