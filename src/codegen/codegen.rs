use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::analyzer::{Intrinsic, RoutineId, SlotRun, SymbolTable, Ty};
use crate::lexer::Position;
use crate::parser::{
    BinOp, Binding, Call, Callee, Decl, Designator, Expr, ExprKind, Place, Program, RoutineDecl,
    Selector, Stmt, StmtKind, UnOp,
};

use super::{Executable, Instruction, Label, Opcode, Operand};

/// Broken invariants between analysis and code generation. The analyzer
/// guarantees none of these happen on a program it accepted.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum CodegenError {
    #[error("{what} at {pos} was not resolved by semantic analysis")]
    Unannotated { what: &'static str, pos: Position },
    #[error("unknown routine #{0}")]
    UnknownRoutine(RoutineId),
    #[error("label {0} is referenced but never placed")]
    DanglingLabel(Label),
    #[error("label {0} is placed twice")]
    LabelPlacedTwice(Label),
    #[error("slot {0} holds an address and cannot be stored to directly")]
    IndirectStore(usize),
}

type CodegenResult<T = ()> = Result<T, CodegenError>;

fn unannotated(what: &'static str, pos: Position) -> CodegenError {
    CodegenError::Unannotated { what, pos }
}

/// Lowers an analyzed program to VM instructions.
///
/// The main program comes first, then every routine in declaration order.
/// Jumps and calls refer to symbolic [`Label`]s until [`Codegen::generate`]
/// resolves them in a last pass.
pub struct Codegen<'a> {
    symbol_table: &'a SymbolTable,
    instructions: Vec<Instruction>,
    /// Offset of each label, once placed.
    labels: Vec<Option<usize>>,
    /// Entry label of each routine, by id.
    entries: Vec<Label>,
    /// Parameter count of the routine being generated.
    params: usize,
    /// Where `exit` jumps to in the routine being generated.
    exit_label: Option<Label>,
}

impl<'a> Codegen<'a> {
    pub fn new(symbol_table: &'a SymbolTable) -> Self {
        Self {
            symbol_table,
            instructions: vec![],
            labels: vec![],
            entries: vec![],
            params: 0,
            exit_label: None,
        }
    }

    pub fn generate(mut self, program: &Program) -> CodegenResult<Executable> {
        let table = self.symbol_table;
        let entries = (0..table.routines().len()).map(|_| self.new_label()).collect();
        self.entries = entries;

        self.emit(Opcode::Start);
        self.gen_slots(table.globals());
        self.gen_stmts(&program.block.body)?;
        self.emit(Opcode::Stop);

        for decl in &program.block.decls {
            if let Decl::Routine(routine) = decl {
                self.gen_routine(routine)?;
            }
        }

        self.resolve_labels()?;

        let mut entry_points = BTreeMap::from([("main".to_string(), 0)]);
        for (routine, label) in table.routines().iter().zip(&self.entries) {
            if let Some(Some(offset)) = self.labels.get(label.0) {
                entry_points.insert(routine.name.to_ascii_lowercase(), *offset);
            }
        }
        debug!(
            instructions = self.instructions.len(),
            labels = self.labels.len(),
            "generated code"
        );

        Ok(Executable {
            instructions: self.instructions,
            entry_points,
        })
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    fn place(&mut self, label: Label) -> CodegenResult {
        let offset = self.instructions.len();
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => {
                *slot = Some(offset);
                Ok(())
            }
            _ => Err(CodegenError::LabelPlacedTwice(label)),
        }
    }

    /// Rewrites every label operand into the offset it was placed at.
    fn resolve_labels(&mut self) -> CodegenResult {
        for instruction in self.instructions.iter_mut() {
            if let Some(Operand::Label(label)) = instruction.operand {
                let offset = self
                    .labels
                    .get(label.0)
                    .copied()
                    .flatten()
                    .ok_or(CodegenError::DanglingLabel(label))?;
                trace!(%label, offset, "resolve label");
                instruction.operand = Some(Operand::Address(offset));
            }
        }
        Ok(())
    }

    fn emit(&mut self, opcode: Opcode) {
        self.instructions.push(Instruction::new(opcode));
    }

    fn emit_int(&mut self, opcode: Opcode, n: i64) {
        self.instructions
            .push(Instruction::with(opcode, Operand::Int(n)));
    }

    fn emit_label(&mut self, opcode: Opcode, label: Label) {
        self.instructions
            .push(Instruction::with(opcode, Operand::Label(label)));
    }

    fn emit_str(&mut self, s: &str) {
        self.instructions
            .push(Instruction::with(Opcode::PushS, Operand::Str(s.to_string())));
    }

    /// Pushes the initial value of every slot. Consecutive integer-like
    /// slots collapse into one `PUSHN`.
    fn gen_slots(&mut self, slots: &[SlotRun]) {
        let mut zeros = 0;
        for run in slots {
            if matches!(run.ty, Ty::Real | Ty::String) {
                if zeros > 0 {
                    self.emit_int(Opcode::PushN, zeros as i64);
                    zeros = 0;
                }
                for _ in 0..run.count {
                    self.gen_zero(&run.ty);
                }
            } else {
                zeros += run.count;
            }
        }
        if zeros > 0 {
            self.emit_int(Opcode::PushN, zeros as i64);
        }
    }

    fn gen_zero(&mut self, ty: &Ty) {
        match ty {
            Ty::Real => self
                .instructions
                .push(Instruction::with(Opcode::PushF, Operand::Real(0.0))),
            Ty::String => self.emit_str(""),
            _ => self.emit_int(Opcode::PushI, 0),
        }
    }

    /// entry: locals; body; exit: POP k; RETURN
    fn gen_routine(&mut self, routine: &RoutineDecl) -> CodegenResult {
        let id = routine
            .id
            .ok_or(unannotated("routine", routine.name.pos))?;
        let table = self.symbol_table;
        let info = table
            .routine(id)
            .ok_or(CodegenError::UnknownRoutine(id))?;
        let entry = *self
            .entries
            .get(id)
            .ok_or(CodegenError::UnknownRoutine(id))?;
        trace!(name = %info.name, "generate routine");

        let exit = self.new_label();
        self.exit_label = Some(exit);
        self.params = info.param_count();

        self.place(entry)?;
        self.gen_slots(info.locals());
        self.gen_stmts(&routine.block.body)?;
        self.place(exit)?;
        let locals = info.local_count();
        if locals > 0 {
            self.emit_int(Opcode::Pop, locals as i64);
        }
        self.emit(Opcode::Return);

        self.exit_label = None;
        self.params = 0;
        Ok(())
    }

    /// fp-relative offset of a frame slot. Parameters sit below fp.
    fn frame_offset(&self, slot: usize) -> i64 {
        slot as i64 - self.params as i64
    }

    fn result_offset(&self) -> i64 {
        -(self.params as i64) - 1
    }

    fn gen_stmts(&mut self, stmts: &[Stmt]) -> CodegenResult {
        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> CodegenResult {
        match &stmt.kind {
            StmtKind::Empty => Ok(()),
            StmtKind::Compound(stmts) => self.gen_stmts(stmts),
            StmtKind::Assign { target, value } => {
                self.gen_store(target, |cg| cg.gen_expr(value))
            }
            StmtKind::Call(call) => {
                if self.gen_call(call)?.is_some() {
                    self.emit_int(Opcode::Pop, 1);
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.gen_if(cond, then_stmt, else_stmt.as_deref()),
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::Repeat { body, cond } => {
                let start = self.new_label();
                self.place(start)?;
                self.gen_stmts(body)?;
                self.gen_expr(cond)?;
                self.emit_label(Opcode::Jz, start);
                Ok(())
            }
            StmtKind::For {
                var,
                start,
                end,
                downto,
                body,
                limit,
            } => {
                let limit = limit.ok_or(unannotated("for loop", stmt.pos))?;
                self.gen_for(var, start, end, *downto, body, limit)
            }
            StmtKind::Case {
                selector,
                arms,
                default,
                temp,
            } => {
                let temp = temp.ok_or(unannotated("case statement", stmt.pos))?;
                self.gen_expr(selector)?;
                self.store_place(temp)?;

                let end = self.new_label();
                for arm in arms {
                    let body = self.new_label();
                    let next = self.new_label();
                    for label in &arm.labels {
                        self.load_place(temp);
                        self.gen_expr(label)?;
                        self.emit(Opcode::Equal);
                        self.emit(Opcode::Not);
                        self.emit_label(Opcode::Jz, body);
                    }
                    self.emit_label(Opcode::Jump, next);
                    self.place(body)?;
                    self.gen_stmt(&arm.body)?;
                    self.emit_label(Opcode::Jump, end);
                    self.place(next)?;
                }
                if let Some(default) = default {
                    self.gen_stmts(default)?;
                }
                self.place(end)
            }
            StmtKind::Exit(value) => {
                let exit = self.exit_label.ok_or(unannotated("exit", stmt.pos))?;
                if let Some(value) = value {
                    self.gen_expr(value)?;
                    self.emit_int(Opcode::StoreL, self.result_offset());
                }
                self.emit_label(Opcode::Jump, exit);
                Ok(())
            }
        }
    }

    /// cond; JZ else; then; [JUMP end; else: else_stmt]; end:
    fn gen_if(&mut self, cond: &Expr, then_stmt: &Stmt, else_stmt: Option<&Stmt>) -> CodegenResult {
        let else_label = self.new_label();
        self.gen_expr(cond)?;
        self.emit_label(Opcode::Jz, else_label);
        self.gen_stmt(then_stmt)?;
        match else_stmt {
            Some(else_stmt) => {
                let end = self.new_label();
                self.emit_label(Opcode::Jump, end);
                self.place(else_label)?;
                self.gen_stmt(else_stmt)?;
                self.place(end)
            }
            None => self.place(else_label),
        }
    }

    /// start: cond; JZ end; body; JUMP start; end:
    fn gen_while(&mut self, cond: &Expr, body: &Stmt) -> CodegenResult {
        let start = self.new_label();
        let end = self.new_label();
        self.place(start)?;
        self.gen_expr(cond)?;
        self.emit_label(Opcode::Jz, end);
        self.gen_stmt(body)?;
        self.emit_label(Opcode::Jump, start);
        self.place(end)
    }

    /// The final value is computed once, into `limit`, before the loop
    /// variable is first assigned.
    fn gen_for(
        &mut self,
        var: &Designator,
        start: &Expr,
        end: &Expr,
        downto: bool,
        body: &Stmt,
        limit: Place,
    ) -> CodegenResult {
        self.gen_expr(end)?;
        self.store_place(limit)?;
        self.gen_store(var, |cg| cg.gen_expr(start))?;

        let head = self.new_label();
        let exit = self.new_label();
        self.place(head)?;
        self.gen_load(var)?;
        self.load_place(limit);
        self.emit(if downto { Opcode::SupEq } else { Opcode::InfEq });
        self.emit_label(Opcode::Jz, exit);

        self.gen_stmt(body)?;

        self.gen_store(var, |cg| {
            cg.gen_load(var)?;
            cg.emit_int(Opcode::PushI, 1);
            cg.emit(if downto { Opcode::Sub } else { Opcode::Add });
            Ok(())
        })?;
        self.emit_label(Opcode::Jump, head);
        self.place(exit)
    }

    /// Pushes the value of a whole scalar slot.
    fn load_place(&mut self, place: Place) {
        match place {
            Place::Global(slot) => self.emit_int(Opcode::PushG, slot as i64),
            Place::Local(slot) => self.emit_int(Opcode::PushL, self.frame_offset(slot)),
            Place::LocalRef(slot) => {
                self.emit_int(Opcode::PushL, self.frame_offset(slot));
                self.emit_int(Opcode::Load, 0);
            }
            Place::Result => self.emit_int(Opcode::PushL, self.result_offset()),
        }
    }

    /// Pops the top of stack into a scalar slot held directly in a frame.
    /// A reference parameter needs its address below the value, so it goes
    /// through [`Codegen::gen_store`] instead.
    fn store_place(&mut self, place: Place) -> CodegenResult {
        match place {
            Place::Global(slot) => self.emit_int(Opcode::StoreG, slot as i64),
            Place::Local(slot) => self.emit_int(Opcode::StoreL, self.frame_offset(slot)),
            Place::Result => self.emit_int(Opcode::StoreL, self.result_offset()),
            Place::LocalRef(slot) => return Err(CodegenError::IndirectStore(slot)),
        }
        Ok(())
    }

    /// Pushes the address of the selected component.
    fn gen_address(&mut self, d: &Designator) -> CodegenResult {
        let binding = d.binding.as_ref().ok_or(unannotated("variable", d.pos))?;
        self.gen_selected_address(binding, &d.selectors)
    }

    fn gen_selected_address(
        &mut self,
        binding: &Binding,
        selectors: &[Selector],
    ) -> CodegenResult {
        let base = match binding.place {
            Place::Global(slot) => Some((Opcode::PushGP, slot as i64)),
            Place::Local(slot) => Some((Opcode::PushFP, self.frame_offset(slot))),
            Place::Result => Some((Opcode::PushFP, self.result_offset())),
            Place::LocalRef(slot) => {
                self.emit_int(Opcode::PushL, self.frame_offset(slot));
                None
            }
        };
        if let Some((opcode, offset)) = base {
            self.emit(opcode);
            if offset != 0 {
                self.emit_int(Opcode::PushI, offset);
                self.emit(Opcode::PAdd);
            }
        }

        let mut ty = &binding.ty;
        for selector in selectors {
            match selector {
                Selector::Index(index) => {
                    let Ty::Array { low, elem, .. } = ty else {
                        return Err(unannotated("array index", index.pos));
                    };
                    self.gen_expr(index)?;
                    if *low != 0 {
                        self.emit_int(Opcode::PushI, *low);
                        self.emit(Opcode::Sub);
                    }
                    if elem.size() > 1 {
                        self.emit_int(Opcode::PushI, elem.size() as i64);
                        self.emit(Opcode::Mul);
                    }
                    self.emit(Opcode::PAdd);
                    ty = elem.as_ref();
                }
                Selector::Field { name, pos } => {
                    let field = ty.field(name).ok_or(unannotated("field", *pos))?;
                    if field.offset > 0 {
                        self.emit_int(Opcode::PushI, field.offset as i64);
                        self.emit(Opcode::PAdd);
                    }
                    ty = &field.ty;
                }
            }
        }
        Ok(())
    }

    fn gen_load(&mut self, d: &Designator) -> CodegenResult {
        let binding = d.binding.as_ref().ok_or(unannotated("variable", d.pos))?;
        // s[i] loads the string, then takes its character i - 1.
        if let Some((Selector::Index(index), prefix)) = d.selectors.split_last() {
            if selected_ty(&binding.ty, prefix) == Some(&Ty::String) {
                self.gen_selected_load(binding, prefix)?;
                self.gen_expr(index)?;
                self.emit_int(Opcode::PushI, 1);
                self.emit(Opcode::Sub);
                self.emit(Opcode::CharAt);
                return Ok(());
            }
        }
        self.gen_selected_load(binding, &d.selectors)
    }

    fn gen_selected_load(&mut self, binding: &Binding, selectors: &[Selector]) -> CodegenResult {
        if selectors.is_empty() {
            self.load_place(binding.place);
        } else {
            self.gen_selected_address(binding, selectors)?;
            self.emit_int(Opcode::Load, 0);
        }
        Ok(())
    }

    /// Stores the value pushed by `value` into `d`.
    fn gen_store<F>(&mut self, d: &Designator, value: F) -> CodegenResult
    where
        F: FnOnce(&mut Self) -> CodegenResult,
    {
        let binding = d.binding.as_ref().ok_or(unannotated("variable", d.pos))?;
        let direct = d.selectors.is_empty() && !matches!(binding.place, Place::LocalRef(_));
        if direct {
            value(self)?;
            self.store_place(binding.place)?;
        } else {
            self.gen_address(d)?;
            value(self)?;
            self.emit_int(Opcode::Store, 0);
        }
        Ok(())
    }

    fn gen_expr(&mut self, expr: &Expr) -> CodegenResult {
        match &expr.kind {
            ExprKind::Int(n) => self.emit_int(Opcode::PushI, *n),
            ExprKind::Real(x) => self
                .instructions
                .push(Instruction::with(Opcode::PushF, Operand::Real(*x))),
            ExprKind::Str(s) => self.emit_str(s),
            ExprKind::Char(c) => self.emit_int(Opcode::PushI, *c as i64),
            ExprKind::Bool(b) => self.emit_int(Opcode::PushI, *b as i64),
            ExprKind::Designator(d) => self.gen_load(d)?,
            ExprKind::Call(call) => {
                if self.gen_call(call)?.is_none() {
                    return Err(unannotated("function call", call.pos));
                }
            }
            ExprKind::IntToReal(inner) => {
                self.gen_expr(inner)?;
                self.emit(Opcode::IToF);
            }
            ExprKind::CharToStr(inner) => {
                self.gen_expr(inner)?;
                self.emit(Opcode::StrC);
            }
            ExprKind::Unary(op, operand) => {
                self.gen_expr(operand)?;
                match (op, &operand.ty) {
                    (UnOp::Neg, Some(Ty::Real)) => {
                        self.instructions
                            .push(Instruction::with(Opcode::PushF, Operand::Real(-1.0)));
                        self.emit(Opcode::FMul);
                    }
                    (UnOp::Neg, _) => {
                        self.emit_int(Opcode::PushI, -1);
                        self.emit(Opcode::Mul);
                    }
                    (UnOp::Plus, _) => (),
                    (UnOp::Not, _) => self.emit(Opcode::Not),
                }
            }
            ExprKind::Binary(BinOp::And, lhs, rhs) => self.gen_logical_and(lhs, rhs)?,
            ExprKind::Binary(BinOp::Or, lhs, rhs) => self.gen_logical_or(lhs, rhs)?,
            ExprKind::Binary(op, lhs, rhs) => {
                let operand_ty = lhs.ty.as_ref().ok_or(unannotated("operand", lhs.pos))?;
                let is_real = *operand_ty == Ty::Real;
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.gen_binop(*op, is_real);
            }
        }
        Ok(())
    }

    fn gen_binop(&mut self, op: BinOp, is_real: bool) {
        let opcode = match (op, is_real) {
            (BinOp::Add, false) => Opcode::Add,
            (BinOp::Add, true) => Opcode::FAdd,
            (BinOp::Sub, false) => Opcode::Sub,
            (BinOp::Sub, true) => Opcode::FSub,
            (BinOp::Mul, false) => Opcode::Mul,
            (BinOp::Mul, true) => Opcode::FMul,
            (BinOp::Div, _) => Opcode::FDiv,
            (BinOp::IntDiv, _) => Opcode::Div,
            (BinOp::Mod, _) => Opcode::Mod,
            (BinOp::LessThan, false) => Opcode::Inf,
            (BinOp::LessThan, true) => Opcode::FInf,
            (BinOp::LessEqual, false) => Opcode::InfEq,
            (BinOp::LessEqual, true) => Opcode::FInfEq,
            (BinOp::GreaterThan, false) => Opcode::Sup,
            (BinOp::GreaterThan, true) => Opcode::FSup,
            (BinOp::GreaterEqual, false) => Opcode::SupEq,
            (BinOp::GreaterEqual, true) => Opcode::FSupEq,
            (BinOp::Equal | BinOp::NotEqual | BinOp::And | BinOp::Or, _) => Opcode::Equal,
        };
        self.emit(opcode);
        if op == BinOp::NotEqual {
            self.emit(Opcode::Not);
        }
    }

    /// lhs; JZ false; rhs; JUMP end; false: PUSHI 0; end:
    fn gen_logical_and(&mut self, lhs: &Expr, rhs: &Expr) -> CodegenResult {
        let false_label = self.new_label();
        let end = self.new_label();
        self.gen_expr(lhs)?;
        self.emit_label(Opcode::Jz, false_label);
        self.gen_expr(rhs)?;
        self.emit_label(Opcode::Jump, end);
        self.place(false_label)?;
        self.emit_int(Opcode::PushI, 0);
        self.place(end)
    }

    /// lhs; JZ rhs; PUSHI 1; JUMP end; rhs: rhs; end:
    fn gen_logical_or(&mut self, lhs: &Expr, rhs: &Expr) -> CodegenResult {
        let rhs_label = self.new_label();
        let end = self.new_label();
        self.gen_expr(lhs)?;
        self.emit_label(Opcode::Jz, rhs_label);
        self.emit_int(Opcode::PushI, 1);
        self.emit_label(Opcode::Jump, end);
        self.place(rhs_label)?;
        self.gen_expr(rhs)?;
        self.place(end)
    }

    /// Returns the result type when the call leaves a value on the stack.
    fn gen_call(&mut self, call: &Call) -> CodegenResult<Option<Ty>> {
        let callee = call.callee.ok_or(unannotated("call", call.pos))?;
        let id = match callee {
            Callee::Intrinsic(intrinsic) => return self.gen_intrinsic(intrinsic, call),
            Callee::Routine(id) => id,
        };

        let table = self.symbol_table;
        let info = table
            .routine(id)
            .ok_or(CodegenError::UnknownRoutine(id))?;
        let entry = *self
            .entries
            .get(id)
            .ok_or(CodegenError::UnknownRoutine(id))?;
        let ret = info.signature.ret.as_deref().cloned();

        if let Some(ret) = &ret {
            self.gen_zero(ret);
        }
        for (arg, param) in call.args.iter().zip(&info.signature.params) {
            if param.by_ref {
                let d = arg
                    .as_designator()
                    .ok_or(unannotated("argument", arg.pos))?;
                self.gen_address(d)?;
            } else {
                self.gen_expr(arg)?;
            }
        }
        self.emit_label(Opcode::PushA, entry);
        self.emit(Opcode::Call);
        if !call.args.is_empty() {
            self.emit_int(Opcode::Pop, call.args.len() as i64);
        }
        Ok(ret)
    }

    fn gen_intrinsic(&mut self, intrinsic: Intrinsic, call: &Call) -> CodegenResult<Option<Ty>> {
        match intrinsic {
            Intrinsic::Length => {
                for arg in &call.args {
                    self.gen_expr(arg)?;
                }
                self.emit(Opcode::StrLen);
                return Ok(Some(Ty::Integer));
            }
            Intrinsic::Write | Intrinsic::Writeln => {
                for arg in &call.args {
                    self.gen_write(arg)?;
                }
                if intrinsic == Intrinsic::Writeln {
                    self.emit(Opcode::WriteLn);
                }
            }
            Intrinsic::Read | Intrinsic::Readln => {
                if call.args.is_empty() {
                    self.emit(Opcode::Read);
                    self.emit_int(Opcode::Pop, 1);
                }
                for arg in &call.args {
                    let d = arg
                        .as_designator()
                        .ok_or(unannotated("argument", arg.pos))?;
                    let ty = arg.ty.clone().ok_or(unannotated("argument", arg.pos))?;
                    self.gen_store(d, |cg| {
                        cg.emit(Opcode::Read);
                        match ty {
                            Ty::Integer => cg.emit(Opcode::AToI),
                            Ty::Real => cg.emit(Opcode::AToF),
                            Ty::Char => {
                                cg.emit_int(Opcode::PushI, 0);
                                cg.emit(Opcode::CharAt);
                            }
                            _ => (),
                        }
                        Ok(())
                    })?;
                }
            }
        }
        Ok(None)
    }

    fn gen_write(&mut self, arg: &Expr) -> CodegenResult {
        let ty = arg.ty.as_ref().ok_or(unannotated("argument", arg.pos))?;
        self.gen_expr(arg)?;
        match ty {
            Ty::Integer => self.emit(Opcode::WriteI),
            Ty::Real => self.emit(Opcode::WriteF),
            Ty::Char => self.emit(Opcode::WriteChr),
            Ty::Boolean => {
                let false_label = self.new_label();
                let end = self.new_label();
                self.emit_label(Opcode::Jz, false_label);
                self.emit_str("TRUE");
                self.emit_label(Opcode::Jump, end);
                self.place(false_label)?;
                self.emit_str("FALSE");
                self.place(end)?;
                self.emit(Opcode::WriteS);
            }
            _ => self.emit(Opcode::WriteS),
        }
        Ok(())
    }
}

/// Type of the component reached by applying `selectors` to a value of
/// type `base`.
fn selected_ty<'t>(base: &'t Ty, selectors: &[Selector]) -> Option<&'t Ty> {
    selectors.iter().try_fold(base, |ty, selector| match (selector, ty) {
        (Selector::Index(_), Ty::Array { elem, .. }) => Some(elem.as_ref()),
        (Selector::Field { name, .. }, _) => ty.field(name).map(|field| &field.ty),
        _ => None,
    })
}
