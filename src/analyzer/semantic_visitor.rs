use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, trace};

use crate::diagnostics::{self, Diagnostic, ErrorKind};
use crate::lexer::Position;
use crate::options::CompileOptions;
use crate::parser::{
    BinOp, Binding, Block, Call, Callee, Decl, Designator, Expr, ExprKind, Place, Program,
    RoutineDecl, Selector, Stmt, StmtKind, TypeSpec, UnOp,
};

use super::{
    array_len, ConstValue, Field, Intrinsic, Param, RoutineId, Signature, Storage, Symbol,
    SymbolKind, SymbolTable, Ty, MAX_SLOTS,
};

/// How a designator is used; decides the error reported when it does not
/// name a variable.
#[derive(Clone, Debug)]
enum Access {
    Read,
    Write,
    Reference { callee: String, index: usize },
}

/// Checks a parsed program and annotates it for code generation.
///
/// Expression nodes get their resolved type, designators their storage,
/// calls their callee, and `for`/`case` statements a hidden slot. Named
/// constants are replaced by their value, integer operands meeting a real
/// are wrapped in [`ExprKind::IntToReal`] and char values used as strings
/// in [`ExprKind::CharToStr`].
pub struct SemanticVisitor {
    symbol_table: SymbolTable,
    options: CompileOptions,
    diagnostics: Vec<Diagnostic>,
    /// Routine whose body is being analyzed.
    current_routine: Option<RoutineId>,
}

impl Default for SemanticVisitor {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl SemanticVisitor {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            symbol_table: SymbolTable::new(),
            options,
            diagnostics: vec![],
            current_routine: None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        diagnostics::has_errors(&self.diagnostics)
    }

    pub fn visit_program(&mut self, program: &mut Program) -> SymbolTable {
        self.visit_block(&mut program.block);
        debug!(
            routines = self.symbol_table.routines().len(),
            globals = self.symbol_table.global_count(),
            diagnostics = self.diagnostics.len(),
            "analyzed program"
        );
        self.symbol_table.clone()
    }

    fn error(&mut self, kind: ErrorKind, pos: Position) {
        trace!(%kind, %pos, "semantic error");
        self.diagnostics.push(Diagnostic::error(kind, pos));
    }

    fn declare(&mut self, symbol: Symbol, pos: Position) {
        let name = symbol.name.clone();
        if let Err(kind) = self.symbol_table.declare(symbol) {
            self.error(kind, pos);
        } else if self.symbol_table.is_shadowing(&name) {
            self.diagnostics
                .push(Diagnostic::warning(ErrorKind::Shadowing(name), pos));
        }
    }

    /// Binds every declaration of the block, then analyzes routine bodies,
    /// then the statement part. Routines may therefore call routines
    /// declared after them.
    fn visit_block(&mut self, block: &mut Block) {
        for decl in block.decls.iter_mut() {
            self.bind_decl(decl);
        }
        for decl in block.decls.iter_mut() {
            if let Decl::Routine(routine) = decl {
                self.visit_routine_body(routine);
            }
        }
        self.visit_stmts(&mut block.body);
    }

    fn bind_decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Const(c) => {
                if let Some(value) = self.eval_const(&mut c.value) {
                    self.declare(Symbol::constant(&c.name.name, value), c.name.pos);
                }
            }
            Decl::Type(t) => {
                if let Some(ty) = self.resolve_type(&mut t.spec) {
                    self.declare(Symbol::type_alias(&t.name.name, ty), t.name.pos);
                }
            }
            Decl::Var(v) => {
                if let Some(ty) = self.resolve_type(&mut v.spec) {
                    for name in &v.names {
                        self.declare(Symbol::variable(&name.name, ty.clone()), name.pos);
                    }
                }
            }
            Decl::Routine(routine) => self.bind_routine(routine),
        }
    }

    fn bind_routine(&mut self, routine: &mut RoutineDecl) {
        let name = &routine.name;
        if self.current_routine.is_some() {
            self.error(ErrorKind::NestedRoutine(name.name.clone()), name.pos);
            return;
        }

        let mut params = vec![];
        for group in routine.params.iter_mut() {
            let ty = self.resolve_type(&mut group.spec).unwrap_or(Ty::Integer);
            for param in &group.names {
                if !group.by_ref && !ty.is_scalar() {
                    self.error(ErrorKind::CompositeByValue(param.name.clone()), param.pos);
                }
                params.push(Param {
                    ty: ty.clone(),
                    by_ref: group.by_ref,
                });
            }
        }

        let ret = match &mut routine.ret {
            Some(spec) => {
                let ty = self.resolve_type(spec).unwrap_or(Ty::Integer);
                if !ty.is_scalar() {
                    self.error(ErrorKind::CompositeResult(name.name.clone()), name.pos);
                }
                Some(Box::new(ty))
            }
            None => None,
        };

        let signature = Signature { params, ret };
        let id = self.symbol_table.add_routine(&name.name, signature.clone());
        self.declare(Symbol::routine(&name.name, signature, id), name.pos);
        routine.id = Some(id);
    }

    fn visit_routine_body(&mut self, routine: &mut RoutineDecl) {
        let Some(id) = routine.id else {
            return;
        };
        let Some(info) = self.symbol_table.routine(id).cloned() else {
            return;
        };
        trace!(name = %info.name, id, "enter routine");

        self.symbol_table.open_scope();
        self.current_routine = Some(id);

        let names = routine.params.iter().flat_map(|group| group.names.iter());
        for (name, param) in names.zip(&info.signature.params) {
            let symbol = Symbol::parameter(&name.name, param.ty.clone(), param.by_ref);
            self.declare(symbol, name.pos);
        }
        self.visit_block(&mut routine.block);

        self.current_routine = None;
        if let Some(frame) = self.symbol_table.close_scope() {
            self.symbol_table.set_routine_frame(id, frame);
        }
    }

    fn resolve_type(&mut self, spec: &mut TypeSpec) -> Option<Ty> {
        match spec {
            TypeSpec::Named(ident) => match self.symbol_table.lookup(&ident.name).cloned() {
                Ok(Symbol {
                    kind: SymbolKind::TypeAlias,
                    ty,
                    ..
                }) => Some(ty),
                Ok(_) => {
                    self.error(ErrorKind::NotAType(ident.name.clone()), ident.pos);
                    None
                }
                Err(kind) => {
                    self.error(kind, ident.pos);
                    None
                }
            },
            TypeSpec::Array { ranges, elem, pos } => {
                if !self.options.arrays {
                    self.error(ErrorKind::FeatureDisabled("array"), *pos);
                    return None;
                }
                let mut bounds = vec![];
                for (low, high) in ranges.iter_mut() {
                    let low = self.eval_integer(low);
                    let high = self.eval_integer(high);
                    bounds.push((low?, high?));
                }
                let mut ty = self.resolve_type(elem)?;
                for (low, high) in bounds.into_iter().rev() {
                    if low > high {
                        self.error(ErrorKind::InvalidArrayBounds { low, high }, *pos);
                        return None;
                    }
                    let size = array_len(low, high).and_then(|len| len.checked_mul(ty.size()));
                    if !size.is_some_and(|size| size <= MAX_SLOTS) {
                        self.error(ErrorKind::ArrayTooLarge { low, high }, *pos);
                        return None;
                    }
                    ty = Ty::Array {
                        low,
                        high,
                        elem: Box::new(ty),
                    };
                }
                Some(ty)
            }
            TypeSpec::Record { fields: decls, pos } => {
                if !self.options.records {
                    self.error(ErrorKind::FeatureDisabled("record"), *pos);
                    return None;
                }
                let mut fields: Vec<Field> = vec![];
                let mut offset = 0;
                for decl in decls.iter_mut() {
                    let ty = self.resolve_type(&mut decl.spec)?;
                    for name in &decl.names {
                        if fields.iter().any(|f| f.name.eq_ignore_ascii_case(&name.name)) {
                            self.error(ErrorKind::DuplicateDeclaration(name.name.clone()), name.pos);
                            continue;
                        }
                        fields.push(Field {
                            name: name.name.clone(),
                            ty: ty.clone(),
                            offset,
                        });
                        offset += ty.size();
                        if offset > MAX_SLOTS {
                            self.error(ErrorKind::RecordTooLarge, *pos);
                            return None;
                        }
                    }
                }
                Some(Ty::Record(fields))
            }
        }
    }

    fn eval_integer(&mut self, expr: &mut Expr) -> Option<i64> {
        match self.eval_const(expr)? {
            ConstValue::Integer(n) => Some(n),
            other => {
                self.error(ErrorKind::NonIntegerConstant(other.ty()), expr.pos);
                None
            }
        }
    }

    /// Folds a constant expression and records its type on the node.
    fn eval_const(&mut self, expr: &mut Expr) -> Option<ConstValue> {
        let value = match &mut expr.kind {
            ExprKind::Int(n) => ConstValue::Integer(*n),
            ExprKind::Real(x) => ConstValue::Real(*x),
            ExprKind::Char(c) => ConstValue::Char(*c),
            ExprKind::Bool(b) => ConstValue::Boolean(*b),
            ExprKind::Str(s) => match single_char(s) {
                Some(c) => ConstValue::Char(c),
                None => ConstValue::String(s.clone()),
            },
            ExprKind::Designator(d) if d.selectors.is_empty() => {
                match self.symbol_table.lookup(&d.name).cloned() {
                    Ok(Symbol {
                        storage: Some(Storage::Constant(value)),
                        ..
                    }) => value,
                    Ok(_) => {
                        self.error(ErrorKind::NotConstant, expr.pos);
                        return None;
                    }
                    Err(kind) => {
                        self.error(kind, d.pos);
                        return None;
                    }
                }
            }
            ExprKind::Unary(op, operand) => {
                let value = self.eval_const(operand)?;
                match fold_unary(*op, &value) {
                    Some(value) => value,
                    None => {
                        let kind = ErrorKind::InvalidOperand {
                            op: op.to_string(),
                            operand: value.ty(),
                        };
                        self.error(kind, expr.pos);
                        return None;
                    }
                }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let left = self.eval_const(lhs)?;
                let right = self.eval_const(rhs)?;
                if is_division_by_zero(*op, &right) {
                    self.error(ErrorKind::DivisionByZero, expr.pos);
                    return None;
                }
                match fold_binary(*op, &left, &right) {
                    Some(value) => value,
                    None => {
                        let kind = ErrorKind::InvalidOperands {
                            op: op.to_string(),
                            left: left.ty(),
                            right: right.ty(),
                        };
                        self.error(kind, expr.pos);
                        return None;
                    }
                }
            }
            _ => {
                self.error(ErrorKind::NotConstant, expr.pos);
                return None;
            }
        };
        expr.ty = Some(value.ty());
        Some(value)
    }

    fn visit_stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        let pos = stmt.pos;
        match &mut stmt.kind {
            StmtKind::Empty => (),
            StmtKind::Compound(stmts) => self.visit_stmts(stmts),
            StmtKind::Assign { target, value } => self.visit_assign(target, value),
            StmtKind::Call(call) => {
                self.visit_call(call, false);
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.visit_condition(cond);
                self.visit_stmt(then_stmt);
                if let Some(else_stmt) = else_stmt {
                    self.visit_stmt(else_stmt);
                }
            }
            StmtKind::While { cond, body } => {
                self.visit_condition(cond);
                self.visit_stmt(body);
            }
            StmtKind::Repeat { body, cond } => {
                self.visit_stmts(body);
                self.visit_condition(cond);
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
                limit,
                ..
            } => {
                if let Some(ty) = self.visit_for_variable(var) {
                    for bound in [start, end] {
                        if let Some(found) = self.visit_expr(bound) {
                            if found != ty {
                                let kind = ErrorKind::TypeMismatch {
                                    expected: ty.clone(),
                                    found,
                                };
                                self.error(kind, bound.pos);
                            }
                        }
                    }
                    *limit = Some(self.reserve_temp(ty));
                } else {
                    self.visit_expr(start);
                    self.visit_expr(end);
                }
                self.visit_stmt(body);
            }
            StmtKind::Case {
                selector,
                arms,
                default,
                temp,
            } => {
                let ty = self.visit_expr(selector);
                let ty = match ty {
                    Some(ty) if ty.is_ordinal() => Some(ty),
                    Some(ty) => {
                        self.error(ErrorKind::InvalidSelector(ty), selector.pos);
                        None
                    }
                    None => None,
                };

                let mut seen = HashSet::new();
                for arm in arms.iter_mut() {
                    for label in arm.labels.iter_mut() {
                        let Some(value) = self.eval_const(label) else {
                            continue;
                        };
                        let Some(ty) = &ty else {
                            continue;
                        };
                        if value.ty() != *ty {
                            let kind = ErrorKind::TypeMismatch {
                                expected: ty.clone(),
                                found: value.ty(),
                            };
                            self.error(kind, label.pos);
                            continue;
                        }
                        if !seen.insert(value.ordinal()) {
                            self.error(ErrorKind::DuplicateCaseLabel(value.to_string()), label.pos);
                        }
                        label.kind = value.to_expr_kind();
                        label.ty = Some(ty.clone());
                    }
                    self.visit_stmt(&mut arm.body);
                }
                if let Some(default) = default {
                    self.visit_stmts(default);
                }
                if let Some(ty) = ty {
                    *temp = Some(self.reserve_temp(ty));
                }
            }
            StmtKind::Exit(value) => self.visit_exit(value.as_mut(), pos),
        }
    }

    fn reserve_temp(&mut self, ty: Ty) -> Place {
        let slot = self.symbol_table.reserve_temp(ty);
        if self.current_routine.is_some() {
            Place::Local(slot)
        } else {
            Place::Global(slot)
        }
    }

    fn visit_condition(&mut self, cond: &mut Expr) {
        if let Some(ty) = self.visit_expr(cond) {
            if ty != Ty::Boolean {
                self.error(ErrorKind::InvalidConditionType(ty), cond.pos);
            }
        }
    }

    fn visit_assign(&mut self, target: &mut Designator, value: &mut Expr) {
        let target_ty = self.visit_designator(target, Access::Write);
        let value_ty = self.visit_expr(value);
        let (Some(target_ty), Some(value_ty)) = (target_ty, value_ty) else {
            return;
        };

        if !target_ty.is_scalar() {
            self.error(
                ErrorKind::AssignmentToNonVariable(format!("{} (of type {target_ty})", target.name)),
                target.pos,
            );
        } else if !convert(value, &value_ty, &target_ty) {
            let kind = ErrorKind::TypeMismatch {
                expected: target_ty,
                found: value_ty,
            };
            self.error(kind, value.pos);
        }
    }

    /// The loop variable must be a plain integer or char variable or value
    /// parameter. Returns its type.
    fn visit_for_variable(&mut self, var: &mut Designator) -> Option<Ty> {
        let symbol = match self.symbol_table.lookup(&var.name).cloned() {
            Ok(symbol) => symbol,
            Err(kind) => {
                self.error(kind, var.pos);
                return None;
            }
        };
        let is_variable = matches!(
            symbol.kind,
            SymbolKind::Variable | SymbolKind::Parameter { by_ref: false }
        );
        if !is_variable || !matches!(symbol.ty, Ty::Integer | Ty::Char) {
            self.error(ErrorKind::InvalidForVariable(var.name.clone()), var.pos);
            return None;
        }
        self.visit_designator(var, Access::Write)
    }

    fn visit_exit(&mut self, value: Option<&mut Expr>, pos: Position) {
        let ret = self
            .current_routine
            .and_then(|id| self.symbol_table.routine(id))
            .map(|routine| routine.signature.ret.clone());

        match (value, ret) {
            (Some(value), Some(Some(ret))) => {
                if let Some(found) = self.visit_expr(value) {
                    if !convert(value, &found, &ret) {
                        let kind = ErrorKind::TypeMismatch {
                            expected: *ret,
                            found,
                        };
                        self.error(kind, value.pos);
                    }
                }
            }
            (Some(value), _) => {
                self.visit_expr(value);
                self.error(ErrorKind::ExitWithValueOutsideFunction, pos);
            }
            (None, Some(None)) => (),
            (None, _) => self.error(ErrorKind::BareExitOutsideProcedure, pos),
        }
    }

    /// Resolves a call. `as_value` is set where the call appears in an
    /// expression. Returns the result type of a function.
    fn visit_call(&mut self, call: &mut Call, as_value: bool) -> Option<Ty> {
        let symbol = match self.symbol_table.lookup(&call.name).cloned() {
            Ok(symbol) => symbol,
            Err(kind) => {
                self.error(kind, call.pos);
                for arg in call.args.iter_mut() {
                    self.visit_expr(arg);
                }
                return None;
            }
        };

        match (symbol.storage, symbol.ty) {
            (Some(Storage::Intrinsic(intrinsic)), _) => {
                call.callee = Some(Callee::Intrinsic(intrinsic));
                let ret = self.visit_intrinsic(intrinsic, call);
                if as_value && ret.is_none() {
                    self.error(ErrorKind::NoValue(call.name.clone()), call.pos);
                }
                ret
            }
            (Some(Storage::Routine(id)), Ty::Routine(signature)) => {
                call.callee = Some(Callee::Routine(id));
                if call.args.len() != signature.params.len() {
                    let kind = ErrorKind::WrongArgumentCount {
                        callee: call.name.clone(),
                        expected: signature.params.len(),
                        found: call.args.len(),
                    };
                    self.error(kind, call.pos);
                }
                for (index, arg) in call.args.iter_mut().enumerate() {
                    match signature.params.get(index) {
                        Some(param) => self.visit_argument(&call.name, index + 1, arg, param),
                        None => {
                            self.visit_expr(arg);
                        }
                    }
                }
                if as_value && signature.ret.is_none() {
                    self.error(ErrorKind::NoValue(call.name.clone()), call.pos);
                }
                signature.ret.map(|ret| *ret)
            }
            _ => {
                self.error(ErrorKind::NotCallable(call.name.clone()), call.pos);
                for arg in call.args.iter_mut() {
                    self.visit_expr(arg);
                }
                None
            }
        }
    }

    fn visit_argument(&mut self, callee: &str, index: usize, arg: &mut Expr, param: &Param) {
        if !param.by_ref {
            let Some(found) = self.visit_expr(arg) else {
                return;
            };
            if !convert(arg, &found, &param.ty) {
                let kind = ErrorKind::TypeMismatch {
                    expected: param.ty.clone(),
                    found,
                };
                self.error(kind, arg.pos);
            }
            return;
        }

        let found = self.visit_reference(callee, index, arg);
        if let Some(found) = found {
            if found != param.ty {
                let kind = ErrorKind::TypeMismatch {
                    expected: param.ty.clone(),
                    found,
                };
                self.error(kind, arg.pos);
            }
        }
    }

    /// An argument passed by address: it must be a variable.
    fn visit_reference(&mut self, callee: &str, index: usize, arg: &mut Expr) -> Option<Ty> {
        let ty = match &mut arg.kind {
            ExprKind::Designator(d) => {
                let access = Access::Reference {
                    callee: callee.to_string(),
                    index,
                };
                self.visit_designator(d, access)
            }
            _ => {
                self.visit_expr(arg);
                let kind = ErrorKind::NonAddressableArgument {
                    callee: callee.to_string(),
                    index,
                };
                self.error(kind, arg.pos);
                return None;
            }
        };
        arg.ty = ty.clone();
        ty
    }

    /// Checks the arguments of a predefined routine. Returns the result
    /// type of `length`, the only one with a value.
    fn visit_intrinsic(&mut self, intrinsic: Intrinsic, call: &mut Call) -> Option<Ty> {
        let callee = call.name.clone();
        if intrinsic == Intrinsic::Length {
            if call.args.len() != 1 {
                let kind = ErrorKind::WrongArgumentCount {
                    callee: callee.clone(),
                    expected: 1,
                    found: call.args.len(),
                };
                self.error(kind, call.pos);
            }
            for arg in call.args.iter_mut() {
                if let Some(found) = self.visit_expr(arg) {
                    if !convert(arg, &found, &Ty::String) {
                        let kind = ErrorKind::InvalidIntrinsicArgument {
                            callee: callee.clone(),
                            found,
                        };
                        self.error(kind, arg.pos);
                    }
                }
            }
            return Some(Ty::Integer);
        }

        for (index, arg) in call.args.iter_mut().enumerate() {
            let found = if intrinsic.is_read() {
                self.visit_reference(&callee, index + 1, arg)
            } else {
                self.visit_expr(arg)
            };
            let Some(found) = found else {
                continue;
            };
            let accepted = if intrinsic.is_read() {
                matches!(found, Ty::Integer | Ty::Real | Ty::Char | Ty::String)
            } else {
                found.is_scalar()
            };
            if !accepted {
                let kind = ErrorKind::InvalidIntrinsicArgument {
                    callee: callee.clone(),
                    found,
                };
                self.error(kind, arg.pos);
            }
        }
        None
    }

    /// Binds a variable reference and walks its selectors. Returns the type
    /// of the selected component.
    fn visit_designator(&mut self, d: &mut Designator, access: Access) -> Option<Ty> {
        let symbol = match self.symbol_table.lookup(&d.name).cloned() {
            Ok(symbol) => symbol,
            Err(kind) => {
                self.error(kind, d.pos);
                return None;
            }
        };

        let place = match (symbol.kind, &symbol.storage) {
            (
                SymbolKind::Variable | SymbolKind::Parameter { by_ref: false },
                Some(Storage::Global(slot)),
            ) => Some(Place::Global(*slot)),
            (
                SymbolKind::Variable | SymbolKind::Parameter { by_ref: false },
                Some(Storage::Local(slot)),
            ) => Some(Place::Local(*slot)),
            (SymbolKind::Parameter { by_ref: true }, Some(Storage::Local(slot))) => {
                Some(Place::LocalRef(*slot))
            }
            (SymbolKind::Function, Some(Storage::Routine(id)))
                if self.current_routine == Some(*id) && !matches!(access, Access::Read) =>
            {
                Some(Place::Result)
            }
            _ => None,
        };
        let Some(place) = place else {
            let kind = match access {
                Access::Read => ErrorKind::NotAValue(d.name.clone()),
                Access::Write => ErrorKind::AssignmentToNonVariable(d.name.clone()),
                Access::Reference { callee, index } => {
                    ErrorKind::NonAddressableArgument { callee, index }
                }
            };
            self.error(kind, d.pos);
            return None;
        };

        let base = match place {
            Place::Result => symbol.ty.get_return_type().cloned()?,
            _ => symbol.ty,
        };

        let mut ty = base.clone();
        for selector in d.selectors.iter_mut() {
            match selector {
                Selector::Index(index) => {
                    if let Some(found) = self.visit_expr(index) {
                        if found != Ty::Integer {
                            self.error(ErrorKind::NonIntegerIndex(found), index.pos);
                        }
                    }
                    ty = match ty {
                        Ty::Array { elem, .. } => *elem,
                        // Strings are read-only arrays of char, indexed from 1.
                        Ty::String => match &access {
                            Access::Read => Ty::Char,
                            Access::Write => {
                                let kind = ErrorKind::StringCharAssignment(d.name.clone());
                                self.error(kind, index.pos);
                                return None;
                            }
                            Access::Reference { callee, index: arg } => {
                                let kind = ErrorKind::NonAddressableArgument {
                                    callee: callee.clone(),
                                    index: *arg,
                                };
                                self.error(kind, d.pos);
                                return None;
                            }
                        },
                        other => {
                            self.error(ErrorKind::NotAnArray(other), index.pos);
                            return None;
                        }
                    };
                }
                Selector::Field { name, pos } => {
                    ty = match ty.field(name) {
                        Some(field) => field.ty.clone(),
                        None => {
                            let kind = match ty {
                                Ty::Record(_) => ErrorKind::UnknownField(name.clone()),
                                other => ErrorKind::NotARecord {
                                    field: name.clone(),
                                    ty: other,
                                },
                            };
                            self.error(kind, *pos);
                            return None;
                        }
                    };
                }
            }
        }

        d.binding = Some(Binding { place, ty: base });
        Some(ty)
    }

    /// Types an expression, records the type on the node and returns it.
    /// `None` means an error was already reported for it.
    fn visit_expr(&mut self, expr: &mut Expr) -> Option<Ty> {
        // A bare name may stand for a constant or a call without arguments.
        if let ExprKind::Designator(d) = &expr.kind {
            if d.selectors.is_empty() {
                match self.symbol_table.lookup(&d.name).cloned() {
                    Ok(Symbol {
                        storage: Some(Storage::Constant(value)),
                        ..
                    }) => {
                        expr.kind = value.to_expr_kind();
                        expr.ty = Some(value.ty());
                        return expr.ty.clone();
                    }
                    Ok(Symbol {
                        kind: SymbolKind::Function | SymbolKind::Procedure,
                        ..
                    }) => {
                        let call = Call::new(d.name.clone(), vec![], d.pos);
                        expr.kind = ExprKind::Call(call);
                    }
                    _ => (),
                }
            }
        }

        let pos = expr.pos;
        let ty = match &mut expr.kind {
            ExprKind::Int(_) => Some(Ty::Integer),
            ExprKind::Real(_) => Some(Ty::Real),
            ExprKind::Char(_) => Some(Ty::Char),
            ExprKind::Bool(_) => Some(Ty::Boolean),
            ExprKind::Str(s) => match single_char(s) {
                Some(c) => {
                    expr.kind = ExprKind::Char(c);
                    Some(Ty::Char)
                }
                None => Some(Ty::String),
            },
            ExprKind::Designator(d) => self.visit_designator(d, Access::Read),
            ExprKind::Call(call) => self.visit_call(call, true),
            ExprKind::Unary(op, operand) => self.visit_unary(*op, operand, pos),
            ExprKind::Binary(op, lhs, rhs) => self.visit_binary(*op, lhs, rhs, pos),
            ExprKind::IntToReal(inner) => {
                self.visit_expr(inner);
                Some(Ty::Real)
            }
            ExprKind::CharToStr(inner) => {
                self.visit_expr(inner);
                Some(Ty::String)
            }
        };
        expr.ty = ty.clone();
        ty
    }

    fn visit_unary(&mut self, op: UnOp, operand: &mut Expr, pos: Position) -> Option<Ty> {
        let ty = self.visit_expr(operand)?;
        let valid = match op {
            UnOp::Neg | UnOp::Plus => ty.is_numeric(),
            UnOp::Not => ty == Ty::Boolean,
        };
        if valid {
            Some(ty)
        } else {
            let kind = ErrorKind::InvalidOperand {
                op: op.to_string(),
                operand: ty,
            };
            self.error(kind, pos);
            None
        }
    }

    fn visit_binary(
        &mut self,
        op: BinOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        pos: Position,
    ) -> Option<Ty> {
        let left = self.visit_expr(lhs);
        let right = self.visit_expr(rhs);
        let (left, right) = (left?, right?);

        let ty = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                left.common_numeric(&right).inspect(|common| {
                    convert(lhs, &left, common);
                    convert(rhs, &right, common);
                })
            }
            BinOp::Div if left.is_numeric() && right.is_numeric() => {
                convert(lhs, &left, &Ty::Real);
                convert(rhs, &right, &Ty::Real);
                Some(Ty::Real)
            }
            BinOp::IntDiv | BinOp::Mod if left == Ty::Integer && right == Ty::Integer => {
                Some(Ty::Integer)
            }
            BinOp::And | BinOp::Or if left == Ty::Boolean && right == Ty::Boolean => {
                Some(Ty::Boolean)
            }
            BinOp::Equal | BinOp::NotEqual if comparable(lhs, &left, rhs, &right, true) => {
                Some(Ty::Boolean)
            }
            BinOp::LessThan | BinOp::LessEqual | BinOp::GreaterThan | BinOp::GreaterEqual
                if comparable(lhs, &left, rhs, &right, false) =>
            {
                Some(Ty::Boolean)
            }
            _ => None,
        };

        if ty.is_none() {
            let kind = ErrorKind::InvalidOperands {
                op: op.to_string(),
                left,
                right,
            };
            self.error(kind, pos);
        }
        ty
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Adapts `expr`, of type `found`, to be used where `target` is expected.
/// Integers are widened to real and chars become strings.
fn convert(expr: &mut Expr, found: &Ty, target: &Ty) -> bool {
    if !target.is_assignable_from(found) {
        return false;
    }
    if found == target {
        return true;
    }
    let pos = expr.pos;
    if let (Ty::String, ExprKind::Char(c)) = (target, &expr.kind) {
        expr.kind = ExprKind::Str(c.to_string());
        expr.ty = Some(Ty::String);
        return true;
    }
    let inner = Box::new(std::mem::replace(expr, Expr::new(ExprKind::Int(0), pos)));
    let kind = if target.needs_widening(found) {
        ExprKind::IntToReal(inner)
    } else {
        ExprKind::CharToStr(inner)
    };
    *expr = Expr {
        kind,
        pos,
        ty: Some(target.clone()),
    };
    true
}

fn is_division_by_zero(op: BinOp, divisor: &ConstValue) -> bool {
    let zero = match divisor {
        ConstValue::Integer(n) => *n == 0,
        ConstValue::Real(x) => *x == 0.0,
        _ => false,
    };
    zero && matches!(op, BinOp::Div | BinOp::IntDiv | BinOp::Mod)
}

/// Whether two operands can be compared, widening them when needed.
/// Strings only support (in)equality.
fn comparable(lhs: &mut Expr, left: &Ty, rhs: &mut Expr, right: &Ty, equality: bool) -> bool {
    if let Some(common) = left.common_numeric(right) {
        convert(lhs, left, &common);
        convert(rhs, right, &common);
        return true;
    }
    match (left, right) {
        (Ty::String, Ty::Char) if equality => convert(rhs, right, left),
        (Ty::Char, Ty::String) if equality => convert(lhs, left, right),
        (Ty::String, Ty::String) => equality,
        (Ty::Char, Ty::Char) | (Ty::Boolean, Ty::Boolean) => true,
        _ => false,
    }
}

fn fold_unary(op: UnOp, value: &ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (UnOp::Neg, ConstValue::Integer(n)) => Some(ConstValue::Integer(n.wrapping_neg())),
        (UnOp::Neg, ConstValue::Real(x)) => Some(ConstValue::Real(-x)),
        (UnOp::Plus, ConstValue::Integer(_) | ConstValue::Real(_)) => Some(value.clone()),
        (UnOp::Not, ConstValue::Boolean(b)) => Some(ConstValue::Boolean(!b)),
        _ => None,
    }
}

fn as_real(value: &ConstValue) -> Option<f64> {
    match value {
        ConstValue::Integer(n) => Some(*n as f64),
        ConstValue::Real(x) => Some(*x),
        _ => None,
    }
}

fn fold_binary(op: BinOp, left: &ConstValue, right: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;

    if op.is_relational() {
        let ordering = match (left, right) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Char(a), Char(b)) => a.cmp(b),
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (String(a), String(b)) if matches!(op, BinOp::Equal | BinOp::NotEqual) => a.cmp(b),
            _ => as_real(left)?.partial_cmp(&as_real(right)?)?,
        };
        let result = match op {
            BinOp::Equal => ordering == Ordering::Equal,
            BinOp::NotEqual => ordering != Ordering::Equal,
            BinOp::LessThan => ordering == Ordering::Less,
            BinOp::LessEqual => ordering != Ordering::Greater,
            BinOp::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Some(Boolean(result));
    }

    let value = match (op, left, right) {
        (BinOp::And, Boolean(a), Boolean(b)) => Boolean(*a && *b),
        (BinOp::Or, Boolean(a), Boolean(b)) => Boolean(*a || *b),
        (BinOp::IntDiv, Integer(a), Integer(b)) => Integer(a.checked_div(*b)?),
        (BinOp::Mod, Integer(a), Integer(b)) => Integer(a.checked_rem(*b)?),
        (BinOp::Add, Integer(a), Integer(b)) => Integer(a.wrapping_add(*b)),
        (BinOp::Sub, Integer(a), Integer(b)) => Integer(a.wrapping_sub(*b)),
        (BinOp::Mul, Integer(a), Integer(b)) => Integer(a.wrapping_mul(*b)),
        (BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div, _, _) => {
            let (a, b) = (as_real(left)?, as_real(right)?);
            Real(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => a / b,
            })
        }
        _ => return None,
    };
    Some(value)
}
