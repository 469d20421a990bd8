use pvmc::analyzer::*;
use pvmc::diagnostics::ErrorKind;

#[test]
fn prelude_is_visible() {
    let table = SymbolTable::new();
    assert_eq!(table.depth(), GLOBAL_DEPTH);
    for name in ["integer", "REAL", "Boolean", "char", "string", "write", "readln", "Length"] {
        assert_eq!(table.lookup(name).unwrap().depth, PRELUDE_DEPTH, "{name}");
    }
    let maxint = table.lookup("maxint").unwrap();
    assert_eq!(
        maxint.storage,
        Some(Storage::Constant(ConstValue::Integer(MAXINT)))
    );
}

#[test]
fn slots_follow_declaration_order() {
    let mut table = SymbolTable::new();
    let a = table.declare(Symbol::variable("a", Ty::Integer)).unwrap();
    assert_eq!(a.storage, Some(Storage::Global(0)));
    let arr = Ty::Array {
        low: 1,
        high: 3,
        elem: Box::new(Ty::Real),
    };
    let v = table.declare(Symbol::variable("v", arr)).unwrap();
    assert_eq!(v.storage, Some(Storage::Global(1)));
    let b = table.declare(Symbol::variable("b", Ty::Char)).unwrap();
    assert_eq!(b.storage, Some(Storage::Global(4)));
    assert_eq!(
        table.globals(),
        &[
            SlotRun::new(Ty::Integer, 1),
            SlotRun::new(Ty::Real, 3),
            SlotRun::new(Ty::Char, 1),
        ]
    );
    assert_eq!(table.global_count(), 5);
}

#[test]
fn local_slots_start_at_zero() {
    let mut table = SymbolTable::new();
    table.declare(Symbol::variable("g", Ty::Integer)).unwrap();
    table.open_scope();
    let p = table
        .declare(Symbol::parameter("p", Ty::Real, true))
        .unwrap();
    assert_eq!(p.storage, Some(Storage::Local(0)));
    let x = table.declare(Symbol::variable("x", Ty::Real)).unwrap();
    assert_eq!(x.storage, Some(Storage::Local(1)));
    assert_eq!(table.reserve_temp(Ty::Integer), 2);

    let frame = table.close_scope().unwrap();
    // a reference parameter holds an address
    assert_eq!(
        frame.slots(),
        &[
            SlotRun::new(Ty::Integer, 1),
            SlotRun::new(Ty::Real, 1),
            SlotRun::new(Ty::Integer, 1),
        ]
    );
    assert_eq!(frame.len(), 3);
}

#[test]
fn duplicate_in_same_frame_is_rejected() {
    let mut table = SymbolTable::new();
    table.declare(Symbol::variable("x", Ty::Integer)).unwrap();
    let err = table.declare(Symbol::variable("X", Ty::Real)).unwrap_err();
    assert_eq!(err, ErrorKind::DuplicateDeclaration("X".to_string()));
    // the first declaration is untouched
    assert_eq!(table.lookup("x").unwrap().ty, Ty::Integer);
}

#[test]
fn shadowing_across_frames_is_accepted() {
    let mut table = SymbolTable::new();
    table.declare(Symbol::variable("x", Ty::Integer)).unwrap();
    assert!(!table.is_shadowing("x"));

    table.open_scope();
    assert!(table.is_shadowing("x"));
    table.declare(Symbol::variable("x", Ty::Real)).unwrap();
    let inner = table.lookup("x").unwrap();
    assert_eq!(inner.ty, Ty::Real);
    assert_eq!(inner.storage, Some(Storage::Local(0)));

    table.close_scope();
    let outer = table.lookup("x").unwrap();
    assert_eq!(outer.ty, Ty::Integer);
    assert_eq!(outer.storage, Some(Storage::Global(0)));
}

#[test]
fn prelude_names_can_be_redeclared() {
    let mut table = SymbolTable::new();
    assert!(!table.is_shadowing("integer"));
    table.declare(Symbol::variable("maxint", Ty::Real)).unwrap();
    assert_eq!(table.lookup("maxint").unwrap().kind, SymbolKind::Variable);
}

#[test]
fn unresolved_identifier() {
    let table = SymbolTable::new();
    assert_eq!(
        table.lookup("nope").unwrap_err(),
        ErrorKind::UnresolvedIdentifier("nope".to_string())
    );
}

#[test]
fn globals_are_never_popped() {
    let mut table = SymbolTable::new();
    assert!(table.close_scope().is_none());
    assert_eq!(table.depth(), GLOBAL_DEPTH);
}

#[test]
fn routines_are_registered() {
    let mut table = SymbolTable::new();
    let signature = Signature {
        params: vec![Param {
            ty: Ty::Integer,
            by_ref: false,
        }],
        ret: Some(Box::new(Ty::Integer)),
    };
    let id = table.add_routine("Square", signature.clone());
    let symbol = table
        .declare(Symbol::routine("Square", signature, id))
        .unwrap();
    assert_eq!(symbol.kind, SymbolKind::Function);
    assert_eq!(symbol.storage, Some(Storage::Routine(id)));

    table.open_scope();
    table
        .declare(Symbol::parameter("x", Ty::Integer, false))
        .unwrap();
    table.declare(Symbol::variable("t", Ty::Real)).unwrap();
    let frame = table.close_scope().unwrap();
    table.set_routine_frame(id, frame);

    let info = table.routine(id).unwrap();
    assert!(info.is_function());
    assert_eq!(info.param_count(), 1);
    assert_eq!(info.locals(), &[SlotRun::new(Ty::Real, 1)]);
    assert_eq!(info.local_count(), 1);
}

#[test]
fn type_sizes() {
    let point = Ty::Record(vec![
        Field {
            name: "x".to_string(),
            ty: Ty::Integer,
            offset: 0,
        },
        Field {
            name: "y".to_string(),
            ty: Ty::Integer,
            offset: 1,
        },
    ]);
    let grid = Ty::Array {
        low: 0,
        high: 9,
        elem: Box::new(point.clone()),
    };
    assert_eq!(point.size(), 2);
    assert_eq!(grid.size(), 20);
    assert_eq!(point.field("Y").map(|f| f.offset), Some(1));
    assert!(Ty::Real.is_assignable_from(&Ty::Integer));
    assert!(!Ty::Integer.is_assignable_from(&Ty::Real));
    assert!(Ty::String.is_assignable_from(&Ty::Char));
    assert!(!Ty::Char.is_assignable_from(&Ty::String));
}

#[test]
fn slot_runs_are_run_length_encoded() {
    let tagged = Ty::Record(vec![
        Field {
            name: "tag".to_string(),
            ty: Ty::Char,
            offset: 0,
        },
        Field {
            name: "value".to_string(),
            ty: Ty::Real,
            offset: 1,
        },
    ]);
    let table = Ty::Array {
        low: 1,
        high: 2,
        elem: Box::new(tagged),
    };
    assert_eq!(
        table.slot_runs(),
        [
            SlotRun::new(Ty::Char, 1),
            SlotRun::new(Ty::Real, 1),
            SlotRun::new(Ty::Char, 1),
            SlotRun::new(Ty::Real, 1),
        ]
    );

    let huge = Ty::Array {
        low: 1,
        high: MAX_SLOTS as i64,
        elem: Box::new(Ty::Array {
            low: 0,
            high: 0,
            elem: Box::new(Ty::Integer),
        }),
    };
    assert_eq!(huge.slot_runs(), [SlotRun::new(Ty::Integer, MAX_SLOTS)]);
    assert_eq!(huge.checked_size(), Some(MAX_SLOTS));

    let overflowing = Ty::Array {
        low: i64::MIN,
        high: i64::MAX,
        elem: Box::new(Ty::Integer),
    };
    assert_eq!(overflowing.checked_size(), None);
    assert_eq!(array_len(i64::MIN, i64::MAX), None);
    assert_eq!(array_len(-2, 2), Some(5));
}

#[test]
fn frames_stop_at_the_slot_limit() {
    let mut table = SymbolTable::new();
    let half = Ty::Array {
        low: 1,
        high: (MAX_SLOTS / 2 + 1) as i64,
        elem: Box::new(Ty::Integer),
    };
    table.declare(Symbol::variable("a", half.clone())).unwrap();
    assert_eq!(
        table.declare(Symbol::variable("b", half)),
        Err(ErrorKind::FrameTooLarge("b".to_string()))
    );
    assert_eq!(table.global_count(), MAX_SLOTS / 2 + 1);
}
