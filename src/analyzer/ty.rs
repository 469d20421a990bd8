use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    /// Slot offset of the field from the start of the record.
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub ty: Ty,
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: Option<Box<Ty>>,
}

/// Type descriptor. Two descriptors are equal iff their shapes match,
/// array bounds included.
#[derive(Clone, Debug, PartialEq)]
pub enum Ty {
    Integer,
    Real,
    Boolean,
    Char,
    String,
    Array { low: i64, high: i64, elem: Box<Ty> },
    Record(Vec<Field>),
    Routine(Signature),
}

/// Largest number of slots a type or a frame may occupy.
pub const MAX_SLOTS: usize = 1 << 20;

/// `count` consecutive slots holding the same scalar type.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotRun {
    pub ty: Ty,
    pub count: usize,
}

impl SlotRun {
    pub fn new(ty: Ty, count: usize) -> Self {
        Self { ty, count }
    }
}

/// Appends `count` slots of `ty`, merging with the last run when it has
/// the same type.
pub fn push_run(runs: &mut Vec<SlotRun>, ty: &Ty, count: usize) {
    if count == 0 {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.ty == *ty => last.count += count,
        _ => runs.push(SlotRun::new(ty.clone(), count)),
    }
}

/// Total number of slots covered by `runs`.
pub fn run_len(runs: &[SlotRun]) -> usize {
    runs.iter().map(|run| run.count).sum()
}

/// Number of elements of `array[low..high]`, if it fits in a `usize`.
pub fn array_len(low: i64, high: i64) -> Option<usize> {
    let span = high.checked_sub(low)?.checked_add(1)?;
    usize::try_from(span).ok()
}

impl Ty {
    /// Number of VM slots a value of this type occupies. Saturates; the
    /// analyzer rejects types above [`MAX_SLOTS`].
    pub fn size(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }

    /// Number of slots, or `None` if it overflows.
    pub fn checked_size(&self) -> Option<usize> {
        match self {
            Ty::Integer | Ty::Real | Ty::Boolean | Ty::Char | Ty::String => Some(1),
            Ty::Array { low, high, elem } => {
                array_len(*low, *high)?.checked_mul(elem.checked_size()?)
            }
            Ty::Record(fields) => fields
                .iter()
                .try_fold(0usize, |total, f| total.checked_add(f.ty.checked_size()?)),
            Ty::Routine(_) => Some(0),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Ty::Integer | Ty::Real | Ty::Boolean | Ty::Char | Ty::String
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Ty::Integer | Ty::Real)
    }

    /// Integer-like types usable as loop counters and case selectors.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Ty::Integer | Ty::Char | Ty::Boolean)
    }

    /// Whether a value of type `source` may be stored into `self`: identical
    /// types, integer into real, or char into string.
    pub fn is_assignable_from(&self, source: &Ty) -> bool {
        self == source
            || matches!((self, source), (Ty::Real, Ty::Integer) | (Ty::String, Ty::Char))
    }

    /// Whether storing `source` into `self` needs the integer-to-real
    /// conversion.
    pub fn needs_widening(&self, source: &Ty) -> bool {
        *self == Ty::Real && *source == Ty::Integer
    }

    /// Common type of two arithmetic operands after widening.
    pub fn common_numeric(&self, other: &Ty) -> Option<Ty> {
        match (self, other) {
            (Ty::Integer, Ty::Integer) => Some(Ty::Integer),
            (t1, t2) if t1.is_numeric() && t2.is_numeric() => Some(Ty::Real),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self {
            Ty::Record(fields) => fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)),
            _ => None,
        }
    }

    pub fn get_return_type(&self) -> Option<&Ty> {
        match self {
            Ty::Routine(sig) => sig.ret.as_deref(),
            _ => None,
        }
    }

    /// The scalar slot types of a value in layout order, as runs.
    pub fn slot_runs(&self) -> Vec<SlotRun> {
        let mut runs = vec![];
        self.push_slot_runs(&mut runs);
        runs
    }

    fn push_slot_runs(&self, runs: &mut Vec<SlotRun>) {
        match self {
            Ty::Array { low, high, elem } => {
                let len = array_len(*low, *high).unwrap_or(0);
                let inner = elem.slot_runs();
                if let [run] = inner.as_slice() {
                    push_run(runs, &run.ty, run.count.saturating_mul(len));
                } else {
                    for _ in 0..len {
                        for run in &inner {
                            push_run(runs, &run.ty, run.count);
                        }
                    }
                }
            }
            Ty::Record(fields) => {
                for field in fields {
                    field.ty.push_slot_runs(runs);
                }
            }
            Ty::Routine(_) => (),
            scalar => push_run(runs, scalar, 1),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Integer => f.write_str("integer"),
            Ty::Real => f.write_str("real"),
            Ty::Boolean => f.write_str("boolean"),
            Ty::Char => f.write_str("char"),
            Ty::String => f.write_str("string"),
            Ty::Array { low, high, elem } => write!(f, "array[{low}..{high}] of {elem}"),
            Ty::Record(fields) => {
                f.write_str("record ")?;
                for field in fields {
                    write!(f, "{}: {}; ", field.name, field.ty)?;
                }
                f.write_str("end")
            }
            Ty::Routine(Signature { ret: Some(ret), .. }) => write!(f, "function: {ret}"),
            Ty::Routine(Signature { ret: None, .. }) => f.write_str("procedure"),
        }
    }
}
