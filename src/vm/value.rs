use super::object::{Heap, Obj, ObjRef};

/// Payload of a runtime value. Derived equality is the language's `==`:
/// different tags never match and objects match by handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Bool(bool),
    Number(f64),
    Null,
    /// Declared but not yet assigned. Only the compiler publishes this.
    Undefined,
    Object(ObjRef),
}

/// A tagged value plus the source position it came from.
#[derive(Debug, Clone, Copy)]
pub struct Value {
    pub kind: ValueKind,
    pub row: u32,
    pub col: u32,
}

impl Value {
    pub fn new(kind: ValueKind, row: u32, col: u32) -> Self {
        Value { kind, row, col }
    }

    pub fn number(n: f64, row: u32, col: u32) -> Self {
        Value::new(ValueKind::Number(n), row, col)
    }

    pub fn boolean(b: bool, row: u32, col: u32) -> Self {
        Value::new(ValueKind::Bool(b), row, col)
    }

    pub fn null(row: u32, col: u32) -> Self {
        Value::new(ValueKind::Null, row, col)
    }

    pub fn undefined(row: u32, col: u32) -> Self {
        Value::new(ValueKind::Undefined, row, col)
    }

    pub fn object(obj: ObjRef, row: u32, col: u32) -> Self {
        Value::new(ValueKind::Object(obj), row, col)
    }

    /// Same value, reported at a different source position.
    pub fn at(self, row: u32, col: u32) -> Self {
        Value { row, col, ..self }
    }

    pub fn as_number(self) -> Option<f64> {
        match self.kind {
            ValueKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_object(self) -> Option<ObjRef> {
        match self.kind {
            ValueKind::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self.kind, ValueKind::Undefined)
    }

    /// `null`, `0`, `""` and `false` are falsey; everything else is truthy.
    pub fn is_falsey(self, heap: &Heap) -> bool {
        match self.kind {
            ValueKind::Null => true,
            ValueKind::Bool(b) => !b,
            ValueKind::Number(n) => n == 0.0,
            ValueKind::Object(r) => heap.string(r).is_some_and(|s| s.chars.is_empty()),
            ValueKind::Undefined => false,
        }
    }

    pub fn type_name(self, heap: &Heap) -> &'static str {
        match self.kind {
            ValueKind::Bool(_) => "Boolean",
            ValueKind::Null => "null",
            ValueKind::Number(_) => "Number",
            ValueKind::Undefined => "undefined",
            ValueKind::Object(r) => match heap.get(r) {
                Obj::String(_) => "String",
                _ => "Object",
            },
        }
    }

    /// Text written by `print`.
    pub fn display(self, heap: &Heap) -> String {
        match self.kind {
            ValueKind::Bool(b) => b.to_string(),
            ValueKind::Number(n) => format_number(n, 6),
            ValueKind::Null => "null".to_string(),
            ValueKind::Undefined => "undefined".to_string(),
            ValueKind::Object(r) => match heap.get(r) {
                Obj::String(s) => s.chars.to_string(),
                Obj::Function(f) => match f.name {
                    Some(name) => format!("<fn {}>", heap.chars(name.handle)),
                    None => "<script>".to_string(),
                },
                Obj::Native(n) => format!("<native {}>", heap.chars(n.name.handle)),
            },
        }
    }
}

/// An entry in the globals table. The compiler reads the tag to check
/// arity and redeclaration statically; the VM only needs the value.
#[derive(Debug, Clone, Copy)]
pub enum Global {
    Native(ObjRef),
    /// A declared function, with the position of its declaration.
    Script { function: ObjRef, row: u32, col: u32 },
    /// A `var` at top level.
    Plain(Value),
}

impl Global {
    pub fn value(self) -> Value {
        match self {
            Global::Native(r) => Value::object(r, 0, 0),
            Global::Script { function, row, col } => Value::object(function, row, col),
            Global::Plain(v) => v,
        }
    }

    /// Where the global was declared. Natives have no source position.
    pub fn position(self) -> (u32, u32) {
        match self {
            Global::Native(_) => (0, 0),
            Global::Script { row, col, .. } => (row, col),
            Global::Plain(v) => (v.row, v.col),
        }
    }
}

/// Equality as the VM sees it. Positions never take part.
pub fn values_equal(a: Value, b: Value) -> bool {
    a.kind == b.kind
}

/// Formats like C's `%.<precision>g`.
pub fn format_number(n: f64, precision: usize) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let precision = precision.max(1);

    // Round to the requested significant digits first; the exponent can shift (9.9999995 -> 1e+01).
    let sci = format!("{:.*e}", precision - 1, n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
