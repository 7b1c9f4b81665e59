use std::time::{SystemTime, UNIX_EPOCH};

use super::RuntimeError;
use super::object::{Heap, NativeFn, Obj, ObjNative};
use super::table::Table;
use super::value::{Global, Value, ValueKind, format_number};

/// Built-in functions: name, arity, implementation.
const NATIVES: &[(&str, usize, NativeFn)] = &[
    ("clock", 0, clock),
    ("typeof", 1, type_of),
    ("to_string", 1, to_string),
    ("len", 1, len),
];

/// Register every native under its interned name. Must run before
/// compilation so calls to them are arity-checked.
pub fn install(heap: &mut Heap, globals: &mut Table<Global>) {
    for &(name, arity, function) in NATIVES {
        let name = heap.intern(name);
        let native = heap.alloc_native(ObjNative { function, arity, name });
        globals.set(name, Global::Native(native));
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).copied().unwrap_or(Value::null(0, 0))
}

fn string_value(heap: &mut Heap, chars: String, at: Value) -> Value {
    let s = heap.alloc_string(chars);
    Value::object(s.handle, at.row, at.col)
}

fn clock(_heap: &mut Heap, _args: &[Value]) -> Result<Value, RuntimeError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::number(secs, 0, 0))
}

fn type_of(heap: &mut Heap, args: &[Value]) -> Result<Value, RuntimeError> {
    let v = arg(args, 0);
    let name = v.type_name(heap).to_string();
    Ok(string_value(heap, name, v))
}

fn to_string(heap: &mut Heap, args: &[Value]) -> Result<Value, RuntimeError> {
    let v = arg(args, 0);
    let text = match v.kind {
        ValueKind::Number(n) => format_number(n, 15),
        ValueKind::Bool(b) => b.to_string(),
        ValueKind::Null => "null".to_string(),
        ValueKind::Undefined => "undefined".to_string(),
        ValueKind::Object(r) => match heap.get(r) {
            Obj::String(s) => s.chars.to_string(),
            // Callables answer with their interned name.
            Obj::Function(f) => match f.name {
                Some(name) => return Ok(Value::object(name.handle, v.row, v.col)),
                None => "script".to_string(),
            },
            Obj::Native(n) => return Ok(Value::object(n.name.handle, v.row, v.col)),
        },
    };
    Ok(string_value(heap, text, v))
}

fn len(heap: &mut Heap, args: &[Value]) -> Result<Value, RuntimeError> {
    let v = arg(args, 0);
    match v.as_object().and_then(|r| heap.string(r)) {
        Some(s) => Ok(Value::number(s.chars.len() as f64, v.row, v.col)),
        None => Err(RuntimeError::TypeError {
            message: format!(
                "Function len expect \"String\". But given type is \"{}\"",
                v.type_name(heap)
            ),
            row: v.row,
            col: v.col,
        }),
    }
}
