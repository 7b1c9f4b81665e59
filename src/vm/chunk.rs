use std::fmt::Write;

use super::object::{Heap, Obj, ObjRef};
use super::value::{Value, ValueKind, format_number};

// ── Opcodes ──────────────────────────────────────────────────────────
//
// One byte per opcode. Operands follow inline:
//   none     arithmetic, comparison, PRINT, POP, DUP, RETURN
//   u8       CONSTANT, SET_LOCAL, DEFINE/GET/SET_GLOBAL, CALL
//   u8 u8    GET_LOCAL slot, name constant (position of the read)
//   u16 BE   JMP / JMP_IF_FALSE (absolute target), LOOP (backward distance)

pub const OP_CONSTANT: u8 = 0;
pub const OP_NEGATE: u8 = 1;
pub const OP_RETURN: u8 = 2;
pub const OP_ADD: u8 = 3;
pub const OP_SUBTRACT: u8 = 4;
pub const OP_MULTIPLY: u8 = 5;
pub const OP_DIVIDE: u8 = 6;
pub const OP_MOD: u8 = 7;
pub const OP_NOT: u8 = 8;
pub const OP_EQUAL: u8 = 9;
pub const OP_NOT_EQUAL: u8 = 10;
pub const OP_GT: u8 = 11;
pub const OP_GTE: u8 = 12;
pub const OP_LT: u8 = 13;
pub const OP_LTE: u8 = 14;
pub const OP_BITWISE_AND: u8 = 15;
pub const OP_BITWISE_OR: u8 = 16;
pub const OP_BITWISE_NOT: u8 = 17;
pub const OP_PRINT: u8 = 18;
pub const OP_DEFINE_GLOBAL: u8 = 19;
pub const OP_GET_GLOBAL: u8 = 20;
pub const OP_SET_GLOBAL: u8 = 21;
pub const OP_SET_LOCAL: u8 = 22;
pub const OP_POP: u8 = 23;
pub const OP_GET_LOCAL: u8 = 24;
pub const OP_JMP_IF_FALSE: u8 = 25;
pub const OP_JMP: u8 = 26;
pub const OP_LOOP: u8 = 27;
pub const OP_LEFT_SHIFT: u8 = 28;
pub const OP_RIGHT_SHIFT: u8 = 29;
pub const OP_DUP: u8 = 30;
pub const OP_CALL: u8 = 31;

pub fn opcode_name(op: u8) -> &'static str {
    match op {
        OP_CONSTANT => "OP_CONSTANT",
        OP_NEGATE => "OP_NEGATE",
        OP_RETURN => "OP_RETURN",
        OP_ADD => "OP_ADD",
        OP_SUBTRACT => "OP_SUBTRACT",
        OP_MULTIPLY => "OP_MULTIPLY",
        OP_DIVIDE => "OP_DIVIDE",
        OP_MOD => "OP_MOD",
        OP_NOT => "OP_NOT",
        OP_EQUAL => "OP_EQUAL",
        OP_NOT_EQUAL => "OP_NOT_EQUAL",
        OP_GT => "OP_GT",
        OP_GTE => "OP_GTE",
        OP_LT => "OP_LT",
        OP_LTE => "OP_LTE",
        OP_BITWISE_AND => "OP_BITWISE_AND",
        OP_BITWISE_OR => "OP_BITWISE_OR",
        OP_BITWISE_NOT => "OP_BITWISE_NOT",
        OP_PRINT => "OP_PRINT",
        OP_DEFINE_GLOBAL => "OP_DEFINE_GLOBAL",
        OP_GET_GLOBAL => "OP_GET_GLOBAL",
        OP_SET_GLOBAL => "OP_SET_GLOBAL",
        OP_SET_LOCAL => "OP_SET_LOCAL",
        OP_POP => "OP_POP",
        OP_GET_LOCAL => "OP_GET_LOCAL",
        OP_JMP_IF_FALSE => "OP_JMP_IF_FALSE",
        OP_JMP => "OP_JMP",
        OP_LOOP => "OP_LOOP",
        OP_LEFT_SHIFT => "OP_LEFT_SHIFT",
        OP_RIGHT_SHIFT => "OP_RIGHT_SHIFT",
        OP_DUP => "OP_DUP",
        OP_CALL => "OP_CALL",
        _ => "UNKNOWN",
    }
}

/// Constant pool indices are a single byte.
pub const MAX_CONSTANTS: usize = 256;

// ── Chunk ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk { code: Vec::new(), constants: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append one byte, returning its offset.
    pub fn write(&mut self, byte: u8) -> usize {
        let idx = self.code.len();
        self.code.push(byte);
        idx
    }

    /// `None` once the pool is full.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        let idx = self.constants.len() as u8;
        self.constants.push(value);
        Some(idx)
    }

    /// Big-endian operand at `offset`; bytes past the end read as zero.
    pub fn read_u16(&self, offset: usize) -> u16 {
        let byte = |i: usize| self.code.get(i).copied().unwrap_or(0);
        u16::from_be_bytes([byte(offset), byte(offset + 1)])
    }

    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
    }

    /// One instruction as text, plus the offset of the next one.
    pub fn disassemble_instruction(&self, offset: usize) -> (String, usize) {
        let op = self.code[offset];
        let mut line = format!("&{offset:04}  {}  ", opcode_name(op));
        let byte_at = |i: usize| self.code.get(i).copied().unwrap_or(0);
        let next = match op {
            OP_GET_LOCAL => {
                let _ = write!(line, "#{}#{}", byte_at(offset + 1), byte_at(offset + 2));
                offset + 3
            }
            OP_LOOP | OP_JMP | OP_JMP_IF_FALSE => {
                let target = self.read_u16(offset + 1);
                let _ = write!(line, "&{target:04}");
                offset + 3
            }
            OP_CALL | OP_SET_LOCAL | OP_SET_GLOBAL | OP_GET_GLOBAL | OP_DEFINE_GLOBAL | OP_CONSTANT => {
                let _ = write!(line, "#{}", byte_at(offset + 1));
                offset + 2
            }
            _ => offset + 1,
        };
        (line.trim_end().to_string(), next)
    }

    /// `.data` section: one constant per line.
    pub fn dump_constants(&self, heap: &Heap) -> String {
        let mut out = String::new();
        for (i, value) in self.constants.iter().enumerate() {
            let _ = writeln!(out, "#{i:04}  {}", constant_text(*value, heap));
        }
        out
    }

    /// `.text` section: the whole instruction stream.
    pub fn dump_code(&self) -> String {
        let mut out = String::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let (line, next) = self.disassemble_instruction(offset);
            out.push_str(&line);
            out.push('\n');
            offset = next;
        }
        out
    }
}

fn constant_text(value: Value, heap: &Heap) -> String {
    match value.kind {
        ValueKind::Number(n) => format_number(n, 6),
        ValueKind::Object(r) => match heap.get(r) {
            Obj::String(s) => format!("\"{}\"", s.chars),
            _ => value.display(heap),
        },
        _ => value.display(heap),
    }
}

/// Full listing for every function in the heap, top-level script first.
pub fn dump_program(heap: &Heap, script: ObjRef) -> String {
    let mut sections = vec![script];
    sections.extend(heap.functions().map(|(r, _)| r).filter(|r| *r != script));

    let mut out = String::new();
    for r in sections {
        let Some(function) = heap.function(r) else { continue };
        let title = Value::object(r, 0, 0).display(heap);
        let _ = writeln!(out, "== {title} ==");
        out.push_str("==== .data ====\n");
        out.push_str(&function.chunk.dump_constants(heap));
        out.push_str("==== .text ====\n");
        out.push_str(&function.chunk.dump_code());
    }
    out
}
