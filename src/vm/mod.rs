use std::cmp::Ordering;
use std::io::Write;

pub mod chunk;
pub mod native;
pub mod object;
pub mod table;
pub mod value;

use crate::compiler::Program;
use chunk::*;
use object::{ObjRef, StrRef};
use value::{Global, Value, ValueKind, values_equal};

/// Call depth limit.
pub const FRAMES_MAX: usize = 64;
/// Value stack limit: every frame may use a full byte's worth of slots.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{message}")]
    TypeError { message: String, row: u32, col: u32 },
    #[error("illegal instruction {op} at offset {offset}")]
    IllegalInstruction { op: u8, offset: usize },
    #[error("stack overflow")]
    StackOverflow { row: u32, col: u32 },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("{message}")]
    ReferenceError { message: String, row: u32, col: u32 },
    #[error("Function '{name}' expected {arity} arguments but got {got} arguments")]
    TooFewArguments { name: String, arity: usize, got: usize, row: u32, col: u32 },
    #[error("Function '{name}' expected {arity} arguments but got {got} arguments")]
    TooManyArguments { name: String, arity: usize, got: usize, row: u32, col: u32 },
    #[error("cannot write output: {message}")]
    OutputError { message: String, row: u32, col: u32 },
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::TypeError { .. } => "TypeError",
            RuntimeError::IllegalInstruction { .. } => "IllegalInstruction",
            RuntimeError::StackOverflow { .. } => "StackOverflow",
            RuntimeError::StackUnderflow => "StackUnderflow",
            RuntimeError::ReferenceError { .. } => "ReferenceError",
            RuntimeError::TooFewArguments { .. } => "TooFewArguments",
            RuntimeError::TooManyArguments { .. } => "TooManyArguments",
            RuntimeError::OutputError { .. } => "OutputError",
        }
    }

    /// Source position, for the faults that have one.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            RuntimeError::TypeError { row, col, .. }
            | RuntimeError::StackOverflow { row, col }
            | RuntimeError::ReferenceError { row, col, .. }
            | RuntimeError::TooFewArguments { row, col, .. }
            | RuntimeError::TooManyArguments { row, col, .. }
            | RuntimeError::OutputError { row, col, .. } => Some((*row, *col)),
            RuntimeError::IllegalInstruction { .. } | RuntimeError::StackUnderflow => None,
        }
    }

    pub fn report(&self, file: &str) -> String {
        match self.position() {
            Some((row, col)) => format!("{} at {file}:{row}:{col} {self}", self.kind()),
            None => format!("{} at {file} {self}", self.kind()),
        }
    }

    fn type_error(message: String, at: Value) -> Self {
        RuntimeError::TypeError { message, row: at.row, col: at.col }
    }
}

pub type VmResult<T> = Result<T, RuntimeError>;

struct CallFrame {
    function: ObjRef,
    ip: usize,
    /// Stack index of slot 0 (the callee).
    base: usize,
}

/// Runs a compiled [`Program`], writing `print` output to `out`.
pub struct Vm<'p, W: Write> {
    program: &'p mut Program,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    out: W,
    trace: bool,
}

impl<'p, W: Write> Vm<'p, W> {
    pub fn new(program: &'p mut Program, out: W) -> Self {
        Vm {
            program,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(FRAMES_MAX),
            out,
            trace: false,
        }
    }

    /// Write the stack and each instruction to stderr before executing it.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Execute the top-level function to completion or the first fault.
    pub fn run(&mut self) -> VmResult<Value> {
        self.stack.clear();
        self.frames.clear();
        let script = self.program.script;
        self.push(Value::object(script, 0, 0))?;
        self.frames.push(CallFrame { function: script, ip: 0, base: 0 });
        let result = self.execute();
        if result.is_err() {
            self.frames.clear();
        }
        result
    }

    // ---- Stack ----

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::StackOverflow { row: value.row, col: value.col });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn peek(&self, distance: usize) -> VmResult<Value> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .map(|i| self.stack[i])
            .ok_or(RuntimeError::StackUnderflow)
    }

    // ---- Fetch ----

    fn frame(&self) -> VmResult<&CallFrame> {
        self.frames.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn read_byte(&mut self) -> VmResult<u8> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(RuntimeError::StackUnderflow);
        };
        let byte = self
            .program
            .heap
            .function(frame.function)
            .and_then(|f| f.chunk.code.get(frame.ip).copied());
        match byte {
            Some(byte) => {
                frame.ip += 1;
                Ok(byte)
            }
            // Ran off the end of the chunk.
            None => Err(RuntimeError::IllegalInstruction { op: 0xff, offset: frame.ip }),
        }
    }

    fn read_u16(&mut self) -> VmResult<u16> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_constant(&mut self) -> VmResult<Value> {
        let index = self.read_byte()? as usize;
        let frame = self.frame()?;
        self.program
            .heap
            .function(frame.function)
            .and_then(|f| f.chunk.constants.get(index).copied())
            .ok_or(RuntimeError::IllegalInstruction { op: OP_CONSTANT, offset: frame.ip - 2 })
    }

    /// A name constant and its table key.
    fn read_name(&mut self) -> VmResult<(Value, StrRef)> {
        let name = self.read_constant()?;
        let key = name.as_object().and_then(|r| self.program.heap.str_ref(r));
        match key {
            Some(key) => Ok((name, key)),
            None => {
                let offset = self.frame()?.ip - 2;
                Err(RuntimeError::IllegalInstruction { op: OP_GET_GLOBAL, offset })
            }
        }
    }

    fn jump_to(&mut self, target: usize) -> VmResult<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(RuntimeError::StackUnderflow);
        };
        frame.ip = target;
        Ok(())
    }

    // ---- Execution ----

    fn execute(&mut self) -> VmResult<Value> {
        loop {
            if self.trace {
                self.trace_instruction();
            }
            let op = self.read_byte()?;
            match op {
                OP_CONSTANT => {
                    let value = self.read_constant()?;
                    self.push(value)?;
                }
                OP_ADD => self.add()?,
                OP_SUBTRACT | OP_MULTIPLY | OP_DIVIDE | OP_MOD | OP_BITWISE_AND | OP_BITWISE_OR
                | OP_LEFT_SHIFT | OP_RIGHT_SHIFT => self.arithmetic(op)?,
                OP_NEGATE => {
                    let v = self.pop()?;
                    let n = self.number_operand(v)?;
                    self.push(Value::number(-n, v.row, v.col))?;
                }
                OP_BITWISE_NOT => {
                    let v = self.pop()?;
                    let n = self.number_operand(v)?;
                    self.push(Value::number(!(n as i64) as f64, v.row, v.col))?;
                }
                OP_NOT => {
                    let v = self.pop()?;
                    let result = v.is_falsey(&self.program.heap);
                    self.push(Value::boolean(result, v.row, v.col))?;
                }
                OP_EQUAL | OP_NOT_EQUAL | OP_LT | OP_LTE | OP_GT | OP_GTE => self.compare(op)?,
                OP_PRINT => {
                    let v = self.pop()?;
                    let text = v.display(&self.program.heap);
                    writeln!(self.out, "{text}").map_err(|e| RuntimeError::OutputError {
                        message: e.to_string(),
                        row: v.row,
                        col: v.col,
                    })?;
                }
                OP_POP => {
                    self.pop()?;
                }
                OP_DUP => {
                    let v = self.peek(0)?;
                    self.push(v)?;
                }
                OP_DEFINE_GLOBAL => {
                    let (_, key) = self.read_name()?;
                    let value = self.peek(0)?;
                    self.program.globals.set(key, Global::Plain(value));
                    self.pop()?;
                }
                OP_GET_GLOBAL => {
                    let (name, key) = self.read_name()?;
                    let value = match self.program.globals.get(key) {
                        Some(global) => global.value(),
                        None => return Err(self.not_defined(name)),
                    };
                    self.push(value.at(name.row, name.col))?;
                }
                OP_SET_GLOBAL => {
                    let (name, key) = self.read_name()?;
                    let value = self.peek(0)?;
                    if self.program.globals.set(key, Global::Plain(value)) {
                        self.program.globals.remove(key);
                        return Err(self.not_defined(name));
                    }
                }
                OP_GET_LOCAL => {
                    let slot = self.read_byte()? as usize;
                    let name = self.read_constant()?;
                    let index = self.frame()?.base + slot;
                    let value = self.stack.get(index).copied().ok_or(RuntimeError::StackUnderflow)?;
                    self.push(value.at(name.row, name.col))?;
                }
                OP_SET_LOCAL => {
                    let slot = self.read_byte()? as usize;
                    let index = self.frame()?.base + slot;
                    let value = self.peek(0)?;
                    match self.stack.get_mut(index) {
                        Some(dest) => *dest = value,
                        None => return Err(RuntimeError::StackUnderflow),
                    }
                }
                OP_JMP => {
                    let target = self.read_u16()?;
                    self.jump_to(target as usize)?;
                }
                OP_JMP_IF_FALSE => {
                    let target = self.read_u16()?;
                    if self.peek(0)?.is_falsey(&self.program.heap) {
                        self.jump_to(target as usize)?;
                    }
                }
                OP_LOOP => {
                    let offset = self.read_u16()? as usize;
                    let ip = self.frame()?.ip;
                    let target = ip
                        .checked_sub(offset)
                        .ok_or(RuntimeError::IllegalInstruction { op, offset: ip - 3 })?;
                    self.jump_to(target)?;
                }
                OP_CALL => {
                    let argc = self.read_byte()? as usize;
                    let callee = self.peek(argc)?;
                    self.call_value(callee, argc)?;
                }
                OP_RETURN => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
                    self.stack.truncate(frame.base);
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }
                _ => {
                    let offset = self.frame()?.ip - 1;
                    return Err(RuntimeError::IllegalInstruction { op, offset });
                }
            }
        }
    }

    fn not_defined(&self, name: Value) -> RuntimeError {
        let chars = name.as_object().map(|r| self.program.heap.chars(r)).unwrap_or("");
        RuntimeError::ReferenceError { message: format!("'{chars}' is not defined"), row: name.row, col: name.col }
    }

    fn operand_error(&self, v: Value) -> RuntimeError {
        RuntimeError::type_error(
            format!("Operand must be a type of Number.But given type is \"{}\"", v.type_name(&self.program.heap)),
            v,
        )
    }

    fn number_operand(&self, v: Value) -> VmResult<f64> {
        v.as_number().ok_or_else(|| self.operand_error(v))
    }

    fn number_operands(&self, a: Value, b: Value) -> VmResult<(f64, f64)> {
        Ok((self.number_operand(a)?, self.number_operand(b)?))
    }

    fn add(&mut self) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let heap = &self.program.heap;
        let strings = a.as_object().and_then(|r| heap.string(r)).zip(b.as_object().and_then(|r| heap.string(r)));
        if let Some((x, y)) = strings {
            let joined = format!("{}{}", x.chars, y.chars);
            let s = self.program.heap.alloc_string(joined);
            return self.push(Value::object(s.handle, a.row, a.col));
        }
        let (x, y) = self.number_operands(a, b)?;
        self.push(Value::number(x + y, a.row, a.col))
    }

    fn arithmetic(&mut self, op: u8) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (x, y) = self.number_operands(a, b)?;
        let (i, j) = (x as i64, y as i64);
        let result = match op {
            OP_SUBTRACT => x - y,
            OP_MULTIPLY => x * y,
            OP_DIVIDE => x / y,
            OP_MOD => {
                if j == 0 {
                    return Err(RuntimeError::type_error("Integer modulo by zero".to_string(), b));
                }
                i.wrapping_rem(j) as f64
            }
            OP_BITWISE_AND => (i & j) as f64,
            OP_BITWISE_OR => (i | j) as f64,
            OP_LEFT_SHIFT => i.wrapping_shl(j as u32) as f64,
            OP_RIGHT_SHIFT => i.wrapping_shr(j as u32) as f64,
            _ => {
                let offset = self.frame()?.ip - 1;
                return Err(RuntimeError::IllegalInstruction { op, offset });
            }
        };
        self.push(Value::number(result, a.row, a.col))
    }

    fn compare(&mut self, op: u8) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = match op {
            OP_EQUAL => values_equal(a, b),
            OP_NOT_EQUAL => !values_equal(a, b),
            _ => match ordering(a, b) {
                Some(ord) => match op {
                    OP_LT => ord == Ordering::Less,
                    OP_LTE => ord != Ordering::Greater,
                    OP_GT => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
                None => false,
            },
        };
        self.push(Value::boolean(result, a.row, a.col))
    }

    fn call_value(&mut self, callee: Value, argc: usize) -> VmResult<()> {
        let Some(r) = callee.as_object() else {
            return Err(self.not_callable(callee));
        };
        let base = self.stack.len() - argc - 1;

        if let Some(arity) = self.program.heap.function(r).map(|f| f.arity) {
            self.check_arity(r, arity, argc, callee)?;
            if self.frames.len() >= FRAMES_MAX {
                return Err(RuntimeError::StackOverflow { row: callee.row, col: callee.col });
            }
            self.frames.push(CallFrame { function: r, ip: 0, base });
            return Ok(());
        }

        if let Some((function, arity)) = self.program.heap.native(r).map(|n| (n.function, n.arity)) {
            self.check_arity(r, arity, argc, callee)?;
            let result = function(&mut self.program.heap, &self.stack[base + 1..])?;
            self.stack.truncate(base);
            return self.push(result.at(callee.row, callee.col));
        }

        Err(self.not_callable(callee))
    }

    fn not_callable(&self, callee: Value) -> RuntimeError {
        RuntimeError::type_error(
            format!("Can only call functions. But given type is \"{}\"", callee.type_name(&self.program.heap)),
            callee,
        )
    }

    fn check_arity(&self, callee: ObjRef, arity: usize, got: usize, at: Value) -> VmResult<()> {
        let name = || self.program.heap.callable_name(callee).to_string();
        match got.cmp(&arity) {
            Ordering::Equal => Ok(()),
            Ordering::Less => Err(RuntimeError::TooFewArguments { name: name(), arity, got, row: at.row, col: at.col }),
            Ordering::Greater => Err(RuntimeError::TooManyArguments { name: name(), arity, got, row: at.row, col: at.col }),
        }
    }

    fn trace_instruction(&self) {
        let heap = &self.program.heap;
        let stack: Vec<String> = self.stack.iter().map(|v| format!("[ {} ]", v.display(heap))).collect();
        eprintln!("          {}", stack.join(""));
        if let Some(frame) = self.frames.last() {
            if let Some(function) = heap.function(frame.function) {
                if frame.ip < function.chunk.len() {
                    eprintln!("{}", function.chunk.disassemble_instruction(frame.ip).0);
                }
            }
        }
    }
}

/// Ordering for `<`-style comparisons. `None` means the operands are
/// unordered, which makes every comparison false.
fn ordering(a: Value, b: Value) -> Option<Ordering> {
    match (a.kind, b.kind) {
        (ValueKind::Number(x), ValueKind::Number(y)) => x.partial_cmp(&y),
        (ValueKind::Bool(x), ValueKind::Bool(y)) => Some(x.cmp(&y)),
        (ValueKind::Null, ValueKind::Null) | (ValueKind::Undefined, ValueKind::Undefined) => Some(Ordering::Equal),
        (ValueKind::Object(x), ValueKind::Object(y)) => Some(x.cmp(&y)),
        _ => None,
    }
}

/// Run `program`, writing output to stdout.
pub fn interpret(program: &mut Program, trace: bool) -> VmResult<Value> {
    let stdout = std::io::stdout();
    Vm::new(program, stdout.lock()).with_trace(trace).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler, lexer, parser};

    fn build(source: &str) -> Program {
        let (ast, errors) = parser::parse(source, lexer::lex(source).unwrap());
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        compiler::compile(&ast).unwrap()
    }

    /// Output and result of running `source`.
    fn run(source: &str) -> (String, VmResult<Value>) {
        let mut program = build(source);
        let mut vm = Vm::new(&mut program, Vec::new());
        let result = vm.run();
        (String::from_utf8(vm.into_output()).unwrap(), result)
    }

    fn output(source: &str) -> String {
        let (out, result) = run(source);
        assert!(result.is_ok(), "runtime error: {result:?}");
        out
    }

    fn error(source: &str) -> RuntimeError {
        run(source).1.unwrap_err()
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_print_stops_the_program() {
        let mut program = build("var n = 0;\nprint 5;\nn = 1;");
        let result = Vm::new(&mut program, ClosedPipe).run();
        let Err(e) = result else { panic!("expected a fault, got {result:?}") };
        assert_eq!(e.kind(), "OutputError");
        assert_eq!(e.position(), Some((2, 7)));
        assert_eq!(e.to_string(), "cannot write output: pipe closed");
        let key = program.heap.find_interned("n").unwrap();
        assert!(matches!(program.globals.get(key), Some(Global::Plain(v)) if v.kind == ValueKind::Number(0.0)));
    }

    #[test]
    fn print_global() {
        assert_eq!(output("var x = 1; print x;"), "1\n");
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(output("print 1 + 2 * 3; print (1 + 2) * 3; print 7 / 2; print -4 + 1;"), "7\n9\n3.5\n-3\n");
    }

    #[test]
    fn integer_operators_truncate() {
        assert_eq!(output("print 7.9 % 3; print 6 & 3; print 6 | 3; print ~0; print 1 << 4; print 256 >> 2;"), "1\n2\n7\n-1\n16\n64\n");
    }

    #[test]
    fn modulo_by_zero() {
        let err = error("print 5 %\n 0;");
        assert_eq!(err, RuntimeError::TypeError { message: "Integer modulo by zero".to_string(), row: 2, col: 2 });
    }

    #[test]
    fn concatenation_allocates_a_fresh_string() {
        assert_eq!(output("print \"a\" + \"b\";"), "ab\n");
        assert_eq!(output("print (\"a\" + \"b\") == \"ab\";"), "false\n");
        assert_eq!(output("print \"ab\" == \"ab\";"), "true\n");
        assert_eq!(output("var s = \"a\" + \"b\"; print s == s;"), "true\n");
    }

    #[test]
    fn adding_number_and_string_reports_the_string() {
        let err = error("print 1 + \"a\";");
        assert_eq!(
            err,
            RuntimeError::TypeError {
                message: "Operand must be a type of Number.But given type is \"String\"".to_string(),
                row: 1,
                col: 11,
            }
        );
        assert_eq!(err.report("x.cn"), "TypeError at x.cn:1:11 Operand must be a type of Number.But given type is \"String\"");
    }

    #[test]
    fn negate_requires_a_number() {
        assert!(matches!(error("print -true;"), RuntimeError::TypeError { row: 1, col: 8, .. }));
    }

    #[test]
    fn comparisons_never_fault() {
        assert_eq!(output("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 3;"), "true\ntrue\nfalse\ntrue\n");
        assert_eq!(output("print 1 == \"1\"; print 1 != \"1\"; print 1 < \"2\"; print null >= null;"), "false\ntrue\nfalse\ntrue\n");
        assert_eq!(output("print false < true; print null < null;"), "true\nfalse\n");
    }

    #[test]
    fn falsey_values() {
        assert_eq!(output("print !0; print !\"\"; print !null; print !\"x\"; print !-1;"), "true\ntrue\ntrue\nfalse\nfalse\n");
    }

    #[test]
    fn logical_operators_short_circuit() {
        let source = "function boom() { return 1 + \"x\"; } print 0 && boom(); print 1 || boom();";
        assert_eq!(output(source), "0\n1\n");
    }

    #[test]
    fn logical_operators_yield_operands() {
        assert_eq!(output("print 1 && 2; print null || \"x\"; print 0 || 0;"), "2\nx\n0\n");
    }

    #[test]
    fn for_loop_counts() {
        assert_eq!(output("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
    }

    #[test]
    fn while_with_break_and_continue() {
        let source = "
            var i = 0;
            while (i < 10) {
                i = i + 1;
                if (i % 2 == 0) continue;
                if (i > 7) break;
                print i;
            }
            print i;";
        assert_eq!(output(source), "1\n3\n5\n7\n9\n");
    }

    #[test]
    fn continue_in_for_runs_the_step() {
        let source = "for (var i = 0; i < 5; i++) { var sq = i * i; if (sq == 4) continue; print sq; }";
        assert_eq!(output(source), "0\n1\n9\n16\n");
    }

    #[test]
    fn break_leaves_only_the_innermost_loop() {
        let source = "
            for (var i = 0; i < 3; i++) {
                for (var j = 0; j < 3; j++) {
                    if (j == 1) break;
                    print i * 10 + j;
                }
            }";
        assert_eq!(output(source), "0\n10\n20\n");
    }

    #[test]
    fn locals_stay_aligned_after_blocks() {
        let source = "{ var a = 1; { var b = 2; b; print a + b; } var c = 3; print a + c; }";
        assert_eq!(output(source), "3\n4\n");
    }

    #[test]
    fn increments() {
        let source = "var i = 5; print i++; print i; print ++i; print --i; { var j = 1; j--; print j; }";
        assert_eq!(output(source), "5\n6\n7\n6\n0\n");
    }

    #[test]
    fn ternary_and_sequence() {
        assert_eq!(output("print 1 ? \"yes\" : \"no\"; print 0 ? 1 : 2; print (1, 2, 3);"), "yes\n2\n3\n");
    }

    #[test]
    fn functions_and_recursion() {
        let source = "
            function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            print fib(15);";
        assert_eq!(output(source), "610\n");
    }

    #[test]
    fn function_without_return_yields_null() {
        assert_eq!(output("function f() { var a = 1; } print f();"), "null\n");
    }

    #[test]
    fn printing_callables() {
        assert_eq!(output("function f() {} print f; print len;"), "<fn f>\n<native len>\n");
    }

    #[test]
    fn too_many_arguments_at_runtime() {
        let err = error("function f(a) { return a; } var g = f; g(1, 2, 3);");
        assert_eq!(
            err,
            RuntimeError::TooManyArguments { name: "f".to_string(), arity: 1, got: 3, row: 1, col: 40 }
        );
    }

    #[test]
    fn too_few_arguments_at_runtime() {
        let err = error("function f(a, b) { return a; } var g = f; g(1);");
        assert!(matches!(err, RuntimeError::TooFewArguments { arity: 2, got: 1, .. }));
        assert_eq!(err.kind(), "TooFewArguments");
    }

    #[test]
    fn calling_a_non_function() {
        let err = error("var x = 3; x();");
        assert_eq!(
            err,
            RuntimeError::TypeError {
                message: "Can only call functions. But given type is \"Number\"".to_string(),
                row: 1,
                col: 12,
            }
        );
    }

    #[test]
    fn runaway_recursion_overflows() {
        let err = error("function f() { return f(); } f();");
        assert!(matches!(err, RuntimeError::StackOverflow { .. }));
    }

    #[test]
    fn natives() {
        assert_eq!(output("print len(\"hello\"); print typeof(1); print to_string(0.1 + 0.2);"), "5\nNumber\n0.3\n");
        assert_eq!(output("print clock() > 0;"), "true\n");
    }

    #[test]
    fn native_errors_propagate() {
        let err = error("print len(42);");
        assert_eq!(err.report("n.cn"), "TypeError at n.cn:1:11 Function len expect \"String\". But given type is \"Number\"");
    }

    #[test]
    fn shadowed_native() {
        assert_eq!(output("function len(s) { return 99; } print len(\"abc\");"), "99\n");
    }

    #[test]
    fn script_result_is_null() {
        let (_, result) = run("print 1;");
        assert!(matches!(result.unwrap().kind, ValueKind::Null));
    }

    #[test]
    fn illegal_instruction() {
        let mut program = build("print 1;");
        let script = program.script;
        if let Some(f) = program.heap.function_mut(script) {
            f.chunk.code = vec![0xEE];
        }
        let err = Vm::new(&mut program, Vec::new()).run().unwrap_err();
        assert_eq!(err, RuntimeError::IllegalInstruction { op: 0xEE, offset: 0 });
        assert_eq!(err.report("i.cn"), "IllegalInstruction at i.cn illegal instruction 238 at offset 0");
    }

    #[test]
    fn set_global_on_missing_key() {
        let mut program = build("var x = 1;");
        // Remove the global behind the compiler's back.
        let key = program.heap.find_interned("x").unwrap();
        program.globals.remove(key);
        let script = program.script;
        if let Some(f) = program.heap.function_mut(script) {
            // CONSTANT 0 (1); SET_GLOBAL 1 ("x"); RETURN
            f.chunk.code = vec![OP_CONSTANT, 0, OP_SET_GLOBAL, 1, OP_RETURN];
        }
        let err = Vm::new(&mut program, Vec::new()).run().unwrap_err();
        assert_eq!(err, RuntimeError::ReferenceError { message: "'x' is not defined".to_string(), row: 1, col: 5 });
        assert!(program.globals.get(key).is_none());
    }
}
