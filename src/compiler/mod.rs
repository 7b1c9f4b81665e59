use crate::ast::{self, BinaryOp, Expr, LogicalOp, Param, Pos, StepOp, Stmt, UnaryOp};
use crate::vm::chunk::*;
use crate::vm::native;
use crate::vm::object::{Heap, ObjFunction, ObjRef};
use crate::vm::table::Table;
use crate::vm::value::{Global, Value};

/// Slot indices are one byte, slot 0 included.
const MAX_LOCALS: usize = 256;
const MAX_PARAMS: usize = 255;
const MAX_ARGS: usize = 255;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("'{name}' is already declared at {previous_row}:{previous_col}")]
    Redeclaration { name: String, row: u32, col: u32, previous_row: u32, previous_col: u32 },
    #[error("'{name}' is not defined")]
    Undefined { name: String, row: u32, col: u32 },
    #[error("cannot read variable '{name}' in its own initialization.")]
    SelfInitialization { name: String, row: u32, col: u32 },
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters { row: u32, col: u32 },
    #[error("Function '{name}' can't have more then 255 arguments")]
    TooManyArguments { name: String, row: u32, col: u32 },
    #[error("Function '{name}' expected {expected} arguments but got {got} arguments")]
    ArityMismatch { name: String, expected: usize, got: usize, row: u32, col: u32 },
    #[error("can't have return from top-level code.")]
    TopLevelReturn { row: u32, col: u32 },
    #[error("'break' or 'continue' statement used outside of a loop.")]
    OutsideLoop { row: u32, col: u32 },
    #[error("Too many local variables in function.")]
    TooManyLocals { row: u32, col: u32 },
    #[error("Too many constants in one chunk.")]
    TooManyConstants { row: u32, col: u32 },
    #[error("Loop body too large.")]
    LoopTooLarge { row: u32, col: u32 },
    #[error("Too much code to jump over.")]
    JumpTooLarge { row: u32, col: u32 },
}

impl CompileError {
    pub fn position(&self) -> (u32, u32) {
        match self {
            CompileError::Redeclaration { row, col, .. }
            | CompileError::Undefined { row, col, .. }
            | CompileError::SelfInitialization { row, col, .. }
            | CompileError::TooManyParameters { row, col }
            | CompileError::TooManyArguments { row, col, .. }
            | CompileError::ArityMismatch { row, col, .. }
            | CompileError::TopLevelReturn { row, col }
            | CompileError::OutsideLoop { row, col }
            | CompileError::TooManyLocals { row, col }
            | CompileError::TooManyConstants { row, col }
            | CompileError::LoopTooLarge { row, col }
            | CompileError::JumpTooLarge { row, col } => (*row, *col),
        }
    }

    /// Message text with any cited position qualified by `file`.
    pub fn message(&self, file: &str) -> String {
        match self {
            CompileError::Redeclaration { name, previous_row, previous_col, .. } => {
                format!("'{name}' is already declared at {file}:{previous_row}:{previous_col}")
            }
            other => other.to_string(),
        }
    }

    pub fn report(&self, file: &str) -> String {
        let (row, col) = self.position();
        format!("CompileError at {file}:{row}:{col} {}", self.message(file))
    }
}

pub type CompileResult<T> = Result<T, Vec<CompileError>>;

/// Everything the VM needs: the objects the compiler allocated, the
/// globals it declared and the top-level function to start from.
#[derive(Debug)]
pub struct Program {
    pub heap: Heap,
    pub globals: Table<Global>,
    pub script: ObjRef,
}

impl Program {
    /// `.data`/`.text` listing of every function.
    pub fn dump(&self) -> String {
        dump_program(&self.heap, self.script)
    }
}

struct Local {
    name: String,
    pos: Pos,
    /// `-1` while the initializer is being compiled.
    depth: i32,
}

/// Pending jumps of one enclosing loop.
struct LoopContext {
    /// Scope depth outside the loop body; deeper locals are popped on exit.
    depth: i32,
    /// The loop statement, blamed for jumps that overflow.
    pos: Pos,
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

struct FunctionState {
    kind: FunctionKind,
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: i32,
    loops: Vec<LoopContext>,
    /// Set once the constant pool has overflowed and been reported.
    constants_full: bool,
}

impl FunctionState {
    /// Slot 0 holds the callee, so it is reserved under `slot_zero`.
    fn new(kind: FunctionKind, slot_zero: &str, pos: Pos) -> Self {
        FunctionState {
            kind,
            chunk: Chunk::new(),
            locals: vec![Local { name: slot_zero.to_string(), pos, depth: 0 }],
            scope_depth: 0,
            loops: Vec::new(),
            constants_full: false,
        }
    }
}

enum Resolved {
    Slot(u8),
    Uninitialized,
    Global,
}

struct Compiler<'a> {
    heap: &'a mut Heap,
    globals: &'a mut Table<Global>,
    state: FunctionState,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    fn new(heap: &'a mut Heap, globals: &'a mut Table<Global>) -> Self {
        Compiler {
            heap,
            globals,
            state: FunctionState::new(FunctionKind::Script, "", Pos::default()),
            errors: Vec::new(),
        }
    }

    fn fault(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    // ---- Emission ----

    fn emit(&mut self, byte: u8) -> usize {
        self.state.chunk.write(byte)
    }

    fn emit_op(&mut self, op: u8, operand: u8) {
        self.emit(op);
        self.emit(operand);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.state.chunk.add_constant(value) {
            Some(index) => index,
            None => {
                if !self.state.constants_full {
                    self.state.constants_full = true;
                    self.fault(CompileError::TooManyConstants { row: value.row, col: value.col });
                }
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op(OP_CONSTANT, index);
    }

    /// An interned name as a constant, positioned where it was written.
    fn name_constant(&mut self, name: &str, pos: Pos) -> u8 {
        let key = self.heap.intern(name);
        self.make_constant(Value::object(key.handle, pos.row, pos.col))
    }

    /// Emit a jump with a placeholder target; returns the operand offset.
    fn emit_jump(&mut self, op: u8) -> usize {
        self.emit(op);
        let at = self.emit(0xff);
        self.emit(0xff);
        at
    }

    /// Point the jump at `at` to the current end of code. `pos` is the
    /// construct that owns the jump.
    fn patch_jump(&mut self, at: usize, pos: Pos) {
        let target = self.state.chunk.len();
        self.patch_jump_to(at, target, pos);
    }

    fn patch_jump_to(&mut self, at: usize, target: usize, pos: Pos) {
        match u16::try_from(target) {
            Ok(target) => self.state.chunk.patch_u16(at, target),
            Err(_) => self.fault(CompileError::JumpTooLarge { row: pos.row, col: pos.col }),
        }
    }

    fn emit_loop(&mut self, loop_start: usize, pos: Pos) {
        self.emit(OP_LOOP);
        // Distance back from the end of the operand.
        let offset = self.state.chunk.len() - loop_start + 2;
        let offset = match u16::try_from(offset) {
            Ok(offset) => offset,
            Err(_) => {
                self.fault(CompileError::LoopTooLarge { row: pos.row, col: pos.col });
                0
            }
        };
        let [hi, lo] = offset.to_be_bytes();
        self.emit(hi);
        self.emit(lo);
    }

    // ---- Scopes and variables ----

    fn begin_scope(&mut self) {
        self.state.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.state.scope_depth -= 1;
        while self.state.locals.last().is_some_and(|l| l.depth > self.state.scope_depth) {
            self.emit(OP_POP);
            self.state.locals.pop();
        }
    }

    /// Add an uninitialized local in the current scope.
    fn declare_local(&mut self, name: &str, pos: Pos) -> bool {
        let depth = self.state.scope_depth;
        let previous = self
            .state
            .locals
            .iter()
            .rev()
            .take_while(|l| l.depth == -1 || l.depth >= depth)
            .find(|l| l.name == name)
            .map(|l| l.pos);
        if let Some(previous) = previous {
            self.fault(CompileError::Redeclaration {
                name: name.to_string(),
                row: pos.row,
                col: pos.col,
                previous_row: previous.row,
                previous_col: previous.col,
            });
            return false;
        }
        if self.state.locals.len() >= MAX_LOCALS {
            self.fault(CompileError::TooManyLocals { row: pos.row, col: pos.col });
            return false;
        }
        self.state.locals.push(Local { name: name.to_string(), pos, depth: -1 });
        true
    }

    fn mark_initialized(&mut self) {
        if let Some(local) = self.state.locals.last_mut() {
            local.depth = self.state.scope_depth;
        }
    }

    fn resolve_local(&self, name: &str) -> Resolved {
        match self.state.locals.iter().rposition(|l| l.name == name) {
            Some(slot) if self.state.locals[slot].depth == -1 => Resolved::Uninitialized,
            Some(slot) => Resolved::Slot(slot as u8),
            None => Resolved::Global,
        }
    }

    fn self_initialization(&mut self, name: &str, pos: Pos) {
        self.fault(CompileError::SelfInitialization { name: name.to_string(), row: pos.row, col: pos.col });
    }

    fn undefined(&mut self, name: &str, pos: Pos) {
        self.fault(CompileError::Undefined { name: name.to_string(), row: pos.row, col: pos.col });
    }

    fn read_variable(&mut self, name: &str, pos: Pos) {
        match self.resolve_local(name) {
            Resolved::Slot(slot) => {
                let constant = self.name_constant(name, pos);
                self.emit_op(OP_GET_LOCAL, slot);
                self.emit(constant);
            }
            Resolved::Uninitialized => self.self_initialization(name, pos),
            Resolved::Global => {
                let key = self.heap.intern(name);
                match self.globals.get(key).copied() {
                    None => return self.undefined(name, pos),
                    Some(Global::Plain(v)) if v.is_undefined() => return self.self_initialization(name, pos),
                    Some(_) => {}
                }
                let constant = self.make_constant(Value::object(key.handle, pos.row, pos.col));
                self.emit_op(OP_GET_GLOBAL, constant);
            }
        }
    }

    fn write_variable(&mut self, name: &str, pos: Pos) {
        match self.resolve_local(name) {
            Resolved::Slot(slot) => self.emit_op(OP_SET_LOCAL, slot),
            Resolved::Uninitialized => self.self_initialization(name, pos),
            Resolved::Global => {
                let key = self.heap.intern(name);
                if self.globals.get(key).is_none() {
                    return self.undefined(name, pos);
                }
                let constant = self.make_constant(Value::object(key.handle, pos.row, pos.col));
                self.emit_op(OP_SET_GLOBAL, constant);
            }
        }
    }

    // ---- Statements ----

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) => {
                self.expression(expr);
                self.emit(OP_POP);
            }
            Stmt::Print { value, .. } => {
                self.expression(value);
                self.emit(OP_PRINT);
            }
            Stmt::Var { name, init, pos } => self.var_declaration(name, init.as_ref(), *pos),
            Stmt::Function { name, params, body, pos } => self.function_declaration(name, params, body, *pos),
            Stmt::If { condition, then, otherwise, pos } => {
                self.expression(condition);
                let else_jump = self.emit_jump(OP_JMP_IF_FALSE);
                self.emit(OP_POP);
                self.statement(then);
                let end_jump = self.emit_jump(OP_JMP);
                self.patch_jump(else_jump, *pos);
                self.emit(OP_POP);
                if let Some(otherwise) = otherwise {
                    self.statement(otherwise);
                }
                self.patch_jump(end_jump, *pos);
            }
            Stmt::While { condition, body, pos } => self.while_statement(condition, body, *pos),
            Stmt::For { init, condition, step, body, pos } => {
                self.for_statement(init.as_deref(), condition.as_ref(), step.as_ref(), body, *pos)
            }
            Stmt::Block { body, .. } => {
                self.begin_scope();
                for stmt in body {
                    self.statement(stmt);
                }
                self.end_scope();
            }
            Stmt::Return { value, pos } => {
                if self.state.kind == FunctionKind::Script {
                    return self.fault(CompileError::TopLevelReturn { row: pos.row, col: pos.col });
                }
                match value {
                    Some(value) => self.expression(value),
                    None => self.emit_constant(Value::null(pos.row, pos.col)),
                }
                self.emit(OP_RETURN);
            }
            Stmt::Break { pos } => self.loop_exit(true, *pos),
            Stmt::Continue { pos } => self.loop_exit(false, *pos),
        }
    }

    fn var_declaration(&mut self, name: &str, init: Option<&Expr>, pos: Pos) {
        if self.state.scope_depth > 0 {
            if !self.declare_local(name, pos) {
                return;
            }
            match init {
                Some(init) => self.expression(init),
                None => self.emit_constant(Value::null(pos.row, pos.col)),
            }
            self.mark_initialized();
            let slot = (self.state.locals.len() - 1) as u8;
            self.emit_op(OP_SET_LOCAL, slot);
            return;
        }

        let key = self.heap.intern(name);
        match self.globals.get(key).copied() {
            None | Some(Global::Native(_)) => {}
            Some(existing) => {
                let (previous_row, previous_col) = existing.position();
                self.fault(CompileError::Redeclaration {
                    name: name.to_string(),
                    row: pos.row,
                    col: pos.col,
                    previous_row,
                    previous_col,
                });
            }
        }
        // Visible but unreadable until the initializer is done.
        self.globals.set(key, Global::Plain(Value::undefined(pos.row, pos.col)));
        match init {
            Some(init) => self.expression(init),
            None => self.emit_constant(Value::null(pos.row, pos.col)),
        }
        let constant = self.make_constant(Value::object(key.handle, pos.row, pos.col));
        self.emit_op(OP_DEFINE_GLOBAL, constant);
        self.globals.set(key, Global::Plain(Value::null(pos.row, pos.col)));
    }

    fn function_declaration(&mut self, name: &str, params: &[Param], body: &[Stmt], pos: Pos) {
        let key = self.heap.intern(name);
        match self.globals.get(key).copied() {
            None | Some(Global::Native(_)) => {}
            Some(existing) => {
                let (previous_row, previous_col) = existing.position();
                self.fault(CompileError::Redeclaration {
                    name: name.to_string(),
                    row: pos.row,
                    col: pos.col,
                    previous_row,
                    previous_col,
                });
            }
        }
        if params.len() > MAX_PARAMS {
            self.fault(CompileError::TooManyParameters { row: pos.row, col: pos.col });
        }

        // Published before the body so recursive calls resolve.
        let function = self.heap.alloc_function(ObjFunction { arity: params.len(), chunk: Chunk::new(), name: Some(key) });
        self.globals.set(key, Global::Script { function, row: pos.row, col: pos.col });

        let enclosing = std::mem::replace(&mut self.state, FunctionState::new(FunctionKind::Function, name, pos));
        self.begin_scope();
        for param in params {
            if self.declare_local(&param.name, param.pos) {
                self.mark_initialized();
            }
        }
        for stmt in body {
            self.statement(stmt);
        }
        if !matches!(body.last(), Some(Stmt::Return { .. })) {
            self.emit_constant(Value::null(pos.row, pos.col));
            self.emit(OP_RETURN);
        }
        let state = std::mem::replace(&mut self.state, enclosing);

        if let Some(f) = self.heap.function_mut(function) {
            f.chunk = state.chunk;
        }
    }

    fn while_statement(&mut self, condition: &Expr, body: &Stmt, pos: Pos) {
        let loop_start = self.state.chunk.len();
        self.expression(condition);
        let exit = self.emit_jump(OP_JMP_IF_FALSE);
        self.emit(OP_POP);

        self.enter_loop(pos);
        self.statement(body);
        self.emit_loop(loop_start, pos);

        self.patch_jump(exit, pos);
        self.emit(OP_POP);
        self.exit_loop(loop_start);
    }

    fn for_statement(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
        pos: Pos,
    ) {
        self.begin_scope();
        if let Some(init) = init {
            self.statement(init);
        }

        let loop_start = self.state.chunk.len();
        let exit = match condition {
            Some(condition) => {
                self.expression(condition);
                let exit = self.emit_jump(OP_JMP_IF_FALSE);
                self.emit(OP_POP);
                Some(exit)
            }
            None => None,
        };

        self.enter_loop(pos);
        self.statement(body);

        let continue_target = self.state.chunk.len();
        if let Some(step) = step {
            self.expression(step);
            self.emit(OP_POP);
        }
        self.emit_loop(loop_start, pos);

        if let Some(exit) = exit {
            self.patch_jump(exit, pos);
            self.emit(OP_POP);
        }
        self.exit_loop(continue_target);
        self.end_scope();
    }

    fn enter_loop(&mut self, pos: Pos) {
        let depth = self.state.scope_depth;
        self.state.loops.push(LoopContext { depth, pos, breaks: Vec::new(), continues: Vec::new() });
    }

    /// Land pending breaks here and pending continues on `continue_target`.
    fn exit_loop(&mut self, continue_target: usize) {
        let Some(context) = self.state.loops.pop() else { return };
        let exit = self.state.chunk.len();
        for at in context.breaks {
            self.patch_jump_to(at, exit, context.pos);
        }
        for at in context.continues {
            self.patch_jump_to(at, continue_target, context.pos);
        }
    }

    fn loop_exit(&mut self, is_break: bool, pos: Pos) {
        let Some(depth) = self.state.loops.last().map(|l| l.depth) else {
            return self.fault(CompileError::OutsideLoop { row: pos.row, col: pos.col });
        };
        // Locals of the body stay declared; only the stack is unwound.
        let inner = self.state.locals.iter().rev().take_while(|l| l.depth > depth).count();
        for _ in 0..inner {
            self.emit(OP_POP);
        }
        let jump = self.emit_jump(OP_JMP);
        if let Some(context) = self.state.loops.last_mut() {
            if is_break {
                context.breaks.push(jump);
            } else {
                context.continues.push(jump);
            }
        }
    }

    // ---- Expressions ----

    fn expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Number { value, pos } => self.emit_constant(Value::number(*value, pos.row, pos.col)),
            Expr::String { value, pos } => {
                let s = self.heap.intern(value);
                self.emit_constant(Value::object(s.handle, pos.row, pos.col));
            }
            Expr::Bool { value, pos } => self.emit_constant(Value::boolean(*value, pos.row, pos.col)),
            Expr::Null { pos } => self.emit_constant(Value::null(pos.row, pos.col)),
            Expr::Id { name, pos } => self.read_variable(name, *pos),
            Expr::Group { inner, .. } => self.expression(inner),
            Expr::Binary { op, left, right, .. } => {
                self.expression(left);
                self.expression(right);
                self.emit(binary_opcode(*op));
            }
            Expr::Logical { op: LogicalOp::And, left, right, pos } => {
                self.expression(left);
                let end = self.emit_jump(OP_JMP_IF_FALSE);
                self.emit(OP_POP);
                self.expression(right);
                self.patch_jump(end, *pos);
            }
            Expr::Logical { op: LogicalOp::Or, left, right, pos } => {
                self.expression(left);
                let else_jump = self.emit_jump(OP_JMP_IF_FALSE);
                let end = self.emit_jump(OP_JMP);
                self.patch_jump(else_jump, *pos);
                self.emit(OP_POP);
                self.expression(right);
                self.patch_jump(end, *pos);
            }
            Expr::Assign { name, target, value, .. } => {
                self.expression(value);
                self.write_variable(name, *target);
            }
            Expr::Unary { op, operand, .. } => {
                self.expression(operand);
                self.emit(match op {
                    UnaryOp::Negate => OP_NEGATE,
                    UnaryOp::Not => OP_NOT,
                    UnaryOp::BitNot => OP_BITWISE_NOT,
                });
            }
            Expr::Prefix { op, name, target, pos } => {
                self.read_variable(name, *target);
                self.emit_constant(Value::number(1.0, pos.row, pos.col));
                self.emit(step_opcode(*op));
                self.write_variable(name, *target);
            }
            Expr::Postfix { op, name, target, pos } => {
                self.read_variable(name, *target);
                self.emit(OP_DUP);
                self.emit_constant(Value::number(1.0, pos.row, pos.col));
                self.emit(step_opcode(*op));
                self.write_variable(name, *target);
                self.emit(OP_POP);
            }
            Expr::Ternary { condition, then, otherwise, pos } => {
                self.expression(condition);
                let else_jump = self.emit_jump(OP_JMP_IF_FALSE);
                self.emit(OP_POP);
                self.expression(then);
                let end = self.emit_jump(OP_JMP);
                self.patch_jump(else_jump, *pos);
                self.emit(OP_POP);
                self.expression(otherwise);
                self.patch_jump(end, *pos);
            }
            Expr::Sequence { items, .. } => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.emit(OP_POP);
                    }
                    self.expression(item);
                }
            }
            Expr::Call { callee, target, args, .. } => self.call(callee, *target, args),
        }
    }

    fn call(&mut self, callee: &str, pos: Pos, args: &[Expr]) {
        let key = self.heap.intern(callee);
        let arity = match self.globals.get(key).copied() {
            None => return self.undefined(callee, pos),
            Some(Global::Plain(v)) if v.is_undefined() => return self.self_initialization(callee, pos),
            Some(Global::Plain(_)) => None,
            Some(Global::Native(r)) => self.heap.native(r).map(|n| n.arity),
            Some(Global::Script { function, .. }) => self.heap.function(function).map(|f| f.arity),
        };
        if args.len() > MAX_ARGS {
            self.fault(CompileError::TooManyArguments { name: callee.to_string(), row: pos.row, col: pos.col });
        } else {
            match arity {
                Some(expected) if expected != args.len() => self.fault(CompileError::ArityMismatch {
                    name: callee.to_string(),
                    expected,
                    got: args.len(),
                    row: pos.row,
                    col: pos.col,
                }),
                _ => {}
            }
        }

        let constant = self.make_constant(Value::object(key.handle, pos.row, pos.col));
        self.emit_op(OP_GET_GLOBAL, constant);
        for arg in args {
            self.expression(arg);
        }
        self.emit_op(OP_CALL, args.len().min(MAX_ARGS) as u8);
    }

    fn finish(mut self, end: Pos) -> (Chunk, Vec<CompileError>) {
        self.emit_constant(Value::null(end.row, end.col));
        self.emit(OP_RETURN);
        (self.state.chunk, self.errors)
    }
}

fn binary_opcode(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => OP_ADD,
        BinaryOp::Subtract => OP_SUBTRACT,
        BinaryOp::Multiply => OP_MULTIPLY,
        BinaryOp::Divide => OP_DIVIDE,
        BinaryOp::Modulo => OP_MOD,
        BinaryOp::Equal => OP_EQUAL,
        BinaryOp::NotEqual => OP_NOT_EQUAL,
        BinaryOp::Less => OP_LT,
        BinaryOp::LessEqual => OP_LTE,
        BinaryOp::Greater => OP_GT,
        BinaryOp::GreaterEqual => OP_GTE,
        BinaryOp::BitAnd => OP_BITWISE_AND,
        BinaryOp::BitOr => OP_BITWISE_OR,
        BinaryOp::ShiftLeft => OP_LEFT_SHIFT,
        BinaryOp::ShiftRight => OP_RIGHT_SHIFT,
    }
}

fn step_opcode(op: StepOp) -> u8 {
    match op {
        StepOp::Increment => OP_ADD,
        StepOp::Decrement => OP_SUBTRACT,
    }
}

/// Compile a parsed program. Natives are installed first so calls to
/// them are checked like any other declared function.
pub fn compile(program: &ast::Program) -> CompileResult<Program> {
    let mut heap = Heap::new();
    let mut globals = Table::new();
    native::install(&mut heap, &mut globals);
    let script = heap.alloc_function(ObjFunction { arity: 0, chunk: Chunk::new(), name: None });

    let end = program.statements.last().map(Stmt::pos).unwrap_or_default();
    let mut compiler = Compiler::new(&mut heap, &mut globals);
    for stmt in &program.statements {
        compiler.statement(stmt);
    }
    let (chunk, errors) = compiler.finish(end);

    if !errors.is_empty() {
        return Err(errors);
    }
    if let Some(f) = heap.function_mut(script) {
        f.chunk = chunk;
    }
    Ok(Program { heap, globals, script })
}
