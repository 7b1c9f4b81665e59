//! cinder: a small C-like scripting language compiled to bytecode and run on a
//! stack VM.
//!
//! The pipeline is `lexer::lex` → `parser::parse` → `compiler::compile` →
//! `vm::interpret`. Each stage has its own error type, and every one of them
//! converts into a [`diagnostic::Diagnostic`] for rendering.

pub mod ast;
pub mod compiler;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod vm;

pub use compiler::{CompileError, Program, compile};
pub use vm::{RuntimeError, interpret};
