use std::io::Write;
use std::process::{Command, Output};

use regex::Regex;
use tempfile::NamedTempFile;

fn cinder() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cinder"))
}

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(source.as_bytes()).expect("write script");
    file
}

fn run(source: &str, flags: &[&str]) -> Output {
    let file = script(source);
    cinder()
        .args(flags)
        .arg(file.path())
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run cinder")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// --- Running programs ---

#[test]
fn prints_a_global() {
    let out = run("var x = 1; print x;", &[]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "1\n");
}

#[test]
fn for_loop_counts_up() {
    let out = run("for (var i = 0; i < 3; i = i + 1) print i;", &[]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "0\n1\n2\n");
}

#[test]
fn recursion_and_natives() {
    let source = "
function fib(n) {
    if (n < 2) return n;
    return fib(n - 1) + fib(n - 2);
}
print fib(15);
print len(\"cinder\");
print typeof(fib);
";
    let out = run(source, &[]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "610\n6\nObject\n");
}

#[test]
fn concatenated_strings_are_distinct_objects() {
    let out = run("print (\"a\" + \"b\") == \"ab\"; print \"a\" + \"b\";", &[]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "false\nab\n");
}

#[test]
fn empty_file_exits_quietly() {
    let out = run("", &[]);
    assert!(out.status.success());
    assert!(stdout(&out).is_empty());
    assert!(stderr(&out).is_empty());
}

// --- Exit codes and diagnostics ---

#[test]
fn runtime_type_error_exits_70() {
    let out = run("print 1 + \"a\";", &[]);
    assert_eq!(out.status.code(), Some(70));
    let re = Regex::new(r#"(?m)^TypeError at \S+:1:11 Operand must be a type of Number\.But given type is "String"$"#).unwrap();
    assert!(re.is_match(&stderr(&out)), "stderr: {}", stderr(&out));
}

#[test]
fn runtime_error_shows_source_snippet() {
    let out = run("var a = 1;\nprint a + true;", &[]);
    assert_eq!(out.status.code(), Some(70));
    let err = stderr(&out);
    assert!(err.contains("--> 2:11"), "stderr: {err}");
    assert!(err.contains("print a + true;"), "stderr: {err}");
    assert!(err.contains("^^^^"), "stderr: {err}");
}

#[test]
fn output_before_a_fault_is_kept() {
    let out = run("print \"before\"; print -\"x\";", &[]);
    assert_eq!(out.status.code(), Some(70));
    assert_eq!(stdout(&out), "before\n");
}

#[test]
fn compile_errors_exit_65_and_are_all_reported() {
    let out = run("print y;\nprint z;", &[]);
    assert_eq!(out.status.code(), Some(65));
    let err = stderr(&out);
    let re = Regex::new(r"(?m)^CompileError at \S+:(\d+):7 '(\w)' is not defined$").unwrap();
    let hits: Vec<(String, String)> = re
        .captures_iter(&err)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    assert_eq!(hits, vec![("1".into(), "y".into()), ("2".into(), "z".into())], "stderr: {err}");
}

#[test]
fn constant_pool_overflow_is_reported_once() {
    let out = run(&"print 0;\n".repeat(2000), &[]);
    assert_eq!(out.status.code(), Some(65));
    let err = stderr(&out);
    assert_eq!(err.matches("CompileError at").count(), 1, "stderr: {err}");
    assert!(err.contains("Too many constants in one chunk."), "stderr: {err}");
}

#[test]
fn deep_nesting_is_a_parse_error() {
    let out = run(&format!("print {}1;", "!".repeat(3000)), &[]);
    assert_eq!(out.status.code(), Some(65));
    assert!(stderr(&out).contains("expression nested too deeply"), "stderr: {}", stderr(&out));
}

#[test]
fn redeclaration_cites_the_first_declaration() {
    let out = run("{\n    var a = 1;\n    var a = 2;\n}", &[]);
    assert_eq!(out.status.code(), Some(65));
    let re = Regex::new(r"CompileError at (\S+):3:9 'a' is already declared at (\S+):2:9").unwrap();
    let err = stderr(&out);
    let caps = re.captures(&err).unwrap_or_else(|| panic!("stderr: {err}"));
    assert_eq!(&caps[1], &caps[2]);
}

#[test]
fn parse_error_exits_65() {
    let out = run("var = 3;", &[]);
    assert_eq!(out.status.code(), Some(65));
    assert!(Regex::new(r"(?m)^ParserError at \S+:1:5 ").unwrap().is_match(&stderr(&out)), "stderr: {}", stderr(&out));
}

#[test]
fn lex_error_exits_65() {
    let out = run("var a = 1 @ 2;", &[]);
    assert_eq!(out.status.code(), Some(65));
    assert!(stderr(&out).contains("LexError at"), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("'@'"), "stderr: {}", stderr(&out));
}

#[test]
fn missing_file_exits_1() {
    let out = cinder().arg("/definitely/not/here.cn").output().expect("failed to run cinder");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot read"));
}

#[test]
fn missing_argument_exits_1() {
    let out = cinder().output().expect("failed to run cinder");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn json_diagnostics_are_one_object_per_error() {
    let out = run("print 1 + \"a\";", &["--json"]);
    assert_eq!(out.status.code(), Some(70));
    let err = stderr(&out);
    let v: serde_json::Value = serde_json::from_str(err.trim()).expect("valid JSON");
    assert_eq!(v["kind"], "TypeError");
    assert_eq!(v["row"], 1);
    assert_eq!(v["col"], 11);
}

#[test]
fn no_color_env_produces_no_ansi() {
    let out = run("print -true;", &[]);
    assert!(!out.status.success());
    assert!(!stderr(&out).contains("\x1b["), "unexpected ANSI codes: {}", stderr(&out));
}

// --- Dumps ---

#[test]
fn tokens_dump_lists_positions() {
    let out = run("var x;\nprint x;", &["--tokens"]);
    assert!(out.status.success());
    let dump = stdout(&out);
    assert!(dump.starts_with("1:1  'var'\n1:5  identifier 'x'\n"), "got:\n{dump}");
    assert!(dump.contains("2:1  'print'"), "got:\n{dump}");
}

#[test]
fn ast_dump_is_json_and_does_not_run() {
    let out = run("print 42;", &["--ast"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("valid JSON");
    assert!(v["statements"][0].get("Print").is_some(), "got: {v}");
    assert!(!stdout(&out).contains("\n42\n"));
}

#[test]
fn bytecode_dump_covers_every_function() {
    let out = run("function f(a) { return a; } print f(1);", &["--bytecode"]);
    assert!(out.status.success());
    let dump = stdout(&out);
    assert!(dump.contains("== <script> =="), "got:\n{dump}");
    assert!(dump.contains("== <fn f> =="), "got:\n{dump}");
    assert!(dump.contains("==== .data ===="));
    assert!(dump.contains("OP_CALL"));
}

#[test]
fn bytecode_out_writes_and_still_runs() {
    let listing = NamedTempFile::new().expect("temp file");
    let out = run("print 7;", &["--bytecode-out", listing.path().to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "7\n");
    let written = std::fs::read_to_string(listing.path()).unwrap();
    assert!(written.contains("OP_PRINT"), "got:\n{written}");
}

#[test]
fn verbose_logs_phases() {
    let out = run("print 1;", &["-v"]);
    assert!(out.status.success());
    let err = stderr(&out);
    for phase in ["[info] reading", "[info] compiling", "[info] running"] {
        assert!(err.contains(phase), "missing {phase} in:\n{err}");
    }
}
