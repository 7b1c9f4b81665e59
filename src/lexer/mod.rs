use logos::Logos;

use crate::ast::{SourceMap, Span};

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum Token {
    #[token("var")]
    Var,
    #[token("function")]
    Function,
    #[token("print")]
    Print,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("?")]
    Question,

    // Punctuation
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// String contents without the quotes. There are no escape sequences.
    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// Short human name used in parse errors and the token dump.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Ident(name) => format!("identifier '{name}'"),
            other => format!("'{}'", other.symbol()),
        }
    }

    /// Source spelling of a fixed token.
    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Var => "var",
            Token::Function => "function",
            Token::Print => "print",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::Return => "return",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Assign => "=",
            Token::EqualEqual => "==",
            Token::BangEqual => "!=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Tilde => "~",
            Token::Bang => "!",
            Token::ShiftLeft => "<<",
            Token::ShiftRight => ">>",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Number(_) => "number",
            Token::Str(_) => "string",
            Token::Ident(_) => "identifier",
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;

/// Lex source code into tokens with their byte ranges.
/// Stops at the first character that starts no token.
pub fn lex(source: &str) -> LexResult<Vec<(Token, std::ops::Range<usize>)>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let range = lexer.span();
                let (row, col) = SourceMap::new(source).lookup(range.start);
                return Err(LexError {
                    row: row as u32,
                    col: col as u32,
                    span: Span { start: range.start, end: range.end },
                    snippet: source[range].to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unexpected character(s) '{snippet}'")]
pub struct LexError {
    pub row: u32,
    pub col: u32,
    pub span: Span,
    pub snippet: String,
}

impl LexError {
    pub fn report(&self, file: &str) -> String {
        format!("LexError at {file}:{}:{} {self}", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_var_declaration() {
        assert_eq!(kinds("var x = 1.5;"), vec![
            Token::Var,
            Token::Ident("x".to_string()),
            Token::Assign,
            Token::Number(1.5),
            Token::Semicolon,
        ]);
    }

    #[test]
    fn keywords_need_exact_match() {
        assert_eq!(kinds("variable for_each"), vec![
            Token::Ident("variable".to_string()),
            Token::Ident("for_each".to_string()),
        ]);
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(kinds("a<<=b++>=c"), vec![
            Token::Ident("a".to_string()),
            Token::ShiftLeft,
            Token::Assign,
            Token::Ident("b".to_string()),
            Token::PlusPlus,
            Token::GreaterEqual,
            Token::Ident("c".to_string()),
        ]);
    }

    #[test]
    fn string_has_no_escapes() {
        assert_eq!(kinds(r#""a\n""#), vec![Token::Str(r"a\n".to_string())]);
    }

    #[test]
    fn comment_ignored() {
        assert_eq!(kinds("// note\nprint 1; // tail"), vec![
            Token::Print,
            Token::Number(1.0),
            Token::Semicolon,
        ]);
    }

    #[test]
    fn spans_cover_lexemes() {
        let tokens = lex("print \"hi\";").unwrap();
        assert_eq!(tokens[1].1, 6..10);
    }

    #[test]
    fn error_reports_row_and_col() {
        let err = lex("var a = 1;\n  @").unwrap_err();
        assert_eq!((err.row, err.col), (2, 3));
        assert_eq!(err.snippet, "@");
        assert_eq!(err.report("t.cn"), "LexError at t.cn:2:3 unexpected character(s) '@'");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("print \"abc").is_err());
    }
}
