//! Lexer: transforms source text into a token stream (spec.md §4.1).
//!
//! Context-sensitive operator disambiguation hinges on a single mutable
//! flag, `last_token_was_value`, which must be updated *after* a token's
//! kind has been decided, never before — see spec.md §9.

use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::token::{Token, TokenKind, lookup_keyword};

/// A snapshot of lexer position sufficient to implement `peek()` by
/// snapshot-restore (spec.md §4.1).
#[derive(Clone, Copy)]
struct Snapshot {
    pos: usize,
    line: usize,
    column: usize,
    last_token_was_value: bool,
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    /// Resolves the `!`/`%`/`OR` ambiguity; set after any token that
    /// syntactically ends a value, cleared otherwise.
    last_token_was_value: bool,
    diagnostics: DiagnosticBag,
    trace: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 0,
            column: 0,
            last_token_was_value: false,
            diagnostics: DiagnosticBag::new(),
            trace: false,
        }
    }

    /// Enables `tracing::trace!` events for every token recognized
    /// (SPEC_FULL.md ambient logging section).
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> DiagnosticBag {
        self.diagnostics
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.pos,
            line: self.line,
            column: self.column,
            last_token_was_value: self.last_token_was_value,
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        self.pos = snap.pos;
        self.line = snap.line;
        self.column = snap.column;
        self.last_token_was_value = snap.last_token_was_value;
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance_byte(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance_byte();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance_byte();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance_byte();
                    self.advance_byte();
                    loop {
                        match self.peek_byte() {
                            None => break,
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance_byte();
                                self.advance_byte();
                                break;
                            }
                            Some(_) => {
                                self.advance_byte();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Token {
        let snap = self.snapshot();
        let tok = self.next_token();
        self.restore(snap);
        tok
    }

    /// Returns the next token or `Eof`. Skips whitespace and comments.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start_line = self.line;
        let start_col = self.column;

        let Some(b) = self.peek_byte() else {
            return self.make(TokenKind::Eof, "", start_line, start_col);
        };

        if b.is_ascii_alphabetic() || b == b'_' {
            return self.scan_identifier_or_keyword(start_line, start_col);
        }
        if b.is_ascii_digit() {
            return self.scan_number(start_line, start_col);
        }
        if b == b'#' {
            return self.scan_hash_number(start_line, start_col);
        }
        if b == b'"' {
            return self.scan_string(start_line, start_col);
        }
        if b == b'\'' {
            return self.scan_char(start_line, start_col);
        }
        self.scan_operator(start_line, start_col)
    }

    fn make(&mut self, kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Token {
        let tok = Token::new(kind, lexeme, line, column);
        self.last_token_was_value = tok.ends_value();
        if self.trace {
            tracing::trace!(kind = ?tok.kind, lexeme = %tok.lexeme, line, column, "token");
        }
        tok
    }

    fn scan_identifier_or_keyword(&mut self, line: usize, column: usize) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.advance_byte();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .to_string();
        let kind = lookup_keyword(&text).unwrap_or(TokenKind::Identifier);
        self.make(kind, text, line, column)
    }

    fn scan_number(&mut self, line: usize, column: usize) -> Token {
        let start = self.pos;
        while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
            self.advance_byte();
        }
        let mut is_float = false;
        if self.peek_byte() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit())
        {
            is_float = true;
            self.advance_byte();
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.advance_byte();
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.advance_byte();
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.advance_byte();
            }
            if matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                    self.advance_byte();
                }
            } else {
                self.pos = save;
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap()
            .to_string();
        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.make(kind, text, line, column)
    }

    /// Hex (`#X...`) and octal (`#...`) integer literals, plus the bare `#`
    /// punctuation and `#%` float-vector-indirection operator.
    fn scan_hash_number(&mut self, line: usize, column: usize) -> Token {
        let start = self.pos;
        self.advance_byte(); // consume '#'
        if matches!(self.peek_byte(), Some(b'X') | Some(b'x')) {
            self.advance_byte();
            let digits_start = self.pos;
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_hexdigit()) {
                self.advance_byte();
            }
            if self.pos == digits_start {
                self.diagnostics.push(Diagnostic::lexical(
                    "malformed hex literal: expected hex digits after '#X'",
                    line,
                    column,
                ));
                let text = std::str::from_utf8(&self.source[start..self.pos])
                    .unwrap()
                    .to_string();
                return self.make(TokenKind::Error, text, line, column);
            }
            let text = std::str::from_utf8(&self.source[start..self.pos])
                .unwrap()
                .to_string();
            return self.make(TokenKind::IntLiteral, text, line, column);
        }
        if matches!(self.peek_byte(), Some(b) if (b'0'..=b'7').contains(&b)) {
            while matches!(self.peek_byte(), Some(b) if (b'0'..=b'7').contains(&b)) {
                self.advance_byte();
            }
            let text = std::str::from_utf8(&self.source[start..self.pos])
                .unwrap()
                .to_string();
            return self.make(TokenKind::IntLiteral, text, line, column);
        }
        if self.peek_byte() == Some(b'%') {
            self.advance_byte();
            return self.make(TokenKind::HashPercent, "#%", line, column);
        }
        self.make(TokenKind::Hash, "#", line, column)
    }

    /// Decode the `*`-introduced escape sequences shared by strings and
    /// chars (spec.md §4.1). Returns `None` on an unrecognized escape.
    fn decode_escape(&mut self) -> Option<char> {
        let c = self.advance_byte()?;
        Some(match c {
            b'n' | b'N' => '\n',
            b't' => '\t',
            b's' => ' ',
            b'b' => '\u{8}', // backspace
            b'p' => '\u{c}', // form feed
            b'c' => '\r',
            b'"' => '"',
            b'*' => '*',
            _ => return None,
        })
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Token {
        self.advance_byte(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => {
                    self.diagnostics.push(Diagnostic::lexical(
                        "unterminated string literal",
                        line,
                        column,
                    ));
                    return self.make(TokenKind::Error, value, line, column);
                }
                Some(b'"') => {
                    self.advance_byte();
                    break;
                }
                Some(b'*') => {
                    self.advance_byte();
                    match self.decode_escape() {
                        Some(c) => value.push(c),
                        None => {
                            self.diagnostics.push(Diagnostic::lexical(
                                "bad escape sequence in string literal",
                                self.line,
                                self.column,
                            ));
                        }
                    }
                }
                Some(_) => {
                    let b = self.advance_byte().unwrap();
                    value.push(b as char);
                }
            }
        }
        self.make(TokenKind::StringLiteral, value, line, column)
    }

    fn scan_char(&mut self, line: usize, column: usize) -> Token {
        self.advance_byte(); // opening quote
        let value = match self.peek_byte() {
            Some(b'\'') => {
                self.diagnostics
                    .push(Diagnostic::lexical("empty char literal", line, column));
                self.advance_byte();
                return self.make(TokenKind::Error, "", line, column);
            }
            Some(b'*') => {
                self.advance_byte();
                match self.decode_escape() {
                    Some(c) => c,
                    None => {
                        self.diagnostics.push(Diagnostic::lexical(
                            "bad escape sequence in char literal",
                            line,
                            column,
                        ));
                        '\0'
                    }
                }
            }
            Some(_) => self.advance_byte().unwrap() as char,
            None => {
                self.diagnostics
                    .push(Diagnostic::lexical("unterminated char literal", line, column));
                return self.make(TokenKind::Error, "", line, column);
            }
        };
        if self.peek_byte() != Some(b'\'') {
            self.diagnostics.push(Diagnostic::lexical(
                "multi-character char literal",
                line,
                column,
            ));
            // Consume up to the closing quote (or EOF) so recovery can continue.
            while !matches!(self.peek_byte(), None | Some(b'\'')) {
                self.advance_byte();
            }
            if self.peek_byte() == Some(b'\'') {
                self.advance_byte();
            }
            return self.make(TokenKind::Error, value.to_string(), line, column);
        }
        self.advance_byte(); // closing quote
        self.make(TokenKind::CharLiteral, value.to_string(), line, column)
    }

    fn scan_operator(&mut self, line: usize, column: usize) -> Token {
        use TokenKind::*;
        let b = self.advance_byte().unwrap();
        macro_rules! two {
            ($next:expr, $then:expr, $else_:expr) => {{
                if self.peek_byte() == Some($next) {
                    self.advance_byte();
                    $then
                } else {
                    $else_
                }
            }};
        }
        let (kind, len): (TokenKind, usize) = match b {
            b'$' => match self.peek_byte() {
                Some(b'(') => {
                    self.advance_byte();
                    (LBrace, 2)
                }
                Some(b')') => {
                    self.advance_byte();
                    (RBrace, 2)
                }
                _ => {
                    self.diagnostics.push(Diagnostic::lexical(
                        "unrecognized character '$'",
                        line,
                        column,
                    ));
                    (Error, 1)
                }
            },
            b'+' => (Plus, 1),
            b'-' => {
                if self.peek_byte() == Some(b'>') {
                    self.advance_byte();
                    (Arrow, 2)
                } else {
                    (Minus, 1)
                }
            }
            b'*' => (Star, 1),
            b'/' => (Slash, 1),
            b'=' => (Eq, 1),
            b'~' => two!(b'=', (Neq, 2), (BitNot, 1)),
            b'<' => match self.peek_byte() {
                Some(b'=') => {
                    self.advance_byte();
                    (Le, 2)
                }
                Some(b'<') => {
                    self.advance_byte();
                    (Shl, 2)
                }
                _ => (Lt, 1),
            },
            b'>' => match self.peek_byte() {
                Some(b'=') => {
                    self.advance_byte();
                    (Ge, 2)
                }
                Some(b'>') => {
                    self.advance_byte();
                    (Shr, 2)
                }
                _ => (Gt, 1),
            },
            b':' => two!(b'=', (Assign, 2), (Colon, 1)),
            b'&' => two!(b'&', (LogicalAnd, 2), (BitAnd, 1)),
            b'|' => two!(b'|', (LogicalOr, 2), (BitOr, 1)),
            b'^' => (Xor, 1),
            b'@' => (At, 1),
            b'!' => {
                if self.last_token_was_value {
                    (VecIndirection, 1)
                } else {
                    (Indirection, 1)
                }
            }
            b'%' => {
                if self.peek_byte() == Some(b'%') {
                    self.advance_byte();
                    (Bitfield, 2)
                } else if self.last_token_was_value {
                    (CharVectorIndirection, 1)
                } else {
                    (CharIndirection, 1)
                }
            }
            b'.' => (Dot, 1),
            b'?' => (Question, 1),
            b',' => (Comma, 1),
            b';' => (Semicolon, 1),
            b'(' => (LParen, 1),
            b')' => (RParen, 1),
            b'[' => (LBracket, 1),
            b']' => (RBracket, 1),
            b'{' => (LBrace, 1),
            b'}' => (RBrace, 1),
            other => {
                self.diagnostics.push(Diagnostic::lexical(
                    format!("unrecognized character '{}'", other as char),
                    line,
                    column,
                ));
                (Error, 1)
            }
        };
        let lexeme = std::str::from_utf8(&self.source[self.pos - len..self.pos])
            .unwrap()
            .to_string();
        self.make(kind, lexeme, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<Token> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lex.next_token();
            let done = t.is_eof();
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn empty_source_is_single_eof() {
        let toks = tokenize("");
        assert_eq!(toks.len(), 1);
        assert!(toks[0].is_eof());
    }

    #[test]
    fn context_sensitive_indirection() {
        // x!y then !x : VecIndirection after identifier, Indirection otherwise.
        let toks = tokenize("x!y; !x");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::VecIndirection,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Indirection,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn context_sensitive_percent() {
        let toks = tokenize("v%2 %v");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::CharVectorIndirection,
                TokenKind::IntLiteral,
                TokenKind::CharIndirection,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bitfield_operator() {
        let toks = tokenize("x%%3");
        assert_eq!(toks[1].kind, TokenKind::Bitfield);
    }

    #[test]
    fn hex_and_octal_literals() {
        let toks = tokenize("#X1A #17");
        assert_eq!(toks[0].kind, TokenKind::IntLiteral);
        assert_eq!(toks[0].lexeme, "#X1A");
        assert_eq!(toks[1].kind, TokenKind::IntLiteral);
        assert_eq!(toks[1].lexeme, "#17");
    }

    #[test]
    fn float_literal_with_exponent() {
        let toks = tokenize("3.14 2e10 5E-3");
        assert_eq!(toks[0].kind, TokenKind::FloatLiteral);
        assert_eq!(toks[1].kind, TokenKind::FloatLiteral);
        assert_eq!(toks[2].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn string_escapes() {
        let toks = tokenize(r#""a*nb*tc*s*"d*"""#);
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
        assert_eq!(toks[0].lexeme, "a\nb\tc \"d\"");
    }

    #[test]
    fn unterminated_string_reports_lexical_error() {
        let mut lex = Lexer::new("\"abc");
        let t = lex.next_token();
        assert_eq!(t.kind, TokenKind::Error);
        assert!(!lex.diagnostics().is_empty());
    }

    #[test]
    fn empty_char_literal_is_error() {
        let mut lex = Lexer::new("''");
        let t = lex.next_token();
        assert_eq!(t.kind, TokenKind::Error);
        assert!(lex.diagnostics().iter().next().unwrap().message.contains("empty"));
    }

    #[test]
    fn dollar_brace_aliases() {
        let toks = tokenize("$( $)");
        assert_eq!(toks[0].kind, TokenKind::LBrace);
        assert_eq!(toks[1].kind, TokenKind::RBrace);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lex = Lexer::new("LET x = 1");
        let peeked = lex.peek();
        assert_eq!(peeked.kind, TokenKind::Let);
        let next = lex.next_token();
        assert_eq!(next.kind, TokenKind::Let);
        assert_eq!(next.lexeme, peeked.lexeme);
    }

    #[test]
    fn comments_are_skipped() {
        let toks = tokenize("LET x = 1 // comment\n+ 2 /* block */ ;");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }
}
