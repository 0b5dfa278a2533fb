use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

/// Line comments start with `►` and run to the end of the line.
const COMMENT_MARKER: char = '►';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        self.skip_spaces_and_comments();

        let Some(ch) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, self.span_here(0)));
        };

        if ch == '\n' {
            let span = self.span_here(1);
            self.consume_char();
            // Collapse runs of blank lines into a single Newline token.
            loop {
                self.skip_spaces_and_comments();
                if self.peek_char() == Some('\n') {
                    self.consume_char();
                } else {
                    break;
                }
            }
            return Ok(Token::new(TokenKind::Newline, span));
        }

        self.read_token_from_current_position(ch)
    }

    fn read_token_from_current_position(&mut self, ch: char) -> LexResult<Token<'a>> {
        if let Some(token) = self.try_consume_operator(ch) {
            return Ok(token);
        }
        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }
        if ch.is_ascii_digit() {
            return self.read_integer();
        }
        Err(LexError::UnexpectedCharacter {
            character: ch,
            line: self.line,
            column: self.column,
        })
    }

    fn try_consume_operator(&mut self, ch: char) -> Option<Token<'a>> {
        // Two-character ASCII forms first so `<-` does not lex as `<` `-`.
        let kind2 = match self.peek_pair() {
            Some(('<', '-')) => Some(TokenKind::Arrow),
            Some(('<', '=')) => Some(TokenKind::Le),
            Some(('>', '=')) => Some(TokenKind::Ge),
            Some(('!', '=')) => Some(TokenKind::Ne),
            Some(('.', '.')) => Some(TokenKind::DotDot),
            _ => None,
        };
        if let Some(kind) = kind2 {
            let span = self.span_here(2);
            self.consume_char();
            self.consume_char();
            return Some(Token::new(kind, span));
        }

        let kind = match ch {
            '←' => TokenKind::Arrow,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' | '×' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Eq,
            '≠' => TokenKind::Ne,
            '<' => TokenKind::Lt,
            '≤' => TokenKind::Le,
            '>' => TokenKind::Gt,
            '≥' => TokenKind::Ge,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '⌊' => TokenKind::LFloor,
            '⌋' => TokenKind::RFloor,
            '⌈' => TokenKind::LCeil,
            '⌉' => TokenKind::RCeil,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            _ => return None,
        };
        let span = self.span_here(ch.len_utf8());
        self.consume_char();
        Some(Token::new(kind, span))
    }

    fn read_identifier(&mut self) -> Token<'a> {
        let start = self.pos;
        let span_start = self.span_here(0);
        self.consume_while(|c| c.is_alphanumeric() || c == '_');
        let end = self.pos;

        let ident = &self.input[start..end];
        let kind = match ident {
            "begin" => TokenKind::Begin,
            "end" => TokenKind::End,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "step" => TokenKind::Step,
            "do" => TokenKind::Do,
            "while" => TokenKind::While,
            "repeat" => TokenKind::Repeat,
            "until" => TokenKind::Until,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "return" => TokenKind::Return,
            "CALL" => TokenKind::Call,
            "class" => TokenKind::Class,
            "div" => TokenKind::Div,
            "mod" => TokenKind::Mod,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            // Uppercase-only boolean literals; `t`/`f` stay identifiers.
            "T" => TokenKind::True,
            "F" => TokenKind::False,
            _ => TokenKind::Identifier(ident),
        };

        Token::new(
            kind,
            Span {
                start,
                end,
                ..span_start
            },
        )
    }

    fn read_integer(&mut self) -> LexResult<Token<'a>> {
        let start = self.pos;
        let span_start = self.span_here(0);
        self.consume_while(|c| c.is_ascii_digit());
        let end = self.pos;

        let literal = &self.input[start..end];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                line: span_start.line,
                column: span_start.column,
            })?;
        Ok(Token::new(
            TokenKind::Integer(value),
            Span {
                start,
                end,
                ..span_start
            },
        ))
    }

    fn skip_spaces_and_comments(&mut self) {
        loop {
            self.consume_while(|c| c == ' ' || c == '\t' || c == '\r');
            if self.peek_char() == Some(COMMENT_MARKER) {
                self.consume_while(|c| c != '\n');
            } else {
                return;
            }
        }
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_pair(&self) -> Option<(char, char)> {
        let mut chars = self.input[self.pos..].chars();
        let first = chars.next()?;
        let second = chars.next()?;
        Some((first, second))
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn span_here(&self, len: usize) -> Span {
        Span {
            start: self.pos,
            end: self.pos + len,
            line: self.line,
            column: self.column,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => Some(Ok(token)),
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_simple_loop_program() {
        let input = indoc! {"
            begin
              s <- 0
              for i <- 1 to n do
              begin
                s <- s + i
              end
            end
        "};
        let expected = vec![
            TokenKind::Begin,
            TokenKind::Newline,
            TokenKind::Identifier("s"),
            TokenKind::Arrow,
            TokenKind::Integer(0),
            TokenKind::Newline,
            TokenKind::For,
            TokenKind::Identifier("i"),
            TokenKind::Arrow,
            TokenKind::Integer(1),
            TokenKind::To,
            TokenKind::Identifier("n"),
            TokenKind::Do,
            TokenKind::Newline,
            TokenKind::Begin,
            TokenKind::Newline,
            TokenKind::Identifier("s"),
            TokenKind::Arrow,
            TokenKind::Identifier("s"),
            TokenKind::Plus,
            TokenKind::Identifier("i"),
            TokenKind::Newline,
            TokenKind::End,
            TokenKind::Newline,
            TokenKind::End,
            TokenKind::Newline,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn accepts_unicode_and_ascii_operator_forms() {
        assert_eq!(kinds("i ← 1"), kinds("i <- 1"));
        assert_eq!(kinds("a ≤ b"), kinds("a <= b"));
        assert_eq!(kinds("a ≥ b"), kinds("a >= b"));
        assert_eq!(kinds("a ≠ b"), kinds("a != b"));
    }

    #[test]
    fn lexes_floor_and_ceiling_brackets() {
        assert_eq!(
            kinds("⌊n/2⌋"),
            vec![
                TokenKind::LFloor,
                TokenKind::Identifier("n"),
                TokenKind::Slash,
                TokenKind::Integer(2),
                TokenKind::RFloor,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("⌈n/2⌉"),
            vec![
                TokenKind::LCeil,
                TokenKind::Identifier("n"),
                TokenKind::Slash,
                TokenKind::Integer(2),
                TokenKind::RCeil,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn boolean_literals_are_uppercase_only() {
        assert_eq!(
            kinds("T F t f"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Identifier("t"),
                TokenKind::Identifier("f"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn drops_comments_and_blank_lines() {
        let input = indoc! {"
            x <- 1 ► initialize the accumulator

            ► a full-line comment
            y <- 2
        "};
        let expected = vec![
            TokenKind::Identifier("x"),
            TokenKind::Arrow,
            TokenKind::Integer(1),
            TokenKind::Newline,
            TokenKind::Identifier("y"),
            TokenKind::Arrow,
            TokenKind::Integer(2),
            TokenKind::Newline,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn tracks_line_and_column_positions() {
        let tokens = tokenize("x <- 1\ny <- 2\n").expect("tokenize should succeed");
        let y = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Identifier("y"))
            .expect("y token");
        assert_eq!((y.span.line, y.span.column), (2, 1));
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x <- 1 @ 2").expect_err("expected lexing failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                line: 1,
                column: 8,
            }
        );
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n <- 99999999999999999999999999").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }

    #[test]
    fn keyword_call_is_case_sensitive() {
        assert_eq!(
            kinds("CALL Merge(A)"),
            vec![
                TokenKind::Call,
                TokenKind::Identifier("Merge"),
                TokenKind::LParen,
                TokenKind::Identifier("A"),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
        // Lowercase `call` is an ordinary identifier.
        assert_eq!(
            kinds("call"),
            vec![TokenKind::Identifier("call"), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_slice_bounds() {
        assert_eq!(
            kinds("A[1..n]"),
            vec![
                TokenKind::Identifier("A"),
                TokenKind::LBracket,
                TokenKind::Integer(1),
                TokenKind::DotDot,
                TokenKind::Identifier("n"),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }
}
