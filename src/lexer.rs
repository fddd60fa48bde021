use std::{iter::Peekable, str::CharIndices, sync::Arc};

use crate::token::{Position, Token, TokenKind};

pub mod error;

pub use error::{LexError, LexResult};

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    unit: Arc<str>,
    eof_reached: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, unit: &str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            unit: Arc::from(unit),
            eof_reached: false,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token> {
        loop {
            self.skip_whitespace();
            let Some(&(start_idx, ch)) = self.chars.peek() else {
                self.eof_reached = true;
                return Ok(Token::new(TokenKind::EOF, self.current_position()));
            };
            let position = self.current_position();

            match ch {
                '{' => {
                    if let Some(token) = self.read_brace_comment(position)? {
                        return Ok(token);
                    }
                }
                '(' if self.peek_second() == Some('*') => self.skip_paren_comment(position)?,
                '/' if self.peek_second() == Some('/') => self.skip_line_comment(),
                '\'' | '#' => return self.read_string(position),
                '$' => return self.read_hex(position),
                c if c.is_ascii_digit() => return self.read_number(start_idx, position),
                c if c.is_alphabetic() || c == '_' => {
                    return Ok(self.read_word(start_idx, position));
                }
                _ => return self.read_symbol(ch, position),
            }
        }
    }

    fn read_symbol(&mut self, ch: char, position: Position) -> LexResult<Token> {
        self.advance_char();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Equal,
            '^' => TokenKind::Caret,
            '@' => TokenKind::At,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => self.follow('=', TokenKind::Assign, TokenKind::Colon),
            '.' => self.follow('.', TokenKind::DotDot, TokenKind::Dot),
            '>' => self.follow('=', TokenKind::GreaterEqual, TokenKind::Greater),
            '<' => match self.peek_char() {
                Some('=') => {
                    self.advance_char();
                    TokenKind::LessEqual
                }
                Some('>') => {
                    self.advance_char();
                    TokenKind::NotEqual
                }
                _ => TokenKind::Less,
            },
            character => {
                return Err(LexError::UnexpectedCharacter {
                    character,
                    position,
                });
            }
        };
        Ok(Token::new(kind, position))
    }

    fn follow(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek_char() == Some(next) {
            self.advance_char();
            matched
        } else {
            otherwise
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn skip_paren_comment(&mut self, position: Position) -> LexResult<()> {
        self.advance_char();
        self.advance_char();
        let mut previous = '\0';
        while let Some((_, c)) = self.advance_char() {
            if previous == '*' && c == ')' {
                return Ok(());
            }
            previous = c;
        }
        Err(LexError::UnterminatedComment { position })
    }

    /// Skips a `{ ... }` comment. Compiler directives of the form `{$I name}`
    /// or `{$INCLUDE name}` come back as include tokens; other directives are
    /// dropped like comments.
    fn read_brace_comment(&mut self, position: Position) -> LexResult<Option<Token>> {
        self.advance_char();
        let mut body = String::new();
        loop {
            match self.advance_char() {
                Some((_, '}')) => break,
                Some((_, c)) => body.push(c),
                None => return Err(LexError::UnterminatedComment { position }),
            }
        }
        let Some(directive) = body.strip_prefix('$') else {
            return Ok(None);
        };
        let mut parts = directive.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_ascii_uppercase();
        let argument = parts.next().map(str::trim).unwrap_or_default();
        if (name == "I" || name == "INCLUDE") && !argument.is_empty() {
            let file = argument.trim_matches('\'').to_string();
            return Ok(Some(Token::new(TokenKind::Include(file), position)));
        }
        Ok(None)
    }

    fn read_word(&mut self, start: usize, position: Position) -> Token {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
        let word = &self.input[start..self.current_index()];
        let kind =
            TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
        Token::new(kind, position)
    }

    fn read_number(&mut self, start: usize, position: Position) -> LexResult<Token> {
        self.consume_digits();
        let mut is_real = false;

        // `1..5` is a range, not a real literal.
        if self.peek_char() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            is_real = true;
            self.advance_char();
            self.consume_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if let Some(&(_, sign)) = lookahead.peek()
                && (sign == '+' || sign == '-')
            {
                lookahead.next();
            }
            if lookahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                is_real = true;
                self.advance_char();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.advance_char();
                }
                self.consume_digits();
            }
        }

        let literal = &self.input[start..self.current_index()];
        let invalid = || LexError::InvalidNumber {
            literal: literal.to_string(),
            position: position.clone(),
        };
        let kind = if is_real {
            TokenKind::Real(literal.parse::<f64>().map_err(|_| invalid())?)
        } else {
            integer_kind(literal.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(Token::new(kind, position))
    }

    fn read_hex(&mut self, position: Position) -> LexResult<Token> {
        self.advance_char();
        let start = self.current_index();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_hexdigit() {
                self.advance_char();
            } else {
                break;
            }
        }
        let digits = &self.input[start..self.current_index()];
        let value = i64::from_str_radix(digits, 16).map_err(|_| LexError::InvalidNumber {
            literal: format!("${digits}"),
            position: position.clone(),
        })?;
        Ok(Token::new(integer_kind(value), position))
    }

    /// Reads a run of quoted pieces and `#nn` character codes. A run that
    /// spells exactly one character is a character literal.
    fn read_string(&mut self, position: Position) -> LexResult<Token> {
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some('\'') => self.read_quoted(&mut text, &position)?,
                Some('#') => text.push(self.read_char_code()?),
                _ => break,
            }
        }
        let mut chars = text.chars();
        let kind = match (chars.next(), chars.next()) {
            (Some(single), None) => TokenKind::Char(single),
            _ => TokenKind::String(text),
        };
        Ok(Token::new(kind, position))
    }

    fn read_quoted(&mut self, text: &mut String, position: &Position) -> LexResult<()> {
        self.advance_char();
        loop {
            match self.advance_char() {
                Some((_, '\'')) => {
                    if self.peek_char() == Some('\'') {
                        self.advance_char();
                        text.push('\'');
                    } else {
                        return Ok(());
                    }
                }
                Some((_, '\n')) | None => {
                    return Err(LexError::UnterminatedString {
                        position: position.clone(),
                    });
                }
                Some((_, c)) => text.push(c),
            }
        }
    }

    fn read_char_code(&mut self) -> LexResult<char> {
        let position = self.current_position();
        self.advance_char();
        let start = self.current_index();
        self.consume_digits();
        let digits = &self.input[start..self.current_index()];
        digits
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| LexError::InvalidCharCode {
                literal: digits.to_string(),
                position,
            })
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }
}

fn integer_kind(value: i64) -> TokenKind {
    match i32::try_from(value) {
        Ok(small) => TokenKind::Integer(small),
        Err(_) => TokenKind::Long(value),
    }
}

impl Iterator for Lexer<'_> {
    type Item = LexResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_reached {
            return None;
        }
        Some(self.next_token())
    }
}

impl Lexer<'_> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn current_position(&self) -> Position {
        Position::new(self.unit.clone(), self.line, self.column)
    }
}

pub fn tokenize(input: &str, unit: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input, unit);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
