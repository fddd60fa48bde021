//! Nests the flat token stream into groups keyed by matching openers and
//! closers.
//!
//! Structural problems never abort assembly silently: each one is recorded as
//! a [`TokenTree::Error`] item in every group that is open at the time, so
//! whichever level the compiler is consuming runs into it.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::lexer::{LexError, Lexer};
use crate::token::{Position, Token, TokenKind};

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Root,
    Begin,
    Case,
    Record,
    Class,
    Unit,
    Repeat,
    Paren,
    Bracket,
}

impl GroupKind {
    fn opened_by(kind: &TokenKind) -> Option<Self> {
        let group = match kind {
            TokenKind::Begin => Self::Begin,
            TokenKind::Case => Self::Case,
            TokenKind::Record => Self::Record,
            TokenKind::Class => Self::Class,
            TokenKind::Unit => Self::Unit,
            TokenKind::Repeat => Self::Repeat,
            TokenKind::LParen => Self::Paren,
            TokenKind::LBracket => Self::Bracket,
            _ => return None,
        };
        Some(group)
    }

    fn is_closer(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::End | TokenKind::Until | TokenKind::RParen | TokenKind::RBracket
        )
    }

    fn closed_by(self, kind: &TokenKind) -> bool {
        match self {
            Self::Root => false,
            Self::Begin | Self::Case | Self::Record | Self::Class | Self::Unit => {
                matches!(kind, TokenKind::End)
            }
            Self::Repeat => matches!(kind, TokenKind::Until),
            Self::Paren => matches!(kind, TokenKind::RParen),
            Self::Bracket => matches!(kind, TokenKind::RBracket),
        }
    }

    pub fn closer(self) -> &'static str {
        match self {
            Self::Root => "end of input",
            Self::Begin | Self::Case | Self::Record | Self::Class | Self::Unit => "'end'",
            Self::Repeat => "'until'",
            Self::Paren => "')'",
            Self::Bracket => "']'",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "source",
            Self::Begin => "'begin'",
            Self::Case => "'case'",
            Self::Record => "'record'",
            Self::Class => "'class'",
            Self::Unit => "'unit'",
            Self::Repeat => "'repeat'",
            Self::Paren => "'('",
            Self::Bracket => "'['",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupingError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{kind} opened at {opened} is never closed, reached end of input at {position}")]
    Unclosed {
        kind: GroupKind,
        opened: Position,
        position: Position,
    },
    #[error("Expected {expected} to close {kind} opened at {opened}, got {found} at {position}")]
    MismatchedCloser {
        kind: GroupKind,
        expected: &'static str,
        opened: Position,
        found: String,
        position: Position,
    },
    #[error("Unexpected {found} at {position}: nothing is open to close")]
    StrayCloser { found: String, position: Position },
    #[error("Include file '{name}' not found at {position}")]
    IncludeNotFound { name: String, position: Position },
    #[error("Include file '{name}' could not be read at {position}: {message}")]
    IncludeUnreadable {
        name: String,
        message: String,
        position: Position,
    },
    #[error("Includes nested deeper than {MAX_INCLUDE_DEPTH} levels at {position}")]
    IncludeTooDeep { position: Position },
}

impl GroupingError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Lex(error) => error.position(),
            Self::Unclosed { position, .. }
            | Self::MismatchedCloser { position, .. }
            | Self::StrayCloser { position, .. }
            | Self::IncludeNotFound { position, .. }
            | Self::IncludeUnreadable { position, .. }
            | Self::IncludeTooDeep { position } => position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Token(Token),
    Group(Group),
    Error(GroupingError),
}

impl TokenTree {
    pub fn position(&self) -> &Position {
        match self {
            Self::Token(token) => &token.position,
            Self::Group(group) => &group.open.position,
            Self::Error(error) => error.position(),
        }
    }
}

/// An opener, the items up to its matching closer, and the closer itself.
/// The root group opens at the first position of the source and closes on
/// end of input.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub kind: GroupKind,
    pub open: Token,
    pub close: Token,
    pub items: Vec<TokenTree>,
}

impl Group {
    fn new(kind: GroupKind, open: Token) -> Self {
        let close = open.clone();
        Self {
            kind,
            open,
            close,
            items: Vec::new(),
        }
    }

    /// Every error recorded while this group was open. Errors are injected
    /// into each open level, so nested groups are not searched again.
    pub fn errors(&self) -> Vec<&GroupingError> {
        self.items
            .iter()
            .filter_map(|item| match item {
                TokenTree::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Builds the grouped tree for one source unit, resolving include directives
/// against the search path.
pub struct Assembler<'a> {
    search_path: &'a [PathBuf],
    stack: Vec<Group>,
}

impl<'a> Assembler<'a> {
    pub fn new(search_path: &'a [PathBuf]) -> Self {
        Self {
            search_path,
            stack: Vec::new(),
        }
    }

    pub fn assemble(mut self, source: &str, unit: &str) -> Group {
        let start = Token::new(TokenKind::EOF, Position::start_of(unit));
        self.stack.push(Group::new(GroupKind::Root, start));

        if let Flow::Continue = self.feed_source(source, unit, 0) {
            self.finish_at(Position::start_of(unit));
        }
        self.unwind()
    }

    fn feed_source(&mut self, source: &str, unit: &str, depth: usize) -> Flow {
        for token in Lexer::new(source, unit) {
            let token = match token {
                Ok(token) => token,
                Err(error) => {
                    self.inject(error.into());
                    return Flow::Stop;
                }
            };
            match token.kind {
                TokenKind::EOF => {
                    if depth == 0 {
                        return self.finish(token);
                    }
                    return Flow::Continue;
                }
                TokenKind::Include(ref name) => {
                    if let Flow::Stop = self.include(name, &token.position, depth) {
                        return Flow::Stop;
                    }
                }
                _ => {
                    if let Flow::Stop = self.feed(token) {
                        return Flow::Stop;
                    }
                }
            }
        }
        Flow::Continue
    }

    fn include(&mut self, name: &str, position: &Position, depth: usize) -> Flow {
        if depth + 1 > MAX_INCLUDE_DEPTH {
            self.inject(GroupingError::IncludeTooDeep {
                position: position.clone(),
            });
            return Flow::Stop;
        }
        let Some(path) = find_in_path(self.search_path, name) else {
            self.inject(GroupingError::IncludeNotFound {
                name: name.to_string(),
                position: position.clone(),
            });
            return Flow::Stop;
        };
        match std::fs::read_to_string(&path) {
            Ok(source) => {
                debug!(file = %path.display(), "including source");
                self.feed_source(&source, name, depth + 1)
            }
            Err(error) => {
                self.inject(GroupingError::IncludeUnreadable {
                    name: name.to_string(),
                    message: error.to_string(),
                    position: position.clone(),
                });
                Flow::Stop
            }
        }
    }

    fn feed(&mut self, token: Token) -> Flow {
        if let Some(kind) = GroupKind::opened_by(&token.kind) {
            self.stack.push(Group::new(kind, token));
            return Flow::Continue;
        }
        if !GroupKind::is_closer(&token.kind) {
            self.top().items.push(TokenTree::Token(token));
            return Flow::Continue;
        }

        if self.top_kind().closed_by(&token.kind) {
            self.close_top(token);
            return Flow::Continue;
        }

        let Some(depth) = self
            .stack
            .iter()
            .rposition(|group| group.kind.closed_by(&token.kind))
        else {
            self.inject(GroupingError::StrayCloser {
                found: token.kind.describe(),
                position: token.position,
            });
            return Flow::Stop;
        };

        // A group further down accepts this closer: report the ones it skips
        // over, close them, and keep going.
        let top = self.top();
        let error = GroupingError::MismatchedCloser {
            kind: top.kind,
            expected: top.kind.closer(),
            opened: top.open.position.clone(),
            found: token.kind.describe(),
            position: token.position.clone(),
        };
        warn!(%error, "recovering from mismatched closer");
        self.inject(error);
        while self.stack.len() > depth + 1 {
            let skipped = self.top().open.clone();
            self.close_top(skipped);
        }
        self.close_top(token);
        Flow::Continue
    }

    fn finish(&mut self, eof: Token) -> Flow {
        self.finish_at(eof.position.clone());
        if let Some(root) = self.stack.first_mut() {
            root.close = eof;
        }
        Flow::Stop
    }

    fn finish_at(&mut self, position: Position) {
        if self.stack.len() == 1 {
            return;
        }
        let top = self.top();
        let error = GroupingError::Unclosed {
            kind: top.kind,
            opened: top.open.position.clone(),
            position,
        };
        self.inject(error);
    }

    fn inject(&mut self, error: GroupingError) {
        for group in &mut self.stack {
            group.items.push(TokenTree::Error(error.clone()));
        }
    }

    fn close_top(&mut self, close: Token) {
        if self.stack.len() < 2 {
            return;
        }
        if let Some(mut group) = self.stack.pop() {
            group.close = close;
            self.top().items.push(TokenTree::Group(group));
        }
    }

    /// Folds whatever is still open into its parent and returns the root.
    fn unwind(mut self) -> Group {
        while self.stack.len() > 1 {
            let open = self.top().open.clone();
            self.close_top(open);
        }
        self.stack.pop().unwrap_or_else(|| {
            let eof = Token::new(TokenKind::EOF, Position::start_of(""));
            Group::new(GroupKind::Root, eof)
        })
    }

    fn top(&mut self) -> &mut Group {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn top_kind(&self) -> GroupKind {
        self.stack
            .last()
            .map(|group| group.kind)
            .unwrap_or(GroupKind::Root)
    }
}

pub fn find_in_path(search_path: &[PathBuf], name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_absolute() {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    search_path
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

pub fn assemble(source: &str, unit: &str, search_path: &[PathBuf]) -> Group {
    Assembler::new(search_path).assemble(source, unit)
}
