use crate::grouping::{Group, GroupKind, TokenTree};
use crate::token::{Position, Token, TokenKind};

use super::error::{CompileError, CompileResult, SyntaxError};

/// Read position inside one group's items. Running past the last item
/// reports the group's closer as what was found.
#[derive(Debug, Clone)]
pub struct Cursor<'t> {
    items: &'t [TokenTree],
    index: usize,
    close: &'t Token,
}

impl<'t> Cursor<'t> {
    pub fn new(group: &'t Group) -> Self {
        Self {
            items: &group.items,
            index: 0,
            close: &group.close,
        }
    }

    pub fn peek(&self) -> Option<&'t TokenTree> {
        self.items.get(self.index)
    }

    pub fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.peek_nth_kind(0)
    }

    pub fn peek_nth_kind(&self, offset: usize) -> Option<&'t TokenKind> {
        match self.items.get(self.index + offset) {
            Some(TokenTree::Token(token)) => Some(&token.kind),
            _ => None,
        }
    }

    pub fn peek_group(&self, kind: GroupKind) -> Option<&'t Group> {
        match self.peek() {
            Some(TokenTree::Group(group)) if group.kind == kind => Some(group),
            _ => None,
        }
    }

    pub fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.items.len()
    }

    pub fn advance(&mut self) -> Option<&'t TokenTree> {
        let item = self.items.get(self.index);
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Position of the next item, or of the closer when none is left.
    pub fn position(&self) -> Position {
        match self.peek() {
            Some(item) => item.position().clone(),
            None => self.close.position.clone(),
        }
    }

    /// Error for whatever sits at the cursor. A grouping error recorded at
    /// this point takes precedence over the syntax complaint.
    pub fn unexpected(&self, expected: &str) -> CompileError {
        let (found, position) = match self.peek() {
            Some(TokenTree::Error(error)) => return error.clone().into(),
            Some(TokenTree::Token(token)) => (token.kind.describe(), token.position.clone()),
            Some(TokenTree::Group(group)) => {
                (group.open.kind.describe(), group.open.position.clone())
            }
            None => (self.close.kind.describe(), self.close.position.clone()),
        };
        SyntaxError::Expected {
            expected: expected.to_string(),
            found,
            position,
        }
        .into()
    }

    pub fn expect(&mut self, kind: &TokenKind) -> CompileResult<&'t Token> {
        match self.peek() {
            Some(TokenTree::Token(token)) if token.kind == *kind => {
                self.index += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(&kind.describe())),
        }
    }

    pub fn expect_identifier(&mut self) -> CompileResult<(String, Position)> {
        match self.peek() {
            Some(TokenTree::Token(Token {
                kind: TokenKind::Identifier(name),
                position,
            })) => {
                self.index += 1;
                Ok((name.clone(), position.clone()))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    pub fn expect_group(&mut self, kind: GroupKind) -> CompileResult<&'t Group> {
        match self.peek_group(kind) {
            Some(group) => {
                self.index += 1;
                Ok(group)
            }
            None => Err(self.unexpected(&kind.to_string())),
        }
    }

    pub fn expect_done(&self) -> CompileResult<()> {
        if self.is_done() {
            Ok(())
        } else {
            Err(self.unexpected(&self.close.kind.describe()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::assemble;

    #[test]
    fn runs_out_at_the_closer() {
        let root = assemble("begin x end", "test", &[]);
        let mut outer = Cursor::new(&root);
        let block = outer.expect_group(GroupKind::Begin).unwrap();
        let mut inner = Cursor::new(block);
        assert_eq!(inner.expect_identifier().unwrap().0, "x");
        let err = inner.expect(&TokenKind::Semicolon).unwrap_err();
        assert_eq!(err.to_string(), "Expected ';', got 'end' at test:1:9");
        assert!(outer.expect_done().is_ok());
    }

    #[test]
    fn grouping_errors_surface_when_reached() {
        let root = assemble("begin x", "test", &[]);
        let cursor = Cursor::new(&root);
        assert!(matches!(
            cursor.unexpected("anything"),
            CompileError::Grouping(_)
        ));
    }
}
