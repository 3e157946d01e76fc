// SPDX-License-Identifier: Apache-2.0

//! Decoder state shared by the three grammars: the sub-state code that
//! says what the next significant byte means, and the nesting stack that
//! records which kind of scope is open at every depth.

use crate::parse_error::{ErrKind, ParseError, SyntaxError};

/// What the decoder expects from the next significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    /// Start of a member: a key, or the closer of an empty scope.
    BeforeKey,
    /// Accumulating a key or element name.
    InKey,
    /// A key is complete; waiting for its separator.
    AfterKey,
    /// Separator seen (or list slot open); waiting for a value.
    BeforeValue,
    /// Accumulating a `@type` tag.
    InTag,
    /// Accumulating a bare value or markup text.
    InValue,
    /// Inside a quoted string.
    InQuotedValue,
    /// A bare value ended on whitespace; waiting for a separator or closer.
    BetweenTokens,
    /// A quoted value or a scope just ended.
    PostClose,
    /// The root value is complete; only whitespace may follow.
    Trailing,
    /// Discarding a subtree the sink declined.
    Skipping,
}

/// The kind of an open scope. Closers must match the opener's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// `{ ... }`
    Object,
    /// `[ ... ]`
    List,
    /// `( ... )`
    Args,
    /// `<name> ... </name>`
    Element,
}

impl ScopeKind {
    /// Scope kind introduced by a bracket byte.
    pub fn from_opener(byte: u8) -> Option<Self> {
        match byte {
            b'{' => Some(ScopeKind::Object),
            b'[' => Some(ScopeKind::List),
            b'(' => Some(ScopeKind::Args),
            _ => None,
        }
    }

    /// Scope kind terminated by a bracket byte.
    pub fn from_closer(byte: u8) -> Option<Self> {
        match byte {
            b'}' => Some(ScopeKind::Object),
            b']' => Some(ScopeKind::List),
            b')' => Some(ScopeKind::Args),
            _ => None,
        }
    }

    /// Whether members of this scope carry keys.
    pub fn is_keyed(self) -> bool {
        matches!(self, ScopeKind::Object)
    }
}

/// Stack of open scope kinds with a depth limit.
#[derive(Debug)]
pub struct NestingStack {
    kinds: Vec<ScopeKind>,
    max_depth: usize,
}

impl NestingStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            kinds: Vec::with_capacity(max_depth.min(32)),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn top(&self) -> Option<ScopeKind> {
        self.kinds.last().copied()
    }

    /// Opens a scope of `kind`; `byte` and `position` locate the opener.
    pub fn enter(
        &mut self,
        kind: ScopeKind,
        byte: u8,
        position: u64,
        state: SubState,
    ) -> Result<(), ParseError> {
        if self.kinds.len() >= self.max_depth {
            return SyntaxError::new(
                ErrKind::MaxDepthReached,
                Some(byte),
                position,
                state,
                self.kinds.len(),
            );
        }
        self.kinds.push(kind);
        Ok(())
    }

    /// Closes the innermost scope, which must be of `kind`.
    pub fn exit(
        &mut self,
        kind: ScopeKind,
        byte: u8,
        position: u64,
        state: SubState,
    ) -> Result<(), ParseError> {
        match self.kinds.last() {
            None => SyntaxError::new(ErrKind::UnopenedScope, Some(byte), position, state, 0),
            Some(&open) if open != kind => SyntaxError::new(
                ErrKind::NestingMismatch,
                Some(byte),
                position,
                state,
                self.kinds.len(),
            ),
            Some(_) => {
                self.kinds.pop();
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_exit_balanced() {
        let mut stack = NestingStack::new(8);
        stack.enter(ScopeKind::Object, b'{', 0, SubState::BeforeValue).unwrap();
        stack.enter(ScopeKind::List, b'[', 1, SubState::BeforeValue).unwrap();
        assert_eq!(stack.top(), Some(ScopeKind::List));
        stack.exit(ScopeKind::List, b']', 2, SubState::PostClose).unwrap();
        stack.exit(ScopeKind::Object, b'}', 3, SubState::PostClose).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_wrong_closer_kind() {
        let mut stack = NestingStack::new(8);
        stack.enter(ScopeKind::Args, b'(', 0, SubState::BeforeValue).unwrap();
        let err = stack.exit(ScopeKind::List, b']', 4, SubState::PostClose).unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::NestingMismatch));
        // The failed exit leaves the scope open
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_unopened_and_depth_limit() {
        let mut stack = NestingStack::new(2);
        let err = stack.exit(ScopeKind::Object, b'}', 0, SubState::Trailing).unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::UnopenedScope));

        stack.enter(ScopeKind::List, b'[', 0, SubState::BeforeValue).unwrap();
        stack.enter(ScopeKind::List, b'[', 1, SubState::BeforeValue).unwrap();
        let err = stack.enter(ScopeKind::List, b'[', 2, SubState::BeforeValue).unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::MaxDepthReached));
    }

    #[test]
    fn test_bracket_mapping() {
        for (open, close) in [(b'{', b'}'), (b'[', b']'), (b'(', b')')] {
            assert_eq!(ScopeKind::from_opener(open), ScopeKind::from_closer(close));
        }
        assert_eq!(ScopeKind::from_opener(b'<'), None);
        assert!(ScopeKind::Object.is_keyed());
        assert!(!ScopeKind::Args.is_keyed());
    }
}
