// SPDX-License-Identifier: Apache-2.0

//! State and helpers shared by the three grammar decoders.
//!
//! [`ParserCore`] owns the scratch buffers (key, type tag, value), the
//! nesting stack and the current sub-state, and implements the pieces
//! every grammar needs: quoted-string runs with escapes, scope open and
//! close against the sink, and the final unwind on failure.

use crate::decoder::Options;
use crate::escape_processor::{EscapeProcessor, UnicodeEscapeCollector};
use crate::parse_error::{ErrKind, ParseError, SyntaxError};
use crate::scratch::Scratch;
use crate::sink::{NodeStack, Sink};
use crate::source::Source;
use crate::state::{NestingStack, ScopeKind, SubState};

/// Which scratch buffer a token accumulates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Alias,
    Space,
    Value,
}

/// Escape dialect of a grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escape {
    /// `\n`, `\uXXXX`
    Backslash,
    /// `^n`, `^s`, `^uXXXX`
    Caret,
}

impl Escape {
    pub fn introducer(self) -> u8 {
        match self {
            Escape::Backslash => b'\\',
            Escape::Caret => b'^',
        }
    }

    /// Byte for a single-letter code. Unknown codes stand for themselves.
    fn simple(self, code: u8) -> u8 {
        match (self, code) {
            (Escape::Caret, b's') => b' ',
            _ => EscapeProcessor::process_simple_escape(code).unwrap_or(code),
        }
    }
}

/// Whitespace between tokens.
pub(crate) fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Control bytes other than whitespace.
pub(crate) fn is_control(byte: u8) -> bool {
    (byte < 0x20 && !is_space(byte)) || byte == 0x7F
}

#[derive(Debug)]
pub(crate) struct ParserCore {
    pub alias: Scratch,
    pub space: Scratch,
    pub value: Scratch,
    pub nesting: NestingStack,
    pub state: SubState,
    collector: UnicodeEscapeCollector,
    /// Buffer a pending high surrogate belongs to.
    pending: Role,
}

impl ParserCore {
    pub fn new(options: &Options) -> Self {
        Self {
            alias: Scratch::with_capacity(options.alias_capacity),
            space: Scratch::with_capacity(options.space_capacity),
            value: Scratch::with_capacity(options.value_capacity),
            nesting: NestingStack::new(options.max_depth),
            state: SubState::BeforeValue,
            collector: UnicodeEscapeCollector::new(),
            pending: Role::Value,
        }
    }

    /// Zeroes every cursor ahead of a new input.
    pub fn clear(&mut self) {
        self.alias.clear();
        self.space.clear();
        self.value.clear();
        self.nesting.clear();
        self.collector.reset();
        self.state = SubState::BeforeValue;
    }

    pub fn scratch(&mut self, role: Role) -> &mut Scratch {
        match role {
            Role::Alias => &mut self.alias,
            Role::Space => &mut self.space,
            Role::Value => &mut self.value,
        }
    }

    /// A syntax error at the byte just read (or at the current position
    /// when the input ended).
    pub fn fail<T>(&self, kind: ErrKind, byte: Option<u8>, source: &Source<'_>) -> Result<T, ParseError> {
        let position = match byte {
            Some(_) => source.position().saturating_sub(1),
            None => source.position(),
        };
        SyntaxError::new(kind, byte, position, self.state, self.nesting.depth())
    }

    /// Like [`Source::next`], but running out of input is a truncation
    /// error carrying the current state.
    pub fn next_byte(&self, source: &mut Source<'_>) -> Result<u8, ParseError> {
        match source.next() {
            Err(ParseError::EndOfData) => self.fail(ErrKind::Truncated, None, source),
            other => other,
        }
    }

    /// Reads the four hex digits of a unicode escape.
    fn hex_unit(&self, source: &mut Source<'_>) -> Result<u16, ParseError> {
        let mut digits = [0u8; 4];
        for digit in digits.iter_mut() {
            *digit = self.next_byte(source)?;
            if EscapeProcessor::validate_hex_digit(*digit).is_none() {
                return self.fail(ErrKind::MalformedEscape, Some(*digit), source);
            }
        }
        match EscapeProcessor::parse_hex4(&digits) {
            Some(unit) => Ok(unit),
            None => self.fail(ErrKind::MalformedEscape, None, source),
        }
    }

    /// Decodes the escape whose introducer was just read into `role`.
    pub fn unescape(&mut self, source: &mut Source<'_>, role: Role, escape: Escape) -> Result<(), ParseError> {
        let code = self.next_byte(source)?;
        if code == b'u' {
            let unit = self.hex_unit(source)?;
            if self.pending != role {
                self.flush_surrogate();
            }
            self.pending = role;
            let Self {
                alias,
                space,
                value,
                collector,
                ..
            } = self;
            let target = match role {
                Role::Alias => alias,
                Role::Space => space,
                Role::Value => value,
            };
            collector.push_unit(unit, |bytes| target.extend(bytes));
        } else {
            self.flush_surrogate();
            let byte = escape.simple(code);
            self.scratch(role).append(byte);
        }
        Ok(())
    }

    /// Replaces a dangling high surrogate with `?` in the buffer whose
    /// escape produced it.
    pub fn flush_surrogate(&mut self) {
        if self.collector.has_pending_high_surrogate() {
            let Self {
                alias,
                space,
                value,
                collector,
                pending,
                ..
            } = self;
            let target = match pending {
                Role::Alias => alias,
                Role::Space => space,
                Role::Value => value,
            };
            collector.flush(|bytes| target.extend(bytes));
        }
    }

    /// Appends one plain byte to `role`.
    pub fn push(&mut self, role: Role, byte: u8) {
        self.flush_surrogate();
        self.scratch(role).append(byte);
    }

    /// Reads a quoted string whose opening `quote` was just read into
    /// `role`. Plain runs are bulk-copied from the window.
    pub fn quoted(
        &mut self,
        source: &mut Source<'_>,
        role: Role,
        quote: u8,
        escape: Escape,
    ) -> Result<(), ParseError> {
        let introducer = escape.introducer();
        loop {
            if !source.also()? {
                return self.fail(ErrKind::Truncated, None, source);
            }
            let chunk = source.chunk();
            let stop = memchr::memchr2(quote, introducer, chunk);
            let run = stop.unwrap_or(chunk.len());
            if run > 0 {
                self.flush_surrogate();
                let chunk = source.chunk();
                self.scratch(role).extend(&chunk[..run]);
                source.consume(run);
            }
            if stop.is_none() {
                continue;
            }
            let byte = source.read();
            if byte == quote {
                self.flush_surrogate();
                return Ok(());
            }
            self.unescape(source, role, escape)?;
        }
    }

    /// Consumes a quoted string without keeping it, still validating its
    /// unicode escapes.
    pub fn skip_quoted(&self, source: &mut Source<'_>, quote: u8, escape: Escape) -> Result<(), ParseError> {
        let introducer = escape.introducer();
        loop {
            if !source.also()? {
                return self.fail(ErrKind::Truncated, None, source);
            }
            let chunk = source.chunk();
            match memchr::memchr2(quote, introducer, chunk) {
                None => {
                    let run = chunk.len();
                    source.consume(run);
                }
                Some(at) => {
                    let byte = chunk[at];
                    source.consume(at + 1);
                    if byte == quote {
                        return Ok(());
                    }
                    self.skip_escape(source)?;
                }
            }
        }
    }

    /// Consumes the escape whose introducer was just read, validating
    /// unicode escapes.
    pub fn skip_escape(&self, source: &mut Source<'_>) -> Result<(), ParseError> {
        if self.next_byte(source)? == b'u' {
            self.hex_unit(source)?;
        }
        Ok(())
    }

    /// Appends bytes accepted by `accept` to `role` until another byte (or
    /// the end of input) is next; that byte is left unread.
    pub fn copy_run(
        &mut self,
        source: &mut Source<'_>,
        role: Role,
        accept: fn(u8) -> bool,
    ) -> Result<(), ParseError> {
        loop {
            let chunk = source.chunk();
            let run = chunk.iter().position(|&b| !accept(b)).unwrap_or(chunk.len());
            let stopped = run < chunk.len();
            if run > 0 {
                self.flush_surrogate();
                self.scratch(role).extend(&chunk[..run]);
                source.consume(run);
            }
            if stopped || !source.also()? {
                return Ok(());
            }
        }
    }

    /// Opens a scope of `kind` introduced by `opener`, handing the pending
    /// key and tag to the sink. An empty tag defaults to `default_tag`.
    /// Returns false when the sink declined the scope; the nesting stack
    /// records it either way.
    pub fn open<S: Sink>(
        &mut self,
        nodes: &mut NodeStack<'_, S>,
        source: &Source<'_>,
        kind: ScopeKind,
        opener: u8,
        default_tag: Option<u8>,
    ) -> Result<bool, ParseError> {
        self.flush_surrogate();
        self.nesting
            .enter(kind, opener, source.position().saturating_sub(1), self.state)?;
        let tag = match default_tag {
            Some(byte) => self.space.slip_or(byte),
            None => self.space.slip(),
        };
        nodes.open(self.alias.slip(), tag)
    }

    /// Closes the innermost scope, which must be of `kind`.
    pub fn close<S: Sink>(
        &mut self,
        nodes: &mut NodeStack<'_, S>,
        source: &Source<'_>,
        kind: ScopeKind,
        closer: u8,
    ) -> Result<(), ParseError> {
        self.nesting
            .exit(kind, closer, source.position().saturating_sub(1), self.state)?;
        nodes.close()?;
        self.after_scope();
        Ok(())
    }

    /// Delivers the pending key, tag and value as one scalar.
    pub fn emit<S: Sink>(&mut self, nodes: &mut NodeStack<'_, S>, default_tag: Option<u8>) -> Result<(), ParseError> {
        self.flush_surrogate();
        let tag = match default_tag {
            Some(byte) => self.space.slip_or(byte),
            None => self.space.slip(),
        };
        nodes.next(self.alias.slip(), tag, self.value.slip())
    }

    /// State after a scope or quoted value ended.
    pub fn after_scope(&mut self) {
        self.state = if self.nesting.is_empty() {
            SubState::Trailing
        } else {
            SubState::PostClose
        };
    }

    /// State after a separator inside the innermost scope.
    pub fn after_comma(&mut self, source: &Source<'_>) -> Result<(), ParseError> {
        self.state = match self.nesting.top() {
            Some(kind) if kind.is_keyed() => SubState::BeforeKey,
            Some(_) => SubState::BeforeValue,
            None => return self.fail(ErrKind::UnexpectedByte, Some(b','), source),
        };
        Ok(())
    }

    /// Ends a decode: unwinds the sink on failure and turns a bare
    /// end-of-data into a truncation error.
    pub fn finish<S: Sink>(
        &mut self,
        result: Result<(), ParseError>,
        source: &Source<'_>,
        nodes: &mut NodeStack<'_, S>,
    ) -> Result<(), ParseError> {
        let result = match result {
            Err(ParseError::EndOfData) => self.fail(ErrKind::Truncated, None, source),
            other => other,
        };
        if let Err(e) = &result {
            log::debug!("decode failed: {e}");
            nodes.unwind();
        }
        self.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ParserCore {
        ParserCore::new(&Options::default())
    }

    #[test]
    fn test_quoted_with_escapes_across_chunks() {
        use crate::reader::ChunkReader;
        let mut core = fresh();
        let mut source = Source::from_reader(ChunkReader::new(br#"a\tbA\"c" tail"#, 2));
        core.quoted(&mut source, Role::Value, b'"', Escape::Backslash)
            .unwrap();
        assert_eq!(core.value.as_bytes(), b"a\tbA\"c");
        assert_eq!(source.next().unwrap(), b' ');
    }

    #[test]
    fn test_caret_escapes() {
        let mut core = fresh();
        let mut source = Source::from_slice(b"x^sy^^^u00e9'");
        core.quoted(&mut source, Role::Alias, b'\'', Escape::Caret)
            .unwrap();
        assert_eq!(core.alias.as_bytes(), "x y^é".as_bytes());
    }

    #[test]
    fn test_surrogates_in_quoted() {
        let mut core = fresh();
        let mut source = Source::from_slice("😀|\\uD83Dx|\\uDE00\"".as_bytes());
        core.quoted(&mut source, Role::Value, b'"', Escape::Backslash)
            .unwrap();
        assert_eq!(core.value.as_bytes(), "😀|?x|?".as_bytes());
    }

    #[test]
    fn test_malformed_and_truncated() {
        let mut core = fresh();
        let mut source = Source::from_slice(br#"\u00G1""#);
        let err = core
            .quoted(&mut source, Role::Value, b'"', Escape::Backslash)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::MalformedEscape));

        let mut core = fresh();
        let mut source = Source::from_slice(b"abc");
        let err = core
            .quoted(&mut source, Role::Value, b'"', Escape::Backslash)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::Truncated));
    }

    #[test]
    fn test_skip_quoted() {
        let core = fresh();
        let mut source = Source::from_slice(br#"x\"yA"z"#);
        core.skip_quoted(&mut source, b'"', Escape::Backslash).unwrap();
        assert_eq!(source.next().unwrap(), b'z');

        let mut source = Source::from_slice(br#"\uZZZZ""#);
        let err = core
            .skip_quoted(&mut source, b'"', Escape::Backslash)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::MalformedEscape));
    }

    #[test]
    fn test_control_classes() {
        assert!(is_space(b'\n'));
        assert!(!is_control(b'\t'));
        assert!(is_control(0x01));
        assert!(is_control(0x7F));
        assert!(!is_control(b'a'));
    }
}
