// SPDX-License-Identifier: Apache-2.0

//! Decoder for the compact structural format.
//!
//! ```text
//! @User{id:1,name:kraity,tags:[a,b],pos:@Point(1,2)}
//! ```
//!
//! A value may carry an `@tag` before it. Objects `{}` hold `key:value`
//! members, lists `[]` and argument lists `()` hold plain values, and
//! closers must match their opener. Keys and values are bare or quoted
//! with `"`/`'`; `^` escapes (`^^ ^s ^b ^f ^t ^r ^n ^uXXXX`) work in
//! both. `#` starts a comment that runs to the next `#` or line end.
//!
//! Scopes without a tag are tagged with their opener byte, quoted values
//! with their quote byte; bare values have an empty tag unless one is
//! given.

use crate::decoder::{Decoder, Format, Options};
use crate::parse_error::{ErrKind, ParseError};
use crate::parser_core::{is_control, is_space, Escape, ParserCore, Role};
use crate::sink::{NodeStack, Sink};
use crate::source::Source;
use crate::state::{ScopeKind, SubState};

/// Bytes with structural meaning outside of quotes.
fn is_structural(byte: u8) -> bool {
    matches!(
        byte,
        b'{' | b'}' | b'[' | b']' | b'(' | b')' | b':' | b',' | b'#' | b'@' | b'"' | b'\'' | b'^'
    )
}

/// Bytes that may appear unescaped in a tag.
fn is_plain(byte: u8) -> bool {
    !is_structural(byte) && !is_space(byte) && !is_control(byte)
}

/// Bytes that may appear unescaped in a bare key.
fn in_key(byte: u8) -> bool {
    is_plain(byte) || byte == b'#' || byte == b'@'
}

/// Bytes that may appear unescaped in a bare value.
fn in_value(byte: u8) -> bool {
    in_key(byte) || byte == b':'
}

/// Consumes a comment whose `#` was just read.
fn skip_comment(source: &mut Source<'_>) -> Result<(), ParseError> {
    loop {
        if !source.also()? {
            return Ok(());
        }
        let chunk = source.chunk();
        match memchr::memchr3(b'#', b'\n', b'\r', chunk) {
            Some(at) => {
                source.consume(at + 1);
                return Ok(());
            }
            None => {
                let run = chunk.len();
                source.consume(run);
            }
        }
    }
}

/// A decoder for the compact structural format.
#[derive(Debug)]
pub struct KatDecoder {
    core: ParserCore,
}

impl KatDecoder {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            core: ParserCore::new(&options),
        }
    }

    fn run<S: Sink>(&mut self, source: &mut Source<'_>, nodes: &mut NodeStack<'_, S>) -> Result<(), ParseError> {
        let core = &mut self.core;
        loop {
            if !source.also()? {
                return Self::end_of_input(core, source, nodes);
            }
            let byte = source.read();
            match (core.state, byte) {
                (SubState::InValue, b) if is_space(b) => {
                    core.emit(nodes, None)?;
                    core.state = if core.nesting.is_empty() {
                        SubState::Trailing
                    } else {
                        SubState::BetweenTokens
                    };
                }
                (SubState::InKey, b) if is_space(b) => core.state = SubState::AfterKey,
                (SubState::InTag, b) if is_space(b) => {
                    if core.space.is_empty() {
                        return core.fail(ErrKind::UnexpectedByte, Some(b), source);
                    }
                    core.state = SubState::BeforeValue;
                }
                (_, b) if is_space(b) => {}

                (SubState::InValue, b) if in_value(b) => {
                    core.push(Role::Value, b);
                    core.copy_run(source, Role::Value, in_value)?;
                }
                (SubState::InKey, b) if in_key(b) => {
                    core.push(Role::Alias, b);
                    core.copy_run(source, Role::Alias, in_key)?;
                }
                (SubState::InTag, b) if is_plain(b) => {
                    core.push(Role::Space, b);
                    core.copy_run(source, Role::Space, is_plain)?;
                }
                (SubState::InValue, b'^') => core.unescape(source, Role::Value, Escape::Caret)?,
                (SubState::InKey, b'^') => core.unescape(source, Role::Alias, Escape::Caret)?,
                (SubState::InTag, b'^') => core.unescape(source, Role::Space, Escape::Caret)?,

                (
                    SubState::BeforeKey
                    | SubState::AfterKey
                    | SubState::BeforeValue
                    | SubState::BetweenTokens
                    | SubState::PostClose
                    | SubState::Trailing,
                    b'#',
                ) => skip_comment(source)?,

                (SubState::BeforeValue, b'@') if core.space.is_empty() => core.state = SubState::InTag,
                (SubState::BeforeValue | SubState::InTag, b'{' | b'[' | b'(') => {
                    if core.state == SubState::InTag && core.space.is_empty() {
                        return core.fail(ErrKind::UnexpectedByte, Some(byte), source);
                    }
                    let kind = ScopeKind::from_opener(byte).unwrap_or(ScopeKind::Object);
                    if core.open(nodes, source, kind, byte, Some(byte))? {
                        core.state = if kind.is_keyed() {
                            SubState::BeforeKey
                        } else {
                            SubState::BeforeValue
                        };
                    } else {
                        log::debug!("skipping declined scope at {}", source.position());
                        core.state = SubState::Skipping;
                        Self::wipe(core, source)?;
                        core.after_scope();
                    }
                }
                (SubState::BeforeValue | SubState::InTag, b'"' | b'\'') => {
                    core.state = SubState::InQuotedValue;
                    core.quoted(source, Role::Value, byte, Escape::Caret)?;
                    core.emit(nodes, Some(byte))?;
                    core.after_scope();
                }
                (SubState::BeforeValue, b'^') => {
                    core.state = SubState::InValue;
                    core.unescape(source, Role::Value, Escape::Caret)?;
                }
                (SubState::BeforeValue, b) if is_plain(b) => {
                    core.state = SubState::InValue;
                    core.push(Role::Value, b);
                    core.copy_run(source, Role::Value, in_value)?;
                }

                (SubState::BeforeKey, b'"' | b'\'') => {
                    core.state = SubState::InKey;
                    core.quoted(source, Role::Alias, byte, Escape::Caret)?;
                    core.state = SubState::AfterKey;
                }
                (SubState::BeforeKey, b'^') => {
                    core.state = SubState::InKey;
                    core.unescape(source, Role::Alias, Escape::Caret)?;
                }
                (SubState::BeforeKey, b) if is_plain(b) => {
                    core.state = SubState::InKey;
                    core.push(Role::Alias, b);
                    core.copy_run(source, Role::Alias, in_key)?;
                }
                (SubState::InKey | SubState::AfterKey, b':') => core.state = SubState::BeforeValue,

                (SubState::InValue, b',') => {
                    core.emit(nodes, None)?;
                    core.after_comma(source)?;
                }
                (SubState::BetweenTokens | SubState::PostClose, b',') => core.after_comma(source)?,

                (SubState::InValue, b'}' | b']' | b')') => {
                    core.emit(nodes, None)?;
                    Self::close(core, nodes, source, byte)?;
                }
                (SubState::BeforeKey, b'}') => Self::close(core, nodes, source, byte)?,
                (SubState::BeforeValue | SubState::InTag, b'}' | b']' | b')') if !core.space.is_empty() => {
                    return core.fail(ErrKind::MissingValue, Some(byte), source);
                }
                (SubState::BeforeValue, b'}') if core.nesting.top() == Some(ScopeKind::Object) => {
                    return core.fail(ErrKind::MissingValue, Some(byte), source);
                }
                (
                    SubState::BeforeValue | SubState::BetweenTokens | SubState::PostClose | SubState::Trailing,
                    b'}' | b']' | b')',
                ) => Self::close(core, nodes, source, byte)?,

                (_, b) if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
                (SubState::Trailing, b) => return core.fail(ErrKind::TrailingData, Some(b), source),
                (SubState::BetweenTokens | SubState::PostClose | SubState::AfterKey, b) => {
                    return core.fail(ErrKind::MissingSeparator, Some(b), source)
                }
                (_, b) => return core.fail(ErrKind::UnexpectedByte, Some(b), source),
            }
        }
    }

    fn close<S: Sink>(
        core: &mut ParserCore,
        nodes: &mut NodeStack<'_, S>,
        source: &Source<'_>,
        closer: u8,
    ) -> Result<(), ParseError> {
        let kind = ScopeKind::from_closer(closer).unwrap_or(ScopeKind::Object);
        core.close(nodes, source, kind, closer)
    }

    fn end_of_input<S: Sink>(
        core: &mut ParserCore,
        source: &Source<'_>,
        nodes: &mut NodeStack<'_, S>,
    ) -> Result<(), ParseError> {
        if !core.nesting.is_empty() {
            return core.fail(ErrKind::Truncated, None, source);
        }
        match core.state {
            SubState::InValue => {
                core.emit(nodes, None)?;
                core.state = SubState::Trailing;
                Ok(())
            }
            SubState::Trailing => Ok(()),
            SubState::BeforeValue if core.space.is_empty() => Ok(()),
            _ => core.fail(ErrKind::Truncated, None, source),
        }
    }

    /// Consumes the rest of a declined scope, whose opener was just read,
    /// through its matching closer.
    fn wipe(core: &mut ParserCore, source: &mut Source<'_>) -> Result<(), ParseError> {
        let base = core.nesting.depth() - 1;
        // Whether a `#` here would start a comment rather than sit in a token
        let mut boundary = true;
        while core.nesting.depth() > base {
            let byte = core.next_byte(source)?;
            let position = source.position() - 1;
            match byte {
                b'{' | b'[' | b'(' => {
                    let kind = ScopeKind::from_opener(byte).unwrap_or(ScopeKind::Object);
                    core.nesting.enter(kind, byte, position, core.state)?;
                    boundary = true;
                }
                b'}' | b']' | b')' => {
                    let kind = ScopeKind::from_closer(byte).unwrap_or(ScopeKind::Object);
                    core.nesting.exit(kind, byte, position, core.state)?;
                    boundary = true;
                }
                b'"' | b'\'' => {
                    core.skip_quoted(source, byte, Escape::Caret)?;
                    boundary = true;
                }
                b'^' => {
                    core.skip_escape(source)?;
                    boundary = false;
                }
                b'#' if boundary => skip_comment(source)?,
                b',' | b':' => boundary = true,
                b if is_space(b) => boundary = true,
                b if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
                _ => boundary = false,
            }
        }
        Ok(())
    }
}

impl Default for KatDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for KatDecoder {
    fn format(&self) -> Format {
        Format::Kat
    }

    fn decode<S: Sink>(&mut self, source: &mut Source<'_>, sink: &mut S) -> Result<(), ParseError> {
        self.core.clear();
        let mut nodes = NodeStack::new(sink);
        let result = self.run(source, &mut nodes);
        self.core.finish(result, source, &mut nodes)
    }

    fn clear(&mut self) {
        self.core.clear();
    }
}
