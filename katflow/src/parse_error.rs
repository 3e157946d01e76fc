// SPDX-License-Identifier: Apache-2.0

use crate::sink::SinkError;
use crate::state::SubState;

/// The specific grammar rule a [`SyntaxError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrKind {
    /// A byte that has no meaning in the current sub-state.
    UnexpectedByte,
    /// An unquoted control byte.
    ControlByte,
    /// Invalid hex digit, unknown entity, or an escape cut short.
    MalformedEscape,
    /// A closer that does not match the kind of the innermost open scope.
    NestingMismatch,
    /// A closer with no open scope.
    UnopenedScope,
    /// Nesting went beyond the configured maximum depth.
    MaxDepthReached,
    /// Two tokens follow each other without a separator.
    MissingSeparator,
    /// A key or separator that is not followed by a value.
    MissingValue,
    /// End of input while a token, escape or scope was still open.
    Truncated,
    /// A markup end tag whose name differs from its start tag.
    TagMismatch,
    /// Content after the root value was complete.
    TrailingData,
}

/// A grammar violation, with enough decoder state attached to locate it.
#[derive(Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub kind: ErrKind,
    /// The offending byte, `None` when the input ended.
    pub byte: Option<u8>,
    /// Absolute byte offset from the start of the source.
    pub position: u64,
    pub state: SubState,
    /// Number of open scopes when the error was raised.
    pub depth: usize,
}

impl SyntaxError {
    pub(crate) fn new<T>(
        kind: ErrKind,
        byte: Option<u8>,
        position: u64,
        state: SubState,
        depth: usize,
    ) -> Result<T, ParseError> {
        Err(ParseError::Syntax(SyntaxError {
            kind,
            byte,
            position,
            state,
            depth,
        }))
    }
}

impl core::fmt::Debug for SyntaxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.byte {
            Some(byte) if byte.is_ascii_graphic() => write!(
                f,
                "{:?}({}) at {} [{:?}, depth {}]",
                self.kind, byte as char, self.position, self.state, self.depth
            ),
            Some(byte) => write!(
                f,
                "{:?}(0x{:02x}) at {} [{:?}, depth {}]",
                self.kind, byte, self.position, self.state, self.depth
            ),
            None => write!(
                f,
                "{:?}(EOF) at {} [{:?}, depth {}]",
                self.kind, self.position, self.state, self.depth
            ),
        }
    }
}

impl core::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Errors that can occur while reading or decoding
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The input broke the grammar of the format being decoded.
    #[error("syntax error: {0}")]
    Syntax(SyntaxError),
    /// A checked read ran past the end of the source.
    #[error("no more readable bytes")]
    EndOfData,
    /// A source was constructed over a range outside its input.
    #[error("range {offset}..{offset}+{length} is out of bounds for input of {size}")]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },
    /// Error from the underlying transport (not end-of-stream)
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    /// A sink callback refused the event.
    #[error("sink rejected event: {0}")]
    Sink(#[source] SinkError),
}

impl ParseError {
    /// The grammar rule that failed, if this is a syntax error.
    pub fn kind(&self) -> Option<ErrKind> {
        match self {
            ParseError::Syntax(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<SyntaxError> for ParseError {
    fn from(err: SyntaxError) -> Self {
        ParseError::Syntax(err)
    }
}
