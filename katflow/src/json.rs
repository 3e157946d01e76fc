// SPDX-License-Identifier: Apache-2.0

//! Decoder for the JSON-like format.
//!
//! Keys are single- or double-quoted strings; scalars are either quoted
//! strings (tagged with their quote byte) or bare tokens made of
//! `+ - . 0-9 a e E f l n r s t u` (untagged). Objects and arrays are
//! tagged with their opening bracket. Trailing commas are tolerated.

use crate::decoder::{Decoder, Format, Options};
use crate::parse_error::{ErrKind, ParseError};
use crate::parser_core::{is_control, Escape, ParserCore, Role};
use crate::sink::{NodeStack, Sink};
use crate::source::Source;
use crate::state::{ScopeKind, SubState};

/// Bytes allowed in an unquoted token.
fn is_bare(byte: u8) -> bool {
    matches!(
        byte,
        b'+' | b'-' | b'.' | b'0'..=b'9' | b'a' | b'e' | b'E' | b'f' | b'l' | b'n' | b'r' | b's' | b't' | b'u'
    )
}

/// A decoder for the JSON-like format.
///
/// # Example
///
/// ```rust
/// use katflow::{Decoder, JsonDecoder, Source};
/// # use katflow::{Sink, SinkError, Slip};
/// # struct Count(usize);
/// # impl Sink for Count {
/// #     type Node = ();
/// #     fn on_open(&mut self, _: Option<&mut ()>, _: Slip<'_>, _: Slip<'_>) -> Result<Option<()>, SinkError> { Ok(Some(())) }
/// #     fn on_next(&mut self, _: Option<&mut ()>, _: Slip<'_>, _: Slip<'_>, _: Slip<'_>) -> Result<(), SinkError> { self.0 += 1; Ok(()) }
/// #     fn on_close(&mut self, _: (), _: Option<&mut ()>, _: bool, _: bool) -> Result<(), SinkError> { Ok(()) }
/// # }
///
/// let mut decoder = JsonDecoder::new();
/// let mut sink = Count(0);
/// decoder
///     .decode(&mut Source::from_text(r#"{"a":1,"b":[2,3]}"#), &mut sink)
///     .unwrap();
/// assert_eq!(sink.0, 3);
/// ```
#[derive(Debug)]
pub struct JsonDecoder {
    core: ParserCore,
}

impl JsonDecoder {
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
                (SubState::InValue, b' ' | b'\t' | b'\n' | b'\r') => {
                    core.emit(nodes, None)?;
                    core.state = if core.nesting.is_empty() {
                        SubState::Trailing
                    } else {
                        SubState::BetweenTokens
                    };
                }
                (_, b' ' | b'\t' | b'\n' | b'\r') => {}

                (SubState::BeforeKey, b'"' | b'\'') => {
                    core.state = SubState::InKey;
                    core.quoted(source, Role::Alias, byte, Escape::Backslash)?;
                    core.state = SubState::AfterKey;
                }
                (SubState::AfterKey, b':') => core.state = SubState::BeforeValue,

                (SubState::BeforeValue, b'{' | b'[') => {
                    let kind = if byte == b'{' {
                        ScopeKind::Object
                    } else {
                        ScopeKind::List
                    };
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
                (SubState::BeforeValue, b'"' | b'\'') => {
                    core.state = SubState::InQuotedValue;
                    core.quoted(source, Role::Value, byte, Escape::Backslash)?;
                    core.emit(nodes, Some(byte))?;
                    core.after_scope();
                }
                (SubState::BeforeValue | SubState::InValue, b) if is_bare(b) => {
                    core.value.append(b);
                    core.state = SubState::InValue;
                }

                (SubState::InValue, b',') => {
                    core.emit(nodes, None)?;
                    core.after_comma(source)?;
                }
                (SubState::BetweenTokens | SubState::PostClose, b',') => core.after_comma(source)?,

                // An empty array, or a trailing comma before the closer
                (SubState::BeforeValue, b']') if core.nesting.top() == Some(ScopeKind::List) => {
                    core.close(nodes, source, ScopeKind::List, byte)?;
                }
                (SubState::BeforeValue, b'}') if core.nesting.top() == Some(ScopeKind::Object) => {
                    return core.fail(ErrKind::MissingValue, Some(byte), source);
                }
                (SubState::BeforeKey, b'}') => core.close(nodes, source, ScopeKind::Object, byte)?,
                (SubState::InValue, b'}' | b']') => {
                    core.emit(nodes, None)?;
                    let kind = ScopeKind::from_closer(byte).unwrap_or(ScopeKind::Object);
                    core.close(nodes, source, kind, byte)?;
                }
                (
                    SubState::BetweenTokens | SubState::PostClose | SubState::Trailing | SubState::BeforeValue,
                    b'}' | b']',
                ) => {
                    let kind = ScopeKind::from_closer(byte).unwrap_or(ScopeKind::Object);
                    core.close(nodes, source, kind, byte)?;
                }

                (_, b) if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
                (SubState::Trailing, b) => return core.fail(ErrKind::TrailingData, Some(b), source),
                (SubState::BetweenTokens | SubState::PostClose | SubState::AfterKey, b) => {
                    return core.fail(ErrKind::MissingSeparator, Some(b), source)
                }
                (_, b) => return core.fail(ErrKind::UnexpectedByte, Some(b), source),
            }
        }
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
            SubState::Trailing | SubState::BeforeValue => Ok(()),
            _ => core.fail(ErrKind::Truncated, None, source),
        }
    }

    /// Consumes the rest of a declined scope, whose opener was just read,
    /// through its matching closer.
    fn wipe(core: &mut ParserCore, source: &mut Source<'_>) -> Result<(), ParseError> {
        let base = core.nesting.depth() - 1;
        while core.nesting.depth() > base {
            let byte = core.next_byte(source)?;
            let position = source.position() - 1;
            match byte {
                b'{' => core.nesting.enter(ScopeKind::Object, byte, position, core.state)?,
                b'[' => core.nesting.enter(ScopeKind::List, byte, position, core.state)?,
                b'}' => core.nesting.exit(ScopeKind::Object, byte, position, core.state)?,
                b']' => core.nesting.exit(ScopeKind::List, byte, position, core.state)?,
                b'"' | b'\'' => core.skip_quoted(source, byte, Escape::Backslash)?,
                b if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonDecoder {
    fn format(&self) -> Format {
        Format::Json
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::Slip;
    use crate::sink::SinkError;

    #[derive(Default)]
    struct Events(Vec<String>);

    impl Sink for Events {
        type Node = ();

        fn on_open(&mut self, _: Option<&mut ()>, key: Slip<'_>, tag: Slip<'_>) -> Result<Option<()>, SinkError> {
            self.0.push(format!("open({key},{tag})"));
            Ok(Some(()))
        }

        fn on_next(
            &mut self,
            _: Option<&mut ()>,
            key: Slip<'_>,
            tag: Slip<'_>,
            value: Slip<'_>,
        ) -> Result<(), SinkError> {
            self.0.push(format!("next({key},{tag},{value})"));
            Ok(())
        }

        fn on_close(&mut self, _: (), _: Option<&mut ()>, aborted: bool, _: bool) -> Result<(), SinkError> {
            self.0.push(if aborted { "abort" } else { "close" }.to_string());
            Ok(())
        }
    }

    fn events(input: &str) -> Result<Vec<String>, ParseError> {
        let mut sink = Events::default();
        JsonDecoder::new().decode(&mut Source::from_text(input), &mut sink)?;
        Ok(sink.0)
    }

    #[test]
    fn test_object_with_array() {
        assert_eq!(
            events(r#"{"a":1,"b":[2,3]}"#).unwrap(),
            [
                "open(,{)",
                "next(a,,1)",
                "open(b,[)",
                "next(,,2)",
                "next(,,3)",
                "close",
                "close"
            ]
        );
    }

    #[test]
    fn test_quoted_values_tagged_with_quote() {
        assert_eq!(
            events(r#" { "name" : "kraity" , 'alt':'x' } "#).unwrap(),
            ["open(,{)", "next(name,\",kraity)", "next(alt,',x)", "close"]
        );
    }

    #[test]
    fn test_literals_and_numbers() {
        assert_eq!(
            events("[true, false ,null,-1.5e+3,2E8]").unwrap(),
            [
                "open(,[)",
                "next(,,true)",
                "next(,,false)",
                "next(,,null)",
                "next(,,-1.5e+3)",
                "next(,,2E8)",
                "close"
            ]
        );
    }

    #[test]
    fn test_root_scalars() {
        assert_eq!(events("42").unwrap(), ["next(,,42)"]);
        assert_eq!(events(" \"hi\" ").unwrap(), ["next(,\",hi)"]);
        assert!(events("").unwrap().is_empty());
        assert!(events("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_commas_tolerated() {
        assert_eq!(
            events(r#"{"a":[1,],}"#).unwrap(),
            ["open(,{)", "open(a,[)", "next(,,1)", "close", "close"]
        );
        assert_eq!(events("[]").unwrap(), ["open(,[)", "close"]);
        assert_eq!(events("{}").unwrap(), ["open(,{)", "close"]);
    }

    #[test]
    fn test_grammar_errors() {
        let kind = |input: &str| events(input).unwrap_err().kind();
        assert_eq!(kind(r#"{a:1}"#), Some(ErrKind::UnexpectedByte));
        assert_eq!(kind(r#"{"a" 1}"#), Some(ErrKind::MissingSeparator));
        assert_eq!(kind(r#"{"a":}"#), Some(ErrKind::MissingValue));
        assert_eq!(kind(r#"[1,,2]"#), Some(ErrKind::UnexpectedByte));
        assert_eq!(kind(r#"[1 2]"#), Some(ErrKind::MissingSeparator));
        assert_eq!(kind(r#"[x]"#), Some(ErrKind::UnexpectedByte));
        assert_eq!(kind("[\u{1}]"), Some(ErrKind::ControlByte));
        assert_eq!(kind(r#"{} {}"#), Some(ErrKind::TrailingData));
        assert_eq!(kind(r#"1 2"#), Some(ErrKind::TrailingData));
    }

    #[test]
    fn test_nesting_errors() {
        let kind = |input: &str| events(input).unwrap_err().kind();
        assert_eq!(kind(r#"[1}"#), Some(ErrKind::NestingMismatch));
        assert_eq!(kind(r#"{"a":[}"#), Some(ErrKind::NestingMismatch));
        assert_eq!(kind(r#"{}}"#), Some(ErrKind::UnopenedScope));
        assert_eq!(kind(r#"]"#), Some(ErrKind::UnopenedScope));
        assert_eq!(kind(r#"{"a":1"#), Some(ErrKind::Truncated));
        assert_eq!(kind(r#"{"a"#), Some(ErrKind::Truncated));
    }

    #[test]
    fn test_truncation_closes_open_scopes() {
        let mut sink = Events::default();
        let err = JsonDecoder::new()
            .decode(&mut Source::from_text(r#"{"a":{"b":[1"#), &mut sink)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::Truncated));
        assert_eq!(&sink.0[sink.0.len() - 3..], ["abort", "abort", "abort"]);
    }

    #[test]
    fn test_max_depth() {
        let mut decoder = JsonDecoder::with_options(Options {
            max_depth: 3,
            ..Options::default()
        });
        let mut sink = Events::default();
        decoder
            .decode(&mut Source::from_text("[[[]]]"), &mut sink)
            .unwrap();
        let err = decoder
            .decode(&mut Source::from_text("[[[[]]]]"), &mut Events::default())
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrKind::MaxDepthReached));
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(
            events(r#"["\u0041","\uD83D\uDE00","\uD83D"]"#).unwrap(),
            [
                "open(,[)",
                "next(,\",A)",
                "next(,\",😀)",
                "next(,\",?)",
                "close"
            ]
        );
    }
}
