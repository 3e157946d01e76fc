// SPDX-License-Identifier: Apache-2.0

//! Decoder for the XML-like markup format.
//!
//! Each element opens a scope keyed by its name (with an empty tag), its
//! attributes follow as `next(name, "", value)` and its text content as
//! `next("", "", text)`. Whitespace-only text between elements is dropped;
//! a CDATA section always produces text.
//!
//! Processing instructions, comments and `<!...>` declarations are skipped.
//! Entity references `&lt; &gt; &amp; &apos; &quot; &sol; &num; &equal;`
//! and numeric `&#NN;`/`&#xHH;` are decoded in names, attribute values and
//! text.

use crate::decoder::{Decoder, Format, Options};
use crate::escape_processor::EscapeProcessor;
use crate::parse_error::{ErrKind, ParseError};
use crate::parser_core::{is_control, is_space, ParserCore, Role};
use crate::scratch::Slip;
use crate::sink::{NodeStack, Sink};
use crate::source::Source;
use crate::state::{ScopeKind, SubState};

/// Longest entity name accepted between `&` and `;`.
const MAX_ENTITY: usize = 12;

/// Bytes allowed in element and attribute names, besides entities.
fn is_name(byte: u8) -> bool {
    !is_space(byte)
        && !is_control(byte)
        && !matches!(
            byte,
            b'<' | b'>' | b'/' | b'=' | b'&' | b'"' | b'\'' | b'!' | b'?'
        )
}

/// Bytes copied verbatim into text content.
fn is_text(byte: u8) -> bool {
    byte != b'<' && byte != b'&' && !is_control(byte)
}

fn radix(digits: &[u8], base: u32) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    let mut code_point = 0u32;
    for &digit in digits {
        code_point = code_point * base + char::from(digit).to_digit(base)?;
        if code_point > 0x10FFFF {
            return None;
        }
    }
    Some(code_point)
}

/// Decodes the entity reference whose `&` was just read into its UTF-8
/// bytes.
fn reference(core: &ParserCore, source: &mut Source<'_>) -> Result<([u8; 4], usize), ParseError> {
    let mut name = [0u8; MAX_ENTITY];
    let mut len = 0;
    loop {
        let byte = core.next_byte(source)?;
        if byte == b';' {
            break;
        }
        if len == name.len() || !(byte.is_ascii_alphanumeric() || byte == b'#') {
            return core.fail(ErrKind::MalformedEscape, Some(byte), source);
        }
        name[len] = byte;
        len += 1;
    }
    let code_point = match &name[..len] {
        b"lt" => Some(u32::from(b'<')),
        b"gt" => Some(u32::from(b'>')),
        b"amp" => Some(u32::from(b'&')),
        b"apos" => Some(u32::from(b'\'')),
        b"quot" => Some(u32::from(b'"')),
        b"sol" => Some(u32::from(b'/')),
        b"num" => Some(u32::from(b'#')),
        b"equal" => Some(u32::from(b'=')),
        [b'#', b'x' | b'X', digits @ ..] => radix(digits, 16),
        [b'#', digits @ ..] => radix(digits, 10),
        _ => None,
    };
    let Some(code_point) = code_point else {
        return core.fail(ErrKind::MalformedEscape, None, source);
    };
    let mut buffer = [0u8; 4];
    let size = match EscapeProcessor::encode_code_point(code_point, &mut buffer) {
        Some(bytes) => bytes.len(),
        None => return core.fail(ErrKind::MalformedEscape, None, source),
    };
    Ok((buffer, size))
}

/// Reads a name beginning with `first` into the key buffer and returns the
/// byte that ended it.
fn read_name(core: &mut ParserCore, source: &mut Source<'_>, first: u8) -> Result<u8, ParseError> {
    let mut byte = first;
    loop {
        match byte {
            b'&' => {
                let (bytes, size) = reference(core, source)?;
                core.alias.extend(&bytes[..size]);
            }
            b if is_name(b) => {
                core.alias.append(b);
                core.copy_run(source, Role::Alias, is_name)?;
            }
            b if core.alias.is_empty() => return core.fail(ErrKind::UnexpectedByte, Some(b), source),
            b => return Ok(b),
        }
        byte = core.next_byte(source)?;
    }
}

fn skip_spaces(core: &ParserCore, source: &mut Source<'_>, mut byte: u8) -> Result<u8, ParseError> {
    while is_space(byte) {
        byte = core.next_byte(source)?;
    }
    Ok(byte)
}

/// Reads an attribute value whose opening `quote` was just read.
fn attribute_value(core: &mut ParserCore, source: &mut Source<'_>, quote: u8) -> Result<(), ParseError> {
    loop {
        match core.next_byte(source)? {
            b if b == quote => return Ok(()),
            b'&' => {
                let (bytes, size) = reference(core, source)?;
                core.value.extend(&bytes[..size]);
            }
            b'<' => return core.fail(ErrKind::UnexpectedByte, Some(b'<'), source),
            b if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
            b => core.value.append(b),
        }
    }
}

/// `<?` was read.
fn skip_instruction(core: &ParserCore, source: &mut Source<'_>) -> Result<(), ParseError> {
    let mut previous = 0;
    loop {
        let byte = core.next_byte(source)?;
        if previous == b'?' && byte == b'>' {
            return Ok(());
        }
        previous = byte;
    }
}

/// `<!--` was read.
fn skip_comment(core: &ParserCore, source: &mut Source<'_>) -> Result<(), ParseError> {
    let mut dashes = 0;
    loop {
        match core.next_byte(source)? {
            b'-' => dashes += 1,
            b'>' if dashes >= 2 => return Ok(()),
            _ => dashes = 0,
        }
    }
}

/// `<!` followed by anything but a comment or CDATA, as in `<!DOCTYPE ...>`.
fn skip_declaration(core: &ParserCore, source: &mut Source<'_>) -> Result<(), ParseError> {
    let mut depth = 0usize;
    loop {
        match core.next_byte(source)? {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            quote @ (b'"' | b'\'') => {
                while core.next_byte(source)? != quote {}
            }
            b'>' if depth == 0 => return Ok(()),
            _ => {}
        }
    }
}

/// A decoder for the XML-like markup format.
#[derive(Debug)]
pub struct DocDecoder {
    core: ParserCore,
    /// Names of the open elements, back to back.
    names: Vec<u8>,
    /// Start of each open element's name in `names`.
    marks: Vec<usize>,
    /// Set by a CDATA section: the pending text is delivered even if blank.
    forced: bool,
}

impl DocDecoder {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            core: ParserCore::new(&options),
            names: Vec::with_capacity(options.space_capacity),
            marks: Vec::new(),
            forced: false,
        }
    }

    fn reset(&mut self) {
        self.core.clear();
        self.names.clear();
        self.marks.clear();
        self.forced = false;
    }

    fn run<S: Sink>(&mut self, source: &mut Source<'_>, nodes: &mut NodeStack<'_, S>) -> Result<(), ParseError> {
        loop {
            if !source.also()? {
                return self.end_of_input(source);
            }
            let byte = source.read();
            let core = &mut self.core;
            match (core.state, byte) {
                (_, b'<') => self.markup(source, nodes)?,
                (SubState::InValue, b'&') => {
                    let (bytes, size) = reference(core, source)?;
                    core.value.extend(&bytes[..size]);
                }
                (SubState::InValue, b) if is_text(b) => {
                    core.value.append(b);
                    core.copy_run(source, Role::Value, is_text)?;
                }
                (_, b) if is_control(b) => return core.fail(ErrKind::ControlByte, Some(b), source),
                (_, b) if is_space(b) => {}
                (SubState::Trailing, b) => return core.fail(ErrKind::TrailingData, Some(b), source),
                (_, b) => return core.fail(ErrKind::UnexpectedByte, Some(b), source),
            }
        }
    }

    fn end_of_input(&self, source: &Source<'_>) -> Result<(), ParseError> {
        if self.marks.is_empty() {
            Ok(())
        } else {
            self.core.fail(ErrKind::Truncated, None, source)
        }
    }

    /// Dispatches on the byte after a `<`.
    fn markup<S: Sink>(&mut self, source: &mut Source<'_>, nodes: &mut NodeStack<'_, S>) -> Result<(), ParseError> {
        match self.core.next_byte(source)? {
            b'?' => skip_instruction(&self.core, source),
            b'!' => self.declaration(source, true),
            b'/' => {
                self.flush_text(nodes)?;
                self.end_tag(source, nodes, true)?;
                self.resume();
                Ok(())
            }
            first => {
                if self.core.state == SubState::Trailing {
                    return self.core.fail(ErrKind::TrailingData, Some(b'<'), source);
                }
                self.flush_text(nodes)?;
                let (accepted, stop) = self.open_element(source, nodes, first, true)?;
                let open = self.attributes(source, nodes, stop, accepted)?;
                if open && accepted {
                    self.core.state = SubState::InValue;
                    return Ok(());
                }
                if open {
                    log::debug!("skipping declined element at {}", source.position());
                    self.core.state = SubState::Skipping;
                    self.wipe(source, nodes)?;
                } else {
                    self.pop_element(source, nodes, accepted)?;
                }
                self.resume();
                Ok(())
            }
        }
    }

    /// Handles `<!`: comments are dropped, CDATA is kept as text when
    /// `keep` is set, anything else is skipped as a declaration.
    fn declaration(&mut self, source: &mut Source<'_>, keep: bool) -> Result<(), ParseError> {
        let core = &mut self.core;
        match core.next_byte(source)? {
            b'-' => match core.next_byte(source)? {
                b'-' => skip_comment(core, source),
                b => core.fail(ErrKind::UnexpectedByte, Some(b), source),
            },
            b'[' => {
                for &expected in b"CDATA[" {
                    let byte = core.next_byte(source)?;
                    if byte != expected {
                        return core.fail(ErrKind::UnexpectedByte, Some(byte), source);
                    }
                }
                if keep && core.state != SubState::InValue {
                    return core.fail(ErrKind::UnexpectedByte, Some(b'['), source);
                }
                let mut brackets = 0;
                loop {
                    let byte = core.next_byte(source)?;
                    match byte {
                        b']' => brackets += 1,
                        b'>' if brackets >= 2 => {
                            if keep {
                                for _ in 2..brackets {
                                    core.value.append(b']');
                                }
                                self.forced = true;
                            }
                            return Ok(());
                        }
                        _ => {
                            if keep {
                                for _ in 0..brackets {
                                    core.value.append(b']');
                                }
                                core.value.append(byte);
                            }
                            brackets = 0;
                        }
                    }
                }
            }
            _ => skip_declaration(core, source),
        }
    }

    /// Delivers pending text content, unless it is only whitespace.
    fn flush_text<S: Sink>(&mut self, nodes: &mut NodeStack<'_, S>) -> Result<(), ParseError> {
        let core = &mut self.core;
        if self.forced || core.value.as_bytes().iter().any(|&b| !is_space(b)) {
            core.emit(nodes, None)?;
        } else {
            core.value.clear();
        }
        self.forced = false;
        Ok(())
    }

    /// Reads a start tag's name, whose first byte is `first`, and opens the
    /// element. Returns whether the sink accepted it (never when `deliver`
    /// is unset) and the byte that ended the name.
    fn open_element<S: Sink>(
        &mut self,
        source: &mut Source<'_>,
        nodes: &mut NodeStack<'_, S>,
        first: u8,
        deliver: bool,
    ) -> Result<(bool, u8), ParseError> {
        let stop = read_name(&mut self.core, source, first)?;
        let core = &mut self.core;
        core.nesting
            .enter(ScopeKind::Element, b'<', source.position(), core.state)?;
        let start = self.names.len();
        self.marks.push(start);
        self.names.extend_from_slice(core.alias.as_bytes());
        core.alias.clear();
        core.state = SubState::InTag;
        let accepted = deliver && nodes.open(Slip::new(&self.names[start..]), Slip::default())?;
        Ok((accepted, stop))
    }

    /// Reads the attributes of a start tag, starting at `byte`. Returns
    /// true when the tag ended with `>` and false for `/>`.
    fn attributes<S: Sink>(
        &mut self,
        source: &mut Source<'_>,
        nodes: &mut NodeStack<'_, S>,
        mut byte: u8,
        deliver: bool,
    ) -> Result<bool, ParseError> {
        let core = &mut self.core;
        loop {
            match byte {
                b if is_space(b) => {}
                b'>' => return Ok(true),
                b'/' => {
                    return match core.next_byte(source)? {
                        b'>' => Ok(false),
                        b => core.fail(ErrKind::UnexpectedByte, Some(b), source),
                    }
                }
                b => {
                    core.state = SubState::InKey;
                    let stop = read_name(core, source, b)?;
                    let stop = skip_spaces(core, source, stop)?;
                    if stop != b'=' {
                        return core.fail(ErrKind::MissingSeparator, Some(stop), source);
                    }
                    core.state = SubState::BeforeValue;
                    let next = core.next_byte(source)?;
                    let quote = skip_spaces(core, source, next)?;
                    if quote != b'"' && quote != b'\'' {
                        return core.fail(ErrKind::MissingValue, Some(quote), source);
                    }
                    core.state = SubState::InQuotedValue;
                    attribute_value(core, source, quote)?;
                    if deliver {
                        core.emit(nodes, None)?;
                    } else {
                        core.alias.clear();
                        core.value.clear();
                    }
                    core.state = SubState::InTag;
                }
            }
            byte = core.next_byte(source)?;
        }
    }

    /// Reads an end tag whose `</` was just read and closes the innermost
    /// element, which must carry the same name.
    fn end_tag<S: Sink>(
        &mut self,
        source: &mut Source<'_>,
        nodes: &mut NodeStack<'_, S>,
        accepted: bool,
    ) -> Result<(), ParseError> {
        let Some(&start) = self.marks.last() else {
            return self.core.fail(ErrKind::UnopenedScope, Some(b'/'), source);
        };
        let core = &mut self.core;
        let first = core.next_byte(source)?;
        let stop = read_name(core, source, first)?;
        if core.alias.as_bytes() != &self.names[start..] {
            return core.fail(ErrKind::TagMismatch, Some(stop), source);
        }
        core.alias.clear();
        match skip_spaces(core, source, stop)? {
            b'>' => self.pop_element(source, nodes, accepted),
            b => core.fail(ErrKind::UnexpectedByte, Some(b), source),
        }
    }

    fn pop_element<S: Sink>(
        &mut self,
        source: &Source<'_>,
        nodes: &mut NodeStack<'_, S>,
        accepted: bool,
    ) -> Result<(), ParseError> {
        let core = &mut self.core;
        core.nesting
            .exit(ScopeKind::Element, b'>', source.position().saturating_sub(1), core.state)?;
        if accepted {
            nodes.close()?;
        }
        if let Some(start) = self.marks.pop() {
            self.names.truncate(start);
        }
        Ok(())
    }

    /// Content state once an element has ended.
    fn resume(&mut self) {
        self.core.state = if self.marks.is_empty() {
            SubState::Trailing
        } else {
            SubState::InValue
        };
    }

    /// Consumes the content of a declined element, whose start tag was
    /// just read, through its end tag. Nested names are still matched.
    fn wipe<S: Sink>(&mut self, source: &mut Source<'_>, nodes: &mut NodeStack<'_, S>) -> Result<(), ParseError> {
        let base = self.marks.len() - 1;
        while self.marks.len() > base {
            match self.core.next_byte(source)? {
                b'<' => match self.core.next_byte(source)? {
                    b'?' => skip_instruction(&self.core, source)?,
                    b'!' => self.declaration(source, false)?,
                    b'/' => self.end_tag(source, nodes, false)?,
                    first => {
                        let (_, stop) = self.open_element(source, nodes, first, false)?;
                        if !self.attributes(source, nodes, stop, false)? {
                            self.pop_element(source, nodes, false)?;
                        }
                        self.core.state = SubState::Skipping;
                    }
                },
                b'&' => {
                    reference(&self.core, source)?;
                }
                b if is_control(b) => return self.core.fail(ErrKind::ControlByte, Some(b), source),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for DocDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DocDecoder {
    fn format(&self) -> Format {
        Format::Doc
    }

    fn decode<S: Sink>(&mut self, source: &mut Source<'_>, sink: &mut S) -> Result<(), ParseError> {
        self.reset();
        let mut nodes = NodeStack::new(sink);
        let result = self.run(source, &mut nodes);
        let result = self.core.finish(result, source, &mut nodes);
        self.reset();
        result
    }

    fn clear(&mut self) {
        self.reset();
    }
}
