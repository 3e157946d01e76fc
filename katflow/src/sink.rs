// SPDX-License-Identifier: Apache-2.0

//! The push interface decoders drive, and the node stack that drives it.

use crate::parse_error::ParseError;
use crate::scratch::Slip;

/// Error type a sink may return to abort the decode.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of decode events.
///
/// Events form a tree walk: [`Sink::on_open`] starts a scope and returns a
/// node for it, [`Sink::on_next`] delivers a scalar into the innermost
/// node, and [`Sink::on_close`] ends a node. `parent`/`node` arguments are
/// `None` at the top level.
///
/// The `key`, `tag` and `value` views borrow the decoder's scratch
/// buffers and are only valid for the duration of the call.
///
/// Every node returned from `on_open` is passed to `on_close` exactly once,
/// innermost first, including when the decode fails part way.
pub trait Sink {
    /// Handle for an open scope.
    type Node;

    /// A nested scope begins. Returning `Ok(None)` declines the scope: its
    /// whole subtree is consumed without any further events.
    fn on_open(
        &mut self,
        parent: Option<&mut Self::Node>,
        key: Slip<'_>,
        tag: Slip<'_>,
    ) -> Result<Option<Self::Node>, SinkError>;

    /// A scalar leaf.
    fn on_next(
        &mut self,
        node: Option<&mut Self::Node>,
        key: Slip<'_>,
        tag: Slip<'_>,
        value: Slip<'_>,
    ) -> Result<(), SinkError>;

    /// A scope ends. `completed` is true when its closer was read;
    /// `aborted` is true when the decode failed with the scope still open.
    fn on_close(
        &mut self,
        node: Self::Node,
        parent: Option<&mut Self::Node>,
        aborted: bool,
        completed: bool,
    ) -> Result<(), SinkError>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    type Node = S::Node;

    fn on_open(
        &mut self,
        parent: Option<&mut Self::Node>,
        key: Slip<'_>,
        tag: Slip<'_>,
    ) -> Result<Option<Self::Node>, SinkError> {
        (**self).on_open(parent, key, tag)
    }

    fn on_next(
        &mut self,
        node: Option<&mut Self::Node>,
        key: Slip<'_>,
        tag: Slip<'_>,
        value: Slip<'_>,
    ) -> Result<(), SinkError> {
        (**self).on_next(node, key, tag, value)
    }

    fn on_close(
        &mut self,
        node: Self::Node,
        parent: Option<&mut Self::Node>,
        aborted: bool,
        completed: bool,
    ) -> Result<(), SinkError> {
        (**self).on_close(node, parent, aborted, completed)
    }
}

/// The open nodes of one decode, innermost last.
pub(crate) struct NodeStack<'s, S: Sink> {
    sink: &'s mut S,
    nodes: Vec<S::Node>,
}

impl<'s, S: Sink> NodeStack<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        Self {
            sink,
            nodes: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    /// Opens a child of the innermost node. Returns false when the sink
    /// declined it.
    pub fn open(&mut self, key: Slip<'_>, tag: Slip<'_>) -> Result<bool, ParseError> {
        match self.sink.on_open(self.nodes.last_mut(), key, tag) {
            Ok(Some(node)) => {
                self.nodes.push(node);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(ParseError::Sink(e)),
        }
    }

    pub fn next(&mut self, key: Slip<'_>, tag: Slip<'_>, value: Slip<'_>) -> Result<(), ParseError> {
        self.sink
            .on_next(self.nodes.last_mut(), key, tag, value)
            .map_err(ParseError::Sink)
    }

    /// Completes the innermost node.
    pub fn close(&mut self) -> Result<(), ParseError> {
        let Some(node) = self.nodes.pop() else {
            return Ok(());
        };
        self.sink
            .on_close(node, self.nodes.last_mut(), false, true)
            .map_err(ParseError::Sink)
    }

    /// Closes every open node as aborted, innermost first.
    pub fn unwind(&mut self) {
        if !self.nodes.is_empty() {
            log::debug!("unwinding {} open scopes", self.nodes.len());
        }
        while let Some(node) = self.nodes.pop() {
            if let Err(e) = self.sink.on_close(node, self.nodes.last_mut(), true, false) {
                log::warn!("sink failed to close an aborted scope: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records events, with node ids, and declines keys named "skip".
    #[derive(Default)]
    struct Recorder {
        next_id: usize,
        log: Vec<String>,
    }

    impl Sink for Recorder {
        type Node = usize;

        fn on_open(
            &mut self,
            parent: Option<&mut usize>,
            key: Slip<'_>,
            _tag: Slip<'_>,
        ) -> Result<Option<usize>, SinkError> {
            if key == "skip" {
                return Ok(None);
            }
            if key == "fail" {
                return Err("refused".into());
            }
            self.next_id += 1;
            self.log
                .push(format!("open {} in {:?}", self.next_id, parent.map(|p| *p)));
            Ok(Some(self.next_id))
        }

        fn on_next(
            &mut self,
            node: Option<&mut usize>,
            key: Slip<'_>,
            _tag: Slip<'_>,
            value: Slip<'_>,
        ) -> Result<(), SinkError> {
            self.log
                .push(format!("next {key}={value} in {:?}", node.map(|n| *n)));
            Ok(())
        }

        fn on_close(
            &mut self,
            node: usize,
            parent: Option<&mut usize>,
            aborted: bool,
            completed: bool,
        ) -> Result<(), SinkError> {
            self.log.push(format!(
                "close {node} to {:?} aborted={aborted} completed={completed}",
                parent.map(|p| *p)
            ));
            Ok(())
        }
    }

    #[test]
    fn test_open_next_close() {
        let mut recorder = Recorder::default();
        let mut stack = NodeStack::new(&mut recorder);
        assert!(stack.open(Slip::new(b""), Slip::new(b"{")).unwrap());
        stack
            .next(Slip::new(b"a"), Slip::new(b""), Slip::new(b"1"))
            .unwrap();
        assert!(!stack.open(Slip::new(b"skip"), Slip::new(b"{")).unwrap());
        assert_eq!(stack.depth(), 1);
        stack.close().unwrap();
        assert_eq!(
            recorder.log,
            [
                "open 1 in None",
                "next a=1 in Some(1)",
                "close 1 to None aborted=false completed=true",
            ]
        );
    }

    #[test]
    fn test_unwind_innermost_first() {
        let mut recorder = Recorder::default();
        let mut stack = NodeStack::new(&mut recorder);
        stack.open(Slip::new(b""), Slip::new(b"")).unwrap();
        stack.open(Slip::new(b"b"), Slip::new(b"")).unwrap();
        let err = stack.open(Slip::new(b"fail"), Slip::new(b"")).unwrap_err();
        assert!(matches!(err, ParseError::Sink(_)));
        stack.unwind();
        assert_eq!(stack.depth(), 0);
        assert_eq!(
            recorder.log[2..],
            [
                "close 2 to Some(1) aborted=true completed=false",
                "close 1 to None aborted=true completed=false",
            ]
        );
    }
}
