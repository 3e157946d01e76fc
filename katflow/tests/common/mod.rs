// SPDX-License-Identifier: Apache-2.0

//! Recording sink shared by the integration tests.

#![allow(dead_code)]

use katflow::{Decoder, Format, ParseError, Sink, SinkError, Slip, Source};

/// Records every event as text, declines scopes whose key is listed in
/// `decline` and fails the decode on a scope keyed `fail_on`.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<String>,
    pub decline: Vec<&'static str>,
    pub fail_on: Option<&'static str>,
    pub opened: usize,
    pub closed: usize,
    pub aborted: usize,
}

impl Recorder {
    pub fn declining(keys: &[&'static str]) -> Self {
        Self {
            decline: keys.to_vec(),
            ..Self::default()
        }
    }
}

impl Sink for Recorder {
    type Node = usize;

    fn on_open(&mut self, _: Option<&mut usize>, key: Slip<'_>, tag: Slip<'_>) -> Result<Option<usize>, SinkError> {
        if self.decline.iter().any(|k| key == *k) {
            return Ok(None);
        }
        if self.fail_on.is_some_and(|k| key == k) {
            return Err(format!("refused scope {key}").into());
        }
        self.opened += 1;
        self.events.push(format!("open({key},{tag})"));
        Ok(Some(self.opened))
    }

    fn on_next(
        &mut self,
        _: Option<&mut usize>,
        key: Slip<'_>,
        tag: Slip<'_>,
        value: Slip<'_>,
    ) -> Result<(), SinkError> {
        self.events.push(format!("next({key},{tag},{value})"));
        Ok(())
    }

    fn on_close(&mut self, _: usize, _: Option<&mut usize>, aborted: bool, completed: bool) -> Result<(), SinkError> {
        assert_ne!(aborted, completed);
        self.closed += 1;
        if aborted {
            self.aborted += 1;
            self.events.push("abort".to_string());
        } else {
            self.events.push("close".to_string());
        }
        Ok(())
    }
}

/// Decodes `text` through the pooled entry point.
pub fn events(format: Format, text: &str) -> Result<Vec<String>, ParseError> {
    let mut recorder = Recorder::default();
    katflow::decode(format, &mut Source::from_text(text), &mut recorder)?;
    Ok(recorder.events)
}

/// Decodes `source` with `decoder`, returning the events and the outcome.
pub fn record<D: Decoder>(decoder: &mut D, source: &mut Source<'_>) -> (Vec<String>, Result<(), ParseError>) {
    let mut recorder = Recorder::default();
    let result = decoder.decode(source, &mut recorder);
    (recorder.events, result)
}
