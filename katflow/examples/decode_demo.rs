// SPDX-License-Identifier: Apache-2.0

// Prints the event tree of a document.
//
//   cargo run --example decode_demo                 # built-in samples
//   cargo run --example decode_demo -- json data.json
//   RUST_LOG=trace cargo run --example decode_demo  # window refills, pool misses

use std::fs::File;

use katflow::{decode, Format, ParseError, Sink, SinkError, Slip, Source};

/// Prints each event indented by its depth.
struct TreePrinter {
    depth: usize,
}

impl Sink for TreePrinter {
    type Node = String;

    fn on_open(&mut self, _: Option<&mut String>, key: Slip<'_>, tag: Slip<'_>) -> Result<Option<String>, SinkError> {
        println!("{}open  key={key:?} tag={tag:?}", "  ".repeat(self.depth));
        self.depth += 1;
        Ok(Some(key.to_string_lossy()))
    }

    fn on_next(
        &mut self,
        _: Option<&mut String>,
        key: Slip<'_>,
        tag: Slip<'_>,
        value: Slip<'_>,
    ) -> Result<(), SinkError> {
        println!("{}next  key={key:?} tag={tag:?} value={value:?}", "  ".repeat(self.depth));
        Ok(())
    }

    fn on_close(&mut self, node: String, _: Option<&mut String>, aborted: bool, _: bool) -> Result<(), SinkError> {
        self.depth = self.depth.saturating_sub(1);
        let how = if aborted { "abort" } else { "close" };
        println!("{}{how} {node:?}", "  ".repeat(self.depth));
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    if let (Some(format), Some(path)) = (args.next(), args.next()) {
        let format: Format = format.parse()?;
        let mut source = Source::from_read(File::open(path)?);
        decode(format, &mut source, &mut TreePrinter { depth: 0 })?;
        return Ok(());
    }

    let samples = [
        (Format::Kat, "@User{id:1,name:kraity,tags:[a,b],pos:@Point(3,4)}"),
        (Format::Json, r#"{"id":1,"name":"kraity","tags":["a","b"]}"#),
        (Format::Doc, r#"<User id="1"><name>kraity</name><tags><t>a</t></tags></User>"#),
        (Format::Json, r#"{"id":1,"tags":["a","#),
    ];
    for (format, text) in samples {
        println!("== {format}: {text}");
        let result: Result<(), ParseError> = decode(format, &mut Source::from_text(text), &mut TreePrinter { depth: 0 });
        if let Err(e) = result {
            println!("error: {e}");
        }
        println!();
    }
    Ok(())
}
