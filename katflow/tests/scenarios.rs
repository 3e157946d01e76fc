// SPDX-License-Identifier: Apache-2.0

//! End-to-end event sequences for each format, through `katflow::decode`.

mod common;

use common::{events, Recorder};
use katflow::{decode, ErrKind, Format, ParseError, Source};

use test_log::test;

#[test]
fn test_kat_tagged_object() {
    assert_eq!(
        events(Format::Kat, "@User{id:1,name:kraity}").unwrap(),
        ["open(,User)", "next(id,,1)", "next(name,,kraity)", "close"]
    );
}

#[test]
fn test_json_nested() {
    assert_eq!(
        events(Format::Json, r#"{"a":1,"b":[2,3]}"#).unwrap(),
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
fn test_doc_nested() {
    assert_eq!(
        events(Format::Doc, "<User><id>1</id></User>").unwrap(),
        ["open(User,)", "open(id,)", "next(,,1)", "close", "close"]
    );
}

#[test]
fn test_truncated_json_aborts_open_scopes() {
    let mut recorder = Recorder::default();
    let err = decode(Format::Json, &mut Source::from_text(r#"{"a":1"#), &mut recorder).unwrap_err();
    assert_eq!(err.kind(), Some(ErrKind::Truncated));
    assert_eq!(recorder.events, ["open(,{)", "next(a,,1)", "abort"]);
    assert_eq!(recorder.opened, recorder.closed);
}

#[test]
fn test_declined_json_field() {
    let mut recorder = Recorder::declining(&["secret"]);
    decode(
        Format::Json,
        &mut Source::from_text(r#"{"secret":{"x":1},"ok":2}"#),
        &mut recorder,
    )
    .unwrap();
    assert_eq!(recorder.events, ["open(,{)", "next(ok,,2)", "close"]);
}

#[test]
fn test_declined_kat_field() {
    let mut recorder = Recorder::declining(&["secret"]);
    decode(
        Format::Kat,
        &mut Source::from_text("{secret:@S{x:'}',y:[1,(2)]},ok:2}"),
        &mut recorder,
    )
    .unwrap();
    assert_eq!(recorder.events, ["open(,{)", "next(ok,,2)", "close"]);
}

#[test]
fn test_declined_kat_field_with_comment_after_quote() {
    let text = "{secret:{a:'x'#}#},ok:1}";
    assert_eq!(
        events(Format::Kat, text).unwrap(),
        ["open(,{)", "open(secret,{)", "next(a,',x)", "close", "next(ok,,1)", "close"]
    );

    let mut recorder = Recorder::declining(&["secret"]);
    decode(Format::Kat, &mut Source::from_text(text), &mut recorder).unwrap();
    assert_eq!(recorder.events, ["open(,{)", "next(ok,,1)", "close"]);
}

#[test]
fn test_declined_subtree_still_validated() {
    let inputs = [
        (Format::Json, r#"{"secret":{"x":[1}},"ok":2}"#, ErrKind::NestingMismatch),
        (Format::Json, r#"{"secret":["\u12G4"],"ok":2}"#, ErrKind::MalformedEscape),
        (Format::Kat, "{secret:{x:(1]},ok:2}", ErrKind::NestingMismatch),
        (Format::Doc, "<r><secret><a></b></secret></r>", ErrKind::TagMismatch),
    ];
    for (format, input, kind) in inputs {
        let mut recorder = Recorder::declining(&["secret"]);
        let err = decode(format, &mut Source::from_text(input), &mut recorder).unwrap_err();
        assert_eq!(err.kind(), Some(kind), "{format}: {input}");
        assert_eq!(recorder.opened, recorder.closed, "{format}: {input}");
    }
}

#[test]
fn test_open_close_balance_on_failure() {
    let inputs = [
        (Format::Kat, "{a:{b:[1,2,(x"),
        (Format::Kat, "{a:{b:[1,2)}}"),
        (Format::Json, r#"[[[{"a":[1,2,"#),
        (Format::Json, r#"{"a":{"b":"\uZZZZ"}}"#),
        (Format::Doc, "<a><b><c>text</c>"),
        (Format::Doc, "<a><b>&nope;</b></a>"),
    ];
    for (format, input) in inputs {
        let mut recorder = Recorder::default();
        assert!(decode(format, &mut Source::from_text(input), &mut recorder).is_err());
        assert!(recorder.opened > 0, "{format}: {input}");
        assert_eq!(recorder.opened, recorder.closed, "{format}: {input}");
        assert_eq!(recorder.aborted, recorder.closed - completed(&recorder.events));
    }
}

fn completed(events: &[String]) -> usize {
    events.iter().filter(|e| *e == "close").count()
}

#[test]
fn test_sink_error_aborts_decode() {
    let mut recorder = Recorder {
        fail_on: Some("bad"),
        ..Recorder::default()
    };
    let err = decode(
        Format::Json,
        &mut Source::from_text(r#"{"x":{"bad":{}}}"#),
        &mut recorder,
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::Sink(_)));
    // The refused scope was never opened, so only its ancestors are closed
    assert_eq!(recorder.events, ["open(,{)", "open(x,{)", "abort", "abort"]);
}

#[test]
fn test_empty_documents() {
    for format in [Format::Kat, Format::Json, Format::Doc] {
        assert!(events(format, "").unwrap().is_empty());
        assert!(events(format, " \n\t ").unwrap().is_empty());
    }
}

#[test]
fn test_unbalanced_nesting_never_succeeds() {
    let inputs = [
        (Format::Kat, "[1,2", ErrKind::Truncated),
        (Format::Kat, "[1,2]]", ErrKind::UnopenedScope),
        (Format::Kat, "{a:[1,2}", ErrKind::NestingMismatch),
        (Format::Json, "[1,2", ErrKind::Truncated),
        (Format::Json, "[1,2]]", ErrKind::UnopenedScope),
        (Format::Json, r#"{"a":[1}"#, ErrKind::NestingMismatch),
        (Format::Doc, "<a>", ErrKind::Truncated),
        (Format::Doc, "<a></a></a>", ErrKind::UnopenedScope),
        (Format::Doc, "<a><b></a>", ErrKind::TagMismatch),
    ];
    for (format, input, kind) in inputs {
        let err = events(format, input).unwrap_err();
        assert_eq!(err.kind(), Some(kind), "{format}: {input}");
    }
}
