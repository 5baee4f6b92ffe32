use super::*;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn make_set(key: &[u8], value: &[u8]) -> LogRecord {
    LogRecord::Set {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

fn make_del(key: &[u8]) -> LogRecord {
    LogRecord::Delete { key: key.to_vec() }
}

fn replay_all(path: &std::path::Path) -> Result<Vec<LogRecord>, RecordError> {
    let mut reader = LogReader::open(path)?;
    let mut recs = Vec::new();
    reader.replay(|r| recs.push(r))?;
    Ok(recs)
}

fn encoded(record: &LogRecord) -> String {
    let mut buf = Vec::new();
    record.encode(&mut buf);
    String::from_utf8(buf).unwrap()
}

// -------------------- Decode --------------------

#[test]
fn decode_each_action() {
    assert_eq!(
        LogRecord::decode(b"set k v").unwrap(),
        Some(make_set(b"k", b"v"))
    );
    assert_eq!(LogRecord::decode(b"del k").unwrap(), Some(make_del(b"k")));
    assert_eq!(LogRecord::decode(b"write").unwrap(), Some(LogRecord::Write));
    assert_eq!(LogRecord::decode(b"reopen").unwrap(), Some(LogRecord::Reopen));
    assert_eq!(LogRecord::decode(b"gc").unwrap(), Some(LogRecord::Gc));
}

#[test]
fn decode_tolerates_extra_whitespace_and_crlf() {
    assert_eq!(
        LogRecord::decode(b"  set\tkey   value \r\n").unwrap(),
        Some(make_set(b"key", b"value"))
    );
}

#[test]
fn decode_blank_line_is_skipped() {
    assert_eq!(LogRecord::decode(b"").unwrap(), None);
    assert_eq!(LogRecord::decode(b"   \t \n").unwrap(), None);
}

#[test]
fn decode_set_missing_value() {
    let err = LogRecord::decode(b"set onlykey").unwrap_err();
    assert_eq!(
        err,
        MalformedRecord::Arity {
            action: Action::Set,
            expected: 2,
            found: 1,
        }
    );
}

#[test]
fn decode_set_with_too_many_operands() {
    let err = LogRecord::decode(b"set k v extra").unwrap_err();
    assert!(matches!(err, MalformedRecord::Arity { found: 3, .. }));
}

#[test]
fn decode_del_without_key() {
    let err = LogRecord::decode(b"del").unwrap_err();
    assert!(matches!(
        err,
        MalformedRecord::Arity {
            action: Action::Delete,
            ..
        }
    ));
}

#[test]
fn decode_checkpoint_with_operand_is_malformed() {
    for line in [&b"write 1"[..], &b"reopen 64"[..], &b"gc 4.0"[..]] {
        let err = LogRecord::decode(line).unwrap_err();
        assert!(matches!(err, MalformedRecord::Arity { expected: 0, found: 1, .. }));
    }
}

#[test]
fn decode_unknown_action() {
    let err = LogRecord::decode(b"put k v").unwrap_err();
    assert_eq!(err, MalformedRecord::UnknownAction("put".to_string()));
}

#[test]
fn keywords_are_case_sensitive() {
    assert!(LogRecord::decode(b"SET k v").is_err());
    assert!(LogRecord::decode(b"Del k").is_err());
}

// -------------------- Encode --------------------

#[test]
fn encode_matches_grammar() {
    assert_eq!(encoded(&make_set(b"abc", b"17___")), "set abc 17___");
    assert_eq!(encoded(&make_del(b"abc")), "del abc");
    assert_eq!(encoded(&LogRecord::Write), "write");
    assert_eq!(encoded(&LogRecord::Reopen), "reopen");
    assert_eq!(encoded(&LogRecord::Gc), "gc");
}

#[test]
fn display_matches_encode() {
    let rec = make_set(b"k", b"v");
    assert_eq!(rec.to_string(), encoded(&rec));
}

#[test]
fn action_table_is_consistent() {
    for action in Action::ALL {
        assert_eq!(Action::from_keyword(action.keyword().as_bytes()), Some(action));
    }
    assert!(Action::Write.is_checkpoint());
    assert!(!Action::Set.is_checkpoint());
}

// -------------------- Reader --------------------

#[test]
fn write_and_replay_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("base-a.in");

    {
        let mut w = LogWriter::create(&path).unwrap();
        w.append(&make_set(b"k", b"v1")).unwrap();
        w.append(&make_set(b"k2", b"v2")).unwrap();
        w.append(&make_del(b"k")).unwrap();
        w.append(&LogRecord::Write).unwrap();
        w.flush().unwrap();
    }

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, "set k v1\nset k2 v2\ndel k\nwrite\n");

    let recs = replay_all(&path).unwrap();
    assert_eq!(
        recs,
        vec![
            make_set(b"k", b"v1"),
            make_set(b"k2", b"v2"),
            make_del(b"k"),
            LogRecord::Write,
        ]
    );
}

#[test]
fn replay_skips_blank_lines() {
    let recs = parse_log(b"\n\nset a 1\n\n   \ndel a\n\n").unwrap();
    assert_eq!(recs, vec![make_set(b"a", b"1"), make_del(b"a")]);
}

#[test]
fn replay_last_line_without_newline() {
    let recs = parse_log(b"set a 1\ngc").unwrap();
    assert_eq!(recs, vec![make_set(b"a", b"1"), LogRecord::Gc]);
}

#[test]
fn replay_reports_line_number_of_malformed_record() {
    let mut reader = LogReader::from_reader(Cursor::new(b"set a 1\n\nset onlykey\nwrite\n".to_vec()));
    let mut seen = Vec::new();
    let err = reader.replay(|r| seen.push(r)).unwrap_err();

    match err {
        RecordError::Malformed { line, source } => {
            assert_eq!(line, 3);
            assert!(matches!(source, MalformedRecord::Arity { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    // replay stops at the bad line
    assert_eq!(seen, vec![make_set(b"a", b"1")]);
}

#[test]
fn replay_returns_record_count() {
    let mut reader = LogReader::from_reader(&b"set a 1\nwrite\n\nreopen\n"[..]);
    assert_eq!(reader.replay(|_| {}).unwrap(), 3);
}

#[test]
fn replay_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.in");
    fs::write(&path, b"").unwrap();

    let recs = replay_all(&path).unwrap();
    assert!(recs.is_empty());
}

#[test]
fn open_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = LogReader::open(dir.path().join("nope.in")).err().unwrap();
    assert!(matches!(err, RecordError::Io(_)));
}

// -------------------- Writer --------------------

#[test]
fn writer_into_inner_returns_bytes() {
    let mut w = LogWriter::new(Vec::new());
    w.append(&LogRecord::Reopen).unwrap();
    w.append(&make_del(b"x")).unwrap();
    assert_eq!(w.into_inner(), b"reopen\ndel x\n".to_vec());
}

#[test]
fn encode_then_parse_preserves_sequence() {
    let records = vec![
        make_set(b"alpha", b"1___"),
        LogRecord::Write,
        make_del(b"beta"),
        LogRecord::Reopen,
        make_set(b"alpha", b"2_"),
        LogRecord::Gc,
    ];
    let mut w = LogWriter::new(Vec::new());
    for r in &records {
        w.append(r).unwrap();
    }
    assert_eq!(parse_log(&w.into_inner()).unwrap(), records);
}
