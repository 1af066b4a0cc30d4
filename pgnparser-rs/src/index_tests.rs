use crate::diag::{Diagnostic, SyntaxError};
use crate::index::{Index, IndexEntry, Scan, ALL_GAMES};
use crate::reporter::{Report, Reporter};
use assert_matches::assert_matches;
use std::sync::{Arc, Mutex};

const THREE_GAMES: &[u8] = b"[Event \"A\"]
[Site \"?\"]

1. e4 e5 1-0

[Event \"B\"]

1. d4 d5 (1... Nf6) 0-1
[Event \"C\"]
1. c4 *
";

fn scan<'a>(buf: &'a [u8], reporter: &'a Reporter) -> Scan<'a> {
    Scan {
        buf,
        reporter,
        strict: false,
    }
}

fn index_all(buf: &[u8]) -> Vec<IndexEntry> {
    let reporter = Reporter::default();
    let index = Index::default();
    index.ensure(ALL_GAMES, scan(buf, &reporter)).unwrap();
    index.entries()
}

fn collect_reports(reporter: &Reporter) -> Arc<Mutex<Vec<Diagnostic>>> {
    let reports = Arc::new(Mutex::new(vec![]));
    let sink = reports.clone();
    reporter.set_handler(Some(Box::new(move |report: &Report| {
        sink.lock().unwrap().push(report.diagnostic.clone());
        true
    })));
    reports
}

#[test]
fn test_game_boundaries() {
    let buf = THREE_GAMES;
    let entries = index_all(buf);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].tags.as_ref(buf), b"[Event \"A\"]\n[Site \"?\"]");
    assert_eq!(entries[0].movetext.as_ref(buf), b"1. e4 e5 1-0");
    assert_eq!(entries[1].tags.as_ref(buf), b"[Event \"B\"]");
    assert_eq!(entries[1].movetext.as_ref(buf), b"1. d4 d5 (1... Nf6) 0-1");
    assert_eq!(entries[2].movetext.as_ref(buf), b"1. c4 *");
    let ordinals: Vec<u32> = entries.iter().map(|entry| entry.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert!(entries.iter().all(|entry| entry.status == SyntaxError::Valid));
}

#[test]
fn test_incremental() {
    let reporter = Reporter::default();
    let index = Index::default();
    assert_eq!(index.ensure(1, scan(THREE_GAMES, &reporter)).unwrap(), 1);
    assert!(!index.is_complete());
    assert_eq!(index.size(), 1);
    assert_eq!(index.ensure(1, scan(THREE_GAMES, &reporter)).unwrap(), 1);
    assert_eq!(index.ensure(2, scan(THREE_GAMES, &reporter)).unwrap(), 2);
    assert_eq!(index.ensure(10, scan(THREE_GAMES, &reporter)).unwrap(), 3);
    assert!(index.is_complete());
    assert_eq!(index.entries(), index_all(THREE_GAMES));
    assert_eq!(index.entry(0), None);
    assert_eq!(index.entry(4), None);
    assert_eq!(index.entry(2).map(|entry| entry.ordinal), Some(2));
}

#[test]
fn test_empty_database() {
    let reporter = Reporter::default();
    let index = Index::default();
    assert_eq!(index.ensure(ALL_GAMES, scan(b"", &reporter)).unwrap(), 0);
    assert!(index.is_complete());
    assert_eq!(index.ensure(ALL_GAMES, scan(b"\n \n", &reporter)).unwrap(), 0);
}

#[test]
fn test_byte_order_mark() {
    let buf = b"\xef\xbb\xbf[Event \"A\"]\n1. e4 *\n";
    let reporter = Reporter::default();
    let reports = collect_reports(&reporter);
    let index = Index::default();
    assert_eq!(index.ensure(ALL_GAMES, scan(buf, &reporter)).unwrap(), 1);
    assert_eq!(index.entry(1).unwrap().tags.start, 3);
    assert!(reports.lock().unwrap().is_empty());
}

#[test]
fn test_resync_after_garbage() {
    let buf = b"garbage text\n[Event \"A\"]\n1. e4 *\n";
    let reporter = Reporter::default();
    let reports = collect_reports(&reporter);
    let index = Index::default();
    assert_eq!(index.ensure(ALL_GAMES, scan(buf, &reporter)).unwrap(), 1);
    assert_eq!(index.entry(1).unwrap().tags.start, 13);
    assert_matches!(&reports.lock().unwrap()[..], [Diagnostic::UnexpectedHeaderText(span)] if span.start == 0);
}

#[test]
fn test_comments_hide_headers() {
    let buf = b"[Event \"A\"]
{ [Event \"fake\"] }
1. e4 ; [Event \"eol\"]
e5 *
% [Event \"escaped\"]
[Event \"B\"]
1. d4 *
";
    let entries = index_all(buf);
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].movetext.as_ref(buf),
        b"{ [Event \"fake\"] }\n1. e4 ; [Event \"eol\"]\ne5 *"
    );
    assert_eq!(entries[1].tags.as_ref(buf), b"[Event \"B\"]");
}

#[test]
fn test_inline_header_ends_movetext() {
    // no newline before the next game, but the lookahead still sees a tag
    let buf = b"[Event \"A\"]\n1. e4 * [Event \"B\"]\n1. d4 *";
    let entries = index_all(buf);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].movetext.as_ref(buf), b"1. e4 *");
    assert_eq!(entries[1].movetext.as_ref(buf), b"1. d4 *");
}

#[test]
fn test_bracket_without_tag_stays_in_movetext() {
    let buf = b"[Event \"A\"]\n1. e4\n[%clk 0:10:00]\ne5 *\n[Event \"B\"]\n1. d4 *\n";
    let entries = index_all(buf);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].movetext.as_ref(buf), b"1. e4\n[%clk 0:10:00]\ne5 *");
    assert_eq!(entries[0].status, SyntaxError::Valid);
    assert_eq!(entries[1].tags.as_ref(buf), b"[Event \"B\"]");
}

#[test]
fn test_header_errors_keep_game() {
    let buf = b"[Event \"A\"]\n[Bad-Name \"x\"]\n1. e4 *\n[Event \"B\"]\n1. d4 *\n";
    let reporter = Reporter::default();
    let reports = collect_reports(&reporter);
    let index = Index::default();
    assert_eq!(index.ensure(ALL_GAMES, scan(buf, &reporter)).unwrap(), 2);
    assert_eq!(index.entry(1).unwrap().status, SyntaxError::IllegalTagName);
    assert_eq!(index.entry(2).unwrap().status, SyntaxError::Valid);
    assert_matches!(&reports.lock().unwrap()[..], [Diagnostic::BadTagName(_)]);
}

#[test]
fn test_invalidate_and_rescan() {
    let reporter = Reporter::default();
    let index = Index::default();
    index.ensure(ALL_GAMES, scan(THREE_GAMES, &reporter)).unwrap();
    let before = index.entries();
    index.invalidate_from(2);
    assert_eq!(index.size(), 1);
    assert!(!index.is_complete());
    assert_eq!(index.ensure(ALL_GAMES, scan(THREE_GAMES, &reporter)).unwrap(), 3);
    assert_eq!(index.entries(), before);
}

#[test]
fn test_reopen_after_growth() {
    let grown = b"[Event \"A\"]\n1. e4 *\n[Event \"B\"]\n1. c4 c5 *\n[Event \"C\"]\n1. d4 *\n";
    let old = &grown[..grown.len() - "c5 *\n[Event \"C\"]\n1. d4 *\n".len()];
    let reporter = Reporter::default();
    let index = Index::default();
    assert_eq!(index.ensure(ALL_GAMES, scan(old, &reporter)).unwrap(), 2);
    assert_eq!(index.entry(2).unwrap().movetext.as_ref(old), b"1. c4");
    index.reopen();
    assert_eq!(index.size(), 1);
    assert_eq!(index.ensure(ALL_GAMES, scan(grown, &reporter)).unwrap(), 3);
    assert_eq!(index.entry(2).unwrap().movetext.as_ref(grown), b"1. c4 c5 *");
    assert_eq!(index.entries(), index_all(grown));
}

#[test]
fn test_concurrent_indexing() {
    let mut buf = vec![];
    for game in 1..=200 {
        buf.extend_from_slice(format!("[Event \"Game {game}\"]\n[Round \"{game}\"]\n\n1. e4 {{note}} e5 2. Nf3 (2. f4) Nc6 *\n\n").as_bytes());
    }
    let expected = index_all(&buf);
    assert_eq!(expected.len(), 200);

    let reporter = Reporter::default();
    let index = Index::default();
    let counts: Vec<u32> = std::thread::scope(|s| {
        let workers: Vec<_> = (1..=8)
            .map(|n| {
                let (index, reporter, buf) = (&index, &reporter, &buf[..]);
                s.spawn(move || index.ensure(n * 25, scan(buf, reporter)).unwrap())
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    // a worker may find more games indexed than it asked for
    for (n, count) in (1..=8).zip(counts) {
        assert!(count >= n * 25);
    }
    assert_eq!(index.entries(), expected);
}
