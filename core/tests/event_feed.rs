//! External event feed tests.
//!
//! Covers:
//! 1. Merging a successful feed into rows
//! 2. Negative counts and graceful degradation on every failure kind
//! 3. The HTTP client against a local one-shot server: request body,
//!    success, non-2xx, non-array body, timeout, whole-request deadline,
//!    refused connection

use callstats_core::{
    counter::CounterRow,
    feed::{parse_feed_payload, EventFeed, ExternalEventPoint, ExternalSeriesMerger, FetchError, HttpEventFeed},
    types::{DateRange, RegionScope},
};
use serde_json::json;
use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

fn rows(ids: &[i64]) -> Vec<CounterRow> {
    ids.iter().map(|&id| CounterRow::empty_for(id)).collect()
}

fn range() -> DateRange {
    DateRange::parse("1403/01/01", "1403/01/31").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn string_keyed_feed_matches_integer_rows() {
    let feed = parse_feed_payload(&json!([
        {"province_id": "1", "events_count": 120},
        {"province_id": "2", "events_count": 80}
    ]));
    let (merged, total) = ExternalSeriesMerger::merge(rows(&[1, 2, 3]), &feed);

    assert_eq!(total, 200);
    assert_eq!(merged[0].events_count, Some(120));
    assert_eq!(merged[1].events_count, Some(80));
    assert_eq!(merged[2].events_count, None, "unmatched region keeps no events");
}

#[test]
fn feed_only_regions_still_count_toward_total() {
    let feed = Ok(vec![
        ExternalEventPoint { region_id: 1, events_count: 10 },
        ExternalEventPoint { region_id: 99, events_count: 5 },
    ]);
    let (merged, total) = ExternalSeriesMerger::merge(rows(&[1]), &feed);
    assert_eq!(merged.len(), 1, "no line is created for region 99");
    assert_eq!(total, 15);
}

#[test]
fn negative_feed_counts_read_as_zero() {
    let feed = Ok(vec![
        ExternalEventPoint { region_id: 1, events_count: -5 },
        ExternalEventPoint { region_id: 2, events_count: 7 },
    ]);
    let (merged, total) = ExternalSeriesMerger::merge(rows(&[1, 2]), &feed);
    assert_eq!(merged[0].events_count, Some(0));
    assert_eq!(merged[1].events_count, Some(7));
    assert_eq!(total, 7, "a negative entry does not pull the total down");
}

#[test]
fn failed_feed_is_a_no_op() {
    let failures = [
        FetchError::Timeout("read timed out".into()),
        FetchError::Transport("connection refused".into()),
        FetchError::Status(502),
        FetchError::Malformed("expected an array".into()),
        FetchError::Disabled,
    ];
    for err in failures {
        let input = rows(&[1, 2]);
        let (merged, total) = ExternalSeriesMerger::merge(input.clone(), &Err(err.clone()));
        assert_eq!(merged, input, "{err} must leave rows unchanged");
        assert_eq!(total, 0);
    }
}

#[test]
fn merger_fetch_hands_back_feed_errors() {
    struct Failing;
    impl EventFeed for Failing {
        fn fetch(&self, _: &DateRange, _: RegionScope) -> Result<Vec<ExternalEventPoint>, FetchError> {
            Err(FetchError::Status(503))
        }
    }
    let merger = ExternalSeriesMerger::new(Box::new(Failing));
    assert_eq!(merger.fetch(&range(), RegionScope::All), Err(FetchError::Status(503)));
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

/// Read request headers and body off `stream`, return the body.
fn read_request_body(stream: &TcpStream) -> String {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(v) = lower.strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap();
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    String::from_utf8(body).unwrap()
}

/// Serve one request with `status` and `body`; send the raw request body
/// back through the returned channel.
fn one_shot_server(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = tx.send(read_request_body(&stream));

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
    });
    (format!("http://{addr}/events-num"), rx)
}

#[test]
fn http_feed_posts_credentials_and_range() {
    let (url, request) = one_shot_server("200 OK", r#"[{"province_id":"8","events_count":"41"}]"#);
    let feed = HttpEventFeed::new(url, "secret-key", Duration::from_secs(5));

    let points = feed.fetch(&range(), RegionScope::Region(8)).unwrap();
    assert_eq!(points, vec![ExternalEventPoint { region_id: 8, events_count: 41 }]);

    let sent: serde_json::Value = serde_json::from_str(&request.recv().unwrap()).unwrap();
    assert_eq!(sent["api_key"], "secret-key");
    assert_eq!(sent["date_start"], "1403/01/01");
    assert_eq!(sent["date_end"], "1403/01/31");
    assert_eq!(sent["region_id"], 8);
}

#[test]
fn http_feed_omits_region_for_all_regions() {
    let (url, request) = one_shot_server("200 OK", "[]");
    let feed = HttpEventFeed::new(url, "k", Duration::from_secs(5));
    assert_eq!(feed.fetch(&range(), RegionScope::All), Ok(vec![]));

    let sent: serde_json::Value = serde_json::from_str(&request.recv().unwrap()).unwrap();
    assert!(sent.get("region_id").is_none());
}

#[test]
fn http_feed_non_success_status_is_an_error() {
    let (url, _request) = one_shot_server("500 Internal Server Error", r#"{"error":"down"}"#);
    let feed = HttpEventFeed::new(url, "k", Duration::from_secs(5));
    assert_eq!(feed.fetch(&range(), RegionScope::All), Err(FetchError::Status(500)));
}

#[test]
fn http_feed_object_body_is_malformed() {
    let (url, _request) = one_shot_server("200 OK", r#"{"error":"invalid api key"}"#);
    let feed = HttpEventFeed::new(url, "k", Duration::from_secs(5));
    let err = feed.fetch(&range(), RegionScope::All).unwrap_err();
    assert_eq!(err.kind(), "malformed");
}

#[test]
fn http_feed_times_out_on_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(3));
    });

    let feed = HttpEventFeed::new(format!("http://{addr}/"), "k", Duration::from_millis(200));
    let err = feed.fetch(&range(), RegionScope::All).unwrap_err();
    assert!(
        matches!(err, FetchError::Timeout(_) | FetchError::Transport(_)),
        "silent server should fail the fetch, got {err:?}"
    );
}

#[test]
fn http_feed_deadline_covers_a_slow_body() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request_body(&stream);
        let body = br#"[{"province_id":"1","events_count":5}]"#;
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
            body.len()
        );
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        // One byte every 100ms: no single read stalls past the limit.
        for byte in body {
            if stream.write_all(&[*byte]).and_then(|_| stream.flush()).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
    });

    let feed = HttpEventFeed::new(format!("http://{addr}/"), "k", Duration::from_millis(300));
    let started = Instant::now();
    let result = feed.fetch(&range(), RegionScope::All);
    let elapsed = started.elapsed();

    assert!(result.is_err(), "slow body must fail the fetch, got {result:?}");
    assert!(
        elapsed < Duration::from_secs(2),
        "fetch took {elapsed:?} with a 300ms limit"
    );
}

#[test]
fn http_feed_refused_connection_is_transport_error() {
    // Bind then drop to get a port that is very likely closed.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let feed = HttpEventFeed::new(format!("http://{addr}/"), "k", Duration::from_secs(2));
    let err = feed.fetch(&range(), RegionScope::All).unwrap_err();
    assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout(_)), "got {err:?}");
}
