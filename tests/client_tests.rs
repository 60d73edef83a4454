//! Integration tests for the catalog session client.

mod common;

use common::*;
use opc_connector::{CatalogConfig, IndexKey, OpcClient, OpcError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn three_page_catalog(second_page: Option<String>) -> Arc<StubTransport> {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("goethe", "1016", 100),
        page_xml(Some(237), &ppns("a", 0..100), true),
    );
    transport.reply(
        next_url(101, 100),
        second_page.unwrap_or_else(|| page_xml(Some(237), &ppns("b", 0..100), true)),
    );
    transport.reply(
        next_url(201, 100),
        page_xml(Some(237), &ppns("c", 0..37), true),
    );
    transport
}

#[test]
fn test_search_reads_all_pages() {
    let transport = three_page_catalog(None);
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("goethe", "1016").expect("search");

    assert_eq!(result.total_hits(), 237);
    assert_eq!(result.len(), 237);
    assert_eq!(transport.request_count(), 3);
    assert_eq!(
        transport.requests(),
        vec![
            search_url("goethe", "1016", 100),
            next_url(101, 100),
            next_url(201, 100),
        ]
    );

    let ppns: Vec<&str> = result.ppns().collect();
    assert_eq!(ppns[0], "a0");
    assert_eq!(ppns[100], "b0");
    assert_eq!(ppns[236], "c36");
    assert!(result.iter().all(|r| !r.is_loaded()));
}

#[test]
fn test_search_stops_at_cap() {
    let transport = three_page_catalog(None);
    let client = stub_client(&transport, stub_config(100, 150));

    let result = client.search("goethe", "1016").expect("search");

    assert_eq!(result.total_hits(), 237);
    assert_eq!(result.len(), 150);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(result.ppns().last(), Some("b49"));
}

#[test]
fn test_malformed_continuation_page_is_skipped() {
    let transport = three_page_catalog(Some("<html><body>Bad Gateway".to_string()));
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("goethe", "1016").expect("search");

    assert_eq!(result.total_hits(), 237);
    assert_eq!(result.len(), 137);
    assert_eq!(transport.request_count(), 3);
    let ppns: Vec<&str> = result.ppns().collect();
    assert_eq!(ppns[99], "a99");
    assert_eq!(ppns[100], "c0");
}

#[test]
fn test_failed_continuation_page_is_skipped() {
    let transport = three_page_catalog(None);
    transport.fail(next_url(101, 100), 503);
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("goethe", "1016").expect("search");
    assert_eq!(result.len(), 137);
}

#[test]
fn test_single_page_needs_no_session() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("schiller", "4", 100),
        page_xml(Some(3), &ppns("s", 0..3), false),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("schiller", "4").expect("search");
    assert_eq!(result.total_hits(), 3);
    assert_eq!(result.len(), 3);
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_search_term_is_form_encoded() {
    let transport = Arc::new(StubTransport::new());
    let url = format!(
        "{BASE}/XML=1.0/DB={DB}/SET=1/TTL=1/CMD?ACT=SRCHA&IKT=1016&SRT=YOP&SHRTST=100&TRM=tit+faust+%26+m%C3%BCller"
    );
    transport.reply(url, page_xml(Some(0), &[], false));
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("tit faust & müller", "1016").expect("search");
    assert!(result.is_empty());
}

#[test]
fn test_search_all_uses_default_index() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("faust", "1016", 100),
        page_xml(Some(1), &ppns("f", 0..1), false),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search_all("faust").expect("search");
    assert_eq!(result.ppns().collect::<Vec<_>>(), vec!["f0"]);
}

#[test]
fn test_missing_session_is_protocol_error() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("goethe", "1016", 100),
        page_xml(Some(237), &ppns("a", 0..100), false),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let err = client.search("goethe", "1016").unwrap_err();
    assert!(matches!(err, OpcError::Protocol(_)));
}

#[test]
fn test_missing_set_is_protocol_error() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("goethe", "1016", 100),
        "<RESULT><MESSAGE>Datenbank nicht verfügbar</MESSAGE></RESULT>",
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let err = client.search("goethe", "1016").unwrap_err();
    assert!(matches!(err, OpcError::Protocol(_)));
}

#[test]
fn test_unreachable_first_page_names_term_and_url() {
    let transport = Arc::new(StubTransport::new());
    transport.fail(search_url("goethe", "1016", 100), 500);
    let client = stub_client(&transport, stub_config(100, 500));

    match client.search("goethe", "1016") {
        Err(OpcError::Protocol(message)) => {
            assert!(message.contains("goethe"));
            assert!(message.contains(&search_url("goethe", "1016", 100)));
        },
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn test_failures_are_not_cached() {
    let transport = Arc::new(StubTransport::new());
    transport.fail(search_url("goethe", "1016", 100), 500);
    let client = stub_client(&transport, stub_config(100, 500));
    assert!(client.search("goethe", "1016").is_err());

    transport.reply(
        search_url("goethe", "1016", 100),
        page_xml(Some(1), &ppns("g", 0..1), false),
    );
    let result = client.search("goethe", "1016").expect("search after recovery");
    assert_eq!(result.len(), 1);
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_search_is_cached() {
    let transport = three_page_catalog(None);
    let client = stub_client(&transport, stub_config(100, 500));

    let first = client.search("goethe", "1016").expect("search");
    let second = client.search("goethe", "1016").expect("cached search");

    assert_eq!(transport.request_count(), 3);
    assert_eq!(first.ppns().collect::<Vec<_>>(), second.ppns().collect::<Vec<_>>());
}

#[test]
fn test_concurrent_searches_share_one_fetch() {
    let transport = Arc::new(StubTransport::new().with_delay(Duration::from_millis(50)));
    transport.reply(
        search_url("goethe", "1016", 100),
        page_xml(Some(2), &ppns("a", 0..2), false),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || client.search("goethe", "1016").expect("search").len())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), 2);
    }
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_family() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(family_url("123", 100), page_xml(Some(2), &ppns("v", 1..3), false));
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.family("123").expect("family");
    assert_eq!(result.total_hits(), 2);
    assert_eq!(result.ppns().collect::<Vec<_>>(), vec!["v1", "v2"]);
}

#[test]
fn test_family_paginates() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(family_url("123", 2), page_xml(Some(3), &ppns("v", 0..2), true));
    transport.reply(next_url(3, 2), page_xml(Some(3), &ppns("v", 2..3), true));
    let client = stub_client(&transport, stub_config(2, 500));

    let result = client.family("123").expect("family");
    assert_eq!(result.ppns().collect::<Vec<_>>(), vec!["v0", "v1", "v2"]);
}

#[test]
fn test_fetch_record() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        raw_url("123"),
        raw_record(&[
            ("003@", &[('0', "123")]),
            ("021A", &[('a', "Faust"), ('d', "eine Tragoedie")]),
            ("209A/01", &[('a', "A 123")]),
            ("209A/02", &[('a', "B 7")]),
        ]),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let record = client.fetch_record("123").expect("record");
    assert_eq!(record.ppn(), "123");
    assert_eq!(record.title().expect("title"), Some("Faust"));
    assert_eq!(record.shelf_marks().expect("shelf marks"), vec!["A 123", "B 7"]);

    let field = record
        .field_by_occurrence("209A", "02")
        .expect("fields")
        .expect("second copy");
    assert_eq!(field.get_subfield('a'), Some("B 7"));
}

#[test]
fn test_fetch_record_decodes_legacy_bytes() {
    let transport = Arc::new(StubTransport::new());
    // 0xC8 is the umlaut diacritic, preceding its base letter
    let mut body = b"021A \x1FaG\xC8unter Grass".to_vec();
    body.push(0x1E);
    transport.reply(raw_url("9"), body);
    let client = stub_client(&transport, stub_config(100, 500));

    let record = client.fetch_record("9").expect("record");
    assert_eq!(record.title().expect("title"), Some("Günter Grass"));
}

#[test]
fn test_fetch_record_is_cached() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(raw_url("123"), raw_record(&[("021A", &[('a', "Faust")])]));
    let client = stub_client(&transport, stub_config(100, 500));

    client.fetch_record("123").expect("record");
    client.fetch_record("123").expect("cached record");
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_fetch_record_not_found() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(raw_url("empty"), "");
    let client = stub_client(&transport, stub_config(100, 500));

    assert!(matches!(client.fetch_record("empty"), Err(OpcError::NotFound(_))));
    // no entry in the stub table answers 404
    assert!(matches!(client.fetch_record("missing"), Err(OpcError::NotFound(_))));
    assert!(matches!(client.fetch_record("empty"), Err(OpcError::NotFound(_))));
    assert_eq!(transport.request_count(), 3);
}

#[test]
fn test_fetch_record_server_error_is_protocol_error() {
    let transport = Arc::new(StubTransport::new());
    transport.fail(raw_url("123"), 500);
    let client = stub_client(&transport, stub_config(100, 500));

    assert!(matches!(client.fetch_record("123"), Err(OpcError::Protocol(_))));
}

#[test]
fn test_search_hits_load_lazily_through_client() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        search_url("faust", "4", 100),
        page_xml(Some(2), &["1".to_string(), "2".to_string()], false),
    );
    transport.reply(raw_url("1"), raw_record(&[("021A", &[('a', "Faust I")])]));
    transport.reply(raw_url("2"), raw_record(&[("021A", &[('a', "Faust II")])]));
    let client = stub_client(&transport, stub_config(100, 500));

    let result = client.search("faust", "4").expect("search");
    assert_eq!(transport.request_count(), 1);

    let second = &result.records()[1];
    assert_eq!(second.title().expect("title"), Some("Faust II"));
    assert!(second.is_loaded());
    assert!(!result.records()[0].is_loaded());
    assert_eq!(transport.request_count(), 2);

    // loaded once per record
    second.title().expect("title");
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_index_keys_are_cached() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(
        ikt_url(),
        r#"<RESULT><IKTLIST>
            <IKT mnemonic="ALL" description="Alle Wörter">1016</IKT>
            <IKT mnemonic="TIT" description="Titel">4</IKT>
        </IKTLIST></RESULT>"#,
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let keys = client.index_keys().expect("index keys");
    assert_eq!(
        keys,
        vec![
            IndexKey {
                key: "1016".to_string(),
                mnemonic: "ALL".to_string(),
                description: "Alle Wörter".to_string(),
            },
            IndexKey {
                key: "4".to_string(),
                mnemonic: "TIT".to_string(),
                description: "Titel".to_string(),
            },
        ]
    );
    client.index_keys().expect("cached index keys");
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_index_keys_without_list_is_protocol_error() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(ikt_url(), "<RESULT></RESULT>");
    let client = stub_client(&transport, stub_config(100, 500));

    assert!(matches!(client.index_keys(), Err(OpcError::Protocol(_))));
}

#[test]
fn test_empty_url_is_config_error() {
    let transport = Arc::new(StubTransport::new());
    let client = stub_client(&transport, CatalogConfig::new("", DB));

    assert!(matches!(client.search("goethe", "1016"), Err(OpcError::Config(_))));
    assert!(matches!(client.fetch_record("1"), Err(OpcError::Config(_))));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_set_config_switches_catalog() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(raw_url("1"), raw_record(&[("021A", &[('a', "Eins")])]));
    transport.reply(
        format!("{BASE}/DB=2/PPN?PLAIN=ON&PPN=1"),
        raw_record(&[("021A", &[('a', "One")])]),
    );
    let client = stub_client(&transport, stub_config(100, 500));

    let record = client.fetch_record("1").expect("record");
    assert_eq!(record.title().expect("title"), Some("Eins"));

    client.set_config(CatalogConfig::new(format!("{BASE}/"), "2"));
    let record = client.fetch_record("1").expect("record");
    assert_eq!(record.title().expect("title"), Some("One"));
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_clients_share_cache() {
    let transport = Arc::new(StubTransport::new());
    transport.reply(raw_url("1"), raw_record(&[("021A", &[('a', "Eins")])]));
    let first = stub_client(&transport, stub_config(100, 500));
    let second = OpcClient::builder(stub_config(100, 500))
        .transport(Arc::clone(&transport) as Arc<dyn opc_connector::Transport>)
        .cache(Arc::clone(first.cache()))
        .build()
        .expect("client");

    first.fetch_record("1").expect("record");
    second.fetch_record("1").expect("shared record");
    assert_eq!(transport.request_count(), 1);
}
