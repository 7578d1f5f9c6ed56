use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use kagi_obsidian_bridge::db::SettingsStore;
use kagi_obsidian_bridge::page::render::{result_element_id, RESULT_CLASS};
use kagi_obsidian_bridge::page::template::{CONTENT_ID, SIDEBAR_ID};
use kagi_obsidian_bridge::relay::Relay;
use kagi_obsidian_bridge::types::{Ack, Message, Settings, TabHandle, TabId};
use kagi_obsidian_bridge::Bridge;

/// Serve exactly one HTTP request with `status` and `body`, reporting the
/// request line that was received.
async fn serve_once(status: &'static str, body: &'static str) -> (u16, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake omnisearch");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept search request");
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.expect("read request line");
        loop {
            let mut line = String::new();
            let bytes = reader.read_line(&mut line).await.expect("read header");
            if bytes == 0 || line == "\r\n" {
                break;
            }
        }
        let _ = tx.send(request_line.trim_end().to_string());

        let response = format!(
            "HTTP/1.1 {status}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {body}",
            body.len()
        );
        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).await.expect("write response");
        stream.shutdown().await.ok();
    });

    (port, rx)
}

fn store_for(port: u16) -> (tempfile::TempDir, SettingsStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SettingsStore::new(dir.path().join("settings.sqlite"));
    store
        .save(&Settings {
            omnisearch_base_url: "http://127.0.0.1".into(),
            omnisearch_port: port,
            obsidian_vault_name: "Test Vault".into(),
            sidebar_width: 500,
        })
        .expect("save settings");
    (dir, store)
}

#[tokio::test]
async fn relay_forwards_results_to_originating_tab() {
    let (port, request) = serve_once(
        "200 OK",
        r#"[{"basename":"Note A","path":"a.md","excerpt":"hello","score":3.2}]"#,
    )
    .await;
    let (_dir, store) = store_for(port);
    let relay = Relay::new(store);

    let (tab, mut inbox) = TabHandle::channel(TabId(42));
    let ack = relay.on_message(
        Message::SearchIntent {
            query: "hello world".into(),
            url: "https://kagi.com/search?q=hello+world".into(),
        },
        tab,
    );
    assert_eq!(ack, Ack::Handled);

    let reply = inbox.recv().await.expect("reply");
    let Message::Results { results, query } = reply else {
        panic!("expected results, got {reply:?}");
    };
    assert_eq!(query, "hello world");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].basename.as_deref(), Some("Note A"));
    assert_eq!(results[0].extra["score"], 3.2);

    assert_eq!(
        request.await.expect("request line"),
        "GET /search?q=hello%20world HTTP/1.1"
    );
}

#[tokio::test]
async fn null_body_is_empty_result_list() {
    let (port, _request) = serve_once("200 OK", "null").await;
    let (_dir, store) = store_for(port);
    let results = Relay::new(store).search("anything").await.expect("search");
    assert!(results.is_empty());
}

#[tokio::test]
async fn odd_elements_do_not_drop_good_results() {
    let (port, _request) = serve_once(
        "200 OK",
        r#"[{"basename":"Good","path":"a.md"},{"basename":"Bad","path":42},null]"#,
    )
    .await;
    let (_dir, store) = store_for(port);
    let results = Relay::new(store).search("x").await.expect("search");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].path.as_deref(), Some("a.md"));
    assert_eq!(results[1].basename.as_deref(), Some("Bad"));
    assert!(results[1].path.is_none());
}

#[tokio::test]
async fn server_error_becomes_error_message() {
    let (port, _request) = serve_once("500 Internal Server Error", "[]").await;
    let (_dir, store) = store_for(port);
    let relay = Relay::new(store);

    let (tab, mut inbox) = TabHandle::channel(TabId(1));
    relay.on_message(
        Message::SearchIntent { query: "x".into(), url: "https://kagi.com/search?q=x".into() },
        tab,
    );
    match inbox.recv().await.expect("reply") {
        Message::Error { error } => assert!(error.contains("HTTP 500"), "{error}"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_becomes_error_message() {
    let (port, _request) = serve_once("200 OK", "<html>not json</html>").await;
    let (_dir, store) = store_for(port);
    let err = Relay::new(store).search("x").await.expect_err("malformed body");
    assert!(err.to_string().contains("malformed response"));
}

#[tokio::test]
async fn page_round_trip_renders_sidebar() {
    let (port, _request) = serve_once(
        "200 OK",
        r#"[{"basename":"Note A","path":"a.md","excerpt":"hello"},{"basename":"<i>B</i>","content":"body only"}]"#,
    )
    .await;
    let (_dir, store) = store_for(port);
    let bridge = Bridge::new(store);

    let mut page = bridge.open_page("https://kagi.com/search?q=hello");
    assert_eq!(page.load().as_deref(), Some("hello"));
    assert_eq!(page.process_next().await, Some(Ack::Handled));

    let doc = page.document();
    let sidebar = doc.get_element_by_id(SIDEBAR_ID).expect("sidebar");
    assert_eq!(sidebar.attr("style"), Some("width: 500px"));

    let content = doc.get_element_by_id(CONTENT_ID).expect("content");
    assert_eq!(
        content.find_all_by_class("omnisearch-count")[0].text_content(),
        "Found 2 notes for \"hello\""
    );
    assert_eq!(content.find_all_by_class(RESULT_CLASS).len(), 2);

    let second = doc.get_element_by_id(&result_element_id(1)).expect("second entry");
    assert_eq!(second.find_all_by_class("omnisearch-excerpt")[0].text_content(), "body only");

    let html = doc.to_html();
    assert_eq!(html.matches(r#"<style id="omnisearch-styles">"#).count(), 1);
    assert!(html.contains("#omnisearch-sidebar {"));
    assert!(html.contains("&lt;i&gt;B&lt;/i&gt;"));
    assert!(!html.contains("<i>B</i>"));
}

#[tokio::test]
async fn unreachable_service_renders_error_in_sidebar() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let (_dir, store) = store_for(port);
    let bridge = Bridge::new(store);

    let mut page = bridge.open_page("https://kagi.com/search?q=offline");
    page.load();
    page.process_next().await;

    let content = page.document().get_element_by_id(CONTENT_ID).expect("content");
    let text = content.text_content();
    assert!(text.starts_with("Error: "), "{text}");
    assert!(text.contains("Make sure Omnisearch is running"));
}

#[tokio::test]
async fn pages_get_distinct_tabs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = Bridge::new(SettingsStore::new(dir.path().join("s.sqlite")));
    let first = bridge.open_page("https://kagi.com/");
    let second = bridge.open_page("https://kagi.com/");
    assert_ne!(first.tab().id, second.tab().id);
    assert!(Arc::strong_count(bridge.relay()) >= 3);
}
