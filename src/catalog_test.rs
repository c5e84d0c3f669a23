use super::*;

fn entry(filename: &str, content_type: &str) -> CatalogEntry {
    CatalogEntry { filename: filename.to_owned(), content_type: content_type.to_owned() }
}

#[test]
fn source_ref_joins_base_channel_and_file() {
    assert_eq!(
        source_ref("http://127.0.0.1:3000/", "alice", "cat.png"),
        "http://127.0.0.1:3000/api/assets/alice/cat.png"
    );
}

#[test]
fn listing_is_sorted_images_only() {
    let listed = sorted_images(vec![
        entry("zebra.png", "image/png"),
        entry("notes.txt", "text/plain"),
        entry("apple.gif", "image/gif"),
    ]);
    let names: Vec<&str> = listed.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["apple.gif", "zebra.png"]);
}

#[test]
fn entries_decode_from_listing_json() {
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(r#"[{"filename":"cat.png","content_type":"image/png"}]"#).expect("valid listing");
    assert_eq!(entries, vec![entry("cat.png", "image/png")]);
}

#[tokio::test]
async fn non_http_base_is_rejected() {
    let http = reqwest::Client::new();
    let err = list_assets(&http, "ws://127.0.0.1:3000", "alice").await.expect_err("ws base");
    assert!(matches!(err, CatalogError::InvalidBaseUrl(_)));
}
