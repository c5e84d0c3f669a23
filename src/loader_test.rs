use super::*;

#[test]
fn http_and_https_are_fetchable() {
    assert!(check_scheme("http://127.0.0.1:3000/api/assets/alice/cat.png").is_ok());
    assert!(check_scheme("https://cdn.example.com/cat.png").is_ok());
}

#[test]
fn data_uri_is_not_fetched_over_http() {
    assert!(matches!(check_scheme("data:image/png;base64,AAAA"), Err(LoadError::UnsupportedScheme(_))));
}

#[test]
fn bare_filename_is_unsupported() {
    assert!(matches!(check_scheme("cat.png"), Err(LoadError::UnsupportedScheme(url)) if url == "cat.png"));
}

#[test]
fn image_content_type_accepted_without_parameters() {
    let media = check_content_type("u", Some("Image/PNG; charset=binary".to_owned())).expect("image");
    assert_eq!(media, "image/png");
}

#[test]
fn non_image_content_type_rejected() {
    let err = check_content_type("u", Some("text/html".to_owned())).expect_err("html");
    assert!(matches!(err, LoadError::NotAnImage { content_type: Some(ref ct), .. } if ct == "text/html"));
}

#[test]
fn missing_content_type_rejected() {
    let err = check_content_type("u", None).expect_err("missing");
    assert!(matches!(err, LoadError::NotAnImage { content_type: None, .. }));
}

#[test]
fn malformed_content_type_rejected() {
    let err = check_content_type("u", Some("image".to_owned())).expect_err("no subtype");
    assert!(matches!(err, LoadError::NotAnImage { content_type: Some(ref ct), .. } if ct == "image"));
}

// =============================================================================
// data uris
// =============================================================================

#[test]
fn image_data_uri_is_unpacked() {
    let url = "data:image/png;base64,iVBORw0KGgo=";
    let rest = strip_data_scheme(url).expect("data scheme");

    let blob = decode_data_uri(url, rest).expect("image payload");

    assert_eq!(blob.content_type, "image/png");
    assert_eq!(blob.bytes, [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
}

#[test]
fn data_scheme_matches_case_insensitively() {
    assert_eq!(strip_data_scheme("DATA:image/gif;base64,R0lG"), Some("image/gif;base64,R0lG"));
    assert_eq!(strip_data_scheme("https://cdn.example.com/cat.png"), None);
    assert_eq!(strip_data_scheme("cat.png"), None);
}

#[test]
fn non_image_data_uri_rejected() {
    let url = "data:text/plain;base64,aGVsbG8=";
    let err = decode_data_uri(url, strip_data_scheme(url).expect("data scheme")).expect_err("text payload");
    assert!(matches!(err, LoadError::NotAnImage { content_type: Some(ref ct), .. } if ct == "text/plain"));
}

#[test]
fn data_uri_without_base64_marker_rejected() {
    let url = "data:image/svg+xml,%3Csvg%3E";
    let err = decode_data_uri(url, strip_data_scheme(url).expect("data scheme")).expect_err("not base64");
    assert!(matches!(err, LoadError::DataUri(_)));
}

#[test]
fn data_uri_with_corrupt_payload_rejected() {
    let url = "data:image/png;base64,@@@";
    let err = decode_data_uri(url, strip_data_scheme(url).expect("data scheme")).expect_err("bad base64");
    assert!(matches!(err, LoadError::DataUri(_)));
}

#[tokio::test]
async fn unsupported_scheme_reports_failed_completion() {
    let (mut loader, mut rx) = HttpImageLoader::new().expect("client");
    let id = AssetId::generate();

    loader.request(id, "cat.png");

    let completion = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("completion timed out")
        .expect("loader channel open");
    assert_eq!(completion.id, id);
    assert_eq!(completion.url, "cat.png");
    assert!(matches!(completion.result, Err(LoadError::UnsupportedScheme(_))));
}

#[tokio::test]
async fn data_uri_request_completes_with_blob() {
    let (mut loader, mut rx) = HttpImageLoader::new().expect("client");
    let id = AssetId::generate();
    let url = "data:image/gif;base64,R0lGODlh";

    loader.request(id, url);

    let completion = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("completion timed out")
        .expect("loader channel open");
    assert_eq!(completion.url, url);
    let blob = completion.result.expect("gif payload");
    assert_eq!(blob.content_type, "image/gif");
    assert_eq!(blob.bytes, b"GIF89a");
}
