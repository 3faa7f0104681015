use super::{decode_uri_component, get_query_variable};

#[test]
fn finds_the_first_matching_pair() {
    let query = "?layer=2&fileurl=http%3A%2F%2Fexample.com%2Fkm.txt&layer=5";
    assert_eq!(
        get_query_variable(query, "fileurl"),
        Some("http%3A%2F%2Fexample.com%2Fkm.txt")
    );
    assert_eq!(get_query_variable(query, "layer"), Some("2"));
    assert_eq!(get_query_variable(query, "missing"), None);
}

#[test]
fn keys_without_a_value_are_absent() {
    assert_eq!(get_query_variable("fileurl&layer=1", "fileurl"), None);
    assert_eq!(get_query_variable("fileurl=", "fileurl"), Some(""));
    assert_eq!(get_query_variable("a=b=c", "a"), Some("b"));
}

#[test]
fn percent_escapes_decode_to_utf8() {
    assert_eq!(
        decode_uri_component("http%3A%2F%2Fexample.com%2Fkm.txt").expect("valid component"),
        "http://example.com/km.txt"
    );
    assert_eq!(decode_uri_component("caf%C3%A9+x").expect("valid component"), "café+x");
}

#[test]
fn broken_escapes_are_rejected() {
    assert!(decode_uri_component("100%").is_err());
    assert!(decode_uri_component("%zz").is_err());
    assert!(decode_uri_component("%C3").is_err());
}
