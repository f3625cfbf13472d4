use doisync::doi;

#[test]
fn recognizes_full_and_short_dois() {
    assert!(doi::is_doi("10.1000/xyz123"));
    assert!(doi::is_doi("10.1234.5/abc-def_1"));
    assert!(!doi::is_doi("10.123/too-short-registrant"));
    assert!(!doi::is_doi("11.1000/not-a-doi"));
    assert!(!doi::is_doi("10.1000/"));

    assert!(doi::is_short_doi("10/abc123"));
    assert!(!doi::is_short_doi("10/abc-123"));
    assert!(!doi::is_short_doi("10/"));

    assert!(doi::is_any_doi("10.1000/xyz123"));
    assert!(doi::is_any_doi("10/abc"));
    assert!(!doi::is_any_doi("hello"));
}

#[test]
fn normalize_strips_prefixes_and_resolver_urls() {
    assert_eq!(
        doi::normalize("  10.1000/xyz123  ").as_deref(),
        Some("10.1000/xyz123")
    );
    assert_eq!(
        doi::normalize("doi:10.1000/xyz123").as_deref(),
        Some("10.1000/xyz123")
    );
    assert_eq!(
        doi::normalize("DOI: 10.1000/xyz123").as_deref(),
        Some("10.1000/xyz123")
    );
    assert_eq!(
        doi::normalize("https://doi.org/10.1000/xyz123").as_deref(),
        Some("10.1000/xyz123")
    );
    assert_eq!(
        doi::normalize("https://doi.org/10/abc").as_deref(),
        Some("10/abc")
    );
    assert_eq!(doi::normalize("not a doi"), None);
    assert_eq!(doi::normalize("https://example.com/paper.pdf"), None);
}

#[test]
fn finds_dois_embedded_in_text() {
    let text = "See 10.1000/first and later 10.2000/second (10.3000/third).";
    assert_eq!(doi::find_doi(text), Some("10.1000/first"));
    assert_eq!(
        doi::find_all_dois(text),
        vec!["10.1000/first", "10.2000/second", "10.3000/third"]
    );

    // Characters that would break an href attribute end the match.
    let quoted = r#"cited as "10.4000/quoted" in the text"#;
    assert_eq!(doi::find_doi(quoted), Some("10.4000/quoted"));

    assert_eq!(doi::find_doi("nothing here"), None);
}
