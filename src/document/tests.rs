//! Document Module Tests
//!
//! ## Test Scopes
//! - **Ranges**: Doctype range expressions parse and reject like the API routes expect.
//! - **Shingles**: Normalization and window hashing are stable.
//! - **Store**: Put/Delete/List semantics and journal recovery.
//! - **Corpus**: Synthetic generation is reproducible.

#[cfg(test)]
mod tests {
    use crate::config::CorpusConfig;
    use crate::document::corpus;
    use crate::document::shingle::{normalize, shingle_hashes};
    use crate::document::store::DocumentStore;
    use crate::document::types::*;
    use std::collections::HashMap;

    fn doc(doctype: u32, docid: u32, text: &str) -> Document {
        Document::new(
            DocumentId::new(doctype, docid),
            DocumentPayload::new(format!("Doc {}", docid), text),
        )
    }

    // ============================================================
    // RANGE TESTS
    // ============================================================

    #[test]
    fn test_parse_single_and_span() {
        assert_eq!(parse_ranges("1").unwrap(), vec![DoctypeRange::single(1)]);
        assert_eq!(
            parse_ranges("2-10").unwrap(),
            vec![DoctypeRange { start: 2, end: 10 }]
        );
    }

    #[test]
    fn test_parse_combined_ranges() {
        let ranges = parse_ranges("1:3-5:9").unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges_contain(&ranges, 4));
        assert!(ranges_contain(&ranges, 9));
        assert!(!ranges_contain(&ranges, 2));
        assert_eq!(format_ranges(&ranges), "1:3-5:9");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "a", "1-", "-3", "1::2", "5-2", "99999999999"] {
            assert!(parse_ranges(bad).is_err(), "'{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_empty_ranges_match_everything() {
        assert!(ranges_contain(&[], 12345));
    }

    // ============================================================
    // SHINGLE TESTS
    // ============================================================

    #[test]
    fn test_normalize_strips_case_and_punctuation() {
        assert_eq!(normalize("Hello, World! 42"), "helloworld42");
    }

    #[test]
    fn test_shingles_ignore_formatting() {
        let a = shingle_hashes("The Quick brown fox", 8);
        let b = shingle_hashes("the quick, BROWN fox!", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_text_is_one_shingle() {
        assert_eq!(shingle_hashes("tiny", 16).len(), 1);
        assert!(shingle_hashes("  ...  ", 16).is_empty());
    }

    #[test]
    fn test_shingles_are_sorted_and_unique() {
        let hashes = shingle_hashes("abababababababababababab", 4);
        // Only "abab" and "baba" windows exist.
        assert_eq!(hashes.len(), 2);
        assert!(hashes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_payload_text_yields_windows() {
        let hashes = shingle_hashes("PayloadWithsometextlongerthanwindowsize", 16);
        // 39 characters, 16 wide: 24 windows, all distinct.
        assert_eq!(hashes.len(), 24);
    }

    // ============================================================
    // PAYLOAD / ARG TESTS
    // ============================================================

    #[test]
    fn test_payload_from_form() {
        let payload =
            DocumentPayload::from_form(b"title=Payload&text=PayloadWithsometextlongerthanwindowsize")
                .unwrap();
        assert_eq!(payload.title, "Payload");
        assert_eq!(payload.text, "PayloadWithsometextlongerthanwindowsize");

        let empty = DocumentPayload::from_form(b"").unwrap();
        assert_eq!(empty, DocumentPayload::default());
    }

    #[test]
    fn test_document_arg_from_params() {
        let params: HashMap<String, String> = [
            ("text", "some query"),
            ("doctype", "3"),
            ("docid", "7"),
            ("doctypes", "1-4"),
            ("threshold", "0.25"),
            ("limit", "5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let arg = DocumentArg::from_params(&params).unwrap();
        assert_eq!(arg.id, Some(DocumentId::new(3, 7)));
        assert_eq!(arg.limit, 5);
        assert!(arg.wants(&DocumentId::new(2, 1)));
        assert!(!arg.wants(&DocumentId::new(3, 7)), "query document excluded");
        assert!(!arg.wants(&DocumentId::new(5, 1)), "outside doctypes");
    }

    #[test]
    fn test_document_arg_rejects_bad_limit() {
        let params: HashMap<String, String> =
            [("limit".to_string(), "lots".to_string())].into_iter().collect();
        assert!(DocumentArg::from_params(&params).is_err());
    }

    #[test]
    fn test_location() {
        assert_eq!(DocumentId::new(1, 20).location(), "/document/1/20/");
    }

    // ============================================================
    // STORE TESTS
    // ============================================================

    #[test]
    fn test_store_put_get_delete() {
        let store = DocumentStore::in_memory();
        store.put(doc(1, 1, "first")).unwrap();
        store.put(doc(1, 2, "second")).unwrap();
        store.put(doc(2, 1, "third")).unwrap();

        assert_eq!(store.count(), 3);
        assert_eq!(store.get(&DocumentId::new(1, 2)).unwrap().text, "second");

        assert!(store.delete(&DocumentId::new(1, 2)).unwrap());
        assert!(!store.delete(&DocumentId::new(1, 2)).unwrap(), "second delete is a no-op");
        assert!(!store.delete(&DocumentId::new(9, 9)).unwrap());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_store_list_pages_in_order() {
        let store = DocumentStore::in_memory();
        for docid in (1..=5).rev() {
            store.put(doc(2, docid, "text")).unwrap();
        }
        store.put(doc(1, 9, "text")).unwrap();

        let page = store.list(&[], 1, 3);
        assert_eq!(page.total_rows, 6);
        let ids: Vec<(u32, u32)> = page.documents.iter().map(|d| (d.doctype, d.docid)).collect();
        assert_eq!(ids, vec![(2, 1), (2, 2), (2, 3)]);

        let only_two = store.list(&parse_ranges("2").unwrap(), 0, 100);
        assert_eq!(only_two.total_rows, 5);
    }

    #[test]
    fn test_store_recovers_from_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.journal");

        {
            let store = DocumentStore::open(Some(&path)).unwrap();
            store.put(doc(1, 1, "kept")).unwrap();
            store.put(doc(1, 2, "removed")).unwrap();
            store.delete(&DocumentId::new(1, 2)).unwrap();
        }

        let store = DocumentStore::open(Some(&path)).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&DocumentId::new(1, 1)).unwrap().text, "kept");
        assert!(store.get(&DocumentId::new(1, 2)).is_none());
    }

    // ============================================================
    // CORPUS TESTS
    // ============================================================

    #[test]
    fn test_corpus_is_reproducible() {
        let config = CorpusConfig {
            doctypes: 3,
            documents_per_doctype: 4,
            words_per_document: 10,
        };
        let a = corpus::generate(&config, 7);
        let b = corpus::generate(&config, 7);

        assert_eq!(a.len(), 12);
        assert_eq!(a, b);
        assert_eq!(a[0].0, DocumentId::new(1, 1));
        assert_eq!(a[11].0, DocumentId::new(3, 4));
    }

    #[test]
    fn test_corpus_payload_overrides() {
        let base = CorpusConfig::default();
        let config = corpus::config_from_payload(&base, b"doctypes=2&documents=3");
        assert_eq!(config.doctypes, 2);
        assert_eq!(config.documents_per_doctype, 3);

        let unchanged = corpus::config_from_payload(&base, b"");
        assert_eq!(unchanged, base);
    }
}
