//! Row decoding tests: dotted select aliases back into nested attribute
//! maps, null-key subtree pruning and export conversions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::support::*;
use pathsql::data_converter::DefaultDataConverter;
use pathsql::row_decoder::{DecodeError, RowDecoder};

fn decoder() -> RowDecoder {
    RowDecoder::new(
        fixture_catalog(),
        fixture_resolver(),
        Arc::new(DefaultDataConverter),
    )
}

#[test]
fn test_flat_row_decodes_to_scalars() {
    let rows = vec![object(&[("id", json!(1)), ("title", json!("Intro"))])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("row should decode");
    assert_eq!(decoded, vec![json!({"id": 1, "title": "Intro"})]);
}

#[test]
fn test_dotted_aliases_nest_under_relationships() {
    let rows = vec![object(&[
        ("id", json!(1)),
        ("title", json!("Intro")),
        ("author.id", json!(5)),
        ("author.name", json!("Jane")),
    ])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("row should decode");
    assert_eq!(
        decoded,
        vec![json!({
            "id": 1,
            "title": "Intro",
            "author": {"id": 5, "name": "Jane"}
        })]
    );
}

#[test]
fn test_null_primary_key_nulls_the_related_subtree() {
    let rows = vec![
        object(&[
            ("id", json!(1)),
            ("author.id", json!(5)),
            ("author.name", json!("Jane")),
        ]),
        object(&[
            ("id", json!(2)),
            ("author.id", json!(null)),
            ("author.name", json!(null)),
        ]),
    ];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("rows should decode");
    assert_eq!(
        decoded[0],
        json!({"id": 1, "author": {"id": 5, "name": "Jane"}})
    );
    assert_eq!(decoded[1], json!({"id": 2, "author": null}));
}

#[test]
fn test_nested_pruning_keeps_present_ancestors() {
    let rows = vec![object(&[
        ("id", json!(1)),
        ("author.id", json!(5)),
        ("author.profile.id", json!(null)),
        ("author.profile.bio", json!(null)),
    ])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("row should decode");
    assert_eq!(
        decoded[0],
        json!({"id": 1, "author": {"id": 5, "profile": null}})
    );
}

#[test]
fn test_pruning_an_ancestor_swallows_deeper_prefixes() {
    let rows = vec![object(&[
        ("id", json!(2)),
        ("author.id", json!(null)),
        ("author.profile.id", json!(null)),
    ])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("row should decode");
    assert_eq!(decoded[0], json!({"id": 2, "author": null}));
}

#[test]
fn test_export_conversions_apply_per_leaf() {
    let author_rows = vec![object(&[
        ("id", json!(1)),
        ("name", json!("Jane")),
        ("deleted", json!(1)),
    ])];
    let decoded = decoder()
        .decode_rows("Author", &HashMap::new(), &author_rows)
        .expect("row should decode");
    assert_eq!(
        decoded[0],
        json!({"id": 1, "name": "Jane", "deleted": true})
    );

    let article_rows = vec![object(&[
        ("id", json!(1)),
        ("published_at", json!("2024-05-01 10:30:00")),
    ])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &article_rows)
        .expect("row should decode");
    assert_eq!(
        decoded[0],
        json!({"id": 1, "published_at": "2024-05-01T10:30:00"})
    );
}

#[test]
fn test_null_of_nullable_property_passes_through() {
    let rows = vec![object(&[("id", json!(1)), ("published_at", json!(null))])];
    let decoded = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect("row should decode");
    assert_eq!(decoded[0], json!({"id": 1, "published_at": null}));
}

#[test]
fn test_short_aliases_translate_through_the_map() {
    let aliases = HashMap::from([
        ("c0".to_string(), "id".to_string()),
        ("c1".to_string(), "author.name".to_string()),
    ]);
    let rows = vec![object(&[("c0", json!(1)), ("c1", json!("Jane"))])];
    let decoded = decoder()
        .decode_rows("Article", &aliases, &rows)
        .expect("row should decode");
    assert_eq!(decoded[0], json!({"id": 1, "author": {"name": "Jane"}}));
}

#[test]
fn test_unmapped_result_column_is_rejected_in_short_mode() {
    let aliases = HashMap::from([("c0".to_string(), "id".to_string())]);
    let rows = vec![object(&[("c9", json!(1))])];
    let err = decoder()
        .decode_rows("Article", &aliases, &rows)
        .expect_err("unmapped column must fail");
    assert!(matches!(err, DecodeError::UnknownAlias { column } if column == "c9"));
}

#[test]
fn test_unreachable_columns_are_rejected() {
    let rows = vec![object(&[("ghost", json!(1))])];
    let err = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect_err("unknown property must fail");
    assert!(matches!(err, DecodeError::UnknownColumn { .. }));

    let rows = vec![object(&[("title.x", json!(1))])];
    let err = decoder()
        .decode_rows("Article", &HashMap::new(), &rows)
        .expect_err("scalar mid-path must fail");
    assert!(matches!(err, DecodeError::UnknownColumn { .. }));
}
