//! Storage facade tests against a mock statement executor: statement
//! shapes, parameter binding, transaction handling and the update/seed
//! fallback for rows missing from side tables.

use mockall::Sequence;
use serde_json::{json, Map};

use crate::support::*;
use pathsql::data_storage::{ExecutionError, StorageError};
use pathsql::query_spec::QuerySpecification;
use pathsql::value::SqlValue;

#[test]
fn test_fetch_compiles_executes_and_decodes() {
    let expected: &str = "SELECT [main].[articles].[id] AS [id], \
        [main].[articles].[title] AS [title], [t1].[name] AS [author.name] \
        FROM [main].[articles] \
        LEFT JOIN [main].[authors] AS [t1] ON [main].[articles].[author_id] = [t1].[id] \
        AND [t1].[deleted] = 0 \
        /** t1 => main:articles:author_id->LEFT_JOIN->main:authors:id */ \
        WHERE [t1].[name] = %s";
    let mut executor = MockExecutor::new();
    executor
        .expect_fetch_rows()
        .withf(move |statement, parameters| {
            statement == expected && parameters == [SqlValue::from("Jane")].as_slice()
        })
        .times(1)
        .returning(|_, _| {
            Ok(vec![object(&[
                ("id", json!(1)),
                ("title", json!("Intro")),
                ("author.name", json!("Jane")),
            ])])
        });
    let storage = storage_with(executor);
    let spec = QuerySpecification::for_entity("Article")
        .select("{id}, {title}, {author}.{name}")
        .where_clause("AND {author}.{name} = ?", vec![SqlValue::from("Jane")]);
    let fetched = storage.fetch(&spec).expect("fetch should succeed");
    assert_eq!(
        fetched,
        vec![json!({"id": 1, "title": "Intro", "author": {"name": "Jane"}})]
    );
}

#[test]
fn test_fetch_propagates_execution_errors() {
    let mut executor = MockExecutor::new();
    executor
        .expect_fetch_rows()
        .returning(|_, _| Err(ExecutionError::new("server has gone away")));
    let storage = storage_with(executor);
    let spec = QuerySpecification::for_entity("Article").select("{id}");
    let err = storage.fetch(&spec).expect_err("fetch must fail");
    assert!(matches!(err, StorageError::Execution(_)));
}

#[test]
fn test_count_reads_the_first_scalar() {
    let mut executor = MockExecutor::new();
    executor
        .expect_fetch_rows()
        .withf(|statement, parameters| {
            statement == "SELECT COUNT([main].[articles].[id]) FROM [main].[articles]"
                && parameters.is_empty()
        })
        .times(1)
        .returning(|_, _| Ok(vec![object(&[("COUNT([main].[articles].[id])", json!(42))])]));
    let storage = storage_with(executor);
    let spec = QuerySpecification::for_entity("Article");
    assert_eq!(storage.count(&spec).expect("count should succeed"), 42);
}

#[test]
fn test_insert_returns_the_generated_key() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[authors] ([name]) VALUES (%s)"
                && parameters == [SqlValue::from("Jane")].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_last_insert_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(7)));
    let storage = storage_with(executor);
    let generated = storage
        .insert("Author", &object(&[("name", json!("Jane"))]))
        .expect("insert should succeed");
    assert_eq!(generated, Some(7));
}

#[test]
fn test_insert_with_provided_key_skips_the_generated_lookup() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[authors] ([id], [name]) VALUES (%i, %s)"
                && parameters == [SqlValue::Int(9), SqlValue::from("Jane")].as_slice()
        })
        .times(1)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    let generated = storage
        .insert("Author", &object(&[("id", json!(9)), ("name", json!("Jane"))]))
        .expect("insert should succeed");
    assert_eq!(generated, None);
}

#[test]
fn test_multi_repository_insert_runs_in_a_transaction() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_begin()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[products] ([name]) VALUES (%s)"
                && parameters == [SqlValue::from("Widget")].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_last_insert_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(3)));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[product_details] ([id], [weight]) VALUES (%i, %f)"
                && parameters == [SqlValue::UInt(3), SqlValue::Float(1.5)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    let storage = storage_with(executor);
    let generated = storage
        .insert(
            "Product",
            &object(&[("name", json!("Widget")), ("weight", json!(1.5))]),
        )
        .expect("insert should succeed");
    assert_eq!(generated, Some(3));
}

#[test]
fn test_insert_rolls_back_when_a_statement_fails() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_begin()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    executor
        .expect_execute()
        .withf(|statement, _| statement.starts_with("INSERT INTO [main].[products]"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_last_insert_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(3)));
    executor
        .expect_execute()
        .withf(|statement, _| statement.starts_with("INSERT INTO [main].[product_details]"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(ExecutionError::new("duplicate entry")));
    executor
        .expect_rollback()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    let storage = storage_with(executor);
    let err = storage
        .insert(
            "Product",
            &object(&[("name", json!("Widget")), ("weight", json!(1.5))]),
        )
        .expect_err("insert must fail");
    assert!(matches!(err, StorageError::Execution(_)));
}

#[test]
fn test_side_table_only_insert_anchors_the_main_row() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_begin()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[products] () VALUES ()" && parameters.is_empty()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_last_insert_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(4)));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[product_details] ([id], [weight]) VALUES (%i, %f)"
                && parameters == [SqlValue::UInt(4), SqlValue::Float(2.0)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    let storage = storage_with(executor);
    let generated = storage
        .insert("Product", &object(&[("weight", json!(2.0))]))
        .expect("insert should succeed");
    assert_eq!(generated, Some(4));
}

#[test]
fn test_insert_without_attributes_is_rejected() {
    let storage = storage_with(MockExecutor::new());
    let err = storage
        .insert("Author", &Map::new())
        .expect_err("empty insert must fail");
    assert!(matches!(err, StorageError::Invalid(_)));
}

#[test]
fn test_update_touches_only_the_affected_repository() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "UPDATE [main].[authors] SET [name] = %s WHERE [id] = %i"
                && parameters == [SqlValue::from("Joan"), SqlValue::Int(7)].as_slice()
        })
        .times(1)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    storage
        .update("Author", &json!(7), &object(&[("name", json!("Joan"))]))
        .expect("update should succeed");
}

#[test]
fn test_update_excludes_the_primary_key_from_assignments() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "UPDATE [main].[authors] SET [name] = %s WHERE [id] = %i"
                && parameters == [SqlValue::from("Joan"), SqlValue::Int(7)].as_slice()
        })
        .times(1)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    storage
        .update(
            "Author",
            &json!(7),
            &object(&[("id", json!(99)), ("name", json!("Joan"))]),
        )
        .expect("update should succeed");
}

#[test]
fn test_update_seeds_a_missing_side_table_row() {
    let update = "UPDATE [main].[product_details] SET [weight] = %f WHERE [id] = %i";
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_execute()
        .withf(move |statement, _| statement == update)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(0));
    executor
        .expect_fetch_rows()
        .withf(|statement, parameters| {
            statement
                == "SELECT COUNT([id]) FROM [main].[product_details] WHERE [id] = %i"
                && parameters == [SqlValue::Int(3)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(vec![object(&[("COUNT([id])", json!(0))])]));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[product_details] ([id]) VALUES (%i)"
                && parameters == [SqlValue::Int(3)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_execute()
        .withf(move |statement, parameters| {
            statement == update
                && parameters == [SqlValue::Float(2.5), SqlValue::Int(3)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    storage
        .update("Product", &json!(3), &object(&[("weight", json!(2.5))]))
        .expect("update should seed and retry");
}

#[test]
fn test_remove_deletes_from_every_repository() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "DELETE FROM [main].[products] WHERE [id] = %i LIMIT 1"
                && parameters == [SqlValue::Int(3)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "DELETE FROM [main].[product_details] WHERE [id] = %i LIMIT 1"
                && parameters == [SqlValue::Int(3)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    storage
        .remove("Product", &json!(3))
        .expect("remove should succeed");
}

#[test]
fn test_link_management_targets_the_junction_table() {
    let mut executor = MockExecutor::new();
    let mut seq = Sequence::new();
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement == "INSERT INTO [main].[articles_tags] ([articles], [tags]) VALUES (%i, %i)"
                && parameters == [SqlValue::Int(1), SqlValue::Int(5)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    executor
        .expect_execute()
        .withf(|statement, parameters| {
            statement
                == "DELETE FROM [main].[articles_tags] WHERE [articles] = %i AND [tags] = %i LIMIT 1"
                && parameters == [SqlValue::Int(1), SqlValue::Int(5)].as_slice()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(1));
    let storage = storage_with(executor);
    storage
        .create_link("articles_tags", ("Article", &json!(1)), ("Tag", &json!(5)))
        .expect("link should be created");
    storage
        .remove_link("articles_tags", ("Article", &json!(1)), ("Tag", &json!(5)))
        .expect("link should be removed");
}

#[test]
fn test_fetch_related_scopes_through_the_junction() {
    let expected: &str = "SELECT [main].[tags].[id] AS [id], [main].[tags].[name] AS [name] \
        FROM [main].[tags] \
        JOIN [main].[articles_tags] ON [main].[articles_tags].[tags] = [main].[tags].[id] \
        AND [main].[articles_tags].[articles] = %i";
    let mut executor = MockExecutor::new();
    executor
        .expect_fetch_rows()
        .withf(move |statement, parameters| {
            statement == expected && parameters == [SqlValue::Int(1)].as_slice()
        })
        .times(1)
        .returning(|_, _| Ok(vec![object(&[("id", json!(5)), ("name", json!("rust"))])]));
    let storage = storage_with(executor);
    let spec = QuerySpecification::for_entity("Tag").select("{id}, {name}");
    let fetched = storage
        .fetch_related(&spec, "articles_tags", "Article", &json!(1))
        .expect("fetch_related should succeed");
    assert_eq!(fetched, vec![json!({"id": 5, "name": "rust"})]);
}

#[test]
fn test_count_related_counts_linked_rows() {
    let expected: &str = "SELECT COUNT([main].[tags].[id]) FROM [main].[tags] \
        JOIN [main].[articles_tags] ON [main].[articles_tags].[tags] = [main].[tags].[id] \
        AND [main].[articles_tags].[articles] = %i";
    let mut executor = MockExecutor::new();
    executor
        .expect_fetch_rows()
        .withf(move |statement, parameters| {
            statement == expected && parameters == [SqlValue::Int(1)].as_slice()
        })
        .times(1)
        .returning(|_, _| Ok(vec![object(&[("COUNT([main].[tags].[id])", json!(3))])]));
    let storage = storage_with(executor);
    let spec = QuerySpecification::for_entity("Tag").select("{id}");
    let count = storage
        .count_related(&spec, "articles_tags", "Article", &json!(1))
        .expect("count_related should succeed");
    assert_eq!(count, 3);
}
