//! Shared fixtures for integration tests
//!
//! One entity catalog covering every relationship shape, a canned
//! introspector standing in for `SHOW COLUMNS`, and a mock statement
//! executor for the storage facade tests.

use std::collections::HashMap;
use std::sync::Arc;

use mockall::mock;
use serde_json::{Map, Value};

use pathsql::data_converter::DefaultDataConverter;
use pathsql::data_storage::{DataStorage, ExecutionError, StatementExecutor};
use pathsql::entity_catalog::{
    DataType, EntityCatalog, EntityInformation, PropertyInformation, Relationship,
};
use pathsql::query_compiler::{CompilerOptions, QueryCompiler};
use pathsql::schema_metadata::{
    RawColumn, SchemaError, SchemaIntrospector, SchemaMetadataResolver, TableStatus,
};
use pathsql::value::SqlValue;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn article() -> EntityInformation {
    EntityInformation::new(
        "Article",
        "articles",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("title", "title", DataType::Text),
            PropertyInformation::column_backed("published_at", "published_at", DataType::DateTime)
                .nullable(),
            PropertyInformation::related(
                "author",
                Relationship::One {
                    entity: "Author".to_string(),
                    owner_column: "author_id".to_string(),
                },
            ),
            PropertyInformation::related(
                "comments",
                Relationship::Many {
                    entity: "Comment".to_string(),
                    connect_via_property: "article".to_string(),
                    owner_name_in_property: None,
                },
            ),
            PropertyInformation::related(
                "tags",
                Relationship::ManyViaJunction {
                    entity: "Tag".to_string(),
                    junction_repository: "articles_tags".to_string(),
                },
            ),
        ],
    )
}

fn author() -> EntityInformation {
    EntityInformation::new(
        "Author",
        "authors",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("name", "name", DataType::Text),
            PropertyInformation::column_backed("email", "email", DataType::Text).nullable(),
            PropertyInformation::column_backed("deleted", "deleted", DataType::Boolean),
            PropertyInformation::related(
                "profile",
                Relationship::OneInverse {
                    entity: "Profile".to_string(),
                    connect_via_property: "author".to_string(),
                },
            ),
        ],
    )
    .with_soft_delete("deleted")
}

fn profile() -> EntityInformation {
    EntityInformation::new(
        "Profile",
        "profiles",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::related(
                "author",
                Relationship::One {
                    entity: "Author".to_string(),
                    owner_column: "author_id".to_string(),
                },
            ),
            PropertyInformation::column_backed("bio", "bio", DataType::Text),
        ],
    )
}

fn comment() -> EntityInformation {
    EntityInformation::new(
        "Comment",
        "comments",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::related(
                "article",
                Relationship::One {
                    entity: "Article".to_string(),
                    owner_column: "article_id".to_string(),
                },
            ),
            PropertyInformation::column_backed("text", "text", DataType::Text),
        ],
    )
}

fn tag() -> EntityInformation {
    EntityInformation::new(
        "Tag",
        "tags",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("name", "name", DataType::Text),
        ],
    )
}

fn magazine() -> EntityInformation {
    EntityInformation::new(
        "Magazine",
        "magazines",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("title", "title", DataType::Text),
            PropertyInformation::related(
                "attachment",
                Relationship::OneInverseDynamic {
                    entity: "Attachment".to_string(),
                    connect_via_property: "owner".to_string(),
                    owner_name_in_property: "owner_name".to_string(),
                },
            ),
        ],
    )
}

fn attachment() -> EntityInformation {
    EntityInformation::new(
        "Attachment",
        "attachments",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("owner", "owner_id", DataType::Integer),
            PropertyInformation::column_backed("owner_name", "owner_type", DataType::Text),
            PropertyInformation::column_backed("file_name", "file_name", DataType::Text),
        ],
    )
}

/// Product spreads its `weight` property into a side table.
fn product() -> EntityInformation {
    EntityInformation::new(
        "Product",
        "products",
        "id",
        vec![
            PropertyInformation::column_backed("id", "id", DataType::Integer).auto_increment(),
            PropertyInformation::column_backed("name", "name", DataType::Text),
            PropertyInformation::column_backed("weight", "weight", DataType::Float)
                .in_repository(None, "product_details"),
        ],
    )
}

pub fn fixture_catalog() -> Arc<EntityCatalog> {
    Arc::new(
        EntityCatalog::build(
            "main",
            HashMap::new(),
            vec![
                article(),
                author(),
                profile(),
                comment(),
                tag(),
                magazine(),
                attachment(),
                product(),
            ],
        )
        .expect("fixture catalog should validate"),
    )
}

/// Serves the table layouts behind the fixture catalog.
pub struct FixtureIntrospector;

impl SchemaIntrospector for FixtureIntrospector {
    fn columns(&self, storage: &str, repository: &str) -> Result<Vec<RawColumn>, SchemaError> {
        let pk = || {
            RawColumn::new("id", "int(11)", false)
                .with_key("PRI")
                .with_extra("auto_increment")
        };
        let columns = match (storage, repository) {
            ("main", "articles") => vec![
                pk(),
                RawColumn::new("title", "varchar(255)", false),
                RawColumn::new("published_at", "datetime", true),
                RawColumn::new("author_id", "int(11)", false).with_key("MUL"),
            ],
            ("main", "authors") => vec![
                pk(),
                RawColumn::new("name", "varchar(255)", false),
                RawColumn::new("email", "varchar(255)", true),
                RawColumn::new("deleted", "tinyint(1)", false).with_default("0"),
            ],
            ("main", "profiles") => vec![
                pk(),
                RawColumn::new("author_id", "int(11)", false).with_key("MUL"),
                RawColumn::new("bio", "text", true),
            ],
            ("main", "comments") => vec![
                pk(),
                RawColumn::new("article_id", "int(11)", false).with_key("MUL"),
                RawColumn::new("text", "text", false),
            ],
            ("main", "tags") => vec![
                pk(),
                RawColumn::new("name", "varchar(100)", false),
            ],
            ("main", "articles_tags") => vec![
                RawColumn::new("articles", "int(11)", false).with_key("MUL"),
                RawColumn::new("tags", "int(11)", false).with_key("MUL"),
            ],
            ("main", "magazines") => vec![
                pk(),
                RawColumn::new("title", "varchar(255)", false),
            ],
            ("main", "attachments") => vec![
                pk(),
                RawColumn::new("owner_id", "int(11)", false).with_key("MUL"),
                RawColumn::new("owner_type", "varchar(50)", false),
                RawColumn::new("file_name", "varchar(255)", false),
            ],
            ("main", "products") => vec![
                pk(),
                RawColumn::new("name", "varchar(255)", false),
            ],
            // The detail row shares the product key instead of minting one.
            ("main", "product_details") => vec![
                RawColumn::new("id", "int(11)", false).with_key("PRI"),
                RawColumn::new("weight", "decimal(10,2)", false),
            ],
            ("archive_2024", "authors_archive") => vec![
                pk(),
                RawColumn::new("name", "varchar(255)", false),
            ],
            _ => Vec::new(),
        };
        Ok(columns)
    }

    fn table_status(
        &self,
        _storage: &str,
        repository: &str,
    ) -> Result<Option<TableStatus>, SchemaError> {
        Ok(Some(TableStatus::new(repository, Some("InnoDB".to_string()))))
    }
}

pub fn fixture_resolver() -> Arc<SchemaMetadataResolver> {
    Arc::new(SchemaMetadataResolver::new(
        Arc::new(FixtureIntrospector),
        Arc::new(DefaultDataConverter),
    ))
}

pub fn compiler() -> QueryCompiler {
    QueryCompiler::new(fixture_catalog(), fixture_resolver())
}

pub fn compiler_with(options: CompilerOptions) -> QueryCompiler {
    QueryCompiler::with_options(fixture_catalog(), fixture_resolver(), options)
}

/// Builds an ordered JSON object, used both for result rows and for
/// attribute maps.
pub fn object(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

mock! {
    pub Executor {}

    impl StatementExecutor for Executor {
        fn fetch_rows(
            &self,
            statement: &str,
            parameters: &[SqlValue],
        ) -> Result<Vec<Map<String, Value>>, ExecutionError>;

        fn execute(&self, statement: &str, parameters: &[SqlValue]) -> Result<u64, ExecutionError>;

        fn last_insert_id(&self) -> Result<Option<u64>, ExecutionError>;

        fn begin(&self) -> Result<(), ExecutionError>;

        fn commit(&self) -> Result<(), ExecutionError>;

        fn rollback(&self) -> Result<(), ExecutionError>;
    }
}

pub fn storage_with(executor: MockExecutor) -> DataStorage {
    DataStorage::new(
        fixture_catalog(),
        fixture_resolver(),
        Arc::new(DefaultDataConverter),
        Arc::new(executor),
    )
}
