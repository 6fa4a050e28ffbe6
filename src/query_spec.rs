//! Object-level query specifications
//!
//! A [`QuerySpecification`] carries the caller's query in fragments that
//! still contain `{property}` path tokens and bare `?` markers. The
//! compiler resolves both into table references and typed placeholders.

use crate::value::SqlValue;

/// One query fragment: raw text plus the parameters its `?` markers bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub parameters: Vec<SqlValue>,
}

impl Fragment {
    pub fn new(text: impl Into<String>, parameters: Vec<SqlValue>) -> Self {
        Fragment {
            text: text.into(),
            parameters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Appends text and parameters to the fragment.
    pub fn append(&mut self, text: &str, parameters: Vec<SqlValue>) {
        self.text.push_str(text);
        self.parameters.extend(parameters);
    }
}

/// The full object-level query, one fragment per clause.
///
/// Fragments are assembled in a fixed order: select, from, join, where,
/// order by, limit, offset. Parameters keep that order in the compiled
/// statement.
#[derive(Debug, Clone, Default)]
pub struct QuerySpecification {
    /// Default entity; unprefixed path tokens resolve against it.
    pub entity: String,
    pub select: Fragment,
    pub from: Fragment,
    pub join: Fragment,
    pub where_clause: Fragment,
    pub order_by: Fragment,
    pub limit: Fragment,
    pub offset: Fragment,
    /// Force `SELECT DISTINCT`; to-many paths set this on their own.
    pub distinct: bool,
    /// Compile as a COUNT query over the default entity's primary key.
    pub count: bool,
}

impl QuerySpecification {
    pub fn for_entity(entity: impl Into<String>) -> Self {
        QuerySpecification {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn select(mut self, text: &str) -> Self {
        self.select.append(text, Vec::new());
        self
    }

    pub fn from(mut self, text: &str) -> Self {
        self.from.append(text, Vec::new());
        self
    }

    pub fn join(mut self, text: &str, parameters: Vec<SqlValue>) -> Self {
        self.join.append(text, parameters);
        self
    }

    pub fn where_clause(mut self, text: &str, parameters: Vec<SqlValue>) -> Self {
        self.where_clause.append(text, parameters);
        self
    }

    pub fn order_by(mut self, text: &str) -> Self {
        self.order_by.append(text, Vec::new());
        self
    }

    pub fn limit(mut self, rows: u64) -> Self {
        self.limit = Fragment::new("%i", vec![SqlValue::UInt(rows)]);
        self
    }

    pub fn offset(mut self, rows: u64) -> Self {
        self.offset = Fragment::new("%i", vec![SqlValue::UInt(rows)]);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn counting(mut self) -> Self {
        self.count = true;
        self
    }
}
