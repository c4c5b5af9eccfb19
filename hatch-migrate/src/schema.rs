//! Declarative table model shared by the entity definitions, the snapshots
//! and the differ.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: Vec<TableDef>,
}

impl Schema {
    pub fn new(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Three-way merge of two schemas that both descend from `base`.
    ///
    /// A table, column or index removed on either side stays removed, one
    /// added on either side is kept, and one changed on only one side takes
    /// that side's definition. Incompatible changes to the same object are a
    /// [`MigrationError::MergeConflict`].
    pub fn merge(base: &Schema, ours: &Schema, theirs: &Schema) -> Result<Schema> {
        let tables = merge_named(
            &base.tables,
            &ours.tables,
            &theirs.tables,
            |t: &TableDef| t.name.as_str(),
            |b, o, t| match b {
                Some(b) => Ok(TableDef {
                    name: o.name.clone(),
                    columns: merge_named(
                        &b.columns,
                        &o.columns,
                        &t.columns,
                        |c: &ColumnDef| c.name.as_str(),
                        |bc, oc, tc| pick(&format!("column {}.{}", o.name, oc.name), bc, oc, tc),
                    )?,
                    indexes: merge_named(
                        &b.indexes,
                        &o.indexes,
                        &t.indexes,
                        |i: &IndexDef| i.name.as_str(),
                        |bi, oi, ti| pick(&format!("index {}", oi.name), bi, oi, ti),
                    )?,
                }),
                None => pick(&format!("table {}", o.name), None, o, t),
            },
        )?;
        Ok(Schema { tables })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| MigrationError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self).map_err(|source| {
            MigrationError::Snapshot {
                path: path.to_path_buf(),
                source,
            }
        })?;
        content.push('\n');
        fs::write(path, content).map_err(|e| MigrationError::io(path, e))
    }
}

fn find<'a, T>(items: &'a [T], key: &str, name: &impl Fn(&T) -> &str) -> Option<&'a T> {
    items.iter().find(|&item| name(item) == key)
}

/// Merge named items, keeping `ours` order with additions from `theirs`
/// appended. `both` resolves items present on both sides.
fn merge_named<T: Clone>(
    base: &[T],
    ours: &[T],
    theirs: &[T],
    name: impl Fn(&T) -> &str,
    both: impl Fn(Option<&T>, &T, &T) -> Result<T>,
) -> Result<Vec<T>> {
    let mut merged = Vec::with_capacity(ours.len());
    for item in ours {
        let key = name(item);
        let original = find(base, key, &name);
        match find(theirs, key, &name) {
            Some(other) => merged.push(both(original, item, other)?),
            None if original.is_none() => merged.push(item.clone()),
            None => {}
        }
    }
    for item in theirs {
        let key = name(item);
        if find(ours, key, &name).is_none() && find(base, key, &name).is_none() {
            merged.push(item.clone());
        }
    }
    Ok(merged)
}

fn pick<T: Clone + PartialEq>(object: &str, base: Option<&T>, ours: &T, theirs: &T) -> Result<T> {
    if ours == theirs || base == Some(theirs) {
        Ok(ours.clone())
    } else if base == Some(ours) {
        Ok(theirs.clone())
    } else {
        Err(MigrationError::MergeConflict {
            object: object.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub nullable: bool,
    /// SQL expression, e.g. `TRUE` or `NOW()`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ColumnDef {
    /// A `NOT NULL` column without a default.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Column clause as used in `CREATE TABLE` and `ADD COLUMN`.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.ty);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    BigSerial,
    Serial,
    BigInt,
    Integer,
    Boolean,
    Text,
    Varchar(u32),
    TimestampTz,
    Uuid,
    Jsonb,
}

impl ColumnType {
    /// Storage type without the implicit sequence, for `ALTER COLUMN ... TYPE`.
    pub fn storage(self) -> ColumnType {
        match self {
            ColumnType::BigSerial => ColumnType::BigInt,
            ColumnType::Serial => ColumnType::Integer,
            other => other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::BigSerial => f.write_str("BIGSERIAL"),
            ColumnType::Serial => f.write_str("SERIAL"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Integer => f.write_str("INTEGER"),
            ColumnType::Boolean => f.write_str("BOOLEAN"),
            ColumnType::Text => f.write_str("TEXT"),
            ColumnType::Varchar(len) => write!(f, "VARCHAR({len})"),
            ColumnType::TimestampTz => f.write_str("TIMESTAMPTZ"),
            ColumnType::Uuid => f.write_str("UUID"),
            ColumnType::Jsonb => f.write_str("JSONB"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Double-quote an identifier for Postgres.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
