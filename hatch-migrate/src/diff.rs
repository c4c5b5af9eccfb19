//! Structural diff between two [`Schema`]s and its Postgres rendering.

use crate::schema::{quote_ident, ColumnDef, IndexDef, Schema, TableDef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateTable(TableDef),
    DropTable(TableDef),
    AddColumn { table: String, column: ColumnDef },
    DropColumn { table: String, column: ColumnDef },
    AlterColumn { table: String, from: ColumnDef, to: ColumnDef },
    CreateIndex { table: String, index: IndexDef },
    DropIndex { table: String, index: IndexDef },
}

impl SchemaChange {
    /// The change that undoes this one.
    pub fn inverse(&self) -> SchemaChange {
        match self {
            SchemaChange::CreateTable(t) => SchemaChange::DropTable(t.clone()),
            SchemaChange::DropTable(t) => SchemaChange::CreateTable(t.clone()),
            SchemaChange::AddColumn { table, column } => SchemaChange::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            SchemaChange::DropColumn { table, column } => SchemaChange::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            SchemaChange::AlterColumn { table, from, to } => SchemaChange::AlterColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            SchemaChange::CreateIndex { table, index } => SchemaChange::DropIndex {
                table: table.clone(),
                index: index.clone(),
            },
            SchemaChange::DropIndex { table, index } => SchemaChange::CreateIndex {
                table: table.clone(),
                index: index.clone(),
            },
        }
    }

    // Creations first, removals last, indexes dropped before being recreated.
    // A column gaining the primary key runs after the one losing it.
    fn rank(&self) -> u8 {
        match self {
            SchemaChange::CreateTable(_) => 0,
            SchemaChange::AddColumn { .. } => 1,
            SchemaChange::AlterColumn { from, to, .. } if to.primary_key && !from.primary_key => 3,
            SchemaChange::AlterColumn { .. } => 2,
            SchemaChange::DropIndex { .. } => 4,
            SchemaChange::CreateIndex { .. } => 5,
            SchemaChange::DropColumn { .. } => 6,
            SchemaChange::DropTable(_) => 7,
        }
    }

    /// Postgres statements for this change, each terminated with `;`.
    pub fn to_sql(&self) -> Vec<String> {
        match self {
            SchemaChange::CreateTable(table) => {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| format!("    {}", c.to_sql()))
                    .collect();
                let mut out = vec![format!(
                    "CREATE TABLE {} (\n{}\n);",
                    quote_ident(&table.name),
                    columns.join(",\n")
                )];
                out.extend(table.indexes.iter().map(|i| create_index_sql(&table.name, i)));
                out
            }
            SchemaChange::DropTable(table) => {
                vec![format!("DROP TABLE {};", quote_ident(&table.name))]
            }
            SchemaChange::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                quote_ident(table),
                column.to_sql()
            )],
            SchemaChange::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                quote_ident(table),
                quote_ident(&column.name)
            )],
            SchemaChange::AlterColumn { table, from, to } => alter_column_sql(table, from, to),
            SchemaChange::CreateIndex { table, index } => vec![create_index_sql(table, index)],
            SchemaChange::DropIndex { index, .. } => {
                vec![format!("DROP INDEX {};", quote_ident(&index.name))]
            }
        }
    }
}

fn create_index_sql(table: &str, index: &IndexDef) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&index.name),
        quote_ident(table),
        columns.join(", ")
    )
}

fn alter_column_sql(table: &str, from: &ColumnDef, to: &ColumnDef) -> Vec<String> {
    let column = quote_ident(&to.name);
    let mut actions = Vec::new();

    if from.ty.storage() != to.ty.storage() {
        actions.push(format!("ALTER COLUMN {column} TYPE {}", to.ty.storage()));
    }
    if from.nullable != to.nullable {
        let action = if to.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        actions.push(format!("ALTER COLUMN {column} {action}"));
    }
    if from.default != to.default {
        match &to.default {
            Some(expr) => actions.push(format!("ALTER COLUMN {column} SET DEFAULT {expr}")),
            None => actions.push(format!("ALTER COLUMN {column} DROP DEFAULT")),
        }
    }

    // Postgres names the constraint `<table>_pkey`; replacing it in the same
    // statement lets the key move from one column to another.
    let constraint = quote_ident(&format!("{table}_pkey"));
    match (from.primary_key, to.primary_key) {
        (true, false) => actions.push(format!("DROP CONSTRAINT IF EXISTS {constraint}")),
        (false, true) => {
            actions.push(format!("DROP CONSTRAINT IF EXISTS {constraint}"));
            actions.push(format!("ADD PRIMARY KEY ({column})"));
        }
        _ => {}
    }

    if actions.is_empty() {
        return Vec::new();
    }
    vec![format!("ALTER TABLE {} {};", quote_ident(table), actions.join(", "))]
}

/// Changes that turn `from` into `to`, in execution order.
pub fn diff(from: &Schema, to: &Schema) -> Vec<SchemaChange> {
    let mut changes = Vec::new();

    for table in &to.tables {
        let Some(old) = from.table(&table.name) else {
            changes.push(SchemaChange::CreateTable(table.clone()));
            continue;
        };

        for column in &table.columns {
            match old.column(&column.name) {
                None => changes.push(SchemaChange::AddColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                }),
                Some(prev) if !alter_column_sql(&table.name, prev, column).is_empty() => {
                    changes.push(SchemaChange::AlterColumn {
                        table: table.name.clone(),
                        from: prev.clone(),
                        to: column.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        for column in &old.columns {
            if table.column(&column.name).is_none() {
                changes.push(SchemaChange::DropColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                });
            }
        }

        for index in &table.indexes {
            match old.index(&index.name) {
                None => changes.push(SchemaChange::CreateIndex {
                    table: table.name.clone(),
                    index: index.clone(),
                }),
                Some(prev) if prev != index => {
                    changes.push(SchemaChange::DropIndex {
                        table: table.name.clone(),
                        index: prev.clone(),
                    });
                    changes.push(SchemaChange::CreateIndex {
                        table: table.name.clone(),
                        index: index.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        for index in &old.indexes {
            if table.index(&index.name).is_none() {
                changes.push(SchemaChange::DropIndex {
                    table: table.name.clone(),
                    index: index.clone(),
                });
            }
        }
    }

    for table in &from.tables {
        if to.table(&table.name).is_none() {
            changes.push(SchemaChange::DropTable(table.clone()));
        }
    }

    changes.sort_by_key(SchemaChange::rank);
    changes
}

/// Changes that undo `changes`, in execution order.
pub fn invert(changes: &[SchemaChange]) -> Vec<SchemaChange> {
    changes.iter().rev().map(SchemaChange::inverse).collect()
}

/// Render a script: a comment header followed by one statement per change.
pub fn render(header: &str, changes: &[SchemaChange]) -> String {
    let mut script = String::new();
    for line in header.lines() {
        script.push_str("-- ");
        script.push_str(line);
        script.push('\n');
    }
    for change in changes {
        for statement in change.to_sql() {
            script.push('\n');
            script.push_str(&statement);
            script.push('\n');
        }
    }
    script
}

/// True when a script has nothing but comments and whitespace.
pub fn is_noop(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn users(with_name: bool) -> TableDef {
        let mut table = TableDef::new("users")
            .with_column(ColumnDef::new("id", ColumnType::BigSerial).primary_key())
            .with_column(ColumnDef::new("email", ColumnType::Varchar(255)))
            .with_index(IndexDef::new("ix_users_email", &["email"]).unique());
        if with_name {
            table = table.with_column(ColumnDef::new("name", ColumnType::Varchar(255)).nullable());
        }
        table
    }

    #[test]
    fn identical_schemas_have_no_diff() {
        let schema = Schema::new(vec![users(true)]);
        assert!(diff(&schema, &schema).is_empty());
    }

    #[test]
    fn create_from_empty() {
        let to = Schema::new(vec![users(false)]);
        let changes = diff(&Schema::default(), &to);
        assert_eq!(changes, vec![SchemaChange::CreateTable(users(false))]);

        let sql = changes[0].to_sql();
        assert_eq!(
            sql[0],
            "CREATE TABLE \"users\" (\n    \"id\" BIGSERIAL PRIMARY KEY,\n    \"email\" VARCHAR(255) NOT NULL\n);"
        );
        assert_eq!(
            sql[1],
            "CREATE UNIQUE INDEX \"ix_users_email\" ON \"users\" (\"email\");"
        );
    }

    #[test]
    fn add_and_drop_columns() {
        let before = Schema::new(vec![users(false)]);
        let after = Schema::new(vec![users(true)]);

        let up = diff(&before, &after);
        assert!(matches!(&up[..], [SchemaChange::AddColumn { column, .. }] if column.name == "name"));

        let down = diff(&after, &before);
        assert_eq!(down, invert(&up));
    }

    #[test]
    fn alter_column_renders_each_difference() {
        let from = ColumnDef::new("name", ColumnType::Varchar(100)).nullable();
        let to = ColumnDef::new("name", ColumnType::Text).default_sql("''");
        let sql = alter_column_sql("users", &from, &to);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"name\" TYPE TEXT, \
                 ALTER COLUMN \"name\" SET NOT NULL, ALTER COLUMN \"name\" SET DEFAULT '';"
                    .to_string()
            ]
        );
    }

    #[test]
    fn primary_key_moves_between_columns() {
        let mut moved = users(false);
        moved.columns[0].primary_key = false;
        moved.columns[1].primary_key = true;
        let before = Schema::new(vec![users(false)]);
        let after = Schema::new(vec![moved]);

        let up = diff(&before, &after);
        let sql: Vec<String> = up.iter().flat_map(SchemaChange::to_sql).collect();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" DROP CONSTRAINT IF EXISTS \"users_pkey\";".to_string(),
                "ALTER TABLE \"users\" DROP CONSTRAINT IF EXISTS \"users_pkey\", \
                 ADD PRIMARY KEY (\"email\");"
                    .to_string(),
            ]
        );

        let down: Vec<String> = invert(&up).iter().flat_map(SchemaChange::to_sql).collect();
        assert!(down[0].ends_with("DROP CONSTRAINT IF EXISTS \"users_pkey\";"));
        assert!(down[1].ends_with("ADD PRIMARY KEY (\"id\");"));
    }

    #[test]
    fn changes_are_ordered_for_execution() {
        let before = Schema::new(vec![
            users(true),
            TableDef::new("legacy").with_column(ColumnDef::new("id", ColumnType::Serial)),
        ]);
        let mut new_users = users(false);
        new_users.indexes[0].unique = false;
        let after = Schema::new(vec![
            new_users,
            TableDef::new("audit").with_column(ColumnDef::new("id", ColumnType::BigSerial)),
        ]);

        let ranks: Vec<u8> = diff(&before, &after).iter().map(SchemaChange::rank).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
        assert_eq!(ranks.first(), Some(&0));
        assert_eq!(ranks.last(), Some(&7));
    }

    #[test]
    fn render_and_noop() {
        let script = render("add users", &diff(&Schema::default(), &Schema::new(vec![users(false)])));
        assert!(script.starts_with("-- add users\n"));
        assert!(!is_noop(&script));
        assert!(is_noop(&render("merge heads\nnothing to do", &[])));
        assert!(is_noop(""));
    }
}
