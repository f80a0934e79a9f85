//! Prompt construction for both model calls.
//!
//! Pure functions: identical inputs always produce identical text, so prompts
//! can be asserted on directly without calling a model.

use crate::types::{ColumnDescriptor, ResultRow, SchemaModel, SqlStatement, TableDescriptor};

/// Row cap the model is told to put on every generated query.
pub const ROW_LIMIT: usize = 50;

/// Render one column as `name (type, nullable|not null[, constraints: c1, c2])`.
pub fn render_column(column: &ColumnDescriptor) -> String {
    let nullability = if column.nullable { "nullable" } else { "not null" };
    let mut out = format!("{} ({}, {}", column.name, column.data_type, nullability);

    if !column.constraints.is_empty() {
        let constraints: Vec<&str> = column.constraints.iter().map(String::as_str).collect();
        out.push_str(", constraints: ");
        out.push_str(&constraints.join(", "));
    }

    out.push(')');
    out
}

/// Render one table as a `Table:` header line and a `Columns:` line.
pub fn render_table(table: &TableDescriptor) -> String {
    let columns: Vec<String> = table.columns.iter().map(render_column).collect();
    format!(
        "Table: {}\nColumns: {}",
        table.qualified_name(),
        columns.join(", ")
    )
}

/// Render the whole schema, tables separated by a blank line.
pub fn render_schema(schema: &SchemaModel) -> String {
    schema
        .tables()
        .map(render_table)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the SQL-synthesis prompt.
///
/// # Arguments
///
/// * `question` - Natural language question
/// * `schema` - Schema the statement must be written against
///
/// # Returns
///
/// Prompt asking for a single bare PostgreSQL statement
pub fn sql_prompt(question: &str, schema: &SchemaModel) -> String {
    format!(
        r#"
Given the following PostgreSQL database schema:

{schema}

Generate a SQL query to answer this question: "{question}"

IMPORTANT RULES:
1. Return ONLY the SQL query without any markdown formatting, explanations, or code blocks
2. Do NOT use backticks in your response
3. Use proper PostgreSQL syntax with double quotes for identifiers if needed
4. Use JOINs rather than subqueries when relating tables
5. Limit results to {limit} rows maximum using LIMIT {limit}
6. Use table aliases for readability
7. If the question is unclear, make reasonable assumptions

SQL Query (no formatting):
"#,
        schema = render_schema(schema),
        question = question,
        limit = ROW_LIMIT,
    )
}

/// Build the summarization prompt.
///
/// Rows are embedded as pretty-printed JSON.
pub fn summary_prompt(question: &str, statement: &SqlStatement, rows: &[ResultRow]) -> String {
    // Maps of JSON values always serialize; the fallback is unreachable in practice.
    let rows_json = serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"
User Question: "{question}"

SQL Query Used: {statement}

Query Results (JSON):
{rows_json}

Based on the query results above, provide a natural, conversational answer to the user's question.
- Be concise but informative
- Present data in a readable format
- If there are multiple results, summarize appropriately
- If no results found, explain that clearly
- Use natural language, not technical jargon

Response:
"#,
        question = question,
        statement = statement.as_str(),
        rows_json = rows_json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::SafetyGate;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    const KINDS: [&str; 4] = ["CHECK", "FOREIGN KEY", "PRIMARY KEY", "UNIQUE"];

    fn schema() -> SchemaModel {
        vec![
            TableDescriptor::new("public", "employees")
                .with_column(
                    ColumnDescriptor::new("id", "integer", false)
                        .with_constraint("PRIMARY KEY")
                        .with_constraint("PRIMARY KEY"),
                )
                .with_column(ColumnDescriptor::new("name", "text", true))
                .with_column(
                    ColumnDescriptor::new("department_id", "integer", true)
                        .with_constraint("FOREIGN KEY"),
                ),
            TableDescriptor::new("public", "departments")
                .with_column(ColumnDescriptor::new("id", "integer", false).with_constraint("PRIMARY KEY"))
                .with_column(
                    ColumnDescriptor::new("code", "character varying", false)
                        .with_constraint("UNIQUE")
                        .with_constraint("FOREIGN KEY"),
                ),
        ]
        .into()
    }

    #[test]
    fn test_render_column() {
        assert_eq!(
            render_column(&ColumnDescriptor::new("name", "text", true)),
            "name (text, nullable)"
        );
        assert_eq!(
            render_column(
                &ColumnDescriptor::new("code", "varchar", false)
                    .with_constraint("UNIQUE")
                    .with_constraint("FOREIGN KEY")
            ),
            "code (varchar, not null, constraints: FOREIGN KEY, UNIQUE)"
        );
    }

    #[test]
    fn test_render_table() {
        let schema = schema();
        let table = schema.get("public", "employees").unwrap();
        assert_eq!(
            render_table(table),
            "Table: public.employees\nColumns: id (integer, not null, constraints: PRIMARY KEY), \
             name (text, nullable), department_id (integer, nullable, constraints: FOREIGN KEY)"
        );
    }

    #[test]
    fn test_sql_prompt_lists_every_table_once() {
        let prompt = sql_prompt("How many employees per department?", &schema());

        assert_eq!(prompt.matches("Table: ").count(), 2);
        assert_eq!(prompt.matches("Table: public.employees\n").count(), 1);
        assert_eq!(prompt.matches("Table: public.departments\n").count(), 1);
        assert_eq!(prompt.matches("PRIMARY KEY").count(), 2);
        assert!(prompt.contains("\"How many employees per department?\""));
        assert!(prompt.contains("LIMIT 50"));
        assert!(prompt.contains("Do NOT use backticks"));
        assert!(prompt.contains("double quotes for identifiers"));
        assert!(prompt.contains("table aliases"));
    }

    proptest! {
        #[test]
        fn prop_sql_prompt_renders_tables_and_columns_once(
            tables in prop::collection::vec(
                prop::collection::vec(prop::collection::vec(0..KINDS.len(), 0..6), 1..5),
                1..6,
            ),
            nullable in any::<bool>(),
        ) {
            let schema: SchemaModel = tables
                .iter()
                .enumerate()
                .map(|(t, columns)| {
                    columns.iter().enumerate().fold(
                        TableDescriptor::new("public", format!("t{}", t)),
                        |table, (c, picks)| {
                            let column = picks.iter().fold(
                                ColumnDescriptor::new(format!("t{}c{}", t, c), "integer", nullable),
                                |column, &k| column.with_constraint(KINDS[k]),
                            );
                            table.with_column(column)
                        },
                    )
                })
                .collect::<Vec<_>>()
                .into();

            let prompt = sql_prompt("q", &schema);
            prop_assert_eq!(prompt.matches("Table: ").count(), tables.len());

            for (t, columns) in tables.iter().enumerate() {
                let header = format!("Table: public.t{}\n", t);
                prop_assert_eq!(prompt.matches(header.as_str()).count(), 1);

                for (c, picks) in columns.iter().enumerate() {
                    let distinct: BTreeSet<&str> = picks.iter().map(|&k| KINDS[k]).collect();
                    let mut expected = format!(
                        "t{}c{} (integer, {}",
                        t,
                        c,
                        if nullable { "nullable" } else { "not null" }
                    );
                    if !distinct.is_empty() {
                        expected.push_str(", constraints: ");
                        expected.push_str(&distinct.into_iter().collect::<Vec<_>>().join(", "));
                    }
                    expected.push(')');
                    prop_assert_eq!(prompt.matches(expected.as_str()).count(), 1);
                }
            }
        }
    }

    #[test]
    fn test_sql_prompt_is_deterministic() {
        assert_eq!(sql_prompt("q", &schema()), sql_prompt("q", &schema()));
    }

    #[test]
    fn test_summary_prompt_embeds_statement_and_rows() {
        let statement = SafetyGate::default()
            .approve("SELECT e.name FROM public.employees e LIMIT 50")
            .unwrap();
        let mut row = ResultRow::new();
        row.insert("name".into(), json!("Ada"));

        let prompt = summary_prompt("Who works here?", &statement, &[row]);

        assert!(prompt.contains("User Question: \"Who works here?\""));
        assert!(prompt.contains("SQL Query Used: SELECT e.name FROM public.employees e LIMIT 50"));
        assert!(prompt.contains("\"name\": \"Ada\""));
        assert!(prompt.contains("If no results found, explain that clearly"));
    }

    #[test]
    fn test_summary_prompt_empty_rows() {
        let statement = SafetyGate::default().approve("SELECT 1 WHERE false").unwrap();
        let prompt = summary_prompt("anything?", &statement, &[]);
        assert!(prompt.contains("Query Results (JSON):\n[]\n"));
    }
}
