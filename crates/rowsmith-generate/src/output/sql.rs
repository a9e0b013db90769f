use rowsmith_core::Value;

use crate::dataset::DatasetGenerator;
use crate::errors::GenerationError;
use crate::planner::emission_order;
use crate::row::Row;
use crate::template::EntityTemplate;

/// Full SQL script for a dataset: `CREATE TABLE` statements for every entity
/// (when asked for) followed by the inserts, tables in dependency order.
///
/// Everything is rendered before anything is returned, so a type that cannot
/// be expressed in SQL fails the whole call.
pub fn render_sql(dataset: &DatasetGenerator, create_tables: bool) -> Result<String, GenerationError> {
    let templates: Vec<_> = dataset.templates().cloned().collect();
    let order = emission_order(&templates)?;

    let mut lines = Vec::new();
    if create_tables {
        for name in &order {
            if let Some(template) = dataset.template(name) {
                lines.push(create_table_statement(template)?);
            }
        }
    }
    for name in &order {
        if let (Some(template), Some(rows)) = (dataset.template(name), dataset.get(name)) {
            for row in rows {
                lines.push(insert_statement(template, row)?);
            }
        }
    }
    Ok(lines.join("\n"))
}

pub fn create_table_statement(template: &EntityTemplate) -> Result<String, GenerationError> {
    let mut definitions: Vec<String> = template
        .column_types()?
        .into_iter()
        .map(|(column, sql_type)| format!("{column} {sql_type}"))
        .collect();

    if !template.primary_key().is_empty() {
        definitions.push(format!(
            "CONSTRAINT pk_{} PRIMARY KEY ({})",
            template.name(),
            template.primary_key().join(", ")
        ));
    }

    for field in template.foreign_keys() {
        if let Some(fk) = template.foreign_key(field) {
            let columns: Vec<String> = fk.columns(field).into_iter().map(|(column, _)| column).collect();
            definitions.push(format!(
                "CONSTRAINT fk_{} FOREIGN KEY ({}) REFERENCES {}({})",
                field,
                columns.join(", "),
                fk.target_name(),
                fk.fields().join(", ")
            ));
        }
    }

    for field in template.unique_fields() {
        definitions.push(format!(
            "CONSTRAINT uq_{}_{} UNIQUE ({})",
            template.name(),
            field,
            field
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n\t{}\n);",
        template.name(),
        definitions.join(",\n\t")
    ))
}

pub fn insert_statement(template: &EntityTemplate, row: &Row) -> Result<String, GenerationError> {
    let columns = template.column_names();
    let values = columns
        .iter()
        .map(|column| row.get(column).unwrap_or(&Value::Null).to_sql_literal())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({});",
        template.name(),
        columns.join(", "),
        values.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{auto_increment, literal, primary_key, unique};

    #[test]
    fn create_table_lists_columns_then_constraints() {
        let template = EntityTemplate::builder("Country")
            .field("id", primary_key(auto_increment()))
            .field("code", unique(literal("ES")))
            .field("active", literal(true))
            .build()
            .expect("template");

        let statement = create_table_statement(&template).expect("statement");
        assert_eq!(
            statement,
            "CREATE TABLE IF NOT EXISTS Country (\n\
             \tid INTEGER,\n\
             \tcode VARCHAR(2),\n\
             \tactive BOOLEAN,\n\
             \tCONSTRAINT pk_Country PRIMARY KEY (id),\n\
             \tCONSTRAINT uq_Country_code UNIQUE (code)\n\
             );"
        );
    }

    #[test]
    fn insert_quotes_text_values() {
        let template = EntityTemplate::builder("Note")
            .field("body", literal("it's"))
            .field("pinned", literal(false))
            .build()
            .expect("template");
        let row: Row = [("body", Value::from("it's")), ("pinned", Value::Bool(false))]
            .into_iter()
            .collect();

        assert_eq!(
            insert_statement(&template, &row).expect("insert"),
            "INSERT INTO Note (body, pinned) VALUES ('it''s', FALSE);"
        );
    }
}
