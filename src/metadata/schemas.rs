// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Arrow schemas for ADBC metadata results.
//!
//! `get_objects()` nests catalogs → db_schemas → tables → columns and
//! constraints. Each `*_fields()` function returns the struct members of one
//! level and each `*_item()` function the list item wrapping it.

use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

fn struct_item(fields: Vec<Field>) -> Field {
    Field::new("item", DataType::Struct(fields.into()), true)
}

fn list_of(name: &str, item: Field, nullable: bool) -> Field {
    Field::new(name, DataType::List(Arc::new(item)), nullable)
}

pub fn get_objects_schema() -> Schema {
    Schema::new(vec![
        Field::new("catalog_name", DataType::Utf8, true),
        list_of("catalog_db_schemas", db_schema_item(), true),
    ])
}

pub fn db_schema_item() -> Field {
    struct_item(db_schema_fields())
}

pub fn db_schema_fields() -> Vec<Field> {
    vec![
        Field::new("db_schema_name", DataType::Utf8, true),
        list_of("db_schema_tables", table_item(), true),
    ]
}

pub fn table_item() -> Field {
    struct_item(table_fields())
}

pub fn table_fields() -> Vec<Field> {
    vec![
        Field::new("table_name", DataType::Utf8, false),
        Field::new("table_type", DataType::Utf8, false),
        list_of("table_columns", column_item(), true),
        list_of("table_constraints", constraint_item(), true),
    ]
}

pub fn column_item() -> Field {
    struct_item(column_fields())
}

pub fn column_fields() -> Vec<Field> {
    let int16 = |name: &str| Field::new(name, DataType::Int16, true);
    let int32 = |name: &str| Field::new(name, DataType::Int32, true);
    let utf8 = |name: &str| Field::new(name, DataType::Utf8, true);
    let boolean = |name: &str| Field::new(name, DataType::Boolean, true);
    vec![
        Field::new("column_name", DataType::Utf8, false),
        int32("ordinal_position"),
        utf8("remarks"),
        int16("xdbc_data_type"),
        utf8("xdbc_type_name"),
        int32("xdbc_column_size"),
        int16("xdbc_decimal_digits"),
        int16("xdbc_num_prec_radix"),
        int16("xdbc_nullable"),
        utf8("xdbc_column_def"),
        int16("xdbc_sql_data_type"),
        int16("xdbc_datetime_sub"),
        int32("xdbc_char_octet_length"),
        utf8("xdbc_is_nullable"),
        utf8("xdbc_scope_catalog"),
        utf8("xdbc_scope_schema"),
        utf8("xdbc_scope_table"),
        boolean("xdbc_is_autoincrement"),
        boolean("xdbc_is_generatedcolumn"),
    ]
}

pub fn constraint_item() -> Field {
    struct_item(constraint_fields())
}

/// Item of `constraint_column_names`.
pub fn constraint_column_name_item() -> Field {
    Field::new("item", DataType::Utf8, false)
}

pub fn constraint_fields() -> Vec<Field> {
    vec![
        Field::new("constraint_name", DataType::Utf8, true),
        Field::new("constraint_type", DataType::Utf8, false),
        list_of("constraint_column_names", constraint_column_name_item(), false),
        list_of("constraint_column_usage", usage_item(), true),
    ]
}

pub fn usage_item() -> Field {
    struct_item(usage_fields())
}

pub fn usage_fields() -> Vec<Field> {
    vec![
        Field::new("fk_catalog", DataType::Utf8, true),
        Field::new("fk_db_schema", DataType::Utf8, true),
        Field::new("fk_table", DataType::Utf8, false),
        Field::new("fk_column_name", DataType::Utf8, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn struct_fields_of_list(field: &Field) -> Vec<String> {
        match field.data_type() {
            DataType::List(item) => match item.data_type() {
                DataType::Struct(fields) => fields.iter().map(|f| f.name().clone()).collect(),
                other => panic!("Expected struct item, got {:?}", other),
            },
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_get_objects_nesting() {
        let schema = get_objects_schema();
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field(0).is_nullable());

        let db_schema = struct_fields_of_list(schema.field(1));
        assert_eq!(db_schema, vec!["db_schema_name", "db_schema_tables"]);

        let tables = struct_fields_of_list(&db_schema_fields()[1]);
        assert_eq!(
            tables,
            vec!["table_name", "table_type", "table_columns", "table_constraints"]
        );
    }

    #[test]
    fn test_column_fields() {
        let fields = column_fields();
        assert_eq!(fields.len(), 19);
        assert!(!fields[0].is_nullable());
        assert_eq!(fields[3].name(), "xdbc_data_type");
        assert_eq!(fields[3].data_type(), &DataType::Int16);
        assert_eq!(fields[18].name(), "xdbc_is_generatedcolumn");
    }

    #[test]
    fn test_constraint_and_usage_nullability() {
        let constraint = constraint_fields();
        assert!(constraint[0].is_nullable());
        assert!(!constraint[1].is_nullable());
        assert!(!constraint[2].is_nullable());

        let usage = usage_fields();
        assert!(!usage[2].is_nullable());
        assert!(!usage[3].is_nullable());
    }
}
