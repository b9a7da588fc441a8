//! Processor descriptors — the immutable configuration of one ingestion
//! endpoint, built once at application startup.

use tidemark_core::calendar::Unit;
use tidemark_core::errors::SchemaError;
use tidemark_core::schema::{LogicalType, Schema, Value};

/// Metadata column holding the serialized coverage map.
pub const DOMAIN_COLUMN: &str = "domain";
/// Metadata column counting rows ingested for the parameter tuple.
pub const COLLECTED_ITEMS_COLUMN: &str = "collected_items";

/// Immutable configuration of one ingestion endpoint.
///
/// `name` doubles as the data table identifier; the metadata table is
/// `{name}_metadata`. The effective row schema is the parameter columns
/// followed by the data columns; the metadata schema is the parameter
/// columns followed by `domain` and `collected_items`, keyed by the full
/// parameter tuple.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    name: String,
    unit: Unit,
    time_column: String,
    param_schema: Schema,
    data_schema: Schema,
    table_schema: Schema,
    meta_schema: Schema,
}

impl ProcessorDescriptor {
    pub fn new(
        name: impl Into<String>,
        unit: Unit,
        time_column: impl Into<String>,
        param_schema: Schema,
        data_schema: Schema,
    ) -> Result<Self, SchemaError> {
        let time_column = time_column.into();
        param_schema.ensure_well_formed()?;
        data_schema.ensure_well_formed()?;

        let table_schema = param_schema.concat(&data_schema)?;
        if data_schema.get(&time_column) != Some(LogicalType::Timestamp) {
            return Err(SchemaError::TimeColumn {
                column: time_column,
            });
        }

        let meta_columns = Schema::new([
            (DOMAIN_COLUMN, LogicalType::Text),
            (COLLECTED_ITEMS_COLUMN, LogicalType::Integer),
        ]);
        let meta_schema = param_schema.concat(&meta_columns)?;

        Ok(Self {
            name: name.into(),
            unit,
            time_column,
            param_schema,
            data_schema,
            table_schema,
            meta_schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn param_schema(&self) -> &Schema {
        &self.param_schema
    }

    pub fn data_schema(&self) -> &Schema {
        &self.data_schema
    }

    /// Parameter columns followed by data columns.
    pub fn table_schema(&self) -> &Schema {
        &self.table_schema
    }

    /// Parameter columns followed by `domain` and `collected_items`.
    pub fn meta_schema(&self) -> &Schema {
        &self.meta_schema
    }

    pub fn meta_table_name(&self) -> String {
        format!("{}_metadata", self.name)
    }

    /// Primary key of the data table: the data schema's uniqueness key,
    /// when declared.
    pub fn table_primary_key(&self) -> Option<&[String]> {
        self.data_schema.unique_constraint()
    }

    /// Primary key of the metadata table: the full parameter tuple.
    pub fn meta_primary_key(&self) -> Vec<String> {
        self.param_schema
            .column_names()
            .map(str::to_string)
            .collect()
    }

    /// Check a caller-supplied parameter tuple against the parameter schema
    /// and return it in schema order.
    pub fn normalize_params(
        &self,
        params: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, SchemaError> {
        if params.len() != self.param_schema.len() {
            return Err(SchemaError::ColumnSet {
                expected: self.meta_primary_key(),
                found: params.iter().map(|(name, _)| name.clone()).collect(),
            });
        }
        let mut ordered = Vec::with_capacity(params.len());
        for column in self.param_schema.columns() {
            let Some((_, value)) = params.iter().find(|(name, _)| *name == column.name) else {
                return Err(SchemaError::MissingColumn {
                    column: column.name.clone(),
                });
            };
            if !value.conforms_to(column.ty) {
                return Err(SchemaError::Mismatch {
                    column: column.name.clone(),
                    row: 0,
                    expected: column.ty.to_string(),
                    found: value.type_name().to_string(),
                });
            }
            ordered.push((column.name.clone(), value.clone()));
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "eod",
            Unit::Days,
            "date",
            Schema::new([("ticker", LogicalType::Text)]),
            Schema::new([
                ("id", LogicalType::Text),
                ("date", LogicalType::Timestamp),
                ("close", LogicalType::Real),
            ])
            .with_unique_constraint(["id"]),
        )
        .unwrap()
    }

    #[test]
    fn composite_schemas_put_parameters_first() {
        let descriptor = descriptor();
        let table: Vec<&str> = descriptor.table_schema().column_names().collect();
        assert_eq!(table, ["ticker", "id", "date", "close"]);
        let meta: Vec<&str> = descriptor.meta_schema().column_names().collect();
        assert_eq!(meta, ["ticker", "domain", "collected_items"]);
        assert_eq!(descriptor.meta_table_name(), "eod_metadata");
        assert_eq!(descriptor.meta_primary_key(), ["ticker"]);
    }

    #[test]
    fn overlapping_columns_are_a_configuration_error() {
        let result = ProcessorDescriptor::new(
            "eod",
            Unit::Days,
            "date",
            Schema::new([("date", LogicalType::Text)]),
            Schema::new([("date", LogicalType::Timestamp)]),
        );
        assert!(matches!(result, Err(SchemaError::Conflict { .. })));
    }

    #[test]
    fn parameters_must_not_shadow_metadata_columns() {
        let result = ProcessorDescriptor::new(
            "eod",
            Unit::Days,
            "date",
            Schema::new([("domain", LogicalType::Text)]),
            Schema::new([("date", LogicalType::Timestamp)]),
        );
        assert!(matches!(result, Err(SchemaError::Conflict { .. })));
    }

    #[test]
    fn time_column_must_be_a_timestamp() {
        let result = ProcessorDescriptor::new(
            "eod",
            Unit::Days,
            "close",
            Schema::new([("ticker", LogicalType::Text)]),
            Schema::new([
                ("date", LogicalType::Timestamp),
                ("close", LogicalType::Real),
            ]),
        );
        assert!(matches!(result, Err(SchemaError::TimeColumn { .. })));
    }

    #[test]
    fn normalize_params_orders_and_checks_types() {
        let descriptor = descriptor();
        let ordered = descriptor
            .normalize_params(&[("ticker".to_string(), "SPY".into())])
            .unwrap();
        assert_eq!(ordered[0].0, "ticker");

        assert!(descriptor.normalize_params(&[]).is_err());
        assert!(descriptor
            .normalize_params(&[("ticker".to_string(), 1i64.into())])
            .is_err());
        assert!(descriptor
            .normalize_params(&[("symbol".to_string(), "SPY".into())])
            .is_err());
    }
}
