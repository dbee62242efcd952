//! Field table shared by validation, transformation and storage
//!
//! Every numeric field the pipeline knows about appears here exactly once,
//! paired with the warehouse column it lands in. Upstream keys not listed are
//! dropped during validation.

/// Upstream timestamp field (CKAN `DATETIME`)
pub const TIMESTAMP_FIELD: &str = "DATETIME";

/// Warehouse natural key column
pub const KEY_COLUMN: &str = "datetime_utc";

/// Number of numeric fields carried per row
pub const FIELD_COUNT: usize = 29;

/// One upstream numeric field and its warehouse column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub upstream: &'static str,
    pub column: &'static str,
}

const fn field(upstream: &'static str, column: &'static str) -> FieldMapping {
    FieldMapping { upstream, column }
}

/// Upstream → warehouse mapping, in warehouse column order
pub const FIELDS: [FieldMapping; FIELD_COUNT] = [
    // Absolute outputs (MW)
    field("GAS", "gas_mw"),
    field("COAL", "coal_mw"),
    field("NUCLEAR", "nuclear_mw"),
    field("WIND", "wind_mw"),
    field("WIND_EMB", "wind_emb_mw"),
    field("HYDRO", "hydro_mw"),
    field("IMPORTS", "imports_mw"),
    field("BIOMASS", "biomass_mw"),
    field("OTHER", "other_mw"),
    field("SOLAR", "solar_mw"),
    field("STORAGE", "storage_mw"),
    field("GENERATION", "generation_mw"),
    // Rollups as published upstream
    field("CARBON_INTENSITY", "carbon_intensity_gco2_kwh"),
    field("LOW_CARBON", "low_carbon_mw"),
    field("ZERO_CARBON", "zero_carbon_mw"),
    field("RENEWABLE", "renewable_mw"),
    field("FOSSIL", "fossil_mw"),
    // Share of total generation (%)
    field("GAS_perc", "gas_pct"),
    field("COAL_perc", "coal_pct"),
    field("NUCLEAR_perc", "nuclear_pct"),
    field("WIND_perc", "wind_pct"),
    field("WIND_EMB_perc", "wind_emb_pct"),
    field("HYDRO_perc", "hydro_pct"),
    field("IMPORTS_perc", "imports_pct"),
    field("BIOMASS_perc", "biomass_pct"),
    field("OTHER_perc", "other_pct"),
    field("SOLAR_perc", "solar_pct"),
    field("STORAGE_perc", "storage_pct"),
    field("GENERATION_perc", "generation_pct"),
];

/// Position of a warehouse column in [`FIELDS`]
pub fn column_index(column: &str) -> Option<usize> {
    FIELDS.iter().position(|f| f.column == column)
}
