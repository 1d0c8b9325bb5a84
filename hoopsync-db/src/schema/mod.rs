pub mod data_schema;
pub mod info_schema;
