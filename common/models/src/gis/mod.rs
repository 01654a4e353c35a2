pub mod data_type;
