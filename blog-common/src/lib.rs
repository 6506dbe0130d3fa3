pub mod model;
pub mod pagination;
pub mod similar;
pub mod snowflake;
