pub mod calendar;
pub mod parser;
pub mod provider;
