//! Module for reading and writing Models
pub mod expr_parse;
pub mod json;
pub mod sbml;
