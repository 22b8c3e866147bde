//! Metadata tables (ECMA-335 II.22).
//!
//! - [`TableId`] and [`Column`] describe the complete column schema of tables 0x00 to 0x2C
//! - [`CodedIndexType`] / [`CodedIndex`] handle the tagged multi-table references
//! - [`TableInfo`] derives every column width from row counts and heap sizes, and reads and
//!   writes rows as plain column values
//! - the `*Raw` row types give named access to the tables the pipeline uses
//! - [`TypeAttributes`], [`FieldAttributes`], [`MethodAccessFlags`] and friends hold the flag
//!   constants

mod attributes;
mod codedindex;
mod rows;
mod tableid;
mod tableinfo;

pub use attributes::*;
pub use codedindex::{CodedIndex, CodedIndexType};
pub use rows::*;
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableRowInfo, TABLE_COUNT};
