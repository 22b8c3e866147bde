//! Reading and modelling ECMA-335 metadata.
//!
//! The layers build on each other:
//!
//! - [`cor20header`], [`root`] and [`streams`] locate and decode the raw structures;
//! - [`tables`] describes the table schema and typed rows, [`signatures`] the blob encodings;
//! - [`view::MetadataView`] ties them together for one loaded file;
//! - [`image::AssemblyImage`] is the mutable type model the pipeline works on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bephookgen::{metadata::view::MetadataView, File};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("valheim_Data/Managed/assembly_valheim.dll"))?;
//! let view = MetadataView::new(&file)?;
//! if let Some(identity) = view.assembly_identity()? {
//!     println!("{identity}");
//! }
//! # Ok::<(), bephookgen::Error>(())
//! ```

/// The CLI header
pub mod cor20header;
/// Assembly names, versions and strong names
pub mod identity;
/// The mutable type model of a module
pub mod image;
/// The metadata root and its stream directory
pub mod root;
/// Method, field and type signatures
pub mod signatures;
/// Metadata streams and heaps
pub mod streams;
/// Table schema, coded indices and typed rows
pub mod tables;
/// Metadata tokens
pub mod token;
/// Borrowed access to the metadata of a loaded file
pub mod view;
