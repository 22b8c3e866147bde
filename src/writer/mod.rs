//! Emission of new managed modules.
//!
//! The hook generator and the test fixtures describe a module through [`ModuleBuilder`]; the
//! builder owns the heaps ([`heaps`]), encodes the tables stream ([`tables`]) and method bodies
//! ([`body`]) and wraps the result in a PE32 image ([`pe`]).

pub mod body;
pub mod builder;
pub mod heaps;
pub mod pe;
pub mod tables;

pub use body::{IlBuilder, MethodBody};
pub use builder::{GenericOwner, MethodHandle, ModuleBuilder, NewMethod};
