//! Metadata streams (ECMA-335 II.24.2).
//!
//! Borrowing views over the heaps (`#Strings`, `#Blob`, `#GUID`), the compressed tables stream
//! (`#~`) and the stream headers that locate them inside the metadata root.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
