use strum::{EnumCount, EnumIter};

use crate::metadata::tables::CodedIndexType;

/// Identifiers of the ECMA-335 metadata tables (II.22), valued by their table number.
///
/// The discriminant is both the bit in the `valid` mask of the tables header and the high byte of
/// a [`crate::metadata::token::Token`] pointing into the table.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// `Module` - the current module
    Module = 0x00,
    /// `TypeRef` - references to types in other modules or assemblies
    TypeRef = 0x01,
    /// `TypeDef` - type definitions
    TypeDef = 0x02,
    /// `FieldPtr` - field indirection (uncompressed tables only)
    FieldPtr = 0x03,
    /// `Field` - field definitions
    Field = 0x04,
    /// `MethodPtr` - method indirection (uncompressed tables only)
    MethodPtr = 0x05,
    /// `MethodDef` - method definitions
    MethodDef = 0x06,
    /// `ParamPtr` - parameter indirection (uncompressed tables only)
    ParamPtr = 0x07,
    /// `Param` - parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` - implemented interfaces
    InterfaceImpl = 0x09,
    /// `MemberRef` - references to fields and methods
    MemberRef = 0x0A,
    /// `Constant` - compile-time constants
    Constant = 0x0B,
    /// `CustomAttribute` - attribute applications
    CustomAttribute = 0x0C,
    /// `FieldMarshal` - marshalling descriptors
    FieldMarshal = 0x0D,
    /// `DeclSecurity` - declarative security
    DeclSecurity = 0x0E,
    /// `ClassLayout` - explicit type layout
    ClassLayout = 0x0F,
    /// `FieldLayout` - explicit field offsets
    FieldLayout = 0x10,
    /// `StandAloneSig` - standalone signatures
    StandAloneSig = 0x11,
    /// `EventMap` - type to event list mapping
    EventMap = 0x12,
    /// `EventPtr` - event indirection (uncompressed tables only)
    EventPtr = 0x13,
    /// `Event` - event definitions
    Event = 0x14,
    /// `PropertyMap` - type to property list mapping
    PropertyMap = 0x15,
    /// `PropertyPtr` - property indirection (uncompressed tables only)
    PropertyPtr = 0x16,
    /// `Property` - property definitions
    Property = 0x17,
    /// `MethodSemantics` - accessor to event/property association
    MethodSemantics = 0x18,
    /// `MethodImpl` - explicit overrides
    MethodImpl = 0x19,
    /// `ModuleRef` - referenced modules
    ModuleRef = 0x1A,
    /// `TypeSpec` - type specifications
    TypeSpec = 0x1B,
    /// `ImplMap` - P/Invoke mappings
    ImplMap = 0x1C,
    /// `FieldRVA` - initial field data
    FieldRVA = 0x1D,
    /// `EncLog` - edit and continue log
    EncLog = 0x1E,
    /// `EncMap` - edit and continue mapping
    EncMap = 0x1F,
    /// `Assembly` - the current assembly
    Assembly = 0x20,
    /// `AssemblyProcessor` - unused
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` - unused
    AssemblyOS = 0x22,
    /// `AssemblyRef` - referenced assemblies
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` - unused
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` - unused
    AssemblyRefOS = 0x25,
    /// `File` - files of a multi-file assembly
    File = 0x26,
    /// `ExportedType` - forwarded and exported types
    ExportedType = 0x27,
    /// `ManifestResource` - resources
    ManifestResource = 0x28,
    /// `NestedClass` - nested to enclosing type mapping
    NestedClass = 0x29,
    /// `GenericParam` - generic parameters of types and methods
    GenericParam = 0x2A,
    /// `MethodSpec` - generic method instantiations
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` - constraints on generic parameters
    GenericParamConstraint = 0x2C,
}

/// The storage class of a single table column.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Column {
    /// A fixed-size constant of 1, 2 or 4 bytes
    Fixed(u8),
    /// An index into the `#Strings` heap
    Str,
    /// An index into the `#GUID` heap
    Guid,
    /// An index into the `#Blob` heap
    Blob,
    /// A simple index into another table
    Table(TableId),
    /// A coded index into one of several tables
    Coded(CodedIndexType),
}

impl TableId {
    /// Looks up a table by its number.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|id| *id as u8 == value)
    }

    /// The column layout of a row in this table (ECMA-335 II.22).
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        use Column::{Blob, Coded, Fixed, Guid, Str, Table};
        use CodedIndexType as C;

        match self {
            TableId::Module => &[Fixed(2), Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                Fixed(4),
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                Table(TableId::Field),
                Table(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[Fixed(2), Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[Fixed(2), Fixed(2), Str],
            TableId::InterfaceImpl => &[Table(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            TableId::Constant => &[Fixed(1), Fixed(1), Coded(C::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(C::HasCustomAttribute),
                Coded(C::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[Fixed(2), Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[Fixed(2), Fixed(4), Table(TableId::TypeDef)],
            TableId::FieldLayout => &[Fixed(4), Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[Fixed(2), Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[Fixed(2), Str, Blob],
            TableId::MethodSemantics => &[
                Fixed(2),
                Table(TableId::MethodDef),
                Coded(C::HasSemantics),
            ],
            TableId::MethodImpl => &[
                Table(TableId::TypeDef),
                Coded(C::MethodDefOrRef),
                Coded(C::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[
                Fixed(2),
                Coded(C::MemberForwarded),
                Str,
                Table(TableId::ModuleRef),
            ],
            TableId::FieldRVA => &[Fixed(4), Table(TableId::Field)],
            TableId::EncLog => &[Fixed(4), Fixed(4)],
            TableId::EncMap => &[Fixed(4)],
            TableId::Assembly => &[
                Fixed(4),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(4),
                Blob,
                Str,
                Str,
            ],
            TableId::AssemblyProcessor => &[Fixed(4)],
            TableId::AssemblyOS => &[Fixed(4), Fixed(4), Fixed(4)],
            TableId::AssemblyRef => &[
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(4),
                Blob,
                Str,
                Str,
                Blob,
            ],
            TableId::AssemblyRefProcessor => &[Fixed(4), Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[
                Fixed(4),
                Fixed(4),
                Fixed(4),
                Table(TableId::AssemblyRef),
            ],
            TableId::File => &[Fixed(4), Str, Blob],
            TableId::ExportedType => &[Fixed(4), Fixed(4), Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource => &[Fixed(4), Fixed(4), Str, Coded(C::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[Fixed(2), Fixed(2), Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => {
                &[Table(TableId::GenericParam), Coded(C::TypeDefOrRef)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn table_numbers_are_dense() {
        for (expected, id) in TableId::iter().enumerate() {
            assert_eq!(id as usize, expected);
        }
        assert_eq!(TableId::COUNT, 0x2D);
    }

    #[test]
    fn lookup() {
        assert_eq!(TableId::from_u8(0x06), Some(TableId::MethodDef));
        assert_eq!(TableId::from_u8(0x2D), None);
        assert_eq!(TableId::MethodDef.columns().len(), 6);
    }
}
