//! Typed views of the table rows the pipeline reads and writes.
//!
//! Each `*Raw` struct mirrors one ECMA-335 table row with heap and table references kept as raw
//! indices. Rows are decoded from and encoded to the generic column values produced by
//! [`crate::metadata::tables::TableInfo`], so the byte layout is defined once in the schema.

use crate::{
    metadata::{
        tables::{CodedIndex, CodedIndexType, TableId},
        token::Token,
    },
    Result,
};

/// A table row that can be converted from and to column values.
pub trait TableRow: Sized {
    /// The table this row belongs to.
    const TABLE: TableId;

    /// Builds the row with 1-based index `rid` from its column values.
    ///
    /// # Errors
    /// Returns an error if a coded index is invalid or a value is out of range for its field.
    fn from_values(rid: u32, values: &[u32]) -> Result<Self>;

    /// The column values of the row, in schema order.
    ///
    /// # Errors
    /// Returns an error if a coded index points into a table its kind cannot address.
    fn values(&self) -> Result<Vec<u32>>;
}

fn value(values: &[u32], index: usize) -> Result<u32> {
    values
        .get(index)
        .copied()
        .ok_or_else(|| malformed_error!("Missing column {}", index))
}

fn value_u16(values: &[u32], index: usize) -> Result<u16> {
    let raw = value(values, index)?;
    u16::try_from(raw).map_err(|_| malformed_error!("Column {} exceeds 16 bits - {}", index, raw))
}

fn coded(values: &[u32], index: usize, kind: CodedIndexType) -> Result<CodedIndex> {
    CodedIndex::decode(value(values, index)?, kind)
}

fn encode(index: &CodedIndex, kind: CodedIndexType) -> Result<u32> {
    kind.encode(index.tag, index.row)
}

/// `Module` (0x00)
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRaw {
    /// Row index
    pub rid: u32,
    /// Reserved, 0
    pub generation: u16,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
    /// `#GUID` index, reserved
    pub encid: u32,
    /// `#GUID` index, reserved
    pub encbaseid: u32,
}

impl TableRow for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            generation: value_u16(values, 0)?,
            name: value(values, 1)?,
            mvid: value(values, 2)?,
            encid: value(values, 3)?,
            encbaseid: value(values, 4)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.generation),
            self.name,
            self.mvid,
            self.encid,
            self.encbaseid,
        ])
    }
}

/// `TypeRef` (0x01)
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRefRaw {
    /// Row index
    pub rid: u32,
    /// `Module`, `ModuleRef`, `AssemblyRef` or enclosing `TypeRef`
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl TableRow for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: coded(values, 0, CodedIndexType::ResolutionScope)?,
            type_name: value(values, 1)?,
            type_namespace: value(values, 2)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            encode(&self.resolution_scope, CodedIndexType::ResolutionScope)?,
            self.type_name,
            self.type_namespace,
        ])
    }
}

/// `TypeDef` (0x02)
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefRaw {
    /// Row index
    pub rid: u32,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type
    pub extends: CodedIndex,
    /// First `Field` row owned by the type
    pub field_list: u32,
    /// First `MethodDef` row owned by the type
    pub method_list: u32,
}

impl TableRow for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            flags: value(values, 0)?,
            type_name: value(values, 1)?,
            type_namespace: value(values, 2)?,
            extends: coded(values, 3, CodedIndexType::TypeDefOrRef)?,
            field_list: value(values, 4)?,
            method_list: value(values, 5)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            self.flags,
            self.type_name,
            self.type_namespace,
            encode(&self.extends, CodedIndexType::TypeDefOrRef)?,
            self.field_list,
            self.method_list,
        ])
    }
}

/// `Field` (0x04)
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRaw {
    /// Row index
    pub rid: u32,
    /// `FieldAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the field signature
    pub signature: u32,
}

impl TableRow for FieldRaw {
    const TABLE: TableId = TableId::Field;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            flags: value_u16(values, 0)?,
            name: value(values, 1)?,
            signature: value(values, 2)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![u32::from(self.flags), self.name, self.signature])
    }
}

/// `MethodDef` (0x06)
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDefRaw {
    /// Row index
    pub rid: u32,
    /// RVA of the method body, 0 if there is none
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the method signature
    pub signature: u32,
    /// First `Param` row owned by the method
    pub param_list: u32,
}

impl TableRow for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            rva: value(values, 0)?,
            impl_flags: value_u16(values, 1)?,
            flags: value_u16(values, 2)?,
            name: value(values, 3)?,
            signature: value(values, 4)?,
            param_list: value(values, 5)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            self.rva,
            u32::from(self.impl_flags),
            u32::from(self.flags),
            self.name,
            self.signature,
            self.param_list,
        ])
    }
}

/// `Param` (0x08)
#[derive(Clone, Debug, PartialEq)]
pub struct ParamRaw {
    /// Row index
    pub rid: u32,
    /// `ParamAttributes`
    pub flags: u16,
    /// 0 for the return value, 1.. for the parameters
    pub sequence: u16,
    /// `#Strings` index of the name
    pub name: u32,
}

impl TableRow for ParamRaw {
    const TABLE: TableId = TableId::Param;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            flags: value_u16(values, 0)?,
            sequence: value_u16(values, 1)?,
            name: value(values, 2)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.flags),
            u32::from(self.sequence),
            self.name,
        ])
    }
}

/// `MemberRef` (0x0A)
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRefRaw {
    /// Row index
    pub rid: u32,
    /// Declaring type or module
    pub class: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the member signature
    pub signature: u32,
}

impl TableRow for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: coded(values, 0, CodedIndexType::MemberRefParent)?,
            name: value(values, 1)?,
            signature: value(values, 2)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            encode(&self.class, CodedIndexType::MemberRefParent)?,
            self.name,
            self.signature,
        ])
    }
}

/// `EventMap` (0x12)
#[derive(Clone, Debug, PartialEq)]
pub struct EventMapRaw {
    /// Row index
    pub rid: u32,
    /// Owning `TypeDef` row
    pub parent: u32,
    /// First `Event` row owned by the type
    pub event_list: u32,
}

impl TableRow for EventMapRaw {
    const TABLE: TableId = TableId::EventMap;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(EventMapRaw {
            rid,
            parent: value(values, 0)?,
            event_list: value(values, 1)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![self.parent, self.event_list])
    }
}

/// `Event` (0x14)
#[derive(Clone, Debug, PartialEq)]
pub struct EventRaw {
    /// Row index
    pub rid: u32,
    /// `EventAttributes`
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// Delegate type of the event
    pub event_type: CodedIndex,
}

impl TableRow for EventRaw {
    const TABLE: TableId = TableId::Event;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(EventRaw {
            rid,
            flags: value_u16(values, 0)?,
            name: value(values, 1)?,
            event_type: coded(values, 2, CodedIndexType::TypeDefOrRef)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.flags),
            self.name,
            encode(&self.event_type, CodedIndexType::TypeDefOrRef)?,
        ])
    }
}

/// `MethodSemantics` (0x18)
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSemanticsRaw {
    /// Row index
    pub rid: u32,
    /// `MethodSemanticsAttributes`
    pub semantics: u16,
    /// Accessor `MethodDef` row
    pub method: u32,
    /// Owning event or property
    pub association: CodedIndex,
}

impl TableRow for MethodSemanticsRaw {
    const TABLE: TableId = TableId::MethodSemantics;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(MethodSemanticsRaw {
            rid,
            semantics: value_u16(values, 0)?,
            method: value(values, 1)?,
            association: coded(values, 2, CodedIndexType::HasSemantics)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.semantics),
            self.method,
            encode(&self.association, CodedIndexType::HasSemantics)?,
        ])
    }
}

/// `Assembly` (0x20)
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRaw {
    /// Row index
    pub rid: u32,
    /// Hash algorithm of the manifest
    pub hash_alg_id: u32,
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key
    pub public_key: u32,
    /// `#Strings` index of the simple name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl TableRow for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            hash_alg_id: value(values, 0)?,
            major_version: value_u16(values, 1)?,
            minor_version: value_u16(values, 2)?,
            build_number: value_u16(values, 3)?,
            revision_number: value_u16(values, 4)?,
            flags: value(values, 5)?,
            public_key: value(values, 6)?,
            name: value(values, 7)?,
            culture: value(values, 8)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            self.hash_alg_id,
            u32::from(self.major_version),
            u32::from(self.minor_version),
            u32::from(self.build_number),
            u32::from(self.revision_number),
            self.flags,
            self.public_key,
            self.name,
            self.culture,
        ])
    }
}

/// `AssemblyRef` (0x23)
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefRaw {
    /// Row index
    pub rid: u32,
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key or its token
    pub public_key_or_token: u32,
    /// `#Strings` index of the simple name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl TableRow for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            major_version: value_u16(values, 0)?,
            minor_version: value_u16(values, 1)?,
            build_number: value_u16(values, 2)?,
            revision_number: value_u16(values, 3)?,
            flags: value(values, 4)?,
            public_key_or_token: value(values, 5)?,
            name: value(values, 6)?,
            culture: value(values, 7)?,
            hash_value: value(values, 8)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.major_version),
            u32::from(self.minor_version),
            u32::from(self.build_number),
            u32::from(self.revision_number),
            self.flags,
            self.public_key_or_token,
            self.name,
            self.culture,
            self.hash_value,
        ])
    }
}

/// `NestedClass` (0x29)
#[derive(Clone, Debug, PartialEq)]
pub struct NestedClassRaw {
    /// Row index
    pub rid: u32,
    /// The nested `TypeDef` row
    pub nested_class: u32,
    /// The enclosing `TypeDef` row
    pub enclosing_class: u32,
}

impl TableRow for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: value(values, 0)?,
            enclosing_class: value(values, 1)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![self.nested_class, self.enclosing_class])
    }
}

/// `GenericParam` (0x2A)
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamRaw {
    /// Row index
    pub rid: u32,
    /// 0-based position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// Owning `TypeDef` or `MethodDef`
    pub owner: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
}

impl TableRow for GenericParamRaw {
    const TABLE: TableId = TableId::GenericParam;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            number: value_u16(values, 0)?,
            flags: value_u16(values, 1)?,
            owner: coded(values, 2, CodedIndexType::TypeOrMethodDef)?,
            name: value(values, 3)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            u32::from(self.number),
            u32::from(self.flags),
            encode(&self.owner, CodedIndexType::TypeOrMethodDef)?,
            self.name,
        ])
    }
}

/// `MethodSpec` (0x2B)
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpecRaw {
    /// Row index
    pub rid: u32,
    /// The generic method being instantiated
    pub method: CodedIndex,
    /// `#Blob` index of the instantiation signature
    pub instantiation: u32,
}

impl TableRow for MethodSpecRaw {
    const TABLE: TableId = TableId::MethodSpec;

    fn from_values(rid: u32, values: &[u32]) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            method: coded(values, 0, CodedIndexType::MethodDefOrRef)?,
            instantiation: value(values, 1)?,
        })
    }

    fn values(&self) -> Result<Vec<u32>> {
        Ok(vec![
            encode(&self.method, CodedIndexType::MethodDefOrRef)?,
            self.instantiation,
        ])
    }
}

impl TypeDefRaw {
    /// Token of this row.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(TableId::TypeDef, self.rid)
    }
}

impl MethodDefRaw {
    /// Token of this row.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(TableId::MethodDef, self.rid)
    }
}
