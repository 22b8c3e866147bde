//! Fluent construction of complete managed modules.
//!
//! [`ModuleBuilder`] collects definitions and references, hands out tokens as they are added and
//! lays everything out in [`ModuleBuilder::build`]: heaps, the tables stream, method bodies, the
//! metadata root, the CLI header and the PE container.
//!
//! Type definitions get their row as soon as they are added. Fields, methods, parameters and
//! events are grouped under their owning type, so they only receive rows during layout; methods
//! are referred to through [`MethodHandle`]s until then.

use std::{collections::HashMap, path::Path};

use md5::{Digest, Md5};

use crate::{
    file::output::Output,
    metadata::{
        cor20header::{Cor20Header, COR20_HEADER_SIZE},
        identity::{AssemblyIdentity, StrongName},
        root::Root,
        signatures::{
            encode_field_signature, encode_method_signature, encode_method_spec_signature,
            SignatureField, SignatureMethod, TypeSignature,
        },
        streams::StreamHeader,
        tables::{
            AssemblyRaw, AssemblyRefRaw, CodedIndex, CodedIndexType, EventMapRaw, EventRaw,
            FieldRaw, GenericParamRaw, MemberRefRaw, MethodDefRaw, MethodSemanticsAttributes,
            MethodSemanticsRaw, MethodSpecRaw, ModuleRaw, NestedClassRaw, ParamRaw, TableId,
            TypeDefRaw, TypeRefRaw,
        },
        token::Token,
    },
    writer::{
        body::MethodBody,
        heaps::{align4, BlobHeapBuilder, GuidHeapBuilder, StringHeapBuilder, UserStringHeapBuilder},
        pe::{build_image, TEXT_RVA},
        tables::TablesStreamBuilder,
    },
    Error, Result,
};

/// `CALG_SHA1`, the hash algorithm recorded in the `Assembly` row
const ASSEMBLY_HASH_ALGORITHM: u32 = 0x8004;
/// Reserved bytes at the start of `.text` before the CLI header
const TEXT_PREFIX: u32 = 8;
/// Table byte of `#US` tokens
const USER_STRING_TABLE: u32 = 0x70;
/// Heaps reaching this size need 4-byte indices
const LARGE_HEAP: usize = 0x1_0000;

/// A method whose row is assigned when the module is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    type_index: usize,
    index: usize,
}

/// Owner of a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericOwner {
    /// A type definition token
    Type(Token),
    /// A method added to this builder
    Method(MethodHandle),
}

/// A method definition to add to a type.
#[derive(Debug, Clone)]
pub struct NewMethod {
    /// Name
    pub name: String,
    /// `MethodAttributes`
    pub flags: u16,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// Signature
    pub signature: SignatureMethod,
    /// Parameter names, by position
    pub param_names: Vec<String>,
    /// IL body; `None` for abstract and runtime-implemented methods
    pub body: Option<MethodBody>,
}

impl NewMethod {
    /// A method without parameters names and without body.
    #[must_use]
    pub fn new(name: impl Into<String>, flags: u16, signature: SignatureMethod) -> Self {
        NewMethod {
            name: name.into(),
            flags,
            impl_flags: 0,
            signature,
            param_names: Vec::new(),
            body: None,
        }
    }

    /// Sets the `MethodImplAttributes`.
    #[must_use]
    pub fn impl_flags(mut self, impl_flags: u16) -> Self {
        self.impl_flags = impl_flags;
        self
    }

    /// Sets the parameter names.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the IL body.
    #[must_use]
    pub fn body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug)]
struct FieldEntry {
    flags: u16,
    name: u32,
    signature: u32,
}

#[derive(Debug)]
struct MethodEntry {
    flags: u16,
    impl_flags: u16,
    name: u32,
    signature: u32,
    params: Vec<u32>,
    body_offset: Option<u32>,
}

#[derive(Debug)]
struct EventEntry {
    flags: u16,
    name: u32,
    event_type: CodedIndex,
    add: MethodHandle,
    remove: MethodHandle,
}

#[derive(Debug)]
struct TypeEntry {
    flags: u32,
    name: u32,
    namespace: u32,
    extends: CodedIndex,
    fields: Vec<FieldEntry>,
    methods: Vec<MethodEntry>,
    events: Vec<EventEntry>,
}

#[derive(Debug)]
struct GenericParamEntry {
    owner: GenericOwner,
    number: u16,
    name: u32,
}

/// Builds a managed module from scratch.
///
/// # Examples
///
/// ```rust
/// use bephookgen::{
///     metadata::{identity::{AssemblyIdentity, AssemblyVersion}, signatures::*, tables::TypeAttributes},
///     writer::{body::IlBuilder, builder::{ModuleBuilder, NewMethod}},
/// };
///
/// let mut builder = ModuleBuilder::new("demo.dll")
///     .with_assembly(AssemblyIdentity::new("demo", AssemblyVersion::new(1, 0, 0, 0), None));
/// let corlib = builder.add_assembly_ref(&AssemblyIdentity::parse("mscorlib, Version=4.0.0.0")?)?;
/// let object = builder.add_type_ref(corlib, "System", "Object")?;
///
/// let greeter = builder.add_type("Demo", "Greeter", TypeAttributes::PUBLIC, Some(object))?;
/// builder.add_method(
///     greeter,
///     NewMethod::new("Run", 0x0016, SignatureMethod::new(false, TypeSignature::Void, vec![]))
///         .body(IlBuilder::new().ret().finish()),
/// )?;
///
/// let image = builder.build()?;
/// assert_eq!(&image[..2], b"MZ");
/// # Ok::<(), bephookgen::Error>(())
/// ```
#[derive(Debug)]
pub struct ModuleBuilder {
    module_name: String,
    mvid: Option<[u8; 16]>,
    assembly: Option<AssemblyIdentity>,
    strings: StringHeapBuilder,
    blobs: BlobHeapBuilder,
    user_strings: UserStringHeapBuilder,
    assembly_refs: Vec<AssemblyRefRaw>,
    assembly_ref_index: HashMap<AssemblyIdentity, Token>,
    type_refs: Vec<TypeRefRaw>,
    type_ref_index: HashMap<(Token, u32, u32), Token>,
    member_refs: Vec<MemberRefRaw>,
    member_ref_index: HashMap<(Token, u32, u32), Token>,
    method_specs: Vec<MethodSpecRaw>,
    method_spec_index: HashMap<(Token, u32), Token>,
    types: Vec<TypeEntry>,
    nested: Vec<(u32, u32)>,
    generic_params: Vec<GenericParamEntry>,
    bodies: Vec<u8>,
}

impl ModuleBuilder {
    /// Creates a builder for a module called `module_name`.
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        ModuleBuilder {
            module_name: module_name.into(),
            mvid: None,
            assembly: None,
            strings: StringHeapBuilder::default(),
            blobs: BlobHeapBuilder::default(),
            user_strings: UserStringHeapBuilder::default(),
            assembly_refs: Vec::new(),
            assembly_ref_index: HashMap::new(),
            type_refs: Vec::new(),
            type_ref_index: HashMap::new(),
            member_refs: Vec::new(),
            member_ref_index: HashMap::new(),
            method_specs: Vec::new(),
            method_spec_index: HashMap::new(),
            types: Vec::new(),
            nested: Vec::new(),
            generic_params: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Makes the module the manifest module of an assembly.
    #[must_use]
    pub fn with_assembly(mut self, identity: AssemblyIdentity) -> Self {
        self.assembly = Some(identity);
        self
    }

    /// Sets the module version id; derived from the module contents when unset.
    #[must_use]
    pub fn with_mvid(mut self, mvid: [u8; 16]) -> Self {
        self.mvid = Some(mvid);
        self
    }

    /// References an assembly, reusing an identical earlier reference.
    ///
    /// # Errors
    /// Returns an error if a name contains NUL.
    pub fn add_assembly_ref(&mut self, identity: &AssemblyIdentity) -> Result<Token> {
        if let Some(token) = self.assembly_ref_index.get(identity) {
            return Ok(*token);
        }

        let rid = next_rid(self.assembly_refs.len())?;
        let row = AssemblyRefRaw {
            rid,
            major_version: identity.version.major,
            minor_version: identity.version.minor,
            build_number: identity.version.build,
            revision_number: identity.version.revision,
            flags: identity.flags(),
            public_key_or_token: match &identity.strong_name {
                Some(strong_name) => self.blobs.add(strong_name.as_bytes())?,
                None => 0,
            },
            name: self.strings.add(&identity.name)?,
            culture: self.strings.add(identity.culture.as_deref().unwrap_or_default())?,
            hash_value: 0,
        };
        self.assembly_refs.push(row);

        let token = Token::from_parts(TableId::AssemblyRef, rid);
        self.assembly_ref_index.insert(identity.clone(), token);
        Ok(token)
    }

    /// References a type defined in `scope` (an `AssemblyRef`, an enclosing `TypeRef`, a
    /// `ModuleRef` or this module), reusing an identical earlier reference.
    ///
    /// # Errors
    /// Returns an error if `scope` is not a resolution scope or a name contains NUL.
    pub fn add_type_ref(&mut self, scope: Token, namespace: &str, name: &str) -> Result<Token> {
        let scope_index = CodedIndex::from_token(scope)?;
        CodedIndexType::ResolutionScope.encode(scope_index.tag, scope_index.row)?;

        let type_name = self.strings.add(name)?;
        let type_namespace = self.strings.add(namespace)?;
        let key = (scope, type_namespace, type_name);
        if let Some(token) = self.type_ref_index.get(&key) {
            return Ok(*token);
        }

        let rid = next_rid(self.type_refs.len())?;
        self.type_refs.push(TypeRefRaw {
            rid,
            resolution_scope: scope_index,
            type_name,
            type_namespace,
        });

        let token = Token::from_parts(TableId::TypeRef, rid);
        self.type_ref_index.insert(key, token);
        Ok(token)
    }

    /// Defines a top-level type.
    ///
    /// # Errors
    /// Returns an error if `extends` is not a `TypeDefOrRef` token or a name contains NUL.
    pub fn add_type(
        &mut self,
        namespace: &str,
        name: &str,
        flags: u32,
        extends: Option<Token>,
    ) -> Result<Token> {
        let extends = match extends {
            Some(token) => {
                let index = CodedIndex::from_token(token)?;
                CodedIndexType::TypeDefOrRef.encode(index.tag, index.row)?;
                index
            }
            None => CodedIndex::new(TableId::TypeDef, 0),
        };

        let rid = next_rid(self.types.len())?;
        self.types.push(TypeEntry {
            flags,
            name: self.strings.add(name)?,
            namespace: self.strings.add(namespace)?,
            extends,
            fields: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
        });

        Ok(Token::from_parts(TableId::TypeDef, rid))
    }

    /// Defines a type nested in `enclosing`.
    ///
    /// # Errors
    /// Returns an error if `enclosing` is not a type of this builder.
    pub fn add_nested_type(
        &mut self,
        enclosing: Token,
        name: &str,
        flags: u32,
        extends: Option<Token>,
    ) -> Result<Token> {
        self.type_index(enclosing)?;

        let token = self.add_type("", name, flags, extends)?;
        self.nested.push((token.row(), enclosing.row()));
        Ok(token)
    }

    /// Adds a field to `owner`.
    ///
    /// # Errors
    /// Returns an error if `owner` is not a type of this builder or the signature cannot be
    /// encoded.
    pub fn add_field(
        &mut self,
        owner: Token,
        name: &str,
        flags: u16,
        signature: &SignatureField,
    ) -> Result<()> {
        let type_index = self.type_index(owner)?;
        let entry = FieldEntry {
            flags,
            name: self.strings.add(name)?,
            signature: self.blobs.add(&encode_field_signature(signature)?)?,
        };

        self.types[type_index].fields.push(entry);
        Ok(())
    }

    /// Adds a method to `owner`.
    ///
    /// # Errors
    /// Returns an error if `owner` is not a type of this builder, the parameter names do not
    /// match the signature, or the signature or body cannot be encoded.
    pub fn add_method(&mut self, owner: Token, method: NewMethod) -> Result<MethodHandle> {
        let type_index = self.type_index(owner)?;
        if method.param_names.len() > method.signature.params.len() {
            return Err(malformed_error!(
                "Method {} names {} parameters but has {}",
                method.name,
                method.param_names.len(),
                method.signature.params.len()
            ));
        }

        let params = method
            .param_names
            .iter()
            .map(|name| self.strings.add(name))
            .collect::<Result<Vec<_>>>()?;

        let body_offset = match &method.body {
            Some(body) => {
                align4(&mut self.bodies);
                let offset = u32::try_from(self.bodies.len()).map_err(|_| Error::WriteFailed {
                    message: "Method bodies exceed 4 GiB".to_string(),
                })?;
                self.bodies.extend_from_slice(&body.encode()?);
                Some(offset)
            }
            None => None,
        };

        let entry = MethodEntry {
            flags: method.flags,
            impl_flags: method.impl_flags,
            name: self.strings.add(&method.name)?,
            signature: self.blobs.add(&encode_method_signature(&method.signature)?)?,
            params,
            body_offset,
        };

        let methods = &mut self.types[type_index].methods;
        methods.push(entry);
        Ok(MethodHandle {
            type_index,
            index: methods.len() - 1,
        })
    }

    /// Adds an event to `owner` with its `add` and `remove` accessors.
    ///
    /// # Errors
    /// Returns an error if `owner` is not a type of this builder, an accessor handle is unknown
    /// or `event_type` is not a `TypeDefOrRef` token.
    pub fn add_event(
        &mut self,
        owner: Token,
        name: &str,
        event_type: Token,
        add: MethodHandle,
        remove: MethodHandle,
    ) -> Result<()> {
        let type_index = self.type_index(owner)?;
        for handle in [add, remove] {
            self.check_method(handle)?;
        }

        let event_type = CodedIndex::from_token(event_type)?;
        CodedIndexType::TypeDefOrRef.encode(event_type.tag, event_type.row)?;

        let entry = EventEntry {
            flags: 0,
            name: self.strings.add(name)?,
            event_type,
            add,
            remove,
        };
        self.types[type_index].events.push(entry);
        Ok(())
    }

    /// Declares the next generic parameter of `owner`.
    ///
    /// # Errors
    /// Returns an error if the owner is unknown or the name contains NUL.
    pub fn add_generic_param(&mut self, owner: GenericOwner, name: &str) -> Result<()> {
        match owner {
            GenericOwner::Type(token) => {
                self.type_index(token)?;
            }
            GenericOwner::Method(handle) => self.check_method(handle)?,
        }

        let count = self
            .generic_params
            .iter()
            .filter(|param| param.owner == owner)
            .count();
        let entry = GenericParamEntry {
            owner,
            number: u16::try_from(count)
                .map_err(|_| malformed_error!("Too many generic parameters"))?,
            name: self.strings.add(name)?,
        };
        self.generic_params.push(entry);
        Ok(())
    }

    /// References a member of `parent` by name and raw signature, reusing an identical earlier
    /// reference.
    ///
    /// # Errors
    /// Returns an error if `parent` is not a `MemberRefParent` token.
    pub fn add_member_ref(&mut self, parent: Token, name: &str, signature: &[u8]) -> Result<Token> {
        let class = CodedIndex::from_token(parent)?;
        CodedIndexType::MemberRefParent.encode(class.tag, class.row)?;

        let name = self.strings.add(name)?;
        let signature = self.blobs.add(signature)?;
        let key = (parent, name, signature);
        if let Some(token) = self.member_ref_index.get(&key) {
            return Ok(*token);
        }

        let rid = next_rid(self.member_refs.len())?;
        self.member_refs.push(MemberRefRaw {
            rid,
            class,
            name,
            signature,
        });

        let token = Token::from_parts(TableId::MemberRef, rid);
        self.member_ref_index.insert(key, token);
        Ok(token)
    }

    /// References a method of `parent`.
    ///
    /// # Errors
    /// Returns an error if `parent` is not a `MemberRefParent` token or the signature cannot be
    /// encoded.
    pub fn add_method_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: &SignatureMethod,
    ) -> Result<Token> {
        let blob = encode_method_signature(signature)?;
        self.add_member_ref(parent, name, &blob)
    }

    /// Instantiates the generic method `method` with `args`.
    ///
    /// # Errors
    /// Returns an error if `method` is not a `MethodDefOrRef` token or an argument cannot be
    /// encoded.
    pub fn add_method_spec(&mut self, method: Token, args: &[TypeSignature]) -> Result<Token> {
        let method_index = CodedIndex::from_token(method)?;
        CodedIndexType::MethodDefOrRef.encode(method_index.tag, method_index.row)?;

        let instantiation = self.blobs.add(&encode_method_spec_signature(args)?)?;
        let key = (method, instantiation);
        if let Some(token) = self.method_spec_index.get(&key) {
            return Ok(*token);
        }

        let rid = next_rid(self.method_specs.len())?;
        self.method_specs.push(MethodSpecRaw {
            rid,
            method: method_index,
            instantiation,
        });

        let token = Token::from_parts(TableId::MethodSpec, rid);
        self.method_spec_index.insert(key, token);
        Ok(token)
    }

    /// Adds a string literal for `ldstr`.
    ///
    /// # Errors
    /// Returns an error if the string is too large.
    pub fn add_user_string(&mut self, value: &str) -> Result<Token> {
        let index = self.user_strings.add(value)?;
        Ok(Token::new((USER_STRING_TABLE << 24) | index))
    }

    fn type_index(&self, token: Token) -> Result<usize> {
        let index = (token.row() as usize).checked_sub(1);
        match index {
            Some(index) if token.is_table(TableId::TypeDef) && index < self.types.len() => {
                Ok(index)
            }
            _ => Err(malformed_error!("{} is not a type of this module", token)),
        }
    }

    fn check_method(&self, handle: MethodHandle) -> Result<()> {
        match self.types.get(handle.type_index) {
            Some(typedef) if handle.index < typedef.methods.len() => Ok(()),
            _ => Err(malformed_error!("Unknown method handle {:?}", handle)),
        }
    }

    /// Lays out the module and returns the image bytes.
    ///
    /// # Errors
    /// Returns an error if a row or heap exceeds its encoding limits.
    pub fn build(mut self) -> Result<Vec<u8>> {
        let module_name = self.strings.add(&self.module_name)?;
        let assembly_row = match self.assembly.take() {
            Some(identity) => Some(AssemblyRaw {
                rid: 1,
                hash_alg_id: ASSEMBLY_HASH_ALGORITHM,
                major_version: identity.version.major,
                minor_version: identity.version.minor,
                build_number: identity.version.build,
                revision_number: identity.version.revision,
                flags: identity.flags(),
                public_key: match &identity.strong_name {
                    Some(StrongName::PublicKey(key)) => self.blobs.add(key)?,
                    Some(StrongName::Token(_)) => {
                        return Err(malformed_error!(
                            "Assembly {} needs its full public key",
                            identity.name
                        ))
                    }
                    None => 0,
                },
                name: self.strings.add(&identity.name)?,
                culture: self.strings.add(identity.culture.as_deref().unwrap_or_default())?,
            }),
            None => None,
        };

        let cli_header_rva = TEXT_RVA + TEXT_PREFIX;
        let bodies_rva = cli_header_rva + COR20_HEADER_SIZE;

        let mut tables = TablesStreamBuilder::default();
        tables.push(&ModuleRaw {
            rid: 1,
            generation: 0,
            name: module_name,
            mvid: 1,
            encid: 0,
            encbaseid: 0,
        })?;

        for row in &self.type_refs {
            tables.push(row)?;
        }

        let mut method_rids: Vec<Vec<u32>> = Vec::with_capacity(self.types.len());
        let (mut field_rid, mut method_rid, mut param_rid) = (1_u32, 1_u32, 1_u32);
        for (index, typedef) in self.types.iter().enumerate() {
            tables.push(&TypeDefRaw {
                rid: next_rid(index)?,
                flags: typedef.flags,
                type_name: typedef.name,
                type_namespace: typedef.namespace,
                extends: typedef.extends,
                field_list: field_rid,
                method_list: method_rid,
            })?;

            for field in &typedef.fields {
                tables.push(&FieldRaw {
                    rid: field_rid,
                    flags: field.flags,
                    name: field.name,
                    signature: field.signature,
                })?;
                field_rid += 1;
            }

            let mut rids = Vec::with_capacity(typedef.methods.len());
            for method in &typedef.methods {
                tables.push(&MethodDefRaw {
                    rid: method_rid,
                    rva: method.body_offset.map_or(0, |offset| bodies_rva + offset),
                    impl_flags: method.impl_flags,
                    flags: method.flags,
                    name: method.name,
                    signature: method.signature,
                    param_list: param_rid,
                })?;

                for (position, name) in method.params.iter().enumerate() {
                    tables.push(&ParamRaw {
                        rid: param_rid,
                        flags: 0,
                        sequence: u16::try_from(position + 1)
                            .map_err(|_| malformed_error!("Too many parameters"))?,
                        name: *name,
                    })?;
                    param_rid += 1;
                }

                rids.push(method_rid);
                method_rid += 1;
            }
            method_rids.push(rids);
        }

        for row in &self.member_refs {
            tables.push(row)?;
        }

        let (mut map_rid, mut event_rid, mut semantics_rid) = (1_u32, 1_u32, 1_u32);
        for (index, typedef) in self.types.iter().enumerate() {
            if typedef.events.is_empty() {
                continue;
            }

            tables.push(&EventMapRaw {
                rid: map_rid,
                parent: next_rid(index)?,
                event_list: event_rid,
            })?;
            map_rid += 1;

            for event in &typedef.events {
                tables.push(&EventRaw {
                    rid: event_rid,
                    flags: event.flags,
                    name: event.name,
                    event_type: event.event_type,
                })?;

                // Rows are keyed by the event, which grows monotonically here
                for (semantics, handle) in [
                    (MethodSemanticsAttributes::ADD_ON, event.add),
                    (MethodSemanticsAttributes::REMOVE_ON, event.remove),
                ] {
                    tables.push(&MethodSemanticsRaw {
                        rid: semantics_rid,
                        semantics,
                        method: method_rids[handle.type_index][handle.index],
                        association: CodedIndex::new(TableId::Event, event_rid),
                    })?;
                    semantics_rid += 1;
                }
                event_rid += 1;
            }
        }

        if let Some(row) = &assembly_row {
            tables.push(row)?;
        }
        for row in &self.assembly_refs {
            tables.push(row)?;
        }

        self.nested.sort_unstable();
        for (index, (nested_class, enclosing_class)) in self.nested.iter().enumerate() {
            tables.push(&NestedClassRaw {
                rid: next_rid(index)?,
                nested_class: *nested_class,
                enclosing_class: *enclosing_class,
            })?;
        }

        let mut generic_params: Vec<(CodedIndex, u16, u32)> = self
            .generic_params
            .iter()
            .map(|param| {
                let owner = match param.owner {
                    GenericOwner::Type(token) => CodedIndex::new(TableId::TypeDef, token.row()),
                    GenericOwner::Method(handle) => CodedIndex::new(
                        TableId::MethodDef,
                        method_rids[handle.type_index][handle.index],
                    ),
                };
                (owner, param.number, param.name)
            })
            .collect();
        generic_params.sort_by_key(|(owner, number, _)| {
            // TypeOrMethodDef order: row first, TypeDef before MethodDef
            (owner.row, owner.tag != TableId::TypeDef, *number)
        });
        for (index, (owner, number, name)) in generic_params.into_iter().enumerate() {
            tables.push(&GenericParamRaw {
                rid: next_rid(index)?,
                number,
                flags: 0,
                owner,
                name,
            })?;
        }

        for row in &self.method_specs {
            tables.push(row)?;
        }

        let mut heap_size_flags = 0_u8;
        if self.strings.len() >= LARGE_HEAP {
            heap_size_flags |= 0x01;
        }
        if self.blobs.len() >= LARGE_HEAP {
            heap_size_flags |= 0x04;
        }

        let tables_data = tables.encode(heap_size_flags)?;
        let strings_data = self.strings.finish();
        let blobs_data = self.blobs.finish();
        let user_strings_data = self.user_strings.finish();

        let mvid = match self.mvid {
            Some(mvid) => mvid,
            None => {
                let mut hasher = Md5::new();
                hasher.update(&tables_data);
                hasher.update(&strings_data);
                hasher.update(&blobs_data);
                hasher.update(&self.bodies);
                hasher.finalize().into()
            }
        };
        let mut guids = GuidHeapBuilder::default();
        guids.add(mvid)?;
        let guids_data = guids.finish();

        let streams: [(&str, &[u8]); 5] = [
            ("#~", tables_data.as_slice()),
            ("#Strings", strings_data.as_slice()),
            ("#US", user_strings_data.as_slice()),
            ("#GUID", guids_data.as_slice()),
            ("#Blob", blobs_data.as_slice()),
        ];

        let mut root = Root::new(
            streams
                .iter()
                .map(|(name, _)| StreamHeader::new(name, 0, 0))
                .collect(),
        );
        let mut stream_offset = root.size();
        for (header, (_, data)) in root.stream_headers.iter_mut().zip(streams.iter()) {
            header.offset = to_u32(stream_offset)?;
            header.size = to_u32(data.len())?;
            stream_offset += data.len();
        }

        let mut metadata = Vec::with_capacity(stream_offset);
        root.write(&mut metadata);
        for (_, data) in &streams {
            metadata.extend_from_slice(data);
        }

        let mut text = vec![0_u8; TEXT_PREFIX as usize + COR20_HEADER_SIZE as usize];
        text.extend_from_slice(&self.bodies);
        align4(&mut text);
        let metadata_rva = TEXT_RVA + to_u32(text.len())?;
        text.extend_from_slice(&metadata);

        let cli_header = Cor20Header::il_only(metadata_rva, to_u32(metadata.len())?).write()?;
        text[TEXT_PREFIX as usize..TEXT_PREFIX as usize + cli_header.len()]
            .copy_from_slice(&cli_header);

        build_image(&text, cli_header_rva, COR20_HEADER_SIZE)
    }

    /// Lays out the module and writes it to `path`, replacing an existing file only once the
    /// write is complete.
    ///
    /// # Errors
    /// Returns an error if layout fails or the file cannot be written.
    pub fn write_to(self, path: &Path) -> Result<()> {
        let image = self.build()?;

        let mut output = Output::create(path, image.len())?;
        output.write_at(0, &image)?;
        output.finalize()
    }
}

fn next_rid(len: usize) -> Result<u32> {
    u32::try_from(len + 1)
        .ok()
        .filter(|rid| *rid <= 0x00FF_FFFF)
        .ok_or_else(|| Error::WriteFailed {
            message: "Table exceeds 2^24 rows".to_string(),
        })
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::WriteFailed {
        message: format!("Size {value} exceeds 32 bits"),
    })
}
