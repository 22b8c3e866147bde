//! The structured, mutable model of a managed module.
//!
//! [`AssemblyImage`] owns the loaded [`File`] and an arena of [`TypeDefinition`]s,
//! [`MethodDefinition`]s and [`FieldDefinition`]s addressed by position. Nesting is expressed with
//! arena indices in both directions, so a full traversal is a plain worklist over `usize` values.
//!
//! Every definition remembers where its flags live in the file. Serializing the image copies the
//! original bytes and writes the current flags back in place; no other byte changes, which keeps
//! method bodies, resources and signatures of the input intact.

use std::path::{Path, PathBuf};

use crate::{
    file::{output::Output, File},
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, StrongName, ASSEMBLY_FLAGS_PUBLIC_KEY},
        signatures::{SignatureMethod, SignatureParser},
        tables::{
            AssemblyRefRaw, CodedIndex, FieldAttributes, FieldRaw, GenericParamRaw,
            MethodDefRaw, MethodModifiers, ModuleRaw, NestedClassRaw, ParamRaw, TableId,
            TypeAttributes, TypeDefRaw, TypeRefRaw, METHOD_ACCESS_MASK,
        },
        token::Token,
        view::MetadataView,
    },
    resolver::SearchDirectories,
    Result,
};

/// Where a type definition lives: in a namespace, or inside another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeScope {
    /// Top-level type in the given namespace (empty for the global namespace)
    Namespace(String),
    /// Nested type; arena index of the enclosing type
    Nested(usize),
}

/// Visibility class of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeVisibility {
    /// Top-level, public
    Public,
    /// Top-level, internal
    NotPublic,
    /// Nested, public
    NestedPublic,
    /// Nested, any other accessibility
    NestedNonPublic,
}

/// A type definition (`TypeDef` row).
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Row in the `TypeDef` table
    pub rid: u32,
    /// Simple name
    pub name: String,
    /// Namespace or enclosing type
    pub scope: TypeScope,
    /// `TypeAttributes`
    pub flags: u32,
    /// Base type, `None` for interfaces and `System.Object`
    pub extends: Option<Token>,
    /// Arena indices of the directly nested types
    pub nested: Vec<usize>,
    /// Arena indices of the owned methods
    pub methods: Vec<usize>,
    /// Arena indices of the owned fields
    pub fields: Vec<usize>,
    /// Number of generic parameters
    pub generic_param_count: u32,
    /// Whether the type derives from `System.ValueType` or `System.Enum`
    pub is_value_type: bool,
    flags_offset: usize,
}

impl TypeDefinition {
    /// Token of the type in its module.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(TableId::TypeDef, self.rid)
    }

    /// Whether the type is nested inside another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(self.scope, TypeScope::Nested(_))
    }

    /// The namespace of a top-level type, `None` for nested types.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match &self.scope {
            TypeScope::Namespace(namespace) => Some(namespace),
            TypeScope::Nested(_) => None,
        }
    }

    /// Whether the type has generic parameters.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.generic_param_count > 0
    }

    /// Current visibility class.
    #[must_use]
    pub fn visibility(&self) -> TypeVisibility {
        let visibility = self.flags & TypeAttributes::VISIBILITY_MASK;
        match (self.is_nested(), visibility) {
            (false, TypeAttributes::PUBLIC) => TypeVisibility::Public,
            (false, _) => TypeVisibility::NotPublic,
            (true, TypeAttributes::NESTED_PUBLIC) => TypeVisibility::NestedPublic,
            (true, _) => TypeVisibility::NestedNonPublic,
        }
    }

    /// Makes the type visible from any assembly: `Public` for top-level types, `NestedPublic` for
    /// nested ones. Returns whether the flags changed.
    pub fn make_public(&mut self) -> bool {
        let target = if self.is_nested() {
            TypeAttributes::NESTED_PUBLIC
        } else {
            TypeAttributes::PUBLIC
        };

        let flags = (self.flags & !TypeAttributes::VISIBILITY_MASK) | target;
        let changed = flags != self.flags;
        self.flags = flags;
        changed
    }
}

/// A method definition (`MethodDef` row).
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Row in the `MethodDef` table
    pub rid: u32,
    /// Arena index of the declaring type
    pub declaring_type: usize,
    /// Name
    pub name: String,
    /// `MethodAttributes`
    pub flags: u16,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// RVA of the body, 0 if there is none
    pub rva: u32,
    /// Decoded signature, `None` if the blob could not be decoded
    pub signature: Option<SignatureMethod>,
    /// Parameter names by position; `None` where no `Param` row names the parameter
    pub param_names: Vec<Option<String>>,
    /// Number of generic parameters
    pub generic_param_count: u32,
    flags_offset: usize,
}

impl MethodDefinition {
    /// Token of the method in its module.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_parts(TableId::MethodDef, self.rid)
    }

    /// Whether the method is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags & METHOD_ACCESS_MASK == 0x0006
    }

    /// Whether the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        MethodModifiers::from_method_flags(self.flags).contains(MethodModifiers::STATIC)
    }

    /// Whether the method has an IL body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.rva != 0
    }

    /// Whether the method has generic parameters.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.generic_param_count > 0
    }

    /// Makes the method public. Returns whether the flags changed.
    pub fn make_public(&mut self) -> bool {
        let flags = (self.flags & !METHOD_ACCESS_MASK) | 0x0006;
        let changed = flags != self.flags;
        self.flags = flags;
        changed
    }
}

/// A field definition (`Field` row).
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Row in the `Field` table
    pub rid: u32,
    /// Arena index of the declaring type
    pub declaring_type: usize,
    /// Name
    pub name: String,
    /// `FieldAttributes`
    pub flags: u16,
    flags_offset: usize,
}

impl FieldDefinition {
    /// Whether the field is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags & FieldAttributes::FIELD_ACCESS_MASK == FieldAttributes::PUBLIC
    }

    /// Makes the field public. Returns whether the flags changed.
    pub fn make_public(&mut self) -> bool {
        let flags = (self.flags & !FieldAttributes::FIELD_ACCESS_MASK) | FieldAttributes::PUBLIC;
        let changed = flags != self.flags;
        self.flags = flags;
        changed
    }
}

/// Resolution scope of a type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRefScope {
    /// Defined in the current module
    Module,
    /// Defined in another module of the same assembly (`ModuleRef` row)
    ModuleRef(u32),
    /// Defined in a referenced assembly; index into [`AssemblyImage::assembly_refs`]
    AssemblyRef(usize),
    /// Nested in another referenced type; index into [`AssemblyImage::type_refs`]
    Nested(usize),
}

/// A type reference (`TypeRef` row).
#[derive(Debug, Clone)]
pub struct TypeReference {
    /// Row in the `TypeRef` table
    pub rid: u32,
    /// Simple name
    pub name: String,
    /// Namespace, empty for nested references
    pub namespace: String,
    /// Where the type is defined
    pub scope: TypeRefScope,
}

/// An assembly reference (`AssemblyRef` row) with its raw blobs.
#[derive(Debug, Clone)]
pub struct AssemblyReference {
    /// Row in the `AssemblyRef` table
    pub rid: u32,
    /// The referenced identity
    pub identity: AssemblyIdentity,
    /// `AssemblyFlags`
    pub flags: u32,
    /// Hash of the referenced file, usually empty
    pub hash_value: Vec<u8>,
}

/// A loaded managed module with its type model and resolver context.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::{metadata::image::AssemblyImage, resolver::SearchDirectories};
/// use std::path::Path;
///
/// let image = AssemblyImage::from_file(
///     Path::new("valheim_Data/Managed/assembly_valheim.dll"),
///     SearchDirectories::new(vec!["valheim_Data/Managed".into()]),
/// )?;
/// for (index, typedef) in image.types().iter().enumerate() {
///     println!("{} {:?}", image.full_name(index), typedef.visibility());
/// }
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub struct AssemblyImage {
    file: File,
    path: Option<PathBuf>,
    identity: Option<AssemblyIdentity>,
    module_name: String,
    types: Vec<TypeDefinition>,
    methods: Vec<MethodDefinition>,
    fields: Vec<FieldDefinition>,
    type_refs: Vec<TypeReference>,
    assembly_refs: Vec<AssemblyReference>,
    search_directories: SearchDirectories,
}

impl AssemblyImage {
    /// Loads the module at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or its metadata is malformed or unsupported.
    pub fn from_file(path: &Path, search_directories: SearchDirectories) -> Result<Self> {
        let mut image = Self::load(File::from_file(path)?, search_directories)?;
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    /// Loads a module from an owned buffer.
    ///
    /// # Errors
    /// Returns an error if the buffer is not a managed module or its metadata is malformed.
    pub fn from_mem(data: Vec<u8>, search_directories: SearchDirectories) -> Result<Self> {
        Self::load(File::from_mem(data)?, search_directories)
    }

    fn load(file: File, search_directories: SearchDirectories) -> Result<Self> {
        let view = MetadataView::new(&file)?;
        let tables = &view.tables;
        let strings = &view.strings;

        let identity = view.assembly_identity()?;
        let module_name = match tables.rows::<ModuleRaw>().next() {
            Some(module) => strings.get(module?.name as usize)?.to_string(),
            None => return Err(malformed_error!("Module table is empty")),
        };

        let type_rows = tables.rows::<TypeDefRaw>().collect::<Result<Vec<_>>>()?;
        let method_count = tables.row_count(TableId::MethodDef);
        let field_count = tables.row_count(TableId::Field);
        let param_count = tables.row_count(TableId::Param);

        let mut types = Vec::with_capacity(type_rows.len());
        let mut methods = Vec::with_capacity(method_count as usize);
        let mut fields = Vec::with_capacity(field_count as usize);

        for (index, row) in type_rows.iter().enumerate() {
            let next = type_rows.get(index + 1);
            let field_end = next.map_or(field_count + 1, |next| next.field_list);
            let method_end = next.map_or(method_count + 1, |next| next.method_list);

            let field_range = member_range(row.field_list, field_end, field_count)?;
            let method_range = member_range(row.method_list, method_end, method_count)?;

            let mut typedef = TypeDefinition {
                rid: row.rid,
                name: strings.get(row.type_name as usize)?.to_string(),
                scope: TypeScope::Namespace(strings.get(row.type_namespace as usize)?.to_string()),
                flags: row.flags,
                extends: (!row.extends.is_null()).then_some(row.extends.token),
                nested: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                generic_param_count: 0,
                is_value_type: false,
                flags_offset: view.row_file_offset(TableId::TypeDef, row.rid)?,
            };

            for rid in field_range {
                let field = tables.row::<FieldRaw>(rid)?;
                typedef.fields.push(fields.len());
                fields.push(FieldDefinition {
                    rid,
                    declaring_type: index,
                    name: strings.get(field.name as usize)?.to_string(),
                    flags: field.flags,
                    flags_offset: view.row_file_offset(TableId::Field, rid)?,
                });
            }

            for rid in method_range {
                let method = tables.row::<MethodDefRaw>(rid)?;
                let next_param = if rid < method_count {
                    tables.row::<MethodDefRaw>(rid + 1)?.param_list
                } else {
                    param_count + 1
                };

                let signature = SignatureParser::new(view.blob(method.signature)?)
                    .parse_method_signature()
                    .ok();
                let mut param_names =
                    vec![None; signature.as_ref().map_or(0, |sig| sig.params.len())];
                for param_rid in member_range(method.param_list, next_param, param_count)? {
                    let param = tables.row::<ParamRaw>(param_rid)?;
                    let position = param.sequence as usize;
                    if position > 0 && position <= param_names.len() {
                        let name = strings.get(param.name as usize)?;
                        if !name.is_empty() {
                            param_names[position - 1] = Some(name.to_string());
                        }
                    }
                }

                typedef.methods.push(methods.len());
                methods.push(MethodDefinition {
                    rid,
                    declaring_type: index,
                    name: strings.get(method.name as usize)?.to_string(),
                    flags: method.flags,
                    impl_flags: method.impl_flags,
                    rva: method.rva,
                    signature,
                    param_names,
                    generic_param_count: 0,
                    // Flags follow RVA (4) and ImplFlags (2)
                    flags_offset: view.row_file_offset(TableId::MethodDef, rid)? + 6,
                });
            }

            types.push(typedef);
        }

        for row in tables.rows::<NestedClassRaw>() {
            let row = row?;
            let (Some(nested), Some(enclosing)) = (
                (row.nested_class as usize).checked_sub(1),
                (row.enclosing_class as usize).checked_sub(1),
            ) else {
                return Err(malformed_error!("NestedClass row {} is null", row.rid));
            };
            if nested >= types.len() || enclosing >= types.len() || nested == enclosing {
                return Err(malformed_error!(
                    "NestedClass row {} references invalid types",
                    row.rid
                ));
            }
            if types[nested].is_nested() {
                return Err(malformed_error!(
                    "Type {} is nested more than once",
                    types[nested].name
                ));
            }

            types[nested].scope = TypeScope::Nested(enclosing);
            types[enclosing].nested.push(nested);
        }

        for row in tables.rows::<GenericParamRaw>() {
            let row = row?;
            let Some(index) = (row.owner.row as usize).checked_sub(1) else {
                continue;
            };
            match row.owner.tag {
                TableId::TypeDef => {
                    if let Some(typedef) = types.get_mut(index) {
                        typedef.generic_param_count += 1;
                    }
                }
                _ => {
                    if let Some(method) = methods.get_mut(index) {
                        method.generic_param_count += 1;
                    }
                }
            }
        }

        let mut assembly_refs = Vec::new();
        for row in tables.rows::<AssemblyRefRaw>() {
            let row = row?;
            let culture = strings.get(row.culture as usize)?;
            assembly_refs.push(AssemblyReference {
                rid: row.rid,
                identity: AssemblyIdentity {
                    name: strings.get(row.name as usize)?.to_string(),
                    version: AssemblyVersion::new(
                        row.major_version,
                        row.minor_version,
                        row.build_number,
                        row.revision_number,
                    ),
                    culture: (!culture.is_empty()).then(|| culture.to_string()),
                    strong_name: StrongName::from_blob(
                        view.blob(row.public_key_or_token)?,
                        row.flags & ASSEMBLY_FLAGS_PUBLIC_KEY != 0,
                    )?,
                },
                flags: row.flags,
                hash_value: view.blob(row.hash_value)?.to_vec(),
            });
        }

        let mut type_refs = Vec::new();
        for row in tables.rows::<TypeRefRaw>() {
            let row = row?;
            type_refs.push(TypeReference {
                rid: row.rid,
                name: strings.get(row.type_name as usize)?.to_string(),
                namespace: strings.get(row.type_namespace as usize)?.to_string(),
                scope: typeref_scope(&row.resolution_scope, assembly_refs.len())?,
            });
        }

        check_typeref_scopes(&type_refs)?;

        for typedef in &mut types {
            typedef.is_value_type = match typedef.extends {
                Some(base) if base.is_table(TableId::TypeRef) => (base.row() as usize)
                    .checked_sub(1)
                    .and_then(|index| type_refs.get(index))
                    .is_some_and(|base| {
                        base.namespace == "System"
                            && (base.name == "ValueType" || base.name == "Enum")
                    }),
                _ => false,
            };
        }

        let image = AssemblyImage {
            file,
            path: None,
            identity,
            module_name,
            types,
            methods,
            fields,
            type_refs,
            assembly_refs,
            search_directories,
        };
        image.check_nesting()?;

        Ok(image)
    }

    /// Rejects enclosing-type cycles, which would leave types unreachable from the top level.
    fn check_nesting(&self) -> Result<()> {
        let mut reached = 0_usize;
        let mut worklist: Vec<usize> = self.top_level_types().collect();
        while let Some(index) = worklist.pop() {
            reached += 1;
            worklist.extend_from_slice(&self.types[index].nested);
        }

        if reached != self.types.len() {
            return Err(malformed_error!(
                "{} types are not reachable from a top-level type",
                self.types.len() - reached
            ));
        }

        Ok(())
    }

    /// Path the image was loaded from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Identity from the `Assembly` table, `None` for a bare module.
    #[must_use]
    pub fn identity(&self) -> Option<&AssemblyIdentity> {
        self.identity.as_ref()
    }

    /// Name from the `Module` table.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// All type definitions, in `TypeDef` order.
    #[must_use]
    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// Mutable access to a type definition.
    pub fn type_mut(&mut self, index: usize) -> Option<&mut TypeDefinition> {
        self.types.get_mut(index)
    }

    /// All method definitions, in `MethodDef` order.
    #[must_use]
    pub fn methods(&self) -> &[MethodDefinition] {
        &self.methods
    }

    /// Mutable access to a method definition.
    pub fn method_mut(&mut self, index: usize) -> Option<&mut MethodDefinition> {
        self.methods.get_mut(index)
    }

    /// All field definitions, in `Field` order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Mutable access to a field definition.
    pub fn field_mut(&mut self, index: usize) -> Option<&mut FieldDefinition> {
        self.fields.get_mut(index)
    }

    /// All type references, in `TypeRef` order.
    #[must_use]
    pub fn type_refs(&self) -> &[TypeReference] {
        &self.type_refs
    }

    /// All assembly references, in `AssemblyRef` order.
    #[must_use]
    pub fn assembly_refs(&self) -> &[AssemblyReference] {
        &self.assembly_refs
    }

    /// The ordered directories used to resolve [`Self::assembly_refs`].
    #[must_use]
    pub fn search_directories(&self) -> &SearchDirectories {
        &self.search_directories
    }

    /// Arena indices of the top-level types.
    pub fn top_level_types(&self) -> impl Iterator<Item = usize> + '_ {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, typedef)| !typedef.is_nested())
            .map(|(index, _)| index)
    }

    /// Looks up a top-level type by namespace and name.
    #[must_use]
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|typedef| typedef.namespace() == Some(namespace) && typedef.name == name)
    }

    /// Looks up a type nested directly in `enclosing` by name.
    #[must_use]
    pub fn find_nested(&self, enclosing: usize, name: &str) -> Option<usize> {
        self.types.get(enclosing).and_then(|typedef| {
            typedef
                .nested
                .iter()
                .copied()
                .find(|nested| self.types[*nested].name == name)
        })
    }

    /// Full name of a type, `Namespace.Outer/Inner` style.
    #[must_use]
    pub fn full_name(&self, index: usize) -> String {
        let Some(typedef) = self.types.get(index) else {
            return String::new();
        };

        match &typedef.scope {
            TypeScope::Namespace(namespace) if namespace.is_empty() => typedef.name.clone(),
            TypeScope::Namespace(namespace) => format!("{}.{}", namespace, typedef.name),
            TypeScope::Nested(enclosing) => {
                format!("{}/{}", self.full_name(*enclosing), typedef.name)
            }
        }
    }

    /// Resolves every assembly reference through the search directories.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAssembly`] for the first reference that cannot be found.
    pub fn resolve_references(&self) -> Result<Vec<(AssemblyIdentity, PathBuf)>> {
        self.assembly_refs
            .iter()
            .map(|reference| {
                self.search_directories
                    .resolve(&reference.identity)
                    .map(|path| (reference.identity.clone(), path))
            })
            .collect()
    }

    /// The image bytes with the current flags of every definition written in place.
    ///
    /// # Errors
    /// Returns an error if a recorded flags offset lies outside the image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = self.file.data().to_vec();

        for typedef in &self.types {
            patch(&mut data, typedef.flags_offset, &typedef.flags.to_le_bytes())?;
        }
        for method in &self.methods {
            patch(&mut data, method.flags_offset, &method.flags.to_le_bytes())?;
        }
        for field in &self.fields {
            patch(&mut data, field.flags_offset, &field.flags.to_le_bytes())?;
        }

        Ok(data)
    }

    /// Serializes the image to `path`, replacing any existing file only once the write is
    /// complete.
    ///
    /// # Errors
    /// Returns an error if the output cannot be created or written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let data = self.to_bytes()?;

        let mut output = Output::create(path, data.len())?;
        output.write_at(0, &data)?;
        output.finalize()
    }
}

fn member_range(start: u32, end: u32, count: u32) -> Result<std::ops::Range<u32>> {
    // A list start one past the last row denotes an empty list
    if start == 0 || start > count + 1 || end < start || end > count + 1 {
        return Err(malformed_error!(
            "Invalid member list {}..{} (rows: {})",
            start,
            end,
            count
        ));
    }

    Ok(start..end)
}

fn typeref_scope(scope: &CodedIndex, assembly_ref_count: usize) -> Result<TypeRefScope> {
    let index = (scope.row as usize).checked_sub(1);
    match (scope.tag, index) {
        (TableId::Module, _) => Ok(TypeRefScope::Module),
        (TableId::ModuleRef, _) => Ok(TypeRefScope::ModuleRef(scope.row)),
        (TableId::AssemblyRef, Some(index)) if index < assembly_ref_count => {
            Ok(TypeRefScope::AssemblyRef(index))
        }
        (TableId::TypeRef, Some(index)) => Ok(TypeRefScope::Nested(index)),
        _ => Err(malformed_error!(
            "Invalid TypeRef resolution scope {}",
            scope.token
        )),
    }
}

/// Rejects nested type references whose enclosing chain leaves the table or loops.
fn check_typeref_scopes(type_refs: &[TypeReference]) -> Result<()> {
    for (start, typeref) in type_refs.iter().enumerate() {
        let mut scope = &typeref.scope;
        let mut depth = 0_usize;
        while let TypeRefScope::Nested(enclosing) = *scope {
            depth += 1;
            if depth > type_refs.len() {
                return Err(malformed_error!(
                    "TypeRef {} has a cyclic resolution scope",
                    start + 1
                ));
            }
            let Some(enclosing) = type_refs.get(enclosing) else {
                return Err(malformed_error!(
                    "TypeRef {} is nested in missing TypeRef {}",
                    start + 1,
                    enclosing + 1
                ));
            };
            scope = &enclosing.scope;
        }
    }

    Ok(())
}

fn patch(data: &mut [u8], offset: usize, bytes: &[u8]) -> Result<()> {
    match data.get_mut(offset..offset + bytes.len()) {
        Some(target) => {
            target.copy_from_slice(bytes);
            Ok(())
        }
        None => Err(out_of_bounds_error!()),
    }
}
