//! Emission of the `On.*` and `IL.*` hook types.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    hookgen::{
        importer::Importer,
        naming::hook_names,
        runtime::{HookRuntime, CIL_NAMESPACE, HOOKGEN_NAMESPACE},
        HookStats,
    },
    metadata::{
        identity::AssemblyIdentity,
        image::{AssemblyImage, MethodDefinition, TypeScope},
        signatures::{SignatureMethod, TypeSignature},
        tables::{
            MethodAccessFlags, MethodImplAttributes, MethodModifiers, TypeAttributes,
        },
        token::Token,
    },
    writer::{IlBuilder, MethodHandle, ModuleBuilder, NewMethod},
    Result,
};

const DELEGATE_FLAGS: u32 = TypeAttributes::NESTED_PUBLIC | TypeAttributes::SEALED;
const CTOR_FLAGS: u16 = MethodAccessFlags::PUBLIC.bits()
    | MethodModifiers::HIDE_BY_SIG.bits()
    | MethodModifiers::SPECIAL_NAME.bits()
    | MethodModifiers::RT_SPECIAL_NAME.bits();
const INVOKE_FLAGS: u16 = MethodAccessFlags::PUBLIC.bits()
    | MethodModifiers::HIDE_BY_SIG.bits()
    | MethodModifiers::NEW_SLOT.bits()
    | MethodModifiers::VIRTUAL.bits();
const ACCESSOR_FLAGS: u16 = MethodAccessFlags::PUBLIC.bits()
    | MethodModifiers::STATIC.bits()
    | MethodModifiers::HIDE_BY_SIG.bits()
    | MethodModifiers::SPECIAL_NAME.bits();

/// The two families of hook types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// `On.*`: detours through `hook_*` delegates
    On,
    /// `IL.*`: IL manipulators
    Il,
}

impl HookKind {
    fn namespace(self, namespace: &str) -> String {
        let root = match self {
            HookKind::On => "On",
            HookKind::Il => "IL",
        };

        if namespace.is_empty() {
            root.to_string()
        } else {
            format!("{root}.{namespace}")
        }
    }
}

/// Why a method gets no hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Abstract, extern or runtime-implemented
    NoBody,
    /// The method has generic parameters
    Generic,
    /// Type initializers cannot be detoured
    StaticConstructor,
    /// The signature blob could not be decoded
    UnreadableSignature,
    /// A type in the signature cannot be referenced from the hook module
    Unimportable(String),
}

/// Why `method` cannot be hooked, if it cannot.
#[must_use]
pub fn skip_reason(method: &MethodDefinition) -> Option<SkipReason> {
    if method.name == ".cctor" {
        Some(SkipReason::StaticConstructor)
    } else if !method.has_body() {
        Some(SkipReason::NoBody)
    } else if method.is_generic() {
        Some(SkipReason::Generic)
    } else {
        match &method.signature {
            None => Some(SkipReason::UnreadableSignature),
            Some(signature) if signature.generic_param_count > 0 => Some(SkipReason::Generic),
            Some(_) => None,
        }
    }
}

/// Whether methods of the type at `index` can be hooked: neither it nor an enclosing type is
/// generic or compiler generated.
#[must_use]
pub fn is_hookable_type(image: &AssemblyImage, index: usize) -> bool {
    let mut current = Some(index);
    while let Some(index) = current {
        let Some(typedef) = image.types().get(index) else {
            return false;
        };
        if typedef.is_generic() || typedef.name.starts_with('<') {
            return false;
        }

        current = match typedef.scope {
            TypeScope::Nested(enclosing) => Some(enclosing),
            TypeScope::Namespace(_) => None,
        };
    }

    true
}

/// References into the core library and MonoMod used by generated code.
struct RuntimeRefs {
    object: Token,
    multicast_delegate: Token,
    async_callback: Token,
    async_result: Token,
    get_method_from_handle: Token,
    manipulator: Token,
    add: Token,
    remove: Token,
    modify: Token,
    unmodify: Token,
}

impl RuntimeRefs {
    fn new(
        builder: &mut ModuleBuilder,
        corlib: &AssemblyIdentity,
        runtime: &HookRuntime,
    ) -> Result<Self> {
        let corlib = builder.add_assembly_ref(corlib)?;
        let object = builder.add_type_ref(corlib, "System", "Object")?;
        let multicast_delegate = builder.add_type_ref(corlib, "System", "MulticastDelegate")?;
        let delegate = builder.add_type_ref(corlib, "System", "Delegate")?;
        let async_callback = builder.add_type_ref(corlib, "System", "AsyncCallback")?;
        let async_result = builder.add_type_ref(corlib, "System", "IAsyncResult")?;
        let method_base = builder.add_type_ref(corlib, "System.Reflection", "MethodBase")?;
        let method_handle = builder.add_type_ref(corlib, "System", "RuntimeMethodHandle")?;

        let get_method_from_handle = builder.add_method_ref(
            method_base,
            "GetMethodFromHandle",
            &SignatureMethod::new(
                false,
                TypeSignature::Class(method_base),
                vec![TypeSignature::ValueType(method_handle)],
            ),
        )?;

        let detour = builder.add_assembly_ref(&runtime.runtime_detour)?;
        let manager = builder.add_type_ref(detour, HOOKGEN_NAMESPACE, "HookEndpointManager")?;
        let mut endpoint = SignatureMethod::new(
            false,
            TypeSignature::Void,
            vec![
                TypeSignature::Class(method_base),
                TypeSignature::Class(delegate),
            ],
        );
        endpoint.generic_param_count = 1;

        let utils = builder.add_assembly_ref(&runtime.utils)?;
        let context = builder.add_type_ref(utils, CIL_NAMESPACE, "ILContext")?;
        let manipulator = builder.add_type_ref(context, "", "Manipulator")?;

        Ok(RuntimeRefs {
            object,
            multicast_delegate,
            async_callback,
            async_result,
            get_method_from_handle,
            manipulator,
            add: builder.add_method_ref(manager, "Add", &endpoint)?,
            remove: builder.add_method_ref(manager, "Remove", &endpoint)?,
            modify: builder.add_method_ref(manager, "Modify", &endpoint)?,
            unmodify: builder.add_method_ref(manager, "Unmodify", &endpoint)?,
        })
    }
}

/// A method accepted for hooking, with its signature imported into the hook module.
struct Hookable {
    method: usize,
    signature: SignatureMethod,
}

/// Builds the hook types of one input image into a [`ModuleBuilder`].
pub(crate) struct HookEmitter<'a> {
    image: &'a AssemblyImage,
    builder: ModuleBuilder,
    importer: Importer<'a>,
    refs: RuntimeRefs,
    containers: HashMap<(HookKind, usize), Token>,
    stats: HookStats,
}

impl<'a> HookEmitter<'a> {
    pub(crate) fn new(
        image: &'a AssemblyImage,
        mut builder: ModuleBuilder,
        corlib: &AssemblyIdentity,
        runtime: &HookRuntime,
    ) -> Result<Self> {
        let importer = Importer::new(image)?;
        builder.add_type("", "<Module>", 0, None)?;
        let refs = RuntimeRefs::new(&mut builder, corlib, runtime)?;

        Ok(HookEmitter {
            image,
            builder,
            importer,
            refs,
            containers: HashMap::new(),
            stats: HookStats::default(),
        })
    }

    /// Base type for marker and container types.
    pub(crate) fn object(&self) -> Token {
        self.refs.object
    }

    pub(crate) fn builder_mut(&mut self) -> &mut ModuleBuilder {
        &mut self.builder
    }

    pub(crate) fn finish(self) -> (ModuleBuilder, HookStats) {
        (self.builder, self.stats)
    }

    /// Emits hooks for every hookable method of every type.
    pub(crate) fn emit_all(&mut self) -> Result<()> {
        for index in 0..self.image.types().len() {
            if is_hookable_type(self.image, index) {
                self.emit_type(index)?;
            }
        }

        Ok(())
    }

    fn emit_type(&mut self, index: usize) -> Result<()> {
        let image = self.image;
        let typedef = &image.types()[index];

        let mut hookable = Vec::new();
        for &method_index in &typedef.methods {
            let method = &image.methods()[method_index];
            if let Some(reason) = skip_reason(method) {
                debug!(
                    "Skipping {}::{}: {:?}",
                    image.full_name(index),
                    method.name,
                    reason
                );
                self.stats.skipped += 1;
                continue;
            }

            let Some(signature) = &method.signature else {
                continue;
            };
            match self
                .importer
                .import_method_signature(&mut self.builder, signature)
            {
                Ok(signature) => hookable.push(Hookable {
                    method: method_index,
                    signature,
                }),
                Err(error) => {
                    warn!(
                        "Skipping {}::{}: {:?}",
                        image.full_name(index),
                        method.name,
                        SkipReason::Unimportable(error.to_string())
                    );
                    self.stats.skipped += 1;
                }
            }
        }

        if hookable.is_empty() {
            return Ok(());
        }

        let named: Vec<(&str, &SignatureMethod)> = hookable
            .iter()
            .filter_map(|hook| {
                let method = &image.methods()[hook.method];
                method
                    .signature
                    .as_ref()
                    .map(|signature| (method.name.as_str(), signature))
            })
            .collect();
        let names = hook_names(image, &named);

        let target_type = self.importer.import_definition(&mut self.builder, index)?;
        let self_type = if typedef.is_value_type {
            TypeSignature::ByRef(Box::new(TypeSignature::ValueType(target_type)))
        } else {
            TypeSignature::Class(target_type)
        };

        let on = self.container(HookKind::On, index)?;
        let il = self.container(HookKind::Il, index)?;

        for (hook, name) in hookable.iter().zip(names) {
            let method = &image.methods()[hook.method];
            let target = self
                .builder
                .add_method_ref(target_type, &method.name, &hook.signature)?;

            let mut params = Vec::with_capacity(hook.signature.params.len() + 1);
            let mut param_names = Vec::with_capacity(hook.signature.params.len() + 1);
            if hook.signature.has_this {
                params.push(self_type.clone());
                param_names.push("self".to_string());
            }
            for (position, param) in hook.signature.params.iter().enumerate() {
                params.push(param.clone());
                param_names.push(
                    method
                        .param_names
                        .get(position)
                        .cloned()
                        .flatten()
                        .unwrap_or_else(|| format!("arg{position}")),
                );
            }

            let orig = self.emit_delegate(
                on,
                &format!("orig_{name}"),
                &hook.signature.return_type,
                &params,
                &param_names,
            )?;

            params.insert(0, TypeSignature::Class(orig));
            param_names.insert(0, "orig".to_string());
            let hook_delegate = self.emit_delegate(
                on,
                &format!("hook_{name}"),
                &hook.signature.return_type,
                &params,
                &param_names,
            )?;

            self.emit_event(on, &name, hook_delegate, target, (self.refs.add, self.refs.remove))?;
            let manipulator = self.refs.manipulator;
            self.emit_event(
                il,
                &name,
                manipulator,
                target,
                (self.refs.modify, self.refs.unmodify),
            )?;

            self.stats.hooks += 1;
        }

        self.stats.types += 1;
        Ok(())
    }

    /// The static class mirroring the type at `index`, created with its enclosing classes.
    fn container(&mut self, kind: HookKind, index: usize) -> Result<Token> {
        if let Some(token) = self.containers.get(&(kind, index)) {
            return Ok(*token);
        }

        let typedef = &self.image.types()[index];
        let token = match &typedef.scope {
            TypeScope::Namespace(namespace) => self.builder.add_type(
                &kind.namespace(namespace),
                &typedef.name,
                TypeAttributes::PUBLIC
                    | TypeAttributes::ABSTRACT
                    | TypeAttributes::SEALED
                    | TypeAttributes::BEFORE_FIELD_INIT,
                Some(self.refs.object),
            )?,
            TypeScope::Nested(enclosing) => {
                let enclosing = self.container(kind, *enclosing)?;
                self.builder.add_nested_type(
                    enclosing,
                    &typedef.name,
                    TypeAttributes::NESTED_PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
                    Some(self.refs.object),
                )?
            }
        };

        self.containers.insert((kind, index), token);
        Ok(token)
    }

    /// A runtime-implemented delegate type nested in `owner`.
    fn emit_delegate(
        &mut self,
        owner: Token,
        name: &str,
        return_type: &TypeSignature,
        params: &[TypeSignature],
        param_names: &[String],
    ) -> Result<Token> {
        let delegate = self.builder.add_nested_type(
            owner,
            name,
            DELEGATE_FLAGS,
            Some(self.refs.multicast_delegate),
        )?;

        let runtime = |method: NewMethod| method.impl_flags(MethodImplAttributes::RUNTIME);

        self.builder.add_method(
            delegate,
            runtime(
                NewMethod::new(
                    ".ctor",
                    CTOR_FLAGS,
                    SignatureMethod::new(
                        true,
                        TypeSignature::Void,
                        vec![TypeSignature::Object, TypeSignature::I],
                    ),
                )
                .params(["object", "method"]),
            ),
        )?;

        self.builder.add_method(
            delegate,
            runtime(
                NewMethod::new(
                    "Invoke",
                    INVOKE_FLAGS,
                    SignatureMethod::new(true, return_type.clone(), params.to_vec()),
                )
                .params(param_names.iter().cloned()),
            ),
        )?;

        let mut begin_params = params.to_vec();
        begin_params.push(TypeSignature::Class(self.refs.async_callback));
        begin_params.push(TypeSignature::Object);
        let mut begin_names = param_names.to_vec();
        begin_names.push("callback".to_string());
        begin_names.push("object".to_string());
        self.builder.add_method(
            delegate,
            runtime(
                NewMethod::new(
                    "BeginInvoke",
                    INVOKE_FLAGS,
                    SignatureMethod::new(
                        true,
                        TypeSignature::Class(self.refs.async_result),
                        begin_params,
                    ),
                )
                .params(begin_names),
            ),
        )?;

        self.builder.add_method(
            delegate,
            runtime(
                NewMethod::new(
                    "EndInvoke",
                    INVOKE_FLAGS,
                    SignatureMethod::new(
                        true,
                        return_type.clone(),
                        vec![TypeSignature::Class(self.refs.async_result)],
                    ),
                )
                .params(["result"]),
            ),
        )?;

        Ok(delegate)
    }

    /// A public static event on `owner` whose accessors register `value` for `target` through
    /// the given endpoint pair.
    fn emit_event(
        &mut self,
        owner: Token,
        name: &str,
        handler: Token,
        target: Token,
        (register, unregister): (Token, Token),
    ) -> Result<()> {
        let add = self.emit_accessor(owner, &format!("add_{name}"), handler, target, register)?;
        let remove =
            self.emit_accessor(owner, &format!("remove_{name}"), handler, target, unregister)?;

        self.builder.add_event(owner, name, handler, add, remove)
    }

    fn emit_accessor(
        &mut self,
        owner: Token,
        name: &str,
        handler: Token,
        target: Token,
        endpoint: Token,
    ) -> Result<MethodHandle> {
        let endpoint = self
            .builder
            .add_method_spec(endpoint, &[TypeSignature::Class(handler)])?;

        let body = IlBuilder::new()
            .ldtoken(target)
            .call(self.refs.get_method_from_handle, 1, 1)
            .ldarg(0)
            .call(endpoint, 2, 0)
            .ret()
            .finish();

        self.builder.add_method(
            owner,
            NewMethod::new(
                name,
                ACCESSOR_FLAGS,
                SignatureMethod::new(false, TypeSignature::Void, vec![TypeSignature::Class(handler)]),
            )
            .params(["value"])
            .body(body),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resolver::SearchDirectories,
        test::{corlib_identity, game, game_assembly_bytes},
    };

    fn image() -> AssemblyImage {
        AssemblyImage::from_mem(game_assembly_bytes(), SearchDirectories::default()).unwrap()
    }

    fn method<'a>(image: &'a AssemblyImage, type_index: usize, name: &str) -> &'a MethodDefinition {
        image.types()[type_index]
            .methods
            .iter()
            .map(|index| &image.methods()[*index])
            .find(|method| method.name == name)
            .unwrap()
    }

    #[test]
    fn skip_reasons() {
        let image = image();
        let player = image.find_type(game::NAMESPACE, game::PLAYER).unwrap();

        assert_eq!(skip_reason(method(&image, player, "Spawn")), None);
        assert_eq!(skip_reason(method(&image, player, ".ctor")), None);
        assert_eq!(
            skip_reason(method(&image, player, ".cctor")),
            Some(SkipReason::StaticConstructor)
        );
        assert_eq!(
            skip_reason(method(&image, player, "Get")),
            Some(SkipReason::Generic)
        );
        assert_eq!(
            skip_reason(method(&image, player, "Extern")),
            Some(SkipReason::NoBody)
        );
    }

    #[test]
    fn hookable_types() {
        let image = image();
        let player = image.find_type(game::NAMESPACE, game::PLAYER).unwrap();
        let stats = image.find_nested(player, game::STATS).unwrap();

        assert!(is_hookable_type(&image, player));
        assert!(is_hookable_type(&image, stats));
        assert!(!is_hookable_type(&image, image.find_type(game::NAMESPACE, game::BOX).unwrap()));
        assert!(!is_hookable_type(&image, image.find_type("", game::DETAILS).unwrap()));
        assert!(!is_hookable_type(&image, image.find_type("", "<Module>").unwrap()));
    }

    #[test]
    fn emits_mirrored_containers() {
        let image = image();
        let mut emitter = HookEmitter::new(
            &image,
            ModuleBuilder::new("MMHOOK_assembly_test.dll"),
            &corlib_identity(),
            &HookRuntime::default(),
        )
        .unwrap();
        emitter.emit_all().unwrap();
        let (builder, stats) = emitter.finish();

        // Player: ctor, Heal x2, Spawn; Stats: Reset; Entry: Touch
        assert_eq!(stats.hooks, 6);
        assert_eq!(stats.types, 3);

        let hooks =
            AssemblyImage::from_mem(builder.build().unwrap(), SearchDirectories::default())
                .unwrap();
        let on_player = hooks.find_type("On.Game", game::PLAYER).unwrap();
        let il_player = hooks.find_type("IL.Game", game::PLAYER).unwrap();
        let on_stats = hooks.find_nested(on_player, game::STATS).unwrap();
        let on_entry = hooks.find_nested(on_stats, game::ENTRY).unwrap();
        assert!(hooks.find_nested(il_player, game::STATS).is_some());
        assert!(hooks.find_type("On.Game", game::BOX).is_none());

        for delegate in ["orig_Heal_Int32", "hook_Heal_Single", "orig_ctor", "hook_Spawn"] {
            assert!(
                hooks.find_nested(on_player, delegate).is_some(),
                "missing {delegate}"
            );
        }

        let accessors: Vec<&str> = hooks.types()[il_player]
            .methods
            .iter()
            .map(|index| hooks.methods()[*index].name.as_str())
            .collect();
        assert!(accessors.contains(&"add_Heal_Int32"));
        assert!(accessors.contains(&"remove_Spawn"));

        let orig_touch = hooks.find_nested(on_entry, "orig_Touch").unwrap();
        let invoke = method(&hooks, orig_touch, "Invoke");
        let signature = invoke.signature.as_ref().unwrap();
        assert!(matches!(
            &signature.params[0],
            TypeSignature::ByRef(inner) if matches!(**inner, TypeSignature::ValueType(_))
        ));
        assert_eq!(signature.params[1], TypeSignature::String);
        assert_eq!(invoke.param_names[0].as_deref(), Some("self"));
        assert_eq!(invoke.param_names[1].as_deref(), Some("arg0"));

        let hook_spawn = hooks.find_nested(on_player, "hook_Spawn").unwrap();
        let invoke = method(&hooks, hook_spawn, "Invoke");
        assert_eq!(invoke.signature.as_ref().unwrap().params.len(), 1);
        assert!(!invoke.has_body());
    }
}
