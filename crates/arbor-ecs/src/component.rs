//! Component type registration and metadata.
//!
//! A component type is any Rust type meeting the [`Component`] bound. It must
//! be registered before use; registration assigns a stable [`Id`] for the
//! lifetime of the process and attaches a [`TypeInfo`] record to the id index.
//! Registering the same Rust type twice returns the original id without
//! re-registering.
//!
//! Type metadata carries type-erased function pointers ([`TypeVtable`]) so
//! that table columns can default-construct, drop, and convert values without
//! knowing the concrete type at compile time.

use crate::id::Id;
use crate::id_index::IdIndex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ptr;

/// Bound required of every registered component type.
///
/// `Default` is what newly added components are constructed from; the serde
/// bounds power the dynamic by-name value access used by editing UIs.
pub trait Component: Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Component for T where T: Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

// ---------------------------------------------------------------------------
// TypeVtable -- type-erased operations for a component type
// ---------------------------------------------------------------------------

/// Function pointers for type-erased operations on component values.
///
/// Created via [`TypeVtable::new::<T>()`] and carried inside [`TypeInfo`].
/// The pointers are plain monomorphized `fn` items; they capture no state.
#[derive(Clone)]
pub struct TypeVtable {
    /// Drop a value in place.
    pub(crate) drop_fn: unsafe fn(*mut u8),
    /// Write `T::default()` into uninitialized, properly aligned memory.
    pub(crate) default_fn: unsafe fn(*mut u8),
    /// Serialize the value behind the pointer to JSON.
    pub(crate) to_json_fn: unsafe fn(*const u8) -> Result<serde_json::Value, String>,
    /// Replace the initialized value behind the pointer with one deserialized
    /// from JSON. The old value is dropped only if deserialization succeeds.
    pub(crate) set_json_fn: unsafe fn(*mut u8, &serde_json::Value) -> Result<(), String>,
}

impl TypeVtable {
    /// Build the vtable for a concrete component type `T`.
    pub fn new<T: Component>() -> Self {
        unsafe fn drop_impl<T>(slot: *mut u8) {
            ptr::drop_in_place(slot as *mut T);
        }

        unsafe fn default_impl<T: Default>(slot: *mut u8) {
            ptr::write(slot as *mut T, T::default());
        }

        unsafe fn to_json_impl<T: Serialize>(
            slot: *const u8,
        ) -> Result<serde_json::Value, String> {
            serde_json::to_value(&*(slot as *const T)).map_err(|e| e.to_string())
        }

        unsafe fn set_json_impl<T: DeserializeOwned>(
            slot: *mut u8,
            value: &serde_json::Value,
        ) -> Result<(), String> {
            let typed: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
            ptr::drop_in_place(slot as *mut T);
            ptr::write(slot as *mut T, typed);
            Ok(())
        }

        Self {
            drop_fn: drop_impl::<T>,
            default_fn: default_impl::<T>,
            to_json_fn: to_json_impl::<T>,
            set_json_fn: set_json_impl::<T>,
        }
    }
}

impl fmt::Debug for TypeVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeVtable").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

/// Metadata describing a registered component type.
///
/// Cloned into every table column that stores the type, so columns can
/// operate on their contents without consulting the registry.
#[derive(Clone)]
pub struct TypeInfo {
    /// Engine id the type is registered under.
    pub id: Id,
    /// Human-readable name supplied at registration.
    pub name: String,
    /// `std::mem::size_of::<T>()`. Zero-size types behave as tags: they join
    /// a table's type but get no column.
    pub size: usize,
    /// `std::mem::align_of::<T>()`.
    pub align: usize,
    /// Rust `TypeId`, used to verify typed access at runtime.
    pub rust_type: TypeId,
    /// Type-erased operations.
    pub(crate) vtable: TypeVtable,
}

impl TypeInfo {
    /// Build the metadata record for `T` under `id`.
    pub fn new<T: Component>(id: Id, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            rust_type: TypeId::of::<T>(),
            vtable: TypeVtable::new::<T>(),
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Assigns and caches engine ids for Rust component types.
///
/// The registry is a thin layer over the id index: it owns the
/// `TypeId -> Id` and `name -> Id` mappings, while the [`TypeInfo`] itself
/// is attached to the id's record in the index.
#[derive(Debug)]
pub struct ComponentRegistry {
    /// Rust TypeId -> engine id, for idempotent registration.
    by_type: HashMap<TypeId, Id>,
    /// Registered name -> engine id, for by-name value access.
    by_name: HashMap<String, Id>,
    /// Registered ids in registration order.
    ids: Vec<Id>,
    /// Next id to try for auto-assignment.
    next_id: u64,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            ids: Vec::new(),
            // Id 0 is never assigned; it reads as "no id" in inspector output.
            next_id: 1,
        }
    }

    /// Register `T` under `name`, auto-assigning the next free id.
    ///
    /// Idempotent: if `T` is already registered the existing id is returned
    /// and `name` is ignored. Ids already present in the index (e.g. used as
    /// tags) are skipped during assignment.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered for a different type.
    pub fn register<T: Component>(&mut self, name: &str, index: &mut IdIndex) -> Id {
        if let Some(&existing) = self.by_type.get(&TypeId::of::<T>()) {
            return existing;
        }
        let id = loop {
            let candidate = Id::from_raw(self.next_id);
            self.next_id += 1;
            if index.get(candidate).is_none() {
                break candidate;
            }
        };
        self.bind::<T>(id, name, index)
    }

    /// Register `T` under an explicit id.
    ///
    /// This is how callers place a type at a chosen point of the id space
    /// (including the map-backed high range). Idempotent by Rust type: if `T`
    /// is already registered, the existing id is returned regardless of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` already carries metadata for a different type, or if
    /// `name` is registered for a different type.
    pub fn register_as<T: Component>(&mut self, id: Id, name: &str, index: &mut IdIndex) -> Id {
        if let Some(&existing) = self.by_type.get(&TypeId::of::<T>()) {
            return existing;
        }
        if let Some(info) = index.get(id).and_then(|record| record.type_info()) {
            assert!(
                info.rust_type == TypeId::of::<T>(),
                "id {id:?} already carries type '{}'",
                info.name
            );
        }
        self.bind::<T>(id, name, index)
    }

    fn bind<T: Component>(&mut self, id: Id, name: &str, index: &mut IdIndex) -> Id {
        if let Some(&taken) = self.by_name.get(name) {
            assert!(
                taken == id,
                "component name '{name}' is already registered under {taken:?}"
            );
        }
        let info = TypeInfo::new::<T>(id, name);
        tracing::debug!(name, ?id, size = info.size, "registered component type");
        index.attach_type_info(id, info);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(name.to_owned(), id);
        self.ids.push(id);
        id
    }

    /// Look up the id for a Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<Id> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up the id for a registered name.
    pub fn lookup_by_name(&self, name: &str) -> Option<Id> {
        self.by_name.get(name).copied()
    }

    /// Ids of all registered component types, in registration order.
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
