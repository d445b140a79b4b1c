use crate::core::ValueType;
use crate::schema::entity::{GetterFn, SetterFn};
use crate::schema::{Entity, MethodBody, Signature};
use std::any::TypeId;
use std::fmt;

/// A restricted or transformed shape of an entity used for serialization.
///
/// Views are zero-sized marker types; all their behavior lives in the
/// method table they declare.
///
/// ```ignore
/// struct Summary;
///
/// impl View<Item> for Summary {
///     fn methods() -> Vec<ViewMethod<Item>> {
///         vec![
///             ViewMethod::forward_getter("get_name", ValueType::String),
///             ViewMethod::getter("get_label", ValueType::String, |item| {
///                 Ok(Value::String(item.name.to_uppercase()))
///             }),
///         ]
///     }
/// }
/// ```
pub trait View<T: Entity>: Send + Sync + 'static {
    fn methods() -> Vec<ViewMethod<T>>;
}

/// One method declared by a view; without a body it forwards to the
/// entity method of the same name.
pub struct ViewMethod<T> {
    pub name: String,
    pub signature: Signature,
    pub body: Option<MethodBody<T>>,
}

impl<T> ViewMethod<T> {
    pub fn forward_getter(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Getter(value_type),
            body: None,
        }
    }

    pub fn forward_setter(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Setter(value_type),
            body: None,
        }
    }

    pub fn getter(name: &str, value_type: ValueType, body: GetterFn<T>) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Getter(value_type),
            body: Some(MethodBody::Getter(body)),
        }
    }

    pub fn setter(name: &str, value_type: ValueType, body: SetterFn<T>) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Setter(value_type),
            body: Some(MethodBody::Setter(body)),
        }
    }
}

/// Value-level handle to a view type, accepted by mapper options.
pub struct ViewRef<T> {
    type_id: TypeId,
    type_name: &'static str,
    size: usize,
    methods: fn() -> Vec<ViewMethod<T>>,
}

impl<T: Entity> ViewRef<T> {
    pub fn of<V: View<T>>() -> Self {
        Self {
            type_id: TypeId::of::<V>(),
            type_name: std::any::type_name::<V>(),
            size: std::mem::size_of::<V>(),
            methods: V::methods,
        }
    }
}

impl<T> ViewRef<T> {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn methods(&self) -> Vec<ViewMethod<T>> {
        (self.methods)()
    }
}

impl<T> Clone for ViewRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ViewRef<T> {}

impl<T> fmt::Debug for ViewRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewRef({})", self.type_name)
    }
}
