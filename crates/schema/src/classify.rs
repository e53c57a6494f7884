//! Attribute classification: scalar leaf, structured value, or excluded.

use nestfilter_core::{ScalarKind, Shape, TypeKey, TypeRef};

use crate::SchemaError;

#[derive(Debug, Clone, Copy)]
pub enum Classification {
    /// Terminal value (including arrays and collections of scalars).
    Scalar(ScalarKind),
    /// Value described by the schema of the given type. For collections this is the element type.
    Structured(TypeRef),
    /// Attribute that identifies a type; contributes no slot.
    Excluded,
}

/// Why a declared type could not be classified. Carries no attribute context yet;
/// [`Unsupported::at`] attaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    Opaque(TypeKey),
    Arity { container: &'static str, arity: usize },
}

impl Unsupported {
    pub fn at(self, owner: TypeKey, attribute: &'static str) -> SchemaError {
        match self {
            Unsupported::Opaque(ty) => SchemaError::Inaccessible { owner, attribute, ty },
            Unsupported::Arity { container, arity } => SchemaError::UnsupportedGeneric { owner, attribute, container, arity },
        }
    }
}

/// Classify a declared attribute type.
///
/// Containers are transparent: `Vec<Address>`, `Option<Address>` and `[Address; 2]` all
/// classify as `Structured(Address)`, and `Vec<Vec<String>>` is a scalar.
pub fn classify(ty: &TypeRef) -> Result<Classification, Unsupported> {
    match ty.shape() {
        Shape::Scalar(kind) => Ok(Classification::Scalar(kind)),
        Shape::TypeToken => Ok(Classification::Excluded),
        Shape::Object(_) => Ok(Classification::Structured(*ty)),
        Shape::Sequence(elem) => classify(&elem),
        Shape::Generic { container, args } => match args.as_slice() {
            [elem] => classify(elem),
            _ => Err(Unsupported::Arity { container, arity: args.len() }),
        },
        Shape::Opaque => Err(Unsupported::Opaque(ty.key())),
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;
    use std::collections::HashMap;

    use nestfilter_core::{reflect_object, Reflect};

    use super::*;

    struct Address;
    struct Handle;

    reflect_object!(Address { city: String });

    impl Reflect for Handle {
        fn shape() -> Shape { Shape::Opaque }
    }

    fn structured_key(c: Classification) -> Option<TypeKey> {
        match c {
            Classification::Structured(t) => Some(t.key()),
            _ => None,
        }
    }

    #[test]
    fn scalars_and_scalar_containers_are_leaves() {
        assert!(matches!(classify(&TypeRef::of::<String>()), Ok(Classification::Scalar(ScalarKind::Text))));
        assert!(matches!(classify(&TypeRef::of::<[u16; 4]>()), Ok(Classification::Scalar(ScalarKind::Integer))));
        assert!(matches!(classify(&TypeRef::of::<Vec<Vec<bool>>>()), Ok(Classification::Scalar(ScalarKind::Bool))));
        assert!(matches!(classify(&TypeRef::of::<Option<f64>>()), Ok(Classification::Scalar(ScalarKind::Float))));
    }

    #[test]
    fn collections_classify_as_their_element() {
        let addr = TypeKey::of::<Address>();
        assert_eq!(structured_key(classify(&TypeRef::of::<Address>()).unwrap()), Some(addr));
        assert_eq!(structured_key(classify(&TypeRef::of::<Vec<Address>>()).unwrap()), Some(addr));
        assert_eq!(structured_key(classify(&TypeRef::of::<Option<Box<Address>>>()).unwrap()), Some(addr));
        assert_eq!(structured_key(classify(&TypeRef::of::<[Address; 2]>()).unwrap()), Some(addr));
    }

    #[test]
    fn type_tokens_are_excluded() {
        assert!(matches!(classify(&TypeRef::of::<TypeId>()), Ok(Classification::Excluded)));
        assert!(matches!(classify(&TypeRef::of::<Vec<TypeId>>()), Ok(Classification::Excluded)));
    }

    #[test]
    fn maps_and_opaque_types_are_unsupported() {
        assert_eq!(
            classify(&TypeRef::of::<HashMap<String, Address>>()).unwrap_err(),
            Unsupported::Arity { container: "HashMap", arity: 2 }
        );
        assert_eq!(
            classify(&TypeRef::of::<Vec<Handle>>()).unwrap_err(),
            Unsupported::Opaque(TypeKey::of::<Handle>())
        );
    }
}
