//! Built-in shapes for std and ecosystem types.
//!
//! This module provides:
//! - Scalar shapes for primitives, text, time, network and path types
//! - Transparent generic shapes for std containers (`Vec<T>`, `Option<T>`, sets, smart pointers)
//! - Two-argument shapes for maps, which the classifier rejects
//! - `TypeId` as a type token

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::{Reflect, Shape, TypeRef};

crate::reflect_scalar!(Bool => bool);
crate::reflect_scalar!(Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
crate::reflect_scalar!(Integer =>
    std::num::NonZeroU8, std::num::NonZeroU16, std::num::NonZeroU32, std::num::NonZeroU64, std::num::NonZeroUsize,
    std::num::NonZeroI32, std::num::NonZeroI64,
);
crate::reflect_scalar!(Float => f32, f64);
crate::reflect_scalar!(Char => char);
crate::reflect_scalar!(Text => String, &'static str, Cow<'static, str>);
crate::reflect_scalar!(Temporal => Duration, SystemTime);
crate::reflect_scalar!(Uri => IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, PathBuf);

#[cfg(feature = "chrono")]
mod chrono_impls {
    use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    crate::reflect_scalar!(Temporal =>
        DateTime<Utc>, DateTime<Local>, DateTime<FixedOffset>, NaiveDate, NaiveDateTime, NaiveTime,
        chrono::Weekday, chrono::Month,
    );
}

#[cfg(feature = "uuid")]
crate::reflect_scalar!(Uuid => uuid::Uuid);

impl Reflect for TypeId {
    fn shape() -> Shape { Shape::TypeToken }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape { Shape::Sequence(TypeRef::of::<T>()) }
}

macro_rules! reflect_generic {
    ($($container:ident),+ $(,)?) => {
        $(
            impl<T: Reflect> Reflect for $container<T> {
                fn shape() -> Shape { Shape::generic(stringify!($container), [TypeRef::of::<T>()]) }
            }
        )+
    };
}

reflect_generic!(Vec, VecDeque, LinkedList, BTreeSet, Option, Box, Rc, Arc);

impl<T: Reflect, S: 'static> Reflect for HashSet<T, S> {
    fn shape() -> Shape { Shape::generic("HashSet", [TypeRef::of::<T>()]) }
}

impl<K: Reflect, V: Reflect> Reflect for BTreeMap<K, V> {
    fn shape() -> Shape { Shape::generic("BTreeMap", [TypeRef::of::<K>(), TypeRef::of::<V>()]) }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for HashMap<K, V, S> {
    fn shape() -> Shape { Shape::generic("HashMap", [TypeRef::of::<K>(), TypeRef::of::<V>()]) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScalarKind, TypeKey};

    fn arg_keys(shape: Shape) -> Vec<TypeKey> {
        match shape {
            Shape::Generic { args, .. } => args.iter().map(TypeRef::key).collect(),
            other => panic!("expected generic shape, got {:?}", other),
        }
    }

    #[test]
    fn scalars_report_their_kind() {
        assert!(matches!(<u64 as Reflect>::shape(), Shape::Scalar(ScalarKind::Integer)));
        assert!(matches!(<String as Reflect>::shape(), Shape::Scalar(ScalarKind::Text)));
        assert!(matches!(<Duration as Reflect>::shape(), Shape::Scalar(ScalarKind::Temporal)));
        assert!(matches!(<TypeId as Reflect>::shape(), Shape::TypeToken));
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn chrono_types_are_temporal() {
        assert!(matches!(<chrono::DateTime<chrono::Utc> as Reflect>::shape(), Shape::Scalar(ScalarKind::Temporal)));
    }

    #[test]
    fn containers_expose_type_arguments() {
        assert_eq!(arg_keys(<Vec<String> as Reflect>::shape()), vec![TypeKey::of::<String>()]);
        assert_eq!(arg_keys(<Option<u8> as Reflect>::shape()), vec![TypeKey::of::<u8>()]);
        assert_eq!(
            arg_keys(<HashMap<String, u8> as Reflect>::shape()),
            vec![TypeKey::of::<String>(), TypeKey::of::<u8>()]
        );
        match <[f32; 3] as Reflect>::shape() {
            Shape::Sequence(elem) => assert_eq!(elem.key(), TypeKey::of::<f32>()),
            other => panic!("expected sequence, got {:?}", other),
        }
    }
}
