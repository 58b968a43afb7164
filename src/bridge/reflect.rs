use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::mpsc::{Receiver, Sender, SyncSender};

use num_complex::Complex;

use super::handle::DynValue;
use super::host_value::HostValue;
use super::types::TypeDesc;
use crate::error::BridgeError;

/// Host types that can cross into the engine and back.
///
/// `describe` drives conversion from engine values, `into_host` and
/// `from_host` move between the Rust value and its reflected form.
pub trait Reflect: Sized {
    fn describe() -> TypeDesc;
    fn into_host(self) -> HostValue;
    fn from_host(value: HostValue) -> Result<Self, BridgeError>;
}

fn mismatch<T: Reflect>(found: &HostValue) -> BridgeError {
    BridgeError::invalid(T::describe(), found.describe())
}

impl Reflect for bool {
    fn describe() -> TypeDesc {
        TypeDesc::Bool
    }

    fn into_host(self) -> HostValue {
        HostValue::Bool(self)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Bool(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! reflect_signed {
    ($($ty:ty => $bits:expr),*) => {$(
        impl Reflect for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::Int($bits)
            }

            fn into_host(self) -> HostValue {
                HostValue::Int(self as i64)
            }

            fn from_host(value: HostValue) -> Result<Self, BridgeError> {
                match &value {
                    HostValue::Int(v) => <$ty>::try_from(*v).map_err(|_| mismatch::<Self>(&value)),
                    HostValue::Uint(v) => <$ty>::try_from(*v).map_err(|_| mismatch::<Self>(&value)),
                    other => Err(mismatch::<Self>(other)),
                }
            }
        }
    )*};
}

macro_rules! reflect_unsigned {
    ($($ty:ty => $bits:expr),*) => {$(
        impl Reflect for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::Uint($bits)
            }

            fn into_host(self) -> HostValue {
                HostValue::Uint(self as u64)
            }

            fn from_host(value: HostValue) -> Result<Self, BridgeError> {
                match &value {
                    HostValue::Uint(v) => <$ty>::try_from(*v).map_err(|_| mismatch::<Self>(&value)),
                    HostValue::Int(v) => <$ty>::try_from(*v).map_err(|_| mismatch::<Self>(&value)),
                    other => Err(mismatch::<Self>(other)),
                }
            }
        }
    )*};
}

reflect_signed!(i8 => 8, i16 => 16, i32 => 32, i64 => 64, isize => 64);
reflect_unsigned!(u8 => 8, u16 => 16, u32 => 32, u64 => 64, usize => 64);

impl Reflect for f64 {
    fn describe() -> TypeDesc {
        TypeDesc::Float(64)
    }

    fn into_host(self) -> HostValue {
        HostValue::Float(self)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Float(v) => Ok(v),
            HostValue::Int(v) => Ok(v as f64),
            HostValue::Uint(v) => Ok(v as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Reflect for f32 {
    fn describe() -> TypeDesc {
        TypeDesc::Float(32)
    }

    fn into_host(self) -> HostValue {
        HostValue::Float(f64::from(self))
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        f64::from_host(value).map(|v| v as f32)
    }
}

impl Reflect for Complex<f64> {
    fn describe() -> TypeDesc {
        TypeDesc::Complex(64)
    }

    fn into_host(self) -> HostValue {
        HostValue::Complex(self.re, self.im)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Complex(re, im) => Ok(Complex::new(re, im)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Reflect for Complex<f32> {
    fn describe() -> TypeDesc {
        TypeDesc::Complex(32)
    }

    fn into_host(self) -> HostValue {
        HostValue::Complex(f64::from(self.re), f64::from(self.im))
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        Complex::<f64>::from_host(value).map(|z| Complex::new(z.re as f32, z.im as f32))
    }
}

impl Reflect for String {
    fn describe() -> TypeDesc {
        TypeDesc::String
    }

    fn into_host(self) -> HostValue {
        HostValue::String(self)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::String(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn describe() -> TypeDesc {
        TypeDesc::Sequence(Box::new(T::describe()))
    }

    fn into_host(self) -> HostValue {
        HostValue::Sequence(self.into_iter().map(T::into_host).collect())
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Sequence(items) => items.into_iter().map(T::from_host).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn describe() -> TypeDesc {
        TypeDesc::Sequence(Box::new(T::describe()))
    }

    fn into_host(self) -> HostValue {
        HostValue::Sequence(self.into_iter().map(T::into_host).collect())
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        let items = Vec::<T>::from_host(value)?;
        let len = items.len();
        items.try_into().map_err(|_| {
            BridgeError::invalid(
                format!("array of {} elements", N),
                format!("sequence of {} elements", len),
            )
        })
    }
}

impl<K, V> Reflect for HashMap<K, V>
where
    K: Reflect + Eq + Hash,
    V: Reflect,
{
    fn describe() -> TypeDesc {
        TypeDesc::Mapping(Box::new(K::describe()), Box::new(V::describe()))
    }

    fn into_host(self) -> HostValue {
        HostValue::Mapping(
            self.into_iter()
                .map(|(k, v)| (k.into_host(), v.into_host()))
                .collect(),
        )
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Mapping(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok::<_, BridgeError>((K::from_host(k)?, V::from_host(v)?)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: Reflect + Ord,
    V: Reflect,
{
    fn describe() -> TypeDesc {
        TypeDesc::Mapping(Box::new(K::describe()), Box::new(V::describe()))
    }

    fn into_host(self) -> HostValue {
        HostValue::Mapping(
            self.into_iter()
                .map(|(k, v)| (k.into_host(), v.into_host()))
                .collect(),
        )
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Mapping(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok::<_, BridgeError>((K::from_host(k)?, V::from_host(v)?)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// The raw engine value, without conversion.
impl Reflect for DynValue {
    fn describe() -> TypeDesc {
        TypeDesc::Opaque
    }

    fn into_host(self) -> HostValue {
        HostValue::Dynamic(self)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Dynamic(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! reflect_unsupported {
    ($($ty:ty),*) => {$(
        impl<T> Reflect for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::Unsupported(std::any::type_name::<Self>())
            }

            fn into_host(self) -> HostValue {
                HostValue::Unsupported(std::any::type_name::<Self>())
            }

            fn from_host(_value: HostValue) -> Result<Self, BridgeError> {
                Err(BridgeError::unsupported(std::any::type_name::<Self>()))
            }
        }
    )*};
}

reflect_unsupported!(*const T, *mut T, Sender<T>, SyncSender<T>, Receiver<T>);
