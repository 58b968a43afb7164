use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::func::signature_of;
use super::host_value::{HostValue, StructValue};
use super::reflect::Reflect;
use super::tuple::{Args, Returns};
use super::types::{Signature, TypeDesc};
use crate::error::BridgeError;

pub type MethodImpl =
    Arc<dyn Fn(&mut StructValue, Vec<HostValue>) -> Result<Vec<HostValue>, BridgeError> + Send + Sync>;

/// A method exposed on struct proxies.
#[derive(Clone)]
pub struct Method {
    name: &'static str,
    sig: Arc<Signature>,
    imp: MethodImpl,
}

impl Method {
    /// Wraps `f(&mut T, args..) -> R` as a method named `name`.
    pub fn new<T, A, R, F>(name: &'static str, f: F) -> Self
    where
        F: HostMethod<T, A, R>,
        A: Args,
        R: Returns,
    {
        Self {
            name,
            sig: Arc::new(signature_of::<A, R>()),
            imp: f.into_method(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &Arc<Signature> {
        &self.sig
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({}: {})", self.name, self.sig)
    }
}

/// Rust functions usable as struct methods: `Fn(&mut T, A1, .., An) -> R`.
pub trait HostMethod<T, A, R>: Send + Sync + 'static {
    fn into_method(self) -> MethodImpl;
}

macro_rules! impl_host_method {
    ($($A:ident $a:ident),*) => {
        impl<F, T, R, $($A),*> HostMethod<T, ($($A,)*), R> for F
        where
            F: Fn(&mut T, $($A),*) -> R + Send + Sync + 'static,
            T: Reflect,
            R: Returns,
            $($A: Reflect,)*
        {
            fn into_method(self) -> MethodImpl {
                Arc::new(move |state: &mut StructValue, args: Vec<HostValue>| {
                    let mut this = T::from_host(HostValue::Struct(state.clone()))?;
                    let ($($a,)*) = <($($A,)*) as Args>::from_hosts(args)?;
                    let result = self(&mut this, $($a),*);
                    if let HostValue::Struct(updated) = this.into_host() {
                        *state = updated;
                    }
                    result.into_outcome()
                })
            }
        }
    };
}

impl_host_method!();
impl_host_method!(A1 a1);
impl_host_method!(A1 a1, A2 a2);
impl_host_method!(A1 a1, A2 a2, A3 a3);
impl_host_method!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_host_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_host_method!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);

/// A struct exposed to the engine, shared by all of its proxy members.
///
/// Method calls and field writes are serialized per object. The same thread
/// may re-enter, for instance when a method calls back into the engine.
pub struct HostObject {
    state: Mutex<StructValue>,
    writes: ReentrantMutex<()>,
}

impl HostObject {
    pub fn new(value: StructValue) -> Self {
        Self {
            state: Mutex::new(value),
            writes: ReentrantMutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.state.lock().name()
    }

    pub fn snapshot(&self) -> StructValue {
        self.state.lock().clone()
    }

    pub fn get_field(&self, name: &str) -> Result<HostValue, BridgeError> {
        let state = self.state.lock();
        state
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::missing_member(state.name(), name))
    }

    pub fn field_desc(&self, name: &str) -> Result<TypeDesc, BridgeError> {
        let state = self.state.lock();
        state
            .field_desc(name)
            .cloned()
            .ok_or_else(|| BridgeError::missing_member(state.name(), name))
    }

    pub fn set_field(&self, name: &str, value: HostValue) -> Result<(), BridgeError> {
        let _writing = self.writes.lock();
        let old = {
            let mut state = self.state.lock();
            let Some(old) = state.get(name).cloned() else {
                return Err(BridgeError::missing_member(state.name(), name));
            };
            state.set(name, value);
            old
        };
        // Dropping a replaced dynamic value must not happen under the lock
        drop(old);
        Ok(())
    }

    pub fn method(&self, name: &str) -> Result<Method, BridgeError> {
        let state = self.state.lock();
        state
            .method(name)
            .cloned()
            .ok_or_else(|| BridgeError::missing_member(state.name(), name))
    }

    /// Runs `method` on a copy of the state and stores the copy back.
    ///
    /// Other threads' calls and writes wait until the copy is stored. The
    /// state lock is not held while the method runs, so it may call back into
    /// the engine and read this object again.
    pub fn call_method(
        &self,
        method: &Method,
        args: Vec<HostValue>,
    ) -> Result<Vec<HostValue>, BridgeError> {
        let _writing = self.writes.lock();
        let mut state = self.snapshot();
        let outputs = (method.imp)(&mut state, args)?;
        let old = std::mem::replace(&mut *self.state.lock(), state);
        drop(old);
        Ok(outputs)
    }
}

/// Implements [`Reflect`](crate::Reflect) for a plain struct.
///
/// Listed fields are exposed by name; `methods` lists functions taking
/// `&mut Self` first. Fields missing on the way back keep their
/// `Default` value, so the struct must implement `Default`.
///
/// ```
/// use flux_embed::reflect_struct;
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Counter {
///     name: String,
///     count: i64,
/// }
///
/// impl Counter {
///     fn bump(&mut self, by: i64) -> i64 {
///         self.count += by;
///         self.count
///     }
/// }
///
/// reflect_struct!(Counter { name: String, count: i64 } methods { bump => Counter::bump });
/// ```
#[macro_export]
macro_rules! reflect_struct {
    (
        $ty:ident { $($field:ident : $fty:ty),* $(,)? }
        $(methods { $($method:ident => $path:expr),* $(,)? })?
    ) => {
        impl $crate::Reflect for $ty {
            fn describe() -> $crate::TypeDesc {
                $crate::TypeDesc::Struct(::std::sync::Arc::new($crate::StructDesc::new(
                    stringify!($ty),
                    vec![$($crate::FieldDesc::new(
                        stringify!($field),
                        <$fty as $crate::Reflect>::describe(),
                    )),*],
                )))
            }

            fn into_host(self) -> $crate::HostValue {
                let fields = vec![$($crate::FieldValue::new(
                    stringify!($field),
                    <$fty as $crate::Reflect>::describe(),
                    <$fty as $crate::Reflect>::into_host(self.$field),
                )),*];
                let methods: ::std::vec::Vec<$crate::Method> =
                    vec![$($($crate::Method::new(stringify!($method), $path)),*)?];
                $crate::HostValue::Struct($crate::StructValue::new(stringify!($ty), fields, methods))
            }

            #[allow(unused_mut, unused_variables)]
            fn from_host(value: $crate::HostValue) -> ::std::result::Result<Self, $crate::BridgeError> {
                let mut value = match value {
                    $crate::HostValue::Struct(value) if value.name() == stringify!($ty) => value,
                    other => {
                        return Err($crate::BridgeError::invalid(stringify!($ty), other.describe()));
                    }
                };
                let mut out = <$ty as ::std::default::Default>::default();
                $(
                    if let Some(field) = value.take(stringify!($field)) {
                        out.$field = <$fty as $crate::Reflect>::from_host(field)?;
                    }
                )*
                Ok(out)
            }
        }
    };
}
