use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::host_value::{HostFn, HostImpl, HostValue};
use super::reflect::Reflect;
use super::tuple::{Args, Returns};
use super::types::{Signature, TypeDesc};
use crate::error::BridgeError;

pub(crate) fn signature_of<A: Args, R: Returns>() -> Signature {
    let (outputs, error_slot) = R::shape();
    Signature {
        inputs: A::describe(),
        outputs,
        error_slot,
    }
}

/// A typed function value: takes the argument tuple `A`, returns `R`.
///
/// It may wrap a Rust closure or a function living in the engine; calling
/// it looks the same either way. With `R = Result<T, BridgeError>` engine
/// exceptions come back as `Err`, otherwise they panic with the
/// [`BridgeError`] as payload.
///
/// ```
/// use flux_embed::{Func, Interpreter};
///
/// let interp = Interpreter::new();
/// let twice: Func<(Func<(i64,), i64>, i64), i64> =
///     interp.bind("fun(f, x) { f(f(x)) }").unwrap();
/// let inc = Func::<(i64,), i64>::from_fn(|x: i64| x + 1);
/// assert_eq!(twice.call((inc, 40)), 42);
/// ```
pub struct Func<A, R> {
    inner: HostFn,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A: Args, R: Returns> Func<A, R> {
    pub fn signature() -> Arc<Signature> {
        Arc::new(signature_of::<A, R>())
    }

    /// Wraps a Rust closure taking the elements of `A` as arguments.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: HostCallable<A, R>,
    {
        Self {
            inner: HostFn::new(Self::signature(), f.into_impl()),
            _marker: PhantomData,
        }
    }

    pub fn call(&self, args: A) -> R {
        R::from_outcome(self.inner.invoke(args.into_hosts()))
    }

    /// Whether both values stand for the same underlying function.
    pub fn ptr_eq(&self, other: &Func<A, R>) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// True when the function lives in the engine.
    pub fn is_dynamic(&self) -> bool {
        self.inner.is_dynamic()
    }
}

impl<A, R> Clone for Func<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A: Args, R: Returns> fmt::Debug for Func<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = if self.is_dynamic() { "dynamic" } else { "host" };
        write!(f, "Func({} {})", origin, self.inner.signature())
    }
}

impl<A: Args, R: Returns> Reflect for Func<A, R> {
    fn describe() -> TypeDesc {
        TypeDesc::Function(Self::signature())
    }

    fn into_host(self) -> HostValue {
        HostValue::Function(self.inner)
    }

    fn from_host(value: HostValue) -> Result<Self, BridgeError> {
        match value {
            HostValue::Function(inner) => Ok(Self {
                inner: inner.retyped(Self::signature())?,
                _marker: PhantomData,
            }),
            other => Err(BridgeError::invalid(Self::describe(), other.describe())),
        }
    }
}

/// Rust closures usable as [`Func`] bodies: `Fn(A1, .., An) -> R`.
pub trait HostCallable<A, R>: Send + Sync + 'static {
    fn into_impl(self) -> HostImpl;
}

macro_rules! impl_host_callable {
    ($($A:ident $a:ident),*) => {
        impl<F, R, $($A),*> HostCallable<($($A,)*), R> for F
        where
            F: Fn($($A),*) -> R + Send + Sync + 'static,
            R: Returns,
            $($A: Reflect,)*
        {
            fn into_impl(self) -> HostImpl {
                Arc::new(move |args: Vec<HostValue>| {
                    let ($($a,)*) = <($($A,)*) as Args>::from_hosts(args)?;
                    self($($a),*).into_outcome()
                })
            }
        }
    };
}

impl_host_callable!();
impl_host_callable!(A1 a1);
impl_host_callable!(A1 a1, A2 a2);
impl_host_callable!(A1 a1, A2 a2, A3 a3);
impl_host_callable!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_host_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_host_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_host_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_host_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);
