//! Argument and result lists.
//!
//! Functions take their arguments as a tuple implementing [`Args`]. Results
//! are described by [`Outputs`] for `eval` and by [`Returns`] for functions,
//! where `Result<T, BridgeError>` additionally declares an error slot.

use super::host_value::HostValue;
use super::reflect::Reflect;
use super::types::TypeDesc;
use crate::error::BridgeError;

/// Escalates a bridge error that has nowhere else to go.
///
/// The payload is the [`BridgeError`] itself, so a supervisor using
/// `catch_unwind` can downcast it and read the engine's message.
pub fn escalate(err: BridgeError) -> ! {
    std::panic::panic_any(err)
}

/// A tuple of function arguments.
pub trait Args: Sized {
    fn describe() -> Vec<TypeDesc>;
    fn into_hosts(self) -> Vec<HostValue>;
    fn from_hosts(values: Vec<HostValue>) -> Result<Self, BridgeError>;
}

/// Result types of [`crate::Interpreter::eval`]: `()`, one value or a tuple.
pub trait Outputs: Sized {
    fn describe() -> Vec<TypeDesc>;
    fn from_hosts(values: Vec<HostValue>) -> Result<Self, BridgeError>;
}

/// Return types of bridged functions.
pub trait Returns: Sized {
    /// Output types, and whether a trailing error slot is declared.
    fn shape() -> (Vec<TypeDesc>, bool);

    /// Builds the value a host caller sees. Errors go to the error slot when
    /// there is one and they are recoverable; otherwise they escalate.
    fn from_outcome(outcome: Result<Vec<HostValue>, BridgeError>) -> Self;

    /// Reflects a host function's return value for the engine.
    fn into_outcome(self) -> Result<Vec<HostValue>, BridgeError>;
}

fn next_value(values: &mut std::vec::IntoIter<HostValue>) -> Result<HostValue, BridgeError> {
    values
        .next()
        .ok_or_else(|| BridgeError::arity("value list", 1, 0))
}

fn check_len(values: &[HostValue], expected: usize) -> Result<(), BridgeError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(BridgeError::arity("value list", expected, values.len()))
    }
}

impl<T: Reflect> Outputs for T {
    fn describe() -> Vec<TypeDesc> {
        vec![<T as Reflect>::describe()]
    }

    fn from_hosts(values: Vec<HostValue>) -> Result<Self, BridgeError> {
        check_len(&values, 1)?;
        T::from_host(next_value(&mut values.into_iter())?)
    }
}

impl<T: Reflect> Returns for T {
    fn shape() -> (Vec<TypeDesc>, bool) {
        (vec![<T as Reflect>::describe()], false)
    }

    fn from_outcome(outcome: Result<Vec<HostValue>, BridgeError>) -> Self {
        match outcome.and_then(<T as Outputs>::from_hosts) {
            Ok(value) => value,
            Err(err) => escalate(err),
        }
    }

    fn into_outcome(self) -> Result<Vec<HostValue>, BridgeError> {
        Ok(vec![self.into_host()])
    }
}

impl<T: Reflect> Returns for Result<T, BridgeError> {
    fn shape() -> (Vec<TypeDesc>, bool) {
        (vec![<T as Reflect>::describe()], true)
    }

    fn from_outcome(outcome: Result<Vec<HostValue>, BridgeError>) -> Self {
        match outcome.and_then(<T as Outputs>::from_hosts) {
            Ok(value) => Ok(value),
            Err(err) if err.is_recoverable() => Err(err),
            Err(err) => escalate(err),
        }
    }

    fn into_outcome(self) -> Result<Vec<HostValue>, BridgeError> {
        self.map(|value| vec![value.into_host()])
    }
}

macro_rules! impl_tuples {
    ($len:expr; $($T:ident $t:ident),*) => {
        impl<$($T: Reflect),*> Args for ($($T,)*) {
            fn describe() -> Vec<TypeDesc> {
                vec![$(<$T as Reflect>::describe()),*]
            }

            #[allow(clippy::unused_unit)]
            fn into_hosts(self) -> Vec<HostValue> {
                let ($($t,)*) = self;
                vec![$($t.into_host()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn from_hosts(values: Vec<HostValue>) -> Result<Self, BridgeError> {
                check_len(&values, $len)?;
                let mut values = values.into_iter();
                Ok(($($T::from_host(next_value(&mut values)?)?,)*))
            }
        }

        impl<$($T: Reflect),*> Outputs for ($($T,)*) {
            fn describe() -> Vec<TypeDesc> {
                <Self as Args>::describe()
            }

            fn from_hosts(values: Vec<HostValue>) -> Result<Self, BridgeError> {
                <Self as Args>::from_hosts(values)
            }
        }

        impl<$($T: Reflect),*> Returns for ($($T,)*) {
            fn shape() -> (Vec<TypeDesc>, bool) {
                (<Self as Args>::describe(), false)
            }

            fn from_outcome(outcome: Result<Vec<HostValue>, BridgeError>) -> Self {
                match outcome.and_then(<Self as Args>::from_hosts) {
                    Ok(value) => value,
                    Err(err) => escalate(err),
                }
            }

            fn into_outcome(self) -> Result<Vec<HostValue>, BridgeError> {
                Ok(self.into_hosts())
            }
        }

        impl<$($T: Reflect),*> Returns for Result<($($T,)*), BridgeError> {
            fn shape() -> (Vec<TypeDesc>, bool) {
                (<($($T,)*) as Args>::describe(), true)
            }

            fn from_outcome(outcome: Result<Vec<HostValue>, BridgeError>) -> Self {
                match outcome.and_then(<($($T,)*) as Args>::from_hosts) {
                    Ok(value) => Ok(value),
                    Err(err) if err.is_recoverable() => Err(err),
                    Err(err) => escalate(err),
                }
            }

            fn into_outcome(self) -> Result<Vec<HostValue>, BridgeError> {
                self.map(Args::into_hosts)
            }
        }
    };
}

impl_tuples!(0;);
impl_tuples!(1; A a);
impl_tuples!(2; A a, B b);
impl_tuples!(3; A a, B b, C c);
impl_tuples!(4; A a, B b, C c, D d);
impl_tuples!(5; A a, B b, C c, D d, E e);
impl_tuples!(6; A a, B b, C c, D d, E e, F f);
impl_tuples!(7; A a, B b, C c, D d, E e, F f, G g);
impl_tuples!(8; A a, B b, C c, D d, E e, F f, G g, H h);
