//! Handler actions and type erasure.
//!
//! # How handler methods are stored
//!
//! Every route points at a method on its own handler type, so the route
//! table has to hold callables of many different types side by side. They
//! are hidden behind one trait object, [`ErasedAction`]:
//!
//! ```text
//! fn list<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<R, Error>>   ← user writes this
//!        ↓ Route::get("/items", Items::list)
//! TypedAction::<Items, _, R>::new(Items::list)                          ← remembers T and R
//!        ↓  stored as BoxedAction = Arc<dyn ErasedAction>
//! action.invoke(&container, call)  at request time
//!        ↓ container.get_instance::<Items>()                            ← fresh instance tree
//!        ↓ Items::list(instance, call).await
//!        ↓ serde_json::to_value(result), or nothing for `()`
//! ```
//!
//! Per request that is one container walk, one virtual call and one
//! serialization of the result.

use std::any::TypeId;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::container::{Container, Injectable};
use crate::error::Error;
use crate::route::Call;

/// A heap-allocated, type-erased future borrowing from the request for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface for one route's handler method.
///
/// Resolves to `None` when the handler returns `()`: the response then
/// goes out without a body.
pub(crate) trait ErasedAction: Send + Sync {
    fn invoke<'a>(&'a self, container: &'a Container, call: Call<'a>) -> BoxFuture<'a, Result<Option<Value>, Error>>;
}

/// A type-erased handler method shared across concurrent requests.
pub(crate) type BoxedAction = Arc<dyn ErasedAction + 'static>;

/// Holds a concrete handler method `F` on type `T` returning `R`, and
/// bridges it to [`ErasedAction`].
pub(crate) struct TypedAction<T, F, R> {
    action: F,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, F, R> TypedAction<T, F, R> {
    pub(crate) fn new(action: F) -> Self {
        Self { action, _marker: PhantomData }
    }
}

impl<T, F, R> ErasedAction for TypedAction<T, F, R>
where
    T: Injectable,
    F: for<'a> Fn(T, Call<'a>) -> BoxFuture<'a, Result<R, Error>> + Send + Sync + 'static,
    R: Serialize + Send + 'static,
{
    fn invoke<'a>(&'a self, container: &'a Container, call: Call<'a>) -> BoxFuture<'a, Result<Option<Value>, Error>> {
        let instance = match container.get_instance::<T>() {
            Ok(instance) => instance,
            Err(e) => return Box::pin(std::future::ready(Err(Error::from(e)))),
        };
        let fut = (self.action)(instance, call);
        Box::pin(async move {
            let result = fut.await?;
            if TypeId::of::<R>() == TypeId::of::<()>() {
                return Ok(None);
            }
            Ok(Some(serde_json::to_value(result)?))
        })
    }
}
