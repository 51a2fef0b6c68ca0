//! Request handlers: the callables stored in the route table.
//!
//! A handler receives the decorated [`Request`], the [`Response`] under construction and the
//! [`Next`] continuation. It either spends the continuation with [`Next::proceed`] so the
//! dispatcher moves on to the next matching entry, or returns [`Flow::halt`] to end the chain.
//!
//! Plain `async fn`s become handlers through [`handler_fn`]:
//!
//! ```
//! use micro_relay::{handler_fn, HandlerResult, Next, Request, Response};
//!
//! async fn log_path(req: &mut Request, _res: &mut Response, next: Next) -> HandlerResult {
//!     println!("{} {}", req.method(), req.path());
//!     Ok(next.proceed())
//! }
//!
//! let _handler = handler_fn(log_path);
//! ```

use crate::dispatch::{Flow, Next};
use crate::{Request, Response};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

/// The error type a handler may fail with.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// What every handler returns.
pub type HandlerResult = Result<Flow, HandlerError>;

/// A type-erased handler as stored in the route table.
pub type BoxedHandler = Box<dyn RequestHandler>;

#[async_trait(?Send)]
pub trait RequestHandler {
    async fn invoke(&self, req: &mut Request, res: &mut Response, next: Next) -> HandlerResult;
}

#[async_trait(?Send)]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, req: &mut Request, res: &mut Response, next: Next) -> HandlerResult {
        (**self).invoke(req, res, next).await
    }
}

#[async_trait(?Send)]
impl<H: RequestHandler + ?Sized> RequestHandler for Rc<H> {
    async fn invoke(&self, req: &mut Request, res: &mut Response, next: Next) -> HandlerResult {
        (**self).invoke(req, res, next).await
    }
}

/// Holds an async function or closure taking `(&mut Request, &mut Response, Next)`.
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &std::any::type_name::<F>()).finish()
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: AsyncFn(&mut Request, &mut Response, Next) -> HandlerResult,
{
    FnHandler { f }
}

#[async_trait(?Send)]
impl<F> RequestHandler for FnHandler<F>
where
    F: AsyncFn(&mut Request, &mut Response, Next) -> HandlerResult,
{
    async fn invoke(&self, req: &mut Request, res: &mut Response, next: Next) -> HandlerResult {
        (self.f)(req, res, next).await
    }
}

/// One or more handlers handed to a single registration call.
///
/// Implemented for any single handler, for tuples of up to eight handlers and for
/// `Vec<BoxedHandler>`. Every handler becomes its own route table entry, in the given order.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<BoxedHandler>;
}

impl<H: RequestHandler + 'static> IntoHandlers for H {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        vec![Box::new(self)]
    }
}

impl IntoHandlers for Vec<BoxedHandler> {
    fn into_handlers(self) -> Vec<BoxedHandler> {
        self
    }
}

macro_rules! impl_into_handlers_for_tuple ({ $($param:ident)* } => {
    impl<$($param,)*> IntoHandlers for ($($param,)*)
    where
        $($param: RequestHandler + 'static,)*
    {
        #[allow(non_snake_case, reason = "tuple fields are bound to their type parameter names")]
        fn into_handlers(self) -> Vec<BoxedHandler> {
            let ($($param,)*) = self;
            vec![$(Box::new($param) as BoxedHandler,)*]
        }
    }
});

impl_into_handlers_for_tuple! { A }
impl_into_handlers_for_tuple! { A B }
impl_into_handlers_for_tuple! { A B C }
impl_into_handlers_for_tuple! { A B C D }
impl_into_handlers_for_tuple! { A B C D E }
impl_into_handlers_for_tuple! { A B C D E F }
impl_into_handlers_for_tuple! { A B C D E F G }
impl_into_handlers_for_tuple! { A B C D E F G H }
