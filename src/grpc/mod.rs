//! Logging interceptors for gRPC servers built on `tonic`.
//!
//! Every intercepted call produces two correlated entries: a debug entry
//! when the call arrives and one entry when the call completes, at a
//! severity chosen from the returned status.

mod call;
mod interceptor;
mod outcome;

pub use call::{describe, split_method, CallInfo, USER_AGENT};
pub use interceptor::{
    stream_server_interceptor, unary_server_interceptor, CallKind, ObservedStream,
    StreamServerInterceptor, UnaryServerInterceptor,
};
pub use outcome::{Classify, Outcome};
