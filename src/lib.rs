pub mod error;
pub mod level;
pub mod record;
pub mod schema;
pub mod transform;
pub mod encoder;
pub mod operation;

pub mod sink;
pub mod pipeline;
pub mod noop_sink;
pub mod memory_sink;
pub mod writer_sink;

pub mod logger;
pub mod layer;
pub mod init;
pub mod env;

pub mod grpc;

pub use level::Level;
pub use logger::Logger;
pub use operation::{Operation, OperationContext};
pub use record::{Field, LogRecord};
pub use schema::{HttpRequest, ServiceContext};
