mod block_source;
mod handler;
mod stream_store;
mod task_store;

pub use block_source::*;
pub use handler::*;
pub use stream_store::*;
pub use task_store::*;
