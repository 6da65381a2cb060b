pub mod api;
pub mod memory;
pub mod model;

pub use api::RpcApi;
pub use memory::MemoryChain;
pub use model::*;
