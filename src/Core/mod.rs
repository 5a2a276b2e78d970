pub mod SharedMemory;
pub mod alloc;

pub use SharedMemory::{
    attach_shared_memory, create_heap_memory, create_shared_memory, RawHandle,
    SharedMemoryBackend,
};
