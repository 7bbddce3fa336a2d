mod error;
mod heap_file;
mod heap_page;
mod tuple;

pub use error::{HeapError, HeapResult};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use heap_page::HeapPage;
pub use tuple::Tuple;
