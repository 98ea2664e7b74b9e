mod block_vec;
pub use block_vec::{BlockVec, PageRef, PageRefMut};
