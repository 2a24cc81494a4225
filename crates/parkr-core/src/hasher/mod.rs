pub mod tree;

pub use tree::{hash_file, hash_tree};
