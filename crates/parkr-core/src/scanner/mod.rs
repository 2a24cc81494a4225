pub mod walk;

pub use walk::{dir_size, newest_mtime, regular_files, RegularFile};
