//! File discovery: recursive traversal of the source and target trees.

pub mod walker;
