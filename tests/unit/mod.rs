//! Unit tests - fragment edge cases through the public compile surface
//! and the file-backed metadata cache.
