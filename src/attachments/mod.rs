mod storage;

pub use storage::{AttachmentStorage, AttachmentStorageError, digest};
