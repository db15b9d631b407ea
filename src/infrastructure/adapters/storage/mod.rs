//! Storage Adapter - 产物存储实现

mod file_artifact_store;

pub use file_artifact_store::FileArtifactStore;
