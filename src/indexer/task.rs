use crate::filepath::FileId;
use crate::project::ProjectPartId;
use std::sync::Arc;

/// Request to (re)index one file with the compile arguments of its owning part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingTask {
    pub file_id: FileId,
    pub project_part: ProjectPartId,
    pub arguments: Arc<[String]>,
}

impl IndexingTask {
    pub fn new(file_id: FileId, project_part: ProjectPartId, arguments: Vec<String>) -> Self {
        Self {
            file_id,
            project_part,
            arguments: arguments.into(),
        }
    }

    /// Task sharing an already allocated argument list
    pub fn with_shared_arguments(file_id: FileId, project_part: ProjectPartId, arguments: Arc<[String]>) -> Self {
        Self {
            file_id,
            project_part,
            arguments,
        }
    }
}
