pub mod embedding;
pub mod identity;
pub mod task;
pub mod text;

pub use embedding::{ModelVersion, content_hash};
pub use identity::CallerIdentity;
pub use task::{ParseTaskFieldError, Priority, TaskRecord, TaskStatus};
pub use text::{TextRejection, normalize_text};
