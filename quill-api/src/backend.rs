use async_trait::async_trait;

use crate::{CommentId, CommentRow, NewComment, PostId, Profile, UserId};

/// Persistence collaborator holding comments and profiles
///
/// Errors reported by the backend itself (as opposed to transport failures)
/// are carried as a [`crate::Error`] inside the returned `anyhow::Error`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The authenticated caller, if there is a session
    fn current_user(&self) -> Option<UserId>;

    /// All comments of `post`, newest first
    async fn fetch_comments(&self, post: &PostId) -> anyhow::Result<Vec<CommentRow>>;

    async fn fetch_profiles(&self, ids: &[UserId]) -> anyhow::Result<Vec<Profile>>;

    async fn fetch_comment(&self, id: &CommentId) -> anyhow::Result<Option<CommentRow>>;

    /// Ids of the comments whose parent is one of `parents`
    async fn fetch_reply_ids(&self, parents: &[CommentId]) -> anyhow::Result<Vec<CommentId>>;

    async fn submit_comment(&self, c: NewComment) -> anyhow::Result<CommentRow>;

    async fn delete_comments(&self, ids: &[CommentId]) -> anyhow::Result<()>;
}
