use std::{collections::HashSet, sync::Arc};

use anyhow::Context;
use parking_lot::Mutex;

use crate::{
    api::{Backend, CommentId, CommentRow, NewComment, PostId},
    denormalize, Attach, Author, Comment, DeletePhase, Error, Forest,
};

/// Comments of one post, kept in sync with the backend
///
/// The forest is replaced as a whole on every change, so snapshots returned
/// by [`CommentStore::forest`] are never seen half-updated.
pub struct CommentStore<B> {
    backend: B,
    post: PostId,
    state: Mutex<State>,
}

struct State {
    forest: Arc<Forest>,
    count: usize,

    /// Bumped when a load starts and at every commit, a load may only
    /// commit if it did not move in the meantime
    generation: u64,
}

impl State {
    fn commit(&mut self, forest: Forest) {
        self.generation += 1;
        self.count = forest.count_all();
        self.forest = Arc::new(forest);
    }
}

impl<B: Backend> CommentStore<B> {
    pub fn new(backend: B, post: PostId) -> CommentStore<B> {
        CommentStore {
            backend,
            post,
            state: Mutex::new(State {
                forest: Arc::new(Forest::new()),
                count: 0,
                generation: 0,
            }),
        }
    }

    pub fn forest(&self) -> Arc<Forest> {
        self.state.lock().forest.clone()
    }

    /// Total number of comments currently in the forest
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    /// Replaces the forest with the post's comments as currently stored
    ///
    /// On failure the previous forest is kept. If the forest changed or
    /// another load was started while this one was in flight, this one's
    /// result (or error) is discarded.
    pub async fn load(&self) -> Result<(), Error> {
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.generation
        };
        let fetched = self.fetch().await;
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(
                post = %self.post,
                generation,
                latest = state.generation,
                failed = fetched.is_err(),
                "discarding stale comment load"
            );
            return Ok(());
        }
        let forest = Forest::build(fetched.map_err(Error::FetchFailed)?);
        state.commit(forest);
        tracing::debug!(post = %self.post, count = state.count, "loaded comments");
        Ok(())
    }

    async fn fetch(&self) -> anyhow::Result<Vec<Comment>> {
        let rows = self
            .backend
            .fetch_comments(&self.post)
            .await
            .with_context(|| format!("fetching comments of post {}", self.post))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = self
            .backend
            .fetch_profiles(&denormalize::author_ids(&rows))
            .await
            .context("fetching comment authors")?;
        Ok(denormalize::denormalize(rows, profiles))
    }

    /// Adds a comment the backend already stored, without refetching
    ///
    /// Returns false if the comment was not added: it belongs to another
    /// post, is already there, or replies to a comment no longer in the
    /// forest (it will show up again on the next load).
    pub fn attach(&self, row: CommentRow, author: Option<Author>) -> bool {
        self.attach_comment(Comment::from_row(row, author))
    }

    fn attach_comment(&self, comment: Comment) -> bool {
        if comment.post_id != self.post {
            tracing::warn!(comment = %comment.id, post = %comment.post_id, "refusing to attach comment of another post");
            return false;
        }
        let id = comment.id.clone();
        let mut state = self.state.lock();
        let attached = state.forest.with_inserted(comment);
        match attached {
            Attach::Attached(forest) => {
                state.commit(forest);
                true
            }
            Attach::AlreadyPresent => {
                tracing::debug!(comment = %id, "comment already in forest");
                false
            }
            Attach::ParentMissing => {
                tracing::warn!(comment = %id, "parent of new reply is gone, dropping it until next load");
                false
            }
        }
    }

    /// Posts a new comment as the current user, then adds it to the forest
    ///
    /// `author` is the current user's own display projection.
    pub async fn submit(
        &self,
        content: String,
        parent: Option<CommentId>,
        author: Author,
    ) -> Result<Comment, Error> {
        let user = self.backend.current_user().ok_or(Error::Unauthorized)?;
        let new = NewComment::new(self.post.clone(), parent, user, content);
        new.validate()?;
        let row = self
            .backend
            .submit_comment(new)
            .await
            .map_err(Error::SubmitFailed)?;
        let comment = Comment::from_row(row, Some(author));
        self.attach_comment(comment.clone());
        Ok(comment)
    }

    /// Deletes one of the current user's comments along with all its replies
    ///
    /// Returns the number of comments removed from the forest. The forest is
    /// left untouched unless the backend deletion fully succeeded.
    pub async fn delete(&self, id: &CommentId) -> Result<usize, Error> {
        let user = self.backend.current_user().ok_or(Error::Unauthorized)?;
        let stored = self
            .backend
            .fetch_comment(id)
            .await
            .with_context(|| format!("fetching comment {id}"))
            .map_err(Error::FetchFailed)?;
        match stored {
            None => {
                tracing::info!(comment = %id, "comment already deleted from backend");
                return Ok(self.remove_local(id));
            }
            Some(row) if row.post_id != self.post => {
                tracing::warn!(comment = %id, post = %row.post_id, "refusing to delete comment of another post");
                return Err(Error::Forbidden);
            }
            Some(row) if row.author_id != user => return Err(Error::Forbidden),
            Some(_) => (),
        }

        let replies = self
            .collect_replies(id)
            .await
            .map_err(Error::delete_failed(DeletePhase::Replies))?;
        if !replies.is_empty() {
            self.backend
                .delete_comments(&replies)
                .await
                .with_context(|| format!("deleting {} replies of comment {id}", replies.len()))
                .map_err(Error::delete_failed(DeletePhase::Replies))?;
        }
        self.backend
            .delete_comments(std::slice::from_ref(id))
            .await
            .with_context(|| format!("deleting comment {id}"))
            .map_err(Error::delete_failed(DeletePhase::Target))?;
        tracing::info!(comment = %id, replies = replies.len(), "deleted comment");

        Ok(self.remove_local(id))
    }

    /// Ids of all the comments below `id`, at any depth
    async fn collect_replies(&self, id: &CommentId) -> anyhow::Result<Vec<CommentId>> {
        let mut seen = HashSet::new();
        seen.insert(id.clone());
        let mut res = Vec::new();
        let mut frontier = vec![id.clone()];
        while !frontier.is_empty() {
            let replies = self
                .backend
                .fetch_reply_ids(&frontier)
                .await
                .with_context(|| format!("listing replies below comment {id}"))?;
            frontier = replies
                .into_iter()
                .filter(|r| seen.insert(r.clone()))
                .collect();
            res.extend(frontier.iter().cloned());
        }
        Ok(res)
    }

    fn remove_local(&self, id: &CommentId) -> usize {
        let mut state = self.state.lock();
        let removed = state.forest.without(id);
        match removed {
            Some((forest, n)) => {
                state.commit(forest);
                n
            }
            None => 0,
        }
    }
}
