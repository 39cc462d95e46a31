use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::channel::oneshot;
use parking_lot::Mutex;
use quill_api::{
    Backend, CommentId, CommentRow, Error, NewComment, PostId, Profile, Time, UserId,
};
use uuid::Uuid;

// Comments created by the mock are one second apart, starting from there
const EPOCH_SECS: i64 = 1_700_000_000;

/// Backend operations, for fault injection and call accounting
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MockOp {
    FetchComments,
    FetchProfiles,
    FetchComment,
    FetchReplyIds,
    SubmitComment,
    DeleteComments,
}

/// In-memory stand-in for the hosted backend
///
/// Clones share the same tables, so a test can keep a handle to inspect
/// the state while a `CommentStore` owns a session.
#[derive(Clone, Default)]
pub struct MockServer(Arc<Mutex<Tables>>);

#[derive(Default)]
struct Tables {
    comments: Vec<CommentRow>,
    profiles: BTreeMap<UserId, Profile>,
    clock: i64,
    failures: HashMap<MockOp, usize>,
    calls: HashMap<MockOp, usize>,
    held_fetch: Option<oneshot::Receiver<()>>,
}

impl Tables {
    fn now(&mut self) -> Time {
        self.clock += 1;
        Utc.timestamp_opt(EPOCH_SECS + self.clock, 0).unwrap()
    }

    fn insert(&mut self, c: NewComment) -> CommentRow {
        let row = CommentRow {
            id: CommentId(Uuid::new_v4().to_string()),
            content: c.content,
            created_at: self.now(),
            author_id: c.author_id,
            post_id: c.post_id,
            parent_id: c.parent_id,
        };
        self.comments.push(row.clone());
        row
    }

    fn enter(&mut self, op: MockOp) -> anyhow::Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        if let Some(remaining) = self.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!("injected failure for {op:?}"));
            }
        }
        Ok(())
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn admin_create_user(&self, username: &str) -> UserId {
        let id = UserId(Uuid::new_v4().to_string());
        self.0.lock().profiles.insert(
            id.clone(),
            Profile {
                id: id.clone(),
                username: String::from(username),
                avatar_url: format!("https://avatars.example/{username}.png"),
            },
        );
        id
    }

    /// Inserts a comment without any check, for setting up test states the
    /// backend would normally refuse (eg. replies to missing comments)
    pub fn seed(
        &self,
        post: &PostId,
        parent: Option<&CommentId>,
        author: &UserId,
        content: &str,
    ) -> CommentRow {
        self.0.lock().insert(NewComment::new(
            post.clone(),
            parent.cloned(),
            author.clone(),
            String::from(content),
        ))
    }

    pub fn session(&self, user: Option<UserId>) -> MockBackend {
        MockBackend {
            server: self.clone(),
            user,
        }
    }

    /// All stored comments, in insertion order
    pub fn rows(&self) -> Vec<CommentRow> {
        self.0.lock().comments.clone()
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.0.lock().comments.iter().any(|c| c.id == *id)
    }

    /// Makes the next call to `op` fail
    pub fn fail_next(&self, op: MockOp) {
        *self.0.lock().failures.entry(op).or_insert(0) += 1;
    }

    /// Number of calls to `op` so far, failed ones included
    pub fn calls(&self, op: MockOp) -> usize {
        self.0.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// The next comment fetch reads the table immediately but only returns
    /// once the returned sender fires (or is dropped)
    pub fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.0.lock().held_fetch = Some(receiver);
        sender
    }
}

pub struct MockBackend {
    server: MockServer,
    user: Option<UserId>,
}

impl MockBackend {
    fn enter(&self, op: MockOp) -> anyhow::Result<()> {
        self.server.0.lock().enter(op)
    }

    fn require_user(&self) -> anyhow::Result<&UserId> {
        self.user
            .as_ref()
            .ok_or_else(|| anyhow::Error::new(Error::PermissionDenied))
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }

    async fn fetch_comments(&self, post: &PostId) -> anyhow::Result<Vec<CommentRow>> {
        let (mut rows, gate) = {
            let mut t = self.server.0.lock();
            t.enter(MockOp::FetchComments)?;
            let rows = t
                .comments
                .iter()
                .filter(|c| c.post_id == *post)
                .cloned()
                .collect::<Vec<_>>();
            (rows, t.held_fetch.take())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn fetch_profiles(&self, ids: &[UserId]) -> anyhow::Result<Vec<Profile>> {
        let mut t = self.server.0.lock();
        t.enter(MockOp::FetchProfiles)?;
        Ok(ids
            .iter()
            .filter_map(|id| t.profiles.get(id))
            .cloned()
            .collect())
    }

    async fn fetch_comment(&self, id: &CommentId) -> anyhow::Result<Option<CommentRow>> {
        let mut t = self.server.0.lock();
        t.enter(MockOp::FetchComment)?;
        Ok(t.comments.iter().find(|c| c.id == *id).cloned())
    }

    async fn fetch_reply_ids(&self, parents: &[CommentId]) -> anyhow::Result<Vec<CommentId>> {
        let mut t = self.server.0.lock();
        t.enter(MockOp::FetchReplyIds)?;
        let parents = parents.iter().collect::<HashSet<_>>();
        Ok(t.comments
            .iter()
            .filter(|c| c.parent_id.as_ref().map_or(false, |p| parents.contains(p)))
            .map(|c| c.id.clone())
            .collect())
    }

    async fn submit_comment(&self, c: NewComment) -> anyhow::Result<CommentRow> {
        self.enter(MockOp::SubmitComment)?;
        let user = self.require_user()?;
        if c.author_id != *user {
            return Err(anyhow::Error::new(Error::PermissionDenied));
        }
        c.validate()?;
        let mut t = self.server.0.lock();
        if let Some(parent) = &c.parent_id {
            if !t.comments.iter().any(|p| p.id == *parent) {
                return Err(anyhow::Error::new(Error::UnknownParent(parent.clone())));
            }
        }
        Ok(t.insert(c))
    }

    async fn delete_comments(&self, ids: &[CommentId]) -> anyhow::Result<()> {
        self.enter(MockOp::DeleteComments)?;
        self.require_user()?;
        let ids = ids.iter().collect::<HashSet<_>>();
        self.server
            .0
            .lock()
            .comments
            .retain(|c| !ids.contains(&c.id));
        Ok(())
    }
}
