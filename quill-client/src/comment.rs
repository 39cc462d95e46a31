use crate::api::{self, CommentId, PostId, Profile, Time, UserId};

/// Display projection of a comment's author, resolved at load time
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Author {
    pub username: String,
    pub avatar_url: String,
}

impl From<Profile> for Author {
    fn from(p: Profile) -> Author {
        Author {
            username: p.username,
            avatar_url: p.avatar_url,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub created_at: Time,
    pub author_id: UserId,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,

    /// None if the author's profile could not be found
    pub author: Option<Author>,
}

impl Comment {
    pub fn from_row(row: api::CommentRow, author: Option<Author>) -> Comment {
        Comment {
            id: row.id,
            content: row.content,
            created_at: row.created_at,
            author_id: row.author_id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            author,
        }
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|a| &a.username as &str)
            .unwrap_or("[unknown]")
    }
}
