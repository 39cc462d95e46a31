use std::fmt;

use crate::{Error, Time, UserId};

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(id: impl Into<String>) -> CommentId {
        CommentId(id.into())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> PostId {
        PostId(id.into())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A comment exactly as the backend stores it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentRow {
    pub id: CommentId,
    pub content: String,
    pub created_at: Time,
    pub author_id: UserId,
    pub post_id: PostId,

    /// None for top-level comments
    pub parent_id: Option<CommentId>,
}

/// Insertion payload, the backend fills in `id` and `created_at`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
}

impl NewComment {
    pub fn new(
        post_id: PostId,
        parent_id: Option<CommentId>,
        author_id: UserId,
        content: String,
    ) -> NewComment {
        NewComment {
            content,
            post_id,
            parent_id,
            author_id,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.content)?;
        crate::validate_string(&self.post_id.0)?;
        crate::validate_string(&self.author_id.0)?;
        if let Some(parent) = &self.parent_id {
            crate::validate_string(&parent.0)?;
        }
        if self.content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_comment(content: &str) -> NewComment {
        NewComment::new(
            PostId::new("post"),
            None,
            UserId::new("alice"),
            String::from(content),
        )
    }

    #[test]
    fn validate_rejects_blank_content() {
        assert_eq!(new_comment("").validate(), Err(Error::EmptyContent));
        assert_eq!(new_comment(" \n\t ").validate(), Err(Error::EmptyContent));
        assert_eq!(new_comment("  hello ").validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_null_bytes() {
        assert_eq!(
            new_comment("foo\0bar").validate(),
            Err(Error::NullByteInString(String::from("foo\0bar"))),
        );
        let mut c = new_comment("fine");
        c.parent_id = Some(CommentId::new("a\0"));
        assert_eq!(
            c.validate(),
            Err(Error::NullByteInString(String::from("a\0")))
        );
    }

    #[test]
    fn row_keeps_backend_field_names() {
        let json = serde_json::json!({
            "id": "c1",
            "content": "first!",
            "created_at": "2023-04-01T10:00:00.123456+00:00",
            "author_id": "u1",
            "post_id": "p1",
            "parent_id": null,
        });
        let row: CommentRow = serde_json::from_value(json.clone()).expect("parsing comment row");
        assert_eq!(row.id, CommentId::new("c1"));
        assert_eq!(row.parent_id, None);
        let back = serde_json::to_value(&row).expect("serializing comment row");
        for field in ["id", "content", "created_at", "author_id", "post_id", "parent_id"] {
            assert!(back.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(back["post_id"], "p1");
    }
}
