//! Joining comment rows against the separately-fetched author profiles

use std::collections::{HashMap, HashSet};

use crate::{
    api::{CommentRow, Profile, UserId},
    Author, Comment,
};

/// Distinct author ids of `rows`, in order of first appearance
pub fn author_ids(rows: &[CommentRow]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(&r.author_id))
        .map(|r| r.author_id.clone())
        .collect()
}

pub fn denormalize(rows: Vec<CommentRow>, profiles: Vec<Profile>) -> Vec<Comment> {
    let authors = profiles
        .into_iter()
        .map(|p| (p.id.clone(), Author::from(p)))
        .collect::<HashMap<_, _>>();
    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned();
            if author.is_none() {
                tracing::warn!(comment = %row.id, author = %row.author_id, "no profile for comment author");
            }
            Comment::from_row(row, author)
        })
        .collect()
}
