use std::{collections::HashMap, fmt, sync::Arc};

use crate::{api::CommentId, Comment};

#[derive(Clone)]
pub struct CommentNode {
    pub comment: Comment,

    /// Replies, in creation order descending (comments attached during the
    /// session are put first regardless of their timestamp)
    pub children: Vec<Arc<CommentNode>>,
}

impl CommentNode {
    pub fn new(comment: Comment) -> CommentNode {
        CommentNode {
            comment,
            children: Vec::new(),
        }
    }

    /// Number of comments in this subtree, this one included
    pub fn count(&self) -> usize {
        let mut res = 0;
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            res += 1;
            stack.extend(n.children.iter().map(|c| &**c));
        }
        res
    }

    /// Depth-first traversal of this subtree, starting with this comment at
    /// depth 0
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(0, self)],
        }
    }
}

// Reply chains have no depth limit, so everything below walks the tree
// instead of recursing: derived impls and the default drop could exhaust the
// stack

impl PartialEq for CommentNode {
    fn eq(&self, other: &CommentNode) -> bool {
        self.walk()
            .map(|(d, n)| (d, &n.comment))
            .eq(other.walk().map(|(d, n)| (d, &n.comment)))
    }
}

impl Eq for CommentNode {}

impl fmt::Debug for CommentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.walk().map(|(d, n)| (d, &n.comment)))
            .finish()
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                pending.append(&mut node.children);
            }
        }
    }
}

/// Outcome of attaching a single comment to a forest
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Attach {
    Attached(Forest),

    /// A comment with this id is already in the forest
    AlreadyPresent,

    /// The comment is a reply to a comment that is not in the forest
    ParentMissing,
}

/// Ordered set of comment trees, one per top-level comment
///
/// A forest is never mutated in place: every change returns a new forest,
/// which shares with the previous one all the subtrees the change did not
/// go through.
#[derive(Clone, Default)]
pub struct Forest {
    roots: Vec<Arc<CommentNode>>,
}

impl PartialEq for Forest {
    fn eq(&self, other: &Forest) -> bool {
        self.walk()
            .map(|(d, n)| (d, &n.comment))
            .eq(other.walk().map(|(d, n)| (d, &n.comment)))
    }
}

impl Eq for Forest {}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.walk().map(|(d, n)| (d, &n.comment)))
            .finish()
    }
}

impl Forest {
    pub fn new() -> Forest {
        Forest { roots: Vec::new() }
    }

    /// Reassembles a flat list of comments into trees
    ///
    /// Every comment ends up exactly once in the result. Comments whose parent
    /// is not part of `comments` become roots, and so do comments caught in a
    /// parent cycle. Siblings keep their relative order from `comments`.
    pub fn build(comments: Vec<Comment>) -> Forest {
        let mut index = HashMap::with_capacity(comments.len());
        let mut unique = Vec::with_capacity(comments.len());
        for c in comments {
            if index.contains_key(&c.id) {
                tracing::warn!(comment = %c.id, "duplicate comment id, keeping first occurrence");
                continue;
            }
            index.insert(c.id.clone(), unique.len());
            unique.push(c);
        }
        let n = unique.len();

        let mut parent = unique
            .iter()
            .enumerate()
            .map(|(i, c)| {
                c.parent_id
                    .as_ref()
                    .and_then(|p| index.get(p))
                    .copied()
                    .filter(|&p| p != i)
            })
            .collect::<Vec<_>>();
        let mut children = vec![Vec::new(); n];
        for (i, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        let mut roots = (0..n).filter(|&i| parent[i].is_none()).collect::<Vec<_>>();
        let mut reached = vec![false; n];
        let mut order = Vec::with_capacity(n);
        preorder(&roots, &children, &mut reached, &mut order);
        for i in 0..n {
            if reached[i] {
                continue;
            }
            // i is not below any root, so its ancestors loop
            tracing::warn!(comment = %unique[i].id, "comment is part of a parent cycle, promoting it to root");
            if let Some(p) = parent[i].take() {
                children[p].retain(|&c| c != i);
            }
            roots.push(i);
            preorder(&[i], &children, &mut reached, &mut order);
        }

        // children come after their parent in `order`, so build bottom-up
        let mut comments = unique.into_iter().map(Some).collect::<Vec<_>>();
        let mut nodes: Vec<Option<Arc<CommentNode>>> = vec![None; n];
        for &i in order.iter().rev() {
            let kids = children[i]
                .iter()
                .filter_map(|&c| nodes[c].take())
                .collect();
            if let Some(comment) = comments[i].take() {
                nodes[i] = Some(Arc::new(CommentNode {
                    comment,
                    children: kids,
                }));
            }
        }
        Forest {
            roots: roots.iter().filter_map(|&i| nodes[i].take()).collect(),
        }
    }

    pub fn roots(&self) -> &[Arc<CommentNode>] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of comments, replies included
    pub fn count_all(&self) -> usize {
        self.roots.iter().map(|r| r.count()).sum()
    }

    /// Depth-first traversal yielding each comment with its nesting depth
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.roots.iter().rev().map(|r| (0, &**r)).collect(),
        }
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        self.walk()
            .find(|(_, n)| n.comment.id == *id)
            .map(|(_, n)| n)
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.find(id).is_some()
    }

    /// Returns the forest with `comment` added first among its siblings
    pub fn with_inserted(&self, comment: Comment) -> Attach {
        if self.contains(&comment.id) {
            return Attach::AlreadyPresent;
        }
        let mut res = self.clone();
        let siblings = match &comment.parent_id {
            None => &mut res.roots,
            Some(parent) => match self.locate(parent) {
                None => return Attach::ParentMissing,
                Some(path) => level_mut(&mut res.roots, &path),
            },
        };
        siblings.insert(0, Arc::new(CommentNode::new(comment)));
        Attach::Attached(res)
    }

    /// Returns the forest without comment `id` and all its replies, along
    /// with the number of comments removed
    pub fn without(&self, id: &CommentId) -> Option<(Forest, usize)> {
        let path = self.locate(id)?;
        let (&pos, parents) = path.split_last()?;
        let mut res = self.clone();
        let removed = level_mut(&mut res.roots, parents).remove(pos);
        Some((res, removed.count()))
    }

    /// Positions, from the roots down, leading to comment `id`
    fn locate(&self, id: &CommentId) -> Option<Vec<usize>> {
        // (index in `visited` of the parent, position among its siblings)
        let mut visited: Vec<(Option<usize>, usize)> = Vec::new();
        let mut stack = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(pos, n)| (&**n, None, pos))
            .collect::<Vec<_>>();
        while let Some((node, parent, pos)) = stack.pop() {
            let here = visited.len();
            visited.push((parent, pos));
            if node.comment.id == *id {
                let mut path = Vec::new();
                let mut cur = Some(here);
                while let Some(i) = cur {
                    let (parent, pos) = visited[i];
                    path.push(pos);
                    cur = parent;
                }
                path.reverse();
                return Some(path);
            }
            stack.extend(
                node.children
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(pos, c)| (&**c, Some(here), pos)),
            );
        }
        None
    }
}

/// Sibling list reached by following `path`, copying the nodes on the way
/// if they are shared
fn level_mut<'a>(
    roots: &'a mut Vec<Arc<CommentNode>>,
    path: &[usize],
) -> &'a mut Vec<Arc<CommentNode>> {
    let mut level = roots;
    for &pos in path {
        level = &mut Arc::make_mut(&mut level[pos]).children;
    }
    level
}

fn preorder(starts: &[usize], children: &[Vec<usize>], reached: &mut [bool], order: &mut Vec<usize>) {
    let mut stack = starts.iter().rev().copied().collect::<Vec<_>>();
    while let Some(i) = stack.pop() {
        reached[i] = true;
        order.push(i);
        stack.extend(children[i].iter().rev());
    }
}

pub struct Walk<'a> {
    stack: Vec<(usize, &'a CommentNode)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a CommentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, &**c)));
        Some((depth, node))
    }
}
