mod comment;
pub use comment::{Author, Comment};

pub mod denormalize;

mod error;
pub use error::{DeletePhase, Error};

mod rest;
pub use rest::{RestBackend, RestConfig, RestSession};

mod store;
pub use store::CommentStore;

mod tree;
pub use tree::{Attach, CommentNode, Forest, Walk};

pub mod api {
    pub use quill_api::*;
}
