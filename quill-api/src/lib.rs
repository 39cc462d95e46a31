use chrono::Utc;

mod backend;
pub use backend::Backend;

mod comment;
pub use comment::{CommentId, CommentRow, NewComment, PostId};

mod error;
pub use error::Error;

mod user;
pub use user::{Profile, UserId};

pub type Time = chrono::DateTime<Utc>;

fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}
