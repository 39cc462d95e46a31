use anyhow::Context;
use quill_client::{
    api::{Backend, CommentId, PostId, UserId},
    Author, CommentStore, RestBackend, RestConfig, RestSession,
};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the backend
    #[structopt(long, env = "QUILL_URL")]
    url: String,

    /// Public api key of the backend
    #[structopt(long, env = "QUILL_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    /// Access token of the logged-in user, needed for writes
    #[structopt(long, env = "QUILL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Id of the logged-in user
    #[structopt(long, env = "QUILL_USER_ID")]
    user_id: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the comments of a post
    Show {
        /// Post id
        post: String,
    },

    /// Comment on a post
    Comment {
        /// Post id
        post: String,

        /// Comment text
        text: String,

        /// Id of the comment to reply to
        #[structopt(long)]
        reply_to: Option<String>,
    },

    /// Delete a comment and all its replies
    Delete {
        /// Post id
        post: String,

        /// Comment id
        id: String,
    },
}

impl Opt {
    fn backend(&self) -> RestBackend {
        let session = match (&self.access_token, &self.user_id) {
            (Some(token), Some(user)) => Some(RestSession {
                user: UserId::new(user.clone()),
                access_token: token.clone(),
            }),
            (None, None) => None,
            _ => {
                tracing::warn!("--access-token and --user-id go together, ignoring the lone one");
                None
            }
        };
        RestBackend::new(
            RestConfig::new(self.url.clone(), self.anon_key.clone()),
            session,
        )
    }
}

fn print_forest(store: &CommentStore<RestBackend>) {
    let forest = store.forest();
    for (depth, node) in forest.walk() {
        let c = &node.comment;
        println!(
            "{:indent$}{} at {} [{}]",
            "",
            c.author_name(),
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.id,
            indent = depth * 4,
        );
        for line in c.content.lines() {
            println!("{:indent$}  {}", "", line, indent = depth * 4);
        }
    }
    println!("{} comments", store.count());
}

/// The logged-in user's own profile, used as author of their new comments
async fn own_author(backend: &RestBackend) -> anyhow::Result<Author> {
    let user = backend
        .current_user()
        .context("posting requires --access-token and --user-id")?;
    let profile = backend
        .fetch_profiles(std::slice::from_ref(&user))
        .await
        .context("fetching own profile")?
        .into_iter()
        .next();
    Ok(match profile {
        Some(p) => Author::from(p),
        None => {
            tracing::warn!(user = %user, "no profile for logged-in user");
            Author {
                username: user.0,
                avatar_url: String::new(),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let backend = opt.backend();

    match opt.cmd {
        Command::Show { post } => {
            let store = CommentStore::new(backend, PostId::new(post));
            store.load().await?;
            print_forest(&store);
        }
        Command::Comment {
            post,
            text,
            reply_to,
        } => {
            let author = own_author(&backend).await?;
            let store = CommentStore::new(backend, PostId::new(post));
            let comment = store
                .submit(text, reply_to.map(CommentId::new), author)
                .await?;
            println!("posted comment {}", comment.id);
        }
        Command::Delete { post, id } => {
            let store = CommentStore::new(backend, PostId::new(post));
            store.load().await?;
            match store.delete(&CommentId::new(id)).await {
                Ok(removed) => println!("deleted {removed} comments"),
                Err(e) if e.partial_deletion() => {
                    return Err(anyhow::Error::new(e)
                        .context("some replies were deleted but the comment was not"))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
