use chrono::{Duration, Utc};
use rand::Rng;

const NUM_USERS: usize = 5;
const NUM_POSTS: usize = 4;

const NUM_COMMENTS: usize = 200;
const COMMENT_WORD_COUNT: usize = 25;

// Chance for a comment to reply to an earlier comment of the same post
const REPLY_PROBABILITY: f64 = 0.6;
// Chance for a comment to reference a parent that does not exist
const ORPHAN_PROBABILITY: f64 = 0.02;

fn gen_n_items(table: &str, n: usize, mut f: impl FnMut(usize) -> String) {
    println!("INSERT INTO {} VALUES", table);
    for i in 0..n {
        if i != 0 {
            println!(",");
        }
        print!("    {}", f(i));
    }
    println!();
    println!("ON CONFLICT DO NOTHING;");
}

fn gen_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn main() {
    let mut rng = rand::thread_rng();

    // Generate profiles
    let mut users = Vec::new();
    gen_n_items("profiles", NUM_USERS, |i| {
        let uuid = gen_uuid();
        users.push(uuid.clone());
        let username = format!("{}{}", lipsum::lipsum_words(1).to_lowercase(), i);
        format!(
            "('{}', {}, {})",
            uuid,
            sql_string(&username),
            sql_string(&format!("https://avatars.example/{username}.png")),
        )
    });

    let posts = (0..NUM_POSTS).map(|_| gen_uuid()).collect::<Vec<_>>();

    // Generate comments, oldest first so that parents always come before
    // their replies
    let start = Utc::now() - Duration::days(30);
    let mut per_post: Vec<Vec<String>> = vec![Vec::new(); NUM_POSTS];
    gen_n_items("comments", NUM_COMMENTS, |i| {
        let uuid = gen_uuid();
        let post = rng.gen_range(0..NUM_POSTS);
        let earlier = &per_post[post];
        let parent = if rng.gen_bool(ORPHAN_PROBABILITY) {
            sql_string(&gen_uuid())
        } else if !earlier.is_empty() && rng.gen_bool(REPLY_PROBABILITY) {
            sql_string(&earlier[rng.gen_range(0..earlier.len())])
        } else {
            String::from("NULL")
        };
        let created_at = start + Duration::minutes(10 * i as i64);
        let author = &users[rng.gen_range(0..users.len())];
        let row = format!(
            "('{}', {}, '{}', '{}', '{}', {})",
            uuid,
            sql_string(&lipsum::lipsum_words(COMMENT_WORD_COUNT)),
            created_at.to_rfc3339(),
            author,
            posts[post],
            parent,
        );
        per_post[post].push(uuid);
        row
    });
}
