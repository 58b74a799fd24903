//! Lifecycle of durable state across the per-entity stores, all opened on
//! the same database file the way the running bot opens them.

use tempfile::TempDir;

use vibebot::store::{EngagementSample, Stores};

fn sample(post_id: &str, at: i64, likes: i64, retweets: i64) -> EngagementSample {
    EngagementSample {
        post_id: post_id.to_string(),
        retrieved_at: at,
        likes,
        retweets,
        quotes_path: None,
        comments_path: None,
    }
}

#[test]
fn stores_share_one_database_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("vibebot.db");
    let stores = Stores::open(&db).unwrap();

    // one published reply, tracked over three samples
    stores
        .posts
        .add_post("p1", "Reply to tweet: rust is nice", "it really is", true)
        .unwrap();
    stores.engagement.add_sample(&sample("p1", 100, 2, 0)).unwrap();
    stores.engagement.add_sample(&sample("p1", 200, 5, 1)).unwrap();
    stores.engagement.add_sample(&sample("p1", 300, 9, 2)).unwrap();
    stores.replies.add_reply("p1", "r1", true).unwrap();

    // the watermark lives alongside the posts
    stores.posts.advance_watermark("bot", 300).unwrap();

    // reopening the same file sees everything
    drop(stores);
    let stores = Stores::open(&db).unwrap();

    assert_eq!(stores.posts.count_posts().unwrap(), 1);
    assert_eq!(stores.posts.watermark("bot").unwrap(), Some(300));

    let history = stores.engagement.samples_for_post("p1").unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].likes, 9);

    let latest = stores.engagement.latest_samples().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].retrieved_at, 300);

    assert_eq!(stores.replies.reply_counts().unwrap()["p1"], 1);
}

#[test]
fn watermark_survives_reopen_and_stays_monotonic() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("vibebot.db");

    {
        let stores = Stores::open(&db).unwrap();
        stores.posts.advance_watermark("bot", 500).unwrap();
    }

    let stores = Stores::open(&db).unwrap();
    assert_eq!(stores.posts.watermark("bot").unwrap(), Some(500));
    // a stale candidate from a replayed attempt cannot move it back
    assert_eq!(stores.posts.advance_watermark("bot", 400).unwrap(), 500);
}

#[test]
fn checkpoint_log_is_append_only() {
    let dir = TempDir::new().unwrap();
    let stores = Stores::open(&dir.path().join("vibebot.db")).unwrap();

    stores.training.record_checkpoint("ckpt/a", 20).unwrap();
    stores.training.record_checkpoint("ckpt/b", 40).unwrap();
    assert_eq!(
        stores.training.latest_checkpoint().unwrap().as_deref(),
        Some("ckpt/b")
    );
}

#[test]
fn concurrent_store_access_interleaves() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("vibebot.db");
    let stores = std::sync::Arc::new(Stores::open(&db).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let stores = stores.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    let post_id = format!("p{}-{}", w, i);
                    stores
                        .posts
                        .add_post(&post_id, "prompt", "content", true)
                        .unwrap();
                    stores
                        .engagement
                        .add_sample(&sample(&post_id, 100, i, 0))
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(stores.posts.count_posts().unwrap(), 100);
    assert_eq!(stores.engagement.latest_samples().unwrap().len(), 100);
}
