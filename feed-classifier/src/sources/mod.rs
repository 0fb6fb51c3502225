pub mod bluesky_feed;
pub mod static_feed;

pub use bluesky_feed::{BlueskyCredentials, BlueskyFeedSource};
pub use static_feed::StaticFeedSource;
