//! End-to-end tests over in-memory feeds.

mod mock_feeds;
mod resolver_fallback;
mod live_loop;
