/// OBS websocket scene feed.
pub mod feed;
pub mod protocol;
