//! Model edits that enter the history.

pub mod delete;
pub mod split;

pub use delete::{DeleteCmd, delete_track, is_last_track, restore_track};
pub use split::{SplitCmd, merge_back, split_track};
