//! Frame ranges and result file names.
//!
//! # Example
//!
//! ```
//! use farm_core::frames::{self, FrameSet};
//!
//! let set = frames::parse("1-3, 5, 7-8").unwrap();
//! assert_eq!(frames::render(&set), "1-3,5,7,8");
//! assert_eq!(set.to_canonical(), "[[1,3],5,7,8]");
//!
//! let present = ["shot_0001.png", "shot_0002.png"];
//! let missing = frames::missing(&FrameSet::span(1, 3).unwrap(), present, "shot");
//! assert_eq!(missing, FrameSet::single(3));
//! ```

mod files;
mod range;
mod types;

pub use files::{
    average_file_name, frame_file_name, frame_number, is_sample_file, list_file_names, missing,
    present_frames, AVERAGE_MARKER, SEED_MARKER,
};
pub use range::{
    check_items_size, check_size, expand, expanded_len, items_expanded_len, parse, parse_items,
    render, to_items, MAX_EXPANDED_CHARS,
};
pub use types::{FrameRangeError, FrameRangeResult, FrameSet, RangeItem};
