//! Text processing for narration: cleaning and sentence segmentation.

mod cleaner;
pub mod segmenter;

pub use cleaner::clean_text;
pub use segmenter::segment;
