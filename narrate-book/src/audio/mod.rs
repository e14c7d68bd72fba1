//! Audio assembly: per-chapter synthesis, the book timeline, and M4B muxing.

pub mod assembler;
pub mod metadata;
pub mod mux;
pub mod segment;
pub mod timeline;

pub use assembler::ChapterAssembler;
pub use metadata::ContainerTags;
pub use mux::{ContainerMuxer, FfmpegTool};
pub use segment::{AudioFormat, AudioSegment};
