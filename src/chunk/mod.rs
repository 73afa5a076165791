//! Chunkers that split payloads into provider-safe units.
//!
//! Pure functions: text by word or sentence boundary, audio by fixed duration.

pub mod audio;
pub mod text;

pub use audio::{AudioClip, chunk_audio};
pub use text::{chunk_sentences, chunk_text, split_sentences};
