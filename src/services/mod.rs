pub mod passage_provider;
pub mod progress;
pub mod sentence_split;
pub mod speech_provider;
