mod client;
pub mod prompts;
mod similarity;
mod summarizer;
mod translate;

pub use client::ChatClient;
pub use similarity::{parse_verdict, LlmSimilarity, SimilarityService, SimilarityVerdict};
pub use summarizer::{extract_summary, strip_preamble, GenerativeSummarizer, LlmSummarizer};
pub use translate::{LlmTranslator, Translator};
