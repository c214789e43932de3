// NLP Module
// Model collaborator seams, prompt handling, truncation and summarization

pub mod model;
pub mod prompts;
pub mod summarizer;
pub mod truncation;

#[cfg(test)]
pub mod testing;

pub use model::{
    EntailmentClassifier, GenerationParams, ModelError, ModelHandle, SentenceDetector, Seq2SeqModel, TextGenerator,
    Tokenizer, ENTAILMENT_INDEX,
};
pub use prompts::{post_summarize, PromptStyle};
pub use summarizer::{extractive_summary, Summarizer};
pub use truncation::{head_tail_window, TruncationPlan, TruncationPlanner};
