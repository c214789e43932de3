// Truncation Planner
// Head+tail token windowing ahead of the abstractive summarizer

use tracing::debug;

use super::model::{ModelError, Tokenizer};

/// Split a token budget into (head, tail) window sizes: head = floor(0.6 * budget).
pub fn head_tail_window(budget: usize) -> (usize, usize) {
    let head = budget * 3 / 5;
    (head, budget - head)
}

/// Keep the first `head` and last `tail` ids of `ids` when it exceeds `budget`.
/// Returns `None` when nothing needs cutting.
pub fn keep_head_tail<T: Clone>(ids: &[T], budget: usize) -> Option<Vec<T>> {
    if budget == 0 || ids.len() <= budget {
        return None;
    }
    let (head, tail) = head_tail_window(budget);
    let mut kept = Vec::with_capacity(budget);
    kept.extend_from_slice(&ids[..head]);
    kept.extend_from_slice(&ids[ids.len() - tail..]);
    Some(kept)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TruncationPlan {
    Untouched { tokens: usize },
    HeadTail { original_tokens: usize, head: usize, tail: usize },
}

impl TruncationPlan {
    pub fn was_truncated(&self) -> bool {
        matches!(self, Self::HeadTail { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TruncationPlanner {
    budget: usize,
}

impl TruncationPlanner {
    /// A zero budget disables truncation.
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Fit `prompt` into the budget, decoding the kept head and tail windows.
    pub async fn plan<T: Tokenizer + ?Sized>(&self, tokenizer: &T, prompt: &str) -> Result<(String, TruncationPlan), ModelError> {
        let ids = tokenizer.encode(prompt).await?;
        match keep_head_tail(&ids, self.budget) {
            None => Ok((prompt.to_string(), TruncationPlan::Untouched { tokens: ids.len() })),
            Some(kept) => {
                let (head, tail) = head_tail_window(self.budget);
                debug!(
                    original_tokens = ids.len(),
                    head,
                    tail,
                    "summarizer.prompt_truncated"
                );
                let text = tokenizer.decode(&kept).await?;
                Ok((
                    text,
                    TruncationPlan::HeadTail {
                        original_tokens: ids.len(),
                        head,
                        tail,
                    },
                ))
            }
        }
    }
}
