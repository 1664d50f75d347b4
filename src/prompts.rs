//! Prompt templates for the agent conversations.
//!
//! The structural obligations matter more than the wording: every task
//! prompt names the algorithm and instructs a single fenced code block
//! as the entire reply. The format instruction is not enforced here; the
//! code extractor's fallback is the safety net when an agent ignores it.

use crate::exercise::{Exercise, RunKind};

/// Prompt for an `implement`-kind run.
const IMPLEMENT_PROMPT: &str = r#"Implement the algorithm "{name}".

Reply with a single fenced code block containing the complete
implementation as a function named `{entry}`. The code block must be
your entire reply; do not add any explanation before or after it."#;

/// Prompt for a `review`-kind run.
const REVIEW_PROMPT: &str = r#"Review the following implementation of the algorithm "{name}" and
submit your corrected version.

{seed}

Reply with a single fenced code block containing the full corrected
implementation as a function named `{entry}`. The code block must be
your entire reply; do not add any explanation before or after it."#;

/// Loop-closing message sent after a feedback round.
const FEEDBACK_MESSAGE: &str = r#"Here is mentoring feedback on your "{name}" submission.

Your code:
{code}

Feedback:
{mentoring}"#;

/// Builds the task prompt for an exercise.
pub fn task_prompt(exercise: &Exercise) -> String {
    match exercise.kind {
        RunKind::Implement => IMPLEMENT_PROMPT
            .replace("{name}", &exercise.name)
            .replace("{entry}", &exercise.entry_point),
        RunKind::Review => REVIEW_PROMPT
            .replace("{name}", &exercise.name)
            .replace("{entry}", &exercise.entry_point)
            .replace("{seed}", exercise.seed_code.as_deref().unwrap_or("")),
    }
}

/// Builds the composed message that closes the feedback loop.
pub fn feedback_message(name: &str, code: &str, mentoring: &str) -> String {
    FEEDBACK_MESSAGE
        .replace("{name}", name)
        .replace("{code}", code)
        .replace("{mentoring}", mentoring)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(kind: RunKind, seed: Option<&str>) -> Exercise {
        Exercise {
            id: 1,
            name: "Binary Search".to_string(),
            entry_point: "binary_search".to_string(),
            kind,
            seed_code: seed.map(|s| s.to_string()),
            conflicting: false,
            retry_after_feedback: false,
            task_uid: "uid".to_string(),
            conflict_uid: None,
            feedback_uid: None,
            statement: None,
            reference: None,
            tests: None,
        }
    }

    #[test]
    fn test_implement_prompt_obligations() {
        let prompt = task_prompt(&exercise(RunKind::Implement, None));

        assert!(prompt.contains("Binary Search"));
        assert!(prompt.contains("binary_search"));
        assert!(prompt.contains("single fenced code block"));
        assert!(prompt.contains("entire reply"));
    }

    #[test]
    fn test_review_prompt_embeds_seed_code() {
        let seed = "def binary_search(xs, t):\n    return -1";
        let prompt = task_prompt(&exercise(RunKind::Review, Some(seed)));

        assert!(prompt.contains(seed));
        assert!(prompt.contains("single fenced code block"));
    }

    #[test]
    fn test_feedback_message_composition() {
        let message = feedback_message("Binary Search", "def f(): pass", "watch the bounds");

        assert!(message.contains("Binary Search"));
        assert!(message.contains("def f(): pass"));
        assert!(message.contains("watch the bounds"));
    }
}
