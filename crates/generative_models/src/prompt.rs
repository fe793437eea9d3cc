use serde::{Deserialize, Serialize};

/// One solved example of a few-shot prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptExample {
    pub request: String,
    pub response: String,
}

impl PromptExample {
    pub fn new(request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: response.into(),
        }
    }
}

/// Assemble a zero-, one- or few-shot prompt.
///
/// ```text
/// Summarize this review:        <- instruction
/// I love this movie!            <- example request
/// Sentiment:                    <- expectation
/// positive                      <- example response
///
/// Summarize this review:
/// This movie is not so good     <- request
/// Sentiment:
/// ```
pub fn build_prompt(
    instruction: &str,
    expectation: &str,
    request: &str,
    examples: &[PromptExample],
) -> String {
    let mut prompt = String::new();
    if !examples.is_empty() {
        let shots: Vec<String> = examples
            .iter()
            .map(|example| {
                format!(
                    "{instruction}:\n{}\n{expectation}:\n{}",
                    example.request, example.response
                )
            })
            .collect();
        prompt.push_str(&shots.join("\n\n"));
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("{instruction}:\n{request}\n{expectation}:"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shot() {
        assert_eq!(
            build_prompt("Summarize this review", "Sentiment", "This movie is not so good", &[]),
            "Summarize this review:\nThis movie is not so good\nSentiment:"
        );
    }

    #[test]
    fn test_one_shot() {
        let examples = [PromptExample::new("I love this movie!", "positive")];
        assert_eq!(
            build_prompt("Summarize this review", "Sentiment", "Not so good", &examples),
            "Summarize this review:\nI love this movie!\nSentiment:\npositive\n\n\
             Summarize this review:\nNot so good\nSentiment:"
        );
    }

    #[test]
    fn test_few_shot_keeps_example_order() {
        let examples = [
            PromptExample::new("2 + 2", "4"),
            PromptExample::new("3 + 5", "8"),
        ];
        assert_eq!(
            build_prompt("Add", "Sum", "1 + 1", &examples),
            "Add:\n2 + 2\nSum:\n4\n\nAdd:\n3 + 5\nSum:\n8\n\nAdd:\n1 + 1\nSum:"
        );
    }
}
