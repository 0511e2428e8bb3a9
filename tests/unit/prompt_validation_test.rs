// Property-based tests for prompt validation
//
// Prompts up to the limit are accepted and come back trimmed; anything longer
// is rejected with PromptTooLong; whitespace-only prompts are rejected.

use insight_proxy::core::AppError;
use insight_proxy::insights::services::validate_prompt;
use insight_proxy::insights::MAX_PROMPT_CHARS;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_prompts_within_limit_are_accepted(text in "[a-zA-Z0-9 .,?]{0,300}", pad in 0usize..20) {
        let prompt = format!("{}x{}", " ".repeat(pad), text);
        prop_assume!(prompt.chars().count() <= MAX_PROMPT_CHARS);

        let accepted = validate_prompt(&prompt).unwrap();
        prop_assert_eq!(accepted, prompt.trim().to_string());
    }

    #[test]
    fn test_prompts_over_limit_are_rejected(extra in 1usize..500) {
        let prompt = "y".repeat(MAX_PROMPT_CHARS + extra);
        let too_long = matches!(
            validate_prompt(&prompt),
            Err(AppError::PromptTooLong { max: MAX_PROMPT_CHARS })
        );
        prop_assert!(too_long);
    }

    #[test]
    fn test_whitespace_only_prompts_are_rejected(ws in "[ \t\n\r]{0,64}") {
        prop_assert!(matches!(validate_prompt(&ws), Err(AppError::Validation(_))));
    }
}

#[test]
fn test_boundary_lengths() {
    assert!(validate_prompt(&"a".repeat(MAX_PROMPT_CHARS)).is_ok());
    assert!(matches!(
        validate_prompt(&"a".repeat(MAX_PROMPT_CHARS + 1)),
        Err(AppError::PromptTooLong { .. })
    ));
}
