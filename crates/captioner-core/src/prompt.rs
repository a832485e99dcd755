//! Prompt construction.

/// Prompt used when neither the config nor the caller supplies one.
pub const DEFAULT_PROMPT: &str = "Describe this image.";

/// Build the prompt sent to a backend.
///
/// A trigger phrase asks the model to open its caption with that exact text,
/// which is how fine-tuning datasets tie captions to a concept token.
pub fn build_prompt(base: &str, trigger_phrase: Option<&str>) -> String {
    let base = base.trim();
    let base = if base.is_empty() { DEFAULT_PROMPT } else { base };
    match trigger_phrase.map(str::trim).filter(|t| !t.is_empty()) {
        Some(trigger) => {
            format!("{base} Start the description with the following phrase: '{trigger}'")
        }
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_without_trigger() {
        assert_eq!(build_prompt("Describe this image.", None), "Describe this image.");
        assert_eq!(build_prompt("Describe this image.", Some("  ")), "Describe this image.");
    }

    #[test]
    fn test_build_prompt_with_trigger() {
        let prompt = build_prompt("Describe this image.", Some("ohwx person"));
        assert_eq!(
            prompt,
            "Describe this image. Start the description with the following phrase: 'ohwx person'"
        );
    }

    #[test]
    fn test_build_prompt_empty_base_uses_default() {
        assert_eq!(build_prompt("", None), DEFAULT_PROMPT);
    }
}
