// Summarization Prompts
// Report-style templates and output clean-up

use regex::Regex;
use std::sync::OnceLock;

use crate::services::text_processor::{collapse_whitespace, split_on_terminal_punct};

/// Most sentences kept from a generated summary.
pub const MAX_SUMMARY_SENTENCES: usize = 3;

const RADIOLOGY_BRIEF: &str = "You are a senior radiologist.\n\
Summarize the FINDINGS/IMPRESSION in 2-3 crisp sentences with clinical precision.\n\
Avoid PHI, avoid speculation, no recommendations, just the key findings.\n\n\
REPORT:\n{input}\n\nSUMMARY:";

const PATHOLOGY_BRIEF: &str = "You are a senior pathologist. Provide a concise 2-3 sentence summary of key pathology findings.\n\
Stick to facts present in the text. Avoid PHI.\n\nREPORT:\n{input}\n\nSUMMARY:";

const GENERIC_CLINICAL: &str = "Provide a concise medical summary (2-3 sentences) of the following clinical note.\n\
Avoid PHI and avoid recommendations.\n\nNOTE:\n{input}\n\nSUMMARY:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    RadiologyBrief,
    PathologyBrief,
    GenericClinical,
}

impl PromptStyle {
    /// Unknown identifiers use the generic clinical template.
    pub fn from_id(id: &str) -> Self {
        match id.trim() {
            "radiology_brief" => Self::RadiologyBrief,
            "pathology_brief" => Self::PathologyBrief,
            _ => Self::GenericClinical,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::RadiologyBrief => "radiology_brief",
            Self::PathologyBrief => "pathology_brief",
            Self::GenericClinical => "generic_clinical",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Self::RadiologyBrief => RADIOLOGY_BRIEF,
            Self::PathologyBrief => PATHOLOGY_BRIEF,
            Self::GenericClinical => GENERIC_CLINICAL,
        }
    }

    pub fn render(&self, input: &str) -> String {
        self.template().replacen("{input}", input, 1)
    }
}

fn leading_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(SUMMARY|FINDINGS|IMPRESSION)[:\-]\s*").expect("static regex must compile")
    })
}

/// Collapse whitespace, drop a leading section label and keep at most three sentences.
pub fn post_summarize(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = leading_label().replace(&text, "");
    split_on_terminal_punct(&text)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUMMARY_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id_falls_back_to_generic() {
        assert_eq!(PromptStyle::from_id("radiology_brief"), PromptStyle::RadiologyBrief);
        assert_eq!(PromptStyle::from_id("pathology_brief"), PromptStyle::PathologyBrief);
        assert_eq!(PromptStyle::from_id("poetry"), PromptStyle::GenericClinical);
        assert_eq!(PromptStyle::from_id("poetry").id(), "generic_clinical");
    }

    #[test]
    fn test_render_places_input() {
        let prompt = PromptStyle::RadiologyBrief.render("No acute findings.");
        assert!(prompt.starts_with("You are a senior radiologist.\n"));
        assert!(prompt.contains("REPORT:\nNo acute findings.\n\nSUMMARY:"));
        assert!(!prompt.contains("{input}"));

        let generic = PromptStyle::GenericClinical.render("x");
        assert!(generic.contains("NOTE:\nx\n\nSUMMARY:"));
    }

    #[test]
    fn test_post_summarize() {
        let raw = "Summary:  Small  effusion.\nNo mass. Mild cardiomegaly! Stable? Extra sentence.";
        assert_eq!(post_summarize(raw), "Small effusion. No mass. Mild cardiomegaly!");
        assert_eq!(post_summarize("IMPRESSION- clear lungs"), "clear lungs");
        assert_eq!(post_summarize("   "), "");
    }
}
