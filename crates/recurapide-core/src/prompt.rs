//! Structuring instruction sent to the completion model.

use crate::evidence::Evidence;
use crate::receipt::{
    KEY_ADDITIONAL_INFO, KEY_AMOUNT, KEY_CATEGORY, KEY_DATE, KEY_TRANSACTION_NAME, KEY_TRANSACTIONS,
};

// ── Prompt templates ──

const SYSTEM_PROMPT: &str = "\
You are a helpful assistant that formats OCR text extracted from receipts into valid JSON. \
Respond ONLY with a single JSON object. No markdown fences, no explanation, just raw JSON.";

/// Speaker of one instruction segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// One role-tagged segment of a [`StructuringInstruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The system directive followed by the user directive, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringInstruction {
    system: Message,
    user: Message,
}

impl StructuringInstruction {
    pub fn system(&self) -> &Message {
        &self.system
    }

    pub fn user(&self) -> &Message {
        &self.user
    }

    pub fn messages(&self) -> [&Message; 2] {
        [&self.system, &self.user]
    }
}

fn build_user_prompt(evidence: &Evidence) -> String {
    format!(
        "The following text is extracted from a receipt using OCR:\n\
         ---\n\
         {evidence}\n\
         ---\n\
         Format this text into a single valid JSON object that a strict JSON parser accepts without any changes.\n\
         Ensure the JSON:\n\
         1. Does not include code block markers (e.g., ```json).\n\
         2. Uses double quotes for all keys and string values.\n\
         3. Is properly escaped and formatted for JSON standards.\n\
         4. Includes a \"{transactions}\" array with each transaction containing:\n\
         \x20   - \"{name}\"\n\
         \x20   - \"{category}\" (as null if unknown)\n\
         \x20   - \"{amount}\" (as a number, not a string)\n\
         \x20   - \"{date}\"\n\
         \x20   - \"{info}\" (as null if missing).\n\
         5. Adds any summary fields if they can be derived from the text, such as \"Total Amount\", \"Card Type\", etc., \
         as top-level keys with plain string, number, boolean or null values.",
        evidence = evidence,
        transactions = KEY_TRANSACTIONS,
        name = KEY_TRANSACTION_NAME,
        category = KEY_CATEGORY,
        amount = KEY_AMOUNT,
        date = KEY_DATE,
        info = KEY_ADDITIONAL_INFO,
    )
}

/// Build the instruction for one request's evidence.
///
/// Pure: the same evidence always yields an identical instruction.
pub fn build_instruction(evidence: &Evidence) -> StructuringInstruction {
    StructuringInstruction {
        system: Message {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        },
        user: Message {
            role: Role::User,
            content: build_user_prompt(evidence),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::combine;

    fn evidence(ocr: &str, user: &str) -> Evidence {
        combine(Some(ocr), user).unwrap()
    }

    #[test]
    fn identical_evidence_builds_identical_instruction() {
        let a = build_instruction(&evidence("COFFEE SHOP $4.50", "card"));
        let b = build_instruction(&evidence("COFFEE SHOP $4.50", "card"));
        assert_eq!(a, b);
        assert_eq!(a.user().content.as_bytes(), b.user().content.as_bytes());
    }

    #[test]
    fn system_precedes_user() {
        let instruction = build_instruction(&evidence("X 1.00", ""));
        let [first, second] = instruction.messages();
        assert_eq!(first.role, Role::System);
        assert_eq!(second.role, Role::User);
        assert!(first.content.contains("JSON"));
    }

    #[test]
    fn evidence_is_embedded_between_delimiters() {
        let raw = "  BAKERY\n\tBread   3.20\n";
        let instruction = build_instruction(&evidence(raw, ""));
        let expected = format!("---\n{raw}\n---\n");
        assert!(instruction.user().content.contains(&expected));
    }

    #[test]
    fn constraints_name_every_required_key() {
        let content = build_instruction(&evidence("X 1.00", "")).user().content.clone();
        for key in [
            "\"transactions\"",
            "\"Transaction Name\"",
            "\"Category\"",
            "\"Amount\" (as a number",
            "\"Date\"",
            "\"Additional Info\" (as null if missing)",
            "```json",
            "double quotes",
            "\"Total Amount\"",
            "\"Card Type\"",
        ] {
            assert!(content.contains(key), "missing {key} in prompt");
        }
    }

    #[test]
    fn different_evidence_changes_only_user_segment() {
        let a = build_instruction(&evidence("A 1.00", ""));
        let b = build_instruction(&evidence("B 2.00", ""));
        assert_eq!(a.system(), b.system());
        assert_ne!(a.user(), b.user());
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
    }
}
