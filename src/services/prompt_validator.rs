//! PromptValidator (C7): accept/reject agent prompts before dispatch and
//! sanitize their content. Validation order is security-first: injection,
//! then size, then structure, then forbidden content.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::domain::errors::{InjectionSeverity, PromptValidationError};
use crate::domain::models::PromptValidatorConfig;

struct InjectionPattern {
    regex: Regex,
    severity: InjectionSeverity,
    label: &'static str,
}

static INJECTION_PATTERNS: LazyLock<Vec<InjectionPattern>> = LazyLock::new(|| {
    let ci = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build().unwrap();
    vec![
        InjectionPattern {
            regex: ci(r"execute\s*:\s*(rm\s+-rf|drop\s+table|del\s+/[fsq]|format\s+[a-z]:)"),
            severity: InjectionSeverity::Critical,
            label: "destructive command after execute:",
        },
        InjectionPattern {
            regex: ci(r"ignore\s+(all\s+)?(previous|prior|above)\s+instructions"),
            severity: InjectionSeverity::High,
            label: "instruction-override phrasing",
        },
        InjectionPattern {
            regex: ci(r"you\s+are\s+now\s+(a|an|the)\s+\w+|act\s+as\s+(a|an|the)\s+\w+\s+with\s+no\s+restrictions"),
            severity: InjectionSeverity::High,
            label: "role-impersonation phrasing",
        },
        InjectionPattern {
            regex: ci(r#"["'`]{2,}\s*;\s*(drop\s+table|delete\s+from|rm\s+-rf|exec\s*\()"#),
            severity: InjectionSeverity::High,
            label: "delimiter-attack with destructive payload",
        },
        InjectionPattern {
            regex: ci(r"```[\s\S]*?```"),
            severity: InjectionSeverity::Medium,
            label: "triple-backtick code block",
        },
        InjectionPattern {
            regex: ci(r#""""[\s\S]*?""""#),
            severity: InjectionSeverity::Medium,
            label: "triple-quote block",
        },
        InjectionPattern {
            regex: ci(r"\$\{[^}]*\}"),
            severity: InjectionSeverity::Medium,
            label: "template-expansion syntax",
        },
        InjectionPattern {
            regex: ci(r"(override|replace)\s+(the\s+)?system\s+instructions?"),
            severity: InjectionSeverity::Low,
            label: "generic override/replace system instructions phrasing",
        },
    ]
});

static FORBIDDEN_CONTENT: LazyLock<Vec<(Regex, PromptValidationError)>> = LazyLock::new(|| {
    let ci = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build().unwrap();
    vec![
        (ci(r"conversation\s+history"), PromptValidationError::ContainsConversationHistory),
        (ci(r"claude\.md\s+rules"), PromptValidationError::ContainsClaudeMdRules),
        (ci(r"previous\s+agent"), PromptValidationError::ContainsPreviousAgentOutput),
    ]
});

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static SSN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CREDIT_CARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap());
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b").unwrap());
static ZERO_WIDTH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{200B}-\u{200D}\u{FEFF}]").unwrap());

pub struct PromptValidator {
    config: PromptValidatorConfig,
}

impl PromptValidator {
    pub const fn new(config: PromptValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, prompt: &str) -> Result<(), PromptValidationError> {
        self.check_injection(prompt)?;
        self.check_size(prompt)?;
        self.check_structure(prompt)?;
        self.check_forbidden_content(prompt)
    }

    fn check_injection(&self, prompt: &str) -> Result<(), PromptValidationError> {
        let worst = INJECTION_PATTERNS
            .iter()
            .filter(|p| p.regex.is_match(prompt))
            .max_by_key(|p| p.severity);
        if let Some(pattern) = worst {
            return Err(PromptValidationError::InjectionDetected(pattern.severity, pattern.label.to_string()));
        }
        Ok(())
    }

    fn check_size(&self, prompt: &str) -> Result<(), PromptValidationError> {
        if prompt.chars().count() > self.config.max_prompt_chars {
            return Err(PromptValidationError::PromptTooLarge(self.config.max_prompt_chars));
        }
        let estimated_tokens = prompt.len().div_ceil(4);
        if estimated_tokens > self.config.max_estimated_tokens {
            return Err(PromptValidationError::TooManyTokens(self.config.max_estimated_tokens));
        }
        Ok(())
    }

    fn check_structure(&self, prompt: &str) -> Result<(), PromptValidationError> {
        let task = extract_section(prompt, "Task:").ok_or(PromptValidationError::MissingTask)?;
        if task.chars().count() > 200 {
            return Err(PromptValidationError::InvalidOutputFormat("Task section exceeds 200 characters".into()));
        }

        let files = extract_section(prompt, "Files:").ok_or(PromptValidationError::MissingFiles)?;
        let file_count = files.split(|c| c == ',' || c == '\n').map(str::trim).filter(|s| !s.is_empty()).count();
        if !(1..=5).contains(&file_count) {
            return Err(PromptValidationError::InvalidOutputFormat(format!(
                "Files section must list 1-5 entries, found {file_count}"
            )));
        }

        let output = extract_section(prompt, "Output:").ok_or(PromptValidationError::MissingOutput)?;
        if !output.to_lowercase().contains("json") {
            return Err(PromptValidationError::InvalidOutputFormat("Output section must mention json".into()));
        }

        extract_section(prompt, "Rules:").ok_or(PromptValidationError::MissingRules)?;
        Ok(())
    }

    fn check_forbidden_content(&self, prompt: &str) -> Result<(), PromptValidationError> {
        for (pattern, err) in FORBIDDEN_CONTENT.iter() {
            if pattern.is_match(prompt) {
                return Err(err.clone());
            }
        }
        Ok(())
    }

    /// Escapes shell-meaningful characters, redacts PII with labeled
    /// placeholders, and strips control/zero-width characters.
    pub fn sanitize(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '\\' | '`' | '$' => {
                    out.push('\\');
                    out.push(c);
                }
                '\n' | '\t' => out.push(c),
                c if is_control_char(c) => {}
                c => out.push(c),
            }
        }
        let out = ZERO_WIDTH_PATTERN.replace_all(&out, "").to_string();
        let out = EMAIL_PATTERN.replace_all(&out, "[EMAIL_REDACTED]").to_string();
        let out = SSN_PATTERN.replace_all(&out, "[SSN_REDACTED]").to_string();
        let out = CREDIT_CARD_PATTERN.replace_all(&out, "[CREDIT_CARD_REDACTED]").to_string();
        PHONE_PATTERN.replace_all(&out, "[PHONE_REDACTED]").to_string()
    }
}

fn is_control_char(c: char) -> bool {
    let code = c as u32;
    (code <= 0x1F) || (0x7F..=0x9F).contains(&code)
}

/// Extracts the text following `label` up to the next recognized section
/// label (or end of string), trimmed.
fn extract_section<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    const LABELS: [&str; 4] = ["Task:", "Files:", "Output:", "Rules:"];
    let start = prompt.find(label)? + label.len();
    let rest = &prompt[start..];
    let end = LABELS
        .iter()
        .filter(|l| **l != label)
        .filter_map(|l| rest.find(l))
        .min()
        .unwrap_or(rest.len());
    let section = rest[..end].trim();
    if section.is_empty() {
        None
    } else {
        Some(section)
    }
}
