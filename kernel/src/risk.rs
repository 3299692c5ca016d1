//! Pattern-based risk classification. Pure text analysis — no process
//! spawning, no filesystem access. The long-run guard that wraps this
//! with duration/check-in budgeting lives in `core` since it needs a
//! clock.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

struct Pattern {
    regex: Regex,
    level: RiskLevel,
    reason: &'static str,
    suggestion: &'static str,
}

static PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    let p = |pattern: &str, level: RiskLevel, reason: &'static str, suggestion: &'static str| Pattern {
        regex: Regex::new(pattern).expect("static risk pattern is valid regex"),
        level,
        reason,
        suggestion,
    };

    vec![
        p(
            r"(?i)\bgit\s+push\b.*(--force\b|-f\b)",
            RiskLevel::Critical,
            "force-push rewrites remote history",
            "push without --force, or confirm the remote branch is disposable",
        ),
        p(
            r"(?i)\brm\s+-rf\s+/(?:\s|$)",
            RiskLevel::Critical,
            "recursive delete rooted at /",
            "scope the delete to a specific path",
        ),
        p(
            r"(?i)\bdrop\s+(table|database|schema)\b",
            RiskLevel::Critical,
            "destructive SQL DDL",
            "take a backup and confirm the target before running",
        ),
        p(
            r"(?i)\bgit\s+reset\s+--hard\b",
            RiskLevel::High,
            "hard reset discards uncommitted work",
            "stash or commit local changes first",
        ),
        p(
            r"(?i)\bkubectl\s+delete\b",
            RiskLevel::High,
            "deletes a live Kubernetes resource",
            "confirm the namespace and resource name first",
        ),
        p(
            r"(?i)\bterraform\s+destroy\b",
            RiskLevel::High,
            "tears down provisioned infrastructure",
            "run terraform plan -destroy first and review it",
        ),
        p(
            r"(?i)\brm\s+-rf\b",
            RiskLevel::Medium,
            "recursive delete",
            "double check the target path",
        ),
        p(
            r"(?i)\bdelete\s+from\b",
            RiskLevel::Medium,
            "unscoped row deletion risk",
            "confirm a WHERE clause is present",
        ),
        p(
            r"(?i)\bchmod\s+777\b",
            RiskLevel::Medium,
            "overly permissive file mode",
            "scope permissions to what the process actually needs",
        ),
        p(
            r"(?i)\bsudo\b",
            RiskLevel::Low,
            "command requests elevated privileges",
            "confirm elevation is actually required",
        ),
    ]
});

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
}

impl RiskAssessment {
    pub fn requires_pause(&self) -> bool {
        self.level >= RiskLevel::High
    }
}

pub fn analyze(text: &str) -> RiskAssessment {
    let mut level = RiskLevel::None;
    let mut reasons = Vec::new();
    let mut suggestions = Vec::new();

    for pattern in PATTERNS.iter() {
        if pattern.regex.is_match(text) {
            if pattern.level > level {
                level = pattern.level;
            }
            reasons.push(pattern.reason.to_string());
            suggestions.push(pattern.suggestion.to_string());
        }
    }

    RiskAssessment { level, reasons, suggestions }
}

/// Additionally lifts the level to `High` on "irreversible"/"cannot be
/// undone" language, and to `Medium` on "data loss"/"delete" language,
/// beyond whatever `analyze` already found across the combined text.
pub fn analyze_approach(name: &str, description: &str, tradeoffs: &str) -> RiskAssessment {
    let combined = format!("{name}\n{description}\n{tradeoffs}");
    let mut assessment = analyze(&combined);

    let lower = combined.to_ascii_lowercase();
    if lower.contains("irreversible") || lower.contains("cannot be undone") {
        if assessment.level < RiskLevel::High {
            assessment.level = RiskLevel::High;
        }
        assessment
            .reasons
            .push("approach describes an irreversible change".to_string());
    }
    if lower.contains("data loss") || lower.contains("delete") {
        if assessment.level < RiskLevel::Medium {
            assessment.level = RiskLevel::Medium;
        }
        assessment
            .reasons
            .push("approach mentions data loss or deletion".to_string());
    }

    assessment
}
