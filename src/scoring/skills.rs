// src/scoring/skills.rs

//! Skill and keyword matching.
//!
//! Both sides are compacted (lowercased, with `.`, `-`, `_` and whitespace
//! removed) so "Node.js", "NODEJS" and "node-js" all compare equal to
//! "nodejs". Short or ambiguous skills only match whole tokens; longer
//! ones may also match inside a token ("docker" in "dockerized").

use std::collections::{HashMap, HashSet};

/// Skills that are common English words or prefixes of other skills.
const AMBIGUOUS: &[&str] = &[
    "go", "r", "c", "java", "rust", "swift", "scala", "react", "spring", "ruby", "dart", "chef",
    "puppet", "spark", "elm",
];

const BUILTIN_SYNONYMS: &[&[&str]] = &[
    &["javascript", "js", "ecmascript"],
    &["typescript", "ts"],
    &["kubernetes", "k8s"],
    &["postgresql", "postgres", "psql"],
    &["golang", "go"],
    &["nodejs", "node"],
    &["csharp", "c#"],
    &["cplusplus", "c++", "cpp"],
    &["amazonwebservices", "aws"],
    &["googlecloudplatform", "gcp", "googlecloud"],
    &["machinelearning", "ml"],
    &["reactjs", "react"],
    &["vuejs", "vue"],
];

/// Longest run of adjacent tokens joined into one term.
const MAX_JOIN: usize = 3;

/// Compact form used for every comparison.
pub fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '.' | '-' | '_') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ',' | ';' | ':' | '/' | '\\' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '!' | '?'
                | '"' | '\'' | '*' | '&' | '<' | '>' | '='
        )
}

/// Text tokenized once for repeated skill lookups.
#[derive(Debug, Clone, Default)]
pub struct PreparedText {
    terms: HashSet<String>,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        let tokens: Vec<String> = text
            .split(is_separator)
            .map(compact)
            .filter(|t| !t.is_empty())
            .collect();

        let mut terms = HashSet::with_capacity(tokens.len() * MAX_JOIN);
        for start in 0..tokens.len() {
            let mut joined = String::new();
            for token in tokens.iter().skip(start).take(MAX_JOIN) {
                joined.push_str(token);
                terms.insert(joined.clone());
            }
        }
        Self { terms }
    }

    fn has_token(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    fn has_substring(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t.contains(term))
    }
}

/// Matches skills against prepared text through synonym groups.
#[derive(Debug, Clone)]
pub struct SkillMatcher {
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Default for SkillMatcher {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl SkillMatcher {
    /// Built-in synonym groups plus `extra` ones; an extra group that shares
    /// a member with a built-in group extends it.
    pub fn new(extra: &[Vec<String>]) -> Self {
        let mut matcher = Self {
            groups: Vec::new(),
            index: HashMap::new(),
        };
        for group in BUILTIN_SYNONYMS {
            matcher.add_group(group.iter().map(|s| compact(s)));
        }
        for group in extra {
            matcher.add_group(group.iter().map(|s| compact(s)));
        }
        matcher
    }

    fn add_group(&mut self, members: impl Iterator<Item = String>) {
        let members: Vec<String> = members.filter(|m| !m.is_empty()).collect();
        let existing = members.iter().find_map(|m| self.index.get(m).copied());
        let idx = existing.unwrap_or_else(|| {
            self.groups.push(Vec::new());
            self.groups.len() - 1
        });
        for member in members {
            if !self.groups[idx].contains(&member) {
                self.groups[idx].push(member.clone());
            }
            self.index.entry(member).or_insert(idx);
        }
    }

    /// All compact spellings that count as `skill`.
    pub fn variants(&self, skill: &str) -> Vec<String> {
        let key = compact(skill);
        match self.index.get(&key) {
            Some(idx) => self.groups[*idx].clone(),
            None if key.is_empty() => Vec::new(),
            None => vec![key],
        }
    }

    /// Whether `text` mentions `skill` or one of its synonyms.
    pub fn matches(&self, skill: &str, text: &PreparedText) -> bool {
        self.variants(skill)
            .iter()
            .any(|variant| variant_matches(variant, text))
    }
}

fn variant_matches(variant: &str, text: &PreparedText) -> bool {
    if requires_word_boundary(variant) {
        text.has_token(variant)
    } else {
        text.has_substring(variant)
    }
}

fn requires_word_boundary(term: &str) -> bool {
    term.chars().count() <= 3 || AMBIGUOUS.contains(&term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_normalization() {
        assert_eq!(compact("Node.js"), "nodejs");
        assert_eq!(compact("NODEJS"), "nodejs");
        assert_eq!(compact("node-js"), "nodejs");
        assert_eq!(compact("Machine Learning"), "machinelearning");
    }

    #[test]
    fn test_spelling_variants_match_same_skill() {
        let matcher = SkillMatcher::default();
        for text in ["Experience with Node.js", "NODEJS required", "node-js, react", "Node JS"] {
            assert!(matcher.matches("nodejs", &PreparedText::new(text)), "{text}");
        }
    }

    #[test]
    fn test_short_token_needs_word_boundary() {
        let matcher = SkillMatcher::default();
        assert!(!matcher.matches("go", &PreparedText::new("We love mango smoothies")));
        assert!(!matcher.matches("go", &PreparedText::new("Join us on the go-to platform")));
        assert!(matcher.matches("go", &PreparedText::new("Backend services in Go and Python")));
        assert!(matcher.matches("go", &PreparedText::new("golang microservices")));
    }

    #[test]
    fn test_ambiguous_token_needs_word_boundary() {
        let matcher = SkillMatcher::default();
        assert!(!matcher.matches("java", &PreparedText::new("Modern JavaScript frontends")));
        assert!(matcher.matches("java", &PreparedText::new("Java 21, Spring Boot")));
        assert!(!matcher.matches("rust", &PreparedText::new("A trusted partner")));
    }

    #[test]
    fn test_long_skill_substring() {
        let matcher = SkillMatcher::default();
        assert!(matcher.matches("docker", &PreparedText::new("Dockerized deployments")));
        assert!(matcher.matches("postgres", &PreparedText::new("PostgreSQL 16")));
        assert!(matcher.matches("k8s", &PreparedText::new("Kubernetes operators")));
    }

    #[test]
    fn test_extra_synonym_groups() {
        let matcher = SkillMatcher::new(&[vec!["terraform".into(), "tf".into()]]);
        assert!(matcher.matches("terraform", &PreparedText::new("IaC with TF modules")));

        let extended = SkillMatcher::new(&[vec!["k8s".into(), "kube".into()]]);
        assert!(extended.matches("kubernetes", &PreparedText::new("kube clusters")));
    }
}
