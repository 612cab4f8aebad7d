use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One ordered classification rule. Evaluation stops at the first rule
/// whose predicates match; predicate precedence within a rule is
/// genre-ID exact match > genre-name substring > app-name keyword,
/// because genre IDs are the most reliable signal and name keywords are a
/// last-resort heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeRule {
    pub theme: String,
    #[serde(default)]
    pub genre_ids: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub rules: Vec<ThemeRule>,
    #[serde(default)]
    pub risk_on: Vec<String>,
    #[serde(default)]
    pub risk_off: Vec<String>,
}

impl ThemeConfig {
    /// Load a theme-rule file. A missing file or an empty `rules` array
    /// silently substitutes the built-in defaults; any other read or parse
    /// failure is an error.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read theme config {}", path.display()))?;
        let cfg: ThemeConfig = serde_json::from_str(&data)
            .with_context(|| format!("parse theme config {}", path.display()))?;
        if cfg.rules.is_empty() {
            return Ok(Self::default());
        }
        Ok(cfg)
    }

    /// Union of configured rule themes plus the fallback `"other"`, sorted
    /// for deterministic output order.
    pub fn known_themes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut themes = vec!["other".to_string()];
        seen.insert("other".to_string());
        for rule in &self.rules {
            if rule.theme.is_empty() {
                continue;
            }
            if seen.insert(rule.theme.clone()) {
                themes.push(rule.theme.clone());
            }
        }
        themes.sort();
        themes
    }
}

impl Default for ThemeConfig {
    /// Ten built-in rules covering the common App Store categories.
    fn default() -> Self {
        fn rule(theme: &str, genre_ids: &[&str], genres: &[&str]) -> ThemeRule {
            ThemeRule {
                theme: theme.to_string(),
                genre_ids: genre_ids.iter().map(|s| s.to_string()).collect(),
                genres: genres.iter().map(|s| s.to_string()).collect(),
                keywords: Vec::new(),
            }
        }

        Self {
            rules: vec![
                rule("games", &["6014"], &["games"]),
                rule(
                    "entertainment",
                    &["6016", "6011", "6008", "6005"],
                    &["entertainment", "music", "photo", "social networking"],
                ),
                rule(
                    "commerce",
                    &["6024", "6023"],
                    &["shopping", "food", "drink", "food & drink"],
                ),
                rule("travel", &["6003", "6010"], &["travel", "navigation"]),
                rule("finance", &["6015"], &["finance"]),
                rule(
                    "productivity",
                    &["6007", "6002", "6000"],
                    &["productivity", "utilities", "business"],
                ),
                rule("education", &["6017"], &["education"]),
                rule(
                    "health",
                    &["6013", "6018"],
                    &["health", "fitness", "medical"],
                ),
                rule(
                    "news",
                    &["6009", "6006", "6001"],
                    &["news", "reference", "weather"],
                ),
                rule("sports", &["6004"], &["sports"]),
            ],
            risk_on: ["games", "entertainment", "commerce", "travel", "sports"]
                .map(String::from)
                .to_vec(),
            risk_off: ["productivity", "education", "health", "finance", "news"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Everything the classifier may look at for one app.
#[derive(Debug, Clone, Default)]
pub struct ThemeInput<'a> {
    pub name: &'a str,
    pub genres: &'a [String],
    pub genre_ids: &'a [String],
    pub primary_genre: Option<&'a str>,
    pub lookup_genres: &'a [String],
}

#[derive(Debug)]
struct NormalizedRule {
    theme: String,
    genre_ids: HashSet<String>,
    genres: Vec<String>,
    keywords: Vec<String>,
}

/// Ordered first-match-wins classifier over pre-normalized rules.
#[derive(Debug)]
pub struct ThemeClassifier {
    rules: Vec<NormalizedRule>,
}

impl ThemeClassifier {
    pub fn new(cfg: &ThemeConfig) -> Self {
        let rules = cfg
            .rules
            .iter()
            .map(|rule| NormalizedRule {
                theme: rule.theme.to_lowercase(),
                genre_ids: rule
                    .genre_ids
                    .iter()
                    .map(|id| id.trim().to_string())
                    .collect(),
                genres: normalize_list(rule.genres.iter().map(String::as_str)),
                keywords: normalize_list(rule.keywords.iter().map(String::as_str)),
            })
            .collect();
        Self { rules }
    }

    /// Return the theme of the first matching rule, or `"other"`.
    pub fn classify(&self, input: &ThemeInput<'_>) -> String {
        let genres = normalize_list(
            input
                .genres
                .iter()
                .chain(input.lookup_genres.iter())
                .map(String::as_str)
                .chain(input.primary_genre),
        );
        let genre_ids: HashSet<&str> = input.genre_ids.iter().map(|id| id.trim()).collect();
        let name = input.name.to_lowercase();

        for rule in &self.rules {
            if genre_ids.iter().any(|id| rule.genre_ids.contains(*id)) {
                return rule.theme.clone();
            }
            if genres.iter().any(|g| contains_any(g, &rule.genres)) {
                return rule.theme.clone();
            }
            if !rule.keywords.is_empty() && contains_any(&name, &rule.keywords) {
                return rule.theme.clone();
            }
        }
        "other".to_string()
    }
}

fn normalize_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn contains_any(value: &str, candidates: &[String]) -> bool {
    candidates
        .iter()
        .any(|c| !c.is_empty() && value.contains(c.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        name: &'a str,
        genres: &'a [String],
        genre_ids: &'a [String],
    ) -> ThemeInput<'a> {
        ThemeInput {
            name,
            genres,
            genre_ids,
            primary_genre: None,
            lookup_genres: &[],
        }
    }

    #[test]
    fn genre_id_match_wins() {
        let classifier = ThemeClassifier::new(&ThemeConfig::default());
        let genres = vec![];
        let ids = vec!["6014".to_string()];
        assert_eq!(classifier.classify(&input("Anything", &genres, &ids)), "games");
    }

    #[test]
    fn genre_substring_is_case_insensitive() {
        let classifier = ThemeClassifier::new(&ThemeConfig::default());
        let genres = vec!["Social Networking".to_string()];
        let ids = vec![];
        assert_eq!(
            classifier.classify(&input("Chat App", &genres, &ids)),
            "entertainment"
        );
    }

    #[test]
    fn earlier_rule_wins_when_both_match() {
        let cfg = ThemeConfig {
            rules: vec![
                ThemeRule {
                    theme: "first".to_string(),
                    genre_ids: vec![],
                    genres: vec!["games".to_string()],
                    keywords: vec![],
                },
                ThemeRule {
                    theme: "second".to_string(),
                    genre_ids: vec!["6014".to_string()],
                    genres: vec!["games".to_string()],
                    keywords: vec![],
                },
            ],
            risk_on: vec![],
            risk_off: vec![],
        };
        let classifier = ThemeClassifier::new(&cfg);
        let genres = vec!["Games".to_string()];
        let ids = vec!["6014".to_string()];
        // Rule order beats predicate strength across rules.
        assert_eq!(classifier.classify(&input("x", &genres, &ids)), "first");
    }

    #[test]
    fn keyword_matches_against_folded_name() {
        let cfg = ThemeConfig {
            rules: vec![ThemeRule {
                theme: "delivery".to_string(),
                genre_ids: vec![],
                genres: vec![],
                keywords: vec!["baemin".to_string()],
            }],
            risk_on: vec![],
            risk_off: vec![],
        };
        let classifier = ThemeClassifier::new(&cfg);
        let genres = vec![];
        let ids = vec![];
        assert_eq!(
            classifier.classify(&input("BAEMIN - Food Delivery", &genres, &ids)),
            "delivery"
        );
    }

    #[test]
    fn no_match_yields_other() {
        let classifier = ThemeClassifier::new(&ThemeConfig::default());
        let genres = vec!["Mystery Category".to_string()];
        let ids = vec!["9999".to_string()];
        assert_eq!(classifier.classify(&input("App", &genres, &ids)), "other");
    }

    #[test]
    fn lookup_genres_and_primary_genre_are_considered() {
        let classifier = ThemeClassifier::new(&ThemeConfig::default());
        let genres = vec![];
        let ids = vec![];
        let lookup = vec!["Finance".to_string()];
        let with_lookup = ThemeInput {
            name: "App",
            genres: &genres,
            genre_ids: &ids,
            primary_genre: None,
            lookup_genres: &lookup,
        };
        assert_eq!(classifier.classify(&with_lookup), "finance");

        let with_primary = ThemeInput {
            name: "App",
            genres: &genres,
            genre_ids: &ids,
            primary_genre: Some("Travel"),
            lookup_genres: &[],
        };
        assert_eq!(classifier.classify(&with_primary), "travel");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ThemeConfig::load("does/not/exist.json").unwrap();
        assert_eq!(cfg.rules.len(), 10);
        assert_eq!(cfg.risk_on.len(), 5);
    }

    #[test]
    fn empty_rules_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("chartpulse_theme_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty_rules.json");
        std::fs::write(&path, r#"{"rules": [], "risk_on": [], "risk_off": []}"#).unwrap();

        let cfg = ThemeConfig::load(&path).unwrap();
        assert_eq!(cfg.rules.len(), 10);
        // Default classifier, not one that always answers "other".
        let classifier = ThemeClassifier::new(&cfg);
        let genres = vec!["Games".to_string()];
        let ids = vec![];
        assert_eq!(
            classifier.classify(&ThemeInput {
                name: "x",
                genres: &genres,
                genre_ids: &ids,
                primary_genre: None,
                lookup_genres: &[],
            }),
            "games"
        );
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join("chartpulse_theme_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corrupt.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ThemeConfig::load(&path).is_err());
    }

    #[test]
    fn known_themes_are_sorted_and_include_other() {
        let themes = ThemeConfig::default().known_themes();
        assert!(themes.contains(&"other".to_string()));
        let mut sorted = themes.clone();
        sorted.sort();
        assert_eq!(themes, sorted);
        assert_eq!(themes.len(), 11);
    }
}
