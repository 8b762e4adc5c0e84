//! Seeded error subtypes and classification, grounded on
//! `original_source/core/error_types.py::ErrorTypeSystem`.

use crate::category::{ErrorCategory, Severity};

/// A single seeded subtype: a name, its keyword set, and a handful of
/// canonical examples used for the self-consistency test below.
#[derive(Debug, Clone)]
pub struct ErrorSubtype {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: ErrorCategory,
    pub keywords: &'static [&'static str],
    pub examples: &'static [&'static str],
}

impl ErrorSubtype {
    /// Case-insensitive substring scan over `text` for any seeded keyword.
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()))
    }
}

const SYSTEMATIC: &[ErrorSubtype] = &[
    ErrorSubtype {
        name: "verb_conjugation",
        display_name: "動詞變位",
        category: ErrorCategory::Systematic,
        keywords: &["conjugation", "verb form", "動詞變位", "變位"],
        examples: &["I don't understand this verb form error.", "My conjugation of 'to be' was wrong."],
    },
    ErrorSubtype {
        name: "tense",
        display_name: "時態",
        category: ErrorCategory::Systematic,
        keywords: &["tense", "時態", "past tense", "present tense"],
        examples: &["I used the wrong past tense here.", "My tense usage confused the reader."],
    },
    ErrorSubtype {
        name: "voice",
        display_name: "語態",
        category: ErrorCategory::Systematic,
        keywords: &["voice", "passive", "active voice", "語態", "被動"],
        examples: &["I used passive voice awkwardly.", "The voice of this sentence is wrong."],
    },
    ErrorSubtype {
        name: "agreement",
        display_name: "一致性",
        category: ErrorCategory::Systematic,
        keywords: &["agreement", "subject-verb", "一致性", "單複數"],
        examples: &["This is a subject-verb agreement mistake.", "Agreement between subject and verb failed."],
    },
];

const ISOLATED: &[ErrorSubtype] = &[
    ErrorSubtype {
        name: "vocabulary",
        display_name: "詞彙",
        category: ErrorCategory::Isolated,
        keywords: &["vocabulary", "word choice", "詞彙", "用詞"],
        examples: &[
            "My vocabulary was too simple when I wrote 'boring' instead of 'bored'.",
            "The word choice in this sentence sounds a bit off.",
        ],
    },
    ErrorSubtype {
        name: "collocation",
        display_name: "搭配",
        category: ErrorCategory::Isolated,
        keywords: &["collocation", "搭配", "word pairing"],
        examples: &[
            "'Did a mistake' is a common collocation error; it should be 'made a mistake'.",
            "This word pairing, 'made her homework', should be 'did her homework'.",
        ],
    },
    ErrorSubtype {
        name: "preposition",
        display_name: "介系詞",
        category: ErrorCategory::Isolated,
        keywords: &["preposition", "介系詞", "介詞"],
        examples: &[
            "I used the wrong preposition when I said 'good in math' instead of 'good at math'.",
            "He arrived to the airport late — the preposition should have been 'at'.",
        ],
    },
    ErrorSubtype {
        name: "spelling",
        display_name: "拼字",
        category: ErrorCategory::Isolated,
        keywords: &["spelling", "拼字", "misspelled"],
        examples: &[
            "I misspelled 'receive' as 'recieve', a common spelling mistake.",
            "My spelling of 'definitely' as 'definately' needs fixing.",
        ],
    },
];

const ENHANCEMENT: &[ErrorSubtype] = &[
    ErrorSubtype {
        name: "naturalness",
        display_name: "自然度",
        category: ErrorCategory::Enhancement,
        keywords: &["naturalness", "natural", "更自然", "更道地", "不夠自然"],
        examples: &["This sentence would sound more natural as...", "A native speaker would phrase this more naturally."],
    },
    ErrorSubtype {
        name: "style",
        display_name: "風格",
        category: ErrorCategory::Enhancement,
        keywords: &["style", "風格", "更好", "phrasing"],
        examples: &["The style of this phrasing could be tightened up.", "This phrasing works but a better style is possible."],
    },
];

const OTHER: &[ErrorSubtype] = &[
    ErrorSubtype {
        name: "omission",
        display_name: "遺漏",
        category: ErrorCategory::Other,
        keywords: &["omission", "missing", "遺漏", "漏掉"],
        examples: &[
            "I had an omission of the verb 'am' in 'I going to the store.'",
            "There's a missing verb in 'She the best student in class.'",
        ],
    },
    ErrorSubtype {
        name: "misunderstanding",
        display_name: "誤解",
        category: ErrorCategory::Other,
        keywords: &["misunderstanding", "misunderstood", "誤解", "誤用"],
        examples: &[
            "He misunderstood the meaning of the idiom entirely.",
            "I had a misunderstanding about what 'actually' means.",
        ],
    },
];

/// Fallback subtype used when no seeded keyword matches within a category.
pub const UNCLASSIFIED: &str = "unclassified";

fn subtypes_for(category: ErrorCategory) -> &'static [ErrorSubtype] {
    match category {
        ErrorCategory::Systematic => SYSTEMATIC,
        ErrorCategory::Isolated => ISOLATED,
        ErrorCategory::Enhancement => ENHANCEMENT,
        ErrorCategory::Other => OTHER,
    }
}

/// All seeded subtypes across all four categories, in display order.
pub fn all_subtypes() -> impl Iterator<Item = &'static ErrorSubtype> {
    ErrorCategory::DISPLAY_ORDER
        .iter()
        .flat_map(|c| subtypes_for(*c).iter())
}

/// Classifies a reported mistake into a category and seeded subtype name.
///
/// `severity == Minor`, or a direct match against one of the Enhancement
/// subtypes' own keywords, routes straight through the Enhancement
/// subtypes first (falling back to "style" if minor severity forced the
/// branch but no keyword matched). Otherwise subtypes are scanned
/// Systematic → Isolated → Other, first match wins; if nothing matches at
/// all, the point falls back to `(Other, "unclassified")`.
pub fn classify(key_point: &str, explanation: &str, severity: Severity) -> (ErrorCategory, &'static str) {
    let combined = format!("{} {}", key_point, explanation).to_lowercase();

    let enhancement_match = ENHANCEMENT.iter().find(|s| s.matches(&combined));

    if severity == Severity::Minor || enhancement_match.is_some() {
        if let Some(sub) = enhancement_match {
            return (ErrorCategory::Enhancement, sub.name);
        }
        return (ErrorCategory::Enhancement, "style");
    }

    for category in [ErrorCategory::Systematic, ErrorCategory::Isolated, ErrorCategory::Other] {
        if let Some(sub) = subtypes_for(category).iter().find(|s| s.matches(&combined)) {
            return (category, sub.name);
        }
    }

    (ErrorCategory::Other, UNCLASSIFIED)
}

/// Chinese learning advice for a category, with subtype-specific wording
/// appended when the subtype is seeded (unclassified points get only the
/// category-level advice).
pub fn advice_for(category: ErrorCategory, subtype_name: &str) -> String {
    let base = match category {
        ErrorCategory::Systematic => "這是系統性錯誤，代表你對這個文法規則的掌握還不穩定，建議多做相關句型練習。",
        ErrorCategory::Isolated => "這是單一性錯誤，通常只要記住這個特定用法就能避免再犯。",
        ErrorCategory::Enhancement => "這不是錯誤，而是讓表達更自然道地的建議，可以學起來讓你的英文更流暢。",
        ErrorCategory::Other => "這是其他類型的錯誤，建議仔細閱讀修改建議以理解原因。",
    };

    match subtypes_for(category).iter().find(|s| s.name == subtype_name) {
        Some(sub) => format!("{} (子類型：{})", base, sub.display_name),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_severity_forces_enhancement() {
        let (category, _) = classify("word order", "slightly awkward phrasing", Severity::Minor);
        assert_eq!(category, ErrorCategory::Enhancement);
    }

    #[test]
    fn naturalness_keyword_forces_enhancement_even_if_major() {
        let (category, subtype) = classify("更自然的說法", "could be more natural", Severity::Major);
        assert_eq!(category, ErrorCategory::Enhancement);
        assert_eq!(subtype, "naturalness");
    }

    #[test]
    fn unmatched_major_error_falls_back_to_other_unclassified() {
        let (category, subtype) = classify("xyzzy plugh", "no seeded keyword appears here", Severity::Major);
        assert_eq!(category, ErrorCategory::Other);
        assert_eq!(subtype, UNCLASSIFIED);
    }

    /// Every seeded subtype's own example sentences must route back to
    /// that same subtype under a major-severity classification — the
    /// corpus's keyword tables must actually be self-consistent.
    #[test]
    fn seeded_subtypes_are_self_consistent() {
        for subtype in all_subtypes() {
            for example in subtype.examples {
                let (category, name) = classify(example, "", Severity::Major);
                assert_eq!(category, subtype.category, "category mismatch for {}: {}", subtype.name, example);
                assert_eq!(name, subtype.name, "subtype mismatch for {}: {}", subtype.name, example);
            }
        }
    }

    #[test]
    fn advice_mentions_subtype_display_name() {
        let advice = advice_for(ErrorCategory::Systematic, "tense");
        assert!(advice.contains("時態"));
    }
}
