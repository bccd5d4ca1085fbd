//! Keyword-based stand-in for an AI triage model.
//!
//! Scores a free-text description against per-category keyword lists and
//! derives a suggested category, priority and confidence. Deterministic, so
//! intake results are reproducible in tests.

use std::sync::LazyLock;

use db::models::report::{ReportCategory, ReportPriority};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+").expect("valid word regex"));

/// Declaration order breaks ties between categories with equal hits.
const CATEGORY_KEYWORDS: &[(ReportCategory, &[&str])] = &[
    (
        ReportCategory::Pothole,
        &["pothole", "potholes", "crack", "cracked", "asphalt", "pavement", "road"],
    ),
    (
        ReportCategory::Streetlight,
        &["streetlight", "streetlights", "lamp", "light", "lights", "dark", "bulb"],
    ),
    (
        ReportCategory::Garbage,
        &["garbage", "trash", "rubbish", "litter", "waste", "dumping", "bin", "bins"],
    ),
    (
        ReportCategory::Water,
        &["water", "pipe", "pipes", "leak", "leaking", "hydrant", "tap", "supply"],
    ),
    (
        ReportCategory::Sewage,
        &["sewage", "sewer", "drain", "drainage", "manhole", "smell", "overflow"],
    ),
    (
        ReportCategory::Traffic,
        &["traffic", "signal", "sign", "intersection", "crossing", "congestion", "parking"],
    ),
    (
        ReportCategory::Vandalism,
        &["graffiti", "vandalism", "vandalized", "smashed", "damaged", "defaced"],
    ),
];

const CRITICAL_KEYWORDS: &[&str] = &[
    "danger",
    "dangerous",
    "injury",
    "injured",
    "fire",
    "flood",
    "flooding",
    "collapsed",
    "collapse",
    "emergency",
    "electrocution",
    "exposed",
];

const HIGH_KEYWORDS: &[&str] = &[
    "broken", "blocked", "leak", "leaking", "urgent", "overflow", "accident", "deep",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AiAnalysis {
    pub suggested_category: ReportCategory,
    pub suggested_priority: ReportPriority,
    pub confidence: f64,
    pub keywords: Vec<String>,
    pub summary: String,
}

pub fn analyze_description(description: &str) -> AiAnalysis {
    let lowered = description.to_lowercase();
    let words: Vec<&str> = WORD_RE.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut best: Option<(ReportCategory, usize)> = None;
    let mut keywords: Vec<String> = Vec::new();
    for (category, list) in CATEGORY_KEYWORDS {
        let hits: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| list.contains(w))
            .collect();
        if hits.is_empty() {
            continue;
        }
        if best.is_none_or(|(_, count)| hits.len() > count) {
            best = Some((*category, hits.len()));
        }
        for hit in hits {
            if !keywords.iter().any(|k| k == hit) {
                keywords.push(hit.to_string());
            }
        }
    }

    let urgency = |list: &[&str]| words.iter().any(|w| list.contains(w));
    let (category, hits) = best.unwrap_or((ReportCategory::Other, 0));
    let priority = if urgency(CRITICAL_KEYWORDS) {
        ReportPriority::Critical
    } else if urgency(HIGH_KEYWORDS) {
        ReportPriority::High
    } else if hits > 0 {
        ReportPriority::Medium
    } else {
        ReportPriority::Low
    };

    let confidence = if hits == 0 {
        0.0
    } else {
        let raw = hits as f64 / (hits as f64 + 2.0);
        (raw * 100.0).round() / 100.0
    };

    let summary = if hits == 0 {
        format!("No known issue keywords found; filed as {category} with {priority} priority")
    } else {
        format!(
            "Looks like a {category} issue ({hits} keyword match{}), {priority} priority",
            if hits == 1 { "" } else { "es" }
        )
    };

    AiAnalysis {
        suggested_category: category,
        suggested_priority: priority,
        confidence,
        keywords,
        summary,
    }
}
