//! Heuristic content classification for educational documents.
//!
//! Categorization is keyword-presence matching over the lower-cased text and
//! filename; rules are tested in a fixed priority order and the first match
//! wins. The metadata scan (grade level, subject, topics) is independent of
//! categorization and best-effort: missing signals simply leave the field
//! unset.

use crate::models::{ContentCategory, MetadataOverrides};

const LESSON_PLAN_KEYWORDS: &[&str] = &["lesson plan", "objective", "activity", "assessment"];
const ASSESSMENT_KEYWORDS: &[&str] = &["quiz", "test", "question", "answer", "multiple choice"];
const STUDENT_WORK_KEYWORDS: &[&str] = &["assignment", "homework", "project", "student work"];
const PARENT_KEYWORDS: &[&str] = &["parent", "guardian", "communication", "progress report"];
const CURRICULUM_FILENAME_KEYWORDS: &[&str] = &["curriculum", "standard", "guideline"];

/// First match wins, scanned in order: earlier grades shadow later ones.
const GRADE_PATTERNS: &[&str] = &[
    "kindergarten",
    "1st grade",
    "2nd grade",
    "3rd grade",
    "4th grade",
    "5th grade",
    "grade 1",
    "grade 2",
    "grade 3",
    "grade 4",
    "grade 5",
    "grade 6",
    "elementary",
    "middle school",
    "high school",
];

const SUBJECTS: &[&str] = &[
    "mathematics",
    "math",
    "science",
    "biology",
    "chemistry",
    "physics",
    "english",
    "language arts",
    "reading",
    "writing",
    "history",
    "social studies",
    "geography",
    "art",
    "music",
    "physical education",
];

const TOPIC_KEYWORDS: &[&str] = &[
    "fractions",
    "multiplication",
    "division",
    "photosynthesis",
    "solar system",
    "grammar",
    "vocabulary",
    "civil war",
    "democracy",
    "ecosystem",
];

/// Classify extracted text into a content category.
pub fn classify(text: &str, filename: &str) -> ContentCategory {
    let text_lower = text.to_lowercase();
    let filename_lower = filename.to_lowercase();

    let contains_any = |haystack: &str, needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    if contains_any(&text_lower, LESSON_PLAN_KEYWORDS) {
        ContentCategory::LessonPlan
    } else if contains_any(&text_lower, ASSESSMENT_KEYWORDS) {
        ContentCategory::Assessment
    } else if contains_any(&text_lower, STUDENT_WORK_KEYWORDS) {
        ContentCategory::StudentWork
    } else if contains_any(&text_lower, PARENT_KEYWORDS) {
        ContentCategory::ParentCommunication
    } else if contains_any(&filename_lower, CURRICULUM_FILENAME_KEYWORDS) {
        ContentCategory::Curriculum
    } else {
        ContentCategory::General
    }
}

/// Detected educational signals: one grade level, one subject, all topics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EducationalSignals {
    pub grade_level: Option<String>,
    pub subject: Option<String>,
    pub topics: Vec<String>,
}

/// Scan text for grade level, subject, and topic signals.
pub fn extract_signals(text: &str) -> EducationalSignals {
    let text_lower = text.to_lowercase();

    let grade_level = GRADE_PATTERNS
        .iter()
        .find(|p| text_lower.contains(**p))
        .map(|p| p.to_string());

    let subject = SUBJECTS
        .iter()
        .find(|s| text_lower.contains(**s))
        .map(|s| s.to_string());

    let topics: Vec<String> = TOPIC_KEYWORDS
        .iter()
        .filter(|k| text_lower.contains(**k))
        .map(|k| k.to_string())
        .collect();

    EducationalSignals {
        grade_level,
        subject,
        topics,
    }
}

impl EducationalSignals {
    /// Express the detected signals as overrides with no custom extras,
    /// convenient for seeding `DocumentMetadata`.
    pub fn into_overrides(self) -> MetadataOverrides {
        MetadataOverrides {
            category: None,
            grade_level: self.grade_level,
            subject: self.subject,
            topics: if self.topics.is_empty() {
                None
            } else {
                Some(self.topics)
            },
            extra: Default::default(),
        }
    }
}
