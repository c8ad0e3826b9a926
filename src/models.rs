use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scholarship {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub deadline: NaiveDate,
    pub description: String,
    #[serde(rename = "criteria_text", alias = "eligibility")]
    pub eligibility: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Scholarship {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScholarshipWeights {
    #[serde(default)]
    pub academics: f64,
    #[serde(default)]
    pub leadership: f64,
    #[serde(default)]
    pub community_service: f64,
    #[serde(default)]
    pub financial_need: f64,
    #[serde(default)]
    pub innovation: f64,
}

impl ScholarshipWeights {
    /// Weights ordered from most to least important.
    pub fn ranked(&self) -> Vec<(&'static str, f64)> {
        let mut values = vec![
            ("academics", self.academics),
            ("leadership", self.leadership),
            ("community_service", self.community_service),
            ("financial_need", self.financial_need),
            ("innovation", self.innovation),
        ];
        values.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipAnalysis {
    pub scholarship_id: String,
    pub weights: ScholarshipWeights,
    #[serde(default, deserialize_with = "string_or_list")]
    pub tone: Vec<String>,
    pub priority_summary: String,
    #[serde(default)]
    pub evidence_snippets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub role: String,
    pub company: String,
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extracurricular {
    pub role: String,
    pub organization: String,
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    #[serde(alias = "major")]
    pub field_of_study: String,
    pub degree_level: String,
    pub year: String,
    pub gpa: f64,
    pub financial_need: bool,
    pub nationality: String,
    pub country: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub extracurriculars: Vec<Extracurricular>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub stories: Vec<String>,
    #[serde(default)]
    pub target_universities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScholarshipMatch {
    pub student_id: String,
    pub scholarship_id: String,
    pub match_score: u8,
    #[serde(default)]
    pub top_reasons: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MatchRequest<'a> {
    pub student: &'a StudentProfile,
    pub scholarship: &'a Scholarship,
    pub analysis: &'a ScholarshipAnalysis,
}

#[derive(Debug, Serialize)]
pub struct SpecificEssayRequest<'a> {
    pub student: &'a StudentProfile,
    pub scholarship: &'a Scholarship,
    pub analysis: &'a ScholarshipAnalysis,
    #[serde(rename = "match")]
    pub matched: &'a StudentScholarshipMatch,
}

#[derive(Debug, Deserialize)]
pub struct EssayResponse {
    pub essay: String,
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tone {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Tone::deserialize(deserializer)? {
        Tone::One(value) => value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Tone::Many(values) => values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scholarship_uses_criteria_text_on_the_wire() {
        let raw = r#"{
            "id": "sch_001",
            "name": "Future Leaders Award",
            "amount": 5000,
            "deadline": "2025-12-01",
            "description": "Leadership in the community.",
            "criteria_text": "Undergraduates with a 3.0 GPA.",
            "tags": ["leadership", "community"]
        }"#;

        let scholarship: Scholarship = serde_json::from_str(raw).unwrap();
        assert_eq!(scholarship.eligibility, "Undergraduates with a 3.0 GPA.");
        assert_eq!(
            scholarship.deadline,
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
        );

        let value = serde_json::to_value(&scholarship).unwrap();
        assert_eq!(value["criteria_text"], "Undergraduates with a 3.0 GPA.");
        assert_eq!(value["deadline"], "2025-12-01");
    }

    #[test]
    fn malformed_deadline_is_rejected() {
        let raw = r#"{
            "id": "sch_x", "name": "x", "amount": 1, "deadline": "12/01/2025",
            "description": "", "criteria_text": "", "tags": []
        }"#;
        assert!(serde_json::from_str::<Scholarship>(raw).is_err());
    }

    #[test]
    fn tone_accepts_string_or_list() {
        let single: ScholarshipAnalysis = serde_json::from_value(serde_json::json!({
            "scholarship_id": "sch_001",
            "weights": {"academics": 0.4},
            "tone": "earnest, community-minded",
            "priority_summary": "Values service."
        }))
        .unwrap();
        assert_eq!(single.tone, vec!["earnest", "community-minded"]);
        assert_eq!(single.weights.leadership, 0.0);

        let list: ScholarshipAnalysis = serde_json::from_value(serde_json::json!({
            "scholarship_id": "sch_001",
            "weights": {},
            "tone": ["confident"],
            "priority_summary": "",
            "evidence_snippets": ["must demonstrate leadership"]
        }))
        .unwrap();
        assert_eq!(list.tone, vec!["confident"]);
        assert_eq!(list.evidence_snippets.len(), 1);
    }

    #[test]
    fn ranked_weights_put_highest_first() {
        let weights = ScholarshipWeights {
            academics: 0.2,
            leadership: 0.9,
            community_service: 0.5,
            financial_need: 0.0,
            innovation: 0.1,
        };
        let ranked = weights.ranked();
        assert_eq!(ranked[0].0, "leadership");
        assert_eq!(ranked[4].0, "financial_need");
    }

    #[test]
    fn specific_essay_request_nests_match_key() {
        let student: StudentProfile = serde_json::from_value(serde_json::json!({
            "id": "stu_001", "name": "Avery Lee", "major": "Biology",
            "degree_level": "undergraduate", "year": "Junior", "gpa": 3.7,
            "financial_need": true, "nationality": "US", "country": "US"
        }))
        .unwrap();
        assert_eq!(student.field_of_study, "Biology");

        let scholarship = Scholarship {
            id: "sch_001".to_string(),
            name: "Award".to_string(),
            amount: 5000,
            deadline: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            description: String::new(),
            eligibility: String::new(),
            tags: vec![],
        };
        let analysis = ScholarshipAnalysis {
            scholarship_id: "sch_001".to_string(),
            weights: ScholarshipWeights::default(),
            tone: vec![],
            priority_summary: String::new(),
            evidence_snippets: vec![],
        };
        let matched = StudentScholarshipMatch {
            student_id: "stu_001".to_string(),
            scholarship_id: "sch_001".to_string(),
            match_score: 82,
            top_reasons: vec!["Strong GPA".to_string()],
        };

        let body = serde_json::to_value(SpecificEssayRequest {
            student: &student,
            scholarship: &scholarship,
            analysis: &analysis,
            matched: &matched,
        })
        .unwrap();
        assert_eq!(body["match"]["match_score"], 82);
        assert_eq!(body["student"]["id"], "stu_001");
        assert!(body.get("matched").is_none());
    }
}
