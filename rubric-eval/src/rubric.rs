//! Rubric schema: criteria, metrics and the full evaluation rubric
//!
//! The wire names (`metric`, `metric_type`, `criteria`, `score`,
//! `determination`) are the ones the model is asked to produce. Shape
//! constraints that serde cannot express are enforced by [`Rubric::validate`],
//! and [`Rubric::from_json`] runs both steps.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::structured::StructuredResponse;

/// Fewest metrics a rubric may contain
pub const MIN_METRICS: usize = 3;
/// Most metrics a rubric may contain
pub const MAX_METRICS: usize = 10;

/// One scored rubric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: i64,
    /// Justification for the score
    pub determination: String,
}

/// One evaluation dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "metric")]
    pub name: String,
    /// Free text such as "Graded (0-5)" or "Binary (Pass/Fail)"
    pub metric_type: String,
    pub criteria: Vec<Criterion>,
}

/// The full evaluation result for one (prompt, response) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub description: String,
    #[serde(rename = "metric")]
    pub metrics: Vec<Metric>,
}

/// Schema validation errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metric: expected between 3 and 10 items, got {count}")]
    MetricCount { count: usize },

    #[error("metric[{metric}].criteria: expected at least 1 item, got 0")]
    EmptyCriteria { metric: usize },

    #[error("metric[{metric}].criteria[{criterion}].determination: must not be empty")]
    EmptyDetermination { metric: usize, criterion: usize },
}

impl Rubric {
    /// Deserialize and validate in one step
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let rubric: Rubric = serde_json::from_str(text)?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Check the constraints serde does not enforce
    pub fn validate(&self) -> Result<(), SchemaError> {
        let count = self.metrics.len();
        if !(MIN_METRICS..=MAX_METRICS).contains(&count) {
            return Err(SchemaError::MetricCount { count });
        }

        for (m, metric) in self.metrics.iter().enumerate() {
            if metric.criteria.is_empty() {
                return Err(SchemaError::EmptyCriteria { metric: m });
            }
            for (c, criterion) in metric.criteria.iter().enumerate() {
                if criterion.determination.trim().is_empty() {
                    return Err(SchemaError::EmptyDetermination {
                        metric: m,
                        criterion: c,
                    });
                }
            }
        }

        Ok(())
    }

    /// Total number of criteria across all metrics
    pub fn criteria_count(&self) -> usize {
        self.metrics.iter().map(|m| m.criteria.len()).sum()
    }

    /// JSON Schema describing the wire shape, with field descriptions and examples
    pub fn json_schema() -> Value {
        json!({
            "title": "Rubric",
            "description": "A list of components to evaluate a Language Model response, including the description of the individual metrics and the set of criteria and scores per metric.",
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "The description of the evaluation"
                },
                "metric": {
                    "type": "array",
                    "minItems": MIN_METRICS,
                    "maxItems": MAX_METRICS,
                    "description": "The metrics used to evaluate the response",
                    "items": {
                        "title": "Metric",
                        "description": "A metric is a set of criteria with numerical scores and descriptions used to evaluate the output of a language model, based on the prompt input.",
                        "type": "object",
                        "properties": {
                            "metric": {
                                "type": "string",
                                "description": "The description of the metric being evaluated"
                            },
                            "metric_type": {
                                "type": "string",
                                "description": "Whether the metric is binary or graded",
                                "examples": ["Graded (0-5)", "Binary (Pass/Fail)"]
                            },
                            "criteria": {
                                "type": "array",
                                "minItems": 1,
                                "description": "The scores used to evaluate the metric",
                                "items": {
                                    "title": "Criterion",
                                    "description": "A score value and the determination that justifies it",
                                    "type": "object",
                                    "properties": {
                                        "score": {
                                            "type": "integer",
                                            "description": "The score given to the response"
                                        },
                                        "determination": {
                                            "type": "string",
                                            "minLength": 1,
                                            "description": "The description that determines the score",
                                            "examples": [
                                                "Score 0 - There is no factual evidence to support the claim",
                                                "Score 1 - There is factual evidence to support the claim"
                                            ]
                                        }
                                    },
                                    "required": ["score", "determination"]
                                }
                            }
                        },
                        "required": ["metric", "metric_type", "criteria"]
                    }
                }
            },
            "required": ["description", "metric"]
        })
    }
}

impl StructuredResponse for Rubric {
    const NAME: &'static str = "Rubric";

    fn json_schema() -> Value {
        Rubric::json_schema()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        Rubric::validate(self)
    }
}

/// Accepts `3`, `3.0` and `"3"`; rejects fractional or non-numeric values
fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match RawScore::deserialize(deserializer)? {
        RawScore::Int(v) => Ok(v),
        RawScore::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        RawScore::Float(v) => Err(D::Error::custom(format!(
            "score must be an integer, got {}",
            v
        ))),
        RawScore::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            D::Error::custom(format!("score must be an integer, got {:?}", s))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_json(name: &str) -> Value {
        json!({
            "metric": name,
            "metric_type": "Graded (0-5)",
            "criteria": [{"score": 3, "determination": "Mostly correct"}]
        })
    }

    fn rubric_json(metric_count: usize) -> String {
        let metrics: Vec<Value> = (0..metric_count)
            .map(|i| metric_json(&format!("Metric {}", i + 1)))
            .collect();
        json!({"description": "test", "metric": metrics}).to_string()
    }

    #[test]
    fn test_metric_count_boundaries() {
        assert!(matches!(
            Rubric::from_json(&rubric_json(2)),
            Err(SchemaError::MetricCount { count: 2 })
        ));
        assert_eq!(Rubric::from_json(&rubric_json(3)).unwrap().metrics.len(), 3);
        assert_eq!(Rubric::from_json(&rubric_json(10)).unwrap().metrics.len(), 10);
        assert!(matches!(
            Rubric::from_json(&rubric_json(11)),
            Err(SchemaError::MetricCount { count: 11 })
        ));
    }

    #[test]
    fn test_empty_determination_rejected() {
        let text = json!({
            "description": "d",
            "metric": [
                metric_json("A"),
                {
                    "metric": "B",
                    "metric_type": "Binary (Pass/Fail)",
                    "criteria": [
                        {"score": 1, "determination": "Pass"},
                        {"score": 0, "determination": ""}
                    ]
                },
                metric_json("C")
            ]
        })
        .to_string();

        let err = Rubric::from_json(&text).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::EmptyDetermination { metric: 1, criterion: 1 }
        ));
        assert!(err.to_string().contains("metric[1].criteria[1].determination"));
    }

    #[test]
    fn test_whitespace_determination_rejected() {
        let text = json!({
            "description": "d",
            "metric": [
                metric_json("A"),
                metric_json("B"),
                {
                    "metric": "C",
                    "metric_type": "Graded (0-5)",
                    "criteria": [{"score": 2, "determination": "   \n"}]
                }
            ]
        })
        .to_string();

        assert!(matches!(
            Rubric::from_json(&text),
            Err(SchemaError::EmptyDetermination { metric: 2, criterion: 0 })
        ));
    }

    #[test]
    fn test_empty_criteria_rejected() {
        let text = json!({
            "description": "d",
            "metric": [
                {"metric": "A", "metric_type": "Graded (0-5)", "criteria": []},
                metric_json("B"),
                metric_json("C")
            ]
        })
        .to_string();

        assert!(matches!(
            Rubric::from_json(&text),
            Err(SchemaError::EmptyCriteria { metric: 0 })
        ));
    }

    #[test]
    fn test_missing_field_is_json_error() {
        let text = json!({"metric": []}).to_string();
        let err = Rubric::from_json(&text).unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_wire_names() {
        let rubric = Rubric::from_json(&rubric_json(3)).unwrap();
        assert_eq!(rubric.metrics[0].name, "Metric 1");
        assert_eq!(rubric.metrics[0].metric_type, "Graded (0-5)");
        assert_eq!(rubric.criteria_count(), 3);

        let value = serde_json::to_value(&rubric).unwrap();
        assert!(value.get("metric").is_some());
        assert_eq!(value["metric"][0]["metric"], "Metric 1");
        assert_eq!(value["metric"][0]["criteria"][0]["score"], 3);
    }

    #[test]
    fn test_score_coercion() {
        let parse = |score: Value| {
            serde_json::from_value::<Criterion>(json!({"score": score, "determination": "x"}))
        };

        assert_eq!(parse(json!(4)).unwrap().score, 4);
        assert_eq!(parse(json!(4.0)).unwrap().score, 4);
        assert_eq!(parse(json!(" 2 ")).unwrap().score, 2);
        assert_eq!(parse(json!(-1)).unwrap().score, -1);
        assert!(parse(json!(2.5)).is_err());
        assert!(parse(json!("three")).is_err());
        assert!(parse(json!(true)).is_err());
    }

    #[test]
    fn test_json_schema_constraints() {
        let schema = Rubric::json_schema();
        let metric = &schema["properties"]["metric"];
        assert_eq!(metric["minItems"], 3);
        assert_eq!(metric["maxItems"], 10);
        assert_eq!(metric["items"]["properties"]["criteria"]["minItems"], 1);
        assert_eq!(
            metric["items"]["properties"]["criteria"]["items"]["required"],
            json!(["score", "determination"])
        );
    }
}
