//! Feedback types

use crate::{FeedbackId, UnknownVariant, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse tone of a feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(UnknownVariant::new("sentiment", other)),
        }
    }
}

/// Feedback written by a manager about one of their reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: FeedbackId,
    pub manager_id: UserId,
    pub employee_id: UserId,
    pub strengths: String,
    pub improvements: String,
    pub sentiment: Sentiment,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// Build an unacknowledged record from a submission.
    pub fn from_new(id: FeedbackId, new: NewFeedback, now: DateTime<Utc>) -> Self {
        Self {
            id,
            manager_id: new.manager_id,
            employee_id: new.employee_id,
            strengths: new.strengths,
            improvements: new.improvements,
            sentiment: new.sentiment,
            acknowledged: false,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as acknowledged. Returns false when it already was; the original
    /// acknowledgment time is kept in that case.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_at = Some(at);
        self.updated_at = at;
        true
    }

    /// Apply an edit. Acknowledgment state is untouched.
    pub fn apply(&mut self, patch: &FeedbackPatch, at: DateTime<Utc>) {
        if let Some(strengths) = &patch.strengths {
            self.strengths = strengths.clone();
        }
        if let Some(improvements) = &patch.improvements {
            self.improvements = improvements.clone();
        }
        if let Some(sentiment) = patch.sentiment {
            self.sentiment = sentiment;
        }
        self.updated_at = at;
    }
}

/// Feedback submission; `manager_id` is stamped from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub manager_id: UserId,
    pub employee_id: UserId,
    pub strengths: String,
    pub improvements: String,
    pub sentiment: Sentiment,
}

/// Partial edit of a feedback record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPatch {
    pub strengths: Option<String>,
    pub improvements: Option<String>,
    pub sentiment: Option<Sentiment>,
}

/// Feedback joined with both of the users it refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackWithUsers {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub manager: User,
    pub employee: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Feedback {
        Feedback::from_new(
            1,
            NewFeedback {
                manager_id: 2,
                employee_id: 3,
                strengths: "Clear writing".to_string(),
                improvements: "Estimate more carefully".to_string(),
                sentiment: Sentiment::Positive,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_new_feedback_is_unacknowledged() {
        let feedback = sample();
        assert!(!feedback.acknowledged);
        assert!(feedback.acknowledged_at.is_none());
    }

    #[test]
    fn test_acknowledge_only_sets_timestamp_once() {
        let mut feedback = sample();
        let first = Utc::now();
        assert!(feedback.acknowledge(first));

        let later = first + Duration::minutes(5);
        assert!(!feedback.acknowledge(later));
        assert!(feedback.acknowledged);
        assert_eq!(feedback.acknowledged_at, Some(first));
    }

    #[test]
    fn test_patch_keeps_acknowledgment() {
        let mut feedback = sample();
        let at = Utc::now();
        feedback.acknowledge(at);

        let patch = FeedbackPatch {
            sentiment: Some(Sentiment::Neutral),
            ..Default::default()
        };
        feedback.apply(&patch, at + Duration::seconds(1));

        assert_eq!(feedback.sentiment, Sentiment::Neutral);
        assert_eq!(feedback.strengths, "Clear writing");
        assert!(feedback.acknowledged);
        assert_eq!(feedback.acknowledged_at, Some(at));
    }

    #[test]
    fn test_with_users_serializes_flat() {
        let feedback = sample();
        let now = feedback.created_at;
        let user = |id, role| User {
            id,
            username: format!("user{}", id),
            password_hash: String::new(),
            email: None,
            first_name: None,
            last_name: None,
            role,
            manager_id: None,
            created_at: now,
            updated_at: now,
        };
        let joined = FeedbackWithUsers {
            feedback,
            manager: user(2, crate::Role::Manager),
            employee: user(3, crate::Role::Employee),
        };

        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["employeeId"], 3);
        assert_eq!(json["manager"]["username"], "user2");
        assert_eq!(json["acknowledgedAt"], serde_json::Value::Null);
    }
}
