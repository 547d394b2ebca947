use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{AgreementId, AgreementState, CandidateId};

/// Terms both sides settled on during negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementDetails {
    pub provider_id: String,
    pub provider_multi_activity: bool,
    pub requestor_multi_activity: bool,
    pub properties: Value,
}

impl AgreementDetails {
    pub fn has_multi_activity(&self) -> bool {
        self.provider_multi_activity && self.requestor_multi_activity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub candidate_id: CandidateId,
    pub details: AgreementDetails,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl Agreement {
    pub fn new(candidate_id: CandidateId, details: AgreementDetails, confirmed: bool) -> Self {
        Self {
            id: AgreementId::new_v4(),
            candidate_id,
            details,
            confirmed,
            created_at: Utc::now(),
        }
    }
}

/// Registry storage unit: a confirmed agreement plus local usage metadata.
#[derive(Debug, Clone)]
pub struct BufferedAgreement {
    pub agreement: Agreement,
    pub has_multi_activity: bool,
    pub in_use: bool,
    pub state: AgreementState,
}

impl BufferedAgreement {
    pub fn new(agreement: Agreement) -> Self {
        let has_multi_activity = agreement.details.has_multi_activity();
        Self {
            agreement,
            has_multi_activity,
            in_use: false,
            state: AgreementState::Active,
        }
    }

    pub fn id(&self) -> AgreementId {
        self.agreement.id
    }

    pub fn is_idle(&self) -> bool {
        !self.in_use && self.state == AgreementState::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationReason {
    pub message: String,
    pub code: Option<String>,
}

impl TerminationReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Wire form sent to the counterpart.
    pub fn to_json(&self) -> Value {
        let mut reason = Map::new();
        reason.insert("message".to_string(), json!(self.message));
        if let Some(code) = &self.code {
            reason.insert("golem.requestor.code".to_string(), json!(code));
        }
        Value::Object(reason)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(provider: bool, requestor: bool) -> AgreementDetails {
        AgreementDetails {
            provider_id: "provider".to_string(),
            provider_multi_activity: provider,
            requestor_multi_activity: requestor,
            properties: json!({}),
        }
    }

    #[test]
    fn test_multi_activity_requires_both_sides() {
        assert!(details(true, true).has_multi_activity());
        assert!(!details(true, false).has_multi_activity());
        assert!(!details(false, true).has_multi_activity());
        assert!(!details(false, false).has_multi_activity());
    }

    #[test]
    fn test_buffered_agreement_starts_active_and_idle() {
        let agreement = Agreement::new(CandidateId::new_v4(), details(true, true), true);
        let buffered = BufferedAgreement::new(agreement);

        assert!(buffered.has_multi_activity);
        assert!(buffered.is_idle());
        assert_eq!(buffered.state, AgreementState::Active);
    }

    #[test]
    fn test_termination_reason_json() {
        let reason = TerminationReason::new("Work finished").with_code("Success");
        let value = reason.to_json();

        assert_eq!(value["message"], "Work finished");
        assert_eq!(value["golem.requestor.code"], "Success");

        let bare = TerminationReason::new("Cancelled").to_json();
        assert!(bare.get("golem.requestor.code").is_none());
    }
}
