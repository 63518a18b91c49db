//! The display-status projector.
//!
//! Every surface that shows a location's state calls [`project`] — the label
//! is always re-derived from `is_paid_for` and `verification_status`, never
//! stored, so it can't drift from the underlying fields.

use serde::Serialize;

/// The four mutually exclusive human-facing states of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    #[serde(rename = "Pending Verification")]
    PendingVerification,
    #[serde(rename = "Verified")]
    Verified,
    #[serde(rename = "Rejected")]
    Rejected,
}

impl DisplayStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::PendingPayment => "Pending Payment",
            DisplayStatus::PendingVerification => "Pending Verification",
            DisplayStatus::Verified => "Verified",
            DisplayStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derives the display status from the two stored fields.
///
/// An unpaid location has no verification status — whatever
/// `verification_status` holds is ignored until payment settles.
#[must_use]
pub fn project(is_paid_for: bool, verification_status: Option<&str>) -> DisplayStatus {
    if !is_paid_for {
        return DisplayStatus::PendingPayment;
    }
    match verification_status {
        Some("verified") => DisplayStatus::Verified,
        Some("rejected") => DisplayStatus::Rejected,
        _ => DisplayStatus::PendingVerification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaid_location_is_pending_payment() {
        assert_eq!(project(false, None), DisplayStatus::PendingPayment);
        // Paid-for gates everything: a stale status on an unpaid row is ignored.
        assert_eq!(
            project(false, Some("verified")),
            DisplayStatus::PendingPayment
        );
    }

    #[test]
    fn paid_location_without_decision_is_pending_verification() {
        assert_eq!(project(true, None), DisplayStatus::PendingVerification);
        assert_eq!(
            project(true, Some("pending")),
            DisplayStatus::PendingVerification
        );
    }

    #[test]
    fn terminal_statuses_project_to_their_labels() {
        assert_eq!(project(true, Some("verified")), DisplayStatus::Verified);
        assert_eq!(project(true, Some("rejected")), DisplayStatus::Rejected);
    }

    #[test]
    fn projection_is_deterministic() {
        for (paid, status) in [
            (false, None),
            (true, None),
            (true, Some("pending")),
            (true, Some("verified")),
            (true, Some("rejected")),
        ] {
            assert_eq!(project(paid, status), project(paid, status));
        }
    }

    #[test]
    fn serializes_as_the_display_label() {
        let json = serde_json::to_string(&DisplayStatus::PendingVerification).expect("serialize");
        assert_eq!(json, "\"Pending Verification\"");
        let json = serde_json::to_string(&DisplayStatus::PendingPayment).expect("serialize");
        assert_eq!(json, "\"Pending Payment\"");
    }

    #[test]
    fn label_matches_display() {
        assert_eq!(
            DisplayStatus::Rejected.to_string(),
            DisplayStatus::Rejected.label()
        );
    }
}
