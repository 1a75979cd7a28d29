// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier dispatch service.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Courier workspace. Storage backends and
//! message senders implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    Account, AdapterType, AgentTransfer, BreachKind, Campaign, CampaignStatus, Contact,
    HealthStatus, Message, MessageDirection, MessageStatus, QueueEntry, ReceiptStatus, Recipient,
    RecipientOutcome, RecipientStatus, SendJob, SlaBreach, StatsSnapshot, Template,
    TemplateParams, TransferStatus,
};

// Re-export all adapter traits at crate root.
pub use traits::{MessageSender, PeriodicTask, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::*;
    use crate::types::{format_timestamp, now_timestamp, parse_timestamp};

    const ALL_STATUSES: [CampaignStatus; 6] = [
        CampaignStatus::Draft,
        CampaignStatus::Scheduled,
        CampaignStatus::Processing,
        CampaignStatus::Paused,
        CampaignStatus::Cancelled,
        CampaignStatus::Completed,
    ];

    #[test]
    fn campaign_status_parses_snake_case() {
        for status in ALL_STATUSES {
            let s = status.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(CampaignStatus::from_str(&s).unwrap(), status);
        }
        let json = serde_json::to_string(&CampaignStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [CampaignStatus::Cancelled, CampaignStatus::Completed] {
            assert!(from.is_terminal());
            for to in ALL_STATUSES {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn only_processing_completes() {
        for from in ALL_STATUSES {
            let allowed = from.can_transition_to(CampaignStatus::Completed);
            assert_eq!(allowed, from == CampaignStatus::Processing, "{from}");
        }
    }

    #[test]
    fn pause_resume_cycle_is_allowed() {
        assert!(CampaignStatus::Processing.can_transition_to(CampaignStatus::Paused));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Processing));
        assert!(!CampaignStatus::Paused.can_transition_to(CampaignStatus::Completed));
    }

    #[test]
    fn send_job_ignores_unknown_fields() {
        let raw = r#"{
            "campaign_id": "c1",
            "recipient_id": "r1",
            "organization_id": "org",
            "phone_number": "15550001",
            "enqueued_at": "2026-01-01T00:00:00.000Z",
            "priority": 7
        }"#;
        let job: SendJob = serde_json::from_str(raw).unwrap();
        assert_eq!(job.recipient_id, "r1");
        assert!(job.recipient_name.is_none());
        assert!(job.template_params.is_empty());
    }

    #[test]
    fn send_job_copies_recipient_fields() {
        let campaign = Campaign::draft("org", "spring", "main", "promo");
        let mut params = TemplateParams::new();
        params.insert("1".into(), serde_json::json!("Ada"));
        let recipient = Recipient::pending(&campaign.id, "+15550001", Some("Ada".into()), params);
        let job = SendJob::for_recipient(&campaign, &recipient);
        assert_eq!(job.campaign_id, campaign.id);
        assert_eq!(job.organization_id, "org");
        assert_eq!(job.phone_number, "+15550001");
        assert_eq!(job.template_params["1"], "Ada");
    }

    #[test]
    fn snapshot_mirrors_counters() {
        let mut campaign = Campaign::draft("org", "spring", "main", "promo");
        campaign.sent_count = 3;
        campaign.failed_count = 1;
        let snap = campaign.snapshot();
        assert_eq!(snap.sent_count, 3);
        assert_eq!(snap.failed_count, 1);
        assert_eq!(campaign.processed_count(), 4);
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let now = now_timestamp();
        assert_eq!(now.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(now.ends_with('Z'));
        let parsed = parse_timestamp(&now).unwrap();
        assert_eq!(format_timestamp(parsed), now);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_message_sender<T: MessageSender>() {}
        fn _assert_periodic_task<T: PeriodicTask>() {}
    }

    proptest! {
        #[test]
        fn transitions_never_leave_terminal(from in 0usize..6, to in 0usize..6) {
            let from = ALL_STATUSES[from];
            let to = ALL_STATUSES[to];
            if from.can_transition_to(to) {
                prop_assert!(!from.is_terminal());
                prop_assert_ne!(from, to);
            }
        }
    }
}
