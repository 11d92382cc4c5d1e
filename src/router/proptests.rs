//! Property-based tests for the conversation router.
//!
//! Random event sequences for one user are replayed against a small model of
//! the intake phases; the router must agree with the model after every event.

use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::channels::testing::RecordingChannel;
use crate::channels::{Attachment, EventKind, IncomingMessage};
use crate::content::{ContentStore, JobPosting};

const RECRUITER: &str = "recruiter";
const USER: &str = "u1";

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Name,
    Contact,
    Resume,
}

fn phase_of(state: &IntakeState) -> Phase {
    match state {
        IntakeState::Idle => Phase::Idle,
        IntakeState::CollectingName => Phase::Name,
        IntakeState::CollectingContact { .. } => Phase::Contact,
        IntakeState::CollectingResume { .. } => Phase::Resume,
    }
}

/// Expected phase after `kind`, and whether an application completes.
fn model_step(phase: Phase, kind: &EventKind) -> (Phase, bool) {
    match kind {
        EventKind::Action(code) => match Action::parse(code) {
            Some(Action::ReturnToMenu) => (Phase::Idle, false),
            Some(Action::BeginIntake) if phase == Phase::Idle => (Phase::Name, false),
            _ => (phase, false),
        },
        EventKind::Text(text) if !text.trim().is_empty() => match phase {
            Phase::Idle => (Phase::Idle, false),
            Phase::Name => (Phase::Contact, false),
            Phase::Contact => (Phase::Resume, false),
            Phase::Resume => (Phase::Idle, true),
        },
        EventKind::Attachment(_) if phase == Phase::Resume => (Phase::Idle, true),
        _ => (phase, false),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_action() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just("show_posting".to_string()),
        Just("show_faq".to_string()),
        Just("return_to_menu".to_string()),
        Just("begin_intake".to_string()),
        "(salary|schedule|location|requirements|benefits|parking)"
            .prop_map(|key| format!("show_faq_topic:{key}")),
        "[a-z_]{1,12}",
    ]
    .prop_map(EventKind::Action)
}

fn arb_event() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        4 => arb_action(),
        2 => "[A-Za-z@+][A-Za-z0-9 .]{0,15}".prop_map(EventKind::Text),
        1 => " {0,3}".prop_map(EventKind::Text),
        1 => ("[a-z0-9]{4,8}", proptest::option::of("[a-z]{1,8}\\.pdf"))
            .prop_map(|(id, name)| EventKind::Attachment(Attachment::new(id, name))),
        1 => "(start|help)".prop_map(EventKind::Command),
    ]
}

fn router() -> (Arc<RecordingChannel>, ConversationRouter) {
    let channel = Arc::new(RecordingChannel::new());
    let menu = MenuRenderer::new(Arc::new(ContentStore::new(JobPosting::default())), None);
    let dispatcher = Arc::new(NotificationDispatcher::new(channel.clone(), RECRUITER));
    (channel, ConversationRouter::new(menu, dispatcher))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_router_follows_intake_model(events in proptest::collection::vec(arb_event(), 0..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let (channel, router) = router();
            let mut phase = Phase::Idle;
            let mut completed = 0usize;

            for kind in events {
                let (expected, completes) = model_step(phase, &kind);
                let reply = router.route(&IncomingMessage::new("recording", USER, kind.clone())).await;

                prop_assert!(!reply.text.is_empty(), "empty render for {:?}", kind);
                prop_assert!(!reply.controls.is_empty(), "no controls for {:?}", kind);

                let handle = router.sessions().get_or_create(USER).await;
                let actual = phase_of(&handle.lock().await.state);
                prop_assert_eq!(actual, expected, "after {:?} from {:?}", kind, phase);

                if kind == EventKind::Action("return_to_menu".into()) {
                    prop_assert_eq!(actual, Phase::Idle);
                }

                phase = expected;
                completed += usize::from(completes);
                prop_assert_eq!(channel.sent_to(RECRUITER).len(), completed);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_navigation_never_touches_intake(
        codes in proptest::collection::vec(
            prop_oneof![
                Just("show_posting".to_string()),
                Just("show_faq".to_string()),
                "[a-z]{1,10}".prop_map(|key| format!("show_faq_topic:{key}")),
            ],
            1..20,
        ),
        steps_before in 0usize..4,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let (channel, router) = router();
            // Zero to three steps into an intake
            for i in 0..steps_before {
                let kind = if i == 0 {
                    EventKind::Action("begin_intake".into())
                } else {
                    EventKind::Text(format!("value {i}"))
                };
                router.route(&IncomingMessage::new("recording", USER, kind)).await;
            }
            let before = router.sessions().get_or_create(USER).await.lock().await.state.clone();

            for code in codes {
                let reply = router
                    .route(&IncomingMessage::new("recording", USER, EventKind::Action(code)))
                    .await;
                prop_assert!(!reply.text.is_empty());
                prop_assert!(!reply.controls.is_empty());
            }

            let after = router.sessions().get_or_create(USER).await.lock().await.state.clone();
            prop_assert_eq!(after, before);
            prop_assert!(channel.sent_to(RECRUITER).is_empty());
            Ok(())
        })?;
    }
}
