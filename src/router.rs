//! Conversation router: sends each inbound event to stateless navigation or
//! to the user's intake step.
//!
//! Decision order (first match wins):
//! 1. A known action is dispatched whatever the session state. Navigation
//!    always renders; `return_to_menu` also discards any partial intake and
//!    `begin_intake` starts an intake unless one is already running.
//! 2. While an intake runs, text, attachments and commands go to the step.
//! 3. Anything else re-renders the current prompt or the main menu.

use std::sync::Arc;

use crate::channels::{EventKind, IncomingMessage, OutgoingMessage};
use crate::intake::{self, Applicant, ApplicationRecord, Field, IntakeInput, IntakeState, StepOutcome};
use crate::menu::{Action, MenuKind, MenuRenderer, Render};
use crate::notify::NotificationDispatcher;
use crate::session::{Session, SessionStore};

/// Shown to the candidate once an intake completes, whatever the delivery outcome.
pub const CONFIRMATION_TEXT: &str = "✅ *Thank you for applying!* We will get in touch soon.\n\n\
                                     If you have any more questions, just ask!";

/// Prefix of the re-prompt when `begin_intake` arrives mid-intake.
pub const ALREADY_APPLYING_TEXT: &str = "You already have an application in progress. \
                                         Finish it, or go back to the main menu to start a new one.";

/// Where an event goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Action(Action),
    Intake(IntakeInput),
    Fallback,
}

impl Route {
    /// Pick the route for an event given the session's current state.
    pub fn classify(kind: &EventKind, state: &IntakeState) -> Route {
        if let EventKind::Action(code) = kind {
            match Action::parse(code) {
                Some(action) => return Route::Action(action),
                None => tracing::debug!(code = %code, "Unknown action code"),
            }
        }

        if state.is_collecting() {
            match kind {
                EventKind::Text(text) => return Route::Intake(IntakeInput::Text(text.clone())),
                EventKind::Attachment(a) => {
                    return Route::Intake(IntakeInput::Attachment(a.clone()));
                }
                EventKind::Command(name) => {
                    return Route::Intake(IntakeInput::Command(name.clone()));
                }
                EventKind::Action(_) => {}
            }
        }

        Route::Fallback
    }
}

/// Owns the session map and drives menus, intake and delivery.
pub struct ConversationRouter {
    menu: MenuRenderer,
    sessions: SessionStore,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ConversationRouter {
    pub fn new(menu: MenuRenderer, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            menu,
            sessions: SessionStore::new(),
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Handle one event to completion and produce the reply.
    ///
    /// The user's session stays locked for the whole call, including any
    /// recruiter delivery, so events for one user apply strictly in turn.
    pub async fn route(&self, event: &IncomingMessage) -> OutgoingMessage {
        let handle = self.sessions.get_or_create(&event.user_id).await;
        let mut session = handle.lock().await;
        session.touch();

        let route = Route::classify(&event.kind, &session.state);
        let render = match route {
            Route::Action(action) => self.act(action, &mut session),
            Route::Intake(input) => self.intake_step(input, &mut session, event).await,
            Route::Fallback => self.fallback(&session),
        };

        OutgoingMessage::reply(event, render)
    }

    fn act(&self, action: Action, session: &mut Session) -> Render {
        match action {
            Action::ShowPosting => self.menu.render(MenuKind::Posting),
            Action::ShowFaq => self.menu.render(MenuKind::FaqTopics),
            Action::ShowFaqTopic(key) => self.menu.faq_answer(&key),
            Action::BeginIntake => self.begin_intake(session),
            Action::ReturnToMenu => {
                if session.state.is_collecting() {
                    tracing::info!(
                        user_id = %session.user_id,
                        state = %session.state,
                        "Intake abandoned"
                    );
                }
                session.reset();
                self.menu.render(MenuKind::Main)
            }
        }
    }

    fn begin_intake(&self, session: &mut Session) -> Render {
        match session.state.begin() {
            Some(next) => {
                session.state = next;
                tracing::info!(user_id = %session.user_id, "Intake started");
                self.menu.intake_prompt(Field::Name.prompt())
            }
            None => {
                let field = session.state.awaiting().unwrap_or(Field::Name);
                self.menu
                    .intake_prompt(format!("{ALREADY_APPLYING_TEXT}\n\n{}", field.prompt()))
            }
        }
    }

    async fn intake_step(
        &self,
        input: IntakeInput,
        session: &mut Session,
        event: &IncomingMessage,
    ) -> Render {
        let step = intake::step(&session.state, input);
        session.state = step.next;

        match step.outcome {
            StepOutcome::Advanced(field) => self.menu.intake_prompt(field.prompt()),
            StepOutcome::Rejected(field) => self.menu.intake_prompt(field.reprompt()),
            StepOutcome::Completed(done) => {
                let record = ApplicationRecord::new(
                    done.name,
                    done.contact,
                    done.resume,
                    Applicant {
                        user_id: event.user_id.clone(),
                        username: event.username.clone(),
                    },
                );
                tracing::info!(
                    user_id = %event.user_id,
                    application_id = %record.id,
                    "Intake complete"
                );
                let result = self.dispatcher.deliver(&record).await;
                tracing::debug!(application_id = %record.id, ?result, "Delivery finished");
                self.menu.with_main_menu(CONFIRMATION_TEXT)
            }
            StepOutcome::NotCollecting => self.menu.render(MenuKind::Main),
        }
    }

    fn fallback(&self, session: &Session) -> Render {
        match session.state.awaiting() {
            Some(field) => self.menu.intake_prompt(field.reprompt()),
            None => self.menu.render(MenuKind::Main),
        }
    }
}

#[cfg(test)]
mod proptests;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Attachment;

    fn action(code: &str) -> EventKind {
        EventKind::Action(code.to_string())
    }

    #[test]
    fn actions_win_in_every_state() {
        let states = [
            IntakeState::Idle,
            IntakeState::CollectingName,
            IntakeState::CollectingContact { name: "A".into() },
            IntakeState::CollectingResume {
                name: "A".into(),
                contact: "B".into(),
            },
        ];
        for state in &states {
            assert_eq!(
                Route::classify(&action("show_faq"), state),
                Route::Action(Action::ShowFaq)
            );
            assert_eq!(
                Route::classify(&action("return_to_menu"), state),
                Route::Action(Action::ReturnToMenu)
            );
            assert_eq!(
                Route::classify(&action("show_faq_topic:salary"), state),
                Route::Action(Action::ShowFaqTopic("salary".into()))
            );
            assert_eq!(
                Route::classify(&action("begin_intake"), state),
                Route::Action(Action::BeginIntake)
            );
        }
    }

    #[test]
    fn free_input_goes_to_intake_only_while_collecting() {
        let text = EventKind::Text("Anna".into());
        assert_eq!(
            Route::classify(&text, &IntakeState::CollectingName),
            Route::Intake(IntakeInput::Text("Anna".into()))
        );
        assert_eq!(Route::classify(&text, &IntakeState::Idle), Route::Fallback);

        let doc = EventKind::Attachment(Attachment::new("d", None));
        assert_eq!(Route::classify(&doc, &IntakeState::Idle), Route::Fallback);
    }

    #[test]
    fn commands_mid_intake_reach_the_step() {
        assert_eq!(
            Route::classify(
                &EventKind::Command("start".into()),
                &IntakeState::CollectingName
            ),
            Route::Intake(IntakeInput::Command("start".into()))
        );
        assert_eq!(
            Route::classify(&EventKind::Command("start".into()), &IntakeState::Idle),
            Route::Fallback
        );
    }

    #[test]
    fn unknown_action_falls_back() {
        assert_eq!(
            Route::classify(&action("vacancy"), &IntakeState::CollectingName),
            Route::Fallback
        );
    }
}
