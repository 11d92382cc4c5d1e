//! Menu renderer: maps a navigation view to message text and controls.
//!
//! Every function here is pure: nothing reads or touches a user session.

use std::fmt;
use std::sync::Arc;

use crate::content::ContentStore;

/// Prefix of the per-topic FAQ action code.
const FAQ_TOPIC_PREFIX: &str = "show_faq_topic:";

/// A navigation action carried by a control press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ShowPosting,
    ShowFaq,
    ShowFaqTopic(String),
    BeginIntake,
    ReturnToMenu,
}

impl Action {
    /// Parse an opaque action code. Unknown codes yield `None`.
    pub fn parse(code: &str) -> Option<Action> {
        match code {
            "show_posting" => Some(Action::ShowPosting),
            "show_faq" => Some(Action::ShowFaq),
            "begin_intake" => Some(Action::BeginIntake),
            "return_to_menu" => Some(Action::ReturnToMenu),
            other => other
                .strip_prefix(FAQ_TOPIC_PREFIX)
                .map(|key| Action::ShowFaqTopic(key.to_string())),
        }
    }

    /// The wire form of this action.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ShowPosting => write!(f, "show_posting"),
            Action::ShowFaq => write!(f, "show_faq"),
            Action::ShowFaqTopic(key) => write!(f, "{FAQ_TOPIC_PREFIX}{key}"),
            Action::BeginIntake => write!(f, "begin_intake"),
            Action::ReturnToMenu => write!(f, "return_to_menu"),
        }
    }
}

/// What pressing a control does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlTarget {
    /// Sends the action code back as an inbound event.
    Action(Action),
    /// Opens an external link; never reaches the router.
    Link(String),
}

/// A selectable control shown under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub target: ControlTarget,
}

impl Control {
    pub fn action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            target: ControlTarget::Action(action),
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ControlTarget::Link(url.into()),
        }
    }
}

/// Message text plus ordered controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    pub text: String,
    pub controls: Vec<Control>,
}

/// The three navigation menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Main,
    Posting,
    FaqTopics,
}

/// Renders menus and the small auxiliary views around them.
#[derive(Debug, Clone)]
pub struct MenuRenderer {
    content: Arc<ContentStore>,
    recruiter_contact: Option<String>,
}

impl MenuRenderer {
    pub fn new(content: Arc<ContentStore>, recruiter_contact: Option<String>) -> Self {
        Self {
            content,
            recruiter_contact,
        }
    }

    /// Render one of the navigation menus.
    pub fn render(&self, kind: MenuKind) -> Render {
        match kind {
            MenuKind::Main => self.finish(
                format!(
                    "Hello! 👋\n\nYou are viewing the position:\n\n*{}*\n\nChoose an action:",
                    self.content.posting().title
                ),
                self.main_controls(),
            ),
            MenuKind::Posting => {
                self.finish(self.content.posting_text(), vec![back_to_menu()])
            }
            MenuKind::FaqTopics => {
                let mut controls: Vec<Control> = self
                    .content
                    .faq()
                    .iter()
                    .map(|e| Control::action(&e.label, Action::ShowFaqTopic(e.key.clone())))
                    .collect();
                controls.push(back_to_menu());
                self.finish("Choose a question:".to_string(), controls)
            }
        }
    }

    /// Answer for one FAQ topic, with a way back to the topic list.
    pub fn faq_answer(&self, key: &str) -> Render {
        self.finish(
            self.content.answer_or_fallback(key).to_string(),
            vec![Control::action("🔙 Back to FAQ", Action::ShowFaq)],
        )
    }

    /// An intake prompt; the only control is the abort path.
    pub fn intake_prompt(&self, text: impl Into<String>) -> Render {
        self.finish(text.into(), vec![back_to_menu()])
    }

    /// Arbitrary text followed by the main menu controls.
    pub fn with_main_menu(&self, text: impl Into<String>) -> Render {
        self.finish(text.into(), self.main_controls())
    }

    fn main_controls(&self) -> Vec<Control> {
        vec![
            Control::action("📌 About the job", Action::ShowPosting),
            Control::action("❓ FAQ", Action::ShowFaq),
            Control::action("📤 Apply", Action::BeginIntake),
        ]
    }

    /// Append the recruiter link when one is configured.
    fn finish(&self, text: String, mut controls: Vec<Control>) -> Render {
        if let Some(url) = &self.recruiter_contact {
            controls.push(Control::link("💬 Contact the recruiter", url));
        }
        Render { text, controls }
    }
}

fn back_to_menu() -> Control {
    Control::action("🔙 Main menu", Action::ReturnToMenu)
}
