//! Hire Desk: recruiting chat bot.
//!
//! Candidates browse a job posting and FAQ through menus, then apply through
//! a short name / contact / resume intake. Completed applications are
//! forwarded to a recruiter chat.

pub mod bot;
pub mod channels;
pub mod config;
pub mod content;
pub mod error;
pub mod intake;
pub mod menu;
pub mod notify;
pub mod router;
pub mod session;
pub mod status;
