//! Host adapter
//!
//! What the script manager needs from the embedding application: a status
//! line, a yes/no prompt, an error alert and the UI locale. Host objects that
//! scripts can reach are passed separately as capabilities.

use std::time::Duration;

use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

/// Default locale when the host does not provide one
pub const DEFAULT_LOCALE: &str = "en_US";

/// Services supplied by the embedding application
#[cfg_attr(test, automock)]
pub trait HostInterface {
    /// Transient status-bar message
    fn show_status(&self, message: &str, timeout: Duration, is_warning: bool);

    /// Modal yes/no prompt; `true` means continue
    fn confirm(&self, title: &str, message: &str) -> bool;

    /// Blocking error alert
    fn alert_error(&self, title: &str, message: &str);

    /// UI locale such as `pt_BR` or `en_US`
    fn locale(&self) -> String {
        DEFAULT_LOCALE.to_string()
    }
}

/// Host without a user: prompts are answered by a fixed policy and
/// notifications go to the log.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    confirm_answer: bool,
    locale: String,
}

impl HeadlessHost {
    /// Headless host that declines every confirmation prompt
    pub fn new() -> Self {
        Self {
            confirm_answer: false,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }

    /// Answer every prompt with `answer`
    pub fn answering(mut self, answer: bool) -> Self {
        self.confirm_answer = answer;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInterface for HeadlessHost {
    fn show_status(&self, message: &str, _timeout: Duration, is_warning: bool) {
        if is_warning {
            warn!(target: "script_manager::status", "{}", message);
        } else {
            info!(target: "script_manager::status", "{}", message);
        }
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        info!(title, answer = self.confirm_answer, "Auto-answered prompt: {}", message);
        self.confirm_answer
    }

    fn alert_error(&self, title: &str, message: &str) {
        warn!(title, "{}", message);
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }
}
