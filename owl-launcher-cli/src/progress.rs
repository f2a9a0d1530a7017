//! Terminal progress display driven by launch status updates.

use indicatif::{ProgressBar, ProgressStyle};
use owl_launcher::launch::{LaunchStatus, Phase};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// A progress bar that mirrors one operation's status.
pub struct StatusBar {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl StatusBar {
    /// Start rendering every change seen on `status`.
    pub fn follow(mut status: watch::Receiver<LaunchStatus>) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);

        let render = bar.clone();
        let task = tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let snapshot = status.borrow_and_update().clone();
                render.set_position(u64::from(snapshot.progress));
                render.set_message(describe(&snapshot));
            }
        });

        Self { bar, task }
    }

    pub fn finish(self, message: impl Into<String>) {
        self.task.abort();
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(self, message: impl Into<String>) {
        self.task.abort();
        self.bar.abandon_with_message(message.into());
    }
}

/// One-line summary of a status snapshot.
pub fn describe(status: &LaunchStatus) -> String {
    match (&status.phase, &status.error) {
        (Phase::Error, Some(error)) => format!("error: {}", error.message),
        (phase, _) if status.message.is_empty() => phase.to_string(),
        (_, _) => status.message.clone(),
    }
}
