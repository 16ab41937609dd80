use parking_lot::Mutex;

/// Notification id of the "confirm in wallet" prompt
pub const TX_SUBMITTING: &str = "tx-submitting";
/// Notification id of the "waiting for confirmation" indicator
pub const TX_MINING: &str = "tx-mining";

/// User-facing lifecycle notifications
pub trait Notifier: Send + Sync {
    /// Show or replace the loading notification `id`; sticky ones stay until dismissed
    fn loading(&self, message: &str, id: &str, sticky: bool);
    fn success(&self, title: &str, description: Option<&str>);
    fn error(&self, message: &str);
    fn dismiss(&self, id: &str);
}

/// Split `"title|description"` into its parts
pub fn split_success_message(message: &str) -> (&str, Option<&str>) {
    match message.split_once('|') {
        Some((title, description)) => (title, Some(description)),
        None => (message, None),
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn loading(&self, message: &str, id: &str, _sticky: bool) {
        tracing::info!("⏳ [{}] {}", id, message);
    }

    fn success(&self, title: &str, description: Option<&str>) {
        match description {
            Some(description) => tracing::info!("✅ {} ({})", title, description),
            None => tracing::info!("✅ {}", title),
        }
    }

    fn error(&self, message: &str) {
        tracing::error!("❌ {}", message);
    }

    fn dismiss(&self, id: &str) {
        tracing::debug!("Dismissed [{}]", id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Loading {
        id: String,
        message: String,
        sticky: bool,
    },
    Success {
        title: String,
        description: Option<String>,
    },
    Error(String),
    Dismiss(String),
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    /// Loading notifications shown and not yet dismissed
    pub fn active_loading(&self) -> Vec<String> {
        let mut active: Vec<String> = Vec::new();
        for event in self.events.lock().iter() {
            match event {
                Notification::Loading { id, .. } => {
                    active.retain(|a| a != id);
                    active.push(id.clone());
                }
                Notification::Dismiss(id) => active.retain(|a| a != id),
                _ => {}
            }
        }
        active
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Notification::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Notification::Success { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn loading_messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Notification::Loading { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn loading(&self, message: &str, id: &str, sticky: bool) {
        self.events.lock().push(Notification::Loading {
            id: id.to_string(),
            message: message.to_string(),
            sticky,
        });
    }

    fn success(&self, title: &str, description: Option<&str>) {
        self.events.lock().push(Notification::Success {
            title: title.to_string(),
            description: description.map(str::to_string),
        });
    }

    fn error(&self, message: &str) {
        self.events
            .lock()
            .push(Notification::Error(message.to_string()));
    }

    fn dismiss(&self, id: &str) {
        self.events
            .lock()
            .push(Notification::Dismiss(id.to_string()));
    }
}
