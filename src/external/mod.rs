pub mod notifier;

pub use notifier::{StatusChangeEvent, StatusNotifier};
