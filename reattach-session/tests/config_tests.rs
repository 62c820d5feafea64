use reattach_session::{ClientConfig, SessionConfig};
use std::sync::{Arc, Mutex};

#[test]
fn new_config_starts_stale() {
    let config = ClientConfig::new("mem://db");
    assert!(config.is_stale());
}

#[test]
fn mark_synced_and_stale_toggle_the_flag() {
    let mut config = ClientConfig::new("mem://db");
    config.mark_synced();
    assert!(!config.is_stale());
    config.mark_stale();
    assert!(config.is_stale());
}

#[test]
fn empty_connection_string_is_ignored() {
    let mut config = ClientConfig::new("mem://db");
    config.mark_synced();

    config.set_connection_string("");
    assert_eq!(config.connection_descriptor(), "mem://db");
    assert!(!config.is_stale());

    config.set_connection_string("mem://other");
    assert_eq!(config.connection_descriptor(), "mem://other");
    assert!(config.is_stale());
}

#[test]
fn timeouts_of_three_seconds_or_less_are_ignored() {
    let mut config = ClientConfig::new("mem://db");
    config.mark_synced();

    config.set_timeout_secs(3);
    assert_eq!(config.timeout_secs(), 30);
    assert!(!config.is_stale());

    config.set_timeout_secs(0);
    assert_eq!(config.timeout_secs(), 30);

    config.set_timeout_secs(4);
    assert_eq!(config.timeout_secs(), 4);
    assert!(config.is_stale());
}

#[test]
fn lazy_loading_change_marks_stale() {
    let mut config = ClientConfig::new("mem://db");
    config.mark_synced();
    config.set_lazy_loading(false);
    assert!(!config.lazy_loading_default());
    assert!(config.is_stale());
}

#[test]
fn log_sink_receives_messages() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let config =
        ClientConfig::new("mem://db").with_log_sink(move |m| sink.lock().unwrap().push(m.to_string()));

    config.log("hello");
    assert_eq!(messages.lock().unwrap().as_slice(), ["hello".to_string()]);
}

#[test]
fn log_without_sink_is_a_no_op() {
    ClientConfig::new("mem://db").log("dropped");
}
