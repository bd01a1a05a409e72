use std::collections::HashMap;
use std::time::Duration;
use xapp_frame::{XappConfig, XappError};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_are_valid() {
    let config = XappConfig::default();
    config.validate().unwrap();
    assert_eq!(config.workers, 1);
    assert_eq!(config.poll_timeout, Duration::from_millis(2000));
    assert!(config.region_name.is_none());
}

#[test]
fn overrides_apply() {
    let config = XappConfig::default()
        .with_overrides(lookup(&[
            ("XAPP_NAME", "kpimon"),
            ("XAPP_WORKERS", "4"),
            ("XAPP_POLL_TIMEOUT_MS", "250"),
            ("XAPP_WAIT_FOR_ROUTES", "yes"),
            ("XAPP_RING_CAPACITY", "128"),
            ("XAPP_REGION_NAME", "ric"),
            ("XAPP_LOG", "xapp_frame=debug"),
        ]))
        .unwrap();

    assert_eq!(config.name, "kpimon");
    assert_eq!(config.workers, 4);
    assert_eq!(config.poll_timeout, Duration::from_millis(250));
    assert!(config.wait_for_routes);
    assert_eq!(config.ring_capacity, 128);
    assert_eq!(config.region_name.as_deref(), Some("ric"));
    assert_eq!(config.log_filter.as_deref(), Some("xapp_frame=debug"));
}

#[test]
fn unparsable_values_are_config_errors() {
    for (key, value) in [
        ("XAPP_WORKERS", "many"),
        ("XAPP_POLL_TIMEOUT_MS", "-1"),
        ("XAPP_WAIT_FOR_ROUTES", "maybe"),
        ("XAPP_REGION_SIZE", "1GB"),
    ] {
        let err = XappConfig::default()
            .with_overrides(lookup(&[(key, value)]))
            .unwrap_err();
        match err {
            XappError::Config(msg) => assert!(msg.contains(key), "{msg}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }
}

#[test]
fn invalid_combinations_are_rejected() {
    for pairs in [
        [("XAPP_WORKERS", "0")],
        [("XAPP_POLL_TIMEOUT_MS", "0")],
        [("XAPP_RING_CAPACITY", "100")],
        [("XAPP_MAX_PAYLOAD", "1000000")],
    ] {
        let result = XappConfig::default().with_overrides(lookup(&pairs));
        assert!(matches!(result, Err(XappError::Config(_))), "{pairs:?}");
    }
}
