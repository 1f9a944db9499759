//! Host façade integration tests
//!
//! Opening effects, first-open bootstrap, options and the instance
//! lifecycle as seen through `FxHost`.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use approx::assert_relative_eq;
use fxhost::core::config::{current_settings_group, factory_defaults_group, OPTIONS_GROUP};
use fxhost::prelude::*;
use fxhost::{Error, HostError};

#[test]
fn test_open_negotiates_and_initializes() {
    let (host, handles) = test_host();
    let delay = host.open(DELAY_PATH).unwrap();

    assert_eq!(delay.state(), InstanceState::Initialized);
    assert_eq!(delay.channels(), ChannelConfig::stereo());
    assert_eq!(delay.sample_rate(), TEST_SAMPLE_RATE);
    assert!(handle(&handles, 0).is_initialized());
}

#[test]
fn test_open_ignores_display_name() {
    let (host, _handles) = test_host();
    let delay = host.open("appl/aufx/dely/Whatever").unwrap();
    assert_eq!(delay.descriptor().display_name, "My Delay");
}

#[test]
fn test_open_unknown_component() {
    let (host, _handles) = test_host();
    let err = host.open("ACME/aufx/none/Missing").unwrap_err();
    assert!(matches!(err, Error::Plugin(HostError::ComponentNotFound(_))));
    assert!(!host.is_valid("ACME/aufx/none/Missing", true));
    assert!(host.is_valid(DELAY_PATH, false));
    assert_eq!(host.effect_paths(), vec![DELAY_PATH.to_string()]);
}

#[test]
fn test_first_open_saves_factory_defaults() {
    let (host, _handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();

    let defaults = factory_defaults_group(DELAY_PATH);
    host.with_store(|store| {
        assert!(store.get_bool(&defaults, fxhost::INITIALIZED_KEY, false));
        assert!(store.get(&defaults, "Data").is_some());
    });

    delay.set_parameter(0, 0.9).unwrap();
    host.load_factory_defaults(&mut delay).unwrap();
    assert_relative_eq!(delay.parameter(0).unwrap(), 0.25, epsilon = FLOAT_EPSILON);
}

#[test]
fn test_factory_defaults_written_once() {
    let (host, _handles) = test_host();
    let mut first = host.open(DELAY_PATH).unwrap();
    let stored = host.with_store(|store| store.get(&factory_defaults_group(DELAY_PATH), "Data"));

    first.set_parameter(0, 0.6).unwrap();
    drop(first);
    let _second = host.open(DELAY_PATH).unwrap();

    let again = host.with_store(|store| store.get(&factory_defaults_group(DELAY_PATH), "Data"));
    assert_eq!(stored, again);
}

#[test]
fn test_current_settings_restored_on_open() {
    let (host, _handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    delay.set_parameter(1, 0.125).unwrap();
    host.save_current_settings(&mut delay).unwrap();
    drop(delay);

    let reopened = host.open(DELAY_PATH).unwrap();
    assert_relative_eq!(reopened.parameter(1).unwrap(), 0.125, epsilon = FLOAT_EPSILON);
    assert_eq!(reopened.settings().get(1), Some(0.125));
}

#[test]
fn test_options_loaded_from_store() {
    let mut store = MemoryConfig::new();
    store.set(OPTIONS_GROUP, HostOptions::USE_LATENCY_KEY, "0");
    store.set(OPTIONS_GROUP, HostOptions::UI_TYPE_KEY, "Generic");
    let (host, _handles) = test_host_with(store);

    let options = host.options();
    assert!(!options.use_latency);
    assert_eq!(options.ui_type, UiType::Generic);

    let mut delay = host.open(DELAY_PATH).unwrap();
    assert_eq!(delay.latency(), 0);
}

#[test]
fn test_set_options_reaches_open_instances() {
    let (registry, _handles) = registry_with(|| MockUnit::effect().with_latency(0.01));
    let host = FxHost::builder()
        .registry(registry)
        .sample_rate(TEST_SAMPLE_RATE)
        .build()
        .unwrap();
    let mut delay = host.open(DELAY_PATH).unwrap();
    delay.process_initialize().unwrap();
    assert_eq!(delay.latency(), 480);

    host.set_options(HostOptions {
        use_latency: false,
        ..HostOptions::default()
    })
    .unwrap();
    assert_eq!(delay.latency(), 0);
    host.with_store(|store| {
        assert!(!store.get_bool(OPTIONS_GROUP, HostOptions::USE_LATENCY_KEY, true));
    });

    host.with_store(|store| store.set(OPTIONS_GROUP, HostOptions::USE_LATENCY_KEY, "1"));
    assert!(host.reload_options().use_latency);
    assert_eq!(delay.latency(), 480);
}

#[test]
fn test_builder_rejects_bad_sample_rate() {
    let err = FxHost::builder().sample_rate(0.0).build().unwrap_err();
    assert!(matches!(err, Error::Core(_)));
    assert!(!err.is_soft());
}

#[test]
fn test_fetch_with_failing_parameter() {
    let (registry, _handles) = registry_with(|| {
        MockUnit::new()
            .with_parameter(MockParameter::new(0, "Time", 0.4))
            .with_parameter(MockParameter::new(7, "Broken", 0.9).failing())
    });
    let host = FxHost::builder().registry(registry).build().unwrap();
    let mut delay = host.open(DELAY_PATH).unwrap();

    let settings = delay.fetch_settings().clone();
    assert_eq!(settings.len(), 2);
    assert_eq!(settings.get(0), Some(0.4));
    assert_eq!(settings.get(7), Some(0.0));

    delay.store_settings(&settings);
    assert_eq!(delay.fetch_settings(), &settings);
}

#[test]
fn test_process_through_host() {
    let (host, _handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    delay.process_initialize().unwrap();

    let input = constant(0.5, TEST_BLOCK_SIZE);
    let mut left = vec![1.0; TEST_BLOCK_SIZE];
    let mut right = vec![1.0; TEST_BLOCK_SIZE];
    let produced = delay.process_block(
        &[&input[..]],
        &mut [&mut left[..], &mut right[..]],
        TEST_BLOCK_SIZE,
    );

    assert_eq!(produced, TEST_BLOCK_SIZE);
    assert_relative_eq!(left[TEST_BLOCK_SIZE - 1], 0.5, epsilon = FLOAT_EPSILON);
    assert_silence(&right, crate::helpers::tolerances::SILENCE_THRESHOLD);
    assert!(delay.process_finalize());
}

#[test]
fn test_corrupt_current_settings_still_opens() {
    let mut store = MemoryConfig::new();
    store.set(&current_settings_group(DELAY_PATH), "Data", "!!!not-base64");
    let (host, handles) = test_host_with(store);

    let delay = host.open(DELAY_PATH).unwrap();
    assert_eq!(delay.state(), InstanceState::Initialized);
    assert_relative_eq!(handle(&handles, 0).parameter(0).unwrap(), 0.25, epsilon = FLOAT_EPSILON);

    // factory defaults are still written on the first open
    let defaults = factory_defaults_group(DELAY_PATH);
    host.with_store(|store| {
        assert!(store.get_bool(&defaults, fxhost::INITIALIZED_KEY, false));
    });
}
