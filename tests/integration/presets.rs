//! Preset integration tests
//!
//! User presets through the host, legacy migration, and preset files on
//! disk under temporary preset roots.

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use approx::assert_relative_eq;
use fxhost::core::config::user_preset_group;
use fxhost::plugin::preset::{LEGACY_KEY, PRESET_KEY};
use fxhost::plugin::{legacy, state};
use fxhost::prelude::*;
use fxhost::{AutomationParameters, Error, HostError};

fn host_with_roots(dir: &std::path::Path, format: StateFormat) -> (FxHost, Handles) {
    init_tracing();
    let (registry, handles) = registry_with(MockUnit::effect);
    let host = FxHost::builder()
        .registry(registry)
        .sample_rate(TEST_SAMPLE_RATE)
        .state_format(format)
        .preset_roots(PresetRoots::new(dir.join("local"), dir.join("user")))
        .build()
        .unwrap();
    (host, handles)
}

#[test]
fn test_user_preset_round_trip() {
    let (host, handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    let unit = handle(&handles, 0);

    unit.set_parameter(0, 0.7);
    unit.set_internal(b"tape-wow");
    host.save_user_preset(&mut delay, "Slapback").unwrap();
    assert_eq!(unit.preset_name(), "Slapback");

    unit.set_parameter(0, 0.0);
    unit.set_internal(b"");
    host.load_user_preset(&mut delay, "Slapback").unwrap();

    assert_relative_eq!(unit.parameter(0).unwrap(), 0.7, epsilon = FLOAT_EPSILON);
    assert_eq!(unit.internal(), b"tape-wow");
    assert_eq!(delay.settings().get(0), Some(0.7));

    let names = host.user_presets(delay.descriptor());
    assert_eq!(names, vec!["Slapback"]);
    assert!(host.delete_user_preset(delay.descriptor(), "Slapback"));
    assert!(host.user_presets(delay.descriptor()).is_empty());
}

#[test]
fn test_stored_blob_is_stable() {
    let (host, _handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    let group = user_preset_group(DELAY_PATH, "Stable");

    host.save_user_preset(&mut delay, "Stable").unwrap();
    let first = host.with_store(|store| store.get(&group, PRESET_KEY)).unwrap();
    host.load_user_preset(&mut delay, "Stable").unwrap();
    host.save_user_preset(&mut delay, "Stable").unwrap();
    let second = host.with_store(|store| store.get(&group, PRESET_KEY)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_missing_user_preset_is_soft() {
    let (host, _handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    let err = host.load_user_preset(&mut delay, "Nope").unwrap_err();
    assert!(matches!(err, Error::Plugin(HostError::PresetNotFound { .. })));
    assert!(err.is_soft());
}

#[test]
fn test_empty_state_reported_on_save() {
    let (registry, _handles) = registry_with(|| MockUnit::effect().with_empty_state());
    let host = FxHost::builder().registry(registry).build().unwrap();

    // bootstrap tolerates a unit with nothing to save
    let mut delay = host.open(DELAY_PATH).unwrap();
    let err = host.save_user_preset(&mut delay, "Void").unwrap_err();
    assert!(matches!(err, Error::Plugin(HostError::PresetEmpty { .. })));
}

#[test]
fn test_legacy_preset_migrates_once() {
    let (host, handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    let group = user_preset_group(DELAY_PATH, "Vintage");

    let mut params = AutomationParameters::new();
    params.insert("<Delay Time,0>".into(), 0.375);
    params.insert("<Loop,1><Feedback,1>".into(), 0.875);
    host.with_store(|store| store.set(&group, LEGACY_KEY, &legacy::serialize(&params)));

    host.load_user_preset(&mut delay, "Vintage").unwrap();
    let unit = handle(&handles, 0);
    assert_relative_eq!(unit.parameter(0).unwrap(), 0.375, epsilon = FLOAT_EPSILON);
    assert_relative_eq!(unit.parameter(1).unwrap(), 0.875, epsilon = FLOAT_EPSILON);

    host.with_store(|store| {
        assert!(store.get(&group, LEGACY_KEY).is_none());
        assert!(store.get(&group, PRESET_KEY).is_some());
    });

    unit.set_parameter(0, 0.0);
    host.load_user_preset(&mut delay, "Vintage").unwrap();
    assert_relative_eq!(unit.parameter(0).unwrap(), 0.375, epsilon = FLOAT_EPSILON);
    host.with_store(|store| assert!(store.get(&group, LEGACY_KEY).is_none()));
}

#[test]
fn test_factory_preset_selection() {
    let (host, handles) = test_host();
    let mut delay = host.open(DELAY_PATH).unwrap();
    assert_eq!(delay.factory_presets(), vec!["Short", "Long"]);

    delay.load_factory_preset(0).unwrap();
    assert_relative_eq!(handle(&handles, 0).parameter(0).unwrap(), 0.05, epsilon = FLOAT_EPSILON);
    assert!(delay.load_factory_preset(2).is_err());
}

#[test]
fn test_export_then_import_text_presets() {
    let dir = tempfile::tempdir().unwrap();
    let (host, handles) = host_with_roots(dir.path(), StateFormat::Binary);
    let mut delay = host.open(DELAY_PATH).unwrap();
    let descriptor = delay.descriptor().clone();

    handle(&handles, 0).set_parameter(0, 0.3);
    host.save_user_preset(&mut delay, "Room").unwrap();
    handle(&handles, 0).set_parameter(0, 0.6);
    host.save_user_preset(&mut delay, "Hall").unwrap();

    let names = host.user_presets(&descriptor);
    let files = host.export_presets(&descriptor, &names, true).unwrap();
    assert_eq!(files.len(), 2);
    for file in &files {
        assert!(file.starts_with(dir.path().join("user")));
        let bytes = std::fs::read(file).unwrap();
        assert_eq!(state::detect_format(&bytes).unwrap(), StateFormat::Text);
    }

    // a second host with an empty store picks the files up
    let (other, other_handles) = host_with_roots(dir.path(), StateFormat::Binary);
    let mut fresh = other.open(DELAY_PATH).unwrap();
    let imported = other.import_presets(&descriptor).unwrap();
    assert_eq!(imported, vec!["Hall", "Room"]);

    other.load_user_preset(&mut fresh, "Room").unwrap();
    assert_relative_eq!(
        handle(&other_handles, 0).parameter(0).unwrap(),
        0.3,
        epsilon = FLOAT_EPSILON
    );
}

#[test]
fn test_text_format_host() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _handles) = host_with_roots(dir.path(), StateFormat::Text);
    let mut delay = host.open(DELAY_PATH).unwrap();
    let descriptor = delay.descriptor().clone();
    host.save_user_preset(&mut delay, "Readable").unwrap();

    let files = host
        .export_presets(&descriptor, &["Readable".to_string()], false)
        .unwrap();
    let text = std::fs::read_to_string(&files[0]).unwrap();
    assert!(text.trim_start().starts_with('{'));
}

#[test]
fn test_import_stops_at_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let (host, _handles) = host_with_roots(dir.path(), StateFormat::Binary);
    let descriptor = EffectDescriptor::parse(DELAY_PATH).unwrap();

    let presets = fxhost::plugin::preset::preset_dir(&host.preset_roots().local, &descriptor);
    std::fs::create_dir_all(&presets).unwrap();
    std::fs::write(presets.join("A.fxpreset"), b"garbage").unwrap();

    let err = host.import_presets(&descriptor).unwrap_err();
    assert!(matches!(err, Error::Plugin(HostError::PresetDecodeFailed { .. })));
}
