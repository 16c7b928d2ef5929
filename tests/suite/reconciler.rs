//! End-to-end reconciler behavior over the file-backed store.

use serde_json::json;

use quickproxy_engine::{
    ApplyOutcome, ClickOutcome, EventPump, IndicatorIcon, LevelOfControl, ProxyConfig,
    ReconcileError, SettingsCollection, SettingsName, SettingsStore, StoreError, StoredRecord, TITLE_ACTIVE,
    TITLE_NO_CONTROL, TITLE_PRIVATE_WINDOWS,
};

use crate::common::{Fixture, manual, system};

async fn seeded(current: SettingsName, quick: &str) -> Fixture {
    let fixture = Fixture::new(system());
    fixture
        .store
        .save(StoredRecord::new(
            current,
            SettingsCollection::new(system(), manual(quick)),
        ))
        .await
        .unwrap();
    fixture
}

#[tokio::test]
async fn first_init_writes_the_seed_to_disk() {
    let f = Fixture::new(manual("corp:3128"));

    let outcome = f.reconciler.init().await.unwrap();

    assert_eq!(outcome, ApplyOutcome::Applied);
    let json = f.record_json();
    assert_eq!(json["currentSettingsName"], "default");
    assert_eq!(json["settings"]["default"]["proxyType"], "manual");
    assert_eq!(json["settings"]["quick-proxy"]["http"], "corp:3128");
}

#[tokio::test]
async fn seed_stores_the_live_value_verbatim() {
    let live: ProxyConfig = serde_json::from_value(json!({
        "proxyType": "pac",
        "socksVersion": "6",
        "failoverTimeout": 5
    }))
    .unwrap();
    let f = Fixture::new(live.clone());

    f.reconciler.init().await.unwrap();

    let json = f.record_json();
    let expected = serde_json::to_value(&live).unwrap();
    assert_eq!(json["settings"]["default"], expected);
    assert_eq!(json["settings"]["quick-proxy"], expected);
    assert_eq!(f.browser.value(), live);
}

#[tokio::test]
async fn toggled_configuration_survives_a_restart() {
    let f = seeded(SettingsName::Default, "proxy:8080").await;
    f.reconciler.init().await.unwrap();
    assert_eq!(f.browser.value(), system());

    let click = f.reconciler.on_action_clicked().await.unwrap();
    assert_eq!(
        click,
        ClickOutcome::Toggled {
            target: SettingsName::QuickProxy,
            outcome: ApplyOutcome::Applied,
        }
    );

    let f = f.restart();
    f.reconciler.init().await.unwrap();

    assert_eq!(
        f.reconciler.state().current_settings_name,
        Some(SettingsName::QuickProxy)
    );
    assert_eq!(f.browser.value(), manual("proxy:8080"));
    assert_eq!(f.view.get().unwrap().title, TITLE_ACTIVE);
}

#[tokio::test]
async fn legacy_settings_key_is_loaded_and_rewritten() {
    let f = Fixture::new(system());
    std::fs::write(
        f.record_path(),
        r#"{
            "currentSettingsName": "quick-proxy",
            "proxySettings": {
                "default": { "proxyType": "system" },
                "quick-proxy": { "proxyType": "manual", "http": "legacy:8080" }
            }
        }"#,
    )
    .unwrap();

    f.reconciler.init().await.unwrap();

    assert_eq!(f.browser.value().http(), "legacy:8080");
    let json = f.record_json();
    assert!(json.get("proxySettings").is_none());
    assert_eq!(json["settings"]["quick-proxy"]["http"], "legacy:8080");
}

#[tokio::test]
async fn malformed_record_is_a_storage_error() {
    let f = Fixture::new(system());
    std::fs::write(f.record_path(), r#"{ "settings": 42 }"#).unwrap();

    let err = f.reconciler.init().await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Storage(StoreError::Decode(_))
    ));
    assert_eq!(f.browser.applied.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wiped_record_is_reseeded_from_the_live_setting() {
    let f = seeded(SettingsName::QuickProxy, "proxy:8080").await;
    f.reconciler.init().await.unwrap();
    let mut pump = EventPump::subscribe(f.reconciler.clone());

    f.store.wipe().await.unwrap();
    pump.drain().await;

    let json = f.record_json();
    assert_eq!(json["currentSettingsName"], "default");
    assert_eq!(json["settings"]["default"]["http"], "proxy:8080");
    assert_eq!(json["settings"]["quick-proxy"]["http"], "proxy:8080");
}

#[tokio::test]
async fn foreign_control_disables_the_button() {
    let f = seeded(SettingsName::Default, "proxy:8080").await;
    f.reconciler.init().await.unwrap();
    let mut pump = EventPump::subscribe(f.reconciler.clone());

    f.browser.set_level(LevelOfControl::ControlledByOtherExtensions);
    pump.drain().await;

    let view = f.view.get().unwrap();
    assert_eq!(view.title, TITLE_NO_CONTROL);
    assert!(!view.enabled);

    let click = f.reconciler.on_action_clicked().await.unwrap();
    assert_eq!(
        click,
        ClickOutcome::Toggled {
            target: SettingsName::QuickProxy,
            outcome: ApplyOutcome::Blocked,
        }
    );
    assert_eq!(f.browser.value(), system());
}

#[tokio::test]
async fn private_window_grant_unblocks_toggling() {
    let f = seeded(SettingsName::Default, "proxy:8080").await;
    f.browser.set_private_windows_allowed(false);

    assert_eq!(f.reconciler.init().await.unwrap(), ApplyOutcome::Blocked);
    let view = f.view.get().unwrap();
    assert_eq!(view.icon, IndicatorIcon::Error);
    assert_eq!(view.title, TITLE_PRIVATE_WINDOWS);
    assert_eq!(
        f.reconciler.on_action_clicked().await.unwrap(),
        ClickOutcome::OpenedOptionsPage
    );

    f.browser.set_private_windows_allowed(true);
    f.reconciler.restore_or_init(false).await.unwrap();

    let click = f.reconciler.on_action_clicked().await.unwrap();
    assert_eq!(
        click,
        ClickOutcome::Toggled {
            target: SettingsName::QuickProxy,
            outcome: ApplyOutcome::Applied,
        }
    );
    assert_eq!(f.browser.value(), manual("proxy:8080"));
}
