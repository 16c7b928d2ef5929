//! Options editor against a running reconciler.

use serde_json::json;

use quickproxy_engine::{
    EventPump, OptionsEditor, OptionsError, ProxyConfig, ProxyConfigError, SettingsCollection,
    SettingsName, SettingsStore, StoredRecord,
};

use crate::common::{Fixture, manual, system};

async fn running(current: SettingsName) -> (Fixture, EventPump, OptionsEditor) {
    let f = Fixture::new(system());
    f.store
        .save(StoredRecord::new(
            current,
            SettingsCollection::new(system(), manual("proxy:8080")),
        ))
        .await
        .unwrap();
    f.reconciler.init().await.unwrap();
    let pump = EventPump::subscribe(f.reconciler.clone());
    let editor = OptionsEditor::new(f.store.clone());
    (f, pump, editor)
}

#[tokio::test]
async fn editing_the_active_configuration_applies_it() {
    let (f, mut pump, editor) = running(SettingsName::QuickProxy).await;

    editor
        .save(SettingsName::QuickProxy, manual("proxy:9090"))
        .await
        .unwrap();
    pump.drain().await;

    assert_eq!(f.browser.value(), manual("proxy:9090"));
}

#[tokio::test]
async fn editing_the_inactive_configuration_keeps_the_live_setting() {
    let (f, mut pump, editor) = running(SettingsName::QuickProxy).await;

    editor
        .save(SettingsName::Default, manual("office:3128"))
        .await
        .unwrap();
    pump.drain().await;

    assert_eq!(f.browser.value(), manual("proxy:8080"));
    let json = f.record_json();
    assert_eq!(json["settings"]["default"]["http"], "office:3128");
    assert_eq!(json["currentSettingsName"], "quick-proxy");
}

#[tokio::test]
async fn unknown_fields_are_written_back() {
    let (f, _pump, editor) = running(SettingsName::Default).await;
    let config: ProxyConfig = serde_json::from_value(json!({
        "proxyType": "manual",
        "http": "proxy:3128",
        "failoverTimeout": 5
    }))
    .unwrap();

    editor.save(SettingsName::QuickProxy, config).await.unwrap();

    let json = f.record_json();
    assert_eq!(json["settings"]["quick-proxy"]["failoverTimeout"], 5);
    assert_eq!(json["settings"]["quick-proxy"]["proxyType"], "manual");
}

#[tokio::test]
async fn invalid_auto_config_url_is_refused() {
    let (f, _pump, editor) = running(SettingsName::Default).await;
    let before = f.record_json();
    let config: ProxyConfig = serde_json::from_value(json!({
        "proxyType": "autoConfig",
        "autoConfigUrl": "not a url"
    }))
    .unwrap();

    let err = editor
        .save(SettingsName::QuickProxy, config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OptionsError::Invalid(ProxyConfigError::InvalidAutoConfigUrl { .. })
    ));
    assert_eq!(f.record_json(), before);
}
