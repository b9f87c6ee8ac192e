//! Food-bank wallet WebAssembly library
//!
//! Browser bindings for the wallet core: the Freighter extension bridge,
//! the `localStorage` connected marker and the `WalletApp` UI root.

use foodbank_wallet_lib::ErrorNotice;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

mod app;
mod freighter;
mod local_storage;

pub use app::WalletApp;
pub use freighter::FreighterBridge;
pub use local_storage::LocalStorageMarker;

/// `log` backend writing to the browser console.
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

// Module initialization
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
    log::info!("Food-bank wallet module loaded");
}

/// Raise or lower console verbosity ("error" through "trace").
#[wasm_bindgen(js_name = setLogLevel)]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter = level
        .parse::<LevelFilter>()
        .map_err(|_| JsValue::from_str(&format!("Unknown log level: {}", level)))?;
    log::set_max_level(filter);
    Ok(())
}

pub(crate) fn rust_to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))?;
    js_sys::JSON::parse(&json)
}

pub(crate) fn js_to_rust<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    let json: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&json)
        .map_err(|e| JsValue::from_str(&format!("Invalid argument: {}", e)))
}

pub(crate) fn notice_to_js(notice: ErrorNotice) -> JsValue {
    rust_to_js(&notice).unwrap_or_else(|err| err)
}

/// Best-effort readable text for a rejected JS call.
pub(crate) fn describe_js_error(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodbank_wallet_lib::WalletError;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn notices_cross_the_boundary_as_objects() {
        let value = notice_to_js(ErrorNotice::from(WalletError::NotConnected));
        let notice: ErrorNotice = js_to_rust(&value).unwrap();
        assert_eq!(notice.code, "NOT_CONNECTED");
        assert_eq!(notice.message, "Wallet not connected");
    }

    #[wasm_bindgen_test]
    fn error_text_prefers_message_property() {
        let error = js_sys::Error::new("User declined access");
        assert_eq!(describe_js_error(&error.into()), "User declined access");
        assert_eq!(describe_js_error(&JsValue::from_str("plain")), "plain");
    }
}
