use async_trait::async_trait;
use foodbank_wallet_lib::{SignOptions, WalletError, WalletExtensionBridge, WalletResult};
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::describe_js_error;

/// Bridge to the Freighter extension through its page-injected API object.
///
/// Accepts both result shapes the API has shipped: bare values
/// (`true`, `"G..."`) and objects (`{ isConnected: true }`,
/// `{ address: "G..." }`, `{ error: "..." }`).
#[derive(Debug, Clone)]
pub struct FreighterBridge {
    injection_key: String,
}

impl Default for FreighterBridge {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INJECTION_KEY)
    }
}

impl FreighterBridge {
    pub const DEFAULT_INJECTION_KEY: &'static str = "freighterApi";

    pub fn new(injection_key: impl Into<String>) -> Self {
        Self {
            injection_key: injection_key.into(),
        }
    }

    fn api(&self) -> Option<Object> {
        let window = web_sys::window()?;
        let api = Reflect::get(&window, &JsValue::from_str(&self.injection_key)).ok()?;
        if api.is_undefined() || api.is_null() {
            return None;
        }
        api.dyn_into::<Object>().ok()
    }

    fn has_method(api: &Object, method: &str) -> bool {
        Reflect::get(api, &JsValue::from_str(method))
            .map(|value| value.is_function())
            .unwrap_or(false)
    }

    /// Call a method on the injected API object, awaiting it when it returns a promise
    async fn call_method(&self, method: &str, args: &[JsValue]) -> WalletResult<JsValue> {
        let api = self
            .api()
            .ok_or_else(|| WalletError::ExtensionNotInstalled("freighter".to_string()))?;

        let function = Reflect::get(&api, &JsValue::from_str(method))
            .map_err(|e| WalletError::Bridge(format!("Method {} not found: {}", method, describe_js_error(&e))))?
            .dyn_into::<Function>()
            .map_err(|_| WalletError::Bridge(format!("Method {} is not a function", method)))?;

        let result = function
            .apply(&api, &Array::from_iter(args.iter()))
            .map_err(|e| WalletError::Bridge(describe_js_error(&e)))?;

        let resolved = if result.has_type::<Promise>() {
            let promise = result
                .dyn_into::<Promise>()
                .map_err(|_| WalletError::Bridge("Failed to cast to promise".to_string()))?;
            JsFuture::from(promise)
                .await
                .map_err(|e| WalletError::Bridge(describe_js_error(&e)))?
        } else {
            result
        };

        if let Some(error) = field(&resolved, "error") {
            if !error.is_undefined() && !error.is_null() {
                return Err(WalletError::Bridge(describe_js_error(&error)));
            }
        }
        Ok(resolved)
    }
}

/// Property of an object result; `None` for bare values.
fn field(value: &JsValue, name: &str) -> Option<JsValue> {
    if !value.is_object() {
        return None;
    }
    Reflect::get(value, &JsValue::from_str(name))
        .ok()
        .filter(|field| !field.is_undefined())
}

fn read_bool(value: &JsValue, name: &str) -> WalletResult<bool> {
    field(value, name)
        .unwrap_or_else(|| value.clone())
        .as_bool()
        .ok_or_else(|| WalletError::Bridge(format!("Expected a boolean {}", name)))
}

fn read_string(value: &JsValue, name: &str) -> WalletResult<String> {
    field(value, name)
        .unwrap_or_else(|| value.clone())
        .as_string()
        .ok_or_else(|| WalletError::Bridge(format!("Expected a string {}", name)))
}

#[async_trait(?Send)]
impl WalletExtensionBridge for FreighterBridge {
    async fn is_connected(&self) -> WalletResult<bool> {
        if self.api().is_none() {
            return Ok(false);
        }
        let result = self.call_method("isConnected", &[]).await?;
        read_bool(&result, "isConnected")
    }

    async fn is_allowed(&self) -> WalletResult<bool> {
        let result = self.call_method("isAllowed", &[]).await?;
        read_bool(&result, "isAllowed")
    }

    async fn request_access(&self) -> WalletResult<()> {
        let method = match self.api() {
            Some(api) if Self::has_method(&api, "requestAccess") => "requestAccess",
            _ => "setAllowed",
        };
        self.call_method(method, &[]).await.map(|_| ())
    }

    async fn get_network(&self) -> WalletResult<String> {
        let result = self.call_method("getNetwork", &[]).await?;
        read_string(&result, "network")
    }

    async fn get_public_key(&self) -> WalletResult<String> {
        let (method, name) = match self.api() {
            Some(api) if Self::has_method(&api, "getAddress") => ("getAddress", "address"),
            _ => ("getPublicKey", "publicKey"),
        };
        let result = self.call_method(method, &[]).await?;
        read_string(&result, name)
    }

    async fn sign_transaction(
        &self,
        envelope_xdr: &str,
        options: &SignOptions,
    ) -> WalletResult<String> {
        let js_options = Object::new();
        Reflect::set(
            &js_options,
            &JsValue::from_str("network"),
            &JsValue::from_str(options.network.name()),
        )
        .map_err(|e| WalletError::Bridge(describe_js_error(&e)))?;
        Reflect::set(
            &js_options,
            &JsValue::from_str("networkPassphrase"),
            &JsValue::from_str(&options.network_passphrase),
        )
        .map_err(|e| WalletError::Bridge(describe_js_error(&e)))?;

        let result = self
            .call_method(
                "signTransaction",
                &[JsValue::from_str(envelope_xdr), js_options.into()],
            )
            .await?;
        read_string(&result, "signedTxXdr")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn results_read_from_either_shape() {
        assert!(read_bool(&JsValue::TRUE, "isConnected").unwrap());

        let object = Object::new();
        Reflect::set(&object, &"address".into(), &"GABC".into()).unwrap();
        assert_eq!(read_string(&object.into(), "address").unwrap(), "GABC");

        assert!(read_string(&JsValue::from_f64(1.0), "address").is_err());
    }

    #[wasm_bindgen_test]
    async fn missing_api_reports_not_connected() {
        let bridge = FreighterBridge::new("definitelyNotInjected");
        assert!(!bridge.is_connected().await.unwrap());
        assert!(matches!(
            bridge.get_network().await,
            Err(WalletError::ExtensionNotInstalled(_))
        ));
    }
}
