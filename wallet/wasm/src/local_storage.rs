use foodbank_wallet_lib::{MarkerStore, WalletError, WalletResult};
use web_sys::Storage;

use crate::describe_js_error;

/// Connected marker kept in the page's `localStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageMarker;

impl LocalStorageMarker {
    fn storage() -> WalletResult<Storage> {
        let window = web_sys::window()
            .ok_or_else(|| WalletError::StorageError("No window object".to_string()))?;
        window
            .local_storage()
            .map_err(|e| WalletError::StorageError(describe_js_error(&e)))?
            .ok_or_else(|| WalletError::StorageError("localStorage is unavailable".to_string()))
    }
}

impl MarkerStore for LocalStorageMarker {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| WalletError::StorageError(describe_js_error(&e)))
    }

    fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| WalletError::StorageError(describe_js_error(&e)))
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| WalletError::StorageError(describe_js_error(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn marker_round_trips_through_local_storage() {
        let store = LocalStorageMarker;
        store.set("walletConnectedTest", "true").unwrap();
        assert_eq!(
            store.get("walletConnectedTest").unwrap(),
            Some("true".to_string())
        );
        store.remove("walletConnectedTest").unwrap();
        assert_eq!(store.get("walletConnectedTest").unwrap(), None);
    }
}
