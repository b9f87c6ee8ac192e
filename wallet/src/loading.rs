use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::api::types::ErrorNotice;
use crate::errors::{WalletError, WalletResult};

/// Outcome of a UI action: the value, or the notice to show.
pub type ActionResult<T> = Result<T, ErrorNotice>;

/// Disables a UI control while its action is in flight.
#[derive(Debug, Default)]
pub struct LoadingFlag {
    active: AtomicBool,
}

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the control busy. Fails with [`WalletError::Busy`] if it already is.
    pub fn begin(&self) -> WalletResult<LoadingGuard<'_>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WalletError::Busy);
        }
        Ok(LoadingGuard { flag: self })
    }

    pub fn is_loading(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, whatever path the action took.
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    flag: &'a LoadingFlag,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.active.store(false, Ordering::Release);
    }
}

/// One flag per wallet control the UI disables while its action runs.
#[derive(Debug, Default)]
pub struct ActionFlags {
    pub connect: LoadingFlag,
    pub balance: LoadingFlag,
    pub payment: LoadingFlag,
    pub trustline: LoadingFlag,
    pub disconnect: LoadingFlag,
}

impl ActionFlags {
    pub fn state(&self, loading_dashboard: bool) -> LoadingState {
        LoadingState {
            connecting: self.connect.is_loading(),
            loading_balance: self.balance.is_loading(),
            sending_payment: self.payment.is_loading(),
            adding_trustline: self.trustline.is_loading(),
            disconnecting: self.disconnect.is_loading(),
            loading_dashboard,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub connecting: bool,
    pub loading_balance: bool,
    pub sending_payment: bool,
    pub adding_trustline: bool,
    pub disconnecting: bool,
    pub loading_dashboard: bool,
}

/// Run `operation` with `flag` held, logging and converting any failure.
///
/// A second trigger while the flag is held fails with `Busy` without
/// polling `operation`.
pub async fn guarded<T, F>(flag: &LoadingFlag, action: &str, operation: F) -> ActionResult<T>
where
    F: Future<Output = WalletResult<T>>,
{
    let result = async {
        let _guard = flag.begin()?;
        operation.await
    }
    .await;

    result.map_err(|err| {
        log::error!("Wallet action {} failed: {}", action, err);
        ErrorNotice::from(&err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_trigger_is_refused_until_guard_drops() {
        let flag = LoadingFlag::new();
        let guard = flag.begin().unwrap();
        assert!(flag.is_loading());
        assert_eq!(flag.begin().unwrap_err(), WalletError::Busy);
        drop(guard);
        assert!(!flag.is_loading());
        assert!(flag.begin().is_ok());
    }

    #[test]
    fn flag_clears_on_early_return() {
        fn failing(flag: &LoadingFlag) -> WalletResult<()> {
            let _guard = flag.begin()?;
            Err(WalletError::NotConnected)
        }

        let flag = LoadingFlag::new();
        assert_eq!(failing(&flag), Err(WalletError::NotConnected));
        assert!(!flag.is_loading());
    }

    #[tokio::test]
    async fn guarded_action_reports_busy_while_flag_held() {
        let flag = LoadingFlag::new();
        let held = flag.begin().unwrap();
        let notice = guarded(&flag, "balance", async { Ok::<_, WalletError>(1) }).await.unwrap_err();
        assert_eq!(notice.code, "BUSY");
        drop(held);

        assert_eq!(guarded(&flag, "balance", async { Ok::<_, WalletError>(2) }).await, Ok(2));
        let notice = guarded::<u32, _>(&flag, "balance", async { Err(WalletError::NotConnected) })
            .await
            .unwrap_err();
        assert_eq!(notice.code, "NOT_CONNECTED");
        assert!(!flag.is_loading());
    }
}
