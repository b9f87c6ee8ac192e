//! Dashboard data loading and the UI state kept around it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::distribution::{DistributionPlan, DistributionPlanForm};
use crate::errors::{WalletError, WalletResult};
use crate::loading::LoadingFlag;

/// Categories every food bank reports stock under, in display order.
pub const FOOD_CATEGORIES: [&str; 10] = [
    "Fruits and Vegetables",
    "Grains and Cereals",
    "Protein Foods",
    "Dairy Products",
    "Canned Goods",
    "Beverages",
    "Snacks",
    "Baby Food",
    "Condiments",
    "Other",
];

pub fn is_standard_category(category: &str) -> bool {
    FOOD_CATEGORIES.contains(&category)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub category: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub category: String,
    pub predicted_demand: u32,
    pub date: NaiveDate,
}

/// Window the demand chart covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    #[default]
    Month,
    Quarter,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Quarter => "quarter",
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Quarter => 90,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Timeframe::Week),
            "month" => Ok(Timeframe::Month),
            "quarter" => Ok(Timeframe::Quarter),
            _ => Err(WalletError::validation_failed("timeframe")),
        }
    }
}

/// Where the dashboard's records come from.
#[async_trait(?Send)]
pub trait DashboardSource {
    async fn fetch_predictions(&self) -> WalletResult<Vec<Prediction>>;

    async fn fetch_inventory(&self) -> WalletResult<Vec<InventoryItem>>;

    async fn fetch_distribution_plans(&self) -> WalletResult<Vec<DistributionPlan>>;
}

/// Source with no backend behind it; every collection is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubDashboardSource;

#[async_trait(?Send)]
impl DashboardSource for StubDashboardSource {
    async fn fetch_predictions(&self) -> WalletResult<Vec<Prediction>> {
        Ok(Vec::new())
    }

    async fn fetch_inventory(&self) -> WalletResult<Vec<InventoryItem>> {
        Ok(Vec::new())
    }

    async fn fetch_distribution_plans(&self) -> WalletResult<Vec<DistributionPlan>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub predictions: Vec<Prediction>,
    pub inventory: Vec<InventoryItem>,
    pub plans: Vec<DistributionPlan>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PresenterState {
    timeframe: Timeframe,
    snapshot: DashboardSnapshot,
}

pub struct DashboardPresenter {
    source: Rc<dyn DashboardSource>,
    loading: LoadingFlag,
    state: RwLock<PresenterState>,
}

impl DashboardPresenter {
    pub fn new(source: Rc<dyn DashboardSource>) -> Self {
        Self {
            source,
            loading: LoadingFlag::new(),
            state: RwLock::new(PresenterState::default()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.state.read().timeframe
    }

    pub fn set_timeframe(&self, timeframe: Timeframe) {
        self.state.write().timeframe = timeframe;
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.read().snapshot.clone()
    }

    /// Reload every collection from the source.
    ///
    /// The previous snapshot is kept when any fetch fails. Loading is cleared
    /// on every path.
    pub async fn refresh(&self) -> WalletResult<DashboardSnapshot> {
        let _guard = self.loading.begin()?;

        match self.fetch_all().await {
            Ok(snapshot) => {
                log::debug!(
                    "Dashboard loaded {} predictions, {} inventory items, {} plans",
                    snapshot.predictions.len(),
                    snapshot.inventory.len(),
                    snapshot.plans.len()
                );
                self.state.write().snapshot = snapshot.clone();
                Ok(snapshot)
            }
            Err(err) => {
                log::error!("Failed to load dashboard data: {}", err);
                Err(err)
            }
        }
    }

    async fn fetch_all(&self) -> WalletResult<DashboardSnapshot> {
        let predictions = self.source.fetch_predictions().await?;
        let inventory = self.source.fetch_inventory().await?;
        let plans = self.source.fetch_distribution_plans().await?;
        Ok(DashboardSnapshot {
            predictions,
            inventory,
            plans,
            loaded_at: Some(Utc::now()),
        })
    }

    /// Current stock per category.
    pub fn inventory_quantities(&self) -> HashMap<String, u32> {
        let state = self.state.read();
        let mut quantities = HashMap::new();
        for item in &state.snapshot.inventory {
            let entry: &mut u32 = quantities.entry(item.category.clone()).or_default();
            *entry = entry.saturating_add(item.quantity);
        }
        quantities
    }

    /// Stock per category for display: every standard category in order,
    /// zero when absent, then any other reported categories by name.
    pub fn category_totals(&self) -> Vec<(String, u32)> {
        let mut quantities = self.inventory_quantities();
        let mut totals: Vec<(String, u32)> = FOOD_CATEGORIES
            .iter()
            .map(|category| {
                let quantity = quantities.remove(*category).unwrap_or(0);
                (category.to_string(), quantity)
            })
            .collect();
        let mut extra: Vec<(String, u32)> = quantities.into_iter().collect();
        extra.sort();
        totals.extend(extra);
        totals
    }

    /// Predictions dated within the selected timeframe from `today`.
    pub fn predictions_in_timeframe(&self, today: NaiveDate) -> Vec<Prediction> {
        let state = self.state.read();
        let horizon = today
            .checked_add_signed(chrono::Duration::days(i64::from(state.timeframe.days())))
            .unwrap_or(NaiveDate::MAX);
        state
            .snapshot
            .predictions
            .iter()
            .filter(|prediction| prediction.date >= today && prediction.date <= horizon)
            .cloned()
            .collect()
    }

    /// New plan form checked against the inventory loaded last.
    pub fn plan_form(&self) -> DistributionPlanForm {
        DistributionPlanForm::new(&self.state.read().snapshot.inventory)
    }

    pub fn record_plan(&self, plan: DistributionPlan) {
        self.state.write().snapshot.plans.push(plan);
    }
}

impl fmt::Debug for DashboardPresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardPresenter")
            .field("loading", &self.is_loading())
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{CategoryAllocation, PlanDraft};
    use std::cell::Cell;

    struct FixedSource {
        inventory: Vec<InventoryItem>,
        predictions: Vec<Prediction>,
        fail_plans: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl DashboardSource for FixedSource {
        async fn fetch_predictions(&self) -> WalletResult<Vec<Prediction>> {
            Ok(self.predictions.clone())
        }

        async fn fetch_inventory(&self) -> WalletResult<Vec<InventoryItem>> {
            Ok(self.inventory.clone())
        }

        async fn fetch_distribution_plans(&self) -> WalletResult<Vec<DistributionPlan>> {
            if self.fail_plans.get() {
                return Err(WalletError::NetworkError("plans unavailable".to_string()));
            }
            Ok(Vec::new())
        }
    }

    fn item(category: &str, quantity: u32) -> InventoryItem {
        InventoryItem {
            category: category.to_string(),
            quantity,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn timeframe_defaults_to_month() {
        assert_eq!(Timeframe::default(), Timeframe::Month);
        assert_eq!("Quarter".parse::<Timeframe>().unwrap(), Timeframe::Quarter);
        assert!("year".parse::<Timeframe>().is_err());
    }

    #[tokio::test]
    async fn stub_source_yields_empty_dashboard() {
        let presenter = DashboardPresenter::new(Rc::new(StubDashboardSource));
        let snapshot = presenter.refresh().await.unwrap();
        assert!(snapshot.predictions.is_empty());
        assert!(snapshot.inventory.is_empty());
        assert!(snapshot.plans.is_empty());
        assert!(snapshot.loaded_at.is_some());
        assert!(!presenter.is_loading());
    }

    #[tokio::test]
    async fn failed_refresh_clears_loading_and_keeps_previous_data() {
        let source = Rc::new(FixedSource {
            inventory: vec![item("Canned Goods", 50), item("Canned Goods", 5)],
            predictions: Vec::new(),
            fail_plans: Cell::new(false),
        });
        let presenter = DashboardPresenter::new(source.clone());
        presenter.refresh().await.unwrap();
        assert_eq!(presenter.inventory_quantities()["Canned Goods"], 55);

        source.fail_plans.set(true);
        assert!(matches!(
            presenter.refresh().await,
            Err(WalletError::NetworkError(_))
        ));
        assert!(!presenter.is_loading());
        assert_eq!(presenter.snapshot().inventory.len(), 2);
    }

    #[tokio::test]
    async fn plan_form_uses_loaded_inventory() {
        let presenter = DashboardPresenter::new(Rc::new(FixedSource {
            inventory: vec![item("Canned Goods", 50)],
            predictions: Vec::new(),
            fail_plans: Cell::new(false),
        }));
        presenter.refresh().await.unwrap();

        let mut form = presenter.plan_form();
        let draft = PlanDraft {
            date: Some(date(20)),
            location: "Northside".to_string(),
            expected_clients: 30,
            allocations: vec![CategoryAllocation::new("Canned Goods", 40)],
        };
        let plan = form.submit(&draft, |_| Ok(())).unwrap();
        presenter.record_plan(plan.clone());
        assert_eq!(presenter.snapshot().plans, vec![plan]);
    }

    #[tokio::test]
    async fn category_totals_list_standard_categories_first() {
        let presenter = DashboardPresenter::new(Rc::new(FixedSource {
            inventory: vec![
                item("Pet Food", 4),
                item("Canned Goods", 50),
                item("Baby Food", 6),
                item("Canned Goods", 5),
            ],
            predictions: Vec::new(),
            fail_plans: Cell::new(false),
        }));
        presenter.refresh().await.unwrap();

        let totals = presenter.category_totals();
        assert_eq!(totals.len(), FOOD_CATEGORIES.len() + 1);
        assert_eq!(totals[0], ("Fruits and Vegetables".to_string(), 0));
        assert_eq!(totals[4], ("Canned Goods".to_string(), 55));
        assert_eq!(totals[7], ("Baby Food".to_string(), 6));
        assert_eq!(totals.last().unwrap(), &("Pet Food".to_string(), 4));
        assert!(is_standard_category("Condiments"));
        assert!(!is_standard_category("Pet Food"));
    }

    #[tokio::test]
    async fn timeframe_window_saturates_at_calendar_end() {
        let last = NaiveDate::MAX;
        let presenter = DashboardPresenter::new(Rc::new(FixedSource {
            inventory: Vec::new(),
            predictions: vec![Prediction {
                category: "Other".to_string(),
                predicted_demand: 1,
                date: last,
            }],
            fail_plans: Cell::new(false),
        }));
        presenter.refresh().await.unwrap();

        let today = last.pred_opt().unwrap();
        assert_eq!(presenter.predictions_in_timeframe(today).len(), 1);
        presenter.set_timeframe(Timeframe::Quarter);
        assert_eq!(presenter.predictions_in_timeframe(last).len(), 1);
    }

    #[tokio::test]
    async fn predictions_filtered_by_timeframe() {
        let prediction = |day| Prediction {
            category: "Produce".to_string(),
            predicted_demand: 10,
            date: date(day),
        };
        let presenter = DashboardPresenter::new(Rc::new(FixedSource {
            inventory: Vec::new(),
            predictions: vec![prediction(2), prediction(5), prediction(20)],
            fail_plans: Cell::new(false),
        }));
        presenter.refresh().await.unwrap();

        assert_eq!(presenter.predictions_in_timeframe(date(3)).len(), 2);
        presenter.set_timeframe(Timeframe::Week);
        assert_eq!(presenter.predictions_in_timeframe(date(3)).len(), 1);
    }
}
