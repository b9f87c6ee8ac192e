//! Distribution plans and the form that checks them against inventory.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dashboard::InventoryItem;
use crate::errors::{WalletError, WalletResult};
use crate::validation::InputValidator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAllocation {
    pub category: String,
    pub amount: u32,
}

impl CategoryAllocation {
    pub fn new(category: impl Into<String>, amount: u32) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }
}

/// A validated plan ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPlan {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location: String,
    pub expected_clients: u32,
    pub allocations: Vec<CategoryAllocation>,
}

/// What the user has typed into the form so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    pub date: Option<NaiveDate>,
    pub location: String,
    pub expected_clients: u32,
    /// Kept in entry order; checked in that order. Lines naming the same
    /// category draw on the same stock.
    pub allocations: Vec<CategoryAllocation>,
}

/// Plan entry form bound to the inventory known when it was opened.
#[derive(Debug, Clone)]
pub struct DistributionPlanForm {
    quantities: HashMap<String, u32>,
    open: bool,
}

impl DistributionPlanForm {
    pub fn new(inventory: &[InventoryItem]) -> Self {
        let mut quantities: HashMap<String, u32> = HashMap::new();
        for item in inventory {
            let quantity = quantities.entry(item.category.clone()).or_default();
            *quantity = quantity.saturating_add(item.quantity);
        }
        Self {
            quantities,
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn reopen(&mut self) {
        self.open = true;
    }

    /// Known quantity for a category; unknown categories have none.
    pub fn available(&self, category: &str) -> u32 {
        self.quantities.get(category).copied().unwrap_or(0)
    }

    /// Check the draft, reporting the first field that fails.
    pub fn validate(&self, draft: &PlanDraft) -> WalletResult<DistributionPlan> {
        let date = draft
            .date
            .ok_or_else(|| WalletError::validation_failed("date"))?;

        let location = InputValidator::shared()?.validate_text_field("location", &draft.location)?;

        if draft.expected_clients == 0 {
            return Err(WalletError::validation_failed("expectedClients"));
        }

        let mut requested: HashMap<&str, u32> = HashMap::new();
        for allocation in &draft.allocations {
            let total = requested.entry(allocation.category.as_str()).or_default();
            *total = total.saturating_add(allocation.amount);
            if *total > self.available(&allocation.category) {
                return Err(WalletError::validation_failed(allocation.category.clone()));
            }
        }

        Ok(DistributionPlan {
            id: Uuid::new_v4(),
            date,
            location,
            expected_clients: draft.expected_clients,
            allocations: draft.allocations.clone(),
        })
    }

    /// Validate, hand the plan to `on_save`, then close.
    ///
    /// The form stays open when validation or the save callback fails.
    pub fn submit<F>(&mut self, draft: &PlanDraft, on_save: F) -> WalletResult<DistributionPlan>
    where
        F: FnOnce(&DistributionPlan) -> WalletResult<()>,
    {
        let plan = self.validate(draft).map_err(|err| {
            log::warn!("Distribution plan rejected: {}", err);
            err
        })?;
        on_save(&plan)?;
        self.open = false;
        log::info!(
            "Saved distribution plan {} for {} on {}",
            plan.id,
            plan.location,
            plan.date
        );
        Ok(plan)
    }
}
