//! Read-only aggregations over ledger data. All amounts are minor units.
//!
//! Imported ledgers are not bounded by the ledger's amount cap, so every
//! total saturates at the `i64` limits instead of overflowing.

use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ledger::{Category, EntryKind, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub income: i64,
    pub expenses: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpending {
    pub category_id: u32,
    pub name: String,
    pub spent: i64,
    pub limit: i64,
    /// `spent / limit` as a percentage, capped at 100; 0 when there is no limit.
    pub percent: f64,
    pub over_budget_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub name: String,
    pub value: i64,
}

fn in_month<'t>(
    transactions: &'t [Transaction],
    year_month: &'t str,
) -> impl Iterator<Item = &'t Transaction> + 't {
    transactions
        .iter()
        .filter(move |t| t.year_month() == year_month)
}

pub fn month_summary(transactions: &[Transaction], year_month: &str) -> MonthSummary {
    let (mut income, mut expenses) = (0i64, 0i64);
    for t in in_month(transactions, year_month) {
        match t.kind {
            EntryKind::Income => income = income.saturating_add(t.amount),
            EntryKind::Expense => expenses = expenses.saturating_add(t.amount),
        }
    }
    MonthSummary {
        income,
        expenses,
        balance: income.saturating_sub(expenses),
    }
}

/// Spending against limit for every expense category in the month.
pub fn category_spending(
    categories: &[Category],
    transactions: &[Transaction],
    year_month: &str,
) -> Vec<CategorySpending> {
    categories
        .iter()
        .filter(|c| c.kind == EntryKind::Expense)
        .map(|c| {
            let spent: i64 = in_month(transactions, year_month)
                .filter(|t| t.category_id == c.id && t.kind == EntryKind::Expense)
                .map(|t| t.amount)
                .fold(0, i64::saturating_add);
            let limit = c.monthly_limit;
            let percent = if limit > 0 {
                (spent as f64 / limit as f64 * 100.0).min(100.0)
            } else {
                0.0
            };
            CategorySpending {
                category_id: c.id,
                name: c.name.clone(),
                spent,
                limit,
                percent,
                over_budget_by: (limit > 0 && spent > limit).then(|| spent.saturating_sub(limit)),
            }
        })
        .collect()
}

/// Expense totals per category for the month, largest first.
pub fn expense_breakdown(
    categories: &[Category],
    transactions: &[Transaction],
    year_month: &str,
) -> Vec<BreakdownEntry> {
    let mut totals: BTreeMap<u32, i64> = BTreeMap::new();
    for t in in_month(transactions, year_month).filter(|t| t.kind == EntryKind::Expense) {
        let total = totals.entry(t.category_id).or_default();
        *total = total.saturating_add(t.amount);
    }
    let mut entries: Vec<BreakdownEntry> = totals
        .into_iter()
        .map(|(id, value)| BreakdownEntry {
            name: categories
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            value,
        })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    entries
}

/// Expense totals for each month of `year`, January first.
pub fn monthly_expense_totals(transactions: &[Transaction], year: i32) -> [i64; 12] {
    let mut months = [0i64; 12];
    for t in transactions
        .iter()
        .filter(|t| t.kind == EntryKind::Expense && t.date.year() == year)
    {
        let month = &mut months[t.date.month0() as usize];
        *month = month.saturating_add(t.amount);
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn category(id: u32, name: &str, kind: EntryKind, limit: i64) -> Category {
        Category {
            id,
            name: name.into(),
            kind,
            monthly_limit: limit,
            color: None,
            icon: None,
        }
    }

    fn tx(id: u32, category_id: u32, amount: i64, month: u32, day: u32, kind: EntryKind) -> Transaction {
        Transaction {
            id,
            category_id,
            amount,
            date: Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap(),
            note: None,
            kind,
        }
    }

    fn fixture() -> (Vec<Category>, Vec<Transaction>) {
        let categories = vec![
            category(1, "Groceries", EntryKind::Expense, 500_00),
            category(2, "Rent", EntryKind::Expense, 1500_00),
            category(3, "Salary", EntryKind::Income, 0),
            category(4, "Fun", EntryKind::Expense, 0),
        ];
        let transactions = vec![
            tx(1, 3, 4000_00, 3, 1, EntryKind::Income),
            tx(2, 2, 1500_00, 3, 2, EntryKind::Expense),
            tx(3, 1, 420_00, 3, 5, EntryKind::Expense),
            tx(4, 1, 120_00, 3, 9, EntryKind::Expense),
            tx(5, 1, 80_00, 4, 1, EntryKind::Expense),
            tx(6, 4, 30_00, 3, 20, EntryKind::Expense),
        ];
        (categories, transactions)
    }

    #[test]
    fn summary_for_month() {
        let (_, transactions) = fixture();
        let summary = month_summary(&transactions, "2024-03");
        assert_eq!(summary.income, 4000_00);
        assert_eq!(summary.expenses, 2070_00);
        assert_eq!(summary.balance, 1930_00);
        assert_eq!(month_summary(&transactions, "2023-03").expenses, 0);
    }

    #[test]
    fn spending_against_limits() {
        let (categories, transactions) = fixture();
        let spending = category_spending(&categories, &transactions, "2024-03");
        assert_eq!(spending.len(), 3);
        let groceries = &spending[0];
        assert_eq!(groceries.spent, 540_00);
        assert_eq!(groceries.percent, 100.0);
        assert_eq!(groceries.over_budget_by, Some(40_00));
        let rent = &spending[1];
        assert_eq!(rent.percent, 100.0);
        assert_eq!(rent.over_budget_by, None);
        let fun = &spending[2];
        assert_eq!(fun.percent, 0.0);
        assert_eq!(fun.over_budget_by, None);
    }

    #[test]
    fn breakdown_sorted_descending() {
        let (categories, transactions) = fixture();
        let breakdown = expense_breakdown(&categories, &transactions, "2024-03");
        let names: Vec<&str> = breakdown.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Rent", "Groceries", "Fun"]);
    }

    #[test]
    fn yearly_buckets() {
        let (_, transactions) = fixture();
        let months = monthly_expense_totals(&transactions, 2024);
        assert_eq!(months[2], 2070_00);
        assert_eq!(months[3], 80_00);
        assert_eq!(months.iter().sum::<i64>(), 2150_00);
        assert_eq!(monthly_expense_totals(&transactions, 2025), [0; 12]);
    }

    #[test]
    fn totals_saturate_on_huge_amounts() {
        let categories = vec![category(2, "Rent", EntryKind::Expense, 1_00)];
        let transactions = vec![
            tx(1, 2, i64::MAX - 1, 3, 1, EntryKind::Expense),
            tx(2, 2, i64::MAX - 1, 3, 2, EntryKind::Expense),
            tx(3, 3, 5_00, 3, 3, EntryKind::Income),
        ];
        let summary = month_summary(&transactions, "2024-03");
        assert_eq!(summary.expenses, i64::MAX);
        assert_eq!(summary.balance, 5_00 - i64::MAX);

        let spending = category_spending(&categories, &transactions, "2024-03");
        assert_eq!(spending[0].spent, i64::MAX);
        assert_eq!(spending[0].over_budget_by, Some(i64::MAX - 1_00));

        let breakdown = expense_breakdown(&categories, &transactions, "2024-03");
        assert_eq!(breakdown[0].value, i64::MAX);
        assert_eq!(monthly_expense_totals(&transactions, 2024)[2], i64::MAX);
    }
}
