//! Human-readable output. `--json` bypasses all of this.

use anyhow::Result;
use budget_core::insights::{self, BreakdownEntry, CategorySpending, MonthSummary};
use budget_core::ledger::{BudgetStore, Category, EntryKind, Transaction};
use budget_core::settings::{format_amount, Currency};
use serde::Serialize;

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn categories(categories: &[Category], currency: Currency) {
    if categories.is_empty() {
        println!("no categories");
        return;
    }
    for c in categories {
        let limit = if c.monthly_limit > 0 {
            format_amount(c.monthly_limit, currency)
        } else {
            "no limit".to_string()
        };
        println!("{:>4}  {:<20} {:<8} {}", c.id, c.name, c.kind.to_string(), limit);
    }
}

pub fn transactions(transactions: &[Transaction], categories: &[Category], currency: Currency) {
    if transactions.is_empty() {
        println!("no transactions");
        return;
    }
    for t in transactions {
        let category = categories
            .iter()
            .find(|c| c.id == t.category_id)
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown");
        let sign = match t.kind {
            EntryKind::Income => "+",
            EntryKind::Expense => "-",
        };
        println!(
            "{:>4}  {}  {:<16} {}{:<14} {}",
            t.id,
            t.date.format("%Y-%m-%d"),
            category,
            sign,
            format_amount(t.amount, currency),
            t.note.as_deref().unwrap_or("")
        );
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub month: String,
    pub currency: Currency,
    pub summary: MonthSummary,
    pub budget: i64,
    pub spending: Vec<CategorySpending>,
    pub breakdown: Vec<BreakdownEntry>,
}

impl SummaryReport {
    pub fn build(ledger: &BudgetStore<'_>, month: String, currency: Currency) -> Result<Self> {
        let categories = ledger.list_categories()?;
        let transactions = ledger.list_transactions()?;
        Ok(Self {
            summary: insights::month_summary(&transactions, &month),
            budget: ledger.monthly_budget(&month)?,
            spending: insights::category_spending(&categories, &transactions, &month),
            breakdown: insights::expense_breakdown(&categories, &transactions, &month),
            month,
            currency,
        })
    }
}

pub fn summary(report: &SummaryReport) {
    let money = |v: i64| format_amount(v, report.currency);
    println!("{} ({})", report.month, report.currency.name());
    println!("  income    {}", money(report.summary.income));
    println!("  expenses  {}", money(report.summary.expenses));
    println!("  balance   {}", money(report.summary.balance));
    let used = if report.budget > 0 {
        report.summary.expenses as f64 / report.budget as f64 * 100.0
    } else {
        0.0
    };
    println!("  budget    {} ({used:.1}% used)", money(report.budget));
    if !report.spending.is_empty() {
        println!("categories");
        for s in &report.spending {
            let over = s
                .over_budget_by
                .map(|by| format!("  over by {}", money(by)))
                .unwrap_or_default();
            let limit = if s.limit > 0 {
                money(s.limit)
            } else {
                "no limit".to_string()
            };
            println!(
                "  {:<20} {} / {} {:>5.1}%{over}",
                s.name,
                money(s.spent),
                limit,
                s.percent
            );
        }
    }
}

pub fn yearly(year: i32, totals: &[i64; 12], currency: Currency) {
    println!("{year} expenses by month");
    for (month, total) in totals.iter().enumerate() {
        println!("  {:02}  {}", month + 1, format_amount(*total, currency));
    }
}
