//! Categories, transactions and monthly budgets.
//!
//! Collections are whole JSON documents rewritten on every change. In plain
//! mode they live under `budget_app_*` keys; with encryption at rest they
//! are sealed records (`secure:categories`, ...) and every access needs the
//! session key.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::crypto::EncryptionKey;
use crate::error::{SecurityError, StorageError};
use crate::secure_storage::{storage_key, SecureLoad, SecureStorage};
use crate::settings::{self, Currency};
use crate::storage::KeyValueStore;

pub const INITIALIZED_KEY: &str = "budget_app_initialized";
/// Fallback budget for months without an explicit one, in minor units.
pub const DEFAULT_MONTHLY_BUDGET: i64 = 30_000_00;
/// Largest amount, limit or budget accepted, in minor units (one trillion).
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_00;

const DEFAULT_COLOR: &str = "#4ade80";
const DEFAULT_ICON: &str = "circle";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    #[default]
    Expense,
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(LedgerError::Validation(format!(
                "type must be income or expense, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Income => f.write_str("income"),
            EntryKind::Expense => f.write_str("expense"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    /// Minor units; 0 means no limit.
    #[serde(default)]
    pub monthly_limit: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: u32,
    pub category_id: u32,
    /// Minor units, always positive; `kind` carries the direction.
    pub amount: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
}

impl Transaction {
    pub fn year_month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub kind: EntryKind,
    pub monthly_limit: Option<i64>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub kind: Option<EntryKind>,
    pub monthly_limit: Option<i64>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub category_id: u32,
    pub amount: i64,
    pub date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub category_id: Option<u32>,
    pub amount: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub kind: Option<EntryKind>,
}

/// Everything an export carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
    pub monthly_budgets: BTreeMap<String, i64>,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Categories,
    Transactions,
    MonthlyBudgets,
}

impl Collection {
    const ALL: [Collection; 3] = [
        Collection::Categories,
        Collection::Transactions,
        Collection::MonthlyBudgets,
    ];

    fn plain_key(self) -> &'static str {
        match self {
            Collection::Categories => "budget_app_categories",
            Collection::Transactions => "budget_app_transactions",
            Collection::MonthlyBudgets => "budget_app_monthly_budgets",
        }
    }

    fn sealed_name(self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Transactions => "transactions",
            Collection::MonthlyBudgets => "monthly_budgets",
        }
    }
}

pub struct BudgetStore<'a> {
    store: &'a dyn KeyValueStore,
    sealing_key: Option<&'a EncryptionKey>,
}

impl<'a> BudgetStore<'a> {
    /// Open the ledger, seeding default data on first use. `sealing_key`
    /// must be `Some` exactly when encryption at rest is enabled.
    pub fn open(
        store: &'a dyn KeyValueStore,
        sealing_key: Option<&'a EncryptionKey>,
    ) -> Result<Self, LedgerError> {
        let ledger = Self { store, sealing_key };
        if !store.contains(INITIALIZED_KEY)? {
            ledger.seed()?;
        }
        Ok(ledger)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealing_key.is_some()
    }

    fn seed(&self) -> Result<(), LedgerError> {
        self.write(Collection::Categories, &default_categories())?;
        self.write(Collection::Transactions, &default_transactions())?;
        let budgets = BTreeMap::from([("2024-03".to_string(), DEFAULT_MONTHLY_BUDGET)]);
        self.write(Collection::MonthlyBudgets, &budgets)?;
        settings::save_currency(self.store, Currency::Inr)?;
        self.store.set(INITIALIZED_KEY, "true")?;
        info!("ledger seeded with default data");
        Ok(())
    }

    fn read<T: DeserializeOwned + Default>(&self, c: Collection) -> Result<T, LedgerError> {
        match self.sealing_key {
            None => match self.store.get(c.plain_key())? {
                Some(raw) => Ok(serde_json::from_str(&raw)?),
                None => Ok(T::default()),
            },
            Some(key) => match SecureStorage::new(self.store).load_secure(c.sealed_name(), key)? {
                SecureLoad::Found(value) => Ok(value),
                SecureLoad::Missing => Ok(T::default()),
                // Treating this as empty would let the next write clobber it.
                SecureLoad::Inaccessible => Err(SecurityError::DecryptionFailed.into()),
            },
        }
    }

    fn write<T: Serialize>(&self, c: Collection, value: &T) -> Result<(), LedgerError> {
        match self.sealing_key {
            None => self.store.set(c.plain_key(), &serde_json::to_string(value)?)?,
            Some(key) => SecureStorage::new(self.store).save_secure(c.sealed_name(), value, key)?,
        }
        debug!(collection = c.sealed_name(), sealed = self.is_sealed(), "collection written");
        Ok(())
    }

    // ── Categories ──────────────────────────────────────────────────────────

    pub fn list_categories(&self) -> Result<Vec<Category>, LedgerError> {
        self.read(Collection::Categories)
    }

    pub fn create_category(&self, input: NewCategory) -> Result<Category, LedgerError> {
        let name = validate_name(&input.name)?;
        if let Some(limit) = input.monthly_limit {
            validate_non_negative("monthly limit", limit)?;
        }
        let mut categories = self.list_categories()?;
        let category = Category {
            id: next_id(categories.iter().map(|c| c.id))?,
            name,
            kind: input.kind,
            monthly_limit: input.monthly_limit.unwrap_or(0),
            color: Some(input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
            icon: Some(input.icon.unwrap_or_else(|| DEFAULT_ICON.to_string())),
        };
        categories.push(category.clone());
        self.write(Collection::Categories, &categories)?;
        Ok(category)
    }

    pub fn update_category(&self, id: u32, patch: CategoryPatch) -> Result<Category, LedgerError> {
        let mut categories = self.list_categories()?;
        let category = categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(LedgerError::NotFound { kind: "category", id })?;
        if let Some(name) = patch.name {
            category.name = validate_name(&name)?;
        }
        if let Some(kind) = patch.kind {
            category.kind = kind;
        }
        if let Some(limit) = patch.monthly_limit {
            category.monthly_limit = validate_non_negative("monthly limit", limit)?;
        }
        if patch.color.is_some() {
            category.color = patch.color;
        }
        if patch.icon.is_some() {
            category.icon = patch.icon;
        }
        let updated = category.clone();
        self.write(Collection::Categories, &categories)?;
        Ok(updated)
    }

    pub fn delete_category(&self, id: u32) -> Result<(), LedgerError> {
        let mut categories = self.list_categories()?;
        categories.retain(|c| c.id != id);
        self.write(Collection::Categories, &categories)
    }

    // ── Transactions ────────────────────────────────────────────────────────

    /// Newest first.
    pub fn list_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions: Vec<Transaction> = self.read(Collection::Transactions)?;
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(transactions)
    }

    pub fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        validate_positive("amount", input.amount)?;
        self.ensure_category(input.category_id)?;
        let mut transactions: Vec<Transaction> = self.read(Collection::Transactions)?;
        let transaction = Transaction {
            id: next_id(transactions.iter().map(|t| t.id))?,
            category_id: input.category_id,
            amount: input.amount,
            date: input.date.unwrap_or_else(Utc::now),
            note: input.note.filter(|n| !n.trim().is_empty()),
            kind: input.kind,
        };
        transactions.push(transaction.clone());
        self.write(Collection::Transactions, &transactions)?;
        Ok(transaction)
    }

    pub fn update_transaction(
        &self,
        id: u32,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        if let Some(category_id) = patch.category_id {
            self.ensure_category(category_id)?;
        }
        let mut transactions: Vec<Transaction> = self.read(Collection::Transactions)?;
        let transaction = transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LedgerError::NotFound { kind: "transaction", id })?;
        if let Some(category_id) = patch.category_id {
            transaction.category_id = category_id;
        }
        if let Some(amount) = patch.amount {
            transaction.amount = validate_positive("amount", amount)?;
        }
        if let Some(date) = patch.date {
            transaction.date = date;
        }
        if let Some(note) = patch.note {
            transaction.note = Some(note).filter(|n| !n.trim().is_empty());
        }
        if let Some(kind) = patch.kind {
            transaction.kind = kind;
        }
        let updated = transaction.clone();
        self.write(Collection::Transactions, &transactions)?;
        Ok(updated)
    }

    pub fn delete_transaction(&self, id: u32) -> Result<(), LedgerError> {
        let mut transactions: Vec<Transaction> = self.read(Collection::Transactions)?;
        transactions.retain(|t| t.id != id);
        self.write(Collection::Transactions, &transactions)
    }

    fn ensure_category(&self, id: u32) -> Result<(), LedgerError> {
        if self.list_categories()?.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(LedgerError::Validation(format!("unknown category {id}")))
        }
    }

    // ── Monthly budgets ─────────────────────────────────────────────────────

    pub fn monthly_budget(&self, year_month: &str) -> Result<i64, LedgerError> {
        validate_year_month(year_month)?;
        let budgets: BTreeMap<String, i64> = self.read(Collection::MonthlyBudgets)?;
        Ok(budgets
            .get(year_month)
            .copied()
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_MONTHLY_BUDGET))
    }

    pub fn set_monthly_budget(&self, year_month: &str, limit: i64) -> Result<i64, LedgerError> {
        validate_year_month(year_month)?;
        validate_non_negative("budget", limit)?;
        let mut budgets: BTreeMap<String, i64> = self.read(Collection::MonthlyBudgets)?;
        budgets.insert(year_month.to_string(), limit);
        self.write(Collection::MonthlyBudgets, &budgets)?;
        Ok(limit)
    }

    // ── Snapshots ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot {
            categories: self.list_categories()?,
            transactions: self.read(Collection::Transactions)?,
            monthly_budgets: self.read(Collection::MonthlyBudgets)?,
            currency: settings::load_currency(self.store)?,
        })
    }

    /// Replace every collection with the snapshot's contents.
    pub fn restore(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
        self.write(Collection::Categories, &snapshot.categories)?;
        self.write(Collection::Transactions, &snapshot.transactions)?;
        self.write(Collection::MonthlyBudgets, &snapshot.monthly_budgets)?;
        settings::save_currency(self.store, snapshot.currency)?;
        self.store.set(INITIALIZED_KEY, "true")?;
        info!(
            categories = snapshot.categories.len(),
            transactions = snapshot.transactions.len(),
            "ledger restored from snapshot"
        );
        Ok(())
    }
}

/// Move plain collections into sealed records under `key`.
pub fn seal_collections(store: &dyn KeyValueStore, key: &EncryptionKey) -> Result<(), LedgerError> {
    let secure = SecureStorage::new(store);
    for c in Collection::ALL {
        if let Some(raw) = store.get(c.plain_key())? {
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            secure.save_secure(c.sealed_name(), &value, key)?;
        }
    }
    settings::set_encrypt_at_rest(store, true)?;
    for c in Collection::ALL {
        store.remove(c.plain_key())?;
    }
    info!("ledger sealed");
    Ok(())
}

/// Reverse of [`seal_collections`]. Fails without touching anything if a
/// sealed record cannot be opened with `key`.
pub fn unseal_collections(
    store: &dyn KeyValueStore,
    key: &EncryptionKey,
) -> Result<(), LedgerError> {
    let secure = SecureStorage::new(store);
    let mut opened = Vec::new();
    for c in Collection::ALL {
        match secure.load_secure::<serde_json::Value>(c.sealed_name(), key)? {
            SecureLoad::Found(value) => opened.push((c, value)),
            SecureLoad::Missing => {}
            SecureLoad::Inaccessible => return Err(SecurityError::DecryptionFailed.into()),
        }
    }
    for (c, value) in &opened {
        store.set(c.plain_key(), &serde_json::to_string(value)?)?;
    }
    settings::set_encrypt_at_rest(store, false)?;
    for c in Collection::ALL {
        store.remove(&storage_key(c.sealed_name()))?;
    }
    info!("ledger unsealed");
    Ok(())
}

/// Parse a decimal amount such as `"120.50"` into minor units.
pub fn parse_amount(input: &str) -> Result<i64, LedgerError> {
    let invalid = || LedgerError::Validation(format!("invalid amount {input:?}"));
    let trimmed = input.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)
}

pub fn validate_year_month(year_month: &str) -> Result<(), LedgerError> {
    if year_month.len() == 7
        && NaiveDate::parse_from_str(&format!("{year_month}-01"), "%Y-%m-%d").is_ok()
    {
        Ok(())
    } else {
        Err(LedgerError::Validation(format!(
            "month must be YYYY-MM, got {year_month:?}"
        )))
    }
}

fn validate_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation("name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn validate_positive(field: &str, value: i64) -> Result<i64, LedgerError> {
    if value <= 0 {
        return Err(LedgerError::Validation(format!("{field} must be positive")));
    }
    validate_upper_bound(field, value)
}

fn validate_non_negative(field: &str, value: i64) -> Result<i64, LedgerError> {
    if value < 0 {
        return Err(LedgerError::Validation(format!("{field} must not be negative")));
    }
    validate_upper_bound(field, value)
}

fn validate_upper_bound(field: &str, value: i64) -> Result<i64, LedgerError> {
    if value > MAX_AMOUNT {
        return Err(LedgerError::Validation(format!(
            "{field} exceeds the maximum of {MAX_AMOUNT} minor units"
        )));
    }
    Ok(value)
}

fn next_id(ids: impl Iterator<Item = u32>) -> Result<u32, LedgerError> {
    ids.max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| LedgerError::Validation("no ids left; highest id is already in use".into()))
}

fn default_categories() -> Vec<Category> {
    let category = |id, name: &str, kind, limit, color: &str, icon: &str| Category {
        id,
        name: name.to_string(),
        kind,
        monthly_limit: limit,
        color: Some(color.to_string()),
        icon: Some(icon.to_string()),
    };
    vec![
        category(1, "Groceries", EntryKind::Expense, 500_00, "#4ade80", "shopping-cart"),
        category(2, "Rent", EntryKind::Expense, 1500_00, "#f87171", "home"),
        category(3, "Salary", EntryKind::Income, 0, "#60a5fa", "briefcase"),
        category(4, "Entertainment", EntryKind::Expense, 200_00, "#c084fc", "film"),
    ]
}

fn default_transactions() -> Vec<Transaction> {
    let day = |d: u32| Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).single().unwrap_or_default();
    vec![
        Transaction {
            id: 1,
            category_id: 3,
            amount: 4000_00,
            date: day(1),
            note: Some("March Salary".into()),
            kind: EntryKind::Income,
        },
        Transaction {
            id: 2,
            category_id: 2,
            amount: 1500_00,
            date: day(2),
            note: Some("March Rent".into()),
            kind: EntryKind::Expense,
        },
        Transaction {
            id: 3,
            category_id: 1,
            amount: 120_50,
            date: day(5),
            note: Some("Weekly groceries".into()),
            kind: EntryKind::Expense,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_with_salt;
    use crate::salt::Salt;
    use crate::storage::MemoryStore;

    fn plain(store: &MemoryStore) -> BudgetStore<'_> {
        BudgetStore::open(store, None).unwrap()
    }

    #[test]
    fn first_open_seeds_defaults_once() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        assert_eq!(ledger.list_categories().unwrap().len(), 4);
        assert_eq!(ledger.list_transactions().unwrap().len(), 3);
        ledger.delete_category(4).unwrap();
        let reopened = plain(&store);
        assert_eq!(reopened.list_categories().unwrap().len(), 3);
        assert_eq!(settings::load_currency(&store).unwrap(), Currency::Inr);
    }

    #[test]
    fn category_crud() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        let created = ledger
            .create_category(NewCategory {
                name: " Travel ".into(),
                monthly_limit: Some(250_00),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.id, 5);
        assert_eq!(created.name, "Travel");
        assert_eq!(created.color.as_deref(), Some("#4ade80"));
        assert_eq!(created.icon.as_deref(), Some("circle"));

        let updated = ledger
            .update_category(5, CategoryPatch {
                monthly_limit: Some(300_00),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.monthly_limit, 300_00);
        assert_eq!(updated.name, "Travel");

        let missing = ledger.update_category(99, CategoryPatch::default()).unwrap_err();
        assert!(matches!(missing, LedgerError::NotFound { id: 99, .. }));

        ledger.delete_category(5).unwrap();
        ledger.delete_category(5).unwrap();
        assert!(ledger.list_categories().unwrap().iter().all(|c| c.id != 5));

        assert!(matches!(
            ledger.create_category(NewCategory::default()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn transactions_are_newest_first_and_validated() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        let tx = ledger
            .create_transaction(NewTransaction {
                category_id: 1,
                amount: 45_00,
                date: Some(Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()),
                note: Some("  ".into()),
                kind: EntryKind::Expense,
            })
            .unwrap();
        assert_eq!(tx.id, 4);
        assert_eq!(tx.note, None);
        let listed = ledger.list_transactions().unwrap();
        assert_eq!(listed[0].id, 4);
        assert_eq!(listed.last().unwrap().id, 1);

        let err = ledger
            .create_transaction(NewTransaction {
                category_id: 42,
                amount: 1,
                date: None,
                note: None,
                kind: EntryKind::Expense,
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let patched = ledger
            .update_transaction(4, TransactionPatch {
                amount: Some(50_00),
                note: Some("bus pass".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(patched.amount, 50_00);
        assert_eq!(patched.note.as_deref(), Some("bus pass"));
        ledger.delete_transaction(4).unwrap();
        assert_eq!(ledger.list_transactions().unwrap().len(), 3);
    }

    #[test]
    fn monthly_budget_defaults_and_overrides() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        assert_eq!(ledger.monthly_budget("2024-03").unwrap(), DEFAULT_MONTHLY_BUDGET);
        assert_eq!(ledger.monthly_budget("2031-12").unwrap(), DEFAULT_MONTHLY_BUDGET);
        ledger.set_monthly_budget("2024-05", 12_345_00).unwrap();
        assert_eq!(ledger.monthly_budget("2024-05").unwrap(), 12_345_00);
        assert!(ledger.monthly_budget("2024-13").is_err());
        assert!(ledger.monthly_budget("24-01").is_err());
    }

    #[test]
    fn sealed_ledger_roundtrip_and_wrong_key() {
        let store = MemoryStore::new();
        plain(&store);
        let key = derive_with_salt("4242", &Salt([5u8; 16]));
        seal_collections(&store, &key).unwrap();
        assert!(store.get("budget_app_categories").unwrap().is_none());
        assert!(store.get("secure:categories").unwrap().is_some());

        let sealed = BudgetStore::open(&store, Some(&key)).unwrap();
        assert_eq!(sealed.list_categories().unwrap().len(), 4);
        sealed
            .create_category(NewCategory {
                name: "Gym".into(),
                ..Default::default()
            })
            .unwrap();

        let wrong = derive_with_salt("0000", &Salt([5u8; 16]));
        let intruder = BudgetStore::open(&store, Some(&wrong)).unwrap();
        assert!(matches!(
            intruder.list_categories(),
            Err(LedgerError::Security(SecurityError::DecryptionFailed))
        ));
        assert!(unseal_collections(&store, &wrong).is_err());
        assert!(store.get("secure:categories").unwrap().is_some());

        unseal_collections(&store, &key).unwrap();
        let back = plain(&store);
        assert_eq!(back.list_categories().unwrap().len(), 5);
        assert!(store.get("secure:categories").unwrap().is_none());
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount("120.50").unwrap(), 120_50);
        assert_eq!(parse_amount("120.5").unwrap(), 120_50);
        assert_eq!(parse_amount("4000").unwrap(), 4000_00);
        assert_eq!(parse_amount(".75").unwrap(), 75);
        for bad in ["", ".", "1.234", "-5", "12a", "1,000"] {
            assert!(parse_amount(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn amounts_above_the_cap_are_rejected() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        let huge = parse_amount("92233720368547758.07").unwrap();
        let err = ledger
            .create_transaction(NewTransaction {
                category_id: 2,
                amount: huge,
                date: None,
                note: None,
                kind: EntryKind::Expense,
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.list_transactions().unwrap().len(), 3);

        assert!(ledger.set_monthly_budget("2024-05", MAX_AMOUNT + 1).is_err());
        assert!(ledger
            .update_category(1, CategoryPatch {
                monthly_limit: Some(i64::MAX),
                ..Default::default()
            })
            .is_err());
        assert!(ledger
            .update_transaction(1, TransactionPatch {
                amount: Some(MAX_AMOUNT + 1),
                ..Default::default()
            })
            .is_err());
        assert_eq!(ledger.set_monthly_budget("2024-05", MAX_AMOUNT).unwrap(), MAX_AMOUNT);
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        let store = MemoryStore::new();
        let ledger = plain(&store);
        let mut snapshot = ledger.snapshot().unwrap();
        snapshot.categories[0].id = u32::MAX;
        snapshot.transactions[0].id = u32::MAX;
        ledger.restore(&snapshot).unwrap();

        let err = ledger
            .create_category(NewCategory {
                name: "Overflow".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = ledger
            .create_transaction(NewTransaction {
                category_id: 2,
                amount: 1_00,
                date: None,
                note: None,
                kind: EntryKind::Expense,
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.list_categories().unwrap().len(), 4);
        assert_eq!(ledger.list_transactions().unwrap().len(), 3);
    }

    #[test]
    fn snapshot_restore_replaces_everything() {
        let source = MemoryStore::new();
        let ledger = plain(&source);
        ledger.set_monthly_budget("2024-06", 1_00).unwrap();
        settings::save_currency(&source, Currency::Gbp).unwrap();
        let snapshot = ledger.snapshot().unwrap();

        let target = MemoryStore::new();
        let other = plain(&target);
        other.delete_transaction(1).unwrap();
        other.restore(&snapshot).unwrap();
        assert_eq!(other.snapshot().unwrap(), snapshot);
    }
}
