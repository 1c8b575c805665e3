use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;
use crate::storage::KeyValueStore;

pub const CURRENCY_KEY: &str = "budget_app_currency";
pub const ENCRYPTED_KEY: &str = "budget_app_encrypted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Inr, Currency::Usd, Currency::Eur, Currency::Gbp];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Currency::Inr => "Indian Rupees",
            Currency::Usd => "US Dollars",
            Currency::Eur => "Euros",
            Currency::Gbp => "British Pounds",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported currency {s:?} (expected INR, USD, EUR or GBP)"))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSettings {
    pub currency: Currency,
    pub encrypt_at_rest: bool,
}

pub fn load_settings(store: &dyn KeyValueStore) -> Result<TrackerSettings, StorageError> {
    Ok(TrackerSettings {
        currency: load_currency(store)?,
        encrypt_at_rest: encrypt_at_rest(store)?,
    })
}

/// Unknown or missing codes fall back to INR.
pub fn load_currency(store: &dyn KeyValueStore) -> Result<Currency, StorageError> {
    Ok(store
        .get(CURRENCY_KEY)?
        .and_then(|code| code.parse().ok())
        .unwrap_or_default())
}

pub fn save_currency(store: &dyn KeyValueStore, currency: Currency) -> Result<(), StorageError> {
    store.set(CURRENCY_KEY, currency.code())
}

pub fn encrypt_at_rest(store: &dyn KeyValueStore) -> Result<bool, StorageError> {
    Ok(store.get(ENCRYPTED_KEY)?.as_deref() == Some("true"))
}

pub fn set_encrypt_at_rest(store: &dyn KeyValueStore, enabled: bool) -> Result<(), StorageError> {
    if enabled {
        store.set(ENCRYPTED_KEY, "true")
    } else {
        store.remove(ENCRYPTED_KEY)
    }
}

/// Symbol plus two decimals with en-IN grouping: `₹1,23,456.50`.
pub fn format_amount(minor: i64, currency: Currency) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let whole = (abs / 100).to_string();
    let cents = abs % 100;
    format!("{sign}{}{}.{cents:02}", currency.symbol(), group_en_in(&whole))
}

fn group_en_in(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}
