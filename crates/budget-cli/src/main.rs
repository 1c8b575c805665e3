use anyhow::{anyhow, Context, Result};
use budget_core::ledger::{
    self, CategoryPatch, EntryKind, NewCategory, NewTransaction, TransactionPatch,
};
use budget_core::settings::{self, format_amount, Currency};
use budget_core::{backup, insights, AppContext};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

mod render;
mod session;
mod shell;

use crate::render::SummaryReport;
use crate::session::{prompt_new_pin, Session};

#[derive(Parser, Debug)]
#[command(name = "budget", author, version, about = "PIN-locked personal budget tracker", long_about = None)]
struct Cli {
    /// Directory holding store.json (default: BUDGET_TRACKER_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// PIN used to unlock (default: BUDGET_TRACKER_PIN, then a prompt)
    #[arg(long, global = true)]
    pin: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set, check or remove the app PIN
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },
    /// Manage spending and income categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Manage transactions
    Tx {
        #[command(subcommand)]
        action: TxAction,
    },
    /// Income, expenses and category spending for a month
    Summary {
        /// Month as YYYY-MM (default: current month)
        #[arg(long, conflicts_with = "year")]
        month: Option<String>,
        /// Show expense totals for every month of a year instead
        #[arg(long)]
        year: Option<i32>,
    },
    /// Overall monthly budget
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },
    /// Display currency
    Currency {
        #[command(subcommand)]
        action: CurrencyAction,
    },
    /// Encryption at rest for the ledger
    Encrypt {
        #[command(subcommand)]
        action: EncryptAction,
    },
    /// Write a PIN-encrypted export of the ledger
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the ledger with the contents of an export
    Import { file: PathBuf },
    /// Remote backup of export blobs
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Wipe the PIN, every sealed record and the encryption flag
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Interactive session driven by lifecycle signals
    Shell,
}

#[derive(Subcommand, Debug)]
enum PinAction {
    /// Set the PIN, or change it (needs the current PIN)
    Set {
        /// New PIN; prompted for when omitted
        #[arg(long)]
        new: Option<String>,
    },
    Status,
    Verify,
    /// Remove the PIN and decrypt the ledger
    Clear,
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    List,
    Add {
        name: String,
        #[arg(long = "type", default_value = "expense")]
        kind: EntryKind,
        /// Monthly limit, e.g. 250 or 99.50
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Update {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        kind: Option<EntryKind>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Delete { id: u32 },
}

#[derive(Subcommand, Debug)]
enum TxAction {
    List {
        /// Only transactions in this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Add {
        #[arg(long)]
        category: u32,
        #[arg(long)]
        amount: String,
        #[arg(long = "type", default_value = "expense")]
        kind: EntryKind,
        /// YYYY-MM-DD (default: now)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Update {
        id: u32,
        #[arg(long)]
        category: Option<u32>,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long = "type")]
        kind: Option<EntryKind>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete { id: u32 },
}

#[derive(Subcommand, Debug)]
enum BudgetAction {
    Get {
        #[arg(long)]
        month: Option<String>,
    },
    Set {
        amount: String,
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CurrencyAction {
    Get,
    Set { code: Currency },
}

#[derive(Subcommand, Debug)]
enum EncryptAction {
    Enable,
    Disable,
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// Upload an export file to Drive app data
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "")]
        token: String,
    },
    /// Fetch the latest export from Drive app data
    Restore {
        #[arg(long, default_value = "")]
        token: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        data_dir,
        pin,
        json,
        command,
    } = Cli::parse();
    let mut session = Session::open(data_dir.as_deref(), pin)?;

    match command {
        Commands::Pin { action } => pin_command(&mut session, action, json),
        Commands::Category { action } => category_command(&mut session, action, json),
        Commands::Tx { action } => tx_command(&mut session, action, json),
        Commands::Summary { month, year } => summary_command(&mut session, month, year, json),
        Commands::Budget { action } => budget_command(&mut session, action, json),
        Commands::Currency { action } => currency_command(&mut session, action, json),
        Commands::Encrypt { action } => encrypt_command(&mut session, action),
        Commands::Export { output } => export_command(&mut session, output),
        Commands::Import { file } => import_command(&mut session, file, json),
        Commands::Backup { action } => backup_command(action),
        Commands::Reset { yes } => reset_command(&mut session, yes),
        Commands::Shell => {
            let stdin = std::io::stdin();
            shell::run(&mut session, stdin.lock())
        }
    }
}

fn pin_command(session: &mut Session, action: PinAction, json: bool) -> Result<()> {
    match action {
        PinAction::Set { new } => {
            let had_pin = session.context().has_pin()?;
            if had_pin {
                session.ensure_unlocked()?;
            }
            let new_pin = match new {
                Some(pin) => Zeroizing::new(pin),
                None if !had_pin => match session.preset_pin() {
                    Some(pin) => pin,
                    None => prompt_new_pin()?,
                },
                None => prompt_new_pin()?,
            };
            session.context_mut().setup_pin(&new_pin)?;
            println!("PIN {}", if had_pin { "changed" } else { "set" });
        }
        PinAction::Status => {
            let status = StatusReport::collect(session.context())?;
            if json {
                render::json(&status)?;
            } else {
                println!("{}", status.line());
            }
        }
        PinAction::Verify => {
            if !session.context().has_pin()? {
                return Err(anyhow!("no PIN is set"));
            }
            let pin = session.pin("PIN: ")?;
            session.unlock_with(&pin)?;
            println!("PIN verified");
        }
        PinAction::Clear => {
            session.ensure_unlocked()?;
            session.context_mut().remove_pin()?;
            println!("PIN removed");
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusReport {
    pub pin_configured: bool,
    pub state: String,
    pub encrypt_at_rest: bool,
    pub currency: Currency,
}

impl StatusReport {
    pub fn collect(ctx: &AppContext) -> Result<Self> {
        Ok(Self {
            pin_configured: ctx.has_pin()?,
            state: ctx.lock_state().to_string(),
            encrypt_at_rest: settings::encrypt_at_rest(ctx.store())?,
            currency: settings::load_currency(ctx.store())?,
        })
    }

    pub fn line(&self) -> String {
        format!(
            "state: {} | pin: {} | encryption: {} | currency: {}",
            self.state,
            if self.pin_configured { "set" } else { "none" },
            if self.encrypt_at_rest { "on" } else { "off" },
            self.currency
        )
    }
}

fn category_command(session: &mut Session, action: CategoryAction, json: bool) -> Result<()> {
    let currency = settings::load_currency(session.context().store())?;
    let budget = session.ledger()?;
    match action {
        CategoryAction::List => {
            let categories = budget.list_categories()?;
            if json {
                render::json(&categories)?;
            } else {
                render::categories(&categories, currency);
            }
        }
        CategoryAction::Add {
            name,
            kind,
            limit,
            color,
            icon,
        } => {
            let created = budget.create_category(NewCategory {
                name,
                kind,
                monthly_limit: limit.as_deref().map(ledger::parse_amount).transpose()?,
                color,
                icon,
            })?;
            info!(id = created.id, "category created");
            if json {
                render::json(&created)?;
            } else {
                println!("created category {} ({})", created.id, created.name);
            }
        }
        CategoryAction::Update {
            id,
            name,
            kind,
            limit,
            color,
            icon,
        } => {
            let updated = budget.update_category(
                id,
                CategoryPatch {
                    name,
                    kind,
                    monthly_limit: limit.as_deref().map(ledger::parse_amount).transpose()?,
                    color,
                    icon,
                },
            )?;
            if json {
                render::json(&updated)?;
            } else {
                println!("updated category {} ({})", updated.id, updated.name);
            }
        }
        CategoryAction::Delete { id } => {
            budget.delete_category(id)?;
            println!("deleted category {id}");
        }
    }
    Ok(())
}

fn tx_command(session: &mut Session, action: TxAction, json: bool) -> Result<()> {
    let currency = settings::load_currency(session.context().store())?;
    let budget = session.ledger()?;
    match action {
        TxAction::List { month, limit } => {
            let mut transactions = budget.list_transactions()?;
            if let Some(month) = &month {
                ledger::validate_year_month(month)?;
                transactions.retain(|t| &t.year_month() == month);
            }
            if let Some(limit) = limit {
                transactions.truncate(limit);
            }
            if json {
                render::json(&transactions)?;
            } else {
                render::transactions(&transactions, &budget.list_categories()?, currency);
            }
        }
        TxAction::Add {
            category,
            amount,
            kind,
            date,
            note,
        } => {
            let created = budget.create_transaction(NewTransaction {
                category_id: category,
                amount: ledger::parse_amount(&amount)?,
                date: date.as_deref().map(parse_date).transpose()?,
                note,
                kind,
            })?;
            info!(id = created.id, "transaction created");
            if json {
                render::json(&created)?;
            } else {
                println!(
                    "created transaction {} ({} {})",
                    created.id,
                    created.kind,
                    format_amount(created.amount, currency)
                );
            }
        }
        TxAction::Update {
            id,
            category,
            amount,
            kind,
            date,
            note,
        } => {
            let updated = budget.update_transaction(
                id,
                TransactionPatch {
                    category_id: category,
                    amount: amount.as_deref().map(ledger::parse_amount).transpose()?,
                    date: date.as_deref().map(parse_date).transpose()?,
                    note,
                    kind,
                },
            )?;
            if json {
                render::json(&updated)?;
            } else {
                println!("updated transaction {}", updated.id);
            }
        }
        TxAction::Delete { id } => {
            budget.delete_transaction(id)?;
            println!("deleted transaction {id}");
        }
    }
    Ok(())
}

fn summary_command(
    session: &mut Session,
    month: Option<String>,
    year: Option<i32>,
    json: bool,
) -> Result<()> {
    let currency = settings::load_currency(session.context().store())?;
    let budget = session.ledger()?;
    if let Some(year) = year {
        let totals = insights::monthly_expense_totals(&budget.list_transactions()?, year);
        if json {
            render::json(&totals)?;
        } else {
            render::yearly(year, &totals, currency);
        }
        return Ok(());
    }
    let month = month.unwrap_or_else(current_month);
    let report = SummaryReport::build(&budget, month, currency)?;
    if json {
        render::json(&report)?;
    } else {
        render::summary(&report);
    }
    Ok(())
}

fn budget_command(session: &mut Session, action: BudgetAction, json: bool) -> Result<()> {
    let currency = settings::load_currency(session.context().store())?;
    let budget = session.ledger()?;
    let (month, amount) = match action {
        BudgetAction::Get { month } => {
            let month = month.unwrap_or_else(current_month);
            let amount = budget.monthly_budget(&month)?;
            (month, amount)
        }
        BudgetAction::Set { amount, month } => {
            let month = month.unwrap_or_else(current_month);
            let amount = budget.set_monthly_budget(&month, ledger::parse_amount(&amount)?)?;
            (month, amount)
        }
    };
    if json {
        render::json(&serde_json::json!({ "month": month, "budget": amount }))?;
    } else {
        println!("{month}: {}", format_amount(amount, currency));
    }
    Ok(())
}

fn currency_command(session: &mut Session, action: CurrencyAction, json: bool) -> Result<()> {
    let currency = match action {
        CurrencyAction::Get => settings::load_currency(session.context().store())?,
        CurrencyAction::Set { code } => {
            session.ensure_unlocked()?;
            settings::save_currency(session.context().store(), code)?;
            code
        }
    };
    if json {
        render::json(&serde_json::json!({
            "code": currency.code(),
            "symbol": currency.symbol(),
            "name": currency.name(),
        }))?;
    } else {
        println!("{} {} ({})", currency.code(), currency.symbol(), currency.name());
    }
    Ok(())
}

fn encrypt_command(session: &mut Session, action: EncryptAction) -> Result<()> {
    match action {
        EncryptAction::Enable => {
            if !session.context().has_pin()? {
                return Err(anyhow!("set a PIN before enabling encryption"));
            }
            session.ensure_unlocked()?;
            session.context().enable_encryption()?;
            println!("encryption at rest enabled");
        }
        EncryptAction::Disable => {
            session.ensure_unlocked()?;
            if settings::encrypt_at_rest(session.context().store())? {
                session.context().disable_encryption()?;
            }
            println!("encryption at rest disabled");
        }
    }
    Ok(())
}

fn export_command(session: &mut Session, output: Option<PathBuf>) -> Result<()> {
    session.ensure_unlocked()?;
    let pin = session.pin("PIN for export: ")?;
    let blob = session.context().export_ledger(&pin)?;
    match output {
        Some(path) => {
            std::fs::write(&path, &blob)
                .with_context(|| format!("writing export to {}", path.display()))?;
            eprintln!("export written to {}", path.display());
        }
        None => println!("{blob}"),
    }
    Ok(())
}

fn import_command(session: &mut Session, file: PathBuf, json: bool) -> Result<()> {
    let blob = std::fs::read_to_string(&file)
        .with_context(|| format!("reading export {}", file.display()))?;
    session.ensure_unlocked()?;
    let pin = session.pin("PIN for import: ")?;
    let snapshot = session.context().import_ledger(blob.trim(), &pin)?;
    if json {
        render::json(&snapshot)?;
    } else {
        println!(
            "imported {} categories and {} transactions",
            snapshot.categories.len(),
            snapshot.transactions.len()
        );
    }
    Ok(())
}

fn backup_command(action: BackupAction) -> Result<()> {
    match action {
        BackupAction::Upload { file, token } => {
            let blob = std::fs::read_to_string(&file)
                .with_context(|| format!("reading export {}", file.display()))?;
            backup::upload_to_drive_app_data(blob.trim(), &token)?;
        }
        BackupAction::Restore { token } => {
            println!("{}", backup::restore_from_drive_app_data(&token)?);
        }
    }
    Ok(())
}

fn reset_command(session: &mut Session, yes: bool) -> Result<()> {
    if !yes {
        return Err(anyhow!(
            "reset wipes the PIN and all encrypted data; pass --yes to confirm"
        ));
    }
    session.context_mut().reset()?;
    println!("local data wiped");
    Ok(())
}

fn current_month() -> String {
    let now = Utc::now();
    format!("{:04}-{:02}", now.year(), now.month())
}

fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("date must be YYYY-MM-DD, got {input:?}"))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid date {input:?}"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}
