//! Interactive loop standing in for the host UI: each line is either a
//! lifecycle signal, fed to the lock controller, or a command. Ledger reads
//! never prompt; a locked session has to `unlock` first.

use anyhow::{anyhow, Result};
use budget_core::settings;
use budget_core::LifecycleSignal;
use std::io::{BufRead, IsTerminal, Write};
use zeroize::Zeroizing;

use crate::render::{self, SummaryReport};
use crate::session::Session;
use crate::StatusReport;

const HELP: &str = "\
signals:  hide | show | blur | focus | pagehide | pageshow
commands: status | unlock [PIN] | lock | categories | transactions | summary [YYYY-MM] | help | quit";

pub fn run(session: &mut Session, input: impl BufRead) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    println!("state: {}", session.context().lock_state());
    let mut lines = input.lines();
    loop {
        if interactive {
            print!("budget> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else { break };
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else { continue };
        if matches!(command, "quit" | "exit") {
            break;
        }
        if let Err(e) = step(session, command, words.next()) {
            println!("error: {e}");
        }
    }
    Ok(())
}

fn step(session: &mut Session, command: &str, arg: Option<&str>) -> Result<()> {
    match command {
        "help" => println!("{HELP}"),
        "status" => {
            println!("{}", StatusReport::collect(session.context())?.line());
        }
        "unlock" => {
            let pin = match arg {
                Some(pin) => Zeroizing::new(pin.to_string()),
                None => session.pin("PIN: ")?,
            };
            session.unlock_with(&pin)?;
            println!("state: {}", session.context().lock_state());
        }
        "lock" => {
            session.lock();
            println!("state: {}", session.context().lock_state());
        }
        "categories" | "transactions" | "summary" => read_ledger(session, command, arg)?,
        other => {
            let signal: LifecycleSignal = other
                .parse()
                .map_err(|e: String| anyhow!("{e} (try `help`)"))?;
            println!("state: {}", session.signal(signal));
        }
    }
    Ok(())
}

fn read_ledger(session: &Session, command: &str, arg: Option<&str>) -> Result<()> {
    let ctx = session.context();
    if ctx.is_locked() {
        return Err(anyhow!("locked; run `unlock` first"));
    }
    let currency = settings::load_currency(ctx.store())?;
    let budget = ctx.ledger()?;
    match command {
        "categories" => render::categories(&budget.list_categories()?, currency),
        "transactions" => render::transactions(
            &budget.list_transactions()?,
            &budget.list_categories()?,
            currency,
        ),
        _ => {
            let month = arg
                .map(str::to_string)
                .unwrap_or_else(crate::current_month);
            render::summary(&SummaryReport::build(&budget, month, currency)?);
        }
    }
    Ok(())
}
