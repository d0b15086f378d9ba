//! Ledger commands: create, update, debit, show, list.

use super::{CliError, CliResult, Context, OutputFormat};
use tollpass_store::{PassFilter, SubscriptionPass, VehicleClass};
use tollpass_sync::{Committed, PassRequest, PassUpdate};

/// Runs the create command.
pub fn create(
    ctx: &Context,
    plate: String,
    holder: String,
    class: VehicleClass,
    balance: i64,
    cost: Option<i64>,
) -> CliResult<()> {
    let mut request = PassRequest::new(plate, holder, class, balance);
    if let Some(cost) = cost {
        request = request.with_cost_per_passage(cost);
    }

    let committed = ctx.ledger.create_pass(request)?;
    println!("created {}", describe(&committed.value));
    report_sync(&committed);
    Ok(())
}

/// Runs the update command.
pub fn update(
    ctx: &Context,
    plate: &str,
    new_plate: Option<String>,
    holder: Option<String>,
    class: Option<VehicleClass>,
    cost: Option<i64>,
) -> CliResult<()> {
    let update = PassUpdate {
        plate: new_plate,
        holder_name: holder,
        vehicle_class: class,
        cost_per_passage: cost,
    };
    if update.is_empty() {
        return Err(CliError::EmptyUpdate.into());
    }

    let committed = ctx.ledger.update_pass(plate, update)?;
    println!("updated {}", describe(&committed.value));
    report_sync(&committed);
    Ok(())
}

/// Runs the debit command.
pub fn debit(ctx: &Context, plate: &str, amount: Option<i64>) -> CliResult<()> {
    let committed = ctx.ledger.debit(plate, amount)?;
    let receipt = &committed.value;
    println!(
        "{}: debited {}, balance {}",
        receipt.pass.plate,
        receipt.amount,
        receipt.balance()
    );
    report_sync(&committed);
    Ok(())
}

/// Runs the show command.
pub fn show(ctx: &Context, plate: &str, format: OutputFormat) -> CliResult<()> {
    let pass = ctx.ledger.get(plate)?;
    print!("{}", render(std::slice::from_ref(&pass), format)?);
    Ok(())
}

/// Runs the list command.
pub fn list(ctx: &Context, pending: bool, format: OutputFormat) -> CliResult<()> {
    let filter = if pending {
        PassFilter::all().pending_push(true)
    } else {
        PassFilter::all()
    };
    let passes = ctx.ledger.list(&filter)?;
    print!("{}", render(&passes, format)?);
    Ok(())
}

fn report_sync<T>(committed: &Committed<T>) {
    if let Some(error) = &committed.sync_failure {
        eprintln!("warning: saved locally, remote sync failed: {error}");
    }
}

fn describe(pass: &SubscriptionPass) -> String {
    let link = match pass.remote_ref {
        Some(remote_ref) => format!("remote #{remote_ref}"),
        None => "unlinked".to_string(),
    };
    let pending = if pass.pending_push { ", pending push" } else { "" };
    format!(
        "{} ({}, {}) balance {} cost {} [{}, {}{}]",
        pass.plate,
        pass.holder_name,
        pass.vehicle_class,
        pass.balance,
        pass.cost_per_passage,
        pass.origin,
        link,
        pending
    )
}

fn render(passes: &[SubscriptionPass], format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(passes)?)),
        OutputFormat::Text => {
            if passes.is_empty() {
                return Ok("no passes\n".to_string());
            }
            let mut out = String::new();
            for pass in passes {
                out.push_str(&describe(pass));
                out.push('\n');
            }
            Ok(out)
        }
    }
}
