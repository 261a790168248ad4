use std::{path::PathBuf, process};

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use installment_tracker::{
    filter_installments, parse_amount, sales_newest_first, summarize, Config, FeePolicy,
    Installment, InstallmentFilter, InstallmentKey, InstallmentStatus, MonetaryAmount, NewSale,
    Result, SaleId, Tracker,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "installments", version, about = "Track installment sales, due dates and late fees")]
struct Cli {
    /// Directory holding sales.csv and installments.csv
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Fixed late fee charged per overdue day
    #[arg(long, global = true, value_parser = parse_amount)]
    daily_fee: Option<MonetaryAmount>,

    /// Reference date for overdue calculations (defaults to today)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a sale and generate its monthly installments
    AddSale {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        brand: String,
        #[arg(long, value_parser = parse_amount, default_value = "0")]
        down_payment: MonetaryAmount,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        installments: u32,
        #[arg(long, value_parser = parse_amount)]
        amount: MonetaryAmount,
        /// Sale date (defaults to the reference date)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List recorded sales, newest first
    Sales,
    /// List installments
    List {
        /// Case-insensitive part of the customer name
        #[arg(long)]
        customer: Option<String>,
        /// Pending, Overdue or Paid
        #[arg(long)]
        status: Option<InstallmentStatus>,
        /// Only overdue installments
        #[arg(long)]
        overdue: bool,
    },
    /// Mark one installment as paid
    Pay {
        #[arg(long)]
        sale: u64,
        #[arg(long)]
        installment: u32,
    },
    /// Totals sold, received, pending and accrued fees
    Summary,
    /// Recalculate overdue days and fees and rewrite the store
    Refresh,
}

fn print_installments<'a>(rows: impl IntoIterator<Item = (&'a str, &'a Installment)>) {
    println!(
        "{:>14} {:>4} {:<24} {:>10} {:<10} {:<8} {:>5} {:>9} {:<10}",
        "sale", "#", "customer", "due", "amount", "status", "days", "fee", "paid on"
    );
    for (customer, i) in rows {
        println!(
            "{:>14} {:>4} {:<24} {:>10} {:<10} {:<8} {:>5} {:>9} {:<10}",
            i.key.sale_id,
            i.key.index,
            customer,
            i.due_date.to_string(),
            i.amount,
            i.status,
            i.days_overdue,
            i.fee,
            i.payment_date.map(|d| d.to_string()).unwrap_or_default()
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(fee) = cli.daily_fee {
        config.fees = FeePolicy::new(fee);
    }
    config.validate()?;

    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let tracker = Tracker::from_config(&config);
    tracing::debug!(data_dir = %config.data_dir.display(), daily_fee = %config.fees.daily_fee, %today, "starting");

    match cli.command {
        Command::AddSale {
            customer,
            model,
            brand,
            down_payment,
            installments,
            amount,
            date,
        } => {
            let new_sale = NewSale {
                customer,
                device_model: model,
                device_brand: brand,
                down_payment,
                num_installments: installments,
                installment_amount: amount,
                sale_date: date.unwrap_or(today),
            };
            let (sale, schedule) = tracker.record_sale(new_sale, today, Utc::now())?;
            println!("Recorded sale {} for {}", sale.id, sale.customer);
            print_installments(schedule.iter().map(|i| (sale.customer.as_str(), i)));
        }
        Command::Sales => {
            let snapshot = tracker.refresh(today)?;
            println!(
                "{:>14} {:<24} {:<16} {:<12} {:>10} {:>3} {:>10} {:<10}",
                "sale", "customer", "model", "brand", "down", "n", "each", "date"
            );
            for sale in sales_newest_first(&snapshot.sales) {
                println!(
                    "{:>14} {:<24} {:<16} {:<12} {:>10} {:>3} {:>10} {:<10}",
                    sale.id,
                    sale.customer,
                    sale.device_model,
                    sale.device_brand,
                    sale.down_payment,
                    sale.num_installments,
                    sale.installment_amount,
                    sale.sale_date.to_string()
                );
            }
        }
        Command::List {
            customer,
            status,
            overdue,
        } => {
            let snapshot = tracker.refresh(today)?;
            let filter = InstallmentFilter {
                customer,
                status,
                overdue_only: overdue,
            };
            let views = filter_installments(&snapshot.sales, &snapshot.installments, &filter);
            if views.is_empty() {
                println!("No installments match the selected filters.");
            } else {
                print_installments(views.iter().map(|v| (v.customer(), v.installment)));
            }
        }
        Command::Pay { sale, installment } => {
            let key = InstallmentKey::new(SaleId::new(sale), installment);
            let paid = tracker.mark_paid(key, today)?;
            println!(
                "Installment {} marked as paid on {}",
                paid.key,
                paid.payment_date.unwrap_or(today)
            );
        }
        Command::Summary => {
            let snapshot = tracker.refresh(today)?;
            let summary = summarize(&snapshot.sales, &snapshot.installments);
            println!("Total sold (estimated): {}", summary.total_sold);
            println!("Total received:         {}", summary.total_received);
            println!("Total pending:          {}", summary.total_pending);
            println!("Total fees (accrued):   {}", summary.total_fees);
        }
        Command::Refresh => {
            let snapshot = tracker.refresh(today)?;
            println!(
                "Recalculated {} installments as of {}",
                snapshot.installments.len(),
                today
            );
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "installment_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("an error occurred: {}", e);
            process::exit(1);
        }
    }
}
