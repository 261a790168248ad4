mod config;
mod error;
mod installments;
mod io;
mod report;
mod store;
mod types;
mod utils;

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

pub use config::{parse_amount, Config};
pub use error::{Result, TrackerError};
pub use installments::{generate_installments, mark_paid, recalculate, FeePolicy};
pub use report::{
    filter_installments, sales_newest_first, summarize, InstallmentFilter, InstallmentView,
    Summary,
};
pub use store::Store;
pub use types::{
    Installment, InstallmentBook, InstallmentKey, InstallmentStatus, MonetaryAmount, NewSale,
    Sale, SaleId,
};

/// Both collections, with derived installment fields current as of the refresh date.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub sales: Vec<Sale>,
    pub installments: InstallmentBook,
}

impl Snapshot {
    // Installment keys count too: a recreated sales file must not hand out an id that
    // still owns rows in the installments file.
    fn next_sale_id(&self) -> Result<SaleId> {
        let highest = self
            .sales
            .iter()
            .map(|s| s.id)
            .chain(self.installments.iter().map(|i| i.key.sale_id))
            .max();
        match highest {
            None => Ok(SaleId::new(1)),
            Some(id) => id.next().ok_or_else(|| {
                TrackerError::CorruptRecord(format!("no sale id left after {}", id))
            }),
        }
    }

    // Logs sales whose stored schedule does not have exactly indices 1..N, and
    // installments whose sale is missing.
    fn check_schedules(&self) {
        for sale in &self.sales {
            let indices: Vec<u32> = self
                .installments
                .for_sale(sale.id)
                .map(|i| i.key.index)
                .collect();
            let complete = indices.len() == sale.num_installments as usize
                && indices.iter().zip(1..).all(|(index, expected)| *index == expected);
            if !complete {
                warn!(
                    sale = %sale.id,
                    expected = sale.num_installments,
                    found = indices.len(),
                    "sale has an incomplete installment schedule"
                );
            }
        }

        let known: HashSet<SaleId> = self.sales.iter().map(|s| s.id).collect();
        let orphans: BTreeSet<SaleId> = self
            .installments
            .iter()
            .map(|i| i.key.sale_id)
            .filter(|id| !known.contains(id))
            .collect();
        for sale_id in orphans {
            warn!(sale = %sale_id, "installments reference a sale that does not exist");
        }
    }
}

/// Operations over the store. Every call reloads both files, applies its change,
/// recalculates overdue fields and rewrites the files before returning.
#[derive(Clone, Debug)]
pub struct Tracker {
    store: Store,
    fees: FeePolicy,
}

impl Tracker {
    pub fn new(store: Store, fees: FeePolicy) -> Self {
        Self { store, fees }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Store::new(&config.data_dir), config.fees)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Loads both collections and brings overdue days, fees and statuses up to `today`.
    pub fn refresh(&self, today: NaiveDate) -> Result<Snapshot> {
        let sales = self.store.load_sales()?;
        let installments = recalculate(&self.store.load_installments()?, today, &self.fees);
        self.store.save_installments(&installments)?;

        let snapshot = Snapshot {
            sales,
            installments,
        };
        snapshot.check_schedules();
        Ok(snapshot)
    }

    /// Stores a new sale together with its generated schedule.
    pub fn record_sale(
        &self,
        new_sale: NewSale,
        today: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Result<(Sale, Vec<Installment>)> {
        new_sale.validate()?;
        let snapshot = self.refresh(today)?;

        let sale = new_sale.into_sale(snapshot.next_sale_id()?, created_at);
        let schedule = generate_installments(&sale)?;
        if let Some(taken) = schedule
            .iter()
            .find(|i| snapshot.installments.get(&i.key).is_some())
        {
            return Err(TrackerError::CorruptRecord(format!(
                "installment {} already exists",
                taken.key
            )));
        }
        let installments = recalculate(
            &snapshot.installments.extend(schedule),
            today,
            &self.fees,
        );

        let mut sales = snapshot.sales;
        sales.push(sale.clone());
        self.store.save_sales(&sales)?;
        self.store.save_installments(&installments)?;

        info!(
            sale = %sale.id,
            customer = %sale.customer,
            installments = sale.num_installments,
            "recorded sale"
        );
        let schedule = installments.for_sale(sale.id).cloned().collect();
        Ok((sale, schedule))
    }

    /// Settles one installment with `today` as its payment date.
    pub fn mark_paid(&self, key: InstallmentKey, today: NaiveDate) -> Result<Installment> {
        let snapshot = self.refresh(today)?;
        let installments = recalculate(
            &mark_paid(&snapshot.installments, key, today)?,
            today,
            &self.fees,
        );
        self.store.save_installments(&installments)?;

        info!(installment = %key, %today, "installment marked as paid");
        installments
            .get(&key)
            .cloned()
            .ok_or(TrackerError::NotFound(key))
    }
}
