use std::collections::HashMap;

use crate::types::{Installment, InstallmentBook, InstallmentStatus, MonetaryAmount, Sale, SaleId};

/// Narrows the installment listing. Every populated criterion must hold.
#[derive(Default, Clone, Debug)]
pub struct InstallmentFilter {
    /// Case-insensitive substring of the customer name.
    pub customer: Option<String>,
    pub status: Option<InstallmentStatus>,
    pub overdue_only: bool,
}

impl InstallmentFilter {
    fn matches(&self, installment: &Installment, customer: &str) -> bool {
        let customer_ok = match self.customer.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => customer.to_lowercase().contains(&needle.to_lowercase()),
        };
        let status_ok = self.status.map_or(true, |s| installment.status == s);
        let overdue_ok = !self.overdue_only || installment.status == InstallmentStatus::Overdue;

        customer_ok && status_ok && overdue_ok
    }
}

/// An installment joined with the sale it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct InstallmentView<'a> {
    pub installment: &'a Installment,
    pub sale: Option<&'a Sale>,
}

impl InstallmentView<'_> {
    pub fn customer(&self) -> &str {
        self.sale.map_or("", |s| s.customer.as_str())
    }
}

/// Installments matching `filter`, earliest due date first, then by customer name.
pub fn filter_installments<'a>(
    sales: &'a [Sale],
    book: &'a InstallmentBook,
    filter: &InstallmentFilter,
) -> Vec<InstallmentView<'a>> {
    let by_id: HashMap<SaleId, &Sale> = sales.iter().map(|s| (s.id, s)).collect();

    let mut views: Vec<InstallmentView> = book
        .iter()
        .map(|installment| InstallmentView {
            installment,
            sale: by_id.get(&installment.key.sale_id).copied(),
        })
        .filter(|view| filter.matches(view.installment, view.customer()))
        .collect();

    views.sort_by(|a, b| {
        a.installment
            .due_date
            .cmp(&b.installment.due_date)
            .then_with(|| a.customer().cmp(b.customer()))
            .then_with(|| a.installment.key.cmp(&b.installment.key))
    });
    views
}

/// Sales ordered by creation time, newest first.
pub fn sales_newest_first(sales: &[Sale]) -> Vec<&Sale> {
    let mut sorted: Vec<&Sale> = sales.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    sorted
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Summary {
    /// Down payments plus every scheduled installment of every sale.
    pub total_sold: MonetaryAmount,
    pub total_received: MonetaryAmount,
    pub total_pending: MonetaryAmount,
    pub total_fees: MonetaryAmount,
}

pub fn summarize(sales: &[Sale], book: &InstallmentBook) -> Summary {
    Summary {
        total_sold: sales.iter().map(Sale::total_price).sum(),
        total_received: book
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .map(|i| i.amount)
            .sum(),
        total_pending: book
            .iter()
            .filter(|i| i.status != InstallmentStatus::Paid)
            .map(|i| i.amount)
            .sum(),
        total_fees: book.iter().map(|i| i.fee).sum(),
    }
}
