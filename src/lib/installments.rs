use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Result, TrackerError};
use crate::types::{
    Installment, InstallmentBook, InstallmentKey, InstallmentStatus, MonetaryAmount, Sale,
};
use crate::utils::{add_months, days_past, MapValues};

/// Flat late fee charged for every day an installment stays unpaid past its due date.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FeePolicy {
    pub daily_fee: MonetaryAmount,
}

impl FeePolicy {
    pub fn new(daily_fee: MonetaryAmount) -> Self {
        Self { daily_fee }
    }

    pub fn fee_for(&self, days_overdue: u32) -> MonetaryAmount {
        (self.daily_fee * days_overdue).rounded()
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::new(MonetaryAmount::new(Decimal::new(390, 2)))
    }
}

/// Builds the payment schedule of a sale: one installment per month after the sale date.
pub fn generate_installments(sale: &Sale) -> Result<Vec<Installment>> {
    (1..=sale.num_installments)
        .map(|index| -> Result<Installment> {
            Ok(Installment {
                key: InstallmentKey::new(sale.id, index),
                amount: sale.installment_amount.rounded(),
                due_date: add_months(sale.sale_date, index)?,
                status: InstallmentStatus::Pending,
                days_overdue: 0,
                fee: MonetaryAmount::ZERO,
                payment_date: None,
            })
        })
        .collect()
}

fn recalculate_installment(
    installment: &Installment,
    today: NaiveDate,
    policy: &FeePolicy,
) -> Installment {
    if installment.is_paid() {
        return installment
            .update_overdue(0, MonetaryAmount::ZERO)
            .update_status(InstallmentStatus::Paid);
    }

    let days = days_past(installment.due_date, today);
    let status = if days > 0 {
        InstallmentStatus::Overdue
    } else {
        InstallmentStatus::Pending
    };
    installment
        .update_overdue(days, policy.fee_for(days))
        .update_status(status)
}

/// Recomputes days overdue, accrued fee and status of every unpaid installment as of `today`.
pub fn recalculate(book: &InstallmentBook, today: NaiveDate, policy: &FeePolicy) -> InstallmentBook {
    let result = InstallmentBook(
        book.0
            .map_values(|installment| recalculate_installment(installment, today, policy)),
    );
    debug!(
        installments = result.len(),
        overdue = result
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .count(),
        %today,
        "recalculated installments"
    );
    result
}

/// Settles one installment on `today`. Unknown keys and already settled installments are errors.
pub fn mark_paid(
    book: &InstallmentBook,
    key: InstallmentKey,
    today: NaiveDate,
) -> Result<InstallmentBook> {
    let installment = book.get(&key).ok_or(TrackerError::NotFound(key))?;

    if let Some(paid_on) = installment.payment_date {
        return Err(TrackerError::AlreadyPaid(key, paid_on));
    }
    if installment.status == InstallmentStatus::Paid {
        return Err(TrackerError::CorruptRecord(format!(
            "installment {} is Paid without a payment date",
            key
        )));
    }

    let paid = installment
        .update_status(InstallmentStatus::Paid)
        .update_payment_date(Some(today))
        .update_overdue(0, MonetaryAmount::ZERO);

    Ok(book.update(paid))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::error::TrackerError;
    use crate::types::{
        Installment, InstallmentBook, InstallmentKey, InstallmentStatus, MonetaryAmount, Sale,
        SaleId,
    };

    use super::{generate_installments, mark_paid, recalculate, FeePolicy};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(id: u64, sale_date: NaiveDate, count: u32, amount: MonetaryAmount) -> Sale {
        Sale {
            id: SaleId::new(id),
            customer: String::from("Maria Souza"),
            device_model: String::from("Galaxy A15"),
            device_brand: String::from("Samsung"),
            down_payment: MonetaryAmount::new(dec!(200.00)),
            num_installments: count,
            installment_amount: amount,
            sale_date,
            created_at: Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap(),
        }
    }

    fn pending(sale_id: u64, index: u32, due_date: NaiveDate) -> Installment {
        Installment {
            key: InstallmentKey::new(SaleId::new(sale_id), index),
            amount: MonetaryAmount::new(dec!(150.00)),
            due_date,
            status: InstallmentStatus::Pending,
            days_overdue: 0,
            fee: MonetaryAmount::ZERO,
            payment_date: None,
        }
    }

    fn fee_3_90() -> FeePolicy {
        FeePolicy::new(MonetaryAmount::new(dec!(3.90)))
    }

    #[test]
    fn schedule_clamps_to_month_end() {
        let sale = sale(1, date(2024, 1, 31), 3, MonetaryAmount::new(dec!(100)));
        let due_dates: Vec<NaiveDate> = generate_installments(&sale)
            .unwrap()
            .into_iter()
            .map(|i| i.due_date)
            .collect();

        assert_eq!(
            due_dates,
            vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn schedule_has_one_pending_installment_per_index() {
        let sale = sale(7, date(2024, 5, 15), 12, MonetaryAmount::new(dec!(99.999)));
        let installments = generate_installments(&sale).unwrap();

        assert_eq!(installments.len(), 12);
        for (pos, installment) in installments.iter().enumerate() {
            assert_eq!(installment.key, InstallmentKey::new(SaleId::new(7), pos as u32 + 1));
            assert_eq!(installment.status, InstallmentStatus::Pending);
            assert_eq!(installment.days_overdue, 0);
            assert_eq!(installment.fee, MonetaryAmount::ZERO);
            assert_eq!(installment.payment_date, None);
            assert_eq!(installment.amount, MonetaryAmount::new(dec!(100.00)));
        }
        assert!(installments
            .windows(2)
            .all(|pair| pair[0].due_date < pair[1].due_date));
        assert_eq!(installments[11].due_date, date(2025, 5, 15));
    }

    #[test]
    fn unpaid_installment_accrues_daily_fee() {
        let today = date(2024, 3, 20);
        let book: InstallmentBook = vec![pending(1, 1, date(2024, 3, 10))].into_iter().collect();

        let result = recalculate(&book, today, &fee_3_90());
        let installment = result.iter().next().unwrap();

        assert_eq!(installment.days_overdue, 10);
        assert_eq!(installment.fee, MonetaryAmount::new(dec!(39.00)));
        assert_eq!(installment.status, InstallmentStatus::Overdue);
    }

    #[test]
    fn installment_due_today_or_later_stays_pending() {
        let today = date(2024, 3, 10);
        let book: InstallmentBook = vec![
            pending(1, 1, date(2024, 3, 10)),
            pending(1, 2, date(2024, 4, 10)),
        ]
        .into_iter()
        .collect();

        let result = recalculate(&book, today, &fee_3_90());

        assert!(result.iter().all(|i| i.status == InstallmentStatus::Pending
            && i.days_overdue == 0
            && i.fee == MonetaryAmount::ZERO));
    }

    #[test]
    fn overdue_installment_returns_to_pending_when_reference_moves_back() {
        let book: InstallmentBook = vec![pending(1, 1, date(2024, 3, 10))].into_iter().collect();
        let overdue = recalculate(&book, date(2024, 3, 15), &fee_3_90());

        let result = recalculate(&overdue, date(2024, 3, 1), &fee_3_90());
        let installment = result.iter().next().unwrap();

        assert_eq!(installment.status, InstallmentStatus::Pending);
        assert_eq!(installment.days_overdue, 0);
    }

    #[test]
    fn recalculation_is_idempotent() {
        let today = date(2024, 6, 1);
        let book: InstallmentBook = vec![
            pending(1, 1, date(2024, 3, 10)),
            pending(1, 2, date(2024, 4, 10)),
            pending(1, 3, date(2024, 7, 10)),
        ]
        .into_iter()
        .collect();
        let book = mark_paid(&book, InstallmentKey::new(SaleId::new(1), 1), date(2024, 3, 9)).unwrap();

        let once = recalculate(&book, today, &fee_3_90());
        let twice = recalculate(&once, today, &fee_3_90());

        assert_eq!(once, twice);
    }

    #[test]
    fn recalculation_never_touches_paid_rows() {
        let key = InstallmentKey::new(SaleId::new(1), 1);
        let paid = Installment {
            status: InstallmentStatus::Paid,
            payment_date: Some(date(2024, 4, 2)),
            days_overdue: 23,
            fee: MonetaryAmount::new(dec!(89.70)),
            ..pending(1, 1, date(2024, 3, 10))
        };
        let book: InstallmentBook = vec![paid.clone()].into_iter().collect();

        let result = recalculate(&book, date(2024, 12, 25), &fee_3_90());
        let installment = result.get(&key).unwrap();

        assert_eq!(installment.status, InstallmentStatus::Paid);
        assert_eq!(installment.payment_date, paid.payment_date);
        assert_eq!(installment.amount, paid.amount);
        assert_eq!(installment.days_overdue, 0);
        assert_eq!(installment.fee, MonetaryAmount::ZERO);
    }

    #[test]
    fn payment_date_alone_counts_as_paid() {
        let key = InstallmentKey::new(SaleId::new(1), 1);
        let installment = pending(1, 1, date(2024, 3, 10)).update_payment_date(Some(date(2024, 3, 12)));
        let book: InstallmentBook = vec![installment].into_iter().collect();

        let result = recalculate(&book, date(2024, 5, 1), &fee_3_90());

        assert_eq!(result.get(&key).unwrap().status, InstallmentStatus::Paid);
        assert_eq!(result.get(&key).unwrap().fee, MonetaryAmount::ZERO);
    }

    #[test]
    fn fee_is_rounded_to_cents() {
        let policy = FeePolicy::new(MonetaryAmount::new(dec!(0.333)));
        assert_eq!(policy.fee_for(3), MonetaryAmount::new(dec!(1.00)));
        assert_eq!(policy.fee_for(0), MonetaryAmount::ZERO);
    }

    #[test]
    fn huge_fee_saturates_instead_of_panicking() {
        let policy = FeePolicy::new(MonetaryAmount::new(Decimal::MAX));
        assert_eq!(policy.fee_for(u32::MAX), MonetaryAmount::new(Decimal::MAX));

        let key = InstallmentKey::new(SaleId::new(1), 1);
        let book: InstallmentBook = vec![pending(1, 1, date(1900, 1, 1))].into_iter().collect();
        let result = recalculate(&book, date(2024, 1, 1), &policy);
        assert_eq!(result.get(&key).unwrap().fee, MonetaryAmount::new(Decimal::MAX));
    }

    #[test]
    fn mark_paid_only_settles_the_selected_installment() {
        let today = date(2024, 5, 20);
        let sale = sale(42, date(2024, 1, 15), 3, MonetaryAmount::new(dec!(150)));
        let book = recalculate(
            &InstallmentBook::default().extend(generate_installments(&sale).unwrap()),
            today,
            &fee_3_90(),
        );
        let key = InstallmentKey::new(SaleId::new(42), 2);

        let result = mark_paid(&book, key, today).unwrap();
        let paid = result.get(&key).unwrap();

        assert_eq!(paid.status, InstallmentStatus::Paid);
        assert_eq!(paid.payment_date, Some(today));
        assert_eq!(paid.days_overdue, 0);
        assert_eq!(paid.fee, MonetaryAmount::ZERO);
        for index in [1, 3] {
            let other = InstallmentKey::new(SaleId::new(42), index);
            assert_eq!(result.get(&other), book.get(&other));
        }
    }

    #[test]
    fn mark_paid_reports_unknown_installment() {
        let book: InstallmentBook = vec![pending(1, 1, date(2024, 3, 10))].into_iter().collect();
        let key = InstallmentKey::new(SaleId::new(1), 2);

        let result = mark_paid(&book, key, date(2024, 3, 1));

        assert!(matches!(result, Err(TrackerError::NotFound(k)) if k == key));
    }

    #[test]
    fn mark_paid_twice_keeps_first_payment_date() {
        let key = InstallmentKey::new(SaleId::new(1), 1);
        let book: InstallmentBook = vec![pending(1, 1, date(2024, 3, 10))].into_iter().collect();
        let book = mark_paid(&book, key, date(2024, 3, 5)).unwrap();

        let result = mark_paid(&book, key, date(2024, 3, 6));

        assert!(matches!(result, Err(TrackerError::AlreadyPaid(_, d)) if d == date(2024, 3, 5)));
        assert_eq!(book.get(&key).unwrap().payment_date, Some(date(2024, 3, 5)));
    }
}
