use std::{
    fmt,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use im::OrdMap;
use rust_decimal::Decimal;

use crate::error::{Result, TrackerError};

#[derive(Default, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Debug)]
pub struct SaleId(u64);

impl SaleId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

/// Currency amount. Stored and displayed with two decimal places.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MonetaryAmount(Decimal);

impl MonetaryAmount {
    pub const ZERO: MonetaryAmount = MonetaryAmount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn rounded(&self) -> Self {
        Self(self.0.round_dp(2))
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

// Arithmetic saturates at the bounds of `Decimal` instead of panicking.
impl Add for MonetaryAmount {
    type Output = MonetaryAmount;

    fn add(self, rhs: Self) -> Self::Output {
        MonetaryAmount(self.value().saturating_add(rhs.value()))
    }
}

impl Mul<u32> for MonetaryAmount {
    type Output = MonetaryAmount;

    fn mul(self, rhs: u32) -> Self::Output {
        MonetaryAmount(self.value().saturating_mul(Decimal::from(rhs)))
    }
}

impl Sum for MonetaryAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MonetaryAmount::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for MonetaryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:.2}", self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum InstallmentStatus {
    Pending,
    Overdue,
    Paid,
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallmentStatus::Pending => "Pending",
            InstallmentStatus::Overdue => "Overdue",
            InstallmentStatus::Paid => "Paid",
        };
        f.pad(label)
    }
}

impl FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendente" => Ok(InstallmentStatus::Pending),
            "overdue" | "atrasada" => Ok(InstallmentStatus::Overdue),
            "paid" | "pago" => Ok(InstallmentStatus::Paid),
            other => Err(format!("unknown installment status '{}'", other)),
        }
    }
}

/// Identifies one installment: the owning sale and its 1-based position in the schedule.
#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Debug)]
pub struct InstallmentKey {
    pub sale_id: SaleId,
    pub index: u32,
}

impl InstallmentKey {
    pub fn new(sale_id: SaleId, index: u32) -> Self {
        Self { sale_id, index }
    }
}

impl fmt::Display for InstallmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sale_id, self.index)
    }
}

/// Form input for a sale before an identifier and creation time are assigned.
#[derive(Clone, Debug)]
pub struct NewSale {
    pub customer: String,
    pub device_model: String,
    pub device_brand: String,
    pub down_payment: MonetaryAmount,
    pub num_installments: u32,
    pub installment_amount: MonetaryAmount,
    pub sale_date: NaiveDate,
}

impl NewSale {
    pub fn validate(&self) -> Result<()> {
        if self.num_installments == 0 {
            return Err(TrackerError::validation(
                "installment count must be at least 1",
            ));
        }
        if self.down_payment.is_negative() {
            return Err(TrackerError::validation(format!(
                "down payment cannot be negative (got {})",
                self.down_payment
            )));
        }
        if self.installment_amount.is_negative() {
            return Err(TrackerError::validation(format!(
                "installment amount cannot be negative (got {})",
                self.installment_amount
            )));
        }
        Ok(())
    }

    pub fn into_sale(self, id: SaleId, created_at: DateTime<Utc>) -> Sale {
        Sale {
            id,
            customer: self.customer,
            device_model: self.device_model,
            device_brand: self.device_brand,
            down_payment: self.down_payment.rounded(),
            num_installments: self.num_installments,
            installment_amount: self.installment_amount.rounded(),
            sale_date: self.sale_date,
            created_at,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Sale {
    pub id: SaleId,
    pub customer: String,
    pub device_model: String,
    pub device_brand: String,
    pub down_payment: MonetaryAmount,
    pub num_installments: u32,
    pub installment_amount: MonetaryAmount,
    pub sale_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Down payment plus every scheduled installment.
    pub fn total_price(&self) -> MonetaryAmount {
        self.down_payment + self.installment_amount * self.num_installments
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Installment {
    pub key: InstallmentKey,
    pub amount: MonetaryAmount,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub days_overdue: u32,
    pub fee: MonetaryAmount,
    pub payment_date: Option<NaiveDate>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid || self.payment_date.is_some()
    }

    pub fn update_status(&self, status: InstallmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn update_overdue(&self, days_overdue: u32, fee: MonetaryAmount) -> Self {
        Self {
            days_overdue,
            fee,
            ..self.clone()
        }
    }

    pub fn update_payment_date(&self, payment_date: Option<NaiveDate>) -> Self {
        Self {
            payment_date,
            ..self.clone()
        }
    }
}

/// Every installment in the store, ordered by sale and then by position.
#[derive(Default, Clone, PartialEq, Eq, Debug)]
pub struct InstallmentBook(pub OrdMap<InstallmentKey, Installment>);

impl InstallmentBook {
    pub fn get(&self, key: &InstallmentKey) -> Option<&Installment> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Installment> {
        self.0.values()
    }

    pub fn for_sale(&self, sale_id: SaleId) -> impl Iterator<Item = &Installment> {
        self.0
            .range(InstallmentKey::new(sale_id, 0)..=InstallmentKey::new(sale_id, u32::MAX))
            .map(|(_, v)| v)
    }

    pub fn update(&self, installment: Installment) -> Self {
        Self(self.0.update(installment.key, installment))
    }

    pub fn extend(&self, installments: Vec<Installment>) -> Self {
        installments
            .into_iter()
            .fold(self.clone(), |book, installment| book.update(installment))
    }
}

impl FromIterator<Installment> for InstallmentBook {
    fn from_iter<T: IntoIterator<Item = Installment>>(iter: T) -> Self {
        Self(iter.into_iter().map(|i| (i.key, i)).collect())
    }
}
