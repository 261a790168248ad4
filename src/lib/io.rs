use std::io::{Read, Write};

use ::serde::{Deserialize, Deserializer, Serialize, Serializer};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{Result, TrackerError};
use crate::types::{
    Installment, InstallmentBook, InstallmentKey, InstallmentStatus, MonetaryAmount, Sale, SaleId,
};

pub const SALE_HEADERS: [&str; 9] = [
    "sale_id",
    "customer",
    "device_model",
    "device_brand",
    "down_payment",
    "num_installments",
    "installment_amount",
    "sale_date",
    "created_at",
];

pub const INSTALLMENT_HEADERS: [&str; 8] = [
    "sale_id",
    "installment_num",
    "amount",
    "due_date",
    "status",
    "days_overdue",
    "fee",
    "payment_date",
];

fn fixed_width<S: Serializer>(x: &Decimal, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:.2}", x))
}

fn iso_date<S: Serializer>(d: &NaiveDate, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&d.format("%Y-%m-%d").to_string())
}

fn opt_iso_date<S: Serializer>(d: &Option<NaiveDate>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match d {
        Some(d) => iso_date(d, s),
        None => s.serialize_str(""),
    }
}

// Reads the cell text directly. Letting the csv deserializer infer the type goes through
// f64 and drops digits on large amounts.
fn exact_decimal<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Decimal, D::Error> {
    rust_decimal::serde::str::deserialize(d)
}

// Accepts a bare date as well as the date part of a timestamp ("2024-02-29 00:00:00").
fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    parse_date(&raw).map_err(::serde::de::Error::custom)
}

fn lenient_opt_date<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<NaiveDate>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("NaT") => Ok(None),
        Some(s) => parse_date(s).map(Some).map_err(::serde::de::Error::custom),
    }
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ts.and_utc());
    }
    parse_date(raw)
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        .map_err(::serde::de::Error::custom)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaleRowEntity {
    sale_id: u64,
    #[serde(alias = "cliente")]
    customer: String,
    #[serde(alias = "aparelho_modelo")]
    device_model: String,
    #[serde(alias = "aparelho_marca")]
    device_brand: String,
    #[serde(
        alias = "valor_entrada",
        serialize_with = "fixed_width",
        deserialize_with = "exact_decimal"
    )]
    down_payment: Decimal,
    #[serde(alias = "num_parcelas")]
    num_installments: u32,
    #[serde(
        alias = "valor_parcela",
        serialize_with = "fixed_width",
        deserialize_with = "exact_decimal"
    )]
    installment_amount: Decimal,
    #[serde(
        alias = "data_venda",
        serialize_with = "iso_date",
        deserialize_with = "lenient_date"
    )]
    sale_date: NaiveDate,
    #[serde(deserialize_with = "lenient_timestamp")]
    created_at: DateTime<Utc>,
}

impl SaleRowEntity {
    fn into_domain(self) -> Result<Sale> {
        if self.num_installments == 0 {
            return Err(TrackerError::CorruptRecord(format!(
                "sale {} has no installments",
                self.sale_id
            )));
        }
        Ok(Sale {
            id: SaleId::new(self.sale_id),
            customer: self.customer,
            device_model: self.device_model,
            device_brand: self.device_brand,
            down_payment: MonetaryAmount::new(self.down_payment),
            num_installments: self.num_installments,
            installment_amount: MonetaryAmount::new(self.installment_amount),
            sale_date: self.sale_date,
            created_at: self.created_at,
        })
    }

    fn from_domain(sale: &Sale) -> Self {
        Self {
            sale_id: sale.id.value(),
            customer: sale.customer.clone(),
            device_model: sale.device_model.clone(),
            device_brand: sale.device_brand.clone(),
            down_payment: sale.down_payment.value(),
            num_installments: sale.num_installments,
            installment_amount: sale.installment_amount.value(),
            sale_date: sale.sale_date,
            created_at: sale.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentRowEntity {
    sale_id: u64,
    #[serde(alias = "parcela_num")]
    installment_num: u32,
    #[serde(
        alias = "valor_parcela",
        serialize_with = "fixed_width",
        deserialize_with = "exact_decimal"
    )]
    amount: Decimal,
    #[serde(
        alias = "vencimento",
        serialize_with = "iso_date",
        deserialize_with = "lenient_date"
    )]
    due_date: NaiveDate,
    status: String,
    #[serde(alias = "dias_atraso")]
    days_overdue: u32,
    #[serde(
        alias = "juros",
        serialize_with = "fixed_width",
        deserialize_with = "exact_decimal"
    )]
    fee: Decimal,
    #[serde(
        alias = "data_pagamento",
        default,
        serialize_with = "opt_iso_date",
        deserialize_with = "lenient_opt_date"
    )]
    payment_date: Option<NaiveDate>,
}

impl InstallmentRowEntity {
    fn into_domain(self) -> Result<Installment> {
        let key = InstallmentKey::new(SaleId::new(self.sale_id), self.installment_num);
        let status: InstallmentStatus = self
            .status
            .parse()
            .map_err(|e| TrackerError::CorruptRecord(format!("installment {}: {}", key, e)))?;

        if status == InstallmentStatus::Paid && self.payment_date.is_none() {
            return Err(TrackerError::CorruptRecord(format!(
                "installment {} is Paid without a payment date",
                key
            )));
        }

        Ok(Installment {
            key,
            amount: MonetaryAmount::new(self.amount),
            due_date: self.due_date,
            status,
            days_overdue: self.days_overdue,
            fee: MonetaryAmount::new(self.fee),
            payment_date: self.payment_date,
        })
    }

    fn from_domain(installment: &Installment) -> Self {
        Self {
            sale_id: installment.key.sale_id.value(),
            installment_num: installment.key.index,
            amount: installment.amount.value(),
            due_date: installment.due_date,
            status: installment.status.to_string(),
            days_overdue: installment.days_overdue,
            fee: installment.fee.value(),
            payment_date: installment.payment_date,
        }
    }
}

fn reader<R: Read>(r: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(r)
}

// Headers are written up front so an empty collection still produces a valid file.
fn writer<W: Write>(w: W, headers: &[&str]) -> Result<csv::Writer<W>> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(headers)?;
    Ok(wtr)
}

pub fn read_sales<R: Read>(r: R) -> Result<Vec<Sale>> {
    let mut rows: Vec<Sale> = Vec::new();
    for row in reader(r).deserialize::<SaleRowEntity>() {
        // fail if cannot deserialise, no point in an incomplete ledger
        rows.push(row?.into_domain()?);
    }
    Ok(rows)
}

pub fn write_sales<W: Write>(w: W, sales: &[Sale]) -> Result<()> {
    let mut wtr = writer(w, &SALE_HEADERS)?;
    for sale in sales {
        wtr.serialize(SaleRowEntity::from_domain(sale))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_installments<R: Read>(r: R) -> Result<InstallmentBook> {
    let mut book = InstallmentBook::default();
    for row in reader(r).deserialize::<InstallmentRowEntity>() {
        let installment = row?.into_domain()?;
        if book.get(&installment.key).is_some() {
            return Err(TrackerError::CorruptRecord(format!(
                "installment {} appears more than once",
                installment.key
            )));
        }
        book = book.update(installment);
    }
    Ok(book)
}

pub fn write_installments<W: Write>(w: W, book: &InstallmentBook) -> Result<()> {
    let mut wtr = writer(w, &INSTALLMENT_HEADERS)?;
    for installment in book.iter() {
        wtr.serialize(InstallmentRowEntity::from_domain(installment))?;
    }
    wtr.flush()?;
    Ok(())
}
