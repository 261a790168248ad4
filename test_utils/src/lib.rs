use std::{collections::HashMap, str};

use serde::Serialize;

#[derive(Serialize)]
struct InstallmentRow {
    sale_id: &'static str,
    installment_num: &'static str,
    amount: &'static str,
    due_date: &'static str,
    status: &'static str,
    days_overdue: &'static str,
    fee: &'static str,
    payment_date: &'static str,
}

impl InstallmentRow {
    fn new(r: [&'static str; 8]) -> Self {
        Self {
            sale_id: r[0],
            installment_num: r[1],
            amount: r[2],
            due_date: r[3],
            status: r[4],
            days_overdue: r[5],
            fee: r[6],
            payment_date: r[7],
        }
    }
}

#[derive(Serialize)]
struct SaleRow {
    sale_id: &'static str,
    customer: &'static str,
    device_model: &'static str,
    device_brand: &'static str,
    down_payment: &'static str,
    num_installments: &'static str,
    installment_amount: &'static str,
    sale_date: &'static str,
    created_at: &'static str,
}

impl SaleRow {
    fn new(r: [&'static str; 9]) -> Self {
        Self {
            sale_id: r[0],
            customer: r[1],
            device_model: r[2],
            device_brand: r[3],
            down_payment: r[4],
            num_installments: r[5],
            installment_amount: r[6],
            sale_date: r[7],
            created_at: r[8],
        }
    }
}

// Only used during testing so no need to return result
fn to_csv<T: Serialize>(rows: Vec<T>) -> String {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for r in rows {
        wtr.serialize(r).unwrap();
    }
    wtr.flush().unwrap();
    String::from_utf8(wtr.into_inner().unwrap()).unwrap()
}

/// Installment store contents: sale_id, installment_num, amount, due_date, status,
/// days_overdue, fee, payment_date.
pub fn installments_csv(rows: Vec<[&'static str; 8]>) -> String {
    to_csv(rows.into_iter().map(InstallmentRow::new).collect())
}

/// Sale store contents: sale_id, customer, device_model, device_brand, down_payment,
/// num_installments, installment_amount, sale_date, created_at.
pub fn sales_csv(rows: Vec<[&'static str; 9]>) -> String {
    to_csv(rows.into_iter().map(SaleRow::new).collect())
}

// Rows are keyed by their first two fields: (sale_id, installment_num) for installments,
// (sale_id, customer) for sales.
fn split_to_dict(csv: &str) -> HashMap<String, String> {
    csv.lines()
        .skip(1) // ignore row titles
        .filter(|line| !line.is_empty())
        .map(|line| {
            let key = line.splitn(3, ',').take(2).collect::<Vec<_>>().join(",");
            (key, line.to_string())
        })
        .collect()
}

fn header(csv: &str) -> &str {
    csv.lines().next().unwrap_or("")
}

// Row order is not part of the store contract. This is used to ensure tests are not flaky
pub fn assert_unsorted_eq(s1: &str, s2: &str) {
    assert_eq!(header(s1), header(s2), "csv headers differ");
    let sut1 = split_to_dict(s1);
    let sut2 = split_to_dict(s2);
    if sut1.len() != sut2.len() {
        panic!("csvs do not contain the same number of rows");
    }

    sut1.iter().for_each(|(k, v)| {
        let maybe_sut2_row = sut2.get(k);
        match maybe_sut2_row {
            Some(row) => assert_eq!(row, v),
            None => panic!("row {} not found in both csvs", k),
        }
    })
}
