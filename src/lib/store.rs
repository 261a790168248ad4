use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::error::Result;
use crate::io::{read_installments, read_sales, write_installments, write_sales};
use crate::types::{InstallmentBook, Sale};

pub const SALES_FILE: &str = "sales.csv";
pub const INSTALLMENTS_FILE: &str = "installments.csv";

/// The two flat CSV files holding all tracker state.
///
/// Missing files are created empty (header row only) on first load. There is no locking:
/// two processes writing the same directory can lose each other's changes.
#[derive(Clone, Debug)]
pub struct Store {
    sales_path: PathBuf,
    installments_path: PathBuf,
}

impl Store {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            sales_path: dir.join(SALES_FILE),
            installments_path: dir.join(INSTALLMENTS_FILE),
        }
    }

    pub fn sales_path(&self) -> &Path {
        &self.sales_path
    }

    pub fn installments_path(&self) -> &Path {
        &self.installments_path
    }

    pub fn load_sales(&self) -> Result<Vec<Sale>> {
        if !self.sales_path.exists() {
            warn!(path = %self.sales_path.display(), "sales file missing, creating it");
            self.save_sales(&[])?;
            return Ok(Vec::new());
        }
        let sales = read_sales(BufReader::new(File::open(&self.sales_path)?))?;
        debug!(count = sales.len(), "loaded sales");
        Ok(sales)
    }

    pub fn save_sales(&self, sales: &[Sale]) -> Result<()> {
        ensure_parent(&self.sales_path)?;
        write_sales(BufWriter::new(File::create(&self.sales_path)?), sales)
    }

    pub fn load_installments(&self) -> Result<InstallmentBook> {
        if !self.installments_path.exists() {
            warn!(path = %self.installments_path.display(), "installments file missing, creating it");
            self.save_installments(&InstallmentBook::default())?;
            return Ok(InstallmentBook::default());
        }
        let book = read_installments(BufReader::new(File::open(&self.installments_path)?))?;
        debug!(count = book.len(), "loaded installments");
        Ok(book)
    }

    pub fn save_installments(&self, book: &InstallmentBook) -> Result<()> {
        ensure_parent(&self.installments_path)?;
        write_installments(BufWriter::new(File::create(&self.installments_path)?), book)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}
