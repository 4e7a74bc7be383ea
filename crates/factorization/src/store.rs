//! Persistence port for fitted models and latent factors.
//!
//! [`FsStore`] keeps everything in one directory next to the rating
//! matrix:
//! - `factorization_model.json`: the serialized model
//! - `latent_factors.csv`: header `factor,<items…>`, one row per factor

use crate::error::{FactorizationError, Result};
use crate::latent::LatentFactors;
use data_loader::parser::parse_rating;
use data_loader::{DataLoadError, FsStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use tracing::info;

/// File name of the serialized model
pub const MODEL_FILE: &str = "factorization_model.json";

/// File name of the latent factor table
pub const LATENT_FACTORS_FILE: &str = "latent_factors.csv";

const FACTOR_HEADER: &str = "factor";

/// Save/load operations for factorization artifacts
pub trait ModelStore {
    fn save_model<M: Serialize>(&self, model: &M) -> Result<()>;

    fn load_model<M: DeserializeOwned>(&self) -> Result<M>;

    fn save_latent_factors(&self, latent: &LatentFactors) -> Result<()>;

    fn load_latent_factors(&self) -> Result<LatentFactors>;
}

impl ModelStore for FsStore {
    fn save_model<M: Serialize>(&self, model: &M) -> Result<()> {
        let path = self.prepare(MODEL_FILE)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, model)?;
        writer.flush()?;

        info!("Saved factorization model to {}", path.display());
        Ok(())
    }

    fn load_model<M: DeserializeOwned>(&self) -> Result<M> {
        let path = self.path_for(MODEL_FILE);
        let reader = BufReader::new(File::open(&path)?);
        let model = serde_json::from_reader(reader)?;

        info!("Loaded factorization model from {}", path.display());
        Ok(model)
    }

    fn save_latent_factors(&self, latent: &LatentFactors) -> Result<()> {
        let path = self.prepare(LATENT_FACTORS_FILE)?;
        let mut writer = csv::Writer::from_path(&path).map_err(DataLoadError::from)?;

        let mut header = vec![FACTOR_HEADER.to_string()];
        header.extend(latent.items().iter().cloned());
        writer.write_record(&header).map_err(DataLoadError::from)?;

        for (idx, row) in latent.factors().iter().enumerate() {
            let mut record = vec![idx.to_string()];
            record.extend(row.iter().map(f64::to_string));
            writer.write_record(&record).map_err(DataLoadError::from)?;
        }
        writer.flush()?;

        info!("Saved latent factors to {}", path.display());
        Ok(())
    }

    fn load_latent_factors(&self) -> Result<LatentFactors> {
        let path = self.path_for(LATENT_FACTORS_FILE);
        let mut reader = csv::Reader::from_path(&path).map_err(DataLoadError::from)?;

        let headers = reader.headers().map_err(DataLoadError::from)?.clone();
        if headers.get(0) != Some(FACTOR_HEADER) {
            return Err(FactorizationError::Data(DataLoadError::ParseError {
                file: LATENT_FACTORS_FILE.to_string(),
                line: 1,
                reason: format!("first column must be '{}'", FACTOR_HEADER),
            }));
        }
        let items: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut factors = Vec::new();
        for record in reader.records() {
            let record = record.map_err(DataLoadError::from)?;
            let row = record
                .iter()
                .skip(1)
                .map(|raw| parse_rating("factor", raw))
                .collect::<data_loader::Result<Vec<f64>>>()?;
            factors.push(row);
        }

        info!("Loaded latent factors from {}", path.display());
        LatentFactors::new(items, factors)
    }
}
