//! Read-only queries over harvested data
//!
//! Output goes to any `io::Write` so the CLI prints to stdout and tests
//! capture into a buffer.

use crate::storage::{DetailRecord, GameStore};
use crate::{GamechaError, Result};
use std::io::Write;

/// Queries one platform's namespace in storage
pub struct Querier<'a> {
    store: &'a dyn GameStore,
    platform: String,
}

impl<'a> Querier<'a> {
    pub fn new(store: &'a dyn GameStore, platform: impl Into<String>) -> Self {
        Self {
            store,
            platform: platform.into(),
        }
    }

    /// Prints the summary line of every stored record, then the total
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of records listed
    /// * `Err(GamechaError)` - Storage read or write to `out` failed
    pub fn list(&self, out: &mut impl Write) -> Result<usize> {
        let records = self.store.list_records(&self.platform)?;
        for (_, record) in &records {
            writeln!(out, "{}", record.summary_line())?;
        }
        writeln!(out, "Total {} games.", records.len())?;
        Ok(records.len())
    }

    /// Prints every field of one record
    pub fn show(&self, sub_id: &str, out: &mut impl Write) -> Result<()> {
        let record = self
            .store
            .get_record(&self.platform, sub_id)?
            .ok_or_else(|| GamechaError::RecordNotFound {
                platform: self.platform.clone(),
                sub_id: sub_id.to_string(),
            })?;
        write_record(&record, out)?;
        Ok(())
    }

    /// Prints the persisted catalog sorted by id, then the total
    pub fn catalog(&self, out: &mut impl Write) -> Result<usize> {
        let catalog = self.store.get_catalog(&self.platform)?;
        let mut entries: Vec<_> = catalog.iter().collect();
        entries.sort_by_key(|(id, _)| **id);

        for (id, name) in &entries {
            writeln!(out, "{}\t{}", id, name)?;
        }
        writeln!(out, "Total {} games.", entries.len())?;
        Ok(entries.len())
    }
}

fn write_record(record: &DetailRecord, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "ID:            {}", record.id)?;
    writeln!(out, "Name:          {}", record.name)?;
    writeln!(out, "Required age:  {}", record.required_age)?;
    writeln!(out, "Free:          {}", record.is_free)?;
    writeln!(out, "Developers:    {}", record.developers.join(", "))?;
    writeln!(out, "Publishers:    {}", record.publishers.join(", "))?;
    writeln!(out, "Languages:     {}", record.languages)?;
    if let Some(date) = &record.release_date {
        writeln!(out, "Release date:  {}", date)?;
    }
    if let Some(site) = &record.website {
        writeln!(out, "Website:       {}", site)?;
    }
    writeln!(out, "Header image:  {}", record.header_image)?;
    writeln!(out)?;
    writeln!(out, "{}", record.short_description)?;
    Ok(())
}
