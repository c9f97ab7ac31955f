//! On-demand dataset handles from a parsed configuration

use std::collections::HashMap;

use crate::config::ConfigFile;

use super::checker::DatasetChecker;
use super::errors::{DatasetError, DatasetResult};
use super::reader::DatasetReader;
use super::writer::DatasetWriter;
use super::DatasetConfig;

/// Cache of opened datasets keyed by configuration section name.
///
/// Dataset sections are parsed once at construction; reader and writer
/// handles open lazily on first use. Writers stay open so the dataset
/// lock is taken once per pool lifetime.
pub struct DatasetPool {
    configs: HashMap<String, DatasetConfig>,
    writers: HashMap<String, DatasetWriter>,
}

impl DatasetPool {
    /// Builds a pool from a configuration with one section per dataset
    pub fn from_config(config: &ConfigFile) -> DatasetResult<Self> {
        let mut configs = HashMap::new();
        for (name, section) in config.section_iter() {
            configs.insert(name.clone(), DatasetConfig::from_section(name, section)?);
        }
        Ok(Self {
            configs,
            writers: HashMap::new(),
        })
    }

    /// The names of all configured datasets
    pub fn dataset_names(&self) -> Vec<&str> {
        self.configs.keys().map(|s| s.as_str()).collect()
    }

    fn config(&self, name: &str) -> DatasetResult<&DatasetConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| DatasetError::Config(format!("no dataset named {:?}", name)))
    }

    /// A reader for the named dataset
    pub fn reader(&self, name: &str) -> DatasetResult<DatasetReader> {
        Ok(DatasetReader::open(self.config(name)?.clone()))
    }

    /// The writer for the named dataset, opened (and locked) on first use
    pub fn writer(&mut self, name: &str) -> DatasetResult<&mut DatasetWriter> {
        if !self.writers.contains_key(name) {
            let config = self.config(name)?.clone();
            let writer = DatasetWriter::open(config)?;
            self.writers.insert(name.to_string(), writer);
        }
        Ok(self.writers.get_mut(name).expect("writer just inserted"))
    }

    /// A checker for the named dataset.
    ///
    /// Fails if this pool holds an open writer for it, since maintenance
    /// needs exclusive access.
    pub fn checker(&self, name: &str) -> DatasetResult<DatasetChecker> {
        if self.writers.contains_key(name) {
            return Err(DatasetError::Config(format!(
                "dataset {:?} has an open writer; close it before maintenance",
                name
            )));
        }
        Ok(DatasetChecker::open(self.config(name)?.clone()))
    }

    /// Closes all open writers, releasing their locks
    pub fn close_writers(&mut self) {
        for writer in self.writers.values_mut() {
            writer.close();
        }
        self.writers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AcquireOutcome;
    use crate::matcher::Parser;
    use crate::metadata::Metadata;
    use crate::types::Attribute;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn pool(root: &std::path::Path) -> DatasetPool {
        let text = format!(
            "[era40]\npath = {}/era40\nstep = monthly\n\n\
             [cosmo]\npath = {}/cosmo\nstep = daily\n",
            root.display(),
            root.display()
        );
        let config = ConfigFile::parse(&text, "datasets.conf").unwrap();
        DatasetPool::from_config(&config).unwrap()
    }

    fn md() -> Metadata {
        let mut md = Metadata::new();
        md.set(Attribute::Reftime(
            NaiveDate::from_ymd_opt(2007, 4, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        md
    }

    #[test]
    fn test_unknown_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool(temp_dir.path());
        assert!(matches!(
            pool.reader("nope"),
            Err(DatasetError::Config(_))
        ));
    }

    #[test]
    fn test_writer_is_cached_and_reader_sees_its_commits() {
        let temp_dir = TempDir::new().unwrap();
        let mut pool = pool(temp_dir.path());

        // Two writer calls reuse the same locked writer
        let outcome = pool
            .writer("era40")
            .unwrap()
            .acquire(&mut md(), b"payload")
            .unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
        assert_eq!(
            pool.writer("era40")
                .unwrap()
                .acquire(&mut md(), b"payload")
                .unwrap(),
            AcquireOutcome::Duplicate
        );

        let reader = pool.reader("era40").unwrap();
        let summary = reader
            .query_summary(&Parser::new().parse("").unwrap())
            .unwrap();
        assert_eq!(summary.count, 1);
    }

    #[test]
    fn test_checker_refuses_while_writer_open() {
        let temp_dir = TempDir::new().unwrap();
        let mut pool = pool(temp_dir.path());
        pool.writer("cosmo").unwrap();
        assert!(pool.checker("cosmo").is_err());
        pool.close_writers();
        pool.checker("cosmo").unwrap();
    }
}
