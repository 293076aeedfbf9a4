//! Loosely typed CSV tables for jobs that add columns to user files.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// Header row plus string cells; every row is padded to the header width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to read CSV file: {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                h.trim().to_string()
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(headers.len().max(row.len()), String::new());
            rows.push(row);
        }

        let mut table = Self { headers, rows };
        let width = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        while table.headers.len() < width {
            table.headers.push(format!("column_{}", table.headers.len() + 1));
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of `name`, appending an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(i) = self.index_of(name) {
            return i;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }
        self.headers.len() - 1
    }

    pub fn get(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        let row = &mut self.rows[row];
        if row.len() <= col {
            row.resize(col + 1, String::new());
        }
        row[col] = value.into();
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        (0..self.rows.len()).map(move |row| self.get(row, col))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_strips_bom_and_pads_rows() {
        let input = "\u{feff}name,address\n台南火車站,台南市東區前鋒路\nshort\n";
        let table = Table::from_reader(input.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["name", "address"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 0), "short");
        assert_eq!(table.get(1, 1), "");
    }

    #[test]
    fn test_ensure_column() {
        let mut table = Table::from_reader("address\nA\nB\n".as_bytes()).unwrap();
        let lat = table.ensure_column("latitude");
        assert_eq!(lat, 1);
        assert_eq!(table.ensure_column("latitude"), 1);
        assert_eq!(table.index_of("address"), Some(0));

        table.set(0, lat, "23.0");
        assert_eq!(table.column(lat).collect::<Vec<_>>(), vec!["23.0", ""]);
    }

    #[test]
    fn test_write_quotes_fields() {
        let mut table = Table::from_reader("full_path\nimages/a.jpg\n".as_bytes()).unwrap();
        let col = table.ensure_column("summary");
        table.set(0, col, "A temple, at dusk");

        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "full_path,summary\nimages/a.jpg,\"A temple, at dusk\"\n"
        );
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.csv");
        let table = Table::from_reader("address,note\n安平古堡,\"old, fort\"\n".as_bytes()).unwrap();

        table.write(&path).unwrap();
        assert_eq!(Table::read(&path).unwrap(), table);
    }
}
