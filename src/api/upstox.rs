use anyhow::{Context, Result};
use reqwest::Client;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

const MASTER_TIMEOUT_SECS: u64 = 30;

/// Which reference-table column configured symbols are joined against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapBy {
    TradingSymbol,
    Isin,
}

impl FromStr for MapBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tradingsymbol" => Ok(MapBy::TradingSymbol),
            "isin" => Ok(MapBy::Isin),
            other => Err(format!("unknown mapping mode: {}", other)),
        }
    }
}

/// One row of the instrument master, reduced to the columns we join on
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRow {
    pub instrument_key: String,
    pub tradingsymbol: String,
    pub isin: String,
}

/// Downloads the instrument master and resolves symbols to instrument keys
pub struct InstrumentMaster {
    client: Client,
    url: String,
    token: Option<String>,
}

impl InstrumentMaster {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(MASTER_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }

    /// Download and parse the reference table
    pub async fn fetch(&self) -> Result<Vec<InstrumentRow>> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let body = request
            .send()
            .await
            .context("Instrument master request failed")?
            .error_for_status()
            .context("Instrument master returned an error status")?
            .text()
            .await
            .context("Failed to read instrument master body")?;

        let rows = parse_master(&body)?;
        tracing::info!("Loaded {} instruments from {}", rows.len(), self.url);
        Ok(rows)
    }

    /// Fetch the table and map `symbols` to instrument keys
    pub async fn resolve(&self, symbols: &[String], map_by: MapBy) -> Result<Vec<String>> {
        let rows = self.fetch().await?;
        Ok(map_to_instrument_keys(&rows, symbols, map_by))
    }
}

/// Join configured symbols against the reference table
///
/// Keys come back in table order, de-duplicated, first occurrence wins.
pub fn map_to_instrument_keys(
    rows: &[InstrumentRow],
    symbols: &[String],
    map_by: MapBy,
) -> Vec<String> {
    let wants: HashSet<String> = match map_by {
        MapBy::Isin => symbols.iter().cloned().collect(),
        MapBy::TradingSymbol => symbols
            .iter()
            .map(|s| s.replace(".NS", "").to_uppercase())
            .collect(),
    };

    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| match map_by {
            MapBy::Isin => wants.contains(&row.isin),
            MapBy::TradingSymbol => wants.contains(&row.tradingsymbol.to_uppercase()),
        })
        .filter(|row| seen.insert(row.instrument_key.clone()))
        .map(|row| row.instrument_key.clone())
        .collect()
}

/// Parse the CSV master using its header row to locate columns
pub fn parse_master(body: &str) -> Result<Vec<InstrumentRow>> {
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());
    let header = split_record(lines.next().context("Instrument master is empty")?);

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .with_context(|| format!("Instrument master has no `{}` column", name))
    };
    let key_idx = column("instrument_key")?;
    let symbol_idx = column("tradingsymbol")?;
    let isin_idx = column("isin").ok();

    let rows = lines
        .map(split_record)
        .filter_map(|fields| {
            let instrument_key = fields.get(key_idx)?.clone();
            if instrument_key.is_empty() {
                return None;
            }
            Some(InstrumentRow {
                instrument_key,
                tradingsymbol: fields.get(symbol_idx).cloned().unwrap_or_default(),
                isin: isin_idx
                    .and_then(|i| fields.get(i).cloned())
                    .unwrap_or_default(),
            })
        })
        .collect();

    Ok(rows)
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}
