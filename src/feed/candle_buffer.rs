use crate::models::{Candle, Tick};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory candle store
///
/// Holds one ascending, gap-free series of fixed-width candles per instrument.
/// Ingestion writes through `record_tick`; the scan loop only reads copies.
#[derive(Clone)]
pub struct CandleBuffer {
    data: Arc<RwLock<HashMap<String, Vec<Candle>>>>,
    width_secs: i64,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `width_secs` - Bucket width in seconds (must be non-zero)
    pub fn new(width_secs: u64) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            width_secs: width_secs.max(1) as i64,
        }
    }

    pub fn width_secs(&self) -> i64 {
        self.width_secs
    }

    /// Floor a timestamp to the start of its bucket
    pub fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let secs = at.timestamp().div_euclid(self.width_secs) * self.width_secs;
        Utc.timestamp_opt(secs, 0).single().unwrap_or(at)
    }

    /// Create an empty series for an instrument if it is not tracked yet
    pub fn ensure(&self, instrument: &str) -> Result<(), String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        data.entry(instrument.to_string()).or_default();
        Ok(())
    }

    /// Fold one tick into the instrument's series
    ///
    /// Updates the candle of the tick's bucket, or opens a new one whose `open`
    /// carries forward the previous candle's close.
    pub fn record_tick(
        &self,
        instrument: &str,
        price: f64,
        volume: f64,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        let bucket = self.bucket_start(at);
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        let series = data.entry(instrument.to_string()).or_default();

        match series.binary_search_by(|c| c.bucket_start.cmp(&bucket)) {
            Ok(idx) => series[idx].apply(price, volume),
            Err(idx) => {
                let open = if idx > 0 { series[idx - 1].close } else { price };
                series.insert(idx, Candle::open_at(bucket, open, price, volume));
            }
        }

        tracing::trace!(instrument, price, volume, bucket = %bucket, "Recorded tick");
        Ok(())
    }

    /// Fold a [`Tick`] into its instrument's series
    pub fn record(&self, tick: &Tick) -> Result<(), String> {
        self.record_tick(&tick.instrument, tick.price, tick.volume, tick.timestamp)
    }

    /// Get all candles for an instrument
    pub fn get_candles(&self, instrument: &str) -> Result<Vec<Candle>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(instrument).cloned().unwrap_or_default())
    }

    /// Get count of candles for an instrument
    pub fn candle_count(&self, instrument: &str) -> Result<usize, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(instrument).map(|s| s.len()).unwrap_or(0))
    }

    /// Get all tracked instruments, sorted
    pub fn instruments(&self) -> Result<Vec<String>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Copy every series out under a single read lock
    ///
    /// Sorted by instrument so scan cycles visit instruments in a stable order.
    pub fn snapshot(&self) -> Result<Vec<(String, Vec<Candle>)>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        let mut series: Vec<(String, Vec<Candle>)> = data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(series)
    }
}
