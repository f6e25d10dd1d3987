//! Contract event decoding
//!
//! Maps raw log entries onto the events of an interface description (ABI).
//! Logs whose first topic matches no known event are skipped; a log that
//! matches but fails to decode produces a per-entry error without stopping
//! its siblings.

use crate::error::{EngineError, EngineResult};
use crate::tx::receipt::{LogEntry, Receipt};

use ethers::abi::{Abi, Event, RawLog, Token};
use ethers::types::{Address, H256};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// A log entry decoded against its event definition
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    /// Emitting contract
    pub address: Address,
    pub fields: BTreeMap<String, Token>,
}

impl DecodedEvent {
    pub fn field(&self, name: &str) -> Option<&Token> {
        self.fields.get(name)
    }
}

/// Decoder over the non-anonymous events of an ABI
#[derive(Debug, Clone)]
pub struct EventDecoder {
    /// Event signature hash -> definition
    events: HashMap<H256, Event>,
}

impl EventDecoder {
    /// Index the events of `abi` by their signature topic
    pub fn new(abi: &Abi) -> Self {
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.signature(), event.clone()))
            .collect();

        Self { events }
    }

    /// Number of decodable events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Decode `logs` in order. Unknown events are skipped; each matched
    /// entry yields its own result.
    pub fn decode(&self, logs: &[LogEntry]) -> Vec<EngineResult<DecodedEvent>> {
        logs.iter()
            .filter_map(|log| self.decode_entry(log))
            .collect()
    }

    /// Decode the logs carried by a receipt
    pub fn decode_receipt(&self, receipt: &Receipt) -> Vec<EngineResult<DecodedEvent>> {
        self.decode(&receipt.logs)
    }

    /// `None` when the entry is not one of ours
    pub fn decode_entry(&self, log: &LogEntry) -> Option<EngineResult<DecodedEvent>> {
        let topic = log.topics.first()?;
        let Some(event) = self.events.get(topic) else {
            debug!(?topic, address = ?log.address, "Skipping unknown event");
            return None;
        };

        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };

        let result = event
            .parse_log(raw)
            .map(|parsed| DecodedEvent {
                name: event.name.clone(),
                address: log.address,
                fields: parsed
                    .params
                    .into_iter()
                    .map(|param| (param.name, param.value))
                    .collect(),
            })
            .map_err(|e| {
                warn!(event = %event.name, error = %e, "Failed to decode event");
                EngineError::EventDecode {
                    event: event.name.clone(),
                    message: e.to_string(),
                }
            });

        if let Ok(decoded) = &result {
            crate::metrics::record_event_decoded(&decoded.name);
        }

        Some(result)
    }
}
