//! Reactive CA discovery from group messages
//!
//! Scans message text for contract addresses, guesses the chain and
//! pushes one job per hit onto the orchestrator queue. The Telegram
//! transport delivering the messages is a collaborator; this module
//! only owns extraction and dispatch.

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pipeline::{CaJob, Trigger};
use crate::state::StateStore;
use std::sync::Arc;

/// Extracts candidate CAs from free-form text
pub struct CaScanner {
    base58_pattern: Regex,
    evm_pattern: Regex,
}

impl CaScanner {
    pub fn new() -> Result<Self> {
        let base58_pattern = Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,44}")
            .map_err(|e| Error::Config(e.to_string()))?;
        let evm_pattern =
            Regex::new(r"0x[0-9a-fA-F]{40}").map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            base58_pattern,
            evm_pattern,
        })
    }

    /// All (chain, address) pairs found in the text
    pub fn extract(&self, text: &str) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for m in self.evm_pattern.find_iter(text) {
            found.push(("bsc".to_string(), m.as_str().to_string()));
        }
        for m in self.base58_pattern.find_iter(text) {
            let candidate = m.as_str();
            // only a decoded 32-byte payload is a plausible Solana CA
            if is_solana_address(candidate) {
                found.push(("solana".to_string(), candidate.to_string()));
            }
        }
        found
    }
}

/// True iff the string base58-decodes to a 32-byte key
pub fn is_solana_address(s: &str) -> bool {
    bs58::decode(s)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

/// Chain guess for an address pasted without context
pub fn guess_chain(address: &str) -> &'static str {
    if address.starts_with("0x") && address.len() == 42 {
        return "bsc";
    }
    if is_solana_address(address) {
        return "solana";
    }
    "bsc"
}

/// Bridges incoming group messages to the orchestrator queue
pub struct Monitor {
    scanner: CaScanner,
    state: Arc<StateStore>,
    tx: mpsc::Sender<CaJob>,
}

impl Monitor {
    pub fn new(state: Arc<StateStore>, tx: mpsc::Sender<CaJob>) -> Result<Self> {
        Ok(Self {
            scanner: CaScanner::new()?,
            state,
            tx,
        })
    }

    /// Handle one group message: every CA found is queued once per
    /// task listening on that chat
    pub async fn handle_message(&self, chat_id: i64, text: &str) {
        let hits = self.scanner.extract(text);
        if hits.is_empty() {
            return;
        }
        let listeners: Vec<String> = self
            .state
            .listen_map()
            .await
            .into_iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, task_id)| task_id)
            .collect();
        if listeners.is_empty() {
            debug!("CA seen in unwatched chat {}", chat_id);
            return;
        }
        for (chain, ca) in hits {
            for task_id in &listeners {
                let job = CaJob {
                    chain: chain.clone(),
                    ca: ca.clone(),
                    task_id: Some(task_id.clone()),
                    trigger: Trigger::GroupMessage,
                };
                if let Err(e) = self.tx.send(job).await {
                    warn!("Orchestrator queue closed, dropping job: {}", e);
                    return;
                }
            }
        }
    }
}
