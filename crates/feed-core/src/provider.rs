//! Provider trait for fetching market data.
//!
//! Every provider implements [`DataProvider`]: it declares which
//! [`Operation`]s it answers and executes canonical [`Request`]s, translating
//! symbols and payloads at its own boundary. Providers never retry; the
//! registry wraps each call in a [`Retrier`](crate::retry::Retrier).

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    frequency::DataFrequency,
    request::{Operation, Record, Request},
    session::SessionManager,
    symbol::SymbolScheme,
};

/// Base trait for all data providers.
#[async_trait]
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the registry name of this provider (e.g., "tushare").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;

    /// Operations this provider can answer, in no particular order.
    fn capabilities(&self) -> &[Operation];

    /// Bar frequencies this provider serves for [`Operation::HistoricalBars`].
    fn supported_frequencies(&self) -> &[DataFrequency] {
        &[]
    }

    /// How this provider spells symbols.
    fn symbol_scheme(&self) -> SymbolScheme;

    /// Session manager, for providers that require a login.
    fn session(&self) -> Option<&SessionManager> {
        None
    }

    /// Returns true if this provider answers `operation`.
    fn supports(&self, operation: Operation) -> bool {
        self.capabilities().contains(&operation)
    }

    /// Returns true if this provider can answer this specific request.
    fn supports_request(&self, request: &Request) -> bool {
        if !self.supports(request.operation()) {
            return false;
        }
        match request {
            Request::HistoricalBars { frequency, .. } => {
                self.supported_frequencies().contains(frequency)
            }
            _ => true,
        }
    }

    /// Executes one request against the provider.
    ///
    /// `Ok(None)` means the provider answered but had no data.
    async fn execute(&self, request: &Request) -> Result<Option<Record>>;

    /// Releases provider-side resources such as a login session.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
