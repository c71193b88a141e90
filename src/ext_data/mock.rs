//! Scripted external data provider for tests and local runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ExternalDataError;
use crate::ext_data::{Credentials, ExternalDataProvider, PeerAddress, Role};

/// How a mocked query answers.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Value(T),
    Fail,
    /// Never completes.
    Pending,
}

impl<T> Default for MockReply<T> {
    fn default() -> Self {
        MockReply::Pending
    }
}

impl<T: Clone> MockReply<T> {
    async fn answer(&self, field: &'static str) -> Result<T, ExternalDataError> {
        match self {
            MockReply::Value(value) => Ok(value.clone()),
            MockReply::Fail => Err(ExternalDataError::Unavailable(format!("mocked {field} failure"))),
            MockReply::Pending => std::future::pending().await,
        }
    }
}

/// Provider whose answers are fixed at construction. Every query is
/// pending unless scripted otherwise.
#[derive(Debug, Default)]
pub struct MockExternalData {
    role: MockReply<Role>,
    peer_address: MockReply<PeerAddress>,
    credentials: MockReply<Credentials>,
    role_calls: AtomicUsize,
    peer_calls: AtomicUsize,
    credential_calls: AtomicUsize,
}

impl MockExternalData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, reply: MockReply<Role>) -> Self {
        self.role = reply;
        self
    }

    pub fn with_peer_address(mut self, reply: MockReply<PeerAddress>) -> Self {
        self.peer_address = reply;
        self
    }

    pub fn with_credentials(mut self, reply: MockReply<Credentials>) -> Self {
        self.credentials = reply;
        self
    }

    pub fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    pub fn peer_calls(&self) -> usize {
        self.peer_calls.load(Ordering::SeqCst)
    }

    pub fn credential_calls(&self) -> usize {
        self.credential_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalDataProvider for MockExternalData {
    async fn fetch_role(&self) -> Result<Role, ExternalDataError> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        self.role.answer("role").await
    }

    async fn fetch_peer_address(&self) -> Result<PeerAddress, ExternalDataError> {
        self.peer_calls.fetch_add(1, Ordering::SeqCst);
        self.peer_address.answer("peer address").await
    }

    async fn fetch_credentials(&self) -> Result<Credentials, ExternalDataError> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.answer("credentials").await
    }
}
