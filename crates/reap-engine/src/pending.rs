//! Correlation table for outstanding requests

use std::collections::HashMap;

use reap_client::{Request, Transport};

use crate::error::Result;

/// What to do with the response once it arrives, routed by the harvester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Response carries the authorized account's identity
    SelfInfo,
    /// Response carries the full conversation listing
    ConversationList,
    /// Response carries one page of the active conversation's history
    Page,
}

/// One outstanding request: the request as sent (its own reissue record,
/// since requests are plain cloneable values) and the handler variant that
/// routes its response.
#[derive(Debug, Clone)]
pub struct Pending {
    pub request: Request,
    pub handler: Handler,
}

/// Maps correlation ids to outstanding requests.
///
/// Ids start at 1 and increase monotonically; an id is never reused, and an
/// entry is removed the moment its response is dispatched. A response whose
/// id has no entry is dropped by the caller. In this workload the table
/// holds at most a couple of entries, because the engine chains requests
/// strictly call-by-call instead of pipelining.
#[derive(Debug)]
pub struct PendingTable {
    next_id: u64,
    entries: HashMap<u64, Pending>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    /// An empty table. Id 0 is reserved for the unsolicited-update channel
    /// and is never allocated.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Store `(request, handler)` under a fresh id and send the tagged
    /// request. Returns the id.
    pub async fn register(
        &mut self,
        transport: &mut dyn Transport,
        request: Request,
        handler: Handler,
    ) -> Result<u64> {
        let id = self.allocate();
        self.entries.insert(
            id,
            Pending {
                request: request.clone(),
                handler,
            },
        );
        transport.send(id, request).await?;
        Ok(id)
    }

    /// Send a request nobody waits on. The id counter still advances, so
    /// every request that ever leaves the process carries a distinct tag.
    pub async fn send_untracked(
        &mut self,
        transport: &mut dyn Transport,
        request: Request,
    ) -> Result<u64> {
        let id = self.allocate();
        transport.send(id, request).await?;
        Ok(id)
    }

    /// Remove and return the entry for `id`, if any. An entry can be taken
    /// exactly once.
    pub fn take(&mut self, id: u64) -> Option<Pending> {
        self.entries.remove(&id)
    }

    /// Number of outstanding entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
