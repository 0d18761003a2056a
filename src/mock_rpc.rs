//! In-memory stand-in for the service, backing the client tests.
//!
//! Implements the four generated server traits over one mutex-guarded store
//! with real revision bookkeeping, so tests observe the same header, event,
//! and transaction shapes a live server produces. Departure from the real
//! thing: every mutating op inside a txn takes its own revision.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;

use crate::proto::etcdserverpb::compare;
use crate::proto::etcdserverpb::kv_server::Kv;
use crate::proto::etcdserverpb::lease_server::Lease;
use crate::proto::etcdserverpb::request_op;
use crate::proto::etcdserverpb::response_op;
use crate::proto::etcdserverpb::watch_request::RequestUnion;
use crate::proto::etcdserverpb::watch_server::Watch;
use crate::proto::etcdserverpb::Compare;
use crate::proto::etcdserverpb::DeleteRangeRequest;
use crate::proto::etcdserverpb::DeleteRangeResponse;
use crate::proto::etcdserverpb::LeaseGrantRequest;
use crate::proto::etcdserverpb::LeaseGrantResponse;
use crate::proto::etcdserverpb::LeaseKeepAliveRequest;
use crate::proto::etcdserverpb::LeaseKeepAliveResponse;
use crate::proto::etcdserverpb::LeaseRevokeRequest;
use crate::proto::etcdserverpb::LeaseRevokeResponse;
use crate::proto::etcdserverpb::PutRequest;
use crate::proto::etcdserverpb::PutResponse;
use crate::proto::etcdserverpb::RangeRequest;
use crate::proto::etcdserverpb::RangeResponse;
use crate::proto::etcdserverpb::RequestOp;
use crate::proto::etcdserverpb::ResponseHeader;
use crate::proto::etcdserverpb::ResponseOp;
use crate::proto::etcdserverpb::TxnRequest;
use crate::proto::etcdserverpb::TxnResponse;
use crate::proto::etcdserverpb::WatchRequest;
use crate::proto::etcdserverpb::WatchResponse;
use crate::proto::mvccpb;
use crate::proto::v3lockpb::lock_server::Lock;
use crate::proto::v3lockpb::LockRequest;
use crate::proto::v3lockpb::LockResponse;
use crate::proto::v3lockpb::UnlockRequest;
use crate::proto::v3lockpb::UnlockResponse;

/// Fake etcd node shared by all four mock services.
#[derive(Clone, Default)]
pub struct MockEtcd {
    inner: Arc<Mutex<Inner>>,
    /// When set, every RPC fails with this status instead of executing.
    pub fail_with: Option<Status>,
    /// When true, keep-alive streams end without ever sending a response.
    pub close_keep_alive: bool,
}

impl MockEtcd {
    pub fn failing(status: Status) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    pub fn closing_keep_alive() -> Self {
        Self {
            close_keep_alive: true,
            ..Self::default()
        }
    }

    fn check_failure(&self) -> Result<(), Status> {
        match &self.fail_with {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct Record {
    value: Vec<u8>,
    create_revision: i64,
    mod_revision: i64,
    version: i64,
    lease: i64,
}

struct Watcher {
    id: i64,
    key: Vec<u8>,
    range_end: Vec<u8>,
    prev_kv: bool,
    tx: mpsc::UnboundedSender<Result<WatchResponse, Status>>,
}

#[derive(Default)]
struct LockState {
    holder: Option<Vec<u8>>,
    waiters: VecDeque<(i64, oneshot::Sender<Vec<u8>>)>,
}

struct Inner {
    revision: i64,
    next_lease_id: i64,
    next_watch_id: i64,
    store: BTreeMap<Vec<u8>, Record>,
    leases: HashMap<i64, i64>,
    watchers: Vec<Watcher>,
    locks: HashMap<Vec<u8>, LockState>,
}

impl Default for Inner {
    fn default() -> Self {
        // An empty store is already at revision 1, like a fresh server.
        Self {
            revision: 1,
            next_lease_id: 0,
            next_watch_id: 0,
            store: BTreeMap::new(),
            leases: HashMap::new(),
            watchers: Vec::new(),
            locks: HashMap::new(),
        }
    }
}

fn key_in_range(candidate: &[u8], key: &[u8], range_end: &[u8]) -> bool {
    if range_end.is_empty() {
        return candidate == key;
    }
    if range_end == [0] {
        return candidate >= key;
    }
    candidate >= key && candidate < range_end
}

fn key_value(key: &[u8], record: &Record) -> mvccpb::KeyValue {
    mvccpb::KeyValue {
        key: key.to_vec(),
        create_revision: record.create_revision,
        mod_revision: record.mod_revision,
        version: record.version,
        value: record.value.clone(),
        lease: record.lease,
    }
}

fn ordered(actual: i64, expected: i64, result: compare::CompareResult) -> bool {
    match result {
        compare::CompareResult::Equal => actual == expected,
        compare::CompareResult::Greater => actual > expected,
        compare::CompareResult::Less => actual < expected,
        compare::CompareResult::NotEqual => actual != expected,
    }
}

impl Inner {
    fn header(&self) -> ResponseHeader {
        ResponseHeader {
            cluster_id: 1,
            member_id: 1,
            revision: self.revision,
            raft_term: 1,
        }
    }

    fn do_put(&mut self, request: &PutRequest) -> PutResponse {
        self.revision += 1;
        let previous = self.store.get(&request.key).cloned();
        let record = Record {
            value: request.value.clone(),
            create_revision: previous
                .as_ref()
                .map_or(self.revision, |p| p.create_revision),
            mod_revision: self.revision,
            version: previous.as_ref().map_or(1, |p| p.version + 1),
            lease: request.lease,
        };
        self.store.insert(request.key.clone(), record.clone());

        let prev_kv = previous.map(|p| key_value(&request.key, &p));
        self.notify(
            &request.key,
            mvccpb::Event {
                r#type: mvccpb::event::EventType::Put as i32,
                kv: Some(key_value(&request.key, &record)),
                prev_kv: prev_kv.clone(),
            },
        );

        PutResponse {
            header: Some(self.header()),
            prev_kv: if request.prev_kv { prev_kv } else { None },
        }
    }

    fn do_range(&self, request: &RangeRequest) -> RangeResponse {
        let mut kvs: Vec<mvccpb::KeyValue> = self
            .store
            .iter()
            .filter(|(key, _)| key_in_range(key, &request.key, &request.range_end))
            .map(|(key, record)| key_value(key, record))
            .collect();
        let count = kvs.len() as i64;
        if request.count_only {
            kvs.clear();
        } else if request.limit > 0 && kvs.len() > request.limit as usize {
            kvs.truncate(request.limit as usize);
        }
        if request.keys_only {
            for kv in &mut kvs {
                kv.value.clear();
            }
        }
        RangeResponse {
            header: Some(self.header()),
            more: !request.count_only && (kvs.len() as i64) < count,
            kvs,
            count,
        }
    }

    fn do_delete_range(&mut self, request: &DeleteRangeRequest) -> DeleteRangeResponse {
        let keys: Vec<Vec<u8>> = self
            .store
            .keys()
            .filter(|key| key_in_range(key, &request.key, &request.range_end))
            .cloned()
            .collect();

        let mut prev_kvs = Vec::new();
        if !keys.is_empty() {
            // All keys removed by one request share the deletion revision.
            self.revision += 1;
            for key in &keys {
                if let Some(record) = self.remove_key(key) {
                    if request.prev_kv {
                        prev_kvs.push(key_value(key, &record));
                    }
                }
            }
        }

        DeleteRangeResponse {
            header: Some(self.header()),
            deleted: keys.len() as i64,
            prev_kvs,
        }
    }

    /// Removes without bumping the revision; the caller owns the bump.
    fn remove_key(&mut self, key: &[u8]) -> Option<Record> {
        let record = self.store.remove(key)?;
        let tombstone = mvccpb::KeyValue {
            key: key.to_vec(),
            mod_revision: self.revision,
            ..Default::default()
        };
        self.notify(
            key,
            mvccpb::Event {
                r#type: mvccpb::event::EventType::Delete as i32,
                kv: Some(tombstone),
                prev_kv: Some(key_value(key, &record)),
            },
        );
        Some(record)
    }

    fn notify(&mut self, key: &[u8], event: mvccpb::Event) {
        let header = self.header();
        self.watchers.retain(|watcher| {
            if !key_in_range(key, &watcher.key, &watcher.range_end) {
                return true;
            }
            let mut event = event.clone();
            if !watcher.prev_kv {
                event.prev_kv = None;
            }
            let response = WatchResponse {
                header: Some(header),
                watch_id: watcher.id,
                events: vec![event],
                ..Default::default()
            };
            watcher.tx.send(Ok(response)).is_ok()
        });
    }

    fn check(&self, compare: &Compare) -> bool {
        let record = self.store.get(&compare.key);
        let result = compare.result();
        match &compare.target_union {
            Some(compare::TargetUnion::Version(expected)) => {
                ordered(record.map_or(0, |r| r.version), *expected, result)
            }
            Some(compare::TargetUnion::CreateRevision(expected)) => {
                ordered(record.map_or(0, |r| r.create_revision), *expected, result)
            }
            Some(compare::TargetUnion::ModRevision(expected)) => {
                ordered(record.map_or(0, |r| r.mod_revision), *expected, result)
            }
            Some(compare::TargetUnion::Value(expected)) => {
                let actual = record.map_or(&[][..], |r| r.value.as_slice());
                match result {
                    compare::CompareResult::Equal => actual == expected.as_slice(),
                    compare::CompareResult::Greater => actual > expected.as_slice(),
                    compare::CompareResult::Less => actual < expected.as_slice(),
                    compare::CompareResult::NotEqual => actual != expected.as_slice(),
                }
            }
            Some(compare::TargetUnion::Lease(expected)) => {
                ordered(record.map_or(0, |r| r.lease), *expected, result)
            }
            None => true,
        }
    }

    fn do_txn(&mut self, request: &TxnRequest) -> TxnResponse {
        let succeeded = request.compare.iter().all(|compare| self.check(compare));
        let ops = if succeeded {
            &request.success
        } else {
            &request.failure
        };
        let responses = ops.iter().map(|op| self.do_op(op)).collect();
        TxnResponse {
            header: Some(self.header()),
            succeeded,
            responses,
        }
    }

    fn do_op(&mut self, op: &RequestOp) -> ResponseOp {
        let response = match &op.request {
            Some(request_op::Request::RequestRange(request)) => Some(
                response_op::Response::ResponseRange(self.do_range(request)),
            ),
            Some(request_op::Request::RequestPut(request)) => {
                Some(response_op::Response::ResponsePut(self.do_put(request)))
            }
            Some(request_op::Request::RequestDeleteRange(request)) => Some(
                response_op::Response::ResponseDeleteRange(self.do_delete_range(request)),
            ),
            Some(request_op::Request::RequestTxn(request)) => {
                Some(response_op::Response::ResponseTxn(self.do_txn(request)))
            }
            None => None,
        };
        ResponseOp { response }
    }

    fn ownership_key(name: &[u8], lease: i64) -> Vec<u8> {
        let mut key = name.to_vec();
        key.extend_from_slice(format!("/{lease:x}").as_bytes());
        key
    }

    fn acquire(&mut self, name: &[u8], lease: i64) -> Result<Vec<u8>, oneshot::Receiver<Vec<u8>>> {
        let held = self
            .locks
            .get(name)
            .is_some_and(|state| state.holder.is_some());
        if held {
            let (tx, rx) = oneshot::channel();
            self.locks
                .entry(name.to_vec())
                .or_default()
                .waiters
                .push_back((lease, tx));
            return Err(rx);
        }

        let key = Self::ownership_key(name, lease);
        self.locks.entry(name.to_vec()).or_default().holder = Some(key.clone());
        self.do_put(&PutRequest {
            key: key.clone(),
            lease,
            ..Default::default()
        });
        Ok(key)
    }

    fn release(&mut self, key: &[u8]) {
        let Some(name) = self
            .locks
            .iter()
            .find(|(_, state)| state.holder.as_deref() == Some(key))
            .map(|(name, _)| name.clone())
        else {
            return;
        };

        self.revision += 1;
        self.remove_key(key);
        if let Some(state) = self.locks.get_mut(&name) {
            state.holder = None;
        }
        self.grant_next(&name);
    }

    fn grant_next(&mut self, name: &[u8]) {
        loop {
            let next = match self.locks.get_mut(name) {
                Some(state) if state.holder.is_none() => state.waiters.pop_front(),
                _ => None,
            };
            let Some((lease, tx)) = next else { return };

            let key = Self::ownership_key(name, lease);
            if let Some(state) = self.locks.get_mut(name) {
                state.holder = Some(key.clone());
            }
            self.do_put(&PutRequest {
                key: key.clone(),
                lease,
                ..Default::default()
            });
            if tx.send(key.clone()).is_ok() {
                return;
            }

            // The waiter gave up; take the grant back and try the next one.
            self.revision += 1;
            self.remove_key(&key);
            if let Some(state) = self.locks.get_mut(name) {
                state.holder = None;
            }
        }
    }
}

#[tonic::async_trait]
impl Kv for MockEtcd {
    async fn range(
        &self,
        request: Request<RangeRequest>,
    ) -> Result<Response<RangeResponse>, Status> {
        self.check_failure()?;
        let inner = self.inner.lock();
        Ok(Response::new(inner.do_range(request.get_ref())))
    }

    async fn put(
        &self,
        request: Request<PutRequest>,
    ) -> Result<Response<PutResponse>, Status> {
        self.check_failure()?;
        let mut inner = self.inner.lock();
        Ok(Response::new(inner.do_put(request.get_ref())))
    }

    async fn delete_range(
        &self,
        request: Request<DeleteRangeRequest>,
    ) -> Result<Response<DeleteRangeResponse>, Status> {
        self.check_failure()?;
        let mut inner = self.inner.lock();
        Ok(Response::new(inner.do_delete_range(request.get_ref())))
    }

    async fn txn(
        &self,
        request: Request<TxnRequest>,
    ) -> Result<Response<TxnResponse>, Status> {
        self.check_failure()?;
        let mut inner = self.inner.lock();
        Ok(Response::new(inner.do_txn(request.get_ref())))
    }
}

#[tonic::async_trait]
impl Watch for MockEtcd {
    type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchResponse, Status>> + Send>>;

    async fn watch(
        &self,
        request: Request<Streaming<WatchRequest>>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        self.check_failure()?;
        let mut requests = request.into_inner();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::clone(&self.inner);

        tokio::spawn(async move {
            while let Ok(Some(request)) = requests.message().await {
                match request.request_union {
                    Some(RequestUnion::CreateRequest(create)) => {
                        let mut inner = state.lock();
                        inner.next_watch_id += 1;
                        let id = inner.next_watch_id;
                        inner.watchers.push(Watcher {
                            id,
                            key: create.key,
                            range_end: create.range_end,
                            prev_kv: create.prev_kv,
                            tx: tx.clone(),
                        });
                        let confirmation = WatchResponse {
                            header: Some(inner.header()),
                            watch_id: id,
                            created: true,
                            ..Default::default()
                        };
                        let _ = tx.send(Ok(confirmation));
                    }
                    Some(RequestUnion::CancelRequest(cancel)) => {
                        let mut inner = state.lock();
                        inner
                            .watchers
                            .retain(|watcher| watcher.id != cancel.watch_id);
                        let ack = WatchResponse {
                            header: Some(inner.header()),
                            watch_id: cancel.watch_id,
                            canceled: true,
                            ..Default::default()
                        };
                        let _ = tx.send(Ok(ack));
                    }
                    Some(RequestUnion::ProgressRequest(_)) => {
                        let inner = state.lock();
                        let progress = WatchResponse {
                            header: Some(inner.header()),
                            watch_id: -1,
                            ..Default::default()
                        };
                        let _ = tx.send(Ok(progress));
                    }
                    None => {}
                }
            }
            // Client closed its write half; drop every watcher on this stream.
            state
                .lock()
                .watchers
                .retain(|watcher| !tx.same_channel(&watcher.tx));
        });

        Ok(Response::new(Box::pin(UnboundedReceiverStream::new(rx))))
    }
}

#[tonic::async_trait]
impl Lease for MockEtcd {
    async fn lease_grant(
        &self,
        request: Request<LeaseGrantRequest>,
    ) -> Result<Response<LeaseGrantResponse>, Status> {
        self.check_failure()?;
        let request = request.get_ref();
        let mut inner = self.inner.lock();
        let id = if request.id != 0 {
            request.id
        } else {
            inner.next_lease_id += 1;
            inner.next_lease_id
        };
        inner.leases.insert(id, request.ttl);
        Ok(Response::new(LeaseGrantResponse {
            header: Some(inner.header()),
            id,
            ttl: request.ttl,
            error: String::new(),
        }))
    }

    async fn lease_revoke(
        &self,
        request: Request<LeaseRevokeRequest>,
    ) -> Result<Response<LeaseRevokeResponse>, Status> {
        self.check_failure()?;
        let id = request.get_ref().id;
        let mut inner = self.inner.lock();
        if inner.leases.remove(&id).is_none() {
            return Err(Status::not_found("requested lease not found"));
        }
        let keys: Vec<Vec<u8>> = inner
            .store
            .iter()
            .filter(|(_, record)| record.lease == id)
            .map(|(key, _)| key.clone())
            .collect();
        if !keys.is_empty() {
            inner.revision += 1;
            for key in &keys {
                inner.remove_key(key);
            }
        }
        Ok(Response::new(LeaseRevokeResponse {
            header: Some(inner.header()),
        }))
    }

    type LeaseKeepAliveStream =
        Pin<Box<dyn Stream<Item = Result<LeaseKeepAliveResponse, Status>> + Send>>;

    async fn lease_keep_alive(
        &self,
        request: Request<Streaming<LeaseKeepAliveRequest>>,
    ) -> Result<Response<Self::LeaseKeepAliveStream>, Status> {
        self.check_failure()?;
        let close_without_response = self.close_keep_alive;
        let mut requests = request.into_inner();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::clone(&self.inner);

        tokio::spawn(async move {
            while let Ok(Some(request)) = requests.message().await {
                if close_without_response {
                    break;
                }
                let inner = state.lock();
                let ttl = inner.leases.get(&request.id).copied().unwrap_or(0);
                let response = LeaseKeepAliveResponse {
                    header: Some(inner.header()),
                    id: request.id,
                    ttl,
                };
                if tx.send(Ok(response)).is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(UnboundedReceiverStream::new(rx))))
    }
}

#[tonic::async_trait]
impl Lock for MockEtcd {
    async fn lock(
        &self,
        request: Request<LockRequest>,
    ) -> Result<Response<LockResponse>, Status> {
        self.check_failure()?;
        let request = request.into_inner();

        let acquired = {
            let mut inner = self.inner.lock();
            inner.acquire(&request.name, request.lease)
        };
        let key = match acquired {
            Ok(key) => key,
            // Held by someone else; park until release hands the lock over.
            Err(granted) => granted
                .await
                .map_err(|_| Status::internal("lock service shut down"))?,
        };

        let header = self.inner.lock().header();
        Ok(Response::new(LockResponse {
            header: Some(header),
            key,
        }))
    }

    async fn unlock(
        &self,
        request: Request<UnlockRequest>,
    ) -> Result<Response<UnlockResponse>, Status> {
        self.check_failure()?;
        let mut inner = self.inner.lock();
        inner.release(&request.get_ref().key);
        Ok(Response::new(UnlockResponse {
            header: Some(inner.header()),
        }))
    }
}
