//! In-memory mock implementations of the repository, cache store and
//! transport traits.
//!
//! Every mock shares its state through `Arc<Mutex<..>>`, so a clone handed to
//! the code under test can be inspected afterwards. Fault injection flags make
//! the next (or every) call of a given operation fail with an infrastructure
//! error.

use async_trait::async_trait;
use catalog_core::models::{
    CacheEntry, Calendar, Host, Job, JobStatus, Property, SyncRun,
};
use catalog_core::traits::{
    CacheStore, CalendarRepository, Delivery, HostRepository, JobRepository,
    PropertyRepository, QueueTransport, SyncRunRepository,
};
use catalog_core::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock implementation of JobRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<HashMap<i64, Job>>>,
    next_id: Arc<Mutex<i64>>,
    fail_reads: Arc<AtomicBool>,
    fail_releases: Arc<AtomicBool>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let repo = Self::new();
        let max_id = jobs.iter().map(|job| job.id).max().unwrap_or(0);
        {
            let mut map = repo.jobs.lock().unwrap();
            for job in jobs {
                map.insert(job.id, job);
            }
        }
        *repo.next_id.lock().unwrap() = max_id;
        repo
    }

    pub fn get(&self, id: i64) -> Option<Job> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Overwrite a stored job, bypassing the status CAS
    pub fn put(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> SyncResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::database_error("injected job read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create(&self, job: &Job) -> SyncResult<Job> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut new_job = job.clone();
        new_job.id = *next_id;
        self.jobs.lock().unwrap().insert(new_job.id, new_job.clone());
        Ok(new_job)
    }

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Job>> {
        self.check_reads()?;
        Ok(self.get(id))
    }

    async fn find_all(&self) -> SyncResult<Vec<Job>> {
        self.check_reads()?;
        let mut jobs: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn find_by_host(&self, host_id: i64) -> SyncResult<Vec<Job>> {
        let mut jobs = self.find_all().await?;
        jobs.retain(|job| job.host_id == host_id);
        Ok(jobs)
    }

    async fn find_by_status(&self, statuses: &[JobStatus]) -> SyncResult<Vec<Job>> {
        let mut jobs = self.find_all().await?;
        jobs.retain(|job| statuses.contains(&job.status));
        Ok(jobs)
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: &[JobStatus],
        new_status: JobStatus,
    ) -> SyncResult<bool> {
        self.check_reads()?;
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if expected.contains(&job.status) => {
                job.status = new_status;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: i64, next_run_at: DateTime<Utc>) -> SyncResult<bool> {
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(SyncError::database_error("injected job release failure"));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(SyncError::JobNotFound { id })?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.status = JobStatus::Idle;
        job.next_run_at = Some(next_run_at);
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn recover_stale(
        &self,
        id: i64,
        status: JobStatus,
        stale_before: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> SyncResult<bool> {
        self.check_reads()?;
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if job.status == status && job.updated_at < stale_before => {
                job.status = JobStatus::Idle;
                job.next_run_at = Some(next_run_at);
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| job.host_id != host_id);
        Ok((before - jobs.len()) as u64)
    }
}

/// Mock implementation of HostRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockHostRepository {
    hosts: Arc<Mutex<HashMap<i64, Host>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockHostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }
}

#[async_trait]
impl HostRepository for MockHostRepository {
    async fn create(&self, host: &Host) -> SyncResult<Host> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut new_host = host.clone();
        new_host.id = *next_id;
        self.hosts
            .lock()
            .unwrap()
            .insert(new_host.id, new_host.clone());
        Ok(new_host)
    }

    async fn find_by_id(&self, id: i64) -> SyncResult<Option<Host>> {
        Ok(self.hosts.lock().unwrap().get(&id).cloned())
    }

    async fn find_all(&self) -> SyncResult<Vec<Host>> {
        let mut hosts: Vec<Host> = self.hosts.lock().unwrap().values().cloned().collect();
        hosts.sort_by_key(|host| host.id);
        Ok(hosts)
    }

    async fn delete(&self, id: i64) -> SyncResult<bool> {
        Ok(self.hosts.lock().unwrap().remove(&id).is_some())
    }
}

/// Mock local property store
///
/// `fail_upsert_for` makes upserts of the given identifiers fail, and
/// `fail_deletes` makes every delete fail, which is how purge failures are
/// simulated.
#[derive(Debug, Clone, Default)]
pub struct MockPropertyRepository {
    properties: Arc<Mutex<HashMap<(i64, String), Property>>>,
    failing_upserts: Arc<Mutex<HashSet<String>>>,
    fail_deletes: Arc<AtomicBool>,
    upserts: Arc<AtomicUsize>,
}

impl MockPropertyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: Vec<Property>) -> Self {
        let repo = Self::new();
        for property in properties {
            repo.insert(property);
        }
        repo
    }

    pub fn insert(&self, property: Property) {
        self.properties
            .lock()
            .unwrap()
            .insert((property.host_id, property.identifier.clone()), property);
    }

    pub fn get(&self, host_id: i64, identifier: &str) -> Option<Property> {
        self.properties
            .lock()
            .unwrap()
            .get(&(host_id, identifier.to_string()))
            .cloned()
    }

    /// Sorted identifiers stored for a host
    pub fn identifiers(&self, host_id: i64) -> Vec<String> {
        let mut ids: Vec<String> = self
            .properties
            .lock()
            .unwrap()
            .keys()
            .filter(|(h, _)| *h == host_id)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn fail_upsert_for(&self, identifier: &str) {
        self.failing_upserts
            .lock()
            .unwrap()
            .insert(identifier.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PropertyRepository for MockPropertyRepository {
    async fn find_by_host_and_identifier(
        &self,
        host_id: i64,
        identifier: &str,
    ) -> SyncResult<Option<Property>> {
        Ok(self.get(host_id, identifier))
    }

    async fn upsert(&self, property: &Property) -> SyncResult<Property> {
        if self
            .failing_upserts
            .lock()
            .unwrap()
            .contains(&property.identifier)
        {
            return Err(SyncError::database_error(format!(
                "injected upsert failure for {}",
                property.identifier
            )));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);

        let mut properties = self.properties.lock().unwrap();
        let key = (property.host_id, property.identifier.clone());
        let stored = match properties.get(&key) {
            Some(existing) => Property {
                created_at: existing.created_at,
                updated_at: Utc::now(),
                ..property.clone()
            },
            None => property.clone(),
        };
        properties.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, host_id: i64, identifier: &str) -> SyncResult<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::database_error("injected property delete failure"));
        }
        Ok(self
            .properties
            .lock()
            .unwrap()
            .remove(&(host_id, identifier.to_string()))
            .is_some())
    }

    async fn all_identifiers_for_host(&self, host_id: i64) -> SyncResult<Vec<String>> {
        Ok(self.identifiers(host_id))
    }

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let mut properties = self.properties.lock().unwrap();
        let before = properties.len();
        properties.retain(|(h, _), _| *h != host_id);
        Ok((before - properties.len()) as u64)
    }
}

/// Mock calendar store
#[derive(Debug, Clone, Default)]
pub struct MockCalendarRepository {
    calendars: Arc<Mutex<HashMap<(i64, String), Calendar>>>,
}

impl MockCalendarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host_id: i64, property_identifier: &str) -> Option<Calendar> {
        self.calendars
            .lock()
            .unwrap()
            .get(&(host_id, property_identifier.to_string()))
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.calendars.lock().unwrap().len()
    }
}

#[async_trait]
impl CalendarRepository for MockCalendarRepository {
    async fn upsert(&self, calendar: &Calendar) -> SyncResult<()> {
        self.calendars.lock().unwrap().insert(
            (calendar.host_id, calendar.property_identifier.clone()),
            calendar.clone(),
        );
        Ok(())
    }

    async fn find_by_property(
        &self,
        host_id: i64,
        property_identifier: &str,
    ) -> SyncResult<Option<Calendar>> {
        Ok(self.get(host_id, property_identifier))
    }

    async fn delete(&self, host_id: i64, property_identifier: &str) -> SyncResult<bool> {
        Ok(self
            .calendars
            .lock()
            .unwrap()
            .remove(&(host_id, property_identifier.to_string()))
            .is_some())
    }

    async fn delete_by_host(&self, host_id: i64) -> SyncResult<u64> {
        let mut calendars = self.calendars.lock().unwrap();
        let before = calendars.len();
        calendars.retain(|(h, _), _| *h != host_id);
        Ok((before - calendars.len()) as u64)
    }
}

/// Mock run history
#[derive(Debug, Clone, Default)]
pub struct MockSyncRunRepository {
    runs: Arc<Mutex<Vec<SyncRun>>>,
    fail_creates: Arc<AtomicBool>,
}

impl MockSyncRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SyncRun> {
        self.runs.lock().unwrap().last().cloned()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SyncRunRepository for MockSyncRunRepository {
    async fn create(&self, run: &SyncRun) -> SyncResult<SyncRun> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(SyncError::database_error("injected run persist failure"));
        }
        let mut runs = self.runs.lock().unwrap();
        let mut stored = run.clone();
        stored.id = runs.len() as i64 + 1;
        runs.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_host(&self, host_id: i64, limit: i64) -> SyncResult<Vec<SyncRun>> {
        let mut runs: Vec<SyncRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|run| run.host_id == host_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

/// Mock cache store with independent read/write/delete fault injection
#[derive(Debug, Clone, Default)]
pub struct MockCacheStore {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl MockCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.key.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for MockCacheStore {
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Cache("injected cache read failure".to_string()));
        }
        Ok(self.get_entry(key))
    }

    async fn put(&self, entry: &CacheEntry) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Cache("injected cache write failure".to_string()));
        }
        self.insert(entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> SyncResult<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::Cache("injected cache delete failure".to_string()));
        }
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

/// Mock queue transport
///
/// Received messages stay in flight until deleted, so tests can assert that
/// a consumer deleted a message before acting on it.
#[derive(Debug, Clone, Default)]
pub struct MockQueueTransport {
    pending: Arc<Mutex<VecDeque<Vec<u8>>>>,
    in_flight: Arc<Mutex<HashMap<u64, Vec<u8>>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    deleted: Arc<Mutex<Vec<u64>>>,
    next_receipt: Arc<AtomicU64>,
    fail_sends: Arc<AtomicBool>,
}

impl MockQueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a raw body on the queue without going through `send`
    pub fn push_raw(&self, body: &[u8]) {
        self.pending.lock().unwrap().push_back(body.to_vec());
    }

    /// Every body handed to `send`, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueTransport for MockQueueTransport {
    async fn send(&self, body: &[u8]) -> SyncResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SyncError::MessageQueue("injected send failure".to_string()));
        }
        self.sent.lock().unwrap().push(body.to_vec());
        self.pending.lock().unwrap().push_back(body.to_vec());
        Ok(())
    }

    async fn receive(&self) -> SyncResult<Option<Delivery>> {
        let body = self.pending.lock().unwrap().pop_front();
        Ok(body.map(|body| {
            let receipt = self.next_receipt.fetch_add(1, Ordering::SeqCst) + 1;
            self.in_flight.lock().unwrap().insert(receipt, body.clone());
            Delivery { body, receipt }
        }))
    }

    async fn delete(&self, delivery: &Delivery) -> SyncResult<()> {
        self.in_flight.lock().unwrap().remove(&delivery.receipt);
        self.deleted.lock().unwrap().push(delivery.receipt);
        Ok(())
    }

    async fn size(&self) -> SyncResult<u32> {
        Ok(self.pending_count() as u32)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
