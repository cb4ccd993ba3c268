//! In-memory providers for tests.
//!
//! Every fake appends each provider call to a shared `OpLog`, so tests can
//! assert on ordering across providers as well as on final state.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{TimeZone, Utc};

use crate::{
    config::PreviewSettings,
    errors::{PreviewError, PreviewResult},
    models::{
        deployment::{DeploymentRecord, DeploymentStatus},
        handle::{BucketHandle, DistributionHandle, FunctionHandle, OriginAccessControlHandle},
    },
    providers::{
        Cdn, Clients, DistributionSpec, DistributionSummary, Dns, DnsRecord, FunctionSummary,
        HostedZone, OBJECT_PAGE_LIMIT, ObjectPage, ObjectStorage, ReviewPlatform,
    },
};

pub const ACCOUNT_ID: &str = "123456789012";

pub fn settings() -> PreviewSettings {
    PreviewSettings {
        app_name: "demo".into(),
        domain: "example.com".into(),
        region: "us-east-1".into(),
        account_id: ACCOUNT_ID.into(),
        certificate_arn: format!("arn:aws:acm:us-east-1:{}:certificate/abc", ACCOUNT_ID),
        build_dir: PathBuf::from("out"),
        upload_concurrency: 4,
    }
}

/// Ordered record of provider calls, shared by all fakes of one test.
#[derive(Clone, Default, Debug)]
pub struct OpLog(Arc<Mutex<Vec<String>>>);

impl OpLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("lock").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("lock").clone()
    }

    /// Number of calls whose entry starts with `operation`.
    pub fn count(&self, operation: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(operation))
            .count()
    }

    /// Position of the first entry starting with `operation`.
    pub fn position(&self, operation: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(operation))
    }

    pub fn clear(&self) {
        self.0.lock().expect("lock").clear();
    }
}

fn injected(operation: &'static str, what: &str) -> PreviewError {
    PreviewError::upstream(operation, format!("injected failure for {}", what))
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Default, Debug)]
struct StorageState {
    buckets: BTreeSet<String>,
    objects: BTreeMap<String, BTreeMap<String, Bytes>>,
    policies: BTreeMap<String, String>,
    content_types: BTreeMap<String, String>,
    fail_put_suffix: Option<String>,
}

#[derive(Clone, Default, Debug)]
pub struct FakeStorage {
    state: Arc<Mutex<StorageState>>,
    log: OpLog,
}

impl FakeStorage {
    pub fn new(log: OpLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    pub fn with_bucket(self, name: &str) -> Self {
        self.state.lock().expect("lock").buckets.insert(name.into());
        self
    }

    pub fn insert_object(&self, bucket: &str, key: &str, body: &str) {
        let mut state = self.state.lock().expect("lock");
        state.buckets.insert(bucket.into());
        state
            .objects
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), Bytes::from(body.to_string()));
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .expect("lock")
            .objects
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .expect("lock")
            .objects
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .expect("lock")
            .content_types
            .get(key)
            .cloned()
    }

    pub fn policy(&self, bucket: &str) -> Option<String> {
        self.state.lock().expect("lock").policies.get(bucket).cloned()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().expect("lock").buckets.contains(bucket)
    }

    /// Fail every upload whose key ends with `suffix`.
    pub fn fail_uploads_ending_with(&self, suffix: &str) {
        self.state.lock().expect("lock").fail_put_suffix = Some(suffix.into());
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn list_buckets(&self) -> PreviewResult<Vec<String>> {
        self.log.push("s3:ListBuckets");
        Ok(self.state.lock().expect("lock").buckets.iter().cloned().collect())
    }

    async fn create_bucket(&self, name: &str) -> PreviewResult<BucketHandle> {
        self.log.push(format!("s3:CreateBucket {}", name));
        let mut state = self.state.lock().expect("lock");
        if !state.buckets.insert(name.into()) {
            return Err(PreviewError::upstream("s3:CreateBucket", "BucketAlreadyOwnedByYou"));
        }
        Ok(BucketHandle { name: name.into() })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> PreviewResult<()> {
        self.log.push(format!("s3:PutBucketPolicy {}", bucket));
        self.state
            .lock()
            .expect("lock")
            .policies
            .insert(bucket.into(), policy.into());
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> PreviewResult<ObjectPage> {
        self.log.push(format!("s3:ListObjectsV2 {}", prefix));
        let state = self.state.lock().expect("lock");
        if !state.buckets.contains(bucket) {
            return Err(PreviewError::upstream("s3:ListObjectsV2", "NoSuchBucket"));
        }
        let mut matching = state
            .objects
            .get(bucket)
            .into_iter()
            .flat_map(|objects| objects.keys())
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation_token.as_deref().is_none_or(|t| key.as_str() > t))
            .cloned();
        let keys: Vec<String> = matching.by_ref().take(max_keys as usize).collect();
        let next_continuation_token = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };
        Ok(ObjectPage {
            keys,
            next_continuation_token,
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> PreviewResult<()> {
        self.log.push(format!("s3:DeleteObjects {}", keys.len()));
        if keys.len() > OBJECT_PAGE_LIMIT as usize {
            return Err(PreviewError::upstream("s3:DeleteObjects", "MalformedXML"));
        }
        let mut state = self.state.lock().expect("lock");
        if let Some(objects) = state.objects.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        content_md5: &str,
    ) -> PreviewResult<()> {
        self.log.push(format!("s3:PutObject {}", key));
        let expected = general_purpose::STANDARD.encode(md5::compute(&body).0);
        if expected != content_md5 {
            return Err(PreviewError::upstream("s3:PutObject", "BadDigest"));
        }
        let mut state = self.state.lock().expect("lock");
        if state
            .fail_put_suffix
            .as_deref()
            .is_some_and(|suffix| key.ends_with(suffix))
        {
            return Err(injected("s3:PutObject", key));
        }
        if !state.buckets.contains(bucket) {
            return Err(PreviewError::upstream("s3:PutObject", "NoSuchBucket"));
        }
        state.content_types.insert(key.into(), content_type.into());
        state
            .objects
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), body);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CDN
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeFunction {
    pub development_code: String,
    pub live_code: Option<String>,
    pub etag: u32,
}

#[derive(Default, Debug)]
struct CdnState {
    oacs: Vec<OriginAccessControlHandle>,
    functions: BTreeMap<String, FakeFunction>,
    distributions: Vec<(DistributionSummary, Option<DistributionSpec>)>,
    omit_created_ids: bool,
    omit_distribution_domain: bool,
}

#[derive(Clone, Default, Debug)]
pub struct FakeCdn {
    state: Arc<Mutex<CdnState>>,
    log: OpLog,
}

impl FakeCdn {
    pub fn new(log: OpLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    pub fn with_distribution(self, id: &str, domain_name: &str, origin: &str) -> Self {
        self.state.lock().expect("lock").distributions.push((
            DistributionSummary {
                id: id.into(),
                domain_name: domain_name.into(),
                origin_domains: vec![origin.into()],
            },
            None,
        ));
        self
    }

    pub fn with_origin_access_control(self, id: &str, name: &str) -> Self {
        self.state
            .lock()
            .expect("lock")
            .oacs
            .push(OriginAccessControlHandle {
                id: id.into(),
                name: name.into(),
            });
        self
    }

    /// Accept create calls but answer without identifiers.
    pub fn omit_created_ids(&self) {
        self.state.lock().expect("lock").omit_created_ids = true;
    }

    /// Answer distribution creates with an id but no domain name.
    pub fn omit_distribution_domain(&self) {
        self.state.lock().expect("lock").omit_distribution_domain = true;
    }

    pub fn distribution_count(&self) -> usize {
        self.state.lock().expect("lock").distributions.len()
    }

    pub fn created_spec(&self) -> Option<DistributionSpec> {
        self.state
            .lock()
            .expect("lock")
            .distributions
            .iter()
            .find_map(|(_, spec)| spec.clone())
    }

    pub fn function(&self, name: &str) -> Option<FakeFunction> {
        self.state.lock().expect("lock").functions.get(name).cloned()
    }
}

fn function_arn(name: &str) -> String {
    format!("arn:aws:cloudfront::{}:function/{}", ACCOUNT_ID, name)
}

#[async_trait]
impl Cdn for FakeCdn {
    async fn list_origin_access_controls(&self) -> PreviewResult<Vec<OriginAccessControlHandle>> {
        self.log.push("cloudfront:ListOriginAccessControls");
        Ok(self.state.lock().expect("lock").oacs.clone())
    }

    async fn create_origin_access_control(
        &self,
        name: &str,
        _description: &str,
    ) -> PreviewResult<OriginAccessControlHandle> {
        self.log
            .push(format!("cloudfront:CreateOriginAccessControl {}", name));
        let mut state = self.state.lock().expect("lock");
        let id = if state.omit_created_ids {
            String::new()
        } else {
            format!("OAC{}", state.oacs.len() + 1)
        };
        let handle = OriginAccessControlHandle {
            id,
            name: name.into(),
        };
        state.oacs.push(handle.clone());
        Ok(handle)
    }

    async fn list_functions(&self) -> PreviewResult<Vec<FunctionSummary>> {
        self.log.push("cloudfront:ListFunctions");
        Ok(self
            .state
            .lock()
            .expect("lock")
            .functions
            .keys()
            .map(|name| FunctionSummary {
                name: name.clone(),
                arn: function_arn(name),
            })
            .collect())
    }

    async fn describe_function(&self, name: &str) -> PreviewResult<String> {
        self.log.push(format!("cloudfront:DescribeFunction {}", name));
        let state = self.state.lock().expect("lock");
        let function = state
            .functions
            .get(name)
            .ok_or_else(|| PreviewError::upstream("cloudfront:DescribeFunction", "NoSuchFunction"))?;
        Ok(format!("E{}", function.etag))
    }

    async fn create_function(
        &self,
        name: &str,
        _comment: &str,
        code: &str,
    ) -> PreviewResult<String> {
        self.log.push(format!("cloudfront:CreateFunction {}", name));
        let mut state = self.state.lock().expect("lock");
        if state.functions.contains_key(name) {
            return Err(PreviewError::upstream(
                "cloudfront:CreateFunction",
                "FunctionAlreadyExists",
            ));
        }
        state.functions.insert(
            name.into(),
            FakeFunction {
                development_code: code.into(),
                live_code: None,
                etag: 1,
            },
        );
        Ok("E1".into())
    }

    async fn update_function(
        &self,
        name: &str,
        etag: &str,
        _comment: &str,
        code: &str,
    ) -> PreviewResult<String> {
        self.log.push(format!("cloudfront:UpdateFunction {}", name));
        let mut state = self.state.lock().expect("lock");
        let function = state
            .functions
            .get_mut(name)
            .ok_or_else(|| PreviewError::upstream("cloudfront:UpdateFunction", "NoSuchFunction"))?;
        if format!("E{}", function.etag) != etag {
            return Err(PreviewError::upstream(
                "cloudfront:UpdateFunction",
                "PreconditionFailed",
            ));
        }
        function.development_code = code.into();
        function.etag += 1;
        Ok(format!("E{}", function.etag))
    }

    async fn publish_function(&self, name: &str, etag: &str) -> PreviewResult<FunctionHandle> {
        self.log.push(format!("cloudfront:PublishFunction {}", name));
        let mut state = self.state.lock().expect("lock");
        let function = state
            .functions
            .get_mut(name)
            .ok_or_else(|| PreviewError::upstream("cloudfront:PublishFunction", "NoSuchFunction"))?;
        if format!("E{}", function.etag) != etag {
            return Err(PreviewError::upstream(
                "cloudfront:PublishFunction",
                "PreconditionFailed",
            ));
        }
        function.live_code = Some(function.development_code.clone());
        Ok(FunctionHandle {
            name: name.into(),
            arn: function_arn(name),
        })
    }

    async fn list_distributions(&self) -> PreviewResult<Vec<DistributionSummary>> {
        self.log.push("cloudfront:ListDistributions");
        Ok(self
            .state
            .lock()
            .expect("lock")
            .distributions
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> PreviewResult<DistributionHandle> {
        self.log
            .push(format!("cloudfront:CreateDistribution {}", spec.origin_id));
        let mut state = self.state.lock().expect("lock");
        let n = state.distributions.len() + 1;
        let summary = DistributionSummary {
            id: format!("EDIST{}", n),
            domain_name: format!("d{}.cloudfront.net", n),
            origin_domains: vec![spec.origin_id.clone()],
        };
        state.distributions.push((summary.clone(), Some(spec.clone())));
        if state.omit_created_ids {
            return Ok(DistributionHandle {
                id: String::new(),
                domain_name: String::new(),
            });
        }
        let domain_name = if state.omit_distribution_domain {
            String::new()
        } else {
            summary.domain_name
        };
        Ok(DistributionHandle {
            id: summary.id,
            domain_name,
        })
    }
}

// ---------------------------------------------------------------------------
// DNS
// ---------------------------------------------------------------------------

#[derive(Default, Debug)]
struct DnsState {
    zones: Vec<HostedZone>,
    /// Keyed by `(zone id, name, type)`.
    records: BTreeMap<(String, String, String), DnsRecord>,
}

#[derive(Clone, Default, Debug)]
pub struct FakeDns {
    state: Arc<Mutex<DnsState>>,
    log: OpLog,
}

impl FakeDns {
    pub fn new(log: OpLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.state.lock().expect("lock").zones.push(HostedZone {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_record(self, zone_id: &str, name: &str, target: &str) -> Self {
        self.insert(
            zone_id,
            DnsRecord {
                name: name.into(),
                record_type: "A".into(),
                alias_target: Some(target.into()),
            },
        );
        self
    }

    /// A plain (non-alias) record of `record_type`, as another tool would leave.
    pub fn with_plain_record(self, zone_id: &str, name: &str, record_type: &str) -> Self {
        self.insert(
            zone_id,
            DnsRecord {
                name: name.into(),
                record_type: record_type.into(),
                alias_target: None,
            },
        );
        self
    }

    fn insert(&self, zone_id: &str, record: DnsRecord) {
        self.state.lock().expect("lock").records.insert(
            (
                zone_id.into(),
                record.name.clone(),
                record.record_type.clone(),
            ),
            record,
        );
    }

    /// The A record named `name`, if any.
    pub fn record(&self, zone_id: &str, name: &str) -> Option<DnsRecord> {
        self.record_of_type(zone_id, name, "A")
    }

    pub fn record_of_type(&self, zone_id: &str, name: &str, record_type: &str) -> Option<DnsRecord> {
        self.state
            .lock()
            .expect("lock")
            .records
            .get(&(zone_id.to_string(), name.to_string(), record_type.to_string()))
            .cloned()
    }
}

#[async_trait]
impl Dns for FakeDns {
    async fn find_hosted_zone(&self, zone_name: &str) -> PreviewResult<Option<HostedZone>> {
        self.log
            .push(format!("route53:ListHostedZonesByName {}", zone_name));
        Ok(self
            .state
            .lock()
            .expect("lock")
            .zones
            .iter()
            .find(|zone| zone.name == zone_name)
            .cloned())
    }

    async fn list_records(&self, zone_id: &str, start_name: &str) -> PreviewResult<Vec<DnsRecord>> {
        self.log
            .push(format!("route53:ListResourceRecordSets {}", start_name));
        Ok(self
            .state
            .lock()
            .expect("lock")
            .records
            .iter()
            .filter(|((zone, name, _), _)| zone == zone_id && name.as_str() >= start_name)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn create_alias_record(
        &self,
        zone_id: &str,
        name: &str,
        target: &str,
        _comment: &str,
    ) -> PreviewResult<()> {
        self.log.push(format!("route53:CreateRecord {}", name));
        let mut state = self.state.lock().expect("lock");
        let key = (zone_id.to_string(), name.to_string(), "A".to_string());
        if state.records.contains_key(&key) {
            return Err(PreviewError::upstream(
                "route53:ChangeResourceRecordSets",
                "InvalidChangeBatch: record exists",
            ));
        }
        state.records.insert(
            key,
            DnsRecord {
                name: name.into(),
                record_type: "A".into(),
                alias_target: Some(target.into()),
            },
        );
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record: &DnsRecord) -> PreviewResult<()> {
        self.log.push(format!("route53:DeleteRecord {}", record.name));
        self.state
            .lock()
            .expect("lock")
            .records
            .remove(&(
                zone_id.to_string(),
                record.name.clone(),
                record.record_type.clone(),
            ))
            .map(|_| ())
            .ok_or_else(|| {
                PreviewError::upstream("route53:ChangeResourceRecordSets", "record not found")
            })
    }
}

// ---------------------------------------------------------------------------
// Review platform
// ---------------------------------------------------------------------------

#[derive(Default, Debug)]
struct ReviewState {
    deployments: Vec<DeploymentRecord>,
    statuses: Vec<(u64, DeploymentStatus, Option<String>)>,
    next_id: u64,
    unavailable: bool,
}

#[derive(Clone, Default, Debug)]
pub struct FakeReview {
    state: Arc<Mutex<ReviewState>>,
    log: OpLog,
}

impl FakeReview {
    pub fn new(log: OpLog) -> Self {
        Self {
            state: Arc::default(),
            log,
        }
    }

    pub fn with_deployment(self, id: u64, git_ref: &str, environment: &str) -> Self {
        {
            let mut state = self.state.lock().expect("lock");
            state.deployments.push(DeploymentRecord {
                id,
                git_ref: git_ref.into(),
                environment: environment.into(),
                created_at: Utc
                    .with_ymd_and_hms(2024, 1, 1, 0, id as u32 % 60, 0)
                    .single()
                    .expect("valid timestamp"),
            });
            state.next_id = state.next_id.max(id);
        }
        self
    }

    /// Fail every call, as during a platform outage.
    pub fn make_unavailable(&self) {
        self.state.lock().expect("lock").unavailable = true;
    }

    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.state.lock().expect("lock").deployments.clone()
    }

    pub fn statuses(&self, id: u64) -> Vec<(DeploymentStatus, Option<String>)> {
        self.state
            .lock()
            .expect("lock")
            .statuses
            .iter()
            .filter(|(sid, _, _)| *sid == id)
            .map(|(_, status, url)| (*status, url.clone()))
            .collect()
    }

    fn check(&self, operation: &'static str) -> PreviewResult<()> {
        if self.state.lock().expect("lock").unavailable {
            return Err(PreviewError::upstream(operation, "503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewPlatform for FakeReview {
    async fn list_deployments(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<Vec<DeploymentRecord>> {
        self.log.push(format!("github:ListDeployments {}", environment));
        self.check("github:ListDeployments")?;
        Ok(self
            .state
            .lock()
            .expect("lock")
            .deployments
            .iter()
            .filter(|d| d.git_ref == git_ref && d.environment == environment)
            .cloned()
            .collect())
    }

    async fn create_deployment(
        &self,
        git_ref: &str,
        environment: &str,
    ) -> PreviewResult<DeploymentRecord> {
        self.log.push(format!("github:CreateDeployment {}", environment));
        self.check("github:CreateDeployment")?;
        let mut state = self.state.lock().expect("lock");
        state.next_id += 1;
        let record = DeploymentRecord {
            id: state.next_id,
            git_ref: git_ref.into(),
            environment: environment.into(),
            created_at: Utc::now(),
        };
        state.deployments.push(record.clone());
        Ok(record)
    }

    async fn create_deployment_status(
        &self,
        deployment_id: u64,
        status: DeploymentStatus,
        _environment: &str,
        environment_url: Option<&str>,
    ) -> PreviewResult<()> {
        self.log
            .push(format!("github:CreateDeploymentStatus {} {}", deployment_id, status));
        self.check("github:CreateDeploymentStatus")?;
        self.state.lock().expect("lock").statuses.push((
            deployment_id,
            status,
            environment_url.map(str::to_string),
        ));
        Ok(())
    }

    async fn delete_deployment(&self, deployment_id: u64) -> PreviewResult<()> {
        self.log
            .push(format!("github:DeleteDeployment {}", deployment_id));
        self.check("github:DeleteDeployment")?;
        let mut state = self.state.lock().expect("lock");
        let last_status = state
            .statuses
            .iter()
            .rev()
            .find(|(id, _, _)| *id == deployment_id)
            .map(|(_, status, _)| *status);
        if last_status.is_some_and(|status| status != DeploymentStatus::Inactive) {
            return Err(PreviewError::upstream(
                "github:DeleteDeployment",
                "422 deployment is still active",
            ));
        }
        state.deployments.retain(|d| d.id != deployment_id);
        Ok(())
    }
}

/// A full set of fakes sharing one log, plus handles to inspect them.
pub struct FakeProviders {
    pub log: OpLog,
    pub storage: FakeStorage,
    pub cdn: FakeCdn,
    pub dns: FakeDns,
    pub review: FakeReview,
}

pub const ZONE_ID: &str = "/hostedzone/ZEXAMPLE";

impl FakeProviders {
    /// Fakes for an account that only has the `example.com.` hosted zone.
    pub fn empty_account() -> Self {
        let log = OpLog::default();
        Self {
            storage: FakeStorage::new(log.clone()),
            cdn: FakeCdn::new(log.clone()),
            dns: FakeDns::new(log.clone()).with_zone(ZONE_ID, "example.com."),
            review: FakeReview::new(log.clone()),
            log,
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            storage: Box::new(self.storage.clone()),
            cdn: Box::new(self.cdn.clone()),
            dns: Box::new(self.dns.clone()),
            review: Box::new(self.review.clone()),
        }
    }
}
