//! DNS on Route 53.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_route53::{
    Client,
    types::{AliasTarget, Change, ChangeAction, ChangeBatch, ResourceRecordSet, RrType},
};

use super::upstream;
use crate::{
    errors::{PreviewError, PreviewResult},
    providers::{CDN_HOSTED_ZONE_ID, Dns, DnsRecord, HostedZone},
};

pub struct Route53Dns {
    client: Client,
}

impl Route53Dns {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn record_sets(
        &self,
        zone_id: &str,
        start_name: &str,
    ) -> PreviewResult<Vec<ResourceRecordSet>> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(start_name)
            .send()
            .await
            .map_err(upstream("route53:ListResourceRecordSets"))?;
        Ok(output.resource_record_sets().to_vec())
    }

    async fn change(&self, zone_id: &str, change: Change, comment: &str) -> PreviewResult<()> {
        let batch = ChangeBatch::builder()
            .changes(change)
            .comment(comment)
            .build()
            .map_err(upstream("route53:ChangeBatch"))?;
        self.client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(upstream("route53:ChangeResourceRecordSets"))?;
        Ok(())
    }
}

#[async_trait]
impl Dns for Route53Dns {
    async fn find_hosted_zone(&self, zone_name: &str) -> PreviewResult<Option<HostedZone>> {
        let output = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(zone_name)
            .send()
            .await
            .map_err(upstream("route53:ListHostedZonesByName"))?;
        Ok(output
            .hosted_zones()
            .iter()
            .find(|zone| zone.name() == zone_name)
            .map(|zone| HostedZone {
                id: zone.id().to_string(),
                name: zone.name().to_string(),
            }))
    }

    async fn list_records(&self, zone_id: &str, start_name: &str) -> PreviewResult<Vec<DnsRecord>> {
        Ok(self
            .record_sets(zone_id, start_name)
            .await?
            .iter()
            .map(|set| DnsRecord {
                name: set.name().to_string(),
                record_type: set.r#type().as_str().to_string(),
                alias_target: set.alias_target().map(|alias| alias.dns_name().to_string()),
            })
            .collect())
    }

    async fn create_alias_record(
        &self,
        zone_id: &str,
        name: &str,
        target: &str,
        comment: &str,
    ) -> PreviewResult<()> {
        let alias = AliasTarget::builder()
            .hosted_zone_id(CDN_HOSTED_ZONE_ID)
            .dns_name(target)
            .evaluate_target_health(false)
            .build()
            .map_err(upstream("route53:AliasTarget"))?;
        let record = ResourceRecordSet::builder()
            .name(name)
            .r#type(RrType::A)
            .alias_target(alias)
            .build()
            .map_err(upstream("route53:ResourceRecordSet"))?;
        let change = Change::builder()
            .action(ChangeAction::Create)
            .resource_record_set(record)
            .build()
            .map_err(upstream("route53:Change"))?;
        self.change(zone_id, change, comment).await
    }

    async fn delete_record(&self, zone_id: &str, record: &DnsRecord) -> PreviewResult<()> {
        // Deletes must echo the record set exactly as stored.
        let existing = self
            .record_sets(zone_id, &record.name)
            .await?
            .into_iter()
            .find(|set| set.name() == record.name && set.r#type().as_str() == record.record_type)
            .ok_or_else(|| {
                PreviewError::upstream(
                    "route53:ChangeResourceRecordSets",
                    format!("record {} vanished before delete", record.name),
                )
            })?;
        let change = Change::builder()
            .action(ChangeAction::Delete)
            .resource_record_set(existing)
            .build()
            .map_err(upstream("route53:Change"))?;
        self.change(zone_id, change, &format!("Remove {}", record.name))
            .await
    }
}
